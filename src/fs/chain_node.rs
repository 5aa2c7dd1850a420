//! one link of a file's block chain
use crate::{
    error::{Result, StorageError},
    utils::traits::FixedRecord,
};

use super::NODE_SIZE;

/// on-disk value of a missing node index
const NONE_INDEX: i16 = -1;

/// owns one data block and points at the node holding the following block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainNode {
    /// physical data block number
    pub block: u16,
    /// next node slot, `None` at the end of the chain
    pub next: Option<u16>,
}

impl ChainNode {
    pub fn new(block: u16, next: Option<u16>) -> Self {
        ChainNode { block, next }
    }
}

/// encode an optional index as a big-endian 16-bit signed value
pub(crate) fn encode_index(index: Option<u16>) -> [u8; 2] {
    match index {
        Some(index) => (index as i16).to_be_bytes(),
        None => NONE_INDEX.to_be_bytes(),
    }
}

pub(crate) fn decode_index(bytes: [u8; 2]) -> Result<Option<u16>> {
    match i16::from_be_bytes(bytes) {
        NONE_INDEX => Ok(None),
        index if index >= 0 => Ok(Some(index as u16)),
        index => Err(StorageError::corrupted(format!(
            "invalid index {index} in metadata"
        ))),
    }
}

impl FixedRecord for ChainNode {
    const SIZE: usize = NODE_SIZE;

    fn encode_into(&self, buf: &mut [u8]) {
        buf[0..2].copy_from_slice(&(self.block as i16).to_be_bytes());
        buf[2..4].copy_from_slice(&encode_index(self.next));
    }

    fn decode_from(buf: &[u8]) -> Result<Self> {
        let block = decode_index([buf[0], buf[1]])?
            .ok_or_else(|| StorageError::corrupted("chain node without a block"))?;
        let next = decode_index([buf[2], buf[3]])?;
        Ok(ChainNode { block, next })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_is_big_endian() {
        let mut buf = [0u8; NODE_SIZE];
        ChainNode::new(0x0102, Some(0x0304)).encode_into(&mut buf);
        assert_eq!(buf, [0x01, 0x02, 0x03, 0x04]);

        ChainNode::new(3, None).encode_into(&mut buf);
        assert_eq!(buf, [0x00, 0x03, 0xff, 0xff]);
    }

    #[test]
    fn test_decode() {
        assert_eq!(
            ChainNode::decode_slot(&[0x00, 0x03, 0xff, 0xff]).unwrap(),
            Some(ChainNode::new(3, None))
        );
        // next may legitimately point at node slot 0
        assert_eq!(
            ChainNode::decode_slot(&[0x00, 0x07, 0x00, 0x00]).unwrap(),
            Some(ChainNode::new(7, Some(0)))
        );
        assert_eq!(ChainNode::decode_slot(&[0u8; 4]).unwrap(), None);
    }

    #[test]
    fn test_decode_rejects_negative_indices() {
        assert!(ChainNode::decode_slot(&[0xff, 0xfe, 0xff, 0xff]).is_err());
        assert!(ChainNode::decode_slot(&[0xff, 0xff, 0x00, 0x01]).is_err());
        assert!(ChainNode::decode_slot(&[0x00, 0x01, 0x80, 0x00]).is_err());
    }
}
