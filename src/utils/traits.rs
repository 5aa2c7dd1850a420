use crate::error::Result;

/// Trait for records stored in a fixed-width slot of an on-disk table
/// # Note
/// a slot holding only zero bytes is a free slot,
/// so an encoded record must never be all zero
pub trait FixedRecord: Sized {
    /// encoded width in bytes
    const SIZE: usize;

    /// encode into `buf`, which is exactly [Self::SIZE] bytes long
    fn encode_into(&self, buf: &mut [u8]);

    /// decode from `buf`, which is exactly [Self::SIZE] bytes long and not all zero
    fn decode_from(buf: &[u8]) -> Result<Self>;

    /// decode one slot, `None` if the slot is free
    fn decode_slot(buf: &[u8]) -> Result<Option<Self>> {
        if buf.iter().all(|b| *b == 0) {
            Ok(None)
        } else {
            Self::decode_from(buf).map(Some)
        }
    }

    /// serialize a whole table, free slots are written as zero bytes
    fn serialize_table(slots: &[Option<Self>]) -> Vec<u8> {
        let mut bytes = vec![0u8; slots.len() * Self::SIZE];
        for (slot, chunk) in slots.iter().zip(bytes.chunks_exact_mut(Self::SIZE)) {
            if let Some(record) = slot {
                record.encode_into(chunk);
            }
        }
        bytes
    }

    /// deserialize a whole table, one slot per [Self::SIZE] bytes
    fn deserialize_table(bytes: &[u8]) -> Result<Vec<Option<Self>>> {
        bytes.chunks_exact(Self::SIZE).map(Self::decode_slot).collect()
    }
}
