//! serve a volume to TCP clients, one thread per connection
pub mod protocol;

use std::{
    io::{self, BufRead, BufReader, Write},
    net::{TcpListener, TcpStream, ToSocketAddrs},
    sync::Arc,
    thread,
};

use log::{debug, info, warn};

use crate::fs::FileService;
use protocol::Command;

/// bind `addr` and serve `service` until the listener fails
pub fn serve<F, A>(service: Arc<F>, addr: A) -> anyhow::Result<()>
where
    F: FileService + 'static,
    A: ToSocketAddrs,
{
    let listener = TcpListener::bind(addr)?;
    info!("server started, listening on {}", listener.local_addr()?);
    run(listener, service)
}

/// accept connections on `listener`, each one handled on its own thread
pub fn run<F>(listener: TcpListener, service: Arc<F>) -> anyhow::Result<()>
where
    F: FileService + 'static,
{
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("accepting a connection failed: {e}");
                continue;
            }
        };
        let service = Arc::clone(&service);
        thread::spawn(move || {
            let peer = stream.peer_addr().ok();
            debug!("client connected: {peer:?}");
            if let Err(e) = handle_stream(stream, service.as_ref()) {
                warn!("connection with {peer:?} failed: {e}");
            }
            debug!("client disconnected: {peer:?}");
        });
    }
    Ok(())
}

fn handle_stream<F>(stream: TcpStream, service: &F) -> io::Result<()>
where
    F: FileService + ?Sized,
{
    let reader = BufReader::new(stream.try_clone()?);
    handle_client(reader, stream, service)
}

/// answer every request line from `reader` until EOF or `QUIT`
///
/// Bytes that are not UTF-8 are decoded lossily, they never end the session.
pub fn handle_client<R, W, F>(mut reader: R, mut writer: W, service: &F) -> io::Result<()>
where
    R: BufRead,
    W: Write,
    F: FileService + ?Sized,
{
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }
        debug!("received from client: {line}");

        let (reply, quit) = match Command::parse(line) {
            Ok(Command::Quit) => (protocol::execute(service, Command::Quit), true),
            Ok(command) => (protocol::execute(service, command), false),
            Err(e) => (format!("ERROR: {e}"), false),
        };
        writeln!(writer, "{reply}")?;
        writer.flush()?;
        if quit {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Cursor, Write};

    use super::*;
    use crate::{
        fs::{Geometry, StorageEngine},
        store::MemoryRegion,
    };

    fn engine() -> StorageEngine<MemoryRegion> {
        StorageEngine::open(MemoryRegion::new(1280), Geometry::default()).unwrap()
    }

    #[test]
    fn test_handle_client_session() {
        let engine = engine();
        let input = "CREATE a.txt\r\nWRITE a.txt hi\n\nREAD a.txt\nBOGUS\nDELETE\nQUIT\nLIST\n";
        let mut output = Vec::new();
        handle_client(Cursor::new(input), &mut output, &engine).unwrap();

        let output = String::from_utf8(output).unwrap();
        let replies: Vec<_> = output.lines().collect();
        assert_eq!(
            replies,
            vec![
                "SUCCESS",
                "SUCCESS",
                "hi",
                "ERROR: Unknown command",
                "ERROR: usage DELETE <filename>",
                "BYE",
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_keeps_the_session() {
        let engine = engine();
        let mut input = b"CREATE a\nWRITE a \xff\xfeok\n".to_vec();
        input.extend_from_slice(b"\xc3\nLIST\nREAD a\n");
        let mut output = Vec::new();
        handle_client(Cursor::new(input), &mut output, &engine).unwrap();

        let output = String::from_utf8(output).unwrap();
        let replies: Vec<_> = output.lines().collect();
        assert_eq!(
            replies,
            vec![
                "SUCCESS",
                "SUCCESS",
                "ERROR: Unknown command",
                "a",
                "\u{fffd}\u{fffd}ok",
            ]
        );
    }

    #[test]
    fn test_tcp_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let service = Arc::new(engine());
        thread::spawn(move || run(listener, service));

        let request = |line: &str| -> String {
            let mut stream = TcpStream::connect(addr).unwrap();
            writeln!(stream, "{line}").unwrap();
            let mut reply = String::new();
            BufReader::new(&stream).read_line(&mut reply).unwrap();
            writeln!(stream, "QUIT").unwrap();
            reply.trim_end().to_owned()
        };

        assert_eq!(request("CREATE notes"), "SUCCESS");
        assert_eq!(request("WRITE notes over the wire"), "SUCCESS");
        assert_eq!(request("READ notes"), "over the wire");
        assert_eq!(request("LIST"), "notes");
        assert_eq!(request("DELETE notes"), "SUCCESS");
        assert_eq!(request("LIST"), "NO_FILES");
    }
}
