//! the line based command protocol
use log::debug;

use crate::fs::FileService;

/// one parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Create(String),
    /// file name and the rest of the line as content
    Write(String, String),
    Read(String),
    Delete(String),
    List,
    Stat,
    /// close the connection
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("usage {0}")]
    Usage(&'static str),
    #[error("Unknown command")]
    Unknown,
}

impl Command {
    /// parse `VERB [name [content...]]`, the verb is case-insensitive
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let mut parts = line.splitn(3, ' ');
        let verb = parts.next().unwrap_or_default().to_ascii_uppercase();
        let name = parts.next().filter(|name| !name.is_empty());
        let rest = parts.next();

        match verb.as_str() {
            "CREATE" => name
                .map(|name| Command::Create(name.to_owned()))
                .ok_or(ParseError::Usage("CREATE <filename>")),
            "WRITE" => match (name, rest) {
                (Some(name), Some(content)) => {
                    Ok(Command::Write(name.to_owned(), content.to_owned()))
                }
                _ => Err(ParseError::Usage("WRITE <filename> <content>")),
            },
            "READ" => name
                .map(|name| Command::Read(name.to_owned()))
                .ok_or(ParseError::Usage("READ <filename>")),
            "DELETE" => name
                .map(|name| Command::Delete(name.to_owned()))
                .ok_or(ParseError::Usage("DELETE <filename>")),
            "LIST" => Ok(Command::List),
            "STAT" => Ok(Command::Stat),
            "QUIT" => Ok(Command::Quit),
            _ => Err(ParseError::Unknown),
        }
    }
}

/// run `command` against `service` and render the one line reply
pub fn execute<F>(service: &F, command: Command) -> String
where
    F: FileService + ?Sized,
{
    let result = match command {
        Command::Create(name) => service.create(&name).map(|_| "SUCCESS".to_owned()),
        Command::Write(name, content) => service
            .write(&name, content.as_bytes())
            .map(|_| "SUCCESS".to_owned()),
        Command::Read(name) => service.read(&name).map(|data| {
            let text = String::from_utf8_lossy(&data).replace(['\n', '\r'], "");
            if text.is_empty() {
                "EMPTY".to_owned()
            } else {
                text
            }
        }),
        Command::Delete(name) => service.delete(&name).map(|_| "SUCCESS".to_owned()),
        Command::List => {
            let files = service.list();
            Ok(if files.is_empty() {
                "NO_FILES".to_owned()
            } else {
                files.join(",")
            })
        }
        Command::Stat => {
            let stats = service.stats();
            Ok(format!(
                "files={} free_entries={} free_blocks={}/{} free_nodes={}",
                stats.files,
                stats.free_entries,
                stats.free_blocks,
                stats.total_blocks,
                stats.free_nodes
            ))
        }
        Command::Quit => Ok("BYE".to_owned()),
    };
    result.unwrap_or_else(|e| {
        debug!("request failed with errno {}: {e}", e.errno());
        format!("ERROR: {e}")
    })
}
