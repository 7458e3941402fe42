use std::{fmt, io};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LINE_ENDINGS: &[u8] = b"\n\r";

/// Longest frame accepted from a peer, line ending excluded.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

pub const INVALID_INPUT: &str = "Invalid input provided.";
pub const READ_ONLY_UNSUPPORTED: &str = "Command is not supported in read-only mode.";

/// The command types this contract understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    CreateRecord,
    UpdateRecord,
    ReadRecord,
    DeleteRecord,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::CreateRecord,
        CommandKind::UpdateRecord,
        CommandKind::ReadRecord,
        CommandKind::DeleteRecord,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::CreateRecord => "CREATE_RECORD",
            CommandKind::UpdateRecord => "UPDATE_RECORD",
            CommandKind::ReadRecord => "READ_RECORD",
            CommandKind::DeleteRecord => "DELETE_RECORD",
        }
    }

    /// Maps a wire `type` string to a known kind, `None` for anything else.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded user command.
///
/// `kind` stays a raw string so that unknown command types still decode and
/// can be answered with an error instead of being dropped at the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<Value>,
}

impl Command {
    pub fn new(kind: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            uri: Some(uri.into()),
            record: None,
        }
    }

    pub fn create(uri: impl Into<String>, record: Value) -> Self {
        Self::new(CommandKind::CreateRecord.as_str(), uri).with_record(record)
    }

    pub fn update(uri: impl Into<String>, record: Value) -> Self {
        Self::new(CommandKind::UpdateRecord.as_str(), uri).with_record(record)
    }

    pub fn read(uri: impl Into<String>) -> Self {
        Self::new(CommandKind::ReadRecord.as_str(), uri)
    }

    pub fn delete(uri: impl Into<String>) -> Self {
        Self::new(CommandKind::DeleteRecord.as_str(), uri)
    }

    pub fn with_record(mut self, record: Value) -> Self {
        self.record = Some(record);
        self
    }

    pub fn known_kind(&self) -> Option<CommandKind> {
        CommandKind::parse(&self.kind)
    }

    pub fn decode(buffer: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(buffer)
    }

    pub fn encode(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// The only two shapes a user ever receives back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    DataResult { data: Value },
    Error { error: String },
}

impl Response {
    pub fn data(data: impl Into<Value>) -> Self {
        Response::DataResult { data: data.into() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Response::Error {
            error: error.into(),
        }
    }

    pub fn invalid_input() -> Self {
        Self::error(INVALID_INPUT)
    }
}

/// Reads one newline-delimited frame, skipping blank lines.
///
/// Returns `None` on EOF. The frame is returned without its line ending and
/// without any attempt to parse it. Frames longer than [`MAX_FRAME_BYTES`]
/// fail with [`io::ErrorKind::InvalidData`].
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    read_frame_limited(reader, MAX_FRAME_BYTES).await
}

pub async fn read_frame_limited<R>(reader: &mut R, max_bytes: usize) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    // One byte of headroom for the newline itself.
    let limit = max_bytes as u64 + 1;
    let mut line = Vec::new();
    loop {
        line.clear();
        let bytes = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut line)
            .await?;
        if bytes == 0 {
            return Ok(None);
        }
        if bytes as u64 == limit && line.last() != Some(&b'\n') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("frame exceeds {max_bytes} bytes"),
            ));
        }

        while line.last().is_some_and(|byte| LINE_ENDINGS.contains(byte)) {
            line.pop();
        }
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        return Ok(Some(line));
    }
}

pub async fn read_message<R, T>(reader: &mut R) -> io::Result<Option<T>>
where
    R: AsyncBufRead + Unpin,
    T: DeserializeOwned,
{
    match read_frame(reader).await? {
        Some(frame) => serde_json::from_slice(&frame).map(Some).map_err(to_io_error),
        None => Ok(None),
    }
}

pub async fn write_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut encoded = serde_json::to_vec(message).map_err(to_io_error)?;
    encoded.push(b'\n');
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}

fn to_io_error(err: serde_json::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}
