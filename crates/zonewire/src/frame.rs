//! # Line Framing
//!
//! Turns one message into one line of bytes and back.
//!
//! ## Invariants
//! - **Self-Delimited**: An encoded frame contains exactly one `\n`, at the end.
//!   Compact JSON escapes newlines inside strings, so a payload can never split.
//! - **Lossless**: `decode(encode(x)) == x` for every defined message.
//! - **Panic Safety**: Decoding returns `Result` on any input.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::message::Request;
use crate::message::Response;

/// Upper bound on one frame, newline excluded.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The line was empty or whitespace only.
    Empty,
    /// The line exceeded `MAX_FRAME_BYTES`.
    TooLarge(usize),
    /// The line was not one of the defined message shapes.
    Malformed(String),
    /// Serialization failed while encoding.
    Encode(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "empty frame"),
            Self::TooLarge(len) => {
                write!(f, "frame of {} bytes exceeds limit of {} bytes", len, MAX_FRAME_BYTES)
            }
            Self::Malformed(msg) => write!(f, "malformed frame: {}", msg),
            Self::Encode(msg) => write!(f, "failed to encode frame: {}", msg),
        }
    }
}

impl std::error::Error for FrameError {}

pub type Result<T> = std::result::Result<T, FrameError>;

pub fn encode_request(request: &Request) -> Result<Vec<u8>> {
    encode_line(request)
}

pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    encode_line(response)
}

/// Decodes one request line. A trailing `\n` or `\r\n` is accepted.
pub fn decode_request(line: &[u8]) -> Result<Request> {
    decode_line(line)
}

/// Decodes one response line. A trailing `\n` or `\r\n` is accepted.
pub fn decode_response(line: &[u8]) -> Result<Response> {
    decode_line(line)
}

/// Best-effort extraction of the workload id from a frame that failed to decode.
///
/// Looks at a top-level `id` and then at `workload.id`. Used to attach an id to
/// protocol errors when the rest of the frame is unusable.
pub fn peek_id(line: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(trim_line(line)).ok()?;
    let id = value
        .get("id")
        .or_else(|| value.get("workload").and_then(|w| w.get("id")))?;
    id.as_str().map(str::to_string)
}

fn encode_line<T: Serialize>(msg: &T) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(msg).map_err(|e| FrameError::Encode(e.to_string()))?;
    if bytes.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(bytes.len()));
    }
    bytes.push(b'\n');
    Ok(bytes)
}

fn decode_line<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    let line = trim_line(line);
    if line.len() > MAX_FRAME_BYTES {
        return Err(FrameError::TooLarge(line.len()));
    }
    if line.iter().all(u8::is_ascii_whitespace) {
        return Err(FrameError::Empty);
    }
    serde_json::from_slice(line).map_err(|e| FrameError::Malformed(e.to_string()))
}

fn trim_line(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
