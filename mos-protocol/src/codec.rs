//! Streaming XML framer and typed codec (spec §4.1).
//!
//! The framer is a deliberate byte scanner, not a general XML parser: it
//! locates the root element of one message at a time in a growable buffer.
//! It does not support comments, processing instructions beyond a leading
//! `<?xml ... ?>` declaration, or nested elements sharing the root's name —
//! none of those occur in the message set this codec dispatches.

use crate::messages::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("incomplete XML: buffer does not yet hold a full message")]
    IncompleteXml,
    #[error("malformed XML: {0}")]
    Malformed(String),
    #[error("unknown message type: {0}")]
    UnknownMessage(String),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Standard XML declaration prefixed to every encoded message.
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Locates the bounds of the next complete message in `buf`, skipping any
/// leading whitespace/garbage before the first `<`.
///
/// Returns `(root_name, message_end)` where `message_end` is the index one
/// past the end of the message (i.e. `buf[start..message_end]` is the full
/// element, garbage-stripped on the left).
fn find_message(buf: &[u8]) -> CodecResult<(String, usize, usize)> {
    let start = buf
        .iter()
        .position(|&b| b == b'<')
        .ok_or(CodecError::IncompleteXml)?;

    // Skip a leading `<?xml ... ?>` declaration and look past it.
    let (start, rest) = if buf[start..].starts_with(b"<?") {
        let decl_end = find_subslice(&buf[start..], b"?>").ok_or(CodecError::IncompleteXml)?;
        let after = start + decl_end + 2;
        let next = buf[after..]
            .iter()
            .position(|&b| b == b'<')
            .ok_or(CodecError::IncompleteXml)?;
        (after + next, &buf[after + next..])
    } else {
        (start, &buf[start..])
    };

    let name_end = rest
        .iter()
        .position(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'/' | b'>'))
        .ok_or(CodecError::IncompleteXml)?;
    let name = std::str::from_utf8(&rest[1..name_end])
        .map_err(|e| CodecError::Malformed(e.to_string()))?
        .to_string();

    // Self-closing: `/>` occurring before the opening tag's `>` closes it.
    let open_tag_end = rest
        .iter()
        .position(|&b| b == b'>')
        .ok_or(CodecError::IncompleteXml)?;
    if rest[name_end..=open_tag_end].contains(&b'/')
        && let Some(sc) = find_subslice(rest, b"/>")
        && sc <= open_tag_end
    {
        return Ok((name, start, start + sc + 2));
    }

    let closing = format!("</{name}>");
    match find_subslice(rest, closing.as_bytes()) {
        Some(idx) => Ok((name, start, start + idx + closing.len())),
        None => Err(CodecError::IncompleteXml),
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Per-session streaming framer (spec §4.1's "framer contract").
#[derive(Debug, Default)]
pub struct Framer {
    buf: Vec<u8>,
}

impl Framer {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn has_complete_message(&self) -> bool {
        find_message(&self.buf).is_ok()
    }

    /// Extracts and decodes exactly one leading message, advancing the
    /// buffer past it (and past any leading garbage, per spec).
    ///
    /// On `UnknownMessage`/`Malformed`, the offending frame is still
    /// consumed from the buffer so the caller can continue on the next
    /// `parse()` call — only `IncompleteXml` leaves the buffer untouched.
    pub fn parse(&mut self) -> CodecResult<Message> {
        let (name, start, end) = find_message(&self.buf)?;
        let frame = self.buf[start..end].to_vec();
        self.buf.drain(..end);
        decode(&name, &frame)
    }
}

fn decode(root: &str, frame: &[u8]) -> CodecResult<Message> {
    let text = std::str::from_utf8(frame).map_err(|e| CodecError::Malformed(e.to_string()))?;
    match root {
        "heartbeat" => from_xml(text).map(Message::Heartbeat),
        "roReq" => from_xml(text).map(Message::ReqRunningOrderList),
        "roReqAll" => from_xml(text).map(Message::ReqRunningOrder),
        "roList" => from_xml(text).map(Message::RunningOrderList),
        "roCreate" => from_xml(text).map(Message::RunningOrderInfo),
        "mosAck" => from_xml(text).map(Message::MosAck),
        "ncsReqStoryAction" => from_xml(text).map(Message::NcsReqStoryAction),
        "ncsAck" => from_xml(text).map(Message::NcsAck),
        other => Err(CodecError::UnknownMessage(other.to_string())),
    }
}

fn from_xml<T: serde::de::DeserializeOwned>(text: &str) -> CodecResult<T> {
    quick_xml::de::from_str(text).map_err(|e| CodecError::Malformed(e.to_string()))
}

/// Encodes a message with the standard XML declaration prefix.
pub fn encode<T: serde::Serialize + MosMessage>(message: &T) -> CodecResult<String> {
    let body =
        quick_xml::se::to_string(message).map_err(|e| CodecError::Malformed(e.to_string()))?;
    Ok(format!("{XML_DECLARATION}{body}"))
}
