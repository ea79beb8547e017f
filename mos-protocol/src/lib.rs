//! Wire types and the streaming framer/codec for the MOS v4.0 protocol.
//!
//! This crate has no I/O and no knowledge of sessions or transport; it only
//! turns bytes into [`messages::Message`] values and back.

pub mod codec;
pub mod messages;

pub use codec::{CodecError, CodecResult, Framer, XML_DECLARATION, encode};
pub use messages::{Message, MosMessage};
