//! Error taxonomy (spec §7), implemented as a `thiserror`-derived enum in the
//! teacher's idiom of propagating typed errors with `?` rather than strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MosError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("version conflict on {id}: expected version > {expected}, got {got}")]
    VersionConflict { id: String, expected: u64, got: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage failure: {0}")]
    StorageFailure(String),
}

pub type Result<T> = std::result::Result<T, MosError>;

impl MosError {
    /// The `mosAck`/`ncsAck` status string a negative acknowledgment carries
    /// for this error (spec §7: all of these "respond with ... status=ERROR").
    pub fn ack_status(&self) -> &'static str {
        "ERROR"
    }
}
