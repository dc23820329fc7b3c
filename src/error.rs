use rusqlite::Error as DbError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Storage unavailable: {0}")]
    Storage(#[from] DbError),
    #[error("Storage unavailable: connection lock poisoned")]
    StoragePoisoned,
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(#[from] crate::capture::CaptureError),
    #[error("Already voted: {0}")]
    DuplicateVote(String),
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(String),
    #[error("Session {0} has expired, please authenticate again")]
    SessionExpired(crate::logging::SessionId),
}

impl Error {
    /// True iff the backing database could not be used, as opposed to a
    /// refusal or a collaborator failure.
    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::StoragePoisoned)
    }
}
