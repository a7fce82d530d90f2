use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Typed failures returned to the API layer. Every operation surfaces one
/// of these; nothing fails silently.
#[derive(Error, Debug)]
pub enum Error {
    #[error("slot unavailable: {0}")]
    SlotUnavailable(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("cannot {action} while the booking is {status}")]
    InvalidStateTransition {
        action: &'static str,
        status: &'static str,
    },
    #[error("booking is already paid")]
    AlreadyPaid,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("data integrity violation: {0}")]
    Integrity(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    Rocks(#[from] rocksdb::Error),
}
