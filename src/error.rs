use std::string::FromUtf8Error;
use thiserror::Error;

/// Every failure the storage engine can report.
///
/// The `Display` output of each variant is the message a front end shows
/// after "failed to execute statement: ".
#[derive(Debug, Error)]
pub enum Error {
    #[error("duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("table is full")]
    TableFull,

    #[error("page {page} is out of bounds (limit {limit})")]
    OutOfBounds { page: u32, limit: u32 },

    #[error("invalid row: {0}")]
    RowInvalid(String),

    #[error("stored text is not valid utf-8")]
    Utf8(#[from] FromUtf8Error),

    #[error("corrupt node on page {page}: {reason}")]
    CorruptNode { page: u32, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn corrupt(page: u32, reason: impl Into<String>) -> Error {
        Error::CorruptNode {
            page,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
