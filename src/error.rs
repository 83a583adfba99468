use std::io;
use thiserror::Error;

/// Stored checksum disagrees with the one recomputed over the page bytes.
///
/// Non-fatal by default: the decoder still returns every record and hands
/// this back alongside them.  See [`crate::decode::ChecksumPolicy`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("checksum mismatch: file stores {stored:#010x}, page bytes sum to {computed:#010x}")]
pub struct ChecksumWarning {
    pub stored:   u32,
    pub computed: u32,
}

#[derive(Error, Debug)]
pub enum BinaryCookiesError {
    /// Malformed or truncated binary input.  `offset` is absolute within the
    /// buffer handed to the decoder.
    #[error("Format error at byte {offset}: {reason}")]
    Format { offset: usize, reason: String },
    /// Only raised under [`crate::decode::ChecksumPolicy::Strict`].
    #[error("{0}")]
    Checksum(ChecksumWarning),
    /// A caller-supplied record failed a field constraint.
    #[error("Validation error in `{field}`: {reason}")]
    Validation { field: String, reason: String },
    /// Encode was handed a container shape it does not accept.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BinaryCookiesError {
    pub(crate) fn format(offset: usize, reason: impl Into<String>) -> Self {
        Self::Format { offset, reason: reason.into() }
    }

    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), reason: reason.into() }
    }

    /// Byte offset for format errors, `None` otherwise.
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Format { offset, .. } => Some(*offset),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BinaryCookiesError>;
