//! Error types for log indexing and decoding.
//!
//! Only fatal conditions are represented here. Recoverable conditions (a
//! truncated trailing record, an unknown name passed to a filter, a field
//! missing from a record being serialized) are absorbed where they happen and
//! reported through `tracing`.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LogError>;

#[derive(Debug, Error)]
pub enum LogError {
    /// A record header did not carry the delimiter magic where one was expected.
    #[error("framing corruption at byte offset {offset}: expected magic 0x{expected:04X}, found 0x{found:04X}")]
    FramingCorruption {
        offset: usize,
        expected: u16,
        found: u16,
    },

    /// A schema definition is internally inconsistent.
    #[error("schema integrity error: {0}")]
    SchemaIntegrity(String),

    /// An index refers to an entry type id that no registered schema carries.
    #[error("entry type id {type_id} is not defined in the schema registry")]
    UnresolvedEntryType { type_id: u16 },

    /// A wire format or semantic type code could not be parsed.
    #[error("invalid format code '{code}': {reason}")]
    InvalidFormat { code: String, reason: String },

    /// The buffer and the schema disagree in a way a truncated tail cannot explain.
    #[error("record shape error for '{schema}': {reason}")]
    RecordShape { schema: String, reason: String },

    #[error(transparent)]
    Arrow(#[from] arrow::error::ArrowError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LogError {
    pub(crate) fn integrity(msg: impl Into<String>) -> Self {
        LogError::SchemaIntegrity(msg.into())
    }

    pub(crate) fn shape(schema: &str, reason: impl Into<String>) -> Self {
        LogError::RecordShape {
            schema: schema.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors caused by the log bytes rather than the schemas.
    #[must_use]
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            LogError::FramingCorruption { .. } | LogError::RecordShape { .. }
        )
    }
}
