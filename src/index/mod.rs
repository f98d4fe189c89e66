//! Raw log indexing and index filtering.
//!
//! # Module Organization
//!
//! - [`header`]: The fixed 8-byte record header
//! - [`raw`]: Byte-offset indexer, resume offsets and in-place redaction
//! - [`filter`]: Include/exclude/merge filtering into schema-keyed indexes
//! - [`summary`]: Per-type record counts

pub mod filter;
pub mod header;
pub mod raw;
pub mod summary;

pub use filter::{filter, resolve_index, FilteredEntry, FilteredLogIndex, IndexFilter, ResolveIndex};
pub use header::{RecordHeader, DELIMITER_MAGIC, HEADER_SIZE, NULL_TYPE_ID};
pub use raw::{index, index_from, next_record_offset, redact_records, redact_types, RawLogIndex};
pub use summary::{summarize, summarize_raw, LogSummary, SummaryRow};
