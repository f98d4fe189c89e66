//! wlanlog - indexing, filtering and typed decoding of binary WLAN node event logs.
//!
//! A node log is a flat sequence of `[header][payload]` records. Each 8-byte
//! header carries a delimiter magic, an entry type id and the payload length.
//! Decoding a log is three composable stages:
//!
//! 1. [`index`] scans the bytes once and records, per type id, where every
//!    payload starts.
//! 2. [`filter`] keeps, drops or merges entry types and resolves type ids to
//!    schemas from a [`SchemaRegistry`].
//! 3. [`decode`] builds one Arrow `RecordBatch` per entry type, running the
//!    schema's post-decode hooks to add virtual fields.
//!
//! # Modules
//!
//! - [`entry`] - Entry type schemas, the schema registry, hooks and docs
//! - [`catalog`] - The standard node entry types
//! - [`index`] - Raw indexing, redaction, filtering and summaries
//! - [`record`] - Row-wise record (de)serialization
//! - [`columnar`] - Columnar batch building
//! - [`source`] - Memory-mapped and owned log buffers
//! - [`config`] - Custom entry types from JSON
//!
//! # Example
//!
//! ```no_run
//! use wlanlog::{decode, filter, index, IndexFilter, LogSource, SchemaRegistry};
//!
//! let registry = SchemaRegistry::with_standard_types();
//! let log = LogSource::open("node_log.bin").expect("Failed to open log");
//!
//! let raw = index(&log).expect("Failed to index log");
//! // LTG transmissions share the TX_LOW prefix, so they decode as TX_LOW.
//! let filters = IndexFilter::new()
//!     .merge("TX_LOW", ["TX_LOW", "TX_LOW_LTG"])
//!     .include_only(["TX_LOW", "RX_OFDM"]);
//! let filtered = filter(&raw, &registry, &filters).expect("Failed to filter index");
//!
//! for (name, records) in decode(&log, &filtered).expect("Failed to decode log") {
//!     println!("{name}: {} records", records.num_rows());
//! }
//! ```

pub mod catalog;
pub mod columnar;
pub mod config;
pub mod entry;
pub mod error;
pub mod index;
pub mod record;
pub mod source;

pub use columnar::{build_columnar_batch, decode, DecodedRecordSet};
pub use config::{load_entry_types, load_entry_types_from_json};
pub use entry::{EntryTypeSchema, FieldDef, PostDecodeHook, SchemaRegistry};
pub use error::{LogError, Result};
pub use index::{
    filter, index, index_from, next_record_offset, redact_records, redact_types, summarize,
    FilteredLogIndex, IndexFilter, RawLogIndex,
};
pub use record::{FieldValue, Record};
pub use source::LogSource;
