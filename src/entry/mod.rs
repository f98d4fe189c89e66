//! Entry type definitions.
//!
//! # Module Organization
//!
//! - [`format`]: Wire format and semantic type codes
//! - [`field`]: Field definitions
//! - [`layout`]: Columnar layout compiled from a field list
//! - [`schema`]: Entry type schemas
//! - [`registry`]: Name/id keyed schema registry
//! - [`hooks`]: Post-decode hooks computing virtual fields
//! - [`docs`]: Wiki and plain-text documentation generation

pub mod docs;
pub mod field;
pub mod format;
pub mod hooks;
pub mod layout;
pub mod registry;
pub mod schema;

pub use field::FieldDef;
pub use format::{ScalarType, SemanticType, WireFormat};
pub use hooks::{HookDocs, LtgPayloadFields, MacHeaderAddresses, PostDecodeHook, VirtualFieldDoc};
pub use layout::{ColumnSpec, ColumnarLayout};
pub use registry::SchemaRegistry;
pub use schema::{EntryTypeSchema, FieldConstants};
