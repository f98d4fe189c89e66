use crate::entry::format::{SemanticType, WireFormat};
use crate::error::Result;

/// One field of an entry type.
///
/// # Fields
/// - `name`: Unique within its schema
/// - `wire_format`: Layout used when unpacking a single record
/// - `semantic_type`: Layout used for the columnar view
/// - `doc`: Human-readable description, may be empty
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub wire_format: WireFormat,
    pub semantic_type: SemanticType,
    pub doc: String,
}

impl FieldDef {
    pub fn new(
        name: impl Into<String>,
        wire_format: WireFormat,
        semantic_type: SemanticType,
        doc: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            wire_format,
            semantic_type,
            doc: doc.into(),
        }
    }

    /// Build a field from its textual codes, e.g. `("chan_est", "256B", "(64,2)i2", "..")`.
    pub fn parse(name: &str, wire_format: &str, semantic_type: &str, doc: &str) -> Result<Self> {
        Ok(Self::new(
            name,
            wire_format.parse()?,
            semantic_type.parse()?,
            doc,
        ))
    }

    pub fn is_padding(&self) -> bool {
        self.wire_format.is_padding()
    }
}

/// Shorthand for the static field tables in the catalog. Panics on a malformed
/// code, so it is only used with literal codes that are covered by tests.
pub(crate) fn fd(name: &str, wire_format: &str, semantic_type: &str, doc: &str) -> FieldDef {
    match FieldDef::parse(name, wire_format, semantic_type, doc) {
        Ok(field) => field,
        Err(e) => panic!("bad built-in field definition '{name}': {e}"),
    }
}
