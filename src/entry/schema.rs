//! Entry type schemas.
//!
//! An [`EntryTypeSchema`] describes one kind of log record: its name, the
//! numeric type id carried in record headers (absent for virtual bases that
//! only group common fields), an ordered field list and the derived layout.
//!
//! The derived layout is recomputed whenever the field list changes. Every
//! change is checked against the layout invariant: the record size summed
//! over wire formats must equal the record size summed over semantic types.
//! A change that would break it is rejected and the schema is left as it was.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::entry::field::FieldDef;
use crate::entry::format::{SemanticType, WireFormat};
use crate::entry::hooks::PostDecodeHook;
use crate::entry::layout::ColumnarLayout;
use crate::error::{LogError, Result};
use crate::record::{self, Record};

/// Named integer constants for one field (e.g. bit flags).
pub type FieldConstants = BTreeMap<String, u64>;

#[derive(Clone)]
pub struct EntryTypeSchema {
    name: String,
    type_id: Option<u16>,
    description: String,
    fields: Vec<FieldDef>,
    consts: BTreeMap<String, FieldConstants>,
    hooks: Vec<Arc<dyn PostDecodeHook>>,
    packed_record_size: usize,
    layout: ColumnarLayout,
}

impl EntryTypeSchema {
    pub fn new(name: &str, type_id: Option<u16>) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(LogError::integrity("entry type name must not be empty"));
        }
        Ok(Self {
            name: name.to_string(),
            type_id,
            description: String::new(),
            fields: Vec::new(),
            consts: BTreeMap::new(),
            hooks: Vec::new(),
            packed_record_size: 0,
            layout: ColumnarLayout::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> Option<u16> {
        self.type_id
    }

    /// Virtual schemas have no type id and never appear in a log.
    pub fn is_virtual(&self) -> bool {
        self.type_id.is_none()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of the fields present in decoded output, in schema order.
    pub fn decoded_field_names(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|f| !f.is_padding())
            .map(|f| f.name.as_str())
    }

    /// Fixed byte length of one record, summed over wire formats.
    pub fn packed_record_size(&self) -> usize {
        self.packed_record_size
    }

    /// Fixed byte length of one record, summed over semantic types.
    pub fn columnar_record_size(&self) -> usize {
        self.layout.record_size()
    }

    pub fn field_byte_offsets(&self) -> &HashMap<String, usize> {
        self.layout.field_byte_offsets()
    }

    pub fn columnar_layout(&self) -> &ColumnarLayout {
        &self.layout
    }

    pub fn consts(&self) -> &BTreeMap<String, FieldConstants> {
        &self.consts
    }

    pub fn hooks(&self) -> &[Arc<dyn PostDecodeHook>] {
        &self.hooks
    }

    /// Append fields after the existing ones. Can be called repeatedly, e.g.
    /// to layer a common-header base before type-specific trailing fields.
    pub fn append_fields(&mut self, fields: impl IntoIterator<Item = FieldDef>) -> Result<()> {
        let mut candidate = self.fields.clone();
        candidate.extend(fields);
        self.apply_fields(candidate)
    }

    /// Copy another schema's fields and constants onto the end of this one.
    pub fn extend_from(&mut self, base: &EntryTypeSchema) -> Result<()> {
        self.append_fields(base.fields.iter().cloned())?;
        for (field, consts) in &base.consts {
            self.consts
                .entry(field.clone())
                .or_default()
                .extend(consts.iter().map(|(k, v)| (k.clone(), *v)));
        }
        Ok(())
    }

    /// Replace the formats (and optionally the doc) of one field in place.
    ///
    /// An unknown field name is logged and ignored.
    pub fn modify_field(
        &mut self,
        name: &str,
        wire_format: WireFormat,
        semantic_type: SemanticType,
        doc: Option<&str>,
    ) -> Result<()> {
        let Some(pos) = self.fields.iter().position(|f| f.name == name) else {
            warn!(
                "Field '{}' not found in entry type '{}', not modified",
                name, self.name
            );
            return Ok(());
        };

        let mut candidate = self.fields.clone();
        let field = &mut candidate[pos];
        field.wire_format = wire_format;
        field.semantic_type = semantic_type;
        if let Some(doc) = doc {
            field.doc = doc.to_string();
        }
        self.apply_fields(candidate)
    }

    pub fn add_constants(&mut self, field: &str, consts: impl IntoIterator<Item = (String, u64)>) {
        self.consts
            .entry(field.to_string())
            .or_default()
            .extend(consts);
    }

    /// Look up a named constant of a field.
    pub fn constant(&self, field: &str, name: &str) -> Option<u64> {
        self.consts.get(field).and_then(|c| c.get(name)).copied()
    }

    pub fn add_post_decode_hook(&mut self, hook: impl PostDecodeHook + 'static) {
        self.hooks.push(Arc::new(hook));
    }

    pub fn add_shared_hook(&mut self, hook: Arc<dyn PostDecodeHook>) {
        self.hooks.push(hook);
    }

    /// Re-check the layout invariant of the current field list.
    pub fn check_layout(&self) -> Result<()> {
        check_sizes(
            &self.name,
            self.packed_record_size,
            self.layout.record_size(),
        )
    }

    /// Unpack zero or more back-to-back records of this type.
    pub fn deserialize(&self, buffer: &[u8]) -> Result<Vec<Record>> {
        record::deserialize(self, buffer)
    }

    /// Pack records of this type, zero-filling absent fields.
    pub fn serialize<'a>(&self, records: impl IntoIterator<Item = &'a Record>) -> Vec<u8> {
        record::serialize(self, records)
    }

    fn apply_fields(&mut self, fields: Vec<FieldDef>) -> Result<()> {
        let mut seen = HashSet::with_capacity(fields.len());
        for field in &fields {
            if field.name.is_empty() {
                return Err(LogError::integrity(format!(
                    "entry type '{}' has a field with an empty name",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(LogError::integrity(format!(
                    "entry type '{}' defines field '{}' more than once",
                    self.name, field.name
                )));
            }
        }

        let packed: usize = fields.iter().map(|f| f.wire_format.size()).sum();
        let layout = ColumnarLayout::compile(&fields);
        check_sizes(&self.name, packed, layout.record_size())?;

        self.fields = fields;
        self.packed_record_size = packed;
        self.layout = layout;
        Ok(())
    }
}

fn check_sizes(name: &str, packed: usize, columnar: usize) -> Result<()> {
    if packed != columnar {
        return Err(LogError::integrity(format!(
            "entry type '{name}': wire formats span {packed} bytes but semantic types span {columnar} bytes"
        )));
    }
    Ok(())
}

impl fmt::Debug for EntryTypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hooks: Vec<&str> = self.hooks.iter().map(|h| h.name()).collect();
        f.debug_struct("EntryTypeSchema")
            .field("name", &self.name)
            .field("type_id", &self.type_id)
            .field("fields", &self.fields.len())
            .field("packed_record_size", &self.packed_record_size)
            .field("hooks", &hooks)
            .finish()
    }
}

impl fmt::Display for EntryTypeSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.type_id {
            Some(id) => write!(f, "{} ({})", self.name, id),
            None => write!(f, "{} (virtual)", self.name),
        }
    }
}
