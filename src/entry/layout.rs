//! Columnar layout compiler.
//!
//! The layout is computed once per schema whenever its fields change. Column
//! byte offsets are the running sum of the *semantic* sizes of the preceding
//! fields, which mirrors how a packed struct of the semantic types would be
//! laid out over one record.

use std::collections::HashMap;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::entry::field::FieldDef;
use crate::entry::format::SemanticType;

/// Placement of one field inside a record for the columnar view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub semantic_type: SemanticType,
    pub byte_offset: usize,
    pub padding: bool,
}

impl ColumnSpec {
    pub fn size(&self) -> usize {
        self.semantic_type.size()
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnarLayout {
    columns: Vec<ColumnSpec>,
    offsets: HashMap<String, usize>,
    record_size: usize,
}

impl ColumnarLayout {
    pub fn compile(fields: &[FieldDef]) -> Self {
        let mut columns = Vec::with_capacity(fields.len());
        let mut offsets = HashMap::with_capacity(fields.len());
        let mut byte_offset = 0;

        for field in fields {
            columns.push(ColumnSpec {
                name: field.name.clone(),
                semantic_type: field.semantic_type.clone(),
                byte_offset,
                padding: field.is_padding(),
            });
            offsets.insert(field.name.clone(), byte_offset);
            byte_offset += field.semantic_type.size();
        }

        Self {
            columns,
            offsets,
            record_size: byte_offset,
        }
    }

    /// Bytes covered by one record in the columnar view.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Every column, padding included, in field order.
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Columns that appear in decoded output.
    pub fn decoded_columns(&self) -> impl Iterator<Item = &ColumnSpec> {
        self.columns.iter().filter(|c| !c.padding)
    }

    pub fn offset_of(&self, name: &str) -> Option<usize> {
        self.offsets.get(name).copied()
    }

    pub fn field_byte_offsets(&self) -> &HashMap<String, usize> {
        &self.offsets
    }

    /// Arrow schema of the base batch built from this layout.
    pub fn arrow_schema(&self) -> SchemaRef {
        let fields: Vec<Field> = self
            .decoded_columns()
            .map(|c| Field::new(&c.name, c.semantic_type.arrow_type(), false))
            .collect();
        Arc::new(Schema::new(fields))
    }
}
