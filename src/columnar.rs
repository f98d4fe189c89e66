//! Columnar batch builder.
//!
//! Turns the offsets of one entry type into an Arrow [`RecordBatch`] with one
//! column per non-padding field, then runs the schema's post-decode hooks over
//! it. Column values are read at `offset + column.byte_offset` inside each
//! record, using the layout compiled from the semantic types.

use std::collections::{BTreeMap, HashMap};
use std::slice::ChunksExact;
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, FixedSizeBinaryArray, FixedSizeListArray, Int8Array, PrimitiveArray,
    UInt8Array,
};
use arrow::buffer::Buffer;
use arrow::datatypes::{
    ArrowPrimitiveType, Field, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::{RecordBatch, RecordBatchOptions};
use byteorder::{ByteOrder, LittleEndian};
use tracing::{debug, warn};

use crate::entry::{ColumnSpec, EntryTypeSchema, ScalarType, SemanticType};
use crate::error::{LogError, Result};
use crate::index::FilteredLogIndex;

/// Schema metadata key carrying the entry type name.
pub const ENTRY_TYPE_KEY: &str = "wlanlog.entry_type";
/// Schema metadata key carrying the entry type id, when the type has one.
pub const ENTRY_TYPE_ID_KEY: &str = "wlanlog.entry_type_id";

/// Decoded records of one entry type.
#[derive(Clone, Debug)]
pub struct DecodedRecordSet {
    schema: Arc<EntryTypeSchema>,
    batch: RecordBatch,
}

impl DecodedRecordSet {
    pub fn schema(&self) -> &Arc<EntryTypeSchema> {
        &self.schema
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_batch(self) -> RecordBatch {
        self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    /// Column downcast to a concrete array type.
    pub fn column_as<T: Array + 'static>(&self, name: &str) -> Option<&T> {
        self.column(name)?.as_any().downcast_ref::<T>()
    }
}

/// Bytes of one column gathered from every record, back to back.
fn gather(buffer: &[u8], offsets: &[usize], column: &ColumnSpec) -> Vec<u8> {
    let size = column.size();
    let mut raw = Vec::with_capacity(offsets.len() * size);
    for &offset in offsets {
        let start = offset + column.byte_offset;
        raw.extend_from_slice(&buffer[start..start + size]);
    }
    raw
}

fn primitive<T: ArrowPrimitiveType>(
    chunks: ChunksExact<'_, u8>,
    read: fn(&[u8]) -> T::Native,
) -> ArrayRef {
    Arc::new(PrimitiveArray::<T>::from_iter_values(chunks.map(read)))
}

fn scalar_array(elem: ScalarType, raw: &[u8]) -> ArrayRef {
    let chunks = raw.chunks_exact(elem.size());
    match elem {
        ScalarType::U8 => Arc::new(UInt8Array::from_iter_values(raw.iter().copied())),
        ScalarType::I8 => Arc::new(Int8Array::from_iter_values(raw.iter().map(|b| *b as i8))),
        ScalarType::U16 => primitive::<UInt16Type>(chunks, LittleEndian::read_u16),
        ScalarType::I16 => primitive::<Int16Type>(chunks, LittleEndian::read_i16),
        ScalarType::U32 => primitive::<UInt32Type>(chunks, LittleEndian::read_u32),
        ScalarType::I32 => primitive::<Int32Type>(chunks, LittleEndian::read_i32),
        ScalarType::U64 => primitive::<UInt64Type>(chunks, LittleEndian::read_u64),
        ScalarType::I64 => primitive::<Int64Type>(chunks, LittleEndian::read_i64),
        ScalarType::F32 => primitive::<Float32Type>(chunks, LittleEndian::read_f32),
        ScalarType::F64 => primitive::<Float64Type>(chunks, LittleEndian::read_f64),
    }
}

fn column_array(column: &ColumnSpec, raw: Vec<u8>) -> Result<ArrayRef> {
    let width = |n: usize| {
        i32::try_from(n).map_err(|_| LogError::InvalidFormat {
            code: column.semantic_type.to_string(),
            reason: format!("column '{}' is {n} wide", column.name),
        })
    };
    match &column.semantic_type {
        SemanticType::Scalar(elem) => Ok(scalar_array(*elem, &raw)),
        SemanticType::Bytes(n) => {
            let array = FixedSizeBinaryArray::try_new(width(*n)?, Buffer::from_vec(raw), None)?;
            Ok(Arc::new(array))
        }
        SemanticType::Array { elem, shape } => {
            // Innermost dimension wraps the flat values first.
            let mut values = scalar_array(*elem, &raw);
            for dim in shape.iter().rev() {
                let item = Arc::new(Field::new("item", values.data_type().clone(), false));
                let list = FixedSizeListArray::try_new(item, width(*dim)?, values, None)?;
                values = Arc::new(list);
            }
            Ok(values)
        }
    }
}

/// Build the batch for `schema` from the record payloads at `offsets`.
///
/// A record that starts inside the buffer but runs past its end is left out
/// with a warning. An offset past the end of the buffer means the index does
/// not belong to this buffer and is an error.
pub fn build_columnar_batch(
    schema: &Arc<EntryTypeSchema>,
    buffer: &[u8],
    offsets: &[usize],
) -> Result<DecodedRecordSet> {
    let layout = schema.columnar_layout();
    let size = layout.record_size();
    if size == 0 {
        return Err(LogError::shape(schema.name(), "record size is zero"));
    }

    let mut kept = Vec::with_capacity(offsets.len());
    for &offset in offsets {
        if offset > buffer.len() {
            return Err(LogError::shape(
                schema.name(),
                format!(
                    "offset {offset} is past the end of a {} byte buffer",
                    buffer.len()
                ),
            ));
        }
        if offset + size > buffer.len() {
            warn!(
                "Skipping truncated '{}' record at offset {}: needs {} bytes, {} available",
                schema.name(),
                offset,
                size,
                buffer.len() - offset
            );
            continue;
        }
        kept.push(offset);
    }

    let columns = layout
        .decoded_columns()
        .map(|column| column_array(column, gather(buffer, &kept, column)))
        .collect::<Result<Vec<_>>>()?;

    let mut metadata = HashMap::new();
    metadata.insert(ENTRY_TYPE_KEY.to_string(), schema.name().to_string());
    if let Some(type_id) = schema.type_id() {
        metadata.insert(ENTRY_TYPE_ID_KEY.to_string(), type_id.to_string());
    }
    let base = layout.arrow_schema();
    let arrow_schema = Arc::new(base.as_ref().clone().with_metadata(metadata));

    let options = RecordBatchOptions::new().with_row_count(Some(kept.len()));
    let mut batch = RecordBatch::try_new_with_options(arrow_schema, columns, &options)?;

    for hook in schema.hooks() {
        batch = hook.apply(batch)?;
        debug!("Applied hook '{}' to '{}'", hook.name(), schema.name());
    }

    Ok(DecodedRecordSet {
        schema: Arc::clone(schema),
        batch,
    })
}

/// Decode every entry type in a filtered index.
pub fn decode(
    buffer: &[u8],
    index: &FilteredLogIndex,
) -> Result<BTreeMap<String, DecodedRecordSet>> {
    let mut out = BTreeMap::new();
    for (schema, offsets) in index.iter() {
        let set = build_columnar_batch(schema, buffer, offsets)?;
        debug!("Decoded {} '{}' records", set.num_rows(), schema.name());
        out.insert(schema.name().to_string(), set);
    }
    Ok(out)
}
