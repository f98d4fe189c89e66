//! Row-wise record (de)serialization.
//!
//! These functions handle one entry type at a time over a buffer of
//! back-to-back fixed-size records. They are meant for ad hoc inspection and
//! for building synthetic logs; bulk analysis goes through
//! [`crate::columnar`].

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use tracing::warn;

use crate::entry::{EntryTypeSchema, ScalarType, WireFormat};
use crate::error::{LogError, Result};

/// A decoded field value.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bytes(Vec<u8>),
    List(Vec<FieldValue>),
}

impl FieldValue {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            FieldValue::Unsigned(v) => Some(*v),
            FieldValue::Signed(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Signed(v) => Some(*v),
            FieldValue::Unsigned(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Unsigned(v) => Some(*v as f64),
            FieldValue::Signed(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            FieldValue::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {$(
        impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Unsigned(u64::from(v))
            }
        }
    )*};
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {$(
        impl From<$t> for FieldValue {
            fn from(v: $t) -> Self {
                FieldValue::Signed(i64::from(v))
            }
        }
    )*};
}

impl_from_unsigned!(u8, u16, u32, u64);
impl_from_signed!(i8, i16, i32, i64);

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<Vec<u8>> for FieldValue {
    fn from(v: Vec<u8>) -> Self {
        FieldValue::Bytes(v)
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        FieldValue::Bytes(v.to_vec())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(v) => write!(f, "{v}"),
            FieldValue::Signed(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Bytes(b) => {
                for byte in b {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
            FieldValue::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
        }
    }
}

/// Ordered field-value mapping for one record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, FieldValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Record::set`].
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a field, replacing an existing value in place.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (name, value) in iter {
            record.set(&name, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

fn read_scalar(t: ScalarType, bytes: &[u8]) -> FieldValue {
    match t {
        ScalarType::U8 => FieldValue::Unsigned(u64::from(bytes[0])),
        ScalarType::I8 => FieldValue::Signed(i64::from(bytes[0] as i8)),
        ScalarType::U16 => FieldValue::Unsigned(u64::from(LittleEndian::read_u16(bytes))),
        ScalarType::I16 => FieldValue::Signed(i64::from(LittleEndian::read_i16(bytes))),
        ScalarType::U32 => FieldValue::Unsigned(u64::from(LittleEndian::read_u32(bytes))),
        ScalarType::I32 => FieldValue::Signed(i64::from(LittleEndian::read_i32(bytes))),
        ScalarType::U64 => FieldValue::Unsigned(LittleEndian::read_u64(bytes)),
        ScalarType::I64 => FieldValue::Signed(LittleEndian::read_i64(bytes)),
        ScalarType::F32 => FieldValue::Float(f64::from(LittleEndian::read_f32(bytes))),
        ScalarType::F64 => FieldValue::Float(LittleEndian::read_f64(bytes)),
    }
}

/// Write one scalar. Integers are truncated to the field width.
fn write_scalar(t: ScalarType, value: Option<&FieldValue>, out: &mut [u8]) -> bool {
    let (bits, float) = match value {
        None => (0u64, 0f64),
        Some(FieldValue::Unsigned(v)) => (*v, *v as f64),
        Some(FieldValue::Signed(v)) => (*v as u64, *v as f64),
        Some(FieldValue::Float(v)) => (*v as i64 as u64, *v),
        Some(_) => return false,
    };
    match t {
        ScalarType::U8 | ScalarType::I8 => out[0] = bits as u8,
        ScalarType::U16 | ScalarType::I16 => LittleEndian::write_u16(out, bits as u16),
        ScalarType::U32 | ScalarType::I32 => LittleEndian::write_u32(out, bits as u32),
        ScalarType::U64 | ScalarType::I64 => LittleEndian::write_u64(out, bits),
        ScalarType::F32 => LittleEndian::write_f32(out, float as f32),
        ScalarType::F64 => LittleEndian::write_f64(out, float),
    }
    true
}

fn unpack(schema: &EntryTypeSchema, bytes: &[u8]) -> Record {
    let mut fields = Vec::with_capacity(schema.fields().len());
    let mut pos = 0;
    for field in schema.fields() {
        let size = field.wire_format.size();
        let raw = &bytes[pos..pos + size];
        pos += size;
        let value = match &field.wire_format {
            WireFormat::Pad(_) => continue,
            WireFormat::Scalar(t) => read_scalar(*t, raw),
            WireFormat::Bytes(_) => FieldValue::Bytes(raw.to_vec()),
            WireFormat::Repeated { elem, .. } => FieldValue::List(
                raw.chunks_exact(elem.size())
                    .map(|chunk| read_scalar(*elem, chunk))
                    .collect(),
            ),
        };
        fields.push((field.name.clone(), value));
    }
    Record { fields }
}

/// Unpack `buffer` as back-to-back records of `schema`.
///
/// A trailing slice shorter than one record is logged and skipped. A schema
/// with a zero record size cannot frame anything and is an error.
pub fn deserialize(schema: &EntryTypeSchema, buffer: &[u8]) -> Result<Vec<Record>> {
    let size = schema.packed_record_size();
    if size == 0 {
        return Err(LogError::shape(schema.name(), "record size is zero"));
    }

    let mut records = Vec::with_capacity(buffer.len() / size);
    for chunk in buffer.chunks(size) {
        if chunk.len() < size {
            warn!(
                "Skipping truncated '{}' record: {} of {} bytes",
                schema.name(),
                chunk.len(),
                size
            );
            continue;
        }
        records.push(unpack(schema, chunk));
    }
    Ok(records)
}

/// Unpack the single records of `schema` whose payloads start at `offsets`.
pub fn deserialize_at(
    schema: &EntryTypeSchema,
    buffer: &[u8],
    offsets: &[usize],
) -> Result<Vec<Record>> {
    let size = schema.packed_record_size();
    if size == 0 {
        return Err(LogError::shape(schema.name(), "record size is zero"));
    }

    let mut records = Vec::with_capacity(offsets.len());
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
        match buffer.get(offset..offset + size) {
            Some(bytes) => records.push(unpack(schema, bytes)),
            None => warn!(
                "Skipping truncated '{}' record at offset {}",
                schema.name(),
                offset
            ),
        }
    }
    Ok(records)
}

fn pack(schema: &EntryTypeSchema, record: &Record, out: &mut Vec<u8>) {
    let start = out.len();
    out.resize(start + schema.packed_record_size(), 0);
    let mut pos = start;

    for field in schema.fields() {
        let size = field.wire_format.size();
        let slot = &mut out[pos..pos + size];
        pos += size;

        // Padding stays zero; absent fields are zero-filled.
        if field.is_padding() {
            continue;
        }
        let Some(value) = record.get(&field.name) else {
            continue;
        };

        let written = match (&field.wire_format, value) {
            (WireFormat::Scalar(t), v) => write_scalar(*t, Some(v), slot),
            (WireFormat::Bytes(_), FieldValue::Bytes(b)) => {
                let n = b.len().min(size);
                slot[..n].copy_from_slice(&b[..n]);
                true
            }
            (WireFormat::Repeated { elem, .. }, FieldValue::List(values)) => {
                for (i, chunk) in slot.chunks_exact_mut(elem.size()).enumerate() {
                    write_scalar(*elem, values.get(i), chunk);
                }
                true
            }
            (WireFormat::Repeated { elem, .. }, FieldValue::Bytes(b))
                if *elem == ScalarType::U8 =>
            {
                let n = b.len().min(size);
                slot[..n].copy_from_slice(&b[..n]);
                true
            }
            _ => false,
        };
        if !written {
            warn!(
                "Value for '{}.{}' does not fit wire format {}, zero-filled",
                schema.name(),
                field.name,
                field.wire_format
            );
        }
    }

    if pos - start != schema.packed_record_size() {
        warn!(
            "Packed {} bytes for '{}', expected {}",
            pos - start,
            schema.name(),
            schema.packed_record_size()
        );
    }
}

/// Pack records of `schema` back to back. Fields missing from a record are
/// written as zero.
pub fn serialize<'a>(
    schema: &EntryTypeSchema,
    records: impl IntoIterator<Item = &'a Record>,
) -> Vec<u8> {
    let mut out = Vec::new();
    for record in records {
        pack(schema, record, &mut out);
    }
    out
}

/// Pack a single record.
pub fn serialize_one(schema: &EntryTypeSchema, record: &Record) -> Vec<u8> {
    serialize(schema, std::iter::once(record))
}
