//! Post-decode hooks that add virtual fields to columnar batches.
//!
//! A hook runs after the base columns of a batch have been decoded and may
//! append derived columns computed from them. Hooks are attached to a schema
//! and run in registration order.

use std::sync::Arc;

use arrow::array::{Array, ArrayRef, FixedSizeBinaryArray, RecordBatch, UInt64Array, UInt64Builder};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Field, FieldRef, Schema};

use crate::error::Result;

/// Documentation for one virtual field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualFieldDoc {
    pub name: String,
    pub semantic_type: String,
    pub doc: String,
}

impl VirtualFieldDoc {
    pub fn new(name: &str, semantic_type: &str, doc: &str) -> Self {
        Self {
            name: name.to_string(),
            semantic_type: semantic_type.to_string(),
            doc: doc.to_string(),
        }
    }
}

/// Static documentation a hook contributes to its schema's docs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HookDocs {
    pub description: String,
    pub fields: Vec<VirtualFieldDoc>,
}

pub trait PostDecodeHook: Send + Sync {
    /// Short identifier used in diagnostics.
    fn name(&self) -> &str;

    /// Compute derived columns for `batch`, returning the extended batch.
    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch>;

    /// Documentation for the fields this hook adds. Hooks that cannot describe
    /// themselves return `None` and are left out of generated docs.
    fn docs(&self) -> Option<HookDocs> {
        None
    }
}

/// A nullable `UInt64` column named `name`.
fn u64_column(name: &str, mut builder: UInt64Builder) -> (Field, ArrayRef) {
    let array: ArrayRef = Arc::new(builder.finish());
    (Field::new(name, DataType::UInt64, true), array)
}

/// Append `columns` to `batch`, replacing any existing column of the same name.
pub fn with_columns(batch: RecordBatch, columns: Vec<(Field, ArrayRef)>) -> Result<RecordBatch> {
    let schema = batch.schema();
    let mut fields: Vec<FieldRef> = schema.fields().to_vec();
    let mut arrays: Vec<ArrayRef> = batch.columns().to_vec();

    for (field, array) in columns {
        match fields.iter().position(|f| f.name() == field.name()) {
            Some(i) => {
                fields[i] = Arc::new(field);
                arrays[i] = array;
            }
            None => {
                fields.push(Arc::new(field));
                arrays.push(array);
            }
        }
    }

    let schema = Schema::new_with_metadata(fields, schema.metadata().clone());
    Ok(RecordBatch::try_new(Arc::new(schema), arrays)?)
}

/// Captured payload length per row, widened to u64. `None` when the batch
/// has no such column.
fn captured_lengths(batch: &RecordBatch, column: &str) -> Result<Option<UInt64Array>> {
    let Some(col) = batch.column_by_name(column) else {
        return Ok(None);
    };
    let widened = cast(col, &DataType::UInt64)?;
    Ok(widened.as_any().downcast_ref::<UInt64Array>().cloned())
}

fn payload_column<'a>(batch: &'a RecordBatch, column: &str) -> Option<&'a FixedSizeBinaryArray> {
    batch
        .column_by_name(column)
        .and_then(|c| c.as_any().downcast_ref::<FixedSizeBinaryArray>())
}

/// Interpret six bytes as a MAC address packed into the low 48 bits.
fn mac_to_u64(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

const MAC_HEADER_LEN: usize = 24;
const LTG_PAYLOAD_LEN: usize = 44;

/// Adds `addr1`, `addr2` and `addr3` decoded from the 802.11 MAC header at the
/// start of `mac_payload`.
#[derive(Clone, Debug, Default)]
pub struct MacHeaderAddresses;

impl PostDecodeHook for MacHeaderAddresses {
    fn name(&self) -> &str {
        "mac_header_addresses"
    }

    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let Some(payload) = payload_column(&batch, "mac_payload") else {
            return Ok(batch);
        };
        if (payload.value_length() as usize) < MAC_HEADER_LEN {
            return Ok(batch);
        }
        let lengths = captured_lengths(&batch, "mac_payload_len")?;

        let rows = batch.num_rows();
        let mut builders = [
            UInt64Builder::with_capacity(rows),
            UInt64Builder::with_capacity(rows),
            UInt64Builder::with_capacity(rows),
        ];
        for row in 0..rows {
            let captured = lengths
                .as_ref()
                .map_or(MAC_HEADER_LEN as u64, |l| l.value(row));
            if captured < MAC_HEADER_LEN as u64 {
                builders.iter_mut().for_each(|b| b.append_null());
                continue;
            }
            let bytes = payload.value(row);
            for (i, builder) in builders.iter_mut().enumerate() {
                let start = 4 + 6 * i;
                builder.append_value(mac_to_u64(&bytes[start..start + 6]));
            }
        }

        let [addr1, addr2, addr3] = builders;
        with_columns(
            batch,
            vec![
                u64_column("addr1", addr1),
                u64_column("addr2", addr2),
                u64_column("addr3", addr3),
            ],
        )
    }

    fn docs(&self) -> Option<HookDocs> {
        Some(HookDocs {
            description: "MAC header address fields decoded from the first 24 bytes of \
                mac_payload. Rows whose captured payload is shorter than a MAC header are null."
                .to_string(),
            fields: vec![
                VirtualFieldDoc::new("addr1", "uint64", "MAC Header Address 1 (receiver)"),
                VirtualFieldDoc::new("addr2", "uint64", "MAC Header Address 2 (transmitter)"),
                VirtualFieldDoc::new("addr3", "uint64", "MAC Header Address 3"),
            ],
        })
    }
}

/// Adds `ltg_uniq_seq` and `ltg_flow_id` for frames generated by a local
/// traffic generator. The LTG payload follows the MAC header and an 8-byte
/// LLC header: a little-endian u64 sequence number, then a u32 LTG id.
#[derive(Clone, Debug, Default)]
pub struct LtgPayloadFields;

impl PostDecodeHook for LtgPayloadFields {
    fn name(&self) -> &str {
        "ltg_payload_fields"
    }

    fn apply(&self, batch: RecordBatch) -> Result<RecordBatch> {
        let Some(payload) = payload_column(&batch, "mac_payload") else {
            return Ok(batch);
        };
        if (payload.value_length() as usize) < LTG_PAYLOAD_LEN {
            return Ok(batch);
        }
        let lengths = captured_lengths(&batch, "mac_payload_len")?;

        let rows = batch.num_rows();
        let mut seq = UInt64Builder::with_capacity(rows);
        let mut flow = UInt64Builder::with_capacity(rows);
        for row in 0..rows {
            let captured = lengths
                .as_ref()
                .map_or(LTG_PAYLOAD_LEN as u64, |l| l.value(row));
            if captured < LTG_PAYLOAD_LEN as u64 {
                seq.append_null();
                flow.append_null();
                continue;
            }
            let bytes = payload.value(row);
            let mut uniq = [0u8; 8];
            uniq.copy_from_slice(&bytes[32..40]);
            let mut ltg_id = [0u8; 4];
            ltg_id.copy_from_slice(&bytes[40..44]);
            let src = mac_to_u64(&bytes[10..16]);

            seq.append_value(u64::from_le_bytes(uniq));
            flow.append_value((src << 16) | u64::from(u32::from_le_bytes(ltg_id) & 0xFFFF));
        }

        with_columns(
            batch,
            vec![
                u64_column("ltg_uniq_seq", seq),
                u64_column("ltg_flow_id", flow),
            ],
        )
    }

    fn docs(&self) -> Option<HookDocs> {
        Some(HookDocs {
            description: "Local traffic generator fields decoded from the LTG payload that follows \
                the MAC and LLC headers."
                .to_string(),
            fields: vec![
                VirtualFieldDoc::new(
                    "ltg_uniq_seq",
                    "uint64",
                    "Unique sequence number for LTG packet",
                ),
                VirtualFieldDoc::new(
                    "ltg_flow_id",
                    "uint64",
                    "LTG flow identifier: transmitter address in bits [63:16], LTG id in bits [15:0]",
                ),
            ],
        })
    }
}
