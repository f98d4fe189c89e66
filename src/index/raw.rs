//! Single-pass byte-offset indexer.
//!
//! The indexer walks a buffer of back-to-back `[header][payload]` records and
//! records, per type id, the absolute offset of every payload. A record whose
//! payload runs past the end of the buffer ends the scan without error: the
//! buffer was read while the log was still being written. A header without the
//! delimiter magic is fatal and the scan does not try to resynchronize.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::entry::SchemaRegistry;
use crate::error::Result;
use crate::index::header::{RecordHeader, HEADER_SIZE, NULL_TYPE_ID};

/// Payload offsets keyed by raw type id, each list in ascending order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RawLogIndex {
    entries: HashMap<u16, Vec<usize>>,
}

impl RawLogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_id: u16) -> Option<&[usize]> {
        self.entries.get(&type_id).map(Vec::as_slice)
    }

    /// Type ids present in the index, ascending.
    pub fn type_ids(&self) -> Vec<u16> {
        let mut ids: Vec<u16> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &[usize])> {
        self.entries
            .iter()
            .map(|(id, offsets)| (*id, offsets.as_slice()))
    }

    /// Number of distinct type ids.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Set the offsets for a type id. Offsets are sorted on insertion and
    /// the null type id is ignored.
    pub fn insert(&mut self, type_id: u16, mut offsets: Vec<usize>) {
        if type_id == NULL_TYPE_ID {
            return;
        }
        offsets.sort_unstable();
        self.entries.insert(type_id, offsets);
    }

    pub fn remove(&mut self, type_id: u16) -> Option<Vec<usize>> {
        self.entries.remove(&type_id)
    }

    /// Offset of the payload of the last record in the index.
    pub fn last_offset(&self) -> Option<usize> {
        self.entries
            .values()
            .filter_map(|o| o.last())
            .max()
            .copied()
    }

    /// Fold in the index of a later chunk that was indexed from its own start.
    ///
    /// `base_offset` is the absolute position of that chunk's first byte.
    pub fn merge_from(&mut self, other: RawLogIndex, base_offset: usize) {
        for (type_id, offsets) in other.entries {
            let list = self.entries.entry(type_id).or_default();
            let in_order = match (list.last(), offsets.first()) {
                (Some(last), Some(first)) => *last < first + base_offset,
                _ => true,
            };
            list.extend(offsets.into_iter().map(|o| o + base_offset));
            if !in_order {
                list.sort_unstable();
                list.dedup();
            }
        }
    }

    pub fn into_inner(self) -> HashMap<u16, Vec<usize>> {
        self.entries
    }
}

impl FromIterator<(u16, Vec<usize>)> for RawLogIndex {
    fn from_iter<I: IntoIterator<Item = (u16, Vec<usize>)>>(iter: I) -> Self {
        let mut index = Self::new();
        for (type_id, offsets) in iter {
            index.insert(type_id, offsets);
        }
        index
    }
}

/// Index a whole buffer.
pub fn index(buffer: &[u8]) -> Result<RawLogIndex> {
    index_from(buffer, 0)
}

/// Index a buffer starting at a known record boundary.
///
/// Offsets in the result are absolute positions in `buffer`.
pub fn index_from(buffer: &[u8], start: usize) -> Result<RawLogIndex> {
    let len = buffer.len();
    // Type ids are small in practice, so offsets are collected into a dense
    // per-id table instead of hashing every record.
    let mut slots: Vec<Vec<usize>> = Vec::new();
    let mut offset = start;
    let mut records = 0usize;

    while offset + HEADER_SIZE <= len {
        let header = RecordHeader::read(buffer, offset)?;
        let payload_len = usize::from(header.payload_len);

        offset += HEADER_SIZE;
        if offset + payload_len > len {
            debug!(
                "Record at offset {} needs {} payload bytes, only {} available; stopping",
                offset - HEADER_SIZE,
                payload_len,
                len - offset
            );
            break;
        }

        let slot = usize::from(header.type_id);
        if slot >= slots.len() {
            slots.resize_with(slot + 1, Vec::new);
        }
        slots[slot].push(offset);
        records += 1;
        offset += payload_len;
    }

    let mut entries = HashMap::new();
    for (type_id, offsets) in slots.into_iter().enumerate() {
        if type_id != usize::from(NULL_TYPE_ID) && !offsets.is_empty() {
            entries.insert(type_id as u16, offsets);
        }
    }
    debug!(
        "Indexed {} records ({} types) in {} bytes",
        records,
        entries.len(),
        len.saturating_sub(start)
    );
    Ok(RawLogIndex { entries })
}

/// Where scanning should resume after `index` was built from `buffer`: the
/// header boundary just past the last indexed record. An empty index
/// resumes at 0.
pub fn next_record_offset(buffer: &[u8], index: &RawLogIndex) -> Result<usize> {
    let Some(last) = index.last_offset() else {
        return Ok(0);
    };
    let header = RecordHeader::read_before(buffer, last)?;
    Ok(last + usize::from(header.payload_len))
}

/// Remove records in place: retype each header to the null type and zero its
/// payload. Buffer length and all other offsets are unchanged. Redacting an
/// already redacted record rewrites the same zeros.
///
/// Every header is checked before the first write, so on error the buffer is
/// untouched. Returns the number of records rewritten.
pub fn redact_records(buffer: &mut [u8], offsets: &[usize]) -> Result<usize> {
    let spans = offsets
        .iter()
        .map(|&offset| {
            let header = RecordHeader::read_before(buffer, offset)?;
            let end = (offset + usize::from(header.payload_len)).min(buffer.len());
            Ok((offset, end))
        })
        .collect::<Result<Vec<_>>>()?;

    for (offset, end) in spans {
        RecordHeader::write_type_id(buffer, offset - HEADER_SIZE, NULL_TYPE_ID);
        buffer[offset..end].fill(0);
    }
    Ok(offsets.len())
}

/// Redact every indexed record of the named entry types.
pub fn redact_types(
    buffer: &mut [u8],
    index: &RawLogIndex,
    names: &[&str],
    registry: &SchemaRegistry,
) -> Result<usize> {
    let mut offsets = Vec::new();
    for name in names {
        let Some(type_id) = registry.get(name).and_then(|s| s.type_id()) else {
            warn!(
                "Entry type '{}' is not a stored entry type, nothing redacted",
                name
            );
            continue;
        };
        offsets.extend_from_slice(index.get(type_id).unwrap_or_default());
    }
    offsets.sort_unstable();
    offsets.dedup();
    redact_records(buffer, &offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LogError;

    fn push_record(buf: &mut Vec<u8>, type_id: u16, payload: &[u8]) {
        buf.extend_from_slice(&RecordHeader::new(type_id, payload.len() as u16).to_bytes());
        buf.extend_from_slice(payload);
    }

    /// type 7, type 0, type 7, each with a 4-byte payload.
    fn three_records() -> Vec<u8> {
        let mut buf = Vec::new();
        push_record(&mut buf, 7, &[1, 2, 3, 4]);
        push_record(&mut buf, 0, &[0, 0, 0, 0]);
        push_record(&mut buf, 7, &[5, 6, 7, 8]);
        buf
    }

    #[test]
    fn test_index_skips_null_records() {
        let idx = index(&three_records()).unwrap();
        assert_eq!(idx.get(7), Some(&[8usize, 32usize][..]));
        assert_eq!(idx.get(0), None);
        assert_eq!(idx.total_records(), 2);
    }

    #[test]
    fn test_index_empty_buffer() {
        let idx = index(&[]).unwrap();
        assert!(idx.is_empty());
    }

    #[test]
    fn test_index_partial_header() {
        let mut buf = three_records();
        buf.extend_from_slice(&[0x00, 0x00, 0xED]);
        let idx = index(&buf).unwrap();
        assert_eq!(idx.total_records(), 2);
    }

    #[test]
    fn test_index_partial_payload() {
        let mut buf = three_records();
        push_record(&mut buf, 9, &[1, 2, 3, 4, 5, 6]);
        buf.truncate(buf.len() - 2);
        let idx = index(&buf).unwrap();
        assert_eq!(idx.get(9), None);
        assert_eq!(idx, index(&three_records()).unwrap());
    }

    #[test]
    fn test_index_bad_magic() {
        let mut buf = three_records();
        buf[12 + 2] = 0x11;
        match index(&buf) {
            Err(LogError::FramingCorruption { offset, .. }) => assert_eq!(offset, 12),
            other => panic!("expected framing corruption, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_length_payloads() {
        let mut buf = Vec::new();
        push_record(&mut buf, 3, &[]);
        push_record(&mut buf, 3, &[]);
        let idx = index(&buf).unwrap();
        assert_eq!(idx.get(3), Some(&[8usize, 16usize][..]));
    }

    #[test]
    fn test_index_from_offset() {
        let buf = three_records();
        let idx = index_from(&buf, 24).unwrap();
        assert_eq!(idx.get(7), Some(&[32usize][..]));
    }

    #[test]
    fn test_next_record_offset() {
        let mut buf = three_records();
        let idx = index(&buf).unwrap();
        assert_eq!(next_record_offset(&buf, &idx).unwrap(), buf.len());

        // A growing log: the next chunk is appended and indexed on its own.
        let resume = next_record_offset(&buf, &idx).unwrap();
        push_record(&mut buf, 8, &[9, 9]);
        let chunk = index(&buf[resume..]).unwrap();
        let mut full = idx.clone();
        full.merge_from(chunk, resume);
        assert_eq!(full, index(&buf).unwrap());
    }

    #[test]
    fn test_next_record_offset_empty() {
        assert_eq!(next_record_offset(&[], &RawLogIndex::new()).unwrap(), 0);
    }

    #[test]
    fn test_redact_records() {
        let mut buf = three_records();
        let len = buf.len();
        assert_eq!(redact_records(&mut buf, &[32]).unwrap(), 1);
        assert_eq!(buf.len(), len);
        assert_eq!(&buf[32..36], &[0, 0, 0, 0]);

        let idx = index(&buf).unwrap();
        assert_eq!(idx.get(7), Some(&[8usize][..]));

        // Second pass over the same offset is harmless.
        let before = buf.clone();
        redact_records(&mut buf, &[32]).unwrap();
        assert_eq!(buf, before);
    }

    #[test]
    fn test_redact_bad_offset() {
        let mut buf = three_records();
        assert!(redact_records(&mut buf, &[10]).is_err());
        assert!(redact_records(&mut buf, &[4]).is_err());
    }

    #[test]
    fn test_redact_bad_offset_leaves_buffer_untouched() {
        let mut buf = three_records();
        let before = buf.clone();
        assert!(redact_records(&mut buf, &[8, 32, 3]).is_err());
        assert_eq!(buf, before);
        assert_eq!(index(&buf).unwrap().get(7), Some(&[8usize, 32][..]));
    }

    #[test]
    fn test_redact_types_checks_all_types_first() {
        let mut registry = SchemaRegistry::new();
        registry.create_schema("SEVEN", Some(7)).unwrap();
        registry.create_schema("NINE", Some(9)).unwrap();
        let mut buf = three_records();
        let mut idx = index(&buf).unwrap();
        idx.insert(9, vec![3]);

        let before = buf.clone();
        assert!(redact_types(&mut buf, &idx, &["SEVEN", "NINE"], &registry).is_err());
        assert_eq!(buf, before);

        let names = ["SEVEN", "SEVEN"];
        assert_eq!(redact_types(&mut buf, &idx, &names, &registry).unwrap(), 2);
    }

    #[test]
    fn test_merge_from_out_of_order() {
        let mut a: RawLogIndex = vec![(1, vec![100, 200])].into_iter().collect();
        let b: RawLogIndex = vec![(1, vec![10]), (2, vec![20])].into_iter().collect();
        a.merge_from(b, 0);
        assert_eq!(a.get(1), Some(&[10usize, 100, 200][..]));
        assert_eq!(a.get(2), Some(&[20usize][..]));
    }

    #[test]
    fn test_insert_ignores_null_type() {
        let mut idx = RawLogIndex::new();
        idx.insert(0, vec![1, 2]);
        idx.insert(4, vec![9, 3]);
        assert_eq!(idx.type_ids(), vec![4]);
        assert_eq!(idx.get(4), Some(&[3usize, 9][..]));
        assert_eq!(idx.last_offset(), Some(9));
    }
}
