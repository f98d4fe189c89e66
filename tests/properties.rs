//! Randomized checks of indexer, filter and record codec properties.
//!
//! Each test draws from a fixed-seed `StdRng` so failures are reproducible.

mod common;

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wlanlog::entry::{ScalarType, WireFormat};
use wlanlog::{
    filter, index, redact_records, EntryTypeSchema, FieldValue, IndexFilter, Record,
    SchemaRegistry,
};

use common::LogBuilder;

const ROUNDS: usize = 64;

/// A random log of record types 0..=5, returning the expected index of
/// non-null records.
fn random_log(
    rng: &mut StdRng,
) -> (Vec<u8>, HashMap<u16, Vec<usize>>, Vec<(usize, usize)>) {
    let mut log = LogBuilder::new();
    let mut expected: HashMap<u16, Vec<usize>> = HashMap::new();
    let mut spans = Vec::new();

    for _ in 0..rng.random_range(0..200) {
        let type_id = rng.random_range(0..=5u16);
        let len = rng.random_range(1..64usize);
        let mut payload = vec![0u8; len];
        rng.fill(&mut payload[..]);
        let offset = log.raw(type_id, &payload);
        spans.push((offset, offset + len));
        if type_id != 0 {
            expected.entry(type_id).or_default().push(offset);
        }
    }
    (log.finish(), expected, spans)
}

#[test]
fn test_offsets_increasing_and_in_bounds() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0001);
    for _ in 0..ROUNDS {
        let (buf, expected, _) = random_log(&mut rng);
        let idx = index(&buf).unwrap();

        assert_eq!(idx.type_ids().len(), expected.len());
        for (type_id, offsets) in idx.iter() {
            assert!(offsets.windows(2).all(|w| w[0] < w[1]));
            assert!(offsets.iter().all(|&o| o < buf.len()));
            assert_eq!(offsets, expected[&type_id].as_slice());
        }
    }
}

#[test]
fn test_null_records_never_indexed() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0002);
    for _ in 0..ROUNDS {
        let (buf, expected, spans) = random_log(&mut rng);
        let idx = index(&buf).unwrap();
        let nulls = spans.len() - expected.values().map(Vec::len).sum::<usize>();

        assert_eq!(idx.get(0), None);
        assert_eq!(idx.total_records(), spans.len() - nulls);
    }
}

#[test]
fn test_truncated_tail_matches_last_boundary() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0003);
    for _ in 0..ROUNDS {
        let (buf, _, spans) = random_log(&mut rng);
        if buf.is_empty() {
            continue;
        }
        let cut = rng.random_range(0..buf.len());
        // Last record whose payload fits entirely before the cut.
        let boundary = spans
            .iter()
            .map(|&(_, end)| end)
            .filter(|&end| end <= cut)
            .max()
            .unwrap_or(0);

        let truncated = index(&buf[..cut]).unwrap();
        assert_eq!(truncated, index(&buf[..boundary]).unwrap(), "cut at {cut}");
    }
}

#[test]
fn test_redaction_is_repeatable() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0004);
    for _ in 0..ROUNDS {
        let (mut buf, expected, _) = random_log(&mut rng);
        let Some((&type_id, offsets)) = expected.iter().next() else {
            continue;
        };
        let target = offsets[rng.random_range(0..offsets.len())];

        redact_records(&mut buf, &[target]).unwrap();
        let once = buf.clone();
        let idx = index(&buf).unwrap();
        assert!(!idx.get(type_id).unwrap_or(&[]).contains(&target));

        redact_records(&mut buf, &[target]).unwrap();
        assert_eq!(buf, once);
    }
}

fn random_scalar(rng: &mut StdRng, t: ScalarType) -> FieldValue {
    match t {
        ScalarType::U8 => rng.random::<u8>().into(),
        ScalarType::I8 => rng.random::<i8>().into(),
        ScalarType::U16 => rng.random::<u16>().into(),
        ScalarType::I16 => rng.random::<i16>().into(),
        ScalarType::U32 => rng.random::<u32>().into(),
        ScalarType::I32 => rng.random::<i32>().into(),
        ScalarType::U64 => rng.random::<u64>().into(),
        ScalarType::I64 => rng.random::<i64>().into(),
        ScalarType::F32 => FieldValue::Float(f64::from(rng.random::<f32>())),
        ScalarType::F64 => FieldValue::Float(rng.random::<f64>()),
    }
}

/// A record with a random value for every non-padding field of `schema`.
fn random_record(rng: &mut StdRng, schema: &EntryTypeSchema) -> Record {
    let mut record = Record::new();
    for field in schema.fields() {
        let value = match &field.wire_format {
            WireFormat::Pad(_) => continue,
            WireFormat::Scalar(t) => random_scalar(rng, *t),
            WireFormat::Bytes(n) => {
                let mut bytes = vec![0u8; *n];
                rng.fill(&mut bytes[..]);
                FieldValue::Bytes(bytes)
            }
            WireFormat::Repeated { count, elem } => {
                FieldValue::List((0..*count).map(|_| random_scalar(rng, *elem)).collect())
            }
        };
        record.set(&field.name, value);
    }
    record
}

#[test]
fn test_record_round_trip() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0005);
    let registry = SchemaRegistry::with_standard_types();
    for schema in registry.iter() {
        let records: Vec<Record> = (0..8).map(|_| random_record(&mut rng, schema)).collect();
        let bytes = schema.serialize(&records);
        assert_eq!(bytes.len(), 8 * schema.packed_record_size(), "{schema}");
        assert_eq!(schema.deserialize(&bytes).unwrap(), records, "{schema}");
    }
}

#[test]
fn test_filter_include_only_idempotent() {
    let mut rng = StdRng::seed_from_u64(0x5EED_0006);
    let mut registry = SchemaRegistry::new();
    let names = ["T1", "T2", "T3", "T4", "T5"];
    for (i, name) in names.iter().enumerate() {
        registry.create_schema(name, Some(i as u16 + 1)).unwrap();
    }

    for _ in 0..ROUNDS {
        let (buf, _, _) = random_log(&mut rng);
        let raw = index(&buf).unwrap();
        let chosen: Vec<&str> = names
            .iter()
            .copied()
            .filter(|_| rng.random_bool(0.5))
            .collect();
        let filters = IndexFilter::new().include_only(chosen.clone());

        let once = filter(&raw, &registry, &filters).unwrap();
        let twice = filter(&once, &registry, &filters).unwrap();
        assert_eq!(once, twice);
        assert_eq!(once.len(), chosen.len());

        let excluded =
            filter(&raw, &registry, &IndexFilter::new().exclude(chosen.clone())).unwrap();
        assert!(chosen.iter().all(|name| !excluded.contains(name)));
    }
}
