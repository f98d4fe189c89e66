//! Common test utilities for wlanlog integration tests.

#![allow(dead_code)]

use wlanlog::index::RecordHeader;
use wlanlog::{EntryTypeSchema, Record};

/// Install a subscriber once so `RUST_LOG=debug cargo test` shows diagnostics.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Builds a synthetic node log one record at a time.
#[derive(Default)]
pub struct LogBuilder {
    buf: Vec<u8>,
    sequence: u16,
}

impl LogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record, returning the offset of its payload.
    pub fn raw(&mut self, type_id: u16, payload: &[u8]) -> usize {
        let header = RecordHeader::with_sequence(self.sequence, type_id, payload.len() as u16);
        self.sequence = self.sequence.wrapping_add(1);
        self.buf.extend_from_slice(&header.to_bytes());
        let offset = self.buf.len();
        self.buf.extend_from_slice(payload);
        offset
    }

    /// Append one record of a stored entry type.
    pub fn entry(&mut self, schema: &EntryTypeSchema, record: &Record) -> usize {
        let type_id = schema
            .type_id()
            .expect("virtual entry types are never stored");
        let payload = schema.serialize([record]);
        self.raw(type_id, &payload)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// A 24-byte 802.11 data frame header from `src` to `dst`.
pub fn mac_header(dst: [u8; 6], src: [u8; 6], bssid: [u8; 6]) -> Vec<u8> {
    let mut frame = vec![0u8; 24];
    frame[0] = 0x08;
    frame[4..10].copy_from_slice(&dst);
    frame[10..16].copy_from_slice(&src);
    frame[16..22].copy_from_slice(&bssid);
    frame
}

pub fn mac_to_u64(addr: [u8; 6]) -> u64 {
    addr.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}
