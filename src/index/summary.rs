//! Per-type record counts for an index.

use std::fmt;

use crate::entry::SchemaRegistry;
use crate::index::filter::FilteredLogIndex;
use crate::index::raw::RawLogIndex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SummaryRow {
    pub name: String,
    pub type_id: Option<u16>,
    pub count: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogSummary {
    pub rows: Vec<SummaryRow>,
}

impl LogSummary {
    pub fn total(&self) -> usize {
        self.rows.iter().map(|r| r.count).sum()
    }

    pub fn count(&self, name: &str) -> Option<usize> {
        self.rows.iter().find(|r| r.name == name).map(|r| r.count)
    }
}

/// Summarize a filtered index, largest entry types first.
pub fn summarize(index: &FilteredLogIndex) -> LogSummary {
    let mut rows: Vec<SummaryRow> = index
        .iter()
        .map(|(schema, offsets)| SummaryRow {
            name: schema.name().to_string(),
            type_id: schema.type_id(),
            count: offsets.len(),
        })
        .collect();
    sort_rows(&mut rows);
    LogSummary { rows }
}

/// Summarize a raw index. Type ids the registry does not know are listed as
/// `UNKNOWN_<id>`.
pub fn summarize_raw(index: &RawLogIndex, registry: &SchemaRegistry) -> LogSummary {
    let mut rows: Vec<SummaryRow> = index
        .iter()
        .map(|(type_id, offsets)| SummaryRow {
            name: registry
                .get_by_id(type_id)
                .map_or_else(|| format!("UNKNOWN_{type_id}"), |s| s.name().to_string()),
            type_id: Some(type_id),
            count: offsets.len(),
        })
        .collect();
    sort_rows(&mut rows);
    LogSummary { rows }
}

fn sort_rows(rows: &mut [SummaryRow]) {
    rows.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
}

impl fmt::Display for LogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .rows
            .iter()
            .map(|r| r.name.len())
            .max()
            .unwrap_or(0)
            .max(10);
        writeln!(f, "{:<width$}  {:>5}  {:>10}", "Entry Type", "ID", "Count")?;
        writeln!(f, "{}", "-".repeat(width + 19))?;
        for row in &self.rows {
            let id = row.type_id.map_or("-".into(), |id| id.to_string());
            writeln!(f, "{:<width$}  {:>5}  {:>10}", row.name, id, row.count)?;
        }
        writeln!(f, "{}", "-".repeat(width + 19))?;
        write!(f, "{:<width$}  {:>5}  {:>10}", "Total", "", self.total())
    }
}
