//! Filtering and merging of log indexes.
//!
//! Filtering always starts by resolving the input into schema-keyed entries.
//! Raw type ids that no schema carries are kept aside; they are dropped by an
//! `include_only` filter and are a fatal error on every other path, since they
//! mean the log holds records of a type this process cannot decode.
//!
//! Operations are applied in a fixed order:
//!
//! 1. `merge`: each target collects the offsets of its sources, sorted
//! 2. `include_only`: keep exactly the requested names (wins over `exclude`)
//! 3. `exclude`: drop the named entries

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::warn;

use crate::entry::{EntryTypeSchema, SchemaRegistry};
use crate::error::{LogError, Result};
use crate::index::raw::RawLogIndex;

/// Offsets of one entry type in a filtered index.
#[derive(Clone, Debug)]
pub struct FilteredEntry {
    pub schema: Arc<EntryTypeSchema>,
    pub offsets: Vec<usize>,
}

/// Payload offsets keyed by resolved entry type.
///
/// Entries are keyed by schema name, which the registry keeps unique.
#[derive(Clone, Debug, Default)]
pub struct FilteredLogIndex {
    entries: BTreeMap<String, FilteredEntry>,
}

impl FilteredLogIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the offsets for a schema, replacing any previous entry of that name.
    pub fn insert(&mut self, schema: Arc<EntryTypeSchema>, offsets: Vec<usize>) {
        self.entries
            .insert(schema.name().to_string(), FilteredEntry { schema, offsets });
    }

    pub fn remove(&mut self, name: &str) -> Option<FilteredEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&FilteredEntry> {
        self.entries.get(name)
    }

    pub fn offsets(&self, name: &str) -> Option<&[usize]> {
        self.entries.get(name).map(|e| e.offsets.as_slice())
    }

    pub fn schema(&self, name: &str) -> Option<&Arc<EntryTypeSchema>> {
        self.entries.get(name).map(|e| &e.schema)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<EntryTypeSchema>, &[usize])> {
        self.entries
            .values()
            .map(|e| (&e.schema, e.offsets.as_slice()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.entries.values().map(|e| e.offsets.len()).sum()
    }
}

/// Two filtered indexes are equal when they hold the same names and offsets.
impl PartialEq for FilteredLogIndex {
    fn eq(&self, other: &Self) -> bool {
        self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((a_name, a), (b_name, b))| a_name == b_name && a.offsets == b.offsets)
    }
}

/// The outcome of translating an index into schema-keyed entries.
#[derive(Debug, Default)]
pub struct Resolved {
    pub entries: FilteredLogIndex,
    /// Offsets whose type id is unknown to the registry.
    pub unresolved: BTreeMap<u16, Vec<usize>>,
}

/// Anything that can be filtered: raw or already filtered indexes.
pub trait ResolveIndex {
    fn resolve(&self, registry: &SchemaRegistry) -> Resolved;
}

impl ResolveIndex for RawLogIndex {
    fn resolve(&self, registry: &SchemaRegistry) -> Resolved {
        let mut resolved = Resolved::default();
        for type_id in self.type_ids() {
            let offsets = self.get(type_id).unwrap_or_default();
            match registry.get_by_id(type_id) {
                // The registry maps each id to the current owner of a name,
                // so no two ids land on the same entry.
                Some(schema) => resolved.entries.insert(schema.clone(), offsets.to_vec()),
                None => {
                    resolved.unresolved.insert(type_id, offsets.to_vec());
                }
            }
        }
        resolved
    }
}

impl ResolveIndex for FilteredLogIndex {
    fn resolve(&self, _registry: &SchemaRegistry) -> Resolved {
        Resolved {
            entries: self.clone(),
            unresolved: BTreeMap::new(),
        }
    }
}

/// Filter arguments. An empty filter only translates type ids to schemas.
#[derive(Clone, Debug, Default)]
pub struct IndexFilter {
    include_only: Option<Vec<String>>,
    exclude: Option<Vec<String>>,
    merge: Vec<(String, Vec<String>)>,
}

impl IndexFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only these entry types. Every requested name that the registry
    /// knows appears in the result, with an empty list if it has no records.
    pub fn include_only<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_only = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Drop these entry types. Ignored when `include_only` is set.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Combine the offsets of `sources` under the registered entry type `target`.
    pub fn merge<I, S>(mut self, target: &str, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.merge.push((
            target.to_string(),
            sources.into_iter().map(Into::into).collect(),
        ));
        self
    }
}

/// Apply `filters` to `index`, producing a schema-keyed index.
///
/// The input is never modified and the result shares no storage with it.
pub fn filter<I>(
    index: &I,
    registry: &SchemaRegistry,
    filters: &IndexFilter,
) -> Result<FilteredLogIndex>
where
    I: ResolveIndex + ?Sized,
{
    let Resolved {
        mut entries,
        unresolved,
    } = index.resolve(registry);

    for (target, sources) in &filters.merge {
        let schema = registry.get(target).cloned().ok_or_else(|| {
            LogError::integrity(format!(
                "merge target '{target}' is not a registered entry type"
            ))
        })?;

        let mut merged = Vec::new();
        for source in sources {
            match entries.offsets(source) {
                Some(offsets) => merged.extend_from_slice(offsets),
                None => warn!(
                    "Merge source '{}' for '{}' not found in index, skipping",
                    source, target
                ),
            }
        }
        // Sources interleave in time, so the union is re-sorted.
        merged.sort_unstable();
        merged.dedup();
        // An existing entry for the target, e.g. from its own raw type id,
        // is replaced so those records are not counted twice.
        entries.insert(schema, merged);
    }

    if let Some(names) = &filters.include_only {
        let mut included = FilteredLogIndex::new();
        for name in names {
            if let Some(entry) = entries.get(name) {
                included.insert(entry.schema.clone(), entry.offsets.clone());
            } else if let Some(schema) = registry.get(name) {
                included.insert(schema.clone(), Vec::new());
            } else {
                warn!("Unknown entry type '{}' in include_only, dropped", name);
            }
        }
        return Ok(included);
    }

    if let Some(names) = &filters.exclude {
        for name in names {
            if entries.remove(name).is_none() {
                warn!("Entry type '{}' not in index, nothing to exclude", name);
            }
        }
    }

    if let Some((&type_id, _)) = unresolved.iter().next() {
        return Err(LogError::UnresolvedEntryType { type_id });
    }
    Ok(entries)
}

/// Translate a raw index to schema keys without filtering.
pub fn resolve_index(index: &RawLogIndex, registry: &SchemaRegistry) -> Result<FilteredLogIndex> {
    filter(index, registry, &IndexFilter::new())
}
