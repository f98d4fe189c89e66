//! Dual-keyed registry of entry type schemas.
//!
//! Schemas are looked up both by name and by numeric type id. The registry is
//! an ordinary value: build it during setup, then share it read-only with the
//! indexing and decoding stages.
//!
//! # Collisions
//!
//! Registering a schema whose name or type id is already taken logs a warning
//! and repoints that key at the new schema. A schema displaced by name also
//! loses its type id key: every id in the registry resolves to the schema that
//! currently owns that name. The displaced schema object is never modified;
//! anyone holding its `Arc` keeps seeing it unchanged.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::warn;

use crate::entry::schema::EntryTypeSchema;
use crate::error::Result;

#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    // Both key maps point into `slots`, so an entry reached by name and by id
    // is the same allocation.
    slots: Vec<Arc<EntryTypeSchema>>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<u16, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the standard node entry types.
    pub fn with_standard_types() -> Self {
        let mut registry = Self::new();
        crate::catalog::register_standard_types(&mut registry);
        registry
    }

    /// Create and register an empty schema, returning it for field definition.
    pub fn create_schema(
        &mut self,
        name: &str,
        type_id: Option<u16>,
    ) -> Result<&mut EntryTypeSchema> {
        let schema = EntryTypeSchema::new(name, type_id)?;
        let slot = self.insert(schema);
        Ok(Arc::make_mut(&mut self.slots[slot]))
    }

    /// Insert a schema under its name and, when present, its type id.
    pub fn register(&mut self, schema: EntryTypeSchema) -> Arc<EntryTypeSchema> {
        let slot = self.insert(schema);
        self.slots[slot].clone()
    }

    fn insert(&mut self, schema: EntryTypeSchema) -> usize {
        let slot = self.slots.len();
        let name = schema.name().to_string();
        let type_id = schema.type_id();
        self.slots.push(Arc::new(schema));

        if let Some(prev) = self.by_name.insert(name.clone(), slot) {
            warn!(
                "Entry type name '{}' already registered as {}, replacing",
                name, self.slots[prev]
            );
            if let Some(old_id) = self.slots[prev].type_id() {
                if self.by_id.get(&old_id) == Some(&prev) && type_id != Some(old_id) {
                    warn!(
                        "Type id {} no longer resolves: its entry type '{}' was replaced",
                        old_id, name
                    );
                    self.by_id.remove(&old_id);
                }
            }
        }
        if let Some(id) = type_id {
            if let Some(prev) = self.by_id.insert(id, slot) {
                warn!(
                    "Entry type id {} already registered as {}, replacing with '{}'",
                    id, self.slots[prev], name
                );
            }
        }
        slot
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntryTypeSchema>> {
        self.by_name.get(name).map(|&slot| &self.slots[slot])
    }

    pub fn get_by_id(&self, type_id: u16) -> Option<&Arc<EntryTypeSchema>> {
        self.by_id.get(&type_id).map(|&slot| &self.slots[slot])
    }

    /// Mutable access for setup code.
    ///
    /// Copy-on-write: when the schema is already shared (held by an index or
    /// a decoded batch) the registry switches to a private copy, so existing
    /// holders never observe the change.
    pub fn schema_mut(&mut self, name: &str) -> Option<&mut EntryTypeSchema> {
        let slot = *self.by_name.get(name)?;
        Some(Arc::make_mut(&mut self.slots[slot]))
    }

    /// Every schema reachable by name, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<EntryTypeSchema>> {
        let mut slots: Vec<usize> = self.by_name.values().copied().collect();
        slots.sort_by(|a, b| self.slots[*a].name().cmp(self.slots[*b].name()));
        slots.into_iter().map(move |slot| &self.slots[slot])
    }

    /// Schemas reachable by type id, sorted by id.
    pub fn stored_types(&self) -> impl Iterator<Item = &Arc<EntryTypeSchema>> {
        let mut ids: Vec<(u16, usize)> = self.by_id.iter().map(|(id, slot)| (*id, *slot)).collect();
        ids.sort_unstable();
        ids.into_iter().map(move |(_, slot)| &self.slots[slot])
    }

    /// Number of names currently registered.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::field::fd;

    #[test]
    fn test_create_registers_both_keys() {
        let mut registry = SchemaRegistry::new();
        registry
            .create_schema("RX", Some(11))
            .unwrap()
            .append_fields(vec![fd("timestamp", "Q", "uint64", "")])
            .unwrap();

        let by_name = registry.get("RX").unwrap();
        let by_id = registry.get_by_id(11).unwrap();
        assert!(Arc::ptr_eq(by_name, by_id));
        assert_eq!(by_id.packed_record_size(), 8);
    }

    #[test]
    fn test_virtual_registered_by_name_only() {
        let mut registry = SchemaRegistry::new();
        registry.create_schema("COMMON", None).unwrap();
        assert!(registry.get("COMMON").is_some());
        assert_eq!(registry.stored_types().count(), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_name_collision_replaces() {
        let mut registry = SchemaRegistry::new();
        let first = registry.register(EntryTypeSchema::new("TX", Some(20)).unwrap());
        registry.register(EntryTypeSchema::new("TX", Some(21)).unwrap());

        assert_eq!(registry.get("TX").unwrap().type_id(), Some(21));
        assert!(registry.get_by_id(20).is_none());
        assert_eq!(registry.stored_types().count(), 1);
        assert_eq!(registry.len(), 1);
        // Holders of the displaced schema still see it unchanged.
        assert_eq!(first.type_id(), Some(20));
    }

    #[test]
    fn test_name_collision_same_id_keeps_id() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntryTypeSchema::new("TX", Some(20)).unwrap());
        let second = registry.register(EntryTypeSchema::new("TX", Some(20)).unwrap());
        assert!(Arc::ptr_eq(registry.get_by_id(20).unwrap(), &second));
    }

    #[test]
    fn test_name_collision_leaves_reassigned_id() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntryTypeSchema::new("OLD", Some(5)).unwrap());
        registry.register(EntryTypeSchema::new("OTHER", Some(5)).unwrap());
        registry.register(EntryTypeSchema::new("OLD", Some(6)).unwrap());
        // Id 5 was already taken over by OTHER before OLD was replaced.
        assert_eq!(registry.get_by_id(5).unwrap().name(), "OTHER");
        assert_eq!(registry.get_by_id(6).unwrap().name(), "OLD");
    }

    #[test]
    fn test_id_collision_replaces() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntryTypeSchema::new("OLD", Some(5)).unwrap());
        registry.register(EntryTypeSchema::new("NEW", Some(5)).unwrap());
        assert_eq!(registry.get_by_id(5).unwrap().name(), "NEW");
        assert_eq!(registry.get("OLD").unwrap().type_id(), Some(5));
    }

    #[test]
    fn test_schema_mut_is_copy_on_write() {
        let mut registry = SchemaRegistry::new();
        let held = registry.register(EntryTypeSchema::new("RX", Some(11)).unwrap());

        registry
            .schema_mut("RX")
            .unwrap()
            .append_fields(vec![fd("length", "H", "uint16", "")])
            .unwrap();

        assert_eq!(held.fields().len(), 0);
        assert_eq!(registry.get("RX").unwrap().fields().len(), 1);
        assert_eq!(registry.get_by_id(11).unwrap().fields().len(), 1);
    }

    #[test]
    fn test_iteration_order() {
        let mut registry = SchemaRegistry::new();
        registry.register(EntryTypeSchema::new("B", Some(2)).unwrap());
        registry.register(EntryTypeSchema::new("A", Some(9)).unwrap());
        registry.register(EntryTypeSchema::new("C", None).unwrap());

        let names: Vec<&str> = registry.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["A", "B", "C"]);
        let ids: Vec<Option<u16>> = registry.stored_types().map(|s| s.type_id()).collect();
        assert_eq!(ids, vec![Some(2), Some(9)]);
    }
}
