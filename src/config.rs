//! JSON entry type definitions.
//!
//! Custom entry types can be added to a registry from a JSON file:
//!
//! ```json
//! {
//!   "entry_types": [
//!     {
//!       "name": "RX_CUSTOM",
//!       "type_id": 200,
//!       "description": "Reception with an extra tag",
//!       "base": "RX_COMMON_FIELDS",
//!       "fields": [
//!         { "name": "tag", "wire_format": "I", "semantic_type": "uint32", "doc": "User tag" }
//!       ],
//!       "consts": { "tag": { "TAG_NONE": 0 } },
//!       "hooks": ["mac_header_addresses"]
//!     }
//!   ]
//! }
//! ```
//!
//! Entry types are applied in file order, so a later type may use an earlier
//! one as its `base`. Omitting `type_id` defines a virtual base.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::entry::{
    EntryTypeSchema, FieldDef, LtgPayloadFields, MacHeaderAddresses, PostDecodeHook,
    SchemaRegistry,
};

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct EntryTypeConfig {
    pub entry_types: Vec<EntryTypeDef>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct EntryTypeDef {
    pub name: String,
    pub type_id: Option<u16>,
    #[serde(default)]
    pub description: String,
    pub base: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub consts: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(default)]
    pub hooks: Vec<String>,
}

#[derive(Deserialize, Debug)]
#[serde(deny_unknown_fields)]
pub struct FieldConfig {
    pub name: String,
    pub wire_format: String,
    pub semantic_type: String,
    #[serde(default)]
    pub doc: String,
}

/// Look up one of the built-in post-decode hooks by name.
pub fn builtin_hook(name: &str) -> Option<Arc<dyn PostDecodeHook>> {
    match name {
        "mac_header_addresses" => Some(Arc::new(MacHeaderAddresses)),
        "ltg_payload_fields" => Some(Arc::new(LtgPayloadFields)),
        _ => None,
    }
}

fn build_schema(def: &EntryTypeDef, registry: &SchemaRegistry) -> Result<EntryTypeSchema> {
    let mut schema = EntryTypeSchema::new(&def.name, def.type_id)?;
    schema.set_description(def.description.as_str());

    if let Some(base) = &def.base {
        let base_schema = registry
            .get(base)
            .ok_or_else(|| anyhow::anyhow!("Base entry type {} does not exist", base))?;
        schema.extend_from(base_schema)?;
    }

    let fields = def
        .fields
        .iter()
        .map(|f| {
            FieldDef::parse(&f.name, &f.wire_format, &f.semantic_type, &f.doc)
                .with_context(|| format!("Invalid field {} in entry type {}", f.name, def.name))
        })
        .collect::<Result<Vec<_>>>()?;
    schema
        .append_fields(fields)
        .with_context(|| format!("Invalid field layout for entry type {}", def.name))?;

    for (field, consts) in &def.consts {
        if schema.field(field).is_none() {
            Err(anyhow::anyhow!(
                "Constants given for unknown field {} in entry type {}",
                field,
                def.name
            ))?;
        }
        schema.add_constants(field, consts.iter().map(|(k, v)| (k.clone(), *v)));
    }

    for hook in &def.hooks {
        let hook = builtin_hook(hook).ok_or_else(|| anyhow::anyhow!("Unknown hook {}", hook))?;
        schema.add_shared_hook(hook);
    }
    Ok(schema)
}

/// Register every entry type in `buf`, returning how many were added.
pub fn load_entry_types_from_json(buf: &str, registry: &mut SchemaRegistry) -> Result<usize> {
    let config: EntryTypeConfig =
        serde_json::from_str(buf).context("Failed to parse entry type configuration")?;
    for def in &config.entry_types {
        let schema = build_schema(def, registry)?;
        debug!(
            "Loaded entry type {} ({} bytes)",
            schema,
            schema.packed_record_size()
        );
        registry.register(schema);
    }
    Ok(config.entry_types.len())
}

pub fn load_entry_types(path: impl AsRef<Path>, registry: &mut SchemaRegistry) -> Result<usize> {
    let path = path.as_ref();
    let buf = fs::read_to_string(path)
        .with_context(|| format!("Failed to read entry type configuration {}", path.display()))?;
    load_entry_types_from_json(&buf, registry)
        .with_context(|| format!("Failed to load entry types from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_with_base() {
        let mut registry = SchemaRegistry::new();
        let json = r#"{
            "entry_types": [
                { "name": "COMMON", "fields": [
                    { "name": "timestamp", "wire_format": "Q", "semantic_type": "uint64" }
                ], "consts": { "timestamp": { "NEVER": 0 } } },
                { "name": "CUSTOM", "type_id": 200, "base": "COMMON", "fields": [
                    { "name": "tag", "wire_format": "H", "semantic_type": "uint16", "doc": "tag" },
                    { "name": "padding0", "wire_format": "2x", "semantic_type": "2uint8" }
                ], "hooks": ["mac_header_addresses"] }
            ]
        }"#;
        assert_eq!(load_entry_types_from_json(json, &mut registry).unwrap(), 2);

        let custom = registry.get_by_id(200).unwrap();
        assert_eq!(custom.name(), "CUSTOM");
        assert_eq!(custom.packed_record_size(), 12);
        assert_eq!(custom.constant("timestamp", "NEVER"), Some(0));
        assert_eq!(custom.hooks().len(), 1);
        assert!(registry.get("COMMON").unwrap().is_virtual());
    }

    #[test]
    fn test_unknown_base() {
        let mut registry = SchemaRegistry::new();
        let json = r#"{ "entry_types": [ { "name": "X", "type_id": 5, "base": "NOPE" } ] }"#;
        let err = load_entry_types_from_json(json, &mut registry).unwrap_err();
        assert!(err.to_string().contains("NOPE"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let mut registry = SchemaRegistry::new();
        let json = r#"{ "entry_types": [ { "name": "X", "type_id": 5, "size": 4 } ] }"#;
        assert!(load_entry_types_from_json(json, &mut registry).is_err());
    }

    #[test]
    fn test_layout_mismatch_rejected() {
        let mut registry = SchemaRegistry::new();
        let json = r#"{ "entry_types": [ { "name": "X", "type_id": 5, "fields": [
            { "name": "a", "wire_format": "H", "semantic_type": "uint32" }
        ] } ] }"#;
        assert!(load_entry_types_from_json(json, &mut registry).is_err());
    }

    #[test]
    fn test_bad_code_rejected() {
        let mut registry = SchemaRegistry::new();
        let json = r#"{ "entry_types": [ { "name": "X", "type_id": 5, "fields": [
            { "name": "a", "wire_format": "Z", "semantic_type": "uint8" }
        ] } ] }"#;
        let err = load_entry_types_from_json(json, &mut registry).unwrap_err();
        assert!(format!("{err:#}").contains("invalid format code 'Z'"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("types.json");
        fs::write(
            &path,
            r#"{ "entry_types": [ { "name": "PING", "type_id": 90, "fields": [
                { "name": "seq", "wire_format": "I", "semantic_type": "uint32" }
            ] } ] }"#,
        )
        .unwrap();
        let mut registry = SchemaRegistry::new();
        assert_eq!(load_entry_types(&path, &mut registry).unwrap(), 1);
        assert!(load_entry_types(dir.path().join("missing.json"), &mut registry).is_err());
    }
}
