//! Human-readable documentation for entry types.
//!
//! Two renderings are provided: a wiki table format and a plain-text format.
//! Both list the fields (padding excluded), the named constants, and the
//! virtual fields contributed by post-decode hooks. Hooks that cannot
//! describe themselves are skipped.

use std::fmt;

use tracing::debug;

use crate::entry::hooks::HookDocs;
use crate::entry::registry::SchemaRegistry;
use crate::entry::schema::EntryTypeSchema;

fn hook_docs(schema: &EntryTypeSchema) -> Vec<HookDocs> {
    schema
        .hooks()
        .iter()
        .filter_map(|hook| {
            let docs = hook.docs();
            if docs.is_none() {
                debug!(
                    "Hook '{}' on '{}' provides no documentation",
                    hook.name(),
                    schema.name()
                );
            }
            docs
        })
        .collect()
}

fn write_type_id(f: &mut fmt::Formatter<'_>, schema: &EntryTypeSchema) -> fmt::Result {
    match schema.type_id() {
        Some(id) => writeln!(f, "Entry type ID: {id}"),
        None => writeln!(f, "Virtual entry type (not stored in logs)"),
    }
}

/// Wiki markup for one entry type.
pub struct WikiDoc<'a>(pub &'a EntryTypeSchema);

impl fmt::Display for WikiDoc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.0;
        writeln!(f, "=== Entry Type {} ===", schema.name())?;
        if !schema.description().is_empty() {
            writeln!(f, "{}", schema.description())?;
        }
        writeln!(f)?;
        write_type_id(f, schema)?;
        writeln!(f)?;

        writeln!(f, "||= Field =||= Data Type =||= Description =||")?;
        for field in schema.fields().iter().filter(|field| !field.is_padding()) {
            let (name, ty, doc) = (&field.name, &field.semantic_type, &field.doc);
            writeln!(f, "|| {name} || {ty} || {doc} ||")?;
        }

        for (field, consts) in schema.consts() {
            writeln!(f)?;
            writeln!(f, "Constants defined for field '''{field}''':")?;
            writeln!(f, "||= Name =||= Value =||")?;
            for (name, value) in consts {
                writeln!(f, "|| {name} || 0x{value:X} ||")?;
            }
        }

        for docs in hook_docs(schema) {
            writeln!(f)?;
            writeln!(f, "Virtual fields: {}", docs.description)?;
            writeln!(f, "||= Field =||= Data Type =||= Description =||")?;
            for field in &docs.fields {
                let (name, ty, doc) = (&field.name, &field.semantic_type, &field.doc);
                writeln!(f, "|| {name} || {ty} || {doc} ||")?;
            }
        }
        Ok(())
    }
}

/// Plain-text description of one entry type. Virtual fields added by hooks
/// are marked with `*`.
pub struct TextDoc<'a>(pub &'a EntryTypeSchema);

impl fmt::Display for TextDoc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schema = self.0;
        let mut rows: Vec<(String, String, String)> = schema
            .fields()
            .iter()
            .filter(|field| !field.is_padding())
            .map(|field| {
                let ty = field.semantic_type.to_string();
                (field.name.clone(), ty, field.doc.clone())
            })
            .collect();
        let hooks = hook_docs(schema);
        for docs in &hooks {
            rows.extend(docs.fields.iter().map(|field| {
                let name = format!("{}*", field.name);
                (name, field.semantic_type.clone(), field.doc.clone())
            }));
        }

        let name_width = rows.iter().map(|r| r.0.len()).max().unwrap_or(0).max(5);
        let type_width = rows.iter().map(|r| r.1.len()).max().unwrap_or(0).max(4);

        writeln!(f, "{}", schema.name())?;
        writeln!(f, "{}", "-".repeat(schema.name().len()))?;
        if !schema.description().is_empty() {
            writeln!(f, "{}", schema.description())?;
        }
        write_type_id(f, schema)?;
        writeln!(f, "Record size: {} bytes", schema.packed_record_size())?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<name_width$}  {:<type_width$}  Description",
            "Field", "Type"
        )?;
        for (name, ty, doc) in &rows {
            writeln!(f, "{name:<name_width$}  {ty:<type_width$}  {doc}")?;
        }

        for (field, consts) in schema.consts() {
            writeln!(f)?;
            writeln!(f, "Constants for {field}:")?;
            for (name, value) in consts {
                writeln!(f, "  {name} = 0x{value:X}")?;
            }
        }

        if !hooks.is_empty() {
            writeln!(f)?;
            for docs in &hooks {
                writeln!(f, "* {}", docs.description)?;
            }
        }
        Ok(())
    }
}

pub fn wiki(schema: &EntryTypeSchema) -> String {
    WikiDoc(schema).to_string()
}

pub fn text(schema: &EntryTypeSchema) -> String {
    TextDoc(schema).to_string()
}

/// Wiki documentation for every stored entry type in the registry, by type id.
pub fn wiki_all(registry: &SchemaRegistry) -> String {
    registry
        .stored_types()
        .map(|s| wiki(s))
        .collect::<Vec<_>>()
        .join("\n")
}
