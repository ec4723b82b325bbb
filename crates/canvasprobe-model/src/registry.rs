//! Per-session control type registry and the composite descriptor grammar.
//!
//! Descriptors come in three forms:
//!
//! | descriptor          | meaning                                              |
//! |---------------------|------------------------------------------------------|
//! | `s`, `n`, `D`, ...  | primitive code (see [`PrimitiveType::code`])         |
//! | `Label1`            | a registered control schema                          |
//! | `*[A:v, B:v]`       | table whose rows have fields `A`, `B` (control types) |
//! | `![Text:s, X:v]`    | record with a primitive field and a control field    |
//!
//! Resolution is all-or-nothing: one unresolvable item fails the whole
//! descriptor, so a partially understood control never reaches the evaluator.

use std::sync::Arc;

use canvasprobe_common::{FormulaType, PrimitiveType, RecordType};
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;

static COMPOSITE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([*!])\[(.*)\]$").expect("composite descriptor regex must compile"));

/// Item code meaning "the field name is a registered control".
const CONTROL_CODE: &str = "v";

/// Deepest composite nesting a descriptor may use before it is treated as unresolvable.
pub const MAX_DESCRIPTOR_DEPTH: usize = 32;

/// Control name → synthesized record type.
///
/// Written only while a model snapshot is being loaded; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: FxHashMap<String, Arc<RecordType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or overwrite) the schema for `name`.
    ///
    /// Names that collide with a primitive code are stored but never win a lookup.
    pub fn add(&mut self, name: impl Into<String>, record: RecordType) -> Arc<RecordType> {
        let name = name.into();
        if PrimitiveType::from_code(&name).is_some() {
            tracing::debug!(name = %name, "control name shadows a primitive type code");
        }
        let record = Arc::new(record);
        self.types.insert(name, Arc::clone(&record));
        record
    }

    pub fn get(&self, name: &str) -> Option<&Arc<RecordType>> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Registered control names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.types.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a primitive code, a registered name, or a composite descriptor.
    ///
    /// Returns `None` when any referenced name is unknown or the descriptor is
    /// malformed. Never panics.
    pub fn try_resolve(&self, descriptor: &str) -> Option<FormulaType> {
        self.resolve_at(descriptor, 0)
    }

    fn resolve_at(&self, descriptor: &str, depth: usize) -> Option<FormulaType> {
        let descriptor = descriptor.trim();
        if let Some(caps) = COMPOSITE.captures(descriptor) {
            if depth >= MAX_DESCRIPTOR_DEPTH {
                return None;
            }
            let marker = caps.get(1)?.as_str();
            let body = caps.get(2)?.as_str();
            let record = Arc::new(self.resolve_items(body, depth + 1)?);
            return Some(if marker == "*" {
                FormulaType::Table(record)
            } else {
                FormulaType::Record(record)
            });
        }
        self.resolve_name(descriptor)
    }

    fn resolve_name(&self, name: &str) -> Option<FormulaType> {
        if let Some(p) = PrimitiveType::from_code(name) {
            return Some(FormulaType::Primitive(p));
        }
        self.types.get(name).cloned().map(FormulaType::Record)
    }

    fn resolve_items(&self, body: &str, depth: usize) -> Option<RecordType> {
        let mut record = RecordType::new();
        if body.trim().is_empty() {
            return Some(record);
        }
        for item in split_top_level(body)? {
            let (name, code) = item.split_once(':')?;
            let (name, code) = (name.trim(), code.trim());
            if name.is_empty() || code.is_empty() {
                return None;
            }
            let ty = if code == CONTROL_CODE {
                FormulaType::Record(Arc::clone(self.types.get(name)?))
            } else {
                self.resolve_at(code, depth)?
            };
            record.add_field(name, ty);
        }
        Some(record)
    }
}

/// Split on commas that are not nested inside brackets. `None` on unbalanced input.
fn split_top_level(body: &str) -> Option<Vec<&str>> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, ch) in body.char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    items.push(&body[start..]);
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label() -> RecordType {
        RecordType::new()
            .with_field("Text", PrimitiveType::String)
            .with_field("Visible", PrimitiveType::Boolean)
    }

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        reg.add("Label1", label());
        reg.add("Button1", RecordType::new().with_field("Text", PrimitiveType::String));
        reg
    }

    #[test]
    fn primitives_resolve_without_registration() {
        let reg = TypeRegistry::new();
        for p in PrimitiveType::ALL {
            assert_eq!(reg.try_resolve(p.code()), Some(FormulaType::Primitive(p)));
        }
    }

    #[test]
    fn primitive_codes_take_precedence() {
        let mut reg = TypeRegistry::new();
        reg.add("s", label());
        assert!(reg.contains("s"));
        assert_eq!(
            reg.try_resolve("s"),
            Some(FormulaType::Primitive(PrimitiveType::String))
        );
    }

    #[test]
    fn table_row_fields_are_the_registered_schemas() {
        let reg = registry();
        let ty = reg.try_resolve("*[Label1:v, Button1:v]").expect("resolves");
        let row = ty.as_table_row().expect("table type");
        assert_eq!(row.len(), 2);
        assert_eq!(
            row.field("Label1"),
            Some(&FormulaType::Record(Arc::new(label())))
        );
        assert!(row.field("Button1").is_some());
    }

    #[test]
    fn record_composite_mixes_primitives_and_controls() {
        let reg = registry();
        let ty = reg.try_resolve("![Caption:s, Inner:v]");
        assert!(ty.is_none(), "Inner is not registered");

        let ty = reg.try_resolve("![Caption:s, Label1:v]").expect("resolves");
        let record = ty.as_record().expect("record type");
        assert_eq!(
            record.field("Caption"),
            Some(&FormulaType::Primitive(PrimitiveType::String))
        );
        assert!(matches!(record.field("Label1"), Some(FormulaType::Record(_))));
    }

    #[test]
    fn empty_composites() {
        let reg = TypeRegistry::new();
        let table = reg.try_resolve("*[]").expect("empty table");
        assert!(table.as_table_row().is_some_and(|r| r.is_empty()));
        let record = reg.try_resolve("![ ]").expect("empty record");
        assert!(record.as_record().is_some_and(|r| r.is_empty()));
    }

    #[test]
    fn one_unknown_name_fails_the_whole_descriptor() {
        let reg = registry();
        assert!(reg.try_resolve("*[Label1:v, Missing:v, Button1:v]").is_none());
        assert!(reg.try_resolve("Missing").is_none());
    }

    #[test]
    fn nested_composites_resolve_recursively() {
        let reg = registry();
        let ty = reg
            .try_resolve("![Items:*[Label1:v], Count:n]")
            .expect("nested composite resolves");
        let record = ty.as_record().unwrap();
        assert!(matches!(record.field("Items"), Some(FormulaType::Table(_))));
        assert_eq!(
            record.field("Count"),
            Some(&FormulaType::Primitive(PrimitiveType::Number))
        );
    }

    #[test]
    fn malformed_descriptors_are_not_found() {
        let reg = registry();
        for bad in ["*[Label1:v", "*[Label1]", "![:s]", "![Text:]", "*[Label1:v,,]", "*[Label1:v]]", ""] {
            assert!(reg.try_resolve(bad).is_none(), "{bad:?} should not resolve");
        }
    }

    fn nested_records(depth: usize) -> String {
        format!("{}s{}", "![a:".repeat(depth), "]".repeat(depth))
    }

    #[test]
    fn nesting_is_bounded() {
        let reg = TypeRegistry::new();
        assert!(reg.try_resolve(&nested_records(MAX_DESCRIPTOR_DEPTH)).is_some());
        assert!(reg.try_resolve(&nested_records(MAX_DESCRIPTOR_DEPTH + 1)).is_none());
        assert!(reg.try_resolve(&nested_records(10_000)).is_none());
    }
}
