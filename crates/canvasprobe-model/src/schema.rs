use std::collections::BTreeMap;
use std::sync::Arc;

use canvasprobe_common::{FormulaType, PrimitiveType, RecordType};

/// How a field of a control is realized on access.
///
/// Decided once, when the schema is synthesized, from the field's structural
/// type: any record-typed field is treated as a nested control and any
/// table-typed field as a repeating container. A user-defined record property
/// that happens to share that shape is indistinguishable from a nested control.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    /// Fetched from the browser and decoded as the given primitive.
    Leaf(PrimitiveType),
    /// Embedded control or component; descended into without a remote call.
    NestedRecord(Arc<ControlSchema>),
    /// Repeating container; surfaced as a live row collection with this row schema.
    RepeatingTable(Arc<ControlSchema>),
}

/// Synthesized schema of one control or one table row.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlSchema {
    record: Arc<RecordType>,
    fields: BTreeMap<String, FieldKind>,
}

impl ControlSchema {
    pub fn synthesize(record: Arc<RecordType>) -> Arc<ControlSchema> {
        let fields = record
            .fields()
            .map(|(name, ty)| {
                let kind = match ty {
                    FormulaType::Primitive(p) => FieldKind::Leaf(*p),
                    FormulaType::Record(r) => FieldKind::NestedRecord(Self::synthesize(Arc::clone(r))),
                    FormulaType::Table(r) => FieldKind::RepeatingTable(Self::synthesize(Arc::clone(r))),
                };
                (name.to_string(), kind)
            })
            .collect();
        Arc::new(ControlSchema { record, fields })
    }

    /// Structural type exposed to the evaluator.
    pub fn record_type(&self) -> &Arc<RecordType> {
        &self.record
    }

    pub fn field(&self, name: &str) -> Option<&FieldKind> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldKind)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
