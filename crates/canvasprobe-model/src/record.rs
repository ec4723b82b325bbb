use std::any::Any;
use std::fmt;
use std::sync::Arc;

use canvasprobe_common::{
    FormulaType, FormulaValue, ItemPath, PrimitiveType, ProbeError, RecordType, RecordValue,
};
use canvasprobe_gateway::{PollBridge, fetch_property};

use crate::decode::decode_leaf;
use crate::rows::RowCollection;
use crate::schema::{ControlSchema, FieldKind};

/// One on-screen control, one embedded component, or one row of a repeating
/// container.
///
/// Holds no field values. Every leaf read is a fresh round-trip; nested records
/// and row collections are built locally from the schema and the address.
#[derive(Clone)]
pub struct ControlRecord {
    schema: Arc<ControlSchema>,
    /// `None` for unnamed rows.
    name: Option<String>,
    /// Address of the enclosing control or indexed container.
    parent: Option<ItemPath>,
    bridge: Arc<PollBridge>,
}

impl fmt::Debug for ControlRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlRecord")
            .field("path", &self.item_path().to_string())
            .field("fields", &self.schema.len())
            .finish()
    }
}

impl ControlRecord {
    /// Top-level control.
    pub fn root(name: impl Into<String>, schema: Arc<ControlSchema>, bridge: Arc<PollBridge>) -> Self {
        Self {
            schema,
            name: Some(name.into()),
            parent: None,
            bridge,
        }
    }

    /// Unnamed row; `row_path` is the container path with the row index set.
    pub(crate) fn row(row_path: ItemPath, schema: Arc<ControlSchema>, bridge: Arc<PollBridge>) -> Self {
        Self {
            schema,
            name: None,
            parent: Some(row_path),
            bridge,
        }
    }

    fn nested(&self, name: &str, schema: &Arc<ControlSchema>) -> ControlRecord {
        ControlRecord {
            schema: Arc::clone(schema),
            name: Some(name.to_string()),
            parent: Some(self.container_path()),
            bridge: Arc::clone(&self.bridge),
        }
    }

    fn table(&self, name: &str, row_schema: &Arc<ControlSchema>) -> RowCollection {
        RowCollection::new(
            self.property_path(name),
            Arc::clone(row_schema),
            Arc::clone(&self.bridge),
        )
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn schema(&self) -> &Arc<ControlSchema> {
        &self.schema
    }

    pub fn bridge(&self) -> &Arc<PollBridge> {
        &self.bridge
    }

    /// Where this record lives: a named control under its parent, or the
    /// unnamed placeholder below an indexed container.
    pub fn item_path(&self) -> ItemPath {
        match &self.name {
            Some(name) => ItemPath::child(name.clone(), self.parent.clone()),
            None => ItemPath::row_placeholder(self.parent.clone().unwrap_or_default()),
        }
    }

    /// Address of one property of this record.
    pub fn property_path(&self, property: &str) -> ItemPath {
        self.item_path().with_property(property)
    }

    /// Parent for controls nested in this record. A row contributes no level of
    /// its own; its children hang directly off the indexed container.
    fn container_path(&self) -> ItemPath {
        match (&self.name, &self.parent) {
            (None, Some(row)) => row.clone(),
            _ => self.item_path(),
        }
    }

    fn label(&self) -> String {
        self.item_path().to_string()
    }

    fn lookup(&self, name: &str) -> Result<&FieldKind, ProbeError> {
        self.schema
            .field(name)
            .ok_or_else(|| ProbeError::field_not_found(self.label(), name))
    }

    fn leaf(&self, name: &str) -> Result<PrimitiveType, ProbeError> {
        match self.lookup(name)? {
            FieldKind::Leaf(ty) => Ok(*ty),
            FieldKind::NestedRecord(_) => Err(ProbeError::type_mismatch("a leaf property", "Record")),
            FieldKind::RepeatingTable(_) => Err(ProbeError::type_mismatch("a leaf property", "Table")),
        }
    }

    /// Resolve one field.
    ///
    /// Leaves cost exactly one blocking read; nested records and tables cost none.
    pub fn get_field(&self, name: &str) -> Result<FormulaValue, ProbeError> {
        match self.lookup(name)? {
            FieldKind::NestedRecord(schema) => Ok(FormulaValue::Record(Arc::new(self.nested(name, schema)))),
            FieldKind::RepeatingTable(row) => Ok(FormulaValue::Table(Arc::new(self.table(name, row)))),
            FieldKind::Leaf(ty) => {
                let path = self.property_path(name);
                let envelope = self.bridge.read_property(&path)?;
                decode_leaf(envelope.property_value.as_deref(), *ty, &path)
            }
        }
    }

    /// Same as [`get_field`](Self::get_field) but awaits the gateway directly.
    pub async fn get_field_async(&self, name: &str) -> Result<FormulaValue, ProbeError> {
        match self.lookup(name)? {
            FieldKind::NestedRecord(schema) => Ok(FormulaValue::Record(Arc::new(self.nested(name, schema)))),
            FieldKind::RepeatingTable(row) => Ok(FormulaValue::Table(Arc::new(self.table(name, row)))),
            FieldKind::Leaf(ty) => {
                let path = self.property_path(name);
                let envelope = fetch_property(self.bridge.gateway().as_ref(), &path).await?;
                decode_leaf(envelope.property_value.as_deref(), *ty, &path)
            }
        }
    }

    /// Typed access to a nested control.
    pub fn child(&self, name: &str) -> Result<ControlRecord, ProbeError> {
        match self.lookup(name)? {
            FieldKind::NestedRecord(schema) => Ok(self.nested(name, schema)),
            other => Err(ProbeError::type_mismatch("Record", kind_name(other))),
        }
    }

    /// Typed access to a repeating container.
    pub fn rows(&self, name: &str) -> Result<RowCollection, ProbeError> {
        match self.lookup(name)? {
            FieldKind::RepeatingTable(row) => Ok(self.table(name, row)),
            other => Err(ProbeError::type_mismatch("Table", kind_name(other))),
        }
    }

    fn wire_value(&self, name: &str, value: &FormulaValue) -> Result<serde_json::Value, ProbeError> {
        let ty = self.leaf(name)?;
        let fits = value.conforms_to(&FormulaType::Primitive(ty))
            || (ty == PrimitiveType::Hyperlink && matches!(value, FormulaValue::Text(_)));
        if !fits {
            return Err(ProbeError::type_mismatch(ty.to_string(), value.type_name()));
        }
        value.to_wire()
    }

    /// Write a leaf property. Returns what the gateway reported.
    pub fn set_property(&self, name: &str, value: &FormulaValue) -> Result<bool, ProbeError> {
        let wire = self.wire_value(name, value)?;
        self.bridge.set_property(&self.property_path(name), wire)
    }

    pub async fn set_property_async(&self, name: &str, value: &FormulaValue) -> Result<bool, ProbeError> {
        let wire = self.wire_value(name, value)?;
        let path = self.property_path(name);
        path.validate_for_fetch()?;
        Ok(self.bridge.gateway().set_property(&path, wire).await?)
    }

    /// Invoke the control's default action (click, toggle, ...).
    pub fn select(&self) -> Result<bool, ProbeError> {
        self.bridge.select_control(&self.item_path())
    }

    pub async fn select_async(&self) -> Result<bool, ProbeError> {
        let path = self.item_path();
        path.validate()?;
        Ok(self.bridge.gateway().select_control(&path).await?)
    }
}

fn kind_name(kind: &FieldKind) -> &'static str {
    match kind {
        FieldKind::Leaf(_) => "a leaf property",
        FieldKind::NestedRecord(_) => "Record",
        FieldKind::RepeatingTable(_) => "Table",
    }
}

impl RecordValue for ControlRecord {
    fn record_type(&self) -> &RecordType {
        self.schema.record_type()
    }

    fn display_name(&self) -> Option<&str> {
        self.name()
    }

    fn field(&self, name: &str) -> Result<FormulaValue, ProbeError> {
        self.get_field(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
