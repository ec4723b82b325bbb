//! Snapshot loading: turns the controls discovered on the page into registered
//! schemas.
//!
//! A control is registered only once every one of its property descriptors
//! resolves. Loading repeats until no further control can be registered, so a
//! container may reference a control listed after it in the snapshot.
//! Whatever remains is skipped and logged, never surfaced as a failure.

use std::sync::Arc;

use canvasprobe_common::RecordType;
use canvasprobe_gateway::{ControlDescriptor, ModelSnapshot};

use crate::registry::TypeRegistry;
use crate::schema::ControlSchema;

/// A control left out of the model because one of its types is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedControl {
    pub name: String,
    pub property: String,
    pub descriptor: String,
}

/// Outcome of one snapshot load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Names in registration order.
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedControl>,
}

impl LoadReport {
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Schemas produced by a load, in registration order.
pub type LoadedControls = Vec<(String, Arc<ControlSchema>)>;

/// Single writer of the [`TypeRegistry`] during a refresh.
pub struct ModelLoader<'r> {
    registry: &'r mut TypeRegistry,
}

impl<'r> ModelLoader<'r> {
    pub fn new(registry: &'r mut TypeRegistry) -> Self {
        Self { registry }
    }

    pub fn load(&mut self, snapshot: &ModelSnapshot) -> (LoadedControls, LoadReport) {
        let _span = tracing::debug_span!("load_model", controls = snapshot.controls.len()).entered();

        let mut pending: Vec<&ControlDescriptor> = snapshot.controls.iter().collect();
        let mut loaded = Vec::new();
        let mut report = LoadReport::default();

        loop {
            let before = pending.len();
            pending.retain(|control| match resolve(self.registry, control) {
                Ok(record) => {
                    let record = self.registry.add(control.name.clone(), record);
                    loaded.push((control.name.clone(), ControlSchema::synthesize(record)));
                    report.loaded.push(control.name.clone());
                    false
                }
                Err(_) => true,
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for control in pending {
            if let Err(skipped) = resolve(self.registry, control) {
                tracing::warn!(
                    control = %skipped.name,
                    property = %skipped.property,
                    descriptor = %skipped.descriptor,
                    "skipping control with unresolved type"
                );
                report.skipped.push(skipped);
            }
        }

        tracing::info!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            registered = self.registry.len(),
            "model snapshot loaded"
        );
        (loaded, report)
    }
}

/// All properties or nothing; the error names the first one that failed.
fn resolve(registry: &TypeRegistry, control: &ControlDescriptor) -> Result<RecordType, SkippedControl> {
    let mut record = RecordType::new();
    for property in &control.properties {
        match registry.try_resolve(&property.property_type) {
            Some(ty) => record.add_field(property.property_name.clone(), ty),
            None => {
                return Err(SkippedControl {
                    name: control.name.clone(),
                    property: property.property_name.clone(),
                    descriptor: property.property_type.clone(),
                });
            }
        }
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldKind;
    use canvasprobe_common::{FormulaType, PrimitiveType};

    fn snapshot(controls: Vec<ControlDescriptor>) -> ModelSnapshot {
        ModelSnapshot { controls }
    }

    #[test]
    fn forward_references_resolve_on_a_later_pass() {
        let snap = snapshot(vec![
            ControlDescriptor::new("Gallery1").with_property("AllItems", "*[Label1:v]"),
            ControlDescriptor::new("Label1").with_property("Text", "s"),
        ]);
        let mut registry = TypeRegistry::new();
        let (loaded, report) = ModelLoader::new(&mut registry).load(&snap);

        assert!(report.is_complete());
        assert_eq!(report.loaded, vec!["Label1".to_string(), "Gallery1".to_string()]);
        assert_eq!(loaded.len(), 2);
        let gallery = &loaded[1].1;
        assert!(matches!(gallery.field("AllItems"), Some(FieldKind::RepeatingTable(_))));
        assert!(registry.contains("Gallery1"));
    }

    #[test]
    fn unresolvable_controls_are_skipped_whole() {
        let snap = snapshot(vec![
            ControlDescriptor::new("Button1")
                .with_property("Text", "s")
                .with_property("Items", "*[Ghost:v]")
                .with_property("Visible", "b"),
            ControlDescriptor::new("Toggle1").with_property("Value", "b"),
        ]);
        let mut registry = TypeRegistry::new();
        let (loaded, report) = ModelLoader::new(&mut registry).load(&snap);

        assert_eq!(loaded.len(), 1);
        assert_eq!(report.loaded, vec!["Toggle1".to_string()]);
        assert_eq!(
            report.skipped,
            vec![SkippedControl {
                name: "Button1".into(),
                property: "Items".into(),
                descriptor: "*[Ghost:v]".into(),
            }]
        );
        assert!(!registry.contains("Button1"));
    }

    #[test]
    fn earlier_registrations_survive_a_reload() {
        let mut registry = TypeRegistry::new();
        ModelLoader::new(&mut registry).load(&snapshot(vec![
            ControlDescriptor::new("Label1").with_property("Text", "s"),
        ]));
        let (loaded, report) = ModelLoader::new(&mut registry).load(&snapshot(vec![
            ControlDescriptor::new("Gallery1").with_property("AllItems", "*[Label1:v]"),
        ]));
        assert!(report.is_complete());
        assert_eq!(loaded.len(), 1);
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("Label1").and_then(|r| r.field("Text").cloned()),
            Some(FormulaType::Primitive(PrimitiveType::String))
        );
    }

    #[test]
    fn control_without_properties_is_an_empty_record() {
        let mut registry = TypeRegistry::new();
        let (loaded, _) =
            ModelLoader::new(&mut registry).load(&snapshot(vec![ControlDescriptor::new("Screen1")]));
        assert!(loaded[0].1.is_empty());
    }
}
