//! Item paths: the addressing scheme shared by the control model and the gateway.
//!
//! An [`ItemPath`] names one control, one property of a control, or one row of a
//! repeating container. Paths nest through `parent`, so a label inside the third
//! row of a gallery is addressed as
//!
//! ```text
//! { controlName: "Label1", propertyName: "Text",
//!   parentControl: { controlName: "Gallery1", index: 2, propertyName: "AllItems" } }
//! ```
//!
//! Paths are cheap value objects: they are built fresh for every access and never
//! mutated after construction.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Errors raised while validating an [`ItemPath`].
///
/// Always detected locally, before any remote call is attempted.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AddressError {
    /// A level of the chain has no control name and is not an unnamed row.
    #[error("missing control name at depth {depth}")]
    MissingControlName { depth: usize },
    /// A row level (index set) or a value fetch has no property name.
    #[error("missing property name for `{path}`")]
    MissingPropertyName { path: String },
}

/// Path to a control, a control property, or a row of a repeating container.
///
/// Serializes to the wire form expected by the browser side, where every field is
/// present and absent values are `null` rather than omitted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPath {
    pub control_name: Option<String>,
    pub index: Option<usize>,
    #[serde(rename = "parentControl")]
    pub parent: Option<Box<ItemPath>>,
    pub property_name: Option<String>,
}

impl ItemPath {
    /// Path to a top-level control.
    pub fn root(control_name: impl Into<String>) -> Self {
        Self {
            control_name: Some(control_name.into()),
            ..Self::default()
        }
    }

    /// Path to a top-level control, optionally scoped to one of its properties.
    pub fn build(control_name: impl Into<String>, property_name: Option<&str>) -> Self {
        Self {
            control_name: Some(control_name.into()),
            property_name: property_name.map(str::to_string),
            ..Self::default()
        }
    }

    /// Path to a named control nested under `parent`.
    pub fn child(control_name: impl Into<String>, parent: Option<ItemPath>) -> Self {
        Self {
            control_name: Some(control_name.into()),
            parent: parent.map(Box::new),
            ..Self::default()
        }
    }

    /// Placeholder path for an unnamed row; the row position lives on `container`.
    pub fn row_placeholder(container: ItemPath) -> Self {
        Self {
            parent: Some(Box::new(container)),
            ..Self::default()
        }
    }

    /// Copy of this path scoped to `property_name`.
    pub fn with_property(&self, property_name: impl Into<String>) -> Self {
        Self {
            property_name: Some(property_name.into()),
            ..self.clone()
        }
    }

    /// Copy of this path pointing at row `index` of the container it names.
    pub fn with_index(&self, index: usize) -> Self {
        Self {
            index: Some(index),
            ..self.clone()
        }
    }

    pub fn control_name(&self) -> Option<&str> {
        self.control_name.as_deref()
    }

    pub fn property_name(&self) -> Option<&str> {
        self.property_name.as_deref()
    }

    pub fn parent(&self) -> Option<&ItemPath> {
        self.parent.as_deref()
    }

    /// Number of levels in the chain (a root path has depth 1).
    pub fn depth(&self) -> usize {
        1 + self.parent().map_or(0, ItemPath::depth)
    }

    /// `true` for an unnamed row level sitting directly under an indexed container.
    pub fn is_row_placeholder(&self) -> bool {
        self.control_name.is_none()
            && self.parent().is_some_and(|parent| parent.index.is_some())
    }

    /// Structural validation, recursing through the parent chain.
    ///
    /// - every level needs a non-empty control name, except an unnamed row whose
    ///   parent carries the row index;
    /// - a level with `index` set needs a non-empty property name.
    pub fn validate(&self) -> Result<(), AddressError> {
        self.validate_at(self.depth())
    }

    /// Validation for a value fetch: structurally valid and scoped to a property.
    pub fn validate_for_fetch(&self) -> Result<(), AddressError> {
        self.validate()?;
        if is_blank(self.property_name.as_deref()) {
            return Err(AddressError::MissingPropertyName {
                path: self.to_string(),
            });
        }
        Ok(())
    }

    fn validate_at(&self, depth: usize) -> Result<(), AddressError> {
        if is_blank(self.control_name.as_deref()) && !self.is_row_placeholder() {
            return Err(AddressError::MissingControlName { depth });
        }
        if self.index.is_some() && is_blank(self.property_name.as_deref()) {
            return Err(AddressError::MissingPropertyName {
                path: self.to_string(),
            });
        }
        match self.parent() {
            Some(parent) => parent.validate_at(depth - 1),
            None => Ok(()),
        }
    }

    /// JSON wire form with every field present.
    pub fn to_wire(&self) -> JsonValue {
        serde_json::json!({
            "controlName": self.control_name,
            "index": self.index,
            "parentControl": self.parent().map(ItemPath::to_wire),
            "propertyName": self.property_name,
        })
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

impl fmt::Display for ItemPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if let Some(parent) = self.parent() {
            write!(f, "{parent}")?;
            wrote = true;
        }
        if let Some(name) = self.control_name() {
            if wrote {
                f.write_str(".")?;
            }
            f.write_str(name)?;
            wrote = true;
        }
        if let Some(property) = self.property_name() {
            if wrote {
                f.write_str(".")?;
            }
            f.write_str(property)?;
            wrote = true;
        }
        if let Some(index) = self.index {
            write!(f, "[{index}]")?;
        } else if !wrote {
            f.write_str("<row>")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gallery_row(index: usize) -> ItemPath {
        ItemPath::build("Gallery1", Some("AllItems")).with_index(index)
    }

    #[test]
    fn root_path_has_only_a_control_name() {
        let path = ItemPath::root("Button1");
        assert_eq!(path.control_name(), Some("Button1"));
        assert_eq!(path.index, None);
        assert_eq!(path.property_name(), None);
        assert!(path.parent().is_none());
        assert_eq!(path.depth(), 1);
        path.validate().expect("root path is valid");
    }

    #[test]
    fn with_property_keeps_the_chain() {
        let path = ItemPath::child("Label1", Some(gallery_row(2))).with_property("Text");
        assert_eq!(path.property_name(), Some("Text"));
        assert_eq!(path.parent().and_then(|p| p.index), Some(2));
        assert_eq!(path.to_string(), "Gallery1.AllItems[2].Label1.Text");
        path.validate_for_fetch().expect("valid fetch path");
    }

    #[test]
    fn empty_control_name_is_rejected() {
        let path = ItemPath::build("", Some("Text"));
        assert_eq!(
            path.validate(),
            Err(AddressError::MissingControlName { depth: 1 })
        );
    }

    #[test]
    fn missing_name_in_parent_chain_is_rejected() {
        let parent = ItemPath {
            property_name: Some("Items".into()),
            ..ItemPath::default()
        };
        let path = ItemPath::child("Label1", Some(parent)).with_property("Text");
        assert_eq!(
            path.validate(),
            Err(AddressError::MissingControlName { depth: 1 })
        );
    }

    #[test]
    fn index_without_property_is_rejected() {
        let path = ItemPath::root("Gallery1").with_index(0);
        assert!(matches!(
            path.validate(),
            Err(AddressError::MissingPropertyName { .. })
        ));
    }

    #[test]
    fn fetch_requires_a_property() {
        let path = ItemPath::root("Label1");
        path.validate().expect("structurally fine");
        assert!(matches!(
            path.validate_for_fetch(),
            Err(AddressError::MissingPropertyName { .. })
        ));
    }

    #[test]
    fn unnamed_row_is_valid_under_an_indexed_container() {
        let row = ItemPath::row_placeholder(gallery_row(3));
        assert!(row.is_row_placeholder());
        row.validate().expect("row placeholder is valid");
        assert_eq!(row.to_string(), "Gallery1.AllItems[3]");

        let orphan = ItemPath::row_placeholder(ItemPath::root("Gallery1"));
        assert!(orphan.validate().is_err());
    }

    #[test]
    fn wire_form_keeps_null_fields() {
        let wire = ItemPath::build("Label1", Some("Text")).to_wire();
        assert_eq!(
            wire,
            serde_json::json!({
                "controlName": "Label1",
                "index": null,
                "parentControl": null,
                "propertyName": "Text",
            })
        );
        let serialized = serde_json::to_value(ItemPath::build("Label1", Some("Text")))
            .expect("serializes");
        assert_eq!(serialized, wire);
    }

    fn chain() -> impl proptest::strategy::Strategy<Value = ItemPath> {
        use proptest::prelude::*;
        let level = ("[A-Z][a-z]{1,6}[0-9]", proptest::option::of(0usize..50), "[A-Z][a-z]{2,8}");
        proptest::collection::vec(level, 1..5).prop_map(|levels| {
            levels.into_iter().fold(None, |parent: Option<ItemPath>, (name, index, prop)| {
                let mut path = ItemPath::child(name, parent);
                if let Some(i) = index {
                    path = path.with_property(prop).with_index(i);
                }
                Some(path)
            })
            .unwrap_or_default()
        })
    }

    proptest::proptest! {
        #[test]
        fn named_chains_validate_and_fetch_needs_a_leaf_property(path in chain(), leaf in "[A-Z][a-z]{2,8}") {
            proptest::prop_assert!(path.validate().is_ok());
            proptest::prop_assert_eq!(path.validate_for_fetch().is_ok(), path.property_name().is_some());
            let fetch = path.with_property(leaf);
            proptest::prop_assert!(fetch.validate_for_fetch().is_ok());
            let back: ItemPath = serde_json::from_value(fetch.to_wire()).unwrap();
            proptest::prop_assert_eq!(back, fetch);
        }
    }

    #[test]
    fn nested_wire_form_round_trips() {
        let path = ItemPath::child("Label1", Some(gallery_row(2))).with_property("Text");
        let wire = path.to_wire();
        assert_eq!(wire["parentControl"]["index"], 2);
        assert_eq!(wire["parentControl"]["parentControl"], JsonValue::Null);
        let back: ItemPath = serde_json::from_value(wire).expect("deserializes");
        assert_eq!(back, path);
    }
}
