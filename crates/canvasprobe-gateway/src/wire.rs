use canvasprobe_common::RemoteError;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Response body of a property read: `{ "PropertyValue": "..." }`.
///
/// The payload is always carried as a string (or `null`) and is parsed later
/// according to the property's declared type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyValueEnvelope {
    pub property_value: Option<String>,
}

impl PropertyValueEnvelope {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            property_value: Some(value.into()),
        }
    }

    pub fn from_json(value: JsonValue) -> Result<Self, RemoteError> {
        serde_json::from_value(value).map_err(RemoteError::from)
    }
}

/// Whole-model snapshot returned by `loadModelSnapshot`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ModelSnapshot {
    pub controls: Vec<ControlDescriptor>,
}

impl ModelSnapshot {
    pub fn from_json(value: JsonValue) -> Result<Self, RemoteError> {
        serde_json::from_value(value).map_err(RemoteError::from)
    }

    pub fn from_json_str(text: &str) -> Result<Self, RemoteError> {
        serde_json::from_str(text).map_err(RemoteError::from)
    }

    pub fn control(&self, name: &str) -> Option<&ControlDescriptor> {
        self.controls.iter().find(|c| c.name == name)
    }
}

/// One control as discovered on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ControlDescriptor {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDescriptor>,
}

impl ControlDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    pub fn with_property(
        mut self,
        property_name: impl Into<String>,
        property_type: impl Into<String>,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            property_name: property_name.into(),
            property_type: property_type.into(),
        });
        self
    }
}

/// Property name plus its type descriptor (`s`, `n`, `*[Label1:v]`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertyDescriptor {
    pub property_name: String,
    pub property_type: String,
}
