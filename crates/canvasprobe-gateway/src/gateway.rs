use async_trait::async_trait;
use canvasprobe_common::{ItemPath, ProbeError, RemoteError};
use serde_json::Value as JsonValue;

use crate::wire::{ModelSnapshot, PropertyValueEnvelope};

/// Remote operations against the live, browser-hosted application.
///
/// Implementations receive paths that have already been validated and must
/// send them in their wire form ([`ItemPath::to_wire`]), keeping absent fields
/// as explicit `null`s.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Read one property. Expected response: `{ "PropertyValue": string | null }`.
    async fn read_property(&self, path: &ItemPath) -> Result<JsonValue, RemoteError>;

    /// Current number of rows in the repeating container `path` points at.
    async fn item_count(&self, path: &ItemPath) -> Result<usize, RemoteError>;

    async fn set_property(&self, path: &ItemPath, value: JsonValue) -> Result<bool, RemoteError>;

    /// Invoke the control's default action.
    async fn select_control(&self, path: &ItemPath) -> Result<bool, RemoteError>;

    /// Expected response: `{ "Controls": [{ "Name", "Properties": [...] }] }`.
    async fn load_model_snapshot(&self) -> Result<JsonValue, RemoteError>;
}

/// Validate `path` and read the property envelope it names.
pub async fn fetch_property(
    gateway: &dyn Gateway,
    path: &ItemPath,
) -> Result<PropertyValueEnvelope, ProbeError> {
    path.validate_for_fetch()?;
    let raw = gateway.read_property(path).await?;
    Ok(PropertyValueEnvelope::from_json(raw)?)
}

/// Validate `path` and query the live row count of the container it names.
pub async fn fetch_item_count(gateway: &dyn Gateway, path: &ItemPath) -> Result<usize, ProbeError> {
    path.validate_for_fetch()?;
    Ok(gateway.item_count(path).await?)
}

pub async fn fetch_snapshot(gateway: &dyn Gateway) -> Result<ModelSnapshot, ProbeError> {
    let raw = gateway.load_model_snapshot().await?;
    Ok(ModelSnapshot::from_json(raw)?)
}
