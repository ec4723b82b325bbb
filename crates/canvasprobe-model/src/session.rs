use std::collections::BTreeMap;
use std::sync::Arc;

use canvasprobe_common::{FormulaValue, ProbeError};
use canvasprobe_gateway::{Gateway, ModelSnapshot, PollBridge, fetch_snapshot};
use parking_lot::{RwLock, RwLockReadGuard};
use thiserror::Error;
use tokio::runtime::Handle;

use crate::config::{ConfigError, SessionSettings};
use crate::functions::{ExtensionFunction, FunctionContext, FunctionRegistry};
use crate::loader::{LoadReport, ModelLoader};
use crate::record::ControlRecord;
use crate::registry::TypeRegistry;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Probe(#[from] ProbeError),
}

type ControlMap = BTreeMap<String, ControlRecord>;

/// One test session against one running app.
///
/// Owns the type registry (written only by [`refresh`](Self::refresh)) and the
/// current tree of top-level control records. A refresh builds a new tree and
/// swaps it in whole; records handed out earlier keep working against the
/// schema they were built with.
pub struct AppModel {
    bridge: Arc<PollBridge>,
    settings: SessionSettings,
    registry: RwLock<TypeRegistry>,
    controls: RwLock<Arc<ControlMap>>,
    functions: FunctionRegistry,
}

impl std::fmt::Debug for AppModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppModel")
            .field("settings", &self.settings)
            .field("controls", &self.controls.read().len())
            .finish_non_exhaustive()
    }
}

impl AppModel {
    /// Validate `settings` and wire up the bridge. No remote call is made.
    pub fn new(
        gateway: Arc<dyn Gateway>,
        runtime: Handle,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        settings.validate()?;
        Ok(Self {
            bridge: Arc::new(PollBridge::new(gateway, runtime, settings.bridge())),
            settings,
            registry: RwLock::new(TypeRegistry::new()),
            controls: RwLock::new(Arc::new(ControlMap::new())),
            functions: FunctionRegistry::with_builtins(),
        })
    }

    /// [`new`](Self::new), then an initial refresh when `refresh_on_start` is set.
    pub fn connect(
        gateway: Arc<dyn Gateway>,
        runtime: Handle,
        settings: SessionSettings,
    ) -> Result<Self, SessionError> {
        let model = Self::new(gateway, runtime, settings)?;
        if model.settings.refresh_on_start {
            model.refresh()?;
        }
        Ok(model)
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn bridge(&self) -> &Arc<PollBridge> {
        &self.bridge
    }

    /// Load a fresh snapshot through the bridge and rebuild the control tree.
    pub fn refresh(&self) -> Result<LoadReport, ProbeError> {
        let snapshot = self.bridge.load_model_snapshot()?;
        Ok(self.apply_snapshot(&snapshot))
    }

    pub async fn refresh_async(&self) -> Result<LoadReport, ProbeError> {
        let snapshot = fetch_snapshot(self.bridge.gateway().as_ref()).await?;
        Ok(self.apply_snapshot(&snapshot))
    }

    /// Register what the snapshot describes and swap in the new control tree.
    pub fn apply_snapshot(&self, snapshot: &ModelSnapshot) -> LoadReport {
        let (loaded, report) = {
            let mut registry = self.registry.write();
            ModelLoader::new(&mut registry).load(snapshot)
        };
        let controls: ControlMap = loaded
            .into_iter()
            .map(|(name, schema)| {
                let record = ControlRecord::root(name.clone(), schema, Arc::clone(&self.bridge));
                (name, record)
            })
            .collect();
        *self.controls.write() = Arc::new(controls);
        report
    }

    pub fn control(&self, name: &str) -> Option<ControlRecord> {
        self.controls.read().get(name).cloned()
    }

    /// The current tree. Unaffected by later refreshes.
    pub fn controls(&self) -> Arc<BTreeMap<String, ControlRecord>> {
        self.controls.read().clone()
    }

    /// Top-level controls as evaluator values, keyed by control name.
    pub fn named_values(&self) -> Vec<(String, FormulaValue)> {
        self.controls()
            .iter()
            .map(|(name, record)| (name.clone(), FormulaValue::Record(Arc::new(record.clone()))))
            .collect()
    }

    pub fn registry(&self) -> RwLockReadGuard<'_, TypeRegistry> {
        self.registry.read()
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn register_function(&mut self, f: Arc<dyn ExtensionFunction>) {
        self.functions.register(f);
    }

    pub fn call_function(&self, name: &str, args: &[FormulaValue]) -> Result<FormulaValue, ProbeError> {
        let ctx = FunctionContext {
            settings: self.bridge.settings(),
        };
        self.functions.invoke(name, args, &ctx)
    }
}
