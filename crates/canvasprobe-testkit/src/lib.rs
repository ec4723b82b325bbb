//! Test doubles for the browser side.
//!
//! [`FakeGateway`] answers from in-memory tables keyed by exact [`ItemPath`]s
//! and records every call it receives, so tests can assert both what was
//! returned and what was asked.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use canvasprobe_common::{ItemPath, RemoteError, RemoteErrorKind};
use canvasprobe_gateway::{ControlDescriptor, Gateway, ModelSnapshot};
use parking_lot::Mutex;
use serde_json::{Value as JsonValue, json};

/// One call observed by a [`FakeGateway`].
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayCall {
    ReadProperty(ItemPath),
    ItemCount(ItemPath),
    SetProperty(ItemPath, JsonValue),
    SelectControl(ItemPath),
    LoadModelSnapshot,
}

#[derive(Debug)]
struct State {
    snapshot: ModelSnapshot,
    values: HashMap<ItemPath, Option<String>>,
    raw: HashMap<ItemPath, JsonValue>,
    counts: HashMap<ItemPath, usize>,
    hanging: HashSet<ItemPath>,
    failing: HashMap<ItemPath, RemoteError>,
    written: HashMap<ItemPath, JsonValue>,
    select_result: bool,
    calls: Vec<GatewayCall>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            snapshot: ModelSnapshot::default(),
            values: HashMap::new(),
            raw: HashMap::new(),
            counts: HashMap::new(),
            hanging: HashSet::new(),
            failing: HashMap::new(),
            written: HashMap::new(),
            select_result: true,
            calls: Vec::new(),
        }
    }
}

enum Outcome<T> {
    Ready(Result<T, RemoteError>),
    Hang,
}

/// In-memory [`Gateway`]. All setters take `&self` so a shared instance can be
/// reconfigured between reads.
#[derive(Debug, Default)]
pub struct FakeGateway {
    state: Mutex<State>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_snapshot(snapshot: ModelSnapshot) -> Self {
        let gateway = Self::new();
        gateway.set_snapshot(snapshot);
        gateway
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn set_snapshot(&self, snapshot: ModelSnapshot) {
        self.state.lock().snapshot = snapshot;
    }

    /// Answer reads of `path` with `{ "PropertyValue": value }`.
    pub fn set_value(&self, path: ItemPath, value: Option<&str>) {
        self.state.lock().values.insert(path, value.map(str::to_string));
    }

    /// Answer reads of `path` with an arbitrary body.
    pub fn set_raw(&self, path: ItemPath, body: JsonValue) {
        self.state.lock().raw.insert(path, body);
    }

    pub fn set_count(&self, path: ItemPath, count: usize) {
        self.state.lock().counts.insert(path, count);
    }

    /// Calls addressed to `path` never complete.
    pub fn hang_on(&self, path: ItemPath) {
        self.state.lock().hanging.insert(path);
    }

    pub fn fail_on(&self, path: ItemPath, error: RemoteError) {
        self.state.lock().failing.insert(path, error);
    }

    pub fn set_select_result(&self, result: bool) {
        self.state.lock().select_result = result;
    }

    pub fn calls(&self) -> Vec<GatewayCall> {
        self.state.lock().calls.clone()
    }

    /// Paths of every property read, in call order.
    pub fn reads(&self) -> Vec<ItemPath> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                GatewayCall::ReadProperty(path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn count_calls(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, GatewayCall::ItemCount(_)))
            .count()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Last value written to `path` through `set_property`.
    pub fn written(&self, path: &ItemPath) -> Option<JsonValue> {
        self.state.lock().written.get(path).cloned()
    }

    fn outcome<T>(
        &self,
        call: GatewayCall,
        path: Option<&ItemPath>,
        answer: impl FnOnce(&mut State) -> Result<T, RemoteError>,
    ) -> Outcome<T> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if let Some(path) = path {
            if state.hanging.contains(path) {
                return Outcome::Hang;
            }
            if let Some(err) = state.failing.get(path) {
                return Outcome::Ready(Err(err.clone()));
            }
        }
        Outcome::Ready(answer(&mut state))
    }
}

async fn settle<T>(outcome: Outcome<T>) -> Result<T, RemoteError> {
    match outcome {
        Outcome::Ready(result) => result,
        Outcome::Hang => std::future::pending().await,
    }
}

fn unknown(path: &ItemPath) -> RemoteError {
    RemoteError::new(RemoteErrorKind::Rejected).with_message(format!("no such item `{path}`"))
}

#[async_trait]
impl Gateway for FakeGateway {
    async fn read_property(&self, path: &ItemPath) -> Result<JsonValue, RemoteError> {
        let outcome = self.outcome(GatewayCall::ReadProperty(path.clone()), Some(path), |state| {
            if let Some(body) = state.raw.get(path) {
                return Ok(body.clone());
            }
            match state.values.get(path) {
                Some(value) => Ok(json!({ "PropertyValue": value })),
                None => Err(unknown(path)),
            }
        });
        settle(outcome).await
    }

    async fn item_count(&self, path: &ItemPath) -> Result<usize, RemoteError> {
        let outcome = self.outcome(GatewayCall::ItemCount(path.clone()), Some(path), |state| {
            state.counts.get(path).copied().ok_or_else(|| unknown(path))
        });
        settle(outcome).await
    }

    async fn set_property(&self, path: &ItemPath, value: JsonValue) -> Result<bool, RemoteError> {
        let call = GatewayCall::SetProperty(path.clone(), value.clone());
        let outcome = self.outcome(call, Some(path), |state| {
            let readable = match &value {
                JsonValue::Null => None,
                JsonValue::String(s) => Some(s.clone()),
                other => Some(other.to_string()),
            };
            state.values.insert(path.clone(), readable);
            state.written.insert(path.clone(), value);
            Ok(true)
        });
        settle(outcome).await
    }

    async fn select_control(&self, path: &ItemPath) -> Result<bool, RemoteError> {
        let outcome = self.outcome(GatewayCall::SelectControl(path.clone()), Some(path), |state| {
            Ok(state.select_result)
        });
        settle(outcome).await
    }

    async fn load_model_snapshot(&self) -> Result<JsonValue, RemoteError> {
        let outcome = self.outcome(GatewayCall::LoadModelSnapshot, None, |state| {
            Ok(serde_json::to_value(&state.snapshot)?)
        });
        settle(outcome).await
    }
}

/* ───────────────────────────── fixtures ───────────────────────────── */

/// A small app: a label template repeated by a gallery, a button, a component
/// embedding the label, and one control whose type cannot be resolved.
pub fn gallery_snapshot() -> ModelSnapshot {
    ModelSnapshot {
        controls: vec![
            ControlDescriptor::new("Gallery1")
                .with_property("AllItems", "*[Label1:v]")
                .with_property("Visible", "b"),
            ControlDescriptor::new("Label1")
                .with_property("Text", "s")
                .with_property("Visible", "b"),
            ControlDescriptor::new("Button1")
                .with_property("Text", "s")
                .with_property("Fill", "c")
                .with_property("Width", "n"),
            ControlDescriptor::new("Component1")
                .with_property("Label1", "Label1")
                .with_property("Title", "s"),
            ControlDescriptor::new("DataTable1")
                .with_property("Items", "*[Column1:v]")
                .with_property("Visible", "b"),
        ],
    }
}

/// Path of `control.property` inside row `index` of `Gallery1.AllItems`.
pub fn gallery_item(index: usize, control: &str, property: &str) -> ItemPath {
    let row = ItemPath::build("Gallery1", Some("AllItems")).with_index(index);
    ItemPath::child(control, Some(row)).with_property(property)
}

/// Multi-thread runtime for driving gateway futures from a blocking test thread.
pub fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("test runtime builds")
}
