//! Meta crate that re-exports the canvasprobe layers. Depend on this crate and
//! narrow the surface with feature flags; the underlying crates stay reachable
//! for deeper integration.

#[cfg(feature = "common")]
pub use canvasprobe_common as common;

#[cfg(feature = "gateway")]
pub use canvasprobe_gateway as gateway;

#[cfg(feature = "model")]
pub use canvasprobe_model as model;

#[cfg(feature = "common")]
pub use canvasprobe_common::{
    AddressError, Color, FormulaType, FormulaValue, ItemPath, PrimitiveType, ProbeError,
    RecordType, RecordValue, RemoteError, RemoteErrorKind, TableValue,
};

#[cfg(feature = "gateway")]
pub use canvasprobe_gateway::{BridgeSettings, Gateway, ModelSnapshot, PollBridge};

#[cfg(feature = "model")]
pub use canvasprobe_model::{
    AppModel, ControlRecord, FunctionRegistry, LoadReport, RowCollection, SessionError,
    SessionSettings, TypeRegistry,
};
