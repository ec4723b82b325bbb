//! Remote control object model.
//!
//! Every on-screen control of a browser-hosted form app is exposed to the formula
//! evaluator as a [`ControlRecord`]: a structured value whose fields are resolved
//! on demand through the gateway. Repeating containers surface as
//! [`RowCollection`]s whose length and content always reflect the live page.
//!
//! Types come from a per-session [`TypeRegistry`] populated while loading a model
//! snapshot; each control's schema is synthesized once into [`ControlSchema`],
//! which decides up front whether a field is a leaf, a nested control, or a
//! repeating table.

pub mod config;
pub mod decode;
pub mod functions;
pub mod loader;
pub mod record;
pub mod registry;
pub mod rows;
pub mod schema;
pub mod session;

pub use config::{ConfigError, SessionSettings};
pub use functions::{ExtensionFunction, FunctionContext, FunctionRegistry};
pub use loader::{LoadReport, ModelLoader, SkippedControl};
pub use record::ControlRecord;
pub use registry::{MAX_DESCRIPTOR_DEPTH, TypeRegistry};
pub use rows::{RowCollection, RowIter};
pub use schema::{ControlSchema, FieldKind};
pub use session::{AppModel, SessionError};

// Re-export for convenience
pub use canvasprobe_common::{FormulaType, FormulaValue, ItemPath, ProbeError, RecordType};
