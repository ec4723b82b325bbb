//! Extension functions exposed to the formula evaluator.
//!
//! The evaluator calls these synchronously; every remote operation they trigger
//! goes through the session's [`PollBridge`](canvasprobe_gateway::PollBridge).

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use canvasprobe_common::{FormulaValue, ProbeError};
use canvasprobe_gateway::BridgeSettings;

use crate::record::ControlRecord;

/// What a function may know about the session it runs in.
#[derive(Debug, Clone, Copy)]
pub struct FunctionContext {
    pub settings: BridgeSettings,
}

pub trait ExtensionFunction: Debug + Send + Sync + 'static {
    /// Name as written in formulas. Lookup is case-insensitive.
    fn name(&self) -> &'static str;

    fn min_args(&self) -> usize {
        0
    }

    fn max_args(&self) -> usize {
        self.min_args()
    }

    fn call(&self, args: &[FormulaValue], ctx: &FunctionContext) -> Result<FormulaValue, ProbeError>;
}

/// Per-session function table, keyed by upper-cased name.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn ExtensionFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with `Select`, `SetProperty`, `CountRows` and `WaitUntil`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SelectFn));
        registry.register(Arc::new(SetPropertyFn));
        registry.register(Arc::new(CountRowsFn));
        registry.register(Arc::new(WaitUntilFn));
        registry
    }

    /// Adds `f`, replacing any function with the same name.
    pub fn register(&mut self, f: Arc<dyn ExtensionFunction>) {
        self.functions.insert(f.name().to_ascii_uppercase(), f);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ExtensionFunction>> {
        self.functions.get(&name.to_ascii_uppercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.values().map(|f| f.name())
    }

    pub fn invoke(
        &self,
        name: &str,
        args: &[FormulaValue],
        ctx: &FunctionContext,
    ) -> Result<FormulaValue, ProbeError> {
        let f = self
            .get(name)
            .ok_or_else(|| ProbeError::UnknownFunction(name.to_string()))?;
        validate_arity(f.as_ref(), args.len())?;
        let _span = tracing::debug_span!("extension_call", function = f.name()).entered();
        f.call(args, ctx)
    }
}

fn validate_arity(f: &dyn ExtensionFunction, found: usize) -> Result<(), ProbeError> {
    if (f.min_args()..=f.max_args()).contains(&found) {
        return Ok(());
    }
    Err(arity_error(f, found))
}

fn arity_error(f: &dyn ExtensionFunction, found: usize) -> ProbeError {
    let (min, max) = (f.min_args(), f.max_args());
    let expected = if min == max {
        min.to_string()
    } else {
        format!("{min} to {max}")
    };
    ProbeError::Arity {
        function: f.name().to_string(),
        expected,
        found,
    }
}

/* ───────────────────────────── argument helpers ───────────────────────────── */

fn control_arg(value: &FormulaValue) -> Result<&ControlRecord, ProbeError> {
    value
        .as_record()
        .and_then(|r| r.as_any().downcast_ref::<ControlRecord>())
        .ok_or_else(|| ProbeError::type_mismatch("a control", value.type_name()))
}

fn text_arg(value: &FormulaValue) -> Result<&str, ProbeError> {
    value
        .as_text()
        .ok_or_else(|| ProbeError::type_mismatch("Text", value.type_name()))
}

/* ───────────────────────────── built-ins ───────────────────────────── */

/// `Select(control)`: run the control's default action.
#[derive(Debug)]
pub struct SelectFn;

impl ExtensionFunction for SelectFn {
    fn name(&self) -> &'static str {
        "Select"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn call(&self, args: &[FormulaValue], _ctx: &FunctionContext) -> Result<FormulaValue, ProbeError> {
        let [control] = args else {
            return Err(arity_error(self, args.len()));
        };
        Ok(FormulaValue::Boolean(control_arg(control)?.select()?))
    }
}

/// `SetProperty(control, propertyName, value)`
#[derive(Debug)]
pub struct SetPropertyFn;

impl ExtensionFunction for SetPropertyFn {
    fn name(&self) -> &'static str {
        "SetProperty"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn call(&self, args: &[FormulaValue], _ctx: &FunctionContext) -> Result<FormulaValue, ProbeError> {
        let [control, property, value] = args else {
            return Err(arity_error(self, args.len()));
        };
        let control = control_arg(control)?;
        Ok(FormulaValue::Boolean(control.set_property(text_arg(property)?, value)?))
    }
}

/// `CountRows(table)`: live row count of any table value.
#[derive(Debug)]
pub struct CountRowsFn;

impl ExtensionFunction for CountRowsFn {
    fn name(&self) -> &'static str {
        "CountRows"
    }
    fn min_args(&self) -> usize {
        1
    }
    fn call(&self, args: &[FormulaValue], _ctx: &FunctionContext) -> Result<FormulaValue, ProbeError> {
        let [table] = args else {
            return Err(arity_error(self, args.len()));
        };
        let table = table
            .as_table()
            .ok_or_else(|| ProbeError::type_mismatch("Table", table.type_name()))?;
        Ok(FormulaValue::Number(table.count()? as f64))
    }
}

/// `WaitUntil(control, propertyName, expected)`: re-read until the property
/// equals `expected` or the session timeout runs out.
#[derive(Debug)]
pub struct WaitUntilFn;

impl ExtensionFunction for WaitUntilFn {
    fn name(&self) -> &'static str {
        "WaitUntil"
    }
    fn min_args(&self) -> usize {
        3
    }
    fn call(&self, args: &[FormulaValue], _ctx: &FunctionContext) -> Result<FormulaValue, ProbeError> {
        let [control, property, expected] = args else {
            return Err(arity_error(self, args.len()));
        };
        let control = control_arg(control)?;
        let property = text_arg(property)?;
        let target = control.property_path(property).to_string();
        control
            .bridge()
            .poll_until("WaitUntil", &target, || Ok(control.get_field(property)? == *expected))?;
        Ok(FormulaValue::Boolean(true))
    }
}
