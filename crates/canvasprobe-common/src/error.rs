//! Error taxonomy for the control model.
//!
//! - **`RemoteError`** : what the gateway reports when a browser round-trip fails
//! - **`ProbeError`**  : everything a field read, row access or extension call can
//!   surface to the evaluator
//!
//! Address and lookup failures are detected locally and never reach the gateway.
//! Timeouts and remote failures abort the current expression; nothing in this
//! layer retries.

use std::{error::Error, fmt, time::Duration};

use thiserror::Error;

use crate::address::AddressError;

/// Category of a gateway-side failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    /// The browser connection or script invocation failed.
    Transport,
    /// The browser answered, but the payload could not be understood.
    MalformedResponse,
    /// The browser refused the request (unknown control, read-only property).
    Rejected,
    /// The in-flight call was dropped before it produced a result.
    Cancelled,
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport failure",
            Self::MalformedResponse => "malformed response",
            Self::Rejected => "request rejected",
            Self::Cancelled => "call cancelled",
        })
    }
}

/// Failure reported by a gateway implementation. Propagated unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub message: Option<String>,
}

impl From<RemoteErrorKind> for RemoteError {
    fn from(kind: RemoteErrorKind) -> Self {
        Self {
            kind,
            message: None,
        }
    }
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind) -> Self {
        kind.into()
    }

    /// Attach a human-readable explanation.
    pub fn with_message<S: Into<String>>(mut self, msg: S) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn malformed<S: Into<String>>(msg: S) -> Self {
        Self::new(RemoteErrorKind::MalformedResponse).with_message(msg)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(ref msg) = self.message {
            write!(f, ": {msg}")?;
        }
        Ok(())
    }
}

impl Error for RemoteError {}

impl From<serde_json::Error> for RemoteError {
    fn from(err: serde_json::Error) -> Self {
        RemoteError::malformed(err.to_string())
    }
}

/// Everything the control model can surface to the formula evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbeError {
    #[error("invalid item path: {0}")]
    Address(#[from] AddressError),

    #[error("`{record}` has no field `{field}`")]
    FieldNotFound { record: String, field: String },

    #[error("row index {index} is out of range for {count} row(s)")]
    Index { index: usize, count: usize },

    #[error("{operation} on `{path}` did not complete within {}ms", timeout.as_millis())]
    Timeout {
        operation: &'static str,
        path: String,
        timeout: Duration,
    },

    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    #[error("cannot decode `{raw}` from `{path}` as {expected}")]
    Decode {
        path: String,
        expected: String,
        raw: String,
    },

    #[error("expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("{function} expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },
}

impl ProbeError {
    pub fn field_not_found(record: impl Into<String>, field: impl Into<String>) -> Self {
        ProbeError::FieldNotFound {
            record: record.into(),
            field: field.into(),
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        ProbeError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout { .. })
    }
}
