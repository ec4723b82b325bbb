use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvasprobe_common::{ItemPath, ProbeError, RemoteError, RemoteErrorKind};
use serde_json::Value as JsonValue;
use tokio::runtime::Handle;
use tokio::sync::oneshot::{self, error::TryRecvError};
use tokio::task::JoinHandle;

use crate::gateway::{Gateway, fetch_item_count, fetch_property, fetch_snapshot};
use crate::wire::{ModelSnapshot, PropertyValueEnvelope};

/// Timing knobs for blocking calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeSettings {
    /// Upper bound for a single remote call.
    pub timeout: Duration,
    /// Sleep between two completion checks.
    pub poll_interval: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Lifecycle of one bridged call.
///
/// `Started` and `Polling` are the only non-terminal states; a terminal state is
/// never left once reached.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum CallState {
    Started,
    Polling,
    Completed,
    TimedOut,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            CallState::Completed | CallState::TimedOut | CallState::Failed
        )
    }

    pub fn can_transition_to(self, next: CallState) -> bool {
        match self {
            CallState::Started => next != CallState::Started,
            CallState::Polling => next != CallState::Started,
            _ => false,
        }
    }

    fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.can_transition_to(next),
            "illegal call transition {self:?} -> {next:?}"
        );
        if self.can_transition_to(next) {
            *self = next;
        }
    }
}

/// In-flight call: a spawned gateway future plus the channel its result lands on.
struct PendingCall<T> {
    rx: oneshot::Receiver<Result<T, ProbeError>>,
    task: JoinHandle<()>,
    started: Instant,
    state: CallState,
}

impl<T> PendingCall<T> {
    /// One completion check. Returns `Some` once the call reached a terminal state.
    fn check(
        &mut self,
        operation: &'static str,
        path: &str,
        timeout: Duration,
    ) -> Option<Result<T, ProbeError>> {
        match self.rx.try_recv() {
            Ok(result) => {
                self.state.advance(if result.is_ok() {
                    CallState::Completed
                } else {
                    CallState::Failed
                });
                return Some(result);
            }
            Err(TryRecvError::Closed) => {
                self.state.advance(CallState::Failed);
                return Some(Err(RemoteError::new(RemoteErrorKind::Cancelled)
                    .with_message(format!("{operation} task ended without a result"))
                    .into()));
            }
            Err(TryRecvError::Empty) => {}
        }

        if self.started.elapsed() >= timeout {
            self.task.abort();
            self.state.advance(CallState::TimedOut);
            return Some(Err(ProbeError::Timeout {
                operation,
                path: path.to_string(),
                timeout,
            }));
        }

        self.state.advance(CallState::Polling);
        None
    }
}

/// Synchronous facade over an asynchronous [`Gateway`].
///
/// Each call is spawned on the supplied runtime and the calling thread sleeps in
/// `poll_interval` steps until the result arrives or `timeout` elapses. Must not
/// be called from a worker thread of that same runtime.
#[derive(Clone)]
pub struct PollBridge {
    gateway: Arc<dyn Gateway>,
    runtime: Handle,
    settings: BridgeSettings,
}

impl std::fmt::Debug for PollBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollBridge")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PollBridge {
    pub fn new(gateway: Arc<dyn Gateway>, runtime: Handle, settings: BridgeSettings) -> Self {
        Self {
            gateway,
            runtime,
            settings,
        }
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn settings(&self) -> BridgeSettings {
        self.settings
    }

    pub fn runtime(&self) -> &Handle {
        &self.runtime
    }

    pub fn read_property(&self, path: &ItemPath) -> Result<PropertyValueEnvelope, ProbeError> {
        path.validate_for_fetch()?;
        let owned = path.clone();
        self.call("readProperty", &path.to_string(), move |gw| async move {
            fetch_property(gw.as_ref(), &owned).await
        })
    }

    pub fn item_count(&self, path: &ItemPath) -> Result<usize, ProbeError> {
        path.validate_for_fetch()?;
        let owned = path.clone();
        self.call("itemCount", &path.to_string(), move |gw| async move {
            fetch_item_count(gw.as_ref(), &owned).await
        })
    }

    pub fn set_property(&self, path: &ItemPath, value: JsonValue) -> Result<bool, ProbeError> {
        path.validate_for_fetch()?;
        let owned = path.clone();
        self.call("setProperty", &path.to_string(), move |gw| async move {
            Ok(gw.set_property(&owned, value).await?)
        })
    }

    pub fn select_control(&self, path: &ItemPath) -> Result<bool, ProbeError> {
        path.validate()?;
        let owned = path.clone();
        self.call("selectControl", &path.to_string(), move |gw| async move {
            Ok(gw.select_control(&owned).await?)
        })
    }

    pub fn load_model_snapshot(&self) -> Result<ModelSnapshot, ProbeError> {
        self.call("loadModelSnapshot", "<model>", move |gw| async move {
            fetch_snapshot(gw.as_ref()).await
        })
    }

    /// Re-run `ready` every poll interval until it yields `true`.
    ///
    /// `ready` is checked at least once. Its errors end the wait unchanged; running
    /// past the bridge timeout ends it with [`ProbeError::Timeout`].
    pub fn poll_until<F>(&self, operation: &'static str, target: &str, mut ready: F) -> Result<(), ProbeError>
    where
        F: FnMut() -> Result<bool, ProbeError>,
    {
        let _span = tracing::debug_span!("bridge_wait", operation, target).entered();
        let started = Instant::now();
        loop {
            if ready()? {
                return Ok(());
            }
            let elapsed = started.elapsed();
            if elapsed >= self.settings.timeout {
                let err = ProbeError::Timeout {
                    operation,
                    path: target.to_string(),
                    timeout: self.settings.timeout,
                };
                tracing::warn!(elapsed_ms = elapsed.as_millis() as u64, "{err}");
                return Err(err);
            }
            std::thread::sleep(self.settings.poll_interval.min(self.settings.timeout - elapsed));
        }
    }

    /// Run `op` against the gateway and block until it settles.
    ///
    /// `target` only labels logs and timeout errors.
    pub fn call<T, F, Fut>(
        &self,
        operation: &'static str,
        target: &str,
        op: F,
    ) -> Result<T, ProbeError>
    where
        T: Send + 'static,
        F: FnOnce(Arc<dyn Gateway>) -> Fut,
        Fut: Future<Output = Result<T, ProbeError>> + Send + 'static,
    {
        let _span = tracing::debug_span!("bridge_call", operation, target).entered();

        let (tx, rx) = oneshot::channel();
        let fut = op(Arc::clone(&self.gateway));
        let task = self.runtime.spawn(async move {
            // receiver is gone only after a timeout; nothing left to report to
            let _ = tx.send(fut.await);
        });
        let mut pending = PendingCall {
            rx,
            task,
            started: Instant::now(),
            state: CallState::Started,
        };

        loop {
            if let Some(result) = pending.check(operation, target, self.settings.timeout) {
                match (&result, pending.state) {
                    (Err(err), CallState::TimedOut) => {
                        tracing::warn!(elapsed_ms = pending.started.elapsed().as_millis() as u64, "{err}")
                    }
                    (Err(err), _) => tracing::debug!("call failed: {err}"),
                    (Ok(_), _) => tracing::debug!(
                        elapsed_ms = pending.started.elapsed().as_millis() as u64,
                        "call completed"
                    ),
                }
                return result;
            }
            let remaining = self
                .settings
                .timeout
                .saturating_sub(pending.started.elapsed());
            std::thread::sleep(self.settings.poll_interval.min(remaining));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_final() {
        for terminal in [CallState::Completed, CallState::TimedOut, CallState::Failed] {
            assert!(terminal.is_terminal());
            for next in [
                CallState::Started,
                CallState::Polling,
                CallState::Completed,
                CallState::TimedOut,
                CallState::Failed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn polling_may_repeat_but_never_restarts() {
        assert!(CallState::Started.can_transition_to(CallState::Polling));
        assert!(CallState::Polling.can_transition_to(CallState::Polling));
        assert!(CallState::Polling.can_transition_to(CallState::Completed));
        assert!(!CallState::Polling.can_transition_to(CallState::Started));
        assert!(!CallState::Started.is_terminal());
    }
}
