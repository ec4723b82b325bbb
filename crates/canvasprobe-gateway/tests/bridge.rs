use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use canvasprobe_common::{AddressError, ItemPath, ProbeError, RemoteError, RemoteErrorKind};
use canvasprobe_gateway::{BridgeSettings, Gateway, PollBridge};
use serde_json::{Value as JsonValue, json};

/// Minimal gateway: answers reads after an optional delay, hangs on `Hang.*`.
#[derive(Default)]
struct StubGateway {
    delay: Duration,
    reads: AtomicUsize,
}

#[async_trait]
impl Gateway for StubGateway {
    async fn read_property(&self, path: &ItemPath) -> Result<JsonValue, RemoteError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if path.control_name() == Some("Hang") {
            std::future::pending::<()>().await;
        }
        if path.control_name() == Some("Broken") {
            return Ok(json!({ "PropertyValue": ["not", "a", "string"] }));
        }
        tokio::time::sleep(self.delay).await;
        Ok(json!({ "PropertyValue": format!("{path}") }))
    }

    async fn item_count(&self, _path: &ItemPath) -> Result<usize, RemoteError> {
        Ok(4)
    }

    async fn set_property(&self, _path: &ItemPath, _value: JsonValue) -> Result<bool, RemoteError> {
        Err(RemoteError::new(RemoteErrorKind::Rejected).with_message("read-only"))
    }

    async fn select_control(&self, _path: &ItemPath) -> Result<bool, RemoteError> {
        Ok(true)
    }

    async fn load_model_snapshot(&self) -> Result<JsonValue, RemoteError> {
        Ok(json!({ "Controls": [] }))
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("runtime builds")
}

fn bridge(rt: &tokio::runtime::Runtime, gateway: Arc<StubGateway>, timeout_ms: u64) -> PollBridge {
    PollBridge::new(
        gateway,
        rt.handle().clone(),
        BridgeSettings {
            timeout: Duration::from_millis(timeout_ms),
            poll_interval: Duration::from_millis(5),
        },
    )
}

#[test]
fn read_completes_and_returns_envelope() {
    let rt = runtime();
    let gateway = Arc::new(StubGateway {
        delay: Duration::from_millis(20),
        ..Default::default()
    });
    let bridge = bridge(&rt, gateway.clone(), 1000);

    let env = bridge
        .read_property(&ItemPath::build("Label1", Some("Text")))
        .expect("read completes");
    assert_eq!(env.property_value.as_deref(), Some("Label1.Text"));
    assert_eq!(gateway.reads.load(Ordering::SeqCst), 1);
}

#[test]
fn never_completing_read_times_out() {
    let rt = runtime();
    let bridge = bridge(&rt, Arc::new(StubGateway::default()), 1000);

    let started = Instant::now();
    let err = bridge
        .read_property(&ItemPath::build("Hang", Some("Text")))
        .expect_err("call must time out");
    assert!(started.elapsed() >= Duration::from_millis(1000));
    match err {
        ProbeError::Timeout {
            operation,
            path,
            timeout,
        } => {
            assert_eq!(operation, "readProperty");
            assert_eq!(path, "Hang.Text");
            assert_eq!(timeout, Duration::from_millis(1000));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn invalid_paths_never_reach_the_gateway() {
    let rt = runtime();
    let gateway = Arc::new(StubGateway::default());
    let bridge = bridge(&rt, gateway.clone(), 1000);

    let err = bridge
        .read_property(&ItemPath::root("Label1"))
        .expect_err("property is required");
    assert!(matches!(
        err,
        ProbeError::Address(AddressError::MissingPropertyName { .. })
    ));
    let err = bridge
        .item_count(&ItemPath::build("", Some("AllItems")))
        .expect_err("control name is required");
    assert!(matches!(
        err,
        ProbeError::Address(AddressError::MissingControlName { .. })
    ));
    assert_eq!(gateway.reads.load(Ordering::SeqCst), 0);
}

#[test]
fn remote_failures_propagate_unchanged() {
    let rt = runtime();
    let bridge = bridge(&rt, Arc::new(StubGateway::default()), 1000);

    let err = bridge
        .set_property(&ItemPath::build("Label1", Some("Text")), json!("x"))
        .expect_err("gateway rejects writes");
    assert_eq!(
        err,
        ProbeError::Remote(RemoteError::new(RemoteErrorKind::Rejected).with_message("read-only"))
    );

    let err = bridge
        .read_property(&ItemPath::build("Broken", Some("Text")))
        .expect_err("payload is malformed");
    match err {
        ProbeError::Remote(remote) => assert_eq!(remote.kind, RemoteErrorKind::MalformedResponse),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn count_select_and_snapshot_round_trip() {
    let rt = runtime();
    let bridge = bridge(&rt, Arc::new(StubGateway::default()), 1000);
    let gallery = ItemPath::build("Gallery1", Some("AllItems"));

    assert_eq!(bridge.item_count(&gallery).expect("count"), 4);
    assert!(bridge.select_control(&ItemPath::root("Button1")).expect("select"));
    assert!(bridge.load_model_snapshot().expect("snapshot").controls.is_empty());
}

#[test]
fn call_on_a_stopped_runtime_fails_instead_of_waiting() {
    let rt = runtime();
    let handle = rt.handle().clone();
    rt.shutdown_background();
    let bridge = PollBridge::new(
        Arc::new(StubGateway::default()),
        handle,
        BridgeSettings {
            timeout: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(5),
        },
    );

    let started = Instant::now();
    let err = bridge
        .read_property(&ItemPath::build("Label1", Some("Text")))
        .expect_err("task never runs");
    assert!(started.elapsed() < Duration::from_millis(1000));
    assert!(!err.is_timeout());
    match err {
        ProbeError::Remote(remote) => {
            assert_eq!(remote.kind, RemoteErrorKind::Cancelled);
            assert_eq!(
                remote.message.as_deref(),
                Some("readProperty task ended without a result")
            );
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn poll_until_returns_once_ready_and_times_out_otherwise() {
    let rt = runtime();
    let bridge = bridge(&rt, Arc::new(StubGateway::default()), 200);

    let mut checks = 0;
    bridge
        .poll_until("WaitUntil", "Label1.Text", || {
            checks += 1;
            Ok(checks == 3)
        })
        .expect("ready on the third check");
    assert_eq!(checks, 3);

    let started = Instant::now();
    let err = bridge
        .poll_until("WaitUntil", "Label1.Text", || Ok(false))
        .expect_err("never ready");
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(
        err,
        ProbeError::Timeout {
            operation: "WaitUntil",
            path: "Label1.Text".into(),
            timeout: Duration::from_millis(200),
        }
    );

    let failure = RemoteError::new(RemoteErrorKind::Transport).with_message("page closed");
    let err = bridge
        .poll_until("WaitUntil", "Label1.Text", || Err(failure.clone().into()))
        .expect_err("errors end the wait");
    assert_eq!(err, ProbeError::Remote(failure));
}
