//! The proxy backend against a fake CRI proxy on a local TCP socket.

use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use tokio::io::AsyncBufReadExt;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpListener;

use zonelet::Dispatcher;
use zonelet::Registry;
use zonelet::WorkloadId;
use zonelet::WorkloadSpec;
use zonelet::WorkloadState;
use zonelet::config::BackendConfig;
use zonelet::runtime;
use zonelet::transport::Endpoint;
use zonewire::ErrorKind;

/// Shared fake-proxy state: what it was asked, and what it reports.
#[derive(Default)]
struct ProxyState {
    calls: Vec<(String, Value)>,
    container_state: Option<Value>,
    refuse: Option<String>,
}

/// Answers one call per connection, the way the socket transport dials.
async fn fake_proxy(state: Arc<Mutex<ProxyState>>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let state = state.clone();
            tokio::spawn(async move {
                let (reader, mut writer) = stream.into_split();
                let mut line = String::new();
                BufReader::new(reader).read_line(&mut line).await.unwrap();

                let call: Value = serde_json::from_str(&line).unwrap();
                let method = call["method"].as_str().unwrap().to_string();
                let reply = answer(&state, &method, call["params"].clone());
                let mut bytes = serde_json::to_vec(&reply).unwrap();
                bytes.push(b'\n');
                writer.write_all(&bytes).await.unwrap();
            });
        }
    });

    addr
}

fn answer(state: &Mutex<ProxyState>, method: &str, params: Value) -> Value {
    let mut state = state.lock().unwrap();
    state.calls.push((method.to_string(), params));

    if state.refuse.as_deref() == Some(method) {
        return json!({ "err": { "code": "FailedPrecondition", "message": "refused by test" } });
    }

    match method {
        "RunPodSandbox" => json!({ "ok": { "pod_sandbox_id": "pod-1" } }),
        "CreateContainer" => json!({ "ok": { "container_id": "ctr-1" } }),
        "StartContainer" => json!({ "ok": {} }),
        "ContainerStatus" => {
            let status = state
                .container_state
                .clone()
                .unwrap_or_else(|| json!({ "state": "CONTAINER_RUNNING" }));
            json!({ "ok": { "status": status } })
        }
        "PodSandboxStatus" => json!({ "ok": { "status": { "state": "SANDBOX_READY" } } }),
        other => json!({ "err": { "code": "Unimplemented", "message": other } }),
    }
}

fn dispatcher_for(addr: &str) -> Dispatcher {
    let endpoint = Endpoint::parse(&format!("tcp://{}", addr)).unwrap();
    let runtime = runtime::build(&BackendConfig::Proxy { endpoint });
    Dispatcher::new(Arc::new(Registry::new()), runtime, "edera-zone")
}

fn spec() -> WorkloadSpec {
    WorkloadSpec::new("wl-1", "registry.local/app:1", "edera-zone")
        .with_memory_mb(512)
        .with_cpu_millicores(250)
}

#[tokio::test]
async fn test_creation_sends_cri_sequence() {
    let state = Arc::new(Mutex::new(ProxyState::default()));
    let addr = fake_proxy(state.clone()).await;
    let dispatcher = dispatcher_for(&addr);

    let entry = dispatcher.handle_start(spec()).await.unwrap();
    assert_eq!(entry.state, WorkloadState::Running);
    let handle = entry.handle.unwrap();
    assert_eq!(handle.sandbox_id, "pod-1");
    assert_eq!(handle.container_id, "ctr-1");

    let state = state.lock().unwrap();
    let methods: Vec<&str> = state.calls.iter().map(|(m, _)| m.as_str()).collect();
    assert_eq!(methods, ["RunPodSandbox", "CreateContainer", "StartContainer"]);

    let sandbox = &state.calls[0].1["config"];
    assert_eq!(sandbox["name"], "wl-1");
    assert_eq!(sandbox["runtime_handler"], "edera-zone");
    assert_eq!(sandbox["resources"]["memory_limit_bytes"], 512 * 1024 * 1024);
    assert_eq!(sandbox["resources"]["cpu_period"], 100_000);
    assert_eq!(sandbox["resources"]["cpu_quota"], 25_000);

    let container = &state.calls[1].1;
    assert_eq!(container["pod_sandbox_id"], "pod-1");
    assert_eq!(container["config"]["image"], "registry.local/app:1");
    assert_eq!(state.calls[2].1["container_id"], "ctr-1");
}

#[tokio::test]
async fn test_status_follows_proxy_answers() {
    let state = Arc::new(Mutex::new(ProxyState::default()));
    let addr = fake_proxy(state.clone()).await;
    let dispatcher = dispatcher_for(&addr);
    dispatcher.handle_start(spec()).await.unwrap();
    let id = WorkloadId::from("wl-1");

    let report = dispatcher.handle_get_status(&id).await.unwrap();
    assert_eq!(report.entry.state, WorkloadState::Running);

    state.lock().unwrap().container_state = Some(json!({
        "state": "CONTAINER_EXITED",
        "exit_code": 2,
        "reason": "Error",
        "message": "config file missing"
    }));
    let report = dispatcher.handle_get_status(&id).await.unwrap();
    assert_eq!(report.entry.state, WorkloadState::Failed);
    let detail = report.entry.last_error.unwrap();
    assert!(detail.contains("code 2"));
    assert!(detail.contains("config file missing"));
}

#[tokio::test]
async fn test_refusal_marks_workload_failed() {
    let state = Arc::new(Mutex::new(ProxyState {
        refuse: Some("StartContainer".into()),
        ..Default::default()
    }));
    let addr = fake_proxy(state.clone()).await;
    let dispatcher = dispatcher_for(&addr);

    let entry = dispatcher.handle_start(spec()).await.unwrap();
    assert_eq!(entry.state, WorkloadState::Failed);
    let last_error = entry.last_error.unwrap();
    assert!(last_error.contains("refused by test"));
    assert!(last_error.contains("pod-1"));
}

#[tokio::test]
async fn test_missing_proxy_is_runtime_unavailable() {
    // Bind and drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    };
    let dispatcher = dispatcher_for(&addr);

    let entry = dispatcher.handle_start(spec()).await.unwrap();
    assert_eq!(entry.state, WorkloadState::Failed);
    assert!(entry.last_error.unwrap().contains("unavailable"));

    let err = dispatcher.handle_start(spec()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateError);
}
