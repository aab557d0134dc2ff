//! Integration tests for the Ferry bridge
//!
//! Drives a full host <-> bridge exchange over in-memory pipes with a
//! scripted backend standing in for the CLI.

use async_trait::async_trait;
use ferry_core::acp::AgentSideConnection;
use ferry_core::backend::{Backend, BackendEvent, BackendFactory};
use ferry_core::config::BridgeConfig;
use ferry_core::error::{BridgeError, BridgeResult};
use ferry_core::protocol::error_codes;
use ferry_core::BridgeAgent;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use tokio::sync::mpsc;

const REPLY: &str = "Working on it";

struct ScriptedBackend {
    fail_send: bool,
    events: mpsc::UnboundedSender<BackendEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<BackendEvent>>>,
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn start_interactive_session(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn send(&self, text: &str) -> BridgeResult<()> {
        if self.fail_send {
            return Err(BridgeError::backend("backend exited"));
        }
        self.sent.lock().push(text.to_string());
        let _ = self.events.send(BackendEvent::Message(REPLY.to_string()));
        Ok(())
    }

    async fn end(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn check_available(&self) -> bool {
        true
    }

    async fn login(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.receiver.lock().take()
    }
}

#[derive(Default)]
struct ScriptedFactory {
    fail_send: bool,
    created: Mutex<Vec<Arc<ScriptedBackend>>>,
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, _cwd: &Path) -> Arc<dyn Backend> {
        let (events, receiver) = mpsc::unbounded_channel();
        let backend = Arc::new(ScriptedBackend {
            fail_send: self.fail_send,
            events,
            receiver: Mutex::new(Some(receiver)),
            sent: Mutex::new(Vec::new()),
        });
        self.created.lock().push(Arc::clone(&backend));
        backend
    }
}

struct Host {
    writer: WriteHalf<DuplexStream>,
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    connection: AgentSideConnection,
    agent: Arc<BridgeAgent>,
    next_id: u64,
}

impl Host {
    fn start(factory: Arc<ScriptedFactory>) -> Self {
        let (host_io, bridge_io) = tokio::io::duplex(64 * 1024);
        let (bridge_read, bridge_write) = tokio::io::split(bridge_io);
        let (host_read, writer) = tokio::io::split(host_io);

        let (agent, connection) = AgentSideConnection::new(
            |client| BridgeAgent::new(Arc::new(client), factory, BridgeConfig::default()),
            bridge_write,
            bridge_read,
        );

        Self {
            writer,
            lines: BufReader::new(host_read).lines(),
            connection,
            agent,
            next_id: 0,
        }
    }

    async fn write_line(&mut self, frame: &Value) {
        let mut line = frame.to_string();
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn next_frame(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a frame")
            .unwrap()
            .expect("bridge closed the stream");
        serde_json::from_str(&line).unwrap()
    }

    /// Send a request and collect frames until its response arrives
    async fn call(&mut self, method: &str, params: Value) -> (Value, Vec<Value>) {
        let id = self.next_id;
        self.next_id += 1;
        self.write_line(&json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params}))
            .await;

        let mut seen = Vec::new();
        loop {
            let frame = self.next_frame().await;
            if frame.get("method").is_none() && frame["id"] == json!(id) {
                return (frame, seen);
            }
            seen.push(frame);
        }
    }

    async fn open_session(&mut self) -> String {
        let cwd = std::env::temp_dir();
        let (response, _) = self.call("session/new", json!({"cwd": cwd, "mcpServers": []})).await;
        response["result"]["sessionId"].as_str().unwrap().to_string()
    }

    async fn shutdown(mut self) {
        // Dropping one half of a split duplex does not close it; shut down the write side for EOF
        self.writer.shutdown().await.unwrap();
        self.connection.closed().await.unwrap();
        self.agent.destroy().await;
    }
}

fn update_kind(frame: &Value) -> &str {
    assert_eq!(frame["method"], "session/update");
    frame["params"]["update"]["sessionUpdate"].as_str().unwrap()
}

#[tokio::test]
async fn test_initialize_handshake() {
    let mut host = Host::start(Arc::new(ScriptedFactory::default()));

    let (response, _) = host
        .call("initialize", json!({"protocolVersion": 1, "clientCapabilities": {}}))
        .await;

    let result = &response["result"];
    assert_eq!(result["protocolVersion"], 1);
    assert_eq!(result["authMethods"].as_array().unwrap().len(), 1);
    assert_eq!(result["authMethods"][0]["id"], "browser");
    assert_eq!(result["agentCapabilities"]["loadSession"], false);
    assert_eq!(
        result["agentCapabilities"]["promptCapabilities"]["embeddedContext"],
        true
    );

    host.shutdown().await;
}

#[tokio::test]
async fn test_new_session_returns_uuid() {
    let mut host = Host::start(Arc::new(ScriptedFactory::default()));

    let session_id = host.open_session().await;

    assert!(uuid::Uuid::parse_str(&session_id).is_ok());
    assert_eq!(host.agent.session_count(), 1);

    host.shutdown().await;
}

#[tokio::test]
async fn test_complex_prompt_sends_plan_before_backend_output() {
    let factory = Arc::new(ScriptedFactory::default());
    let mut host = Host::start(Arc::clone(&factory));
    let session_id = host.open_session().await;

    let (response, mut frames) = host
        .call(
            "session/prompt",
            json!({
                "sessionId": session_id,
                "prompt": [{"type": "text", "text": "first implement X then optimize Y"}]
            }),
        )
        .await;
    assert_eq!(response["result"]["stopReason"], "end_turn");

    // backend output may trail the response
    while !frames
        .iter()
        .any(|f| update_kind(f) == "agent_message_chunk")
    {
        frames.push(host.next_frame().await);
    }

    let kinds: Vec<&str> = frames.iter().map(update_kind).collect();
    assert_eq!(
        kinds,
        vec![
            "user_message_chunk",
            "agent_thought_chunk",
            "plan",
            "agent_message_chunk"
        ]
    );

    let plan = &frames[2]["params"]["update"]["entries"];
    assert_eq!(plan.as_array().unwrap().len(), 3);
    assert_eq!(plan[0]["status"], "in_progress");
    assert_eq!(plan[1]["status"], "pending");
    assert_eq!(frames[2]["params"]["sessionId"], json!(session_id));
    assert_eq!(frames[3]["params"]["update"]["content"]["text"], REPLY);

    let sent = factory.created.lock().last().unwrap().sent.lock().clone();
    assert_eq!(sent, vec!["first implement X then optimize Y"]);

    host.shutdown().await;
}

#[tokio::test]
async fn test_backend_failure_resolves_cancelled() {
    let factory = Arc::new(ScriptedFactory {
        fail_send: true,
        ..ScriptedFactory::default()
    });
    let mut host = Host::start(factory);
    let session_id = host.open_session().await;

    let (response, _) = host
        .call(
            "session/prompt",
            json!({
                "sessionId": session_id,
                "prompt": [{"type": "text", "text": "first implement X then optimize Y"}]
            }),
        )
        .await;

    assert_eq!(response["result"]["stopReason"], "cancelled");

    host.shutdown().await;
}

#[tokio::test]
async fn test_protocol_errors_reach_the_host() {
    let mut host = Host::start(Arc::new(ScriptedFactory::default()));

    let (response, _) = host
        .call("session/new", json!({"cwd": "relative/path", "mcpServers": []}))
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);
    assert_eq!(response["error"]["data"]["target"], "cwd");

    let (response, _) = host.call("session/fork", json!({})).await;
    assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);
    assert_eq!(response["error"]["message"], "Method not found: session/fork");

    let (response, _) = host.call("session/load", json!({})).await;
    assert_eq!(response["error"]["code"], error_codes::METHOD_NOT_FOUND);

    let (response, _) = host
        .call("authenticate", json!({"methodId": "password"}))
        .await;
    assert_eq!(response["error"]["code"], error_codes::INVALID_PARAMS);

    let (response, _) = host
        .call(
            "session/prompt",
            json!({"sessionId": "no-such-session", "prompt": []}),
        )
        .await;
    assert_eq!(response["error"]["code"], error_codes::INTERNAL_ERROR);

    host.shutdown().await;
}

#[tokio::test]
async fn test_malformed_line_does_not_stop_the_bridge() {
    let mut host = Host::start(Arc::new(ScriptedFactory::default()));

    host.writer.write_all(b"{not json}\n").await.unwrap();
    let (response, frames) = host
        .call("initialize", json!({"protocolVersion": 1}))
        .await;

    assert!(frames.is_empty());
    assert_eq!(response["result"]["protocolVersion"], 1);

    host.shutdown().await;
}
