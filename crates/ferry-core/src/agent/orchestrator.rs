//! ACP agent backed by interactive CLI sessions

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::complexity::analyze_prompt;
use super::plan::ExecutionPlan;
use super::session::Session;
use crate::acp::{
    Agent, AgentCapabilities, AuthMethod, AuthenticateRequest, CancelNotification, Client,
    ContentBlock, EmbeddedResource, InitializeRequest, InitializeResponse, NewSessionRequest,
    NewSessionResponse, PROTOCOL_VERSION, PromptCapabilities, PromptRequest, PromptResponse,
    SessionNotification, SessionUpdate, StopReason,
};
use crate::backend::{BackendEvent, BackendFactory};
use crate::config::BridgeConfig;
use crate::context::{ContextEvent, ContextMessage, ContextMonitor, ContextWindow, ThresholdLevel};
use crate::error::{BridgeError, BridgeResult, UnifiedError};
use crate::protocol::RpcError;
use crate::recovery::{CircuitBreaker, CircuitBreakerStats, spawn_logged};

/// The one supported authentication method
pub const AUTH_METHOD_ID: &str = "browser";

/// Name of the circuit guarding backend probes
pub const PROBE_CIRCUIT: &str = "backend-probe";

/// Output containing any of these completes the current plan step
const COMPLETION_WORDS: [&str; 6] = ["completed", "finished", "done", "ready", "implemented", "fixed"];

/// State shared with the per-session event pumps
struct AgentCore {
    client: Arc<dyn Client>,
    config: BridgeConfig,
    sessions: Mutex<HashMap<String, Session>>,
    /// One window per live session, keyed by session id
    context: Mutex<ContextMonitor>,
}

impl AgentCore {
    fn with_session<R>(&self, session_id: &str, f: impl FnOnce(&mut Session) -> R) -> BridgeResult<R> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| BridgeError::session_not_found(session_id))?;
        Ok(f(session))
    }

    async fn notify(&self, session_id: &str, update: SessionUpdate) -> BridgeResult<()> {
        self.client
            .session_update(SessionNotification {
                session_id: session_id.to_string(),
                update,
            })
            .await
    }

    /// Account for one message, trimming the window when it runs critical
    fn record_message(&self, session_id: &str, message: ContextMessage) {
        let mut context = self.context.lock();
        match context.add_message(session_id, message) {
            Ok(Some(ThresholdLevel::Critical)) => {
                let target = self.config.context.cleanup_target_percentage;
                let removed = context.cleanup_context(session_id, target);
                tracing::info!(session_id, removed, "Context window trimmed to {}%", target);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(session_id, "Failed to record message: {}", e),
        }
    }

    /// Stop the session's backend relay and discard its context window
    fn release(&self, session: &Session) {
        session.stop_pump();
        self.context.lock().remove_context_window(&session.id);
    }

    /// Relay cleaned backend output to the host
    async fn relay_output(&self, session_id: &str, content: String) -> BridgeResult<()> {
        let plan = {
            let mut sessions = self.sessions.lock();
            let Some(session) = sessions.get_mut(session_id) else {
                return Ok(());
            };

            self.record_message(session_id, ContextMessage::assistant(content.as_str()));

            let lower = content.to_lowercase();
            let signals_completion = COMPLETION_WORDS.iter().any(|word| lower.contains(word));
            if !signals_completion {
                None
            } else {
                session
                    .plan
                    .as_mut()
                    .and_then(|plan| plan.complete_current_and_promote().then(|| plan.to_entries()))
            }
        };

        if let Some(entries) = plan {
            self.notify(session_id, SessionUpdate::Plan { entries }).await?;
        }

        self.notify(
            session_id,
            SessionUpdate::AgentMessageChunk {
                content: ContentBlock::text(content),
            },
        )
        .await
    }

    /// Relay a backend failure, failing the plan step in progress
    async fn relay_error(&self, session_id: &str, message: String) -> BridgeResult<()> {
        let plan = {
            let mut sessions = self.sessions.lock();
            let Some(session) = sessions.get_mut(session_id) else {
                return Ok(());
            };
            session
                .plan
                .as_mut()
                .and_then(|plan| plan.fail_current(message.as_str()).then(|| plan.to_entries()))
        };

        tracing::warn!(session_id, "Backend error: {}", message);

        if let Some(entries) = plan {
            self.notify(session_id, SessionUpdate::Plan { entries }).await?;
        }

        self.notify(
            session_id,
            SessionUpdate::AgentMessageChunk {
                content: ContentBlock::text(format!("[Error] {}", message)),
            },
        )
        .await
    }
}

/// Drain one session's backend events until the channel closes or `stop` fires
fn spawn_event_pump(
    core: Arc<AgentCore>,
    session_id: String,
    mut events: mpsc::UnboundedReceiver<BackendEvent>,
    stop: CancellationToken,
) -> JoinHandle<()> {
    spawn_logged("event pump", async move {
        loop {
            let event = tokio::select! {
                _ = stop.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let relayed = match event {
                BackendEvent::Message(content) => core.relay_output(&session_id, content).await,
                BackendEvent::Error(message) => core.relay_error(&session_id, message).await,
                BackendEvent::Ended(code) => {
                    tracing::info!(session_id = %session_id, exit_code = ?code, "Backend session ended");
                    Ok(())
                }
            };

            if let Err(e) = relayed {
                tracing::warn!(session_id = %session_id, "Failed to relay backend event: {}", e);
            }
        }
        tracing::debug!(session_id = %session_id, "Event pump stopped");
    })
}

/// Text the backend receives for a prompt; non-text blocks are dropped
fn prompt_text(prompt: &[ContentBlock]) -> String {
    prompt
        .iter()
        .filter_map(ContentBlock::as_text)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Files the prompt refers to, by URI
fn referenced_files(prompt: &[ContentBlock]) -> impl Iterator<Item = &str> {
    prompt.iter().filter_map(|block| match block {
        ContentBlock::ResourceLink { uri, .. } => Some(uri.as_str()),
        ContentBlock::Resource { resource, .. } => match resource {
            EmbeddedResource::Text { uri, .. } | EmbeddedResource::Blob { uri, .. } => {
                Some(uri.as_str())
            }
        },
        _ => None,
    })
}

/// Session orchestrator implementing the agent side of ACP
pub struct BridgeAgent {
    core: Arc<AgentCore>,
    backends: Arc<dyn BackendFactory>,
    probe: CircuitBreaker,
    destroyed: AtomicBool,
}

impl BridgeAgent {
    pub fn new(
        client: Arc<dyn Client>,
        backends: Arc<dyn BackendFactory>,
        config: BridgeConfig,
    ) -> Self {
        let probe = CircuitBreaker::with_config(PROBE_CIRCUIT, config.circuit_breaker.clone());
        let context = ContextMonitor::new(config.context.clone());
        let agent = Self {
            core: Arc::new(AgentCore {
                client,
                config,
                sessions: Mutex::new(HashMap::new()),
                context: Mutex::new(context),
            }),
            backends,
            probe,
            destroyed: AtomicBool::new(false),
        };
        agent.log_startup_configuration();
        agent
    }

    fn log_startup_configuration(&self) {
        let config = &self.core.config;
        tracing::info!("=== Ferry ACP Bridge Configuration ===");
        tracing::info!("Backend: {}", config.backend.executable);
        tracing::info!("Permission Mode: {}", config.permission_mode);
        tracing::info!(
            "Debug Mode: {}",
            if config.debug { "enabled" } else { "disabled" }
        );
        tracing::info!(
            "Context Monitoring: active ({} token limit)",
            config.context.max_tokens
        );
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.core.config
    }

    pub fn session_count(&self) -> usize {
        self.core.sessions.lock().len()
    }

    /// Read a session's state
    pub fn inspect_session<R>(&self, session_id: &str, f: impl FnOnce(&Session) -> R) -> Option<R> {
        self.core.sessions.lock().get(session_id).map(f)
    }

    /// Read a session's context window
    pub fn inspect_context<R>(
        &self,
        session_id: &str,
        f: impl FnOnce(&ContextWindow) -> R,
    ) -> Option<R> {
        self.core.context.lock().context_window(session_id).map(f)
    }

    /// Threshold and update events for every session
    pub fn subscribe_context(&self) -> broadcast::Receiver<ContextEvent> {
        self.core.context.lock().subscribe()
    }

    /// Snapshot of the circuit guarding backend probes
    pub fn probe_stats(&self) -> CircuitBreakerStats {
        self.probe.stats()
    }

    /// Terminate one session's backend and drop its state
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let Some(session) = self.core.sessions.lock().remove(session_id) else {
            return false;
        };
        self.core.release(&session);
        if let Err(e) = session.backend().end().await {
            tracing::warn!(session_id, "Failed to end backend: {}", e);
        }
        tracing::info!(session_id, "Session removed");
        true
    }

    /// Terminate every session and stop background work. Idempotent.
    pub async fn destroy(&self) {
        let sessions: Vec<Session> = {
            let mut map = self.core.sessions.lock();
            map.drain().map(|(_, session)| session).collect()
        };

        for session in &sessions {
            self.core.release(session);
            if let Err(e) = session.backend().end().await {
                tracing::warn!(session_id = %session.id, "Failed to end backend: {}", e);
            }
        }

        self.probe.dispose();
        if !self.destroyed.swap(true, Ordering::SeqCst) {
            tracing::info!(sessions = sessions.len(), "Bridge agent destroyed");
        }
    }

    async fn probe_backend(&self) {
        let cwd = std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir());
        let backend = self.backends.create(&cwd);

        let outcome = self
            .probe
            .call(|| async move {
                if backend.check_available().await {
                    Ok(())
                } else {
                    Err(BridgeError::backend("Backend CLI not found or not properly set up"))
                }
            })
            .await;

        match outcome {
            Ok(()) => tracing::debug!("Backend probe succeeded"),
            Err(e) if e.is_open() => tracing::warn!("Backend probe skipped: {}", e),
            Err(e) => tracing::warn!("Backend probe failed: {}", e),
        }
    }
}

#[async_trait]
impl Agent for BridgeAgent {
    async fn initialize(&self, params: InitializeRequest) -> BridgeResult<InitializeResponse> {
        tracing::info!(
            protocol_version = params.protocol_version,
            "Initializing agent"
        );

        self.probe_backend().await;

        Ok(InitializeResponse {
            protocol_version: PROTOCOL_VERSION,
            agent_capabilities: AgentCapabilities {
                load_session: false,
                prompt_capabilities: PromptCapabilities {
                    audio: false,
                    image: false,
                    embedded_context: true,
                },
            },
            auth_methods: vec![AuthMethod {
                id: AUTH_METHOD_ID.to_string(),
                name: "Authenticate with Browser".to_string(),
                description: Some(format!(
                    "Uses browser-based authentication for {}",
                    self.core.config.backend.executable
                )),
            }],
        })
    }

    async fn authenticate(&self, params: AuthenticateRequest) -> BridgeResult<()> {
        tracing::info!(method_id = %params.method_id, "Authenticating");

        if params.method_id != AUTH_METHOD_ID {
            return Err(RpcError::invalid_params(Some(format!(
                "Only {} authentication is supported",
                AUTH_METHOD_ID
            )))
            .into());
        }

        let cwd = std::env::current_dir().unwrap_or_else(|_| std::env::temp_dir());
        self.backends.create(&cwd).login().await.map_err(|e| {
            tracing::error!(
                error_code = e.error_code(),
                retryable = e.is_retryable(),
                "Backend login failed: {}",
                e
            );
            BridgeError::from(RpcError::auth_required(Some(format!(
                "Authentication failed: {}",
                e
            ))))
        })
    }

    async fn new_session(&self, params: NewSessionRequest) -> BridgeResult<NewSessionResponse> {
        let session_id = Uuid::new_v4().to_string();
        tracing::info!(session_id = %session_id, cwd = %params.cwd.display(), "Creating new session");

        let cwd: PathBuf = params.cwd;
        let backend = self.backends.create(&cwd);
        let events = backend
            .take_events()
            .ok_or_else(|| BridgeError::backend("Backend event stream already taken"))?;
        backend.start_interactive_session().await?;

        let config = &self.core.config;
        self.core.context.lock().create_context_window(&session_id);

        let pump = CancellationToken::new();
        let session = Session::new(
            session_id.clone(),
            cwd,
            params.mcp_servers,
            config.permission_mode,
            config.thought_streaming,
            backend,
            pump.clone(),
        );
        self.core.sessions.lock().insert(session_id.clone(), session);

        spawn_event_pump(Arc::clone(&self.core), session_id.clone(), events, pump);

        Ok(NewSessionResponse { session_id })
    }

    async fn prompt(&self, params: PromptRequest) -> BridgeResult<PromptResponse> {
        let session_id = params.session_id.as_str();
        tracing::info!(session_id, "Processing prompt");

        let text = prompt_text(&params.prompt);
        let analysis = analyze_prompt(&text);
        let max_turns = self.core.config.max_turns;

        let accepted = self.core.with_session(session_id, |session| {
            if session.turn_limit_reached(max_turns) {
                return None;
            }
            session.begin_turn();
            for file in referenced_files(&params.prompt) {
                session.active_files.insert(file);
            }
            self.core.record_message(session_id, ContextMessage::user(text.as_str()));
            Some((session.backend(), session.thought_streaming))
        })?;

        let Some((backend, thought_streaming)) = accepted else {
            tracing::warn!(session_id, max_turns, "Turn limit reached");
            return Ok(PromptResponse {
                stop_reason: StopReason::MaxTurnRequests,
            });
        };

        self.core
            .notify(
                session_id,
                SessionUpdate::UserMessageChunk {
                    content: ContentBlock::text(text.as_str()),
                },
            )
            .await?;

        if thought_streaming && analysis.is_complex {
            self.core
                .notify(
                    session_id,
                    SessionUpdate::AgentThoughtChunk {
                        content: ContentBlock::text(format!(
                            "Analyzing request: {}",
                            analysis.summary
                        )),
                    },
                )
                .await?;
        }

        if analysis.needs_plan {
            let plan = ExecutionPlan::for_prompt(&analysis);
            let entries = plan.to_entries();
            self.core
                .with_session(session_id, |session| session.plan = Some(plan))?;
            self.core
                .notify(session_id, SessionUpdate::Plan { entries })
                .await?;
        }

        let stop_reason = match backend.send(&text).await {
            Ok(()) => StopReason::EndTurn,
            Err(e) => {
                tracing::error!(
                    session_id,
                    error_code = e.error_code(),
                    "Error processing prompt: {}",
                    e
                );
                StopReason::Cancelled
            }
        };

        Ok(PromptResponse { stop_reason })
    }

    async fn cancel(&self, params: CancelNotification) -> BridgeResult<()> {
        tracing::info!(session_id = %params.session_id, "Cancelling request");
        let backend = self
            .core
            .with_session(&params.session_id, |session| session.backend())?;
        backend.end().await
    }
}
