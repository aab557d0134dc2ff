//! Backend over a spawned interactive CLI
//!
//! Spawns the configured executable with piped stdio and relays its output
//! as [`BackendEvent`]s.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::ansi::{clean_output, extract_content, is_connect_prompt};
use super::{Backend, BackendEvent, BackendFactory};
use crate::config::BackendConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::recovery::spawn_logged;

const READ_CHUNK: usize = 4096;
/// How long to wait for output readers to drain after the process exits
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

type SharedStdin = Arc<tokio::sync::Mutex<ChildStdin>>;

/// The live interactive process
struct ChatProcess {
    generation: u64,
    pid: Option<u32>,
    stdin: SharedStdin,
    kill: CancellationToken,
}

/// Backend driving a CLI such as `qwen` over pipes
pub struct CliBackend {
    config: BackendConfig,
    cwd: PathBuf,
    events: mpsc::UnboundedSender<BackendEvent>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<BackendEvent>>>,
    chat: Arc<Mutex<Option<ChatProcess>>>,
    generation: AtomicU64,
}

impl CliBackend {
    pub fn new(config: BackendConfig, cwd: impl Into<PathBuf>) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        Self {
            config,
            cwd: cwd.into(),
            events,
            receiver: Mutex::new(Some(receiver)),
            chat: Arc::new(Mutex::new(None)),
            generation: AtomicU64::new(0),
        }
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Whether an interactive process is currently running
    pub fn is_running(&self) -> bool {
        self.chat.lock().is_some()
    }

    /// The backend's `--version` output
    pub async fn version(&self) -> BridgeResult<String> {
        let limit = Duration::from_secs(self.config.probe_timeout_secs);
        let output = self.run_command(&["--version"], limit).await?;
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn base_command(&self, leading: &[&str]) -> Command {
        let mut cmd = Command::new(&self.config.executable);
        cmd.args(leading)
            .args(&self.config.args)
            .envs(&self.config.env)
            .current_dir(&self.cwd)
            .kill_on_drop(true);
        cmd
    }

    /// Run a one-shot command to completion within `limit`
    async fn run_command(&self, command: &[&str], limit: Duration) -> BridgeResult<Output> {
        let mut cmd = self.base_command(command);
        cmd.stdin(Stdio::null());

        let output = tokio::time::timeout(limit, cmd.output())
            .await
            .map_err(|_| BridgeError::timeout(limit.as_millis() as u64))?
            .map_err(|e| {
                BridgeError::backend_with_context(
                    format!("Failed to run '{}': {}", self.config.executable, e),
                    format!("{} {}", self.config.executable, command.join(" ")),
                )
            })?;

        if !output.status.success() {
            return Err(BridgeError::backend(format!(
                "Command failed with code {}: {}",
                output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output)
    }

    fn interactive_args(&self) -> Vec<&str> {
        match &self.config.model {
            Some(model) => vec!["--model", model.as_str()],
            None => Vec::new(),
        }
    }
}

#[async_trait]
impl Backend for CliBackend {
    async fn start_interactive_session(&self) -> BridgeResult<()> {
        let mut slot = self.chat.lock();
        if slot.is_some() {
            return Err(BridgeError::backend("Chat session already in progress"));
        }

        let mut cmd = self.base_command(&self.interactive_args());
        cmd.env("PWD", &self.cwd)
            .env("PYTHONUNBUFFERED", "1")
            .env("NODE_NO_READLINE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            BridgeError::backend_with_context(
                format!("Failed to spawn '{}': {}", self.config.executable, e),
                format!("Starting interactive session in {}", self.cwd.display()),
            )
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::backend("Failed to get stdin handle"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::backend("Failed to get stdout handle"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BridgeError::backend("Failed to get stderr handle"))?;

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let pid = child.id();
        let stdin: SharedStdin = Arc::new(tokio::sync::Mutex::new(stdin));
        let kill = CancellationToken::new();

        let readers = vec![
            spawn_logged(
                "backend stdout reader",
                read_stdout(
                    stdout,
                    self.config.auto_dismiss_prompts.then(|| Arc::clone(&stdin)),
                    self.events.clone(),
                ),
            ),
            spawn_logged("backend stderr reader", read_stderr(stderr, self.events.clone())),
        ];

        spawn_logged(
            "backend supervisor",
            supervise(
                child,
                readers,
                kill.clone(),
                Arc::clone(&self.chat),
                generation,
                self.events.clone(),
            ),
        );

        tracing::debug!(pid, executable = %self.config.executable, "Backend process started");

        *slot = Some(ChatProcess {
            generation,
            pid,
            stdin,
            kill,
        });
        Ok(())
    }

    async fn send(&self, text: &str) -> BridgeResult<()> {
        let stdin = self
            .chat
            .lock()
            .as_ref()
            .map(|chat| Arc::clone(&chat.stdin))
            .ok_or_else(|| BridgeError::backend("No active chat session"))?;

        tracing::debug!(bytes = text.len(), "Writing prompt to backend");

        let mut stdin = stdin.lock().await;
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|e| BridgeError::backend(format!("Failed to write to backend: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| BridgeError::backend(format!("Failed to flush backend input: {}", e)))?;
        Ok(())
    }

    async fn end(&self) -> BridgeResult<()> {
        if let Some(chat) = self.chat.lock().take() {
            tracing::debug!(pid = chat.pid, "Ending backend session");
            chat.kill.cancel();
        }
        Ok(())
    }

    async fn check_available(&self) -> bool {
        match self.version().await {
            Ok(version) if !version.is_empty() => {
                tracing::debug!(%version, "Backend available");
                true
            }
            Ok(_) => {
                tracing::warn!("Backend printed no version");
                false
            }
            Err(e) => {
                tracing::error!("Failed to check backend setup: {}", e);
                false
            }
        }
    }

    async fn login(&self) -> BridgeResult<()> {
        let limit = Duration::from_secs(self.config.login_timeout_secs);
        tracing::info!(executable = %self.config.executable, "Running backend login");
        self.run_command(&["auth", "login"], limit).await?;
        Ok(())
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<BackendEvent>> {
        self.receiver.lock().take()
    }
}

impl Drop for CliBackend {
    fn drop(&mut self) {
        if let Some(chat) = self.chat.lock().take() {
            chat.kill.cancel();
        }
    }
}

/// Wait for the process to exit or be killed, then report `Ended`
async fn supervise(
    mut child: Child,
    readers: Vec<JoinHandle<()>>,
    kill: CancellationToken,
    chat: Arc<Mutex<Option<ChatProcess>>>,
    generation: u64,
    events: mpsc::UnboundedSender<BackendEvent>,
) {
    let code = tokio::select! {
        status = child.wait() => match status {
            Ok(status) => status.code(),
            Err(e) => {
                tracing::error!("Failed to wait for backend process: {}", e);
                None
            }
        },
        _ = kill.cancelled() => {
            if let Err(e) = child.kill().await {
                tracing::warn!("Failed to kill backend process: {}", e);
            }
            None
        }
    };

    {
        let mut slot = chat.lock();
        if slot.as_ref().is_some_and(|c| c.generation == generation) {
            *slot = None;
        }
    }

    for reader in readers {
        if tokio::time::timeout(DRAIN_TIMEOUT, reader).await.is_err() {
            tracing::debug!("Backend output reader still open after exit");
        }
    }

    tracing::info!(exit_code = ?code, "Backend process ended");
    let _ = events.send(BackendEvent::Ended(code));
}

async fn read_stdout<R>(
    mut stdout: R,
    responder: Option<SharedStdin>,
    events: mpsc::UnboundedSender<BackendEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];
    let mut pending = Vec::new();

    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                tracing::warn!("Backend stdout read failed: {}", e);
                break;
            }
        };
        pending.extend_from_slice(&buf[..n]);
        let chunk = take_utf8(&mut pending);
        if chunk.is_empty() {
            continue;
        }

        tracing::trace!(length = chunk.len(), "Backend output received");

        if is_connect_prompt(&chunk) {
            if let Some(stdin) = &responder {
                tracing::debug!("Dismissing editor connection prompt");
                let mut stdin = stdin.lock().await;
                if let Err(e) = stdin.write_all(b"2\n").await {
                    tracing::warn!("Failed to answer connection prompt: {}", e);
                }
                let _ = stdin.flush().await;
                continue;
            }
        }

        let content = extract_content(&chunk);
        if !content.is_empty() && events.send(BackendEvent::Message(content)).is_err() {
            break;
        }
    }
}

async fn read_stderr<R>(stderr: R, events: mpsc::UnboundedSender<BackendEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = clean_output(&line);
                if !line.is_empty() && events.send(BackendEvent::Error(line)).is_err() {
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!("Backend stderr read failed: {}", e);
                break;
            }
        }
    }
}

/// Drain the longest valid UTF-8 prefix, keeping an incomplete trailing
/// character for the next read. Invalid bytes are replaced.
fn take_utf8(pending: &mut Vec<u8>) -> String {
    let keep_from = match std::str::from_utf8(pending) {
        Ok(_) => pending.len(),
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        Err(_) => pending.len(),
    };
    let rest = pending.split_off(keep_from);
    let text = String::from_utf8_lossy(pending).into_owned();
    *pending = rest;
    text
}

/// Builds a [`CliBackend`] per working directory
#[derive(Debug, Clone, Default)]
pub struct CliBackendFactory {
    config: BackendConfig,
}

impl CliBackendFactory {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }
}

impl BackendFactory for CliBackendFactory {
    fn create(&self, cwd: &Path) -> Arc<dyn Backend> {
        Arc::new(CliBackend::new(self.config.clone(), cwd))
    }
}
