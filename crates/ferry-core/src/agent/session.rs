//! Per-conversation state owned by the orchestrator

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use tokio_util::sync::CancellationToken;

use super::plan::ExecutionPlan;
use crate::acp::McpServer;
use crate::backend::Backend;
use crate::config::PermissionMode;

/// Most files remembered per session
pub const MAX_ACTIVE_FILES: usize = 100;

/// Bounded set of referenced files that forgets its oldest entry when full
///
/// Seeing a file again does not refresh it.
#[derive(Debug)]
pub struct ActiveFiles {
    files: LruCache<String, ()>,
}

impl ActiveFiles {
    /// A capacity of 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            files: LruCache::new(capacity),
        }
    }

    /// Remember a file; returns false if it was already known
    pub fn insert(&mut self, file: impl Into<String>) -> bool {
        let file = file.into();
        if self.files.contains(&file) {
            return false;
        }
        self.files.put(file, ());
        true
    }

    pub fn contains(&self, file: &str) -> bool {
        self.files.contains(file)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.files.iter().rev().map(|(file, _)| file.as_str())
    }
}

impl Default for ActiveFiles {
    fn default() -> Self {
        Self::new(MAX_ACTIVE_FILES)
    }
}

/// One live conversation
///
/// The backend handle belongs to the session and goes away with it; the
/// orchestrator discards the session's context window at the same time.
pub struct Session {
    pub id: String,
    pub cwd: PathBuf,
    pub mcp_servers: Vec<McpServer>,
    pub permission_mode: PermissionMode,
    pub thought_streaming: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub turn_count: u32,
    pub plan: Option<ExecutionPlan>,
    pub active_files: ActiveFiles,
    backend: Arc<dyn Backend>,
    pump: CancellationToken,
}

impl Session {
    pub(crate) fn new(
        id: String,
        cwd: PathBuf,
        mcp_servers: Vec<McpServer>,
        permission_mode: PermissionMode,
        thought_streaming: bool,
        backend: Arc<dyn Backend>,
        pump: CancellationToken,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            cwd,
            mcp_servers,
            permission_mode,
            thought_streaming,
            created_at: now,
            last_activity_at: now,
            turn_count: 0,
            plan: None,
            active_files: ActiveFiles::default(),
            backend,
            pump,
        }
    }

    pub fn backend(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.backend)
    }

    /// Record an accepted prompt
    pub fn begin_turn(&mut self) {
        self.turn_count += 1;
        self.last_activity_at = Utc::now();
    }

    /// Whether `max_turns` prompts have already been accepted; 0 is unlimited
    pub fn turn_limit_reached(&self, max_turns: u32) -> bool {
        max_turns > 0 && self.turn_count >= max_turns
    }

    /// Stop relaying backend events for this session
    pub(crate) fn stop_pump(&self) {
        self.pump.cancel();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("cwd", &self.cwd)
            .field("permission_mode", &self.permission_mode)
            .field("turn_count", &self.turn_count)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}
