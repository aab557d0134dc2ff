//! Session orchestration
//!
//! [`BridgeAgent`] implements the agent side of ACP on top of interactive
//! backend sessions. It owns every [`Session`], classifies prompts to decide
//! whether the host sees a thought and an [`ExecutionPlan`], and relays
//! backend output back as session updates.

pub mod complexity;
pub mod orchestrator;
pub mod plan;
pub mod session;

pub use crate::config::PermissionMode;
pub use complexity::{PromptAnalysis, analyze_prompt};
pub use orchestrator::{AUTH_METHOD_ID, BridgeAgent, PROBE_CIRCUIT};
pub use plan::{ExecutionPlan, PlanStep, StepStatus};
pub use session::{ActiveFiles, MAX_ACTIVE_FILES, Session};
