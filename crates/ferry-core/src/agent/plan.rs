//! Execution plans synthesized for complex prompts
//!
//! Step status only moves forward (pending, in progress, then completed or
//! failed) and at most one step is in progress at any time.

use crate::acp::{PlanEntry, PlanEntryPriority, PlanEntryStatus};

use super::complexity::PromptAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    fn can_become(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::InProgress, Self::Failed)
        )
    }

    /// Wire status; the wire has no failed state so failed steps read as pending
    fn to_wire(self) -> PlanEntryStatus {
        match self {
            Self::Pending | Self::Failed => PlanEntryStatus::Pending,
            Self::InProgress => PlanEntryStatus::InProgress,
            Self::Completed => PlanEntryStatus::Completed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub title: String,
    pub description: String,
    status: StepStatus,
    error: Option<String>,
}

impl PlanStep {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: StepStatus::Pending,
            error: None,
        }
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn transition(&mut self, next: StepStatus) -> bool {
        if !self.status.can_become(next) {
            return false;
        }
        self.status = next;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    /// Plan from pending steps, starting the first one
    pub fn new(steps: Vec<PlanStep>) -> Self {
        let mut plan = Self { steps };
        if let Some(first) = plan.steps.first_mut() {
            first.transition(StepStatus::InProgress);
        }
        plan
    }

    /// Three steps for prompts estimated at three or more, otherwise one
    pub fn for_prompt(analysis: &PromptAnalysis) -> Self {
        if analysis.estimated_steps >= 3 {
            Self::new(vec![
                PlanStep::new("Analyze requirements and approach", analysis.summary.clone()),
                PlanStep::new(
                    "Execute main implementation",
                    "Process and execute the required changes",
                ),
                PlanStep::new(
                    "Validate and finalize changes",
                    "Verify and complete the implementation",
                ),
            ])
        } else {
            Self::new(vec![PlanStep::new(
                analysis.summary.clone(),
                "Process the request",
            )])
        }
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Index of the step in progress
    pub fn current(&self) -> Option<usize> {
        self.steps
            .iter()
            .position(|step| step.status == StepStatus::InProgress)
    }

    /// Complete the step in progress and start the next pending one
    ///
    /// Returns false when nothing was in progress.
    pub fn complete_current_and_promote(&mut self) -> bool {
        let Some(current) = self.current() else {
            return false;
        };
        self.steps[current].transition(StepStatus::Completed);

        if let Some(next) = self
            .steps
            .iter_mut()
            .find(|step| step.status == StepStatus::Pending)
        {
            next.transition(StepStatus::InProgress);
        }
        true
    }

    /// Fail the step in progress, recording why
    ///
    /// Returns false when nothing was in progress.
    pub fn fail_current(&mut self, error: impl Into<String>) -> bool {
        let Some(current) = self.current() else {
            return false;
        };
        let step = &mut self.steps[current];
        step.transition(StepStatus::Failed);
        step.error = Some(error.into());
        true
    }

    /// Whether every step has finished, successfully or not
    pub fn is_finished(&self) -> bool {
        self.steps
            .iter()
            .all(|step| matches!(step.status, StepStatus::Completed | StepStatus::Failed))
    }

    /// Entries for a `plan` session update
    pub fn to_entries(&self) -> Vec<PlanEntry> {
        self.steps
            .iter()
            .map(|step| PlanEntry {
                content: format!("{}: {}", step.title, step.description),
                priority: PlanEntryPriority::Medium,
                status: step.status.to_wire(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::complexity::analyze_prompt;

    fn three_step() -> ExecutionPlan {
        ExecutionPlan::for_prompt(&analyze_prompt("first implement X then optimize Y"))
    }

    fn in_progress(plan: &ExecutionPlan) -> usize {
        plan.steps()
            .iter()
            .filter(|s| s.status() == StepStatus::InProgress)
            .count()
    }

    #[test]
    fn test_three_step_plan_starts_first_step() {
        let plan = three_step();
        assert_eq!(plan.len(), 3);
        assert_eq!(plan.current(), Some(0));
        assert_eq!(plan.steps()[1].status(), StepStatus::Pending);
        assert_eq!(
            plan.steps()[0].description,
            "first implement X then optimize Y"
        );
    }

    #[test]
    fn test_single_step_plan() {
        let plan = ExecutionPlan::for_prompt(&analyze_prompt("create a cache and migrate callers"));
        assert_eq!(plan.len(), 1);
        assert_eq!(
            plan.to_entries()[0].content,
            "create a cache and migrate callers: Process the request"
        );
    }

    #[test]
    fn test_promotion_walks_forward() {
        let mut plan = three_step();

        assert!(plan.complete_current_and_promote());
        assert_eq!(plan.steps()[0].status(), StepStatus::Completed);
        assert_eq!(plan.current(), Some(1));
        assert_eq!(plan.steps()[2].status(), StepStatus::Pending);
        assert_eq!(in_progress(&plan), 1);

        assert!(plan.complete_current_and_promote());
        assert!(plan.complete_current_and_promote());
        assert!(plan.is_finished());
        assert_eq!(in_progress(&plan), 0);

        assert!(!plan.complete_current_and_promote());
    }

    #[test]
    fn test_never_more_than_one_in_progress() {
        let mut plan = three_step();
        for _ in 0..5 {
            plan.complete_current_and_promote();
            assert!(in_progress(&plan) <= 1);
        }
    }

    #[test]
    fn test_failure_records_error_and_stops_progress() {
        let mut plan = three_step();
        assert!(plan.fail_current("backend crashed"));

        assert_eq!(plan.steps()[0].status(), StepStatus::Failed);
        assert_eq!(plan.steps()[0].error(), Some("backend crashed"));
        assert_eq!(plan.current(), None);
        assert!(!plan.complete_current_and_promote());
        assert!(!plan.fail_current("again"));
    }

    #[test]
    fn test_wire_entries() {
        let mut plan = three_step();
        plan.fail_current("boom");

        let entries = plan.to_entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries[0].content,
            "Analyze requirements and approach: first implement X then optimize Y"
        );
        assert!(entries.iter().all(|e| e.priority == PlanEntryPriority::Medium));
        // failed has no wire form
        assert_eq!(entries[0].status, PlanEntryStatus::Pending);
    }

    #[test]
    fn test_status_never_moves_backward() {
        let mut step = PlanStep::new("a", "b");
        assert!(step.transition(StepStatus::InProgress));
        assert!(step.transition(StepStatus::Completed));
        assert!(!step.transition(StepStatus::InProgress));
        assert!(!step.transition(StepStatus::Pending));
        assert_eq!(step.status(), StepStatus::Completed);
    }
}
