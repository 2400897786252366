//! Step history and the session artifact of one plan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// One executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStep {
    /// 1-based position in the plan
    pub step_number: usize,
    pub action: String,
    pub params: Value,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page URL right after the action ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// How a plan ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    Terminated,
    Failed,
}

/// Whether the tested behaviour held
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestVerdict {
    Passed,
    Failed,
    /// The plan ended without the model deciding either way
    Inconclusive,
}

impl TestVerdict {
    pub fn name(self) -> &'static str {
        match self {
            TestVerdict::Passed => "passed",
            TestVerdict::Failed => "failed",
            TestVerdict::Inconclusive => "inconclusive",
        }
    }
}

/// Serializable summary of one plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outcome: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub outcome: SessionOutcome,
    pub verdict: TestVerdict,
    pub terminal_reason: String,
    pub steps: Vec<ExecutionStep>,
}

impl SessionRecord {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the record as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = self.to_json().map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn summary_line(&self) -> String {
        let outcome = match self.outcome {
            SessionOutcome::Terminated => "terminated",
            SessionOutcome::Failed => "failed",
        };
        format!(
            "{} ({}) after {} steps ({} ok, {} failed) in {} ms: {}",
            self.verdict.name(),
            outcome,
            self.total_steps, self.successful_steps, self.failed_steps, self.duration_ms, self.terminal_reason
        )
    }
}

/// Collects the steps of a running plan
#[derive(Debug, Clone)]
pub struct SessionRecorder {
    goal: String,
    expected_outcome: Option<String>,
    started_at: DateTime<Utc>,
    steps: Vec<ExecutionStep>,
}

impl SessionRecorder {
    pub fn start(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            expected_outcome: None,
            started_at: Utc::now(),
            steps: Vec::new(),
        }
    }

    /// Builder method: set the outcome the test expects
    pub fn expecting(mut self, expected_outcome: impl Into<String>) -> Self {
        self.expected_outcome = Some(expected_outcome.into());
        self
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn expected_outcome(&self) -> Option<&str> {
        self.expected_outcome.as_deref()
    }

    pub fn record(&mut self, step: ExecutionStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    /// Number the next recorded step gets
    pub fn next_step_number(&self) -> usize {
        self.steps.len() + 1
    }

    pub fn finish(
        self,
        outcome: SessionOutcome,
        verdict: TestVerdict,
        terminal_reason: impl Into<String>,
    ) -> SessionRecord {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - self.started_at).num_milliseconds().max(0) as u64;
        let successful_steps = self.steps.iter().filter(|step| step.success).count();

        SessionRecord {
            goal: self.goal,
            expected_outcome: self.expected_outcome,
            started_at: self.started_at,
            finished_at,
            duration_ms,
            total_steps: self.steps.len(),
            successful_steps,
            failed_steps: self.steps.len() - successful_steps,
            outcome,
            verdict,
            terminal_reason: terminal_reason.into(),
            steps: self.steps,
        }
    }
}
