//! Decision agent
//!
//! The agent alternates between planning (observe the page, prompt the model,
//! parse an action batch) and executing the batch through the
//! [`BrowserController`]. A plan ends when the model sends a terminal action,
//! the action budget runs out, or the model fails to produce a usable batch.
//!
//! ```text
//! Idle -> Planning -> Executing -> Planning | Terminated | Failed
//! ```

pub mod action;
pub mod llm;
pub mod memory;
pub mod prompt;

pub use action::{Action, ActionBatch, ProposedAction, TerminalKind};
pub use llm::{CommandModel, LanguageModel};
pub use memory::{AgentMemory, MemoryEntry};

use crate::browser::PageDriver;
use crate::config::AgentConfig;
use crate::controller::{BrowserController, PageState};
use crate::error::AgentError;
use crate::recorder::{ExecutionStep, SessionOutcome, SessionRecord, SessionRecorder, TestVerdict};
use chrono::Utc;
use std::collections::VecDeque;
use std::fmt;

/// Why a plan stopped normally
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The model sent a terminal action
    Signal { kind: TerminalKind, reason: Option<String> },
    /// The action budget was used up
    BudgetExceeded { limit: usize },
}

impl TerminationReason {
    /// `complete` and `end` pass, `error` fails, anything else decides nothing
    pub fn verdict(&self) -> TestVerdict {
        match self {
            TerminationReason::Signal {
                kind: TerminalKind::Complete | TerminalKind::End,
                ..
            } => TestVerdict::Passed,
            TerminationReason::Signal {
                kind: TerminalKind::Error,
                ..
            } => TestVerdict::Failed,
            TerminationReason::Signal {
                kind: TerminalKind::Stop,
                ..
            }
            | TerminationReason::BudgetExceeded { .. } => TestVerdict::Inconclusive,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationReason::Signal { reason: Some(reason), .. } => f.write_str(reason),
            TerminationReason::Signal { kind, reason: None } => write!(f, "{}", kind),
            TerminationReason::BudgetExceeded { limit } => {
                write!(f, "{}", AgentError::BudgetExceeded { limit: *limit })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Planning,
    Executing,
    Terminated(TerminationReason),
    Failed(String),
}

impl AgentState {
    /// Terminated and Failed are final
    pub fn is_finished(&self) -> bool {
        matches!(self, AgentState::Terminated(_) | AgentState::Failed(_))
    }
}

/// Drives a browser toward a goal with the help of a language model
pub struct Agent<D: PageDriver, M: LanguageModel> {
    controller: BrowserController<D>,
    model: M,
    config: AgentConfig,
    memory: AgentMemory,
    state: AgentState,
}

impl<D: PageDriver, M: LanguageModel> Agent<D, M> {
    pub fn new(controller: BrowserController<D>, model: M, config: AgentConfig) -> Self {
        let memory = AgentMemory::new(config.memory_capacity);
        Self {
            controller,
            model,
            config,
            memory,
            state: AgentState::Idle,
        }
    }

    pub fn state(&self) -> &AgentState {
        &self.state
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn memory(&self) -> &AgentMemory {
        &self.memory
    }

    pub fn controller(&self) -> &BrowserController<D> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut BrowserController<D> {
        &mut self.controller
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    /// Run a plan to completion
    pub fn execute_plan(&mut self, goal: &str) -> SessionRecord {
        self.start(goal).finish()
    }

    /// Run a plan that checks the page for an expected outcome
    pub fn execute_test(&mut self, goal: &str, expected_outcome: &str) -> SessionRecord {
        self.start_test(goal, Some(expected_outcome)).finish()
    }

    /// Begin a plan; the returned iterator yields each executed step
    pub fn start(&mut self, goal: &str) -> PlanExecution<'_, D, M> {
        self.start_test(goal, None)
    }

    pub fn start_test(&mut self, goal: &str, expected_outcome: Option<&str>) -> PlanExecution<'_, D, M> {
        log::info!("Starting plan: {}", goal);
        self.memory.clear();
        self.state = AgentState::Planning;

        let mut recorder = SessionRecorder::start(goal);
        if let Some(expected) = expected_outcome {
            recorder = recorder.expecting(expected);
        }
        PlanExecution {
            agent: self,
            recorder,
            pending: VecDeque::new(),
            planner_note: None,
            executed: 0,
        }
    }
}

/// A running plan
///
/// Iterating drives the agent one executed action at a time. The plan is
/// over when the iterator returns `None`; [`finish`](Self::finish) runs any
/// remaining work and returns the session record.
pub struct PlanExecution<'a, D: PageDriver, M: LanguageModel> {
    agent: &'a mut Agent<D, M>,
    recorder: SessionRecorder,
    pending: VecDeque<ProposedAction>,
    planner_note: Option<String>,
    executed: usize,
}

impl<D: PageDriver, M: LanguageModel> PlanExecution<'_, D, M> {
    pub fn state(&self) -> &AgentState {
        &self.agent.state
    }

    /// Steps executed so far
    pub fn steps(&self) -> &[ExecutionStep] {
        self.recorder.steps()
    }

    /// Run the plan to its end and build the session record
    pub fn finish(mut self) -> SessionRecord {
        while self.next().is_some() {}

        let (outcome, verdict, reason) = match &self.agent.state {
            AgentState::Terminated(reason) => (SessionOutcome::Terminated, reason.verdict(), reason.to_string()),
            AgentState::Failed(reason) => (SessionOutcome::Failed, TestVerdict::Inconclusive, reason.clone()),
            other => (
                SessionOutcome::Failed,
                TestVerdict::Inconclusive,
                format!("plan stopped in state {:?}", other),
            ),
        };

        let record = self.recorder.finish(outcome, verdict, reason);
        log::info!("Plan finished: {}", record.summary_line());
        record
    }

    /// Terminates the plan once `max_actions` steps have run
    fn budget_exhausted(&mut self) -> bool {
        let limit = self.agent.config.max_actions;
        if self.executed < limit {
            return false;
        }
        log::info!("Action budget of {} exhausted", limit);
        self.pending.clear();
        self.agent.state = AgentState::Terminated(TerminationReason::BudgetExceeded { limit });
        true
    }

    fn fail(&mut self, error: AgentError) {
        log::warn!("Plan failed: {}", error);
        self.agent.state = AgentState::Failed(error.to_string());
    }

    fn plan(&mut self) {
        let agent = &mut *self.agent;

        let page = agent.controller.observe().unwrap_or_else(|e| {
            log::warn!("Could not observe the page: {}", e);
            PageState::unavailable(e.to_string())
        });
        let available = agent.controller.available_actions();

        let prompt = prompt::build(&prompt::PromptContext {
            goal: self.recorder.goal(),
            expected_outcome: self.recorder.expected_outcome(),
            history: self.recorder.steps(),
            history_window: agent.config.history_window,
            memory: &agent.memory,
            page: &page,
            available_actions: &available,
            max_actions_per_step: agent.config.max_actions_per_step,
        });
        log::debug!("Prompt:\n{}", prompt);

        let output = match agent.model.generate(&prompt) {
            Ok(output) => output,
            Err(e) => return self.fail(AgentError::Model(format!("{:#}", e))),
        };
        log::debug!("Model output:\n{}", output);

        let mut batch = match ActionBatch::parse(&output) {
            Ok(batch) => batch,
            Err(e) => return self.fail(e),
        };
        batch.truncate(self.agent.config.max_actions_per_step);
        batch.drop_chained_terminals();

        log::debug!(
            "Planned {} actions: {}",
            batch.actions.len(),
            batch.actions.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
        );

        self.planner_note = batch.current_state.note();
        self.pending = batch.actions.into();
        self.agent.state = AgentState::Executing;
    }

    fn run(&mut self, proposed: ProposedAction, parsed: Result<Action, AgentError>) -> ExecutionStep {
        let agent = &mut *self.agent;
        let result = parsed.and_then(|action| agent.controller.execute(&action).map_err(AgentError::from));

        let (success, message, error) = match result {
            Ok(outcome) => (true, Some(outcome.message), None),
            Err(e) => {
                log::warn!("Action {} failed: {}", proposed.name, e);
                (false, None, Some(e.to_string()))
            }
        };

        let step = ExecutionStep {
            step_number: self.recorder.next_step_number(),
            action: proposed.name,
            params: proposed.params,
            success,
            message,
            error,
            url: agent.controller.current_url(),
            timestamp: Utc::now(),
        };

        let summary = step
            .message
            .clone()
            .or_else(|| step.error.clone())
            .unwrap_or_default();
        agent.memory.push(MemoryEntry {
            step_number: step.step_number,
            action: step.action.clone(),
            success,
            summary,
            planner_note: self.planner_note.clone(),
        });
        self.recorder.record(step.clone());
        step
    }
}

impl<D: PageDriver, M: LanguageModel> Iterator for PlanExecution<'_, D, M> {
    type Item = ExecutionStep;

    fn next(&mut self) -> Option<ExecutionStep> {
        loop {
            match self.agent.state {
                AgentState::Terminated(_) | AgentState::Failed(_) => return None,
                AgentState::Idle | AgentState::Planning => {
                    if self.budget_exhausted() {
                        return None;
                    }
                    self.plan();
                }
                AgentState::Executing => {
                    let Some(proposed) = self.pending.pop_front() else {
                        self.agent.state = AgentState::Planning;
                        continue;
                    };

                    let parsed = Action::from_proposed(&proposed);
                    if let Ok(Action::Terminal(terminal)) = &parsed {
                        log::info!("Model ended the plan with {}", terminal.kind);
                        self.agent.state = AgentState::Terminated(TerminationReason::Signal {
                            kind: terminal.kind,
                            reason: terminal.reason.clone(),
                        });
                        return None;
                    }

                    if self.budget_exhausted() {
                        return None;
                    }

                    self.executed += 1;
                    let step = self.run(proposed, parsed);
                    if !step.success {
                        // The next prompt shows the failure
                        self.pending.clear();
                        self.agent.state = AgentState::Planning;
                    }
                    return Some(step);
                }
            }
        }
    }
}
