//! The action vocabulary and parsing of model output into action batches

use crate::error::AgentError;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;
use std::fmt;

pub const NAVIGATE_TO: &str = "navigate_to";
pub const GO_BACK: &str = "go_back";
pub const OPEN_TAB: &str = "open_tab";
pub const SWITCH_TAB: &str = "switch_tab";
pub const CLOSE_TAB: &str = "close_tab";
pub const CLICK_ELEMENT: &str = "click_element";
pub const INPUT_TEXT: &str = "input_text";

/// Parameters for `navigate_to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NavigateParams {
    /// URL to load; a missing scheme is filled in
    pub url: String,
}

/// Parameters for `open_tab`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct OpenTabParams {
    /// URL to load in the new tab
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Parameters for `switch_tab` and `close_tab`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TabParams {
    /// Zero-based tab index
    #[serde(deserialize_with = "index_from_number_or_string")]
    #[schemars(with = "usize")]
    pub index: usize,
}

/// Parameters for `click_element`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ClickParams {
    /// Element index from the page listing
    #[serde(deserialize_with = "index_from_number_or_string")]
    #[schemars(with = "usize")]
    pub index: usize,
}

/// Parameters for `input_text`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct InputTextParams {
    /// Element index from the page listing
    #[serde(deserialize_with = "index_from_number_or_string")]
    #[schemars(with = "usize")]
    pub index: usize,

    /// Text that replaces the current content
    pub text: String,
}

/// Parameters for the terminal actions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TerminalParams {
    /// Why the plan ends
    #[serde(default, alias = "message", skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Actions that end a plan instead of touching the browser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalKind {
    Stop,
    Complete,
    Error,
    End,
}

impl TerminalKind {
    pub const ALL: [TerminalKind; 4] = [Self::Stop, Self::Complete, Self::Error, Self::End];

    pub fn name(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Complete => "complete",
            Self::Error => "error",
            Self::End => "end",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for TerminalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A terminal action with its optional reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalAction {
    pub kind: TerminalKind,
    pub reason: Option<String>,
}

/// One validated command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    NavigateTo(NavigateParams),
    GoBack,
    OpenTab(OpenTabParams),
    SwitchTab(TabParams),
    CloseTab(TabParams),
    ClickElement(ClickParams),
    InputText(InputTextParams),
    Terminal(TerminalAction),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::NavigateTo(_) => NAVIGATE_TO,
            Action::GoBack => GO_BACK,
            Action::OpenTab(_) => OPEN_TAB,
            Action::SwitchTab(_) => SWITCH_TAB,
            Action::CloseTab(_) => CLOSE_TAB,
            Action::ClickElement(_) => CLICK_ELEMENT,
            Action::InputText(_) => INPUT_TEXT,
            Action::Terminal(terminal) => terminal.kind.name(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Terminal(_))
    }

    /// Validate a proposed action against the vocabulary
    pub fn from_proposed(proposed: &ProposedAction) -> Result<Self, AgentError> {
        let name = proposed.name.as_str();
        let params = &proposed.params;

        if let Some(kind) = TerminalKind::from_name(name) {
            let reason = match params {
                Value::String(reason) => Some(reason.clone()),
                _ => parse_params::<TerminalParams>(name, params)?.reason,
            };
            return Ok(Action::Terminal(TerminalAction { kind, reason }));
        }

        match name {
            NAVIGATE_TO => Ok(Action::NavigateTo(parse_params(name, params)?)),
            GO_BACK => Ok(Action::GoBack),
            OPEN_TAB => Ok(Action::OpenTab(parse_params(name, params)?)),
            SWITCH_TAB => Ok(Action::SwitchTab(parse_params(name, params)?)),
            CLOSE_TAB => Ok(Action::CloseTab(parse_params(name, params)?)),
            CLICK_ELEMENT => Ok(Action::ClickElement(parse_params(name, params)?)),
            INPUT_TEXT => Ok(Action::InputText(parse_params(name, params)?)),
            _ => Err(AgentError::UnknownAction(name.to_string())),
        }
    }
}

fn parse_params<P: de::DeserializeOwned>(action: &str, params: &Value) -> Result<P, AgentError> {
    let params = match params {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| AgentError::InvalidParams {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

fn index_from_number_or_string<'de, D>(deserializer: D) -> Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawIndex {
        Number(usize),
        Text(String),
    }

    match RawIndex::deserialize(deserializer)? {
        RawIndex::Number(index) => Ok(index),
        RawIndex::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("'{}' is not a valid index", text))),
    }
}

/// An action as the model wrote it, before validation
#[derive(Debug, Clone, PartialEq)]
pub struct ProposedAction {
    pub name: String,
    pub params: Value,
}

impl ProposedAction {
    pub fn new(name: impl Into<String>, params: Value) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn is_terminal(&self) -> bool {
        TerminalKind::from_name(&self.name).is_some()
    }
}

/// The model's commentary on the page state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerState {
    pub evaluation_previous_goal: Option<String>,
    pub memory: Option<String>,
    pub next_goal: Option<String>,
}

impl PlannerState {
    /// Note stored in memory next to every action of the batch
    pub fn note(&self) -> Option<String> {
        let parts: Vec<&str> = [self.memory.as_deref(), self.next_goal.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" | "))
    }
}

/// One model response: commentary plus the actions to run in order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionBatch {
    pub current_state: PlannerState,
    pub actions: Vec<ProposedAction>,
}

impl ActionBatch {
    /// Parse model output, making one repair attempt when the text is not a valid batch
    pub fn parse(output: &str) -> Result<Self, AgentError> {
        match Self::decode(output) {
            Ok(batch) => Ok(batch),
            Err(first) => {
                let Some(repaired) = repair(output) else {
                    return Err(first);
                };
                log::warn!("Model output was not a valid batch ({}), retrying after repair", first);
                Self::decode(&repaired)
            }
        }
    }

    fn decode(text: &str) -> Result<Self, AgentError> {
        let value: Value = serde_json::from_str(text.trim()).map_err(|e| AgentError::ActionParse(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| AgentError::ActionParse("expected a JSON object".to_string()))?;

        let current_state = match object.get("current_state") {
            Some(state) => serde_json::from_value(state.clone()).unwrap_or_else(|e| {
                log::debug!("Ignoring malformed current_state: {}", e);
                PlannerState::default()
            }),
            None => PlannerState::default(),
        };

        let items = match object.get("action") {
            Some(Value::Array(items)) => items.clone(),
            Some(item @ Value::Object(_)) => vec![item.clone()],
            Some(_) => return Err(AgentError::ActionParse("'action' must be a list".to_string())),
            None => return Err(AgentError::ActionParse("missing 'action' field".to_string())),
        };

        let mut actions = Vec::with_capacity(items.len());
        for (position, item) in items.into_iter().enumerate() {
            let Value::Object(entry) = item else {
                return Err(AgentError::ActionParse(format!("action {} is not an object", position)));
            };
            if entry.len() != 1 {
                return Err(AgentError::ActionParse(format!(
                    "action {} must have exactly one key, found {}",
                    position,
                    entry.len()
                )));
            }
            if let Some((name, params)) = entry.into_iter().next() {
                actions.push(ProposedAction::new(name, params));
            }
        }

        if actions.is_empty() {
            return Err(AgentError::ActionParse("the batch contains no actions".to_string()));
        }

        Ok(Self {
            current_state,
            actions,
        })
    }

    /// Keep at most `limit` actions
    pub fn truncate(&mut self, limit: usize) {
        if self.actions.len() > limit {
            log::warn!("Dropping {} actions beyond the per-step limit of {}", self.actions.len() - limit, limit);
            self.actions.truncate(limit);
        }
    }

    /// Drop terminal actions chained with other actions
    ///
    /// A batch made only of terminal actions keeps the first one.
    pub fn drop_chained_terminals(&mut self) {
        if self.actions.len() <= 1 {
            return;
        }
        if self.actions.iter().all(ProposedAction::is_terminal) {
            self.actions.truncate(1);
            return;
        }
        self.actions.retain(|action| {
            if action.is_terminal() {
                log::warn!("Ignoring terminal action '{}' chained with other actions", action.name);
                return false;
            }
            true
        });
    }
}

/// Strip code fences and cut out the outermost `{...}`
fn repair(output: &str) -> Option<String> {
    let unfenced: String = output
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| unfenced[start..=end].to_string())
}
