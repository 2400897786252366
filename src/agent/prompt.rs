use crate::agent::action::{
    self, ClickParams, InputTextParams, NavigateParams, OpenTabParams, TabParams, TerminalKind, TerminalParams,
};
use crate::agent::memory::AgentMemory;
use crate::controller::PageState;
use crate::recorder::ExecutionStep;
use schemars::{JsonSchema, schema_for};
use serde_json::Value;

/// Everything the model sees before one decision
pub struct PromptContext<'a> {
    pub goal: &'a str,
    /// What the page should show when the test passes
    pub expected_outcome: Option<&'a str>,
    pub history: &'a [ExecutionStep],
    pub history_window: usize,
    pub memory: &'a AgentMemory,
    pub page: &'a PageState,
    pub available_actions: &'a [&'static str],
    pub max_actions_per_step: usize,
}

fn description(name: &str) -> &'static str {
    match name {
        action::NAVIGATE_TO => "Load a URL in the current tab",
        action::GO_BACK => "Go back one page in the current tab",
        action::OPEN_TAB => "Open a new tab, optionally loading a URL",
        action::SWITCH_TAB => "Switch to the tab with the given index",
        action::CLOSE_TAB => "Close the tab with the given index",
        action::CLICK_ELEMENT => "Click the element with the given index",
        action::INPUT_TEXT => "Replace the text of the input with the given index",
        _ => "End the plan with a reason",
    }
}

/// JSON schema properties of a parameter type
fn properties<P: JsonSchema>() -> Value {
    serde_json::to_value(schema_for!(P))
        .ok()
        .and_then(|schema| schema.get("properties").cloned())
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
}

fn parameters(name: &str) -> Value {
    match name {
        action::NAVIGATE_TO => properties::<NavigateParams>(),
        action::OPEN_TAB => properties::<OpenTabParams>(),
        action::SWITCH_TAB | action::CLOSE_TAB => properties::<TabParams>(),
        action::CLICK_ELEMENT => properties::<ClickParams>(),
        action::INPUT_TEXT => properties::<InputTextParams>(),
        action::GO_BACK => Value::Object(serde_json::Map::new()),
        _ => properties::<TerminalParams>(),
    }
}

/// One line per action: `- name {params}: description`
pub fn action_catalogue(names: &[&str]) -> String {
    names
        .iter()
        .copied()
        .chain(TerminalKind::ALL.iter().map(|kind| kind.name()))
        .map(|name| format!("- {} {}: {}", name, parameters(name), description(name)))
        .collect::<Vec<_>>()
        .join("\n")
}

fn history_section(history: &[ExecutionStep], window: usize) -> String {
    let start = history.len().saturating_sub(window);
    let recent = &history[start..];
    if recent.is_empty() {
        return "No actions executed yet.".to_string();
    }

    recent
        .iter()
        .map(|step| {
            let outcome = match (&step.message, &step.error) {
                (_, Some(error)) => format!("FAILED: {}", error),
                (Some(message), None) => format!("ok: {}", message),
                (None, None) => "ok".to_string(),
            };
            format!("{}. {} {} -> {}", step.step_number, step.action, step.params, outcome)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn page_section(page: &PageState) -> String {
    if let Some(error) = &page.error {
        return format!("The page could not be read: {}", error);
    }

    let mut section = String::new();
    match (&page.url, &page.title) {
        (Some(url), Some(title)) => section.push_str(&format!("Current URL: {}\nTitle: {}\n", url, title)),
        (Some(url), None) => section.push_str(&format!("Current URL: {}\n", url)),
        _ => section.push_str("No page is open.\n"),
    }

    if !page.tabs.is_empty() {
        section.push_str("Tabs:\n");
        for tab in &page.tabs {
            let marker = if tab.is_active { " (active)" } else { "" };
            section.push_str(&format!("  [{}] {}{}\n", tab.index, tab.url, marker));
        }
    }

    if page.element_count == 0 {
        section.push_str("Interactive elements: none");
    } else {
        section.push_str(&format!("Interactive elements:\n{}", page.elements));
    }
    section
}

fn verdict_section(expected_outcome: Option<&str>) -> String {
    match expected_outcome {
        Some(expected) => format!(
            "Expected outcome: {}\n\
             Answer with a single complete action when the page shows the expected outcome, \
             or a single error action when it clearly does not.",
            expected
        ),
        None => "When the goal is reached, answer with a single complete action.".to_string(),
    }
}

/// Build the planning prompt
pub fn build(context: &PromptContext<'_>) -> String {
    let memory = if context.memory.is_empty() {
        "Nothing remembered yet.".to_string()
    } else {
        context.memory.context()
    };

    format!(
        "You are testing a web application in a real browser.\n\
         \n\
         Goal: {goal}\n\
         \n\
         Recent actions:\n{history}\n\
         \n\
         Memory:\n{memory}\n\
         \n\
         Page state:\n{page}\n\
         \n\
         Available actions:\n{catalogue}\n\
         \n\
         Respond with a single JSON object and nothing else:\n\
         {{\"current_state\": {{\"evaluation_previous_goal\": \"...\", \"memory\": \"...\", \"next_goal\": \"...\"}}, \
         \"action\": [{{\"action_name\": {{\"param\": \"value\"}}}}]}}\n\
         Use at most {max} actions. Refer to elements by their [index].\n\
         {verdict}",
        goal = context.goal,
        history = history_section(context.history, context.history_window),
        memory = memory,
        page = page_section(context.page),
        catalogue = action_catalogue(context.available_actions),
        max = context.max_actions_per_step,
        verdict = verdict_section(context.expected_outcome),
    )
}
