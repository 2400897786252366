//! # browser-test-agent
//!
//! An LLM-driven browser testing agent over Chrome DevTools Protocol (CDP).
//!
//! ## Features
//!
//! - **DOM Snapshots**: Filter a live page down to its visible elements and index the interactive ones
//! - **Browser Controller**: A fixed command set (navigate, tabs, click, input) addressed by element index
//! - **Decision Agent**: Prompt a language model, parse its action batch and execute it under a budget
//! - **Session Records**: Every executed step is recorded and can be saved as JSON
//! - **Test Verdicts**: A plan checked against an expected outcome ends passed, failed or inconclusive
//!
//! ## Running a test goal
//!
//! ```bash
//! cargo run --bin browser-test-agent -- \
//!     --goal "Log in with demo@example.com and check the dashboard loads" \
//!     --start-url localhost:3000/login \
//!     --llm-command "llm -m gpt-4o" \
//!     --output session.json
//! ```
//!
//! ## Library Usage
//!
//! ```rust,no_run
//! use browser_test_agent::{Agent, AgentConfig, BrowserController, BrowserSession, LaunchOptions};
//!
//! # fn main() -> browser_test_agent::Result<()> {
//! let session = BrowserSession::launch(LaunchOptions::default())?;
//! let mut controller = BrowserController::new(session);
//! controller.navigate_to("https://example.com")?;
//!
//! let model = |prompt: &str| -> anyhow::Result<String> {
//!     // Ask a language model here
//!     let _ = prompt;
//!     Ok(r#"{"action": [{"complete": {"reason": "nothing to test"}}]}"#.to_string())
//! };
//!
//! let mut agent = Agent::new(controller, model, AgentConfig::default());
//! let record = agent.execute_plan("Check that the page has a More information link");
//! println!("{}", record.summary_line());
//! # Ok(())
//! # }
//! ```
//!
//! ### Indexed elements
//!
//! Interactive elements get dense numeric indices in document order. An index
//! is only valid for the snapshot it came from: every command that may change
//! the page invalidates the map, and the next lookup takes a new snapshot.
//!
//! ```rust,no_run
//! # use browser_test_agent::{BrowserController, BrowserSession, LaunchOptions};
//! # fn main() -> browser_test_agent::Result<()> {
//! # let session = BrowserSession::launch(LaunchOptions::default())?;
//! let mut controller = BrowserController::new(session);
//! controller.navigate_to("https://example.com")?;
//!
//! let state = controller.observe()?;
//! println!("{}", state.elements);
//! controller.click_element(0)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - [`browser`]: Page driver contract and the Chrome session
//! - [`dom`]: DOM snapshots, tree representation and the selector map
//! - [`controller`]: Index-addressed browser commands
//! - [`agent`]: Decision loop, action vocabulary, prompts and model adapters
//! - [`recorder`]: Execution steps and session records
//! - [`config`]: TOML configuration
//! - [`error`]: Error types and result aliases

pub mod agent;
pub mod browser;
pub mod config;
pub mod controller;
pub mod dom;
pub mod error;
pub mod recorder;

pub use agent::{Action, Agent, AgentState, LanguageModel, PlanExecution, TerminationReason};
pub use browser::{BrowserSession, ConnectionOptions, LaunchOptions, PageDriver};
pub use config::{AgentConfig, Config};
pub use controller::{ActionOutcome, BrowserController, PageState};
pub use dom::{DomTree, ElementNode, SelectorMap};
pub use error::{AgentError, BrowserError, ConfigError, Result};
pub use recorder::{ExecutionStep, SessionOutcome, SessionRecord, TestVerdict};
