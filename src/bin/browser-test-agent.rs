//! Browser test agent
//!
//! Runs one test goal against a live Chrome instance. The language model is an
//! external command that reads the prompt on stdin and writes its answer to
//! stdout, so any hosted or local model can be plugged in with a small wrapper.
//!
//! The exit status is the verdict: 0 passed, 1 failed, 2 inconclusive.

use anyhow::Context;
use browser_test_agent::agent::{Agent, CommandModel};
use browser_test_agent::browser::{BrowserSession, ConnectionOptions};
use browser_test_agent::config::Config;
use browser_test_agent::controller::BrowserController;
use browser_test_agent::recorder::{SessionRecord, TestVerdict};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "browser-test-agent")]
#[command(version)]
#[command(about = "LLM-driven browser testing agent", long_about = None)]
struct Cli {
    /// Natural-language test goal
    #[arg(long, short = 'g')]
    goal: String,

    /// What the page should show when the test passes
    #[arg(long, value_name = "OUTCOME")]
    expect: Option<String>,

    /// Page to open before the first decision
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Command that answers a prompt on stdin, e.g. "llm -m gpt-4o"
    #[arg(long, value_name = "COMMAND")]
    llm_command: String,

    /// Seconds to wait for one model answer
    #[arg(long, value_name = "SECS", default_value_t = 300)]
    llm_timeout: u64,

    /// TOML config file
    #[arg(long, short = 'c', value_name = "PATH")]
    config: Option<PathBuf>,

    /// Launch browser in headed mode (default: headless)
    #[arg(long, short = 'H')]
    headed: bool,

    /// WebSocket endpoint of a running browser to attach to
    #[arg(long, value_name = "WS_URL")]
    connect: Option<String>,

    /// Override the action budget of the plan
    #[arg(long, value_name = "N")]
    max_actions: Option<usize>,

    /// Write the session record as JSON
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("Failed to load {}", path.display()))?,
        None => Config::default(),
    };
    if cli.headed {
        config.browser.headless = false;
    }
    if let Some(max_actions) = cli.max_actions {
        config.agent.max_actions = max_actions;
    }
    config.validate()?;

    let session = match &cli.connect {
        Some(ws_url) => BrowserSession::connect(
            ConnectionOptions::new(ws_url.as_str()).settle_delay_ms(config.browser.settle_delay_ms),
        )?,
        None => BrowserSession::launch(config.browser.clone())?,
    };

    let mut controller = BrowserController::new(session);
    if let Some(url) = &cli.start_url {
        controller.navigate_to(url)?;
    }

    let model = CommandModel::from_command_line(&cli.llm_command)?.timeout(Duration::from_secs(cli.llm_timeout));
    let mut agent = Agent::new(controller, model, config.agent.clone());

    let mut plan = agent.start_test(&cli.goal, cli.expect.as_deref());
    for step in plan.by_ref() {
        let status = if step.success { "ok" } else { "FAILED" };
        let detail = step.message.as_deref().or(step.error.as_deref()).unwrap_or("");
        println!("{:>3}. {:<14} {} {}", step.step_number, step.action, status, detail);
    }
    let record = plan.finish();

    println!("{}", record.summary_line());

    if let Some(path) = &cli.output {
        record
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Session record written to {}", path.display());
    }

    let code = exit_code(&record);
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

/// 0 when the test passed, 1 when it failed, 2 when nothing was decided
fn exit_code(record: &SessionRecord) -> i32 {
    match record.verdict {
        TestVerdict::Passed => 0,
        TestVerdict::Failed => 1,
        TestVerdict::Inconclusive => 2,
    }
}
