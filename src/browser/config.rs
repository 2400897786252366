use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options for launching a new Chrome/Chromium instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaunchOptions {
    /// Run without a visible window
    pub headless: bool,

    pub window_width: u32,

    pub window_height: u32,

    /// Chrome binary; auto-detected when unset
    pub chrome_path: Option<PathBuf>,

    /// Profile directory; a temporary one when unset
    pub user_data_dir: Option<PathBuf>,

    pub sandbox: bool,

    /// Pause after clicks and history moves so the page can react
    pub settle_delay_ms: u64,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1280,
            window_height: 720,
            chrome_path: None,
            user_data_dir: None,
            sandbox: true,
            settle_delay_ms: 300,
        }
    }
}

impl LaunchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Builder method: set window size
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Builder method: set Chrome binary path
    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_path = Some(path.into());
        self
    }

    /// Builder method: set user data directory
    pub fn user_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    /// Builder method: set sandbox mode
    pub fn sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }

    /// Builder method: set the settle delay
    pub fn settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }
}

/// Options for attaching to a running browser over its DevTools WebSocket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionOptions {
    pub ws_url: String,

    /// Connection timeout in milliseconds
    pub timeout: u64,

    /// Pause after clicks and history moves so the page can react
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    LaunchOptions::default().settle_delay_ms
}

impl ConnectionOptions {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            timeout: 30_000,
            settle_delay_ms: default_settle_delay_ms(),
        }
    }

    /// Builder method: set timeout
    pub fn timeout(mut self, millis: u64) -> Self {
        self.timeout = millis;
        self
    }

    /// Builder method: set the settle delay
    pub fn settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }
}
