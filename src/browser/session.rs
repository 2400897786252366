use crate::{browser::config::{ConnectionOptions, LaunchOptions},
            browser::{ElementState, PageDriver, TabInfo},
            dom::{EXTRACT_DOM_JS, ElementTarget, PageRender},
            error::{BrowserError, Result}};
use headless_chrome::{Browser, Element, Tab};
use serde::Deserialize;
use std::{ffi::OsStr, sync::Arc, time::Duration};

/// Clears a text control before typing into it
const CLEAR_FIELD_JS: &str = r#"
    function() {
        if ('value' in this) {
            this.value = '';
        } else {
            this.textContent = '';
        }
        this.dispatchEvent(new Event('input', { bubbles: true }));
    }
"#;

/// Browser session that manages a Chrome/Chromium instance
pub struct BrowserSession {
    /// The underlying headless_chrome Browser instance
    browser: Browser,

    /// Tabs opened through this session, in creation order
    tabs: Vec<Arc<Tab>>,

    /// Pause after clicks and history moves
    settle_delay: Duration,
}

/// One way of finding an element again, tried in order
#[derive(Debug, Clone, PartialEq, Eq)]
enum Lookup {
    XPath(String),
    Id(String),
}

#[derive(Debug, Deserialize)]
struct LiveState {
    attached: bool,
    visible: bool,
}

impl BrowserSession {
    /// Launch a new browser instance with the given options
    pub fn launch(options: LaunchOptions) -> Result<Self> {
        let mut launch_opts = headless_chrome::LaunchOptions::default();

        // Keep pages from detecting automation
        launch_opts.ignore_default_args.push(OsStr::new("--enable-automation"));
        launch_opts.args.push(OsStr::new("--disable-blink-features=AutomationControlled"));

        // A plan can sit in a model call for a long time; the default idle timeout is 30 seconds
        launch_opts.idle_browser_timeout = Duration::from_secs(60 * 60);

        launch_opts.headless = options.headless;
        launch_opts.window_size = Some((options.window_width, options.window_height));
        launch_opts.path = options.chrome_path.clone();
        launch_opts.user_data_dir = options.user_data_dir.clone();
        launch_opts.sandbox = options.sandbox;

        let browser = Browser::new(launch_opts).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let mut tabs = Self::snapshot_tabs(&browser)?;
        if tabs.is_empty() {
            let tab = browser
                .new_tab()
                .map_err(|e| BrowserError::LaunchFailed(format!("Failed to create tab: {}", e)))?;
            tabs.push(tab);
        }

        log::info!(
            "Launched browser (headless: {}, window {}x{})",
            options.headless,
            options.window_width,
            options.window_height
        );

        Ok(Self {
            browser,
            tabs,
            settle_delay: Duration::from_millis(options.settle_delay_ms),
        })
    }

    /// Connect to an existing browser instance via WebSocket
    pub fn connect(options: ConnectionOptions) -> Result<Self> {
        let browser = Browser::connect_with_timeout(options.ws_url.clone(), Duration::from_millis(options.timeout))
            .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

        let tabs = Self::snapshot_tabs(&browser)?;
        log::info!("Connected to browser at {} ({} tabs)", options.ws_url, tabs.len());

        Ok(Self {
            browser,
            tabs,
            settle_delay: Duration::from_millis(options.settle_delay_ms),
        })
    }

    /// Launch a browser with default options
    pub fn new() -> Result<Self> {
        Self::launch(LaunchOptions::default())
    }

    /// Builder method: set the pause after clicks and history moves
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Get the underlying Browser instance
    pub fn browser(&self) -> &Browser {
        &self.browser
    }

    /// Get a tab by position
    pub fn tab(&self, index: usize) -> Result<&Arc<Tab>> {
        self.tabs.get(index).ok_or(BrowserError::InvalidTab {
            index,
            count: self.tabs.len(),
        })
    }

    fn snapshot_tabs(browser: &Browser) -> Result<Vec<Arc<Tab>>> {
        let tabs = browser
            .get_tabs()
            .lock()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to get tabs: {}", e)))?
            .clone();
        Ok(tabs)
    }

    fn settle(&self) {
        if !self.settle_delay.is_zero() {
            std::thread::sleep(self.settle_delay);
        }
    }

    fn find_element<'a>(tab: &'a Arc<Tab>, target: &ElementTarget) -> Result<Element<'a>> {
        let mut last_error = String::from("no lookup strategy available");
        for lookup in lookups(target) {
            let found = match &lookup {
                Lookup::XPath(xpath) => tab.find_element_by_xpath(xpath),
                Lookup::Id(id) => tab.find_element(&id_selector(id)),
            };
            match found {
                Ok(element) => return Ok(element),
                Err(e) => {
                    log::debug!("Lookup {:?} failed: {}", lookup, e);
                    last_error = e.to_string();
                }
            }
        }

        Err(BrowserError::ActionFailed {
            action: "locate element".to_string(),
            reason: format!("{} not found: {}", target.path, last_error),
        })
    }
}

impl PageDriver for BrowserSession {
    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn open_tab(&mut self) -> Result<usize> {
        let tab = self
            .browser
            .new_tab()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to create tab: {}", e)))?;
        self.tabs.push(tab);
        Ok(self.tabs.len() - 1)
    }

    fn close_tab(&mut self, tab: usize) -> Result<()> {
        self.tab(tab)?
            .close(true)
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to close tab: {}", e)))?;
        self.tabs.remove(tab);
        Ok(())
    }

    fn activate_tab(&mut self, tab: usize) -> Result<()> {
        self.tab(tab)?
            .activate()
            .map_err(|e| BrowserError::TabOperationFailed(format!("Failed to activate tab: {}", e)))?;
        Ok(())
    }

    fn navigate(&mut self, tab: usize, url: &str) -> Result<()> {
        let tab = self.tab(tab)?;
        tab.navigate_to(url)
            .map_err(|e| BrowserError::Navigation(format!("Failed to navigate to {}: {}", url, e)))?;
        tab.wait_until_navigated()
            .map_err(|e| BrowserError::Navigation(format!("Navigation timeout: {}", e)))?;
        Ok(())
    }

    fn go_back(&mut self, tab: usize) -> Result<()> {
        let tab = self.tab(tab)?;
        let has_history = tab
            .evaluate("window.history.length > 1", false)
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?
            .value
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        if !has_history {
            log::debug!("No history to go back to");
            return Ok(());
        }

        tab.evaluate("window.history.back()", false)
            .map_err(|e| BrowserError::Navigation(format!("Failed to go back: {}", e)))?;
        self.settle();
        Ok(())
    }

    fn tab_info(&self, tab: usize) -> Result<TabInfo> {
        let handle = self.tab(tab)?;
        let title = handle.get_title().unwrap_or_default();
        Ok(TabInfo {
            index: tab,
            url: handle.get_url(),
            title,
            is_active: false,
        })
    }

    fn render_dom(&self, tab: usize) -> Result<PageRender> {
        let result = self
            .tab(tab)?
            .evaluate(EXTRACT_DOM_JS, false)
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;

        let value = result
            .value
            .ok_or_else(|| BrowserError::DomParseFailed("No value returned from DOM script".to_string()))?;
        let json = value
            .as_str()
            .ok_or_else(|| BrowserError::DomParseFailed("DOM script did not return a string".to_string()))?;

        serde_json::from_str(json).map_err(|e| BrowserError::DomParseFailed(e.to_string()))
    }

    fn element_state(&self, tab: usize, target: &ElementTarget) -> Result<ElementState> {
        let script = element_state_script(target);
        let result = self
            .tab(tab)?
            .evaluate(&script, false)
            .map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;

        let json = result.value.and_then(|v| v.as_str().map(str::to_string)).ok_or_else(|| {
            BrowserError::EvaluationFailed("Element state script did not return a string".to_string())
        })?;
        let state: LiveState =
            serde_json::from_str(&json).map_err(|e| BrowserError::EvaluationFailed(e.to_string()))?;

        Ok(ElementState {
            attached: state.attached,
            visible: state.visible,
        })
    }

    fn click(&mut self, tab: usize, target: &ElementTarget) -> Result<()> {
        let handle = self.tab(tab)?;
        let element = Self::find_element(handle, target)?;
        element.click().map_err(|e| BrowserError::ActionFailed {
            action: "click".to_string(),
            reason: e.to_string(),
        })?;
        self.settle();
        Ok(())
    }

    fn fill(&mut self, tab: usize, target: &ElementTarget, text: &str) -> Result<()> {
        let handle = self.tab(tab)?;
        let element = Self::find_element(handle, target)?;

        element
            .call_js_fn(CLEAR_FIELD_JS, vec![], false)
            .map_err(|e| BrowserError::ActionFailed {
                action: "clear".to_string(),
                reason: e.to_string(),
            })?;
        element.type_into(text).map_err(|e| BrowserError::ActionFailed {
            action: "type".to_string(),
            reason: e.to_string(),
        })?;
        Ok(())
    }
}

/// Strategies for re-finding `target`: the driver locator, the `id` attribute, then the snapshot path
fn lookups(target: &ElementTarget) -> Vec<Lookup> {
    let mut lookups = Vec::new();
    if let Some(locator) = &target.locator {
        lookups.push(Lookup::XPath(locator.clone()));
    }
    if let Some(id) = target.dom_id.as_ref().filter(|id| !id.is_empty()) {
        lookups.push(Lookup::Id(id.clone()));
    }
    lookups.push(Lookup::XPath(format!("/html[1]{}", target.path)));
    lookups
}

fn id_selector(id: &str) -> String {
    // A JSON string literal is also a valid CSS string
    format!("[id={}]", serde_json::Value::String(id.to_string()))
}

fn element_state_script(target: &ElementTarget) -> String {
    let candidates: Vec<serde_json::Value> = lookups(target)
        .into_iter()
        .map(|lookup| match lookup {
            Lookup::XPath(xpath) => serde_json::json!({"xpath": xpath}),
            Lookup::Id(id) => serde_json::json!({"id": id}),
        })
        .collect();

    format!(
        r#"(function (candidates) {{
            for (const c of candidates) {{
                const el = c.xpath !== undefined
                    ? document.evaluate(c.xpath, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue
                    : document.getElementById(c.id);
                if (!el) {{
                    continue;
                }}
                const style = window.getComputedStyle(el);
                const rect = el.getBoundingClientRect();
                return JSON.stringify({{
                    attached: el.isConnected,
                    visible: rect.width > 0 && rect.height > 0 && style.display !== 'none'
                        && style.visibility !== 'hidden' && parseFloat(style.opacity) > 0,
                }});
            }}
            return JSON.stringify({{ attached: false, visible: false }});
        }})({})"#,
        serde_json::Value::Array(candidates)
    )
}
