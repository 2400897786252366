//! Browser controller
//!
//! [`BrowserController`] owns a [`PageDriver`], the active tab and the cached
//! DOM snapshot. Element indices are always resolved through the current
//! selector map, which is invalidated after every command that can change the
//! page and rebuilt lazily on the next lookup.

pub mod url;

pub use url::normalize_url;

use crate::agent::action::{self, Action};
use crate::browser::{PageDriver, TabInfo};
use crate::dom::{self, DomTree, ElementNode, ElementTarget, RawNode, SelectorMap};
use crate::error::{BrowserError, Result};
use serde::Serialize;

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub message: String,
}

impl ActionOutcome {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// What the model gets to see of the browser before each decision
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageState {
    pub url: Option<String>,
    pub title: Option<String>,
    pub tabs: Vec<TabInfo>,
    pub active_tab: Option<usize>,
    /// Selector map listing, one `[index]<tag>` line per element
    pub elements: String,
    pub element_count: usize,
    /// Why the page could not be observed, if it could not
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageState {
    /// State to show when observing the page failed
    pub fn unavailable(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Executes browser commands against the active tab of a [`PageDriver`]
pub struct BrowserController<D: PageDriver> {
    driver: D,
    active_tab: Option<usize>,
    dom: Option<DomTree>,
    snapshot_count: u64,
}

impl<D: PageDriver> BrowserController<D> {
    /// Wrap a driver; its first tab, if any, becomes active
    pub fn new(driver: D) -> Self {
        let active_tab = (driver.tab_count() > 0).then_some(0);
        Self {
            driver,
            active_tab,
            dom: None,
            snapshot_count: 0,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Direct access to the driver; the cached snapshot is left as is
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    pub fn active_tab(&self) -> Option<usize> {
        self.active_tab
    }

    /// Number of snapshots taken so far
    pub fn snapshot_count(&self) -> u64 {
        self.snapshot_count
    }

    /// The cached snapshot, which may be stale
    pub fn dom(&self) -> Option<&DomTree> {
        self.dom.as_ref()
    }

    /// The selector map of the cached snapshot
    pub fn selector_map(&self) -> Option<&SelectorMap> {
        self.dom.as_ref().map(|dom| &dom.selector_map)
    }

    /// URL of the active tab
    pub fn current_url(&self) -> Option<String> {
        let tab = self.active_tab?;
        self.driver.tab_info(tab).ok().map(|info| info.url)
    }

    /// Mark the cached selector map as stale
    pub fn invalidate(&mut self) {
        if let Some(dom) = self.dom.as_mut() {
            if !dom.selector_map.is_invalidated() {
                log::debug!("Invalidating selector map of snapshot {}", dom.sequence);
            }
            dom.selector_map.invalidate();
        }
    }

    /// Take a new snapshot of the active tab
    pub fn refresh(&mut self) -> Result<&DomTree> {
        let tab = self
            .active_tab
            .ok_or_else(|| BrowserError::TabOperationFailed("No active tab".to_string()))?;

        let render = self.driver.render_dom(tab)?;
        // A page with nothing visible still gets an (empty) snapshot
        let mut tree = dom::snapshot(&render).unwrap_or_else(|| DomTree::materialize(RawNode::new("body")));

        self.snapshot_count += 1;
        tree.sequence = self.snapshot_count;
        log::debug!(
            "Snapshot {}: {} elements, {} indexed",
            tree.sequence,
            tree.count_elements(),
            tree.selector_map.len()
        );
        log::trace!("DOM outline:\n{}", tree.outline());

        Ok(&*self.dom.insert(tree))
    }

    /// The current snapshot, rebuilt when absent or invalidated
    pub fn tree(&mut self) -> Result<&DomTree> {
        let fresh = self.dom.as_ref().is_some_and(|dom| !dom.selector_map.is_invalidated());
        if !fresh {
            self.refresh()?;
        }
        self.dom
            .as_ref()
            .ok_or_else(|| BrowserError::DomParseFailed("No snapshot available".to_string()))
    }

    /// Snapshot the page and describe it
    pub fn observe(&mut self) -> Result<PageState> {
        let mut tabs = Vec::with_capacity(self.driver.tab_count());
        for index in 0..self.driver.tab_count() {
            let mut info = self.driver.tab_info(index)?;
            info.is_active = self.active_tab == Some(index);
            tabs.push(info);
        }

        let Some(active) = self.active_tab else {
            return Ok(PageState { tabs, ..PageState::default() });
        };

        let (url, title) = tabs
            .get(active)
            .map(|info| (Some(info.url.clone()), Some(info.title.clone())))
            .unwrap_or_default();

        let tree = self.refresh()?;
        Ok(PageState {
            url,
            title,
            tabs,
            active_tab: Some(active),
            elements: tree.selector_map.describe(tree),
            element_count: tree.selector_map.len(),
            error: None,
        })
    }

    /// Commands that make sense in the current browser state
    pub fn available_actions(&self) -> Vec<&'static str> {
        let mut actions = vec![action::NAVIGATE_TO, action::OPEN_TAB];
        let tab_count = self.driver.tab_count();

        if self.active_tab.is_some() {
            actions.push(action::GO_BACK);
        }
        if tab_count > 1 {
            actions.push(action::SWITCH_TAB);
        }
        if tab_count > 0 {
            actions.push(action::CLOSE_TAB);
        }

        if let Some(dom) = self.dom.as_ref().filter(|dom| !dom.selector_map.is_invalidated()) {
            let elements: Vec<&ElementNode> = dom.selector_map.iter().filter_map(|(_, id)| dom.element(id)).collect();
            if !elements.is_empty() {
                actions.push(action::CLICK_ELEMENT);
            }
            if elements.iter().any(|e| e.accepts_text()) {
                actions.push(action::INPUT_TEXT);
            }
        }

        actions
    }

    /// Run one command
    pub fn execute(&mut self, action: &Action) -> Result<ActionOutcome> {
        log::debug!("Executing {}", action.name());
        match action {
            Action::NavigateTo(params) => self.navigate_to(&params.url),
            Action::GoBack => self.go_back(),
            Action::OpenTab(params) => self.open_tab(params.url.as_deref()),
            Action::SwitchTab(params) => self.switch_tab(params.index),
            Action::CloseTab(params) => self.close_tab(params.index),
            Action::ClickElement(params) => self.click_element(params.index),
            Action::InputText(params) => self.input_text(params.index, &params.text),
            Action::Terminal(terminal) => Ok(ActionOutcome::new(format!("{} requested", terminal.kind))),
        }
    }

    /// Load a URL in the active tab, opening one if needed
    pub fn navigate_to(&mut self, url: &str) -> Result<ActionOutcome> {
        if url.trim().is_empty() {
            return Err(BrowserError::Navigation("Cannot navigate to an empty URL".to_string()));
        }
        let url = normalize_url(url);
        let tab = match self.active_tab {
            Some(tab) => tab,
            None => {
                let tab = self.driver.open_tab()?;
                self.active_tab = Some(tab);
                tab
            }
        };

        let result = self.driver.navigate(tab, &url);
        self.invalidate();
        result?;

        log::info!("Navigated to {}", url);
        Ok(ActionOutcome::new(format!("Navigated to {}", url)))
    }

    /// Go back in the active tab's history
    pub fn go_back(&mut self) -> Result<ActionOutcome> {
        let Some(tab) = self.active_tab else {
            return Ok(ActionOutcome::new("No active tab, nothing to go back to"));
        };

        self.driver.go_back(tab)?;
        self.invalidate();
        Ok(ActionOutcome::new("Navigated back"))
    }

    /// Open a tab, make it active and optionally load a URL in it
    pub fn open_tab(&mut self, url: Option<&str>) -> Result<ActionOutcome> {
        let tab = self.driver.open_tab()?;
        self.active_tab = Some(tab);
        self.invalidate();
        self.driver.activate_tab(tab)?;

        match url {
            Some(url) => {
                let outcome = self.navigate_to(url)?;
                Ok(ActionOutcome::new(format!("Opened tab {}. {}", tab, outcome.message)))
            }
            None => Ok(ActionOutcome::new(format!("Opened tab {}", tab))),
        }
    }

    /// Make another tab active
    pub fn switch_tab(&mut self, index: usize) -> Result<ActionOutcome> {
        self.check_tab(index)?;
        self.driver.activate_tab(index)?;
        self.active_tab = Some(index);
        self.invalidate();
        Ok(ActionOutcome::new(format!("Switched to tab {}", index)))
    }

    /// Close a tab; closing the active one activates the first remaining tab
    pub fn close_tab(&mut self, index: usize) -> Result<ActionOutcome> {
        self.check_tab(index)?;
        self.driver.close_tab(index)?;
        self.invalidate();

        let remaining = self.driver.tab_count();
        self.active_tab = match self.active_tab {
            Some(active) if active == index => (remaining > 0).then_some(0),
            Some(active) if active > index => Some(active - 1),
            other => other,
        };
        if let Some(active) = self.active_tab {
            self.driver.activate_tab(active)?;
        }

        Ok(ActionOutcome::new(format!("Closed tab {}", index)))
    }

    /// Click the element at `index` of the current selector map
    pub fn click_element(&mut self, index: usize) -> Result<ActionOutcome> {
        let (tab, element) = self.lookup(index)?;
        let target = element.target();
        self.ensure_live(tab, index, &target)?;

        self.driver.click(tab, &target)?;
        self.invalidate();

        let label = element.text.as_deref().unwrap_or(&element.tag_name);
        Ok(ActionOutcome::new(format!("Clicked element {} ({})", index, label)))
    }

    /// Replace the text of the element at `index`
    pub fn input_text(&mut self, index: usize, text: &str) -> Result<ActionOutcome> {
        let (tab, element) = self.lookup(index)?;
        if !element.accepts_text() {
            return Err(BrowserError::NotEditable {
                index,
                tag: element.tag_name.clone(),
            });
        }

        let target = element.target();
        self.ensure_live(tab, index, &target)?;

        self.driver.fill(tab, &target, text)?;
        self.invalidate();
        Ok(ActionOutcome::new(format!("Typed '{}' into element {}", text, index)))
    }

    fn check_tab(&self, index: usize) -> Result<()> {
        let count = self.driver.tab_count();
        if index >= count {
            return Err(BrowserError::InvalidTab { index, count });
        }
        Ok(())
    }

    fn lookup(&mut self, index: usize) -> Result<(usize, ElementNode)> {
        let tab = self.active_tab.ok_or(BrowserError::ElementNotFound { index })?;
        let tree = self.tree()?;
        let node = tree.selector_map.resolve(index)?;
        let element = tree.element(node).ok_or(BrowserError::ElementNotFound { index })?;
        Ok((tab, element.clone()))
    }

    fn ensure_live(&self, tab: usize, index: usize, target: &ElementTarget) -> Result<()> {
        let state = self.driver.element_state(tab, target)?;
        if !state.attached {
            return Err(BrowserError::StaleElement {
                index,
                reason: "the element is no longer attached to the document".to_string(),
            });
        }
        if !state.visible {
            return Err(BrowserError::StaleElement {
                index,
                reason: "the element is no longer visible".to_string(),
            });
        }
        Ok(())
    }
}
