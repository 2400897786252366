//! Browser session management and the page driver contract
//!
//! [`PageDriver`] is everything the controller needs from a browser: tab
//! management, navigation, a render of the DOM and element actions.
//! [`BrowserSession`] implements it on top of `headless_chrome`.

pub mod config;
pub mod session;

pub use config::{ConnectionOptions, LaunchOptions};
pub use session::BrowserSession;

use crate::dom::{ElementTarget, PageRender};
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// URL and title of one open tab
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub index: usize,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub is_active: bool,
}

/// Live state of an element that was resolved from a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ElementState {
    /// The element can still be found in the document
    pub attached: bool,
    /// The element is still rendered
    pub visible: bool,
}

/// A browser the controller can drive; tabs are addressed by position
pub trait PageDriver {
    /// Number of open tabs
    fn tab_count(&self) -> usize;

    /// Open a blank tab and return its index
    fn open_tab(&mut self) -> Result<usize>;

    /// Close the tab at `tab`; later tabs shift down by one
    fn close_tab(&mut self, tab: usize) -> Result<()>;

    /// Bring a tab to the front
    fn activate_tab(&mut self, _tab: usize) -> Result<()> {
        Ok(())
    }

    /// Load `url` and wait for the navigation to settle
    fn navigate(&mut self, tab: usize, url: &str) -> Result<()>;

    /// Go back one history entry; must succeed without doing anything when there is no history
    fn go_back(&mut self, tab: usize) -> Result<()>;

    /// URL and title of a tab
    fn tab_info(&self, tab: usize) -> Result<TabInfo>;

    /// Render the current DOM of a tab
    fn render_dom(&self, tab: usize) -> Result<PageRender>;

    /// Check whether a previously captured element is still attached and visible
    fn element_state(&self, tab: usize, target: &ElementTarget) -> Result<ElementState>;

    /// Native click on an element
    fn click(&mut self, tab: usize, target: &ElementTarget) -> Result<()>;

    /// Replace the content of a text control with `text`
    fn fill(&mut self, tab: usize, target: &ElementTarget, text: &str) -> Result<()>;
}
