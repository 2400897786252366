#![allow(dead_code)]

use browser_test_agent::browser::{ElementState, PageDriver, TabInfo};
use browser_test_agent::dom::{ElementTarget, PageRender};
use browser_test_agent::error::{BrowserError, Result};
use serde_json::{Value, json};
use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

pub const BLANK: &str = "about:blank";

/// One element of a fake page
#[derive(Debug, Clone)]
pub struct FakeNode {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    pub children: Vec<FakeNode>,
    pub hidden: bool,
    pub offscreen: bool,
    pub pointer: bool,
    pub navigates_to: Option<String>,
    uid: usize,
}

pub fn el(tag: &str) -> FakeNode {
    FakeNode {
        tag: tag.to_string(),
        attributes: Vec::new(),
        text: None,
        children: Vec::new(),
        hidden: false,
        offscreen: false,
        pointer: false,
        navigates_to: None,
        uid: 0,
    }
}

pub fn button(label: &str) -> FakeNode {
    el("button").text(label)
}

pub fn link(label: &str, url: &str) -> FakeNode {
    el("a").attr("href", url).text(label).navigates_to(url)
}

pub fn text_input(id: &str) -> FakeNode {
    el("input").attr("id", id).attr("type", "text")
}

pub fn body(children: Vec<FakeNode>) -> FakeNode {
    let mut body = el("body");
    body.children = children;
    body
}

impl FakeNode {
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.retain(|(n, _)| n != name);
        self.attributes.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn child(mut self, child: FakeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn offscreen(mut self) -> Self {
        self.offscreen = true;
        self
    }

    pub fn pointer(mut self) -> Self {
        self.pointer = true;
        self
    }

    pub fn navigates_to(mut self, url: &str) -> Self {
        self.navigates_to = Some(url.to_string());
        self
    }

    fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str())
    }

    fn assign_uids(&mut self, next: &mut usize) {
        *next += 1;
        self.uid = *next;
        for child in &mut self.children {
            child.assign_uids(next);
        }
    }

    fn render(&self) -> Value {
        let attributes: serde_json::Map<String, Value> = self
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();

        let mut children = Vec::new();
        if let Some(text) = &self.text {
            children.push(json!({"nodeName": "#text", "textContent": text}));
        }
        children.extend(self.children.iter().map(FakeNode::render));

        let y = if self.offscreen { 5000.0 } else { 10.0 };
        let display = if self.hidden { "none" } else { "block" };
        let cursor = if self.pointer { "pointer" } else { "auto" };
        json!({
            "nodeName": self.tag,
            "attributes": attributes,
            "rect": {"x": 10.0, "y": y, "width": 120.0, "height": 24.0},
            "style": {
                "display": display,
                "visibility": "visible",
                "opacity": 1.0,
                "cursor": cursor,
            },
            "hasClickHandler": false,
            "locator": format!("fake:{}", self.uid),
            "children": children,
        })
    }

    fn find(&self, uid: usize) -> Option<&FakeNode> {
        if self.uid == uid {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(uid))
    }

    fn find_mut(&mut self, uid: usize) -> Option<&mut FakeNode> {
        if self.uid == uid {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_mut(uid))
    }

    fn find_by_id_mut(&mut self, id: &str) -> Option<&mut FakeNode> {
        if self.id() == Some(id) {
            return Some(self);
        }
        self.children.iter_mut().find_map(|child| child.find_by_id_mut(id))
    }

    /// Visibility of `uid` including its ancestors, `None` when detached
    fn visibility_of(&self, uid: usize) -> Option<bool> {
        let visible = !self.hidden && !self.offscreen;
        if self.uid == uid {
            return Some(visible);
        }
        self.children
            .iter()
            .find_map(|child| child.visibility_of(uid))
            .map(|child_visible| visible && child_visible)
    }

    fn remove_by_id(&mut self, id: &str) -> bool {
        let before = self.children.len();
        self.children.retain(|child| child.id() != Some(id));
        before != self.children.len() || self.children.iter_mut().any(|child| child.remove_by_id(id))
    }
}

struct FakePage {
    title: String,
    body: FakeNode,
}

/// In-memory browser: pages are registered by URL and shared by all tabs
pub struct FakeBrowser {
    pages: HashMap<String, FakePage>,
    tabs: Vec<Vec<String>>,
    next_uid: usize,
    renders: Cell<usize>,
    pub clicks: Vec<String>,
    pub fills: Vec<(String, String)>,
    pub activations: Vec<usize>,
    /// Make every `activate_tab` call fail
    pub fail_activation: bool,
}

impl FakeBrowser {
    /// One blank tab
    pub fn new() -> Self {
        let mut browser = Self::without_tabs();
        browser.tabs.push(vec![BLANK.to_string()]);
        browser
    }

    pub fn without_tabs() -> Self {
        Self {
            pages: HashMap::new(),
            tabs: Vec::new(),
            next_uid: 0,
            renders: Cell::new(0),
            clicks: Vec::new(),
            fills: Vec::new(),
            activations: Vec::new(),
            fail_activation: false,
        }
    }

    pub fn with_page(mut self, url: &str, title: &str, mut body: FakeNode) -> Self {
        body.assign_uids(&mut self.next_uid);
        self.pages.insert(
            url.to_string(),
            FakePage {
                title: title.to_string(),
                body,
            },
        );
        self
    }

    pub fn renders(&self) -> usize {
        self.renders.get()
    }

    pub fn current_url(&self, tab: usize) -> Option<&str> {
        self.tabs.get(tab).and_then(|history| history.last()).map(String::as_str)
    }

    pub fn history_len(&self, tab: usize) -> usize {
        self.tabs.get(tab).map_or(0, Vec::len)
    }

    pub fn set_hidden(&mut self, url: &str, id: &str, hidden: bool) {
        if let Some(node) = self.pages.get_mut(url).and_then(|page| page.body.find_by_id_mut(id)) {
            node.hidden = hidden;
        }
    }

    pub fn remove(&mut self, url: &str, id: &str) {
        if let Some(page) = self.pages.get_mut(url) {
            page.body.remove_by_id(id);
        }
    }

    pub fn value_of(&mut self, url: &str, id: &str) -> Option<String> {
        let node = self.pages.get_mut(url)?.body.find_by_id_mut(id)?;
        node.attribute("value").map(str::to_string)
    }

    fn check(&self, tab: usize) -> Result<()> {
        if tab >= self.tabs.len() {
            return Err(BrowserError::InvalidTab {
                index: tab,
                count: self.tabs.len(),
            });
        }
        Ok(())
    }

    fn page_of(&self, tab: usize) -> Option<&FakePage> {
        self.pages.get(self.current_url(tab)?)
    }

    fn uid_of(target: &ElementTarget) -> Option<usize> {
        target.locator.as_deref()?.strip_prefix("fake:")?.parse().ok()
    }

    fn not_found(target: &ElementTarget) -> BrowserError {
        BrowserError::ActionFailed {
            action: "locate element".to_string(),
            reason: format!("{} not found", target.path),
        }
    }
}

impl PageDriver for FakeBrowser {
    fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    fn open_tab(&mut self) -> Result<usize> {
        self.tabs.push(vec![BLANK.to_string()]);
        Ok(self.tabs.len() - 1)
    }

    fn close_tab(&mut self, tab: usize) -> Result<()> {
        self.check(tab)?;
        self.tabs.remove(tab);
        Ok(())
    }

    fn activate_tab(&mut self, tab: usize) -> Result<()> {
        self.check(tab)?;
        if self.fail_activation {
            return Err(BrowserError::TabOperationFailed(format!("Failed to activate tab {}", tab)));
        }
        self.activations.push(tab);
        Ok(())
    }

    fn navigate(&mut self, tab: usize, url: &str) -> Result<()> {
        self.check(tab)?;
        if url != BLANK && !self.pages.contains_key(url) {
            return Err(BrowserError::Navigation(format!("net::ERR_NAME_NOT_RESOLVED at {}", url)));
        }
        self.tabs[tab].push(url.to_string());
        Ok(())
    }

    fn go_back(&mut self, tab: usize) -> Result<()> {
        self.check(tab)?;
        let history = &mut self.tabs[tab];
        if history.len() > 1 {
            history.pop();
        }
        Ok(())
    }

    fn tab_info(&self, tab: usize) -> Result<TabInfo> {
        self.check(tab)?;
        let url = self.current_url(tab).unwrap_or(BLANK).to_string();
        let title = self.page_of(tab).map(|page| page.title.clone()).unwrap_or_default();
        Ok(TabInfo {
            index: tab,
            url,
            title,
            is_active: false,
        })
    }

    fn render_dom(&self, tab: usize) -> Result<PageRender> {
        self.check(tab)?;
        self.renders.set(self.renders.get() + 1);

        let root = match self.page_of(tab) {
            Some(page) => page.body.render(),
            None => body(Vec::new()).render(),
        };
        let render = json!({
            "viewport": {"width": 1280.0, "height": 720.0},
            "root": root,
        });
        serde_json::from_value(render).map_err(|e| BrowserError::DomParseFailed(e.to_string()))
    }

    fn element_state(&self, tab: usize, target: &ElementTarget) -> Result<ElementState> {
        self.check(tab)?;
        let visibility = Self::uid_of(target)
            .and_then(|uid| self.page_of(tab).and_then(|page| page.body.visibility_of(uid)));
        Ok(match visibility {
            Some(visible) => ElementState { attached: true, visible },
            None => ElementState::default(),
        })
    }

    fn click(&mut self, tab: usize, target: &ElementTarget) -> Result<()> {
        self.check(tab)?;
        let uid = Self::uid_of(target).ok_or_else(|| Self::not_found(target))?;
        let node = self
            .page_of(tab)
            .and_then(|page| page.body.find(uid))
            .ok_or_else(|| Self::not_found(target))?;

        let destination = node.navigates_to.clone();
        self.clicks.push(format!("fake:{}", uid));
        if let Some(url) = destination {
            self.navigate(tab, &url)?;
        }
        Ok(())
    }

    fn fill(&mut self, tab: usize, target: &ElementTarget, text: &str) -> Result<()> {
        self.check(tab)?;
        let uid = Self::uid_of(target).ok_or_else(|| Self::not_found(target))?;
        let url = self.current_url(tab).unwrap_or(BLANK).to_string();
        let node = self
            .pages
            .get_mut(&url)
            .and_then(|page| page.body.find_mut(uid))
            .ok_or_else(|| Self::not_found(target))?;

        node.attributes.retain(|(name, _)| name != "value");
        node.attributes.push(("value".to_string(), text.to_string()));
        self.fills.push((format!("fake:{}", uid), text.to_string()));
        Ok(())
    }
}

/// Replays canned responses and keeps every prompt it was given
pub struct ScriptedModel {
    responses: VecDeque<std::result::Result<String, String>>,
    pub prompts: Vec<String>,
}

impl ScriptedModel {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: responses.into_iter().map(|r| Ok(r.into())).collect(),
            prompts: Vec::new(),
        }
    }

    /// Builder method: queue a failed request
    pub fn then_fail(mut self, error: &str) -> Self {
        self.responses.push_back(Err(error.to_string()));
        self
    }
}

impl browser_test_agent::agent::LanguageModel for ScriptedModel {
    fn generate(&mut self, prompt: &str) -> anyhow::Result<String> {
        self.prompts.push(prompt.to_string());
        match self.responses.pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(error)) => Err(anyhow::anyhow!(error)),
            None => Ok(r#"{"action": [{"complete": {"reason": "script exhausted"}}]}"#.to_string()),
        }
    }
}

/// A batch of actions in the model's response format
pub fn batch(actions: Value) -> String {
    json!({
        "current_state": {"evaluation_previous_goal": "", "memory": "", "next_goal": ""},
        "action": actions,
    })
    .to_string()
}
