// Scriptable DOM stand-in

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use trellis_core::{Dom, Error, NavigateFn, NodeHandle};
use url::Url;

/// In-memory [`Dom`] for tests. Records content replacements per node,
/// serves templates for `fetch`, and exposes the installed link-interception
/// callback so tests can simulate clicks.
pub struct StubDom {
    location: Mutex<Url>,
    window_name: Option<String>,
    contents: Mutex<HashMap<String, String>>,
    templates: Mutex<HashMap<String, String>>,
    on_navigate: Mutex<Option<NavigateFn>>,
    intercepted: Mutex<Vec<NodeHandle>>,
}

impl StubDom {
    /// A stub document located at `href`.
    pub fn new(href: &str) -> Self {
        Self {
            location: Mutex::new(Url::parse(href).expect("valid test location")),
            window_name: None,
            contents: Mutex::new(HashMap::new()),
            templates: Mutex::new(HashMap::new()),
            on_navigate: Mutex::new(None),
            intercepted: Mutex::new(Vec::new()),
        }
    }

    /// Name the browsing context so `target="name"` links route locally.
    pub fn with_window_name(mut self, name: &str) -> Self {
        self.window_name = Some(name.to_string());
        self
    }

    /// Serve `source` for a `fetch` of `url`.
    pub fn add_template(&self, url: &str, source: &str) {
        self.templates.lock().insert(url.to_string(), source.to_string());
    }

    pub fn set_location(&self, href: &str) {
        *self.location.lock() = Url::parse(href).expect("valid test location");
    }

    /// The last content written into `node`, if any.
    pub fn content_of(&self, node: &NodeHandle) -> Option<String> {
        self.contents.lock().get(node.id()).cloned()
    }

    /// Nodes link interception was installed on.
    pub fn intercepted_nodes(&self) -> Vec<NodeHandle> {
        self.intercepted.lock().clone()
    }

    /// Simulate a click on an intercepted link. Returns whether the
    /// navigation was handled locally; `false` when nothing intercepts yet.
    pub async fn click(&self, href: &str, target: Option<&str>) -> bool {
        let on_navigate = self.on_navigate.lock().clone();
        match on_navigate {
            Some(on_navigate) => {
                on_navigate(href.to_string(), target.map(str::to_string)).await
            }
            None => false,
        }
    }
}

#[async_trait]
impl Dom for StubDom {
    fn location(&self) -> Url {
        self.location.lock().clone()
    }

    fn window_name(&self) -> Option<String> {
        self.window_name.clone()
    }

    fn body(&self) -> NodeHandle {
        NodeHandle::new("body")
    }

    async fn wait_content_loaded(&self) {}

    fn intercept_links(&self, node: &NodeHandle, on_navigate: NavigateFn) {
        self.intercepted.lock().push(node.clone());
        *self.on_navigate.lock() = Some(on_navigate);
    }

    fn set_content(&self, node: &NodeHandle, html: &str) {
        self.contents.lock().insert(node.id().to_string(), html.to_string());
    }

    async fn fetch(&self, url: &str) -> Result<String, Error> {
        self.templates
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::ViewLookup(url.to_string()))
    }
}
