//! The DOM/browser boundary.
//!
//! The framework never touches a real document; everything it needs from the
//! page — location, the content-loaded signal, link interception on the
//! mount subtree, content replacement, and URL fetching for the default
//! template lookup — comes through the [`Dom`] trait.

use crate::Error;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use url::Url;

/// Opaque handle to a DOM node, as issued by the [`Dom`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeHandle(String);

impl NodeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Callback installed by the root application for intercepted link clicks.
/// Receives the anchor's href and target; returning `true` means the
/// navigation was handled locally and default browser navigation must be
/// suppressed.
pub type NavigateFn =
    Arc<dyn Fn(String, Option<String>) -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

#[async_trait]
pub trait Dom: Send + Sync {
    /// The current page URL.
    fn location(&self) -> Url;

    /// The name of the current browsing context, if any. Navigation targets
    /// naming this context are routed locally.
    fn window_name(&self) -> Option<String> {
        None
    }

    /// The default mount node.
    fn body(&self) -> NodeHandle;

    /// Resolve once the document's content-loaded signal has fired.
    /// Implementations for already-parsed documents resolve immediately.
    async fn wait_content_loaded(&self);

    /// Observe child-list mutations under `node` and route clicks on
    /// hyperlink elements through `on_navigate`.
    fn intercept_links(&self, node: &NodeHandle, on_navigate: NavigateFn);

    /// Replace the inner content of `node`.
    fn set_content(&self, node: &NodeHandle, html: &str);

    /// Fetch a template source by URL. Backs the default view lookup when no
    /// `views` setting is configured.
    async fn fetch(&self, url: &str) -> Result<String, Error>;
}
