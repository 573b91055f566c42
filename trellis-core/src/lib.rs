//! Client-side, Express-inspired micro-framework for composing nested
//! single-page applications.
//!
//! The engine has two halves: a path-based router with Express-compatible
//! route, parameter, and middleware semantics, and an application tree with
//! a preInit → inited → loaded lifecycle and mock-then-real dependency
//! resolution between sibling applications. The browser, view engines, and
//! template sources are external collaborators behind traits.

pub mod application;
pub mod context;
pub mod dom;
pub mod error;
pub mod events;
pub mod method;
pub mod mock;
pub mod path;
pub mod request;
pub mod response;
pub mod router;
pub mod view;

pub use application::{
    AppState, Application, DependencySlot, LoadOptions, RenderOptions, Rendered,
};
pub use context::AppContext;
pub use dom::{Dom, NavigateFn, NodeHandle};
pub use error::Error;
pub use events::{EventListener, HookFn, ListenerId};
pub use method::Method;
pub use mock::MockDependency;
pub use path::{MatchOptions, PathMatch, PathMatcher};
pub use request::Request;
pub use response::{Completion, CompletionFn, Response, status_text};
pub use router::{
    ErrorHandlerFn, Flow, HandlerFn, HandlerFuture, Resolution, RouteBuilder, RouteEntry, Router,
};
pub use view::{CompiledView, TemplateSource, Templates, ViewEngine, ViewRegistry};

/// A shared application handle.
pub type App = std::sync::Arc<Application>;

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::AppContext;
    use crate::dom::{Dom, NavigateFn, NodeHandle};
    use crate::{App, Application, Error, Method, Request, Response};
    use async_trait::async_trait;
    use std::sync::Arc;
    use url::Url;

    struct FixedDom {
        location: Url,
    }

    #[async_trait]
    impl Dom for FixedDom {
        fn location(&self) -> Url {
            self.location.clone()
        }

        fn body(&self) -> NodeHandle {
            NodeHandle::new("body")
        }

        async fn wait_content_loaded(&self) {}

        fn intercept_links(&self, _node: &NodeHandle, _on_navigate: NavigateFn) {}

        fn set_content(&self, _node: &NodeHandle, _html: &str) {}

        async fn fetch(&self, url: &str) -> Result<String, Error> {
            Err(Error::ViewLookup(url.to_string()))
        }
    }

    pub(crate) fn test_context(href: &str) -> Arc<AppContext> {
        let dom = Arc::new(FixedDom {
            location: Url::parse(href).unwrap(),
        });
        let node = dom.body();
        AppContext::new(dom, node)
    }

    /// A request/response pair for a throwaway application.
    pub(crate) fn request(
        ctx: &Arc<AppContext>,
        href: &str,
        method: Method,
    ) -> (Request, Response) {
        let app: App = Application::new("test").unwrap();
        let req = Request::new(ctx.clone(), &app, href, method, None, None).unwrap();
        let res = Response::new(ctx.clone(), &app, None);
        (req, res)
    }
}
