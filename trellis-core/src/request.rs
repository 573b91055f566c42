//! The request side of one navigation attempt.
//!
//! A request is a cheap clonable handle over shared state, mutated in place
//! as routing proceeds: the router fills in matched parameters and the
//! matched route before each handler runs, and nested routers re-derive the
//! mount-stripped path for their own application.

use crate::context::AppContext;
use crate::path::{MatchOptions, PathMatcher};
use crate::router::Router;
use crate::{App, Application, Error, Method};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

struct RequestInner {
    method: Method,
    /// Pre-strip path (query included), as derived from the raw href.
    original_url: String,
    /// The mount prefix consumed so far.
    base_url: String,
    /// Mount-stripped path plus query string.
    url: String,
    /// Mount-stripped path without the query string.
    pathname: String,
    query: HashMap<String, String>,
    params: HashMap<String, String>,
    body: Option<Value>,
    target: Option<String>,
    route: Option<String>,
    cross_origin: bool,
    app: Weak<Application>,
    router: Arc<Router>,
}

#[derive(Clone)]
pub struct Request {
    ctx: Arc<AppContext>,
    inner: Arc<Mutex<RequestInner>>,
}

impl Request {
    pub(crate) fn new(
        ctx: Arc<AppContext>,
        app: &App,
        href: &str,
        method: Method,
        body: Option<Value>,
        target: Option<String>,
    ) -> Result<Self, Error> {
        let location = ctx.dom().location();
        let resolved = location
            .join(href)
            .map_err(|_| Error::InvalidUrl(href.to_string()))?;

        let cross_origin = resolved.scheme() != location.scheme()
            || resolved.host_str() != location.host_str()
            || resolved.port_or_known_default() != location.port_or_known_default();

        let query: HashMap<String, String> = resolved
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let raw_path = resolved.path().to_string();
        let query_suffix = resolved
            .query()
            .map(|q| format!("?{q}"))
            .unwrap_or_default();

        let inner = if cross_origin {
            // No stripping across origins; the full href is carried through.
            RequestInner {
                method,
                original_url: resolved.to_string(),
                base_url: String::new(),
                url: resolved.to_string(),
                pathname: raw_path,
                query,
                params: HashMap::new(),
                body,
                target,
                route: None,
                cross_origin,
                app: Arc::downgrade(app),
                router: app.router_handle(),
            }
        } else {
            let base_url = matching_base_url(app, &raw_path);
            let pathname = strip_base(&raw_path, &base_url);
            RequestInner {
                method,
                original_url: format!("{raw_path}{query_suffix}"),
                url: format!("{pathname}{query_suffix}"),
                base_url,
                pathname,
                query,
                params: HashMap::new(),
                body,
                target,
                route: None,
                cross_origin,
                app: Arc::downgrade(app),
                router: app.router_handle(),
            }
        };

        Ok(Self {
            ctx,
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    /// Re-base this request for a nested application: derive the child's
    /// mount prefix from the current pathname, strip it, and hand back a
    /// fresh handle owned by the child. The parent's view is untouched.
    pub(crate) fn for_app(&self, child: &App) -> Result<Request, Error> {
        let guard = self.inner.lock();
        let child_base = matching_base_url(child, &guard.pathname);
        let pathname = strip_base(&guard.pathname, &child_base);
        let query_suffix = guard
            .url
            .find('?')
            .map(|at| guard.url[at..].to_string())
            .unwrap_or_default();

        let inner = RequestInner {
            method: guard.method,
            original_url: guard.original_url.clone(),
            base_url: format!("{}{}", guard.base_url, child_base),
            url: format!("{pathname}{query_suffix}"),
            pathname,
            query: guard.query.clone(),
            params: guard.params.clone(),
            body: guard.body.clone(),
            target: guard.target.clone(),
            route: None,
            cross_origin: guard.cross_origin,
            app: Arc::downgrade(child),
            router: child.router_handle(),
        };

        Ok(Self {
            ctx: self.ctx.clone(),
            inner: Arc::new(Mutex::new(inner)),
        })
    }

    pub fn method(&self) -> Method {
        self.inner.lock().method
    }

    /// Mount-stripped path including the query string.
    pub fn path(&self) -> String {
        self.inner.lock().url.clone()
    }

    /// Mount-stripped path without the query string.
    pub fn pathname(&self) -> String {
        self.inner.lock().pathname.clone()
    }

    pub fn url(&self) -> String {
        self.inner.lock().url.clone()
    }

    pub fn original_url(&self) -> String {
        self.inner.lock().original_url.clone()
    }

    pub fn base_url(&self) -> String {
        self.inner.lock().base_url.clone()
    }

    pub fn cross_origin(&self) -> bool {
        self.inner.lock().cross_origin
    }

    pub fn target(&self) -> Option<String> {
        self.inner.lock().target.clone()
    }

    pub fn body(&self) -> Option<Value> {
        self.inner.lock().body.clone()
    }

    /// The route pattern of the handler currently running.
    pub fn route(&self) -> Option<String> {
        self.inner.lock().route.clone()
    }

    pub fn param(&self, name: &str) -> Option<String> {
        self.inner.lock().params.get(name).cloned()
    }

    pub fn params(&self) -> HashMap<String, String> {
        self.inner.lock().params.clone()
    }

    pub fn query(&self, name: &str) -> Option<String> {
        self.inner.lock().query.get(name).cloned()
    }

    pub fn app(&self) -> Option<App> {
        self.inner.lock().app.upgrade()
    }

    /// The router resolving this request. Rebasing for a nested
    /// application swaps in that application's router.
    pub fn router(&self) -> Arc<Router> {
        self.inner.lock().router.clone()
    }

    pub(crate) fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    /// Update-merge applied before each handler runs: matched parameters,
    /// the matched route, and the owning application.
    pub(crate) fn apply_route(&self, params: HashMap<String, String>, route: &str) {
        let mut guard = self.inner.lock();
        guard.params.extend(params);
        guard.route = Some(route.to_string());
    }
}

/// First mount path (in mount order) whose matched prefix is a genuine
/// prefix of `path`; empty when none match.
fn matching_base_url(app: &App, path: &str) -> String {
    let opts = MatchOptions {
        sensitive: app.enabled("case sensitive routing"),
        strict: app.enabled("strict routing"),
        end: false,
    };

    for mount_path in app.mount_paths() {
        let Ok(matcher) = PathMatcher::compile(&mount_path, opts) else {
            continue;
        };
        if let Some(hit) = matcher.matches(path) {
            return hit.matched;
        }
    }

    String::new()
}

fn strip_base(path: &str, base: &str) -> String {
    let stripped = path.strip_prefix(base).unwrap_or(path);
    if stripped.is_empty() {
        "/".to_string()
    } else if stripped.starts_with('/') {
        stripped.to_string()
    } else {
        format!("/{stripped}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    fn request(app: &App, href: &str) -> Request {
        let ctx = test_context("https://app.example/");
        Request::new(ctx, app, href, Method::Get, None, None).unwrap()
    }

    #[test]
    fn strips_the_mount_prefix() {
        let app = Application::new("users").unwrap();
        app.set_mount_path_for_tests("/users");

        let req = request(&app, "/users/42?tab=posts");
        assert_eq!(req.base_url(), "/users");
        assert_eq!(req.pathname(), "/42");
        assert_eq!(req.url(), "/42?tab=posts");
        assert_eq!(req.original_url(), "/users/42?tab=posts");
        assert_eq!(req.query("tab").as_deref(), Some("posts"));
        assert!(!req.cross_origin());
    }

    #[test]
    fn root_mount_leaves_the_path_alone() {
        let app = Application::new("root").unwrap();
        let req = request(&app, "/a/b");
        assert_eq!(req.base_url(), "");
        assert_eq!(req.pathname(), "/a/b");
    }

    #[test]
    fn first_matching_mount_path_wins() {
        let app = Application::new("multi").unwrap();
        app.set_mount_path_for_tests("/admin");
        app.add_mount_path_for_tests("/settings");

        let req = request(&app, "/settings/profile");
        assert_eq!(req.base_url(), "/settings");
        assert_eq!(req.pathname(), "/profile");
    }

    #[test]
    fn cross_origin_keeps_the_full_href() {
        let app = Application::new("root").unwrap();
        let req = request(&app, "https://elsewhere.example/doc");
        assert!(req.cross_origin());
        assert_eq!(req.url(), "https://elsewhere.example/doc");
        assert_eq!(req.original_url(), "https://elsewhere.example/doc");
        assert_eq!(req.base_url(), "");
    }

    #[test]
    fn rebasing_for_a_child_accumulates_the_base() {
        let parent = Application::new("root").unwrap();
        let child = Application::new("users").unwrap();
        child.set_mount_path_for_tests("/users");

        let req = request(&parent, "/users/42");
        let child_req = req.for_app(&child).unwrap();
        assert_eq!(child_req.base_url(), "/users");
        assert_eq!(child_req.pathname(), "/42");
        // Parent view is untouched.
        assert_eq!(req.pathname(), "/users/42");
    }

    #[test]
    fn carries_the_router_of_the_owning_app() {
        let parent = Application::new("root").unwrap();
        let child = Application::new("users").unwrap();
        child.set_mount_path_for_tests("/users");

        let req = request(&parent, "/users/42");
        assert!(Arc::ptr_eq(&req.router(), &parent.router_handle()));

        let child_req = req.for_app(&child).unwrap();
        assert!(Arc::ptr_eq(&child_req.router(), &child.router_handle()));
    }
}
