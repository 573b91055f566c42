//! Path-based router with Express-compatible route, parameter, and
//! middleware semantics.
//!
//! Routes live in ordered matcher buckets keyed structurally by
//! (pattern, exactness); registration order is the only precedence rule.
//! `resolve` decides whether a navigation is handled locally, builds the
//! ordered execution plan for the request, and runs it one handler at a
//! time with error-handler fallback.

use crate::path::{MatchOptions, PathMatcher};
use crate::{Error, Method, Request, Response};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, trace};

/// What a handler tells the chain to do next. `Next` advances to the
/// following handler; `Halt` ends the chain successfully without running
/// the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Next,
    Halt,
}

/// Verdict of a resolution: handled by the in-page router, or deferred to
/// default browser navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Handled,
    External,
}

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Flow, Error>> + Send>>;

/// A route or middleware handler.
pub type HandlerFn = Arc<dyn Fn(Request, Response) -> HandlerFuture + Send + Sync>;

/// An error-recovery handler; receives the error that aborted the chain.
pub type ErrorHandlerFn = Arc<dyn Fn(Error, Request, Response) -> HandlerFuture + Send + Sync>;

#[derive(Clone)]
enum Handler {
    Normal(HandlerFn),
    Recovery(ErrorHandlerFn),
}

/// One handler registration, built with the entry builder and bound to a
/// path pattern through [`Router::register`].
#[derive(Clone)]
pub struct RouteEntry {
    handler: Handler,
    method: Method,
    will_render: bool,
}

impl RouteEntry {
    pub fn handler(handler: HandlerFn) -> Self {
        Self {
            handler: Handler::Normal(handler),
            method: Method::All,
            will_render: false,
        }
    }

    pub fn error_handler(handler: ErrorHandlerFn) -> Self {
        Self {
            handler: Handler::Recovery(handler),
            method: Method::All,
            will_render: false,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Mark this entry as the response-producing step; it is deferred to
    /// the end of the execution plan so earlier middleware can still
    /// short-circuit.
    pub fn will_render(mut self) -> Self {
        self.will_render = true;
        self
    }
}

/// Structural bucket key: the literal pattern plus its exactness flag.
#[derive(Clone, Debug, PartialEq, Eq)]
struct RouteKey {
    pattern: String,
    exact: bool,
}

struct RouteBucket {
    key: RouteKey,
    matcher: PathMatcher,
    param_names: Vec<String>,
    entries: Vec<RouteEntry>,
    /// Handlers per parameter name already spliced into this bucket.
    injected: HashMap<String, usize>,
    /// Total spliced slots; route handlers start after this index.
    injected_total: usize,
}

struct RouterInner {
    options: MatchOptions,
    buckets: Vec<RouteBucket>,
    /// Param middleware in registration order, grouped by parameter name.
    params: Vec<(String, Vec<HandlerFn>)>,
}

pub struct Router {
    inner: RwLock<RouterInner>,
}

struct Planned {
    handler: Handler,
    param_names: Vec<String>,
    captures: Vec<String>,
    route: String,
}

/// Per-method registrars bound to a single path, from [`Router::route`].
/// Each registrar hands the builder back so methods chain:
/// `router.route("/thing").get(show)?.post(create)?`.
pub struct RouteBuilder<'r> {
    router: &'r Router,
    path: String,
}

macro_rules! route_builder_verbs {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $fn_name(&self, handler: HandlerFn) -> Result<&Self, Error> {
                self.router.register(
                    &self.path,
                    true,
                    RouteEntry::handler(handler).method(Method::$variant),
                )?;
                Ok(self)
            }
        )*
    };
}

impl RouteBuilder<'_> {
    route_builder_verbs! {
        all => All,
        get => Get,
        checkout => Checkout,
        connect => Connect,
        copy => Copy,
        delete => Delete,
        head => Head,
        lock => Lock,
        merge => Merge,
        mkactivity => Mkactivity,
        mkcol => Mkcol,
        r#move => Move,
        m_search => MSearch,
        notify => Notify,
        options => Options,
        patch => Patch,
        post => Post,
        propfind => Propfind,
        proppatch => Proppatch,
        purge => Purge,
        put => Put,
        report => Report,
        search => Search,
        subscribe => Subscribe,
        trace => Trace,
        unlock => Unlock,
        unsubscribe => Unsubscribe,
    }
}

/// Exact-match registration functions, one per recognized method.
macro_rules! verb_registrations {
    ($($fn_name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $fn_name(&self, path: &str, handler: HandlerFn) -> Result<(), Error> {
                self.register(
                    path,
                    true,
                    RouteEntry::handler(handler).method(Method::$variant),
                )
            }
        )*
    };
}

impl Router {
    pub fn new() -> Self {
        Self::with_options(MatchOptions::default())
    }

    pub fn with_options(options: MatchOptions) -> Self {
        Self {
            inner: RwLock::new(RouterInner {
                options,
                buckets: Vec::new(),
                params: Vec::new(),
            }),
        }
    }

    /// Routing options for patterns compiled from now on; already-compiled
    /// buckets keep the options they were built with.
    pub(crate) fn set_options(&self, options: MatchOptions) {
        self.inner.write().options = options;
    }

    /// Bind an entry to `path`. `exact` routes must consume the whole path;
    /// `use`-style registrations match a prefix. Entries registered under a
    /// byte-identical (pattern, exactness) share one bucket and accumulate
    /// in registration order.
    pub fn register(&self, path: &str, exact: bool, entry: RouteEntry) -> Result<(), Error> {
        let mut inner = self.inner.write();
        let key = RouteKey {
            pattern: path.to_string(),
            exact,
        };

        if let Some(bucket) = inner.buckets.iter_mut().find(|b| b.key == key) {
            bucket.entries.push(entry);
        } else {
            let opts = MatchOptions {
                end: exact,
                ..inner.options
            };
            let matcher = PathMatcher::compile(path, opts)?;
            inner.buckets.push(RouteBucket {
                key,
                param_names: matcher.keys().to_vec(),
                matcher,
                entries: vec![entry],
                injected: HashMap::new(),
                injected_total: 0,
            });
        }

        reconcile_params(&mut inner);
        Ok(())
    }

    /// Prefix-matched middleware, any method.
    pub fn use_handler(&self, path: &str, handler: HandlerFn) -> Result<(), Error> {
        self.register(path, false, RouteEntry::handler(handler))
    }

    /// Prefix-matched error handler, any method.
    pub fn use_error_handler(&self, path: &str, handler: ErrorHandlerFn) -> Result<(), Error> {
        self.register(path, false, RouteEntry::error_handler(handler))
    }

    verb_registrations! {
        all => All,
        get => Get,
        checkout => Checkout,
        connect => Connect,
        copy => Copy,
        delete => Delete,
        head => Head,
        lock => Lock,
        merge => Merge,
        mkactivity => Mkactivity,
        mkcol => Mkcol,
        r#move => Move,
        m_search => MSearch,
        notify => Notify,
        options => Options,
        patch => Patch,
        post => Post,
        propfind => Propfind,
        proppatch => Proppatch,
        purge => Purge,
        put => Put,
        report => Report,
        search => Search,
        subscribe => Subscribe,
        trace => Trace,
        unlock => Unlock,
        unsubscribe => Unsubscribe,
    }

    /// Bind several methods to one exact path without repeating it.
    pub fn route(&self, path: &str) -> RouteBuilder<'_> {
        RouteBuilder {
            router: self,
            path: path.to_string(),
        }
    }

    /// Register middleware run once per distinct appearance of the named
    /// parameter in a route, spliced before that route's own handlers.
    /// Splicing is idempotent per (route, parameter) pair.
    pub fn param(&self, name: &str, handler: HandlerFn) {
        let mut inner = self.inner.write();
        match inner.params.iter_mut().find(|(n, _)| n == name) {
            Some((_, handlers)) => handlers.push(handler),
            None => inner.params.push((name.to_string(), vec![handler])),
        }
        reconcile_params(&mut inner);
    }

    /// Resolve one navigation attempt. `Ok(Resolution::External)` means the
    /// browser should perform the navigation itself. An `Err` always means
    /// the pipeline was entered locally and failed.
    pub async fn resolve(&self, req: &Request, res: &Response) -> Result<Resolution, Error> {
        if req.cross_origin() {
            debug!(url = %req.original_url(), "Cross-origin navigation, deferring to browser");
            return Ok(Resolution::External);
        }

        if let Some(target) = req.target() {
            let window_name = req.context().dom().window_name();
            let local =
                target.is_empty() || target == "_self" || Some(&target) == window_name.as_ref();
            if !local {
                debug!(target = %target, "Foreign navigation target, deferring to browser");
                return Ok(Resolution::External);
            }
        }

        let path = req.pathname();
        let method = req.method();
        let (exec, recovery) = self.plan(&path, method);

        debug!(
            path = %path,
            method = %method,
            handlers = exec.len(),
            error_handlers = recovery.len(),
            "Resolving navigation"
        );

        if exec.is_empty() {
            res.send_status(404)?;
            return Ok(Resolution::Handled);
        }

        let mut failure = None;
        for planned in &exec {
            apply(planned, req, res);
            let Handler::Normal(handler) = &planned.handler else {
                continue;
            };
            match handler(req.clone(), res.clone()).await {
                Ok(Flow::Next) => continue,
                Ok(Flow::Halt) => {
                    trace!(route = %planned.route, "Handler halted the chain");
                    break;
                }
                Err(err) => {
                    debug!(route = %planned.route, error = %err, "Handler failed");
                    failure = Some(err);
                    break;
                }
            }
        }

        let Some(err) = failure else {
            return Ok(Resolution::Handled);
        };

        let mut recovery_failed = false;
        for planned in &recovery {
            apply(planned, req, res);
            let Handler::Recovery(handler) = &planned.handler else {
                continue;
            };
            match handler(err.clone(), req.clone(), res.clone()).await {
                Ok(Flow::Next) => continue,
                Ok(Flow::Halt) => break,
                Err(chain_err) => {
                    debug!(route = %planned.route, error = %chain_err, "Error handler failed");
                    recovery_failed = true;
                    break;
                }
            }
        }

        if recovery_failed {
            // The 500 is best-effort; the response may already be complete.
            let _ = res.send_status(500);
        }

        Err(err)
    }

    /// Build the ordered execution plan: iterate buckets in registration
    /// order, collect method-compatible entries on a prefix match, and
    /// defer the rendering entry (at most one per list; last wins) to the
    /// end of its list.
    fn plan(&self, path: &str, method: Method) -> (Vec<Planned>, Vec<Planned>) {
        let inner = self.inner.read();
        let mut exec = Vec::new();
        let mut recovery = Vec::new();
        let mut exec_render: Option<Planned> = None;
        let mut recovery_render: Option<Planned> = None;

        for bucket in &inner.buckets {
            let Some(hit) = bucket.matcher.matches(path) else {
                continue;
            };

            for entry in &bucket.entries {
                if !entry.method.accepts(method) {
                    continue;
                }
                let planned = Planned {
                    handler: entry.handler.clone(),
                    param_names: bucket.param_names.clone(),
                    captures: hit.captures.clone(),
                    route: bucket.key.pattern.clone(),
                };
                let is_recovery = matches!(entry.handler, Handler::Recovery(_));
                match (is_recovery, entry.will_render) {
                    (false, false) => exec.push(planned),
                    (false, true) => exec_render = Some(planned),
                    (true, false) => recovery.push(planned),
                    (true, true) => recovery_render = Some(planned),
                }
            }
        }

        if let Some(planned) = exec_render {
            exec.push(planned);
        }
        if let Some(planned) = recovery_render {
            recovery.push(planned);
        }

        (exec, recovery)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Update request/response with the matched route before a handler runs:
/// parameter names map positionally onto the regex captures.
fn apply(planned: &Planned, req: &Request, res: &Response) {
    let params: HashMap<String, String> = planned
        .param_names
        .iter()
        .cloned()
        .zip(planned.captures.iter().cloned())
        .collect();
    req.apply_route(params, &planned.route);
    res.apply_route(&planned.route);
}

/// Splice registered param middleware into every bucket that names the
/// parameter, before the bucket's own handlers, once per (bucket, param).
fn reconcile_params(inner: &mut RouterInner) {
    let params = inner.params.clone();
    for bucket in &mut inner.buckets {
        for name in bucket.param_names.clone() {
            let Some((_, handlers)) = params.iter().find(|(n, _)| *n == name) else {
                continue;
            };
            let already = bucket.injected.get(&name).copied().unwrap_or(0);
            for handler in handlers.iter().skip(already) {
                let at = bucket.injected_total;
                bucket
                    .entries
                    .insert(at, RouteEntry::handler(handler.clone()));
                bucket.injected_total += 1;
            }
            bucket.injected.insert(name.clone(), handlers.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{request, test_context};
    use crate::Application;
    use parking_lot::Mutex;
    use serde_json::json;

    fn trace_handler(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> HandlerFn {
        Arc::new(move |_req, _res| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().push(tag);
                Ok(Flow::Next)
            })
        })
    }

    #[tokio::test]
    async fn prefix_handlers_run_before_exact_in_registration_order() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        router
            .use_handler("/a", trace_handler(log.clone(), "prefix"))
            .unwrap();
        router.get("/a/:id", trace_handler(log.clone(), "exact")).unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/a/5", Method::Get);
        let verdict = router.resolve(&req, &res).await.unwrap();

        assert_eq!(verdict, Resolution::Handled);
        assert_eq!(*log.lock(), vec!["prefix", "exact"]);
        assert_eq!(req.param("id").as_deref(), Some("5"));
        assert_eq!(req.route().as_deref(), Some("/a/:id"));
    }

    #[tokio::test]
    async fn no_match_sends_404_without_running_handlers() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        router.get("/known", trace_handler(log.clone(), "known")).unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/missing", Method::Get);
        let verdict = router.resolve(&req, &res).await.unwrap();

        assert_eq!(verdict, Resolution::Handled);
        assert!(log.lock().is_empty());
        assert_eq!(res.status_code(), Some(404));
        assert_eq!(res.data(), Some(json!("Not Found")));
    }

    #[tokio::test]
    async fn method_mismatch_is_a_404() {
        let router = Router::new();
        router
            .post("/submit", Arc::new(|_req, _res| Box::pin(async { Ok(Flow::Next) })))
            .unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/submit", Method::Get);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(res.status_code(), Some(404));
    }

    #[tokio::test]
    async fn errors_fall_back_to_the_error_chain() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        router
            .get(
                "/boom",
                Arc::new(|_req, _res| {
                    Box::pin(async { Err(Error::Handler("kaboom".into())) })
                }),
            )
            .unwrap();
        let recovery_log = log.clone();
        router
            .use_error_handler(
                "/",
                Arc::new(move |err, _req, _res| {
                    let log = recovery_log.clone();
                    Box::pin(async move {
                        log.lock().push(if err.to_string().contains("kaboom") {
                            "recovered"
                        } else {
                            "wrong-error"
                        });
                        Ok(Flow::Next)
                    })
                }),
            )
            .unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/boom", Method::Get);
        let err = router.resolve(&req, &res).await.unwrap_err();

        assert!(matches!(err, Error::Handler(_)));
        assert_eq!(*log.lock(), vec!["recovered"]);
        // The error chain did not end the response, so no 500 was forced.
        assert!(!res.ended());
    }

    #[tokio::test]
    async fn failing_error_handler_forces_a_500() {
        let router = Router::new();
        router
            .get(
                "/boom",
                Arc::new(|_req, _res| {
                    Box::pin(async { Err(Error::Handler("first".into())) })
                }),
            )
            .unwrap();
        router
            .use_error_handler(
                "/",
                Arc::new(|_err, _req, _res| {
                    Box::pin(async { Err(Error::Handler("second".into())) })
                }),
            )
            .unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/boom", Method::Get);
        let err = router.resolve(&req, &res).await.unwrap_err();

        // The original failure propagates; the response carries the 500.
        assert!(err.to_string().contains("first"));
        assert_eq!(res.status_code(), Some(500));
    }

    #[tokio::test]
    async fn halt_skips_the_rest_of_the_chain() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let halt_log = log.clone();
        router
            .use_handler(
                "/",
                Arc::new(move |_req, _res| {
                    let log = halt_log.clone();
                    Box::pin(async move {
                        log.lock().push("halt");
                        Ok(Flow::Halt)
                    })
                }),
            )
            .unwrap();
        router.get("/x", trace_handler(log.clone(), "never")).unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/x", Method::Get);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(*log.lock(), vec!["halt"]);
    }

    #[tokio::test]
    async fn will_render_entries_run_last() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let render_log = log.clone();
        router
            .register(
                "/page",
                true,
                RouteEntry::handler(Arc::new(move |_req, _res| {
                    let log = render_log.clone();
                    Box::pin(async move {
                        log.lock().push("render");
                        Ok(Flow::Next)
                    })
                }))
                .method(Method::Get)
                .will_render(),
            )
            .unwrap();
        router.use_handler("/page", trace_handler(log.clone(), "guard")).unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/page", Method::Get);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(*log.lock(), vec!["guard", "render"]);
    }

    #[tokio::test]
    async fn route_builder_binds_several_methods_to_one_path() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        router
            .route("/thing")
            .get(trace_handler(log.clone(), "get"))
            .unwrap()
            .post(trace_handler(log.clone(), "post"))
            .unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/thing", Method::Get);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(*log.lock(), vec!["get"]);

        let (req, res) = request(&ctx, "/thing", Method::Post);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(*log.lock(), vec!["get", "post"]);

        let (unmatched, res) = request(&ctx, "/thing", Method::Delete);
        router.resolve(&unmatched, &res).await.unwrap();
        assert_eq!(res.status_code(), Some(404));
    }

    #[tokio::test]
    async fn param_middleware_splices_once_per_route() {
        let router = Router::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let param_log = log.clone();
        router.param(
            "id",
            Arc::new(move |req, _res| {
                let log = param_log.clone();
                Box::pin(async move {
                    log.lock().push(format!("param:{}", req.param("id").unwrap()));
                    Ok(Flow::Next)
                })
            }),
        );

        let first_log = log.clone();
        router
            .get(
                "/users/:id",
                Arc::new(move |_req, _res| {
                    let log = first_log.clone();
                    Box::pin(async move {
                        log.lock().push("first".to_string());
                        Ok(Flow::Next)
                    })
                }),
            )
            .unwrap();
        // Re-registering under the same pattern must not duplicate the
        // injected param handler.
        let second_log = log.clone();
        router
            .get(
                "/users/:id",
                Arc::new(move |_req, _res| {
                    let log = second_log.clone();
                    Box::pin(async move {
                        log.lock().push("second".to_string());
                        Ok(Flow::Next)
                    })
                }),
            )
            .unwrap();

        let ctx = test_context("https://app.example/");
        let (req, res) = request(&ctx, "/users/42", Method::Get);
        router.resolve(&req, &res).await.unwrap();
        assert_eq!(*log.lock(), vec!["param:42", "first", "second"]);
    }

    #[tokio::test]
    async fn cross_origin_defers_to_the_browser() {
        let router = Router::new();
        router
            .use_handler("/", Arc::new(|_req, _res| Box::pin(async { Ok(Flow::Next) })))
            .unwrap();

        let ctx = test_context("https://app.example/");
        let app = Application::new("root").unwrap();
        let req = Request::new(
            ctx.clone(),
            &app,
            "https://elsewhere.example/doc",
            Method::Get,
            None,
            None,
        )
        .unwrap();
        let res = Response::new(ctx, &app, None);

        assert_eq!(router.resolve(&req, &res).await.unwrap(), Resolution::External);
        assert!(!res.ended());
    }

    #[tokio::test]
    async fn foreign_frame_targets_defer_to_the_browser() {
        let router = Router::new();
        router
            .use_handler("/", Arc::new(|_req, _res| Box::pin(async { Ok(Flow::Next) })))
            .unwrap();

        let ctx = test_context("https://app.example/");
        let app = Application::new("root").unwrap();
        let make = |target: Option<&str>| {
            Request::new(
                ctx.clone(),
                &app,
                "/doc",
                Method::Get,
                None,
                target.map(str::to_string),
            )
            .unwrap()
        };

        let blank = make(Some("_blank"));
        let res = Response::new(ctx.clone(), &app, None);
        assert_eq!(router.resolve(&blank, &res).await.unwrap(), Resolution::External);

        let this_frame = make(Some("_self"));
        let res = Response::new(ctx.clone(), &app, None);
        assert_eq!(router.resolve(&this_frame, &res).await.unwrap(), Resolution::Handled);
    }
}
