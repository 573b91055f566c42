//! The application tree: named, mountable routing units with a
//! preInit → inited → loaded lifecycle.
//!
//! Sibling applications depend on one another by name. Before a dependency
//! exists its slot holds a recording mock; after every application in the
//! tree has inited, the recordings are replayed onto the real instances and
//! the slots are swapped for resolved references. Only a loaded application
//! may emit non-lifecycle events, so a dependent never observes an event
//! before its listeners are wired up.

use crate::context::AppContext;
use crate::dom::{Dom, NavigateFn, NodeHandle};
use crate::events::{Emitter, EventListener, HookFn, ListenerId};
use crate::mock::MockDependency;
use crate::path::MatchOptions;
use crate::router::{ErrorHandlerFn, Flow, HandlerFn, Resolution, RouteBuilder, Router};
use crate::view::{Templates, ViewEngine};
use crate::{App, Error, Method, Request, Response};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value, json};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// Passes through a resolution loop before a redirect chain is declared
/// circular.
const REDIRECT_LIMIT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    PreInit,
    Inited,
    Loaded,
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AppState::PreInit => "preInit",
            AppState::Inited => "inited",
            AppState::Loaded => "loaded",
        })
    }
}

/// The mount prefix(es) an application is reachable under. Starts at the
/// default `/`; the first explicit mount replaces it, later mounts
/// accumulate.
#[derive(Debug, Clone)]
enum MountSpec {
    Default,
    Paths(Vec<String>),
}

impl MountSpec {
    fn paths(&self) -> Vec<String> {
        match self {
            MountSpec::Default => vec!["/".to_string()],
            MountSpec::Paths(paths) => paths.clone(),
        }
    }

    fn mount(&mut self, path: &str) {
        match self {
            MountSpec::Default => *self = MountSpec::Paths(vec![path.to_string()]),
            MountSpec::Paths(paths) => paths.push(path.to_string()),
        }
    }
}

/// Two-stage dependency reference: a declared name becomes a shared
/// recording mock at init and a resolved application at load.
pub enum DependencySlot {
    Named(String),
    Mock(Arc<MockDependency>),
    Resolved(App),
}

impl DependencySlot {
    pub fn name(&self) -> &str {
        match self {
            DependencySlot::Named(name) => name,
            DependencySlot::Mock(mock) => mock.name(),
            DependencySlot::Resolved(app) => app.name(),
        }
    }
}

/// Options for the root `load`.
pub struct LoadOptions {
    pub wait_for_content_loaded: bool,
    /// Defaults to the document body.
    pub mount_node: Option<NodeHandle>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            wait_for_content_loaded: true,
            mount_node: None,
        }
    }
}

/// Caller-supplied render inputs. `locals` and `values` merge over the
/// application locals, `values` winning. `cache` falls back to the
/// `view cache` setting; `mount` attaches the result to the mount node.
#[derive(Default, Clone)]
pub struct RenderOptions {
    pub locals: Map<String, Value>,
    pub values: Map<String, Value>,
    pub cache: Option<bool>,
    pub mount: bool,
}

/// A finished render: the output plus the merged option map it saw.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub html: String,
    pub options: Map<String, Value>,
}

pub struct Application {
    name: String,
    state: RwLock<AppState>,
    is_root: AtomicBool,
    mount_path: RwLock<MountSpec>,
    parent: RwLock<Weak<Application>>,
    children: Mutex<Vec<App>>,
    dependencies: Mutex<Vec<DependencySlot>>,
    settings: RwLock<Map<String, Value>>,
    locals: RwLock<Map<String, Value>>,
    templates: RwLock<Option<Templates>>,
    /// Engine registrations made before the context exists; merged into the
    /// context's view registry at init.
    pending_engines: Mutex<Vec<(String, Arc<dyn ViewEngine>)>>,
    router: Arc<Router>,
    emitter: Emitter,
    ctx: RwLock<Weak<AppContext>>,
}

/// Exact-match route registration proxies, one per recognized method,
/// forwarding to the owned router.
macro_rules! verb_proxies {
    ($($fn_name:ident),* $(,)?) => {
        $(
            pub fn $fn_name(&self, path: &str, handler: HandlerFn) -> Result<(), Error> {
                self.router.$fn_name(path, handler)
            }
        )*
    };
}

impl Application {
    /// A new application in `preInit` with default settings. The name is its
    /// identity in the dependency system and must not be empty.
    pub fn new(name: impl Into<String>) -> Result<App, Error> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::Configuration(
                "application name must not be empty".to_string(),
            ));
        }

        Ok(Arc::new(Self {
            name,
            state: RwLock::new(AppState::PreInit),
            is_root: AtomicBool::new(false),
            mount_path: RwLock::new(MountSpec::Default),
            parent: RwLock::new(Weak::new()),
            children: Mutex::new(Vec::new()),
            dependencies: Mutex::new(Vec::new()),
            settings: RwLock::new(default_settings()),
            locals: RwLock::new(Map::new()),
            templates: RwLock::new(None),
            pending_engines: Mutex::new(Vec::new()),
            router: Arc::new(Router::new()),
            emitter: Emitter::new(),
            ctx: RwLock::new(Weak::new()),
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> AppState {
        *self.state.read()
    }

    pub fn is_root(&self) -> bool {
        self.is_root.load(Ordering::SeqCst)
    }

    pub fn parent(&self) -> Option<App> {
        self.parent.read().upgrade()
    }

    pub fn children(&self) -> Vec<App> {
        self.children.lock().clone()
    }

    pub fn mount_paths(&self) -> Vec<String> {
        self.mount_path.read().paths()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub(crate) fn router_handle(&self) -> Arc<Router> {
        self.router.clone()
    }

    fn context(&self) -> Result<Arc<AppContext>, Error> {
        self.ctx.read().upgrade().ok_or_else(|| {
            Error::Configuration(format!(
                "application `{}` is not part of a loaded tree",
                self.name
            ))
        })
    }

    // ---- settings ----------------------------------------------------

    /// Read a setting. The Express `get` overload is split: this reads,
    /// [`Application::get`] registers a GET route.
    pub fn setting(&self, name: &str) -> Option<Value> {
        self.settings.read().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.settings.write().insert(name.to_string(), value);
        if name == "case sensitive routing" || name == "strict routing" {
            self.router.set_options(MatchOptions {
                sensitive: self.enabled("case sensitive routing"),
                strict: self.enabled("strict routing"),
                end: true,
            });
        }
    }

    pub fn enable(&self, name: &str) {
        self.set(name, Value::Bool(true));
    }

    pub fn disable(&self, name: &str) {
        self.set(name, Value::Bool(false));
    }

    pub fn enabled(&self, name: &str) -> bool {
        self.setting(name).map(|v| truthy(&v)).unwrap_or(false)
    }

    pub fn disabled(&self, name: &str) -> bool {
        !self.enabled(name)
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.locals.read().get(name).cloned()
    }

    pub fn set_local(&self, name: &str, value: Value) {
        self.locals.write().insert(name.to_string(), value);
    }

    /// Configure template lookup for this application's views.
    pub fn set_templates(&self, templates: Templates) {
        *self.templates.write() = Some(templates);
    }

    // ---- events ------------------------------------------------------

    pub fn on(&self, event: &str, listener: EventListener) -> ListenerId {
        self.emitter.on(event, listener)
    }

    pub fn off(&self, event: &str, id: ListenerId) -> bool {
        self.emitter.off(event, id)
    }

    pub fn on_mount(&self, hook: HookFn) {
        self.emitter.on_mount(hook);
    }

    pub fn on_init(&self, hook: HookFn) {
        self.emitter.on_init(hook);
    }

    pub fn on_load(&self, hook: HookFn) {
        self.emitter.on_load(hook);
    }

    /// Emit a named event to this application's subscribers. Gated on the
    /// loaded state; the lifecycle signals `mount` and `init` are exempt
    /// because they fire before loading by construction.
    pub fn emit(&self, event: &str, payload: Value) -> Result<(), Error> {
        let state = self.state();
        let exempt = event == "mount" || event == "init";
        if state != AppState::Loaded && !exempt {
            return Err(Error::EmitBeforeLoad {
                event: event.to_string(),
                state: state.to_string(),
            });
        }
        self.emitter.emit_raw(event, &payload);
        Ok(())
    }

    // ---- dependencies ------------------------------------------------

    /// Declare named dependencies on sibling applications. Must happen
    /// before the tree inits.
    pub fn depends_on(&self, names: &[&str]) -> Result<(), Error> {
        if names.is_empty() || names.iter().any(|n| n.is_empty()) {
            return Err(Error::InvalidDependencyList);
        }
        if self.state() != AppState::PreInit {
            return Err(Error::Configuration(format!(
                "`{}` cannot declare dependencies after init",
                self.name
            )));
        }
        let mut slots = self.dependencies.lock();
        for name in names {
            slots.push(DependencySlot::Named((*name).to_string()));
        }
        Ok(())
    }

    /// The mock standing in for `name`, available between init and load.
    pub fn dependency_mock(&self, name: &str) -> Option<Arc<MockDependency>> {
        self.dependencies.lock().iter().find_map(|slot| match slot {
            DependencySlot::Mock(mock) if mock.name() == name => Some(mock.clone()),
            _ => None,
        })
    }

    /// The resolved application for `name`, available once loaded.
    pub fn dependency(&self, name: &str) -> Option<App> {
        self.dependencies.lock().iter().find_map(|slot| match slot {
            DependencySlot::Resolved(app) if app.name() == name => Some(app.clone()),
            _ => None,
        })
    }

    // ---- routing surface ---------------------------------------------

    /// Prefix-matched middleware, any method.
    pub fn use_handler(&self, path: &str, handler: HandlerFn) -> Result<(), Error> {
        self.router.use_handler(path, handler)
    }

    /// Prefix-matched error handler, any method.
    pub fn use_error_handler(&self, path: &str, handler: ErrorHandlerFn) -> Result<(), Error> {
        self.router.use_error_handler(path, handler)
    }

    pub fn param(&self, name: &str, handler: HandlerFn) {
        self.router.param(name, handler)
    }

    verb_proxies! {
        all, get, checkout, connect, copy, delete, head, lock, merge,
        mkactivity, mkcol, m_search, notify, options, patch, post, propfind,
        proppatch, purge, put, report, search, subscribe, trace, unlock,
        unsubscribe,
    }

    pub fn r#move(&self, path: &str, handler: HandlerFn) -> Result<(), Error> {
        self.router.r#move(path, handler)
    }

    /// Bind several methods to one exact path without repeating it.
    pub fn route(&self, path: &str) -> RouteBuilder<'_> {
        self.router.route(path)
    }

    /// Mount a child application at `path`.
    pub fn use_app(self: &Arc<Self>, path: &str, child: &App) -> Result<(), Error> {
        self.use_app_at(&[path], child)
    }

    /// Mount a child application under several prefixes at once. The child
    /// joins `children`, inherits this application's locals as defaults,
    /// accumulates the mount paths, and its resolver becomes prefix
    /// middleware on this router. Fires the child's mount hook.
    pub fn use_app_at(self: &Arc<Self>, paths: &[&str], child: &App) -> Result<(), Error> {
        if paths.is_empty() {
            return Err(Error::Configuration(
                "mounting needs at least one path".to_string(),
            ));
        }

        self.children.lock().push(child.clone());
        *child.parent.write() = Arc::downgrade(self);

        {
            // Parent locals act as defaults; the child's own values win.
            let mut merged = self.locals.read().clone();
            let mut child_locals = child.locals.write();
            for (key, value) in child_locals.iter() {
                merged.insert(key.clone(), value.clone());
            }
            *child_locals = merged;
        }

        for path in paths {
            child.mount_path.write().mount(path);

            let mounted = child.clone();
            let handler: HandlerFn = Arc::new(move |req, res| {
                let child = mounted.clone();
                Box::pin(async move {
                    let child_req = req.for_app(&child)?;
                    child.router.resolve(&child_req, &res).await?;
                    if res.ended() {
                        Ok(Flow::Halt)
                    } else {
                        Ok(Flow::Next)
                    }
                })
            });
            self.router.use_handler(path, handler)?;
        }

        debug!(child = %child.name(), parent = %self.name(), "Mounted application");
        child.emitter.fire_mount(self);
        Ok(())
    }

    // ---- lifecycle ---------------------------------------------------

    /// Depth-first pre-order init over the tree: dependency names resolve to
    /// shared-by-name mocks, state advances to inited, the application joins
    /// the context registry, and the init hook fires.
    pub fn init_apps(self: &Arc<Self>, ctx: &Arc<AppContext>) {
        if self.state() == AppState::PreInit {
            {
                let mut slots = self.dependencies.lock();
                for slot in slots.iter_mut() {
                    if let DependencySlot::Named(name) = slot {
                        *slot = DependencySlot::Mock(ctx.mock_for(name));
                    }
                }
            }

            *self.ctx.write() = Arc::downgrade(ctx);
            for (ext, engine) in self.pending_engines.lock().drain(..) {
                ctx.views().register(&ext, engine);
            }

            *self.state.write() = AppState::Inited;
            ctx.register_app(self);
            debug!(app = %self.name, "Inited application");
            self.emitter.fire_init(self);
        }

        for child in self.children() {
            child.init_apps(ctx);
        }
    }

    /// Replay every mock's recordings onto the real applications. Must run
    /// after the whole tree has inited and before anything loads.
    pub fn reconcile_mocks_with_apps(ctx: &Arc<AppContext>) {
        for app in ctx.apps() {
            if let Some(mock) = ctx.mock(app.name()) {
                mock.reconcile(&app);
            }
        }
    }

    /// Swap dependency slots for resolved sibling applications and advance
    /// the tree to loaded. A declared dependency that never inited is fatal
    /// to the load pass.
    pub fn load_apps(self: &Arc<Self>, ctx: &Arc<AppContext>) -> Result<(), Error> {
        if self.state() == AppState::Inited {
            {
                let mut slots = self.dependencies.lock();
                for slot in slots.iter_mut() {
                    let resolved = ctx
                        .app(slot.name())
                        .ok_or_else(|| Error::DependencyNotInited(slot.name().to_string()))?;
                    *slot = DependencySlot::Resolved(resolved);
                }
            }

            *self.state.write() = AppState::Loaded;
            debug!(app = %self.name, "Loaded application");
            self.emitter.fire_load(self);
        }

        for child in self.children() {
            child.load_apps(ctx)?;
        }
        Ok(())
    }

    /// Load the tree from this root: build the context, install link
    /// interception on the mount subtree, run init → reconcile → load, then
    /// resolve the current page URL. Returns the context.
    pub async fn load(
        self: &Arc<Self>,
        dom: Arc<dyn Dom>,
        options: LoadOptions,
    ) -> Result<Arc<AppContext>, Error> {
        if options.wait_for_content_loaded {
            dom.wait_content_loaded().await;
        }

        self.is_root.store(true, Ordering::SeqCst);
        let mount_node = options.mount_node.unwrap_or_else(|| dom.body());
        let ctx = AppContext::new(dom.clone(), mount_node.clone());
        ctx.set_authoritative(self);

        // Weak capture: the context owns the Dom and the Dom stores this
        // callback.
        let weak_ctx = Arc::downgrade(&ctx);
        let on_navigate: NavigateFn = Arc::new(move |href, target| {
            let weak_ctx = weak_ctx.clone();
            Box::pin(async move {
                let Some(ctx) = weak_ctx.upgrade() else {
                    return false;
                };
                let Some(app) = ctx.authoritative() else {
                    return false;
                };
                match app.resolve_url(&href, Method::Get, None, target).await {
                    Ok(Resolution::Handled) => true,
                    Ok(Resolution::External) => false,
                    Err(err) => {
                        // The pipeline ran locally; suppress the default
                        // navigation even though it failed.
                        warn!(href = %href, error = %err, "Intercepted navigation failed");
                        true
                    }
                }
            })
        });
        dom.intercept_links(&mount_node, on_navigate);

        self.init_apps(&ctx);
        Self::reconcile_mocks_with_apps(&ctx);
        self.load_apps(&ctx)?;

        let href = dom.location().to_string();
        if let Err(err) = self.resolve_url(&href, Method::Get, None, None).await {
            warn!(href = %href, error = %err, "Initial resolution failed");
        }

        Ok(ctx)
    }

    // ---- navigation --------------------------------------------------

    /// Run a full resolution for `href` through this application's router,
    /// following any redirects each completed pass carries out. Redirect
    /// chains longer than the loop limit fail.
    pub async fn resolve_url(
        self: &Arc<Self>,
        href: &str,
        method: Method,
        body: Option<Value>,
        target: Option<String>,
    ) -> Result<Resolution, Error> {
        let ctx = self.context()?;
        let mut href = href.to_string();
        let mut method = method;
        let mut body = body;

        for _ in 0..REDIRECT_LIMIT {
            let req = Request::new(
                ctx.clone(),
                self,
                &href,
                method,
                body.take(),
                target.clone(),
            )?;
            let res = Response::new(ctx.clone(), self, None);

            if self.router.resolve(&req, &res).await? == Resolution::External {
                return Ok(Resolution::External);
            }
            match res.redirect_url() {
                Some(next) => {
                    debug!(from = %href, to = %next, "Following redirect");
                    href = next;
                    method = Method::Get;
                }
                None => return Ok(Resolution::Handled),
            }
        }

        Err(Error::RedirectLoop(href))
    }

    /// Programmatic navigation. Only the authoritative application (the one
    /// that last completed a response) may redirect; posting `data` switches
    /// the method to post.
    pub async fn redirect(
        self: &Arc<Self>,
        url: &str,
        data: Option<Value>,
    ) -> Result<Resolution, Error> {
        let ctx = self.context()?;
        let authorized = ctx
            .authoritative()
            .map(|app| Arc::ptr_eq(&app, self))
            .unwrap_or(false);
        if !authorized {
            return Err(Error::NoAuthority(self.name.clone()));
        }

        let method = if data.is_some() {
            Method::Post
        } else {
            Method::Get
        };
        self.resolve_url(url, method, data, None).await
    }

    // ---- views -------------------------------------------------------

    /// Register a view engine for one or more extensions. Before the tree
    /// loads the registration is held locally and merged into the context's
    /// registry at init.
    pub fn engine(&self, exts: &[&str], engine: Arc<dyn ViewEngine>) -> Result<(), Error> {
        if exts.is_empty() || exts.iter().any(|ext| ext.is_empty()) {
            return Err(Error::Configuration(
                "engine registration needs at least one non-empty extension".to_string(),
            ));
        }

        match self.ctx.read().upgrade() {
            Some(ctx) => {
                for ext in exts {
                    ctx.views().register(ext, engine.clone());
                }
            }
            None => {
                let mut pending = self.pending_engines.lock();
                for ext in exts {
                    pending.push(((*ext).to_string(), engine.clone()));
                }
            }
        }
        Ok(())
    }

    /// Render `view`: engine by the view's extension, falling back to the
    /// `view engine` setting. Options merge app locals, then nested locals,
    /// then top-level values. Compiled views are cached by view name when
    /// caching is on; templates come from the configured source or, absent
    /// one, a fetch through the Dom.
    pub async fn render(&self, view: &str, options: RenderOptions) -> Result<Rendered, Error> {
        let ctx = self.context()?;

        let ext = view.rsplit_once('.').map(|(_, ext)| ext.to_string());
        let engine = ext
            .as_deref()
            .and_then(|ext| ctx.views().engine(ext))
            .or_else(|| {
                self.setting("view engine")
                    .and_then(|v| v.as_str().and_then(|name| ctx.views().engine(name)))
            })
            .ok_or_else(|| Error::NoViewEngine(view.to_string()))?;

        let mut merged = self.locals.read().clone();
        for (key, value) in &options.locals {
            merged.insert(key.clone(), value.clone());
        }
        for (key, value) in &options.values {
            merged.insert(key.clone(), value.clone());
        }

        let cache = options.cache.unwrap_or_else(|| self.enabled("view cache"));

        let compiled = match cache.then(|| ctx.views().cached(view)).flatten() {
            Some(compiled) => compiled,
            None => {
                let templates = self.templates.read().clone();
                let template = match templates {
                    Some(templates) => templates.lookup(view).await?,
                    None => ctx.dom().fetch(view).await?,
                };
                let compiled = engine.compile(&template, &merged)?;
                if cache {
                    ctx.views().store(view, compiled.clone());
                }
                compiled
            }
        };

        let html = compiled.render(&merged)?;
        debug!(app = %self.name, view = %view, cached = cache, "Rendered view");

        if options.mount && !engine.mount(ctx.dom().as_ref(), ctx.mount_node(), &html) {
            ctx.dom().set_content(ctx.mount_node(), &html);
        }

        Ok(Rendered {
            html,
            options: merged,
        })
    }

    // ---- test support ------------------------------------------------

    #[cfg(test)]
    pub(crate) fn force_state_loaded_for_tests(&self) {
        *self.state.write() = AppState::Loaded;
    }

    #[cfg(test)]
    pub(crate) fn set_mount_path_for_tests(&self, path: &str) {
        *self.mount_path.write() = MountSpec::Paths(vec![path.to_string()]);
    }

    #[cfg(test)]
    pub(crate) fn add_mount_path_for_tests(&self, path: &str) {
        self.mount_path.write().mount(path);
    }
}

fn default_settings() -> Map<String, Value> {
    let env = std::env::var("TRELLIS_ENV").unwrap_or_else(|_| "development".to_string());
    let mut settings = Map::new();
    settings.insert("env".to_string(), json!(env));
    settings.insert("view cache".to_string(), json!(env == "production"));
    settings.insert("case sensitive routing".to_string(), json!(false));
    settings.insert("strict routing".to_string(), json!(false));
    // Passthrough keys: defined for compatibility, unused by the core.
    settings.insert("etag".to_string(), json!("weak"));
    settings.insert("jsonp callback name".to_string(), json!("callback"));
    settings.insert("json replacer".to_string(), Value::Null);
    settings.insert("json spaces".to_string(), Value::Null);
    settings.insert("query parser".to_string(), json!("extended"));
    settings.insert("subdomain offset".to_string(), json!(2));
    settings.insert("x-powered-by".to_string(), json!(true));
    settings
}

/// Express-style truthiness for setting values.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_context;

    #[test]
    fn rejects_an_empty_name() {
        assert!(matches!(
            Application::new(""),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn starts_pre_init_with_default_settings() {
        let app = Application::new("root").unwrap();
        assert_eq!(app.state(), AppState::PreInit);
        assert_eq!(app.setting("env"), Some(json!("development")));
        assert!(app.disabled("view cache"));
        assert!(app.disabled("case sensitive routing"));
        assert_eq!(app.mount_paths(), vec!["/".to_string()]);
    }

    #[test]
    fn settings_use_value_truthiness() {
        let app = Application::new("root").unwrap();
        app.set("flag", json!("yes"));
        assert!(app.enabled("flag"));
        app.set("flag", json!(""));
        assert!(app.disabled("flag"));
        app.set("flag", json!(0));
        assert!(app.disabled("flag"));
        app.enable("flag");
        assert!(app.enabled("flag"));
    }

    #[test]
    fn emit_is_gated_until_loaded() {
        let app = Application::new("root").unwrap();

        let err = app.emit("report", Value::Null).unwrap_err();
        assert!(matches!(err, Error::EmitBeforeLoad { .. }));

        // Lifecycle signals are exempt.
        app.emit("mount", Value::Null).unwrap();
        app.emit("init", Value::Null).unwrap();

        app.force_state_loaded_for_tests();
        app.emit("report", Value::Null).unwrap();
    }

    #[test]
    fn mounting_accumulates_paths_in_order() {
        let parent_a = Application::new("a").unwrap();
        let parent_b = Application::new("b").unwrap();
        let child = Application::new("child").unwrap();

        parent_a.use_app("/first", &child).unwrap();
        parent_b.use_app("/second", &child).unwrap();

        assert_eq!(
            child.mount_paths(),
            vec!["/first".to_string(), "/second".to_string()]
        );
        // Last mount wins the parent back-reference.
        assert!(Arc::ptr_eq(&child.parent().unwrap(), &parent_b));
    }

    #[test]
    fn mounting_merges_locals_with_child_winning() {
        let parent = Application::new("parent").unwrap();
        let child = Application::new("child").unwrap();
        parent.set_local("theme", json!("dark"));
        parent.set_local("lang", json!("en"));
        child.set_local("theme", json!("light"));

        parent.use_app("/c", &child).unwrap();
        assert_eq!(child.local("theme"), Some(json!("light")));
        assert_eq!(child.local("lang"), Some(json!("en")));
    }

    #[test]
    fn mount_hook_receives_the_parent() {
        let parent = Application::new("parent").unwrap();
        let child = Application::new("child").unwrap();
        let seen = Arc::new(Mutex::new(None));

        let seen_in_hook = seen.clone();
        child.on_mount(Arc::new(move |parent| {
            *seen_in_hook.lock() = Some(parent.name().to_string());
        }));

        parent.use_app("/c", &child).unwrap();
        assert_eq!(seen.lock().as_deref(), Some("parent"));
    }

    #[test]
    fn init_is_pre_order_and_monotonic() {
        let root = Application::new("root").unwrap();
        let child = Application::new("child").unwrap();
        let grandchild = Application::new("grandchild").unwrap();
        child.use_app("/g", &grandchild).unwrap();
        root.use_app("/c", &child).unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        for app in [&root, &child, &grandchild] {
            let order = order.clone();
            app.on_init(Arc::new(move |app| {
                order.lock().push(app.name().to_string());
            }));
        }

        let ctx = test_context("https://app.example/");
        root.init_apps(&ctx);
        assert_eq!(*order.lock(), vec!["root", "child", "grandchild"]);
        assert_eq!(root.state(), AppState::Inited);
        assert_eq!(grandchild.state(), AppState::Inited);

        // A second pass is a no-op.
        root.init_apps(&ctx);
        assert_eq!(order.lock().len(), 3);
    }

    #[test]
    fn load_resolves_dependency_slots() {
        let root = Application::new("root").unwrap();
        let site_a = Application::new("siteA").unwrap();
        let site_b = Application::new("siteB").unwrap();
        site_a.depends_on(&["siteB"]).unwrap();
        root.use_app("/a", &site_a).unwrap();
        root.use_app("/b", &site_b).unwrap();

        let ctx = test_context("https://app.example/");
        root.init_apps(&ctx);
        assert!(site_a.dependency_mock("siteB").is_some());

        Application::reconcile_mocks_with_apps(&ctx);
        root.load_apps(&ctx).unwrap();

        let resolved = site_a.dependency("siteB").unwrap();
        assert!(Arc::ptr_eq(&resolved, &site_b));
        assert_eq!(site_a.state(), AppState::Loaded);
    }

    #[test]
    fn loading_an_unknown_dependency_fails() {
        let root = Application::new("root").unwrap();
        root.depends_on(&["ghost"]).unwrap();

        let ctx = test_context("https://app.example/");
        root.init_apps(&ctx);
        let err = root.load_apps(&ctx).unwrap_err();
        assert!(matches!(err, Error::DependencyNotInited(name) if name == "ghost"));
    }

    #[test]
    fn dependency_list_must_be_well_formed() {
        let app = Application::new("root").unwrap();
        assert!(matches!(
            app.depends_on(&[]),
            Err(Error::InvalidDependencyList)
        ));
        assert!(matches!(
            app.depends_on(&["ok", ""]),
            Err(Error::InvalidDependencyList)
        ));
    }
}
