//! The response side of one navigation attempt.
//!
//! A response is a single-use completion signal: the first `end` fixes the
//! status, marks the owning application authoritative, and fires the bound
//! completion callback; every later `end` fails with
//! [`Error::CannotResend`] and changes nothing.

use crate::context::AppContext;
use crate::{App, Application, Error};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::debug;

/// What a finished resolution pass produced.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: u16,
    pub data: Option<Value>,
    pub redirect: Option<String>,
}

/// One-shot callback bound at construction, invoked by the first `end`.
pub type CompletionFn = Box<dyn FnOnce(&Completion) + Send>;

struct ResponseInner {
    status: Option<u16>,
    ended: bool,
    locals: Map<String, Value>,
    data: Option<Value>,
    redirect: Option<String>,
    route: Option<String>,
    app: Weak<Application>,
    on_complete: Option<CompletionFn>,
}

#[derive(Clone)]
pub struct Response {
    ctx: Arc<AppContext>,
    inner: Arc<Mutex<ResponseInner>>,
}

impl Response {
    pub(crate) fn new(ctx: Arc<AppContext>, app: &App, on_complete: Option<CompletionFn>) -> Self {
        Self {
            ctx,
            inner: Arc::new(Mutex::new(ResponseInner {
                status: None,
                ended: false,
                locals: Map::new(),
                data: None,
                redirect: None,
                route: None,
                app: Arc::downgrade(app),
                on_complete,
            })),
        }
    }

    /// Set the status for the eventual `end`. Returns a handle to the same
    /// response so calls chain.
    pub fn status(&self, code: u16) -> Response {
        self.inner.lock().status = Some(code);
        self.clone()
    }

    /// Finalize the response. At most one call succeeds.
    pub fn end(&self, data: Option<Value>, redirect: Option<String>) -> Result<(), Error> {
        let (app, callback, completion) = {
            let mut guard = self.inner.lock();
            if guard.ended {
                return Err(Error::CannotResend);
            }
            let status = guard.status.unwrap_or(200);
            guard.status = Some(status);
            guard.ended = true;
            guard.data = data.clone();
            guard.redirect = redirect.clone();
            (
                guard.app.upgrade(),
                guard.on_complete.take(),
                Completion {
                    status,
                    data,
                    redirect,
                },
            )
        };

        // The app that completed a response owns subsequent navigation.
        if let Some(app) = app {
            self.ctx.set_authoritative(&app);
        }

        if let Some(callback) = callback {
            callback(&completion);
        }

        Ok(())
    }

    pub fn send(&self, data: Value) -> Result<(), Error> {
        self.end(Some(data), None)
    }

    pub fn json<T: Serialize>(&self, value: &T) -> Result<(), Error> {
        let data = serde_json::to_value(value).map_err(|e| Error::Handler(e.to_string()))?;
        self.end(Some(data), None)
    }

    /// End with the canonical status text as the body.
    pub fn send_status(&self, status: u16) -> Result<(), Error> {
        self.status(status)
            .end(Some(Value::String(status_text(status).to_string())), None)
    }

    /// Finalize with a redirect; the outer resolution loop starts a brand
    /// new pass for the target URL.
    pub fn redirect(&self, url: &str) -> Result<(), Error> {
        self.redirect_with_status(302, url)
    }

    pub fn redirect_with_status(&self, status: u16, url: &str) -> Result<(), Error> {
        self.status(status).end(None, Some(url.to_string()))
    }

    /// Render `view` through the owning application and mount the result.
    /// Render failure degrades to a 500 carrying the error text.
    pub async fn render(&self, view: &str, locals: Map<String, Value>) -> Result<(), Error> {
        let app = self
            .inner
            .lock()
            .app
            .upgrade()
            .ok_or_else(|| Error::Configuration("response has no owning application".into()))?;

        let options = crate::RenderOptions {
            locals,
            mount: true,
            ..Default::default()
        };

        match app.render(view, options).await {
            Ok(rendered) => self.status(200).send(Value::String(rendered.html)),
            Err(err) => {
                let failure = Error::Render(err.to_string());
                debug!(view = %view, error = %failure, "Render failed");
                self.status(500).send(Value::String(failure.to_string()))
            }
        }
    }

    pub fn ended(&self) -> bool {
        self.inner.lock().ended
    }

    pub fn status_code(&self) -> Option<u16> {
        self.inner.lock().status
    }

    pub fn data(&self) -> Option<Value> {
        self.inner.lock().data.clone()
    }

    pub fn redirect_url(&self) -> Option<String> {
        self.inner.lock().redirect.clone()
    }

    pub fn route(&self) -> Option<String> {
        self.inner.lock().route.clone()
    }

    pub fn local(&self, name: &str) -> Option<Value> {
        self.inner.lock().locals.get(name).cloned()
    }

    pub fn set_local(&self, name: &str, value: Value) {
        self.inner.lock().locals.insert(name.to_string(), value);
    }

    pub fn app(&self) -> Option<App> {
        self.inner.lock().app.upgrade()
    }

    pub(crate) fn apply_route(&self, route: &str) {
        self.inner.lock().route = Some(route.to_string());
    }
}

/// Canonical reason phrases for the statuses the framework emits or that
/// handlers commonly send.
pub fn status_text(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        206 => "Partial Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        418 => "I'm a teapot",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown Status",
    }
}
