//! View engines, template sources, and the process-wide view registry.
//!
//! A view engine is an external collaborator: `compile` turns template
//! source into a renderable, and `mount` (optional) attaches a rendered
//! result to the DOM. Engines are registered per file extension; compiled
//! views are cached by view name when `view cache` is enabled.

use crate::dom::{Dom, NodeHandle};
use crate::Error;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// A compiled template, ready to render against merged options.
pub trait CompiledView: Send + Sync {
    fn render(&self, options: &Map<String, Value>) -> Result<String, Error>;
}

pub trait ViewEngine: Send + Sync {
    /// Compile template source. `options` is the merged render-option map.
    fn compile(
        &self,
        template: &str,
        options: &Map<String, Value>,
    ) -> Result<Arc<dyn CompiledView>, Error>;

    /// Attach rendered output to `node`. Returns `false` when the engine has
    /// no mounting support, in which case the caller replaces the node's
    /// content directly.
    fn mount(&self, _dom: &dyn Dom, _node: &NodeHandle, _rendered: &str) -> bool {
        false
    }
}

/// Template lookup configured through the `views` setting: either a keyed
/// map of sources or an asynchronous resolver.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn lookup(&self, view: &str) -> Result<String, Error>;
}

/// The `views` setting.
#[derive(Clone)]
pub enum Templates {
    Map(HashMap<String, String>),
    Source(Arc<dyn TemplateSource>),
}

impl Templates {
    pub(crate) async fn lookup(&self, view: &str) -> Result<String, Error> {
        match self {
            Templates::Map(map) => map
                .get(view)
                .cloned()
                .ok_or_else(|| Error::ViewLookup(view.to_string())),
            Templates::Source(source) => source.lookup(view).await,
        }
    }
}

/// Engines keyed by extension plus compiled views keyed by view name.
/// Owned by the application-tree context; page lifetime, no teardown.
#[derive(Default)]
pub struct ViewRegistry {
    engines: Mutex<HashMap<String, Arc<dyn ViewEngine>>>,
    cache: Mutex<HashMap<String, Arc<dyn CompiledView>>>,
}

impl ViewRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, ext: &str, engine: Arc<dyn ViewEngine>) {
        self.engines.lock().insert(ext.to_string(), engine);
    }

    pub fn engine(&self, ext: &str) -> Option<Arc<dyn ViewEngine>> {
        self.engines.lock().get(ext).cloned()
    }

    pub fn cached(&self, view: &str) -> Option<Arc<dyn CompiledView>> {
        self.cache.lock().get(view).cloned()
    }

    pub fn store(&self, view: &str, compiled: Arc<dyn CompiledView>) {
        self.cache.lock().insert(view.to_string(), compiled);
    }

    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }
}
