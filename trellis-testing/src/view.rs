// View-engine and template-source test doubles

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use trellis_core::{CompiledView, Error, TemplateSource, ViewEngine};

/// Minimal `{{key}}`-substitution view engine. Counts compilations so tests
/// can observe the compiled-view cache.
#[derive(Default)]
pub struct SimpleEngine {
    compilations: AtomicUsize,
}

impl SimpleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_count(&self) -> usize {
        self.compilations.load(Ordering::SeqCst)
    }
}

struct SimpleView {
    template: String,
}

impl CompiledView for SimpleView {
    fn render(&self, options: &Map<String, Value>) -> Result<String, Error> {
        let mut out = self.template.clone();
        for (key, value) in options {
            let needle = format!("{{{{{key}}}}}");
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out = out.replace(&needle, &text);
        }
        Ok(out)
    }
}

impl ViewEngine for SimpleEngine {
    fn compile(
        &self,
        template: &str,
        _options: &Map<String, Value>,
    ) -> Result<Arc<dyn CompiledView>, Error> {
        self.compilations.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(SimpleView {
            template: template.to_string(),
        }))
    }
}

/// Keyed in-memory template source, recording every lookup.
#[derive(Default)]
pub struct MapTemplates {
    templates: Mutex<HashMap<String, String>>,
    lookups: Mutex<Vec<String>>,
}

impl MapTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, view: &str, source: &str) -> Self {
        self.templates
            .lock()
            .insert(view.to_string(), source.to_string());
        self
    }

    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().clone()
    }
}

#[async_trait]
impl TemplateSource for MapTemplates {
    async fn lookup(&self, view: &str) -> Result<String, Error> {
        self.lookups.lock().push(view.to_string());
        self.templates
            .lock()
            .get(view)
            .cloned()
            .ok_or_else(|| Error::ViewLookup(view.to_string()))
    }
}
