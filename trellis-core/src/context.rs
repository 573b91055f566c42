//! The application-tree context.
//!
//! One explicitly constructed object replaces the original design's global
//! registries: loaded applications by name, unresolved mocks by name, the
//! single authoritative application, and the view registry. Built during the
//! root application's `load()`; lives for the page lifetime with no
//! teardown.

use crate::dom::{Dom, NodeHandle};
use crate::mock::MockDependency;
use crate::view::ViewRegistry;
use crate::App;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

pub struct AppContext {
    /// Registry of inited applications, in registration order.
    apps: Mutex<Vec<(String, App)>>,
    mocks: Mutex<HashMap<String, Arc<MockDependency>>>,
    authoritative: RwLock<Weak<crate::Application>>,
    views: ViewRegistry,
    dom: Arc<dyn Dom>,
    mount_node: NodeHandle,
}

impl AppContext {
    pub(crate) fn new(dom: Arc<dyn Dom>, mount_node: NodeHandle) -> Arc<Self> {
        Arc::new(Self {
            apps: Mutex::new(Vec::new()),
            mocks: Mutex::new(HashMap::new()),
            authoritative: RwLock::new(Weak::new()),
            views: ViewRegistry::new(),
            dom,
            mount_node,
        })
    }

    pub(crate) fn register_app(&self, app: &App) {
        let mut apps = self.apps.lock();
        match apps.iter_mut().find(|(name, _)| name == app.name()) {
            Some(slot) => slot.1 = app.clone(),
            None => apps.push((app.name().to_string(), app.clone())),
        }
    }

    pub fn app(&self, name: &str) -> Option<App> {
        self.apps
            .lock()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, app)| app.clone())
    }

    /// Registered applications in registration order.
    pub fn apps(&self) -> Vec<App> {
        self.apps.lock().iter().map(|(_, app)| app.clone()).collect()
    }

    /// The mock for `name`, created on first sight and shared by every
    /// application that depends on it.
    pub(crate) fn mock_for(&self, name: &str) -> Arc<MockDependency> {
        self.mocks
            .lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MockDependency::new(name)))
            .clone()
    }

    pub(crate) fn mock(&self, name: &str) -> Option<Arc<MockDependency>> {
        self.mocks.lock().get(name).cloned()
    }

    /// The application currently permitted to initiate navigation.
    pub fn authoritative(&self) -> Option<App> {
        self.authoritative.read().upgrade()
    }

    pub(crate) fn set_authoritative(&self, app: &App) {
        *self.authoritative.write() = Arc::downgrade(app);
    }

    pub fn views(&self) -> &ViewRegistry {
        &self.views
    }

    pub fn dom(&self) -> &Arc<dyn Dom> {
        &self.dom
    }

    pub fn mount_node(&self) -> &NodeHandle {
        &self.mount_node
    }
}
