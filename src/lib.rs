// Trellis - a client-side, Express-inspired micro-framework
//
// This library composes nested single-page applications: a path-based
// router with Express-compatible middleware semantics plus an application
// tree with lifecycle states and mock-then-real dependency injection.

// Re-export core functionality
pub use trellis_core::*;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use trellis_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        App,
        AppContext,
        AppState,
        Application,
        CompiledView,
        Dom,
        Error,
        Flow,
        HandlerFn,
        LoadOptions,
        Method,
        MockDependency,
        NodeHandle,
        RenderOptions,
        Request,
        Resolution,
        Response,
        Router,
        TemplateSource,
        Templates,
        ViewEngine,
    };
}
