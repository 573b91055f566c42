//! Testing utilities for Trellis applications.
//!
//! Applications under test need stand-ins for the external collaborators:
//! a scriptable DOM and simple view-engine/template-source implementations.
//!
//! ```no_run
//! use std::sync::Arc;
//! use trellis_core::{Application, LoadOptions};
//! use trellis_testing::StubDom;
//!
//! # tokio_test::block_on(async {
//! let dom = Arc::new(StubDom::new("https://app.example/"));
//! let app = Application::new("root").unwrap();
//! let ctx = app.load(dom.clone(), LoadOptions::default()).await.unwrap();
//!
//! // Simulate a click on an intercepted link.
//! let handled = dom.click("/users/42", None).await;
//! # let _ = (ctx, handled);
//! # });
//! ```

mod stub_dom;
mod view;

pub use stub_dom::StubDom;
pub use view::{MapTemplates, SimpleEngine};
