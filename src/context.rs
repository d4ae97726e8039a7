//! Container module.
//!
//! Re-exports everything from `reinhardt-context`: contexts, bindings,
//! scopes, views, dependency injection, handler chains and interceptors.
//!
//! # Examples
//!
//! ```rust
//! use reinhardt_ioc::context::{Context, filter_by_tag};
//!
//! let ctx = Context::new();
//! ctx.bind("controllers.home").unwrap().to(1u8).tag("controller");
//! assert_eq!(ctx.find(filter_by_tag("controller")).len(), 1);
//! ```

pub use reinhardt_context::*;
