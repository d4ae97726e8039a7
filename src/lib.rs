//! # Reinhardt IoC
//!
//! An inversion-of-control container for Rust.
//!
//! The container keeps values in a tree of [`Context`]s. Each context owns a
//! registry of bindings and falls back to its parent for keys it does not
//! bind. On top of the registry sit dependency injection, live views, handler
//! chains and method interceptors.
//!
//! ## Feature Flags
//!
//! - `context` (default) - Contexts, bindings, injection, handler chains and interceptors
//!
//! ## Quick Example
//!
//! ```rust
//! use reinhardt_ioc::prelude::*;
//!
//! struct Greeter {
//!     name: String,
//! }
//!
//! impl Injectable for Greeter {
//!     fn construct(args: InjectedArgs) -> ContextResult<Self> {
//!         Ok(Greeter { name: args.get::<String>(0)?.to_string() })
//!     }
//! }
//!
//! define_constructor::<Greeter>([Injection::key("user.name")]);
//!
//! let app = Context::named("app");
//! app.bind("greeter").unwrap().to_class::<Greeter>().in_scope(BindingScope::Singleton);
//!
//! let request = app.create_child();
//! request.bind("user.name").unwrap().to("Ray".to_string());
//! assert_eq!(request.get_sync::<Greeter>("greeter").unwrap().name, "Ray");
//! ```

#[cfg(feature = "context")]
pub mod context;

#[cfg(feature = "context")]
pub use reinhardt_context::{
	Binding, BindingFilter, BindingKey, BindingScope, Context, ContextError, ContextResult, ContextSettings, ContextTags,
	ContextView, HandlerChain, InterceptedProxy, InvocationContext, ValueOrPromise,
};

/// Prelude module for convenient imports
#[cfg(feature = "context")]
pub mod prelude {
	pub use reinhardt_context::prelude::*;
}
