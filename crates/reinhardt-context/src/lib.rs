//! # Reinhardt Context
//!
//! Inversion-of-control container for Reinhardt.
//!
//! ## Features
//!
//! - **Hierarchical contexts**: child contexts inherit and shadow the bindings of their ancestors
//! - **Bindings**: constants, factories, async factories, injectable classes, providers and aliases
//! - **Scopes**: transient, per-context and singleton caching with at-most-once construction
//! - **Injection**: constructor and property injection by key, tag, view, getter or configuration
//! - **Views**: live binding sets that follow bind/unbind events across the context chain
//! - **Handler chains**: wrap-style pipelines with discovery and phase ordering
//! - **Interceptors**: global, class and method interceptors around method calls, and proxies
//!
//! Values that may be produced synchronously or asynchronously travel as
//! [`ValueOrPromise`]; a fully synchronous resolution never touches an executor.
//!
//! ## Example
//!
//! ```rust
//! use reinhardt_context::{BindingScope, Context};
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//!
//! let app = Context::named("app");
//! let counter = Arc::new(AtomicU32::new(0));
//! let calls = Arc::clone(&counter);
//! app.bind("request.id")
//!     .unwrap()
//!     .to_dynamic_value(move || calls.fetch_add(1, Ordering::SeqCst))
//!     .in_scope(BindingScope::Context);
//!
//! let request = app.create_child();
//! let first = request.get_sync::<u32>("request.id").unwrap();
//! let again = request.get_sync::<u32>("request.id").unwrap();
//! assert_eq!(first, again);
//! assert_eq!(counter.load(Ordering::SeqCst), 1);
//! ```
//!
//! ## Configuration
//!
//! [`ContextSettings`] is read from TOML or from `REINHARDT_CONTEXT_*`
//! environment variables:
//!
//! ```rust
//! use reinhardt_context::{Context, ContextSettings};
//!
//! let settings = ContextSettings::from_toml_str(r#"
//! max_resolution_depth = 32
//! global_interceptor_groups = ["tracing", "caching"]
//! "#).unwrap();
//! let ctx = Context::with_settings(settings);
//! assert_eq!(ctx.settings().max_resolution_depth, 32);
//! ```

pub mod binding;
pub mod binding_filter;
pub mod binding_key;
pub mod binding_sorter;
pub mod context;
pub mod error;
pub mod handler_chain;
pub mod inject;
pub mod interceptor;
pub mod metadata;
pub mod provider;
pub mod proxy;
pub mod resolution;
pub mod scope;
pub mod settings;
pub mod value_promise;
pub mod view;

pub use binding::{Binding, BindingId, BindingTag, BindingTemplate, BindingType, BoundValue};
pub use binding_filter::{BindingFilter, filter_by_key, filter_by_tag, filter_by_tag_value};
pub use binding_key::{BindingKey, CONFIG_NAMESPACE, ContextBindings, ContextTags, build_key_for_config, validate_key};
pub use binding_sorter::{BindingComparator, compare_bindings_by_tag, compare_by_order, sort_bindings_by_phase};
pub use context::{
	Context, ContextEvent, ContextEventType, ContextId, ContextObserver, ResolutionOptions, Subscription,
	SubscriptionId, downcast_value,
};
pub use error::{ContextError, ContextResult};
pub use handler_chain::{
	Handler, HandlerChain, HandlerContext, HandlerOrKey, HandlerResult, InvocationResult, Next, handler,
	invocation_result, invoke_handlers, result_value,
};
pub use inject::{
	Getter, InjectedArgs, Injectable, Injection, InjectionTarget, define_constructor, define_property,
	instantiate_class, resolve_injected_arguments, resolve_injection,
};
pub use interceptor::{
	Interceptor, InterceptorOrKey, InvocationArgs, InvocationContext, Invocable, as_global_interceptor,
	intercept_class, intercept_method, interceptor, invoke_method_with_interceptors, merge_interceptors,
};
pub use metadata::{MetadataEntry, MetadataInspector, MetadataKind};
pub use provider::{Provider, ValueFactory};
pub use proxy::InterceptedProxy;
pub use resolution::{MAX_RESOLUTION_DEPTH, ResolutionElement, ResolutionSession};
pub use scope::BindingScope;
pub use settings::{ContextSettings, ENV_PREFIX, SettingsError};
pub use value_promise::{ValueOrPromise, resolve_list, try_resolve_list, try_resolve_map, try_with_finally};
pub use view::ContextView;

/// Commonly used items
pub mod prelude {
	pub use crate::{
		Binding, BindingKey, BindingScope, Context, ContextError, ContextResult, ContextTags, ContextView, Handler,
		HandlerChain, InjectedArgs, Injectable, Injection, InterceptedProxy, Interceptor, InvocationArgs,
		InvocationContext, Invocable, Next, Provider, ValueOrPromise, as_global_interceptor, define_constructor,
		define_property, filter_by_tag, handler, intercept_class, intercept_method, interceptor, invocation_result,
	};
}
