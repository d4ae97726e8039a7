//! Handler chains: wrap-style pipelines around a terminal action
//!
//! Each handler receives the chain's context and a [`Next`] continuation.
//! Calling [`Next::proceed`] runs the rest of the chain; not calling it
//! short-circuits the chain with the handler's own result. A chain of
//! synchronous handlers yields a [`ValueOrPromise::Value`]; the result is
//! only pending when some handler actually is.
//!
//! ```
//! use reinhardt_context::{Context, HandlerChain, ValueOrPromise, handler, invocation_result};
//!
//! let ctx = Context::new();
//! let chain = HandlerChain::new(
//!     ctx,
//!     [
//!         handler(|_ctx: Context, next| next.proceed()),
//!         handler(|_ctx: Context, _next| ValueOrPromise::Value(Ok(invocation_result("done")))),
//!     ],
//! );
//! let result = chain.invoke_handlers().into_sync().ok().unwrap().unwrap();
//! assert_eq!(result.unwrap().downcast_ref::<&str>(), Some(&"done"));
//! ```

use crate::binding::{Binding, BoundValue};
use crate::binding_filter::BindingFilter;
use crate::binding_key::BindingKey;
use crate::binding_sorter::BindingComparator;
use crate::context::{Context, ResolutionOptions, downcast_value, required};
use crate::error::ContextResult;
use crate::value_promise::ValueOrPromise;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Result of a handler: nothing, or a type-erased value
pub type InvocationResult = Option<BoundValue>;

/// What a handler returns
pub type HandlerResult = ValueOrPromise<ContextResult<InvocationResult>>;

/// Wraps a value as an [`InvocationResult`]
pub fn invocation_result<T: Any + Send + Sync>(value: T) -> InvocationResult {
	Some(Arc::new(value))
}

/// Borrows the value of an [`InvocationResult`] as `T`
pub fn result_value<T: Any>(result: &InvocationResult) -> Option<&T> {
	result.as_ref().and_then(|value| value.downcast_ref::<T>())
}

/// Context type handlers run against
pub trait HandlerContext: Clone + Send + Sync + 'static {
	/// Context used to load handlers bound by key
	fn context(&self) -> &Context;
}

impl HandlerContext for Context {
	fn context(&self) -> &Context {
		self
	}
}

/// A handler function
pub type Handler<C = Context> = Arc<dyn Fn(C, Next<C>) -> HandlerResult + Send + Sync>;

/// Creates a [`Handler`] from a closure
pub fn handler<C, F>(func: F) -> Handler<C>
where
	C: HandlerContext,
	F: Fn(C, Next<C>) -> HandlerResult + Send + Sync + 'static,
{
	Arc::new(func)
}

/// A handler, or the key of a binding whose value is a [`Handler`]
pub enum HandlerOrKey<C = Context> {
	Handler(Handler<C>),
	Key(String),
}

impl<C> Clone for HandlerOrKey<C> {
	fn clone(&self) -> Self {
		match self {
			Self::Handler(handler) => Self::Handler(Arc::clone(handler)),
			Self::Key(key) => Self::Key(key.clone()),
		}
	}
}

/// Handlers are equal when they are the same function object; keys when
/// the strings match
impl<C> PartialEq for HandlerOrKey<C> {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Handler(a), Self::Handler(b)) => std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b)),
			(Self::Key(a), Self::Key(b)) => a == b,
			_ => false,
		}
	}
}

impl<C> Eq for HandlerOrKey<C> {}

impl<C> fmt::Debug for HandlerOrKey<C> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Handler(handler) => write!(f, "Handler({:p})", Arc::as_ptr(handler)),
			Self::Key(key) => f.debug_tuple("Key").field(key).finish(),
		}
	}
}

impl<C> From<Handler<C>> for HandlerOrKey<C> {
	fn from(handler: Handler<C>) -> Self {
		Self::Handler(handler)
	}
}

impl<C> From<&str> for HandlerOrKey<C> {
	fn from(key: &str) -> Self {
		Self::Key(key.to_string())
	}
}

impl<C> From<String> for HandlerOrKey<C> {
	fn from(key: String) -> Self {
		Self::Key(key)
	}
}

impl<C, T> From<BindingKey<T>> for HandlerOrKey<C> {
	fn from(key: BindingKey<T>) -> Self {
		Self::Key(key.key().to_string())
	}
}

type Terminal<C> = Arc<dyn Fn(C) -> HandlerResult + Send + Sync>;

enum HandlerSource<C> {
	List(Arc<[HandlerOrKey<C>]>),
	Discovered {
		filter: BindingFilter,
		comparator: Option<BindingComparator>,
	},
}

/// A chain of handlers around an optional terminal action
pub struct HandlerChain<C: HandlerContext = Context> {
	context: C,
	source: HandlerSource<C>,
	terminal: Option<Terminal<C>>,
}

impl<C: HandlerContext> HandlerChain<C> {
	/// Chain over a fixed list of handlers
	pub fn new<I, H>(context: C, handlers: I) -> Self
	where
		I: IntoIterator<Item = H>,
		H: Into<HandlerOrKey<C>>,
	{
		Self {
			context,
			source: HandlerSource::List(handlers.into_iter().map(Into::into).collect()),
			terminal: None,
		}
	}

	/// Chain over the bindings matching `filter`, looked up again on every
	/// invocation and ordered by `comparator`
	pub fn discover(context: C, filter: impl Into<BindingFilter>, comparator: Option<BindingComparator>) -> Self {
		Self {
			context,
			source: HandlerSource::Discovered {
				filter: filter.into(),
				comparator,
			},
			terminal: None,
		}
	}

	/// Action run when the last handler proceeds. Without one, proceeding
	/// past the last handler yields `None`.
	pub fn with_terminal<F>(mut self, terminal: F) -> Self
	where
		F: Fn(C) -> HandlerResult + Send + Sync + 'static,
	{
		self.terminal = Some(Arc::new(terminal));
		self
	}

	pub fn context(&self) -> &C {
		&self.context
	}

	/// The handlers the next invocation will run
	pub fn handlers(&self) -> Vec<HandlerOrKey<C>> {
		match &self.source {
			HandlerSource::List(handlers) => handlers.to_vec(),
			HandlerSource::Discovered { filter, comparator } => {
				let mut bindings = self.context.context().find(filter.clone());
				if let Some(comparator) = comparator {
					comparator.sort(&mut bindings);
				}
				bindings
					.iter()
					.map(|binding: &Arc<Binding>| HandlerOrKey::Key(binding.key().to_string()))
					.collect()
			}
		}
	}

	/// Runs the chain from its first handler with a fresh cursor
	pub fn invoke_handlers(&self) -> HandlerResult {
		let state = ChainState {
			context: self.context.clone(),
			handlers: self.handlers(),
			terminal: self.terminal.clone(),
		};
		trace!(handlers = state.handlers.len(), "Invoking handler chain");
		Next {
			state: Arc::new(state),
			index: 0,
		}
		.proceed()
	}
}

/// Runs `handlers` once against `context`
pub fn invoke_handlers<C: HandlerContext>(context: C, handlers: Vec<HandlerOrKey<C>>) -> HandlerResult {
	HandlerChain::new(context, handlers).invoke_handlers()
}

struct ChainState<C> {
	context: C,
	handlers: Vec<HandlerOrKey<C>>,
	terminal: Option<Terminal<C>>,
}

/// Continuation of a running chain
pub struct Next<C> {
	state: Arc<ChainState<C>>,
	index: usize,
}

impl<C> Clone for Next<C> {
	fn clone(&self) -> Self {
		Self {
			state: Arc::clone(&self.state),
			index: self.index,
		}
	}
}

impl<C: HandlerContext> Next<C> {
	/// Runs the remaining handlers, then the terminal action
	pub fn proceed(&self) -> HandlerResult {
		let state = &self.state;
		let Some(entry) = state.handlers.get(self.index) else {
			return match &state.terminal {
				Some(terminal) => terminal(state.context.clone()),
				None => ValueOrPromise::Value(Ok(None)),
			};
		};

		let index = self.index;
		let next = Next {
			state: Arc::clone(state),
			index: index + 1,
		};
		load_handler(&state.context, entry).and_then_ok(move |handler| {
			trace!(index, "Invoking handler");
			let context = next.state.context.clone();
			handler(context, next)
		})
	}

	/// Position of the handler this continuation runs next
	pub fn index(&self) -> usize {
		self.index
	}
}

fn load_handler<C: HandlerContext>(context: &C, entry: &HandlerOrKey<C>) -> ValueOrPromise<ContextResult<Handler<C>>> {
	match entry {
		HandlerOrKey::Handler(handler) => ValueOrPromise::Value(Ok(Arc::clone(handler))),
		HandlerOrKey::Key(key) => {
			let key = key.clone();
			context
				.context()
				.get_value_or_promise(&key, &ResolutionOptions::default())
				.map(move |result| -> ContextResult<Handler<C>> {
					let handler = downcast_value::<Handler<C>>(&key, required(&key, result?)?)?;
					Ok(Arc::clone(&*handler))
				})
		}
	}
}
