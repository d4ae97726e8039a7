//! Value factories and providers

use crate::binding::BoundValue;
use crate::context::Context;
use crate::error::ContextResult;
use crate::inject::{Injectable, instantiate_class};
use crate::resolution::ResolutionSession;
use crate::value_promise::ValueOrPromise;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

/// Type alias for the function behind a [`ValueFactory`]
type ValueFactoryInner =
	Arc<dyn Fn(&Context, &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> + Send + Sync>;

/// Wrapper type for binding value factories
///
/// A factory receives the requesting context and the current resolution
/// session. Factories that resolve other bindings should pass the session on
/// so that cycles are reported instead of recursing forever.
#[derive(Clone)]
pub struct ValueFactory(ValueFactoryInner);

impl ValueFactory {
	/// Create a new ValueFactory from a function
	pub fn new<F>(func: F) -> Self
	where
		F: Fn(&Context, &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> + Send + Sync + 'static,
	{
		Self(Arc::new(func))
	}

	/// Factory calling a synchronous function on every resolution
	pub fn from_fn<T, F>(func: F) -> Self
	where
		T: Any + Send + Sync,
		F: Fn() -> T + Send + Sync + 'static,
	{
		Self::new(move |_, _| ValueOrPromise::Value(Ok(Arc::new(func()) as BoundValue)))
	}

	/// Factory awaiting an async function on every resolution
	pub fn from_async<T, F, Fut>(func: F) -> Self
	where
		T: Any + Send + Sync,
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ContextResult<T>> + Send + 'static,
	{
		Self::new(move |_, _| {
			let fut = func();
			ValueOrPromise::promise(async move {
				let value = fut.await?;
				Ok(Arc::new(value) as BoundValue)
			})
		})
	}

	/// Factory instantiating `T` with dependency injection
	pub fn for_class<T: Injectable>() -> Self {
		Self::new(|context, session| {
			instantiate_class::<T>(context, session).map_ok(|instance| Arc::new(instance) as BoundValue)
		})
	}

	/// Factory instantiating the provider `P` and returning its value
	pub fn for_provider<P: Provider>() -> Self {
		Self::new(|context, session| {
			instantiate_class::<P>(context, session)
				.and_then_ok(|provider| provider.value().map_ok(|value| Arc::new(value) as BoundValue))
		})
	}

	/// Invokes the factory
	pub fn produce(&self, context: &Context, session: &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> {
		(self.0)(context, session)
	}
}

impl Deref for ValueFactory {
	type Target = ValueFactoryInner;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}

impl From<ValueFactoryInner> for ValueFactory {
	fn from(func: ValueFactoryInner) -> Self {
		Self(func)
	}
}

impl fmt::Debug for ValueFactory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("ValueFactory(..)")
	}
}

/// A class whose instances produce the bound value.
///
/// The provider itself is instantiated with dependency injection on every
/// resolution of its binding; [`Provider::value`] then yields the value.
///
/// # Examples
///
/// ```
/// use reinhardt_context::{Context, ContextResult, InjectedArgs, Injectable, Provider, ValueOrPromise};
///
/// struct DateProvider;
///
/// impl Injectable for DateProvider {
///     fn construct(_args: InjectedArgs) -> ContextResult<Self> {
///         Ok(DateProvider)
///     }
/// }
///
/// impl Provider for DateProvider {
///     type Value = String;
///
///     fn value(&self) -> ValueOrPromise<ContextResult<String>> {
///         ValueOrPromise::Value(Ok("2019-01-01".to_string()))
///     }
/// }
///
/// let ctx = Context::new();
/// ctx.bind("today").unwrap().to_provider::<DateProvider>();
/// assert_eq!(*ctx.get_sync::<String>("today").unwrap(), "2019-01-01");
/// ```
pub trait Provider: Injectable {
	/// Type of the provided value
	type Value: Any + Send + Sync;

	/// Produces the value
	fn value(&self) -> ValueOrPromise<ContextResult<Self::Value>>;
}
