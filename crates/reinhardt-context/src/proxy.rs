//! Proxies routing method calls through interceptors

use crate::context::Context;
use crate::error::ContextResult;
use crate::handler_chain::HandlerResult;
use crate::interceptor::{InvocationArgs, Invocable, invoke_method_with_interceptors};
use crate::value_promise::ValueOrPromise;
use std::any::type_name;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Stand-in for the value bound to a key.
///
/// Every [`invoke`](InterceptedProxy::invoke) resolves the key again, so a
/// rebinding takes effect on the next call, and runs the method through the
/// global, class and method interceptors of `T`.
pub struct InterceptedProxy<T> {
	context: Context,
	key: String,
	_marker: PhantomData<fn() -> T>,
}

impl<T: Invocable> InterceptedProxy<T> {
	pub fn new(context: Context, key: impl AsRef<str>) -> Self {
		Self {
			context,
			key: key.as_ref().to_string(),
			_marker: PhantomData,
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn context(&self) -> &Context {
		&self.context
	}

	/// Resolves the current target
	pub async fn target(&self) -> ContextResult<Arc<T>> {
		self.context.get::<T>(&self.key).await
	}

	/// Calls `method` on the current target through its interceptors
	pub fn invoke(&self, method: &str, args: InvocationArgs) -> HandlerResult {
		let context = self.context.clone();
		let key = self.key.clone();
		let method = method.to_string();
		ValueOrPromise::promise(async move {
			let target = context.get::<T>(&key).await?;
			invoke_method_with_interceptors(&context, target, &method, args).await
		})
	}
}

impl<T> Clone for InterceptedProxy<T> {
	fn clone(&self) -> Self {
		Self {
			context: self.context.clone(),
			key: self.key.clone(),
			_marker: PhantomData,
		}
	}
}

impl<T> fmt::Debug for InterceptedProxy<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InterceptedProxy")
			.field("key", &self.key)
			.field("target", &type_name::<T>())
			.finish()
	}
}
