//! Values that are either available now or still pending
//!
//! Resolution stays synchronous when every participant produces its value
//! synchronously. A single pending participant turns the whole result into a
//! [`ValueOrPromise::Promise`].

use futures::future::{self, BoxFuture, Either, FutureExt, Ready};
use std::fmt;
use std::future::{Future, IntoFuture};

/// A value available immediately or a boxed future producing it
pub enum ValueOrPromise<T> {
	/// Already available
	Value(T),
	/// Still pending
	Promise(BoxFuture<'static, T>),
}

impl<T: Send + 'static> ValueOrPromise<T> {
	/// Boxes a future into a [`ValueOrPromise::Promise`]
	pub fn promise<F>(future: F) -> Self
	where
		F: Future<Output = T> + Send + 'static,
	{
		Self::Promise(future.boxed())
	}

	/// Returns `true` if the value is still pending
	pub fn is_promise(&self) -> bool {
		matches!(self, Self::Promise(_))
	}

	/// Takes the value out if it is available now, or hands the pending
	/// variant back.
	pub fn into_sync(self) -> Result<T, Self> {
		match self {
			Self::Value(value) => Ok(value),
			promise => Err(promise),
		}
	}

	/// Applies `f` to the value, synchronously when possible.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_context::ValueOrPromise;
	///
	/// let doubled = ValueOrPromise::Value(21).map(|v| v * 2);
	/// assert!(matches!(doubled, ValueOrPromise::Value(42)));
	/// ```
	pub fn map<U, F>(self, f: F) -> ValueOrPromise<U>
	where
		U: Send + 'static,
		F: FnOnce(T) -> U + Send + 'static,
	{
		match self {
			Self::Value(value) => ValueOrPromise::Value(f(value)),
			Self::Promise(future) => ValueOrPromise::Promise(future.map(f).boxed()),
		}
	}

	/// Chains a step that may itself be pending
	pub fn and_then<U, F>(self, f: F) -> ValueOrPromise<U>
	where
		U: Send + 'static,
		F: FnOnce(T) -> ValueOrPromise<U> + Send + 'static,
	{
		match self {
			Self::Value(value) => f(value),
			Self::Promise(future) => ValueOrPromise::Promise(async move { f(future.await).await }.boxed()),
		}
	}
}

impl<T, E> ValueOrPromise<Result<T, E>>
where
	T: Send + 'static,
	E: Send + 'static,
{
	/// Maps the success value
	pub fn map_ok<U, F>(self, f: F) -> ValueOrPromise<Result<U, E>>
	where
		U: Send + 'static,
		F: FnOnce(T) -> U + Send + 'static,
	{
		self.map(|result| result.map(f))
	}

	/// Chains a fallible step, short-circuiting on the first error
	pub fn and_then_ok<U, F>(self, f: F) -> ValueOrPromise<Result<U, E>>
	where
		U: Send + 'static,
		F: FnOnce(T) -> ValueOrPromise<Result<U, E>> + Send + 'static,
	{
		self.and_then(|result| match result {
			Ok(value) => f(value),
			Err(error) => ValueOrPromise::Value(Err(error)),
		})
	}
}

impl<T: Send + 'static> IntoFuture for ValueOrPromise<T> {
	type Output = T;
	type IntoFuture = Either<Ready<T>, BoxFuture<'static, T>>;

	fn into_future(self) -> Self::IntoFuture {
		match self {
			Self::Value(value) => Either::Left(future::ready(value)),
			Self::Promise(future) => Either::Right(future),
		}
	}
}

impl<T: fmt::Debug> fmt::Debug for ValueOrPromise<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
			Self::Promise(_) => f.write_str("Promise(..)"),
		}
	}
}

/// Resolves every entry, preserving order.
///
/// Stays synchronous when no entry is pending. Pending entries are awaited
/// concurrently.
pub fn resolve_list<T, I>(items: I) -> ValueOrPromise<Vec<T>>
where
	T: Send + 'static,
	I: IntoIterator<Item = ValueOrPromise<T>>,
{
	let items: Vec<ValueOrPromise<T>> = items.into_iter().collect();
	if items.iter().any(ValueOrPromise::is_promise) {
		ValueOrPromise::Promise(future::join_all(items.into_iter().map(IntoFuture::into_future)).boxed())
	} else {
		ValueOrPromise::Value(items.into_iter().filter_map(|item| item.into_sync().ok()).collect())
	}
}

/// Like [`resolve_list`] for fallible entries; the first error wins.
pub fn try_resolve_list<T, E, I>(items: I) -> ValueOrPromise<Result<Vec<T>, E>>
where
	T: Send + 'static,
	E: Send + 'static,
	I: IntoIterator<Item = ValueOrPromise<Result<T, E>>>,
{
	let items: Vec<ValueOrPromise<Result<T, E>>> = items.into_iter().collect();
	if items.iter().any(ValueOrPromise::is_promise) {
		ValueOrPromise::Promise(future::try_join_all(items.into_iter().map(IntoFuture::into_future)).boxed())
	} else {
		ValueOrPromise::Value(items.into_iter().filter_map(|item| item.into_sync().ok()).collect())
	}
}

/// Resolves named entries, keeping each name next to its value
pub fn try_resolve_map<K, T, E, I>(entries: I) -> ValueOrPromise<Result<Vec<(K, T)>, E>>
where
	K: Send + 'static,
	T: Send + 'static,
	E: Send + 'static,
	I: IntoIterator<Item = (K, ValueOrPromise<Result<T, E>>)>,
{
	let (names, values): (Vec<K>, Vec<_>) = entries.into_iter().unzip();
	try_resolve_list(values).map_ok(|values| names.into_iter().zip(values).collect())
}

/// Runs `action`, then `finally` once the result has settled.
///
/// `finally` also runs if `action` panics or if the pending future is
/// dropped before completion.
pub fn try_with_finally<T, A, F>(action: A, finally: F) -> ValueOrPromise<T>
where
	T: Send + 'static,
	A: FnOnce() -> ValueOrPromise<T>,
	F: FnOnce() + Send + 'static,
{
	let guard = FinallyGuard(Some(finally));
	match action() {
		ValueOrPromise::Value(value) => {
			drop(guard);
			ValueOrPromise::Value(value)
		}
		ValueOrPromise::Promise(future) => ValueOrPromise::Promise(
			async move {
				let _guard = guard;
				future.await
			}
			.boxed(),
		),
	}
}

struct FinallyGuard<F: FnOnce()>(Option<F>);

impl<F: FnOnce()> Drop for FinallyGuard<F> {
	fn drop(&mut self) {
		if let Some(finally) = self.0.take() {
			finally();
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::sync::Arc;
	use std::sync::atomic::{AtomicBool, Ordering};

	#[rstest]
	fn test_resolve_list_stays_sync() {
		// Arrange
		let items = vec![ValueOrPromise::Value(1), ValueOrPromise::Value(2), ValueOrPromise::Value(3)];

		// Act
		let result = resolve_list(items);

		// Assert
		assert!(matches!(result.into_sync(), Ok(ref v) if v == &vec![1, 2, 3]));
	}

	#[rstest]
	#[tokio::test]
	async fn test_resolve_list_preserves_order_with_promises() {
		// Arrange
		let items = vec![
			ValueOrPromise::Value("a"),
			ValueOrPromise::promise(async {
				tokio::task::yield_now().await;
				"b"
			}),
			ValueOrPromise::Value("c"),
		];

		// Act
		let result = resolve_list(items);

		// Assert
		assert!(result.is_promise());
		assert_eq!(result.await, vec!["a", "b", "c"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_try_resolve_list_returns_first_error() {
		let items: Vec<ValueOrPromise<Result<i32, String>>> = vec![
			ValueOrPromise::Value(Ok(1)),
			ValueOrPromise::promise(async { Err("boom".to_string()) }),
		];

		let result = try_resolve_list(items).await;

		assert_eq!(result, Err("boom".to_string()));
	}

	#[rstest]
	fn test_try_resolve_map_keeps_names() {
		let entries = vec![
			("a", ValueOrPromise::Value(Ok::<_, String>(1))),
			("b", ValueOrPromise::Value(Ok(2))),
		];

		let result = try_resolve_map(entries).into_sync();

		assert!(matches!(result, Ok(Ok(ref v)) if v == &vec![("a", 1), ("b", 2)]));
	}

	#[rstest]
	#[tokio::test]
	async fn test_try_with_finally_runs_after_promise_settles() {
		// Arrange
		let finished = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&finished);

		// Act
		let result = try_with_finally(
			|| ValueOrPromise::promise(async { 42 }),
			move || flag.store(true, Ordering::SeqCst),
		);

		// Assert
		assert!(!finished.load(Ordering::SeqCst));
		assert_eq!(result.await, 42);
		assert!(finished.load(Ordering::SeqCst));
	}

	#[rstest]
	fn test_try_with_finally_runs_for_sync_value() {
		let finished = Arc::new(AtomicBool::new(false));
		let flag = Arc::clone(&finished);

		let result = try_with_finally(|| ValueOrPromise::Value("done"), move || flag.store(true, Ordering::SeqCst));

		assert!(matches!(result, ValueOrPromise::Value("done")));
		assert!(finished.load(Ordering::SeqCst));
	}

	#[rstest]
	#[tokio::test]
	async fn test_and_then_chains_pending_steps() {
		let value = ValueOrPromise::Value(2)
			.and_then(|v| ValueOrPromise::promise(async move { v + 1 }))
			.map(|v| v * 10);

		assert_eq!(value.await, 30);
	}
}
