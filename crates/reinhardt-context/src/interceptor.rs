//! Method interception
//!
//! A method call routed through [`invoke_method_with_interceptors`] runs in a
//! fresh [`InvocationContext`], a child of the caller's context. Interceptors
//! come from three places, and run outermost first in this order:
//!
//! 1. global interceptors: bindings tagged
//!    [`ContextTags::GLOBAL_INTERCEPTOR`], sorted by their group
//! 2. class interceptors registered with [`intercept_class`]
//! 3. method interceptors registered with [`intercept_method`]
//!
//! The target method runs as the terminal action of the chain. The
//! invocation context is closed when the call settles, whatever the outcome.

use crate::binding::{Binding, BindingTemplate, BoundValue};
use crate::binding_filter::filter_by_tag;
use crate::binding_key::{ContextBindings, ContextTags};
use crate::binding_sorter::sort_bindings_by_phase;
use crate::context::{Context, downcast_value};
use crate::error::{ContextError, ContextResult};
use crate::handler_chain::{Handler, HandlerChain, HandlerContext, HandlerOrKey, HandlerResult, Next};
use crate::metadata::{MetadataEntry, MetadataInspector, MetadataKind};
use crate::value_promise::{ValueOrPromise, try_with_finally};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use tracing::debug;

/// An interceptor: a handler running against an [`InvocationContext`]
pub type Interceptor = Handler<InvocationContext>;

/// An interceptor, or the key of a binding whose value is an [`Interceptor`]
pub type InterceptorOrKey = HandlerOrKey<InvocationContext>;

/// Creates an [`Interceptor`] from a closure
pub fn interceptor<F>(func: F) -> Interceptor
where
	F: Fn(InvocationContext, Next<InvocationContext>) -> HandlerResult + Send + Sync + 'static,
{
	Arc::new(func)
}

/// A type whose methods can be invoked by name
///
/// # Examples
///
/// ```
/// use reinhardt_context::{ContextError, HandlerResult, InvocationArgs, Invocable, ValueOrPromise, invocation_result};
/// use std::sync::Arc;
///
/// struct Converter;
///
/// impl Invocable for Converter {
///     fn has_method(&self, method: &str) -> bool {
///         method == "to_upper_case"
///     }
///
///     fn invoke_method(self: Arc<Self>, method: &str, args: InvocationArgs) -> HandlerResult {
///         let text = match args.get::<String>(0) {
///             Ok(text) => text,
///             Err(e) => return ValueOrPromise::Value(Err(e)),
///         };
///         match method {
///             "to_upper_case" => ValueOrPromise::Value(Ok(invocation_result(text.to_uppercase()))),
///             _ => ValueOrPromise::Value(Err(ContextError::MethodNotFound { target: method.to_string() })),
///         }
///     }
/// }
/// ```
pub trait Invocable: Send + Sync + 'static {
	fn has_method(&self, method: &str) -> bool;

	fn invoke_method(self: Arc<Self>, method: &str, args: InvocationArgs) -> HandlerResult;
}

/// Positional arguments of a method call
#[derive(Clone, Default)]
pub struct InvocationArgs(Vec<BoundValue>);

impl InvocationArgs {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends an argument
	pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
		self.0.push(Arc::new(value));
		self
	}

	pub fn push(&mut self, value: BoundValue) {
		self.0.push(value);
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn raw(&self, index: usize) -> Option<&BoundValue> {
		self.0.get(index)
	}

	/// Argument at `index` as `T`
	pub fn get<T: Any + Send + Sync>(&self, index: usize) -> ContextResult<Arc<T>> {
		let position = format!("arguments[{index}]");
		match self.0.get(index) {
			Some(value) => downcast_value(&position, Arc::clone(value)),
			None => Err(ContextError::TypeMismatch {
				key: position,
				expected: type_name::<T>().to_string(),
			}),
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = &BoundValue> {
		self.0.iter()
	}
}

impl From<Vec<BoundValue>> for InvocationArgs {
	fn from(values: Vec<BoundValue>) -> Self {
		Self(values)
	}
}

impl fmt::Debug for InvocationArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("InvocationArgs").field("len", &self.0.len()).finish()
	}
}

struct InvocationInner {
	context: Context,
	parent: Context,
	target: Arc<dyn Invocable>,
	target_type: TypeId,
	target_class: &'static str,
	method_name: String,
	args: InvocationArgs,
}

/// Context of one intercepted method call
///
/// Dereferences to its own [`Context`], a child of the caller's context.
/// Values bound here disappear with the call; bind on [`parent`] to keep
/// them.
///
/// [`parent`]: InvocationContext::parent
#[derive(Clone)]
pub struct InvocationContext {
	inner: Arc<InvocationInner>,
}

impl InvocationContext {
	/// Creates the context for calling `method` on `target`
	pub fn new<T: Invocable>(
		parent: &Context,
		target: Arc<T>,
		method: impl Into<String>,
		args: InvocationArgs,
	) -> Self {
		let context = parent.create_child_named(format!("InvocationContext-{}", uuid::Uuid::new_v4()));
		Self {
			inner: Arc::new(InvocationInner {
				context,
				parent: parent.clone(),
				target,
				target_type: TypeId::of::<T>(),
				target_class: type_name::<T>(),
				method_name: method.into(),
				args,
			}),
		}
	}

	/// The caller's context
	pub fn parent(&self) -> &Context {
		&self.inner.parent
	}

	pub fn target(&self) -> &Arc<dyn Invocable> {
		&self.inner.target
	}

	pub fn method_name(&self) -> &str {
		&self.inner.method_name
	}

	pub fn args(&self) -> &InvocationArgs {
		&self.inner.args
	}

	/// Full type name of the target
	pub fn target_class(&self) -> &'static str {
		self.inner.target_class
	}

	/// `Type::method`, with the type's path stripped
	pub fn target_name(&self) -> String {
		format!("{}::{}", short_type_name(self.inner.target_class), self.inner.method_name)
	}

	pub fn description(&self) -> String {
		format!("InvocationContext({}): {}", self.inner.context.name(), self.target_name())
	}

	/// Keys of the global interceptors, sorted by group.
	///
	/// The group order comes from
	/// [`ContextBindings::GLOBAL_INTERCEPTOR_ORDERED_GROUPS`] when bound,
	/// otherwise from the context settings.
	pub fn get_global_interceptor_binding_keys(&self) -> ContextResult<Vec<String>> {
		let mut bindings: Vec<Arc<Binding>> = self.find(filter_by_tag(ContextTags::GLOBAL_INTERCEPTOR));
		let groups = match self.get_sync_optional::<Vec<String>>(&ContextBindings::GLOBAL_INTERCEPTOR_ORDERED_GROUPS)? {
			Some(groups) => (*groups).clone(),
			None => self.settings().global_interceptor_groups.clone(),
		};
		sort_bindings_by_phase(&mut bindings, ContextTags::GLOBAL_INTERCEPTOR_GROUP, &groups);
		Ok(bindings.iter().map(|binding| binding.key().to_string()).collect())
	}

	/// Interceptors for this call, outermost first
	pub fn load_interceptors(&self) -> ContextResult<Vec<InterceptorOrKey>> {
		let method = MetadataInspector::method_interceptors(self.inner.target_type, &self.inner.method_name);
		let class = MetadataInspector::class_interceptors(self.inner.target_type);
		let interceptors = merge_interceptors(&class, &method);
		let global: Vec<InterceptorOrKey> = self
			.get_global_interceptor_binding_keys()?
			.into_iter()
			.map(HandlerOrKey::Key)
			.collect();
		let interceptors = merge_interceptors(&global, &interceptors);
		debug!(target_name = %self.target_name(), interceptors = ?interceptors, "Loaded interceptors");
		Ok(interceptors)
	}

	pub fn assert_method_exists(&self) -> ContextResult<()> {
		if self.inner.target.has_method(&self.inner.method_name) {
			Ok(())
		} else {
			Err(ContextError::MethodNotFound {
				target: self.target_name(),
			})
		}
	}

	/// Calls the target method directly
	pub fn invoke_target_method(&self) -> HandlerResult {
		if let Err(error) = self.assert_method_exists() {
			return ValueOrPromise::Value(Err(error));
		}
		debug!(target_name = %self.target_name(), "Invoking target method");
		Arc::clone(&self.inner.target).invoke_method(&self.inner.method_name, self.inner.args.clone())
	}

	/// Closes the call's own context
	pub fn close(&self) {
		self.inner.context.close();
	}
}

impl Deref for InvocationContext {
	type Target = Context;

	fn deref(&self) -> &Context {
		&self.inner.context
	}
}

impl HandlerContext for InvocationContext {
	fn context(&self) -> &Context {
		&self.inner.context
	}
}

impl fmt::Debug for InvocationContext {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.description())
	}
}

fn short_type_name(full: &str) -> &str {
	let base = full.split('<').next().unwrap_or(full);
	base.rsplit("::").next().unwrap_or(base)
}

/// Merges `added` ahead of `existing`.
///
/// Entries of `added` already present in `existing` are dropped, so an
/// interceptor keeps its existing position. Each entry appears once.
///
/// ```
/// use reinhardt_context::{InterceptorOrKey, merge_interceptors};
///
/// let keys = |names: &[&str]| names.iter().map(|n| InterceptorOrKey::from(*n)).collect::<Vec<_>>();
/// assert_eq!(merge_interceptors(&keys(&["log"]), &keys(&["cache", "log"])), keys(&["cache", "log"]));
/// assert_eq!(merge_interceptors(&keys(&["log"]), &keys(&["cache"])), keys(&["log", "cache"]));
/// ```
pub fn merge_interceptors<C>(added: &[HandlerOrKey<C>], existing: &[HandlerOrKey<C>]) -> Vec<HandlerOrKey<C>> {
	let mut merged: Vec<HandlerOrKey<C>> = Vec::with_capacity(added.len() + existing.len());
	for entry in added {
		if !existing.contains(entry) && !merged.contains(entry) {
			merged.push(entry.clone());
		}
	}
	for entry in existing {
		if !merged.contains(entry) {
			merged.push(entry.clone());
		}
	}
	merged
}

/// Registers interceptors for every method of `T`
pub fn intercept_class<T: 'static>(interceptors: impl IntoIterator<Item = InterceptorOrKey>) {
	register_interceptors(MetadataKind::ClassInterceptors, TypeId::of::<T>(), None, interceptors);
}

/// Registers interceptors for `method` of `T`
pub fn intercept_method<T: 'static>(method: &str, interceptors: impl IntoIterator<Item = InterceptorOrKey>) {
	register_interceptors(MetadataKind::MethodInterceptors, TypeId::of::<T>(), Some(method), interceptors);
}

fn register_interceptors(
	kind: MetadataKind,
	target: TypeId,
	member: Option<&str>,
	interceptors: impl IntoIterator<Item = InterceptorOrKey>,
) {
	let added: Vec<InterceptorOrKey> = interceptors.into_iter().collect();
	MetadataInspector::update(kind, target, member, |existing| {
		let existing = match existing {
			Some(MetadataEntry::Interceptors(existing)) => existing.as_slice(),
			_ => &[],
		};
		MetadataEntry::Interceptors(merge_interceptors(&added, existing))
	});
}

/// Template tagging a binding as a global interceptor in `group`
///
/// ```
/// use reinhardt_context::{Binding, ContextTags, as_global_interceptor};
///
/// let binding = Binding::new("interceptors.tracing");
/// binding.apply(as_global_interceptor(Some("tracing")));
/// assert!(binding.has_tag(ContextTags::GLOBAL_INTERCEPTOR));
/// assert_eq!(binding.tag_value(ContextTags::GLOBAL_INTERCEPTOR_GROUP).as_deref(), Some("tracing"));
/// ```
pub fn as_global_interceptor(group: Option<&str>) -> BindingTemplate {
	let group = group.map(str::to_string);
	Box::new(move |binding: &Binding| {
		binding.tag(ContextTags::GLOBAL_INTERCEPTOR);
		if let Some(group) = &group {
			binding.tag((ContextTags::GLOBAL_INTERCEPTOR_GROUP, group.as_str()));
		}
	})
}

/// Calls `method` on `target` through its interceptors.
///
/// Fails with [`ContextError::MethodNotFound`] before any interceptor runs
/// if `target` lacks the method.
pub fn invoke_method_with_interceptors<T: Invocable>(
	context: &Context,
	target: Arc<T>,
	method: &str,
	args: InvocationArgs,
) -> HandlerResult {
	let invocation = InvocationContext::new(context, target, method, args);
	let closer = invocation.clone();
	try_with_finally(
		move || {
			if let Err(error) = invocation.assert_method_exists() {
				return ValueOrPromise::Value(Err(error));
			}
			let interceptors = match invocation.load_interceptors() {
				Ok(interceptors) => interceptors,
				Err(error) => return ValueOrPromise::Value(Err(error)),
			};
			HandlerChain::new(invocation, interceptors)
				.with_terminal(|invocation: InvocationContext| invocation.invoke_target_method())
				.invoke_handlers()
		},
		move || closer.close(),
	)
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("alloc::string::String", "String")]
	#[case("my_app::services::Greeter", "Greeter")]
	#[case("my_app::Wrapper<my_app::Inner>", "Wrapper")]
	#[case("Plain", "Plain")]
	fn test_short_type_name(#[case] full: &str, #[case] short: &str) {
		assert_eq!(short_type_name(full), short);
	}

	#[rstest]
	fn test_args_report_position_on_mismatch() {
		let args = InvocationArgs::new().with("Ray".to_string());

		assert_eq!(*args.get::<String>(0).unwrap(), "Ray");
		assert!(matches!(
			args.get::<u32>(0),
			Err(ContextError::TypeMismatch { ref key, .. }) if key == "arguments[0]"
		));
		assert!(args.get::<String>(1).is_err());
	}
}
