//! Bindings: a key, tags, a scope and a value source
//!
//! A binding is created empty and configured fluently. Configuration methods
//! take `&self`, so a binding can be configured after it has been registered
//! in a context:
//!
//! ```
//! use reinhardt_context::{BindingScope, Context};
//!
//! let ctx = Context::new();
//! ctx.bind("config.port")
//!     .unwrap()
//!     .to(8080u16)
//!     .tag("config")
//!     .in_scope(BindingScope::Singleton);
//!
//! assert_eq!(*ctx.get_sync::<u16>("config.port").unwrap(), 8080);
//! ```

use crate::context::{Context, ContextId, ResolutionOptions};
use crate::error::{ContextError, ContextResult};
use crate::inject::Injectable;
use crate::provider::{Provider, ValueFactory};
use crate::resolution::ResolutionSession;
use crate::scope::{BindingScope, CacheSlot};
use crate::value_promise::ValueOrPromise;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A resolved value with its concrete type erased
pub type BoundValue = Arc<dyn Any + Send + Sync>;

/// Process-unique binding identifier
pub type BindingId = u64;

/// A reusable binding configuration, see [`Binding::apply`]
pub type BindingTemplate = Box<dyn Fn(&Binding) + Send + Sync>;

/// Called by a binding after its tags, scope or source change
pub(crate) type ChangeHook = Arc<dyn Fn(&Binding) + Send + Sync>;

static NEXT_BINDING_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of value source a binding is configured with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingType {
	/// A fixed value
	Constant,
	/// A factory invoked on each production
	DynamicValue,
	/// A type instantiated with dependency injection
	Class,
	/// A provider instantiated with dependency injection
	Provider,
	/// Another binding key
	Alias,
}

#[derive(Clone)]
enum BindingSource {
	Constant(BoundValue),
	Factory {
		kind: BindingType,
		type_name: Option<&'static str>,
		factory: ValueFactory,
	},
	Alias(String),
}

impl BindingSource {
	fn binding_type(&self) -> BindingType {
		match self {
			Self::Constant(_) => BindingType::Constant,
			Self::Factory { kind, .. } => *kind,
			Self::Alias(_) => BindingType::Alias,
		}
	}
}

/// A tag attached to a binding.
///
/// A name-only tag carries its own name as value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingTag {
	/// Tag without an explicit value
	Name(String),
	/// Tag with a value
	Value(String, String),
}

impl From<&str> for BindingTag {
	fn from(name: &str) -> Self {
		Self::Name(name.to_string())
	}
}

impl From<String> for BindingTag {
	fn from(name: String) -> Self {
		Self::Name(name)
	}
}

impl From<(&str, &str)> for BindingTag {
	fn from((name, value): (&str, &str)) -> Self {
		Self::Value(name.to_string(), value.to_string())
	}
}

impl From<(&str, String)> for BindingTag {
	fn from((name, value): (&str, String)) -> Self {
		Self::Value(name.to_string(), value)
	}
}

impl From<(String, String)> for BindingTag {
	fn from((name, value): (String, String)) -> Self {
		Self::Value(name, value)
	}
}

/// An entry in a context's registry
pub struct Binding {
	id: BindingId,
	key: String,
	tags: RwLock<IndexMap<String, String>>,
	scope: RwLock<BindingScope>,
	source: RwLock<Option<BindingSource>>,
	locked: AtomicBool,
	owner: Mutex<Option<ContextId>>,
	on_change: RwLock<Option<ChangeHook>>,
	/// Replaced whenever the binding leaves a registry, retiring the
	/// per-context cache slots created for it
	lifetime: Mutex<Arc<()>>,
	singleton: Arc<CacheSlot>,
}

impl Binding {
	/// Creates an unconfigured, transient binding.
	///
	/// The key is validated when the binding is added to a context.
	pub fn new(key: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			id: NEXT_BINDING_ID.fetch_add(1, Ordering::Relaxed),
			key: key.into(),
			tags: RwLock::new(IndexMap::new()),
			scope: RwLock::new(BindingScope::default()),
			source: RwLock::new(None),
			locked: AtomicBool::new(false),
			owner: Mutex::new(None),
			on_change: RwLock::new(None),
			lifetime: Mutex::new(Arc::new(())),
			singleton: CacheSlot::new(),
		})
	}

	pub fn id(&self) -> BindingId {
		self.id
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub fn scope(&self) -> BindingScope {
		*self.scope.read()
	}

	/// Kind of value source, `None` until one is configured
	pub fn binding_type(&self) -> Option<BindingType> {
		self.source.read().as_ref().map(BindingSource::binding_type)
	}

	/// Name of the class or provider type, when bound to one
	pub fn source_type_name(&self) -> Option<&'static str> {
		match &*self.source.read() {
			Some(BindingSource::Factory { type_name, .. }) => *type_name,
			_ => None,
		}
	}

	/// Tag names in insertion order
	pub fn tag_names(&self) -> Vec<String> {
		self.tags.read().keys().cloned().collect()
	}

	/// All tags with their values
	pub fn tag_map(&self) -> IndexMap<String, String> {
		self.tags.read().clone()
	}

	pub fn has_tag(&self, name: &str) -> bool {
		self.tags.read().contains_key(name)
	}

	pub fn tag_value(&self, name: &str) -> Option<String> {
		self.tags.read().get(name).cloned()
	}

	pub fn is_locked(&self) -> bool {
		self.locked.load(Ordering::Acquire)
	}

	/// Adds a tag; a tag with the same name is replaced
	pub fn tag(&self, tag: impl Into<BindingTag>) -> &Self {
		let (name, value) = match tag.into() {
			BindingTag::Name(name) => (name.clone(), name),
			BindingTag::Value(name, value) => (name, value),
		};
		self.tags.write().insert(name, value);
		self.changed();
		self
	}

	/// Adds several tags
	pub fn tags<I, T>(&self, tags: I) -> &Self
	where
		I: IntoIterator<Item = T>,
		T: Into<BindingTag>,
	{
		for tag in tags {
			self.tag(tag);
		}
		self
	}

	/// Sets the scope and forgets any cached singleton value
	pub fn in_scope(&self, scope: BindingScope) -> &Self {
		*self.scope.write() = scope;
		self.singleton.clear();
		self.changed();
		self
	}

	/// Binds a constant value
	pub fn to<T: Any + Send + Sync>(&self, value: T) -> &Self {
		self.set_source(BindingSource::Constant(Arc::new(value)))
	}

	/// Binds an already type-erased constant value
	pub fn to_bound_value(&self, value: BoundValue) -> &Self {
		self.set_source(BindingSource::Constant(value))
	}

	/// Binds a function producing the value synchronously
	pub fn to_dynamic_value<T, F>(&self, func: F) -> &Self
	where
		T: Any + Send + Sync,
		F: Fn() -> T + Send + Sync + 'static,
	{
		self.set_source(BindingSource::Factory {
			kind: BindingType::DynamicValue,
			type_name: None,
			factory: ValueFactory::from_fn(func),
		})
	}

	/// Binds an async function producing the value
	pub fn to_async_value<T, F, Fut>(&self, func: F) -> &Self
	where
		T: Any + Send + Sync,
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = ContextResult<T>> + Send + 'static,
	{
		self.set_source(BindingSource::Factory {
			kind: BindingType::DynamicValue,
			type_name: None,
			factory: ValueFactory::from_async(func),
		})
	}

	/// Binds a factory receiving the requesting context and session
	pub fn to_factory<F>(&self, func: F) -> &Self
	where
		F: Fn(&Context, &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> + Send + Sync + 'static,
	{
		self.set_source(BindingSource::Factory {
			kind: BindingType::DynamicValue,
			type_name: None,
			factory: ValueFactory::new(func),
		})
	}

	/// Binds a type instantiated with dependency injection
	pub fn to_class<T: Injectable>(&self) -> &Self {
		self.set_source(BindingSource::Factory {
			kind: BindingType::Class,
			type_name: Some(type_name::<T>()),
			factory: ValueFactory::for_class::<T>(),
		})
	}

	/// Binds a provider whose value is the bound value
	pub fn to_provider<P: Provider>(&self) -> &Self {
		self.set_source(BindingSource::Factory {
			kind: BindingType::Provider,
			type_name: Some(type_name::<P>()),
			factory: ValueFactory::for_provider::<P>(),
		})
	}

	/// Resolves the value of another key instead
	pub fn to_alias(&self, key: impl AsRef<str>) -> &Self {
		self.set_source(BindingSource::Alias(key.as_ref().to_string()))
	}

	fn set_source(&self, source: BindingSource) -> &Self {
		*self.source.write() = Some(source);
		self.singleton.clear();
		self.changed();
		self
	}

	/// Applies a template such as
	/// [`as_global_interceptor`](crate::as_global_interceptor)
	pub fn apply(&self, template: impl Fn(&Binding)) -> &Self {
		template(self);
		self
	}

	/// Prevents unbind and rebind of this binding
	pub fn lock(&self) -> &Self {
		self.locked.store(true, Ordering::Release);
		self
	}

	pub fn unlock(&self) -> &Self {
		self.locked.store(false, Ordering::Release);
		self
	}

	/// Forgets cached values held for `context` and the singleton value
	pub fn refresh(&self, context: &Context) {
		self.singleton.clear();
		context.forget_scoped(self.id);
	}

	pub(crate) fn claim(&self, context: ContextId) -> ContextResult<()> {
		let mut owner = self.owner.lock();
		match *owner {
			Some(existing) if existing != context => Err(ContextError::BindingOwned { key: self.key.clone() }),
			_ => {
				*owner = Some(context);
				Ok(())
			}
		}
	}

	pub(crate) fn release(&self, context: ContextId) {
		let mut owner = self.owner.lock();
		if *owner == Some(context) {
			*owner = None;
			*self.on_change.write() = None;
			*self.lifetime.lock() = Arc::new(());
		}
	}

	pub(crate) fn lifetime(&self) -> Arc<()> {
		Arc::clone(&self.lifetime.lock())
	}

	pub(crate) fn watch(&self, hook: ChangeHook) {
		*self.on_change.write() = Some(hook);
	}

	fn changed(&self) {
		// Clone out so the hook may read this binding
		let hook = self.on_change.read().clone();
		if let Some(hook) = hook {
			hook(self);
		}
	}

	/// Resolves the value for `context`, honoring the scope.
	///
	/// `context` is the requesting context: class dependencies are resolved
	/// from it and [`BindingScope::Context`] values are cached in it.
	pub fn get_value(&self, context: &Context, session: &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> {
		let session = match session.enter_binding(&self.key) {
			Ok(session) => session,
			Err(error) => return ValueOrPromise::Value(Err(error)),
		};
		let scope = self.scope();
		tracing::trace!(key = %self.key, %scope, context = %context.name(), "Resolving binding");

		match scope {
			BindingScope::Transient => self.produce(context, &session),
			BindingScope::Singleton => {
				let slot = Arc::clone(&self.singleton);
				slot.get_or_produce(&self.key, || self.produce(context, &session))
			}
			BindingScope::Context => {
				let slot = context.scoped_slot(self);
				slot.get_or_produce(&self.key, || self.produce(context, &session))
			}
		}
	}

	fn produce(&self, context: &Context, session: &ResolutionSession) -> ValueOrPromise<ContextResult<BoundValue>> {
		let source = self.source.read().clone();
		match source {
			None => ValueOrPromise::Value(Err(ContextError::NoValueSource { key: self.key.clone() })),
			Some(BindingSource::Constant(value)) => ValueOrPromise::Value(Ok(value)),
			Some(BindingSource::Factory { factory, .. }) => factory.produce(context, session),
			Some(BindingSource::Alias(target)) => {
				let options = ResolutionOptions::default().with_session(session.clone());
				context
					.get_value_or_promise(&target, &options)
					.map(move |result| {
						result.and_then(|value| {
							value.ok_or_else(|| ContextError::NoValueSource { key: target.clone() })
						})
					})
			}
		}
	}
}

impl fmt::Debug for Binding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Binding")
			.field("key", &self.key)
			.field("scope", &self.scope())
			.field("type", &self.binding_type())
			.field("tags", &*self.tags.read())
			.field("locked", &self.is_locked())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_name_tag_uses_its_name_as_value() {
		// Arrange
		let binding = Binding::new("handler1");

		// Act
		binding.tag("chain").tag(("phase", "p1"));

		// Assert
		assert_eq!(binding.tag_names(), vec!["chain", "phase"]);
		assert_eq!(binding.tag_value("chain").as_deref(), Some("chain"));
		assert_eq!(binding.tag_value("phase").as_deref(), Some("p1"));
	}

	#[rstest]
	fn test_binding_type_follows_source() {
		let binding = Binding::new("x");
		assert_eq!(binding.binding_type(), None);

		binding.to(1u8);
		assert_eq!(binding.binding_type(), Some(BindingType::Constant));

		binding.to_dynamic_value(|| 2u8);
		assert_eq!(binding.binding_type(), Some(BindingType::DynamicValue));

		binding.to_alias("y");
		assert_eq!(binding.binding_type(), Some(BindingType::Alias));
	}

	#[rstest]
	fn test_claim_rejects_second_owner() {
		let binding = Binding::new("x");

		assert!(binding.claim(1).is_ok());
		assert!(binding.claim(1).is_ok());
		assert!(matches!(binding.claim(2), Err(ContextError::BindingOwned { .. })));

		binding.release(1);
		assert!(binding.claim(2).is_ok());
	}

	#[rstest]
	fn test_unconfigured_binding_has_no_value_source() {
		let ctx = Context::new();
		let binding = ctx.bind("empty").unwrap();

		let result = binding.get_value(&ctx, &ResolutionSession::new());

		assert!(matches!(
			result,
			ValueOrPromise::Value(Err(ContextError::NoValueSource { .. }))
		));
	}
}
