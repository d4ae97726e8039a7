//! Contexts: hierarchical binding registries
//!
//! A [`Context`] is a cheap-to-clone handle. Clones share the same registry,
//! so a context can be handed to factories, handlers and spawned tasks.
//!
//! Lookup walks from the requesting context up through its ancestors and
//! stops at the first context that has the key bound (closest wins):
//!
//! ```
//! use reinhardt_context::Context;
//!
//! let root = Context::new();
//! root.bind("greeting").unwrap().to("hello".to_string());
//!
//! let request = root.create_child();
//! request.bind("greeting").unwrap().to("bonjour".to_string());
//!
//! assert_eq!(*request.get_sync::<String>("greeting").unwrap(), "bonjour");
//! assert_eq!(*root.get_sync::<String>("greeting").unwrap(), "hello");
//! ```

use crate::binding::{Binding, BindingId, BoundValue};
use crate::binding_filter::{BindingFilter, filter_by_tag};
use crate::binding_key::{ContextTags, build_key_for_config, validate_key};
use crate::binding_sorter::BindingComparator;
use crate::error::{ContextError, ContextResult};
use crate::interceptor::Invocable;
use crate::proxy::InterceptedProxy;
use crate::resolution::ResolutionSession;
use crate::scope::{CacheSlot, ScopedCache};
use crate::settings::ContextSettings;
use crate::value_promise::ValueOrPromise;
use crate::view::ContextView;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, type_name};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, trace};

/// Process-unique context identifier
pub type ContextId = u64;

/// Identifier of an observer registration
pub type SubscriptionId = u64;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Kind of registry change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextEventType {
	Bind,
	Unbind,
}

/// A registry change delivered to observers
#[derive(Debug, Clone)]
pub struct ContextEvent {
	pub event_type: ContextEventType,
	pub binding: Arc<Binding>,
	/// Context whose registry changed
	pub context: Context,
}

/// Receives bind/unbind events of a context.
///
/// Observers run synchronously on the thread performing the change, after
/// the registry lock is released. Closures taking `&ContextEvent` are
/// observers too.
pub trait ContextObserver: Send + Sync {
	/// Events for bindings rejected here are not delivered.
	///
	/// A bind event is emitted before the fluent configuration of the new
	/// binding runs. When the filter rejects it, the event is held back and
	/// delivered once a later change to the binding's tags, scope or source
	/// makes the filter accept it.
	fn filter(&self, binding: &Binding) -> bool {
		let _ = binding;
		true
	}

	fn observe(&self, event: &ContextEvent);
}

impl<F> ContextObserver for F
where
	F: Fn(&ContextEvent) + Send + Sync,
{
	fn observe(&self, event: &ContextEvent) {
		self(event)
	}
}

/// Handle to an observer registration
#[derive(Debug, Clone)]
pub struct Subscription {
	context: Weak<ContextInner>,
	id: SubscriptionId,
}

impl Subscription {
	pub fn id(&self) -> SubscriptionId {
		self.id
	}

	/// Removes the observer; returns `false` if it was already removed
	pub fn unsubscribe(&self) -> bool {
		match self.context.upgrade() {
			Some(inner) => inner.remove_observer(self.id),
			None => false,
		}
	}
}

/// Options of a single resolution
#[derive(Debug, Clone, Default)]
pub struct ResolutionOptions {
	/// Resolve to `None` instead of failing when the key is not bound
	pub optional: bool,
	/// Session to continue, for resolutions nested in another one
	pub session: Option<ResolutionSession>,
}

impl ResolutionOptions {
	pub fn optional() -> Self {
		Self {
			optional: true,
			session: None,
		}
	}

	pub fn with_session(mut self, session: ResolutionSession) -> Self {
		self.session = Some(session);
		self
	}
}

type ObserverEntry = (SubscriptionId, Arc<dyn ContextObserver>);

/// A bind event an observer's filter rejected, awaiting a binding change
type HeldBind = (SubscriptionId, Arc<Binding>);

struct ContextInner {
	id: ContextId,
	name: String,
	parent: Option<Context>,
	settings: Arc<ContextSettings>,
	registry: RwLock<IndexMap<String, Arc<Binding>>>,
	observers: RwLock<Vec<ObserverEntry>>,
	held: Mutex<Vec<HeldBind>>,
	scoped: ScopedCache,
	closed: AtomicBool,
}

impl ContextInner {
	fn remove_observer(&self, id: SubscriptionId) -> bool {
		self.held.lock().retain(|(subscription, _)| *subscription != id);
		let mut observers = self.observers.write();
		let before = observers.len();
		observers.retain(|(existing, _)| *existing != id);
		observers.len() != before
	}
}

/// A node in a tree of binding registries
#[derive(Clone)]
pub struct Context {
	inner: Arc<ContextInner>,
}

impl Default for Context {
	fn default() -> Self {
		Self::new()
	}
}

impl Context {
	/// Creates a root context with default settings
	pub fn new() -> Self {
		Self::with_settings(ContextSettings::default())
	}

	/// Creates a root context with a given name
	pub fn named(name: impl Into<String>) -> Self {
		Self::build(Some(name.into()), None, Arc::new(ContextSettings::default()))
	}

	/// Creates a root context with custom settings
	pub fn with_settings(settings: ContextSettings) -> Self {
		Self::build(None, None, Arc::new(settings))
	}

	/// Creates a child context sharing this context's settings
	pub fn create_child(&self) -> Self {
		Self::build(None, Some(self.clone()), Arc::clone(&self.inner.settings))
	}

	/// Creates a named child context
	pub fn create_child_named(&self, name: impl Into<String>) -> Self {
		Self::build(Some(name.into()), Some(self.clone()), Arc::clone(&self.inner.settings))
	}

	fn build(name: Option<String>, parent: Option<Context>, settings: Arc<ContextSettings>) -> Self {
		let name = name.unwrap_or_else(|| format!("{}-{}", settings.name_prefix, uuid::Uuid::new_v4()));
		debug!(context = %name, parent = ?parent.as_ref().map(Context::name), "Creating context");
		Self {
			inner: Arc::new(ContextInner {
				id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
				name,
				parent,
				settings,
				registry: RwLock::new(IndexMap::new()),
				observers: RwLock::new(Vec::new()),
				held: Mutex::new(Vec::new()),
				scoped: ScopedCache::default(),
				closed: AtomicBool::new(false),
			}),
		}
	}

	pub fn id(&self) -> ContextId {
		self.inner.id
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn parent(&self) -> Option<&Context> {
		self.inner.parent.as_ref()
	}

	pub fn settings(&self) -> &ContextSettings {
		&self.inner.settings
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::Acquire)
	}

	/// This context followed by its ancestors, closest first
	pub fn chain(&self) -> impl Iterator<Item = &Context> {
		std::iter::successors(Some(self), |context| context.parent())
	}

	/// Creates a binding for `key` in this context.
	///
	/// Fails with [`ContextError::DuplicateBinding`] if this context already
	/// has `key`; use [`Context::rebind`] to replace it. Ancestors may bind the
	/// same key; this binding shadows theirs.
	pub fn bind(&self, key: impl AsRef<str>) -> ContextResult<Arc<Binding>> {
		let binding = Binding::new(key.as_ref());
		self.add(Arc::clone(&binding))?;
		Ok(binding)
	}

	/// Creates a binding for `key`, replacing an existing one in this context
	pub fn rebind(&self, key: impl AsRef<str>) -> ContextResult<Arc<Binding>> {
		let key = key.as_ref();
		validate_key(key)?;
		let binding = Binding::new(key);
		binding.claim(self.id())?;

		let previous = {
			let mut registry = self.inner.registry.write();
			if registry.get(key).is_some_and(|existing| existing.is_locked()) {
				binding.release(self.id());
				return Err(ContextError::BindingLocked { key: key.to_string() });
			}
			// Keep the position of the replaced binding
			registry.insert(key.to_string(), Arc::clone(&binding))
		};

		if let Some(previous) = previous {
			self.discard(&previous);
			debug!(context = %self.name(), key, "Unbinding replaced binding");
			self.notify(ContextEventType::Unbind, &previous);
		}
		self.watch(&binding);
		debug!(context = %self.name(), key, "Binding");
		self.notify(ContextEventType::Bind, &binding);
		Ok(binding)
	}

	/// Adds a binding created with [`Binding::new`]
	pub fn add(&self, binding: Arc<Binding>) -> ContextResult<()> {
		let key = binding.key().to_string();
		validate_key(&key)?;
		binding.claim(self.id())?;
		{
			let mut registry = self.inner.registry.write();
			if registry.contains_key(&key) {
				if !registry.get(&key).is_some_and(|existing| Arc::ptr_eq(existing, &binding)) {
					binding.release(self.id());
				}
				return Err(ContextError::DuplicateBinding {
					key,
					context: self.name().to_string(),
				});
			}
			registry.insert(key.clone(), Arc::clone(&binding));
		}
		self.watch(&binding);
		debug!(context = %self.name(), key = %key, "Binding");
		self.notify(ContextEventType::Bind, &binding);
		Ok(())
	}

	/// Removes `key` from this context's own storage.
	///
	/// Returns whether a binding was removed. Ancestors are not touched, so a
	/// shadowed ancestor binding becomes visible again.
	pub fn unbind(&self, key: impl AsRef<str>) -> ContextResult<bool> {
		let key = key.as_ref();
		let removed = {
			let mut registry = self.inner.registry.write();
			match registry.get(key) {
				None => return Ok(false),
				Some(binding) if binding.is_locked() => {
					return Err(ContextError::BindingLocked { key: key.to_string() });
				}
				Some(_) => registry.shift_remove(key),
			}
		};

		let Some(binding) = removed else {
			return Ok(false);
		};
		self.discard(&binding);
		debug!(context = %self.name(), key, "Unbinding");
		self.notify(ContextEventType::Unbind, &binding);
		Ok(true)
	}

	/// Binds the configuration of `key` under the reserved
	/// `"{key}:$config"` key, replacing earlier configuration
	pub fn configure(&self, key: impl AsRef<str>) -> ContextResult<Arc<Binding>> {
		let key = key.as_ref();
		let binding = self.rebind(build_key_for_config(key))?;
		binding.tag((ContextTags::CONFIGURATION_FOR, key));
		Ok(binding)
	}

	/// Whether this context's own storage has `key`
	pub fn contains(&self, key: impl AsRef<str>) -> bool {
		self.inner.registry.read().contains_key(key.as_ref())
	}

	/// Whether `key` is bound anywhere in the chain
	pub fn is_bound(&self, key: impl AsRef<str>) -> bool {
		let key = key.as_ref();
		self.chain().any(|context| context.contains(key))
	}

	/// The authoritative binding for `key`, closest first
	pub fn find_binding(&self, key: impl AsRef<str>) -> Option<Arc<Binding>> {
		let key = key.as_ref();
		self.chain()
			.find_map(|context| context.inner.registry.read().get(key).cloned())
	}

	/// Like [`Context::find_binding`], failing when the key is not bound
	pub fn get_binding(&self, key: impl AsRef<str>) -> ContextResult<Arc<Binding>> {
		let key = key.as_ref();
		self.find_binding(key).ok_or_else(|| self.not_found(key))
	}

	/// The context in the chain that owns the binding for `key`
	pub fn get_owner_context(&self, key: impl AsRef<str>) -> Option<Context> {
		let key = key.as_ref();
		self.chain().find(|context| context.contains(key)).cloned()
	}

	/// Keys of this context's own bindings in binding order
	pub fn keys(&self) -> Vec<String> {
		self.inner.registry.read().keys().cloned().collect()
	}

	/// Bindings matching `filter` across the chain.
	///
	/// Own bindings come first in binding order, then each ancestor's. A key
	/// appears once, from the closest context binding it.
	pub fn find(&self, filter: impl Into<BindingFilter>) -> Vec<Arc<Binding>> {
		let filter = filter.into();
		let mut seen = HashSet::new();
		let mut found = Vec::new();
		for context in self.chain() {
			let registry = context.inner.registry.read();
			for (key, binding) in registry.iter() {
				if seen.insert(key.clone()) && filter.matches(binding) {
					found.push(Arc::clone(binding));
				}
			}
		}
		found
	}

	/// Bindings carrying a tag matching `pattern`, see [`filter_by_tag`]
	pub fn find_by_tag(&self, pattern: &str) -> Vec<Arc<Binding>> {
		self.find(filter_by_tag(pattern))
	}

	/// Resolves `key` without committing to a calling convention.
	///
	/// The result is `Ok(None)` only for an optional resolution of an unbound
	/// key.
	pub fn get_value_or_promise(
		&self,
		key: impl AsRef<str>,
		options: &ResolutionOptions,
	) -> ValueOrPromise<ContextResult<Option<BoundValue>>> {
		let key = key.as_ref();
		let session = options
			.session
			.clone()
			.unwrap_or_else(|| ResolutionSession::with_max_depth(self.settings().max_resolution_depth));

		match self.find_binding(key) {
			Some(binding) => binding.get_value(self, &session).map_ok(Some),
			None if options.optional => {
				trace!(context = %self.name(), key, "Optional key not bound");
				ValueOrPromise::Value(Ok(None))
			}
			None => ValueOrPromise::Value(Err(self.not_found(key))),
		}
	}

	/// Resolves `key` and downcasts the value to `T`
	pub async fn get<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Arc<T>> {
		let key = key.as_ref();
		let value = self.get_value_or_promise(key, &ResolutionOptions::default()).await?;
		downcast_value(key, required(key, value)?)
	}

	/// Like [`Context::get`], resolving to `None` when `key` is not bound
	pub async fn get_optional<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Option<Arc<T>>> {
		let key = key.as_ref();
		let value = self.get_value_or_promise(key, &ResolutionOptions::optional()).await?;
		value.map(|value| downcast_value(key, value)).transpose()
	}

	/// Resolves `key` synchronously.
	///
	/// Fails with [`ContextError::AsyncResolution`] when the value is pending.
	pub fn get_sync<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Arc<T>> {
		let key = key.as_ref();
		let value = self.get_sync_value(key, &ResolutionOptions::default())?;
		downcast_value(key, required(key, value)?)
	}

	/// Like [`Context::get_sync`], returning `None` when `key` is not bound
	pub fn get_sync_optional<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Option<Arc<T>>> {
		let key = key.as_ref();
		let value = self.get_sync_value(key, &ResolutionOptions::optional())?;
		value.map(|value| downcast_value(key, value)).transpose()
	}

	fn get_sync_value(&self, key: &str, options: &ResolutionOptions) -> ContextResult<Option<BoundValue>> {
		match self.get_value_or_promise(key, options).into_sync() {
			Ok(result) => result,
			Err(_) => Err(ContextError::AsyncResolution { key: key.to_string() }),
		}
	}

	/// Resolves the configuration bound with [`Context::configure`].
	///
	/// With a `path`, the configuration must be a [`serde_json::Value`] and
	/// the dotted path selects a nested value. Missing configuration resolves
	/// to `None` unless `options.optional` is `false`.
	pub fn get_config_as_value_or_promise(
		&self,
		key: impl AsRef<str>,
		path: Option<&str>,
		options: &ResolutionOptions,
	) -> ValueOrPromise<ContextResult<Option<BoundValue>>> {
		let config_key = build_key_for_config(key.as_ref());
		let path = path.map(str::to_string);
		let resolved = self.get_value_or_promise(&config_key, options);
		match path {
			None => resolved,
			Some(path) => resolved.map(move |result| -> ContextResult<Option<BoundValue>> {
				let Some(value) = result? else {
					return Ok(None);
				};
				let json = downcast_value::<serde_json::Value>(&config_key, value)?;
				Ok(select_path(&json, &path).map(|selected| Arc::new(selected) as BoundValue))
			}),
		}
	}

	/// Resolves the configuration of `key` as `T`, `None` if not configured
	pub async fn get_config<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Option<Arc<T>>> {
		let key = key.as_ref();
		let value = self
			.get_config_as_value_or_promise(key, None, &ResolutionOptions::optional())
			.await?;
		value
			.map(|value| downcast_value(&build_key_for_config(key), value))
			.transpose()
	}

	/// Synchronous [`Context::get_config`]
	pub fn get_config_sync<T: Any + Send + Sync>(&self, key: impl AsRef<str>) -> ContextResult<Option<Arc<T>>> {
		let key = key.as_ref();
		let config_key = build_key_for_config(key);
		let value = match self
			.get_config_as_value_or_promise(key, None, &ResolutionOptions::optional())
			.into_sync()
		{
			Ok(result) => result?,
			Err(_) => return Err(ContextError::AsyncResolution { key: config_key }),
		};
		value.map(|value| downcast_value(&config_key, value)).transpose()
	}

	/// A proxy routing method calls on the value of `key` through the
	/// interceptor pipeline. The value is resolved again on every call.
	pub fn get_proxy<T: Invocable>(&self, key: impl AsRef<str>) -> ContextResult<InterceptedProxy<T>> {
		let key = key.as_ref();
		if !self.is_bound(key) {
			return Err(self.not_found(key));
		}
		Ok(InterceptedProxy::new(self.clone(), key))
	}

	/// Registers an observer of this context's bind/unbind events
	pub fn subscribe(&self, observer: impl ContextObserver + 'static) -> Subscription {
		self.subscribe_arc(Arc::new(observer))
	}

	pub(crate) fn subscribe_arc(&self, observer: Arc<dyn ContextObserver>) -> Subscription {
		let id = NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed);
		self.inner.observers.write().push((id, observer));
		Subscription {
			context: Arc::downgrade(&self.inner),
			id,
		}
	}

	/// Removes an observer; returns `false` if it was not registered here
	pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
		self.inner.remove_observer(subscription.id)
	}

	/// Creates a live view of the bindings matching `filter`
	pub fn create_view(
		&self,
		filter: impl Into<BindingFilter>,
		comparator: Option<BindingComparator>,
	) -> ContextView {
		ContextView::new(self.clone(), filter.into(), comparator)
	}

	/// Discards this context's own bindings, cached values and observers.
	///
	/// Observers receive an unbind event for each discarded binding first.
	/// Children keep working; lookups from them skip the discarded bindings.
	pub fn close(&self) {
		if self.inner.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		let bindings: Vec<Arc<Binding>> = {
			let mut registry = self.inner.registry.write();
			registry.drain(..).map(|(_, binding)| binding).collect()
		};
		for binding in &bindings {
			binding.release(self.id());
			self.notify(ContextEventType::Unbind, binding);
		}
		self.inner.held.lock().clear();
		self.inner.observers.write().clear();
		self.inner.scoped.clear();
		debug!(context = %self.name(), bindings = bindings.len(), "Closed context");
	}

	pub(crate) fn scoped_slot(&self, binding: &Binding) -> Arc<CacheSlot> {
		self.inner.scoped.slot(binding.id(), &binding.lifetime())
	}

	pub(crate) fn forget_scoped(&self, binding: BindingId) {
		self.inner.scoped.forget(binding);
	}

	/// Cached [`BindingScope::Context`](crate::BindingScope::Context) value of
	/// `binding` for this context
	pub fn scoped_value(&self, binding: &Binding) -> Option<BoundValue> {
		self.inner.scoped.cached(binding.id(), &binding.lifetime())
	}

	fn notify(&self, event_type: ContextEventType, binding: &Arc<Binding>) {
		let observers: Vec<(SubscriptionId, Arc<dyn ContextObserver>)> = self
			.inner
			.observers
			.read()
			.iter()
			.map(|(id, observer)| (*id, Arc::clone(observer)))
			.collect();
		if observers.is_empty() {
			return;
		}

		let event = ContextEvent {
			event_type,
			binding: Arc::clone(binding),
			context: self.clone(),
		};
		trace!(context = %self.name(), key = binding.key(), ?event_type, observers = observers.len(), "Notifying observers");
		for (id, observer) in observers {
			if observer.filter(binding) {
				observer.observe(&event);
			} else if event_type == ContextEventType::Bind {
				self.inner.held.lock().push((id, Arc::clone(binding)));
			}
		}
	}

	/// Routes later configuration changes of an own binding to
	/// [`Context::deliver_held`]
	fn watch(&self, binding: &Arc<Binding>) {
		let context: Weak<ContextInner> = Arc::downgrade(&self.inner);
		binding.watch(Arc::new(move |binding: &Binding| {
			if let Some(inner) = context.upgrade() {
				Context { inner }.deliver_held(binding);
			}
		}));
	}

	/// Releases a binding leaving this context's registry
	fn discard(&self, binding: &Binding) {
		binding.release(self.id());
		self.inner.scoped.forget(binding.id());
		self.inner.held.lock().retain(|(_, held)| held.id() != binding.id());
	}

	/// Delivers held bind events of `binding` to observers that now accept it
	fn deliver_held(&self, binding: &Binding) {
		let candidates: Vec<HeldBind> = self
			.inner
			.held
			.lock()
			.iter()
			.filter(|(_, held)| held.id() == binding.id())
			.cloned()
			.collect();
		if candidates.is_empty() {
			return;
		}

		for (id, held) in candidates {
			let observer = self
				.inner
				.observers
				.read()
				.iter()
				.find(|(existing, _)| *existing == id)
				.map(|(_, observer)| Arc::clone(observer));
			let Some(observer) = observer else {
				continue;
			};
			if !observer.filter(&held) {
				continue;
			}
			{
				let mut pending = self.inner.held.lock();
				let before = pending.len();
				pending.retain(|(subscription, entry)| !(*subscription == id && entry.id() == held.id()));
				// Another thread delivered it first
				if pending.len() == before {
					continue;
				}
			}
			trace!(context = %self.name(), key = held.key(), subscription = id, "Delivering held bind event");
			observer.observe(&ContextEvent {
				event_type: ContextEventType::Bind,
				binding: held,
				context: self.clone(),
			});
		}
	}

	fn not_found(&self, key: &str) -> ContextError {
		ContextError::BindingNotFound {
			key: key.to_string(),
			context: self.name().to_string(),
		}
	}
}

impl PartialEq for Context {
	fn eq(&self, other: &Self) -> bool {
		Arc::ptr_eq(&self.inner, &other.inner)
	}
}

impl Eq for Context {}

impl fmt::Debug for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Context")
			.field("name", &self.inner.name)
			.field("parent", &self.parent().map(Context::name))
			.field("keys", &self.keys())
			.field("closed", &self.is_closed())
			.finish()
	}
}

impl fmt::Display for Context {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.inner.name)
	}
}

/// Downcasts a resolved value, reporting the key on mismatch
pub fn downcast_value<T: Any + Send + Sync>(key: &str, value: BoundValue) -> ContextResult<Arc<T>> {
	value.downcast::<T>().map_err(|_| ContextError::TypeMismatch {
		key: key.to_string(),
		expected: type_name::<T>().to_string(),
	})
}

pub(crate) fn required(key: &str, value: Option<BoundValue>) -> ContextResult<BoundValue> {
	value.ok_or_else(|| ContextError::NoValueSource { key: key.to_string() })
}

fn select_path(value: &serde_json::Value, path: &str) -> Option<serde_json::Value> {
	path.split('.')
		.filter(|segment| !segment.is_empty())
		.try_fold(value, |current, segment| match current {
			serde_json::Value::Object(map) => map.get(segment),
			serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
			_ => None,
		})
		.cloned()
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_select_path() {
		let config = json!({"db": {"hosts": ["a", "b"], "port": 5432}});

		assert_eq!(select_path(&config, "db.port"), Some(json!(5432)));
		assert_eq!(select_path(&config, "db.hosts.1"), Some(json!("b")));
		assert_eq!(select_path(&config, "db.missing"), None);
		assert_eq!(select_path(&config, ""), Some(config.clone()));
	}

	#[rstest]
	fn test_generated_names_use_prefix() {
		let settings = ContextSettings {
			name_prefix: "app".to_string(),
			..ContextSettings::default()
		};

		let root = Context::with_settings(settings);
		let child = root.create_child();

		assert!(root.name().starts_with("app-"));
		assert!(child.name().starts_with("app-"));
		assert_ne!(root.name(), child.name());
	}

	#[rstest]
	fn test_add_rejects_binding_owned_elsewhere() {
		// Arrange
		let first = Context::new();
		let second = Context::new();
		let binding = Binding::new("shared");
		first.add(Arc::clone(&binding)).unwrap();

		// Act
		let result = second.add(binding);

		// Assert
		assert!(matches!(result, Err(ContextError::BindingOwned { .. })));
	}

	#[rstest]
	fn test_failed_duplicate_add_keeps_original_owner() {
		let ctx = Context::new();
		let binding = ctx.bind("x").unwrap();

		let result = ctx.add(Arc::clone(&binding));

		assert!(matches!(result, Err(ContextError::DuplicateBinding { .. })));
		assert!(ctx.unbind("x").unwrap());
		assert!(Context::new().add(binding).is_ok());
	}

	#[rstest]
	fn test_child_cache_drops_slots_of_rebound_ancestor_bindings() {
		// Arrange
		let root = Context::new();
		let child = root.create_child();
		root.bind("request.id").unwrap().to_dynamic_value(|| 0u32).in_scope(crate::BindingScope::Context);
		child.get_sync::<u32>("request.id").unwrap();

		// Act
		for n in 1..=10u32 {
			root.rebind("request.id")
				.unwrap()
				.to_dynamic_value(move || n)
				.in_scope(crate::BindingScope::Context);
			child.get_sync::<u32>("request.id").unwrap();
		}
		root.unbind("request.id").unwrap();
		root.bind("other").unwrap().to_dynamic_value(|| 1u8).in_scope(crate::BindingScope::Context);
		let other = child.get_sync::<u8>("other").unwrap();

		// Assert
		assert_eq!(*other, 1);
		assert_eq!(child.inner.scoped.len(), 1);
	}

	#[rstest]
	fn test_child_does_not_reuse_value_of_readded_binding() {
		// Arrange
		let root = Context::new();
		let child = root.create_child();
		let counter = Arc::new(std::sync::atomic::AtomicU32::new(0));
		let calls = Arc::clone(&counter);
		let binding = root.bind("request.id").unwrap();
		binding
			.to_dynamic_value(move || calls.fetch_add(1, Ordering::SeqCst))
			.in_scope(crate::BindingScope::Context);
		let first = child.get_sync::<u32>("request.id").unwrap();

		// Act
		root.unbind("request.id").unwrap();
		root.add(Arc::clone(&binding)).unwrap();
		let second = child.get_sync::<u32>("request.id").unwrap();

		// Assert
		assert_eq!((*first, *second), (0, 1));
		assert!(child.scoped_value(&binding).is_some());
	}
}
