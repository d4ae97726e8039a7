//! Dependency injection
//!
//! Types opt into injection by implementing [`Injectable`] and registering
//! their injection points:
//!
//! ```
//! use reinhardt_context::{Context, ContextResult, InjectedArgs, Injectable, Injection, define_constructor};
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
//! define_constructor::<Greeter>([Injection::key("name")]);
//!
//! let ctx = Context::new();
//! ctx.bind("name").unwrap().to("Ray".to_string());
//! ctx.bind("greeter").unwrap().to_class::<Greeter>();
//! assert_eq!(ctx.get_sync::<Greeter>("greeter").unwrap().name, "Ray");
//! ```

use crate::binding::BoundValue;
use crate::binding_filter::BindingFilter;
use crate::binding_key::build_key_for_config;
use crate::context::{Context, ResolutionOptions, downcast_value};
use crate::error::{ContextError, ContextResult};
use crate::interceptor::Invocable;
use crate::metadata::{MetadataEntry, MetadataInspector, MetadataKind};
use crate::proxy::InterceptedProxy;
use crate::resolution::ResolutionSession;
use crate::value_promise::{ValueOrPromise, try_resolve_list, try_resolve_map};
use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// A type that can be instantiated by the container
pub trait Injectable: Sized + Send + Sync + 'static {
	/// Builds an instance from the resolved constructor injections
	fn construct(args: InjectedArgs) -> ContextResult<Self>;

	/// Receives a resolved property injection after construction
	fn inject_property(&mut self, name: &str, value: Option<BoundValue>) -> ContextResult<()> {
		let _ = (name, value);
		Ok(())
	}
}

/// What an injection point resolves to
#[derive(Clone)]
pub enum InjectionTarget {
	/// The value of a binding key
	Key(String),
	/// The configuration of the binding being resolved, optionally narrowed
	/// by a dotted path into a JSON configuration
	Config { path: Option<String> },
	/// Values of every binding carrying the tag, as `Vec<BoundValue>`
	Tag(String),
	/// A live [`ContextView`](crate::ContextView) over the filter
	View(BindingFilter),
	/// A [`Getter`] resolving the key on demand
	Getter(String),
	/// The requesting [`Context`]
	Context,
}

type ProxyFactory = Arc<dyn Fn(&Context, &str) -> BoundValue + Send + Sync>;

/// An injection point: a target and its options
#[derive(Clone)]
pub struct Injection {
	target: InjectionTarget,
	optional: bool,
	proxy: Option<ProxyFactory>,
}

impl Injection {
	fn with_target(target: InjectionTarget) -> Self {
		Self {
			target,
			optional: false,
			proxy: None,
		}
	}

	/// Injects the value bound to `key`
	pub fn key(key: impl AsRef<str>) -> Self {
		Self::with_target(InjectionTarget::Key(key.as_ref().to_string()))
	}

	/// Injects the configuration of the binding being resolved.
	///
	/// Configuration injections are optional.
	pub fn config() -> Self {
		Self {
			optional: true,
			..Self::with_target(InjectionTarget::Config { path: None })
		}
	}

	/// Injects a nested value of a JSON configuration
	pub fn config_path(path: impl Into<String>) -> Self {
		Self {
			optional: true,
			..Self::with_target(InjectionTarget::Config {
				path: Some(path.into()),
			})
		}
	}

	/// Injects the values of every binding carrying `tag`
	pub fn tag(tag: impl Into<String>) -> Self {
		Self::with_target(InjectionTarget::Tag(tag.into()))
	}

	/// Injects a live view over `filter`
	pub fn view(filter: impl Into<BindingFilter>) -> Self {
		Self::with_target(InjectionTarget::View(filter.into()))
	}

	/// Injects a [`Getter`] for `key`
	pub fn getter(key: impl AsRef<str>) -> Self {
		Self::with_target(InjectionTarget::Getter(key.as_ref().to_string()))
	}

	/// Injects the requesting context
	pub fn context() -> Self {
		Self::with_target(InjectionTarget::Context)
	}

	/// Resolves to `None` instead of failing when the key is not bound
	pub fn optional(mut self) -> Self {
		self.optional = true;
		self
	}

	/// Injects an [`InterceptedProxy<T>`] instead of the value itself; every
	/// call goes through the interceptors against a freshly resolved value
	pub fn as_proxy_with_interceptors<T: Invocable>(mut self) -> Self {
		self.proxy = Some(Arc::new(|context: &Context, key: &str| {
			Arc::new(InterceptedProxy::<T>::new(context.clone(), key)) as BoundValue
		}));
		self
	}

	pub fn target(&self) -> &InjectionTarget {
		&self.target
	}

	/// Binding key of a key, getter or proxy injection
	pub fn binding_key(&self) -> Option<&str> {
		match &self.target {
			InjectionTarget::Key(key) | InjectionTarget::Getter(key) => Some(key),
			_ => None,
		}
	}

	pub fn is_optional(&self) -> bool {
		self.optional
	}

	pub fn is_proxy(&self) -> bool {
		self.proxy.is_some()
	}

	fn describe(&self) -> String {
		match &self.target {
			InjectionTarget::Key(key) | InjectionTarget::Getter(key) => key.clone(),
			InjectionTarget::Config { path: None } => "<config>".to_string(),
			InjectionTarget::Config { path: Some(path) } => format!("<config>#{path}"),
			InjectionTarget::Tag(tag) => format!("<tag:{tag}>"),
			InjectionTarget::View(_) => "<view>".to_string(),
			InjectionTarget::Context => "<context>".to_string(),
		}
	}
}

impl fmt::Debug for Injection {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Injection")
			.field("target", &self.describe())
			.field("optional", &self.optional)
			.field("proxy", &self.is_proxy())
			.finish()
	}
}

/// Resolves a binding key lazily
#[derive(Debug, Clone)]
pub struct Getter {
	context: Context,
	key: String,
}

impl Getter {
	pub fn new(context: Context, key: impl Into<String>) -> Self {
		Self {
			context,
			key: key.into(),
		}
	}

	pub fn key(&self) -> &str {
		&self.key
	}

	pub async fn get<T: Any + Send + Sync>(&self) -> ContextResult<Arc<T>> {
		self.context.get(&self.key).await
	}

	pub fn get_sync<T: Any + Send + Sync>(&self) -> ContextResult<Arc<T>> {
		self.context.get_sync(&self.key)
	}
}

/// Resolved constructor injections of one instantiation
pub struct InjectedArgs {
	target: &'static str,
	keys: Vec<String>,
	values: Vec<Option<BoundValue>>,
}

impl InjectedArgs {
	/// Type being instantiated
	pub fn target(&self) -> &'static str {
		self.target
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	/// Type-erased argument at `index`
	pub fn raw(&self, index: usize) -> Option<&BoundValue> {
		self.values.get(index).and_then(Option::as_ref)
	}

	/// Argument at `index`, failing if it resolved to nothing
	pub fn get<T: Any + Send + Sync>(&self, index: usize) -> ContextResult<Arc<T>> {
		self.optional(index)?.ok_or_else(|| self.missing(index))
	}

	/// Argument at `index`, `None` for an unsatisfied optional injection
	pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> ContextResult<Option<Arc<T>>> {
		match self.raw(index) {
			Some(value) => downcast_value(&self.describe(index), Arc::clone(value)).map(Some),
			None => Ok(None),
		}
	}

	/// Values of a tag injection at `index`
	pub fn all<T: Any + Send + Sync>(&self, index: usize) -> ContextResult<Vec<Arc<T>>> {
		let values = self.get::<Vec<BoundValue>>(index)?;
		values
			.iter()
			.map(|value| downcast_value(&self.describe(index), Arc::clone(value)))
			.collect()
	}

	fn describe(&self, index: usize) -> String {
		format!("{}.constructor[{index}]", self.target)
	}

	fn missing(&self, index: usize) -> ContextError {
		ContextError::MissingDependency {
			target: self.target.to_string(),
			member: format!("constructor[{index}]"),
			key: self.keys.get(index).cloned().unwrap_or_default(),
		}
	}
}

/// Registers the constructor injections of `T`, by position
pub fn define_constructor<T: 'static>(injections: impl IntoIterator<Item = Injection>) {
	MetadataInspector::define(
		MetadataKind::ConstructorParameters,
		TypeId::of::<T>(),
		None,
		MetadataEntry::Parameters(injections.into_iter().collect()),
	);
}

/// Registers a property injection of `T`, replacing one with the same name
pub fn define_property<T: 'static>(name: impl Into<String>, injection: Injection) {
	let name = name.into();
	MetadataInspector::update(MetadataKind::Properties, TypeId::of::<T>(), None, |existing| {
		let mut properties = match existing {
			Some(MetadataEntry::Properties(properties)) => properties.clone(),
			_ => Vec::new(),
		};
		match properties.iter_mut().find(|(existing, _)| *existing == name) {
			Some(entry) => entry.1 = injection,
			None => properties.push((name, injection)),
		}
		MetadataEntry::Properties(properties)
	});
}

/// Resolves one injection point of `target` from `context`
pub fn resolve_injection(
	context: &Context,
	injection: &Injection,
	session: &ResolutionSession,
	target: &str,
	member: &str,
) -> ValueOrPromise<ContextResult<Option<BoundValue>>> {
	let session = session.enter_injection(format!("{target}.{member}"));
	let optional = injection.optional;
	let missing = {
		let target = target.to_string();
		let member = member.to_string();
		move |key: String| ContextError::MissingDependency { target, member, key }
	};
	trace!(class = target, member, injection = ?injection, "Resolving injection");

	match &injection.target {
		InjectionTarget::Key(key) => {
			if let Some(proxy) = &injection.proxy {
				return ValueOrPromise::Value(if context.is_bound(key) {
					Ok(Some(proxy(context, key)))
				} else if optional {
					Ok(None)
				} else {
					Err(missing(key.clone()))
				});
			}
			let key = key.clone();
			context
				.get_value_or_promise(&key, &ResolutionOptions::optional().with_session(session))
				.map(move |result| match result {
					Ok(None) if !optional => Err(missing(key)),
					other => other,
				})
		}
		InjectionTarget::Config { path } => {
			let Some(binding_key) = session.current_binding_key().map(str::to_string) else {
				return ValueOrPromise::Value(if optional {
					Ok(None)
				} else {
					Err(missing("<config>".to_string()))
				});
			};
			let options = ResolutionOptions::optional().with_session(session.clone());
			context
				.get_config_as_value_or_promise(&binding_key, path.as_deref(), &options)
				.map(move |result| match result {
					Ok(None) if !optional => Err(missing(build_key_for_config(&binding_key))),
					other => other,
				})
		}
		InjectionTarget::Tag(tag) => {
			let bindings = context.find_by_tag(tag);
			try_resolve_list(
				bindings
					.iter()
					.map(|binding| binding.get_value(context, &session)),
			)
			.map_ok(|values| Some(Arc::new(values) as BoundValue))
		}
		InjectionTarget::View(filter) => {
			let view = context.create_view(filter.clone(), None);
			ValueOrPromise::Value(Ok(Some(Arc::new(view) as BoundValue)))
		}
		InjectionTarget::Getter(key) => {
			let getter = Getter::new(context.clone(), key.clone());
			ValueOrPromise::Value(Ok(Some(Arc::new(getter) as BoundValue)))
		}
		InjectionTarget::Context => ValueOrPromise::Value(Ok(Some(Arc::new(context.clone()) as BoundValue))),
	}
}

/// Resolves the constructor injections of `T`.
///
/// Every argument settles before the result is available; one pending
/// argument makes the whole result pending.
pub fn resolve_injected_arguments<T: 'static>(
	context: &Context,
	session: &ResolutionSession,
) -> ValueOrPromise<ContextResult<InjectedArgs>> {
	let target = type_name::<T>();
	let parameters = MetadataInspector::constructor_parameters(TypeId::of::<T>());
	let keys: Vec<String> = parameters.iter().map(Injection::describe).collect();
	try_resolve_list(
		parameters
			.iter()
			.enumerate()
			.map(|(index, injection)| {
				resolve_injection(context, injection, session, target, &format!("constructor[{index}]"))
			}),
	)
	.map_ok(move |values| InjectedArgs { target, keys, values })
}

/// Instantiates `T`: resolves constructor injections, constructs, then
/// resolves and sets property injections
pub fn instantiate_class<T: Injectable>(context: &Context, session: &ResolutionSession) -> ValueOrPromise<ContextResult<T>> {
	trace!(class = type_name::<T>(), "Instantiating class");
	let property_context = context.clone();
	let property_session = session.clone();
	resolve_injected_arguments::<T>(context, session).and_then_ok(move |args| match T::construct(args) {
		Ok(instance) => inject_properties(instance, &property_context, &property_session),
		Err(error) => ValueOrPromise::Value(Err(error)),
	})
}

fn inject_properties<T: Injectable>(
	mut instance: T,
	context: &Context,
	session: &ResolutionSession,
) -> ValueOrPromise<ContextResult<T>> {
	let properties = MetadataInspector::properties(TypeId::of::<T>());
	if properties.is_empty() {
		return ValueOrPromise::Value(Ok(instance));
	}
	let target = type_name::<T>();
	try_resolve_map(properties.iter().map(|(name, injection)| {
		(
			name.clone(),
			resolve_injection(context, injection, session, target, &format!("property {name}")),
		)
	}))
	.map(move |result| -> ContextResult<T> {
		for (name, value) in result? {
			instance.inject_property(&name, value)?;
		}
		Ok(instance)
	})
}
