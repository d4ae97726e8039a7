//! Live views over the bindings of a context chain

use crate::binding::{Binding, BoundValue};
use crate::binding_filter::BindingFilter;
use crate::binding_sorter::BindingComparator;
use crate::context::{Context, ContextEvent, ContextObserver, Subscription, downcast_value};
use crate::error::{ContextError, ContextResult};
use crate::resolution::ResolutionSession;
use crate::value_promise::{ValueOrPromise, try_resolve_list};
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::trace;

struct ViewState {
	stale: AtomicBool,
	closed: AtomicBool,
	bindings: RwLock<Vec<Arc<Binding>>>,
}

/// Marks the view stale on every event; the recomputation decides what matches
struct StaleMarker(Weak<ViewState>);

impl ContextObserver for StaleMarker {
	fn observe(&self, _event: &ContextEvent) {
		if let Some(state) = self.0.upgrade() {
			state.stale.store(true, Ordering::Release);
		}
	}
}

/// A live, lazily recomputed set of bindings matching a filter.
///
/// The view observes its context and every ancestor. Bind and unbind events
/// only mark it stale; the next read recomputes the matching bindings.
///
/// # Examples
///
/// ```
/// use reinhardt_context::{Context, filter_by_tag};
///
/// let ctx = Context::new();
/// let view = ctx.create_view(filter_by_tag("greeter"), None);
/// assert!(view.bindings().unwrap().is_empty());
///
/// ctx.bind("greeters.en").unwrap().to("Hello".to_string()).tag("greeter");
/// assert_eq!(view.bindings().unwrap().len(), 1);
///
/// ctx.unbind("greeters.en").unwrap();
/// assert!(view.bindings().unwrap().is_empty());
/// ```
pub struct ContextView {
	context: Context,
	filter: BindingFilter,
	comparator: Option<BindingComparator>,
	state: Arc<ViewState>,
	subscriptions: Mutex<Vec<Subscription>>,
}

impl ContextView {
	pub(crate) fn new(context: Context, filter: BindingFilter, comparator: Option<BindingComparator>) -> Self {
		let state = Arc::new(ViewState {
			stale: AtomicBool::new(true),
			closed: AtomicBool::new(false),
			bindings: RwLock::new(Vec::new()),
		});
		let marker: Arc<dyn ContextObserver> = Arc::new(StaleMarker(Arc::downgrade(&state)));
		let subscriptions = context
			.chain()
			.map(|ctx| ctx.subscribe_arc(Arc::clone(&marker)))
			.collect();
		Self {
			context,
			filter,
			comparator,
			state,
			subscriptions: Mutex::new(subscriptions),
		}
	}

	pub fn context(&self) -> &Context {
		&self.context
	}

	pub fn is_closed(&self) -> bool {
		self.state.closed.load(Ordering::Acquire)
	}

	/// Matching bindings, recomputed first if the view is stale
	pub fn bindings(&self) -> ContextResult<Vec<Arc<Binding>>> {
		if self.is_closed() {
			return Err(ContextError::ViewClosed);
		}
		// Clear before recomputing so an event racing the recomputation
		// leaves the view stale
		if self.state.stale.swap(false, Ordering::AcqRel) {
			let mut found = self.context.find(self.filter.clone());
			if let Some(comparator) = &self.comparator {
				comparator.sort(&mut found);
			}
			trace!(context = %self.context.name(), matched = found.len(), "Recomputed context view");
			*self.state.bindings.write() = found;
		}
		Ok(self.state.bindings.read().clone())
	}

	/// Resolves the value of every matching binding, in view order
	pub fn values(&self) -> ValueOrPromise<ContextResult<Vec<BoundValue>>> {
		let bindings = match self.bindings() {
			Ok(bindings) => bindings,
			Err(error) => return ValueOrPromise::Value(Err(error)),
		};
		let session = ResolutionSession::with_max_depth(self.context.settings().max_resolution_depth);
		try_resolve_list(
			bindings
				.iter()
				.map(|binding| binding.get_value(&self.context, &session)),
		)
	}

	/// Resolves every matching value as `T`
	pub async fn values_as<T: Any + Send + Sync>(&self) -> ContextResult<Vec<Arc<T>>> {
		let bindings = self.bindings()?;
		let values = self.values().await?;
		bindings
			.iter()
			.zip(values)
			.map(|(binding, value)| downcast_value(binding.key(), value))
			.collect()
	}

	/// Stops tracking; later reads fail with [`ContextError::ViewClosed`]
	pub fn close(&self) {
		if self.state.closed.swap(true, Ordering::AcqRel) {
			return;
		}
		for subscription in self.subscriptions.lock().drain(..) {
			subscription.unsubscribe();
		}
		self.state.bindings.write().clear();
	}
}

impl Drop for ContextView {
	fn drop(&mut self) {
		self.close();
	}
}

impl fmt::Debug for ContextView {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContextView")
			.field("context", &self.context.name())
			.field("stale", &self.state.stale.load(Ordering::Acquire))
			.field("closed", &self.is_closed())
			.finish()
	}
}
