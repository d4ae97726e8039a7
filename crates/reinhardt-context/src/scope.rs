//! Binding scopes and value caches
//!
//! A binding's scope decides how often its value is produced:
//!
//! - [`BindingScope::Transient`]: on every resolution
//! - [`BindingScope::Context`]: once per requesting context
//! - [`BindingScope::Singleton`]: once per binding
//!
//! Cached values live in a [`CacheSlot`]. A slot runs its producer outside
//! any lock and lets concurrent callers share one in-flight resolution, so a
//! producer runs at most once per cache slot.

use crate::binding::{BindingId, BoundValue};
use crate::error::{ContextError, ContextResult};
use crate::value_promise::ValueOrPromise;
use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use std::thread::{self, ThreadId};
use tracing::trace;

/// How often a binding's value is produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingScope {
	/// A new value for every resolution
	#[default]
	Transient,
	/// One value per requesting context
	Context,
	/// One value per binding, shared by every context
	Singleton,
}

impl fmt::Display for BindingScope {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Self::Transient => "transient",
			Self::Context => "context",
			Self::Singleton => "singleton",
		})
	}
}

type SharedResolution = Shared<BoxFuture<'static, ContextResult<BoundValue>>>;

enum SlotState {
	Empty,
	/// The producer is running synchronously on `owner`
	Resolving {
		owner: ThreadId,
		settled: Shared<oneshot::Receiver<ContextResult<BoundValue>>>,
	},
	/// The producer returned a pending value
	Pending(SharedResolution),
	Ready(BoundValue),
}

/// Cache for one value, shared by every caller of a binding within a scope
pub(crate) struct CacheSlot {
	state: Mutex<SlotState>,
}

impl CacheSlot {
	pub(crate) fn new() -> Arc<Self> {
		Arc::new(Self {
			state: Mutex::new(SlotState::Empty),
		})
	}

	/// The cached value, if the slot has settled successfully
	pub(crate) fn cached(&self) -> Option<BoundValue> {
		match &*self.state.lock() {
			SlotState::Ready(value) => Some(Arc::clone(value)),
			_ => None,
		}
	}

	/// Forgets the cached value so the next resolution produces a new one
	pub(crate) fn clear(&self) {
		*self.state.lock() = SlotState::Empty;
	}

	/// Returns the cached value, joins an in-flight resolution, or runs
	/// `produce` and caches its successful outcome.
	///
	/// A caller arriving while another thread runs a synchronous producer
	/// blocks until that producer returns, so a producer that never goes
	/// asynchronous never hands out a pending value. Failures are handed to
	/// every waiting caller but are not cached.
	pub(crate) fn get_or_produce<F>(self: &Arc<Self>, key: &str, produce: F) -> ValueOrPromise<ContextResult<BoundValue>>
	where
		F: FnOnce() -> ValueOrPromise<ContextResult<BoundValue>>,
	{
		let (settle_tx, settle_rx) = oneshot::channel();
		let mut settle_rx = Some(settle_rx);
		loop {
			let settled = {
				let mut state = self.state.lock();
				let running = match &*state {
					SlotState::Ready(value) => return ValueOrPromise::Value(Ok(Arc::clone(value))),
					SlotState::Pending(shared) => return ValueOrPromise::Promise(shared.clone().boxed()),
					SlotState::Resolving { owner, .. } if *owner == thread::current().id() => {
						return ValueOrPromise::Value(Err(ContextError::CircularDependency {
							key: key.to_string(),
							path: format!("{key} -> {key}"),
						}));
					}
					SlotState::Resolving { settled, .. } => Some(settled.clone()),
					SlotState::Empty => None,
				};
				match running {
					Some(settled) => settled,
					None => {
						let Some(settle_rx) = settle_rx.take() else {
							return ValueOrPromise::Value(Err(ContextError::NoValueSource { key: key.to_string() }));
						};
						*state = SlotState::Resolving {
							owner: thread::current().id(),
							settled: settle_rx.shared(),
						};
						break;
					}
				}
			};
			trace!(key, "Waiting for a producer running on another thread");
			match futures::executor::block_on(settled) {
				Ok(outcome) => return ValueOrPromise::Value(outcome),
				// The producer went asynchronous or unwound; look again
				Err(oneshot::Canceled) => continue,
			}
		}

		let mut guard = ResolvingGuard {
			slot: self,
			armed: true,
		};
		let produced = produce();
		guard.armed = false;

		match produced {
			ValueOrPromise::Value(outcome) => {
				*self.state.lock() = match &outcome {
					Ok(value) => SlotState::Ready(Arc::clone(value)),
					Err(_) => SlotState::Empty,
				};
				let _ = settle_tx.send(outcome.clone());
				ValueOrPromise::Value(outcome)
			}
			ValueOrPromise::Promise(future) => {
				let weak: Weak<Self> = Arc::downgrade(self);
				let shared = async move {
					let outcome = future.await;
					if let Some(slot) = weak.upgrade() {
						slot.settle(&outcome);
					}
					outcome
				}
				.boxed()
				.shared();
				*self.state.lock() = SlotState::Pending(shared.clone());
				drop(settle_tx);
				ValueOrPromise::Promise(shared.boxed())
			}
		}
	}

	fn settle(&self, outcome: &ContextResult<BoundValue>) {
		let mut state = self.state.lock();
		if matches!(*state, SlotState::Pending(_)) {
			*state = match outcome {
				Ok(value) => SlotState::Ready(Arc::clone(value)),
				Err(_) => SlotState::Empty,
			};
		}
	}
}

/// Resets a slot left in `Resolving` when the producer unwinds
struct ResolvingGuard<'a> {
	slot: &'a CacheSlot,
	armed: bool,
}

impl Drop for ResolvingGuard<'_> {
	fn drop(&mut self) {
		if self.armed {
			self.slot.clear();
		}
	}
}

/// Per-context cache for bindings in [`BindingScope::Context`].
///
/// Slots are tied to the lifetime token a binding holds while it is
/// registered. Once a binding leaves its registry, even an ancestor's, its
/// token dies; the slot is then never reused and is pruned on the next insert.
#[derive(Clone, Default)]
pub(crate) struct ScopedCache {
	slots: Arc<RwLock<HashMap<BindingId, (Weak<()>, Arc<CacheSlot>)>>>,
}

impl ScopedCache {
	/// Returns the slot for `binding`, creating it on first use
	pub(crate) fn slot(&self, binding: BindingId, lifetime: &Arc<()>) -> Arc<CacheSlot> {
		let token = Arc::downgrade(lifetime);
		{
			let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
			if let Some((held, slot)) = slots.get(&binding) {
				if held.ptr_eq(&token) {
					return Arc::clone(slot);
				}
			}
		}
		let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
		slots.retain(|_, (held, _)| held.strong_count() > 0);
		let (held, slot) = slots.entry(binding).or_insert_with(|| (token.clone(), CacheSlot::new()));
		if !held.ptr_eq(&token) {
			*held = token;
			*slot = CacheSlot::new();
		}
		Arc::clone(slot)
	}

	/// Cached value for `binding`, if any
	pub(crate) fn cached(&self, binding: BindingId, lifetime: &Arc<()>) -> Option<BoundValue> {
		let token = Arc::downgrade(lifetime);
		let slots = self.slots.read().unwrap_or_else(PoisonError::into_inner);
		slots
			.get(&binding)
			.filter(|(held, _)| held.ptr_eq(&token))
			.and_then(|(_, slot)| slot.cached())
	}

	/// Drops the slot of one binding
	pub(crate) fn forget(&self, binding: BindingId) {
		let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
		slots.remove(&binding);
	}

	pub(crate) fn clear(&self) {
		let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
		slots.clear();
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
	}
}
