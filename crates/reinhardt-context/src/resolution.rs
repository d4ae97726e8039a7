//! Resolution sessions and circular dependency detection
//!
//! A [`ResolutionSession`] records the chain of bindings and injection points
//! visited by one logical resolution. Sessions are immutable: entering a
//! binding produces a new session, so concurrent resolutions never share
//! mutable state and a pending resolution can carry its session across
//! awaits and threads.
//!
//! ## Features
//!
//! - **Deterministic cycle detection**: every binding entry checks the path
//! - **Depth limiting**: [`MAX_RESOLUTION_DEPTH`] by default, configurable
//!   through [`ContextSettings`](crate::ContextSettings)
//! - **Readable paths**: errors report the cycle as `a -> b -> a`

use crate::error::{ContextError, ContextResult};
use std::fmt;
use std::sync::Arc;

/// Maximum resolution depth (prevents pathological cases)
pub const MAX_RESOLUTION_DEPTH: usize = 100;

/// One step of a resolution path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionElement {
	/// A binding being resolved
	Binding(String),
	/// An injection point being satisfied, such as `Greeter.constructor[0]`
	Injection(String),
}

impl fmt::Display for ResolutionElement {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Binding(key) => f.write_str(key),
			Self::Injection(description) => write!(f, "@{description}"),
		}
	}
}

/// The path of one logical resolution
#[derive(Debug, Clone)]
pub struct ResolutionSession {
	path: Arc<Vec<ResolutionElement>>,
	max_depth: usize,
}

impl Default for ResolutionSession {
	fn default() -> Self {
		Self::new()
	}
}

impl ResolutionSession {
	/// Creates an empty session with the default depth limit
	pub fn new() -> Self {
		Self::with_max_depth(MAX_RESOLUTION_DEPTH)
	}

	/// Creates an empty session with a custom depth limit
	pub fn with_max_depth(max_depth: usize) -> Self {
		Self {
			path: Arc::new(Vec::new()),
			max_depth,
		}
	}

	/// Returns the session extended with `key`.
	///
	/// Fails with [`ContextError::CircularDependency`] if `key` is already on
	/// the path, or with [`ContextError::MaxDepthExceeded`] if the path would
	/// grow past the depth limit.
	pub fn enter_binding(&self, key: &str) -> ContextResult<Self> {
		let depth = self.depth() + 1;
		if depth > self.max_depth {
			return Err(ContextError::MaxDepthExceeded(depth));
		}

		if let Some(cycle_start) = self
			.path
			.iter()
			.position(|element| matches!(element, ResolutionElement::Binding(k) if k == key))
		{
			let cycle: Vec<&str> = self.path[cycle_start..]
				.iter()
				.filter_map(|element| match element {
					ResolutionElement::Binding(k) => Some(k.as_str()),
					ResolutionElement::Injection(_) => None,
				})
				.collect();
			return Err(ContextError::CircularDependency {
				key: key.to_string(),
				path: format!("{} -> {}", cycle.join(" -> "), key),
			});
		}

		Ok(self.push(ResolutionElement::Binding(key.to_string())))
	}

	/// Returns the session extended with an injection point
	pub fn enter_injection(&self, description: impl Into<String>) -> Self {
		self.push(ResolutionElement::Injection(description.into()))
	}

	fn push(&self, element: ResolutionElement) -> Self {
		let mut path = Vec::with_capacity(self.path.len() + 1);
		path.extend(self.path.iter().cloned());
		path.push(element);
		Self {
			path: Arc::new(path),
			max_depth: self.max_depth,
		}
	}

	/// Number of bindings on the path
	pub fn depth(&self) -> usize {
		self.path
			.iter()
			.filter(|element| matches!(element, ResolutionElement::Binding(_)))
			.count()
	}

	/// Key of the innermost binding being resolved
	pub fn current_binding_key(&self) -> Option<&str> {
		self.path.iter().rev().find_map(|element| match element {
			ResolutionElement::Binding(key) => Some(key.as_str()),
			ResolutionElement::Injection(_) => None,
		})
	}

	/// Elements of the path, outermost first
	pub fn elements(&self) -> &[ResolutionElement] {
		&self.path
	}

	/// Binding keys of the path joined with ` -> `
	pub fn binding_path(&self) -> String {
		self.path
			.iter()
			.filter(|element| matches!(element, ResolutionElement::Binding(_)))
			.map(ToString::to_string)
			.collect::<Vec<_>>()
			.join(" -> ")
	}
}

impl fmt::Display for ResolutionSession {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let parts: Vec<String> = self.path.iter().map(ToString::to_string).collect();
		f.write_str(&parts.join(" -> "))
	}
}
