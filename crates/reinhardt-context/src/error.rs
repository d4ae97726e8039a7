//! Error types for binding resolution and method interception

use std::error::Error as StdError;
use std::sync::Arc;

/// Result type used throughout the context container
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors surfaced by contexts, bindings, views and handler chains.
///
/// The error is `Clone` so that a single in-flight resolution can hand the
/// same failure to every caller awaiting it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContextError {
	/// A required key is absent from the whole context chain
	#[error("The key '{key}' is not bound to any value in context {context}")]
	BindingNotFound {
		/// Binding key that was requested
		key: String,
		/// Name of the context resolution started from
		context: String,
	},

	/// `bind` was called for a key that already exists in the same context
	#[error("Duplicate binding for key '{key}' in context {context}")]
	DuplicateBinding {
		/// Binding key
		key: String,
		/// Name of the owning context
		context: String,
	},

	/// A synchronous resolution path met a pending value
	#[error("Cannot get '{key}' synchronously: the value is still pending")]
	AsyncResolution {
		/// Binding key
		key: String,
	},

	/// A required injection point could not be satisfied
	#[error("Cannot resolve injected {member} of {target}: key '{key}' is not bound")]
	MissingDependency {
		/// Type receiving the injection
		target: String,
		/// Injection point, such as `constructor[0]` or `property converter`
		member: String,
		/// Binding key that was looked up
		key: String,
	},

	/// The interception target does not expose the requested method
	#[error("Method {target} not found")]
	MethodNotFound {
		/// Target name, such as `Greeter::greet`
		target: String,
	},

	/// The view was used after `close()`
	#[error("The context view is closed")]
	ViewClosed,

	/// Resolution re-entered a binding that is already being resolved
	#[error(
		"Circular dependency detected: {key}\n  Path: {path}\nThis forms a cycle that cannot be resolved."
	)]
	CircularDependency {
		/// Binding key that closes the cycle
		key: String,
		/// Circular path (format: a -> b -> a)
		path: String,
	},

	/// Resolution nested deeper than the configured limit
	#[error(
		"Maximum resolution depth exceeded: {0}\nThis likely indicates an extremely deep or circular dependency chain."
	)]
	MaxDepthExceeded(usize),

	/// The resolved value is not of the requested type
	#[error("Value bound to '{key}' is not of type {expected}")]
	TypeMismatch {
		/// Binding key or argument position
		key: String,
		/// Requested Rust type
		expected: String,
	},

	/// The binding is locked against unbind/rebind
	#[error("Binding '{key}' is locked and cannot be unbound or rebound")]
	BindingLocked {
		/// Binding key
		key: String,
	},

	/// The binding already belongs to another context
	#[error("Binding '{key}' is already owned by another context")]
	BindingOwned {
		/// Binding key
		key: String,
	},

	/// The binding key is empty or blank
	#[error("Invalid binding key: {0:?}")]
	InvalidBindingKey(String),

	/// The binding was created but never given a value source
	#[error("Binding '{key}' has no value source configured")]
	NoValueSource {
		/// Binding key
		key: String,
	},

	/// Failure raised by application code (factories, handlers, target methods)
	#[error(transparent)]
	Application(Arc<dyn StdError + Send + Sync + 'static>),
}

impl ContextError {
	/// Wraps an application error without altering it.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_context::ContextError;
	///
	/// let err = ContextError::application(std::io::Error::other("disk full"));
	/// assert_eq!(err.to_string(), "disk full");
	/// ```
	pub fn application<E>(error: E) -> Self
	where
		E: StdError + Send + Sync + 'static,
	{
		Self::Application(Arc::new(error))
	}

	/// Returns `true` if this is a [`ContextError::BindingNotFound`]
	pub fn is_binding_not_found(&self) -> bool {
		matches!(self, Self::BindingNotFound { .. })
	}
}

impl From<anyhow::Error> for ContextError {
	fn from(error: anyhow::Error) -> Self {
		let boxed: Box<dyn StdError + Send + Sync + 'static> = error.into();
		Self::Application(Arc::from(boxed))
	}
}
