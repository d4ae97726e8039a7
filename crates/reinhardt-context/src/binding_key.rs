//! Typed binding keys and the well-known keys and tags of the container

use crate::error::{ContextError, ContextResult};
use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;

/// Namespace appended to a key to address its configuration binding
pub const CONFIG_NAMESPACE: &str = "$config";

/// A binding key carrying the type of the value bound to it.
///
/// The type parameter only guides the caller; lookup is by the string key.
///
/// # Examples
///
/// ```
/// use reinhardt_context::BindingKey;
///
/// const GREETER: BindingKey<String> = BindingKey::new("greeter");
/// assert_eq!(GREETER.key(), "greeter");
/// assert_eq!(GREETER.config_key().key(), "greeter:$config");
/// ```
pub struct BindingKey<T> {
	key: Cow<'static, str>,
	_marker: PhantomData<fn() -> T>,
}

impl<T> BindingKey<T> {
	/// Creates a key from a static string
	pub const fn new(key: &'static str) -> Self {
		Self {
			key: Cow::Borrowed(key),
			_marker: PhantomData,
		}
	}

	/// Creates a key from an owned string after validating it
	pub fn create(key: impl Into<String>) -> ContextResult<Self> {
		let key = key.into();
		validate_key(&key)?;
		Ok(Self {
			key: Cow::Owned(key),
			_marker: PhantomData,
		})
	}

	/// Returns the string key
	pub fn key(&self) -> &str {
		&self.key
	}

	/// Returns the key of the configuration binding for this key
	pub fn config_key(&self) -> BindingKey<serde_json::Value> {
		BindingKey {
			key: Cow::Owned(build_key_for_config(&self.key)),
			_marker: PhantomData,
		}
	}
}

impl<T> Clone for BindingKey<T> {
	fn clone(&self) -> Self {
		Self {
			key: self.key.clone(),
			_marker: PhantomData,
		}
	}
}

impl<T> PartialEq for BindingKey<T> {
	fn eq(&self, other: &Self) -> bool {
		self.key == other.key
	}
}

impl<T> Eq for BindingKey<T> {}

impl<T> fmt::Debug for BindingKey<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("BindingKey").field(&self.key).finish()
	}
}

impl<T> fmt::Display for BindingKey<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.key)
	}
}

impl<T> AsRef<str> for BindingKey<T> {
	fn as_ref(&self) -> &str {
		&self.key
	}
}

/// Rejects empty and blank keys
pub fn validate_key(key: &str) -> ContextResult<()> {
	if key.trim().is_empty() {
		return Err(ContextError::InvalidBindingKey(key.to_string()));
	}
	Ok(())
}

/// Builds the key of the configuration binding for `key`
pub fn build_key_for_config(key: &str) -> String {
	format!("{key}:{CONFIG_NAMESPACE}")
}

/// Keys reserved by the container
pub struct ContextBindings;

impl ContextBindings {
	/// Ordered group names used to sort global interceptors
	pub const GLOBAL_INTERCEPTOR_ORDERED_GROUPS: BindingKey<Vec<String>> =
		BindingKey::new("globalInterceptor.orderedGroups");
}

/// Tag names reserved by the container
pub struct ContextTags;

impl ContextTags {
	/// Marks a binding as a global interceptor
	pub const GLOBAL_INTERCEPTOR: &'static str = "globalInterceptor";
	/// Group (phase) of a global interceptor
	pub const GLOBAL_INTERCEPTOR_GROUP: &'static str = "globalInterceptorGroup";
	/// Key a configuration binding configures
	pub const CONFIGURATION_FOR: &'static str = "configurationFor";
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("")]
	#[case("   ")]
	fn test_blank_keys_are_rejected(#[case] key: &str) {
		let result = BindingKey::<String>::create(key);

		assert!(matches!(result, Err(ContextError::InvalidBindingKey(_))));
	}

	#[rstest]
	fn test_config_key_uses_namespace() {
		let key = BindingKey::<u32>::create("services.greeter").unwrap();

		assert_eq!(key.config_key().key(), "services.greeter:$config");
	}
}
