//! Binding filters

use crate::binding::Binding;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// A predicate over bindings, used by `find`, views and discovered chains
///
/// Any `Fn(&Binding) -> bool` closure converts into a filter:
///
/// ```
/// use reinhardt_context::{BindingFilter, Context};
///
/// let ctx = Context::new();
/// ctx.bind("a").unwrap().to(1u8).tag("x");
/// ctx.bind("b").unwrap().to(2u8);
///
/// let only_a: BindingFilter = (|b: &reinhardt_context::Binding| b.key() == "a").into();
/// assert_eq!(ctx.find(only_a).len(), 1);
/// ```
#[derive(Clone)]
pub struct BindingFilter(Arc<dyn Fn(&Binding) -> bool + Send + Sync>);

impl BindingFilter {
	pub fn new<F>(predicate: F) -> Self
	where
		F: Fn(&Binding) -> bool + Send + Sync + 'static,
	{
		Self(Arc::new(predicate))
	}

	/// Matches every binding
	pub fn all() -> Self {
		Self::new(|_| true)
	}

	pub fn matches(&self, binding: &Binding) -> bool {
		(self.0)(binding)
	}

	/// Matches bindings accepted by both filters
	pub fn and(self, other: impl Into<BindingFilter>) -> Self {
		let other = other.into();
		Self::new(move |binding| self.matches(binding) && other.matches(binding))
	}

	/// Matches bindings accepted by either filter
	pub fn or(self, other: impl Into<BindingFilter>) -> Self {
		let other = other.into();
		Self::new(move |binding| self.matches(binding) || other.matches(binding))
	}
}

impl<F> From<F> for BindingFilter
where
	F: Fn(&Binding) -> bool + Send + Sync + 'static,
{
	fn from(predicate: F) -> Self {
		Self::new(predicate)
	}
}

impl fmt::Debug for BindingFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("BindingFilter(..)")
	}
}

/// Matches bindings carrying a tag whose name matches `pattern`.
///
/// `*` matches any run of characters except `.` and `:`, `?` matches one
/// such character. Without wildcards the tag name must match exactly.
pub fn filter_by_tag(pattern: &str) -> BindingFilter {
	match wildcard_regex(pattern) {
		Some(regex) => BindingFilter::new(move |binding| binding.tag_names().iter().any(|name| regex.is_match(name))),
		None => {
			let name = pattern.to_string();
			BindingFilter::new(move |binding| binding.has_tag(&name))
		}
	}
}

/// Matches bindings whose tag `name` has exactly `value`
pub fn filter_by_tag_value(name: &str, value: &str) -> BindingFilter {
	let name = name.to_string();
	let value = value.to_string();
	BindingFilter::new(move |binding| binding.tag_value(&name).as_deref() == Some(value.as_str()))
}

/// Matches bindings whose key matches `pattern`, with the wildcards of
/// [`filter_by_tag`]
pub fn filter_by_key(pattern: &str) -> BindingFilter {
	match wildcard_regex(pattern) {
		Some(regex) => BindingFilter::new(move |binding| regex.is_match(binding.key())),
		None => {
			let key = pattern.to_string();
			BindingFilter::new(move |binding| binding.key() == key)
		}
	}
}

fn wildcard_regex(pattern: &str) -> Option<Regex> {
	if !pattern.contains(['*', '?']) {
		return None;
	}
	let mut source = String::from("^");
	for ch in pattern.chars() {
		match ch {
			'*' => source.push_str(r"[^.:]*"),
			'?' => source.push_str(r"[^.:]"),
			other => source.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
		}
	}
	source.push('$');
	Regex::new(&source).ok()
}
