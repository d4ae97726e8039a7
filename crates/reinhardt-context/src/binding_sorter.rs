//! Ordering bindings by phase tags

use crate::binding::Binding;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A total order over bindings, used by views and discovered chains
#[derive(Clone)]
pub struct BindingComparator(Arc<dyn Fn(&Binding, &Binding) -> Ordering + Send + Sync>);

impl BindingComparator {
	pub fn new<F>(compare: F) -> Self
	where
		F: Fn(&Binding, &Binding) -> Ordering + Send + Sync + 'static,
	{
		Self(Arc::new(compare))
	}

	pub fn compare(&self, a: &Binding, b: &Binding) -> Ordering {
		(self.0)(a, b)
	}

	/// Stable sort of `bindings`
	pub fn sort(&self, bindings: &mut [Arc<Binding>]) {
		bindings.sort_by(|a, b| self.compare(a, b));
	}
}

impl<F> From<F> for BindingComparator
where
	F: Fn(&Binding, &Binding) -> Ordering + Send + Sync + 'static,
{
	fn from(compare: F) -> Self {
		Self::new(compare)
	}
}

impl fmt::Debug for BindingComparator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("BindingComparator(..)")
	}
}

/// Compares two phase values by their position in `order`.
///
/// Values not listed in `order` (or missing) sort after every listed value
/// and keep their relative order.
///
/// # Examples
///
/// ```
/// use reinhardt_context::compare_by_order;
/// use std::cmp::Ordering;
///
/// let order = vec!["log".to_string(), "auth".to_string()];
/// assert_eq!(compare_by_order(Some("log"), Some("auth"), &order), Ordering::Less);
/// assert_eq!(compare_by_order(None, Some("auth"), &order), Ordering::Greater);
/// assert_eq!(compare_by_order(Some("x"), None, &order), Ordering::Equal);
/// ```
pub fn compare_by_order(a: Option<&str>, b: Option<&str>, order: &[String]) -> Ordering {
	let position = |value: Option<&str>| value.and_then(|v| order.iter().position(|o| o == v));
	match (position(a), position(b)) {
		(None, None) => Ordering::Equal,
		(i, j) => i.unwrap_or(order.len()).cmp(&j.unwrap_or(order.len())),
	}
}

/// Comparator ordering bindings by the value of `phase_tag` following `order`
pub fn compare_bindings_by_tag<I, S>(phase_tag: &str, order: I) -> BindingComparator
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	let phase_tag = phase_tag.to_string();
	let order: Vec<String> = order.into_iter().map(Into::into).collect();
	BindingComparator::new(move |a, b| {
		compare_by_order(
			a.tag_value(&phase_tag).as_deref(),
			b.tag_value(&phase_tag).as_deref(),
			&order,
		)
	})
}

/// Sorts `bindings` in place by the value of `phase_tag` following `order`
pub fn sort_bindings_by_phase(bindings: &mut [Arc<Binding>], phase_tag: &str, order: &[String]) {
	compare_bindings_by_tag(phase_tag, order.iter().cloned()).sort(bindings);
}
