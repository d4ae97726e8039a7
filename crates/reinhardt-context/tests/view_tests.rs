//! Context view tests
//!
//! These tests verify that:
//! 1. A view tracks bind/unbind events of its context and its ancestors
//! 2. Values are resolved in view order, honoring a comparator
//! 3. A closed view refuses to be read

use reinhardt_context::{
	Context, ContextError, ContextView, compare_bindings_by_tag, filter_by_tag,
};
use rstest::*;

fn tagged(ctx: &Context, key: &str, value: &str) {
	ctx.bind(key).unwrap().to(value.to_string()).tag("greeter");
}

#[rstest]
#[tokio::test]
async fn test_view_follows_parent_and_child_changes() {
	// Arrange
	let root = Context::named("app");
	let child = root.create_child_named("server");
	let view: ContextView = child.create_view(filter_by_tag("greeter"), None);
	tagged(&root, "greeters.en", "Hello");

	// Act
	let initial = view.values_as::<String>().await.unwrap();
	tagged(&child, "greeters.fr", "Bonjour");
	let after_bind = view.values_as::<String>().await.unwrap();
	root.unbind("greeters.en").unwrap();
	let after_unbind = view.values_as::<String>().await.unwrap();

	// Assert
	assert_eq!(initial.iter().map(|v| v.as_str()).collect::<Vec<_>>(), vec!["Hello"]);
	assert_eq!(
		after_bind.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
		vec!["Bonjour", "Hello"]
	);
	assert_eq!(after_unbind.iter().map(|v| v.as_str()).collect::<Vec<_>>(), vec!["Bonjour"]);
}

#[rstest]
fn test_view_ignores_non_matching_bindings() {
	// Arrange
	let ctx = Context::new();
	let view = ctx.create_view(filter_by_tag("greeter"), None);

	// Act
	ctx.bind("other").unwrap().to(1u32);

	// Assert
	assert!(view.bindings().unwrap().is_empty());
}

#[rstest]
fn test_view_sorted_by_comparator() {
	// Arrange
	let ctx = Context::new();
	let view = ctx.create_view(
		filter_by_tag("greeter"),
		Some(compare_bindings_by_tag("phase", ["early", "late"])),
	);
	ctx.bind("b").unwrap().to("late".to_string()).tag("greeter").tag(("phase", "late"));
	ctx.bind("a").unwrap().to("early".to_string()).tag("greeter").tag(("phase", "early"));

	// Act
	let keys: Vec<String> = view
		.bindings()
		.unwrap()
		.iter()
		.map(|binding| binding.key().to_string())
		.collect();

	// Assert
	assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
}

#[rstest]
fn test_closed_view_cannot_be_read() {
	// Arrange
	let ctx = Context::new();
	let view = ctx.create_view(filter_by_tag("greeter"), None);

	// Act
	view.close();
	ctx.bind("x").unwrap().to(1u32).tag("greeter");

	// Assert
	assert!(view.is_closed());
	assert!(matches!(view.bindings(), Err(ContextError::ViewClosed)));
}

#[rstest]
fn test_view_tracks_rebinding() {
	// Arrange
	let ctx = Context::new();
	let view = ctx.create_view(filter_by_tag("greeter"), None);
	tagged(&ctx, "greeters.en", "Hello");
	assert_eq!(view.bindings().unwrap().len(), 1);

	// Act
	ctx.rebind("greeters.en").unwrap().to("Hi".to_string());

	// Assert
	assert!(view.bindings().unwrap().is_empty());
}
