//! Interceptor tests
//!
//! These tests verify that:
//! 1. Interceptor lists merge with the added entries ahead and no duplicates
//! 2. Global, class and method interceptors run in that order around the target
//! 3. Global interceptors are ordered by group
//! 4. The invocation context is closed whatever the outcome
//! 5. Unknown methods fail before any interceptor runs

use reinhardt_context::{
	BindingScope, Context, ContextBindings, ContextError, ContextSettings, HandlerResult, InterceptorOrKey,
	InvocationArgs, InvocationContext, Invocable, Next, ValueOrPromise, as_global_interceptor, intercept_class,
	intercept_method, interceptor, invocation_result, invoke_method_with_interceptors, merge_interceptors,
	result_value,
};
use rstest::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Events = Arc<Mutex<Vec<String>>>;

fn recording_interceptor(events: &Events, name: &str) -> InterceptorOrKey {
	let events = Arc::clone(events);
	let name = name.to_string();
	InterceptorOrKey::Handler(interceptor(move |_ctx: InvocationContext, next: Next<InvocationContext>| {
		events.lock().unwrap().push(name.clone());
		next.proceed()
	}))
}

fn text_result(result: &reinhardt_context::InvocationResult) -> String {
	result_value::<String>(result).cloned().unwrap_or_default()
}

/// Implements `Invocable` with `to_upper_case(text)` and `fail()`
macro_rules! converter {
	($name:ident) => {
		struct $name;

		impl Invocable for $name {
			fn has_method(&self, method: &str) -> bool {
				matches!(method, "to_upper_case" | "fail")
			}

			fn invoke_method(self: Arc<Self>, method: &str, args: InvocationArgs) -> HandlerResult {
				match method {
					"to_upper_case" => ValueOrPromise::Value(
						args.get::<String>(0)
							.map(|text| invocation_result(text.to_uppercase())),
					),
					_ => ValueOrPromise::Value(Err(ContextError::application(std::io::Error::other(
						"conversion failed",
					)))),
				}
			}
		}
	};
}

fn keys(names: &[&str]) -> Vec<InterceptorOrKey> {
	names.iter().map(|name| InterceptorOrKey::from(*name)).collect()
}

#[rstest]
#[case(&["log"], &["cache", "log"], &["cache", "log"])]
#[case(&["log"], &["log", "cache"], &["log", "cache"])]
#[case(&[], &["cache", "log"], &["cache", "log"])]
#[case(&["cache", "log"], &[], &["cache", "log"])]
#[case(&["log"], &["cache"], &["log", "cache"])]
fn test_merge_interceptors(#[case] added: &[&str], #[case] existing: &[&str], #[case] expected: &[&str]) {
	// Act
	let merged = merge_interceptors(&keys(added), &keys(existing));

	// Assert
	assert_eq!(merged, keys(expected));
}

#[rstest]
fn test_merge_dedupes_by_identity() {
	// Arrange
	let events: Events = Arc::default();
	let log = recording_interceptor(&events, "log");
	let lookalike = recording_interceptor(&events, "log");

	// Act
	let merged = merge_interceptors(&[log.clone(), lookalike.clone()], &[log.clone()]);

	// Assert
	assert_eq!(merged, vec![lookalike, log]);
}

#[rstest]
#[tokio::test]
async fn test_global_class_and_method_interceptors_run_in_order() {
	// Arrange
	converter!(OrderedConverter);
	let events: Events = Arc::default();
	let ctx = Context::new();
	let global = recording_interceptor(&events, "global");
	let InterceptorOrKey::Handler(global) = global else {
		unreachable!()
	};
	ctx.bind("interceptors.global")
		.unwrap()
		.to(global)
		.apply(as_global_interceptor(None));
	intercept_class::<OrderedConverter>([recording_interceptor(&events, "class")]);
	intercept_method::<OrderedConverter>("to_upper_case", [recording_interceptor(&events, "method")]);

	// Act
	let result = invoke_method_with_interceptors(
		&ctx,
		Arc::new(OrderedConverter),
		"to_upper_case",
		InvocationArgs::new().with("abc".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert_eq!(text_result(&result), "ABC");
	assert_eq!(*events.lock().unwrap(), vec!["global", "class", "method"]);
}

#[rstest]
#[tokio::test]
async fn test_method_interceptors_apply_to_their_method_only() {
	// Arrange
	converter!(SelectiveConverter);
	let events: Events = Arc::default();
	intercept_method::<SelectiveConverter>("fail", [recording_interceptor(&events, "fail-only")]);

	// Act
	invoke_method_with_interceptors(
		&Context::new(),
		Arc::new(SelectiveConverter),
		"to_upper_case",
		InvocationArgs::new().with("x".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert!(events.lock().unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_later_registration_runs_outermost() {
	// Arrange
	converter!(LayeredConverter);
	let events: Events = Arc::default();
	intercept_class::<LayeredConverter>([recording_interceptor(&events, "inner")]);
	intercept_class::<LayeredConverter>([recording_interceptor(&events, "outer")]);

	// Act
	invoke_method_with_interceptors(
		&Context::new(),
		Arc::new(LayeredConverter),
		"to_upper_case",
		InvocationArgs::new().with("x".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert_eq!(*events.lock().unwrap(), vec!["outer", "inner"]);
}

fn bind_grouped(ctx: &Context, events: &Events, name: &str, group: &str) {
	let InterceptorOrKey::Handler(handler) = recording_interceptor(events, name) else {
		unreachable!()
	};
	ctx.bind(format!("interceptors.{name}"))
		.unwrap()
		.to(handler)
		.apply(as_global_interceptor(Some(group)));
}

#[rstest]
#[tokio::test]
async fn test_global_interceptors_sorted_by_bound_group_order() {
	// Arrange
	converter!(GroupedConverter);
	let events: Events = Arc::default();
	let ctx = Context::new();
	bind_grouped(&ctx, &events, "caching", "caching");
	bind_grouped(&ctx, &events, "unknown", "metrics");
	bind_grouped(&ctx, &events, "tracing", "tracing");
	ctx.bind(&ContextBindings::GLOBAL_INTERCEPTOR_ORDERED_GROUPS)
		.unwrap()
		.to(vec!["tracing".to_string(), "caching".to_string()]);

	// Act
	invoke_method_with_interceptors(
		&ctx,
		Arc::new(GroupedConverter),
		"to_upper_case",
		InvocationArgs::new().with("x".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert_eq!(*events.lock().unwrap(), vec!["tracing", "caching", "unknown"]);
}

#[rstest]
#[tokio::test]
async fn test_global_interceptor_groups_fall_back_to_settings() {
	// Arrange
	converter!(SettingsConverter);
	let events: Events = Arc::default();
	let ctx = Context::with_settings(ContextSettings {
		global_interceptor_groups: vec!["tracing".to_string(), "caching".to_string()],
		..ContextSettings::default()
	});
	bind_grouped(&ctx, &events, "caching", "caching");
	bind_grouped(&ctx, &events, "tracing", "tracing");

	// Act
	invoke_method_with_interceptors(
		&ctx,
		Arc::new(SettingsConverter),
		"to_upper_case",
		InvocationArgs::new().with("x".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert_eq!(*events.lock().unwrap(), vec!["tracing", "caching"]);
}

#[rstest]
#[tokio::test]
async fn test_interceptor_can_short_circuit_the_target() {
	// Arrange
	converter!(CachedConverter);
	let calls = Arc::new(AtomicUsize::new(0));
	let seen = Arc::clone(&calls);
	intercept_method::<CachedConverter>(
		"to_upper_case",
		[InterceptorOrKey::Handler(interceptor(move |ctx: InvocationContext, next: Next<InvocationContext>| {
			if ctx.args().get::<String>(0).is_ok_and(|text| text.as_str() == "cached") {
				return ValueOrPromise::Value(Ok(invocation_result("FROM-CACHE".to_string())));
			}
			seen.fetch_add(1, Ordering::SeqCst);
			next.proceed()
		}))],
	);
	let ctx = Context::new();

	// Act
	let cached = invoke_method_with_interceptors(
		&ctx,
		Arc::new(CachedConverter),
		"to_upper_case",
		InvocationArgs::new().with("cached".to_string()),
	)
	.await
	.unwrap();
	let computed = invoke_method_with_interceptors(
		&ctx,
		Arc::new(CachedConverter),
		"to_upper_case",
		InvocationArgs::new().with("fresh".to_string()),
	)
	.await
	.unwrap();

	// Assert
	assert_eq!(text_result(&cached), "FROM-CACHE");
	assert_eq!(text_result(&computed), "FRESH");
	assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[rstest]
#[tokio::test]
async fn test_invocation_context_describes_the_call() {
	// Arrange
	converter!(DescribedConverter);
	let captured: Arc<Mutex<Option<InvocationContext>>> = Arc::default();
	let slot = Arc::clone(&captured);
	intercept_class::<DescribedConverter>([InterceptorOrKey::Handler(interceptor(
		move |ctx: InvocationContext, next: Next<InvocationContext>| {
			*slot.lock().unwrap() = Some(ctx.clone());
			next.proceed()
		},
	))]);
	let parent = Context::named("app");

	// Act
	invoke_method_with_interceptors(
		&parent,
		Arc::new(DescribedConverter),
		"to_upper_case",
		InvocationArgs::new().with("x".to_string()),
	)
	.await
	.unwrap();

	// Assert
	let invocation = captured.lock().unwrap().clone().unwrap();
	assert_eq!(invocation.target_name(), "DescribedConverter::to_upper_case");
	assert_eq!(invocation.method_name(), "to_upper_case");
	assert_eq!(invocation.args().len(), 1);
	assert_eq!(invocation.parent(), &parent);
	assert!(invocation.name().starts_with("InvocationContext-"));
	assert!(invocation.is_closed());
}

#[rstest]
#[tokio::test]
async fn test_invocation_context_closed_after_failure() {
	// Arrange
	converter!(FailingConverter);
	let captured: Arc<Mutex<Option<InvocationContext>>> = Arc::default();
	let slot = Arc::clone(&captured);
	intercept_class::<FailingConverter>([InterceptorOrKey::Handler(interceptor(
		move |ctx: InvocationContext, next: Next<InvocationContext>| {
			ctx.bind("scratch").unwrap().to(1u32);
			*slot.lock().unwrap() = Some(ctx.clone());
			next.proceed()
		},
	))]);

	// Act
	let error = invoke_method_with_interceptors(
		&Context::new(),
		Arc::new(FailingConverter),
		"fail",
		InvocationArgs::new(),
	)
	.await
	.unwrap_err();

	// Assert
	assert_eq!(error.to_string(), "conversion failed");
	let invocation = captured.lock().unwrap().clone().unwrap();
	assert!(invocation.is_closed());
	assert!(!invocation.contains("scratch"));
}

#[rstest]
#[tokio::test]
async fn test_unknown_method_fails_before_interceptors_run() {
	// Arrange
	converter!(PlainConverter);
	let events: Events = Arc::default();
	intercept_class::<PlainConverter>([recording_interceptor(&events, "class")]);

	// Act
	let error = invoke_method_with_interceptors(
		&Context::new(),
		Arc::new(PlainConverter),
		"to_lower_case",
		InvocationArgs::new(),
	)
	.await
	.unwrap_err();

	// Assert
	assert_eq!(error.to_string(), "Method PlainConverter::to_lower_case not found");
	assert!(events.lock().unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn test_interceptor_bound_by_key_is_resolved_per_call() {
	// Arrange
	converter!(KeyedConverter);
	let events: Events = Arc::default();
	let ctx = Context::new();
	let InterceptorOrKey::Handler(first) = recording_interceptor(&events, "first") else {
		unreachable!()
	};
	let InterceptorOrKey::Handler(second) = recording_interceptor(&events, "second") else {
		unreachable!()
	};
	ctx.bind("interceptors.log")
		.unwrap()
		.to(first)
		.in_scope(BindingScope::Transient);
	intercept_method::<KeyedConverter>("to_upper_case", ["interceptors.log".into()]);
	let call = || {
		invoke_method_with_interceptors(
			&ctx,
			Arc::new(KeyedConverter),
			"to_upper_case",
			InvocationArgs::new().with("x".to_string()),
		)
	};

	// Act
	call().await.unwrap();
	ctx.rebind("interceptors.log").unwrap().to(second);
	call().await.unwrap();

	// Assert
	assert_eq!(*events.lock().unwrap(), vec!["first", "second"]);
}
