//! Interception proxy tests
//!
//! These tests verify that:
//! 1. A proxy routes calls through the interceptors of its target type
//! 2. The target is resolved again on every call, so rebinding takes effect
//! 3. Proxies can be injected into other classes and follow rebinding

use reinhardt_context::{
	BoundValue, Context, ContextError, ContextResult, HandlerResult, InjectedArgs, Injectable, Injection,
	InterceptedProxy, InterceptorOrKey, InvocationArgs, InvocationContext, Invocable, Next, ValueOrPromise,
	define_property, downcast_value, intercept_class, interceptor, invocation_result, result_value,
};
use rstest::*;
use std::sync::{Arc, Mutex};

struct Speaker {
	phrase: String,
}

impl Injectable for Speaker {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self {
			phrase: "hello".to_string(),
		})
	}
}

impl Invocable for Speaker {
	fn has_method(&self, method: &str) -> bool {
		method == "speak"
	}

	fn invoke_method(self: Arc<Self>, _method: &str, _args: InvocationArgs) -> HandlerResult {
		ValueOrPromise::Value(Ok(invocation_result(self.phrase.clone())))
	}
}

fn spoken(result: &reinhardt_context::InvocationResult) -> String {
	result_value::<String>(result).cloned().unwrap_or_default()
}

#[rstest]
#[tokio::test]
async fn test_proxy_resolves_target_on_every_call() {
	// Arrange
	let ctx = Context::new();
	ctx.bind("speaker").unwrap().to(Speaker {
		phrase: "hello".to_string(),
	});
	let proxy = ctx.get_proxy::<Speaker>("speaker").unwrap();

	// Act
	let first = proxy.invoke("speak", InvocationArgs::new()).await.unwrap();
	ctx.rebind("speaker").unwrap().to(Speaker {
		phrase: "bonjour".to_string(),
	});
	let second = proxy.invoke("speak", InvocationArgs::new()).await.unwrap();

	// Assert
	assert_eq!(spoken(&first), "hello");
	assert_eq!(spoken(&second), "bonjour");
}

#[rstest]
fn test_proxy_for_unbound_key_fails() {
	let ctx = Context::new();

	let result = ctx.get_proxy::<Speaker>("speaker");

	assert!(matches!(result, Err(ContextError::BindingNotFound { .. })));
}

#[rstest]
#[tokio::test]
async fn test_proxy_call_fails_after_unbind() {
	// Arrange
	let ctx = Context::new();
	ctx.bind("speaker").unwrap().to_class::<Speaker>();
	let proxy: InterceptedProxy<Speaker> = ctx.get_proxy("speaker").unwrap();

	// Act
	ctx.unbind("speaker").unwrap();
	let error = proxy.invoke("speak", InvocationArgs::new()).await.unwrap_err();

	// Assert
	assert!(error.is_binding_not_found());
}

struct Shouter;

impl Invocable for Shouter {
	fn has_method(&self, method: &str) -> bool {
		method == "shout"
	}

	fn invoke_method(self: Arc<Self>, _method: &str, args: InvocationArgs) -> HandlerResult {
		ValueOrPromise::Value(args.get::<String>(0).map(|text| invocation_result(text.to_uppercase())))
	}
}

#[derive(Default)]
struct Announcer {
	shouter: Option<Arc<InterceptedProxy<Shouter>>>,
}

impl Injectable for Announcer {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self::default())
	}

	fn inject_property(&mut self, name: &str, value: Option<BoundValue>) -> ContextResult<()> {
		if name == "shouter" {
			self.shouter = value.map(|v| downcast_value(name, v)).transpose()?;
		}
		Ok(())
	}
}

#[rstest]
#[tokio::test]
async fn test_injected_proxy_runs_class_interceptors() {
	// Arrange
	let events: Arc<Mutex<Vec<String>>> = Arc::default();
	let record = Arc::clone(&events);
	intercept_class::<Shouter>([InterceptorOrKey::Handler(interceptor(
		move |ctx: InvocationContext, next: Next<InvocationContext>| {
			record.lock().unwrap().push(ctx.target_name());
			next.proceed()
		},
	))]);
	define_property::<Announcer>(
		"shouter",
		Injection::key("shouter").as_proxy_with_interceptors::<Shouter>(),
	);
	let ctx = Context::new();
	ctx.bind("shouter").unwrap().to(Shouter);
	ctx.bind("announcer").unwrap().to_class::<Announcer>();

	// Act
	let announcer = ctx.get::<Announcer>("announcer").await.unwrap();
	let result = announcer
		.shouter
		.as_ref()
		.unwrap()
		.invoke("shout", InvocationArgs::new().with("hi".to_string()))
		.await
		.unwrap();

	// Assert
	assert_eq!(spoken(&result), "HI");
	assert_eq!(*events.lock().unwrap(), vec!["Shouter::shout"]);
}

#[derive(Default)]
struct Lobby {
	speaker: Option<Arc<InterceptedProxy<Speaker>>>,
}

impl Injectable for Lobby {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self::default())
	}

	fn inject_property(&mut self, name: &str, value: Option<BoundValue>) -> ContextResult<()> {
		if name == "speaker" {
			self.speaker = value.map(|v| downcast_value(name, v)).transpose()?;
		}
		Ok(())
	}
}

#[rstest]
#[tokio::test]
async fn test_injected_proxy_follows_rebinding() {
	// Arrange
	define_property::<Lobby>(
		"speaker",
		Injection::key("speaker").as_proxy_with_interceptors::<Speaker>(),
	);
	let ctx = Context::new();
	ctx.bind("speaker").unwrap().to(Speaker {
		phrase: "hello".to_string(),
	});
	ctx.bind("lobby").unwrap().to_class::<Lobby>().in_scope(reinhardt_context::BindingScope::Singleton);
	let lobby = ctx.get::<Lobby>("lobby").await.unwrap();
	let speaker = lobby.speaker.as_ref().unwrap();

	// Act
	let before = speaker.invoke("speak", InvocationArgs::new()).await.unwrap();
	ctx.rebind("speaker").unwrap().to(Speaker {
		phrase: "bonjour".to_string(),
	});
	let after = speaker.invoke("speak", InvocationArgs::new()).await.unwrap();

	// Assert
	assert_eq!(spoken(&before), "hello");
	assert_eq!(spoken(&after), "bonjour");
	assert!(Arc::ptr_eq(&lobby, &ctx.get::<Lobby>("lobby").await.unwrap()));
}
