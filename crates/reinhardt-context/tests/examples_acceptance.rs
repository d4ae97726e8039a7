//! End-to-end scenarios mirroring the crate examples

use reinhardt_context::{
	BindingKey, BindingScope, BoundValue, Context, ContextResult, HandlerResult, InjectedArgs, Injectable, Injection,
	InterceptedProxy, Interceptor, InvocationArgs, InvocationContext, Invocable, Next, Provider, ValueOrPromise,
	as_global_interceptor, define_constructor, define_property, downcast_value, interceptor, invocation_result,
	result_value,
};
use rstest::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct GreeterConfig {
	prefix: Option<String>,
}

struct ConfiguredGreeter {
	config: Arc<GreeterConfig>,
}

impl Injectable for ConfiguredGreeter {
	fn construct(args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self {
			config: args.optional(0)?.unwrap_or_default(),
		})
	}
}

impl ConfiguredGreeter {
	fn greet(&self, name: &str) -> String {
		let prefix = self.config.prefix.as_deref().map(|p| format!("{p} ")).unwrap_or_default();
		format!(" {prefix}: Hello, {name}")
	}
}

#[rstest]
#[tokio::test]
async fn test_configuration_injection_scenario() {
	// Arrange
	define_constructor::<ConfiguredGreeter>([Injection::config()]);
	let ctx = Context::new();
	ctx.configure("greeter").unwrap().to(GreeterConfig {
		prefix: Some("[x]".to_string()),
	});
	ctx.bind("greeter").unwrap().to_class::<ConfiguredGreeter>();

	// Act
	let greeter = ctx.get::<ConfiguredGreeter>("greeter").await.unwrap();
	let greeting = greeter.greet("Ray");

	// Assert
	assert!(greeting.contains("[x]"));
	assert!(greeting.contains("Hello, Ray"));
}

type RequestIdGenerator = Arc<dyn Fn(&Context) -> String + Send + Sync>;

const REQUEST_ID: BindingKey<String> = BindingKey::new("tracing.requestId");
const REQUEST_ID_GENERATOR: BindingKey<RequestIdGenerator> = BindingKey::new("tracing.requestIdGenerator");

struct TracingInterceptor {
	generator: Arc<RequestIdGenerator>,
	seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl Injectable for TracingInterceptor {
	fn construct(args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self {
			generator: args.get(0)?,
			seen: args.get(1)?,
		})
	}
}

impl Provider for TracingInterceptor {
	type Value = Interceptor;

	fn value(&self) -> ValueOrPromise<ContextResult<Interceptor>> {
		let generator = Arc::clone(&self.generator);
		let seen = Arc::clone(&self.seen);
		ValueOrPromise::Value(Ok(interceptor(move |ctx: InvocationContext, next: Next<InvocationContext>| {
			let request_id = match ctx.get_sync_optional::<String>(&REQUEST_ID) {
				Ok(Some(request_id)) => request_id.to_string(),
				Ok(None) => {
					let request_id = generator(ctx.parent());
					ctx.parent().bind(&REQUEST_ID).unwrap().to(request_id.clone());
					request_id
				}
				Err(error) => return ValueOrPromise::Value(Err(error)),
			};
			seen.lock().unwrap().push((ctx.target_name(), request_id));
			next.proceed()
		})))
	}
}

struct Converter;

impl Injectable for Converter {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self)
	}
}

impl Invocable for Converter {
	fn has_method(&self, method: &str) -> bool {
		method == "to_upper_case"
	}

	fn invoke_method(self: Arc<Self>, _method: &str, args: InvocationArgs) -> HandlerResult {
		ValueOrPromise::Value(args.get::<String>(0).map(|name| invocation_result(name.to_uppercase())))
	}
}

#[derive(Default)]
struct ProxiedGreeter {
	converter: Option<Arc<InterceptedProxy<Converter>>>,
}

impl Injectable for ProxiedGreeter {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self::default())
	}

	fn inject_property(&mut self, name: &str, value: Option<BoundValue>) -> ContextResult<()> {
		if name == "converter" {
			self.converter = value.map(|value| downcast_value(name, value)).transpose()?;
		}
		Ok(())
	}
}

impl Invocable for ProxiedGreeter {
	fn has_method(&self, method: &str) -> bool {
		method == "greet"
	}

	fn invoke_method(self: Arc<Self>, _method: &str, args: InvocationArgs) -> HandlerResult {
		let Some(converter) = self.converter.clone() else {
			return ValueOrPromise::Value(Ok(None));
		};
		ValueOrPromise::promise(async move {
			let converted = converter.invoke("to_upper_case", args).await?;
			let message = result_value::<String>(&converted).cloned().unwrap_or_default();
			Ok(invocation_result(format!("Hello, {message}")))
		})
	}
}

#[rstest]
#[tokio::test]
async fn test_interceptor_proxy_scenario() {
	// Arrange
	define_constructor::<TracingInterceptor>([Injection::key(&REQUEST_ID_GENERATOR), Injection::key("tracing.log")]);
	define_property::<ProxiedGreeter>(
		"converter",
		Injection::key("converter").as_proxy_with_interceptors::<Converter>(),
	);
	let generated = Arc::new(AtomicUsize::new(0));
	let counter = Arc::clone(&generated);
	let seen: Arc<Mutex<Vec<(String, String)>>> = Arc::default();
	let ctx = Context::named("request");
	ctx.bind("tracing.log").unwrap().to_bound_value(Arc::clone(&seen) as BoundValue);
	ctx.bind("tracing.interceptor")
		.unwrap()
		.to_provider::<TracingInterceptor>()
		.apply(as_global_interceptor(Some("tracing")));
	let generator: RequestIdGenerator = Arc::new(move |context: &Context| {
		format!("[{}] {}", context.name(), counter.fetch_add(1, Ordering::SeqCst))
	});
	ctx.bind(&REQUEST_ID_GENERATOR).unwrap().to(generator);
	ctx.bind("greeter").unwrap().to_class::<ProxiedGreeter>();
	ctx.bind("converter")
		.unwrap()
		.to_class::<Converter>()
		.in_scope(BindingScope::Singleton);

	// Act
	let greeter = ctx.get_proxy::<ProxiedGreeter>("greeter").unwrap();
	let greeting = greeter
		.invoke("greet", InvocationArgs::new().with("John".to_string()))
		.await
		.unwrap();

	// Assert
	assert_eq!(result_value::<String>(&greeting).map(String::as_str), Some("Hello, JOHN"));
	assert_eq!(generated.load(Ordering::SeqCst), 1);
	assert_eq!(*ctx.get_sync::<String>(&REQUEST_ID).unwrap(), "[request] 0");
	assert_eq!(
		*seen.lock().unwrap(),
		vec![
			("ProxiedGreeter::greet".to_string(), "[request] 0".to_string()),
			("Converter::to_upper_case".to_string(), "[request] 0".to_string()),
		]
	);
}
