//! Interceptors and proxies
//!
//! A global tracing interceptor assigns a request id the first time a
//! request context runs an intercepted call and reuses it afterwards. The
//! greeter calls its converter through an injected proxy, so both calls are
//! traced with the same id.
//!
//! Run with `RUST_LOG=info cargo run -p reinhardt-context --example interceptor_proxy`.

use reinhardt_context::{
	BindingKey, BindingScope, Context, ContextResult, HandlerResult, InjectedArgs, Injectable, Injection,
	InterceptedProxy, Interceptor, InvocationArgs, InvocationContext, Invocable, Next, Provider, ValueOrPromise,
	as_global_interceptor, define_constructor, define_property, downcast_value, interceptor, invocation_result,
	result_value,
};
use std::sync::Arc;
use tracing::info;

type RequestIdGenerator = Arc<dyn Fn(&Context) -> String + Send + Sync>;

const REQUEST_ID: BindingKey<String> = BindingKey::new("tracing.requestId");
const REQUEST_ID_GENERATOR: BindingKey<RequestIdGenerator> = BindingKey::new("tracing.requestIdGenerator");
const TRACING_INTERCEPTOR: BindingKey<Interceptor> = BindingKey::new("tracing.interceptor");
const CONVERTER: BindingKey<Converter> = BindingKey::new("converter");
const GREETER: BindingKey<Greeter> = BindingKey::new("greeter");

struct TracingInterceptor {
	generator: Arc<RequestIdGenerator>,
}

impl Injectable for TracingInterceptor {
	fn construct(args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self { generator: args.get(0)? })
	}
}

impl Provider for TracingInterceptor {
	type Value = Interceptor;

	fn value(&self) -> ValueOrPromise<ContextResult<Interceptor>> {
		let generator = Arc::clone(&self.generator);
		ValueOrPromise::Value(Ok(interceptor(move |ctx: InvocationContext, next: Next<InvocationContext>| {
			trace_request(&generator, &ctx, next)
		})))
	}
}

fn trace_request(generator: &RequestIdGenerator, ctx: &InvocationContext, next: Next<InvocationContext>) -> HandlerResult {
	let existing = match ctx.get_sync_optional::<String>(&REQUEST_ID) {
		Ok(existing) => existing,
		Err(error) => return ValueOrPromise::Value(Err(error)),
	};
	match existing {
		Some(request_id) => {
			info!(target_name = %ctx.target_name(), %request_id, "Request id found");
		}
		None => {
			let request_id = generator(ctx.parent());
			// The invocation context is discarded after the call
			if let Err(error) = ctx.parent().bind(&REQUEST_ID).map(|binding| {
				binding.to(request_id.clone());
			}) {
				return ValueOrPromise::Value(Err(error));
			}
			info!(target_name = %ctx.target_name(), %request_id, "Adding request id");
		}
	}
	next.proceed()
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
struct Greeter {
	converter: Option<Arc<InterceptedProxy<Converter>>>,
}

impl Injectable for Greeter {
	fn construct(_args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self::default())
	}

	fn inject_property(&mut self, name: &str, value: Option<reinhardt_context::BoundValue>) -> ContextResult<()> {
		if name == "converter" {
			self.converter = value.map(|value| downcast_value(name, value)).transpose()?;
		}
		Ok(())
	}
}

impl Invocable for Greeter {
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	define_constructor::<TracingInterceptor>([Injection::key(&REQUEST_ID_GENERATOR)]);
	define_property::<Greeter>(
		"converter",
		Injection::key(&CONVERTER).as_proxy_with_interceptors::<Converter>(),
	);

	let ctx = Context::named("request");
	ctx.bind(&TRACING_INTERCEPTOR)?
		.to_provider::<TracingInterceptor>()
		.apply(as_global_interceptor(Some("tracing")));
	let generator: RequestIdGenerator = Arc::new(|context: &Context| format!("[{}] {}", context.name(), uuid::Uuid::new_v4()));
	ctx.bind(&REQUEST_ID_GENERATOR)?.to(generator);
	ctx.bind(&GREETER)?.to_class::<Greeter>();
	ctx.bind(&CONVERTER)?.to_class::<Converter>().in_scope(BindingScope::Singleton);

	let greeter = ctx.get_proxy::<Greeter>(&GREETER)?;
	let greeting = greeter
		.invoke("greet", InvocationArgs::new().with("John".to_string()))
		.await?;
	println!("{}", result_value::<String>(&greeting).cloned().unwrap_or_default());
	Ok(())
}
