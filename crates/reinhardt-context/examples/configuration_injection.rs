//! Configuration injection
//!
//! Binds `greeter` to a class whose constructor receives the configuration
//! bound with `Context::configure("greeter")`.
//!
//! Run with `cargo run -p reinhardt-context --example configuration_injection`.

use reinhardt_context::{Context, ContextResult, InjectedArgs, Injectable, Injection, define_constructor};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Configuration for greeters
#[derive(Debug, Default, Deserialize)]
struct GreeterConfig {
	prefix: Option<String>,
	#[serde(default)]
	include_date: bool,
}

/// A greeter service
struct Greeter {
	config: Arc<GreeterConfig>,
}

impl Injectable for Greeter {
	fn construct(args: InjectedArgs) -> ContextResult<Self> {
		Ok(Self {
			config: args.optional(0)?.unwrap_or_default(),
		})
	}
}

impl Greeter {
	fn greet(&self, name: &str) -> String {
		let prefix = self
			.config
			.prefix
			.as_deref()
			.map(|prefix| format!("{prefix} "))
			.unwrap_or_default();
		let date = if self.config.include_date {
			format!("{}-", chrono::Utc::now().to_rfc3339())
		} else {
			String::new()
		};
		format!("{date} {prefix}: Hello, {name}")
	}
}

const GREETER_CONFIG: &str = r#"
prefix = "[***]"
include_date = true
"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	define_constructor::<Greeter>([Injection::config()]);

	let ctx = Context::new();
	let config: GreeterConfig = toml::from_str(GREETER_CONFIG)?;
	info!(?config, "Configuring greeter");
	ctx.configure("greeter")?.to(config);
	ctx.bind("greeter")?.to_class::<Greeter>();

	let greeter = ctx.get::<Greeter>("greeter").await?;
	println!("{}", greeter.greet("Ray"));
	Ok(())
}
