//! Container settings
//!
//! Settings are attached to a root context and inherited by every context
//! created below it.

use serde::{Deserialize, Serialize};

/// Prefix of the environment variables read by [`ContextSettings::from_env`]
pub const ENV_PREFIX: &str = "REINHARDT_CONTEXT_";

/// Errors raised while loading settings
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
	/// The TOML document could not be parsed
	#[error("Invalid context settings: {0}")]
	Toml(#[from] toml::de::Error),

	/// An environment variable held a value of the wrong shape
	#[error("Invalid value {value:?} for environment variable {var}")]
	InvalidEnv {
		/// Variable name
		var: String,
		/// Offending value
		value: String,
	},
}

/// Settings governing resolution in a context tree
///
/// # Examples
///
/// ```
/// use reinhardt_context::ContextSettings;
///
/// let settings = ContextSettings::from_toml_str(
///     r#"
///     max_resolution_depth = 16
///     global_interceptor_groups = ["auth", "log"]
///     "#,
/// )
/// .unwrap();
/// assert_eq!(settings.max_resolution_depth, 16);
/// assert_eq!(settings.name_prefix, "context");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextSettings {
	/// Deepest allowed chain of nested binding resolutions
	pub max_resolution_depth: usize,
	/// Fallback group order for global interceptors when
	/// `globalInterceptor.orderedGroups` is not bound
	pub global_interceptor_groups: Vec<String>,
	/// Prefix of generated context names
	pub name_prefix: String,
}

impl Default for ContextSettings {
	fn default() -> Self {
		Self {
			max_resolution_depth: crate::resolution::MAX_RESOLUTION_DEPTH,
			global_interceptor_groups: Vec::new(),
			name_prefix: "context".to_string(),
		}
	}
}

impl ContextSettings {
	/// Parses settings from a TOML document; missing fields keep their defaults
	pub fn from_toml_str(source: &str) -> Result<Self, SettingsError> {
		Ok(toml::from_str(source)?)
	}

	/// Reads settings from `REINHARDT_CONTEXT_*` environment variables
	pub fn from_env() -> Result<Self, SettingsError> {
		Self::from_vars(std::env::vars())
	}

	/// Reads settings from `(name, value)` pairs using the environment
	/// variable names.
	///
	/// Recognized names are `REINHARDT_CONTEXT_MAX_RESOLUTION_DEPTH`,
	/// `REINHARDT_CONTEXT_GLOBAL_INTERCEPTOR_GROUPS` (comma separated) and
	/// `REINHARDT_CONTEXT_NAME_PREFIX`. Other names are ignored.
	pub fn from_vars<I, K, V>(vars: I) -> Result<Self, SettingsError>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: Into<String>,
	{
		let mut settings = Self::default();
		for (name, value) in vars {
			let Some(field) = name.as_ref().strip_prefix(ENV_PREFIX) else {
				continue;
			};
			let value = value.into();
			match field {
				"MAX_RESOLUTION_DEPTH" => {
					settings.max_resolution_depth =
						value.trim().parse().map_err(|_| SettingsError::InvalidEnv {
							var: name.as_ref().to_string(),
							value: value.clone(),
						})?;
				}
				"GLOBAL_INTERCEPTOR_GROUPS" => {
					settings.global_interceptor_groups = value
						.split(',')
						.map(str::trim)
						.filter(|group| !group.is_empty())
						.map(str::to_string)
						.collect();
				}
				"NAME_PREFIX" => settings.name_prefix = value,
				_ => {}
			}
		}
		Ok(settings)
	}
}
