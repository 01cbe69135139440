//! Session configuration: API base URL, timeouts, refresh endpoint, and default headers.

mod builder;

pub use builder::*;

// std
use std::{env, time::Duration as StdDuration};
// crates.io
use http::{HeaderMap, StatusCode};
// self
use crate::{_prelude::*, error::ConfigError};

/// Validated configuration shared by the session client and the bundled adapters.
#[derive(Clone, Debug)]
pub struct SessionConfig {
	/// API base URL; always ends with `/` so relative paths join beneath it.
	pub base_url: Url,
	/// Per-request timeout enforced by the transport. Also bounds the refresh call.
	pub request_timeout: StdDuration,
	/// Refresh endpoint path, relative to [`base_url`](Self::base_url).
	pub refresh_path: String,
	/// Headers applied to every request unless the caller overrides them.
	pub default_headers: HeaderMap,
	/// Status code that signals an expired access credential.
	pub expiry_status: StatusCode,
}
impl SessionConfig {
	/// Base URL used when none is configured.
	pub const DEFAULT_BASE_URL: &'static str = "http://localhost:5000/api";
	/// Environment variable overriding the base URL in [`SessionConfig::from_env`].
	pub const ENV_BASE_URL: &'static str = "AUTH_SESSION_BASE_URL";
	/// Environment variable overriding the request timeout (milliseconds).
	pub const ENV_TIMEOUT_MS: &'static str = "AUTH_SESSION_TIMEOUT_MS";

	/// Returns a builder seeded with `base_url` and the default settings.
	pub fn builder(base_url: impl Into<String>) -> SessionConfigBuilder {
		SessionConfigBuilder::new(base_url)
	}

	/// Builds a configuration from the process environment, falling back to defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		let base_url = env::var(Self::ENV_BASE_URL).ok();
		let timeout_ms = env::var(Self::ENV_TIMEOUT_MS).ok();

		Self::from_values(base_url.as_deref(), timeout_ms.as_deref())
	}

	fn from_values(base_url: Option<&str>, timeout_ms: Option<&str>) -> Result<Self, ConfigError> {
		let mut builder = Self::builder(normalize_base_url(base_url));

		if let Some(raw) = timeout_ms.map(str::trim).filter(|raw| !raw.is_empty()) {
			let millis = raw
				.parse::<u64>()
				.map_err(|_| ConfigError::InvalidTimeout { value: raw.to_owned() })?;

			builder = builder.request_timeout(StdDuration::from_millis(millis));
		}

		builder.build()
	}

	/// Resolves a request target against the base URL.
	///
	/// Absolute `http(s)` URLs pass through untouched; anything else is treated as a path below
	/// the base URL, with leading slashes ignored.
	pub fn resolve(&self, target: &str) -> Result<Url, ConfigError> {
		if let Ok(absolute) = Url::parse(target)
			&& matches!(absolute.scheme(), "http" | "https")
		{
			return Ok(absolute);
		}

		self.base_url
			.join(target.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidPath { path: target.to_owned(), source })
	}

	/// Absolute refresh endpoint URL.
	pub fn refresh_url(&self) -> Result<Url, ConfigError> {
		self.resolve(&self.refresh_path)
	}
}

/// Normalizes a configured base URL so it always carries a scheme.
///
/// Missing values fall back to [`SessionConfig::DEFAULT_BASE_URL`], protocol-relative values
/// (`//host/api`) get `http:` and bare hosts get `http://`.
pub fn normalize_base_url(raw: Option<&str>) -> String {
	let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
		return SessionConfig::DEFAULT_BASE_URL.to_owned();
	};

	if raw.starts_with("http://") || raw.starts_with("https://") {
		raw.to_owned()
	} else if raw.starts_with("//") {
		format!("http:{raw}")
	} else {
		format!("http://{raw}")
	}
}
