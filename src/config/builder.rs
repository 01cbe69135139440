// std
use std::time::Duration as StdDuration;
// crates.io
use http::{
	HeaderMap, HeaderName, HeaderValue, StatusCode,
	header::{ACCEPT, CONTENT_TYPE},
};
// self
use crate::{
	_prelude::*,
	config::{SessionConfig, normalize_base_url},
	error::ConfigError,
};

/// Builder for [`SessionConfig`] values.
#[derive(Debug)]
pub struct SessionConfigBuilder {
	/// Raw base URL; normalized during [`build`](Self::build).
	pub base_url: String,
	/// Per-request timeout.
	pub request_timeout: StdDuration,
	/// Refresh endpoint path relative to the base URL.
	pub refresh_path: String,
	/// Raw default headers; validated during [`build`](Self::build).
	pub default_headers: Vec<(String, String)>,
	/// Status code signalling an expired credential.
	pub expiry_status: u16,
}
impl SessionConfigBuilder {
	/// Default per-request timeout.
	pub const DEFAULT_TIMEOUT: StdDuration = StdDuration::from_secs(30);
	/// Default refresh endpoint path.
	pub const DEFAULT_REFRESH_PATH: &'static str = "auth/refresh-token";

	/// Creates a new builder seeded with the provided base URL.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			base_url: base_url.into(),
			request_timeout: Self::DEFAULT_TIMEOUT,
			refresh_path: Self::DEFAULT_REFRESH_PATH.to_owned(),
			default_headers: vec![
				(CONTENT_TYPE.to_string(), "application/json".to_owned()),
				(ACCEPT.to_string(), "application/json".to_owned()),
			],
			expiry_status: StatusCode::UNAUTHORIZED.as_u16(),
		}
	}

	/// Overrides the per-request timeout.
	pub fn request_timeout(mut self, timeout: StdDuration) -> Self {
		self.request_timeout = timeout;

		self
	}

	/// Overrides the refresh endpoint path.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Adds (or replaces) a default header.
	pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		let name = name.into();

		self.default_headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
		self.default_headers.push((name, value.into()));

		self
	}

	/// Overrides the expired-credential status code.
	pub fn expiry_status(mut self, status: u16) -> Self {
		self.expiry_status = status;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<SessionConfig, ConfigError> {
		let base_url = parse_base_url(&normalize_base_url(Some(&self.base_url)))?;

		if self.request_timeout.is_zero() {
			return Err(ConfigError::NonPositiveTimeout("request"));
		}

		let expiry_status = StatusCode::from_u16(self.expiry_status)
			.map_err(|_| ConfigError::InvalidStatus(self.expiry_status))?;
		let mut default_headers = HeaderMap::with_capacity(self.default_headers.len());

		for (name, value) in self.default_headers {
			let header_name = HeaderName::try_from(name.as_str())
				.map_err(|_| ConfigError::InvalidHeader { name: name.clone() })?;
			let header_value = HeaderValue::try_from(value.as_str())
				.map_err(|_| ConfigError::InvalidHeader { name })?;

			default_headers.insert(header_name, header_value);
		}

		Ok(SessionConfig {
			base_url,
			request_timeout: self.request_timeout,
			refresh_path: self.refresh_path,
			default_headers,
			expiry_status,
		})
	}
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
	let mut url = Url::parse(raw)
		.map_err(|source| ConfigError::InvalidBaseUrl { value: raw.to_owned(), source })?;

	if !matches!(url.scheme(), "http" | "https") {
		return Err(ConfigError::UnsupportedScheme { scheme: url.scheme().to_owned() });
	}
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}
