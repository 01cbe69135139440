//! Transport primitives: replayable request/response descriptors and the [`HttpTransport`]
//! contract.
//!
//! The session client never talks to an HTTP stack directly. It builds an [`ApiRequest`],
//! signs it with the current credential through a [`RequestSigner`], and hands it to an
//! [`HttpTransport`]. Every response is then classified by an [`ExpiryPolicy`] so expired
//! credentials can be routed to the refresh coordinator instead of surfacing as errors.

mod expiry;
mod signer;

pub use expiry::*;
pub use signer::*;

// crates.io
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing a single request.
///
/// Implementations are stateless from the session's point of view: each call issues exactly
/// one request and resolves once. Cookie jars and connection pools are the implementation's
/// own business. Implementations must be `Send + Sync + 'static` so one transport can be shared
/// by every in-flight request of a session.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request` and returns the raw response, whatever its status.
	fn send(&self, request: ApiRequest) -> TransportFuture<'_>;
}

/// Replayable description of one outbound request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Request headers, including defaults applied by the session client.
	pub headers: HeaderMap,
	/// Optional request body.
	pub body: Option<Bytes>,
}
impl ApiRequest {
	/// Creates a request without headers or body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: HeaderMap::new(), body: None }
	}

	/// Sets (or replaces) a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Replaces the request headers.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Sets a raw request body.
	pub fn body(mut self, body: impl Into<Bytes>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON request body and sets `Content-Type` accordingly.
	pub fn json<T>(mut self, value: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(ConfigError::InvalidBody)?;

		self.headers.insert(
			http::header::CONTENT_TYPE,
			HeaderValue::from_static("application/json"),
		);
		self.body = Some(Bytes::from(body));

		Ok(self)
	}
}

/// Response descriptor returned by an [`HttpTransport`].
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Fully buffered response body.
	pub body: Bytes,
}
impl ApiResponse {
	/// Creates a response with an empty header map.
	pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
		Self { status, headers: HeaderMap::new(), body: body.into() }
	}

	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		self.status.is_success()
	}

	/// Decodes the body as JSON, reporting the path of the first mismatch.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}

	/// Returns the body as lossy UTF-8 text.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}
}

/// Reqwest-backed [`HttpTransport`].
///
/// The default client keeps a cookie jar so sessions that rotate credentials through
/// `Set-Cookie` keep working across refresh cycles.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a cookie-aware client honoring the configured request timeout.
	pub fn from_config(config: &crate::config::SessionConfig) -> Result<Self, ConfigError> {
		let client =
			ReqwestClient::builder().cookie_store(true).timeout(config.request_timeout).build()?;

		Ok(Self(client))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: ApiRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let ApiRequest { method, url, headers, body } = request;
			let mut builder = client.request(method, url).headers(headers);

			if let Some(body) = body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let body = response.bytes().await?;

			Ok(ApiResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn json_body_sets_content_type() {
		let url = Url::parse("https://api.example.com/jobs").expect("Fixture URL should parse.");
		let request = ApiRequest::new(Method::POST, url)
			.json(&serde_json::json!({ "title": "engineer" }))
			.expect("JSON body should serialize.");

		assert_eq!(
			request.headers.get(http::header::CONTENT_TYPE).map(HeaderValue::as_bytes),
			Some(&b"application/json"[..])
		);
		assert_eq!(request.body.as_deref(), Some(&br#"{"title":"engineer"}"#[..]));
	}

	#[test]
	fn response_json_reports_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Envelope {
			#[allow(dead_code)]
			data: Inner,
		}
		#[derive(Debug, Deserialize)]
		struct Inner {
			#[allow(dead_code)]
			count: u32,
		}

		let response = ApiResponse::new(StatusCode::OK, r#"{"data":{"count":"many"}}"#);
		let err = response.json::<Envelope>().expect_err("Mismatched type should fail.");

		assert_eq!(err.path().to_string(), "data.count");
	}
}
