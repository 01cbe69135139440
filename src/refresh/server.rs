//! Refresh endpoint contract and the bundled HTTP adapter.

// self
use crate::{
	_prelude::*,
	auth::{Credential, TokenSecret},
	error::RefreshError,
};
#[cfg(feature = "reqwest")]
use crate::{
	error::TransportError,
	http::{ApiResponse, ReqwestTransport},
};

/// Boxed future returned by [`AuthServer::perform_refresh`].
pub type RefreshFuture<'a> =
	Pin<Box<dyn Future<Output = Result<RefreshedCredential, RefreshError>> + 'a + Send>>;

/// Result of a successful refresh call.
#[derive(Clone, Debug)]
pub enum RefreshedCredential {
	/// The endpoint issued a new credential; the coordinator stores it before releasing waiters.
	Issued(Credential),
	/// The endpoint succeeded without returning a credential body (e.g. cookie-only rotation).
	///
	/// The store is left untouched and replays rely on the transport to carry the rotated
	/// credential, so the [`AuthServer`] and the [`HttpTransport`](crate::http::HttpTransport)
	/// must share cookie state.
	Ambient,
}

/// The refresh endpoint as seen by the coordinator.
///
/// Called at most once per refresh cycle. Implementations must not retry internally; any error
/// terminates the session.
pub trait AuthServer
where
	Self: Send + Sync,
{
	/// Exchanges the current credential (if the store holds one) for a fresh one.
	fn perform_refresh(&self, current: Option<Credential>) -> RefreshFuture<'_>;
}

/// JSON refresh endpoint adapter over reqwest.
///
/// Sends `POST <refresh url>` with a JSON body carrying `refreshToken` when the stored
/// credential has one (an empty object otherwise, leaving the server to read its cookie). A 2xx
/// response yields [`RefreshedCredential::Issued`] when an access token is present under
/// `data.tokens` or `tokens`, and [`RefreshedCredential::Ambient`] otherwise, including bodies
/// that are not JSON at all. Only non-2xx statuses are rejections.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct HttpAuthServer {
	client: ReqwestClient,
	url: Url,
}
#[cfg(feature = "reqwest")]
impl HttpAuthServer {
	/// Creates an adapter sharing `transport`'s client (and therefore its cookie jar).
	pub fn new(transport: &ReqwestTransport, url: Url) -> Self {
		Self { client: transport.0.clone(), url }
	}

	/// Refresh endpoint URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	async fn call(&self, current: Option<Credential>) -> Result<RefreshedCredential, RefreshError> {
		let refresh_token =
			current.as_ref().and_then(|credential| credential.refresh_token.as_ref());
		let body = match refresh_token {
			Some(token) => serde_json::json!({ "refreshToken": token.expose() }),
			None => serde_json::json!({}),
		};
		let response = self
			.client
			.post(self.url.clone())
			.header(http::header::CONTENT_TYPE, "application/json")
			.body(body.to_string())
			.send()
			.await
			.map_err(TransportError::from)?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let bytes = response.bytes().await.map_err(TransportError::from)?;

		interpret_refresh_response(ApiResponse { status, headers, body: bytes }, current)
	}
}
#[cfg(feature = "reqwest")]
impl AuthServer for HttpAuthServer {
	fn perform_refresh(&self, current: Option<Credential>) -> RefreshFuture<'_> {
		Box::pin(self.call(current))
	}
}

#[derive(Debug, Default, Deserialize)]
struct RefreshEnvelope {
	#[serde(default)]
	data: Option<RefreshData>,
	#[serde(default)]
	tokens: Option<RefreshTokens>,
}

#[derive(Debug, Default, Deserialize)]
struct RefreshData {
	#[serde(default)]
	tokens: Option<RefreshTokens>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokens {
	#[serde(default)]
	access_token: Option<String>,
	#[serde(default)]
	refresh_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

#[cfg_attr(not(feature = "reqwest"), allow(dead_code))]
fn interpret_refresh_response(
	response: crate::http::ApiResponse,
	current: Option<Credential>,
) -> Result<RefreshedCredential, RefreshError> {
	const PREVIEW_LIMIT: usize = 256;

	if !response.is_success() {
		let mut message = response.text();

		if message.len() > PREVIEW_LIMIT {
			let mut cut = PREVIEW_LIMIT;

			while !message.is_char_boundary(cut) {
				cut -= 1;
			}

			message.truncate(cut);
		}

		return Err(RefreshError::Rejected { status: Some(response.status.as_u16()), message });
	}
	if response.body.iter().all(u8::is_ascii_whitespace) {
		return Ok(RefreshedCredential::Ambient);
	}

	// A 2xx already rotated the session; an unknown body shape only means no token body.
	let envelope = match response.json::<RefreshEnvelope>() {
		Ok(envelope) => envelope,
		Err(err) => {
			#[cfg(feature = "tracing")]
			tracing::warn!(
				path = %err.path(),
				error = %err.inner(),
				"Refresh endpoint returned an unrecognized body; relying on ambient credentials."
			);
			#[cfg(not(feature = "tracing"))]
			let _ = err;

			return Ok(RefreshedCredential::Ambient);
		},
	};
	let tokens = envelope.data.and_then(|data| data.tokens).or(envelope.tokens);
	let Some(RefreshTokens { access_token: Some(access_token), refresh_token, expires_in }) =
		tokens
	else {
		return Ok(RefreshedCredential::Ambient);
	};
	let mut credential = Credential::new(access_token);

	// Servers that do not rotate the refresh token keep the previous one valid.
	let refresh_token = refresh_token.map(TokenSecret::new).or_else(|| {
		current.and_then(|credential| credential.refresh_token)
	});

	if let Some(refresh_token) = refresh_token {
		credential = credential.with_refresh_token(refresh_token);
	}

	if let Some(secs) = expires_in.filter(|secs| *secs > 0) {
		credential = credential.with_expires_in(Duration::seconds(secs));
	}

	Ok(RefreshedCredential::Issued(credential))
}
