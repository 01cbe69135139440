//! Credential attachment for outbound requests.

// crates.io
use http::{HeaderValue, header::AUTHORIZATION};
// self
use crate::{_prelude::*, auth::Credential, error::ConfigError, http::ApiRequest};

/// Describes how the current credential is attached to an outbound request.
///
/// The session client calls the signer before every send, including replays, so a replay
/// always carries whatever the store holds after the refresh cycle completed.
pub trait RequestSigner
where
	Self: Send + Sync,
{
	/// Injects authorization state derived from `credential` into `request`.
	///
	/// `credential` is `None` when the store is empty, e.g. for sessions whose credentials
	/// travel exclusively in cookies.
	fn sign(&self, request: &mut ApiRequest, credential: Option<&Credential>)
	-> Result<(), ConfigError>;
}

/// Default signer writing `Authorization: Bearer <access token>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
impl RequestSigner for BearerSigner {
	fn sign(
		&self,
		request: &mut ApiRequest,
		credential: Option<&Credential>,
	) -> Result<(), ConfigError> {
		let Some(credential) = credential else {
			return Ok(());
		};
		let mut value =
			HeaderValue::from_str(&format!("Bearer {}", credential.access_token.expose()))
				.map_err(|_| ConfigError::InvalidHeader { name: AUTHORIZATION.to_string() })?;

		value.set_sensitive(true);
		request.headers.insert(AUTHORIZATION, value);

		Ok(())
	}
}

/// Signer that leaves requests untouched; credentials ride on transport-managed cookies.
#[derive(Clone, Copy, Debug, Default)]
pub struct CookieSigner;
impl RequestSigner for CookieSigner {
	fn sign(&self, _: &mut ApiRequest, _: Option<&Credential>) -> Result<(), ConfigError> {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::Method;
	// self
	use super::*;

	fn request() -> ApiRequest {
		ApiRequest::new(
			Method::GET,
			Url::parse("https://api.example.com/me").expect("Fixture URL should parse."),
		)
	}

	#[test]
	fn bearer_signer_overwrites_stale_authorization() {
		let mut request = request().header(AUTHORIZATION, HeaderValue::from_static("Bearer old"));

		BearerSigner
			.sign(&mut request, Some(&Credential::new("fresh")))
			.expect("Signing with a valid token should succeed.");

		let header = request.headers.get(AUTHORIZATION).expect("Authorization should be set.");

		assert_eq!(header.as_bytes(), b"Bearer fresh");
		assert!(header.is_sensitive());
	}

	#[test]
	fn bearer_signer_skips_empty_store_and_rejects_bad_tokens() {
		let mut unsigned = request();

		BearerSigner.sign(&mut unsigned, None).expect("Empty store should not fail signing.");

		assert!(unsigned.headers.get(AUTHORIZATION).is_none());

		let err = BearerSigner
			.sign(&mut request(), Some(&Credential::new("line\nbreak")))
			.expect_err("Tokens with control characters should be rejected.");

		assert!(matches!(err, ConfigError::InvalidHeader { .. }));
	}
}
