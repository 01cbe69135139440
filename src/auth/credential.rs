//! Access/refresh credential pair owned by a [`CredentialStore`](crate::store::CredentialStore).

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Opaque access + refresh credential pair.
///
/// The refresh coordinator never inspects these values. It only asks the store for the current
/// credential, hands it to the refresh endpoint, and stores whatever comes back.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credential {
	/// Short-lived access token sent with every request.
	pub access_token: TokenSecret,
	/// Longer-lived refresh token, when the session exposes one to the client.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<TokenSecret>,
	/// Instant the credential was obtained.
	pub issued_at: OffsetDateTime,
	/// Access token expiry, when the server advertised one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_at: Option<OffsetDateTime>,
}
impl Credential {
	/// Creates a credential carrying only an access token, issued now.
	pub fn new(access_token: impl Into<TokenSecret>) -> Self {
		Self {
			access_token: access_token.into(),
			refresh_token: None,
			issued_at: OffsetDateTime::now_utc(),
			expires_at: None,
		}
	}

	/// Attaches a refresh token.
	pub fn with_refresh_token(mut self, refresh_token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(refresh_token.into());

		self
	}

	/// Overrides the issued-at instant.
	pub fn with_issued_at(mut self, instant: OffsetDateTime) -> Self {
		self.issued_at = instant;

		self
	}

	/// Sets the access token expiry relative to the issued-at instant.
	pub fn with_expires_in(mut self, ttl: Duration) -> Self {
		self.expires_at = Some(self.issued_at + ttl);

		self
	}

	/// Returns `true` if the access token is known to be expired at `instant`.
	///
	/// Credentials without an advertised expiry are never considered expired locally; the
	/// server's expired-credential response is the only signal for them.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		self.expires_at.is_some_and(|expires_at| instant >= expires_at)
	}
}
impl Debug for Credential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Credential")
			.field("access_token", &"<redacted>")
			.field("refresh_token_set", &self.refresh_token.is_some())
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
