//! Classification of responses that signal an expired access credential.

// crates.io
use http::StatusCode;
// self
use crate::{
	_prelude::*,
	http::{ApiRequest, ApiResponse},
};

/// Decides whether a response means "the access credential expired, refresh and replay".
///
/// Servers often use the same status for unrelated authentication failures (bad login,
/// missing permissions); implementations encode the server's response contract here.
pub trait ExpiryPolicy
where
	Self: Send + Sync,
{
	/// Returns `true` when `response` to `request` signals an expired credential.
	fn is_expired(&self, request: &ApiRequest, response: &ApiResponse) -> bool;
}

/// Status-code based policy; `401 Unauthorized` by default.
///
/// Requests whose URL path ends with one of the exempt suffixes are never treated as expired,
/// so a failed login attempt does not kick off a refresh cycle.
#[derive(Clone, Debug)]
pub struct StatusExpiryPolicy {
	status: StatusCode,
	exempt_suffixes: Vec<String>,
}
impl StatusExpiryPolicy {
	/// Creates a policy matching `status`.
	pub fn new(status: StatusCode) -> Self {
		Self { status, exempt_suffixes: Vec::new() }
	}

	/// Exempts requests whose path ends with `suffix` (leading `/` is ignored).
	pub fn exempt_path(mut self, suffix: impl Into<String>) -> Self {
		let suffix = suffix.into();

		self.exempt_suffixes.push(suffix.trim_start_matches('/').to_owned());

		self
	}

	/// Status code treated as an expired-credential signal.
	pub fn status(&self) -> StatusCode {
		self.status
	}

	fn is_exempt(&self, url: &Url) -> bool {
		let path = url.path().trim_end_matches('/');

		self.exempt_suffixes
			.iter()
			.any(|suffix| !suffix.is_empty() && path.ends_with(suffix.as_str()))
	}
}
impl Default for StatusExpiryPolicy {
	fn default() -> Self {
		Self::new(StatusCode::UNAUTHORIZED)
	}
}
impl ExpiryPolicy for StatusExpiryPolicy {
	fn is_expired(&self, request: &ApiRequest, response: &ApiResponse) -> bool {
		response.status == self.status && !self.is_exempt(&request.url)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use http::Method;
	// self
	use super::*;

	fn get(url: &str) -> ApiRequest {
		ApiRequest::new(Method::GET, Url::parse(url).expect("Fixture URL should parse."))
	}

	#[test]
	fn default_policy_matches_unauthorized_only() {
		let policy = StatusExpiryPolicy::default();
		let request = get("https://api.example.com/api/jobs");

		assert!(policy.is_expired(&request, &ApiResponse::new(StatusCode::UNAUTHORIZED, "")));
		assert!(!policy.is_expired(&request, &ApiResponse::new(StatusCode::FORBIDDEN, "")));
		assert!(!policy.is_expired(&request, &ApiResponse::new(StatusCode::OK, "")));
	}

	#[test]
	fn exempt_paths_never_expire() {
		let policy = StatusExpiryPolicy::default().exempt_path("/auth/login");
		let unauthorized = ApiResponse::new(StatusCode::UNAUTHORIZED, "");

		assert!(!policy.is_expired(&get("https://api.example.com/api/auth/login"), &unauthorized));
		assert!(!policy.is_expired(&get("https://api.example.com/api/auth/login/"), &unauthorized));
		assert!(policy.is_expired(&get("https://api.example.com/api/auth/me"), &unauthorized));
	}
}
