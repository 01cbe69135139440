//! Session-level error types shared across the client, the refresh coordinator, and stores.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical session error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Credential storage failure outside a refresh cycle.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeout) while sending a request.
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// The request could not be authenticated; terminal for this request.
	#[error("Authentication failed: {reason}.")]
	AuthenticationFailed {
		/// Why the request was not replayed.
		reason: AuthFailure,
	},
}
impl Error {
	/// Returns `true` when the error is a terminal authentication failure.
	pub fn is_authentication_failed(&self) -> bool {
		matches!(self, Self::AuthenticationFailed { .. })
	}

	pub(crate) fn auth(reason: AuthFailure) -> Self {
		Self::AuthenticationFailed { reason }
	}
}

/// Reasons attached to [`Error::AuthenticationFailed`].
#[derive(Clone, Debug)]
pub enum AuthFailure {
	/// The request already consumed its single replay and expired again.
	AlreadyRetried,
	/// The refresh cycle this request depended on failed; the session was terminated.
	RefreshFailed(Arc<RefreshError>),
	/// The refresh leader went away before publishing an outcome.
	Abandoned,
	/// The session was logged out while the request waited for a refresh.
	LoggedOut,
}
impl Display for AuthFailure {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::AlreadyRetried => f.write_str("credential expired again after a refresh"),
			Self::RefreshFailed(err) => write!(f, "credential refresh failed: {err}"),
			Self::Abandoned => f.write_str("credential refresh was abandoned"),
			Self::LoggedOut => f.write_str("session was logged out"),
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot be parsed.
	#[error("Base URL `{value}` is invalid.")]
	InvalidBaseUrl {
		/// Raw value after normalization.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Base URL uses a scheme other than `http` or `https`.
	#[error("Base URL scheme `{scheme}` is not supported.")]
	UnsupportedScheme {
		/// Offending scheme.
		scheme: String,
	},
	/// Request path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Offending path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Header name or value is malformed.
	#[error("Header `{name}` is invalid.")]
	InvalidHeader {
		/// Header name as supplied.
		name: String,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	InvalidBody(#[source] serde_json::Error),
	/// Expiry status code is outside the valid HTTP range.
	#[error("Status code {0} is not a valid HTTP status.")]
	InvalidStatus(u16),
	/// A timeout of zero length was configured.
	#[error("The {0} timeout must be positive.")]
	NonPositiveTimeout(&'static str),
	/// A timeout value is not a whole number of milliseconds.
	#[error("Timeout `{value}` is not a whole number of milliseconds.")]
	InvalidTimeout {
		/// Raw value as configured.
		value: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO, timeouts).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// The request did not complete within the configured timeout.
	#[error("Request timed out.")]
	TimedOut {
		/// Transport-specific timeout error, when available.
		#[source]
		source: Option<BoxError>,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() {
			Self::TimedOut { source: Some(Box::new(e)) }
		} else {
			Self::network(e)
		}
	}
}

/// Failures of the refresh call itself; every variant terminates the session.
#[derive(Debug, ThisError)]
pub enum RefreshError {
	/// The refresh endpoint rejected the refresh credential.
	#[error("Refresh endpoint rejected the session (status {status:?}): {message}")]
	Rejected {
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Endpoint- or adapter-supplied message.
		message: String,
	},
	/// The refresh call failed at the transport layer.
	#[error("Refresh call failed at the transport layer.")]
	Transport(#[from] TransportError),
	/// The refresh endpoint responded with a body that could not be parsed.
	///
	/// The bundled HTTP adapter treats unrecognized 2xx bodies as ambient rotation; custom
	/// [`AuthServer`](crate::refresh::AuthServer)s with a strict contract report them here.
	#[error("Refresh endpoint returned malformed JSON.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// The refreshed credential could not be persisted.
	#[error("Refreshed credential could not be stored.")]
	Storage(#[from] crate::store::StoreError),
}
