//! Coordinator-level error types shared across the token manager, client, and stores.

// self
use crate::{_prelude::*, auth::Environment};

/// Coordinator-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical coordinator error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// No app key/secret is configured for the environment.
	#[error("No app credentials are configured for the {environment} environment.")]
	MissingCredentials {
		/// Environment that lacks credentials.
		environment: Environment,
	},
	/// Token endpoint rejected the credential exchange.
	#[error("Token endpoint rejected the exchange with HTTP {status}: {message}.")]
	TokenEndpoint {
		/// HTTP status returned by the token endpoint.
		status: u16,
		/// Provider-supplied message or body preview.
		message: String,
	},
	/// A token was requested again before the issuance cooldown elapsed.
	#[error("Token issuance for {environment} is cooling down; retry in {retry_in:?}.")]
	IssueCooldown {
		/// Environment whose issuance is throttled.
		environment: Environment,
		/// Time left until the next issuance attempt is allowed.
		retry_in: StdDuration,
	},
	/// The bearer token was still rejected as expired after one renewal.
	#[error("Access token was rejected as expired: {message}.")]
	TokenExpired {
		/// Provider-supplied message.
		message: String,
	},
}
impl Error {
	/// Returns `true` when the failure is temporary and the same call may be retried.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Transient(_) | Self::Transport(_))
	}

}

/// Configuration and validation failures raised by the coordinator.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// A configured base URL cannot be parsed or joined with an endpoint path.
	#[error("Base URL `{value}` is invalid.")]
	InvalidUrl {
		/// Offending URL or path.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// App key or secret is empty.
	#[error("The {field} must not be empty.")]
	EmptyCredential {
		/// Credential field label.
		field: &'static str,
	},
	/// Environment label is not recognized.
	#[error("Unknown environment `{0}`; expected `prod` or `sandbox`.")]
	UnknownEnvironment(String),
	/// A quota or batch size was configured as zero.
	#[error("The {field} must be greater than zero.")]
	ZeroLimit {
		/// Setting label.
		field: &'static str,
	},
	/// Request parameters could not be encoded as JSON.
	#[error("Request parameters could not be encoded.")]
	EncodeParams(#[source] serde_json::Error),
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

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Upstream returned a server-side failure without a usable envelope.
	#[error("Upstream returned an unexpected response: {message}.")]
	Upstream {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<StdDuration>,
	},
	/// Response body could not be parsed as the expected JSON document.
	#[error("Upstream returned malformed JSON.")]
	ResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::error::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransientError {
	/// Retry-After hint carried by the failure, if any.
	pub fn retry_after(&self) -> Option<StdDuration> {
		match self {
			Self::Upstream { retry_after, .. } => *retry_after,
			Self::ResponseParse { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {endpoint}.")]
	Network {
		/// Endpoint path that was being called.
		endpoint: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint: endpoint.into(), source: Box::new(src) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn retry_classification_matches_taxonomy() {
		let transient: Error = TransientError::Upstream {
			message: "bad gateway".into(),
			status: Some(502),
			retry_after: None,
		}
		.into();
		let io: Error = TransportError::Io(std::io::Error::other("reset")).into();
		let expired = Error::TokenExpired { message: "EGW00123".into() };
		let missing = Error::MissingCredentials { environment: Environment::Sandbox };

		assert!(transient.is_retryable());
		assert!(io.is_retryable());
		assert!(!expired.is_retryable());
		assert!(!missing.is_retryable());
		assert!(missing.to_string().contains("sandbox"));
	}
}
