//! Error taxonomy shared by the coordinator, endpoint resolver, and credential requester.

// self
use crate::{_prelude::*, oauth::EndpointKind};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem; never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport or protocol failure while talking to the identity provider.
	#[error(transparent)]
	Request(#[from] RequestError),

	/// No valid credential could be obtained right now.
	#[error("Credential is unavailable: {reason}.")]
	CredentialUnavailable {
		/// Human-readable summary of why the credential is missing.
		reason: String,
		/// Last failure observed by the refresh loop, if any.
		#[source]
		source: Option<Box<Error>>,
	},
}
impl Error {
	/// Builds a [`Error::CredentialUnavailable`] without an underlying cause.
	pub fn unavailable(reason: impl Into<String>) -> Self {
		Self::CredentialUnavailable { reason: reason.into(), source: None }
	}

	/// Builds a [`Error::CredentialUnavailable`] wrapping the last observed failure.
	pub fn unavailable_after(reason: impl Into<String>, last: Error) -> Self {
		Self::CredentialUnavailable { reason: reason.into(), source: Some(Box::new(last)) }
	}

	/// Returns `true` when callers should report "cannot authenticate right now" instead of a
	/// downstream business failure.
	pub fn is_unavailable(&self) -> bool {
		matches!(self, Self::CredentialUnavailable { .. })
	}

	/// Returns `true` for failures that a later attempt may resolve.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::Request(_))
	}

	/// Endpoint a request failure targeted, looking through a wrapped last failure.
	pub fn endpoint(&self) -> Option<EndpointKind> {
		match self {
			Self::Request(err) => Some(err.endpoint()),
			Self::CredentialUnavailable { source: Some(last), .. } => last.endpoint(),
			_ => None,
		}
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Neither discovery nor static composition can run without a base URL.
	#[error("Downstream base URL is not configured.")]
	MissingBaseUrl,
	/// Static composition requires a realm identifier.
	#[error("Realm identifier is not configured.")]
	MissingRealm,
	/// Neither a client identifier nor a resource-owner username is available.
	#[error("No client identifier or resource-owner username is configured.")]
	MissingCredentials,
	/// A configured URL cannot be parsed.
	#[error("Configured {field} is not a valid URL.")]
	InvalidUrl {
		/// Configuration field holding the URL.
		field: &'static str,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured URL cannot carry path segments (e.g. `mailto:`).
	#[error("Configured {field} cannot be used as a base URL.")]
	CannotBeABase {
		/// Configuration field holding the URL.
		field: &'static str,
	},
	/// Realm identifier is not valid percent-encoded UTF-8.
	#[error("Realm identifier is not valid percent-encoded UTF-8.")]
	InvalidRealm {
		/// Underlying decoding failure.
		#[source]
		source: std::string::FromUtf8Error,
	},
	/// A numeric or structural setting is out of range.
	#[error("Configured {field} is invalid: {reason}.")]
	InvalidValue {
		/// Configuration field that failed validation.
		field: &'static str,
		/// Validation failure summary.
		reason: &'static str,
	},
	/// The secret resolver could not produce a plaintext value.
	#[error("Secret for {field} could not be resolved.")]
	SecretResolution {
		/// Configuration field holding the secret.
		field: &'static str,
		/// Resolver failure.
		#[source]
		source: crate::secret::SecretError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
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

/// Transport or non-2xx failures talking to the identity provider (safe to retry).
#[derive(Debug, ThisError)]
pub enum RequestError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the {endpoint} endpoint.")]
	Network {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the {endpoint} endpoint.")]
	Io {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Endpoint answered with a non-2xx status.
	#[error("The {endpoint} endpoint returned HTTP {status}.")]
	Status {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// HTTP status code.
		status: u16,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
		/// Truncated response body for diagnostics.
		body_preview: Option<String>,
	},
	/// Endpoint answered 2xx with no payload.
	#[error("The {endpoint} endpoint returned an empty body.")]
	EmptyBody {
		/// Endpoint being called.
		endpoint: EndpointKind,
	},
	/// Endpoint payload is not the expected JSON document.
	#[error("The {endpoint} endpoint returned malformed JSON.")]
	Parse {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Endpoint payload lacks a required value.
	#[error("The {endpoint} endpoint response is missing `{field}`.")]
	MissingField {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Missing JSON field.
		field: &'static str,
	},
	/// Any other transport failure.
	#[error("HTTP client error occurred while calling the {endpoint} endpoint: {message}.")]
	Other {
		/// Endpoint being called.
		endpoint: EndpointKind,
		/// Transport-supplied description.
		message: String,
	},
}
impl RequestError {
	/// Wraps a transport-specific network error.
	pub fn network(
		endpoint: EndpointKind,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { endpoint, source: Box::new(src) }
	}

	/// Endpoint the failing request targeted.
	pub fn endpoint(&self) -> EndpointKind {
		match self {
			Self::Network { endpoint, .. }
			| Self::Io { endpoint, .. }
			| Self::Status { endpoint, .. }
			| Self::EmptyBody { endpoint }
			| Self::Parse { endpoint, .. }
			| Self::MissingField { endpoint, .. }
			| Self::Other { endpoint, .. } => *endpoint,
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;

	#[test]
	fn unavailable_exposes_last_failure_as_source() {
		let last: Error = RequestError::Status {
			endpoint: EndpointKind::Token,
			status: 503,
			retry_after: None,
			body_preview: None,
		}
		.into();
		let err = Error::unavailable_after("retries exhausted", last);

		assert!(err.is_unavailable());
		assert!(!err.is_retryable());
		assert_eq!(err.to_string(), "Credential is unavailable: retries exhausted.");

		let source = StdError::source(&err)
			.expect("Unavailable error should expose the last failure as its source.");

		assert_eq!(source.to_string(), "The token endpoint returned HTTP 503.");
		assert_eq!(err.endpoint(), Some(EndpointKind::Token));
		assert_eq!(Error::unavailable("no cause").endpoint(), None);
	}

	#[test]
	fn only_request_errors_are_retryable() {
		let request: Error =
			RequestError::EmptyBody { endpoint: EndpointKind::Discovery }.into();
		let config: Error = ConfigError::MissingRealm.into();

		assert!(request.is_retryable());
		assert!(!config.is_retryable());
		assert_eq!(request.endpoint(), Some(EndpointKind::Discovery));
		assert_eq!(config.endpoint(), None);
	}
}
