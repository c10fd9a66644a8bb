//! Wire structures, request dispatch, and transport error mapping for identity provider calls.

pub use oauth2;

// crates.io
use oauth2::{AsyncHttpClient, HttpClientError, HttpRequest};
use serde::de::DeserializeOwned;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, RequestError},
	http::{ResponseMetadata, ResponseMetadataSlot, TokenHttpClient},
};

const BODY_PREVIEW_LIMIT: usize = 256;

/// Identity provider endpoints contacted by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndpointKind {
	/// `GET {issuer}/.well-known/openid-configuration`.
	Discovery,
	/// `POST {token_url}` credential exchange.
	Token,
}
impl EndpointKind {
	/// Returns a stable label suitable for messages, spans, and metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EndpointKind::Discovery => "discovery",
			EndpointKind::Token => "token",
		}
	}
}
impl Display for EndpointKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Subset of the OpenID Connect discovery document the resolver reads.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DiscoveryDocument {
	/// Token endpoint used for credential exchanges.
	#[serde(default)]
	pub token_endpoint: Option<String>,
}

/// Successful token endpoint payload.
#[derive(Clone, Default, Deserialize)]
pub struct TokenResponse {
	/// Issued bearer token.
	#[serde(default)]
	pub access_token: Option<String>,
	/// Advertised lifetime in seconds.
	#[serde(default)]
	pub expires_in: Option<i64>,
	/// Token type, usually `Bearer`.
	#[serde(default)]
	pub token_type: Option<String>,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Maps HTTP transport failures into crate [`Error`] values.
pub trait TransportErrorMapper<E>
where
	Self: 'static + Send + Sync,
	E: 'static + Send + Sync + StdError,
{
	/// Converts an [`HttpClientError`] emitted by the transport into a crate error.
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error;
}

/// Transport-agnostic mapper that classifies every client failure as a retryable
/// [`RequestError`], except request construction problems.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultTransportErrorMapper;
impl<E> TransportErrorMapper<E> for DefaultTransportErrorMapper
where
	E: 'static + Send + Sync + StdError,
{
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<E>,
	) -> Error {
		let _ = metadata;

		map_common_transport_error(endpoint, error)
	}
}

/// Default mapper for reqwest-backed transports.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ReqwestTransportErrorMapper;
#[cfg(feature = "reqwest")]
impl TransportErrorMapper<ReqwestError> for ReqwestTransportErrorMapper {
	fn map_transport_error(
		&self,
		endpoint: EndpointKind,
		metadata: Option<&ResponseMetadata>,
		error: HttpClientError<ReqwestError>,
	) -> Error {
		match error {
			HttpClientError::Reqwest(inner) => map_reqwest_error(endpoint, metadata, *inner),
			other => map_common_transport_error(endpoint, other),
		}
	}
}

/// Sends `request`, rejects non-2xx statuses and blank bodies, and returns the raw payload.
pub(crate) async fn dispatch<C, M>(
	http_client: &C,
	mapper: &M,
	endpoint: EndpointKind,
	request: HttpRequest,
) -> Result<Vec<u8>>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	let slot = ResponseMetadataSlot::default();
	let handle = http_client.with_metadata(slot.clone());
	let response = handle
		.call(request)
		.await
		.map_err(|err| mapper.map_transport_error(endpoint, slot.take().as_ref(), err))?;
	let meta = slot.take();
	let status = response.status();
	let body = response.into_body();

	if !status.is_success() {
		return Err(RequestError::Status {
			endpoint,
			status: status.as_u16(),
			retry_after: meta.and_then(|value| value.retry_after),
			body_preview: body_preview(&body),
		}
		.into());
	}
	if body.iter().all(u8::is_ascii_whitespace) {
		return Err(RequestError::EmptyBody { endpoint }.into());
	}

	Ok(body)
}

/// Decodes a JSON payload, keeping the failing path for diagnostics.
pub(crate) fn parse_json<T>(endpoint: EndpointKind, body: &[u8]) -> Result<T>
where
	T: DeserializeOwned,
{
	let mut deserializer = serde_json::Deserializer::from_slice(body);

	serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|source| RequestError::Parse { endpoint, source }.into())
}

fn map_common_transport_error<E>(endpoint: EndpointKind, error: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match error {
		HttpClientError::Reqwest(inner) => RequestError::network(endpoint, *inner).into(),
		HttpClientError::Http(inner) => ConfigError::from(inner).into(),
		HttpClientError::Io(source) => RequestError::Io { endpoint, source }.into(),
		HttpClientError::Other(message) => RequestError::Other { endpoint, message }.into(),
		_ => RequestError::Other { endpoint, message: "unrecognized transport failure".into() }
			.into(),
	}
}

#[cfg(feature = "reqwest")]
fn map_reqwest_error(
	endpoint: EndpointKind,
	metadata: Option<&ResponseMetadata>,
	error: ReqwestError,
) -> Error {
	if error.is_builder() {
		return ConfigError::from(error).into();
	}

	let status =
		metadata.and_then(|value| value.status).or_else(|| error.status().map(|s| s.as_u16()));

	if let Some(status) = status.filter(|code| !(200..300).contains(code)) {
		return RequestError::Status {
			endpoint,
			status,
			retry_after: metadata.and_then(|value| value.retry_after),
			body_preview: None,
		}
		.into();
	}

	RequestError::network(endpoint, error).into()
}

fn body_preview(body: &[u8]) -> Option<String> {
	let text = String::from_utf8_lossy(body);
	let text = text.trim();

	if text.is_empty() {
		return None;
	}
	if text.chars().count() <= BODY_PREVIEW_LIMIT {
		return Some(text.to_owned());
	}

	let mut buf = text.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	Some(buf)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn token_response_tolerates_missing_fields() {
		let parsed: TokenResponse = parse_json(EndpointKind::Token, br#"{"token_type":"Bearer"}"#)
			.expect("Partial token response should parse.");

		assert_eq!(parsed.access_token, None);
		assert_eq!(parsed.expires_in, None);
		assert_eq!(parsed.token_type.as_deref(), Some("Bearer"));
	}

	#[test]
	fn parse_failures_report_the_path() {
		let err = parse_json::<TokenResponse>(EndpointKind::Token, br#"{"expires_in":"soon"}"#)
			.expect_err("String lifetimes should be rejected.");

		match err {
			Error::Request(RequestError::Parse { endpoint, source }) => {
				assert_eq!(endpoint, EndpointKind::Token);
				assert_eq!(source.path().to_string(), "expires_in");
			},
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		let long = "x".repeat(BODY_PREVIEW_LIMIT + 10);
		let preview = body_preview(long.as_bytes()).expect("Preview should exist.");

		assert_eq!(preview.chars().count(), BODY_PREVIEW_LIMIT + 1);
		assert!(preview.ends_with('…'));
		assert_eq!(body_preview(b"  \n"), None);
	}

	#[test]
	fn token_response_debug_redacts_access_token() {
		let response = TokenResponse {
			access_token: Some("very-secret".into()),
			expires_in: Some(60),
			token_type: None,
		};

		assert!(!format!("{response:?}").contains("very-secret"));
	}
}
