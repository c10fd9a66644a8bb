//! Resource-owner password credential exchange against the resolved token endpoint.

// crates.io
use oauth2::http::{
	Method, Request,
	header::{ACCEPT, CONTENT_TYPE},
};
use url::form_urlencoded::Serializer;
// self
use crate::{
	_prelude::*,
	credential::TokenSecret,
	error::{ConfigError, RequestError},
	http::TokenHttpClient,
	oauth::{self, EndpointKind, TokenResponse, TransportErrorMapper},
	secret::ResolvedIdentity,
};

/// Grant type sent with every exchange.
pub const GRANT_TYPE: &str = "password";

/// Bearer token and advertised lifetime returned by a successful exchange.
#[derive(Clone, Debug)]
pub struct TokenGrant {
	/// Issued bearer token.
	pub access_token: TokenSecret,
	/// Advertised lifetime in seconds; `0` when the provider omitted `expires_in`.
	pub lifetime_secs: i64,
	/// Token type reported by the provider.
	pub token_type: Option<String>,
}

/// Performs form-encoded credential exchanges.
pub struct CredentialRequester<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
}
impl<C, M> CredentialRequester<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a requester sharing the provided transport + mapper pair.
	pub fn new(http_client: impl Into<Arc<C>>, mapper: impl Into<Arc<M>>) -> Self {
		Self { http_client: http_client.into(), transport_mapper: mapper.into() }
	}

	/// Exchanges `identity` for a bearer token at `token_url`.
	pub async fn exchange(&self, token_url: &Url, identity: &ResolvedIdentity) -> Result<TokenGrant> {
		let request = Request::builder()
			.method(Method::POST)
			.uri(token_url.as_str())
			.header(CONTENT_TYPE, "application/x-www-form-urlencoded")
			.header(ACCEPT, "application/json")
			.body(password_grant_form(identity).into_bytes())
			.map_err(ConfigError::from)?;
		let body = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			EndpointKind::Token,
			request,
		)
		.await?;
		let response: TokenResponse = oauth::parse_json(EndpointKind::Token, &body)?;
		let access_token = response
			.access_token
			.filter(|token| !token.trim().is_empty())
			.ok_or(RequestError::MissingField { endpoint: EndpointKind::Token, field: "access_token" })?;

		Ok(TokenGrant {
			access_token: TokenSecret::new(access_token),
			lifetime_secs: response.expires_in.unwrap_or_default(),
			token_type: response.token_type,
		})
	}
}
impl<C, M> Debug for CredentialRequester<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CredentialRequester(..)")
	}
}

/// Encodes the password grant body, omitting every blank identity field.
pub fn password_grant_form(identity: &ResolvedIdentity) -> String {
	let mut form = Serializer::new(String::new());

	form.append_pair("grant_type", GRANT_TYPE);

	for (key, value) in [
		("client_id", &identity.client_id),
		("client_secret", &identity.client_secret),
		("username", &identity.username),
		("password", &identity.password),
	] {
		if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
			form.append_pair(key, value);
		}
	}

	form.finish()
}
