//! Request signing contracts that let downstream crates attach cached bearer tokens to
//! arbitrary HTTP clients.

// self
use crate::{
	_prelude::*,
	coordinator::Coordinator,
	credential::TokenSecret,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
};

/// Describes how to attach a [`TokenSecret`] to an outbound request without constraining
/// the HTTP client type.
pub trait RequestSignerExt<Request, Error>
where
	Self: Send + Sync,
{
	/// Consumes the provided request and injects the bearer token.
	fn attach_token(&self, request: Request, token: &TokenSecret) -> Result<Request, Error>;
}

/// Signer that sets `Authorization: Bearer <token>` on reqwest builders.
#[cfg(feature = "reqwest")]
#[derive(Clone, Copy, Debug, Default)]
pub struct BearerSigner;
#[cfg(feature = "reqwest")]
impl RequestSignerExt<reqwest::RequestBuilder, Error> for BearerSigner {
	fn attach_token(
		&self,
		request: reqwest::RequestBuilder,
		token: &TokenSecret,
	) -> Result<reqwest::RequestBuilder> {
		Ok(request.bearer_auth(token.expose()))
	}
}

impl<C, M> Coordinator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Fetches a valid token (refreshing when needed) and hands it to `signer`.
	pub async fn sign_with<S, Request>(&self, signer: &S, request: Request) -> Result<Request>
	where
		S: ?Sized + RequestSignerExt<Request, Error>,
	{
		let token = self.access_token().await?;

		signer.attach_token(request, &token)
	}

	/// Stamps a reqwest builder with the current bearer token.
	#[cfg(feature = "reqwest")]
	pub async fn authorize(
		&self,
		request: reqwest::RequestBuilder,
	) -> Result<reqwest::RequestBuilder> {
		self.sign_with(&BearerSigner, request).await
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use reqwest::header::AUTHORIZATION;
	// self
	use super::*;

	#[test]
	fn bearer_signer_sets_authorization_header() {
		let client = ReqwestClient::new();
		let signed = BearerSigner
			.attach_token(client.get("https://api.example.com/v1/items"), &TokenSecret::new("abc"))
			.expect("Signing should succeed.")
			.build()
			.expect("Signed request should build.");

		assert_eq!(
			signed.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
			Some("Bearer abc")
		);
	}
}
