//! Token endpoint resolution: discovery document first, static composition as fallback.
//!
//! The first successfully resolved endpoint is cached for the lifetime of the resolver.
//! Concurrent first callers may both compute a candidate, but only one is installed and
//! every caller returns the installed value.

// std
use std::sync::OnceLock;
// crates.io
use oauth2::http::{Method, Request, header::ACCEPT};
// self
use crate::{
	_prelude::*,
	config::CoordinatorConfig,
	error::{ConfigError, RequestError},
	http::TokenHttpClient,
	oauth::{self, DiscoveryDocument, EndpointKind, TransportErrorMapper},
	obs::{self, RefreshOutcome, RefreshPath, RefreshSpan},
};

/// Path appended to the issuer when fetching the discovery document.
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

/// How a [`ResolvedEndpoint`] was obtained.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSource {
	/// Read from the issuer's discovery document.
	Discovery,
	/// Composed from the base URL and realm.
	Composed,
}

/// Token endpoint credential requests are sent to; immutable once resolved.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEndpoint {
	/// Address of the token endpoint.
	pub token_url: Url,
	/// Resolution strategy that produced the address.
	pub source: EndpointSource,
}

/// Resolves and caches the token endpoint.
pub struct EndpointResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	http_client: Arc<C>,
	transport_mapper: Arc<M>,
	base_url: Option<String>,
	realm: Option<String>,
	issuer_url: Option<String>,
	resolved: OnceLock<Arc<ResolvedEndpoint>>,
}
impl<C, M> EndpointResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a resolver reading the endpoint settings of `config`.
	pub fn new(
		config: &CoordinatorConfig,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			transport_mapper: mapper.into(),
			base_url: config.base_url.clone(),
			realm: config.realm.clone(),
			issuer_url: config.issuer_url.clone(),
			resolved: OnceLock::new(),
		}
	}

	/// Returns the cached endpoint without resolving.
	pub fn resolved(&self) -> Option<Arc<ResolvedEndpoint>> {
		self.resolved.get().cloned()
	}

	/// Resolves the token endpoint, reusing the cached value after the first success.
	pub async fn resolve(&self) -> Result<Arc<ResolvedEndpoint>> {
		if let Some(resolved) = self.resolved.get() {
			return Ok(resolved.clone());
		}

		let candidate = RefreshSpan::new(RefreshPath::Discovery, "resolve_endpoint")
			.instrument(self.compute())
			.await?;

		Ok(self.resolved.get_or_init(|| Arc::new(candidate)).clone())
	}

	async fn compute(&self) -> Result<ResolvedEndpoint> {
		if let Some(issuer) = non_blank(self.issuer_url.as_deref()) {
			obs::record_refresh_outcome(RefreshPath::Discovery, RefreshOutcome::Attempt);

			match self.discover(issuer).await {
				Ok(token_url) => {
					obs::record_refresh_outcome(RefreshPath::Discovery, RefreshOutcome::Success);
					obs::endpoint_resolved(&token_url, "discovery");

					return Ok(ResolvedEndpoint { token_url, source: EndpointSource::Discovery });
				},
				Err(err) => {
					obs::record_refresh_outcome(RefreshPath::Discovery, RefreshOutcome::Failure);
					obs::discovery_fell_through(issuer, &err);
				},
			}
		}

		let token_url = compose_token_url(self.base_url.as_deref(), self.realm.as_deref())?;

		obs::endpoint_resolved(&token_url, "composed");

		Ok(ResolvedEndpoint { token_url, source: EndpointSource::Composed })
	}

	async fn discover(&self, issuer: &str) -> Result<Url> {
		let document_url = discovery_url(issuer)?;
		let request = Request::builder()
			.method(Method::GET)
			.uri(document_url.as_str())
			.header(ACCEPT, "application/json")
			.body(Vec::new())
			.map_err(ConfigError::from)?;
		let body = oauth::dispatch(
			self.http_client.as_ref(),
			self.transport_mapper.as_ref(),
			EndpointKind::Discovery,
			request,
		)
		.await?;
		let document: DiscoveryDocument = oauth::parse_json(EndpointKind::Discovery, &body)?;
		let token_endpoint = non_blank(document.token_endpoint.as_deref()).ok_or(
			RequestError::MissingField {
				endpoint: EndpointKind::Discovery,
				field: "token_endpoint",
			},
		)?;

		Url::parse(token_endpoint)
			.map_err(|source| ConfigError::InvalidUrl { field: "token_endpoint", source }.into())
	}
}
impl<C, M> Debug for EndpointResolver<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("EndpointResolver")
			.field("base_url", &self.base_url)
			.field("realm", &self.realm)
			.field("issuer_url", &self.issuer_url)
			.field("resolved", &self.resolved.get())
			.finish()
	}
}

/// Builds `{issuer}/.well-known/openid-configuration`, tolerating a trailing slash.
pub fn discovery_url(issuer: &str) -> Result<Url, ConfigError> {
	let normalized = issuer.trim().trim_end_matches('/');

	Url::parse(&format!("{normalized}{DISCOVERY_PATH}"))
		.map_err(|source| ConfigError::InvalidUrl { field: "issuer_url", source })
}

/// Builds `{base}/realms/{realm}/protocol/openid-connect/token`.
///
/// The realm is percent-decoded first and then pushed as a single path segment, so a value
/// that arrives already encoded is encoded exactly once in the final URL.
pub fn compose_token_url(base_url: Option<&str>, realm: Option<&str>) -> Result<Url, ConfigError> {
	let base = non_blank(base_url).ok_or(ConfigError::MissingBaseUrl)?;
	let realm = non_blank(realm).ok_or(ConfigError::MissingRealm)?;
	let realm = urlencoding::decode(realm).map_err(|source| ConfigError::InvalidRealm { source })?;
	let mut url =
		Url::parse(base).map_err(|source| ConfigError::InvalidUrl { field: "base_url", source })?;

	url.path_segments_mut()
		.map_err(|_| ConfigError::CannotBeABase { field: "base_url" })?
		.pop_if_empty()
		.push("realms")
		.push(&realm)
		.extend(["protocol", "openid-connect", "token"]);

	Ok(url)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
	value.map(str::trim).filter(|v| !v.is_empty())
}
