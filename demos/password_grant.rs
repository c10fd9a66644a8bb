//! Demonstrates discovery-backed endpoint resolution, a password-grant exchange, and cached
//! token reuse with the default reqwest transport.

// std
use std::{sync::Arc, time::Duration};
// crates.io
use color_eyre::Result;
use httpmock::prelude::*;
// self
use oauth2_token_cache::{
	config::CoordinatorConfig,
	coordinator::{Coordinator, ReqwestCoordinator},
	http::ReqwestHttpClient,
	oauth::ReqwestTransportErrorMapper,
	reqwest::Client,
	secret::PlainSecretResolver,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let server = MockServer::start_async().await;
	let discovery_mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/realms/demo/.well-known/openid-configuration");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"issuer\":\"{}\",\"token_endpoint\":\"{}\"}}",
				server.url("/realms/demo"),
				server.url("/realms/demo/token"),
			));
		})
		.await;
	let token_mock = server
		.mock_async(|when, then| {
			when.method(POST).path("/realms/demo/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"demo-access\",\"token_type\":\"Bearer\",\"expires_in\":900}",
			);
		})
		.await;
	let config = CoordinatorConfig::new(server.base_url(), "demo")
		.with_issuer_url(server.url("/realms/demo"))
		.with_client_id("demo-client")
		.with_resource_owner("service-router", "router-password");
	let coordinator: Arc<ReqwestCoordinator> = Arc::new(Coordinator::with_http_client(
		config,
		Arc::new(PlainSecretResolver),
		ReqwestHttpClient::with_client(Client::builder().timeout(Duration::from_secs(10)).build()?),
		Arc::new(ReqwestTransportErrorMapper),
	)?);

	coordinator.warm_up().await?;

	let refresher = Arc::clone(&coordinator).spawn_refresh_loop(Duration::from_secs(5));
	let token = coordinator.access_token().await?;
	let endpoint = coordinator.resolved_endpoint();

	println!("Reusable access token: {}.", token.expose());
	println!("Token endpoint: {endpoint:?}.");
	println!("Coordinator state: {:?}.", coordinator.state());

	refresher.abort();
	discovery_mock.assert_async().await;
	token_mock.assert_async().await;

	Ok(())
}
