#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
use reqwest::header::AUTHORIZATION;
// self
use oauth2_token_cache::{
	_preludet::*,
	config::CoordinatorConfig,
	error::{Error, RequestError},
	http::ReqwestHttpClient,
	oauth::{EndpointKind, ReqwestTransportErrorMapper},
	requester::CredentialRequester,
	secret::ResolvedIdentity,
};

const TOKEN_PATH: &str = "/realms/acme/protocol/openid-connect/token";

fn config(server: &MockServer) -> CoordinatorConfig {
	CoordinatorConfig::new(server.base_url(), "acme")
		.with_client_id("svc")
		.with_client_secret("svc-secret")
		.with_resource_owner("robot", "hunter2")
		.with_max_attempts(1)
}

fn unavailable_cause(err: Error) -> Error {
	match err {
		Error::CredentialUnavailable { source: Some(source), .. } => *source,
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn password_grant_posts_form_and_caches_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path(TOKEN_PATH)
				.header("content-type", "application/x-www-form-urlencoded")
				.body(
					"grant_type=password&client_id=svc&client_secret=svc-secret&username=robot&password=hunter2",
				);
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"issued-token\",\"token_type\":\"Bearer\",\"expires_in\":300}",
			);
		})
		.await;
	let coordinator = build_reqwest_test_coordinator(config(&server));
	let first = coordinator.access_token().await.expect("Exchange should succeed.");
	let second = coordinator.access_token().await.expect("Cached token should be reused.");

	mock.assert_calls_async(1).await;

	assert_eq!(first.expose(), "issued-token");
	assert_eq!(second, first);
}

#[tokio::test]
async fn missing_lifetime_clamps_to_one_second() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"short-lived\"}");
		})
		.await;

	let coordinator = build_reqwest_test_coordinator(config(&server));
	let credential = coordinator.warm_up().await.expect("Exchange should succeed.");

	assert_eq!(credential.expires_at - credential.issued_at, Duration::seconds(1));
}

#[tokio::test]
async fn error_status_surfaces_body_preview() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(401).body("{\"error\":\"invalid_grant\"}");
		})
		.await;
	let coordinator = build_reqwest_test_coordinator(config(&server));
	let err = coordinator.access_token().await.expect_err("401 should fail the refresh.");

	mock.assert_calls_async(1).await;

	match unavailable_cause(err) {
		Error::Request(RequestError::Status { endpoint, status, body_preview, .. }) => {
			assert_eq!(endpoint, EndpointKind::Token);
			assert_eq!(status, 401);
			assert_eq!(body_preview.as_deref(), Some("{\"error\":\"invalid_grant\"}"));
		},
		other => panic!("Unexpected error variant: {other:?}."),
	}
}

#[tokio::test]
async fn empty_and_incomplete_bodies_are_rejected() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path("/empty");
			then.status(200).body("  ");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/blank-token");
			then.status(200).body("{\"access_token\":\"\",\"expires_in\":60}");
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/garbage");
			then.status(200).body("<html>maintenance</html>");
		})
		.await;

	let requester: CredentialRequester<ReqwestHttpClient, ReqwestTransportErrorMapper> =
		CredentialRequester::new(
			Arc::new(test_reqwest_http_client()),
			Arc::new(ReqwestTransportErrorMapper),
		);
	let identity = ResolvedIdentity { client_id: Some("svc".into()), ..Default::default() };
	let url = |path: &str| Url::parse(&server.url(path)).expect("Mock URL should parse.");

	assert!(matches!(
		requester.exchange(&url("/empty"), &identity).await,
		Err(Error::Request(RequestError::EmptyBody { endpoint: EndpointKind::Token }))
	));
	assert!(matches!(
		requester.exchange(&url("/blank-token"), &identity).await,
		Err(Error::Request(RequestError::MissingField { field: "access_token", .. }))
	));
	assert!(matches!(
		requester.exchange(&url("/garbage"), &identity).await,
		Err(Error::Request(RequestError::Parse { .. }))
	));
}

#[tokio::test]
async fn authorize_stamps_bearer_header() {
	let server = MockServer::start_async().await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"access_token\":\"signed-token\",\"expires_in\":300}");
		})
		.await;

	let coordinator = build_reqwest_test_coordinator(config(&server));
	let request = coordinator
		.authorize(ReqwestClient::new().get(server.url("/api/items")))
		.await
		.expect("Signing should succeed.")
		.build()
		.expect("Signed request should build.");

	assert_eq!(
		request.headers().get(AUTHORIZATION).and_then(|value| value.to_str().ok()),
		Some("Bearer signed-token")
	);
}
