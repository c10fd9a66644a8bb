//! Process-wide OAuth 2.0 bearer credential cache: single-flight refreshes, bounded retries,
//! skew-aware expiry, and discovery-or-static token endpoint resolution in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod coordinator;
pub mod credential;
pub mod endpoint;
pub mod error;
pub mod ext;
pub mod http;
pub mod oauth;
pub mod obs;
pub mod requester;
pub mod secret;
#[cfg(feature = "reqwest")]
#[doc(hidden)]
pub mod _preludet {
	//! Convenience re-exports and helpers for unit and integration tests.

	pub use crate::_prelude::*;

	// self
	use crate::{
		config::CoordinatorConfig, coordinator::Coordinator, http::ReqwestHttpClient,
		oauth::ReqwestTransportErrorMapper, secret::PlainSecretResolver,
	};

	/// Coordinator type alias used by reqwest-backed integration tests.
	pub type ReqwestTestCoordinator = Coordinator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

	/// Builds a reqwest HTTP client that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_http_client() -> ReqwestHttpClient {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestHttpClient::with_client(client)
	}

	/// Constructs a [`Coordinator`] backed by the plain secret resolver and the reqwest
	/// transport used across integration tests.
	pub fn build_reqwest_test_coordinator(config: CoordinatorConfig) -> ReqwestTestCoordinator {
		Coordinator::with_http_client(
			config,
			Arc::new(PlainSecretResolver),
			test_reqwest_http_client(),
			Arc::new(ReqwestTransportErrorMapper),
		)
		.expect("Test coordinator configuration should be valid.")
	}
}

mod _prelude {
	pub use std::{
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
