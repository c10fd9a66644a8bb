//! Process-wide credential coordinator: cached bearer tokens, single-flight refreshes, and a
//! best-effort background path.
//!
//! The coordinator keeps at most one [`CachedCredential`] and replaces it atomically after
//! every successful exchange. Two refresh paths share one exchange primitive:
//!
//! - The blocking path (driven by [`Coordinator::access_token`] and [`Coordinator::warm_up`])
//!   retries up to `max_attempts` times with linear backoff and fails with
//!   [`Error::CredentialUnavailable`] when every attempt is exhausted. Callers that lose the
//!   race for the refresh lock poll the cache until their wait deadline instead of sending a
//!   second exchange.
//! - The best-effort path ([`Coordinator::refresh_if_needed`]) runs a single attempt only if
//!   the lock is free, never returns an error, and leaves the cache untouched on failure.
//!
//! An expired credential is never returned; a failed refresh never replaces a valid one.

mod metrics;

pub use metrics::RefreshMetrics;

// std
use std::time::Duration as StdDuration;
// crates.io
use async_lock::MutexGuard;
use tokio::{
	task::JoinHandle,
	time::{self as tokio_time, Instant, MissedTickBehavior},
};
// self
use crate::{
	_prelude::*,
	config::CoordinatorConfig,
	credential::{CachedCredential, CredentialStatus, TokenSecret},
	endpoint::{EndpointResolver, ResolvedEndpoint},
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	obs::{self, RefreshOutcome, RefreshPath, RefreshSpan},
	requester::CredentialRequester,
	secret::{ResolvedIdentity, SecretResolver},
};
#[cfg(feature = "reqwest")]
use crate::{
	http::ReqwestHttpClient, oauth::ReqwestTransportErrorMapper, secret::PlainSecretResolver,
};

/// Interval at which callers re-check the cache while another caller refreshes.
pub const WAIT_STEP: StdDuration = StdDuration::from_millis(25);
/// Consecutive best-effort failures after which the failure log escalates to `error`.
pub const BEST_EFFORT_ESCALATE_AFTER: u64 = 3;

#[cfg(feature = "reqwest")]
/// Coordinator specialized for the crate's default reqwest transport stack.
pub type ReqwestCoordinator = Coordinator<ReqwestHttpClient, ReqwestTransportErrorMapper>;

/// Snapshot of the cache as seen by [`Coordinator::state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
	/// No credential has been installed yet.
	Empty,
	/// A credential is installed and may be presented.
	Valid,
	/// A credential is installed but reached its expiry; the next caller refreshes.
	Stale,
}

/// Owns the cached credential and serializes every exchange behind one refresh lock.
///
/// Share a coordinator across tasks with `Arc<Coordinator<_, _>>`; it is `Send + Sync` and
/// every method takes `&self` (except [`Coordinator::spawn_refresh_loop`], which needs an
/// owned `Arc` to outlive the caller).
pub struct Coordinator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Settings read once at construction.
	pub config: CoordinatorConfig,
	/// Resolver applied to secret-bearing settings before each exchange.
	pub secret_resolver: Arc<dyn SecretResolver>,
	/// Shared counters for exchange outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	endpoint: EndpointResolver<C, M>,
	requester: CredentialRequester<C, M>,
	current: RwLock<Option<Arc<CachedCredential>>>,
	refresh_lock: AsyncMutex<()>,
}
impl<C, M> Coordinator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Creates a coordinator that reuses the caller-provided transport + mapper pair.
	///
	/// Only numeric settings are validated here; missing endpoint or credential settings
	/// surface as [`Error::Config`] causes on the first refresh.
	pub fn with_http_client(
		config: CoordinatorConfig,
		secret_resolver: Arc<dyn SecretResolver>,
		http_client: impl Into<Arc<C>>,
		mapper: impl Into<Arc<M>>,
	) -> Result<Self> {
		config.validate()?;

		let http_client = http_client.into();
		let transport_mapper = mapper.into();

		Ok(Self {
			endpoint: EndpointResolver::new(
				&config,
				Arc::clone(&http_client),
				Arc::clone(&transport_mapper),
			),
			requester: CredentialRequester::new(http_client, transport_mapper),
			config,
			secret_resolver,
			refresh_metrics: Default::default(),
			current: RwLock::new(None),
			refresh_lock: AsyncMutex::new(()),
		})
	}

	/// Returns a bearer token valid at the time of return, refreshing when needed.
	///
	/// Fails with [`Error::CredentialUnavailable`] when the retry budget is exhausted, a
	/// configuration problem prevents the exchange, or a concurrent refresh did not produce a
	/// credential before the wait deadline.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		Ok(self.credential().await?.token.clone())
	}

	/// Same as [`Coordinator::access_token`] but returns the whole cached credential.
	pub async fn credential(&self) -> Result<Arc<CachedCredential>> {
		if let Some(current) = self.valid_credential(OffsetDateTime::now_utc()) {
			return Ok(current);
		}

		self.refresh_blocking().await
	}

	/// Fetches the first credential eagerly, typically during service startup, so the first
	/// real request does not pay for endpoint resolution and the exchange.
	pub async fn warm_up(&self) -> Result<Arc<CachedCredential>> {
		self.credential().await
	}

	/// Opportunistically refreshes a credential that is missing or close to expiry.
	///
	/// Performs at most one exchange, skips entirely when another caller holds the refresh
	/// lock, and never fails: errors are logged and counted, and the cache keeps its
	/// previous value.
	pub async fn refresh_if_needed(&self) {
		const PATH: RefreshPath = RefreshPath::BestEffort;

		let span = RefreshSpan::new(PATH, "refresh_if_needed");

		span.instrument(async move {
			if !self.needs_refresh_at(OffsetDateTime::now_utc()) {
				obs::record_refresh_outcome(PATH, RefreshOutcome::Skipped);

				return;
			}

			let Some(guard) = self.refresh_lock.try_lock() else {
				obs::record_refresh_outcome(PATH, RefreshOutcome::Skipped);

				return;
			};

			self.best_effort_exchange(guard).await;
		})
		.await
	}

	/// Spawns a Tokio task that calls [`Coordinator::refresh_if_needed`] every `period`.
	///
	/// The first tick fires immediately. Missed ticks are delayed rather than bursted, so a
	/// slow exchange never queues a backlog of refreshes. Abort the returned handle to stop
	/// the loop.
	pub fn spawn_refresh_loop(self: Arc<Self>, period: StdDuration) -> JoinHandle<()> {
		tokio::spawn(async move {
			let mut ticker = tokio_time::interval(period);

			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

			loop {
				ticker.tick().await;

				self.refresh_if_needed().await;
			}
		})
	}

	/// Returns the installed credential, valid or not, without refreshing.
	pub fn cached(&self) -> Option<Arc<CachedCredential>> {
		self.current.read().clone()
	}

	/// Describes the cache at the current instant.
	pub fn state(&self) -> CoordinatorState {
		match self.cached().map(|current| current.status_at(OffsetDateTime::now_utc())) {
			None => CoordinatorState::Empty,
			Some(CredentialStatus::Valid) => CoordinatorState::Valid,
			Some(CredentialStatus::Expired) => CoordinatorState::Stale,
		}
	}

	/// Returns the token endpoint once it has been resolved.
	pub fn resolved_endpoint(&self) -> Option<Arc<ResolvedEndpoint>> {
		self.endpoint.resolved()
	}

	fn valid_credential(&self, now: OffsetDateTime) -> Option<Arc<CachedCredential>> {
		self.current.read().as_ref().filter(|current| current.is_valid_at(now)).cloned()
	}

	fn needs_refresh_at(&self, now: OffsetDateTime) -> bool {
		match self.current.read().as_ref() {
			Some(current) => current.needs_refresh_at(now, self.config.skew()),
			None => true,
		}
	}

	async fn refresh_blocking(&self) -> Result<Arc<CachedCredential>> {
		let span = RefreshSpan::new(RefreshPath::Blocking, "refresh_blocking");

		span.instrument(async move {
			match self.refresh_lock.try_lock() {
				Some(guard) => self.retry_exchange(guard).await,
				None => self.await_concurrent_refresh().await,
			}
		})
		.await
	}

	async fn best_effort_exchange(&self, _guard: MutexGuard<'_, ()>) {
		const PATH: RefreshPath = RefreshPath::BestEffort;

		// A blocking refresh may have finished between the first check and the lock.
		if !self.needs_refresh_at(OffsetDateTime::now_utc()) {
			obs::record_refresh_outcome(PATH, RefreshOutcome::Skipped);

			return;
		}

		obs::record_refresh_outcome(PATH, RefreshOutcome::Attempt);

		match self.exchange_once().await {
			Ok(_) => obs::record_refresh_outcome(PATH, RefreshOutcome::Success),
			Err(err) => {
				let consecutive = self.refresh_metrics.record_best_effort_failure();

				obs::record_refresh_outcome(PATH, RefreshOutcome::Failure);
				obs::best_effort_failed(consecutive, BEST_EFFORT_ESCALATE_AFTER, &err);
			},
		}
	}

	async fn retry_exchange(&self, _guard: MutexGuard<'_, ()>) -> Result<Arc<CachedCredential>> {
		const PATH: RefreshPath = RefreshPath::Blocking;

		let max_attempts = self.config.max_attempts;
		let mut last_error = None;

		for attempt in 1..=max_attempts {
			// Another caller may have installed a credential while this one slept or queued.
			if let Some(current) = self.valid_credential(OffsetDateTime::now_utc()) {
				obs::record_refresh_outcome(PATH, RefreshOutcome::Skipped);

				return Ok(current);
			}

			obs::record_refresh_outcome(PATH, RefreshOutcome::Attempt);

			match self.exchange_once().await {
				Ok(installed) => {
					obs::record_refresh_outcome(PATH, RefreshOutcome::Success);

					return Ok(installed);
				},
				Err(err) => {
					obs::record_refresh_outcome(PATH, RefreshOutcome::Failure);
					obs::attempt_failed(PATH, attempt, max_attempts, &err);

					if !err.is_retryable() {
						return Err(Error::unavailable_after(
							"configuration prevents credential refresh",
							err,
						));
					}

					last_error = Some(err);

					if attempt < max_attempts {
						let delay = self
							.config
							.backoff_unit()
							.checked_mul(attempt)
							.unwrap_or(StdDuration::MAX);

						tokio_time::sleep(delay).await;
					}
				},
			}
		}

		let reason = format!("credential refresh failed after {max_attempts} attempts");

		Err(match last_error {
			Some(err) => Error::unavailable_after(reason, err),
			None => Error::unavailable(reason),
		})
	}

	async fn await_concurrent_refresh(&self) -> Result<Arc<CachedCredential>> {
		let started = Instant::now();
		let deadline = started.checked_add(self.config.poll_interval()).unwrap_or(started);

		loop {
			if let Some(current) = self.valid_credential(OffsetDateTime::now_utc()) {
				obs::joined_concurrent_refresh(started.elapsed());

				return Ok(current);
			}

			let now = Instant::now();

			if now >= deadline {
				return Err(Error::unavailable("timed out waiting for a concurrent refresh"));
			}

			tokio_time::sleep(WAIT_STEP.min(deadline - now)).await;
		}
	}

	/// Resolves the endpoint and secrets, exchanges once, and installs the result.
	///
	/// Callers must hold the refresh lock.
	async fn exchange_once(&self) -> Result<Arc<CachedCredential>> {
		self.refresh_metrics.record_attempt();

		let result: Result<(Arc<CachedCredential>, Option<String>)> = async {
			let endpoint = self.endpoint.resolve().await?;
			let identity = ResolvedIdentity::resolve(&self.config, self.secret_resolver.as_ref())?;
			let grant = self.requester.exchange(&endpoint.token_url, &identity).await?;

			let credential = CachedCredential::issue(
				grant.access_token,
				OffsetDateTime::now_utc(),
				grant.lifetime_secs,
				self.config.skew(),
			);

			Ok((Arc::new(credential), grant.token_type))
		}
		.await;

		match result {
			Ok((credential, token_type)) => {
				*self.current.write() = Some(Arc::clone(&credential));

				self.refresh_metrics.record_success();
				obs::credential_installed(credential.expires_at, token_type.as_deref());

				Ok(credential)
			},
			Err(err) => {
				self.refresh_metrics.record_failure();

				Err(err)
			},
		}
	}
}
#[cfg(feature = "reqwest")]
impl Coordinator<ReqwestHttpClient, ReqwestTransportErrorMapper> {
	/// Creates a coordinator with its own reqwest transport and plain-text secrets.
	pub fn new(config: CoordinatorConfig) -> Result<Self> {
		Self::with_secret_resolver(config, Arc::new(PlainSecretResolver))
	}

	/// Creates a reqwest-backed coordinator that unwraps secrets through `secret_resolver`.
	pub fn with_secret_resolver(
		config: CoordinatorConfig,
		secret_resolver: Arc<dyn SecretResolver>,
	) -> Result<Self> {
		Self::with_http_client(
			config,
			secret_resolver,
			ReqwestHttpClient::default(),
			Arc::new(ReqwestTransportErrorMapper),
		)
	}
}
impl<C, M> Debug for Coordinator<C, M>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("config", &self.config)
			.field("endpoint", &self.endpoint)
			.field("current", &self.cached())
			.field("refresh_metrics", &self.refresh_metrics)
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// self
	use super::*;
	use crate::{_preludet::build_reqwest_test_coordinator, error::ConfigError};

	fn config() -> CoordinatorConfig {
		CoordinatorConfig::new("https://idp.example.com", "acme").with_client_id("svc")
	}

	#[test]
	fn construction_rejects_invalid_numbers() {
		let err = ReqwestCoordinator::new(config().with_max_attempts(0))
			.expect_err("Zero attempts should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidValue { field: "max_attempts", .. })));
	}

	#[test]
	fn fresh_coordinator_is_empty() {
		let coordinator = build_reqwest_test_coordinator(config());

		assert_eq!(coordinator.state(), CoordinatorState::Empty);
		assert!(coordinator.cached().is_none());
		assert!(coordinator.resolved_endpoint().is_none());
		assert!(coordinator.needs_refresh_at(OffsetDateTime::now_utc()));
	}

	#[test]
	fn state_tracks_installed_credential() {
		let coordinator = build_reqwest_test_coordinator(config());
		let now = OffsetDateTime::now_utc();

		*coordinator.current.write() =
			Some(Arc::new(CachedCredential::issue("live", now, 300, coordinator.config.skew())));

		assert_eq!(coordinator.state(), CoordinatorState::Valid);
		assert!(!coordinator.needs_refresh_at(now));

		*coordinator.current.write() = Some(Arc::new(CachedCredential::issue(
			"old",
			now - Duration::minutes(10),
			60,
			coordinator.config.skew(),
		)));

		assert_eq!(coordinator.state(), CoordinatorState::Stale);
		assert!(coordinator.valid_credential(now).is_none());
	}

	#[tokio::test]
	async fn best_effort_rechecks_after_taking_the_lock() {
		let coordinator = build_reqwest_test_coordinator(config());

		assert!(coordinator.needs_refresh_at(OffsetDateTime::now_utc()));

		let guard =
			coordinator.refresh_lock.try_lock().expect("Refresh lock should be free initially.");

		// A blocking refresh lands between the first check and the lock.
		*coordinator.current.write() = Some(Arc::new(CachedCredential::issue(
			"fresh",
			OffsetDateTime::now_utc(),
			300,
			coordinator.config.skew(),
		)));
		coordinator.best_effort_exchange(guard).await;

		assert_eq!(coordinator.refresh_metrics.attempts(), 0);
		assert_eq!(
			coordinator.cached().expect("Credential should stay installed.").token.expose(),
			"fresh"
		);
	}

	#[test]
	fn construction_rejects_oversized_numbers() {
		for config in [
			config().with_skew_secs(i64::MAX / 2),
			config().with_poll_millis(u64::MAX),
			config().with_backoff_millis(u64::MAX),
		] {
			let err = ReqwestCoordinator::new(config)
				.expect_err("Out-of-range settings should be rejected.");

			assert!(matches!(err, Error::Config(ConfigError::InvalidValue { .. })));
		}
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let coordinator =
			build_reqwest_test_coordinator(config().with_client_secret("shh").with_resource_owner(
				"robot", "hunter2",
			));

		*coordinator.current.write() = Some(Arc::new(CachedCredential::issue(
			"bearer-value",
			OffsetDateTime::now_utc(),
			300,
			Duration::ZERO,
		)));

		let rendered = format!("{coordinator:?}");

		assert!(!rendered.contains("shh"));
		assert!(!rendered.contains("hunter2"));
		assert!(!rendered.contains("bearer-value"));
	}
}
