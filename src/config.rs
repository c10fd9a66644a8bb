//! Coordinator configuration surface with serde defaults and builder-style setters.
//!
//! Values are read once at construction. Secret-bearing fields may hold encrypted
//! envelopes; they are handed to a [`SecretResolver`](crate::secret::SecretResolver)
//! right before each credential exchange, never at load time. Missing endpoint or
//! credential settings are reported at first use, while numeric settings are checked by
//! [`CoordinatorConfig::validate`] when the coordinator is built.

// self
use crate::{_prelude::*, error::ConfigError};

/// Externally supplied, read-only settings for the credential coordinator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
	/// Downstream identity provider base URL (e.g. `https://idp.example.com`).
	pub base_url: Option<String>,
	/// Realm or tenant identifier, possibly percent-encoded.
	pub realm: Option<String>,
	/// OAuth 2.0 client identifier.
	pub client_id: Option<String>,
	/// OAuth 2.0 client secret, possibly wrapped in an encrypted envelope.
	pub client_secret: Option<String>,
	/// Resource-owner username, possibly wrapped in an encrypted envelope.
	pub username: Option<String>,
	/// Resource-owner password, possibly wrapped in an encrypted envelope.
	pub password: Option<String>,
	/// Optional issuer URL used to fetch the discovery document.
	pub issuer_url: Option<String>,
	/// Safety margin subtracted from every advertised token lifetime.
	pub skew_secs: i64,
	/// Deadline for waiting on another caller's refresh; also the default refresh loop period.
	pub poll_millis: u64,
	/// Upper bound on credential exchange attempts per blocking refresh.
	pub max_attempts: u32,
	/// Linear backoff unit; attempt `n` sleeps `n * backoff` after failing.
	pub backoff_millis: u64,
}
impl CoordinatorConfig {
	/// Default skew in seconds.
	pub const DEFAULT_SKEW_SECS: i64 = 30;
	/// Default wait deadline in milliseconds.
	pub const DEFAULT_POLL_MILLIS: u64 = 5_000;
	/// Default maximum number of exchange attempts.
	pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
	/// Default backoff unit in milliseconds.
	pub const DEFAULT_BACKOFF_MILLIS: u64 = 200;
	/// Largest accepted skew: one day.
	pub const MAX_SKEW_SECS: i64 = 86_400;
	/// Largest accepted wait deadline: one hour.
	pub const MAX_POLL_MILLIS: u64 = 3_600_000;
	/// Largest accepted number of exchange attempts.
	pub const MAX_ATTEMPTS: u32 = 100;
	/// Largest accepted backoff unit: ten minutes.
	pub const MAX_BACKOFF_MILLIS: u64 = 600_000;

	/// Creates a configuration targeting the provided base URL and realm.
	pub fn new(base_url: impl Into<String>, realm: impl Into<String>) -> Self {
		Self { base_url: Some(base_url.into()), realm: Some(realm.into()), ..Default::default() }
	}

	/// Sets the client identifier.
	pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
		self.client_id = Some(client_id.into());

		self
	}

	/// Sets the client secret.
	pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());

		self
	}

	/// Sets the resource-owner username and password.
	pub fn with_resource_owner(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.username = Some(username.into());
		self.password = Some(password.into());

		self
	}

	/// Enables discovery against the provided issuer URL.
	pub fn with_issuer_url(mut self, issuer: impl Into<String>) -> Self {
		self.issuer_url = Some(issuer.into());

		self
	}

	/// Overrides the skew in seconds.
	pub fn with_skew_secs(mut self, secs: i64) -> Self {
		self.skew_secs = secs;

		self
	}

	/// Overrides the wait deadline in milliseconds.
	pub fn with_poll_millis(mut self, millis: u64) -> Self {
		self.poll_millis = millis;

		self
	}

	/// Overrides the maximum number of exchange attempts.
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts;

		self
	}

	/// Overrides the backoff unit in milliseconds.
	pub fn with_backoff_millis(mut self, millis: u64) -> Self {
		self.backoff_millis = millis;

		self
	}

	/// Safety skew as a signed duration, clamped to `0..=MAX_SKEW_SECS`.
	pub fn skew(&self) -> Duration {
		Duration::seconds(self.skew_secs.clamp(0, Self::MAX_SKEW_SECS))
	}

	/// Deadline for waiting on a concurrent refresh, clamped to [`Self::MAX_POLL_MILLIS`].
	pub fn poll_interval(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.poll_millis.min(Self::MAX_POLL_MILLIS))
	}

	/// Linear backoff unit, clamped to [`Self::MAX_BACKOFF_MILLIS`].
	pub fn backoff_unit(&self) -> std::time::Duration {
		std::time::Duration::from_millis(self.backoff_millis.min(Self::MAX_BACKOFF_MILLIS))
	}

	/// Checks numeric invariants; endpoint and credential presence is checked at first use.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_attempts == 0 {
			return Err(ConfigError::InvalidValue {
				field: "max_attempts",
				reason: "at least one attempt is required",
			});
		}
		if self.max_attempts > Self::MAX_ATTEMPTS {
			return Err(ConfigError::InvalidValue {
				field: "max_attempts",
				reason: "at most 100 attempts are allowed",
			});
		}
		if self.skew_secs < 0 {
			return Err(ConfigError::InvalidValue {
				field: "skew_secs",
				reason: "skew cannot be negative",
			});
		}
		if self.skew_secs > Self::MAX_SKEW_SECS {
			return Err(ConfigError::InvalidValue {
				field: "skew_secs",
				reason: "skew cannot exceed one day",
			});
		}
		if self.poll_millis == 0 {
			return Err(ConfigError::InvalidValue {
				field: "poll_millis",
				reason: "wait deadline must be positive",
			});
		}
		if self.poll_millis > Self::MAX_POLL_MILLIS {
			return Err(ConfigError::InvalidValue {
				field: "poll_millis",
				reason: "wait deadline cannot exceed one hour",
			});
		}
		if self.backoff_millis > Self::MAX_BACKOFF_MILLIS {
			return Err(ConfigError::InvalidValue {
				field: "backoff_millis",
				reason: "backoff unit cannot exceed ten minutes",
			});
		}

		Ok(())
	}
}
impl Default for CoordinatorConfig {
	fn default() -> Self {
		Self {
			base_url: None,
			realm: None,
			client_id: None,
			client_secret: None,
			username: None,
			password: None,
			issuer_url: None,
			skew_secs: Self::DEFAULT_SKEW_SECS,
			poll_millis: Self::DEFAULT_POLL_MILLIS,
			max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
			backoff_millis: Self::DEFAULT_BACKOFF_MILLIS,
		}
	}
}
impl Debug for CoordinatorConfig {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CoordinatorConfig")
			.field("base_url", &self.base_url)
			.field("realm", &self.realm)
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("username", &self.username.as_ref().map(|_| "<redacted>"))
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("issuer_url", &self.issuer_url)
			.field("skew_secs", &self.skew_secs)
			.field("poll_millis", &self.poll_millis)
			.field("max_attempts", &self.max_attempts)
			.field("backoff_millis", &self.backoff_millis)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn deserializes_with_defaults() {
		let config: CoordinatorConfig = serde_json::from_str(
			r#"{"base_url":"https://idp.example.com","realm":"acme","client_id":"svc"}"#,
		)
		.expect("Partial configuration should deserialize.");

		assert_eq!(config.base_url.as_deref(), Some("https://idp.example.com"));
		assert_eq!(config.skew_secs, CoordinatorConfig::DEFAULT_SKEW_SECS);
		assert_eq!(config.poll_millis, CoordinatorConfig::DEFAULT_POLL_MILLIS);
		assert_eq!(config.max_attempts, CoordinatorConfig::DEFAULT_MAX_ATTEMPTS);
		assert_eq!(config.backoff_millis, CoordinatorConfig::DEFAULT_BACKOFF_MILLIS);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn validate_rejects_out_of_range_values() {
		let base = CoordinatorConfig::new("https://idp.example.com", "acme");

		assert!(matches!(
			base.clone().with_max_attempts(0).validate(),
			Err(ConfigError::InvalidValue { field: "max_attempts", .. })
		));
		assert!(matches!(
			base.clone().with_skew_secs(-1).validate(),
			Err(ConfigError::InvalidValue { field: "skew_secs", .. })
		));
		assert!(matches!(
			base.clone().with_poll_millis(0).validate(),
			Err(ConfigError::InvalidValue { field: "poll_millis", .. })
		));

		let too_large = [
			(base.clone().with_max_attempts(CoordinatorConfig::MAX_ATTEMPTS + 1), "max_attempts"),
			(base.clone().with_skew_secs(i64::MAX / 2), "skew_secs"),
			(base.clone().with_skew_secs(CoordinatorConfig::MAX_SKEW_SECS + 1), "skew_secs"),
			(base.clone().with_poll_millis(u64::MAX), "poll_millis"),
			(base.clone().with_backoff_millis(u64::MAX), "backoff_millis"),
		];

		for (config, expected) in too_large {
			match config.validate() {
				Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
				other => panic!("Expected `{expected}` to be rejected, got {other:?}."),
			}
		}

		assert!(
			base.with_max_attempts(CoordinatorConfig::MAX_ATTEMPTS)
				.with_skew_secs(CoordinatorConfig::MAX_SKEW_SECS)
				.with_poll_millis(CoordinatorConfig::MAX_POLL_MILLIS)
				.with_backoff_millis(CoordinatorConfig::MAX_BACKOFF_MILLIS)
				.validate()
				.is_ok()
		);
	}

	#[test]
	fn debug_redacts_secrets() {
		let config = CoordinatorConfig::new("https://idp.example.com", "acme")
			.with_client_secret("client-secret-value")
			.with_resource_owner("svc-user", "svc-password");
		let rendered = format!("{config:?}");

		assert!(!rendered.contains("client-secret-value"));
		assert!(!rendered.contains("svc-user"));
		assert!(!rendered.contains("svc-password"));
		assert!(rendered.contains("<redacted>"));
	}

	#[test]
	fn durations_follow_settings() {
		let config = CoordinatorConfig::default()
			.with_skew_secs(45)
			.with_poll_millis(250)
			.with_backoff_millis(10);

		assert_eq!(config.skew(), Duration::seconds(45));
		assert_eq!(config.poll_interval(), std::time::Duration::from_millis(250));
		assert_eq!(config.backoff_unit(), std::time::Duration::from_millis(10));

		let unchecked = CoordinatorConfig {
			skew_secs: i64::MAX,
			poll_millis: u64::MAX,
			backoff_millis: u64::MAX,
			..Default::default()
		};

		assert_eq!(unchecked.skew(), Duration::seconds(CoordinatorConfig::MAX_SKEW_SECS));
		assert_eq!(
			unchecked.poll_interval(),
			std::time::Duration::from_millis(CoordinatorConfig::MAX_POLL_MILLIS)
		);
		assert_eq!(
			unchecked.backoff_unit(),
			std::time::Duration::from_millis(CoordinatorConfig::MAX_BACKOFF_MILLIS)
		);
	}
}
