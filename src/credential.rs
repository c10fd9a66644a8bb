//! Cached bearer credential model and the redacted secret wrapper it carries.

// self
use crate::_prelude::*;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps a new secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl From<String> for TokenSecret {
	fn from(value: String) -> Self {
		Self(value)
	}
}
impl From<&str> for TokenSecret {
	fn from(value: &str) -> Self {
		Self(value.to_owned())
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Longest lifetime honored for an issued token; larger `expires_in` values are capped.
pub const MAX_LIFETIME_SECS: i64 = 365 * 24 * 60 * 60;

/// Lifecycle status of a [`CachedCredential`] at a given instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialStatus {
	/// Credential may be presented.
	Valid,
	/// Credential reached its skew-adjusted expiry and must not be presented.
	Expired,
}

/// Bearer credential installed by a successful refresh.
///
/// Instances are immutable; each refresh installs a brand-new value so readers holding an
/// older `Arc` never observe a half-written token/expiry pair.
#[derive(Clone, Serialize, Deserialize)]
pub struct CachedCredential {
	/// Opaque bearer value.
	pub token: TokenSecret,
	/// Instant the identity provider issued the token (local clock).
	pub issued_at: OffsetDateTime,
	/// Skew-adjusted instant after which the token must not be used.
	pub expires_at: OffsetDateTime,
}
impl CachedCredential {
	/// Builds a credential whose expiry is `issued_at + max(1, lifetime - skew)` seconds.
	///
	/// `lifetime_secs` is capped at [`MAX_LIFETIME_SECS`] and the expiry saturates at the
	/// largest representable instant, so server-provided values never overflow.
	pub fn issue(
		token: impl Into<TokenSecret>,
		issued_at: OffsetDateTime,
		lifetime_secs: i64,
		skew: Duration,
	) -> Self {
		let effective =
			lifetime_secs.min(MAX_LIFETIME_SECS).saturating_sub(skew.whole_seconds()).max(1);

		Self {
			token: token.into(),
			issued_at,
			expires_at: issued_at.saturating_add(Duration::seconds(effective)),
		}
	}

	/// Computes the lifecycle status at a given instant.
	pub fn status_at(&self, instant: OffsetDateTime) -> CredentialStatus {
		if instant < self.expires_at { CredentialStatus::Valid } else { CredentialStatus::Expired }
	}

	/// Returns `true` if the credential may be presented at `instant`.
	pub fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), CredentialStatus::Valid)
	}

	/// Returns `true` if the credential may be presented right now.
	pub fn is_valid(&self) -> bool {
		self.is_valid_at(OffsetDateTime::now_utc())
	}

	/// Returns `true` once `instant` is past `expires_at - skew`.
	///
	/// A skew reaching past the representable range counts as "refresh now" when positive and
	/// "never" when negative.
	pub fn needs_refresh_at(&self, instant: OffsetDateTime, skew: Duration) -> bool {
		match self.expires_at.checked_sub(skew) {
			Some(edge) => instant > edge,
			None => skew.is_positive(),
		}
	}
}
impl Debug for CachedCredential {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CachedCredential")
			.field("token", &"<redacted>")
			.field("issued_at", &self.issued_at)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}
