//! Secret resolution seam for configuration values that may be stored encrypted.

// self
use crate::{_prelude::*, config::CoordinatorConfig, error::ConfigError};

/// Failure raised by a [`SecretResolver`].
#[derive(Debug, ThisError)]
pub enum SecretError {
	/// Value looks like an envelope but is not well formed.
	#[error("Encrypted envelope is malformed.")]
	MalformedEnvelope,
	/// Decryption collaborator rejected the envelope.
	#[error("Encrypted envelope could not be decrypted: {message}.")]
	Decrypt {
		/// Collaborator-supplied reason.
		message: String,
	},
}

/// Turns a possibly-encrypted configuration string into plaintext.
///
/// The coordinator calls the resolver right before each credential exchange, so
/// implementations may rotate or re-read key material between calls.
pub trait SecretResolver
where
	Self: Send + Sync,
{
	/// Returns the plaintext for `value`.
	fn resolve(&self, value: &str) -> Result<String, SecretError>;
}

/// Identity resolver for deployments that keep secrets in plaintext.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainSecretResolver;
impl SecretResolver for PlainSecretResolver {
	fn resolve(&self, value: &str) -> Result<String, SecretError> {
		Ok(value.to_owned())
	}
}

/// Resolver that unwraps `ENC(...)` envelopes through a caller-supplied decrypt function.
///
/// Values without the envelope prefix pass through untouched.
pub struct EnvelopeSecretResolver<F> {
	decrypt: F,
}
impl<F> EnvelopeSecretResolver<F>
where
	F: Fn(&str) -> Result<String, SecretError> + Send + Sync,
{
	const PREFIX: &'static str = "ENC(";
	const SUFFIX: char = ')';

	/// Wraps the provided decrypt function.
	pub fn new(decrypt: F) -> Self {
		Self { decrypt }
	}
}
impl<F> SecretResolver for EnvelopeSecretResolver<F>
where
	F: Fn(&str) -> Result<String, SecretError> + Send + Sync,
{
	fn resolve(&self, value: &str) -> Result<String, SecretError> {
		let trimmed = value.trim();
		let Some(rest) = trimmed.strip_prefix(Self::PREFIX) else {
			return Ok(value.to_owned());
		};
		let cipher = rest.strip_suffix(Self::SUFFIX).ok_or(SecretError::MalformedEnvelope)?;

		if cipher.is_empty() {
			return Err(SecretError::MalformedEnvelope);
		}

		(self.decrypt)(cipher)
	}
}
impl<F> Debug for EnvelopeSecretResolver<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("EnvelopeSecretResolver(..)")
	}
}

/// Plaintext identity presented to the token endpoint; blank values are dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ResolvedIdentity {
	/// Client identifier, if non-blank.
	pub client_id: Option<String>,
	/// Client secret, if non-blank.
	pub client_secret: Option<String>,
	/// Resource-owner username, if non-blank.
	pub username: Option<String>,
	/// Resource-owner password, if non-blank.
	pub password: Option<String>,
}
impl ResolvedIdentity {
	/// Resolves every credential field of `config` through `resolver`.
	pub fn resolve(
		config: &CoordinatorConfig,
		resolver: &dyn SecretResolver,
	) -> Result<Self, ConfigError> {
		let identity = Self {
			client_id: resolve_field("client_id", config.client_id.as_deref(), resolver)?,
			client_secret: resolve_field(
				"client_secret",
				config.client_secret.as_deref(),
				resolver,
			)?,
			username: resolve_field("username", config.username.as_deref(), resolver)?,
			password: resolve_field("password", config.password.as_deref(), resolver)?,
		};

		if identity.client_id.is_none() && identity.username.is_none() {
			return Err(ConfigError::MissingCredentials);
		}

		Ok(identity)
	}
}
impl Debug for ResolvedIdentity {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ResolvedIdentity")
			.field("client_id", &self.client_id)
			.field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
			.field("username", &self.username.as_ref().map(|_| "<redacted>"))
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.finish()
	}
}

fn resolve_field(
	field: &'static str,
	value: Option<&str>,
	resolver: &dyn SecretResolver,
) -> Result<Option<String>, ConfigError> {
	let Some(raw) = value.filter(|v| !v.trim().is_empty()) else {
		return Ok(None);
	};
	let plain =
		resolver.resolve(raw).map_err(|source| ConfigError::SecretResolution { field, source })?;

	Ok(if plain.trim().is_empty() { None } else { Some(plain) })
}
