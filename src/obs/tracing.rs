// self
use crate::{_prelude::*, obs::RefreshPath};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRefresh<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRefresh<F> = F;

/// A span builder used around refresh activity.
#[derive(Clone, Debug)]
pub struct RefreshSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RefreshSpan {
	/// Creates a new span tagged with the provided path + stage.
	pub fn new(path: RefreshPath, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::info_span!("oauth2_token_cache.refresh", path = path.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (path, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRefresh<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

pub(crate) fn attempt_failed(path: RefreshPath, attempt: u32, max_attempts: u32, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		path = path.as_str(),
		attempt,
		max_attempts,
		endpoint = failed_endpoint(err),
		error = %err,
		"Credential exchange attempt failed."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (path, attempt, max_attempts, err);
}

pub(crate) fn best_effort_failed(consecutive: u64, escalate_after: u64, err: &Error) {
	#[cfg(feature = "tracing")]
	{
		if consecutive >= escalate_after {
			tracing::error!(
				consecutive,
				endpoint = failed_endpoint(err),
				error = %err,
				"Background credential refresh keeps failing."
			);
		} else {
			tracing::warn!(
				consecutive,
				endpoint = failed_endpoint(err),
				error = %err,
				"Background credential refresh failed."
			);
		}
	}
	#[cfg(not(feature = "tracing"))]
	let _ = (consecutive, escalate_after, err);
}

pub(crate) fn discovery_fell_through(issuer: &str, err: &Error) {
	#[cfg(feature = "tracing")]
	tracing::warn!(
		issuer,
		error = %err,
		"Discovery failed; falling back to the composed token endpoint."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (issuer, err);
}

pub(crate) fn endpoint_resolved(url: &Url, via: &'static str) {
	#[cfg(feature = "tracing")]
	tracing::info!(token_url = %url, via, "Token endpoint resolved.");
	#[cfg(not(feature = "tracing"))]
	let _ = (url, via);
}

pub(crate) fn joined_concurrent_refresh(waited: std::time::Duration) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		waited_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
		"Reused a concurrently refreshed credential."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = waited;
}

pub(crate) fn credential_installed(expires_at: OffsetDateTime, token_type: Option<&str>) {
	#[cfg(feature = "tracing")]
	tracing::debug!(
		%expires_at,
		token_type = token_type.unwrap_or("unspecified"),
		"Installed refreshed credential."
	);
	#[cfg(not(feature = "tracing"))]
	let _ = (expires_at, token_type);
}

#[cfg(feature = "tracing")]
fn failed_endpoint(err: &Error) -> &'static str {
	err.endpoint().map_or("none", |endpoint| endpoint.as_str())
}
