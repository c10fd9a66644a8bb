//! Optional observability helpers for refresh activity.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit spans named `oauth2_token_cache.refresh` with the `path` and
//!   `stage` fields, plus warn/error events for failed attempts and discovery fall-through.
//! - Enable `metrics` to increment the `oauth2_token_cache_refresh_total` counter for every
//!   attempt/success/failure/skip, labeled by `path` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Code paths that talk to the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshPath {
	/// Foreground refresh that retries and fails loudly.
	Blocking,
	/// Opportunistic single-attempt refresh that never fails.
	BestEffort,
	/// Discovery document lookup during endpoint resolution.
	Discovery,
}
impl RefreshPath {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshPath::Blocking => "blocking",
			RefreshPath::BestEffort => "best_effort",
			RefreshPath::Discovery => "discovery",
		}
	}
}
impl Display for RefreshPath {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RefreshOutcome {
	/// One exchange (or discovery fetch) was started.
	Attempt,
	/// The attempt produced a usable result.
	Success,
	/// The attempt failed.
	Failure,
	/// No work was needed, or another caller already held the refresh lock.
	Skipped,
}
impl RefreshOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RefreshOutcome::Attempt => "attempt",
			RefreshOutcome::Success => "success",
			RefreshOutcome::Failure => "failure",
			RefreshOutcome::Skipped => "skipped",
		}
	}
}
impl Display for RefreshOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
