// self
use crate::obs::{RefreshOutcome, RefreshPath};

/// Records a refresh outcome via the global metrics recorder (when enabled).
pub fn record_refresh_outcome(path: RefreshPath, outcome: RefreshOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"oauth2_token_cache_refresh_total",
			"path" => path.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (path, outcome);
	}
}
