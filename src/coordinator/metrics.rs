// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for credential exchanges.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	consecutive_best_effort_failures: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the total number of exchange attempts across both refresh paths.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of exchanges that installed a credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of failed exchanges.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns how many best-effort refreshes failed since the last successful exchange.
	pub fn consecutive_best_effort_failures(&self) -> u64 {
		self.consecutive_best_effort_failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
		self.consecutive_best_effort_failures.store(0, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	/// Bumps the best-effort failure streak and returns its new length.
	pub(crate) fn record_best_effort_failure(&self) -> u64 {
		self.consecutive_best_effort_failures.fetch_add(1, Ordering::Relaxed) + 1
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn success_resets_the_best_effort_streak() {
		let metrics = RefreshMetrics::default();

		metrics.record_attempt();
		metrics.record_failure();

		assert_eq!(metrics.record_best_effort_failure(), 1);
		assert_eq!(metrics.record_best_effort_failure(), 2);

		metrics.record_attempt();
		metrics.record_success();

		assert_eq!(metrics.attempts(), 2);
		assert_eq!(metrics.successes(), 1);
		assert_eq!(metrics.failures(), 1);
		assert_eq!(metrics.consecutive_best_effort_failures(), 0);
	}
}
