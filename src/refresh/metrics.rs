// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for refresh cycles.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	abandoned: AtomicU64,
	released: AtomicU64,
	terminations: AtomicU64,
}
impl RefreshMetrics {
	/// Returns the number of refresh calls started (one per cycle).
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh cycles that succeeded.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh cycles that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of cycles whose leader went away before finishing.
	pub fn abandoned(&self) -> u64 {
		self.abandoned.load(Ordering::Relaxed)
	}

	/// Returns the number of waiters that received an outcome.
	pub fn waiters_released(&self) -> u64 {
		self.released.load(Ordering::Relaxed)
	}

	/// Returns the number of session terminations triggered by failed cycles.
	pub fn terminations(&self) -> u64 {
		self.terminations.load(Ordering::Relaxed)
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_abandoned(&self) {
		self.abandoned.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_released(&self, count: usize) {
		self.released.fetch_add(count as u64, Ordering::Relaxed);
		crate::obs::record_waiters_released(count);
	}

	pub(crate) fn record_termination(&self) {
		self.terminations.fetch_add(1, Ordering::Relaxed);
	}
}
