//! Sliding-window bookkeeping behind [`RateLimiter`](super::RateLimiter).

// crates.io
use tokio::time::Instant;
// self
use crate::{_prelude::*, rate_limit::Quota};

/// Admission timestamps for one quota, oldest first.
///
/// Never holds more than `max_requests` entries younger than `interval`; older entries are
/// pruned lazily before each check.
#[derive(Clone, Debug)]
pub struct SlidingWindow {
	quota: Quota,
	admitted: VecDeque<Instant>,
}
impl SlidingWindow {
	/// Creates an empty window for `quota`.
	pub fn new(quota: Quota) -> Self {
		Self { quota, admitted: VecDeque::with_capacity(quota.max_requests) }
	}

	/// Drops timestamps that left the window at `now`.
	pub fn prune(&mut self, now: Instant) {
		while let Some(oldest) = self.admitted.front() {
			if now.saturating_duration_since(*oldest) >= self.quota.interval {
				self.admitted.pop_front();
			} else {
				break;
			}
		}
	}

	/// Time until one more admission fits, or zero when it fits now.
	pub fn wait_time(&mut self, now: Instant) -> StdDuration {
		self.prune(now);

		if self.admitted.len() < self.quota.max_requests {
			return StdDuration::ZERO;
		}

		self.admitted
			.front()
			.map(|oldest| (*oldest + self.quota.interval).saturating_duration_since(now))
			.unwrap_or(StdDuration::ZERO)
	}

	/// Records an admission at `now`.
	pub fn record(&mut self, now: Instant) {
		self.admitted.push_back(now);
	}

	/// Entries currently tracked (including ones not yet pruned).
	pub fn len(&self) -> usize {
		self.admitted.len()
	}

	/// Returns `true` when no admissions are tracked.
	pub fn is_empty(&self) -> bool {
		self.admitted.is_empty()
	}
}

/// Combined admission state: every quota window plus the minimum spacing rule.
#[derive(Clone, Debug)]
pub(crate) struct AdmissionState {
	windows: Vec<SlidingWindow>,
	min_delay: StdDuration,
	last_admission: Option<Instant>,
}
impl AdmissionState {
	pub(crate) fn new(quotas: &[Quota], min_delay: StdDuration) -> Self {
		Self {
			windows: quotas.iter().copied().map(SlidingWindow::new).collect(),
			min_delay,
			last_admission: None,
		}
	}

	/// Longest wait demanded by any window or by the spacing rule.
	pub(crate) fn next_delay(&mut self, now: Instant) -> StdDuration {
		let spacing = self
			.last_admission
			.map(|last| (last + self.min_delay).saturating_duration_since(now))
			.unwrap_or(StdDuration::ZERO);

		self.windows.iter_mut().map(|window| window.wait_time(now)).fold(spacing, StdDuration::max)
	}

	pub(crate) fn admit(&mut self, now: Instant) {
		for window in &mut self.windows {
			window.record(now);
		}

		self.last_admission = Some(now);
	}
}
