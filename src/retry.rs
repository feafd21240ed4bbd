//! Classification-aware retry with capped exponential backoff.
//!
//! Only failures reporting [`Error::is_retryable`] (transport and transient upstream errors)
//! are retried. Credential and token failures are returned on the first occurrence; quota
//! exhaustion never reaches this layer as an error.

// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Bounded retry schedule for network-level failures.
#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
	/// Total attempts, including the first one.
	pub max_attempts: u32,
	/// Delay before the first retry; doubled for every further retry.
	pub base_delay: StdDuration,
	/// Upper bound for a single delay, Retry-After hints included.
	pub max_delay: StdDuration,
	/// Fraction of the computed delay applied as random jitter in both directions.
	pub jitter: f64,
}
impl RetryPolicy {
	/// Policy that runs the operation exactly once.
	pub fn no_retry() -> Self {
		Self { max_attempts: 1, ..Default::default() }
	}

	/// Overrides the attempt count; zero is treated as one.
	pub fn with_max_attempts(mut self, attempts: u32) -> Self {
		self.max_attempts = attempts.max(1);

		self
	}

	/// Overrides the base delay.
	pub fn with_base_delay(mut self, delay: StdDuration) -> Self {
		self.base_delay = delay;

		self
	}

	/// Overrides the delay cap.
	pub fn with_max_delay(mut self, delay: StdDuration) -> Self {
		self.max_delay = delay;

		self
	}

	/// Overrides the jitter fraction, clamped to `0.0..=1.0`.
	pub fn with_jitter(mut self, jitter: f64) -> Self {
		self.jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };

		self
	}

	/// Delay before retry number `retry` (1-based), honoring an upstream hint when present.
	pub fn delay_for(&self, retry: u32, hint: Option<StdDuration>) -> StdDuration {
		if let Some(hint) = hint {
			return hint.min(self.max_delay);
		}

		let exponent = retry.saturating_sub(1).min(16);
		let base = self.base_delay.saturating_mul(1 << exponent).min(self.max_delay);

		if self.jitter <= 0.0 || base.is_zero() {
			return base;
		}

		let spread = base.as_secs_f64() * self.jitter;
		let offset = rand::rng().random_range(-spread..=spread);

		StdDuration::from_secs_f64((base.as_secs_f64() + offset).max(0.0)).min(self.max_delay)
	}

	/// Runs `operation` until it succeeds, fails with a non-retryable error, or the attempt
	/// budget is spent; the last error is returned in the latter two cases.
	pub async fn run<F, Fut, T>(&self, mut operation: F) -> Result<T>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T>>,
	{
		let max_attempts = self.max_attempts.max(1);
		let mut attempt = 1;

		loop {
			match operation().await {
				Ok(value) => return Ok(value),
				Err(e) if e.is_retryable() && attempt < max_attempts => {
					let delay = self.delay_for(attempt, retry_hint(&e));

					tracing::warn!(
						attempt,
						max_attempts,
						delay_ms = delay.as_millis() as u64,
						error = %e,
						"Retrying after a retryable failure."
					);
					tokio::time::sleep(delay).await;

					attempt += 1;
				},
				Err(e) => return Err(e),
			}
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: StdDuration::from_millis(200),
			max_delay: StdDuration::from_secs(5),
			jitter: 0.1,
		}
	}
}

fn retry_hint(error: &Error) -> Option<StdDuration> {
	match error {
		Error::Transient(transient) => transient.retry_after(),
		_ => None,
	}
}
