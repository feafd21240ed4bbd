//! Sliding-window admission control for outbound broker calls.
//!
//! A [`RateLimiter`] admits callers in FIFO order so that no [`Quota`] sees more than
//! `max_requests` admissions within any rolling `interval`, and consecutive admissions are at
//! least `min_delay` apart. Admission is decided by a single worker task per limiter that
//! consumes requests from a channel; the admitted caller then runs its own operation, so a slow
//! or failing operation never stalls the queue.
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use quote_broker::rate_limit::{RateLimitConfig, RateLimiter};
//!
//! # async fn demo() {
//! let limiter = RateLimiter::new(
//! 	RateLimitConfig::new(15, Duration::from_secs(1), Duration::from_millis(50))
//! 		.with_quota(900, Duration::from_secs(60)),
//! )
//! .expect("Quotas are non-zero.");
//! let value = limiter.execute(|| async { 42 }).await;
//! # let _ = value;
//! # }
//! ```

mod window;

pub use window::SlidingWindow;

// crates.io
use tokio::{
	sync::{mpsc, oneshot},
	time::{self, Instant},
};
// self
use crate::{_prelude::*, auth::Environment, error::ConfigError};
use window::AdmissionState;

type Admission = oneshot::Sender<()>;

/// `max_requests` admissions per rolling `interval`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Quota {
	/// Admissions allowed inside one window.
	pub max_requests: usize,
	/// Window length.
	pub interval: StdDuration,
}

/// Quotas and spacing enforced by one [`RateLimiter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
	/// Every quota must have room before an admission.
	pub quotas: Vec<Quota>,
	/// Minimum spacing between two consecutive admissions.
	pub min_delay: StdDuration,
}
impl RateLimitConfig {
	/// Single-quota configuration.
	pub fn new(max_requests: usize, interval: StdDuration, min_delay: StdDuration) -> Self {
		Self { quotas: vec![Quota { max_requests, interval }], min_delay }
	}

	/// Adds another quota window (e.g. a per-minute cap on top of a per-second one).
	pub fn with_quota(mut self, max_requests: usize, interval: StdDuration) -> Self {
		self.quotas.push(Quota { max_requests, interval });

		self
	}

	/// Published per-second and per-minute limits for `environment`.
	pub fn for_environment(environment: Environment) -> Self {
		match environment {
			Environment::Prod =>
				Self::new(15, StdDuration::from_secs(1), StdDuration::from_millis(50))
					.with_quota(600, StdDuration::from_secs(60)),
			Environment::Sandbox =>
				Self::new(2, StdDuration::from_secs(1), StdDuration::from_millis(100))
					.with_quota(100, StdDuration::from_secs(60)),
		}
	}

	/// Rejects zero-sized quotas and zero-length windows.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.quotas.is_empty() {
			return Err(ConfigError::ZeroLimit { field: "quota count" });
		}

		for quota in &self.quotas {
			if quota.max_requests == 0 {
				return Err(ConfigError::ZeroLimit { field: "quota max requests" });
			}
			if quota.interval.is_zero() {
				return Err(ConfigError::ZeroLimit { field: "quota interval" });
			}
		}

		Ok(())
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self::for_environment(Environment::Prod)
	}
}

/// FIFO sliding-window admission controller.
///
/// The worker task is spawned lazily on the first admission (so construction does not need a
/// runtime) and exits once the limiter is dropped.
#[derive(Debug)]
pub struct RateLimiter {
	config: RateLimitConfig,
	sender: Mutex<Option<mpsc::UnboundedSender<Admission>>>,
}
impl RateLimiter {
	/// Validates `config` and creates a limiter enforcing it.
	pub fn new(config: RateLimitConfig) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self { config, sender: Mutex::new(None) })
	}

	/// Configuration this limiter enforces.
	pub fn config(&self) -> &RateLimitConfig {
		&self.config
	}

	/// Waits until the caller is admitted.
	pub async fn acquire(&self) {
		loop {
			let (reply, admitted) = oneshot::channel();

			if self.worker().send(reply).is_err() {
				self.reset_worker();

				continue;
			}
			if admitted.await.is_ok() {
				return;
			}

			self.reset_worker();
		}
	}

	/// Waits for admission, then runs `operation` and returns its output unchanged.
	pub async fn execute<F, Fut, T>(&self, operation: F) -> T
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = T>,
	{
		self.acquire().await;

		operation().await
	}

	fn worker(&self) -> mpsc::UnboundedSender<Admission> {
		let mut sender = self.sender.lock();

		match sender.as_ref() {
			Some(tx) if !tx.is_closed() => tx.clone(),
			_ => {
				let (tx, rx) = mpsc::unbounded_channel();

				tokio::spawn(admission_loop(
					rx,
					AdmissionState::new(&self.config.quotas, self.config.min_delay),
				));
				*sender = Some(tx.clone());

				tx
			},
		}
	}

	fn reset_worker(&self) {
		*self.sender.lock() = None;
	}
}

async fn admission_loop(mut queue: mpsc::UnboundedReceiver<Admission>, mut state: AdmissionState) {
	while let Some(reply) = queue.recv().await {
		loop {
			if reply.is_closed() {
				break;
			}

			let delay = state.next_delay(Instant::now());

			if delay.is_zero() {
				state.admit(Instant::now());

				let _ = reply.send(());

				break;
			}

			tracing::trace!(delay_ms = delay.as_millis() as u64, "Delaying admission.");
			time::sleep(delay).await;
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn burst_is_spaced_and_windowed() {
		let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(
			15,
			StdDuration::from_secs(1),
			StdDuration::from_millis(50),
		))
		.expect("Burst quotas should validate."));
		let origin = Instant::now();
		let handles = (0..20)
			.map(|_| {
				let limiter = limiter.clone();

				tokio::spawn(async move { limiter.execute(|| async { Instant::now() }).await })
			})
			.collect::<Vec<_>>();
		let mut starts = Vec::with_capacity(handles.len());

		for handle in handles {
			starts.push(handle.await.expect("Admission task should not panic.") - origin);
		}

		starts.sort();

		for pair in starts.windows(2) {
			assert!(pair[1] - pair[0] >= StdDuration::from_millis(50));
		}
		for i in 0..starts.len() - 15 {
			assert!(starts[i + 15] - starts[i] >= StdDuration::from_secs(1));
		}

		assert!(starts[15] >= StdDuration::from_secs(1));
	}

	#[tokio::test(start_paused = true)]
	async fn failing_operations_do_not_stall_the_queue() {
		let limiter = RateLimiter::new(RateLimitConfig::new(
			5,
			StdDuration::from_secs(1),
			StdDuration::ZERO,
		))
		.expect("Quotas should validate.");
		let failed: std::result::Result<(), &str> = limiter.execute(|| async { Err("boom") }).await;
		let value = limiter.execute(|| async { 7 }).await;

		assert!(failed.is_err());
		assert_eq!(value, 7);
	}

	#[tokio::test(start_paused = true)]
	async fn abandoned_waiters_do_not_consume_capacity() {
		let limiter = Arc::new(RateLimiter::new(RateLimitConfig::new(
			1,
			StdDuration::from_secs(1),
			StdDuration::ZERO,
		))
		.expect("Quotas should validate."));
		let admitted = Arc::new(AtomicUsize::new(0));

		limiter.acquire().await;

		let abandoned = {
			let limiter = limiter.clone();

			tokio::spawn(async move { limiter.acquire().await })
		};

		tokio::task::yield_now().await;
		abandoned.abort();

		let start = Instant::now();
		let counter = admitted.clone();

		limiter.execute(|| async move { counter.fetch_add(1, Ordering::SeqCst) }).await;

		assert_eq!(admitted.load(Ordering::SeqCst), 1);
		assert!(start.elapsed() <= StdDuration::from_millis(1_050));
	}

	#[test]
	fn limiter_refuses_invalid_quotas() {
		let zero = RateLimitConfig::new(0, StdDuration::from_secs(1), StdDuration::ZERO);

		assert!(matches!(RateLimiter::new(zero), Err(ConfigError::ZeroLimit { .. })));
		assert!(matches!(
			RateLimiter::new(RateLimitConfig { quotas: Vec::new(), min_delay: StdDuration::ZERO }),
			Err(ConfigError::ZeroLimit { .. })
		));
	}

	#[test]
	fn validation_rejects_empty_quotas() {
		let config = RateLimitConfig { quotas: Vec::new(), min_delay: StdDuration::ZERO };

		assert!(config.validate().is_err());
		assert!(RateLimitConfig::new(0, StdDuration::from_secs(1), StdDuration::ZERO)
			.validate()
			.is_err());
		RateLimitConfig::default().validate().expect("Default quotas should validate.");
	}
}
