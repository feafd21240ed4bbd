//! Tunable policies for token renewal and request batching, plus an aggregate loader.
//!
//! Every policy has production defaults matching the broker's published limits; overrides
//! use consuming `with_*` setters so a policy reads top-to-bottom at the call site.

// self
use crate::{
	_prelude::*,
	auth::{CredentialSet, Environment},
	error::ConfigError,
	rate_limit::RateLimitConfig,
	retry::RetryPolicy,
};

/// Timing rules for token reuse, renewal, and cross-process coordination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenPolicy {
	/// Tokens are replaced once they come within this margin of expiry.
	pub refresh_margin: Duration,
	/// Leases older than this are ignored by other processes.
	pub lease_ttl: Duration,
	/// Delay between shared-store polls while another process holds the lease.
	pub poll_interval: StdDuration,
	/// Number of polls before giving up on the other process and refreshing locally.
	pub poll_attempts: u32,
	/// Minimum spacing between two issuance attempts for one environment.
	pub issue_cooldown: StdDuration,
}
impl TokenPolicy {
	/// Overrides the refresh margin.
	pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
		self.refresh_margin = if margin.is_negative() { Duration::ZERO } else { margin };

		self
	}

	/// Overrides the lease TTL.
	pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
		self.lease_ttl = ttl;

		self
	}

	/// Overrides the lease polling interval.
	pub fn with_poll_interval(mut self, interval: StdDuration) -> Self {
		self.poll_interval = interval;

		self
	}

	/// Overrides the number of lease polls.
	pub fn with_poll_attempts(mut self, attempts: u32) -> Self {
		self.poll_attempts = attempts;

		self
	}

	/// Overrides the issuance cooldown.
	pub fn with_issue_cooldown(mut self, cooldown: StdDuration) -> Self {
		self.issue_cooldown = cooldown;

		self
	}
}
impl Default for TokenPolicy {
	fn default() -> Self {
		Self {
			refresh_margin: Duration::minutes(5),
			lease_ttl: Duration::seconds(30),
			poll_interval: StdDuration::from_millis(500),
			poll_attempts: 10,
			issue_cooldown: StdDuration::from_secs(60),
		}
	}
}

/// Collection, batching, and caching rules for [`RequestBatcher`](crate::batch::RequestBatcher).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchConfig {
	/// How long the first queued request waits for others to join its drain pass.
	pub collect_delay: StdDuration,
	/// Maximum distinct keys fetched concurrently per batch.
	pub batch_size: usize,
	/// Pause between consecutive batches of one drain pass.
	pub batch_delay: StdDuration,
	/// Lifetime of a cached value.
	pub cache_ttl: StdDuration,
	/// Capacity of the submission channel.
	pub queue_capacity: usize,
}
impl BatchConfig {
	/// Validates the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.batch_size == 0 {
			return Err(ConfigError::ZeroLimit { field: "batch size" });
		}
		if self.queue_capacity == 0 {
			return Err(ConfigError::ZeroLimit { field: "queue capacity" });
		}

		Ok(())
	}

	/// Overrides the collection delay.
	pub fn with_collect_delay(mut self, delay: StdDuration) -> Self {
		self.collect_delay = delay;

		self
	}

	/// Overrides the batch size.
	pub fn with_batch_size(mut self, size: usize) -> Self {
		self.batch_size = size;

		self
	}

	/// Overrides the inter-batch delay.
	pub fn with_batch_delay(mut self, delay: StdDuration) -> Self {
		self.batch_delay = delay;

		self
	}

	/// Overrides the cache TTL.
	pub fn with_cache_ttl(mut self, ttl: StdDuration) -> Self {
		self.cache_ttl = ttl;

		self
	}
}
impl Default for BatchConfig {
	fn default() -> Self {
		Self {
			collect_delay: StdDuration::from_millis(100),
			batch_size: 15,
			batch_delay: StdDuration::from_millis(1_100),
			cache_ttl: StdDuration::from_secs(30),
			queue_capacity: 1_024,
		}
	}
}

/// Everything needed to stand up a coordinator for one process.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
	/// Environment API calls are issued against.
	pub environment: Environment,
	/// App credentials per environment.
	pub credentials: CredentialSet,
	/// Token renewal policy.
	pub token: TokenPolicy,
	/// Outbound call quotas.
	pub rate_limit: RateLimitConfig,
	/// Network-failure retry policy.
	pub retry: RetryPolicy,
	/// Quote batching policy.
	pub batch: BatchConfig,
}
impl CoordinatorConfig {
	/// Builds a configuration with defaults suited to `environment`.
	pub fn new(environment: Environment, credentials: CredentialSet) -> Self {
		Self {
			environment,
			credentials,
			token: TokenPolicy::default(),
			rate_limit: RateLimitConfig::for_environment(environment),
			retry: RetryPolicy::default(),
			batch: BatchConfig::default(),
		}
	}

	/// Reads `KIS_ENVIRONMENT` and the credential variables, then applies defaults.
	pub fn from_env() -> Result<Self, ConfigError> {
		let environment = Environment::from_env()?;
		let credentials = CredentialSet::from_env()?;

		Ok(Self::new(environment, credentials))
	}

	/// Validates every nested policy.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.rate_limit.validate()?;
		self.batch.validate()
	}
}
