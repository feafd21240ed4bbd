//! Counters for token lookups, issuances, and lease waits.

// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing where tokens were served from.
#[derive(Debug, Default)]
pub struct TokenMetrics {
	cache_hits: AtomicU64,
	store_hits: AtomicU64,
	shared_refreshes: AtomicU64,
	lease_waits: AtomicU64,
	issuances: AtomicU64,
	failures: AtomicU64,
}
impl TokenMetrics {
	/// Lookups answered by the in-process cache.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Lookups answered by the shared store, including tokens published by another process.
	pub fn store_hits(&self) -> u64 {
		self.store_hits.load(Ordering::Relaxed)
	}

	/// Callers that reused a refresh performed by a concurrent caller in this process.
	pub fn shared_refreshes(&self) -> u64 {
		self.shared_refreshes.load(Ordering::Relaxed)
	}

	/// Times this process waited on another holder's lease.
	pub fn lease_waits(&self) -> u64 {
		self.lease_waits.load(Ordering::Relaxed)
	}

	/// Successful network token exchanges.
	pub fn issuances(&self) -> u64 {
		self.issuances.load(Ordering::Relaxed)
	}

	/// Lookups that ended in an error.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_store_hit(&self) {
		self.store_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_shared_refresh(&self) {
		self.shared_refreshes.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_lease_wait(&self) {
		self.lease_waits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_issuance(&self) {
		self.issuances.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
