//! Thread-safe in-memory [`TokenStore`] implementation for single-process use and tests.

// self
use crate::{
	_prelude::*,
	auth::{HolderId, RefreshLock},
	store::{LockOutcome, Snapshot, StoreFuture, StoreKey, StoredToken, TokenStore},
};

type SharedSnapshot = Arc<RwLock<Snapshot>>;

/// Storage backend that keeps records in-process; clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedSnapshot);
impl MemoryStore {
	/// Number of token records currently held.
	pub fn token_count(&self) -> usize {
		self.0.read().tokens.len()
	}

	/// Returns `true` when a lease exists for `key`, stale or not.
	pub fn has_lock(&self, key: &StoreKey) -> bool {
		self.0.read().locks.contains_key(key)
	}
}
impl TokenStore for MemoryStore {
	fn fetch_token<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>> {
		let snapshot = self.0.clone();

		Box::pin(async move { Ok(snapshot.read().tokens.get(key).cloned()) })
	}

	fn save_token(&self, key: StoreKey, record: StoredToken) -> StoreFuture<'_, ()> {
		let snapshot = self.0.clone();

		Box::pin(async move {
			snapshot.write().tokens.insert(key, record);

			Ok(())
		})
	}

	fn fetch_lock<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<RefreshLock>> {
		let snapshot = self.0.clone();

		Box::pin(async move { Ok(snapshot.read().locks.get(key).cloned()) })
	}

	fn acquire_lock(
		&self,
		key: StoreKey,
		lock: RefreshLock,
		lease_ttl: Duration,
	) -> StoreFuture<'_, LockOutcome> {
		let snapshot = self.0.clone();

		Box::pin(async move { Ok(snapshot.write().acquire_lock(key, lock, lease_ttl)) })
	}

	fn override_lock(&self, key: StoreKey, lock: RefreshLock) -> StoreFuture<'_, ()> {
		let snapshot = self.0.clone();

		Box::pin(async move {
			snapshot.write().locks.insert(key, lock);

			Ok(())
		})
	}

	fn release_lock<'a>(
		&'a self,
		key: &'a StoreKey,
		holder: &'a HolderId,
	) -> StoreFuture<'a, bool> {
		let snapshot = self.0.clone();

		Box::pin(async move { Ok(snapshot.write().release_lock(key, holder)) })
	}
}
