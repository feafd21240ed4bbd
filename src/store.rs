//! Storage contracts and built-in implementations for shared token and lease records.
//!
//! Every process coordinating against the same broker account points at one
//! [`TokenStore`]. The store holds at most one token record and one refresh lease per
//! [`StoreKey`]; leases carry no store-side TTL, readers decide staleness.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials, Environment, HolderId, RefreshLock},
};

/// Boxed future returned by every [`TokenStore`] method.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract shared by all coordinating processes.
pub trait TokenStore
where
	Self: Send + Sync,
{
	/// Fetches the persisted token record for the key, if present.
	fn fetch_token<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<StoredToken>>;

	/// Persists or replaces the token record for the key.
	fn save_token(&self, key: StoreKey, record: StoredToken) -> StoreFuture<'_, ()>;

	/// Fetches the current refresh lease for the key, stale or not.
	fn fetch_lock<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<RefreshLock>>;

	/// Writes `lock` only if no lease exists, the existing lease is stale, or it belongs to the
	/// same holder.
	fn acquire_lock(
		&self,
		key: StoreKey,
		lock: RefreshLock,
		lease_ttl: Duration,
	) -> StoreFuture<'_, LockOutcome>;

	/// Writes `lock` unconditionally, replacing any existing lease.
	fn override_lock(&self, key: StoreKey, lock: RefreshLock) -> StoreFuture<'_, ()>;

	/// Deletes the lease if `holder` owns it; returns whether a lease was removed.
	fn release_lock<'a>(
		&'a self,
		key: &'a StoreKey,
		holder: &'a HolderId,
	) -> StoreFuture<'a, bool>;
}

/// Result of a conditional lease write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockOutcome {
	/// The lease now belongs to the caller.
	Acquired,
	/// A live lease owned by another holder blocked the write.
	Held(RefreshLock),
}

/// Error type produced by [`TokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Unique key identifying the shared records for one environment and app key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreKey {
	/// Environment component.
	pub environment: Environment,
	/// App key fingerprint so two accounts on one environment never share a token.
	pub credential_fingerprint: String,
}
impl StoreKey {
	/// Builds a key from the environment and its credentials.
	pub fn new(environment: Environment, credentials: &AppCredentials) -> Self {
		Self { environment, credential_fingerprint: credentials.fingerprint() }
	}
}

/// Persisted token plus the instant the record was last written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredToken {
	/// Serialized access token.
	pub token: AccessToken,
	/// Instant the record was written.
	pub updated_at: OffsetDateTime,
}
impl StoredToken {
	/// Wraps `token`, stamping the write with the current clock.
	pub fn new(token: AccessToken) -> Self {
		Self { token, updated_at: OffsetDateTime::now_utc() }
	}
}

/// In-memory image of a store, shared by the memory and file backends.
#[derive(Clone, Debug, Default)]
pub(crate) struct Snapshot {
	pub(crate) tokens: HashMap<StoreKey, StoredToken>,
	pub(crate) locks: HashMap<StoreKey, RefreshLock>,
}
impl Snapshot {
	pub(crate) fn acquire_lock(
		&mut self,
		key: StoreKey,
		lock: RefreshLock,
		lease_ttl: Duration,
	) -> LockOutcome {
		match self.locks.get(&key) {
			Some(existing)
				if !existing.is_held_by(&lock.holder_id)
					&& !existing.is_stale_at(lock.acquired_at, lease_ttl) =>
				LockOutcome::Held(existing.clone()),
			_ => {
				self.locks.insert(key, lock);

				LockOutcome::Acquired
			},
		}
	}

	pub(crate) fn release_lock(&mut self, key: &StoreKey, holder: &HolderId) -> bool {
		if self.locks.get(key).is_some_and(|lock| lock.is_held_by(holder)) {
			self.locks.remove(key);

			true
		} else {
			false
		}
	}
}

/// Serialized layout of a [`Snapshot`]; JSON maps cannot use struct keys.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct SnapshotFile {
	#[serde(default)]
	pub(crate) tokens: Vec<(StoreKey, StoredToken)>,
	#[serde(default)]
	pub(crate) locks: Vec<(StoreKey, RefreshLock)>,
}
impl From<SnapshotFile> for Snapshot {
	fn from(file: SnapshotFile) -> Self {
		Self { tokens: file.tokens.into_iter().collect(), locks: file.locks.into_iter().collect() }
	}
}
impl From<&Snapshot> for SnapshotFile {
	fn from(snapshot: &Snapshot) -> Self {
		Self {
			tokens: snapshot.tokens.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
			locks: snapshot.locks.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
		}
	}
}
