//! Refresh lease records used to keep processes from issuing tokens simultaneously.

// self
use crate::{
	_prelude::*,
	auth::{Environment, HolderId},
};

/// Short-lived advisory lease written to the shared store while a process refreshes.
///
/// Locks are created when a refresh begins, deleted when it completes or fails, and never
/// updated in place. Readers enforce the TTL; the store does not.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshLock {
	/// Environment whose token is being refreshed.
	pub environment: Environment,
	/// Process that wrote the lease.
	pub holder_id: HolderId,
	/// Instant the lease was written.
	pub acquired_at: OffsetDateTime,
}
impl RefreshLock {
	/// Creates a lease stamped with the current clock.
	pub fn new(environment: Environment, holder_id: HolderId) -> Self {
		Self::acquired_at(environment, holder_id, OffsetDateTime::now_utc())
	}

	/// Creates a lease with an explicit acquisition instant.
	pub fn acquired_at(
		environment: Environment,
		holder_id: HolderId,
		acquired_at: OffsetDateTime,
	) -> Self {
		Self { environment, holder_id, acquired_at }
	}

	/// Returns `true` once `instant - acquired_at > lease_ttl`.
	pub fn is_stale_at(&self, instant: OffsetDateTime, lease_ttl: Duration) -> bool {
		instant - self.acquired_at > lease_ttl
	}

	/// Returns `true` when the lease was written by `holder`.
	pub fn is_held_by(&self, holder: &HolderId) -> bool {
		&self.holder_id == holder
	}
}
