//! Cross-process refresh coordination through the shared store's lease record.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials, Environment, RefreshLock},
	http::HttpTransport,
	store::{LockOutcome, StoreKey, StoredToken},
	token::{Lookup, TokenManager},
};

impl<C> TokenManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Waits for another holder's live lease to produce a token.
	///
	/// Returns `None` when no foreign lease is live, or when polling ran out without an
	/// acceptable token appearing.
	pub(crate) async fn await_foreign_refresh(
		&self,
		key: &StoreKey,
		lookup: Lookup<'_>,
	) -> Result<Option<AccessToken>> {
		let Some(lock) = self.store.fetch_lock(key).await? else {
			return Ok(None);
		};

		if lock.is_held_by(&self.holder_id)
			|| lock.is_stale_at(OffsetDateTime::now_utc(), self.policy.lease_ttl)
		{
			return Ok(None);
		}

		self.metrics.record_lease_wait();
		tracing::info!(
			environment = key.environment.as_str(),
			holder = %lock.holder_id,
			"Another process holds the refresh lease; polling the shared record."
		);

		for attempt in 1..=self.policy.poll_attempts {
			tokio::time::sleep(self.policy.poll_interval).await;

			if let Some(token) = self.stored_usable(key, lookup).await? {
				tracing::debug!(attempt, "Adopted the token published by the lease holder.");

				return Ok(Some(token));
			}
		}

		tracing::warn!(
			environment = key.environment.as_str(),
			attempts = self.policy.poll_attempts,
			"Lease holder did not publish a token in time; refreshing locally."
		);

		Ok(None)
	}

	/// Claims the lease, exchanges credentials, persists the token, and releases the lease.
	///
	/// The lease is released on failure too. A lease held by someone else at claim time is
	/// overridden; duplicate issuance is tolerated and the later write wins.
	pub(crate) async fn refresh_under_lease(
		&self,
		environment: Environment,
		credentials: &AppCredentials,
		key: &StoreKey,
	) -> Result<AccessToken> {
		self.claim_lease(environment, key).await?;

		let result = self.issue_and_persist(environment, credentials, key).await;

		match self.store.release_lock(key, &self.holder_id).await {
			Ok(true) => {},
			Ok(false) => tracing::debug!("Refresh lease was already replaced by another holder."),
			Err(e) => tracing::warn!(error = %e, "Failed to release the refresh lease."),
		}

		result
	}

	async fn claim_lease(&self, environment: Environment, key: &StoreKey) -> Result<()> {
		let lock = RefreshLock::new(environment, self.holder_id.clone());

		match self.store.acquire_lock(key.clone(), lock.clone(), self.policy.lease_ttl).await? {
			LockOutcome::Acquired => Ok(()),
			LockOutcome::Held(existing) => {
				tracing::warn!(
					environment = environment.as_str(),
					holder = %existing.holder_id,
					"Overriding a live refresh lease held by another process."
				);

				Ok(self.store.override_lock(key.clone(), lock).await?)
			},
		}
	}

	async fn issue_and_persist(
		&self,
		environment: Environment,
		credentials: &AppCredentials,
		key: &StoreKey,
	) -> Result<AccessToken> {
		let token = self.issue(environment, credentials).await?;

		self.store.save_token(key.clone(), StoredToken::new(token.clone())).await?;
		self.cache.lock().insert(environment, token.clone());

		Ok(token)
	}
}
