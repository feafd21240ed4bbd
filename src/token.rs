//! Access token lifecycle: in-process cache, shared store, singleflight, and refresh leases.
//!
//! [`TokenManager::get_token`] walks the layers cheapest first. The in-process cache and the
//! shared store are consulted without any locking; on a miss the caller joins a per-environment
//! singleflight guard so concurrent callers share one refresh. The caller that ends up
//! refreshing first looks for another process's live lease and polls the shared record while
//! that lease is held, then claims its own lease, exchanges credentials, persists the token,
//! and releases the lease.

pub mod issue;
pub mod metrics;

mod lease;

pub use issue::TOKEN_PATH;
pub use metrics::TokenMetrics;

// crates.io
use tokio::time::Instant;
// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials, CredentialSet, Environment, HolderId},
	config::TokenPolicy,
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	store::{StoreKey, TokenStore},
};

/// Token manager specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestTokenManager = TokenManager<ReqwestHttpClient>;

/// Per-process registry of access tokens for every configured environment.
///
/// One manager is meant to be shared (behind an `Arc`) by everything in a process; it owns the
/// in-process cache and the singleflight guards, so two managers in one process behave like two
/// processes sharing the store.
pub struct TokenManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Transport used for token exchanges.
	pub http_client: Arc<C>,
	/// Shared store holding token and lease records.
	pub store: Arc<dyn TokenStore>,
	/// Lookup and issuance counters.
	pub metrics: Arc<TokenMetrics>,
	credentials: CredentialSet,
	policy: TokenPolicy,
	holder_id: HolderId,
	cache: Mutex<HashMap<Environment, AccessToken>>,
	flow_guards: Mutex<HashMap<Environment, Arc<AsyncMutex<()>>>>,
	last_issue: Mutex<HashMap<Environment, Instant>>,
}
impl<C> TokenManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a manager that reuses the caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn TokenStore>,
		credentials: CredentialSet,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			metrics: Default::default(),
			credentials,
			policy: TokenPolicy::default(),
			holder_id: HolderId::generate(),
			cache: Default::default(),
			flow_guards: Default::default(),
			last_issue: Default::default(),
		}
	}

	/// Replaces the token policy.
	pub fn with_policy(mut self, policy: TokenPolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Replaces the generated lease holder identifier.
	pub fn with_holder_id(mut self, holder_id: HolderId) -> Self {
		self.holder_id = holder_id;

		self
	}

	/// Active token policy.
	pub fn policy(&self) -> &TokenPolicy {
		&self.policy
	}

	/// Identifier written into refresh leases by this manager.
	pub fn holder_id(&self) -> &HolderId {
		&self.holder_id
	}

	/// Credentials configured for `environment`.
	pub fn credentials(&self, environment: Environment) -> Result<&AppCredentials> {
		self.credentials.get(environment).ok_or(Error::MissingCredentials { environment })
	}

	/// Returns a usable bearer token for `environment`.
	///
	/// With `force_refresh` the caches and the foreign-lease wait are skipped and a new token is
	/// issued, unless a concurrent caller already issued one after this call began.
	pub async fn get_token(
		&self,
		environment: Environment,
		force_refresh: bool,
	) -> Result<AccessToken> {
		let lookup = if force_refresh {
			Lookup::IssuedSince(OffsetDateTime::now_utc())
		} else {
			Lookup::Any
		};

		self.observed("get_token", environment, lookup).await
	}

	/// Returns a replacement for `rejected`, a token the broker refused as expired.
	///
	/// Any usable token other than `rejected` is reused, whether a concurrent caller or another
	/// process issued it; only when none exists is a new token issued.
	pub async fn replace_rejected(
		&self,
		environment: Environment,
		rejected: &AccessToken,
	) -> Result<AccessToken> {
		let rejected = rejected.value.expose();

		{
			let mut cache = self.cache.lock();

			if cache.get(&environment).is_some_and(|token| token.value.expose() == rejected) {
				cache.remove(&environment);
			}
		}

		self.observed("replace_rejected", environment, Lookup::Except(rejected)).await
	}

	async fn observed(
		&self,
		name: &'static str,
		environment: Environment,
		lookup: Lookup<'_>,
	) -> Result<AccessToken> {
		const KIND: OpKind = OpKind::TokenLookup;

		let span = OpSpan::for_environment(KIND, name, environment.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.resolve(environment, lookup)).await;

		obs::record_result(KIND, &result);

		if result.is_err() {
			self.metrics.record_failure();
		}

		result
	}

	/// Peeks at the in-process cache without checking usability.
	pub fn cached(&self, environment: Environment) -> Option<AccessToken> {
		self.cache.lock().get(&environment).cloned()
	}

	/// Drops the in-process entry for `environment`; the shared record is left untouched.
	pub fn invalidate(&self, environment: Environment) {
		self.cache.lock().remove(&environment);
	}

	async fn resolve(&self, environment: Environment, lookup: Lookup<'_>) -> Result<AccessToken> {
		let credentials = self.credentials(environment)?;
		let key = StoreKey::new(environment, credentials);

		if !lookup.is_forced() {
			if let Some(token) = self.cached_usable(environment, lookup) {
				self.metrics.record_cache_hit();

				return Ok(token);
			}
			if let Some(token) = self.stored_usable(&key, lookup).await? {
				return Ok(token);
			}
		}

		let guard = self.flow_guard(environment);
		let _singleflight = guard.lock().await;

		// A concurrent caller may have refreshed while this one waited on the guard.
		if let Some(token) = self.cached_usable(environment, lookup) {
			self.metrics.record_shared_refresh();

			return Ok(token);
		}

		if !lookup.is_forced()
			&& let Some(token) = self.await_foreign_refresh(&key, lookup).await?
		{
			return Ok(token);
		}

		self.refresh_under_lease(environment, credentials, &key).await
	}

	fn cached_usable(&self, environment: Environment, lookup: Lookup<'_>) -> Option<AccessToken> {
		self.cache
			.lock()
			.get(&environment)
			.filter(|token| token.is_usable(self.policy.refresh_margin) && lookup.accepts(token))
			.cloned()
	}

	/// Reads the shared record and adopts it into the in-process cache when usable.
	async fn stored_usable(
		&self,
		key: &StoreKey,
		lookup: Lookup<'_>,
	) -> Result<Option<AccessToken>> {
		let Some(record) = self.store.fetch_token(key).await? else {
			return Ok(None);
		};

		if !record.token.is_usable(self.policy.refresh_margin) || !lookup.accepts(&record.token) {
			return Ok(None);
		}

		self.metrics.record_store_hit();
		self.cache.lock().insert(key.environment, record.token.clone());

		Ok(Some(record.token))
	}

	fn flow_guard(&self, environment: Environment) -> Arc<AsyncMutex<()>> {
		let mut guards = self.flow_guards.lock();

		guards.entry(environment).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
#[cfg(feature = "reqwest")]
impl TokenManager<ReqwestHttpClient> {
	/// Creates a manager that provisions its own reqwest-backed transport.
	pub fn new(store: Arc<dyn TokenStore>, credentials: CredentialSet) -> Self {
		Self::with_http_client(store, credentials, ReqwestHttpClient::default())
	}
}
impl<C> Debug for TokenManager<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("environments", &self.credentials.environments().collect::<Vec<_>>())
			.field("holder_id", &self.holder_id)
			.field("policy", &self.policy)
			.finish()
	}
}

/// Which previously issued tokens a lookup may hand back.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Lookup<'a> {
	/// Any usable token.
	Any,
	/// Only tokens issued at or after the instant, so a forced refresh never returns the token
	/// it was asked to replace.
	IssuedSince(OffsetDateTime),
	/// Any usable token whose value differs from the rejected one.
	Except(&'a str),
}
impl Lookup<'_> {
	fn is_forced(self) -> bool {
		matches!(self, Self::IssuedSince(_))
	}

	fn accepts(self, token: &AccessToken) -> bool {
		match self {
			Self::Any => true,
			Self::IssuedSince(since) => token.issued_at >= since,
			Self::Except(rejected) => token.value.expose() != rejected,
		}
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		error::TransportError,
		http::{HttpRequest, HttpResponse, TransportFuture},
		store::{MemoryStore, StoredToken},
	};

	#[derive(Default)]
	struct ScriptedTransport {
		calls: AtomicUsize,
	}
	impl HttpTransport for ScriptedTransport {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
			Box::pin(async move {
				let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

				assert!(request.url.path().ends_with(TOKEN_PATH));
				tokio::time::sleep(StdDuration::from_millis(10)).await;

				if request.header("content-type").is_none() {
					return Err(TransportError::Io(std::io::Error::other("missing body")));
				}

				Ok(HttpResponse {
					status: 200,
					retry_after: None,
					body: format!(
						r#"{{"access_token":"token-{call}","token_type":"Bearer","expires_in":86400}}"#
					)
					.into_bytes(),
				})
			})
		}
	}

	fn manager(store: Arc<MemoryStore>) -> Arc<TokenManager<ScriptedTransport>> {
		let credentials = AppCredentials::new(
			"unit-key",
			"unit-secret",
			Url::parse("https://broker.invalid").expect("Fixture URL should parse."),
		)
		.expect("Fixture credentials should be valid.");
		let manager = TokenManager::with_http_client(
			store,
			CredentialSet::default().with(Environment::Prod, credentials),
			ScriptedTransport::default(),
		)
		.with_policy(TokenPolicy::default().with_issue_cooldown(StdDuration::ZERO));

		Arc::new(manager)
	}

	#[tokio::test]
	async fn concurrent_lookups_share_one_issuance() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager(store.clone());
		let handles = (0..8)
			.map(|_| {
				let manager = manager.clone();

				tokio::spawn(async move { manager.get_token(Environment::Prod, false).await })
			})
			.collect::<Vec<_>>();
		let mut values = Vec::new();

		for handle in handles {
			let token = handle
				.await
				.expect("Lookup task should not panic.")
				.expect("Lookup should yield a token.");

			values.push(token.value.expose().to_owned());
		}

		assert_eq!(manager.http_client.calls.load(Ordering::SeqCst), 1);
		assert!(values.iter().all(|value| value == "token-1"));
		assert_eq!(manager.metrics.issuances(), 1);
		assert_eq!(store.token_count(), 1);
	}

	#[tokio::test]
	async fn forced_refresh_replaces_a_usable_token() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager(store);
		let first = manager.get_token(Environment::Prod, false).await.expect("First lookup.");
		let cached = manager.get_token(Environment::Prod, false).await.expect("Cached lookup.");
		let forced = manager.get_token(Environment::Prod, true).await.expect("Forced lookup.");

		assert_eq!(first.value.expose(), cached.value.expose());
		assert_ne!(first.value.expose(), forced.value.expose());
		assert_eq!(manager.metrics.cache_hits(), 1);
		assert_eq!(
			manager.cached(Environment::Prod).map(|token| token.value.expose().to_owned()),
			Some(forced.value.expose().to_owned())
		);
	}

	#[tokio::test]
	async fn usable_store_record_is_adopted_without_network() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager(store.clone());
		let credentials =
			manager.credentials(Environment::Prod).expect("Prod credentials should exist.");
		let key = StoreKey::new(Environment::Prod, credentials);
		let token = AccessToken::builder(Environment::Prod)
			.value("published-elsewhere")
			.expires_in(Duration::hours(12))
			.build()
			.expect("Fixture token should build.");

		store.save_token(key, StoredToken::new(token)).await.expect("Fixture save.");

		let adopted = manager.get_token(Environment::Prod, false).await.expect("Lookup.");

		assert_eq!(adopted.value.expose(), "published-elsewhere");
		assert_eq!(manager.http_client.calls.load(Ordering::SeqCst), 0);
		assert_eq!(manager.metrics.store_hits(), 1);

		manager.invalidate(Environment::Prod);

		assert!(manager.cached(Environment::Prod).is_none());
	}

	#[tokio::test]
	async fn rejected_token_is_replaced_once_and_never_readopted() {
		let store = Arc::new(MemoryStore::default());
		let manager = manager(store.clone());
		let credentials =
			manager.credentials(Environment::Prod).expect("Prod credentials should exist.");
		let rejected = AccessToken::builder(Environment::Prod)
			.value("revoked-upstream")
			.expires_in(Duration::hours(12))
			.build()
			.expect("Fixture token should build.");

		store
			.save_token(StoreKey::new(Environment::Prod, credentials), StoredToken::new(rejected))
			.await
			.expect("Fixture save.");

		let current = manager.get_token(Environment::Prod, false).await.expect("Lookup.");

		assert_eq!(current.value.expose(), "revoked-upstream");

		let first = manager
			.replace_rejected(Environment::Prod, &current)
			.await
			.expect("First replacement should issue.");
		let late = manager
			.replace_rejected(Environment::Prod, &current)
			.await
			.expect("Late replacement should reuse the new token.");

		assert_eq!(first.value.expose(), "token-1");
		assert_eq!(late.value.expose(), "token-1");
		assert_eq!(manager.http_client.calls.load(Ordering::SeqCst), 1);
		assert_eq!(manager.metrics.issuances(), 1);
	}

	#[tokio::test]
	async fn missing_credentials_and_cooldown_surface_as_errors() {
		let store = Arc::new(MemoryStore::default());
		let manager = Arc::into_inner(manager(store))
			.expect("Fresh manager should have one owner.")
			.with_policy(TokenPolicy::default());
		let missing = manager.get_token(Environment::Sandbox, false).await;

		assert!(matches!(
			missing,
			Err(Error::MissingCredentials { environment: Environment::Sandbox })
		));

		manager.get_token(Environment::Prod, false).await.expect("First issuance.");

		let throttled = manager.get_token(Environment::Prod, true).await;

		assert!(matches!(throttled, Err(Error::IssueCooldown { .. })));
		assert_eq!(manager.metrics.failures(), 2);
	}
}
