//! Market-data access coordinator for rate-limited broker REST APIs: shared OAuth token leases,
//! sliding-window quotas, batched quote lookups, and expiry-aware retries in one crate.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod batch;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod obs;
pub mod rate_limit;
pub mod retry;
pub mod store;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		auth::{AppCredentials, CredentialSet, Environment},
		client::ApiClient,
		config::TokenPolicy,
		http::ReqwestHttpClient,
		rate_limit::{RateLimitConfig, RateLimiter},
		retry::RetryPolicy,
		store::{MemoryStore, TokenStore},
		token::TokenManager,
	};

	/// Token manager type alias used by reqwest-backed integration tests.
	pub type ReqwestTestManager = TokenManager<ReqwestHttpClient>;
	/// API client type alias used by reqwest-backed integration tests.
	pub type ReqwestTestClient = ApiClient<ReqwestHttpClient>;

	/// App key used by every test credential set.
	pub const TEST_APP_KEY: &str = "test-app-key";
	/// App secret used by every test credential set.
	pub const TEST_APP_SECRET: &str = "test-app-secret";

	/// Builds a credential set whose production environment points at `base_url`.
	pub fn test_credentials(base_url: &str) -> CredentialSet {
		let base_url = Url::parse(base_url).expect("Mock server URL should parse successfully.");
		let credentials = AppCredentials::new(TEST_APP_KEY, TEST_APP_SECRET, base_url)
			.expect("Test credentials should be valid.");

		CredentialSet::default().with(Environment::Prod, credentials)
	}

	/// Token policy with short polling and no issuance cooldown so tests finish quickly.
	pub fn fast_token_policy() -> TokenPolicy {
		TokenPolicy::default()
			.with_poll_interval(StdDuration::from_millis(20))
			.with_issue_cooldown(StdDuration::ZERO)
	}

	/// Constructs a [`TokenManager`] backed by an in-memory store and the reqwest transport.
	pub fn build_test_manager(
		base_url: &str,
		policy: TokenPolicy,
	) -> (Arc<ReqwestTestManager>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn TokenStore> = store_backend.clone();
		let manager = TokenManager::with_http_client(
			store,
			test_credentials(base_url),
			ReqwestHttpClient::default(),
		)
		.with_policy(policy);

		(Arc::new(manager), store_backend)
	}

	/// Constructs an [`ApiClient`] for the production environment with a permissive limiter and
	/// a single-attempt retry policy.
	pub fn build_test_client(
		base_url: &str,
	) -> (ReqwestTestClient, Arc<ReqwestTestManager>, Arc<MemoryStore>) {
		let (manager, store) = build_test_manager(base_url, fast_token_policy());
		let limiter = RateLimiter::new(RateLimitConfig::new(
			100,
			StdDuration::from_secs(1),
			StdDuration::ZERO,
		))
		.expect("Test quotas should validate.");
		let client = ApiClient::new(Environment::Prod, manager.clone(), Arc::new(limiter))
			.with_retry_policy(RetryPolicy::no_retry());

		(client, manager, store)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap, VecDeque},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::{Hash, Hasher},
		pin::Pin,
		str::FromStr,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
