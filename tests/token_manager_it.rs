// std
use std::time::Instant as StdInstant;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use quote_broker::{
	_preludet::*,
	auth::{AccessToken, Environment, HolderId, RefreshLock},
	store::{StoreKey, StoredToken, TokenStore},
	token::TOKEN_PATH,
};

fn prod_key(manager: &ReqwestTestManager) -> StoreKey {
	let credentials =
		manager.credentials(Environment::Prod).expect("Test manager should have prod credentials.");

	StoreKey::new(Environment::Prod, credentials)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_lookups_issue_exactly_one_token() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH).json_body(json!({
				"grant_type": "client_credentials",
				"appkey": TEST_APP_KEY,
				"appsecret": TEST_APP_SECRET,
			}));
			then.status(200)
				.header("content-type", "application/json")
				.delay(StdDuration::from_millis(100))
				.json_body(json!({
					"access_token": "singleflight-token",
					"token_type": "Bearer",
					"expires_in": 86_400,
					"access_token_token_expired": "2025-03-02 09:00:00",
				}));
		})
		.await;
	let (manager, store) = build_test_manager(&server.base_url(), fast_token_policy());
	let handles = (0..8)
		.map(|_| {
			let manager = manager.clone();

			tokio::spawn(async move { manager.get_token(Environment::Prod, false).await })
		})
		.collect::<Vec<_>>();

	for handle in handles {
		let token = handle
			.await
			.expect("Lookup task should not panic.")
			.expect("Every concurrent lookup should receive a token.");

		assert_eq!(token.value.expose(), "singleflight-token");
	}

	mock.assert_calls_async(1).await;

	assert_eq!(manager.metrics.issuances(), 1);
	assert_eq!(store.token_count(), 1);
	assert!(!store.has_lock(&prod_key(&manager)));
}

#[tokio::test]
async fn expired_store_record_triggers_a_full_refresh() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "fresh-token",
				"token_type": "Bearer",
				"expires_in": 86_400,
			}));
		})
		.await;
	let (manager, store) = build_test_manager(&server.base_url(), fast_token_policy());
	let key = prod_key(&manager);
	let now = OffsetDateTime::now_utc();
	let stale = AccessToken::builder(Environment::Prod)
		.value("stale-token")
		.issued_at(now - Duration::days(1))
		.expires_at(now - Duration::seconds(1))
		.build()
		.expect("Stale fixture token should build.");

	store.save_token(key.clone(), StoredToken::new(stale)).await.expect("Fixture save failed.");

	let token = manager.get_token(Environment::Prod, false).await.expect("Refresh should succeed.");

	assert_eq!(token.value.expose(), "fresh-token");

	mock.assert_calls_async(1).await;

	let record = store
		.fetch_token(&key)
		.await
		.expect("Store fetch should succeed.")
		.expect("Refreshed record should be persisted.");

	assert_eq!(record.token.value.expose(), "fresh-token");
	assert!(record.token.expires_at > OffsetDateTime::now_utc() + manager.policy().refresh_margin);
	assert!(!store.has_lock(&key));
}

#[tokio::test]
async fn live_foreign_lease_is_polled_then_overridden() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).header("content-type", "application/json").json_body(json!({
				"access_token": "local-token",
				"expires_in": 86_400,
			}));
		})
		.await;
	let policy = fast_token_policy();
	let (manager, store) = build_test_manager(&server.base_url(), policy.clone());
	let key = prod_key(&manager);
	let foreign = RefreshLock::acquired_at(
		Environment::Prod,
		HolderId::new("other-process").expect("Holder fixture should be valid."),
		OffsetDateTime::now_utc() - Duration::seconds(10),
	);

	store.override_lock(key.clone(), foreign).await.expect("Fixture lease write failed.");

	let started = StdInstant::now();
	let token = manager
		.get_token(Environment::Prod, false)
		.await
		.expect("Lookup should refresh after polling gives up.");

	assert!(started.elapsed() >= policy.poll_interval * policy.poll_attempts);
	assert_eq!(token.value.expose(), "local-token");
	assert_eq!(manager.metrics.lease_waits(), 1);

	mock.assert_calls_async(1).await;

	assert!(!store.has_lock(&key));
}

#[tokio::test]
async fn token_published_by_lease_holder_is_adopted() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "access_token": "unused", "expires_in": 86_400 }));
		})
		.await;
	let (manager, store) = build_test_manager(&server.base_url(), fast_token_policy());
	let key = prod_key(&manager);
	let foreign = RefreshLock::new(
		Environment::Prod,
		HolderId::new("other-process").expect("Holder fixture should be valid."),
	);

	store.override_lock(key.clone(), foreign).await.expect("Fixture lease write failed.");

	let publisher = {
		let store = store.clone();
		let key = key.clone();

		tokio::spawn(async move {
			tokio::time::sleep(StdDuration::from_millis(50)).await;

			let token = AccessToken::builder(Environment::Prod)
				.value("published-token")
				.expires_in(Duration::hours(24))
				.build()
				.expect("Published fixture token should build.");

			store.save_token(key, StoredToken::new(token)).await
		})
	};
	let token = manager.get_token(Environment::Prod, false).await.expect("Lookup should succeed.");

	publisher
		.await
		.expect("Publisher task should not panic.")
		.expect("Publisher save should succeed.");

	assert_eq!(token.value.expose(), "published-token");
	assert_eq!(manager.metrics.store_hits(), 1);

	mock.assert_calls_async(0).await;
}

#[tokio::test]
async fn rejected_exchange_is_typed_and_releases_the_lease() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(403).header("content-type", "application/json").json_body(json!({
				"error_code": "EGW00103",
				"error_description": "유효하지 않은 AppKey입니다.",
			}));
		})
		.await;
	let (manager, store) = build_test_manager(&server.base_url(), fast_token_policy());
	let err = manager
		.get_token(Environment::Prod, false)
		.await
		.expect_err("A 403 from the token endpoint should fail the lookup.");

	match err {
		Error::TokenEndpoint { status, message } => {
			assert_eq!(status, 403);
			assert!(message.starts_with("EGW00103"));
		},
		other => panic!("Unexpected error: {other:?}."),
	}

	mock.assert_calls_async(1).await;

	assert_eq!(manager.metrics.failures(), 1);
	assert!(manager.cached(Environment::Prod).is_none());
	assert!(!store.has_lock(&prod_key(&manager)));
}

#[tokio::test]
async fn forced_refresh_bypasses_every_cache_layer() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST).path(TOKEN_PATH);
			then.status(200).json_body(json!({ "access_token": "rotating", "expires_in": 86_400 }));
		})
		.await;
	let (manager, _store) = build_test_manager(&server.base_url(), fast_token_policy());

	manager.get_token(Environment::Prod, false).await.expect("First lookup should succeed.");
	manager.get_token(Environment::Prod, false).await.expect("Cached lookup should succeed.");
	manager.get_token(Environment::Prod, true).await.expect("Forced lookup should succeed.");

	mock.assert_calls_async(2).await;

	assert_eq!(manager.metrics.cache_hits(), 1);
	assert_eq!(manager.metrics.issuances(), 2);
}
