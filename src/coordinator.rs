//! One-stop wiring of the token manager, limiter, client, and quote batcher.

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{AccessToken, Environment},
	batch::{ApiQuoteFetcher, Quote, RequestBatcher},
	client::{ApiClient, ApiRequest, ApiResponse},
	config::CoordinatorConfig,
	http::HttpTransport,
	rate_limit::RateLimiter,
	store::TokenStore,
	token::TokenManager,
};

/// Process-wide coordinator exposing the three collaborator entry points: quotes, tokens, and
/// generic API calls.
pub struct Coordinator<C>
where
	C: ?Sized + HttpTransport,
{
	tokens: Arc<TokenManager<C>>,
	client: Arc<ApiClient<C>>,
	quotes: RequestBatcher<ApiQuoteFetcher<C>>,
}
impl<C> Coordinator<C>
where
	C: ?Sized + HttpTransport,
{
	/// Validates `config` and wires every component around the provided transport.
	pub fn with_http_client(
		config: CoordinatorConfig,
		store: Arc<dyn TokenStore>,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		config.validate()?;

		let tokens = Arc::new(
			TokenManager::with_http_client(store, config.credentials, http_client)
				.with_policy(config.token),
		);
		let limiter = Arc::new(RateLimiter::new(config.rate_limit)?);
		let client = Arc::new(
			ApiClient::new(config.environment, tokens.clone(), limiter)
				.with_retry_policy(config.retry),
		);
		let quotes = RequestBatcher::new(ApiQuoteFetcher::new(client.clone()), config.batch)?;

		Ok(Self { tokens, client, quotes })
	}

	/// Quote for one symbol; `None` when it cannot be obtained.
	pub async fn quote(&self, symbol: &str) -> Option<Quote> {
		self.quotes.fetch(symbol).await
	}

	/// Quotes for several symbols, one entry per distinct symbol.
	pub async fn quotes<I, K>(&self, symbols: I) -> HashMap<String, Option<Quote>>
	where
		I: IntoIterator<Item = K>,
		K: Into<String>,
	{
		self.quotes.fetch_many(symbols).await
	}

	/// Valid bearer token for `environment`.
	pub async fn token(&self, environment: Environment) -> Result<AccessToken> {
		self.tokens.get_token(environment, false).await
	}

	/// Generic authenticated API call.
	pub async fn call(&self, request: &ApiRequest) -> Result<Option<ApiResponse>> {
		self.client.call(request).await
	}

	/// Token manager.
	pub fn token_manager(&self) -> &Arc<TokenManager<C>> {
		&self.tokens
	}

	/// API client.
	pub fn client(&self) -> &Arc<ApiClient<C>> {
		&self.client
	}

	/// Quote batcher.
	pub fn batcher(&self) -> &RequestBatcher<ApiQuoteFetcher<C>> {
		&self.quotes
	}
}
#[cfg(feature = "reqwest")]
impl Coordinator<ReqwestHttpClient> {
	/// Wires a coordinator around a freshly built reqwest transport.
	pub fn new(config: CoordinatorConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
		Self::with_http_client(config, store, ReqwestHttpClient::default())
	}
}
impl<C> Debug for Coordinator<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Coordinator")
			.field("tokens", &self.tokens)
			.field("client", &self.client)
			.field("quotes", &self.quotes)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::{
		auth::{AppCredentials, CredentialSet},
		batch::INQUIRE_PRICE_PATH,
		error::ConfigError,
		http::{HttpRequest, HttpResponse, TransportFuture},
		token::TOKEN_PATH,
	};

	#[derive(Default)]
	struct Upstream {
		token_calls: AtomicUsize,
		quote_calls: AtomicUsize,
	}
	impl HttpTransport for Upstream {
		fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
			Box::pin(async move {
				let body = if request.url.path() == TOKEN_PATH {
					self.token_calls.fetch_add(1, Ordering::SeqCst);

					r#"{"access_token":"shared","expires_in":86400}"#.to_owned()
				} else {
					assert_eq!(request.url.path(), INQUIRE_PRICE_PATH);
					self.quote_calls.fetch_add(1, Ordering::SeqCst);

					let symbol = request
						.url
						.query_pairs()
						.find(|(name, _)| name == "FID_INPUT_ISCD")
						.map(|(_, value)| value.into_owned())
						.unwrap_or_default();

					format!(r#"{{"rt_cd":"0","output":{{"stck_prpr":"{}"}}}}"#, symbol.len())
				};

				Ok(HttpResponse { status: 200, retry_after: None, body: body.into_bytes() })
			})
		}
	}

	fn config() -> CoordinatorConfig {
		let credentials = AppCredentials::new(
			"key",
			"secret",
			Url::parse("https://broker.test").expect("Fixture URL should parse."),
		)
		.expect("Fixture credentials should be valid.");

		CoordinatorConfig::new(
			Environment::Prod,
			CredentialSet::default().with(Environment::Prod, credentials),
		)
	}

	#[tokio::test]
	async fn quotes_share_one_token_and_one_fetch_per_symbol() {
		let upstream = Arc::new(Upstream::default());
		let coordinator = <Coordinator<Upstream>>::with_http_client(
			config(),
			Arc::new(crate::store::MemoryStore::default()),
			upstream.clone(),
		)
		.expect("Default configuration should wire.");
		let quotes = coordinator.quotes(["005930", "000660", "005930"]).await;

		assert_eq!(quotes.len(), 2);
		assert_eq!(quotes["005930"].as_ref().map(|quote| quote.symbol.as_str()), Some("005930"));
		assert_eq!(upstream.quote_calls.load(Ordering::SeqCst), 2);
		assert_eq!(upstream.token_calls.load(Ordering::SeqCst), 1);

		let token = coordinator.token(Environment::Prod).await.expect("Token should be cached.");

		assert_eq!(token.value.expose(), "shared");
		assert_eq!(upstream.token_calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn invalid_configuration_is_rejected() {
		let mut config = config();

		config.batch = config.batch.with_batch_size(0);

		let err = <Coordinator<Upstream>>::with_http_client(
			config,
			Arc::new(crate::store::MemoryStore::default()),
			Upstream::default(),
		)
		.expect_err("A zero batch size should be rejected.");

		assert!(matches!(err, Error::Config(ConfigError::ZeroLimit { field: "batch size" })));
	}
}
