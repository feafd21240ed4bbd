//! Authenticated broker API calls.
//!
//! [`ApiClient::call`] attaches a bearer token from the [`TokenManager`], waits for
//! [`RateLimiter`] admission, and retries network failures through the [`RetryPolicy`]. A
//! response classified as token expiry replaces the rejected token once and retries; a quota
//! response resolves to `Ok(None)` without any retry.

pub mod classify;
pub mod request;
pub mod response;

pub use classify::*;
pub use request::*;
pub use response::*;

// self
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials, Environment},
	http::HttpTransport,
	obs::{self, OpKind, OpOutcome, OpSpan},
	rate_limit::{RateLimitConfig, RateLimiter},
	retry::RetryPolicy,
	token::TokenManager,
};

/// API client specialized for the crate's default reqwest transport.
#[cfg(feature = "reqwest")]
pub type ReqwestApiClient = ApiClient<ReqwestHttpClient>;

/// Issues authenticated, rate-limited calls against one environment.
///
/// The client reuses the token manager's transport, so a single connection pool serves both
/// token exchanges and API calls.
pub struct ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	environment: Environment,
	tokens: Arc<TokenManager<C>>,
	limiter: Arc<RateLimiter>,
	retry: RetryPolicy,
	classifier: Arc<dyn ResponseClassifier>,
}
impl<C> ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a client with the default retry policy and classifier.
	pub fn new(
		environment: Environment,
		tokens: Arc<TokenManager<C>>,
		limiter: Arc<RateLimiter>,
	) -> Self {
		Self {
			environment,
			tokens,
			limiter,
			retry: RetryPolicy::default(),
			classifier: Arc::new(KisResponseClassifier::default()),
		}
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
		self.retry = retry;

		self
	}

	/// Replaces the response classifier.
	pub fn with_classifier(mut self, classifier: Arc<dyn ResponseClassifier>) -> Self {
		self.classifier = classifier;

		self
	}

	/// Environment every call targets.
	pub fn environment(&self) -> Environment {
		self.environment
	}

	/// Token manager backing this client.
	pub fn token_manager(&self) -> &Arc<TokenManager<C>> {
		&self.tokens
	}

	/// Rate limiter gating this client.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Performs `request`.
	///
	/// Returns `Ok(Some(_))` for successes and for application errors the client does not
	/// interpret, `Ok(None)` when the quota is exhausted, and `Err(_)` for missing credentials,
	/// token failures, a repeated token expiry, or network failures that outlived the retry
	/// budget.
	pub async fn call(&self, request: &ApiRequest) -> Result<Option<ApiResponse>> {
		const KIND: OpKind = OpKind::ApiCall;

		let span = OpSpan::for_environment(KIND, "call", self.environment.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.call_with_token_retry(request)).await;

		obs::record_result(KIND, &result);

		result
	}

	async fn call_with_token_retry(&self, request: &ApiRequest) -> Result<Option<ApiResponse>> {
		let credentials = self.tokens.credentials(self.environment)?;
		let mut token = self.tokens.get_token(self.environment, false).await?;
		let mut renewed = false;

		loop {
			let response =
				self.retry.run(|| self.send_once(request, credentials, &token)).await?;

			match self.classifier.classify(&response) {
				ResponseKind::Success => return Ok(Some(response)),
				ResponseKind::QuotaExceeded => {
					tracing::warn!(
						path = %request.path,
						tr_id = %request.tr_id,
						message = %response.summary(),
						"Call quota exceeded; not retrying."
					);

					return Ok(None);
				},
				ResponseKind::ApplicationError => {
					tracing::warn!(
						path = %request.path,
						tr_id = %request.tr_id,
						status = response.status,
						message = %response.summary(),
						"Broker returned an application error."
					);

					return Ok(Some(response));
				},
				ResponseKind::TokenExpired if !renewed => {
					tracing::info!(
						path = %request.path,
						message = %response.summary(),
						"Access token rejected; renewing once and retrying."
					);

					token = self.tokens.replace_rejected(self.environment, &token).await?;
					renewed = true;
				},
				ResponseKind::TokenExpired =>
					return Err(Error::TokenExpired { message: response.summary() }),
			}
		}
	}

	async fn send_once(
		&self,
		request: &ApiRequest,
		credentials: &AppCredentials,
		token: &AccessToken,
	) -> Result<ApiResponse> {
		let http_request = request.to_http(credentials, token)?;
		let http_client = &self.tokens.http_client;
		let response = self.limiter.execute(|| http_client.send(http_request)).await?;

		Ok(ApiResponse::from_http(response)?)
	}
}
#[cfg(feature = "reqwest")]
impl ApiClient<ReqwestHttpClient> {
	/// Creates a client whose limiter follows the environment's published quotas.
	pub fn for_environment(
		environment: Environment,
		tokens: Arc<TokenManager<ReqwestHttpClient>>,
	) -> Result<Self> {
		let limiter = RateLimiter::new(RateLimitConfig::for_environment(environment))?;

		Ok(Self::new(environment, tokens, Arc::new(limiter)))
	}
}
impl<C> Debug for ApiClient<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ApiClient")
			.field("environment", &self.environment)
			.field("limiter", &self.limiter)
			.field("retry", &self.retry)
			.finish()
	}
}
