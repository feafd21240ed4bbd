//! Network token exchange against `POST /oauth2/tokenP`.

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials, Environment},
	error::{ConfigError, TransientError},
	http::{HttpMethod, HttpRequest, HttpResponse, HttpTransport},
	obs::{self, OpKind, OpOutcome, OpSpan},
	token::TokenManager,
};

/// Path of the client-credentials token endpoint, relative to the environment base URL.
pub const TOKEN_PATH: &str = "/oauth2/tokenP";

const BODY_PREVIEW_LIMIT: usize = 256;

#[derive(Debug, Serialize)]
struct TokenRequestBody<'a> {
	grant_type: &'static str,
	appkey: &'a str,
	appsecret: &'a str,
}

// `access_token_token_expired` is also returned (KST wall clock) but `expires_in` wins.
#[derive(Debug, Deserialize)]
struct TokenResponseBody {
	access_token: String,
	#[serde(default)]
	token_type: Option<String>,
	expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct TokenErrorBody {
	#[serde(default)]
	error_code: Option<String>,
	#[serde(default)]
	error_description: Option<String>,
}

impl<C> TokenManager<C>
where
	C: ?Sized + HttpTransport,
{
	/// Performs one token exchange, enforcing the per-environment issuance cooldown.
	pub(crate) async fn issue(
		&self,
		environment: Environment,
		credentials: &AppCredentials,
	) -> Result<AccessToken> {
		const KIND: OpKind = OpKind::TokenIssue;

		self.start_issue_attempt(environment)?;

		let span = OpSpan::for_environment(KIND, "issue", environment.as_str());

		obs::record_op_outcome(KIND, OpOutcome::Attempt);

		let result = span.instrument(self.exchange(environment, credentials)).await;

		obs::record_result(KIND, &result);

		match &result {
			Ok(token) => {
				self.metrics.record_issuance();
				tracing::info!(
					environment = environment.as_str(),
					expires_at = %token.expires_at,
					"Issued a new access token."
				);
			},
			Err(e) => tracing::warn!(
				environment = environment.as_str(),
				error = %e,
				"Token exchange failed."
			),
		}

		result
	}

	fn start_issue_attempt(&self, environment: Environment) -> Result<()> {
		let cooldown = self.policy.issue_cooldown;
		let now = Instant::now();
		let mut attempts = self.last_issue.lock();

		if let Some(last) = attempts.get(&environment) {
			let elapsed = now.saturating_duration_since(*last);

			if elapsed < cooldown {
				return Err(Error::IssueCooldown { environment, retry_in: cooldown - elapsed });
			}
		}

		attempts.insert(environment, now);

		Ok(())
	}

	async fn exchange(
		&self,
		environment: Environment,
		credentials: &AppCredentials,
	) -> Result<AccessToken> {
		let body = serde_json::to_vec(&TokenRequestBody {
			grant_type: "client_credentials",
			appkey: &credentials.app_key,
			appsecret: credentials.app_secret.expose(),
		})
		.map_err(ConfigError::EncodeParams)?;
		let request = HttpRequest::new(HttpMethod::Post, credentials.endpoint(TOKEN_PATH))
			.with_json_body(body);
		let response = self.http_client.send(request).await?;

		if !response.is_success() {
			return Err(map_token_failure(&response));
		}

		let parsed = response.json::<TokenResponseBody>()?;

		if parsed.expires_in <= 0 {
			return Err(Error::TokenEndpoint {
				status: response.status,
				message: format!("Token endpoint returned expires_in = {}", parsed.expires_in),
			});
		}

		let mut builder = AccessToken::builder(environment)
			.value(parsed.access_token)
			.issued_at(OffsetDateTime::now_utc())
			.expires_in(Duration::seconds(parsed.expires_in));

		if let Some(token_type) = parsed.token_type.filter(|value| !value.is_empty()) {
			builder = builder.token_type(token_type);
		}

		builder
			.build()
			.map_err(|e| Error::TokenEndpoint { status: response.status, message: e.to_string() })
	}
}

fn map_token_failure(response: &HttpResponse) -> Error {
	let detail = response.json::<TokenErrorBody>().unwrap_or_default();
	let message = match (detail.error_code, detail.error_description) {
		(Some(code), Some(description)) => format!("{code}: {description}"),
		(None, Some(description)) => description,
		(Some(code), None) => code,
		(None, None) => response.body_preview(BODY_PREVIEW_LIMIT),
	};

	if response.status >= 500 {
		TransientError::Upstream {
			message,
			status: Some(response.status),
			retry_after: response.retry_after,
		}
		.into()
	} else {
		Error::TokenEndpoint { status: response.status, message }
	}
}
