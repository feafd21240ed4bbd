//! App key/secret pairs and the per-environment credential registry.

// std
use std::env;
// crates.io
use base64::{Engine as _, engine::general_purpose::STANDARD_NO_PAD};
use sha2::{Digest, Sha256};
// self
use crate::{
	_prelude::*,
	auth::{Environment, TokenSecret},
	error::ConfigError,
};

/// App key, app secret, and REST base URL for one environment.
#[derive(Clone)]
pub struct AppCredentials {
	/// Public app key sent as the `appkey` header.
	pub app_key: String,
	/// App secret sent as the `appsecret` header; never logged.
	pub app_secret: TokenSecret,
	/// REST base URL every endpoint path is joined onto.
	pub base_url: Url,
}
impl AppCredentials {
	/// Validates and bundles the credential triple.
	pub fn new(
		app_key: impl Into<String>,
		app_secret: impl Into<String>,
		base_url: Url,
	) -> Result<Self, ConfigError> {
		let app_key = app_key.into().trim().to_owned();
		let app_secret = app_secret.into().trim().to_owned();

		if app_key.is_empty() {
			return Err(ConfigError::EmptyCredential { field: "app key" });
		}
		if app_secret.is_empty() {
			return Err(ConfigError::EmptyCredential { field: "app secret" });
		}

		Ok(Self { app_key, app_secret: TokenSecret::new(app_secret), base_url })
	}

	/// Stable fingerprint of the app key so shared records never carry the key itself.
	///
	/// The fingerprint is a base64 (no padding) encoding of the SHA-256 digest of the key.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();

		hasher.update(self.app_key.as_bytes());

		STANDARD_NO_PAD.encode(hasher.finalize())
	}

	/// Joins `path` onto the base URL, tolerating a missing or doubled leading slash.
	pub fn endpoint(&self, path: &str) -> Url {
		let mut url = self.base_url.clone();
		let base_path = url.path().trim_end_matches('/').to_owned();
		let suffix = path.trim_start_matches('/');

		url.set_path(&format!("{base_path}/{suffix}"));

		url
	}
}
impl Debug for AppCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AppCredentials")
			.field("app_key", &self.app_key)
			.field("app_secret", &"<redacted>")
			.field("base_url", &self.base_url.as_str())
			.finish()
	}
}

/// Registry of credentials keyed by [`Environment`].
#[derive(Clone, Debug, Default)]
pub struct CredentialSet(HashMap<Environment, AppCredentials>);
impl CredentialSet {
	/// Adds or replaces the credentials for `environment`.
	pub fn with(mut self, environment: Environment, credentials: AppCredentials) -> Self {
		self.0.insert(environment, credentials);

		self
	}

	/// Returns the credentials for `environment`, if configured.
	pub fn get(&self, environment: Environment) -> Option<&AppCredentials> {
		self.0.get(&environment)
	}

	/// Environments that have credentials configured.
	pub fn environments(&self) -> impl Iterator<Item = Environment> + '_ {
		Environment::ALL.into_iter().filter(|environment| self.0.contains_key(environment))
	}

	/// Loads credentials from the process environment.
	///
	/// Production reads `KIS_APP_KEY`, `KIS_APP_SECRET`, and optionally `KIS_BASE_URL`;
	/// the sandbox reads the same names with a `KIS_SANDBOX_` prefix. An environment is
	/// skipped when its key or secret is unset.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut set = Self::default();

		for environment in Environment::ALL {
			let prefix = match environment {
				Environment::Prod => "KIS_",
				Environment::Sandbox => "KIS_SANDBOX_",
			};
			let (Ok(key), Ok(secret)) =
				(env::var(format!("{prefix}APP_KEY")), env::var(format!("{prefix}APP_SECRET")))
			else {
				continue;
			};
			let raw_url = env::var(format!("{prefix}BASE_URL"))
				.unwrap_or_else(|_| environment.default_base_url().to_owned());
			let base_url = Url::parse(&raw_url)
				.map_err(|source| ConfigError::InvalidUrl { value: raw_url.clone(), source })?;

			set = set.with(environment, AppCredentials::new(key, secret, base_url)?);
		}

		Ok(set)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn credentials(base: &str) -> AppCredentials {
		AppCredentials::new("key", "secret", Url::parse(base).expect("Fixture URL should parse."))
			.expect("Fixture credentials should be valid.")
	}

	#[test]
	fn rejects_blank_key_and_secret() {
		let url = Url::parse("https://example.com").expect("Fixture URL should parse.");

		assert!(matches!(
			AppCredentials::new(" ", "secret", url.clone()),
			Err(ConfigError::EmptyCredential { field: "app key" })
		));
		assert!(matches!(
			AppCredentials::new("key", "", url),
			Err(ConfigError::EmptyCredential { field: "app secret" })
		));
	}

	#[test]
	fn endpoint_joins_paths_without_losing_base_prefix() {
		let plain = credentials("https://example.com:9443");
		let nested = credentials("https://example.com/proxy/");

		assert_eq!(
			plain.endpoint("/oauth2/tokenP").as_str(),
			"https://example.com:9443/oauth2/tokenP"
		);
		assert_eq!(
			nested.endpoint("uapi/quotations").as_str(),
			"https://example.com/proxy/uapi/quotations"
		);
	}

	#[test]
	fn debug_redacts_secret_and_fingerprint_is_stable() {
		let creds = credentials("https://example.com");
		let rendered = format!("{creds:?}");

		assert!(!rendered.contains("\"secret\""));
		assert!(rendered.contains("<redacted>"));
		assert_eq!(creds.fingerprint(), credentials("https://other.example.com").fingerprint());

		let other = AppCredentials::new(
			"other-key",
			"secret",
			Url::parse("https://example.com").expect("Fixture URL should parse."),
		)
		.expect("Fixture credentials should be valid.");

		assert_ne!(creds.fingerprint(), other.fingerprint());
	}
}
