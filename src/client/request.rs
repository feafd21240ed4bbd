//! Broker API request descriptions.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, AppCredentials},
	error::ConfigError,
	http::{HttpMethod, HttpRequest},
};

/// Customer type sent with every call; `P` marks an individual account.
pub const CUSTOMER_TYPE: &str = "P";

/// One broker API call: endpoint path, operation code, and parameters.
///
/// GET calls send the parameters as a query string; POST calls send them as a JSON object.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// Verb to use.
	pub method: HttpMethod,
	/// Path relative to the environment base URL.
	pub path: String,
	/// Operation code sent as the `tr_id` header.
	pub tr_id: String,
	/// Continuation marker sent as the `tr_cont` header for paged lookups.
	pub tr_cont: Option<String>,
	/// Request parameters.
	pub params: Map<String, Value>,
}
impl ApiRequest {
	/// Creates a request without parameters.
	pub fn new(method: HttpMethod, path: impl Into<String>, tr_id: impl Into<String>) -> Self {
		Self {
			method,
			path: path.into(),
			tr_id: tr_id.into(),
			tr_cont: None,
			params: Map::new(),
		}
	}

	/// Shorthand for a GET request.
	pub fn get(path: impl Into<String>, tr_id: impl Into<String>) -> Self {
		Self::new(HttpMethod::Get, path, tr_id)
	}

	/// Shorthand for a POST request.
	pub fn post(path: impl Into<String>, tr_id: impl Into<String>) -> Self {
		Self::new(HttpMethod::Post, path, tr_id)
	}

	/// Adds or replaces one parameter.
	pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.params.insert(name.into(), value.into());

		self
	}

	/// Merges every field of a serializable struct or map into the parameters.
	pub fn with_params<T>(mut self, params: &T) -> Result<Self, ConfigError>
	where
		T: ?Sized + Serialize,
	{
		match serde_json::to_value(params).map_err(ConfigError::EncodeParams)? {
			Value::Object(fields) => self.params.extend(fields),
			Value::Null => {},
			other => {
				return Err(ConfigError::EncodeParams(serde::ser::Error::custom(format!(
					"parameters must serialize to an object, got {other}"
				))));
			},
		}

		Ok(self)
	}

	/// Sets the continuation marker.
	pub fn with_tr_cont(mut self, tr_cont: impl Into<String>) -> Self {
		self.tr_cont = Some(tr_cont.into());

		self
	}

	/// Builds the authenticated HTTP request.
	pub(crate) fn to_http(
		&self,
		credentials: &AppCredentials,
		token: &AccessToken,
	) -> Result<HttpRequest, ConfigError> {
		let mut url = credentials.endpoint(&self.path);

		if self.method == HttpMethod::Get && !self.params.is_empty() {
			let mut query = url.query_pairs_mut();

			for (name, value) in &self.params {
				query.append_pair(name, &query_value(value));
			}
		}

		let mut request = HttpRequest::new(self.method, url)
			.with_header("authorization", token.bearer())
			.with_header("appkey", credentials.app_key.as_str())
			.with_header("appsecret", credentials.app_secret.expose())
			.with_header("tr_id", self.tr_id.as_str())
			.with_header("custtype", CUSTOMER_TYPE);

		if let Some(tr_cont) = &self.tr_cont {
			request = request.with_header("tr_cont", tr_cont.as_str());
		}
		if self.method == HttpMethod::Post {
			let body = serde_json::to_vec(&self.params).map_err(ConfigError::EncodeParams)?;

			request = request.with_json_body(body);
		}

		Ok(request)
	}
}

fn query_value(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}
