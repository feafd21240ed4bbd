//! Transport primitives for token exchanges and broker API calls.
//!
//! The module exposes [`HttpTransport`] alongside crate-owned [`HttpRequest`] and
//! [`HttpResponse`] types so downstream crates can plug in custom HTTP clients (or test
//! doubles) without the coordinator depending on their request builders. The default
//! reqwest-backed implementation lives behind the `reqwest` feature.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{TransientError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a, T> =
	Pin<Box<dyn Future<Output = Result<T, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports used for every outbound call.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by the
/// token manager and the API client behind an `Arc`. A transport only reports failures where
/// no response was received; any HTTP status, including 4xx/5xx, is a successful send.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends the request and buffers the full response body.
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse>;
}

/// HTTP verbs used by the broker API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
	/// Parameters travel in the query string.
	#[default]
	Get,
	/// Parameters travel in a JSON body.
	Post,
}
impl HttpMethod {
	/// Returns the canonical verb.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
		}
	}
}
impl Display for HttpMethod {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully prepared outbound request.
#[derive(Clone)]
pub struct HttpRequest {
	/// Verb to send.
	pub method: HttpMethod,
	/// Absolute URL, query string included.
	pub url: Url,
	/// Header name/value pairs in insertion order.
	pub headers: Vec<(String, String)>,
	/// JSON body, if any.
	pub body: Option<Vec<u8>>,
}
impl HttpRequest {
	/// Creates a request without headers or body.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Attaches a JSON body and the matching content type.
	pub fn with_json_body(mut self, body: Vec<u8>) -> Self {
		self.headers.push(("content-type".into(), "application/json; charset=utf-8".into()));
		self.body = Some(body);

		self
	}

	/// Returns the first header value matching `name` (case-insensitive).
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.iter()
			.find(|(key, _)| key.eq_ignore_ascii_case(name))
			.map(|(_, value)| value.as_str())
	}
}
impl Debug for HttpRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let header_names = self.headers.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>();

		f.debug_struct("HttpRequest")
			.field("method", &self.method)
			.field("url", &self.url.as_str())
			.field("headers", &header_names)
			.field("body_len", &self.body.as_ref().map(Vec::len))
			.finish()
	}
}

/// Buffered response plus the metadata the retry layer cares about.
#[derive(Clone, Debug, Default)]
pub struct HttpResponse {
	/// HTTP status code.
	pub status: u16,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<StdDuration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Lossy UTF-8 preview of the body, capped at `limit` characters.
	pub fn body_preview(&self, limit: usize) -> String {
		let text = String::from_utf8_lossy(&self.body);

		if text.chars().count() <= limit {
			return text.into_owned();
		}

		let mut buf = text.chars().take(limit).collect::<String>();

		buf.push('…');

		buf
	}

	/// Deserializes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T, TransientError>
	where
		T: DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| TransientError::ResponseParse { source, status: Some(self.status) })
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client with a per-request timeout.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, crate::error::ConfigError> {
		Ok(Self(ReqwestClient::builder().timeout(timeout).build()?))
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestHttpClient {
	fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
		let client = self.0.clone();

		Box::pin(async move {
			let endpoint = request.url.path().to_owned();
			let method = match request.method {
				HttpMethod::Get => reqwest::Method::GET,
				HttpMethod::Post => reqwest::Method::POST,
			};
			let mut builder = client.request(method, request.url);

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder
				.send()
				.await
				.map_err(|e| TransportError::network(endpoint.clone(), e))?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response
				.bytes()
				.await
				.map_err(|e| TransportError::network(endpoint, e))?
				.to_vec();

			Ok(HttpResponse { status, retry_after, body })
		})
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<StdDuration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return delta.try_into().ok();
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_debug_hides_header_values() {
		let request = HttpRequest::new(
			HttpMethod::Post,
			Url::parse("https://example.com/oauth2/tokenP").expect("Fixture URL should parse."),
		)
		.with_header("appsecret", "shh")
		.with_json_body(b"{}".to_vec());
		let rendered = format!("{request:?}");

		assert!(rendered.contains("appsecret"));
		assert!(!rendered.contains("shh"));
		assert_eq!(request.header("Content-Type"), Some("application/json; charset=utf-8"));
	}

	#[test]
	fn body_preview_truncates_long_payloads() {
		let response =
			HttpResponse { status: 500, retry_after: None, body: "x".repeat(300).into_bytes() };

		assert!(!response.is_success());
		assert_eq!(response.body_preview(10), format!("{}…", "x".repeat(10)));
		assert_eq!(response.body_preview(400).len(), 300);
	}

	#[cfg(feature = "reqwest")]
	#[test]
	fn retry_after_accepts_seconds() {
		let mut headers = HeaderMap::new();

		headers.insert(RETRY_AFTER, "3".parse().expect("Header value should parse."));

		assert_eq!(parse_retry_after(&headers), Some(StdDuration::from_secs(3)));
		assert_eq!(parse_retry_after(&HeaderMap::new()), None);
	}
}
