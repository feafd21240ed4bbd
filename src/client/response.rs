//! Broker API response envelopes.

// crates.io
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{_prelude::*, error::TransientError, http::HttpResponse};

/// Application-level result code that marks success, independent of the HTTP status.
pub const RT_CD_SUCCESS: &str = "0";

const BODY_PREVIEW_LIMIT: usize = 256;

/// Parsed broker response: HTTP status, the `rt_cd`/`msg_cd`/`msg1` envelope, and the full body.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Application result code (`"0"` on success).
	pub rt_cd: Option<String>,
	/// Structured message code such as `EGW00123`.
	pub msg_cd: Option<String>,
	/// Human-readable message.
	pub msg1: Option<String>,
	/// Full JSON body, envelope fields included.
	pub body: Value,
}
impl ApiResponse {
	/// Parses an HTTP response.
	///
	/// Unparseable bodies are transient failures, except on HTTP 429 where the status alone is
	/// enough to classify the call. A 5xx body without an envelope is also transient.
	pub fn from_http(response: HttpResponse) -> Result<Self, TransientError> {
		let body = match response.json::<Value>() {
			Ok(body) => body,
			Err(_) if response.status == 429 => Value::Null,
			Err(_) if response.status >= 500 => return Err(upstream_failure(&response)),
			Err(e) => return Err(e),
		};
		let field = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_owned);
		let rt_cd = field("rt_cd");
		let msg_cd = field("msg_cd");
		let msg1 = field("msg1").map(|message| message.trim().to_owned());

		if response.status >= 500 && rt_cd.is_none() && msg_cd.is_none() {
			return Err(upstream_failure(&response));
		}

		Ok(Self { status: response.status, rt_cd, msg_cd, msg1, body })
	}

	/// Returns `true` when the HTTP status is 2xx and `rt_cd` is absent or `"0"`.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
			&& self.rt_cd.as_deref().is_none_or(|code| code == RT_CD_SUCCESS)
	}

	/// Message suitable for logs: `msg_cd` and `msg1` when present, the status otherwise.
	pub fn summary(&self) -> String {
		match (&self.msg_cd, &self.msg1) {
			(Some(code), Some(message)) => format!("{code}: {message}"),
			(None, Some(message)) => message.clone(),
			(Some(code), None) => code.clone(),
			(None, None) => format!("HTTP {}", self.status),
		}
	}

	/// Deserializes the top-level field `name` (e.g. `output`, `output1`).
	pub fn output<T>(&self, name: &str) -> Result<Option<T>, TransientError>
	where
		T: DeserializeOwned,
	{
		let Some(value) = self.body.get(name).filter(|value| !value.is_null()) else {
			return Ok(None);
		};

		serde_path_to_error::deserialize(value)
			.map(Some)
			.map_err(|source| TransientError::ResponseParse { source, status: Some(self.status) })
	}
}

fn upstream_failure(response: &HttpResponse) -> TransientError {
	TransientError::Upstream {
		message: response.body_preview(BODY_PREVIEW_LIMIT),
		status: Some(response.status),
		retry_after: response.retry_after,
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn http(status: u16, body: &str) -> HttpResponse {
		HttpResponse { status, retry_after: None, body: body.as_bytes().to_vec() }
	}

	#[test]
	fn envelope_fields_are_extracted() {
		let response = ApiResponse::from_http(http(
			200,
			r#"{"rt_cd":"0","msg_cd":"MCA00000","msg1":"정상처리 되었습니다. ","output":{"stck_prpr":"71000"}}"#,
		))
		.expect("Envelope should parse.");

		assert!(response.is_success());
		assert_eq!(response.msg_cd.as_deref(), Some("MCA00000"));
		assert_eq!(response.msg1.as_deref(), Some("정상처리 되었습니다."));

		let output: Option<BTreeMap<String, String>> =
			response.output("output").expect("Output should decode.");

		let price = output.and_then(|fields| fields.get("stck_prpr").cloned());

		assert_eq!(price.as_deref(), Some("71000"));
		assert_eq!(response.output::<Value>("output2").expect("Missing field is fine."), None);
	}

	#[test]
	fn server_errors_keep_envelopes_but_not_bare_bodies() {
		let expired = ApiResponse::from_http(http(
			500,
			r#"{"rt_cd":"1","msg_cd":"EGW00123","msg1":"기간이 만료된 token 입니다."}"#,
		))
		.expect("Envelope on a 500 should parse.");

		assert!(!expired.is_success());
		assert_eq!(expired.summary(), "EGW00123: 기간이 만료된 token 입니다.");
		assert!(matches!(
			ApiResponse::from_http(http(502, "<html>Bad Gateway</html>")),
			Err(TransientError::Upstream { status: Some(502), .. })
		));
		assert!(matches!(
			ApiResponse::from_http(http(200, "not json")),
			Err(TransientError::ResponseParse { .. })
		));
		assert_eq!(
			ApiResponse::from_http(http(429, "")).expect("429 should not need a body.").body,
			Value::Null
		);
	}
}
