//! Response classification hooks.
//!
//! The broker reports failures inside a JSON envelope rather than through HTTP statuses, so a
//! [`ResponseClassifier`] maps each parsed [`ApiResponse`] onto the handful of outcomes the
//! client acts on. Structured `msg_cd` codes are authoritative; message text is only consulted
//! when no known code is present.

// self
use crate::{_prelude::*, client::ApiResponse};

/// Outcome categories the client reacts to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseKind {
	/// Call succeeded.
	Success,
	/// Bearer token is expired or invalid; refresh once and retry.
	TokenExpired,
	/// Call quota exhausted; never retried.
	QuotaExceeded,
	/// Any other application error; handed back to the caller.
	ApplicationError,
}

/// Maps parsed responses onto [`ResponseKind`]s.
pub trait ResponseClassifier
where
	Self: Send + Sync,
{
	/// Classifies one response.
	fn classify(&self, response: &ApiResponse) -> ResponseKind;
}

/// Classifier for the Korea Investment & Securities open API.
#[derive(Clone, Debug)]
pub struct KisResponseClassifier {
	/// `msg_cd` values meaning the bearer token must be replaced.
	pub token_expired_codes: Vec<String>,
	/// `msg_cd` values meaning the call quota is exhausted.
	pub quota_codes: Vec<String>,
	/// Lowercase message fragments meaning the bearer token must be replaced.
	pub token_expired_hints: Vec<String>,
	/// Lowercase message fragments meaning the call quota is exhausted.
	pub quota_hints: Vec<String>,
}
impl Default for KisResponseClassifier {
	fn default() -> Self {
		fn owned(values: &[&str]) -> Vec<String> {
			values.iter().map(|value| (*value).to_owned()).collect()
		}

		Self {
			token_expired_codes: owned(&["EGW00123", "EGW00121"]),
			quota_codes: owned(&["EGW00201"]),
			token_expired_hints: owned(&[
				"만료된 token",
				"유효하지 않은 token",
				"token expired",
				"expired token",
				"invalid token",
			]),
			quota_hints: owned(&["초당 거래건수", "rate limit", "too many requests"]),
		}
	}
}
impl ResponseClassifier for KisResponseClassifier {
	fn classify(&self, response: &ApiResponse) -> ResponseKind {
		if let Some(code) = response.msg_cd.as_deref() {
			if self.token_expired_codes.iter().any(|known| known == code) {
				return ResponseKind::TokenExpired;
			}
			if self.quota_codes.iter().any(|known| known == code) {
				return ResponseKind::QuotaExceeded;
			}
		}
		if response.status == 429 {
			return ResponseKind::QuotaExceeded;
		}
		if response.is_success() {
			return ResponseKind::Success;
		}
		if let Some(message) = response.msg1.as_deref() {
			let message = message.to_lowercase();

			if self.quota_hints.iter().any(|hint| message.contains(hint.as_str())) {
				return ResponseKind::QuotaExceeded;
			}
			if self.token_expired_hints.iter().any(|hint| message.contains(hint.as_str())) {
				return ResponseKind::TokenExpired;
			}
		}

		ResponseKind::ApplicationError
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::Value;
	// self
	use super::*;

	fn response(status: u16, rt_cd: &str, msg_cd: Option<&str>, msg1: &str) -> ApiResponse {
		ApiResponse {
			status,
			rt_cd: Some(rt_cd.into()),
			msg_cd: msg_cd.map(Into::into),
			msg1: Some(msg1.into()),
			body: Value::Null,
		}
	}

	#[test]
	fn structured_codes_win_over_message_text() {
		let classifier = KisResponseClassifier::default();

		assert_eq!(
			classifier.classify(&response(500, "1", Some("EGW00123"), "anything")),
			ResponseKind::TokenExpired
		);
		assert_eq!(
			classifier.classify(&response(500, "1", Some("EGW00201"), "token expired")),
			ResponseKind::QuotaExceeded
		);
		assert_eq!(
			classifier.classify(&response(200, "0", Some("MCA00000"), "정상처리")),
			ResponseKind::Success
		);
	}

	#[test]
	fn message_fragments_are_a_fallback() {
		let classifier = KisResponseClassifier::default();

		assert_eq!(
			classifier.classify(&response(500, "1", None, "초당 거래건수를 초과하였습니다.")),
			ResponseKind::QuotaExceeded
		);
		assert_eq!(
			classifier.classify(&response(401, "1", None, "Token Expired")),
			ResponseKind::TokenExpired
		);
		assert_eq!(
			classifier.classify(&response(200, "7", Some("APBK0013"), "주문 가능 수량 부족")),
			ResponseKind::ApplicationError
		);

		let throttled = ApiResponse {
			status: 429,
			rt_cd: None,
			msg_cd: None,
			msg1: None,
			body: Value::Null,
		};

		assert_eq!(classifier.classify(&throttled), ResponseKind::QuotaExceeded);
	}
}
