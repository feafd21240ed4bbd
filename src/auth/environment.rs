//! Broker environments (production vs. sandbox) sharing one protocol shape.

// std
use std::env;
// self
use crate::{_prelude::*, error::ConfigError};

/// Environment variable consulted by [`Environment::from_env`].
pub const ENVIRONMENT_VAR: &str = "KIS_ENVIRONMENT";

/// One of the two independent credential/endpoint sets offered by the broker.
#[derive(
	Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
	/// Live trading and market data.
	#[default]
	Prod,
	/// Paper-trading environment with tighter quotas.
	Sandbox,
}
impl Environment {
	/// Every environment, in a stable order.
	pub const ALL: [Self; 2] = [Self::Prod, Self::Sandbox];

	/// Returns a stable label suitable for store keys, span fields, and metrics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Prod => "prod",
			Self::Sandbox => "sandbox",
		}
	}

	/// Default REST base URL published by the broker for this environment.
	pub const fn default_base_url(self) -> &'static str {
		match self {
			Self::Prod => "https://openapi.koreainvestment.com:9443",
			Self::Sandbox => "https://openapivts.koreainvestment.com:29443",
		}
	}

	/// Reads the active environment from `KIS_ENVIRONMENT`, defaulting to production.
	pub fn from_env() -> Result<Self, ConfigError> {
		match env::var(ENVIRONMENT_VAR) {
			Ok(value) if !value.trim().is_empty() => value.parse(),
			_ => Ok(Self::default()),
		}
	}
}
impl Display for Environment {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for Environment {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"prod" | "production" | "real" => Ok(Self::Prod),
			"sandbox" | "vts" | "paper" => Ok(Self::Sandbox),
			_ => Err(ConfigError::UnknownEnvironment(s.to_owned())),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn parses_aliases_and_rejects_unknown_labels() {
		assert_eq!("prod".parse::<Environment>().expect("prod should parse"), Environment::Prod);
		assert_eq!(" VTS ".parse::<Environment>().expect("vts should parse"), Environment::Sandbox);
		assert!(matches!(
			"staging".parse::<Environment>(),
			Err(ConfigError::UnknownEnvironment(label)) if label == "staging"
		));
	}

	#[test]
	fn serde_uses_lowercase_labels() {
		let payload = serde_json::to_string(&Environment::Sandbox)
			.expect("Environment should serialize to JSON.");

		assert_eq!(payload, "\"sandbox\"");
		assert_eq!(Environment::Sandbox.to_string(), "sandbox");
	}
}
