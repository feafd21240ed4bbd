//! Lease holder identifiers that tell coordinating processes apart.

// std
use std::{ops::Deref, process};
// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::_prelude::*;

const IDENTIFIER_MAX_LEN: usize = 128;
const RANDOM_SUFFIX_LEN: usize = 12;

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("Holder identifier cannot be empty.")]
	Empty,
	/// The identifier contains whitespace characters.
	#[error("Holder identifier contains whitespace.")]
	ContainsWhitespace,
	/// The identifier exceeded the allowed character count.
	#[error("Holder identifier exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted character count.
		max: usize,
	},
}

/// Identifies the process (or coordinator instance) holding a refresh lease.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HolderId(String);
impl HolderId {
	/// Creates a new identifier after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
		let view = value.as_ref();

		if view.is_empty() {
			return Err(IdentifierError::Empty);
		}
		if view.chars().any(char::is_whitespace) {
			return Err(IdentifierError::ContainsWhitespace);
		}
		if view.len() > IDENTIFIER_MAX_LEN {
			return Err(IdentifierError::TooLong { max: IDENTIFIER_MAX_LEN });
		}

		Ok(Self(view.to_owned()))
	}

	/// Generates `<pid>-<random>` so two processes on one host never collide.
	pub fn generate() -> Self {
		let suffix = rand::rng()
			.sample_iter(&Alphanumeric)
			.take(RANDOM_SUFFIX_LEN)
			.map(char::from)
			.collect::<String>();

		Self(format!("{}-{suffix}", process::id()))
	}
}
impl Deref for HolderId {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for HolderId {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Debug for HolderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("HolderId").field(&self.0).finish()
	}
}
impl Display for HolderId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl TryFrom<String> for HolderId {
	type Error = IdentifierError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl From<HolderId> for String {
	fn from(value: HolderId) -> Self {
		value.0
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn validation_rejects_blank_and_whitespace() {
		assert_eq!(HolderId::new(""), Err(IdentifierError::Empty));
		assert_eq!(HolderId::new("worker 1"), Err(IdentifierError::ContainsWhitespace));
		assert!(matches!(
			HolderId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { .. })
		));
	}

	#[test]
	fn generated_identifiers_are_unique_and_valid() {
		let first = HolderId::generate();
		let second = HolderId::generate();

		assert_ne!(first, second);
		assert!(first.starts_with(&process::id().to_string()));
		HolderId::new(first.as_ref()).expect("Generated identifier should pass validation.");
	}

	#[test]
	fn serde_round_trip_enforces_validation() {
		let holder: HolderId =
			serde_json::from_str("\"node-7\"").expect("Holder should deserialize successfully.");

		assert_eq!(holder.as_ref(), "node-7");
		assert!(serde_json::from_str::<HolderId>("\"with space\"").is_err());
	}
}
