//! Observability helpers shared by the token manager, client, and batcher.
//!
//! Spans are always emitted through `tracing` under the name `quote_broker.op` with the `op`
//! and `stage` fields. Enable the `metrics` feature to increment the `quote_broker_op_total`
//! counter for every attempt/success/failure, labeled by `op` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Coordinator operations observed by spans and counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
	/// Token lookup through the cache layers.
	TokenLookup,
	/// Network token exchange against the OAuth endpoint.
	TokenIssue,
	/// Authenticated broker API call.
	ApiCall,
	/// One drained batch of queued quote lookups.
	BatchDrain,
}
impl OpKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpKind::TokenLookup => "token_lookup",
			OpKind::TokenIssue => "token_issue",
			OpKind::ApiCall => "api_call",
			OpKind::BatchDrain => "batch_drain",
		}
	}
}
impl Display for OpKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpOutcome {
	/// Entry to a coordinator helper.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl OpOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			OpOutcome::Attempt => "attempt",
			OpOutcome::Success => "success",
			OpOutcome::Failure => "failure",
		}
	}
}
impl Display for OpOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
