// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::{_prelude::*, obs::OpKind};

/// A span builder used by coordinator operations.
#[derive(Clone, Debug)]
pub struct OpSpan {
	span: Span,
}
impl OpSpan {
	/// Creates a new span tagged with the provided operation kind + stage.
	pub fn new(kind: OpKind, stage: &'static str) -> Self {
		Self { span: tracing::info_span!("quote_broker.op", op = kind.as_str(), stage) }
	}

	/// Creates a span that also records the environment being served.
	pub fn for_environment(kind: OpKind, stage: &'static str, environment: &str) -> Self {
		Self {
			span: tracing::info_span!(
				"quote_broker.op",
				op = kind.as_str(),
				stage,
				environment
			),
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.span.clone())
	}
}
