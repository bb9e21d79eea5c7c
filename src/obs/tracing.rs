// self
use crate::{_prelude::*, obs::OperationKind};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedOperation<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedOperation<F> = F;

/// Span wrapping one interaction-client operation.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the operation kind + stage.
	pub fn new(kind: OperationKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span =
				tracing::debug_span!("broker_bridge.operation", operation = kind.as_str(), stage);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedOperation<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

// Debug-level event; compiled out without the `tracing` feature.
macro_rules! log_debug {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::debug!($($arg)+);
		}
	}};
}

// Warn-level event; compiled out without the `tracing` feature.
macro_rules! log_warn {
	($($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::warn!($($arg)+);
		}
	}};
}

pub(crate) use {log_debug, log_warn};

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn instrument_passes_the_output_through() {
		let span = OperationSpan::new(OperationKind::AcquireToken, "instrument_passes_output");
		let value = span.instrument(async { 7 }).await;

		assert_eq!(value, 7);
	}
}
