//! Optional observability helpers for request execution.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `exchange_request.send` with the `requester`
//!   and `endpoint` fields, plus debug events for verbose items and retries.
//! - Enable `metrics` to increment the `exchange_request_total` counter for every
//!   attempt/success/failure (labeled by `requester` + `outcome`) and the
//!   `exchange_request_retry_total` counter for every scheduled retry.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Entry to the executor.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Success => "success",
			RequestOutcome::Failure => "failure",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
