// self
use crate::_prelude::*;

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// A span wrapping one executor call, retries included.
#[derive(Clone, Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl RequestSpan {
	/// Creates a new span tagged with the requester name and endpoint category.
	pub fn new(requester: &str, endpoint: &dyn Debug) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"exchange_request.send",
				requester,
				endpoint = ?endpoint,
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (requester, endpoint);

			Self {}
		}
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
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

/// Logs an outgoing request when the item asks for verbose output.
pub(crate) fn log_request(method: &Method, url: &Url, headers: &HeaderMap, body: Option<&[u8]>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(
			%method,
			%url,
			headers = ?headers,
			body = body.map(String::from_utf8_lossy).as_deref(),
			"sending request"
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (method, url, headers, body);
	}
}

/// Logs a received response when the item asks for verbose or debugging output.
pub(crate) fn log_response(status: StatusCode, headers: &HeaderMap, body: &[u8], dump: bool) {
	#[cfg(feature = "tracing")]
	{
		if dump {
			tracing::debug!(
				status = status.as_u16(),
				headers = ?headers,
				body = %String::from_utf8_lossy(body),
				"received response"
			);
		} else {
			tracing::debug!(status = status.as_u16(), bytes = body.len(), "received response");
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (status, headers, body, dump);
	}
}

/// Logs response headers that could not be handed back because the owner was dropped.
pub(crate) fn log_passback_dropped(status: StatusCode) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(status = status.as_u16(), "header passback owner dropped; headers discarded");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = status;
	}
}

/// Logs a scheduled retry.
pub(crate) fn log_retry(attempt: u32, delay: StdDuration, status: Option<u16>) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, status, "retrying request");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, delay, status);
	}
}
