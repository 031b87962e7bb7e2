// self
use crate::obs::RequestOutcome;

/// Records a call outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(requester: &str, outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"exchange_request_total",
			"requester" => requester.to_owned(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (requester, outcome);
	}
}

/// Records a scheduled retry via the global metrics recorder (when enabled).
pub fn record_retry(requester: &str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("exchange_request_retry_total", "requester" => requester.to_owned())
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = requester;
	}
}
