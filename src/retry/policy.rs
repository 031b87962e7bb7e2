// self
use crate::{
	_prelude::*,
	error::TransportError,
	http::ResponseMetadata,
	retry::after,
};

/// Decides whether an attempt should be retried.
///
/// Exactly one of `response` and `error` is present for every attempt. Returning `Ok(true)`
/// schedules another attempt; `Ok(false)` hands the outcome back to the caller as-is; `Err`
/// ends the call with that error, unwrapped.
pub trait RetryPolicy
where
	Self: Send + Sync,
{
	/// Classifies one attempt.
	fn check(
		&self,
		response: Option<&ResponseMetadata>,
		error: Option<&TransportError>,
	) -> Result<bool>;
}
impl<F> RetryPolicy for F
where
	F: Send + Sync + Fn(Option<&ResponseMetadata>, Option<&TransportError>) -> Result<bool>,
{
	fn check(
		&self,
		response: Option<&ResponseMetadata>,
		error: Option<&TransportError>,
	) -> Result<bool> {
		self(response, error)
	}
}

/// Built-in policy: retry throttling and DNS timeouts, stop on resolver failures.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultRetryPolicy;
impl RetryPolicy for DefaultRetryPolicy {
	fn check(
		&self,
		response: Option<&ResponseMetadata>,
		error: Option<&TransportError>,
	) -> Result<bool> {
		if let Some(err) = error {
			if err.is_dns_terminal() {
				return Err(Error::Transport(err.clone()));
			}

			return Ok(err.is_dns_timeout());
		}

		let Some(response) = response else {
			return Ok(false);
		};

		if response.status == StatusCode::TOO_MANY_REQUESTS {
			return Ok(true);
		}

		Ok(after::has_retry_after(&response.headers))
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use reqwest::header::RETRY_AFTER;
	// self
	use super::*;

	fn response(status: StatusCode) -> ResponseMetadata {
		ResponseMetadata::new(status, HeaderMap::new())
	}

	#[test]
	fn terminal_dns_error_is_returned_unchanged() {
		let dns =
			TransportError::dns("api.example.com", false, std::io::Error::other("no such host"));
		let err = DefaultRetryPolicy
			.check(None, Some(&dns))
			.expect_err("Non-timeout DNS errors should be terminal.");

		match err {
			Error::Transport(returned) => assert!(returned.same_source(&dns)),
			other => panic!("Unexpected error variant: {other:?}."),
		}
	}

	#[test]
	fn dns_timeout_is_retryable() {
		let dns = TransportError::dns(
			"api.example.com",
			true,
			std::io::Error::new(std::io::ErrorKind::TimedOut, "lookup timed out"),
		);

		assert!(DefaultRetryPolicy.check(None, Some(&dns)).expect("DNS timeouts should not fail."));
	}

	#[test]
	fn other_transport_errors_are_final() {
		let refused = TransportError::network(std::io::Error::other("connection refused"));

		assert!(!DefaultRetryPolicy.check(None, Some(&refused)).expect("Policy should not fail."));
	}

	#[test]
	fn status_codes() {
		assert!(
			DefaultRetryPolicy
				.check(Some(&response(StatusCode::TOO_MANY_REQUESTS)), None)
				.expect("429 should be retryable.")
		);
		assert!(
			!DefaultRetryPolicy
				.check(Some(&response(StatusCode::NOT_FOUND)), None)
				.expect("404 should be accepted as final.")
		);
	}

	#[test]
	fn retry_after_header_forces_retry_for_any_status() {
		for status in [StatusCode::OK, StatusCode::SERVICE_UNAVAILABLE, StatusCode::NOT_FOUND] {
			let mut meta = response(status);

			meta.headers.insert(RETRY_AFTER, "2".parse().expect("Header value should parse."));

			assert!(
				DefaultRetryPolicy.check(Some(&meta), None).expect("Policy should not fail."),
				"Status {status} with Retry-After should be retried."
			);
		}
	}

	#[test]
	fn closures_act_as_policies() {
		let never = |_: Option<&ResponseMetadata>, _: Option<&TransportError>| -> Result<bool> {
			Ok(false)
		};

		assert!(
			!never
				.check(Some(&response(StatusCode::TOO_MANY_REQUESTS)), None)
				.expect("Closure policy should not fail.")
		);
	}
}
