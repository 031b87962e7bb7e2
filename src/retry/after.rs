// crates.io
use reqwest::header::RETRY_AFTER;
use time::format_description::well_known::Rfc2822;
// self
use crate::_prelude::*;

/// Reads the `Retry-After` header as a delay relative to `now`.
///
/// Accepts a whole number of seconds or an HTTP date; dates in the past, fractional seconds, any
/// other format, and a missing header all yield [`StdDuration::ZERO`].
pub fn retry_after(headers: &HeaderMap, now: OffsetDateTime) -> StdDuration {
	parse_retry_after(headers, now).unwrap_or_default()
}

/// Returns `true` when the header is present and in one of the accepted formats.
pub fn has_retry_after(headers: &HeaderMap) -> bool {
	header_value(headers).is_some_and(|raw| {
		raw.parse::<u64>().is_ok() || OffsetDateTime::parse(raw, &Rfc2822).is_ok()
	})
}

fn parse_retry_after(headers: &HeaderMap, now: OffsetDateTime) -> Option<StdDuration> {
	let raw = header_value(headers)?;

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(StdDuration::from_secs(secs));
	}

	let moment = OffsetDateTime::parse(raw, &Rfc2822).ok()?;
	let delta = moment - now;

	if delta.is_positive() { delta.try_into().ok() } else { Some(StdDuration::ZERO) }
}

fn header_value(headers: &HeaderMap) -> Option<&str> {
	Some(headers.get(RETRY_AFTER)?.to_str().ok()?.trim())
}
