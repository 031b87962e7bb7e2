//! Retry classification, Retry-After parsing, and inter-attempt backoff.
//!
//! The requester consults a [`RetryPolicy`] after every attempt. When it asks for another try,
//! the pause is the server's `Retry-After` value if one parses to a non-zero delay, otherwise the
//! configured [`Backoff`]. Server-dictated pacing always wins.

mod after;
mod backoff;
mod policy;

pub use after::*;
pub use backoff::*;
pub use policy::*;

/// Retries performed after the first attempt unless configured otherwise.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;
