//! Weighted rate limiting keyed by endpoint category.
//!
//! Connectors describe their exchange's published limits as [`RateLimiter`] instances, group them
//! in [`RateLimitDefinitions`], and hand the result to the requester. The requester consults the
//! map for every attempt (retries included) while its enable switch is on.

mod bucket;
mod definitions;

pub use bucket::*;
pub use definitions::*;
