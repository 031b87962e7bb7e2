//! Request descriptors, the shared [`Requester`], and its retrying executor.
//!
//! A call hands the requester an endpoint category and a factory closure. The factory builds a
//! fresh [`Item`] for every attempt; the executor waits on the category's limiter, sends the
//! item through the current client snapshot, and lets the retry policy decide what happens next.

mod executor;
mod item;
mod requester;

pub use executor::*;
pub use item::*;
pub use requester::*;
