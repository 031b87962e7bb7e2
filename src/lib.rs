//! Rate-limited, retrying HTTP request engine for exchange connectors.
//!
//! Weighted token buckets pace each endpoint category while the retry layer honors `Retry-After`
//! before falling back to backoff.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod context;
pub mod error;
pub mod http;
pub mod limit;
pub mod nonce;
pub mod obs;
pub mod request;
pub mod retry;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		limit::{EndpointLimit, RateLimitDefinitions, RateLimiter},
		request::{Item, Requester},
		retry::LinearBackoff,
	};

	/// Returns a reqwest builder with a short connect timeout so failures surface quickly.
	pub fn test_client_builder() -> reqwest::ClientBuilder {
		ReqwestClient::builder().connect_timeout(StdDuration::from_secs(2))
	}

	/// Builds a reqwest client from [`test_client_builder`].
	pub fn test_reqwest_client() -> ReqwestClient {
		test_client_builder().build().expect("Failed to build Reqwest client for tests.")
	}

	/// Returns definitions that never throttle, for tests that only exercise the executor.
	pub fn unbounded_test_limits() -> RateLimitDefinitions {
		RateLimitDefinitions::new()
			.with(EndpointLimit::Auth, RateLimiter::unbounded())
			.with(EndpointLimit::Unauth, RateLimiter::unbounded())
	}

	/// Constructs a [`Requester`] pointed at `base_url` with unbounded limits and a tiny backoff.
	pub fn build_test_requester(base_url: &str) -> Requester {
		Requester::builder("test-exchange")
			.http_client(test_reqwest_client())
			.client_builder(test_client_builder)
			.base_url(Url::parse(base_url).expect("Test base URL should parse."))
			.rate_limits(unbounded_test_limits())
			.backoff(LinearBackoff::new(StdDuration::from_millis(5), StdDuration::from_millis(20)))
			.build()
			.expect("Test requester should build.")
	}

	/// Builds a GET item for `path`.
	pub fn get_item(path: &str) -> Item {
		Item::new(path)
	}
}

mod _prelude {
	pub use std::{
		collections::HashMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		sync::{
			Arc, Weak,
			atomic::{AtomicBool, AtomicI64, Ordering},
		},
		time::Duration as StdDuration,
	};

	pub use parking_lot::{Mutex, RwLock};
	pub use reqwest::{
		Client as ReqwestClient, Error as ReqwestError, Method, StatusCode, header::HeaderMap,
	};
	pub use serde::{Deserialize, Serialize, de::DeserializeOwned};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
