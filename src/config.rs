//! Serializable requester settings for connectors that load limits and client options from files.

// self
use crate::{
	_prelude::*,
	limit::{RateLimitKey, RateLimiter},
	request::RequesterBuilder,
};

/// Client and retry settings applied onto a [`RequesterBuilder`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RequesterConfig {
	/// User agent attached to every request.
	pub user_agent: Option<String>,
	/// Per-request timeout in milliseconds.
	pub timeout_ms: Option<u64>,
	/// Proxy URL requests are routed through.
	pub proxy: Option<String>,
	/// Retries performed after the first attempt.
	pub max_retry_attempts: Option<u32>,
	/// Whether rate limiting starts enabled (defaults to `true`).
	pub rate_limiter_enabled: Option<bool>,
}
impl RequesterConfig {
	/// Copies every configured value onto `builder`.
	pub fn apply<K>(&self, mut builder: RequesterBuilder<K>) -> RequesterBuilder<K>
	where
		K: RateLimitKey,
	{
		if let Some(user_agent) = &self.user_agent {
			builder = builder.user_agent(user_agent.clone());
		}
		if let Some(timeout_ms) = self.timeout_ms {
			builder = builder.timeout(StdDuration::from_millis(timeout_ms));
		}
		if let Some(proxy) = &self.proxy {
			builder = builder.proxy(proxy.clone());
		}
		if let Some(attempts) = self.max_retry_attempts {
			builder = builder.max_retry_attempts(attempts);
		}
		if let Some(enabled) = self.rate_limiter_enabled {
			builder = builder.rate_limiter_enabled(enabled);
		}

		builder
	}
}

/// One published exchange limit: `count` weighted requests per `interval_ms`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
	/// Window length in milliseconds; zero disables the limit.
	pub interval_ms: u64,
	/// Requests allowed per window; zero disables the limit.
	pub count: u32,
	/// Tokens each request consumes.
	#[serde(default = "default_weight")]
	pub weight: u32,
	/// Bucket capacity.
	#[serde(default)]
	pub burst: Option<u32>,
}
impl RateLimitConfig {
	/// Builds the limiter described by this entry.
	pub fn build(&self) -> RateLimiter {
		let limiter =
			RateLimiter::new(StdDuration::from_millis(self.interval_ms), self.count, self.weight);

		match self.burst {
			Some(burst) => limiter.with_burst(burst),
			None => limiter,
		}
	}
}
impl From<RateLimitConfig> for RateLimiter {
	fn from(config: RateLimitConfig) -> Self {
		config.build()
	}
}

fn default_weight() -> u32 {
	1
}
