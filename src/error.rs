//! Requester-level error types shared across the limiter, client, retry, and executor layers.

// self
use crate::{_prelude::*, context::ContextError};

/// Requester-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used for caller-supplied failures (custom retry policies, request factories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical requester error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// The requester (or its HTTP client) has not been set up.
	#[error("Request system has not been initialized.")]
	NotInitialized,
	/// An HTTP client was assigned to a requester that already owns one.
	#[error("Requester already owns an HTTP client; reconfigure it instead of replacing it.")]
	ClientReused,
	/// Proxy URL is empty or cannot be parsed.
	#[error("Proxy URL `{url}` is invalid.")]
	InvalidProxy {
		/// Rejected proxy string.
		url: String,
	},
	/// HTTP client could not be rebuilt (e.g., after a proxy change).
	#[error("HTTP client could not be constructed.")]
	ClientBuild {
		/// Underlying builder failure.
		#[source]
		source: ReqwestError,
	},

	/// Rate limiting is already on.
	#[error("Rate limiter is already enabled.")]
	RateLimiterAlreadyEnabled,
	/// Rate limiting is already off.
	#[error("Rate limiter is already disabled.")]
	RateLimiterAlreadyDisabled,
	/// Rate limiting is enabled but no definitions were installed.
	#[error("Rate limiter definitions have not been set.")]
	RateLimiterDefinitionsMissing,
	/// No limiter is mapped to the requested endpoint category.
	#[error("No rate limiter is defined for endpoint category `{endpoint}`.")]
	RateLimiterNotFound {
		/// Debug rendering of the unmapped key.
		endpoint: String,
	},

	/// Request descriptor failed validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Caller context was cancelled or its deadline passed.
	#[error(transparent)]
	Context(#[from] ContextError),

	/// Retry budget was spent without a usable response.
	#[error("Failed to retry request after {attempts} attempts.")]
	RetryExhausted {
		/// Total attempts performed, including the first one.
		attempts: u32,
		/// Status of the final response, when one was received.
		last_status: Option<u16>,
	},
	/// Server answered with a non-2xx status that the retry policy accepted as final.
	#[error("Unsuccessful HTTP status code {status}: {body}.")]
	UnsuccessfulStatus {
		/// HTTP status code.
		status: u16,
		/// Raw response body, lossily decoded.
		body: String,
	},
	/// Response body could not be decoded into the requested type.
	#[error("Response body could not be decoded.")]
	Decode {
		/// Structured parsing failure with the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the decoded response.
		status: u16,
	},
	/// Error produced by a custom retry policy or request factory.
	#[error(transparent)]
	Policy(BoxError),
}
impl Error {
	/// Wraps a caller-defined failure so it propagates unchanged through the executor.
	pub fn policy(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Policy(Box::new(src))
	}
}

/// Request descriptor validation failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ValidationError {
	/// Item path is empty.
	#[error("Request path must not be empty.")]
	PathEmpty,
	/// Item method is set but contains only whitespace.
	#[error("Request method must not be blank.")]
	MethodBlank,
	/// Item method is not a valid HTTP token.
	#[error("Request method `{method}` is invalid.")]
	MethodInvalid {
		/// Rejected method string.
		method: String,
	},
	/// Item path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be resolved into a URL.")]
	InvalidUrl {
		/// Rejected path.
		path: String,
	},
	/// Header passback was requested but its owner has been dropped.
	#[error("Header passback target has been dropped.")]
	HeaderPassbackDropped,
}

/// Transport-level failures, classified for the retry policy.
///
/// The type is cheap to clone; clones share the original source so policies can return the very
/// error they inspected and callers can compare it by identity.
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Host name resolution failed.
	#[error("DNS lookup for `{host}` failed.")]
	Dns {
		/// Host that could not be resolved.
		host: String,
		/// Whether the lookup failed by timing out.
		timeout: bool,
		/// Underlying resolver failure.
		#[source]
		source: SharedError,
	},
	/// Request or response exceeded the configured deadline.
	#[error("Request timed out.")]
	Timeout {
		/// Underlying transport failure.
		#[source]
		source: SharedError,
	},
	/// Any other network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Underlying transport failure.
		#[source]
		source: SharedError,
	},
}
impl TransportError {
	/// Builds a DNS failure.
	pub fn dns(
		host: impl Into<String>,
		timeout: bool,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Dns { host: host.into(), timeout, source: Arc::new(src) }
	}

	/// Wraps a generic network failure.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}

	/// Classifies a reqwest failure, detecting resolver errors from the source chain.
	pub fn from_reqwest(err: ReqwestError) -> Self {
		let host = err.url().and_then(|url| url.host_str()).unwrap_or_default().to_owned();
		let dns = is_dns_failure(&err);
		let timeout = err.is_timeout() || chain_has_timeout(&err);
		let source: SharedError = Arc::new(err);

		match (dns, timeout) {
			(true, timeout) => Self::Dns { host, timeout, source },
			(false, true) => Self::Timeout { source },
			(false, false) => Self::Network { source },
		}
	}

	/// Returns `true` for resolver failures that did not time out.
	pub fn is_dns_terminal(&self) -> bool {
		matches!(self, Self::Dns { timeout: false, .. })
	}

	/// Returns `true` for resolver failures caused by a lookup timeout.
	pub fn is_dns_timeout(&self) -> bool {
		matches!(self, Self::Dns { timeout: true, .. })
	}

	/// Returns `true` when `other` wraps the same underlying failure.
	pub fn same_source(&self, other: &Self) -> bool {
		Arc::ptr_eq(self.shared_source(), other.shared_source())
	}

	fn shared_source(&self) -> &SharedError {
		match self {
			Self::Dns { source, .. } | Self::Timeout { source } | Self::Network { source } =>
				source,
		}
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::from_reqwest(e)
	}
}

fn is_dns_failure(err: &ReqwestError) -> bool {
	if !err.is_connect() {
		return false;
	}

	let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);

	while let Some(inner) = current {
		let message = inner.to_string().to_ascii_lowercase();

		if message.contains("dns error") || message.contains("failed to lookup address") {
			return true;
		}

		current = inner.source();
	}

	false
}

fn chain_has_timeout(err: &ReqwestError) -> bool {
	let mut current = err.source();

	while let Some(inner) = current {
		if let Some(io) = inner.downcast_ref::<std::io::Error>()
			&& io.kind() == std::io::ErrorKind::TimedOut
		{
			return true;
		}

		current = inner.source();
	}

	false
}
