//! Endpoint-category keys and the immutable category-to-limiter map.

// self
use crate::{_prelude::*, limit::RateLimiter};

/// Key set a connector uses to pick the limiter governing a request.
pub trait RateLimitKey
where
	Self: 'static + Copy + Debug + Eq + Hash + Send + Sync,
{
}
impl<T> RateLimitKey for T where T: 'static + Copy + Debug + Eq + Hash + Send + Sync {}

/// Default endpoint categories for connectors that only split by authentication.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointLimit {
	/// Authenticated (private) endpoints.
	Auth,
	/// Unauthenticated (public) endpoints.
	Unauth,
}
impl EndpointLimit {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			EndpointLimit::Auth => "auth",
			EndpointLimit::Unauth => "unauth",
		}
	}
}
impl Display for EndpointLimit {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Mapping from endpoint category to the shared limiter enforcing it.
///
/// Built once during connector setup and handed to the requester, which only reads it.
#[derive(Clone, Debug)]
pub struct RateLimitDefinitions<K = EndpointLimit>
where
	K: RateLimitKey,
{
	limiters: HashMap<K, Arc<RateLimiter>>,
}
impl<K> RateLimitDefinitions<K>
where
	K: RateLimitKey,
{
	/// Creates an empty definition set.
	pub fn new() -> Self {
		Self { limiters: HashMap::new() }
	}

	/// Adds (or replaces) the limiter for `key`.
	pub fn insert(&mut self, key: K, limiter: impl Into<Arc<RateLimiter>>) {
		self.limiters.insert(key, limiter.into());
	}

	/// Builder-style variant of [`insert`](Self::insert).
	pub fn with(mut self, key: K, limiter: impl Into<Arc<RateLimiter>>) -> Self {
		self.insert(key, limiter);

		self
	}

	/// Looks up the limiter for `key`.
	pub fn get(&self, key: &K) -> Option<&Arc<RateLimiter>> {
		self.limiters.get(key)
	}

	/// Number of mapped categories.
	pub fn len(&self) -> usize {
		self.limiters.len()
	}

	/// Returns `true` when no category is mapped.
	pub fn is_empty(&self) -> bool {
		self.limiters.is_empty()
	}

	/// Iterates over every mapped category.
	pub fn iter(&self) -> impl Iterator<Item = (&K, &Arc<RateLimiter>)> {
		self.limiters.iter()
	}
}
impl<K> Default for RateLimitDefinitions<K>
where
	K: RateLimitKey,
{
	fn default() -> Self {
		Self::new()
	}
}
impl<K> FromIterator<(K, RateLimiter)> for RateLimitDefinitions<K>
where
	K: RateLimitKey,
{
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = (K, RateLimiter)>,
	{
		Self { limiters: iter.into_iter().map(|(key, limiter)| (key, Arc::new(limiter))).collect() }
	}
}
