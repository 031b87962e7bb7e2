//! Transport primitives shared by every request a requester sends.
//!
//! The module exposes [`ProtectedClient`], a synchronized owner of the underlying
//! [`ReqwestClient`], alongside [`ResponseMetadata`] (what the retry policy inspects) and
//! [`HeaderPassback`] (how callers receive response headers). Requests read an immutable
//! [`ClientSnapshot`]; setters build a replacement snapshot and swap it in, so an in-flight
//! request always sees either the old or the new configuration in full.

// crates.io
use reqwest::{ClientBuilder, Proxy, RequestBuilder, header::USER_AGENT};
// self
use crate::_prelude::*;

/// Produces the [`ClientBuilder`] a client is rebuilt from when its proxy changes.
///
/// Connect timeouts, TLS roots, and default headers configured here survive a proxy change.
/// Defaults to [`ReqwestClient::builder`].
#[derive(Clone)]
pub struct ClientFactory(Arc<dyn Fn() -> ClientBuilder + Send + Sync>);
impl ClientFactory {
	/// Wraps a builder-producing closure.
	pub fn new<F>(f: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> ClientBuilder,
	{
		Self(Arc::new(f))
	}

	/// Returns a fresh builder.
	pub fn builder(&self) -> ClientBuilder {
		(self.0)()
	}
}
impl Default for ClientFactory {
	fn default() -> Self {
		Self::new(ReqwestClient::builder)
	}
}
impl Debug for ClientFactory {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("ClientFactory(..)")
	}
}

/// Immutable view of the HTTP client configuration used by one request attempt.
#[derive(Clone, Debug)]
pub struct ClientSnapshot {
	client: ReqwestClient,
	factory: ClientFactory,
	timeout: Option<StdDuration>,
	user_agent: Option<String>,
	proxy: Option<Url>,
}
impl ClientSnapshot {
	fn new(client: ReqwestClient, factory: ClientFactory) -> Self {
		Self { client, factory, timeout: None, user_agent: None, proxy: None }
	}

	/// Underlying reqwest client.
	pub fn client(&self) -> &ReqwestClient {
		&self.client
	}

	/// Per-request timeout, if configured.
	pub fn timeout(&self) -> Option<StdDuration> {
		self.timeout
	}

	/// User agent attached to each request, if configured.
	pub fn user_agent(&self) -> Option<&str> {
		self.user_agent.as_deref()
	}

	/// Proxy the client routes through, if configured.
	pub fn proxy(&self) -> Option<&Url> {
		self.proxy.as_ref()
	}

	/// Starts a request carrying the snapshot's timeout and user agent.
	pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
		let mut builder = self.client.request(method, url);

		if let Some(timeout) = self.timeout {
			builder = builder.timeout(timeout);
		}
		if let Some(user_agent) = &self.user_agent {
			builder = builder.header(USER_AGENT, user_agent);
		}

		builder
	}
}

/// Synchronized owner of the requester's HTTP client.
///
/// The client is assigned exactly once; later changes go through the timeout, user agent, and
/// proxy setters, which keep the connection pool unless the proxy forces a rebuild.
#[derive(Debug, Default)]
pub struct ProtectedClient(RwLock<Option<Arc<ClientSnapshot>>>);
impl ProtectedClient {
	/// Wraps an existing reqwest client; proxy changes rebuild from [`ClientFactory::default`].
	pub fn new(client: ReqwestClient) -> Self {
		Self::with_factory(client, ClientFactory::default())
	}

	/// Wraps an existing reqwest client; proxy changes rebuild from `factory`.
	pub fn with_factory(client: ReqwestClient, factory: ClientFactory) -> Self {
		Self(RwLock::new(Some(Arc::new(ClientSnapshot::new(client, factory)))))
	}

	/// Returns the current snapshot for a request attempt.
	pub fn snapshot(&self) -> Result<Arc<ClientSnapshot>> {
		self.0.read().clone().ok_or(Error::NotInitialized)
	}

	/// Returns `true` once a client has been assigned.
	pub fn is_set(&self) -> bool {
		self.0.read().is_some()
	}

	/// Assigns the underlying client; fails if one is already owned.
	pub fn set_http_client(&self, client: ReqwestClient) -> Result<()> {
		let mut slot = self.0.write();

		if slot.is_some() {
			return Err(Error::ClientReused);
		}

		*slot = Some(Arc::new(ClientSnapshot::new(client, ClientFactory::default())));

		Ok(())
	}

	/// Current reqwest client.
	pub fn http_client(&self) -> Result<ReqwestClient> {
		Ok(self.snapshot()?.client.clone())
	}

	/// Sets the deadline applied to subsequent requests.
	pub fn set_timeout(&self, timeout: StdDuration) -> Result<()> {
		self.update(|snapshot| {
			snapshot.timeout = Some(timeout);

			Ok(())
		})
	}

	/// Current per-request timeout.
	pub fn timeout(&self) -> Result<Option<StdDuration>> {
		Ok(self.snapshot()?.timeout)
	}

	/// Sets the user agent attached to subsequent requests.
	pub fn set_user_agent(&self, user_agent: impl Into<String>) -> Result<()> {
		let user_agent = user_agent.into();

		self.update(|snapshot| {
			snapshot.user_agent = Some(user_agent);

			Ok(())
		})
	}

	/// Current user agent.
	pub fn user_agent(&self) -> Result<Option<String>> {
		Ok(self.snapshot()?.user_agent.clone())
	}

	/// Routes subsequent requests through `proxy`, rebuilding the client from its factory.
	pub fn set_proxy(&self, proxy: &str) -> Result<()> {
		let trimmed = proxy.trim();

		if trimmed.is_empty() {
			return Err(Error::InvalidProxy { url: proxy.into() });
		}

		let url = Url::parse(trimmed).map_err(|_| Error::InvalidProxy { url: proxy.into() })?;
		let rule = Proxy::all(url.as_str()).map_err(|_| Error::InvalidProxy { url: proxy.into() })?;
		let factory = self.snapshot()?.factory.clone();
		let client =
			factory.builder().proxy(rule).build().map_err(|source| Error::ClientBuild { source })?;

		self.update(|snapshot| {
			snapshot.client = client;
			snapshot.proxy = Some(url);

			Ok(())
		})
	}

	/// Current proxy.
	pub fn proxy(&self) -> Result<Option<Url>> {
		Ok(self.snapshot()?.proxy.clone())
	}

	fn update<F>(&self, f: F) -> Result<()>
	where
		F: FnOnce(&mut ClientSnapshot) -> Result<()>,
	{
		let mut slot = self.0.write();
		let current = slot.as_ref().ok_or(Error::NotInitialized)?;
		let mut next = ClientSnapshot::clone(current);

		f(&mut next)?;

		*slot = Some(Arc::new(next));

		Ok(())
	}
}

/// Status and headers of a response, as seen by the retry policy.
#[derive(Clone, Debug)]
pub struct ResponseMetadata {
	/// HTTP status code.
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
}
impl ResponseMetadata {
	/// Builds metadata from a status and header map.
	pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
		Self { status, headers }
	}

	/// Server-requested delay relative to `now`; zero when absent or unparseable.
	pub fn retry_after(&self, now: OffsetDateTime) -> StdDuration {
		crate::retry::retry_after(&self.headers, now)
	}
}

/// Caller-owned container that receives the headers of the final response.
///
/// Items hold a [`HeaderPassbackHandle`]; if the owner is dropped before the request runs, the
/// item fails validation instead of silently discarding the headers.
#[derive(Clone, Debug, Default)]
pub struct HeaderPassback(Arc<Mutex<HeaderMap>>);
impl HeaderPassback {
	/// Creates an empty container.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns a handle for attaching to an [`Item`](crate::request::Item).
	pub fn handle(&self) -> HeaderPassbackHandle {
		HeaderPassbackHandle(Arc::downgrade(&self.0))
	}

	/// Returns a copy of the captured headers.
	pub fn headers(&self) -> HeaderMap {
		self.0.lock().clone()
	}

	/// Returns the captured value for `name`, if present and valid UTF-8.
	pub fn get(&self, name: &str) -> Option<String> {
		self.0.lock().get(name).and_then(|value| value.to_str().ok()).map(str::to_owned)
	}

	/// Removes and returns the captured headers.
	pub fn take(&self) -> HeaderMap {
		std::mem::take(&mut *self.0.lock())
	}
}

/// Weak reference from an item to its [`HeaderPassback`].
#[derive(Clone, Debug)]
pub struct HeaderPassbackHandle(Weak<Mutex<HeaderMap>>);
impl HeaderPassbackHandle {
	/// Returns `true` while the owning [`HeaderPassback`] is alive.
	pub fn is_live(&self) -> bool {
		self.0.strong_count() > 0
	}

	/// Replaces the captured headers; returns `false` if the owner is gone.
	pub fn store(&self, headers: &HeaderMap) -> bool {
		match self.0.upgrade() {
			Some(target) => {
				*target.lock() = headers.clone();

				true
			},
			None => false,
		}
	}
}
