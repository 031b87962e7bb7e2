// self
use crate::{
	_prelude::*,
	context::Context,
	http::{ClientFactory, ProtectedClient},
	limit::{EndpointLimit, RateLimitDefinitions, RateLimitKey},
	nonce::{Nonce, NonceKind},
	retry::{Backoff, DEFAULT_MAX_RETRY_ATTEMPTS, DefaultRetryPolicy, LinearBackoff, RetryPolicy},
};

/// Shared request engine for one connector.
///
/// The requester owns the HTTP client, the endpoint rate limits and their enable switch, the
/// retry policy and backoff, and the nonce counters. It is `Send + Sync`; wrap it in an
/// [`Arc`] and share it across every task that talks to the exchange.
pub struct Requester<K = EndpointLimit>
where
	K: RateLimitKey,
{
	pub(crate) name: String,
	pub(crate) client: ProtectedClient,
	pub(crate) limits: Option<RateLimitDefinitions<K>>,
	pub(crate) rate_limiter_enabled: AtomicBool,
	pub(crate) retry_policy: Arc<dyn RetryPolicy>,
	pub(crate) backoff: Arc<dyn Backoff>,
	pub(crate) max_retry_attempts: u32,
	pub(crate) base_url: Option<Url>,
	nonce: Nonce,
}
impl<K> Requester<K>
where
	K: RateLimitKey,
{
	/// Creates a requester with default policy, backoff, and no rate limit definitions.
	///
	/// Rate limiting starts enabled, so requests fail until definitions are installed through
	/// [`Requester::builder`] or the switch is turned off.
	pub fn new(name: impl Into<String>, client: ReqwestClient) -> Self {
		Self {
			name: name.into(),
			client: ProtectedClient::new(client),
			limits: None,
			rate_limiter_enabled: AtomicBool::new(true),
			retry_policy: Arc::new(DefaultRetryPolicy),
			backoff: Arc::new(LinearBackoff::default()),
			max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
			base_url: None,
			nonce: Nonce::default(),
		}
	}

	/// Starts building a requester.
	pub fn builder(name: impl Into<String>) -> RequesterBuilder<K> {
		RequesterBuilder::new(name)
	}

	/// Resolves an optional requester, failing when it was never set up.
	pub fn require(requester: Option<&Self>) -> Result<&Self> {
		requester.ok_or(Error::NotInitialized)
	}

	/// Name used in logs and metrics.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Retries performed after the first attempt.
	pub fn max_retry_attempts(&self) -> u32 {
		self.max_retry_attempts
	}

	/// Base URL relative item paths are joined onto.
	pub fn base_url(&self) -> Option<&Url> {
		self.base_url.as_ref()
	}

	/// Installed rate limit definitions.
	pub fn rate_limit_definitions(&self) -> Option<&RateLimitDefinitions<K>> {
		self.limits.as_ref()
	}

	/// Turns rate limiting on; fails if it already is.
	pub fn enable_rate_limiter(&self) -> Result<()> {
		self.rate_limiter_enabled
			.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
			.map(|_| ())
			.map_err(|_| Error::RateLimiterAlreadyEnabled)
	}

	/// Turns rate limiting off; fails if it already is.
	pub fn disable_rate_limiter(&self) -> Result<()> {
		self.rate_limiter_enabled
			.compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
			.map(|_| ())
			.map_err(|_| Error::RateLimiterAlreadyDisabled)
	}

	/// Returns `true` while limiter waits are enforced.
	pub fn is_rate_limiter_enabled(&self) -> bool {
		self.rate_limiter_enabled.load(Ordering::Acquire)
	}

	/// Waits on the limiter mapped to `endpoint` when limiting is enabled.
	pub async fn initiate_rate_limit(&self, ctx: &Context, endpoint: K) -> Result<()> {
		if !self.is_rate_limiter_enabled() {
			return Ok(());
		}

		let limits = self.limits.as_ref().ok_or(Error::RateLimiterDefinitionsMissing)?;
		let limiter = limits
			.get(&endpoint)
			.ok_or_else(|| Error::RateLimiterNotFound { endpoint: format!("{endpoint:?}") })?;

		limiter.wait(ctx).await?;

		Ok(())
	}

	/// Issues the next nonce of `kind`.
	pub fn nonce(&self, kind: NonceKind) -> i64 {
		self.nonce.get(kind)
	}

	/// Assigns the HTTP client; fails if the requester already owns one.
	pub fn set_http_client(&self, client: ReqwestClient) -> Result<()> {
		self.client.set_http_client(client)
	}

	/// Current HTTP client.
	pub fn http_client(&self) -> Result<ReqwestClient> {
		self.client.http_client()
	}

	/// Sets the deadline applied to subsequent requests.
	pub fn set_http_client_timeout(&self, timeout: StdDuration) -> Result<()> {
		self.client.set_timeout(timeout)
	}

	/// Current per-request timeout.
	pub fn http_client_timeout(&self) -> Result<Option<StdDuration>> {
		self.client.timeout()
	}

	/// Sets the user agent attached to subsequent requests.
	pub fn set_http_client_user_agent(&self, user_agent: impl Into<String>) -> Result<()> {
		self.client.set_user_agent(user_agent)
	}

	/// Current user agent.
	pub fn http_client_user_agent(&self) -> Result<Option<String>> {
		self.client.user_agent()
	}

	/// Routes subsequent requests through `proxy`.
	pub fn set_proxy(&self, proxy: &str) -> Result<()> {
		self.client.set_proxy(proxy)
	}

	/// Current proxy.
	pub fn proxy(&self) -> Result<Option<Url>> {
		self.client.proxy()
	}
}
impl<K> Debug for Requester<K>
where
	K: RateLimitKey,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Requester")
			.field("name", &self.name)
			.field("client_set", &self.client.is_set())
			.field("limits", &self.limits.as_ref().map(RateLimitDefinitions::len))
			.field("rate_limiter_enabled", &self.is_rate_limiter_enabled())
			.field("max_retry_attempts", &self.max_retry_attempts)
			.field("base_url", &self.base_url)
			.finish()
	}
}

/// Builder for [`Requester`] exposing every optional setting.
pub struct RequesterBuilder<K = EndpointLimit>
where
	K: RateLimitKey,
{
	name: String,
	http_client: Option<ReqwestClient>,
	client_factory: Option<ClientFactory>,
	limits: Option<RateLimitDefinitions<K>>,
	retry_policy: Arc<dyn RetryPolicy>,
	backoff: Arc<dyn Backoff>,
	max_retry_attempts: u32,
	rate_limiter_enabled: bool,
	base_url: Option<Url>,
	user_agent: Option<String>,
	timeout: Option<StdDuration>,
	proxy: Option<String>,
}
impl<K> RequesterBuilder<K>
where
	K: RateLimitKey,
{
	fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			http_client: None,
			client_factory: None,
			limits: None,
			retry_policy: Arc::new(DefaultRetryPolicy),
			backoff: Arc::new(LinearBackoff::default()),
			max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
			rate_limiter_enabled: true,
			base_url: None,
			user_agent: None,
			timeout: None,
			proxy: None,
		}
	}

	/// Uses `client` as the underlying transport.
	pub fn http_client(mut self, client: ReqwestClient) -> Self {
		self.http_client = Some(client);

		self
	}

	/// Sets the builder the client is rebuilt from on proxy changes.
	///
	/// Without [`http_client`](Self::http_client), the initial client is also built from it.
	pub fn client_builder<F>(mut self, f: F) -> Self
	where
		F: 'static + Send + Sync + Fn() -> reqwest::ClientBuilder,
	{
		self.client_factory = Some(ClientFactory::new(f));

		self
	}

	/// Installs the endpoint rate limit definitions.
	pub fn rate_limits(mut self, limits: RateLimitDefinitions<K>) -> Self {
		self.limits = Some(limits);

		self
	}

	/// Replaces the default retry policy.
	pub fn retry_policy(mut self, policy: impl 'static + RetryPolicy) -> Self {
		self.retry_policy = Arc::new(policy);

		self
	}

	/// Replaces the default backoff.
	pub fn backoff(mut self, backoff: impl 'static + Backoff) -> Self {
		self.backoff = Arc::new(backoff);

		self
	}

	/// Overrides the number of retries after the first attempt (defaults to
	/// [`DEFAULT_MAX_RETRY_ATTEMPTS`]).
	pub fn max_retry_attempts(mut self, attempts: u32) -> Self {
		self.max_retry_attempts = attempts;

		self
	}

	/// Sets whether rate limiting starts enabled.
	pub fn rate_limiter_enabled(mut self, enabled: bool) -> Self {
		self.rate_limiter_enabled = enabled;

		self
	}

	/// Joins relative item paths onto `base_url`.
	pub fn base_url(mut self, base_url: Url) -> Self {
		self.base_url = Some(base_url);

		self
	}

	/// Sets the user agent.
	pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
		self.user_agent = Some(user_agent.into());

		self
	}

	/// Sets the per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Routes requests through `proxy`.
	pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
		self.proxy = Some(proxy.into());

		self
	}

	/// Builds the requester.
	///
	/// Without an HTTP client or client builder the requester starts unconfigured: client settings
	/// fail with [`Error::NotInitialized`] and a client can be assigned once via
	/// [`Requester::set_http_client`].
	pub fn build(self) -> Result<Requester<K>> {
		let client = match (self.http_client, self.client_factory) {
			(Some(client), Some(factory)) => ProtectedClient::with_factory(client, factory),
			(Some(client), None) => ProtectedClient::new(client),
			(None, Some(factory)) => {
				let client =
					factory.builder().build().map_err(|source| Error::ClientBuild { source })?;

				ProtectedClient::with_factory(client, factory)
			},
			(None, None) => ProtectedClient::default(),
		};

		if let Some(timeout) = self.timeout {
			client.set_timeout(timeout)?;
		}
		if let Some(user_agent) = self.user_agent {
			client.set_user_agent(user_agent)?;
		}
		if let Some(proxy) = self.proxy {
			client.set_proxy(&proxy)?;
		}

		Ok(Requester {
			name: self.name,
			client,
			limits: self.limits,
			rate_limiter_enabled: AtomicBool::new(self.rate_limiter_enabled),
			retry_policy: self.retry_policy,
			backoff: self.backoff,
			max_retry_attempts: self.max_retry_attempts,
			base_url: self.base_url,
			nonce: Nonce::default(),
		})
	}
}
impl<K> Debug for RequesterBuilder<K>
where
	K: RateLimitKey,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RequesterBuilder")
			.field("name", &self.name)
			.field("http_client_set", &self.http_client.is_some())
			.field("client_factory_set", &self.client_factory.is_some())
			.field("max_retry_attempts", &self.max_retry_attempts)
			.field("rate_limiter_enabled", &self.rate_limiter_enabled)
			.finish()
	}
}
