// self
use crate::{
	_prelude::*,
	context::Context,
	error::TransportError,
	http::{ClientSnapshot, ResponseMetadata},
	limit::RateLimitKey,
	obs::{self, RequestOutcome, RequestSpan},
	request::{Item, PreparedRequest, Requester},
};

/// Successful response returned by [`Requester::send_payload_raw`].
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code (always 2xx).
	pub status: StatusCode,
	/// Response headers.
	pub headers: HeaderMap,
	/// Undecoded response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Decodes the body as JSON, reporting the failing path on error.
	///
	/// An empty body decodes as `null`, so `()` and `Option<_>` targets accept it.
	pub fn decode<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let body = if self.body.is_empty() { b"null".as_slice() } else { self.body.as_slice() };
		let mut deserializer = serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source, status: self.status.as_u16() })
	}

	fn metadata(&self) -> ResponseMetadata {
		ResponseMetadata::new(self.status, self.headers.clone())
	}
}

impl<K> Requester<K>
where
	K: RateLimitKey,
{
	/// Sends the request built by `factory` and decodes the JSON response into `T`.
	///
	/// `factory` runs once per attempt. The first item is built and validated before any limiter
	/// token is spent; retries rebuild it after their own limiter wait, so signatures and
	/// timestamps stay fresh.
	pub async fn send_payload<T, F>(&self, ctx: &Context, endpoint: K, factory: F) -> Result<T>
	where
		T: DeserializeOwned,
		F: FnMut() -> Result<Item>,
	{
		self.send_payload_raw(ctx, endpoint, factory).await?.decode()
	}

	/// Same as [`Requester::send_payload`] but returns the undecoded response.
	pub async fn send_payload_raw<F>(
		&self,
		ctx: &Context,
		endpoint: K,
		factory: F,
	) -> Result<RawResponse>
	where
		F: FnMut() -> Result<Item>,
	{
		let span = RequestSpan::new(&self.name, &endpoint);

		obs::record_request_outcome(&self.name, RequestOutcome::Attempt);

		let result = span.instrument(self.execute(ctx, endpoint, factory)).await;
		let outcome = match result {
			Ok(_) => RequestOutcome::Success,
			Err(_) => RequestOutcome::Failure,
		};

		obs::record_request_outcome(&self.name, outcome);

		result
	}

	async fn execute<F>(&self, ctx: &Context, endpoint: K, mut factory: F) -> Result<RawResponse>
	where
		F: FnMut() -> Result<Item>,
	{
		let base_url = self.base_url.as_ref();
		let mut first = Some(factory()?.into_request(base_url)?);
		let mut attempt = 0;

		loop {
			self.initiate_rate_limit(ctx, endpoint).await?;

			let request = match first.take() {
				Some(request) => request,
				None => factory()?.into_request(base_url)?,
			};
			let passback = request.header_passback.clone();
			let snapshot = self.client.snapshot()?;
			let outcome = ctx.scope(dispatch(&snapshot, request)).await?;
			let metadata = match &outcome {
				Ok(response) => {
					if let Some(passback) = &passback
						&& !passback.store(&response.headers)
					{
						obs::log_passback_dropped(response.status);
					}

					Some(response.metadata())
				},
				Err(_) => None,
			};
			let retry = self.retry_policy.check(metadata.as_ref(), outcome.as_ref().err())?;

			if !retry {
				return match outcome {
					Ok(response) if response.status.is_success() => Ok(response),
					Ok(response) => Err(Error::UnsuccessfulStatus {
						status: response.status.as_u16(),
						body: String::from_utf8_lossy(&response.body).into_owned(),
					}),
					Err(e) => Err(e.into()),
				};
			}

			let last_status = metadata.as_ref().map(|metadata| metadata.status.as_u16());

			if attempt >= self.max_retry_attempts {
				return Err(Error::RetryExhausted { attempts: attempt + 1, last_status });
			}

			attempt += 1;

			let delay = metadata
				.as_ref()
				.map(|metadata| metadata.retry_after(OffsetDateTime::now_utc()))
				.filter(|delay| !delay.is_zero())
				.unwrap_or_else(|| self.backoff.delay(attempt));

			obs::log_retry(attempt, delay, last_status);
			obs::record_retry(&self.name);

			ctx.sleep(delay).await?;
		}
	}
}

async fn dispatch(
	snapshot: &ClientSnapshot,
	request: PreparedRequest,
) -> Result<RawResponse, TransportError> {
	let PreparedRequest { method, url, headers, body, verbose, http_debugging, .. } = request;
	let logged = verbose || http_debugging;

	if logged {
		obs::log_request(&method, &url, &headers, body.as_deref().filter(|_| http_debugging));
	}

	let mut builder = snapshot.request(method, url).headers(headers);

	if let Some(body) = body {
		builder = builder.body(body);
	}

	let response = builder.send().await?;
	let status = response.status();
	let headers = response.headers().clone();
	let body = response.bytes().await?.to_vec();

	if logged {
		obs::log_response(status, &headers, &body, http_debugging);
	}

	Ok(RawResponse { status, headers, body })
}
