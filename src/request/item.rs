// crates.io
use reqwest::header::{HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	error::ValidationError,
	http::{HeaderPassback, HeaderPassbackHandle},
};

/// One attempt's worth of request data.
///
/// Items are produced by a caller-supplied factory for every attempt, retries included, so each
/// attempt owns a fresh body.
#[derive(Clone, Debug, Default)]
pub struct Item {
	/// Absolute URL, or a path joined onto the requester's base URL.
	pub path: String,
	/// HTTP method; an empty string means `GET`.
	pub method: String,
	/// Request headers.
	pub headers: HeaderMap,
	/// Request body.
	pub body: Option<Vec<u8>>,
	/// Receives the response headers, when set.
	pub header_passback: Option<HeaderPassbackHandle>,
	/// Logs the request line and response status.
	pub verbose: bool,
	/// Logs full request and response headers and bodies.
	pub http_debugging: bool,
}
impl Item {
	/// Creates a `GET` item for `path`.
	pub fn new(path: impl Into<String>) -> Self {
		Self { path: path.into(), ..Default::default() }
	}

	/// Sets the HTTP method.
	pub fn with_method(mut self, method: impl Into<String>) -> Self {
		self.method = method.into();

		self
	}

	/// Adds a header.
	pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Sets a raw body.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `payload` as a JSON body.
	pub fn with_json<T>(mut self, payload: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(payload)?);
		self.headers.insert(
			reqwest::header::CONTENT_TYPE,
			HeaderValue::from_static("application/json"),
		);

		Ok(self)
	}

	/// Copies the response headers into `target`.
	pub fn with_header_passback(mut self, target: &HeaderPassback) -> Self {
		self.header_passback = Some(target.handle());

		self
	}

	/// Enables verbose logging.
	pub fn verbose(mut self) -> Self {
		self.verbose = true;

		self
	}

	/// Enables full request/response dumps.
	pub fn http_debugging(mut self) -> Self {
		self.http_debugging = true;

		self
	}

	/// Checks the item and resolves its method.
	pub fn validate(&self) -> Result<Method, ValidationError> {
		if self.path.is_empty() {
			return Err(ValidationError::PathEmpty);
		}
		if let Some(handle) = &self.header_passback
			&& !handle.is_live()
		{
			return Err(ValidationError::HeaderPassbackDropped);
		}

		self.resolve_method()
	}

	fn resolve_method(&self) -> Result<Method, ValidationError> {
		if self.method.is_empty() {
			return Ok(Method::GET);
		}

		let trimmed = self.method.trim();

		if trimmed.is_empty() {
			return Err(ValidationError::MethodBlank);
		}

		Method::from_bytes(trimmed.to_ascii_uppercase().as_bytes())
			.map_err(|_| ValidationError::MethodInvalid { method: self.method.clone() })
	}

	fn resolve_url(&self, base: Option<&Url>) -> Result<Url, ValidationError> {
		let invalid = || ValidationError::InvalidUrl { path: self.path.clone() };

		match Url::parse(&self.path) {
			Ok(url) => Ok(url),
			Err(url::ParseError::RelativeUrlWithoutBase) =>
				base.ok_or_else(invalid)?.join(&self.path).map_err(|_| invalid()),
			Err(_) => Err(invalid()),
		}
	}

	/// Validates the item and converts it into a dispatchable request.
	pub(crate) fn into_request(self, base: Option<&Url>) -> Result<PreparedRequest, ValidationError> {
		let method = self.validate()?;
		let url = self.resolve_url(base)?;

		Ok(PreparedRequest {
			method,
			url,
			headers: self.headers,
			body: self.body,
			header_passback: self.header_passback,
			verbose: self.verbose,
			http_debugging: self.http_debugging,
		})
	}
}

/// Validated item ready to hand to the HTTP client.
#[derive(Debug)]
pub(crate) struct PreparedRequest {
	pub(crate) method: Method,
	pub(crate) url: Url,
	pub(crate) headers: HeaderMap,
	pub(crate) body: Option<Vec<u8>>,
	pub(crate) header_passback: Option<HeaderPassbackHandle>,
	pub(crate) verbose: bool,
	pub(crate) http_debugging: bool,
}
