// std
use std::time::Instant;
// crates.io
use httpmock::prelude::*;
// self
use exchange_request::{
	_preludet::*,
	context::{Context, ContextError},
	error::ValidationError,
	limit::{EndpointLimit, RateLimitDefinitions, RateLimiter},
	request::Requester,
};

fn paced_requester(server: &MockServer) -> Requester {
	Requester::builder("paced")
		.http_client(test_reqwest_client())
		.base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
		.rate_limits(
			RateLimitDefinitions::new()
				.with(EndpointLimit::Auth, RateLimiter::new(StdDuration::from_secs(1), 1, 1))
				.with(EndpointLimit::Unauth, RateLimiter::unbounded()),
		)
		.build()
		.expect("Paced requester should build.")
}

async fn ping_mock(server: &MockServer) -> httpmock::Mock<'_> {
	server
		.mock_async(|when, then| {
			when.method(GET).path("/ping");
			then.status(200).body("{}");
		})
		.await
}

#[tokio::test]
async fn limiter_paces_sequential_requests() {
	let server = MockServer::start_async().await;
	let requester = paced_requester(&server);
	let mock = ping_mock(&server).await;
	let ctx = Context::background();
	let started = Instant::now();

	for _ in 0..2 {
		requester
			.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item("/ping")))
			.await
			.expect("Paced request should succeed.");
	}

	let elapsed = started.elapsed();

	assert!(elapsed >= StdDuration::from_millis(900), "Second request should wait: {elapsed:?}.");

	mock.assert_calls_async(2).await;
}

#[tokio::test]
async fn unbounded_category_is_not_paced() {
	let server = MockServer::start_async().await;
	let requester = paced_requester(&server);
	let _mock = ping_mock(&server).await;
	let ctx = Context::background();
	let started = Instant::now();

	for _ in 0..5 {
		requester
			.send_payload_raw(&ctx, EndpointLimit::Unauth, || Ok(get_item("/ping")))
			.await
			.expect("Unbounded request should succeed.");
	}

	assert!(started.elapsed() < StdDuration::from_millis(900));
}

#[tokio::test]
async fn deadline_shorter_than_limiter_wait_fails_fast() {
	let server = MockServer::start_async().await;
	let requester = paced_requester(&server);
	let mock = ping_mock(&server).await;
	let ctx = Context::background();

	requester
		.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item("/ping")))
		.await
		.expect("First request should use the available token.");

	let short = ctx.with_timeout(StdDuration::from_millis(100));
	let started = Instant::now();
	let err = requester
		.send_payload_raw(&short, EndpointLimit::Auth, || Ok(get_item("/ping")))
		.await
		.expect_err("Limiter wait beyond the deadline should fail.");

	assert!(matches!(err, Error::Context(ContextError::DeadlineExceeded)), "{err:?}");
	assert!(started.elapsed() < StdDuration::from_millis(100), "Failure should not sleep.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn validation_failures_do_not_consume_tokens() {
	let server = MockServer::start_async().await;
	let requester = paced_requester(&server);
	let mock = ping_mock(&server).await;
	let ctx = Context::background();
	let err = requester
		.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item("")))
		.await
		.expect_err("Empty path should be rejected.");

	assert!(matches!(err, Error::Validation(ValidationError::PathEmpty)));

	let started = Instant::now();

	requester
		.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item("/ping")))
		.await
		.expect("Valid request should still find a token.");

	assert!(started.elapsed() < StdDuration::from_millis(900), "Token should be untouched.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn disabled_limiter_skips_definitions() {
	let server = MockServer::start_async().await;
	let requester: Requester = Requester::new("bare", test_reqwest_client());
	let mock = ping_mock(&server).await;
	let ctx = Context::background();
	let url = server.url("/ping");
	let err = requester
		.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item(&url)))
		.await
		.expect_err("Enabled limiter without definitions should fail.");

	assert!(matches!(err, Error::RateLimiterDefinitionsMissing));

	requester.disable_rate_limiter().expect("Disabling should succeed.");
	requester
		.send_payload_raw(&ctx, EndpointLimit::Auth, || Ok(get_item(&url)))
		.await
		.expect("Disabled limiter should not need definitions.");

	mock.assert_calls_async(1).await;
}

#[tokio::test]
async fn unmapped_category_is_reported() {
	let server = MockServer::start_async().await;
	let requester = Requester::builder("partial")
		.http_client(test_reqwest_client())
		.base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
		.rate_limits(RateLimitDefinitions::new().with(EndpointLimit::Auth, RateLimiter::unbounded()))
		.build()
		.expect("Requester should build.");
	let err = requester
		.send_payload_raw(&Context::background(), EndpointLimit::Unauth, || Ok(get_item("/ping")))
		.await
		.expect_err("Unmapped category should fail.");

	assert!(
		matches!(&err, Error::RateLimiterNotFound { endpoint } if endpoint == "Unauth"),
		"{err:?}"
	);
}

#[tokio::test]
async fn custom_keys_select_their_own_limiters() {
	#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
	enum Venue {
		Spot,
		Futures,
	}

	let server = MockServer::start_async().await;
	let _mock = ping_mock(&server).await;
	let requester = Requester::builder("venues")
		.http_client(test_reqwest_client())
		.base_url(Url::parse(&server.base_url()).expect("Mock base URL should parse."))
		.rate_limits(
			[
				(Venue::Spot, RateLimiter::new(StdDuration::from_secs(60), 1, 1)),
				(Venue::Futures, RateLimiter::unbounded()),
			]
			.into_iter()
			.collect(),
		)
		.build()
		.expect("Requester should build.");
	let ctx = Context::background();

	requester
		.send_payload_raw(&ctx, Venue::Spot, || Ok(get_item("/ping")))
		.await
		.expect("First spot request should pass.");
	requester
		.send_payload_raw(&ctx, Venue::Futures, || Ok(get_item("/ping")))
		.await
		.expect("Futures limiter should be independent.");

	let err = requester
		.send_payload_raw(
			&ctx.with_timeout(StdDuration::from_millis(50)),
			Venue::Spot,
			|| Ok(get_item("/ping")),
		)
		.await
		.expect_err("Spot limiter should be drained.");

	assert!(matches!(err, Error::Context(ContextError::DeadlineExceeded)));
}
