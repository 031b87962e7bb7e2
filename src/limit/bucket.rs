//! Weighted token bucket shared by every request mapped to one endpoint category.

// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	context::{Context, ContextError},
};

/// Token bucket where each acquisition consumes `weight` tokens.
///
/// The refill rate is `count / interval` tokens per second, so `(10s, 5)` and `(2s, 1)` pace
/// requests identically. A zero `interval` or zero `count` yields an unbounded limiter whose
/// [`allow`](Self::allow) always succeeds and whose [`wait`](Self::wait) never blocks.
///
/// Waiting callers borrow against future refills: the bucket may go negative, and the deficit
/// decides how long the next caller sleeps. That keeps the token stream fair in arrival order.
#[derive(Debug)]
pub struct RateLimiter {
	rate: f64,
	burst: u32,
	weight: u32,
	state: Mutex<BucketState>,
}
impl RateLimiter {
	/// Creates a limiter allowing `count` weighted acquisitions per `interval`.
	pub fn new(interval: StdDuration, count: u32, weight: u32) -> Self {
		let rate = if interval.is_zero() || count == 0 {
			f64::INFINITY
		} else {
			f64::from(count) / interval.as_secs_f64()
		};

		Self::with_rate(rate, weight)
	}

	/// Creates a limiter that never blocks.
	pub fn unbounded() -> Self {
		Self::with_rate(f64::INFINITY, 1)
	}

	fn with_rate(rate: f64, weight: u32) -> Self {
		let weight = weight.max(1);
		let burst = weight;

		Self {
			rate,
			burst,
			weight,
			state: Mutex::new(BucketState { tokens: f64::from(burst), last: Instant::now() }),
		}
	}

	/// Overrides the burst capacity (defaults to one acquisition's weight) and refills the bucket
	/// to it.
	pub fn with_burst(mut self, burst: u32) -> Self {
		self.burst = burst.max(1);

		let state = self.state.get_mut();

		state.tokens = f64::from(self.burst);

		self
	}

	/// Effective refill rate in tokens per second; infinite for unbounded limiters.
	pub fn limit(&self) -> f64 {
		self.rate
	}

	/// Maximum number of tokens the bucket holds.
	pub fn burst(&self) -> u32 {
		self.burst
	}

	/// Tokens consumed per acquisition.
	pub fn weight(&self) -> u32 {
		self.weight
	}

	/// Returns `true` when the limiter never blocks.
	pub fn is_unbounded(&self) -> bool {
		self.rate.is_infinite()
	}

	/// Consumes one weighted acquisition if the tokens are available right now.
	///
	/// When the weight exceeds the burst, a full bucket admits the acquisition and goes into debt,
	/// matching [`wait`](Self::wait).
	pub fn allow(&self) -> bool {
		if self.is_unbounded() {
			return true;
		}

		let mut state = self.state.lock();
		let cost = f64::from(self.weight);

		state.advance(Instant::now(), self.rate, self.burst);

		if state.tokens >= cost.min(f64::from(self.burst)) {
			state.tokens -= cost;

			true
		} else {
			false
		}
	}

	/// Waits until one weighted acquisition is available.
	///
	/// Returns the context error without consuming tokens when `ctx` is already done, when its
	/// deadline would pass before the tokens are due, or when it is cancelled while waiting.
	pub async fn wait(&self, ctx: &Context) -> Result<(), ContextError> {
		if let Some(err) = ctx.err() {
			return Err(err);
		}
		if self.is_unbounded() {
			return Ok(());
		}

		let now = Instant::now();
		let reservation = self.reserve(now);

		if reservation.due <= now {
			reservation.commit();

			return Ok(());
		}
		if ctx.expires_before(reservation.due) {
			return Err(ContextError::DeadlineExceeded);
		}

		ctx.sleep_until(reservation.due).await?;
		reservation.commit();

		Ok(())
	}

	/// Time until an acquisition made now would be admitted, without consuming tokens.
	pub fn delay(&self) -> StdDuration {
		if self.is_unbounded() {
			return StdDuration::ZERO;
		}

		let mut state = self.state.lock();

		state.advance(Instant::now(), self.rate, self.burst);

		let deficit = f64::from(self.weight) - state.tokens;

		if deficit <= 0. { StdDuration::ZERO } else { refill_time(deficit, self.rate) }
	}

	fn reserve(&self, now: Instant) -> Reservation<'_> {
		let mut state = self.state.lock();
		let cost = f64::from(self.weight);

		state.advance(now, self.rate, self.burst);
		state.tokens -= cost;

		let due = if state.tokens >= 0. {
			now
		} else {
			now.checked_add(refill_time(-state.tokens, self.rate)).unwrap_or(now + MAX_WAIT)
		};

		Reservation { limiter: self, due, committed: false }
	}

	fn restore(&self, tokens: f64) {
		let mut state = self.state.lock();

		state.tokens = (state.tokens + tokens).min(f64::from(self.burst));
	}
}

/// Upper bound on a single computed wait, far beyond any real exchange window.
const MAX_WAIT: StdDuration = StdDuration::from_secs(86_400 * 365);

fn refill_time(tokens: f64, rate: f64) -> StdDuration {
	StdDuration::try_from_secs_f64(tokens / rate).map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT))
}

#[derive(Debug)]
struct BucketState {
	tokens: f64,
	last: Instant,
}
impl BucketState {
	fn advance(&mut self, now: Instant, rate: f64, burst: u32) {
		let elapsed = now.saturating_duration_since(self.last);

		self.last = self.last.max(now);
		self.tokens = (self.tokens + elapsed.as_secs_f64() * rate).min(f64::from(burst));
	}
}

/// Tokens taken from the bucket; handed back on drop unless committed.
struct Reservation<'a> {
	limiter: &'a RateLimiter,
	due: Instant,
	committed: bool,
}
impl Reservation<'_> {
	fn commit(mut self) {
		self.committed = true;
	}
}
impl Drop for Reservation<'_> {
	fn drop(&mut self) {
		if !self.committed {
			self.limiter.restore(f64::from(self.limiter.weight));
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn scaled_parameters_share_a_rate() {
		let coarse = RateLimiter::new(StdDuration::from_secs(10), 5, 1);
		let fine = RateLimiter::new(StdDuration::from_secs(2), 1, 1);

		assert_eq!(coarse.limit(), fine.limit());
		assert_eq!(coarse.limit(), 0.5);
	}

	#[test]
	fn zero_parameters_are_unbounded() {
		let no_count = RateLimiter::new(StdDuration::from_secs(1), 0, 1);
		let no_interval = RateLimiter::new(StdDuration::ZERO, 10, 1);

		assert!(no_count.is_unbounded());
		assert!(no_interval.is_unbounded());

		for _ in 0..1_000 {
			assert!(no_count.allow());
			assert!(no_interval.allow());
		}
	}

	#[test]
	fn weight_drains_bucket_faster() {
		let light = RateLimiter::new(StdDuration::from_secs(60), 1, 1).with_burst(5);
		let heavy = RateLimiter::new(StdDuration::from_secs(60), 1, 5).with_burst(5);
		let light_admitted = (0..5).filter(|_| light.allow()).count();
		let heavy_admitted = (0..5).filter(|_| heavy.allow()).count();

		assert_eq!(light_admitted, 5);
		assert_eq!(heavy_admitted, 1);
		assert_eq!(light.limit(), heavy.limit(), "Weight must not change the refill rate.");
	}

	#[tokio::test(start_paused = true)]
	async fn weighted_limiter_admits_with_default_burst() {
		let heavy = RateLimiter::new(StdDuration::from_millis(10), 1, 5);

		assert_eq!(heavy.burst(), 5);
		assert!(heavy.allow(), "A full bucket should admit one weighted acquisition.");
		assert!(!heavy.allow());

		tokio::time::advance(StdDuration::from_millis(60)).await;

		assert!(heavy.allow(), "The bucket should refill one weight after five intervals.");
	}

	#[tokio::test(start_paused = true)]
	async fn weight_above_burst_borrows_from_future_refills() {
		let heavy = RateLimiter::new(StdDuration::from_millis(10), 1, 5).with_burst(1);

		assert!(heavy.allow(), "A full bucket should admit even when weight exceeds burst.");

		tokio::time::advance(StdDuration::from_millis(30)).await;

		assert!(!heavy.allow(), "The debt should still be outstanding.");

		tokio::time::advance(StdDuration::from_millis(30)).await;

		assert!(heavy.allow());
	}

	#[test]
	fn tiny_rates_cap_the_computed_wait() {
		let glacial = RateLimiter::new(StdDuration::from_millis(u64::MAX), 1, u32::MAX);

		assert!(glacial.allow());
		assert_eq!(glacial.delay(), MAX_WAIT);
	}

	#[tokio::test(start_paused = true)]
	async fn wait_paces_sequential_callers() {
		let limiter = RateLimiter::new(StdDuration::from_secs(1), 1, 1);
		let ctx = Context::background();
		let start = Instant::now();

		limiter.wait(&ctx).await.expect("First wait should succeed.");
		limiter.wait(&ctx).await.expect("Second wait should succeed.");

		assert!(start.elapsed() >= StdDuration::from_secs(1));
	}

	#[tokio::test(start_paused = true)]
	async fn short_deadline_fails_without_consuming() {
		let limiter = RateLimiter::new(StdDuration::from_secs(1), 1, 1);

		assert!(limiter.allow());

		let delay_before = limiter.delay();
		let ctx = Context::background().with_timeout(StdDuration::from_millis(100));
		let err = limiter.wait(&ctx).await.expect_err("Deadline shorter than the wait should fail.");

		assert_eq!(err, ContextError::DeadlineExceeded);
		assert_eq!(limiter.delay(), delay_before, "A failed wait must not consume tokens.");
	}

	#[tokio::test(start_paused = true)]
	async fn cancelled_wait_returns_tokens() {
		let limiter = Arc::new(RateLimiter::new(StdDuration::from_secs(10), 1, 1));

		assert!(limiter.allow());

		let ctx = Context::background();
		let waiter = {
			let limiter = limiter.clone();
			let ctx = ctx.clone();

			tokio::spawn(async move { limiter.wait(&ctx).await })
		};

		tokio::time::sleep(StdDuration::from_secs(1)).await;
		ctx.cancel();

		let result = waiter.await.expect("Waiter task should not panic.");

		assert_eq!(result, Err(ContextError::Canceled));
		assert!(limiter.delay() < StdDuration::from_secs(10), "Cancelled waits must hand tokens back.");
	}

	#[tokio::test]
	async fn unbounded_wait_never_blocks() {
		let limiter = RateLimiter::new(StdDuration::ZERO, 0, 3);
		let ctx = Context::background();
		let start = Instant::now();

		for _ in 0..10_000 {
			limiter.wait(&ctx).await.expect("Unbounded waits should succeed.");
		}

		assert!(start.elapsed() < StdDuration::from_secs(1));
	}
}
