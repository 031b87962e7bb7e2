// crates.io
use rand::Rng;
// self
use crate::_prelude::*;

/// Computes the pause before retry number `attempt` (1-based).
pub trait Backoff
where
	Self: Send + Sync,
{
	/// Delay before the given retry attempt.
	fn delay(&self, attempt: u32) -> StdDuration;
}
impl<F> Backoff for F
where
	F: Send + Sync + Fn(u32) -> StdDuration,
{
	fn delay(&self, attempt: u32) -> StdDuration {
		self(attempt)
	}
}

/// Grows the delay by `step` per attempt, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LinearBackoff {
	step: StdDuration,
	max: StdDuration,
}
impl LinearBackoff {
	/// Creates a linear backoff.
	pub const fn new(step: StdDuration, max: StdDuration) -> Self {
		Self { step, max }
	}
}
impl Default for LinearBackoff {
	fn default() -> Self {
		Self::new(StdDuration::from_millis(100), StdDuration::from_secs(1))
	}
}
impl Backoff for LinearBackoff {
	fn delay(&self, attempt: u32) -> StdDuration {
		self.step.saturating_mul(attempt.max(1)).min(self.max)
	}
}

/// Multiplies the delay by `factor` per attempt, capped at `max`, plus up to `jitter` of noise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ExponentialBackoff {
	initial: StdDuration,
	max: StdDuration,
	factor: f64,
	jitter: StdDuration,
}
impl ExponentialBackoff {
	/// Creates an exponential backoff without jitter.
	pub const fn new(initial: StdDuration, max: StdDuration, factor: f64) -> Self {
		Self { initial, max, factor, jitter: StdDuration::ZERO }
	}

	/// Adds a random delay in `[0, jitter]` to every pause.
	pub const fn with_jitter(mut self, jitter: StdDuration) -> Self {
		self.jitter = jitter;

		self
	}

	fn base(&self, attempt: u32) -> StdDuration {
		let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
		let secs = self.initial.as_secs_f64() * self.factor.max(1.).powi(exponent);

		if !secs.is_finite() || secs >= self.max.as_secs_f64() {
			self.max
		} else {
			StdDuration::from_secs_f64(secs)
		}
	}
}
impl Backoff for ExponentialBackoff {
	fn delay(&self, attempt: u32) -> StdDuration {
		let base = self.base(attempt);

		if self.jitter.is_zero() {
			return base;
		}

		let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);

		base + StdDuration::from_millis(rand::rng().random_range(0..=jitter_ms))
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn linear_grows_then_caps() {
		let backoff = LinearBackoff::default();

		assert_eq!(backoff.delay(1), StdDuration::from_millis(100));
		assert_eq!(backoff.delay(4), StdDuration::from_millis(400));
		assert_eq!(backoff.delay(50), StdDuration::from_secs(1));
	}

	#[test]
	fn exponential_doubles_then_caps() {
		let backoff =
			ExponentialBackoff::new(StdDuration::from_millis(100), StdDuration::from_secs(2), 2.);

		assert_eq!(backoff.delay(1), StdDuration::from_millis(100));
		assert_eq!(backoff.delay(3), StdDuration::from_millis(400));
		assert_eq!(backoff.delay(30), StdDuration::from_secs(2));
	}

	#[test]
	fn jitter_stays_within_bounds() {
		let backoff =
			ExponentialBackoff::new(StdDuration::from_millis(100), StdDuration::from_secs(2), 2.)
				.with_jitter(StdDuration::from_millis(50));

		for _ in 0..100 {
			let delay = backoff.delay(2);

			assert!(delay >= StdDuration::from_millis(200));
			assert!(delay <= StdDuration::from_millis(250));
		}
	}

	#[test]
	fn closures_act_as_backoff() {
		let fixed = |_: u32| StdDuration::from_millis(7);

		assert_eq!(fixed.delay(9), StdDuration::from_millis(7));
	}
}
