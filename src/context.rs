//! Cancellation and deadline scope for a single call, including all of its retries.
//!
//! A [`Context`] pairs a [`CancellationToken`] with an optional deadline. Every blocking point in
//! the crate (limiter waits and inter-attempt sleeps) goes through [`Context::sleep`], so a
//! cancelled or expired context always surfaces as its own [`ContextError`].

// crates.io
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
// self
use crate::_prelude::*;

/// Reason a [`Context`] stopped accepting work.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
pub enum ContextError {
	/// The context was cancelled explicitly.
	#[error("Context canceled.")]
	Canceled,
	/// The context deadline passed.
	#[error("Context deadline exceeded.")]
	DeadlineExceeded,
}

/// Caller-supplied scope governing cancellation and deadline for a request.
#[derive(Clone, Debug, Default)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}
impl Context {
	/// Returns a context that is never cancelled and has no deadline.
	pub fn background() -> Self {
		Self::default()
	}

	/// Derives a child context that expires at `deadline` (or earlier if the parent does).
	pub fn with_deadline(&self, deadline: Instant) -> Self {
		let deadline = match self.deadline {
			Some(current) if current < deadline => current,
			_ => deadline,
		};

		Self { token: self.token.child_token(), deadline: Some(deadline) }
	}

	/// Derives a child context that expires after `timeout`.
	///
	/// A timeout too large to represent leaves the parent's deadline in place.
	pub fn with_timeout(&self, timeout: StdDuration) -> Self {
		match Instant::now().checked_add(timeout) {
			Some(deadline) => self.with_deadline(deadline),
			None => self.child(),
		}
	}

	/// Derives a child context that is cancelled together with this one.
	pub fn child(&self) -> Self {
		Self { token: self.token.child_token(), deadline: self.deadline }
	}

	/// Cancels this context and every context derived from it.
	pub fn cancel(&self) {
		self.token.cancel();
	}

	/// Returns the deadline, if one is set.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Reports why the context is done, or `None` while it is still live.
	pub fn err(&self) -> Option<ContextError> {
		if self.token.is_cancelled() {
			return Some(ContextError::Canceled);
		}
		if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
			return Some(ContextError::DeadlineExceeded);
		}

		None
	}

	/// Returns `true` when waiting until `at` would outlive the deadline.
	pub fn expires_before(&self, at: Instant) -> bool {
		self.deadline.is_some_and(|deadline| deadline < at)
	}

	/// Drives `fut` to completion unless the context is cancelled or expires first.
	pub async fn scope<F>(&self, fut: F) -> Result<F::Output, ContextError>
	where
		F: Future,
	{
		if let Some(err) = self.err() {
			return Err(err);
		}

		let expiry = async {
			match self.deadline {
				Some(deadline) => tokio::time::sleep_until(deadline).await,
				None => std::future::pending::<()>().await,
			}
		};

		tokio::select! {
			biased;

			_ = self.token.cancelled() => Err(ContextError::Canceled),
			_ = expiry => Err(ContextError::DeadlineExceeded),
			output = fut => Ok(output),
		}
	}

	/// Sleeps for `duration`, returning early with the context error on cancel or deadline.
	///
	/// A duration too large to represent sleeps until the context ends.
	pub async fn sleep(&self, duration: StdDuration) -> Result<(), ContextError> {
		match Instant::now().checked_add(duration) {
			Some(at) => self.sleep_until(at).await,
			None => self.scope(std::future::pending::<()>()).await,
		}
	}

	/// Sleeps until `at`, returning early with the context error on cancel or deadline.
	pub async fn sleep_until(&self, at: Instant) -> Result<(), ContextError> {
		if let Some(err) = self.err() {
			return Err(err);
		}

		let (wake_at, expires) = match self.deadline {
			Some(deadline) if deadline < at => (deadline, true),
			_ => (at, false),
		};

		tokio::select! {
			biased;

			_ = self.token.cancelled() => Err(ContextError::Canceled),
			_ = tokio::time::sleep_until(wake_at) =>
				if expires { Err(ContextError::DeadlineExceeded) } else { Ok(()) },
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test(start_paused = true)]
	async fn sleep_reports_deadline() {
		let ctx = Context::background().with_timeout(StdDuration::from_millis(50));
		let err = ctx
			.sleep(StdDuration::from_secs(1))
			.await
			.expect_err("Sleep beyond the deadline should fail.");

		assert_eq!(err, ContextError::DeadlineExceeded);
		assert_eq!(ctx.err(), Some(ContextError::DeadlineExceeded));
	}

	#[tokio::test]
	async fn cancel_propagates_to_children() {
		let parent = Context::background();
		let child = parent.child();

		parent.cancel();

		assert_eq!(child.err(), Some(ContextError::Canceled));
		assert_eq!(
			child.sleep(StdDuration::from_secs(5)).await,
			Err(ContextError::Canceled),
			"Cancelled contexts should not sleep."
		);
	}

	#[tokio::test(start_paused = true)]
	async fn scope_aborts_slow_futures() {
		let ctx = Context::background().with_timeout(StdDuration::from_millis(10));
		let slow = tokio::time::sleep(StdDuration::from_secs(60));

		assert_eq!(ctx.scope(slow).await, Err(ContextError::DeadlineExceeded));
		assert_eq!(Context::background().scope(async { 7 }).await, Ok(7));
	}

	#[tokio::test(start_paused = true)]
	async fn unrepresentable_durations_wait_for_the_deadline() {
		let ctx = Context::background().with_timeout(StdDuration::from_millis(50));

		assert_eq!(ctx.sleep(StdDuration::MAX).await, Err(ContextError::DeadlineExceeded));

		let unbounded = Context::background().with_timeout(StdDuration::MAX);

		assert_eq!(unbounded.deadline(), None);
	}

	#[test]
	fn child_deadline_never_extends_parent() {
		let now = Instant::now();
		let parent = Context::background().with_deadline(now + StdDuration::from_secs(1));
		let child = parent.with_deadline(now + StdDuration::from_secs(10));

		assert_eq!(child.deadline(), parent.deadline());
	}
}
