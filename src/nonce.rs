//! Strictly increasing nonces for authenticated requests.

// self
use crate::_prelude::*;

/// Resolution of a generated nonce.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceKind {
	/// Unix seconds.
	Seconds,
	/// Unix milliseconds.
	Millis,
	/// Unix nanoseconds.
	Nanos,
}
impl NonceKind {
	const fn index(self) -> usize {
		match self {
			NonceKind::Seconds => 0,
			NonceKind::Millis => 1,
			NonceKind::Nanos => 2,
		}
	}

	fn read_clock(self, now: OffsetDateTime) -> i64 {
		match self {
			NonceKind::Seconds => now.unix_timestamp(),
			NonceKind::Millis => i64::try_from(now.unix_timestamp_nanos() / 1_000_000)
				.unwrap_or(i64::MAX),
			NonceKind::Nanos => i64::try_from(now.unix_timestamp_nanos()).unwrap_or(i64::MAX),
		}
	}
}

/// Per-kind nonce counters seeded from the wall clock.
///
/// Each kind keeps its own last-issued value. A new nonce is the current clock reading, bumped to
/// `last + 1` whenever the clock has not moved past the previous value, so two calls in the same
/// tick still yield distinct, increasing values.
#[derive(Debug, Default)]
pub struct Nonce {
	last: [AtomicI64; 3],
}
impl Nonce {
	/// Issues the next nonce of `kind`.
	pub fn get(&self, kind: NonceKind) -> i64 {
		self.get_at(kind, OffsetDateTime::now_utc())
	}

	/// Issues the next nonce of `kind`, using `now` as the clock reading.
	pub fn get_at(&self, kind: NonceKind, now: OffsetDateTime) -> i64 {
		let candidate = kind.read_clock(now).max(1);
		let slot = &self.last[kind.index()];
		let mut last = slot.load(Ordering::Relaxed);

		loop {
			let next = if candidate > last { candidate } else { last.saturating_add(1) };

			match slot.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed) {
				Ok(_) => return next,
				Err(current) => last = current,
			}
		}
	}

	/// Returns the last nonce issued for `kind`, or zero if none was.
	pub fn last(&self, kind: NonceKind) -> i64 {
		self.last[kind.index()].load(Ordering::Acquire)
	}
}
