//! Sequence counters and declaration creation order.
//!
//! Two unrelated counters live here:
//!
//! - [`SequenceCounter`]: the per-owner build counter handed to `Sequence`
//!   declarations. Shared by every definition that inherits the owner.
//! - [`next_creation_order`]: a process-scoped allocator stamping each
//!   declaration at construction time so resolution order is deterministic.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

static CREATION_ORDER: AtomicU64 = AtomicU64::new(0);

/// Allocates the next declaration creation order.
///
/// Strictly increasing for the lifetime of the process.
pub fn next_creation_order() -> u64 {
	CREATION_ORDER.fetch_add(1, Ordering::Relaxed)
}

/// Hook computing the first value of a counter.
pub type SequenceStart = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Monotonic integer source owned by one definition.
///
/// The counter is initialized lazily: the first [`next`](Self::next) call
/// runs the starting-value hook (default `0`).
pub struct SequenceCounter {
	owner: String,
	start: Option<SequenceStart>,
	value: Mutex<Option<i64>>,
}

impl SequenceCounter {
	/// Creates a counter starting at zero.
	pub fn new(owner: impl Into<String>) -> Self {
		Self {
			owner: owner.into(),
			start: None,
			value: Mutex::new(None),
		}
	}

	/// Creates a counter whose first value is computed by `start`.
	pub fn with_start(owner: impl Into<String>, start: SequenceStart) -> Self {
		Self {
			owner: owner.into(),
			start: Some(start),
			value: Mutex::new(None),
		}
	}

	/// Name of the owning definition.
	pub fn owner(&self) -> &str {
		&self.owner
	}

	/// Returns the current value and advances the counter.
	///
	/// # Examples
	///
	/// ```
	/// use fixturegraph_core::sequence::SequenceCounter;
	///
	/// let counter = SequenceCounter::new("UserFactory");
	/// assert_eq!(counter.next(), 0);
	/// assert_eq!(counter.next(), 1);
	/// ```
	pub fn next(&self) -> i64 {
		let mut guard = self.value.lock();
		let current = guard.get_or_insert_with(|| self.initial());
		let value = *current;
		*current += 1;
		value
	}

	/// Overwrites the counter.
	///
	/// `None` re-runs the starting-value hook.
	///
	/// # Examples
	///
	/// ```
	/// use fixturegraph_core::sequence::SequenceCounter;
	///
	/// let counter = SequenceCounter::new("UserFactory");
	/// counter.next();
	/// counter.reset(Some(5));
	/// assert_eq!(counter.next(), 5);
	/// assert_eq!(counter.next(), 6);
	/// ```
	pub fn reset(&self, value: Option<i64>) {
		let value = value.unwrap_or_else(|| self.initial());
		*self.value.lock() = Some(value);
	}

	/// Returns the value the next call to [`next`](Self::next) would yield,
	/// or `None` if the counter was never used.
	pub fn peek(&self) -> Option<i64> {
		*self.value.lock()
	}

	fn initial(&self) -> i64 {
		self.start.as_ref().map_or(0, |start| start())
	}
}

impl fmt::Debug for SequenceCounter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SequenceCounter")
			.field("owner", &self.owner)
			.field("value", &self.peek())
			.finish()
	}
}
