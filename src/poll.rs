//! Options bounding the polling loops.
//!
//! Every loop in this crate that waits for a controller to reach some state is
//! bounded by a [`PollOptions::timeout`]. Once the bound is exceeded the loop
//! fails with an [`OperationTimeoutError`] instead of polling forever.

use crate::error::OperationTimeoutError;
use std::time::{Duration, Instant};

/// The interval and time bound of a polling loop.
///
/// ## Example
///
/// ```rust
/// # use nanoctl::poll::PollOptions;
/// # use std::time::Duration;
/// let mut options = PollOptions::new();
/// options
///     .interval(Duration::from_millis(20))
///     .timeout(Duration::from_secs(5));
/// assert_eq!(options.get_interval(), Duration::from_millis(20));
/// ```
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct PollOptions {
	interval: Duration,
	timeout: Duration,
}

impl PollOptions {
	/// The default interval between two polls: 100 ms.
	pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);
	/// The default time bound: 60 s.
	pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

	/// Create the default options.
	///
	/// Equivalent to [`default`](PollOptions::default).
	pub const fn new() -> Self {
		PollOptions {
			interval: PollOptions::DEFAULT_INTERVAL,
			timeout: PollOptions::DEFAULT_TIMEOUT,
		}
	}

	/// Set the time to sleep between two polls.
	pub fn interval(&mut self, interval: Duration) -> &mut Self {
		self.interval = interval;
		self
	}

	/// Set the time bound of the loop.
	pub fn timeout(&mut self, timeout: Duration) -> &mut Self {
		self.timeout = timeout;
		self
	}

	/// Get the time to sleep between two polls.
	pub const fn get_interval(&self) -> Duration {
		self.interval
	}

	/// Get the time bound of the loop.
	pub const fn get_timeout(&self) -> Duration {
		self.timeout
	}
}

impl Default for PollOptions {
	fn default() -> Self {
		Self::new()
	}
}

/// Book-keeping for a single bounded polling loop.
#[derive(Debug)]
pub(crate) struct Poller {
	options: PollOptions,
	start: Instant,
	attempts: u32,
}

impl Poller {
	/// Start a loop now.
	pub(crate) fn start(options: PollOptions) -> Self {
		Poller {
			options,
			start: Instant::now(),
			attempts: 0,
		}
	}

	/// Sleep for the polling interval.
	pub(crate) fn sleep(&self) {
		if !self.options.interval.is_zero() {
			std::thread::sleep(self.options.interval);
		}
	}

	/// Record a failed attempt and check the loop is still within its bound.
	///
	/// `describe` is only called if the bound was exceeded.
	pub(crate) fn check<F>(&mut self, describe: F) -> Result<(), OperationTimeoutError>
	where
		F: FnOnce() -> String,
	{
		self.attempts = self.attempts.saturating_add(1);
		if self.start.elapsed() >= self.options.timeout {
			Err(OperationTimeoutError::new(
				describe(),
				self.options.timeout,
				self.attempts,
			))
		} else {
			Ok(())
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn poller_expires_after_the_timeout() {
		let mut options = PollOptions::new();
		options
			.interval(Duration::from_millis(1))
			.timeout(Duration::from_millis(5));
		let mut poller = Poller::start(options);
		let err = loop {
			poller.sleep();
			if let Err(e) = poller.check(|| "test loop".to_string()) {
				break e;
			}
		};
		assert_eq!(err.operation(), "test loop");
		assert!(err.attempts() >= 1);
	}

	#[test]
	fn zero_timeout_expires_on_first_check() {
		let mut options = PollOptions::new();
		options.timeout(Duration::ZERO);
		let mut poller = Poller::start(options);
		let err = poller.check(|| "immediate".to_string()).unwrap_err();
		assert_eq!(err.attempts(), 1);
	}
}
