//! Activating and deactivating the controller's outputs.
//!
//! The outputs must be active for the scanner to move. Prefer
//! [`Session::outputs`], which returns an [`OutputGuard`] that deactivates the
//! outputs again when it goes out of scope.

use crate::{
	address,
	backend::Controller,
	data::EventMask,
	error::Error,
	poll::Poller,
	session::Session,
};
use std::time::Duration;

/// The interval between two reads of the output status while activating.
pub const ACTIVATION_INTERVAL: Duration = Duration::from_millis(50);
/// How long to wait for the outputs to report that they are off.
pub const DEACTIVATION_TIMEOUT: Duration = Duration::from_secs(5);

impl<C: Controller> Session<C> {
	/// Activate the outputs and wait until the controller reports them active.
	///
	/// The output status is read every 50 ms until it is non-zero, bounded by
	/// the session's poll timeout.
	pub fn enable_outputs(&mut self) -> Result<(), Error> {
		self.set_parameter(address::OUTPUT_ACTIVATE, 1)?;
		let mut options = self.poll_options();
		options.interval(ACTIVATION_INTERVAL);
		let mut poller = Poller::start(options);
		loop {
			poller.sleep();
			if self.get_parameter(address::OUTPUT_STATUS)? != 0 {
				return Ok(());
			}
			poller.check(|| "output activation".to_string())?;
		}
	}

	/// Deactivate the outputs.
	///
	/// After the request the change of the output status is awaited for up to
	/// 5 s, then the status is read. Returns `true` if the outputs are off and
	/// `false`, with a warning logged, if they are still on.
	pub fn disable_outputs(&mut self) -> Result<bool, Error> {
		self.set_parameter(address::OUTPUT_ACTIVATE, 0)?;
		if self
			.wait_for_event(DEACTIVATION_TIMEOUT, EventMask::CUSTOM, Some(address::OUTPUT_STATUS))?
			.is_none()
		{
			log::debug!("{} no output status change within {DEACTIVATION_TIMEOUT:?}", self.name());
		}
		let off = self.get_parameter(address::OUTPUT_STATUS)? == 0;
		if !off {
			log::warn!("{} failed to deactivate the outputs", self.name());
		}
		Ok(off)
	}

	/// Activate the outputs and return a guard that deactivates them when it
	/// goes out of scope.
	///
	/// ## Example
	///
	/// ```rust
	/// # use nanoctl::{backend::Controller, error::Error, session::Session};
	/// # fn wrapper<C: Controller>(session: &mut Session<C>) -> Result<(), Error> {
	/// let mut outputs = session.outputs()?;
	/// // The guard can be used as the session.
	/// outputs.start_scan()?;
	/// outputs.stop_scan()?;
	/// assert!(outputs.release()?);
	/// # Ok(())
	/// # }
	/// ```
	pub fn outputs(&mut self) -> Result<OutputGuard<'_, C>, Error> {
		self.enable_outputs()?;
		Ok(OutputGuard {
			session: self,
			active: true,
		})
	}
}

/// A "scope guard" that deactivates the outputs when it goes out of scope.
///
/// To create a guard, use the session's [`outputs`](Session::outputs) method.
///
/// While the guard is in scope, the session can only be accessed through the
/// guard. However, because the guard implements [`Deref`](std::ops::Deref) and
/// [`DerefMut`](std::ops::DerefMut) callers can treat the guard as the session.
///
/// The outputs are deactivated on drop even if the session is already
/// poisoned. If deactivating fails when the guard is dropped, the session is
/// poisoned and the error is returned by the session's next operation. Use
/// [`release`](OutputGuard::release) to receive the error directly.
#[derive(Debug)]
pub struct OutputGuard<'a, C: Controller> {
	session: &'a mut Session<C>,
	/// Whether the outputs still need to be deactivated.
	active: bool,
}

impl<C: Controller> OutputGuard<'_, C> {
	/// Deactivate the outputs now, returning whether they are off.
	///
	/// See [`Session::disable_outputs`].
	pub fn release(mut self) -> Result<bool, Error> {
		self.active = false;
		self.session.disable_outputs()
	}
}

impl<C: Controller> std::ops::Deref for OutputGuard<'_, C> {
	type Target = Session<C>;
	fn deref(&self) -> &Self::Target {
		self.session
	}
}

impl<C: Controller> std::ops::DerefMut for OutputGuard<'_, C> {
	fn deref_mut(&mut self) -> &mut Self::Target {
		self.session
	}
}

impl<C: Controller> Drop for OutputGuard<'_, C> {
	fn drop(&mut self) {
		if self.active {
			self.active = false;
			// An earlier poison must not keep the outputs on. It is restored
			// afterwards and takes precedence over a new failure.
			let poison = self.session.take_poison();
			let result = self.session.disable_outputs();
			match (poison, result) {
				(Some(poison), Err(e)) => {
					log::warn!("{} failed to deactivate the outputs: {}", self.session.name(), e);
					self.session.restore_poison(poison);
				}
				(Some(poison), Ok(_)) => self.session.restore_poison(poison),
				(None, Err(e)) => self.session.poison(e),
				(None, Ok(_)) => {}
			}
		}
	}
}
