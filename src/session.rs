//! Driving a scan controller through its command/status handshake.
//!
//! A [`Session`] owns a [`Controller`] for as long as the controller's service
//! is running. All operations block the calling thread until the controller
//! responds, and they are issued strictly one at a time.
//!
//! ## Example
//!
//! ```rust
//! # use nanoctl::{address, backend::Controller, error::Error, session::Session};
//! # fn wrapper<C: Controller>(controller: C) -> Result<(), Error> {
//! let mut session = Session::open(controller)?;
//! session.set_parameter(address::SCAN_COLUMNS, 100)?;
//! assert_eq!(session.get_parameter(address::SCAN_COLUMNS)?, 100);
//! session.close()
//! # }
//! ```

mod options;
#[cfg(test)]
mod test;

use crate::{
	address::{Address, Command, StatusBits, Subsystem},
	backend::{Controller, UNKNOWN_CONTROLLER_NAME},
	data::{Event, EventMask},
	error::{controller_code, Call, Error, ReturnCode},
	poll::{PollOptions, Poller},
};
pub use options::*;
use std::{path::Path, time::Duration};

/// Translate a controller return code into an [`Error`].
pub(crate) fn translate(call: Call, code: ReturnCode) -> Error {
	Error::from_code(call, code, controller_code::lookup)
}

/// Convert a duration into the millisecond timeout the controller expects.
pub(crate) fn timeout_ms(timeout: Duration) -> i32 {
	i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX)
}

/// An open session with a scan controller.
///
/// Open a session with [`Session::open`] or [`SessionOptions::open`]. The
/// controller's server is stopped when the session is [closed](Session::close)
/// or dropped.
pub struct Session<C: Controller> {
	/// The underlying controller.
	controller: C,
	/// The default polling options.
	poll: PollOptions,
	/// The bound on waiting for a full data buffer.
	acquisition_timeout: Duration,
	/// If populated, the error that has "poisoned" the session. This error MUST
	/// be reported before the session is used for communication again.
	///
	/// A session becomes "poisoned" when an error occurs in a `Drop`
	/// implementation, such as an [`OutputGuard`](crate::output::OutputGuard)
	/// failing to deactivate the outputs.
	poison: Option<Error>,
	/// Whether the server still needs to be stopped.
	running: bool,
}

impl<C: Controller> std::fmt::Debug for Session<C> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("name", &self.controller.name())
			.field("running", &self.running)
			.finish_non_exhaustive()
	}
}

impl<C: Controller> Session<C> {
	/// Open a session using the default options.
	///
	/// Alternatively, use [`SessionOptions`] to customize how the session is opened.
	pub fn open(controller: C) -> Result<Self, Error> {
		SessionOptions::new().open(controller)
	}

	/// Create a `Session` around a controller whose server is already running.
	pub(crate) fn from_controller(
		controller: C,
		poll: PollOptions,
		acquisition_timeout: Duration,
	) -> Self {
		Session {
			controller,
			poll,
			acquisition_timeout,
			poison: None,
			running: true,
		}
	}

	/// Stop the controller's server and close the session.
	///
	/// If the session is poisoned and stopping the server also fails, the
	/// stop error is returned and the poison is logged as a warning.
	pub fn close(mut self) -> Result<(), Error> {
		self.running = false;
		let poison = self.poison.take();
		if let Err(e) = self.stop_server() {
			if let Some(poison) = poison {
				log::warn!("{} closed while poisoned: {}", self.name(), poison);
			}
			return Err(e);
		}
		match poison {
			Some(e) => Err(e),
			None => Ok(()),
		}
	}

	fn stop_server(&mut self) -> Result<(), Error> {
		log::debug!("{} stop", self.name());
		self.controller
			.stop()
			.map_err(|code| translate(Call::new("stop", ""), code))
	}

	/// Check if the session is poisoned and report the error if it exists.
	pub(crate) fn check_poisoned(&mut self) -> Result<(), Error> {
		if let Some(poison) = self.poison.take() {
			Err(poison)
		} else {
			Ok(())
		}
	}

	/// Take the poison, if any, without reporting it.
	pub(crate) fn take_poison(&mut self) -> Option<Error> {
		self.poison.take()
	}

	/// Put back a poison taken with [`take_poison`](Session::take_poison).
	pub(crate) fn restore_poison(&mut self, poison: Error) {
		self.poison = Some(poison);
	}

	/// Poison the session with an error that will be reported by the next operation.
	pub(crate) fn poison(&mut self, error: Error) {
		log::warn!("{} poisoned: {}", self.name(), error);
		self.poison = Some(error);
	}

	/// The name of the controller, for logging.
	pub(crate) fn name(&self) -> String {
		self.controller
			.name()
			.unwrap_or_else(|| UNKNOWN_CONTROLLER_NAME.to_string())
	}

	/// Get a reference to the underlying controller.
	pub fn controller(&self) -> &C {
		&self.controller
	}

	/// Get an exclusive reference to the underlying controller.
	///
	/// Calls made directly on the controller bypass the session's error
	/// translation and logging.
	pub fn controller_mut(&mut self) -> &mut C {
		&mut self.controller
	}

	/// Get the default polling options.
	pub fn poll_options(&self) -> PollOptions {
		self.poll
	}

	/// Set the default polling options.
	///
	/// The previous value is returned.
	pub fn set_poll_options(&mut self, options: PollOptions) -> PollOptions {
		std::mem::replace(&mut self.poll, options)
	}

	/// Get the bound on waiting for a full data buffer.
	pub fn acquisition_timeout(&self) -> Duration {
		self.acquisition_timeout
	}

	/// Set the bound on waiting for a full data buffer.
	///
	/// The previous value is returned.
	pub fn set_acquisition_timeout(&mut self, timeout: Duration) -> Duration {
		std::mem::replace(&mut self.acquisition_timeout, timeout)
	}

	/// Send a value to the parameter at `address` (index 0).
	///
	/// The side effect happens inside the controller and is only observable by
	/// reading the parameter back. The call is not retried.
	pub fn set_parameter(&mut self, address: Address, value: i32) -> Result<(), Error> {
		self.set_parameter_at(address, 0, value)
	}

	/// Send a value to the parameter at `address` and `index`.
	pub fn set_parameter_at(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), Error> {
		self.check_poisoned()?;
		log::debug!("{} set {address}[{index}] = {value}", self.name());
		self.controller
			.set_parameter_async(address, index, value)
			.map_err(|code| {
				translate(
					Call::new(
						"set_parameter_async",
						format!("address={address}, index={index}, value={value}"),
					),
					code,
				)
			})
	}

	/// Read the parameter at `address` (index 0).
	pub fn get_parameter(&mut self, address: Address) -> Result<i32, Error> {
		self.get_parameter_at(address, 0)
	}

	/// Read the parameter at `address` and `index`.
	pub fn get_parameter_at(&mut self, address: Address, index: i32) -> Result<i32, Error> {
		self.check_poisoned()?;
		let value = self
			.controller
			.get_parameter_sync(address, index)
			.map_err(|code| {
				translate(
					Call::new("get_parameter_sync", format!("address={address}, index={index}")),
					code,
				)
			})?;
		log::debug!("{} get {address}[{index}] -> {value}", self.name());
		Ok(value)
	}

	/// Send a parameter profile file to the controller.
	pub fn send_profile<P: AsRef<Path>>(&mut self, path: P) -> Result<(), Error> {
		self.check_poisoned()?;
		let path = path.as_ref();
		log::debug!("{} send profile {}", self.name(), path.display());
		self.controller
			.send_profile(path)
			.map_err(|code| translate(Call::new("send_profile", format!("path={path:?}")), code))
	}

	/// Issue a single-phase command, such as stop or pause.
	///
	/// The command is only requested; it is not necessarily complete when this returns.
	pub fn issue_command<T: Into<Command>>(&mut self, command: T) -> Result<(), Error> {
		let command = command.into();
		let subsystem = command.subsystem();
		self.set_parameter(subsystem.command, command.value())
	}

	/// Read the status bitmask of a subsystem.
	pub fn read_status(&mut self, subsystem: Subsystem) -> Result<StatusBits, Error> {
		self.get_parameter(subsystem.status).map(StatusBits)
	}

	/// Repeatedly issue a multi-phase command until all `target` bits are set in
	/// the subsystem's status, using the session's default [`PollOptions`].
	///
	/// See [`run_until_status_with`](Session::run_until_status_with).
	pub fn run_until_status<T: Into<Command>>(
		&mut self,
		command: T,
		target: StatusBits,
	) -> Result<StatusBits, Error> {
		let options = self.poll;
		self.run_until_status_with(command, target, options, |_| {})
	}

	/// Repeatedly issue a multi-phase command until all `target` bits are set in
	/// the subsystem's status.
	///
	/// Each iteration issues the command, sleeps for the polling interval and
	/// then reads the status, which is passed to `observe`. The first status
	/// containing every `target` bit is returned; other bits being set does not
	/// end the loop. Re-issuing is safe because the command is idempotent from
	/// the controller's point of view.
	///
	/// If the target is not reached within the timeout an
	/// [`OperationTimeoutError`](crate::error::OperationTimeoutError) is returned.
	pub fn run_until_status_with<T, F>(
		&mut self,
		command: T,
		target: StatusBits,
		options: PollOptions,
		mut observe: F,
	) -> Result<StatusBits, Error>
	where
		T: Into<Command>,
		F: FnMut(StatusBits),
	{
		let command = command.into();
		let subsystem = command.subsystem();
		let mut poller = Poller::start(options);
		loop {
			self.issue_command(command)?;
			poller.sleep();
			let status = self.read_status(subsystem)?;
			observe(status);
			if status.contains(target) {
				return Ok(status);
			}
			poller.check(|| format!("{command} until status {target}"))?;
		}
	}

	/// Block until one of the events in `mask` occurs or `timeout` elapses.
	///
	/// `None` means the wait timed out without an event. `custom` selects the
	/// parameter whose change triggers [`EventMask::CUSTOM`].
	pub fn wait_for_event(
		&mut self,
		timeout: Duration,
		mask: EventMask,
		custom: Option<Address>,
	) -> Result<Option<Event>, Error> {
		self.check_poisoned()?;
		let custom_id = custom.map_or(0, Address::get);
		let code = self
			.controller
			.wait_for_event(timeout_ms(timeout), mask.bits(), custom_id);
		let event = Event::from_code(code);
		log::debug!("{} wait {mask} -> {event:?}", self.name());
		Ok(event)
	}
}

impl<C: Controller> Drop for Session<C> {
	fn drop(&mut self) {
		if self.running {
			self.running = false;
			if let Err(e) = self.stop_server() {
				log::warn!("failed to stop the server: {e}");
			}
		}
	}
}
