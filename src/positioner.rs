//! Closed-loop positioners.
//!
//! A [`Positioner`] owns a connection to one positioner controller through a
//! [`PositionerBackend`]. Positions are in metres for linear actuators and in
//! degrees for goniometers and rotators.
//!
//! ## Example
//!
//! ```rust
//! # use nanoctl::{error::Error, positioner::{Positioner, PositionerBackend}};
//! # fn wrapper<B: PositionerBackend>(backend: B) -> Result<(), Error> {
//! let mut positioner = Positioner::connect(backend, 0)?;
//! positioner.set_axis_output(0, true, true)?;
//! let position = positioner.move_to(0, 2e-3, 1e-7)?;
//! println!("arrived at {position} m");
//! positioner.disconnect()
//! # }
//! ```

use crate::{
	error::{positioner_code, Call, Error, MotionFaultError, ReturnCode},
	poll::{PollOptions, Poller},
};

/// The placeholder name for a positioner backend that doesn't have a name.
const UNKNOWN_POSITIONER_NAME: &str = "<unknown positioner>";

/// Translate a positioner return code into an [`Error`].
fn translate(call: Call, code: ReturnCode) -> Error {
	Error::from_code(call, code, positioner_code::lookup)
}

/// The interfaces searched for devices.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Interfaces {
	/// USB only.
	Usb,
	/// Ethernet only.
	Ethernet,
	/// USB and Ethernet.
	All,
}

impl Interfaces {
	/// The raw interface mask.
	pub const fn bits(self) -> i32 {
		match self {
			Interfaces::Usb => 1,
			Interfaces::Ethernet => 2,
			Interfaces::All => 3,
		}
	}
}

/// The status of a positioner axis.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[allow(clippy::struct_excessive_bools)]
pub struct AxisStatus {
	/// A sensor is connected to the axis.
	pub connected: bool,
	/// The voltage output of the axis is enabled.
	pub enabled: bool,
	/// The axis is moving.
	pub moving: bool,
	/// The target of an automatic move has been reached.
	pub target: bool,
	/// End of travel detected in the forward direction.
	pub eot_forward: bool,
	/// End of travel detected in the backward direction.
	pub eot_backward: bool,
	/// The sensor reports an error.
	pub error: bool,
}

impl AxisStatus {
	/// A description of the fault this status reports, if any.
	pub fn fault(self) -> Option<&'static str> {
		if self.error {
			Some("sensor error")
		} else if self.eot_forward {
			Some("end of travel in the forward direction")
		} else if self.eot_backward {
			Some("end of travel in the backward direction")
		} else {
			None
		}
	}
}

/// The type of a positioner controller.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DeviceType {
	/// Controller with resistive sensors.
	Resistive,
	/// Controller with numeric (digital) sensors.
	Numeric,
	/// Controller with an interferometric sensor.
	Fps,
	/// Controller without sensors.
	Sensorless,
}

impl DeviceType {
	/// Convert the raw type code reported by the library.
	pub const fn from_code(code: i32) -> Option<Self> {
		match code {
			0 => Some(DeviceType::Resistive),
			1 => Some(DeviceType::Numeric),
			2 => Some(DeviceType::Fps),
			3 => Some(DeviceType::Sensorless),
			_ => None,
		}
	}
}

/// Information about a discovered positioner controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceInfo {
	/// The type of controller.
	pub device_type: DeviceType,
	/// The hardware ID.
	pub hardware_id: i32,
	/// The serial number.
	pub serial_number: String,
	/// The IP address in dotted-decimal notation, or `"USB"`.
	pub address: String,
	/// Whether the device is connected.
	pub connected: bool,
}

/// The synchronous call interface of a closed-loop positioner library.
///
/// Every fallible call reports failure with the raw [`ReturnCode`] of the
/// library.
pub trait PositionerBackend {
	/// Search for devices on `interfaces` and return how many were found.
	///
	/// Must not be called while a device is connected.
	fn discover(&mut self, interfaces: Interfaces) -> Result<u32, ReturnCode>;

	/// Connect to device number `device`, which must be less than the count
	/// returned by the last [`discover`](PositionerBackend::discover).
	fn connect(&mut self, device: u32) -> Result<(), ReturnCode>;

	/// Disconnect from the device.
	fn disconnect(&mut self) -> Result<(), ReturnCode>;

	/// Read the status of an axis.
	fn axis_status(&mut self, axis: u32) -> Result<AxisStatus, ReturnCode>;

	/// Read the current position of an axis.
	fn position(&mut self, axis: u32) -> Result<f64, ReturnCode>;

	/// Set the target position of automatic moves.
	fn set_target_position(&mut self, axis: u32, target: f64) -> Result<(), ReturnCode>;

	/// Set the range around the target within which it counts as reached.
	fn set_target_range(&mut self, axis: u32, range: f64) -> Result<(), ReturnCode>;

	/// Enable or disable the voltage output of an axis. With `auto_disable`
	/// the output is disabled when an end of travel is detected.
	fn set_axis_output(
		&mut self,
		axis: u32,
		enable: bool,
		auto_disable: bool,
	) -> Result<(), ReturnCode>;

	/// Start or stop an automatic move to the target position, which is
	/// interpreted relative to the current position if `relative` is set.
	fn start_auto_move(
		&mut self,
		axis: u32,
		enable: bool,
		relative: bool,
	) -> Result<(), ReturnCode>;

	/// Start or stop a continuous move.
	fn start_continuous_move(
		&mut self,
		axis: u32,
		start: bool,
		backward: bool,
	) -> Result<(), ReturnCode>;

	/// Trigger a single step.
	fn start_single_step(&mut self, axis: u32, backward: bool) -> Result<(), ReturnCode>;

	/// Read the drive amplitude of an axis, in V.
	fn amplitude(&mut self, axis: u32) -> Result<f64, ReturnCode>;

	/// Set the drive amplitude of an axis, in V.
	fn set_amplitude(&mut self, axis: u32, amplitude: f64) -> Result<(), ReturnCode>;

	/// Read the drive frequency of an axis, in Hz.
	fn frequency(&mut self, axis: u32) -> Result<f64, ReturnCode>;

	/// Set the drive frequency of an axis, in Hz.
	fn set_frequency(&mut self, axis: u32, frequency: f64) -> Result<(), ReturnCode>;

	/// Read the DC level of an axis' output, in V.
	fn dc_voltage(&mut self, axis: u32) -> Result<f64, ReturnCode>;

	/// Set the DC level of an axis' output while no motion is active, in V.
	fn set_dc_voltage(&mut self, axis: u32, voltage: f64) -> Result<(), ReturnCode>;

	/// Read information about device number `device`.
	///
	/// Only valid after [`discover`](PositionerBackend::discover). The device
	/// does not need to be connected.
	fn device_info(&mut self, device: u32) -> Result<DeviceInfo, ReturnCode>;

	/// Read the version of the firmware of the connected device.
	fn firmware_version(&mut self) -> Result<i32, ReturnCode>;

	/// Get the "name" of the backend, for logging.
	fn name(&self) -> Option<String> {
		None
	}
}

impl<B: PositionerBackend + ?Sized> PositionerBackend for Box<B> {
	fn discover(&mut self, interfaces: Interfaces) -> Result<u32, ReturnCode> {
		(**self).discover(interfaces)
	}
	fn connect(&mut self, device: u32) -> Result<(), ReturnCode> {
		(**self).connect(device)
	}
	fn disconnect(&mut self) -> Result<(), ReturnCode> {
		(**self).disconnect()
	}
	fn axis_status(&mut self, axis: u32) -> Result<AxisStatus, ReturnCode> {
		(**self).axis_status(axis)
	}
	fn position(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).position(axis)
	}
	fn set_target_position(&mut self, axis: u32, target: f64) -> Result<(), ReturnCode> {
		(**self).set_target_position(axis, target)
	}
	fn set_target_range(&mut self, axis: u32, range: f64) -> Result<(), ReturnCode> {
		(**self).set_target_range(axis, range)
	}
	fn set_axis_output(
		&mut self,
		axis: u32,
		enable: bool,
		auto_disable: bool,
	) -> Result<(), ReturnCode> {
		(**self).set_axis_output(axis, enable, auto_disable)
	}
	fn start_auto_move(
		&mut self,
		axis: u32,
		enable: bool,
		relative: bool,
	) -> Result<(), ReturnCode> {
		(**self).start_auto_move(axis, enable, relative)
	}
	fn start_continuous_move(
		&mut self,
		axis: u32,
		start: bool,
		backward: bool,
	) -> Result<(), ReturnCode> {
		(**self).start_continuous_move(axis, start, backward)
	}
	fn start_single_step(&mut self, axis: u32, backward: bool) -> Result<(), ReturnCode> {
		(**self).start_single_step(axis, backward)
	}
	fn amplitude(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).amplitude(axis)
	}
	fn set_amplitude(&mut self, axis: u32, amplitude: f64) -> Result<(), ReturnCode> {
		(**self).set_amplitude(axis, amplitude)
	}
	fn frequency(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).frequency(axis)
	}
	fn set_frequency(&mut self, axis: u32, frequency: f64) -> Result<(), ReturnCode> {
		(**self).set_frequency(axis, frequency)
	}
	fn dc_voltage(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).dc_voltage(axis)
	}
	fn set_dc_voltage(&mut self, axis: u32, voltage: f64) -> Result<(), ReturnCode> {
		(**self).set_dc_voltage(axis, voltage)
	}
	fn device_info(&mut self, device: u32) -> Result<DeviceInfo, ReturnCode> {
		(**self).device_info(device)
	}
	fn firmware_version(&mut self) -> Result<i32, ReturnCode> {
		(**self).firmware_version()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

impl<B: PositionerBackend + ?Sized> PositionerBackend for &mut B {
	fn discover(&mut self, interfaces: Interfaces) -> Result<u32, ReturnCode> {
		(**self).discover(interfaces)
	}
	fn connect(&mut self, device: u32) -> Result<(), ReturnCode> {
		(**self).connect(device)
	}
	fn disconnect(&mut self) -> Result<(), ReturnCode> {
		(**self).disconnect()
	}
	fn axis_status(&mut self, axis: u32) -> Result<AxisStatus, ReturnCode> {
		(**self).axis_status(axis)
	}
	fn position(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).position(axis)
	}
	fn set_target_position(&mut self, axis: u32, target: f64) -> Result<(), ReturnCode> {
		(**self).set_target_position(axis, target)
	}
	fn set_target_range(&mut self, axis: u32, range: f64) -> Result<(), ReturnCode> {
		(**self).set_target_range(axis, range)
	}
	fn set_axis_output(
		&mut self,
		axis: u32,
		enable: bool,
		auto_disable: bool,
	) -> Result<(), ReturnCode> {
		(**self).set_axis_output(axis, enable, auto_disable)
	}
	fn start_auto_move(
		&mut self,
		axis: u32,
		enable: bool,
		relative: bool,
	) -> Result<(), ReturnCode> {
		(**self).start_auto_move(axis, enable, relative)
	}
	fn start_continuous_move(
		&mut self,
		axis: u32,
		start: bool,
		backward: bool,
	) -> Result<(), ReturnCode> {
		(**self).start_continuous_move(axis, start, backward)
	}
	fn start_single_step(&mut self, axis: u32, backward: bool) -> Result<(), ReturnCode> {
		(**self).start_single_step(axis, backward)
	}
	fn amplitude(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).amplitude(axis)
	}
	fn set_amplitude(&mut self, axis: u32, amplitude: f64) -> Result<(), ReturnCode> {
		(**self).set_amplitude(axis, amplitude)
	}
	fn frequency(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).frequency(axis)
	}
	fn set_frequency(&mut self, axis: u32, frequency: f64) -> Result<(), ReturnCode> {
		(**self).set_frequency(axis, frequency)
	}
	fn dc_voltage(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		(**self).dc_voltage(axis)
	}
	fn set_dc_voltage(&mut self, axis: u32, voltage: f64) -> Result<(), ReturnCode> {
		(**self).set_dc_voltage(axis, voltage)
	}
	fn device_info(&mut self, device: u32) -> Result<DeviceInfo, ReturnCode> {
		(**self).device_info(device)
	}
	fn firmware_version(&mut self) -> Result<i32, ReturnCode> {
		(**self).firmware_version()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

/// A connection to a closed-loop positioner.
///
/// The device is disconnected when the positioner is
/// [disconnected](Positioner::disconnect) or dropped.
pub struct Positioner<B: PositionerBackend> {
	backend: B,
	device: u32,
	poll: PollOptions,
	connected: bool,
}

impl<B: PositionerBackend> std::fmt::Debug for Positioner<B> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Positioner")
			.field("name", &self.backend.name())
			.field("device", &self.device)
			.field("connected", &self.connected)
			.finish_non_exhaustive()
	}
}

impl<B: PositionerBackend> Positioner<B> {
	/// Discover the devices on all interfaces and connect to device number `device`.
	///
	/// A device number that is not less than the number of discovered devices
	/// is rejected with a [`ConfigurationError`](crate::error::ConfigurationError)
	/// before connecting.
	pub fn connect(mut backend: B, device: u32) -> Result<Self, Error> {
		let count = backend
			.discover(Interfaces::All)
			.map_err(|code| translate(Call::new("discover", "interfaces=All"), code))?;
		log::debug!("discovered {count} positioner(s)");
		let call = || Call::new("connect", format!("device={device}"));
		if device >= count {
			return Err(translate(call(), ReturnCode(positioner_code::NO_DEVICE)));
		}
		backend.connect(device).map_err(|code| translate(call(), code))?;
		Ok(Positioner {
			backend,
			device,
			poll: PollOptions::default(),
			connected: true,
		})
	}

	/// Disconnect from the device.
	pub fn disconnect(mut self) -> Result<(), Error> {
		self.connected = false;
		log::debug!("{} disconnect", self.name());
		self.backend
			.disconnect()
			.map_err(|code| translate(Call::new("disconnect", ""), code))
	}

	fn name(&self) -> String {
		self.backend
			.name()
			.unwrap_or_else(|| UNKNOWN_POSITIONER_NAME.to_string())
	}

	/// The number of the connected device.
	pub fn device(&self) -> u32 {
		self.device
	}

	/// Get a reference to the underlying backend.
	pub fn backend(&self) -> &B {
		&self.backend
	}

	/// Get an exclusive reference to the underlying backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.backend
	}

	/// Get the default polling options of [`move_to`](Positioner::move_to).
	pub fn poll_options(&self) -> PollOptions {
		self.poll
	}

	/// Set the default polling options of [`move_to`](Positioner::move_to).
	///
	/// The previous value is returned.
	pub fn set_poll_options(&mut self, options: PollOptions) -> PollOptions {
		std::mem::replace(&mut self.poll, options)
	}

	/// Read the status of an axis.
	pub fn axis_status(&mut self, axis: u32) -> Result<AxisStatus, Error> {
		let status = self
			.backend
			.axis_status(axis)
			.map_err(|code| translate(Call::new("axis_status", format!("axis={axis}")), code))?;
		log::debug!("{} axis {axis} status {status:?}", self.name());
		Ok(status)
	}

	/// Read the current position of an axis.
	pub fn position(&mut self, axis: u32) -> Result<f64, Error> {
		let position = self
			.backend
			.position(axis)
			.map_err(|code| translate(Call::new("position", format!("axis={axis}")), code))?;
		log::debug!("{} axis {axis} position {position}", self.name());
		Ok(position)
	}

	/// Enable or disable the voltage output of an axis.
	///
	/// With `auto_disable` the output is disabled when an end of travel is detected.
	pub fn set_axis_output(
		&mut self,
		axis: u32,
		enable: bool,
		auto_disable: bool,
	) -> Result<(), Error> {
		log::debug!(
			"{} axis {axis} output enable={enable} auto_disable={auto_disable}",
			self.name()
		);
		self.backend
			.set_axis_output(axis, enable, auto_disable)
			.map_err(|code| {
				translate(
					Call::new(
						"set_axis_output",
						format!("axis={axis}, enable={enable}, auto_disable={auto_disable}"),
					),
					code,
				)
			})
	}

	/// Start or stop a continuous move.
	pub fn start_continuous_move(
		&mut self,
		axis: u32,
		start: bool,
		backward: bool,
	) -> Result<(), Error> {
		log::debug!(
			"{} axis {axis} continuous move start={start} backward={backward}",
			self.name()
		);
		self.backend
			.start_continuous_move(axis, start, backward)
			.map_err(|code| {
				translate(
					Call::new(
						"start_continuous_move",
						format!("axis={axis}, start={start}, backward={backward}"),
					),
					code,
				)
			})
	}

	/// Trigger a single step.
	pub fn single_step(&mut self, axis: u32, backward: bool) -> Result<(), Error> {
		log::debug!("{} axis {axis} single step backward={backward}", self.name());
		self.backend.start_single_step(axis, backward).map_err(|code| {
			translate(
				Call::new("start_single_step", format!("axis={axis}, backward={backward}")),
				code,
			)
		})
	}

	/// Stop an automatic move.
	pub fn stop_auto_move(&mut self, axis: u32) -> Result<(), Error> {
		self.auto_move(axis, false)
	}

	fn auto_move(&mut self, axis: u32, enable: bool) -> Result<(), Error> {
		log::debug!("{} axis {axis} auto move enable={enable}", self.name());
		self.backend.start_auto_move(axis, enable, false).map_err(|code| {
			translate(
				Call::new(
					"start_auto_move",
					format!("axis={axis}, enable={enable}, relative=false"),
				),
				code,
			)
		})
	}

	/// Read the drive amplitude of an axis, in V.
	pub fn amplitude(&mut self, axis: u32) -> Result<f64, Error> {
		self.backend
			.amplitude(axis)
			.map_err(|code| translate(Call::new("amplitude", format!("axis={axis}")), code))
	}

	/// Set the drive amplitude of an axis, in V.
	pub fn set_amplitude(&mut self, axis: u32, amplitude: f64) -> Result<(), Error> {
		log::debug!("{} axis {axis} amplitude = {amplitude}", self.name());
		self.backend.set_amplitude(axis, amplitude).map_err(|code| {
			translate(
				Call::new("set_amplitude", format!("axis={axis}, amplitude={amplitude}")),
				code,
			)
		})
	}

	/// Read the drive frequency of an axis, in Hz.
	pub fn frequency(&mut self, axis: u32) -> Result<f64, Error> {
		self.backend
			.frequency(axis)
			.map_err(|code| translate(Call::new("frequency", format!("axis={axis}")), code))
	}

	/// Set the drive frequency of an axis, in Hz.
	pub fn set_frequency(&mut self, axis: u32, frequency: f64) -> Result<(), Error> {
		log::debug!("{} axis {axis} frequency = {frequency}", self.name());
		self.backend.set_frequency(axis, frequency).map_err(|code| {
			translate(
				Call::new("set_frequency", format!("axis={axis}, frequency={frequency}")),
				code,
			)
		})
	}

	/// Read the DC level of an axis' output, in V.
	pub fn dc_voltage(&mut self, axis: u32) -> Result<f64, Error> {
		self.backend
			.dc_voltage(axis)
			.map_err(|code| translate(Call::new("dc_voltage", format!("axis={axis}")), code))
	}

	/// Set the DC level of an axis' output, in V.
	///
	/// The level only applies while no motion is active.
	pub fn set_dc_voltage(&mut self, axis: u32, voltage: f64) -> Result<(), Error> {
		log::debug!("{} axis {axis} dc voltage = {voltage}", self.name());
		self.backend.set_dc_voltage(axis, voltage).map_err(|code| {
			translate(
				Call::new("set_dc_voltage", format!("axis={axis}, voltage={voltage}")),
				code,
			)
		})
	}

	/// Read information about the connected device.
	pub fn device_info(&mut self) -> Result<DeviceInfo, Error> {
		let device = self.device;
		let info = self
			.backend
			.device_info(device)
			.map_err(|code| translate(Call::new("device_info", format!("device={device}")), code))?;
		log::debug!("{} device info {info:?}", self.name());
		Ok(info)
	}

	/// Read the firmware version of the connected device.
	pub fn firmware_version(&mut self) -> Result<i32, Error> {
		self.backend
			.firmware_version()
			.map_err(|code| translate(Call::new("firmware_version", ""), code))
	}

	/// Move an axis to `target` in closed loop, using the default polling options.
	///
	/// See [`move_to_with`](Positioner::move_to_with).
	pub fn move_to(&mut self, axis: u32, target: f64, range: f64) -> Result<f64, Error> {
		let options = self.poll;
		self.move_to_with(axis, target, range, options)
	}

	/// Move an axis to `target` in closed loop and return the final position.
	///
	/// The target counts as reached within `range` of it. The axis status is
	/// polled until the controller reports the target reached. If an end of
	/// travel or a sensor error is reported first, the automatic move is
	/// stopped and a [`MotionFaultError`] is returned. If the target is not
	/// reached within the timeout the move is stopped as well and an
	/// [`OperationTimeoutError`](crate::error::OperationTimeoutError) is returned.
	pub fn move_to_with(
		&mut self,
		axis: u32,
		target: f64,
		range: f64,
		options: PollOptions,
	) -> Result<f64, Error> {
		self.backend.set_target_range(axis, range).map_err(|code| {
			translate(
				Call::new("set_target_range", format!("axis={axis}, range={range}")),
				code,
			)
		})?;
		self.backend.set_target_position(axis, target).map_err(|code| {
			translate(
				Call::new("set_target_position", format!("axis={axis}, target={target}")),
				code,
			)
		})?;
		self.auto_move(axis, true)?;

		let mut poller = Poller::start(options);
		loop {
			poller.sleep();
			let status = self.axis_status(axis)?;
			if let Some(reason) = status.fault() {
				self.stop_auto_move(axis)?;
				let position = self.position(axis)?;
				return Err(MotionFaultError::new(axis, reason, position).into());
			}
			if status.target {
				return self.position(axis);
			}
			if let Err(e) = poller.check(|| format!("axis {axis} move to {target}")) {
				self.stop_auto_move(axis)?;
				return Err(e.into());
			}
		}
	}
}

impl<B: PositionerBackend> Drop for Positioner<B> {
	fn drop(&mut self) {
		if self.connected {
			self.connected = false;
			if let Err(code) = self.backend.disconnect() {
				log::warn!(
					"{} failed to disconnect: {}",
					self.name(),
					translate(Call::new("disconnect", ""), code)
				);
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::mock::{MockPositioner, PositionerCall};
	use std::time::Duration;

	fn fast() -> PollOptions {
		let mut options = PollOptions::new();
		options
			.interval(Duration::from_millis(1))
			.timeout(Duration::from_millis(50));
		options
	}

	fn reached() -> AxisStatus {
		AxisStatus {
			connected: true,
			enabled: true,
			target: true,
			..AxisStatus::default()
		}
	}

	fn moving() -> AxisStatus {
		AxisStatus {
			connected: true,
			enabled: true,
			moving: true,
			..AxisStatus::default()
		}
	}

	#[test]
	fn connect_rejects_unknown_devices() {
		let mut backend = MockPositioner::new();
		backend.set_device_count(1);
		let err = Positioner::connect(&mut backend, 1).unwrap_err();
		let err = crate::error::ConfigurationError::try_from(err).unwrap();
		assert_eq!(err.code(), positioner_code::NO_DEVICE);
		assert_eq!(err.call().operation(), "connect");
		assert!(!backend.calls().contains(&PositionerCall::Connect(1)));
	}

	#[test]
	fn drop_disconnects() {
		let mut backend = MockPositioner::new();
		{
			let _positioner = Positioner::connect(&mut backend, 0).unwrap();
		}
		assert!(!backend.is_connected());
		assert_eq!(backend.calls().last(), Some(&PositionerCall::Disconnect));
	}

	#[test]
	fn move_finishes_when_the_target_is_reached() {
		let mut backend = MockPositioner::new();
		backend.push_status(0, moving());
		backend.push_status(0, moving());
		backend.push_status(0, reached());
		backend.push_position(0, 2e-3);
		let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
		let position = positioner.move_to_with(0, 2e-3, 1e-7, fast()).unwrap();
		assert!((position - 2e-3).abs() < 1e-12);
		positioner.disconnect().unwrap();

		let calls = backend.calls();
		assert!(calls.contains(&PositionerCall::SetTargetRange(0, 1e-7)));
		assert!(calls.contains(&PositionerCall::SetTargetPosition(0, 2e-3)));
		assert!(calls.contains(&PositionerCall::StartAutoMove(0, true, false)));
		assert!(!calls.contains(&PositionerCall::StartAutoMove(0, false, false)));
		assert_eq!(
			calls.iter().filter(|c| **c == PositionerCall::AxisStatus(0)).count(),
			3
		);
	}

	#[test]
	fn end_of_travel_stops_the_move() {
		let mut backend = MockPositioner::new();
		backend.push_status(0, moving());
		backend.push_status(
			0,
			AxisStatus {
				eot_forward: true,
				..moving()
			},
		);
		backend.push_position(0, 5e-3);
		let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
		let err = positioner.move_to_with(0, 6e-3, 1e-7, fast()).unwrap_err();
		drop(positioner);

		let err = MotionFaultError::try_from(err).unwrap();
		assert_eq!(err.axis(), 0);
		assert!(err.reason().contains("forward"));
		assert!((err.position() - 5e-3).abs() < 1e-12);
		assert!(backend.calls().contains(&PositionerCall::StartAutoMove(0, false, false)));
	}

	#[test]
	fn move_times_out() {
		let mut backend = MockPositioner::new();
		backend.push_status(1, moving());
		let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
		let err = positioner.move_to_with(1, 1e-3, 1e-7, fast()).unwrap_err();
		assert!(err.is_timeout());
		drop(positioner);
		assert!(backend.calls().contains(&PositionerCall::StartAutoMove(1, false, false)));
	}

	#[test]
	fn manual_moves_reach_the_backend() {
		let mut backend = MockPositioner::new();
		{
			let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
			positioner.start_continuous_move(2, true, true).unwrap();
			positioner.start_continuous_move(2, false, true).unwrap();
			positioner.single_step(1, false).unwrap();
			positioner.stop_auto_move(1).unwrap();
		}
		assert_eq!(
			&backend.calls()[2..6],
			&[
				PositionerCall::StartContinuousMove(2, true, true),
				PositionerCall::StartContinuousMove(2, false, true),
				PositionerCall::SingleStep(1, false),
				PositionerCall::StartAutoMove(1, false, false),
			]
		);
	}

	#[test]
	fn drive_settings_echo_the_values_set() {
		let mut backend = MockPositioner::new();
		{
			let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
			positioner.set_amplitude(0, 42.5).unwrap();
			positioner.set_frequency(0, 1000.0).unwrap();
			positioner.set_dc_voltage(1, 12.0).unwrap();
			assert!((positioner.amplitude(0).unwrap() - 42.5).abs() < f64::EPSILON);
			assert!((positioner.frequency(0).unwrap() - 1000.0).abs() < f64::EPSILON);
			assert!((positioner.dc_voltage(1).unwrap() - 12.0).abs() < f64::EPSILON);
			assert!(positioner.amplitude(1).unwrap().abs() < f64::EPSILON);
		}
		let calls = backend.calls();
		assert!(calls.contains(&PositionerCall::SetAmplitude(0, 42.5)));
		assert!(calls.contains(&PositionerCall::Amplitude(0)));
		assert!(calls.contains(&PositionerCall::SetFrequency(0, 1000.0)));
		assert!(calls.contains(&PositionerCall::Frequency(0)));
		assert!(calls.contains(&PositionerCall::SetDcVoltage(1, 12.0)));
		assert!(calls.contains(&PositionerCall::DcVoltage(1)));
	}

	#[test]
	fn failed_operations_carry_the_call() {
		let mut backend = MockPositioner::new();
		let mut positioner = Positioner::connect(&mut backend, 0).unwrap();

		positioner.backend_mut().fail_next(positioner_code::OUT_OF_RANGE);
		let err = positioner.set_amplitude(0, 80.0).unwrap_err();
		let err = crate::error::ConfigurationError::try_from(err).unwrap();
		assert_eq!(err.call().operation(), "set_amplitude");
		assert_eq!(err.call().arguments(), "axis=0, amplitude=80");

		positioner.backend_mut().fail_next(positioner_code::NO_AXIS);
		let err = positioner.set_frequency(5, 100.0).unwrap_err();
		assert_eq!(err.call().unwrap().operation(), "set_frequency");
		assert_eq!(err.call().unwrap().arguments(), "axis=5, frequency=100");

		positioner.backend_mut().fail_next(positioner_code::TIMEOUT);
		let err = positioner.start_continuous_move(1, true, false).unwrap_err();
		assert!(matches!(err, Error::Communication(_)));
		assert_eq!(err.call().unwrap().operation(), "start_continuous_move");
		assert_eq!(
			err.call().unwrap().arguments(),
			"axis=1, start=true, backward=false"
		);

		positioner.backend_mut().fail_next(positioner_code::NOT_CONNECTED);
		let err = positioner.single_step(2, true).unwrap_err();
		assert_eq!(err.call().unwrap().operation(), "start_single_step");
		assert_eq!(err.call().unwrap().arguments(), "axis=2, backward=true");

		positioner.backend_mut().fail_next(positioner_code::NO_AXIS);
		let err = positioner.amplitude(7).unwrap_err();
		assert_eq!(err.call().unwrap().operation(), "amplitude");
		assert_eq!(err.call().unwrap().arguments(), "axis=7");

		positioner.backend_mut().fail_next(positioner_code::NO_AXIS);
		let err = positioner.frequency(7).unwrap_err();
		assert_eq!(err.call().unwrap().operation(), "frequency");
		assert_eq!(err.call().unwrap().arguments(), "axis=7");
	}

	#[test]
	fn device_diagnostics() {
		let mut backend = MockPositioner::new();
		backend.set_firmware_version(0x0109);
		let mut positioner = Positioner::connect(&mut backend, 0).unwrap();
		let info = positioner.device_info().unwrap();
		assert_eq!(info.device_type, DeviceType::Resistive);
		assert_eq!(info.address, "USB");
		assert!(info.connected);
		assert_eq!(positioner.firmware_version().unwrap(), 0x0109);

		positioner.backend_mut().fail_next(positioner_code::NOT_AVAILABLE);
		let err = positioner.firmware_version().unwrap_err();
		assert_eq!(err.call().unwrap().operation(), "firmware_version");
	}

	#[test]
	fn device_type_codes() {
		assert_eq!(DeviceType::from_code(0), Some(DeviceType::Resistive));
		assert_eq!(DeviceType::from_code(3), Some(DeviceType::Sensorless));
		assert_eq!(DeviceType::from_code(4), None);
	}

	#[test]
	fn backend_failures_carry_the_call() {
		let mut backend = MockPositioner::new();
		backend.fail_next(positioner_code::DEVICE_LOCKED);
		let err = Positioner::connect(&mut backend, 0).unwrap_err();
		assert!(matches!(err, Error::Resource(_)));
		assert_eq!(err.call().unwrap().operation(), "discover");
	}
}
