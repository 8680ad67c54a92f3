//! The scanner: its commands, states and geometry.
//!
//! ## Example
//!
//! ```rust
//! # use nanoctl::{backend::Controller, error::Error, scanner::ScanGeometry, session::Session};
//! # fn wrapper<C: Controller>(session: &mut Session<C>) -> Result<(), Error> {
//! let geometry = ScanGeometry::new(200, 200);
//! session.apply_scan_geometry(&geometry)?;
//! let state = session.start_scan()?;
//! println!("scanner is {state}");
//! session.stop_scan()?;
//! # Ok(())
//! # }
//! ```

use crate::{
	address::{self, Command, StatusBits, Subsystem},
	backend::Controller,
	error::Error,
	session::Session,
};
use std::fmt;

/// A command accepted by the scanner.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ScanCommand {
	/// Stop scanning.
	Off,
	/// Move to the start position, then scan.
	On,
	/// Pause the scan.
	Pause,
}

impl ScanCommand {
	/// The value written to the scan command register.
	pub const fn value(self) -> i32 {
		match self {
			ScanCommand::Off => 0,
			ScanCommand::On => 1,
			ScanCommand::Pause => 2,
		}
	}
}

impl From<ScanCommand> for Command {
	fn from(command: ScanCommand) -> Self {
		Command::new(Subsystem::SCANNER, command.value())
	}
}

/// The state of the scanner, as read from its status register.
///
/// Several states may be set at once while the scanner transitions.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct ScanState(StatusBits);

impl ScanState {
	/// The scan is paused.
	pub const PAUSE: ScanState = ScanState(StatusBits(0x01));
	/// The scanner is moving to its start position.
	pub const MOVING: ScanState = ScanState(StatusBits(0x02));
	/// The scanner is scanning.
	pub const SCAN: ScanState = ScanState(StatusBits(0x04));
	/// The scanner is idle.
	pub const IDLE: ScanState = ScanState(StatusBits(0x08));
	/// The scanner scans in a loop.
	pub const LOOP: ScanState = ScanState(StatusBits(0x10));

	const NAMES: [(ScanState, &'static str); 5] = [
		(ScanState::PAUSE, "Pause"),
		(ScanState::MOVING, "Move"),
		(ScanState::SCAN, "Scan"),
		(ScanState::IDLE, "Idle"),
		(ScanState::LOOP, "Loop"),
	];

	/// Whether every state in `other` is set.
	pub const fn contains(self, other: ScanState) -> bool {
		self.0.contains(other.0)
	}

	/// The raw status bits.
	pub const fn bits(self) -> StatusBits {
		self.0
	}
}

impl From<StatusBits> for ScanState {
	fn from(bits: StatusBits) -> Self {
		ScanState(bits)
	}
}

impl From<ScanState> for StatusBits {
	fn from(state: ScanState) -> Self {
		state.0
	}
}

impl fmt::Display for ScanState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut first = true;
		for (state, name) in ScanState::NAMES {
			if self.contains(state) {
				if !first {
					f.write_str(" ")?;
				}
				f.write_str(name)?;
				first = false;
			}
		}
		if first {
			write!(f, "{}", self.0)?;
		}
		Ok(())
	}
}

/// The geometry of a scan.
///
/// Lengths are in units of 10 pm and the sample time in units of 2.5 µs, as
/// the controller expects them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScanGeometry {
	/// Number of columns.
	pub columns: i32,
	/// Number of lines.
	pub lines: i32,
	/// Width of a column and height of a line [10 pm].
	pub pixel_size: i32,
	/// X offset of the scan range [10 pm].
	pub offset_x: i32,
	/// Y offset of the scan range [10 pm].
	pub offset_y: i32,
	/// Sample time per pixel [2.5 µs].
	pub sample_time: i32,
}

impl ScanGeometry {
	/// A `columns` by `lines` scan with 1 nm pixels, no offset and a 1 ms
	/// sample time.
	pub const fn new(columns: i32, lines: i32) -> Self {
		ScanGeometry {
			columns,
			lines,
			pixel_size: 100,
			offset_x: 0,
			offset_y: 0,
			sample_time: 400,
		}
	}

	/// The number of samples in one frame, covering the forward and backward traces.
	///
	/// Computed in 64 bits, so any pair of `i32` dimensions fits.
	pub fn frame_size(&self) -> i64 {
		i64::from(self.columns) * i64::from(self.lines) * 2
	}
}

/// Convert a scanner coordinate, the sum of an origin and an offset in units
/// of 10 pm, into µm.
fn to_micrometres(zero: i32, current: i32) -> f64 {
	(f64::from(zero) + f64::from(current)) / 1e5
}

impl<C: Controller> Session<C> {
	/// Read the state of the scanner.
	pub fn scan_status(&mut self) -> Result<ScanState, Error> {
		self.read_status(Subsystem::SCANNER).map(ScanState)
	}

	/// Start scanning and return once the scanner reports that it is scanning.
	///
	/// The scanner first moves to its start position, so the command is
	/// re-issued until the [`SCAN`](ScanState::SCAN) state is observed. Each
	/// observed state is logged.
	pub fn start_scan(&mut self) -> Result<ScanState, Error> {
		let options = self.poll_options();
		let name = self.name();
		self.run_until_status_with(
			ScanCommand::On,
			ScanState::SCAN.into(),
			options,
			|status| log::debug!("{name} scanner state: {}", ScanState(status)),
		)
		.map(ScanState)
	}

	/// Request the scanner to stop.
	pub fn stop_scan(&mut self) -> Result<(), Error> {
		self.issue_command(ScanCommand::Off)
	}

	/// Request the scanner to pause.
	///
	/// The request is not confirmed; read [`scan_status`](Session::scan_status)
	/// to observe the effect.
	pub fn pause_scan(&mut self) -> Result<(), Error> {
		self.issue_command(ScanCommand::Pause)
	}

	/// Switch off the automatic geometry adjustments and write the scan geometry.
	pub fn apply_scan_geometry(&mut self, geometry: &ScanGeometry) -> Result<(), Error> {
		self.set_parameter(address::SCAN_X_EQ_Y, 0)?;
		self.set_parameter(address::SCAN_GEOMODE, 0)?;
		self.set_parameter(address::SCAN_PIXEL, geometry.pixel_size)?;
		self.set_parameter(address::SCAN_COLUMNS, geometry.columns)?;
		self.set_parameter(address::SCAN_LINES, geometry.lines)?;
		self.set_parameter(address::SCAN_OFFSET_X, geometry.offset_x)?;
		self.set_parameter(address::SCAN_OFFSET_Y, geometry.offset_y)?;
		self.set_parameter(address::SCAN_MSPPX, geometry.sample_time)
	}

	/// The absolute position of the scanner, in µm.
	pub fn scanner_position(&mut self) -> Result<(f64, f64), Error> {
		let zero_x = self.get_parameter(address::SCAN_COORD_ZERO_X)?;
		let zero_y = self.get_parameter(address::SCAN_COORD_ZERO_Y)?;
		let curr_x = self.get_parameter(address::SCAN_CURR_X)?;
		let curr_y = self.get_parameter(address::SCAN_CURR_Y)?;
		Ok((
			to_micrometres(zero_x, curr_x),
			to_micrometres(zero_y, curr_y),
		))
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn display_lists_every_set_state() {
		assert_eq!(ScanState::IDLE.to_string(), "Idle");
		assert_eq!(ScanState(StatusBits(0x06)).to_string(), "Move Scan");
		assert_eq!(ScanState(StatusBits(0x1F)).to_string(), "Pause Move Scan Idle Loop");
		assert_eq!(ScanState(StatusBits(0)).to_string(), "0x00");
	}

	#[test]
	fn commands_target_the_scanner() {
		let command = Command::from(ScanCommand::Pause);
		assert_eq!(command.subsystem(), Subsystem::SCANNER);
		assert_eq!(command.value(), 2);
	}

	#[test]
	fn frame_size_covers_both_traces() {
		assert_eq!(ScanGeometry::new(100, 50).frame_size(), 10_000);
		assert_eq!(
			ScanGeometry::new(i32::MAX, i32::MAX).frame_size(),
			2 * i64::from(i32::MAX) * i64::from(i32::MAX)
		);
	}

	#[test]
	fn coordinates_in_micrometres() {
		assert!((to_micrometres(100_000, 50_000) - 1.5).abs() < 1e-12);
		// The sum is not clamped to the range of an i32.
		let far = to_micrometres(i32::MAX, i32::MAX);
		assert!((far - 2.0 * f64::from(i32::MAX) / 1e5).abs() < 1e-6);
	}
}
