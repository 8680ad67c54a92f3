//! Parameter addresses, subsystems and commands.
//!
//! Addresses are defined by the controller's own numbering scheme. Only the
//! addresses this library uses itself are listed here; any other address can
//! be constructed with [`Address::new`].

use std::fmt;

/// A device-defined identifier naming a controllable or readable value.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(i32);

impl Address {
	/// Create an address from its raw value.
	pub const fn new(raw: i32) -> Self {
		Address(raw)
	}

	/// Get the raw value of the address.
	pub const fn get(self) -> i32 {
		self.0
	}
}

impl From<i32> for Address {
	fn from(raw: i32) -> Self {
		Address(raw)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:04X}", self.0)
	}
}

/// Scan command register.
pub const SCAN_COMMAND: Address = Address(0x0100);
/// Scan status register.
pub const SCAN_STATUS: Address = Address(0x0101);
/// Couple the X and Y scan ranges (a GUI convenience).
pub const SCAN_X_EQ_Y: Address = Address(0x1006);
/// Automatic adjustment of the scan geometry (a GUI convenience).
pub const SCAN_GEOMODE: Address = Address(0x1009);
/// Width of a column/line [10 pm].
pub const SCAN_PIXEL: Address = Address(0x1021);
/// Number of columns.
pub const SCAN_COLUMNS: Address = Address(0x1003);
/// Number of lines.
pub const SCAN_LINES: Address = Address(0x001D);
/// X offset of the scan range [10 pm].
pub const SCAN_OFFSET_X: Address = Address(0x0010);
/// Y offset of the scan range [10 pm].
pub const SCAN_OFFSET_Y: Address = Address(0x0011);
/// Sample time per pixel [2.5 µs].
pub const SCAN_MSPPX: Address = Address(0x1020);
/// Scan rotation.
pub const SCAN_ROTATION: Address = Address(0x0018);
/// Scan only once instead of looping.
pub const SCAN_ONCE: Address = Address(0x002F);
/// Absolute X origin of the scanner coordinates [10 pm].
pub const SCAN_COORD_ZERO_X: Address = Address(0x02FE);
/// Absolute Y origin of the scanner coordinates [10 pm].
pub const SCAN_COORD_ZERO_Y: Address = Address(0x02FF);
/// Current X position relative to the origin [10 pm].
pub const SCAN_CURR_X: Address = Address(0x002A);
/// Current Y position relative to the origin [10 pm].
pub const SCAN_CURR_Y: Address = Address(0x002B);
/// Output status register (non-zero when the outputs are active).
pub const OUTPUT_STATUS: Address = Address(0x0140);
/// Output activation register.
pub const OUTPUT_ACTIVATE: Address = Address(0x0141);

/// A stateful subsystem of the controller that accepts commands and reports
/// its state in a status register.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Subsystem {
	/// The name of the subsystem, used in diagnostics.
	pub name: &'static str,
	/// The register commands are written to.
	pub command: Address,
	/// The register holding the subsystem's status bitmask.
	pub status: Address,
}

impl Subsystem {
	/// The scanner.
	pub const SCANNER: Subsystem = Subsystem {
		name: "scanner",
		command: SCAN_COMMAND,
		status: SCAN_STATUS,
	};
}

/// An enumerated request sent to a stateful [`Subsystem`].
///
/// Commands are requests: the effect of a command can only be observed by
/// reading the subsystem's status afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Command {
	subsystem: Subsystem,
	value: i32,
}

impl Command {
	/// Create a command that writes `value` to the subsystem's command register.
	pub const fn new(subsystem: Subsystem, value: i32) -> Self {
		Command { subsystem, value }
	}

	/// The subsystem receiving the command.
	pub const fn subsystem(&self) -> Subsystem {
		self.subsystem
	}

	/// The value written to the command register.
	pub const fn value(&self) -> i32 {
		self.value
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} command {}", self.subsystem.name, self.value)
	}
}

/// A status bitmask read from a subsystem's status register.
///
/// Bits are independent and several may be set at once during a transition.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct StatusBits(pub i32);

impl StatusBits {
	/// Whether every bit in `mask` is set.
	pub const fn contains(self, mask: StatusBits) -> bool {
		self.0 & mask.0 == mask.0
	}

	/// Whether any bit in `mask` is set.
	pub const fn intersects(self, mask: StatusBits) -> bool {
		self.0 & mask.0 != 0
	}
}

impl std::ops::BitOr for StatusBits {
	type Output = StatusBits;
	fn bitor(self, rhs: StatusBits) -> StatusBits {
		StatusBits(self.0 | rhs.0)
	}
}

impl fmt::Display for StatusBits {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:02X}", self.0)
	}
}
