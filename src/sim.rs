//! A software simulation of a scan controller.
//!
//! The [`Simulator`] implements [`Controller`] without any hardware. It models
//! just enough of a real controller to exercise every operation of a
//! [`Session`](crate::session::Session):
//!
//! * the scanner moves to its start position over a few status reads before
//!   it can scan, and only while the outputs are active,
//! * the outputs become active a few status reads after activation, and a
//!   change of the output status raises the custom event,
//! * while scanning, every wait for a data event advances the scan by a
//!   number of lines; a completed frame raises the data event of each channel
//!   connected to the scanner,
//! * frames are exported as ASCII or binary files.
//!
//! The simulator never sleeps: a wait that does not produce an event returns
//! immediately as if it had timed out.

use crate::{
	address::{self, Address},
	backend::Controller,
	data::{
		trigger, BufferInfo, ChannelConfig, EventMask, Frame, Metadata, WriteOptions, DATA_CHANNELS,
	},
	error::{controller_code, ReturnCode},
	scanner::{ScanCommand, ScanState},
};
use std::{
	collections::HashMap,
	fs::File,
	io::{self, BufWriter, Write as _},
	path::Path,
};

/// The largest frame the simulator produces, in samples.
const MAX_FRAME_SIZE: i64 = 1 << 24;

/// Options for configuring a [`Simulator`].
///
/// ## Example
///
/// ```rust
/// # use nanoctl::sim::SimulatorOptions;
/// let simulator = SimulatorOptions::new()
///     .move_polls(1)
///     .lines_per_wait(50)
///     .build();
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SimulatorOptions {
	move_polls: u32,
	activation_polls: u32,
	lines_per_wait: i32,
}

impl SimulatorOptions {
	/// Create the default options.
	///
	/// The scanner needs 3 status reads to reach its start position, the
	/// outputs need 2 status reads to become active and each wait scans 8
	/// lines.
	pub fn new() -> Self {
		SimulatorOptions {
			move_polls: 3,
			activation_polls: 2,
			lines_per_wait: 8,
		}
	}

	/// Set how many status reads the scanner needs to reach its start position.
	pub fn move_polls(&mut self, polls: u32) -> &mut Self {
		self.move_polls = polls;
		self
	}

	/// Set how many status reads the outputs need to become active.
	pub fn activation_polls(&mut self, polls: u32) -> &mut Self {
		self.activation_polls = polls;
		self
	}

	/// Set how many lines are scanned during each wait for a data event.
	///
	/// Values less than one are treated as one.
	pub fn lines_per_wait(&mut self, lines: i32) -> &mut Self {
		self.lines_per_wait = lines.max(1);
		self
	}

	/// Create a simulator with these options.
	pub fn build(&self) -> Simulator {
		let parameters = [
			(address::SCAN_COLUMNS, 100),
			(address::SCAN_LINES, 100),
			(address::SCAN_PIXEL, 100),
			(address::SCAN_MSPPX, 400),
		]
		.into_iter()
		.map(|(address, value)| ((address.get(), 0), value))
		.collect();
		Simulator {
			options: *self,
			server: Server::Uninitialised,
			parameters,
			phase: Phase::Idle,
			outputs: Outputs::Off,
			output_changed: false,
			channels: HashMap::new(),
			buffering: HashMap::new(),
			frames: HashMap::new(),
			frame_number: 0,
		}
	}
}

impl Default for SimulatorOptions {
	fn default() -> Self {
		Self::new()
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Server {
	Uninitialised,
	Initialised { label: String, host: String, port: u16 },
	Running { label: String, host: String, port: u16 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
	Idle,
	Moving { remaining: u32 },
	AtStart,
	Scanning { lines_done: i32 },
	Paused { lines_done: i32 },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Outputs {
	Off,
	Activating { remaining: u32 },
	On,
}

/// A simulated scan controller.
#[derive(Debug)]
pub struct Simulator {
	options: SimulatorOptions,
	server: Server,
	parameters: HashMap<(i32, i32), i32>,
	phase: Phase,
	outputs: Outputs,
	/// Whether the output status changed since the last custom event.
	output_changed: bool,
	channels: HashMap<i32, ChannelConfig>,
	buffering: HashMap<i32, i32>,
	/// Completed frames waiting to be read, by channel.
	frames: HashMap<i32, (i32, Vec<i32>)>,
	frame_number: i32,
}

impl Simulator {
	/// Create a simulator with the default options.
	///
	/// See [`SimulatorOptions`] to customize the simulator.
	pub fn new() -> Self {
		SimulatorOptions::new().build()
	}

	fn check_running(&self) -> Result<(), ReturnCode> {
		match self.server {
			Server::Running { .. } => Ok(()),
			_ => Err(ReturnCode(controller_code::NO_SERVER_CONTACT)),
		}
	}

	fn check_channel(channel: i32) -> Result<(), ReturnCode> {
		if (0..DATA_CHANNELS).contains(&channel) {
			Ok(())
		} else {
			Err(ReturnCode(controller_code::INVALID_PARAMETER))
		}
	}

	fn parameter(&self, address: Address) -> i32 {
		self.parameters.get(&(address.get(), 0)).copied().unwrap_or(0)
	}

	fn set_outputs(&mut self, outputs: Outputs) {
		let was_on = self.outputs == Outputs::On;
		self.outputs = outputs;
		if was_on != (outputs == Outputs::On) {
			self.output_changed = true;
		}
		if outputs == Outputs::Off {
			self.phase = Phase::Idle;
		}
	}

	fn command(&mut self, value: i32) -> Result<(), ReturnCode> {
		self.phase = if value == ScanCommand::On.value() {
			match self.phase {
				Phase::Idle if self.outputs == Outputs::On => Phase::Moving {
					remaining: self.options.move_polls,
				},
				Phase::AtStart => Phase::Scanning { lines_done: 0 },
				Phase::Paused { lines_done } => Phase::Scanning { lines_done },
				phase => phase,
			}
		} else if value == ScanCommand::Off.value() {
			Phase::Idle
		} else if value == ScanCommand::Pause.value() {
			match self.phase {
				Phase::Scanning { lines_done } => Phase::Paused { lines_done },
				phase => phase,
			}
		} else {
			return Err(ReturnCode(controller_code::INVALID_PARAMETER));
		};
		Ok(())
	}

	fn set(&mut self, address: Address, index: i32, value: i32) -> Result<(), ReturnCode> {
		if address == address::SCAN_COMMAND {
			self.command(value)
		} else if address == address::OUTPUT_ACTIVATE {
			match (value != 0, self.outputs) {
				(true, Outputs::Off) => self.set_outputs(Outputs::Activating {
					remaining: self.options.activation_polls,
				}),
				(false, _) => self.set_outputs(Outputs::Off),
				_ => {}
			}
			Ok(())
		} else {
			self.parameters.insert((address.get(), index), value);
			Ok(())
		}
	}

	fn scan_status(&mut self) -> i32 {
		let state = match self.phase {
			Phase::Idle | Phase::AtStart => ScanState::IDLE,
			Phase::Moving { remaining } => {
				self.phase = if remaining <= 1 {
					Phase::AtStart
				} else {
					Phase::Moving { remaining: remaining - 1 }
				};
				ScanState::MOVING
			}
			Phase::Scanning { .. } if self.parameter(address::SCAN_ONCE) == 0 => {
				return (ScanState::SCAN.bits() | ScanState::LOOP.bits()).0;
			}
			Phase::Scanning { .. } => ScanState::SCAN,
			Phase::Paused { .. } => ScanState::PAUSE,
		};
		state.bits().0
	}

	fn output_status(&mut self) -> i32 {
		match self.outputs {
			Outputs::Off => 0,
			Outputs::On => 1,
			Outputs::Activating { remaining } => {
				if remaining <= 1 {
					self.set_outputs(Outputs::On);
				} else {
					self.outputs = Outputs::Activating { remaining: remaining - 1 };
				}
				0
			}
		}
	}

	/// The scanner position along Y [10 pm].
	fn current_y(&self) -> i32 {
		let lines_done = match self.phase {
			Phase::Scanning { lines_done } | Phase::Paused { lines_done } => lines_done,
			_ => 0,
		};
		let y = i64::from(self.parameter(address::SCAN_OFFSET_Y))
			+ i64::from(lines_done) * i64::from(self.parameter(address::SCAN_PIXEL));
		saturate(y)
	}

	fn geometry_frame_size(&self) -> i32 {
		let columns = i64::from(self.parameter(address::SCAN_COLUMNS));
		let lines = i64::from(self.parameter(address::SCAN_LINES));
		let size = columns * lines * 2;
		if size > 0 && size <= MAX_FRAME_SIZE {
			saturate(size)
		} else {
			0
		}
	}

	/// Advance the scan and complete a frame when the last line is done.
	fn advance_scan(&mut self) {
		let Phase::Scanning { lines_done } = self.phase else {
			return;
		};
		let lines = self.parameter(address::SCAN_LINES);
		let lines_done = lines_done.saturating_add(self.options.lines_per_wait);
		if lines_done < lines {
			self.phase = Phase::Scanning { lines_done };
			return;
		}

		self.frame_number = self.frame_number.wrapping_add(1);
		let scanner_channels: Vec<i32> = self
			.channels
			.values()
			.filter(|config| config.trigger == trigger::SCANNER)
			.map(|config| config.channel)
			.collect();
		for channel in scanner_channels {
			let samples = self.synthesize(channel);
			self.frames.insert(channel, (self.frame_number, samples));
		}
		self.phase = if self.parameter(address::SCAN_ONCE) == 0 {
			Phase::Scanning { lines_done: 0 }
		} else {
			Phase::Idle
		};
	}

	/// Synthesize a frame: for each line the forward trace followed by the backward trace.
	fn synthesize(&self, channel: i32) -> Vec<i32> {
		let columns = self.parameter(address::SCAN_COLUMNS);
		let lines = self.parameter(address::SCAN_LINES);
		let capacity = usize::try_from(self.geometry_frame_size()).unwrap_or(0);
		let mut samples = Vec::with_capacity(capacity);
		if capacity == 0 {
			return samples;
		}
		for line in 0..lines {
			for trace in 0..2 {
				for column in 0..columns {
					let value = (i64::from(column) * 7
						+ i64::from(line) * 13
						+ i64::from(trace) * 5
						+ i64::from(channel))
						% 1024;
					samples.push(saturate(value));
				}
			}
		}
		samples
	}

	fn ready_events(&self) -> i32 {
		self.frames
			.keys()
			.fold(0, |bits, channel| bits | EventMask::data(*channel).bits())
	}

	fn load_profile(&mut self, path: &Path) -> Result<(), ReturnCode> {
		let contents = std::fs::read_to_string(path)
			.map_err(|_| ReturnCode(controller_code::FILE_OPEN_FAILURE))?;
		let mut entries = Vec::new();
		for line in contents.lines().map(str::trim) {
			if line.is_empty() || line.starts_with('#') {
				continue;
			}
			let entry = parse_profile_line(line)
				.ok_or(ReturnCode(controller_code::INVALID_PROFILE_FORMAT))?;
			entries.push(entry);
		}
		for (address, value) in entries {
			self.set(address, 0, value)?;
		}
		Ok(())
	}

	fn export(&self, options: &WriteOptions, frame: &Frame) -> io::Result<()> {
		let columns = usize::try_from(self.parameter(address::SCAN_COLUMNS)).unwrap_or(0);
		let trace = select_trace(frame.data(), columns, options.forward);
		let mut writer = BufWriter::new(File::create(&options.file_name)?);
		if options.binary {
			for sample in &trace {
				writer.write_all(&sample.to_le_bytes())?;
			}
		} else {
			writeln!(writer, "# {}", options.comment)?;
			writeln!(
				writer,
				"# frame {} {} trace",
				frame.number(),
				if options.forward { "forward" } else { "backward" }
			)?;
			for row in trace.chunks(columns.max(1)) {
				let row: Vec<String> = row.iter().map(i32::to_string).collect();
				writeln!(writer, "{}", row.join("\t"))?;
			}
		}
		writer.flush()
	}
}

impl Default for Simulator {
	fn default() -> Self {
		Self::new()
	}
}

/// Clamp a wide intermediate value into the controller's value range.
fn saturate(value: i64) -> i32 {
	i32::try_from(value).unwrap_or(if value < 0 { i32::MIN } else { i32::MAX })
}

/// Parse a profile line of the form `ADDRESS = VALUE`. Addresses may be hexadecimal.
fn parse_profile_line(line: &str) -> Option<(Address, i32)> {
	let (address, value) = line.split_once('=')?;
	let address = address.trim();
	let address = match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
		Some(hex) => i32::from_str_radix(hex, 16).ok()?,
		None => address.parse().ok()?,
	};
	let value = value.trim().parse().ok()?;
	Some((Address::new(address), value))
}

/// Select the forward or backward trace of a frame. Data that do not divide
/// into lines of `columns` are returned unchanged.
fn select_trace(data: &[i32], columns: usize, forward: bool) -> Vec<i32> {
	if columns == 0 {
		return data.to_vec();
	}
	let lines = data.chunks_exact(columns * 2);
	if !lines.remainder().is_empty() {
		return data.to_vec();
	}
	lines
		.flat_map(|line| if forward { &line[..columns] } else { &line[columns..] })
		.copied()
		.collect()
}

impl Controller for Simulator {
	fn init(
		&mut self,
		label: &str,
		_search_path: &str,
		server_host: &str,
		port: u16,
	) -> Result<(), ReturnCode> {
		if port == 0 {
			return Err(ReturnCode(controller_code::INVALID_PARAMETER));
		}
		self.server = Server::Initialised {
			label: label.to_string(),
			host: server_host.to_string(),
			port,
		};
		Ok(())
	}

	fn run(&mut self) {
		if let Server::Initialised { label, host, port } = &self.server {
			self.server = Server::Running {
				label: label.clone(),
				host: host.clone(),
				port: *port,
			};
		}
	}

	fn stop(&mut self) -> Result<(), ReturnCode> {
		self.check_running()?;
		self.server = Server::Uninitialised;
		self.phase = Phase::Idle;
		self.outputs = Outputs::Off;
		Ok(())
	}

	fn set_parameter_async(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), ReturnCode> {
		self.check_running()?;
		self.set(address, index, value)
	}

	fn get_parameter_sync(&mut self, address: Address, index: i32) -> Result<i32, ReturnCode> {
		self.check_running()?;
		Ok(if address == address::SCAN_STATUS {
			self.scan_status()
		} else if address == address::OUTPUT_STATUS {
			self.output_status()
		} else if address == address::SCAN_CURR_X {
			self.parameter(address::SCAN_OFFSET_X)
		} else if address == address::SCAN_CURR_Y {
			self.current_y()
		} else {
			self.parameters.get(&(address.get(), index)).copied().unwrap_or(0)
		})
	}

	fn send_profile(&mut self, path: &Path) -> Result<(), ReturnCode> {
		self.check_running()?;
		self.load_profile(path)
	}

	fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), ReturnCode> {
		self.check_running()?;
		Self::check_channel(config.channel)?;
		if config.trigger == trigger::DISABLED {
			self.channels.remove(&config.channel);
		} else {
			self.channels.insert(config.channel, *config);
		}
		Ok(())
	}

	fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), ReturnCode> {
		self.check_running()?;
		Self::check_channel(channel)?;
		self.buffering.insert(channel, size);
		Ok(())
	}

	fn frame_size(&mut self, channel: i32) -> i32 {
		match self.channels.get(&channel) {
			Some(config) if config.trigger == trigger::SCANNER => self.geometry_frame_size(),
			Some(_) => self.buffering.get(&channel).copied().unwrap_or(0),
			None => 0,
		}
	}

	fn data_buffer(
		&mut self,
		channel: i32,
		_full_only: bool,
		data: &mut [i32],
		meta: &mut Metadata,
	) -> Result<BufferInfo, ReturnCode> {
		self.check_running()?;
		Self::check_channel(channel)?;
		// Partially filled buffers are never exposed.
		let Some((frame_number, samples)) = self.frames.remove(&channel) else {
			return Ok(BufferInfo::default());
		};
		let count = samples.len().min(data.len());
		data[..count].copy_from_slice(&samples[..count]);
		let size = i32::try_from(count).unwrap_or(i32::MAX);
		let source = self.channels.get(&channel).map_or(0, |config| config.source);
		*meta = Metadata([
			frame_number,
			self.parameter(address::SCAN_COLUMNS),
			self.parameter(address::SCAN_LINES),
			self.parameter(address::SCAN_PIXEL),
			self.parameter(address::SCAN_OFFSET_X),
			self.parameter(address::SCAN_OFFSET_Y),
			self.parameter(address::SCAN_MSPPX),
			self.parameter(address::SCAN_ROTATION),
			channel,
			source,
			trigger::SCANNER,
			0,
			size,
		]);
		Ok(BufferInfo {
			frame_number,
			index: 0,
			size,
		})
	}

	fn write_buffer(&mut self, options: &WriteOptions, frame: &Frame) -> Result<(), ReturnCode> {
		self.check_running()?;
		self.export(options, frame)
			.map_err(|_| ReturnCode(controller_code::FILE_OPEN_FAILURE))
	}

	fn wait_for_event(&mut self, _timeout_ms: i32, mask: i32, custom_id: i32) -> i32 {
		if self.check_running().is_err() {
			return 0;
		}
		let custom = EventMask::CUSTOM.bits();
		if mask & custom != 0 && custom_id == address::OUTPUT_STATUS.get() && self.output_changed {
			self.output_changed = false;
			return custom;
		}
		if mask & !custom != 0 {
			self.advance_scan();
			return self.ready_events() & mask;
		}
		0
	}

	fn name(&self) -> Option<String> {
		match &self.server {
			Server::Uninitialised => None,
			Server::Initialised { label, host, port } | Server::Running { label, host, port } => {
				let host = if host.is_empty() { "localhost" } else { host };
				Some(format!("<simulator {label:?} {host}:{port}>"))
			}
		}
	}
}
