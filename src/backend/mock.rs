//! Scripted backends for testing code that drives controllers.
//!
//! The mocks do not model any device. Values read from them are scripted in
//! advance and every call made on them is recorded, so tests can assert on
//! exactly what was sent.

use super::Controller;
use crate::{
	address::Address,
	data::{BufferInfo, ChannelConfig, Frame, Metadata, WriteOptions},
	error::{positioner_code, ReturnCode},
	positioner::{AxisStatus, DeviceInfo, DeviceType, Interfaces, PositionerBackend},
};
use std::{
	collections::{HashMap, VecDeque},
	path::{Path, PathBuf},
};

/// Take the next scripted value. The last value of a script is repeated forever.
fn next_sticky<T: Copy>(script: &mut VecDeque<T>) -> Option<T> {
	if script.len() > 1 {
		script.pop_front()
	} else {
		script.front().copied()
	}
}

/// The fallible operations of a [`Mock`] that can be made to fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Op {
	/// [`Controller::init`].
	Init,
	/// [`Controller::stop`].
	Stop,
	/// [`Controller::set_parameter_async`].
	SetParameter,
	/// [`Controller::get_parameter_sync`].
	GetParameter,
	/// [`Controller::send_profile`].
	SendProfile,
	/// [`Controller::configure_channel`].
	ConfigureChannel,
	/// [`Controller::configure_data_buffering`].
	ConfigureDataBuffering,
	/// [`Controller::data_buffer`].
	DataBuffer,
	/// [`Controller::write_buffer`].
	WriteBuffer,
}

/// A call recorded by a [`Mock`].
#[derive(Debug, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum MockCall {
	Init {
		label: String,
		search_path: String,
		server_host: String,
		port: u16,
	},
	Run,
	Stop,
	SetParameter(Address, i32, i32),
	GetParameter(Address, i32),
	SendProfile(PathBuf),
	ConfigureChannel(ChannelConfig),
	ConfigureDataBuffering(i32, i32),
	FrameSize(i32),
	DataBuffer {
		channel: i32,
		full_only: bool,
		capacity: usize,
	},
	WriteBuffer(WriteOptions, Frame),
	WaitForEvent {
		timeout_ms: i32,
		mask: i32,
		custom_id: i32,
	},
}

/// A scripted scan controller.
///
/// * Parameters echo the last value set, unless reads of the address were
///   scripted with [`script_reads`](Mock::script_reads).
/// * Waits return the events pushed with [`push_event`](Mock::push_event),
///   then `0` (timed out).
/// * Buffer reads return the buffers pushed with
///   [`push_buffer`](Mock::push_buffer), then an empty buffer.
/// * A failure set with [`fail_next`](Mock::fail_next) is surfaced once.
#[derive(Debug, Default)]
pub struct Mock {
	parameters: HashMap<(Address, i32), i32>,
	reads: HashMap<Address, VecDeque<i32>>,
	events: VecDeque<i32>,
	buffers: VecDeque<(BufferInfo, Vec<i32>)>,
	frame_sizes: HashMap<i32, i32>,
	failures: HashMap<Op, i32>,
	calls: Vec<MockCall>,
}

impl Mock {
	/// Create a new Mock controller.
	pub fn new() -> Self {
		Self::default()
	}

	/// Script the values successively read from `address`.
	///
	/// Once the script is exhausted, its last value is read forever.
	pub fn script_reads<I: IntoIterator<Item = i32>>(&mut self, address: Address, values: I) {
		self.reads.entry(address).or_default().extend(values);
	}

	/// Queue an event code to be returned by the next wait.
	pub fn push_event(&mut self, code: i32) {
		self.events.push_back(code);
	}

	/// Queue a buffer to be returned by the next buffer read.
	pub fn push_buffer(&mut self, frame_number: i32, index: i32, samples: Vec<i32>) {
		let size = i32::try_from(samples.len()).unwrap_or(i32::MAX);
		self.buffers.push_back((
			BufferInfo {
				frame_number,
				index,
				size,
			},
			samples,
		));
	}

	/// Queue a buffer read that reports `size` without any samples.
	pub fn push_empty_buffer(&mut self, size: i32) {
		self.buffers.push_back((
			BufferInfo {
				size,
				..BufferInfo::default()
			},
			Vec::new(),
		));
	}

	/// Set the frame size reported for a channel. The default is `0`.
	pub fn set_frame_size(&mut self, channel: i32, size: i32) {
		self.frame_sizes.insert(channel, size);
	}

	/// Make the next call of `op` fail with `code`.
	pub fn fail_next(&mut self, op: Op, code: i32) {
		self.failures.insert(op, code);
	}

	/// The value last set at `address`, index 0.
	pub fn parameter(&self, address: Address) -> Option<i32> {
		self.parameters.get(&(address, 0)).copied()
	}

	/// All calls made so far, oldest first.
	pub fn calls(&self) -> &[MockCall] {
		&self.calls
	}

	/// Forget all recorded calls.
	pub fn clear_calls(&mut self) {
		self.calls.clear();
	}

	/// How many times a value was set at `address`.
	pub fn set_count(&self, address: Address) -> usize {
		self.calls
			.iter()
			.filter(|call| matches!(call, MockCall::SetParameter(a, _, _) if *a == address))
			.count()
	}

	/// How many times `address` was read.
	pub fn get_count(&self, address: Address) -> usize {
		self.calls
			.iter()
			.filter(|call| matches!(call, MockCall::GetParameter(a, _) if *a == address))
			.count()
	}

	/// The frames written so far.
	pub fn written(&self) -> Vec<&Frame> {
		self.calls
			.iter()
			.filter_map(|call| match call {
				MockCall::WriteBuffer(_, frame) => Some(frame),
				_ => None,
			})
			.collect()
	}

	/// Whether the server was stopped.
	pub fn was_stopped(&self) -> bool {
		self.calls.contains(&MockCall::Stop)
	}

	fn check(&mut self, op: Op) -> Result<(), ReturnCode> {
		match self.failures.remove(&op) {
			Some(code) => Err(ReturnCode(code)),
			None => Ok(()),
		}
	}
}

impl Controller for Mock {
	fn init(
		&mut self,
		label: &str,
		search_path: &str,
		server_host: &str,
		port: u16,
	) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::Init {
			label: label.to_string(),
			search_path: search_path.to_string(),
			server_host: server_host.to_string(),
			port,
		});
		self.check(Op::Init)
	}

	fn run(&mut self) {
		self.calls.push(MockCall::Run);
	}

	fn stop(&mut self) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::Stop);
		self.check(Op::Stop)
	}

	fn set_parameter_async(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::SetParameter(address, index, value));
		self.check(Op::SetParameter)?;
		self.parameters.insert((address, index), value);
		Ok(())
	}

	fn get_parameter_sync(&mut self, address: Address, index: i32) -> Result<i32, ReturnCode> {
		self.calls.push(MockCall::GetParameter(address, index));
		self.check(Op::GetParameter)?;
		let scripted = self.reads.get_mut(&address).and_then(next_sticky);
		Ok(scripted.unwrap_or_else(|| self.parameters.get(&(address, index)).copied().unwrap_or(0)))
	}

	fn send_profile(&mut self, path: &Path) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::SendProfile(path.to_path_buf()));
		self.check(Op::SendProfile)
	}

	fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::ConfigureChannel(*config));
		self.check(Op::ConfigureChannel)
	}

	fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::ConfigureDataBuffering(channel, size));
		self.check(Op::ConfigureDataBuffering)
	}

	fn frame_size(&mut self, channel: i32) -> i32 {
		self.calls.push(MockCall::FrameSize(channel));
		self.frame_sizes.get(&channel).copied().unwrap_or(0)
	}

	fn data_buffer(
		&mut self,
		channel: i32,
		full_only: bool,
		data: &mut [i32],
		meta: &mut Metadata,
	) -> Result<BufferInfo, ReturnCode> {
		self.calls.push(MockCall::DataBuffer {
			channel,
			full_only,
			capacity: data.len(),
		});
		self.check(Op::DataBuffer)?;
		let Some((info, samples)) = self.buffers.pop_front() else {
			return Ok(BufferInfo::default());
		};
		let count = samples.len().min(data.len());
		data[..count].copy_from_slice(&samples[..count]);
		meta.0[0] = info.frame_number;
		let size = if info.size > 0 {
			info.size.min(i32::try_from(count).unwrap_or(i32::MAX))
		} else {
			info.size
		};
		Ok(BufferInfo { size, ..info })
	}

	fn write_buffer(&mut self, options: &WriteOptions, frame: &Frame) -> Result<(), ReturnCode> {
		self.calls.push(MockCall::WriteBuffer(options.clone(), frame.clone()));
		self.check(Op::WriteBuffer)
	}

	fn wait_for_event(&mut self, timeout_ms: i32, mask: i32, custom_id: i32) -> i32 {
		self.calls.push(MockCall::WaitForEvent {
			timeout_ms,
			mask,
			custom_id,
		});
		self.events.pop_front().unwrap_or(0)
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock {self:p}>"))
	}
}

/// A call recorded by a [`MockPositioner`].
#[derive(Debug, Copy, Clone, PartialEq)]
#[allow(missing_docs)]
pub enum PositionerCall {
	Discover(Interfaces),
	Connect(u32),
	Disconnect,
	AxisStatus(u32),
	Position(u32),
	SetTargetPosition(u32, f64),
	SetTargetRange(u32, f64),
	SetAxisOutput(u32, bool, bool),
	StartAutoMove(u32, bool, bool),
	StartContinuousMove(u32, bool, bool),
	SingleStep(u32, bool),
	Amplitude(u32),
	SetAmplitude(u32, f64),
	Frequency(u32),
	SetFrequency(u32, f64),
	DcVoltage(u32),
	SetDcVoltage(u32, f64),
	DeviceInfo(u32),
	FirmwareVersion,
}

/// A scripted closed-loop positioner.
///
/// Axis statuses and positions are scripted per axis and the last scripted
/// value is repeated forever. Amplitudes, frequencies and DC levels echo the
/// last value set. Every discovered device is a resistive one reached over
/// USB. A failure set with [`fail_next`](MockPositioner::fail_next) is
/// surfaced by the next call, whatever it is.
#[derive(Debug)]
pub struct MockPositioner {
	device_count: u32,
	connected: bool,
	statuses: HashMap<u32, VecDeque<AxisStatus>>,
	positions: HashMap<u32, VecDeque<f64>>,
	amplitudes: HashMap<u32, f64>,
	frequencies: HashMap<u32, f64>,
	dc_voltages: HashMap<u32, f64>,
	firmware_version: i32,
	failure: Option<i32>,
	calls: Vec<PositionerCall>,
}

impl MockPositioner {
	/// Create a positioner library that discovers a single device.
	pub fn new() -> Self {
		MockPositioner {
			device_count: 1,
			connected: false,
			statuses: HashMap::new(),
			positions: HashMap::new(),
			amplitudes: HashMap::new(),
			frequencies: HashMap::new(),
			dc_voltages: HashMap::new(),
			firmware_version: 0,
			failure: None,
			calls: Vec::new(),
		}
	}

	/// Set the number of devices discovered.
	pub fn set_device_count(&mut self, count: u32) {
		self.device_count = count;
	}

	/// Set the firmware version reported by the device.
	pub fn set_firmware_version(&mut self, version: i32) {
		self.firmware_version = version;
	}

	/// Append a status to the script of an axis.
	pub fn push_status(&mut self, axis: u32, status: AxisStatus) {
		self.statuses.entry(axis).or_default().push_back(status);
	}

	/// Append a position to the script of an axis.
	pub fn push_position(&mut self, axis: u32, position: f64) {
		self.positions.entry(axis).or_default().push_back(position);
	}

	/// Make the next call fail with `code`.
	pub fn fail_next(&mut self, code: i32) {
		self.failure = Some(code);
	}

	/// Whether a device is connected.
	pub fn is_connected(&self) -> bool {
		self.connected
	}

	/// All calls made so far, oldest first.
	pub fn calls(&self) -> &[PositionerCall] {
		&self.calls
	}

	fn record(&mut self, call: PositionerCall) -> Result<(), ReturnCode> {
		self.calls.push(call);
		match self.failure.take() {
			Some(code) => Err(ReturnCode(code)),
			None => Ok(()),
		}
	}
}

impl Default for MockPositioner {
	fn default() -> Self {
		Self::new()
	}
}

impl PositionerBackend for MockPositioner {
	fn discover(&mut self, interfaces: Interfaces) -> Result<u32, ReturnCode> {
		self.record(PositionerCall::Discover(interfaces))?;
		Ok(self.device_count)
	}

	fn connect(&mut self, device: u32) -> Result<(), ReturnCode> {
		self.record(PositionerCall::Connect(device))?;
		self.connected = true;
		Ok(())
	}

	fn disconnect(&mut self) -> Result<(), ReturnCode> {
		self.record(PositionerCall::Disconnect)?;
		self.connected = false;
		Ok(())
	}

	fn axis_status(&mut self, axis: u32) -> Result<AxisStatus, ReturnCode> {
		self.record(PositionerCall::AxisStatus(axis))?;
		Ok(self
			.statuses
			.get_mut(&axis)
			.and_then(next_sticky)
			.unwrap_or_default())
	}

	fn position(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		self.record(PositionerCall::Position(axis))?;
		Ok(self
			.positions
			.get_mut(&axis)
			.and_then(next_sticky)
			.unwrap_or_default())
	}

	fn set_target_position(&mut self, axis: u32, target: f64) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetTargetPosition(axis, target))
	}

	fn set_target_range(&mut self, axis: u32, range: f64) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetTargetRange(axis, range))
	}

	fn set_axis_output(
		&mut self,
		axis: u32,
		enable: bool,
		auto_disable: bool,
	) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetAxisOutput(axis, enable, auto_disable))
	}

	fn start_auto_move(
		&mut self,
		axis: u32,
		enable: bool,
		relative: bool,
	) -> Result<(), ReturnCode> {
		self.record(PositionerCall::StartAutoMove(axis, enable, relative))
	}

	fn start_continuous_move(
		&mut self,
		axis: u32,
		start: bool,
		backward: bool,
	) -> Result<(), ReturnCode> {
		self.record(PositionerCall::StartContinuousMove(axis, start, backward))
	}

	fn start_single_step(&mut self, axis: u32, backward: bool) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SingleStep(axis, backward))
	}

	fn amplitude(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		self.record(PositionerCall::Amplitude(axis))?;
		Ok(self.amplitudes.get(&axis).copied().unwrap_or_default())
	}

	fn set_amplitude(&mut self, axis: u32, amplitude: f64) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetAmplitude(axis, amplitude))?;
		self.amplitudes.insert(axis, amplitude);
		Ok(())
	}

	fn frequency(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		self.record(PositionerCall::Frequency(axis))?;
		Ok(self.frequencies.get(&axis).copied().unwrap_or_default())
	}

	fn set_frequency(&mut self, axis: u32, frequency: f64) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetFrequency(axis, frequency))?;
		self.frequencies.insert(axis, frequency);
		Ok(())
	}

	fn dc_voltage(&mut self, axis: u32) -> Result<f64, ReturnCode> {
		self.record(PositionerCall::DcVoltage(axis))?;
		Ok(self.dc_voltages.get(&axis).copied().unwrap_or_default())
	}

	fn set_dc_voltage(&mut self, axis: u32, voltage: f64) -> Result<(), ReturnCode> {
		self.record(PositionerCall::SetDcVoltage(axis, voltage))?;
		self.dc_voltages.insert(axis, voltage);
		Ok(())
	}

	fn device_info(&mut self, device: u32) -> Result<DeviceInfo, ReturnCode> {
		self.record(PositionerCall::DeviceInfo(device))?;
		if device >= self.device_count {
			return Err(ReturnCode(positioner_code::NO_DEVICE));
		}
		Ok(DeviceInfo {
			device_type: DeviceType::Resistive,
			hardware_id: i32::try_from(device).unwrap_or(i32::MAX),
			serial_number: format!("MOCK{device:04}"),
			address: "USB".to_string(),
			connected: self.connected,
		})
	}

	fn firmware_version(&mut self) -> Result<i32, ReturnCode> {
		self.record(PositionerCall::FirmwareVersion)?;
		Ok(self.firmware_version)
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock positioner {self:p}>"))
	}
}
