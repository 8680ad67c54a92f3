//! Data channels, events and acquired frames.
//!
//! The controller acquires data on up to [`DATA_CHANNELS`] channels. Once a
//! channel's buffer is full the controller raises the channel's data event,
//! which can be waited on with [`Session::wait_for_event`]. The buffer is
//! then read out as a [`Frame`].
//!
//! ## Example
//!
//! ```rust
//! # use nanoctl::{backend::Controller, data::{ChannelConfig, WriteOptions}, error::Error, session::Session};
//! # use std::time::Duration;
//! # fn wrapper<C: Controller>(session: &mut Session<C>) -> Result<(), Error> {
//! session.configure_channel(&ChannelConfig::new(0))?;
//! session.configure_data_buffering(0, 1024)?;
//! let frame = session.poll_for_full_buffer(0, 30_000, Duration::from_millis(500))?;
//! session.write_buffer(&frame, &WriteOptions::new("scan_fwd"))?;
//! # Ok(())
//! # }
//! ```

use crate::{
	backend::Controller,
	error::{controller_code, Call, DataUnavailableError, Error, ReturnCode},
	poll::{PollOptions, Poller},
	session::{translate, Session},
};
use std::{fmt, time::Duration};

/// The number of data channels of the controller.
pub const DATA_CHANNELS: i32 = 14;

/// Trigger sources a channel can be connected to.
pub mod trigger {
	/// The channel is disabled.
	pub const DISABLED: i32 = 0x00;
	/// Acquire one sample per scanner pixel.
	pub const SCANNER: i32 = 0x01;
	/// Acquire continuously.
	pub const PERMANENT: i32 = 0x02;
	/// Acquire on every controller cycle.
	pub const EVERY: i32 = 0x08;
	/// Acquire on command.
	pub const COMMAND: i32 = 0x09;
}

/// Data sources a channel can acquire.
pub mod source {
	/// The first ADC.
	pub const ADC_MIN: i32 = 0;
	/// The last ADC.
	pub const ADC_MAX: i32 = 5;
	/// The Z output of the feedback loop.
	pub const Z_OUT: i32 = 9;
	/// The X position sensor.
	pub const SENSOR_POS_X: i32 = 31;
	/// The Y position sensor.
	pub const SENSOR_POS_Y: i32 = 32;
}

/// A bitmask selecting the events a wait should respond to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EventMask(i32);

impl EventMask {
	/// The custom event, raised when a selected parameter changes.
	pub const CUSTOM: EventMask = EventMask(0x8000);

	/// The "buffer full" event of a data channel.
	///
	/// # Panics
	///
	/// Panics if `channel` is not a valid data channel. See
	/// [`try_data`](EventMask::try_data) for a non-panicking version.
	pub fn data(channel: i32) -> Self {
		match Self::try_data(channel) {
			Some(mask) => mask,
			None => panic!("invalid data channel {channel}"),
		}
	}

	/// The "buffer full" event of a data channel, or `None` if `channel` is
	/// not a valid data channel.
	pub fn try_data(channel: i32) -> Option<Self> {
		if (0..DATA_CHANNELS).contains(&channel) {
			Some(EventMask(1 << channel))
		} else {
			None
		}
	}

	/// Create a mask from its raw value.
	pub const fn from_bits(bits: i32) -> Self {
		EventMask(bits)
	}

	/// Get the raw value of the mask.
	pub const fn bits(self) -> i32 {
		self.0
	}
}

impl std::ops::BitOr for EventMask {
	type Output = EventMask;
	fn bitor(self, rhs: EventMask) -> EventMask {
		EventMask(self.0 | rhs.0)
	}
}

impl fmt::Display for EventMask {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "0x{:04X}", self.0)
	}
}

/// An event reported by the controller.
///
/// An event code of `0` means the wait timed out and is never represented as
/// an `Event`; see [`Event::from_code`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Event(i32);

impl Event {
	/// Interpret the code returned by a wait. `0` (timeout) yields `None`.
	pub const fn from_code(code: i32) -> Option<Event> {
		if code == 0 {
			None
		} else {
			Some(Event(code))
		}
	}

	/// Get the raw event code.
	pub const fn code(self) -> i32 {
		self.0
	}

	/// Whether the event includes any of the events in `mask`.
	pub const fn matches(self, mask: EventMask) -> bool {
		self.0 & mask.0 != 0
	}
}

/// The configuration of a data channel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ChannelConfig {
	/// The channel number.
	pub channel: i32,
	/// The trigger source, see [`trigger`].
	pub trigger: i32,
	/// The data source, see [`source`].
	pub source: i32,
	/// Whether samples are averaged.
	pub average: i32,
	/// The sample time, only relevant for time triggered channels.
	pub sample_time: f64,
}

impl ChannelConfig {
	/// Connect `channel` to the scanner, acquiring the second ADC without averaging.
	pub fn new(channel: i32) -> Self {
		ChannelConfig {
			channel,
			trigger: trigger::SCANNER,
			source: source::ADC_MIN + 1,
			average: 0,
			sample_time: 0.,
		}
	}
}

/// Information about a buffer read, as reported by the controller.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct BufferInfo {
	/// The number of the frame.
	pub frame_number: i32,
	/// The buffer index of the first sample.
	pub index: i32,
	/// The number of valid samples. Zero or negative if no data were available.
	pub size: i32,
}

/// The metadata record accompanying a frame.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct Metadata(pub [i32; Metadata::WORDS]);

impl Metadata {
	/// The number of words in a metadata record.
	pub const WORDS: usize = 13;
}

/// One complete buffer of acquired samples plus its metadata.
///
/// A frame always holds at least one sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
	number: i32,
	index: i32,
	data: Vec<i32>,
	meta: Metadata,
}

impl Frame {
	/// The number of the frame.
	pub fn number(&self) -> i32 {
		self.number
	}

	/// The buffer index of the first sample.
	pub fn index(&self) -> i32 {
		self.index
	}

	/// The acquired samples.
	pub fn data(&self) -> &[i32] {
		&self.data
	}

	/// The metadata record.
	pub fn meta(&self) -> &Metadata {
		&self.meta
	}

	/// Consume the frame and return its samples.
	pub fn into_data(self) -> Vec<i32> {
		self.data
	}
}

/// Options for writing a [`Frame`] to a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
	/// The name of the file.
	pub file_name: String,
	/// A comment stored with the data.
	pub comment: String,
	/// Write binary instead of ASCII data.
	pub binary: bool,
	/// Write the forward (`true`) or backward (`false`) trace of a scan.
	pub forward: bool,
}

impl WriteOptions {
	/// Write the forward trace as ASCII data to `file_name`, without a comment.
	pub fn new(file_name: &str) -> Self {
		WriteOptions {
			file_name: file_name.to_string(),
			comment: String::new(),
			binary: false,
			forward: true,
		}
	}

	/// Set the comment stored with the data.
	pub fn comment(&mut self, comment: &str) -> &mut Self {
		self.comment = comment.to_string();
		self
	}

	/// Set whether binary data are written.
	pub fn binary(&mut self, binary: bool) -> &mut Self {
		self.binary = binary;
		self
	}

	/// Set whether the forward or backward trace is written.
	pub fn forward(&mut self, forward: bool) -> &mut Self {
		self.forward = forward;
		self
	}
}

impl<C: Controller> Session<C> {
	/// Connect a data channel to a trigger and data source.
	pub fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), Error> {
		self.check_poisoned()?;
		log::debug!("{} configure {config:?}", self.name());
		self.controller_mut()
			.configure_channel(config)
			.map_err(|code| translate(Call::new("configure_channel", format!("{config:?}")), code))
	}

	/// Configure the buffer size of a data channel.
	pub fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), Error> {
		self.check_poisoned()?;
		log::debug!("{} configure buffering channel={channel} size={size}", self.name());
		self.controller_mut()
			.configure_data_buffering(channel, size)
			.map_err(|code| {
				translate(
					Call::new(
						"configure_data_buffering",
						format!("channel={channel}, size={size}"),
					),
					code,
				)
			})
	}

	/// The size of one frame of the data channel, in samples.
	///
	/// A size that is not strictly positive is reported as a
	/// [`DataUnavailableError`].
	pub fn frame_size(&mut self, channel: i32) -> Result<usize, Error> {
		self.check_poisoned()?;
		let size = self.controller_mut().frame_size(channel);
		log::debug!("{} frame size channel={channel} -> {size}", self.name());
		positive_size(size).ok_or_else(|| {
			DataUnavailableError::new(Call::new("frame_size", format!("channel={channel}")), size).into()
		})
	}

	/// Read the data buffer of a channel once.
	///
	/// At most `capacity` samples are read. If `full_only` is set, only a
	/// completely filled buffer is returned. If the controller reports a size
	/// that is not strictly positive, a [`DataUnavailableError`] is returned.
	pub fn read_data_buffer(
		&mut self,
		channel: i32,
		full_only: bool,
		capacity: usize,
	) -> Result<Frame, Error> {
		self.check_poisoned()?;
		let call = || {
			Call::new(
				"data_buffer",
				format!("channel={channel}, full_only={full_only}, capacity={capacity}"),
			)
		};
		let mut data = vec![0; capacity];
		let mut meta = Metadata::default();
		let info = self
			.controller_mut()
			.data_buffer(channel, full_only, &mut data, &mut meta)
			.map_err(|code| translate(call(), code))?;
		log::debug!("{} read buffer channel={channel} -> {info:?}", self.name());

		let Some(size) = positive_size(info.size) else {
			return Err(DataUnavailableError::new(call(), info.size).into());
		};
		data.truncate(size);
		Ok(Frame {
			number: info.frame_number,
			index: info.index,
			data,
			meta,
		})
	}

	/// Wait for a channel's buffer to fill up and read it.
	///
	/// See [`poll_for_full_buffer_with`](Session::poll_for_full_buffer_with).
	pub fn poll_for_full_buffer(
		&mut self,
		channel: i32,
		frame_size: usize,
		poll_timeout: Duration,
	) -> Result<Frame, Error> {
		self.poll_for_full_buffer_with(channel, frame_size, poll_timeout, |_| Ok(()))
	}

	/// Wait for a channel's buffer to fill up and read it.
	///
	/// The "buffer full" event of `channel` is waited on for `poll_timeout` at a
	/// time. Every time the wait times out `progress` is called, for instance to
	/// report the scanner position; an error from `progress` aborts the wait.
	/// Once the event fires the buffer is read once with a capacity of
	/// `frame_size` samples.
	///
	/// The total wait is bounded by the session's
	/// [acquisition timeout](Session::acquisition_timeout). An invalid
	/// `channel` fails with a configuration error before anything is sent.
	pub fn poll_for_full_buffer_with<F>(
		&mut self,
		channel: i32,
		frame_size: usize,
		poll_timeout: Duration,
		mut progress: F,
	) -> Result<Frame, Error>
	where
		F: FnMut(&mut Self) -> Result<(), Error>,
	{
		let mask = EventMask::try_data(channel).ok_or_else(|| {
			translate(
				Call::new("wait_for_event", format!("channel={channel}")),
				ReturnCode(controller_code::INVALID_PARAMETER),
			)
		})?;
		let mut options = PollOptions::new();
		options
			.interval(Duration::ZERO)
			.timeout(self.acquisition_timeout());
		let mut poller = Poller::start(options);
		loop {
			match self.wait_for_event(poll_timeout, mask, None)? {
				Some(event) if event.matches(mask) => break,
				Some(event) => log::debug!("{} ignoring event {event:?}", self.name()),
				None => progress(self)?,
			}
			poller.check(|| format!("waiting for a full buffer on channel {channel}"))?;
		}
		self.read_data_buffer(channel, true, frame_size)
	}

	/// Write a frame to a file using the controller's export function.
	pub fn write_buffer(&mut self, frame: &Frame, options: &WriteOptions) -> Result<(), Error> {
		self.check_poisoned()?;
		log::debug!(
			"{} write frame {} ({} samples) to {:?}",
			self.name(),
			frame.number(),
			frame.data().len(),
			options.file_name
		);
		self.controller_mut().write_buffer(options, frame).map_err(|code| {
			translate(
				Call::new(
					"write_buffer",
					format!(
						"file_name={:?}, comment={:?}, binary={}, forward={}, index={}, size={}",
						options.file_name,
						options.comment,
						options.binary,
						options.forward,
						frame.index(),
						frame.data().len()
					),
				),
				code,
			)
		})
	}
}

/// Convert a size reported by the controller, if it is strictly positive.
fn positive_size(size: i32) -> Option<usize> {
	usize::try_from(size).ok().filter(|size| *size > 0)
}
