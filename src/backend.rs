//! Types that can exchange requests and responses with a controller.
//!
//! The [`Controller`] trait represents the synchronous call interface of a
//! scan controller's control service. Every fallible call reports failure with
//! the raw [`ReturnCode`] of the service; translating those codes into typed
//! errors is left to the [`Session`](crate::session::Session).
//!
//! A `Controller` is typically a thin wrapper around the vendor's native
//! library, but it can be anything that honours the request/response contract,
//! such as the [`Simulator`](crate::sim::Simulator).

#[cfg(any(test, feature = "mock"))]
#[cfg_attr(all(doc, feature = "doc_cfg"), doc(cfg(feature = "mock")))]
pub mod mock;

use crate::{
	address::Address,
	data::{BufferInfo, ChannelConfig, Frame, Metadata, WriteOptions},
	error::ReturnCode,
};
use std::path::Path;

/// The placeholder name for a controller that doesn't have a name.
pub(crate) const UNKNOWN_CONTROLLER_NAME: &str = "<unknown controller>";

/// The synchronous request/response interface of a scan controller's control service.
///
/// Implementations are driven by a single thread, one request at a time.
pub trait Controller {
	/// Initialise the control service.
	///
	/// `label` is passed verbatim to the service, `search_path` is where it
	/// looks for its server executable and boot image, and `server_host` and
	/// `port` locate the server (an empty host means a local server).
	fn init(
		&mut self,
		label: &str,
		search_path: &str,
		server_host: &str,
		port: u16,
	) -> Result<(), ReturnCode>;

	/// Start the service's background server.
	fn run(&mut self);

	/// Stop the service's background server.
	fn stop(&mut self) -> Result<(), ReturnCode>;

	/// Send a value to a parameter. The call returns once the request is sent.
	fn set_parameter_async(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), ReturnCode>;

	/// Read a parameter, blocking until the controller responds.
	fn get_parameter_sync(&mut self, address: Address, index: i32) -> Result<i32, ReturnCode>;

	/// Send a parameter profile file to the controller.
	fn send_profile(&mut self, path: &Path) -> Result<(), ReturnCode>;

	/// Connect a data channel to a trigger and data source.
	fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), ReturnCode>;

	/// Configure the buffering of a data channel.
	fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), ReturnCode>;

	/// The size of one frame of the data channel, in samples.
	fn frame_size(&mut self, channel: i32) -> i32;

	/// Read the data buffer of a channel into `data` and `meta`.
	///
	/// If `full_only` is set only a completely filled buffer is returned. At most
	/// `data.len()` samples are written. The returned [`BufferInfo::size`] is the
	/// number of valid samples and may be zero or negative if no data were available.
	fn data_buffer(
		&mut self,
		channel: i32,
		full_only: bool,
		data: &mut [i32],
		meta: &mut Metadata,
	) -> Result<BufferInfo, ReturnCode>;

	/// Write a frame to a file.
	fn write_buffer(&mut self, options: &WriteOptions, frame: &Frame) -> Result<(), ReturnCode>;

	/// Block until one of the events in `mask` occurs or `timeout_ms` elapses.
	///
	/// Returns the event code, or `0` if the call timed out without an event.
	/// `custom_id` selects the parameter whose change triggers the custom event.
	fn wait_for_event(&mut self, timeout_ms: i32, mask: i32, custom_id: i32) -> i32;

	/// Get the "name" of the controller.
	///
	/// This can be in any format, but should uniquely identify the controller
	/// instance.
	fn name(&self) -> Option<String> {
		None
	}
}

impl<C: Controller + ?Sized> Controller for Box<C> {
	fn init(
		&mut self,
		label: &str,
		search_path: &str,
		server_host: &str,
		port: u16,
	) -> Result<(), ReturnCode> {
		(**self).init(label, search_path, server_host, port)
	}
	fn run(&mut self) {
		(**self).run();
	}
	fn stop(&mut self) -> Result<(), ReturnCode> {
		(**self).stop()
	}
	fn set_parameter_async(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), ReturnCode> {
		(**self).set_parameter_async(address, index, value)
	}
	fn get_parameter_sync(&mut self, address: Address, index: i32) -> Result<i32, ReturnCode> {
		(**self).get_parameter_sync(address, index)
	}
	fn send_profile(&mut self, path: &Path) -> Result<(), ReturnCode> {
		(**self).send_profile(path)
	}
	fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), ReturnCode> {
		(**self).configure_channel(config)
	}
	fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), ReturnCode> {
		(**self).configure_data_buffering(channel, size)
	}
	fn frame_size(&mut self, channel: i32) -> i32 {
		(**self).frame_size(channel)
	}
	fn data_buffer(
		&mut self,
		channel: i32,
		full_only: bool,
		data: &mut [i32],
		meta: &mut Metadata,
	) -> Result<BufferInfo, ReturnCode> {
		(**self).data_buffer(channel, full_only, data, meta)
	}
	fn write_buffer(&mut self, options: &WriteOptions, frame: &Frame) -> Result<(), ReturnCode> {
		(**self).write_buffer(options, frame)
	}
	fn wait_for_event(&mut self, timeout_ms: i32, mask: i32, custom_id: i32) -> i32 {
		(**self).wait_for_event(timeout_ms, mask, custom_id)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

impl<C: Controller + ?Sized> Controller for &mut C {
	fn init(
		&mut self,
		label: &str,
		search_path: &str,
		server_host: &str,
		port: u16,
	) -> Result<(), ReturnCode> {
		(**self).init(label, search_path, server_host, port)
	}
	fn run(&mut self) {
		(**self).run();
	}
	fn stop(&mut self) -> Result<(), ReturnCode> {
		(**self).stop()
	}
	fn set_parameter_async(
		&mut self,
		address: Address,
		index: i32,
		value: i32,
	) -> Result<(), ReturnCode> {
		(**self).set_parameter_async(address, index, value)
	}
	fn get_parameter_sync(&mut self, address: Address, index: i32) -> Result<i32, ReturnCode> {
		(**self).get_parameter_sync(address, index)
	}
	fn send_profile(&mut self, path: &Path) -> Result<(), ReturnCode> {
		(**self).send_profile(path)
	}
	fn configure_channel(&mut self, config: &ChannelConfig) -> Result<(), ReturnCode> {
		(**self).configure_channel(config)
	}
	fn configure_data_buffering(&mut self, channel: i32, size: i32) -> Result<(), ReturnCode> {
		(**self).configure_data_buffering(channel, size)
	}
	fn frame_size(&mut self, channel: i32) -> i32 {
		(**self).frame_size(channel)
	}
	fn data_buffer(
		&mut self,
		channel: i32,
		full_only: bool,
		data: &mut [i32],
		meta: &mut Metadata,
	) -> Result<BufferInfo, ReturnCode> {
		(**self).data_buffer(channel, full_only, data, meta)
	}
	fn write_buffer(&mut self, options: &WriteOptions, frame: &Frame) -> Result<(), ReturnCode> {
		(**self).write_buffer(options, frame)
	}
	fn wait_for_event(&mut self, timeout_ms: i32, mask: i32, custom_id: i32) -> i32 {
		(**self).wait_for_event(timeout_ms, mask, custom_id)
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}
