//! Example: run a raster scan and record channel data.

use nanoctl::{
	address,
	data::{ChannelConfig, WriteOptions},
	scanner::ScanGeometry,
	session::SessionOptions,
	sim::SimulatorOptions,
};
use simple_logger::SimpleLogger;
use std::time::Duration;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Enable logging
	SimpleLogger::new().init().unwrap();

	// Start a simulated controller and configure a single 50 x 50 scan.
	let simulator = SimulatorOptions::new().lines_per_wait(5).build();
	let mut session = SessionOptions::new().label("FindSim").open(simulator)?;
	let geometry = ScanGeometry::new(50, 50);
	session.apply_scan_geometry(&geometry)?;
	session.set_parameter(address::SCAN_ONCE, 1)?;
	session.configure_channel(&ChannelConfig::new(0))?;
	let size = session.frame_size(0)?;

	{
		let mut outputs = session.outputs()?;
		let state = outputs.start_scan()?;
		println!("scanner: {state}");

		// Report the scanner position until the frame is complete.
		let poll = Duration::from_millis(500);
		let frame = outputs.poll_for_full_buffer_with(0, size, poll, |session| {
			let (x, y) = session.scanner_position()?;
			println!("scanner at ({x:.3}, {y:.3}) µm");
			Ok(())
		})?;

		outputs.write_buffer(&frame, WriteOptions::new("scan_fwd.asc").comment("forward trace"))?;
		outputs.write_buffer(
			&frame,
			WriteOptions::new("scan_bwd.asc")
				.comment("backward trace")
				.forward(false),
		)?;
		outputs.stop_scan()?;
		if !outputs.release()? {
			eprintln!("outputs are still active");
		}
	}

	session.close()?;
	Ok(())
}
