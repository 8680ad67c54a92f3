//! Example: drive a mock closed-loop positioner.

use nanoctl::{
	backend::mock::MockPositioner,
	positioner::{AxisStatus, Positioner},
};
use simple_logger::SimpleLogger;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Enable logging
	SimpleLogger::new().init().unwrap();

	// Script an axis that reaches its target on the third status read.
	let mut backend = MockPositioner::new();
	let moving = AxisStatus {
		connected: true,
		enabled: true,
		moving: true,
		..AxisStatus::default()
	};
	backend.push_status(0, moving);
	backend.push_status(0, moving);
	backend.push_status(
		0,
		AxisStatus {
			moving: false,
			target: true,
			..moving
		},
	);
	backend.push_position(0, 1.5e-3);

	let mut positioner = Positioner::connect(backend, 0)?;
	let info = positioner.device_info()?;
	println!(
		"{:?} controller {} at {}, firmware {}",
		info.device_type,
		info.serial_number,
		info.address,
		positioner.firmware_version()?
	);

	positioner.set_amplitude(0, 30.0)?;
	positioner.set_frequency(0, 1000.0)?;
	positioner.set_axis_output(0, true, true)?;
	let position = positioner.move_to(0, 1.5e-3, 1e-7)?;
	println!("axis 0 at {:.3} mm", position * 1e3);
	positioner.set_axis_output(0, false, false)?;
	positioner.disconnect()?;
	Ok(())
}
