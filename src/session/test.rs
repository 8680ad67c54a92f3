use std::time::Duration;

use crate::{
	address::{self, StatusBits},
	backend::mock::{Mock, MockCall, Op},
	data::{EventMask, WriteOptions},
	error::*,
	poll::PollOptions,
	scanner::{ScanCommand, ScanGeometry, ScanState},
	session::{Session, SessionOptions},
};

fn fast() -> PollOptions {
	let mut options = PollOptions::new();
	options.interval(Duration::ZERO).timeout(Duration::from_secs(1));
	options
}

fn open(mock: &mut Mock) -> Session<&mut Mock> {
	SessionOptions::new().poll(fast()).open(mock).unwrap()
}

#[test]
fn open_initialises_then_runs() {
	let mut mock = Mock::new();
	{
		let _session = SessionOptions::new()
			.label("FindSim")
			.search_path("/opt/asc500")
			.port(7001)
			.open(&mut mock)
			.unwrap();
	}
	assert_eq!(
		mock.calls(),
		&[
			MockCall::Init {
				label: "FindSim".to_string(),
				search_path: "/opt/asc500".to_string(),
				server_host: String::new(),
				port: 7001,
			},
			MockCall::Run,
			MockCall::Stop,
		]
	);
}

#[test]
fn failed_init_does_not_run() {
	let mut mock = Mock::new();
	mock.fail_next(Op::Init, controller_code::SERVER_MISSING);
	let err = Session::open(&mut mock).unwrap_err();
	let err = ResourceError::try_from(err).unwrap();
	assert_eq!(err.code(), controller_code::SERVER_MISSING);
	assert_eq!(err.call().operation(), "init");
	assert!(!mock.calls().contains(&MockCall::Run));
	assert!(!mock.was_stopped());
}

#[test]
fn failed_profile_stops_the_server() {
	let mut mock = Mock::new();
	mock.fail_next(Op::SendProfile, controller_code::INVALID_PROFILE_FORMAT);
	let err = SessionOptions::new()
		.profile("afm.ngp")
		.open(&mut mock)
		.unwrap_err();
	assert!(matches!(err, Error::Configuration(_)));
	assert!(mock.was_stopped());
}

#[test]
fn drop_stops_the_server() {
	let mut mock = Mock::new();
	{
		let _session = open(&mut mock);
	}
	assert!(mock.was_stopped());
}

#[test]
fn close_reports_stop_failures() {
	let mut mock = Mock::new();
	let mut session = open(&mut mock);
	session.controller_mut().fail_next(Op::Stop, controller_code::NO_SERVER_CONTACT);
	let err = session.close().unwrap_err();
	assert_eq!(err.call().unwrap().operation(), "stop");
	// The server is only stopped once.
	assert_eq!(mock.calls().iter().filter(|c| **c == MockCall::Stop).count(), 1);
}

#[test]
fn close_stops_a_poisoned_session() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1]);
	let mut session = open(&mut mock);
	{
		let mut outputs = session.outputs().unwrap();
		outputs
			.controller_mut()
			.fail_next(Op::SetParameter, controller_code::NO_SERVER_CONTACT);
	}
	// Without a stop failure the poison is returned.
	let err = session.close().unwrap_err();
	assert_eq!(err.call().unwrap().operation(), "set_parameter_async");
	assert!(mock.was_stopped());
}

#[test]
fn close_reports_stop_failures_of_a_poisoned_session() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1]);
	let mut session = open(&mut mock);
	{
		let mut outputs = session.outputs().unwrap();
		outputs
			.controller_mut()
			.fail_next(Op::SetParameter, controller_code::NO_SERVER_CONTACT);
	}
	session
		.controller_mut()
		.fail_next(Op::Stop, controller_code::NO_DEVICE_CONTACT);
	let err = session.close().unwrap_err();
	let err = CommunicationError::try_from(err).unwrap();
	assert_eq!(err.call().operation(), "stop");
	assert_eq!(err.code(), controller_code::NO_DEVICE_CONTACT);
	assert_eq!(mock.calls().iter().filter(|c| **c == MockCall::Stop).count(), 1);
}

#[test]
fn set_then_get_round_trip() {
	let mut mock = Mock::new();
	let mut session = open(&mut mock);
	session.set_parameter(address::SCAN_COLUMNS, 200).unwrap();
	assert_eq!(session.get_parameter(address::SCAN_COLUMNS).unwrap(), 200);
	session.set_parameter_at(address::SCAN_OFFSET_X, 2, -15).unwrap();
	assert_eq!(session.get_parameter_at(address::SCAN_OFFSET_X, 2).unwrap(), -15);
	assert_eq!(session.get_parameter(address::SCAN_OFFSET_X).unwrap(), 0);
}

#[test]
fn failures_carry_the_call() {
	let mut mock = Mock::new();
	let mut session = open(&mut mock);
	session
		.controller_mut()
		.fail_next(Op::SetParameter, controller_code::INVALID_PARAMETER);
	let err = session.set_parameter(address::SCAN_COLUMNS, -1).unwrap_err();
	let err = ConfigurationError::try_from(err).unwrap();
	assert_eq!(err.call().operation(), "set_parameter_async");
	assert_eq!(err.call().arguments(), "address=0x1003, index=0, value=-1");
	assert!(err.to_string().contains("Invalid parameter"), "{err}");

	session
		.controller_mut()
		.fail_next(Op::GetParameter, controller_code::COMMUNICATION_TIMEOUT);
	let err = session.get_parameter(address::SCAN_STATUS).unwrap_err();
	assert!(err.is_timeout());
	assert_eq!(err.call().unwrap().arguments(), "address=0x0101, index=0");
}

#[test]
fn run_until_status_reissues_the_command() {
	let mut mock = Mock::new();
	// idle -> moving -> scanning
	mock.script_reads(address::SCAN_STATUS, [0x08, 0x02, 0x04]);
	{
		let mut session = open(&mut mock);
		let status = session
			.run_until_status(ScanCommand::On, ScanState::SCAN.into())
			.unwrap();
		assert_eq!(status, StatusBits(0x04));
	}
	assert_eq!(mock.set_count(address::SCAN_COMMAND), 3);
	assert_eq!(mock.get_count(address::SCAN_STATUS), 3);
	assert_eq!(mock.parameter(address::SCAN_COMMAND), Some(ScanCommand::On.value()));
}

#[test]
fn run_until_status_ignores_other_bits() {
	let mut mock = Mock::new();
	mock.script_reads(address::SCAN_STATUS, [0x08, 0x02, 0x12, 0x01, 0x14]);
	{
		let mut session = open(&mut mock);
		let mut observed = Vec::new();
		let status = session
			.run_until_status_with(ScanCommand::On, StatusBits(0x04), fast(), |s| {
				observed.push(s.0);
			})
			.unwrap();
		assert_eq!(status, StatusBits(0x14));
		assert_eq!(observed, [0x08, 0x02, 0x12, 0x01, 0x14]);
	}
	assert_eq!(mock.set_count(address::SCAN_COMMAND), 5);
}

#[test]
fn run_until_status_times_out() {
	let mut mock = Mock::new();
	mock.script_reads(address::SCAN_STATUS, [0x02]);
	let mut session = open(&mut mock);
	let mut options = PollOptions::new();
	options
		.interval(Duration::from_millis(1))
		.timeout(Duration::from_millis(20));
	let err = session
		.run_until_status_with(ScanCommand::On, ScanState::SCAN.into(), options, |_| {})
		.unwrap_err();
	assert!(err.is_timeout());
	let err = OperationTimeoutError::try_from(err).unwrap();
	assert_eq!(err.timeout(), Duration::from_millis(20));
	assert!(err.attempts() >= 1);
	assert!(err.operation().contains("scanner command 1"), "{err}");
}

#[test]
fn start_scan_waits_for_scanning() {
	let mut mock = Mock::new();
	mock.script_reads(address::SCAN_STATUS, [0x08, 0x02, 0x02, 0x04]);
	let mut session = open(&mut mock);
	let state = session.start_scan().unwrap();
	assert_eq!(state, ScanState::SCAN);
	assert_eq!(state.to_string(), "Scan");
}

#[test]
fn stop_and_pause_are_issued_once() {
	let mut mock = Mock::new();
	{
		let mut session = open(&mut mock);
		session.pause_scan().unwrap();
		session.stop_scan().unwrap();
	}
	assert_eq!(mock.set_count(address::SCAN_COMMAND), 2);
	assert_eq!(mock.get_count(address::SCAN_STATUS), 0);
	assert_eq!(mock.parameter(address::SCAN_COMMAND), Some(ScanCommand::Off.value()));
}

#[test]
fn zero_event_code_is_none() {
	let mut mock = Mock::new();
	mock.push_event(0);
	mock.push_event(1);
	let mut session = open(&mut mock);
	let mask = EventMask::data(0);
	assert_eq!(session.wait_for_event(Duration::from_millis(500), mask, None).unwrap(), None);
	let event = session
		.wait_for_event(Duration::from_millis(500), mask, None)
		.unwrap()
		.unwrap();
	assert!(event.matches(mask));
	// Nothing left to report
	assert_eq!(session.wait_for_event(Duration::from_millis(500), mask, None).unwrap(), None);
}

#[test]
fn wait_for_event_passes_the_custom_parameter() {
	let mut mock = Mock::new();
	{
		let mut session = open(&mut mock);
		session
			.wait_for_event(Duration::from_secs(5), EventMask::CUSTOM, Some(address::OUTPUT_STATUS))
			.unwrap();
	}
	assert!(mock.calls().contains(&MockCall::WaitForEvent {
		timeout_ms: 5000,
		mask: 0x8000,
		custom_id: 0x0140,
	}));
}

#[test]
fn empty_buffers_are_data_unavailable() {
	let mut mock = Mock::new();
	mock.push_empty_buffer(0);
	mock.push_empty_buffer(-3);
	{
		let mut session = open(&mut mock);
		let err = session.read_data_buffer(0, true, 16).unwrap_err();
		let err = DataUnavailableError::try_from(err).unwrap();
		assert_eq!(err.size(), 0);
		assert_eq!(err.call().operation(), "data_buffer");

		let err = session.read_data_buffer(0, false, 16).unwrap_err();
		assert_eq!(DataUnavailableError::try_from(err).unwrap().size(), -3);

		let err = session.frame_size(0).unwrap_err();
		assert!(matches!(err, Error::DataUnavailable(_)));
	}
	assert!(mock.written().is_empty());
}

#[test]
fn full_buffer_after_two_timeouts() {
	let mut mock = Mock::new();
	mock.push_event(0);
	mock.push_event(0);
	mock.push_event(1);
	mock.push_buffer(7, 0, vec![3, 1, 4, 1, 5, 9]);
	{
		let mut session = open(&mut mock);
		let mut progress = 0;
		let frame = session
			.poll_for_full_buffer_with(0, 6, Duration::from_millis(500), |_| {
				progress += 1;
				Ok(())
			})
			.unwrap();
		assert_eq!(progress, 2);
		assert_eq!(frame.number(), 7);
		assert_eq!(frame.data(), &[3, 1, 4, 1, 5, 9]);

		session.write_buffer(&frame, &WriteOptions::new("scan_fwd")).unwrap();
	}
	assert!(mock.calls().contains(&MockCall::DataBuffer {
		channel: 0,
		full_only: true,
		capacity: 6,
	}));
	let written = mock.written();
	assert_eq!(written.len(), 1);
	assert_eq!(written[0].data(), &[3, 1, 4, 1, 5, 9]);
}

#[test]
fn full_buffer_without_data_is_not_written() {
	let mut mock = Mock::new();
	mock.push_event(1);
	mock.push_empty_buffer(0);
	{
		let mut session = open(&mut mock);
		let err = session
			.poll_for_full_buffer(0, 6, Duration::from_millis(500))
			.unwrap_err();
		assert!(matches!(err, Error::DataUnavailable(_)));
	}
	assert!(mock.written().is_empty());
}

#[test]
fn progress_errors_abort_the_wait() {
	let mut mock = Mock::new();
	{
		let mut session = open(&mut mock);
		session
			.controller_mut()
			.fail_next(Op::GetParameter, controller_code::NO_DEVICE_CONTACT);
		let err = session
			.poll_for_full_buffer_with(0, 6, Duration::from_millis(500), |session| {
				session.scanner_position().map(|_| ())
			})
			.unwrap_err();
		assert!(matches!(err, Error::Communication(_)));
	}
	assert!(!mock.calls().iter().any(|c| matches!(c, MockCall::DataBuffer { .. })));
}

#[test]
fn full_buffer_rejects_invalid_channels() {
	let mut mock = Mock::new();
	{
		let mut session = open(&mut mock);
		for channel in [-1, 14] {
			let err = session
				.poll_for_full_buffer(channel, 6, Duration::from_millis(1))
				.unwrap_err();
			let err = ConfigurationError::try_from(err).unwrap();
			assert_eq!(err.code(), controller_code::INVALID_PARAMETER);
			assert_eq!(err.call().operation(), "wait_for_event");
			assert_eq!(err.call().arguments(), format!("channel={channel}"));
		}
		// The session is still usable.
		session.get_parameter(address::SCAN_STATUS).unwrap();
	}
	assert!(!mock.calls().iter().any(|c| matches!(c, MockCall::WaitForEvent { .. })));
}

#[test]
fn full_buffer_wait_is_bounded() {
	let mut mock = Mock::new();
	let mut session = open(&mut mock);
	session.set_acquisition_timeout(Duration::from_millis(5));
	let err = session
		.poll_for_full_buffer(0, 6, Duration::from_millis(500))
		.unwrap_err();
	assert!(matches!(err, Error::OperationTimeout(_)));
}

#[test]
fn output_activation_exits_on_first_active_read() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [0, 0, 1, 1]);
	{
		let mut session = open(&mut mock);
		session.enable_outputs().unwrap();
	}
	assert_eq!(mock.get_count(address::OUTPUT_STATUS), 3);
	assert_eq!(mock.set_count(address::OUTPUT_ACTIVATE), 1);
}

#[test]
fn disable_outputs_reports_outputs_still_on() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1]);
	let mut session = open(&mut mock);
	assert!(!session.disable_outputs().unwrap());
}

#[test]
fn output_guard_deactivates_on_drop() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1, 0]);
	mock.push_event(0x8000);
	{
		let mut session = open(&mut mock);
		let mut outputs = session.outputs().unwrap();
		outputs.set_parameter(address::SCAN_ONCE, 1).unwrap();
	}
	assert_eq!(mock.parameter(address::OUTPUT_ACTIVATE), Some(0));
	assert!(mock.calls().contains(&MockCall::WaitForEvent {
		timeout_ms: 5000,
		mask: 0x8000,
		custom_id: 0x0140,
	}));
}

#[test]
fn output_guard_failure_poisons_the_session() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1]);
	let mut session = open(&mut mock);
	{
		let mut outputs = session.outputs().unwrap();
		outputs
			.controller_mut()
			.fail_next(Op::SetParameter, controller_code::NO_SERVER_CONTACT);
	}
	let err = session.get_parameter(address::SCAN_STATUS).unwrap_err();
	assert_eq!(err.call().unwrap().operation(), "set_parameter_async");
	// The poison is only reported once.
	session.get_parameter(address::SCAN_STATUS).unwrap();
}

#[test]
fn output_guard_deactivates_a_poisoned_session() {
	let deactivate = MockCall::SetParameter(address::OUTPUT_ACTIVATE, 0, 0);
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1]);
	let mut session = open(&mut mock);
	{
		let mut outer = session.outputs().unwrap();
		{
			let mut inner = outer.outputs().unwrap();
			inner
				.controller_mut()
				.fail_next(Op::SetParameter, controller_code::NO_SERVER_CONTACT);
		}
		assert_eq!(outer.controller().parameter(address::OUTPUT_ACTIVATE), Some(1));
	}
	let mock_calls = session.controller().calls();
	assert_eq!(mock_calls.iter().filter(|c| **c == deactivate).count(), 2);
	assert_eq!(session.controller().parameter(address::OUTPUT_ACTIVATE), Some(0));
	// The first failure is still reported, once.
	let err = session.get_parameter(address::SCAN_STATUS).unwrap_err();
	assert_eq!(err.call().unwrap().operation(), "set_parameter_async");
	session.get_parameter(address::SCAN_STATUS).unwrap();
}

#[test]
fn output_guard_release_reports_the_state() {
	let mut mock = Mock::new();
	mock.script_reads(address::OUTPUT_STATUS, [1, 0]);
	let mut session = open(&mut mock);
	let outputs = session.outputs().unwrap();
	assert!(outputs.release().unwrap());
}

#[test]
fn scan_geometry_disables_the_automatics_first() {
	let mut mock = Mock::new();
	{
		let mut session = open(&mut mock);
		let geometry = ScanGeometry {
			offset_x: 150_000,
			..ScanGeometry::new(100, 50)
		};
		session.apply_scan_geometry(&geometry).unwrap();
		assert_eq!(geometry.frame_size(), 10_000);
	}
	let sets: Vec<_> = mock
		.calls()
		.iter()
		.filter_map(|c| match c {
			MockCall::SetParameter(a, _, v) => Some((*a, *v)),
			_ => None,
		})
		.collect();
	assert_eq!(sets[0], (address::SCAN_X_EQ_Y, 0));
	assert_eq!(sets[1], (address::SCAN_GEOMODE, 0));
	assert!(sets.contains(&(address::SCAN_COLUMNS, 100)));
	assert!(sets.contains(&(address::SCAN_LINES, 50)));
	assert!(sets.contains(&(address::SCAN_OFFSET_X, 150_000)));
}

#[test]
fn scanner_position_in_micrometres() {
	let mut mock = Mock::new();
	let mut session = open(&mut mock);
	session.set_parameter(address::SCAN_COORD_ZERO_X, 100_000).unwrap();
	session.set_parameter(address::SCAN_CURR_X, 50_000).unwrap();
	session.set_parameter(address::SCAN_CURR_Y, -250_000).unwrap();
	let (x, y) = session.scanner_position().unwrap();
	assert!((x - 1.5).abs() < 1e-9);
	assert!((y + 2.5).abs() < 1e-9);
}
