//! Types defining the different options when opening a session.

use super::{translate, Session};
use crate::{
	backend::Controller,
	error::{Call, Error},
	poll::PollOptions,
};
use std::{
	path::{Path, PathBuf},
	time::Duration,
};

/// Options for configuring and opening a [`Session`].
///
/// ## Example
///
/// ```rust
/// # use nanoctl::{session::SessionOptions, sim::Simulator};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let session = SessionOptions::new()
///     .label("FindSim")
///     .server_host("192.168.1.10")
///     .acquisition_timeout(Duration::from_secs(120))
///     .open(Simulator::new())?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SessionOptions {
	/// The label passed to the service on initialisation.
	label: String,
	/// Where the service looks for its server executable and boot image.
	search_path: String,
	/// The host of the server, empty for a local server.
	server_host: String,
	/// The port of the server.
	port: u16,
	/// The profile to send once the server is running, if any.
	profile: Option<PathBuf>,
	/// The default polling options.
	poll: PollOptions,
	/// The bound on waiting for a full data buffer.
	acquisition_timeout: Duration,
}

impl SessionOptions {
	/// The default server port: 7000.
	pub const DEFAULT_PORT: u16 = 7000;
	/// The default bound on waiting for a full data buffer: 10 minutes.
	pub const DEFAULT_ACQUISITION_TIMEOUT: Duration = Duration::from_secs(600);

	/// Create a blank set of options ready for configuration.
	///
	/// The service is started locally on port 7000, searching the current
	/// directory. No profile is sent.
	///
	/// Equivalent to [`default`](SessionOptions::default).
	pub fn new() -> Self {
		SessionOptions {
			label: String::new(),
			search_path: ".".to_string(),
			server_host: String::new(),
			port: SessionOptions::DEFAULT_PORT,
			profile: None,
			poll: PollOptions::default(),
			acquisition_timeout: SessionOptions::DEFAULT_ACQUISITION_TIMEOUT,
		}
	}

	/// Set the label passed to the service.
	///
	/// The vendor service simulates a device when the label is `"FindSim"`.
	pub fn label(&mut self, label: &str) -> &mut Self {
		self.label = label.to_string();
		self
	}

	/// Set where the service looks for its server executable and boot image.
	pub fn search_path(&mut self, path: &str) -> &mut Self {
		self.search_path = path.to_string();
		self
	}

	/// Set the host of the server. An empty host starts a local server.
	pub fn server_host(&mut self, host: &str) -> &mut Self {
		self.server_host = host.to_string();
		self
	}

	/// Set the port of the server.
	///
	/// The default is 7000.
	pub fn port(&mut self, port: u16) -> &mut Self {
		self.port = port;
		self
	}

	/// Send the profile at `path` once the server is running.
	pub fn profile<P: AsRef<Path>>(&mut self, path: P) -> &mut Self {
		self.profile = Some(path.as_ref().to_path_buf());
		self
	}

	/// Set the default polling options of the session.
	///
	/// The default is [`PollOptions::default`].
	pub fn poll(&mut self, options: PollOptions) -> &mut Self {
		self.poll = options;
		self
	}

	/// Set the bound on waiting for a full data buffer.
	///
	/// The default is 10 minutes.
	pub fn acquisition_timeout(&mut self, timeout: Duration) -> &mut Self {
		self.acquisition_timeout = timeout;
		self
	}

	/// Initialise the controller's service, start its server and return the session.
	///
	/// The server is only started if initialisation succeeded. If sending the
	/// profile fails, the server is stopped before the error is returned.
	pub fn open<C: Controller>(&self, mut controller: C) -> Result<Session<C>, Error> {
		log::debug!(
			"init label={:?} search_path={:?} host={:?} port={}",
			self.label,
			self.search_path,
			self.server_host,
			self.port
		);
		controller
			.init(&self.label, &self.search_path, &self.server_host, self.port)
			.map_err(|code| {
				translate(
					Call::new(
						"init",
						format!(
							"label={:?}, search_path={:?}, server_host={:?}, port={}",
							self.label, self.search_path, self.server_host, self.port
						),
					),
					code,
				)
			})?;
		controller.run();

		let mut session = Session::from_controller(controller, self.poll, self.acquisition_timeout);
		if let Some(profile) = &self.profile {
			// Dropping the session on error stops the server.
			session.send_profile(profile)?;
		}
		Ok(session)
	}
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self::new()
	}
}
