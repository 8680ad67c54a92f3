//! A library for orchestrating scanning-probe and closed-loop positioner controllers.
//!
//! The controllers do their real work inside a vendor-supplied control
//! service. This library drives that service through a synchronous
//! request/response interface, the [`Controller`](backend::Controller) trait
//! for scan controllers and the [`PositionerBackend`](positioner::PositionerBackend)
//! trait for positioners, and adds on top:
//!
//! * typed errors carrying the failing call for every numeric return code,
//! * the command/status handshake of multi-phase operations such as starting a scan,
//! * waiting for events and reading full data buffers,
//! * scoped resources: the service's server, the outputs and positioner connections
//!   are released when they go out of scope.
//!
//! ## Example
//!
//! ```rust
//! use nanoctl::{data::ChannelConfig, scanner::ScanGeometry, session::SessionOptions, sim::Simulator};
//! use std::time::Duration;
//!
//! # fn wrapper() -> Result<(), nanoctl::error::Error> {
//! let mut session = SessionOptions::new().label("FindSim").open(Simulator::new())?;
//! let geometry = ScanGeometry::new(20, 20);
//! session.apply_scan_geometry(&geometry)?;
//! session.configure_channel(&ChannelConfig::new(0))?;
//!
//! let mut outputs = session.outputs()?;
//! outputs.start_scan()?;
//! let size = outputs.frame_size(0)?;
//! let frame = outputs.poll_for_full_buffer(0, size, Duration::from_millis(500))?;
//! println!("frame {} holds {} samples", frame.number(), frame.data().len());
//! outputs.stop_scan()?;
//! outputs.release()?;
//! session.close()
//! # }
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(all(doc, feature = "doc_cfg"), feature(doc_cfg))]

pub mod address;
pub mod backend;
pub mod data;
pub mod error;
pub mod output;
pub mod poll;
pub mod positioner;
pub mod scanner;
pub mod session;
pub mod sim;
