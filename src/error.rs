//! Error types used across modules.
//!
//! Every environmental failure is reported through [`Error`]. Logic errors (a full playback
//! buffer, a frame that grows past 60 seconds) are not errors but panics, see [`dcf77::assembler`]
//! and [`dcf77::encoder`].

use std::io;
use std::path::PathBuf;
use thiserror::Error;
use dcf77::{AllocError, WaveformError, ZoneError};
use crate::sink::SinkError;

/// The error type for a transmission run.
#[derive(Debug, Error)]
pub enum Error {
	/// A configuration value is out of range.
	#[error("invalid configuration: {0}")]
	Config(String),
	/// The system clock could not be read.
	#[error("failed to read the system clock")]
	Clock(#[source] io::Error),
	/// A timestamp has no civil time representation.
	#[error("time {0} cannot be converted to civil time")]
	TimeRange(i64),
	/// The timezone string could not be parsed.
	#[error("invalid timezone")]
	Zone(#[from] ZoneError),
	#[error("waveform table error")]
	Waveform(#[from] WaveformError),
	#[error(transparent)]
	Alloc(#[from] AllocError),
	#[error("audio output failed")]
	Sink(#[from] SinkError),
	/// Assembly finished too close to (or after) the start instant to transmit on time.
	#[error("scheduling overrun: {remaining_ms} ms left before start, need at least {margin_ms} ms")]
	Overrun {
		remaining_ms: i64,
		margin_ms: u64
	},
	/// The wait is longer than any lead time could explain, so the clock moved during assembly.
	#[error("clock skew: wait of {wait_ms} ms exceeds budget of {budget_ms} ms")]
	ClockSkew {
		wait_ms: i64,
		budget_ms: u64
	},
	/// The run was interrupted.
	#[error("cancelled")]
	Cancelled,
	/// Ctrl-C could not be routed to a [`CancelToken`](crate::cancel::CancelToken).
	#[error("failed to install interrupt handler")]
	Interrupt(#[source] ctrlc::Error),
	#[error("{}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error
	},
	#[error("{}", .path.display())]
	Toml {
		path: PathBuf,
		#[source]
		source: toml::de::Error
	}
}

impl Error {
	/// Iterate over this error and its sources, outermost first.
	pub fn chain(&self) -> impl Iterator<Item = &(dyn std::error::Error + 'static)> {
		std::iter::successors(Some(self as &(dyn std::error::Error + 'static)), |e| e.source())
	}
}
