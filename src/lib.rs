//! Synchronize radio-controlled clocks by playing DCF77 through an audio output.
//!
//! The signal itself is built by the [`dcf77`] crate; this crate supplies everything around it:
//! configuration, the wall clock, cancellation, the `cpal` audio sink, and the [`scheduler`] that
//! lines the signal up with real seconds. See the `dcf77sync` binary for command line usage.

pub mod args;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod error;
pub mod output;
pub mod scheduler;
pub mod sink;

use std::path::Path;
use tracing::info;
use dcf77::WaveformLibrary;
use cancel::CancelToken;
use clock::SystemClock;
use config::Config;
use error::Error;
use output::CpalSink;
use scheduler::Scheduler;

/// Transmit one broadcast window as described by `config`.
///
/// Blocks until the window has played out, an error occurs, or `cancel` fires.
///
/// # Errors
///
/// Returns [`Error::Cancelled`] if cancelled, otherwise the first configuration, clock, waveform,
/// allocation, scheduling or audio error.
pub fn run(config: &Config, cancel: CancelToken) -> Result<(), Error> {
	let zone = config.validate()?;
	let library = match &config.waveforms {
		Some(dir) => {
			info!("loading waveforms from {}", dir.display());
			WaveformLibrary::load(dir, config.sample_rate)?
		},
		None => WaveformLibrary::synthesize(&config.tone())
	};

	let sink = config.sink();
	let mut scheduler = Scheduler::new(SystemClock, zone, library, cancel, config.timing())?;
	scheduler.run(|cancel| CpalSink::open(&sink, cancel))
}

/// Synthesize the waveform tables for `config` and write them to `dir` as raw `.bin` files.
///
/// The directory is created if missing. The written tables can be played back later with
/// [`Config::waveforms`] at the same sample rate.
///
/// # Errors
///
/// Returns a configuration error for invalid settings, or an I/O error if `dir` cannot be created
/// or written.
pub fn export_waveforms(config: &Config, dir: &Path) -> Result<(), Error> {
	config.validate()?;
	std::fs::create_dir_all(dir).map_err(|source| Error::Io { path: dir.to_path_buf(), source })?;

	let library = WaveformLibrary::synthesize(&config.tone());
	library.save(dir)?;
	info!("wrote {} Hz waveforms to {}", library.sample_rate(), dir.display());
	Ok(())
}
