//! Transmit the DCF77 time signal using simple audio output.
//!
//! This application synchronizes [DCF77] radio-controlled clocks without a radio. It encodes the
//! upcoming minutes of Central European time, waits for the exact second boundary, then plays the
//! amplitude modulated signal through an audio output. Holding the clock next to the speaker (or
//! the audio hardware, whose stray emissions carry the carrier's harmonics) lets it pick up the
//! time as if from the transmitter.
//!
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//!
//! # Command Line Arguments
//!
//! General form: `dcf77sync [options...]`
//!
//! No argument is required. Options override the matching keys of the configuration file:
//!
//! | Short form | Long form            | Argument     | Default                      | Description                          |
//! | ---------- | -------------------- | ------------ | ---------------------------- | ------------------------------------ |
//! | `-n`       | `--minutes`          | Integer > 0  | 6                            | The number of minutes to transmit    |
//! |            | `--lead-ms`          | Milliseconds | 10000                        | Time to prepare before transmitting  |
//! |            | `--margin-ms`        | Milliseconds | 250                          | Least time left after preparing      |
//! |            | `--rate`             | Hz           | 44100                        | Output sample rate                   |
//! |            | `--device`           | Device name  | Default device               | Output device                        |
//! | `-z`       | `--timezone`         | [TZ string]  | `CET-1CEST,M3.5.0,M10.5.0/3` | The timezone of the transmitted time |
//! |            | `--waveforms`        | Directory    | None (synthesized)           | Raw waveform tables to play          |
//! |            | `--export-waveforms` | Directory    | None                         | Write waveform tables and exit       |
//! | `-c`       | `--config`           | Filename     | None                         | TOML [configuration file]            |
//! | `-v`       | `--verbose`          |              |                              | Log debug output                     |
//!
//! Logging goes to stderr and can be tuned with `RUST_LOG`.
//!
//! The exit status is zero once the whole window has played, and nonzero on any error or on
//! interruption (Ctrl-C). The program refuses to start if it cannot handle Ctrl-C.
//!
//! With `--export-waveforms DIR` nothing is transmitted. The five raw tables for the configured
//! sample rate and carrier are written to `DIR` instead, ready to be passed to `--waveforms`.
//!
//! [TZ string]: dcf77::zone::Zone::parse
//! [configuration file]: dcf77sync::config
//!
//! # Examples
//!
//! Transmit for the default six minutes
//! ```sh
//! dcf77sync
//! ```
//!
//! Transmit for ten minutes at 48 kHz on a specific device
//! ```sh
//! dcf77sync -n 10 --rate 48000 --device pulse
//! ```
//!
//! Generate 48 kHz tables once, then play from them
//! ```sh
//! dcf77sync --rate 48000 --export-waveforms /var/lib/dcf77
//! dcf77sync --rate 48000 --waveforms /var/lib/dcf77
//! ```

use std::process::ExitCode;
use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use dcf77sync::args::Arguments;
use dcf77sync::cancel::{self, CancelToken};
use dcf77sync::config::Config;
use dcf77sync::error::Error;

/// Log to stderr, honoring `RUST_LOG` when set.
fn init_logging(verbose: bool) {
	let default = if verbose { "dcf77sync=debug" } else { "dcf77sync=info" };
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}

/// Main program entry point.
///
/// Parses input arguments and transmits one broadcast window, or exports the waveform tables. See
/// [`crate`] documentation for details.
fn main() -> ExitCode {
	let args = Arguments::parse();
	init_logging(args.verbose);

	let result = Config::from_arguments(&args).and_then(|config| match &args.export_waveforms {
		Some(dir) => dcf77sync::export_waveforms(&config, dir),
		None => {
			let cancel = CancelToken::new();
			cancel::install_interrupt_handler(&cancel)?;
			dcf77sync::run(&config, cancel)
		}
	});
	match result {
		Ok(()) => ExitCode::SUCCESS,
		Err(Error::Cancelled) => {
			warn!("interrupted");
			ExitCode::FAILURE
		},
		Err(e) => {
			let chain: Vec<String> = e.chain().map(|e| e.to_string()).collect();
			error!("{}", chain.join(": "));
			ExitCode::FAILURE
		}
	}
}
