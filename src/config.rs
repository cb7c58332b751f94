//! Run configuration.
//!
//! Values come from three layers, later layers overriding earlier ones:
//! 1. Built-in defaults ([`Config::default`]).
//! 2. An optional TOML file, see [`Config::load`]. Every key is optional.
//! 3. Command line options, see [`Config::apply`].
//!
//! # Examples
//!
//! ```toml
//! minutes = 10
//! lead_ms = 15000
//! sample_rate = 48000
//! device = "pulse"
//! timezone = "CET-1CEST,M3.5.0,M10.5.0/3"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::Deserialize;
use tracing::debug;
use dcf77::{Tone, Zone};
use crate::args::Arguments;
use crate::error::Error;
use crate::output::SinkConfig;
use crate::scheduler::Timing;

/// Settings for one transmission run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
	/// Minutes to transmit.
	pub minutes: usize,
	/// Time from startup to the first transmitted second.
	pub lead_ms: u64,
	/// Longest acceptable wait before transmitting, `None` for [`Config::lead_ms`].
	pub wait_budget_ms: Option<u64>,
	/// Shortest acceptable wait before transmitting.
	pub safety_margin_ms: u64,
	pub sample_rate: u32,
	pub carrier_hz: f32,
	/// Frames per audio device callback.
	pub buffer_frames: u32,
	/// Output device name, `None` for the default device.
	pub device: Option<String>,
	/// TZ string for the transmitted civil time.
	pub timezone: String,
	/// Directory of raw waveform tables, `None` to synthesize them.
	pub waveforms: Option<PathBuf>
}

impl Default for Config {
	fn default() -> Self {
		Config {
			minutes: 6,
			lead_ms: 10000,
			wait_budget_ms: None,
			safety_margin_ms: 250,
			sample_rate: 44100,
			carrier_hz: 15500.0,
			buffer_frames: 1024,
			device: None,
			timezone: String::from(dcf77::zone::CENTRAL_EUROPEAN),
			waveforms: None
		}
	}
}

impl Config {
	/// Read a TOML configuration file. Missing keys keep their defaults.
	///
	/// # Errors
	///
	/// Returns [`Error::Io`] if the file cannot be read or [`Error::Toml`] if it is malformed.
	pub fn load(path: &Path) -> Result<Config, Error> {
		let text = std::fs::read_to_string(path)
			.map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
		let config = toml::from_str(&text)
			.map_err(|source| Error::Toml { path: path.to_path_buf(), source })?;
		debug!("loaded configuration from {}", path.display());
		Ok(config)
	}

	/// Defaults, then the file named by `--config` (if any), then the other options.
	pub fn from_arguments(args: &Arguments) -> Result<Config, Error> {
		let mut config = match &args.config {
			Some(path) => Config::load(path)?,
			None => Config::default()
		};
		config.apply(args);
		Ok(config)
	}

	/// Override fields with any options given on the command line.
	pub fn apply(&mut self, args: &Arguments) {
		if let Some(n) = args.minutes {
			self.minutes = n.get();
		}
		if let Some(ms) = args.lead_ms {
			self.lead_ms = ms;
		}
		if let Some(ms) = args.margin_ms {
			self.safety_margin_ms = ms;
		}
		if let Some(rate) = args.rate {
			self.sample_rate = rate;
		}
		if let Some(device) = &args.device {
			self.device = Some(device.clone());
		}
		if let Some(tz) = &args.timezone {
			self.timezone = tz.clone();
		}
		if let Some(dir) = &args.waveforms {
			self.waveforms = Some(dir.clone());
		}
	}

	pub fn wait_budget_ms(&self) -> u64 {
		self.wait_budget_ms.unwrap_or(self.lead_ms)
	}

	/// Check every value, returning the parsed timezone.
	///
	/// # Errors
	///
	/// Returns [`Error::Config`] for out of range values or [`Error::Zone`] if the timezone does
	/// not parse.
	pub fn validate(&self) -> Result<Zone, Error> {
		if self.minutes == 0 {
			return Err(Error::Config(String::from("minutes must be at least 1")));
		}
		if self.sample_rate == 0 || self.sample_rate % 10 != 0 {
			return Err(Error::Config(format!(
				"sample rate {} Hz must be positive and divisible by 10",
				self.sample_rate
			)));
		}
		if !(self.carrier_hz > 0.0 && self.carrier_hz < self.sample_rate as f32 / 2.0) {
			return Err(Error::Config(format!(
				"carrier {} Hz must be between 0 and the Nyquist frequency {} Hz",
				self.carrier_hz,
				self.sample_rate / 2
			)));
		}
		if self.buffer_frames == 0 {
			return Err(Error::Config(String::from("buffer frames must be at least 1")));
		}
		if self.safety_margin_ms >= self.lead_ms {
			return Err(Error::Config(format!(
				"safety margin {} ms must be shorter than lead time {} ms",
				self.safety_margin_ms,
				self.lead_ms
			)));
		}
		if self.wait_budget_ms() < self.lead_ms {
			return Err(Error::Config(format!(
				"wait budget {} ms must be at least the lead time {} ms",
				self.wait_budget_ms(),
				self.lead_ms
			)));
		}
		Ok(Zone::parse(&self.timezone)?)
	}

	/// Parameters for synthesizing the waveform tables.
	pub fn tone(&self) -> Tone {
		Tone {
			sample_rate: self.sample_rate,
			carrier_hz: self.carrier_hz,
			..Tone::default()
		}
	}

	/// Scheduler window and wait limits.
	pub fn timing(&self) -> Timing {
		Timing {
			minutes: self.minutes,
			lead: Duration::from_millis(self.lead_ms),
			margin: Duration::from_millis(self.safety_margin_ms),
			budget: Duration::from_millis(self.wait_budget_ms())
		}
	}

	/// Audio output settings.
	pub fn sink(&self) -> SinkConfig {
		SinkConfig {
			device: self.device.clone(),
			sample_rate: self.sample_rate,
			buffer_frames: self.buffer_frames
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::num::NonZero;

	#[test]
	fn default_test() {
		let config = Config::default();
		assert_eq!(config.wait_budget_ms(), 10000);
		assert_eq!(config.validate().unwrap(), Zone::central_european());
		assert_eq!(config.tone(), Tone::default());
		assert_eq!(config.timing(), Timing {
			minutes: 6,
			lead: Duration::from_secs(10),
			margin: Duration::from_millis(250),
			budget: Duration::from_secs(10)
		});
	}

	#[test]
	fn load_test() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dcf77sync.toml");
		std::fs::write(&path, "minutes = 10\nlead_ms = 15000\nwait_budget_ms = 20000\ndevice = \"pulse\"\n").unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config, Config {
			minutes: 10,
			lead_ms: 15000,
			wait_budget_ms: Some(20000),
			device: Some(String::from("pulse")),
			..Config::default()
		});
		assert_eq!(config.timing().budget, Duration::from_secs(20));

		std::fs::write(&path, "minutes = \"ten\"\n").unwrap();
		assert!(matches!(Config::load(&path), Err(Error::Toml { .. })));
		std::fs::write(&path, "minute = 10\n").unwrap();
		assert!(matches!(Config::load(&path), Err(Error::Toml { .. })));
		assert!(matches!(Config::load(&dir.path().join("missing.toml")), Err(Error::Io { .. })));
	}

	#[test]
	fn apply_test() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dcf77sync.toml");
		std::fs::write(&path, "minutes = 10\nsample_rate = 48000\ntimezone = \"UTC0\"\n").unwrap();

		let args = Arguments {
			minutes: NonZero::new(3),
			margin_ms: Some(500),
			config: Some(path),
			..Arguments::default()
		};
		let config = Config::from_arguments(&args).unwrap();
		assert_eq!(config.minutes, 3);
		assert_eq!(config.safety_margin_ms, 500);
		assert_eq!(config.sample_rate, 48000);
		assert_eq!(config.timezone, "UTC0");
		assert_eq!(config.validate().unwrap(), Zone::fixed(0));

		let config = Config::from_arguments(&Arguments::default()).unwrap();
		assert_eq!(config, Config::default());
	}

	#[test]
	fn validate_test() {
		let invalid = [
			Config { minutes: 0, ..Config::default() },
			Config { sample_rate: 0, ..Config::default() },
			Config { sample_rate: 44101, ..Config::default() },
			Config { carrier_hz: 22050.0, ..Config::default() },
			Config { carrier_hz: 0.0, ..Config::default() },
			Config { carrier_hz: f32::NAN, ..Config::default() },
			Config { buffer_frames: 0, ..Config::default() },
			Config { safety_margin_ms: 10000, ..Config::default() },
			Config { wait_budget_ms: Some(9999), ..Config::default() }
		];
		for config in invalid {
			assert!(matches!(config.validate(), Err(Error::Config(_))), "{:?}", config);
		}

		let config = Config { timezone: String::from("CET-1CEST"), ..Config::default() };
		assert!(matches!(config.validate(), Err(Error::Zone(_))));

		let config = Config { lead_ms: 2000, safety_margin_ms: 1999, sample_rate: 8000, carrier_hz: 3000.0, ..Config::default() };
		assert!(config.validate().is_ok());
	}
}
