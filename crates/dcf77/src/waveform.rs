//! Precomputed tone bursts that every second of the signal is built from.
//!
//! DCF77 marks each second by dropping the carrier amplitude for 100 ms (a zero) or 200 ms (a
//! one), then restoring full amplitude for the rest of the second. The last second of a minute
//! has no dip at all. Five [`Fragment`]s are therefore enough to assemble any frame:
//!
//! | Kind                         | Duration | Amplitude      |
//! | ---------------------------- | -------- | -------------- |
//! | [`FragmentKind::Dip100`]     | 100 ms   | [`Tone::low`]  |
//! | [`FragmentKind::Dip200`]     | 200 ms   | [`Tone::low`]  |
//! | [`FragmentKind::Tail800`]    | 800 ms   | [`Tone::high`] |
//! | [`FragmentKind::Tail900`]    | 900 ms   | [`Tone::high`] |
//! | [`FragmentKind::Steady1000`] | 1000 ms  | [`Tone::high`] |
//!
//! Fragments are either synthesized at startup with [`WaveformLibrary::synthesize`] or loaded from
//! raw tables with [`WaveformLibrary::load`]. Both use the same 16-bit quantization, so a table
//! written by [`WaveformLibrary::save`] loads back bit for bit.
//!
//! [`Tone::low`]: Tone#structfield.low
//! [`Tone::high`]: Tone#structfield.high

use std::f64::consts::TAU;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Full scale of a signed 16-bit sample.
const FULL_SCALE: f32 = 32767.0;

/// The five canonical fragments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FragmentKind {
	/// 100 ms at low amplitude, the start of a zero.
	Dip100,
	/// 200 ms at low amplitude, the start of a one.
	Dip200,
	/// 800 ms at high amplitude, the rest of a one.
	Tail800,
	/// 900 ms at high amplitude, the rest of a zero.
	Tail900,
	/// A full second at high amplitude, the minute marker.
	Steady1000
}

impl FragmentKind {
	/// All kinds, in storage order.
	pub const ALL: [FragmentKind; 5] = [
		FragmentKind::Dip100,
		FragmentKind::Dip200,
		FragmentKind::Tail800,
		FragmentKind::Tail900,
		FragmentKind::Steady1000
	];

	/// Duration in milliseconds.
	pub const fn millis(self) -> usize {
		match self {
			FragmentKind::Dip100 => 100,
			FragmentKind::Dip200 => 200,
			FragmentKind::Tail800 => 800,
			FragmentKind::Tail900 => 900,
			FragmentKind::Steady1000 => 1000
		}
	}

	/// Whether the fragment is played at reduced amplitude.
	pub const fn is_dip(self) -> bool {
		matches!(self, FragmentKind::Dip100 | FragmentKind::Dip200)
	}

	/// Number of samples at `sample_rate`.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::FragmentKind;
	/// assert_eq!(FragmentKind::Dip100.len(44100), 4410);
	/// assert_eq!(FragmentKind::Tail900.len(44100), 39690);
	/// ```
	pub const fn len(self, sample_rate: u32) -> usize {
		sample_rate as usize * self.millis() / 1000
	}

	/// File name of the raw table holding this fragment.
	pub const fn file_name(self) -> &'static str {
		match self {
			FragmentKind::Dip100 => "dip100.bin",
			FragmentKind::Dip200 => "dip200.bin",
			FragmentKind::Tail800 => "tail800.bin",
			FragmentKind::Tail900 => "tail900.bin",
			FragmentKind::Steady1000 => "steady1000.bin"
		}
	}

	const fn index(self) -> usize {
		self as usize
	}
}

impl core::fmt::Display for FragmentKind {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "{:?}", self)
	}
}

/// Parameters of the synthesized carrier.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
	/// Output sample rate in Hz. Must be divisible by 10 so that every fragment is a whole number
	/// of samples.
	pub sample_rate: u32,
	/// Carrier frequency in Hz.
	pub carrier_hz: f32,
	/// Peak amplitude of the dips, ranged [0, 1]
	pub low: f32,
	/// Peak amplitude of the rest of the second, ranged [0, 1]
	pub high: f32
}

impl Default for Tone {
	/// 15.5 kHz (the fifth subharmonic of 77.5 kHz) at 44.1 kHz, dipping to half amplitude.
	fn default() -> Self {
		Tone {
			sample_rate: 44100,
			carrier_hz: 15500.0,
			low: 0.5,
			high: 1.0
		}
	}
}

/// Round `x` down to 16-bit resolution.
///
/// # Examples
///
/// ```
/// # use dcf77::waveform::quantize;
/// assert_eq!(quantize(1.0), 1.0);
/// assert_eq!(quantize(0.0), 0.0);
/// assert_eq!(quantize(-1.0), -1.0);
/// ```
pub fn quantize(x: f32) -> f32 {
	(x * FULL_SCALE).floor() / FULL_SCALE
}

/// An immutable burst of carrier samples.
#[derive(Clone, Debug, PartialEq)]
pub struct Fragment {
	kind: FragmentKind,
	samples: Box<[f32]>
}

impl Fragment {
	/// Synthesize `kind` for `tone`, starting at carrier phase zero.
	fn synthesize(kind: FragmentKind, tone: &Tone) -> Fragment {
		let amplitude = if kind.is_dip() { tone.low } else { tone.high };
		let step = TAU * tone.carrier_hz as f64 / tone.sample_rate as f64;
		let samples = (0..kind.len(tone.sample_rate))
			.map(|i| quantize(amplitude * (step * i as f64).sin() as f32))
			.collect();
		Fragment { kind, samples }
	}

	/// Build a fragment from raw words, each the bit pattern of an `f32` sample.
	pub fn from_raw(kind: FragmentKind, words: &[u32]) -> Fragment {
		Fragment {
			kind,
			samples: words.iter().map(|w| f32::from_bits(*w)).collect()
		}
	}

	/// The raw bit pattern of every sample, the inverse of [`Fragment::from_raw`].
	pub fn to_raw(&self) -> Vec<u32> {
		self.samples.iter().map(|s| s.to_bits()).collect()
	}

	/// Which of the five canonical fragments this is.
	pub fn kind(&self) -> FragmentKind {
		self.kind
	}

	/// The quantized samples, starting at carrier phase zero.
	pub fn samples(&self) -> &[f32] {
		&self.samples
	}

	/// Number of samples.
	pub fn len(&self) -> usize {
		self.samples.len()
	}

	/// Whether there are no samples.
	pub fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}
}

/// The error type for loading and saving waveform tables.
#[derive(Debug, Error)]
pub enum WaveformError {
	/// The sample rate does not divide into whole 100 ms fragments.
	#[error("sample rate {0} Hz is not divisible by 10")]
	SampleRate(u32),
	/// Reading or writing a table failed.
	#[error("{}: {source}", .path.display())]
	Io {
		path: PathBuf,
		#[source]
		source: io::Error
	},
	/// The table size is not a whole number of 32-bit words.
	#[error("{}: {len} bytes is not a whole number of samples", .path.display())]
	Misaligned {
		path: PathBuf,
		len: usize
	},
	/// The table holds the wrong number of samples for the sample rate.
	#[error("{kind}: expected {expected} samples, found {found}")]
	Length {
		kind: FragmentKind,
		expected: usize,
		found: usize
	}
}

/// One [`Fragment`] of every [`FragmentKind`] at a single sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct WaveformLibrary {
	sample_rate: u32,
	fragments: [Fragment; 5]
}

impl WaveformLibrary {
	/// Synthesize all five fragments for `tone`.
	///
	/// # Panics
	///
	/// Panics if `tone.sample_rate` is not divisible by 10.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::{FragmentKind, Tone, WaveformLibrary};
	/// let library = WaveformLibrary::synthesize(&Tone::default());
	/// assert_eq!(library.samples_per_second(), 44100);
	/// assert_eq!(library.get(FragmentKind::Dip200).len(), 8820);
	/// ```
	pub fn synthesize(tone: &Tone) -> WaveformLibrary {
		assert!(tone.sample_rate % 10 == 0, "sample rate {} is not divisible by 10", tone.sample_rate);
		WaveformLibrary {
			sample_rate: tone.sample_rate,
			fragments: FragmentKind::ALL.map(|k| Fragment::synthesize(k, tone))
		}
	}

	/// Load all five fragments from the raw tables in `dir`.
	///
	/// Each table is named after [`FragmentKind::file_name`] and holds little-endian 32-bit words,
	/// one `f32` bit pattern per sample. Every table must hold exactly [`FragmentKind::len`]
	/// samples at `sample_rate`.
	///
	/// # Errors
	///
	/// - [`WaveformError::SampleRate`] if `sample_rate` is not divisible by 10.
	/// - [`WaveformError::Io`] if a table cannot be read.
	/// - [`WaveformError::Misaligned`] if a table is not a whole number of words.
	/// - [`WaveformError::Length`] if a table holds the wrong number of samples.
	pub fn load(dir: &Path, sample_rate: u32) -> Result<WaveformLibrary, WaveformError> {
		if sample_rate % 10 != 0 {
			return Err(WaveformError::SampleRate(sample_rate));
		}

		let mut fragments = Vec::with_capacity(FragmentKind::ALL.len());
		for kind in FragmentKind::ALL {
			let path = dir.join(kind.file_name());
			let bytes = std::fs::read(&path)
				.map_err(|source| WaveformError::Io { path: path.clone(), source })?;
			if bytes.len() % 4 != 0 {
				return Err(WaveformError::Misaligned { path, len: bytes.len() });
			}

			let words: Vec<u32> = bytes.chunks_exact(4)
				.map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
				.collect();
			let expected = kind.len(sample_rate);
			if words.len() != expected {
				return Err(WaveformError::Length { kind, expected, found: words.len() });
			}
			fragments.push(Fragment::from_raw(kind, &words));
		}

		let fragments: [Fragment; 5] = match fragments.try_into() {
			Ok(f) => f,
			Err(_) => unreachable!("one fragment per kind")
		};
		Ok(WaveformLibrary { sample_rate, fragments })
	}

	/// Write all five fragments into `dir` in the format read by [`WaveformLibrary::load`].
	pub fn save(&self, dir: &Path) -> Result<(), WaveformError> {
		for fragment in &self.fragments {
			let path = dir.join(fragment.kind.file_name());
			let bytes: Vec<u8> = fragment.to_raw()
				.into_iter()
				.flat_map(u32::to_le_bytes)
				.collect();
			std::fs::write(&path, bytes).map_err(|source| WaveformError::Io { path, source })?;
		}
		Ok(())
	}

	/// The fragment of `kind`.
	pub fn get(&self, kind: FragmentKind) -> &Fragment {
		&self.fragments[kind.index()]
	}

	/// Sample rate in Hz that every fragment was built or loaded for.
	pub fn sample_rate(&self) -> u32 {
		self.sample_rate
	}

	/// Samples in one second of signal, the length of [`FragmentKind::Steady1000`].
	pub fn samples_per_second(&self) -> usize {
		self.get(FragmentKind::Steady1000).len()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_abs_diff_eq;

	fn peak(fragment: &Fragment) -> f32 {
		fragment.samples().iter().fold(0.0f32, |m, s| m.max(s.abs()))
	}

	#[test]
	fn lengths_test() {
		for rate in [44100, 48000, 8000] {
			let library = WaveformLibrary::synthesize(&Tone { sample_rate: rate, ..Tone::default() });
			let len = |k| library.get(k).len();

			assert_eq!(len(FragmentKind::Steady1000), rate as usize);
			assert_eq!(len(FragmentKind::Dip100) + len(FragmentKind::Tail900), rate as usize);
			assert_eq!(len(FragmentKind::Dip200) + len(FragmentKind::Tail800), rate as usize);
			assert_eq!(len(FragmentKind::Dip100), rate as usize / 10);
			assert_eq!(library.samples_per_second(), rate as usize);
			for kind in FragmentKind::ALL {
				assert_eq!(library.get(kind).kind(), kind);
			}
		}
	}

	#[test]
	fn amplitude_test() {
		let library = WaveformLibrary::synthesize(&Tone::default());
		for kind in FragmentKind::ALL {
			let p = peak(library.get(kind));
			let amplitude = if kind.is_dip() { 0.5 } else { 1.0 };
			// Flooring moves negative peaks one step further from zero
			assert!(p <= amplitude + 1.0 / FULL_SCALE, "{} peak {} above {}", kind, p, amplitude);
			assert!(p > amplitude * 0.99, "{} peak {} too far below {}", kind, p, amplitude);
		}

		let dip = library.get(FragmentKind::Dip100).samples();
		let trough = dip.iter().copied().fold(0.0f32, f32::min);
		assert_eq!(trough, -16384.0 / FULL_SCALE);
	}

	#[test]
	fn quantization_test() {
		let library = WaveformLibrary::synthesize(&Tone::default());
		for kind in FragmentKind::ALL {
			for s in library.get(kind).samples() {
				let scaled = s * FULL_SCALE;
				assert_abs_diff_eq!(scaled, scaled.round(), epsilon = 1e-3);
			}
		}
	}

	#[test]
	fn phase_test() {
		let tone = Tone::default();
		let library = WaveformLibrary::synthesize(&tone);
		let step = TAU * 15500.0 / 44100.0;

		for kind in FragmentKind::ALL {
			let samples = library.get(kind).samples();
			assert_eq!(samples[0], 0.0);
			let amplitude = if kind.is_dip() { tone.low } else { tone.high };
			assert_abs_diff_eq!(samples[1], amplitude * step.sin() as f32, epsilon = 2.0 / FULL_SCALE);
			assert_abs_diff_eq!(samples[7], amplitude * (7.0 * step).sin() as f32, epsilon = 2.0 / FULL_SCALE);
		}

		// Every fragment restarts at phase zero, so shared prefixes are identical up to amplitude
		let dip100 = library.get(FragmentKind::Dip100).samples();
		let dip200 = library.get(FragmentKind::Dip200).samples();
		assert_eq!(dip100, &dip200[..dip100.len()]);
		let tail800 = library.get(FragmentKind::Tail800).samples();
		let steady = library.get(FragmentKind::Steady1000).samples();
		assert_eq!(tail800, &steady[..tail800.len()]);
	}

	#[test]
	#[should_panic(expected = "not divisible by 10")]
	fn sample_rate_panic_test() {
		WaveformLibrary::synthesize(&Tone { sample_rate: 44101, ..Tone::default() });
	}

	#[test]
	fn raw_test() {
		let fragment = Fragment::from_raw(FragmentKind::Dip100, &[0, 0x3F000000, 0xBF800000]);
		assert_eq!(fragment.samples(), &[0.0, 0.5, -1.0]);
		assert_eq!(fragment.to_raw(), vec![0, 0x3F000000, 0xBF800000]);
	}

	#[test]
	fn load_test() {
		let dir = tempfile::tempdir().unwrap();
		let library = WaveformLibrary::synthesize(&Tone { sample_rate: 8000, ..Tone::default() });
		library.save(dir.path()).unwrap();

		let loaded = WaveformLibrary::load(dir.path(), 8000).unwrap();
		assert_eq!(loaded, library);

		match WaveformLibrary::load(dir.path(), 16000) {
			Err(WaveformError::Length { kind: FragmentKind::Dip100, expected: 1600, found: 800 }) => (),
			r => panic!("unexpected result {:?}", r)
		}
		match WaveformLibrary::load(dir.path(), 8001) {
			Err(WaveformError::SampleRate(8001)) => (),
			r => panic!("unexpected result {:?}", r)
		}

		std::fs::write(dir.path().join("tail800.bin"), [0u8; 7]).unwrap();
		match WaveformLibrary::load(dir.path(), 8000) {
			Err(WaveformError::Misaligned { len: 7, .. }) => (),
			r => panic!("unexpected result {:?}", r)
		}

		std::fs::remove_file(dir.path().join("steady1000.bin")).unwrap();
		std::fs::remove_file(dir.path().join("tail800.bin")).unwrap();
		match WaveformLibrary::load(dir.path(), 8000) {
			Err(WaveformError::Io { path, .. }) => assert!(path.ends_with("tail800.bin")),
			r => panic!("unexpected result {:?}", r)
		}
	}
}
