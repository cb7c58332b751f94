//! Assemble encoded minutes into a buffer of audio samples.

use std::collections::TryReserveError;
use thiserror::Error;
use crate::encoder::{BitSequence, Symbol, FRAME_LEN};
use crate::waveform::{FragmentKind, WaveformLibrary};

/// The error type for allocating a [`PlaybackBuffer`].
#[derive(Debug, Error)]
#[error("failed to allocate playback buffer of {samples} samples")]
pub struct AllocError {
	/// Requested capacity in samples.
	pub samples: usize,
	#[source]
	source: TryReserveError
}

/// A sample buffer of fixed capacity, filled front to back.
///
/// The capacity is reserved once up front and never grows: appending past it is a logic error and
/// panics, since a truncated frame would still look valid to a receiver.
#[derive(Debug)]
pub struct PlaybackBuffer {
	samples: Vec<f32>,
	capacity: usize
}

impl PlaybackBuffer {
	/// Reserve room for exactly `capacity` samples.
	///
	/// # Errors
	///
	/// Returns [`AllocError`] if the memory cannot be reserved.
	pub fn allocate(capacity: usize) -> Result<PlaybackBuffer, AllocError> {
		let mut samples = Vec::new();
		samples.try_reserve_exact(capacity)
			.map_err(|source| AllocError { samples: capacity, source })?;
		Ok(PlaybackBuffer { samples, capacity })
	}

	/// Worst case capacity for `minutes` frames: every second as long as the minute marker.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::{PlaybackBuffer, Tone, WaveformLibrary};
	/// let library = WaveformLibrary::synthesize(&Tone::default());
	/// assert_eq!(PlaybackBuffer::capacity_for(6, &library), 6 * 60 * 44100);
	/// ```
	pub fn capacity_for(minutes: usize, library: &WaveformLibrary) -> usize {
		minutes
			.saturating_mul(FRAME_LEN)
			.saturating_mul(library.get(FragmentKind::Steady1000).len())
	}

	/// Append `samples` to the end of the buffer.
	///
	/// # Panics
	///
	/// Panics if the buffer would exceed its capacity.
	pub fn append(&mut self, samples: &[f32]) {
		assert!(
			samples.len() <= self.remaining(),
			"playback buffer overflow: {} samples with {} of {} free",
			samples.len(),
			self.remaining(),
			self.capacity
		);
		self.samples.extend_from_slice(samples);
	}

	/// Samples from `offset` to the end of what has been written.
	///
	/// # Panics
	///
	/// Panics if `offset` is past the end of the written samples.
	pub fn samples_from(&self, offset: usize) -> &[f32] {
		&self.samples[offset..]
	}

	pub fn len(&self) -> usize {
		self.samples.len()
	}

	pub fn is_empty(&self) -> bool {
		self.samples.is_empty()
	}

	pub fn capacity(&self) -> usize {
		self.capacity
	}

	/// Free space in samples.
	pub fn remaining(&self) -> usize {
		self.capacity - self.samples.len()
	}

	/// Discard all samples, keeping the reservation.
	pub fn clear(&mut self) {
		self.samples.clear();
	}
}

/// The fragments making up one second of `symbol`, in playback order.
///
/// # Examples
///
/// ```
/// # use dcf77::{FragmentKind, Symbol};
/// # use dcf77::assembler::fragments;
/// assert_eq!(fragments(Symbol::One), &[FragmentKind::Dip200, FragmentKind::Tail800]);
/// ```
pub const fn fragments(symbol: Symbol) -> &'static [FragmentKind] {
	match symbol {
		Symbol::Zero => &[FragmentKind::Dip100, FragmentKind::Tail900],
		Symbol::One => &[FragmentKind::Dip200, FragmentKind::Tail800],
		Symbol::Marker => &[FragmentKind::Steady1000]
	}
}

/// Append the samples for every symbol of `bits` to `buffer`, returning the number written.
///
/// # Panics
///
/// Panics if `buffer` runs out of capacity. Size it with [`PlaybackBuffer::capacity_for`].
pub fn assemble(bits: &BitSequence, library: &WaveformLibrary, buffer: &mut PlaybackBuffer) -> usize {
	let start = buffer.len();
	for symbol in bits.iter() {
		for kind in fragments(*symbol) {
			buffer.append(library.get(*kind).samples());
		}
	}
	buffer.len() - start
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::civil::CivilTime;
	use crate::encoder::encode;
	use crate::waveform::Tone;
	use crate::zone::Zone;

	const RATE: u32 = 8000;

	fn library() -> WaveformLibrary {
		WaveformLibrary::synthesize(&Tone { sample_rate: RATE, ..Tone::default() })
	}

	#[test]
	fn symbol_test() {
		let library = library();
		let dip100 = library.get(FragmentKind::Dip100).samples();
		let dip200 = library.get(FragmentKind::Dip200).samples();
		let tail800 = library.get(FragmentKind::Tail800).samples();
		let steady = library.get(FragmentKind::Steady1000).samples();

		for symbol in [Symbol::Zero, Symbol::One, Symbol::Marker] {
			let mut bits = BitSequence::new();
			bits.push(symbol);
			let mut buffer = PlaybackBuffer::allocate(RATE as usize).unwrap();
			assert_eq!(assemble(&bits, &library, &mut buffer), RATE as usize);
			assert_eq!(buffer.len(), RATE as usize);

			let samples = buffer.samples_from(0);
			match symbol {
				Symbol::Zero => {
					assert_eq!(&samples[..dip100.len()], dip100);
					assert_eq!(samples[dip100.len()..].len(), library.get(FragmentKind::Tail900).len());
				},
				Symbol::One => {
					assert_eq!(&samples[..dip200.len()], dip200);
					assert_eq!(&samples[dip200.len()..], tail800);
				},
				Symbol::Marker => assert_eq!(samples, steady)
			}
		}
	}

	#[test]
	fn minute_test() {
		let library = library();
		let zone = Zone::central_european();
		let capacity = PlaybackBuffer::capacity_for(3, &library);
		let mut buffer = PlaybackBuffer::allocate(capacity).unwrap();
		assert_eq!(buffer.capacity(), 3 * 60 * RATE as usize);

		// Sun, May 26, 2024. 16:58:00 UTC.
		for m in 0..3 {
			let time = CivilTime::from_unix(1716742680 + 60 * m, &zone).unwrap();
			let written = assemble(&encode(&time), &library, &mut buffer);
			assert_eq!(written, 60 * RATE as usize);
		}
		assert_eq!(buffer.len(), capacity);
		assert_eq!(buffer.remaining(), 0);

		// The last second of every minute is the undipped marker
		let second = RATE as usize;
		let marker = &buffer.samples_from(59 * second)[..second];
		assert_eq!(marker, library.get(FragmentKind::Steady1000).samples());

		buffer.clear();
		assert!(buffer.is_empty());
		assert_eq!(buffer.capacity(), capacity);
	}

	#[test]
	fn samples_from_test() {
		let mut buffer = PlaybackBuffer::allocate(4).unwrap();
		buffer.append(&[0.25, 0.5, 0.75]);
		assert_eq!(buffer.samples_from(1), &[0.5, 0.75]);
		assert_eq!(buffer.samples_from(3), &[] as &[f32]);
	}

	#[test]
	#[should_panic(expected = "playback buffer overflow")]
	fn overflow_test() {
		let library = library();
		let time = CivilTime::from_unix(1716742680, &Zone::central_european()).unwrap();
		let mut buffer = PlaybackBuffer::allocate(PlaybackBuffer::capacity_for(1, &library) - 1).unwrap();
		assemble(&encode(&time), &library, &mut buffer);
	}

	#[test]
	fn allocate_error_test() {
		let e = PlaybackBuffer::allocate(usize::MAX).unwrap_err();
		assert_eq!(e.samples, usize::MAX);
		assert!(e.to_string().contains("failed to allocate"));
	}
}
