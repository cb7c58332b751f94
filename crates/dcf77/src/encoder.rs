//! Encode civil time into the DCF77 amplitude modulated bit sequence.
//!
//! See [DCF77 documentation](https://en.wikipedia.org/wiki/DCF77#Time_code_details) for details.
//! One frame is transmitted per minute, one symbol per second:
//!
//! | Seconds | Field          | Content                                          |
//! | ------- | -------------- | ------------------------------------------------ |
//! | 0-16    | Reserved       | Always zero                                      |
//! | 17-18   | Timezone       | `10` during daylight savings time, `01` otherwise |
//! | 19-20   | Start of time  | `01`                                             |
//! | 21-28   | Minute         | 7 bit BCD + even parity                          |
//! | 29-35   | Hour           | 6 bit BCD + even parity                          |
//! | 36-41   | Day of month   | 6 bit BCD                                        |
//! | 42-44   | Day of week    | 3 bit BCD, Monday = 1                            |
//! | 45-49   | Month          | 5 bit BCD                                        |
//! | 50-57   | Year           | 8 bit BCD, year within century                   |
//! | 58      | Date parity    | Even parity over seconds 36-57                   |
//! | 59      | Minute marker  | No modulation                                    |
//!
//! BCD fields are sent least significant bit first with bit weights 1, 2, 4, 8, 10, 20, 40, 80.
//! Fields narrower than 8 bits simply drop the high weights of the tens digit.
//!
//! # Examples
//!
//! ```
//! # use dcf77::{encode, CivilTime, Symbol};
//! # use dcf77::encoder::field;
//! let bits = encode(&CivilTime {
//! 	year: 24, month: 5, day: 26, hour: 18, minute: 19, weekday: 7, dst: true
//! });
//! assert_eq!(bits.len(), 60);
//! assert_eq!(&bits[field::MINUTE], &[
//! 	Symbol::One, Symbol::Zero, Symbol::Zero, Symbol::One, // 9
//! 	Symbol::One, Symbol::Zero, Symbol::Zero               // 10
//! ]);
//! assert_eq!(bits[field::MINUTE_PARITY], Symbol::One);
//! ```

use core::ops::{Deref, Range};
use crate::civil::CivilTime;

/// Number of symbols in one frame: 59 data seconds plus the minute marker.
pub const FRAME_LEN: usize = 60;

/// Bit positions of each field within a frame.
pub mod field {
	use core::ops::Range;

	/// Always zero.
	pub const RESERVED: Range<usize> = 0..17;
	/// Daylight savings (first) and standard time (second) flags.
	pub const TIMEZONE: Range<usize> = 17..19;
	/// Start of encoded time, always `01`.
	pub const START: Range<usize> = 19..21;
	/// Minute, BCD.
	pub const MINUTE: Range<usize> = 21..28;
	/// Even parity over [`MINUTE`].
	pub const MINUTE_PARITY: usize = 28;
	/// Hour, BCD.
	pub const HOUR: Range<usize> = 29..35;
	/// Even parity over [`HOUR`].
	pub const HOUR_PARITY: usize = 35;
	/// Day of month, BCD.
	pub const DAY: Range<usize> = 36..42;
	/// Day of week, BCD.
	pub const WEEKDAY: Range<usize> = 42..45;
	/// Month, BCD.
	pub const MONTH: Range<usize> = 45..50;
	/// Year within century, BCD.
	pub const YEAR: Range<usize> = 50..58;
	/// Even parity over [`DAY`], [`WEEKDAY`], [`MONTH`], and [`YEAR`].
	pub const DATE_PARITY: usize = 58;
	/// The unmodulated second announcing the next minute.
	pub const MARKER: usize = 59;
}

/// One second of the signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Symbol {
	/// Short (100 ms) reduction in amplitude.
	#[default]
	Zero,
	/// Long (200 ms) reduction in amplitude.
	One,
	/// No reduction in amplitude, marks the end of a frame.
	Marker
}

impl From<bool> for Symbol {
	fn from(value: bool) -> Self {
		if value { Symbol::One } else { Symbol::Zero }
	}
}

/// A bounded sequence of [`Symbol`]s holding at most one frame.
///
/// Writers append in order and return the position or range they wrote, so that parity can be
/// computed over fields without tracking offsets by hand.
///
/// # Panics
///
/// Every writer panics if the frame would grow past [`FRAME_LEN`]. Frames have a fixed layout, so
/// this only happens if the encoder itself is wrong.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BitSequence {
	symbols: [Symbol; FRAME_LEN],
	len: usize
}

impl Default for BitSequence {
	fn default() -> Self {
		BitSequence::new()
	}
}

impl Deref for BitSequence {
	type Target = [Symbol];

	fn deref(&self) -> &Self::Target {
		&self.symbols[..self.len]
	}
}

impl core::fmt::Debug for BitSequence {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		for s in self.iter() {
			f.write_str(match s {
				Symbol::Zero => "0",
				Symbol::One => "1",
				Symbol::Marker => "-"
			})?;
		}
		Ok(())
	}
}

impl BitSequence {
	/// Create an empty sequence.
	pub const fn new() -> BitSequence {
		BitSequence {
			symbols: [Symbol::Zero; FRAME_LEN],
			len: 0
		}
	}

	/// Append a symbol, returning its position.
	pub fn push(&mut self, symbol: Symbol) -> usize {
		assert!(self.len < FRAME_LEN, "frame overflow: {} symbols already written", self.len);
		let pos = self.len;
		self.symbols[pos] = symbol;
		self.len += 1;
		pos
	}

	/// Append `count` copies of `symbol`.
	pub fn push_repeat(&mut self, symbol: Symbol, count: usize) -> Range<usize> {
		let start = self.len;
		for _ in 0..count {
			self.push(symbol);
		}
		start..self.len
	}

	/// Append `value` as a `width` bit BCD field, least significant bit first.
	///
	/// The ones digit takes the first four bits and the tens digit whatever remains. Bits of
	/// either digit that do not fit are dropped.
	pub fn push_bcd(&mut self, value: u8, width: usize) -> Range<usize> {
		assert!(width <= 8, "BCD fields are at most 8 bits wide, got {}", width);
		let digits = [value % 10, value / 10];
		let start = self.len;
		for i in 0..width {
			self.push(Symbol::from((digits[i / 4] >> (i % 4)) & 1 == 1));
		}
		start..self.len
	}

	/// Append an even parity bit over `range`, returning its position.
	///
	/// The bit is [`Symbol::One`] when `range` holds an odd number of ones, so that the range plus
	/// the parity bit always holds an even number.
	pub fn push_parity(&mut self, range: Range<usize>) -> usize {
		let ones = self.ones(range);
		self.push(Symbol::from(ones % 2 == 1))
	}

	/// Count the [`Symbol::One`]s in `range`.
	pub fn ones(&self, range: Range<usize>) -> usize {
		self[range].iter().filter(|&&s| s == Symbol::One).count()
	}

	/// Pack the data seconds into an integer, second 0 in the least significant bit.
	///
	/// The minute marker is not included, so the top five bits are always zero.
	pub fn to_packed(&self) -> u64 {
		self.iter()
			.take(field::MARKER)
			.enumerate()
			.fold(0, |acc, (i, &s)| acc | ((s == Symbol::One) as u64) << i)
	}
}

/// Decode a BCD field written by [`BitSequence::push_bcd`].
///
/// # Examples
///
/// ```
/// # use dcf77::encoder::{decode_bcd, Symbol};
/// use Symbol::{One, Zero};
/// assert_eq!(decode_bcd(&[One, Zero, Zero, One, One, Zero, Zero]), 19);
/// ```
pub fn decode_bcd(bits: &[Symbol]) -> u8 {
	const WEIGHTS: [u8; 8] = [1, 2, 4, 8, 10, 20, 40, 80];
	bits.iter()
		.zip(WEIGHTS)
		.filter(|&(&s, _)| s == Symbol::One)
		.fold(0u8, |acc, (_, w)| acc.wrapping_add(w))
}

/// Encode one minute of civil time as a DCF77 frame.
///
/// The frame describes the minute that **begins** at the frame's minute marker, so callers
/// transmitting during minute `m` should pass the civil time of minute `m + 1`.
pub fn encode(time: &CivilTime) -> BitSequence {
	let mut bits = BitSequence::new();

	bits.push_repeat(Symbol::Zero, field::RESERVED.len());

	bits.push(Symbol::from(time.dst));
	bits.push(Symbol::from(!time.dst));

	bits.push(Symbol::Zero);
	bits.push(Symbol::One);

	let minute = bits.push_bcd(time.minute, field::MINUTE.len());
	bits.push_parity(minute);

	let hour = bits.push_bcd(time.hour, field::HOUR.len());
	bits.push_parity(hour);

	let day = bits.push_bcd(time.day, field::DAY.len());
	bits.push_bcd(time.weekday, field::WEEKDAY.len());
	bits.push_bcd(time.month, field::MONTH.len());
	let year = bits.push_bcd(time.year, field::YEAR.len());
	bits.push_parity(day.start..year.end);

	bits.push(Symbol::Marker);

	debug_assert_eq!(bits.len(), FRAME_LEN);
	bits
}

#[cfg(test)]
mod tests {
	use super::*;
	use core::ops::RangeInclusive;
	use crate::zone::Zone;
	use Symbol::{Marker, One, Zero};

	fn sample_time() -> CivilTime {
		CivilTime { year: 24, month: 5, day: 26, hour: 18, minute: 58, weekday: 7, dst: true }
	}

	fn check_parity(bits: &BitSequence, range: Range<usize>, parity: usize) {
		let ones = bits.ones(range.clone()) + (bits[parity] == One) as usize;
		assert_eq!(ones % 2, 0, "odd parity over {:?} + {} in {:?}", range, parity, bits);
	}

	#[test]
	fn fixed_fields_test() {
		let bits = encode(&sample_time());
		assert!(bits[field::RESERVED].iter().all(|&s| s == Zero));
		assert_eq!(&bits[field::TIMEZONE], &[One, Zero]);
		assert_eq!(&bits[field::START], &[Zero, One]);

		let bits = encode(&CivilTime { dst: false, ..sample_time() });
		assert_eq!(&bits[field::TIMEZONE], &[Zero, One]);
	}

	#[test]
	fn minute_fixed_point_test() {
		let bits = encode(&CivilTime { minute: 0, ..sample_time() });
		assert_eq!(&bits[field::MINUTE], &[Zero; 7]);
		assert_eq!(bits[field::MINUTE_PARITY], Zero);

		let bits = encode(&CivilTime { minute: 19, ..sample_time() });
		assert_eq!(&bits[field::MINUTE], &[One, Zero, Zero, One, One, Zero, Zero]);
		assert_eq!(bits[field::MINUTE_PARITY], One);

		let bits = encode(&CivilTime { minute: 59, ..sample_time() });
		assert_eq!(&bits[field::MINUTE], &[One, Zero, Zero, One, One, Zero, One]);
		assert_eq!(bits[field::MINUTE_PARITY], Zero);
	}

	#[test]
	fn hour_fixed_point_test() {
		let bits = encode(&CivilTime { hour: 23, ..sample_time() });
		assert_eq!(&bits[field::HOUR], &[One, One, Zero, Zero, Zero, One]);
		assert_eq!(bits[field::HOUR_PARITY], One);
	}

	fn check_round_trip(set: impl Fn(&mut CivilTime, u8), range: Range<usize>, values: RangeInclusive<u8>) {
		for v in values {
			let mut t = sample_time();
			set(&mut t, v);
			let bits = encode(&t);
			assert_eq!(decode_bcd(&bits[range.clone()]), v, "field {:?} value {}", range, v);
			check_parity(&bits, field::MINUTE, field::MINUTE_PARITY);
			check_parity(&bits, field::HOUR, field::HOUR_PARITY);
			check_parity(&bits, field::DAY.start..field::YEAR.end, field::DATE_PARITY);
		}
	}

	#[test]
	fn round_trip_test() {
		check_round_trip(|t, v| t.minute = v, field::MINUTE, 0..=59);
		check_round_trip(|t, v| t.hour = v, field::HOUR, 0..=23);
		check_round_trip(|t, v| t.day = v, field::DAY, 1..=31);
		check_round_trip(|t, v| t.weekday = v, field::WEEKDAY, 1..=7);
		check_round_trip(|t, v| t.month = v, field::MONTH, 1..=12);
		check_round_trip(|t, v| t.year = v, field::YEAR, 0..=99);
	}

	#[test]
	fn frame_length_test() {
		let zone = Zone::central_european();
		// Roughly every 2h12m over three years, crossing DST and year boundaries
		let mut time = 1672531200;
		while time < 1767225600 {
			let bits = encode(&CivilTime::from_unix(time, &zone).unwrap());
			assert_eq!(bits.len(), FRAME_LEN);
			assert_eq!(bits.iter().position(|&s| s == Marker), Some(field::MARKER));
			assert_eq!(bits.iter().filter(|&&s| s == Marker).count(), 1);
			time += 7919;
		}
	}

	#[test]
	fn known_frames_test() {
		let zone = Zone::central_european();
		// Sun, May 26, 2024. 18:58 CEST
		let bits = encode(&CivilTime::from_unix(1716742680, &zone).unwrap());
		assert_eq!(bits.to_packed(), 0x090BE631B120000);
		// Sun, May 26, 2024. 18:59 CEST
		let bits = encode(&CivilTime::from_unix(1716742740, &zone).unwrap());
		assert_eq!(bits.to_packed(), 0x90BE630B320000);
		// Wed, Jan 1, 2025. 00:00 CET
		let bits = encode(&CivilTime::from_unix(1735686000, &zone).unwrap());
		assert_eq!(bits.to_packed(), 0x4942C1000140000);
	}

	#[test]
	fn out_of_range_test() {
		// Values wider than a field are truncated rather than rejected
		let bits = encode(&CivilTime { month: 13, day: 99, ..sample_time() });
		assert_eq!(bits.len(), FRAME_LEN);
		assert_eq!(decode_bcd(&bits[field::MONTH]), 13);
		assert_eq!(decode_bcd(&bits[field::DAY]), 19);
	}

	#[test]
	#[should_panic(expected = "frame overflow")]
	fn overflow_test() {
		let mut bits = encode(&sample_time());
		bits.push(Zero);
	}

	#[test]
	fn debug_test() {
		let bits = encode(&sample_time());
		let s = format!("{:?}", bits);
		assert_eq!(s.len(), FRAME_LEN);
		assert!(s.starts_with("00000000000000000100"));
		assert!(s.ends_with('-'));
	}
}
