//! Local time rules for the broadcast zone.
//!
//! DCF77 broadcasts German civil time, so encoding needs to know the UTC offset and whether
//! daylight savings time is in effect for every minute it encodes. This module supports the subset
//! of [TZ strings] needed to express that: a standard offset, an optional daylight savings offset,
//! and month/week/day transition rules (`Mm.w.d[/time]`). Julian-day rules and `<...>` quoted
//! names are not supported.
//!
//! [TZ strings]: https://www.gnu.org/software/libc/manual/html_node/TZ-Variable.html
//!
//! # Examples
//!
//! ```
//! # use dcf77::zone::{Zone, ZoneInfo};
//! let berlin = Zone::central_european();
//! assert_eq!(berlin.info(1711846799), ZoneInfo { offset: 3600, dst: false });
//! assert_eq!(berlin.info(1711846800), ZoneInfo { offset: 7200, dst: true });
//!
//! let parsed = Zone::parse("CET-1CEST,M3.5.0,M10.5.0/3").unwrap();
//! assert_eq!(parsed, berlin);
//! ```

use chrono::{Datelike, NaiveDate};
use std::str::FromStr;
use thiserror::Error;

/// The TZ string of the zone the transmitter broadcasts.
pub const CENTRAL_EUROPEAN: &str = "CET-1CEST,M3.5.0,M10.5.0/3";

/// Default transition time (02:00 local) when a rule omits `/time`.
const DEFAULT_TRANSITION: i32 = 7200;

/// The error type for parsing zone rules.
#[derive(Clone, Copy, Debug, PartialEq, Error)]
pub enum ZoneError {
	/// Empty input.
	#[error("Missing TZ string")]
	Missing,
	/// A zone name was missing or contained unsupported characters.
	#[error("Invalid zone name at byte {0}")]
	InvalidName(usize),
	/// A UTC offset or transition time was missing or malformed.
	#[error("Invalid time at byte {0}")]
	InvalidTime(usize),
	/// A time component was out of range.
	#[error("Time component out of range at byte {0}")]
	TimeOutOfRange(usize),
	/// Daylight savings time was named but no transition rules were supplied.
	#[error("Missing daylight savings transition rule")]
	MissingRule,
	/// A transition rule was not of the form `Mm.w.d`.
	#[error("Unsupported transition rule at byte {0}")]
	UnsupportedRule(usize),
	/// A transition rule component was out of range.
	#[error("Transition date out of range at byte {0}")]
	DateOutOfRange(usize),
	/// Input left over after a complete zone rule.
	#[error("Unexpected input at byte {0}")]
	UnexpectedInput(usize)
}

/// Offset and daylight savings state at a moment in time.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ZoneInfo {
	/// Seconds added to UTC to get local time.
	pub offset: i32,
	/// Whether daylight savings time is in effect.
	pub dst: bool
}

/// A transition date: the `week`th `weekday` of `month`, at `time` seconds past local midnight.
///
/// `week` 5 always means the last such weekday of the month. `weekday` counts from Sunday = 0.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transition {
	/// Month of the year, ranged [1, 12].
	pub month: u8,
	/// Week of the month, ranged [1, 5].
	pub week: u8,
	/// Day of the week, ranged [0, 6] => [Sunday, Saturday].
	pub weekday: u8,
	/// Local time of day of the transition, in seconds.
	pub time: i32
}

impl Transition {
	/// Midnight UTC, as a Unix timestamp, of the transition's date in `year`.
	fn midnight(&self, year: i32) -> Option<i64> {
		let first = NaiveDate::from_ymd_opt(year, self.month as u32, 1)?;
		let first_wday = first.weekday().num_days_from_sunday() as u8;
		let delta = (self.weekday + 7 - first_wday) % 7;
		let mut day = 1 + delta + 7 * self.week.saturating_sub(1);
		// Week 5 is "last", which may be the 4th occurrence
		let date = loop {
			match NaiveDate::from_ymd_opt(year, self.month as u32, day as u32) {
				Some(d) => break d,
				None if day > 7 => day -= 7,
				None => return None
			}
		};
		Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
	}
}

/// Daylight savings configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DstRule {
	/// Seconds added to UTC during daylight savings time.
	pub offset: i32,
	/// Switch from standard to daylight savings time (local standard time).
	pub start: Transition,
	/// Switch from daylight savings to standard time (local daylight savings time).
	pub end: Transition
}

/// A time zone: a standard UTC offset and an optional daylight savings rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Zone {
	/// Seconds added to UTC during standard time.
	pub standard: i32,
	/// Daylight savings configuration, if any.
	pub dst: Option<DstRule>
}

impl Default for Zone {
	fn default() -> Self {
		Zone::central_european()
	}
}

impl Zone {
	/// The zone of the DCF77 transmitter: CET (UTC+1), CEST (UTC+2) from the last Sunday of March
	/// at 02:00 until the last Sunday of October at 03:00.
	pub const fn central_european() -> Zone {
		Zone {
			standard: 3600,
			dst: Some(DstRule {
				offset: 7200,
				start: Transition { month: 3, week: 5, weekday: 0, time: 7200 },
				end: Transition { month: 10, week: 5, weekday: 0, time: 10800 }
			})
		}
	}

	/// A zone with a fixed offset and no daylight savings time.
	pub const fn fixed(offset: i32) -> Zone {
		Zone { standard: offset, dst: None }
	}

	/// Get the offset and daylight savings state for a Unix timestamp.
	pub fn info(&self, time: i64) -> ZoneInfo {
		let Some(rule) = self.dst else {
			return ZoneInfo { offset: self.standard, dst: false };
		};
		let Some(year) = chrono::DateTime::from_timestamp(time, 0).map(|d| d.year()) else {
			return ZoneInfo { offset: self.standard, dst: false };
		};

		// Transition times are local, so undo the offset in effect before each transition
		let start = rule.start.midnight(year)
			.map(|t| t + rule.start.time as i64 - self.standard as i64);
		let end = rule.end.midnight(year)
			.map(|t| t + rule.end.time as i64 - rule.offset as i64);
		let dst = match (start, end) {
			(Some(start), Some(end)) if start < end => start <= time && time < end,
			// Southern hemisphere: daylight savings spans the new year
			(Some(start), Some(end)) => time < end || start <= time,
			_ => false
		};

		ZoneInfo {
			offset: if dst { rule.offset } else { self.standard },
			dst
		}
	}

	/// Parse a zone from a TZ string such as `CET-1CEST,M3.5.0,M10.5.0/3`.
	///
	/// # Errors
	///
	/// Returns a [`ZoneError`] describing the first problem found and its byte position.
	///
	/// # Examples
	///
	/// ```
	/// # use dcf77::zone::{Zone, ZoneError};
	/// assert_eq!(Zone::parse("UTC0"), Ok(Zone::fixed(0)));
	/// assert_eq!(Zone::parse("CET-1CEST"), Err(ZoneError::MissingRule));
	/// assert_eq!(Zone::parse(""), Err(ZoneError::Missing));
	/// ```
	pub fn parse(s: &str) -> Result<Zone, ZoneError> {
		if s.is_empty() {
			return Err(ZoneError::Missing);
		}

		let mut cursor = Cursor { bytes: s.as_bytes(), pos: 0 };
		cursor.name()?;
		// TZ strings subtract the offset from local time, we add it to UTC
		let standard = -cursor.time(24)?;

		if cursor.at_end() {
			return Ok(Zone::fixed(standard));
		}

		cursor.name()?;
		let offset = match cursor.peek() {
			Some(b',') | None => standard + 3600,
			_ => -cursor.time(24)?
		};
		if !cursor.eat(b',') {
			return Err(ZoneError::MissingRule);
		}
		let start = cursor.transition()?;
		if !cursor.eat(b',') {
			return Err(ZoneError::MissingRule);
		}
		let end = cursor.transition()?;

		if !cursor.at_end() {
			return Err(ZoneError::UnexpectedInput(cursor.pos));
		}

		Ok(Zone {
			standard,
			dst: Some(DstRule { offset, start, end })
		})
	}
}

impl FromStr for Zone {
	type Err = ZoneError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Zone::parse(s)
	}
}

/// Byte cursor over a TZ string.
struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize
}

impl Cursor<'_> {
	fn peek(&self) -> Option<u8> {
		self.bytes.get(self.pos).copied()
	}

	fn at_end(&self) -> bool {
		self.pos >= self.bytes.len()
	}

	fn eat(&mut self, b: u8) -> bool {
		if self.peek() == Some(b) {
			self.pos += 1;
			true
		} else {
			false
		}
	}

	/// Read a zone name of at least three letters.
	fn name(&mut self) -> Result<(), ZoneError> {
		let start = self.pos;
		while self.peek().is_some_and(|b| b.is_ascii_alphabetic()) {
			self.pos += 1;
		}
		if self.pos - start < 3 {
			Err(ZoneError::InvalidName(start))
		} else {
			Ok(())
		}
	}

	/// Read an unsigned decimal number, `None` if there are no digits.
	fn number(&mut self) -> Option<u32> {
		let start = self.pos;
		let mut n: u32 = 0;
		while let Some(b @ b'0'..=b'9') = self.peek() {
			n = n.saturating_mul(10).saturating_add((b - b'0') as u32);
			self.pos += 1;
		}
		(self.pos > start).then_some(n)
	}

	/// Read a signed `hh[:mm[:ss]]` time in seconds, with hours bounded by `max_hours`.
	fn time(&mut self, max_hours: u32) -> Result<i32, ZoneError> {
		let start = self.pos;
		let sign = if self.eat(b'-') { -1 } else { self.eat(b'+'); 1 };
		let hours = self.number().ok_or(ZoneError::InvalidTime(start))?;
		if hours > max_hours {
			return Err(ZoneError::TimeOutOfRange(start));
		}
		let mut total = hours * 3600;
		for scale in [60, 1] {
			if !self.eat(b':') {
				break;
			}
			let at = self.pos;
			let v = self.number().ok_or(ZoneError::InvalidTime(at))?;
			if v > 59 {
				return Err(ZoneError::TimeOutOfRange(at));
			}
			total += v * scale;
		}
		Ok(sign * total as i32)
	}

	/// Read an `Mm.w.d[/time]` transition rule.
	fn transition(&mut self) -> Result<Transition, ZoneError> {
		let start = self.pos;
		if !self.eat(b'M') {
			return Err(ZoneError::UnsupportedRule(start));
		}
		let field = |cursor: &mut Self, dot: bool, range: core::ops::RangeInclusive<u32>| {
			if dot && !cursor.eat(b'.') {
				return Err(ZoneError::UnsupportedRule(cursor.pos));
			}
			let at = cursor.pos;
			match cursor.number() {
				Some(v) if range.contains(&v) => Ok(v as u8),
				Some(_) => Err(ZoneError::DateOutOfRange(at)),
				None => Err(ZoneError::UnsupportedRule(at))
			}
		};
		let month = field(self, false, 1..=12)?;
		let week = field(self, true, 1..=5)?;
		let weekday = field(self, true, 0..=6)?;
		let time = if self.eat(b'/') { self.time(167)? } else { DEFAULT_TRANSITION };

		Ok(Transition { month, week, weekday, time })
	}
}
