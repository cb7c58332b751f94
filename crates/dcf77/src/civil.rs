//! Civil (wall clock) time as broadcast by DCF77.

use chrono::{Datelike, Timelike};
use crate::zone::Zone;

/// One calendar minute of local civil time, in the units DCF77 transmits.
///
/// All fields are plain integers so that the encoder stays total: out of range values are encoded
/// as well as their bit widths allow rather than rejected.
///
/// # Examples
///
/// ```
/// # use dcf77::{CivilTime, Zone};
/// // Sun, May 26, 2024. 16:58:00 UTC.
/// let t = CivilTime::from_unix(1716742680, &Zone::central_european()).unwrap();
/// assert_eq!(t, CivilTime {
/// 	year: 24,
/// 	month: 5,
/// 	day: 26,
/// 	hour: 18,
/// 	minute: 58,
/// 	weekday: 7,
/// 	dst: true
/// });
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CivilTime {
	/// Year within the century, ranged [0, 99]
	pub year: u8,
	/// Month of the year, ranged [1, 12]
	pub month: u8,
	/// Day of the month, ranged [1, 31]
	pub day: u8,
	/// Hour, ranged [0, 23]
	pub hour: u8,
	/// Minute, ranged [0, 59]
	pub minute: u8,
	/// Day of the week, ranged [1, 7] => [Monday, Sunday]
	pub weekday: u8,
	/// Whether daylight savings time is in effect
	pub dst: bool
}

impl CivilTime {
	/// Convert a Unix timestamp to civil time in `zone`.
	///
	/// Seconds are truncated: every timestamp within a minute maps to the same [`CivilTime`].
	/// Returns `None` if the local time cannot be represented.
	pub fn from_unix(time: i64, zone: &Zone) -> Option<CivilTime> {
		let info = zone.info(time);
		let local = time.checked_add(info.offset as i64)?;
		let date = chrono::DateTime::from_timestamp(local, 0)?.naive_utc();

		Some(CivilTime {
			year: date.year().rem_euclid(100) as u8,
			month: date.month() as u8,
			day: date.day() as u8,
			hour: date.hour() as u8,
			minute: date.minute() as u8,
			weekday: date.weekday().number_from_monday() as u8,
			dst: info.dst
		})
	}
}

impl core::fmt::Display for CivilTime {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(
			f,
			"{:02}-{:02}-{:02} {:02}:{:02}{}",
			self.year,
			self.month,
			self.day,
			self.hour,
			self.minute,
			if self.dst { " DST" } else { "" }
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn from_unix_test() {
		let zone = Zone::central_european();

		// Sun, Mar 31, 2024. 00:59:59 UTC, last second of standard time
		assert_eq!(CivilTime::from_unix(1711846799, &zone), Some(CivilTime {
			year: 24, month: 3, day: 31, hour: 1, minute: 59, weekday: 7, dst: false
		}));
		// One second later the clock jumps from 02:00 to 03:00
		assert_eq!(CivilTime::from_unix(1711846800, &zone), Some(CivilTime {
			year: 24, month: 3, day: 31, hour: 3, minute: 0, weekday: 7, dst: true
		}));

		// Fri, Dec 31, 1999. 23:00:00 UTC => Jan 1, 2000 00:00 CET, a Saturday
		assert_eq!(CivilTime::from_unix(946681200, &zone), Some(CivilTime {
			year: 0, month: 1, day: 1, hour: 0, minute: 0, weekday: 6, dst: false
		}));

		// Seconds are ignored
		assert_eq!(
			CivilTime::from_unix(1716742680, &zone),
			CivilTime::from_unix(1716742739, &zone)
		);

		assert_eq!(CivilTime::from_unix(i64::MAX, &zone), None);
	}

	#[test]
	fn fixed_zone_test() {
		// Mon, Jun 17, 2024. 09:50:07 UTC
		let t = CivilTime::from_unix(1718617807, &Zone::fixed(0)).unwrap();
		assert_eq!(t, CivilTime {
			year: 24, month: 6, day: 17, hour: 9, minute: 50, weekday: 1, dst: false
		});
		assert_eq!(t.to_string(), "24-06-17 09:50");
	}
}
