//! Wall clock access with nanosecond granularity.

use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;
use libc::{clock_gettime, timespec, CLOCK_REALTIME};
use crate::cancel::CancelToken;
use crate::error::Error;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Unix time with nanosecond granularity.
///
/// # Examples
///
/// ```
/// # use dcf77sync::clock::TimeSpec;
/// // Jan 1, 2025. 12:00:00.999999999 UTC.
/// let c = TimeSpec::new(1735732800, 999999999);
/// assert_eq!(c.add_nanos(10), TimeSpec::new(1735732801, 9));
/// assert_eq!(c.ceil_second(), TimeSpec::new(1735732801, 0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeSpec {
	/// Seconds since the Unix epoch
	pub sec: i64,
	/// Nanoseconds since the beginning of `sec`, ranging [0-999999999]
	pub nsec: i64
}

impl From<timespec> for TimeSpec {
	fn from(value: timespec) -> Self {
		TimeSpec {
			sec: value.tv_sec as i64,
			nsec: value.tv_nsec as i64
		}
	}
}

impl TimeSpec {
	pub const fn new(sec: i64, nsec: i64) -> TimeSpec {
		TimeSpec { sec, nsec }
	}

	/// Add `nanos` (possibly negative), rolling over seconds so that `nsec` stays in range.
	pub const fn add_nanos(self, nanos: i64) -> TimeSpec {
		let total = self.nsec + nanos;
		TimeSpec {
			sec: self.sec + total.div_euclid(NANOS_PER_SEC),
			nsec: total.rem_euclid(NANOS_PER_SEC)
		}
	}

	pub fn add_duration(self, d: Duration) -> TimeSpec {
		TimeSpec {
			sec: self.sec + d.as_secs() as i64,
			nsec: self.nsec
		}.add_nanos(d.subsec_nanos() as i64)
	}

	/// The next whole second at or after `self`.
	pub const fn ceil_second(self) -> TimeSpec {
		if self.nsec == 0 {
			self
		} else {
			TimeSpec { sec: self.sec + 1, nsec: 0 }
		}
	}

	/// Start of the minute containing `self`.
	pub const fn minute_start(self) -> i64 {
		self.sec - self.sec.rem_euclid(60)
	}

	/// Second within the minute, ranged [0, 59]
	pub const fn second_of_minute(self) -> i64 {
		self.sec.rem_euclid(60)
	}

	/// Signed nanoseconds from `earlier` to `self`.
	pub const fn nanos_since(self, earlier: TimeSpec) -> i128 {
		(self.sec - earlier.sec) as i128 * NANOS_PER_SEC as i128 + (self.nsec - earlier.nsec) as i128
	}
}

impl core::fmt::Display for TimeSpec {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		write!(f, "{}.{:09}", self.sec, self.nsec)
	}
}

/// Get the current time with `CLOCK_REALTIME`.
///
/// # Errors
///
/// Returns [`Error::Clock`] with the OS error if `clock_gettime` fails.
pub fn now() -> Result<TimeSpec, Error> {
	let mut time = MaybeUninit::<timespec>::uninit();
	// Safety:
	// - clock_gettime does not read time, only writes
	// - if clock_gettime returns zero, time is successfully initialized
	unsafe {
		match clock_gettime(CLOCK_REALTIME, time.as_mut_ptr()) {
			0 => Ok(time.assume_init().into()),
			_ => Err(Error::Clock(io::Error::last_os_error()))
		}
	}
}

/// Source of wall clock time and of timed waits.
pub trait Clock {
	fn now(&self) -> Result<TimeSpec, Error>;

	/// Sleep for `duration`, waking early if `cancel` fires. Returns `false` if cancelled.
	fn sleep(&self, duration: Duration, cancel: &CancelToken) -> bool {
		cancel.sleep(duration)
	}
}

/// The host's real time clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> Result<TimeSpec, Error> {
		now()
	}
}
