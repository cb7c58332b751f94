//! Align an assembled broadcast window with the wall clock and stream it.
//!
//! A run moves through the following states:
//!
//! ```text
//! Idle -> Armed -> Waiting -> Streaming -> Draining -> Done
//!   \        \         \           \            \
//!    +--------+---------+-----------+------------+--> Failed | Cancelled
//! ```
//!
//! - **Idle to Armed**: capture the time, fix the start instant with [`Plan::new`], then encode and
//!   assemble every minute of the window into the playback buffer.
//! - **Armed to Waiting**: open the audio sink, sample the clock again and sleep until the start
//!   instant, see [`Plan::wait`].
//! - **Streaming**: write the buffer from [`Plan::offset`] in one blocking call.
//! - **Draining**: block until the sink has played everything.
//!
//! The frame transmitted during minute M encodes minute M + 1, as the real transmitter does. Its
//! final second (the marker) is the last second of M, so a receiver decodes the time at the exact
//! moment it becomes true.
//!
//! Cancellation is checked at every transition. Once cancelled the sink is flushed and closed but
//! never drained. Any other failure also flushes and closes the sink. The sink is closed exactly
//! once on every path.

use std::time::Duration;
use tracing::{debug, info, warn};
use dcf77::{assemble, encode, CivilTime, PlaybackBuffer, WaveformLibrary, Zone};
use crate::cancel::CancelToken;
use crate::clock::{Clock, TimeSpec};
use crate::error::Error;
use crate::sink::{AudioSink, SinkError};

/// The start instant is rounded up to a whole second, so a wait may exceed the lead by this much.
const ROUNDING: Duration = Duration::from_secs(1);

/// Progress of a run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
	/// Nothing done yet.
	Idle,
	/// Buffer filled and start instant fixed.
	Armed,
	/// Sleeping until the start instant.
	Waiting,
	/// Writing the buffer to the sink.
	Streaming,
	/// Waiting for the sink to play out.
	Draining,
	/// Transmission completed.
	Done,
	/// Stopped by an error.
	Failed,
	/// Stopped by cancellation.
	Cancelled
}

/// Timing parameters of a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
	/// Minutes in the broadcast window.
	pub minutes: usize,
	/// Time from the first clock reading to the start instant, before rounding.
	pub lead: Duration,
	/// Shortest acceptable wait before the start instant.
	pub margin: Duration,
	/// Longest acceptable wait before the start instant, before rounding.
	pub budget: Duration
}

/// Where and when playback starts.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use dcf77sync::clock::TimeSpec;
/// # use dcf77sync::scheduler::Plan;
/// // Sun, May 26, 2024. 16:57:55.4 UTC, with a ten second lead at 44.1 kHz.
/// let plan = Plan::new(TimeSpec::new(1716742675, 400000000), Duration::from_secs(10), 44100);
/// assert_eq!(plan.start, TimeSpec::new(1716742686, 0));
/// assert_eq!(plan.first_minute, 1716742680);
/// assert_eq!(plan.offset, 6 * 44100);
/// // The first frame plays during 16:58 and encodes 16:59
/// assert_eq!(plan.encoded_minute(0), 1716742740);
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plan {
	/// Instant the first sample is played, always on a whole second.
	pub start: TimeSpec,
	/// Start of the wall clock minute containing `start`, in which the first frame plays.
	pub first_minute: i64,
	/// Sample offset of `start` into the buffer.
	pub offset: usize
}

impl Plan {
	/// Plan a transmission starting on the first whole second at least `lead` after `now`.
	pub fn new(now: TimeSpec, lead: Duration, samples_per_second: usize) -> Plan {
		let start = now.add_duration(lead).ceil_second();
		Plan {
			start,
			first_minute: start.minute_start(),
			offset: start.second_of_minute() as usize * samples_per_second
		}
	}

	/// Unix time of the minute encoded by frame `index` of the window.
	pub fn encoded_minute(&self, index: usize) -> i64 {
		self.first_minute + 60 * (index as i64 + 1)
	}

	/// Time left from `now` until the start instant.
	///
	/// # Errors
	///
	/// - [`Error::Overrun`] if less than `margin` is left, including when the start has passed.
	/// - [`Error::ClockSkew`] if more than `budget` (plus rounding) is left, meaning the clock
	///   moved backwards since the plan was made.
	pub fn wait(&self, now: TimeSpec, margin: Duration, budget: Duration) -> Result<Duration, Error> {
		let remaining = self.start.nanos_since(now);
		if remaining < margin.as_nanos() as i128 {
			return Err(Error::Overrun {
				remaining_ms: (remaining / 1_000_000) as i64,
				margin_ms: margin.as_millis() as u64
			});
		}
		if remaining > (budget + ROUNDING).as_nanos() as i128 {
			return Err(Error::ClockSkew {
				wait_ms: (remaining / 1_000_000) as i64,
				budget_ms: budget.as_millis() as u64
			});
		}
		Ok(Duration::from_nanos(remaining as u64))
	}
}

/// Everything a run needs, owned in one place so that every exit path can clean up.
pub struct Scheduler<C: Clock> {
	clock: C,
	zone: Zone,
	library: WaveformLibrary,
	buffer: PlaybackBuffer,
	cancel: CancelToken,
	timing: Timing,
	state: State
}

impl<C: Clock> Scheduler<C> {
	/// Create a scheduler, allocating the playback buffer for the whole window.
	///
	/// # Errors
	///
	/// Returns [`Error::Alloc`] if the buffer cannot be allocated.
	pub fn new(
		clock: C,
		zone: Zone,
		library: WaveformLibrary,
		cancel: CancelToken,
		timing: Timing
	) -> Result<Scheduler<C>, Error> {
		let capacity = PlaybackBuffer::capacity_for(timing.minutes, &library);
		let buffer = PlaybackBuffer::allocate(capacity)?;
		debug!(samples = capacity, "allocated playback buffer");
		Ok(Scheduler { clock, zone, library, buffer, cancel, timing, state: State::Idle })
	}

	pub fn state(&self) -> State {
		self.state
	}

	/// Run one broadcast window, opening the sink with `open` once the buffer is ready.
	///
	/// # Errors
	///
	/// Returns [`Error::Cancelled`] if cancelled, otherwise the first error encountered.
	pub fn run<S, F>(&mut self, open: F) -> Result<(), Error>
	where
		S: AudioSink,
		F: FnOnce(&CancelToken) -> Result<S, SinkError>
	{
		let mut sink = None;
		let result = self.transmit(&mut sink, open);

		if let Some(mut s) = sink.take() {
			if result.is_err() {
				if let Err(e) = s.flush() {
					warn!("failed to flush audio output: {}", e);
				}
			}
			s.close();
		}

		match &result {
			Ok(()) => {
				self.enter(State::Done);
				info!("transmission complete");
			},
			Err(Error::Cancelled) => {
				self.enter(State::Cancelled);
				info!("transmission cancelled");
			},
			Err(_) => self.enter(State::Failed)
		}
		result
	}

	fn transmit<S, F>(&mut self, sink: &mut Option<S>, open: F) -> Result<(), Error>
	where
		S: AudioSink,
		F: FnOnce(&CancelToken) -> Result<S, SinkError>
	{
		self.check()?;
		let plan = Plan::new(self.clock.now()?, self.timing.lead, self.library.samples_per_second());
		info!(
			start = %plan.start,
			second = plan.start.second_of_minute(),
			minutes = self.timing.minutes,
			"planned transmission"
		);
		self.arm(&plan)?;
		self.enter(State::Armed);

		self.check()?;
		let s = sink.insert(open(&self.cancel).map_err(|e| self.sink_error(e))?);

		self.check()?;
		self.enter(State::Waiting);
		let wait = plan.wait(self.clock.now()?, self.timing.margin, self.timing.budget)?;
		info!("transmitting in {} ms", wait.as_millis());
		if !self.clock.sleep(wait, &self.cancel) {
			return Err(Error::Cancelled);
		}

		self.enter(State::Streaming);
		debug!(offset = plan.offset, samples = self.buffer.len() - plan.offset, "streaming");
		let samples = self.buffer.samples_from(plan.offset);
		if let Err(e) = s.write(samples) {
			return Err(self.sink_error(e));
		}

		self.check()?;
		self.enter(State::Draining);
		s.drain().map_err(|e| self.sink_error(e))?;
		Ok(())
	}

	/// Encode and assemble every minute of the window back to back.
	fn arm(&mut self, plan: &Plan) -> Result<(), Error> {
		self.buffer.clear();
		for index in 0..self.timing.minutes {
			self.check()?;
			let minute = plan.encoded_minute(index);
			let time = CivilTime::from_unix(minute, &self.zone).ok_or(Error::TimeRange(minute))?;
			let bits = encode(&time);
			let written = assemble(&bits, &self.library, &mut self.buffer);
			debug!(%time, bits = format_args!("{:#017x}", bits.to_packed()), samples = written, "encoded frame");
		}
		Ok(())
	}

	fn check(&self) -> Result<(), Error> {
		if self.cancel.is_cancelled() {
			Err(Error::Cancelled)
		} else {
			Ok(())
		}
	}

	/// Errors from a sink woken by cancellation are reported as cancellation.
	fn sink_error(&self, e: SinkError) -> Error {
		if self.cancel.is_cancelled() {
			Error::Cancelled
		} else {
			Error::Sink(e)
		}
	}

	fn enter(&mut self, state: State) {
		debug!("{:?} -> {:?}", self.state, state);
		self.state = state;
	}
}
