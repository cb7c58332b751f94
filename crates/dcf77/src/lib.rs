//! Encode and synthesize the DCF77 time signal.
//!
//! This crate turns a civil time into the amplitude modulated bit sequence broadcast by [DCF77]
//! and assembles that sequence into audio samples from a small library of precomputed tone
//! bursts. It does no I/O of its own (except reading and writing waveform tables on request) and
//! knows nothing about wall clocks or audio devices; scheduling the result against real time is
//! up to the caller.
//!
//! The pipeline has four stages:
//! 1. [`civil`]: convert a Unix timestamp into [`CivilTime`] using a [`zone::Zone`] rule,
//!    defaulting to the Central European rule the transmitter uses.
//! 2. [`encoder`]: encode one minute of [`CivilTime`] into a [`BitSequence`] of 60 [`Symbol`]s.
//! 3. [`waveform`]: build (or load) the five [`waveform::Fragment`]s that every second of the
//!    signal is made of.
//! 4. [`assembler`]: append the fragments for each symbol into a [`PlaybackBuffer`].
//!
//! [DCF77]: https://en.wikipedia.org/wiki/DCF77
//!
//! # Examples
//!
//! ```
//! # use dcf77::{assemble, encode, CivilTime, PlaybackBuffer, Tone, WaveformLibrary, Zone};
//! let zone = Zone::central_european();
//! let library = WaveformLibrary::synthesize(&Tone::default());
//!
//! // Sun, May 26, 2024. 18:58 CEST.
//! let time = CivilTime::from_unix(1716742680, &zone).unwrap();
//! let bits = encode(&time);
//! assert_eq!(bits.to_packed(), 0x090BE631B120000);
//!
//! let mut buffer = PlaybackBuffer::allocate(PlaybackBuffer::capacity_for(1, &library)).unwrap();
//! let written = assemble(&bits, &library, &mut buffer);
//! assert_eq!(written, 60 * 44100);
//! ```

pub mod assembler;
pub mod civil;
pub mod encoder;
pub mod waveform;
pub mod zone;

pub use assembler::{assemble, AllocError, PlaybackBuffer};
pub use civil::CivilTime;
pub use encoder::{encode, BitSequence, Symbol, FRAME_LEN};
pub use waveform::{Fragment, FragmentKind, Tone, WaveformError, WaveformLibrary};
pub use zone::{Zone, ZoneError, ZoneInfo};
