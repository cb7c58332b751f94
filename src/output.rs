//! Audio output through `cpal`.
//!
//! The device pulls samples from its own thread through a callback, while the scheduler pushes
//! them with blocking calls. The two meet in a bounded queue guarded by a mutex and condition
//! variable: the callback pops what it needs (padding with silence when the queue runs dry) and
//! wakes any caller blocked on free space or on the queue emptying.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Sample;
use tracing::{debug, info, warn};
use crate::cancel::CancelToken;
use crate::sink::{AudioSink, SinkError};

/// How long [`AudioSink::drain`] waits for the device to request more samples before giving up.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// Output device settings.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
	/// Output device name, `None` for the host's default device.
	pub device: Option<String>,
	pub sample_rate: u32,
	/// Frames per device callback.
	pub buffer_frames: u32
}

struct Queue {
	samples: VecDeque<f32>,
	/// First stream error reported by the device, surfaced by the next blocking call.
	error: Option<String>,
	/// Set by cancellation, fails all blocking calls from then on.
	interrupted: bool,
	/// Number of completed device callbacks.
	callbacks: u64
}

/// State shared between the device callback and the writing thread.
struct Shared {
	queue: Mutex<Queue>,
	cond: Condvar,
	capacity: usize,
	stall: Duration
}

impl Shared {
	fn new(capacity: usize, stall: Duration) -> Shared {
		Shared {
			queue: Mutex::new(Queue {
				samples: VecDeque::with_capacity(capacity),
				error: None,
				interrupted: false,
				callbacks: 0
			}),
			cond: Condvar::new(),
			capacity,
			stall
		}
	}

	fn lock(&self) -> MutexGuard<'_, Queue> {
		self.queue.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Fail if cancelled or if the device reported an error.
	fn check(queue: &mut Queue) -> Result<(), SinkError> {
		if queue.interrupted {
			return Err(SinkError::Interrupted);
		}
		match queue.error.take() {
			Some(e) => Err(SinkError::Stream(e)),
			None => Ok(())
		}
	}

	/// Device callback: fill `data` from the queue, then silence.
	fn fill(&self, data: &mut [f32]) {
		let mut queue = self.lock();
		let n = data.len().min(queue.samples.len());
		for (d, s) in data.iter_mut().zip(queue.samples.drain(..n)) {
			*d = s;
		}
		data[n..].fill(f32::EQUILIBRIUM);
		queue.callbacks += 1;
		self.cond.notify_all();
	}

	fn write(&self, mut samples: &[f32]) -> Result<(), SinkError> {
		while !samples.is_empty() {
			let mut queue = self.lock();
			loop {
				Self::check(&mut queue)?;
				if queue.samples.len() < self.capacity {
					break;
				}
				queue = self.cond.wait(queue).unwrap_or_else(PoisonError::into_inner);
			}

			let n = samples.len().min(self.capacity - queue.samples.len());
			queue.samples.extend(&samples[..n]);
			samples = &samples[n..];
		}
		Ok(())
	}

	/// Wait until the queue is empty and one more callback has completed, so the final chunk has
	/// been handed to the device and played out.
	fn drain(&self) -> Result<(), SinkError> {
		let mut queue = self.lock();
		let mut target = None;
		loop {
			Self::check(&mut queue)?;
			match target {
				None if queue.samples.is_empty() => target = Some(queue.callbacks + 1),
				Some(t) if queue.callbacks >= t => return Ok(()),
				_ => ()
			}

			let seen = queue.callbacks;
			let (q, timeout) = self.cond.wait_timeout(queue, self.stall)
				.unwrap_or_else(PoisonError::into_inner);
			queue = q;
			if timeout.timed_out() && queue.callbacks == seen {
				return Err(SinkError::Stream(String::from("device stopped requesting samples")));
			}
		}
	}

	fn flush(&self) {
		self.lock().samples.clear();
		self.cond.notify_all();
	}

	fn interrupt(&self) {
		let mut queue = self.lock();
		queue.samples.clear();
		queue.interrupted = true;
		self.cond.notify_all();
	}

	fn fail(&self, error: String) {
		let mut queue = self.lock();
		if queue.error.is_none() {
			queue.error = Some(error);
		}
		self.cond.notify_all();
	}
}

/// An [`AudioSink`] backed by a `cpal` output stream.
pub struct CpalSink {
	stream: cpal::Stream,
	shared: Arc<Shared>
}

impl CpalSink {
	/// Open and start a single-channel `f32` stream on the configured device.
	///
	/// The stream plays silence until samples are written. Cancelling `cancel` discards queued
	/// samples and wakes any blocked [`AudioSink`] call with [`SinkError::Interrupted`].
	///
	/// # Errors
	///
	/// - [`SinkError::NoDefaultDevice`] or [`SinkError::DeviceNotFound`] if no device matches.
	/// - [`SinkError::Devices`] if output devices cannot be enumerated.
	/// - [`SinkError::Build`] if the device rejects the stream configuration.
	/// - [`SinkError::Play`] if the stream cannot be started.
	pub fn open(config: &SinkConfig, cancel: &CancelToken) -> Result<CpalSink, SinkError> {
		let host = cpal::default_host();
		let device = match &config.device {
			Some(name) => host.output_devices()?
				.find(|d| d.name().is_ok_and(|n| n == *name))
				.ok_or_else(|| SinkError::DeviceNotFound(name.clone()))?,
			None => host.default_output_device().ok_or(SinkError::NoDefaultDevice)?
		};
		let name = device.name().unwrap_or_else(|_| String::from("unknown"));

		let stream_config = cpal::StreamConfig {
			channels: 1,
			sample_rate: cpal::SampleRate(config.sample_rate),
			buffer_size: cpal::BufferSize::Fixed(config.buffer_frames)
		};
		// Half a second of slack between the writer and the device
		let capacity = (config.sample_rate as usize / 2).max(4 * config.buffer_frames as usize);
		let shared = Arc::new(Shared::new(capacity, STALL_TIMEOUT));

		let fill = Arc::clone(&shared);
		let fail = Arc::clone(&shared);
		let stream = device.build_output_stream(
			&stream_config,
			move |data: &mut [f32], _: &cpal::OutputCallbackInfo| fill.fill(data),
			move |e: cpal::StreamError| {
				warn!("audio stream error: {}", e);
				fail.fail(e.to_string());
			},
			None
		)?;
		stream.play()?;

		let interrupt = Arc::clone(&shared);
		cancel.on_cancel(move || interrupt.interrupt());

		info!(
			device = %name,
			rate = config.sample_rate,
			frames = config.buffer_frames,
			"opened audio output"
		);
		Ok(CpalSink { stream, shared })
	}
}

impl AudioSink for CpalSink {
	fn write(&mut self, samples: &[f32]) -> Result<(), SinkError> {
		self.shared.write(samples)
	}

	fn drain(&mut self) -> Result<(), SinkError> {
		self.shared.drain()
	}

	fn flush(&mut self) -> Result<(), SinkError> {
		self.shared.flush();
		Ok(())
	}

	fn close(self) {
		if let Err(e) = self.stream.pause() {
			debug!("failed to pause audio stream: {}", e);
		}
		debug!("closed audio output");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicBool, Ordering};
	use std::thread;

	/// Play `shared` from a background thread, recording everything the device would output.
	fn device(shared: Arc<Shared>, stop: Arc<AtomicBool>) -> thread::JoinHandle<Vec<f32>> {
		thread::spawn(move || {
			let mut played = Vec::new();
			let mut data = [1.0f32; 64];
			while !stop.load(Ordering::SeqCst) {
				shared.fill(&mut data);
				played.extend_from_slice(&data);
				thread::sleep(Duration::from_micros(200));
			}
			played
		})
	}

	#[test]
	fn fill_test() {
		let shared = Shared::new(8, STALL_TIMEOUT);
		shared.write(&[0.5, -0.5, 0.25]).unwrap();

		let mut data = [1.0f32; 5];
		shared.fill(&mut data);
		assert_eq!(data, [0.5, -0.5, 0.25, 0.0, 0.0]);
		assert!(shared.lock().samples.is_empty());
		assert_eq!(shared.lock().callbacks, 1);
	}

	#[test]
	fn write_drain_test() {
		let shared = Arc::new(Shared::new(256, STALL_TIMEOUT));
		let stop = Arc::new(AtomicBool::new(false));
		let handle = device(shared.clone(), stop.clone());

		let samples: Vec<f32> = (1..=5000).map(|i| i as f32).collect();
		shared.write(&samples).unwrap();
		shared.drain().unwrap();
		assert!(shared.lock().samples.is_empty());

		stop.store(true, Ordering::SeqCst);
		let played: Vec<f32> = handle.join().unwrap().into_iter().filter(|s| *s != 0.0).collect();
		assert_eq!(played, samples);
	}

	#[test]
	fn interrupt_test() {
		let shared = Arc::new(Shared::new(4, STALL_TIMEOUT));
		let remote = shared.clone();
		let handle = thread::spawn(move || {
			thread::sleep(Duration::from_millis(20));
			remote.interrupt();
		});

		// Nothing consumes the queue, so this blocks until interrupted
		assert!(matches!(shared.write(&[0.5; 100]), Err(SinkError::Interrupted)));
		assert!(shared.lock().samples.is_empty());
		assert!(matches!(shared.drain(), Err(SinkError::Interrupted)));
		handle.join().unwrap();
	}

	#[test]
	fn error_test() {
		let shared = Shared::new(4, STALL_TIMEOUT);
		shared.fail(String::from("device unplugged"));
		shared.fail(String::from("second error"));
		match shared.write(&[0.5]) {
			Err(SinkError::Stream(e)) => assert_eq!(e, "device unplugged"),
			r => panic!("unexpected result {:?}", r)
		}
		// Reported once
		assert!(shared.write(&[0.5]).is_ok());
	}

	#[test]
	fn flush_test() {
		let shared = Shared::new(8, Duration::from_millis(20));
		shared.write(&[0.5; 8]).unwrap();
		shared.flush();
		assert!(shared.lock().samples.is_empty());

		// Without a device nothing is ever consumed, so draining stalls out
		shared.write(&[0.5]).unwrap();
		assert!(matches!(shared.drain(), Err(SinkError::Stream(_))));
	}
}
