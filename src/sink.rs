//! The audio output seen by the scheduler.
//!
//! The scheduler only needs four blocking primitives from an output device. Keeping them behind
//! [`AudioSink`] lets tests drive the scheduler with a recording sink instead of real hardware;
//! the device implementation lives in [`crate::output`].

use thiserror::Error;

/// The error type for audio output.
#[derive(Debug, Error)]
pub enum SinkError {
	#[error("no default output device")]
	NoDefaultDevice,
	/// No output device has the requested name.
	#[error("output device {0:?} not found")]
	DeviceNotFound(String),
	#[error("failed to enumerate output devices")]
	Devices(#[from] cpal::DevicesError),
	#[error("failed to build output stream")]
	Build(#[from] cpal::BuildStreamError),
	#[error("failed to start output stream")]
	Play(#[from] cpal::PlayStreamError),
	/// The device reported an error while streaming.
	#[error("output stream failed: {0}")]
	Stream(String),
	/// A blocking call was woken by cancellation before it completed.
	#[error("interrupted")]
	Interrupted
}

/// A blocking, single-channel `f32` audio output.
pub trait AudioSink {
	/// Queue `samples` for output, blocking until all of them have been accepted.
	fn write(&mut self, samples: &[f32]) -> Result<(), SinkError>;

	/// Block until every queued sample has been played.
	fn drain(&mut self) -> Result<(), SinkError>;

	/// Discard queued samples without playing them.
	fn flush(&mut self) -> Result<(), SinkError>;

	/// Stop output and release the device.
	fn close(self);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_test() {
		assert_eq!(SinkError::NoDefaultDevice.to_string(), "no default output device");
		assert_eq!(
			SinkError::DeviceNotFound(String::from("hw:1")).to_string(),
			"output device \"hw:1\" not found"
		);
		assert_eq!(SinkError::Stream(String::from("underrun")).to_string(), "output stream failed: underrun");
	}
}
