//! Cooperative cancellation shared between the interrupt handler and the transmit thread.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};
use crate::error::Error;

type Hook = Box<dyn Fn() + Send + Sync>;

struct Inner {
	/// `true` once cancelled.
	flag: Mutex<bool>,
	/// Wakes sleepers on cancellation.
	cond: Condvar,
	/// Cleanup to run on cancellation, registered ahead of time.
	hooks: Mutex<Vec<Hook>>
}

/// A one-shot cancellation flag.
///
/// Clones share the same flag. Once [`CancelToken::cancel`] is called the token stays cancelled,
/// every [`CancelToken::sleep`] returns early, and every registered hook has run exactly once.
///
/// # Examples
///
/// ```
/// # use std::thread;
/// # use std::time::Duration;
/// # use dcf77sync::cancel::CancelToken;
/// let token = CancelToken::new();
/// let remote = token.clone();
/// thread::spawn(move || remote.cancel());
///
/// // Returns as soon as the other thread cancels
/// assert!(!token.sleep(Duration::from_secs(3600)));
/// assert!(token.is_cancelled());
/// ```
#[derive(Clone)]
pub struct CancelToken(Arc<Inner>);

impl Default for CancelToken {
	fn default() -> Self {
		CancelToken(Arc::new(Inner {
			flag: Mutex::new(false),
			cond: Condvar::new(),
			hooks: Mutex::new(Vec::new())
		}))
	}
}

impl core::fmt::Debug for CancelToken {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("CancelToken").field("cancelled", &self.is_cancelled()).finish()
	}
}

impl CancelToken {
	/// Create a token that is not yet cancelled.
	pub fn new() -> CancelToken {
		CancelToken::default()
	}

	/// Whether [`CancelToken::cancel`] has been called on this token or any clone.
	pub fn is_cancelled(&self) -> bool {
		*self.0.flag.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Cancel, wake all sleepers and run all hooks. Only the first call has any effect.
	pub fn cancel(&self) {
		{
			let mut flag = self.0.flag.lock().unwrap_or_else(PoisonError::into_inner);
			if *flag {
				return;
			}
			*flag = true;
			self.0.cond.notify_all();
		}

		let hooks = std::mem::take(&mut *self.0.hooks.lock().unwrap_or_else(PoisonError::into_inner));
		for hook in hooks {
			hook();
		}
	}

	/// Run `hook` on cancellation, or immediately if already cancelled.
	pub fn on_cancel(&self, hook: impl Fn() + Send + Sync + 'static) {
		let mut hooks = self.0.hooks.lock().unwrap_or_else(PoisonError::into_inner);
		if self.is_cancelled() {
			drop(hooks);
			hook();
		} else {
			hooks.push(Box::new(hook));
		}
	}

	/// Block for `duration` or until cancelled. Returns `true` if the full duration elapsed.
	pub fn sleep(&self, duration: Duration) -> bool {
		let deadline = Instant::now() + duration;
		let mut flag = self.0.flag.lock().unwrap_or_else(PoisonError::into_inner);
		while !*flag {
			let now = Instant::now();
			if now >= deadline {
				return true;
			}
			flag = self.0.cond.wait_timeout(flag, deadline - now)
				.unwrap_or_else(PoisonError::into_inner)
				.0;
		}
		false
	}
}

/// Cancel `token` on Ctrl-C or termination.
///
/// Only one handler can be installed per process.
///
/// # Errors
///
/// Returns [`Error::Interrupt`] if the handler cannot be installed, in which case the signal keeps
/// its default action and a run would end without flushing or closing the audio output.
pub fn install_interrupt_handler(token: &CancelToken) -> Result<(), Error> {
	let token = token.clone();
	ctrlc::set_handler(move || token.cancel()).map_err(Error::Interrupt)
}
