//! Session lifecycle notifications.

// self
use crate::{_prelude::*, error::RefreshError};

/// Why a session ended.
#[derive(Clone, Debug)]
pub enum TerminationCause {
	/// The refresh call of cycle `cycle` failed.
	RefreshFailed {
		/// Refresh cycle that failed.
		cycle: u64,
		/// Failure reported by the refresh endpoint or its transport.
		error: Arc<RefreshError>,
	},
	/// The application logged the session out.
	LoggedOut,
}

/// Notification delivered to [`SessionObserver::on_terminated`].
#[derive(Clone, Debug)]
pub struct SessionTermination {
	/// Why the session ended.
	pub cause: TerminationCause,
	/// Instant the termination was recorded.
	pub at: OffsetDateTime,
}
impl SessionTermination {
	/// Creates a termination record stamped with the current instant.
	pub fn new(cause: TerminationCause) -> Self {
		Self { cause, at: OffsetDateTime::now_utc() }
	}
}

/// Receives session-terminated events, typically to route the application to an
/// unauthenticated view.
///
/// Invoked exactly once per failed refresh cycle and once per explicit logout, after the
/// credential store has been cleared.
pub trait SessionObserver
where
	Self: Send + Sync,
{
	/// Called when the session ends.
	fn on_terminated(&self, termination: &SessionTermination);
}

/// Observer that only logs terminations (through `tracing` when enabled).
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingObserver;
impl SessionObserver for LoggingObserver {
	fn on_terminated(&self, termination: &SessionTermination) {
		#[cfg(feature = "tracing")]
		{
			match &termination.cause {
				TerminationCause::RefreshFailed { cycle, error } => tracing::warn!(
					cycle = *cycle,
					error = %error,
					"Session terminated after a failed refresh."
				),
				TerminationCause::LoggedOut => tracing::info!("Session logged out."),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = termination;
		}
	}
}

/// Observer adapter around a closure.
pub struct CallbackObserver<F>(F);
impl<F> CallbackObserver<F>
where
	F: Fn(&SessionTermination) + Send + Sync,
{
	/// Wraps `callback`.
	pub fn new(callback: F) -> Self {
		Self(callback)
	}
}
impl<F> SessionObserver for CallbackObserver<F>
where
	F: Fn(&SessionTermination) + Send + Sync,
{
	fn on_terminated(&self, termination: &SessionTermination) {
		(self.0)(termination)
	}
}
impl<F> Debug for CallbackObserver<F> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("CallbackObserver(..)")
	}
}
