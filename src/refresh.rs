//! Single-flight access token refresh with waiter release and deterministic session teardown.
//!
//! Every request that observes an expired credential hands its [`PendingRequest`] to
//! [`RefreshCoordinator::handle_expired`]. The first caller to arrive while the coordinator is
//! idle becomes the leader of a new refresh cycle and performs the one and only
//! [`AuthServer::perform_refresh`] call of that cycle; everybody arriving while the cycle runs
//! registers a one-shot waiter and suspends. When the refresh resolves, the leader resets the
//! phase and broadcasts the outcome to every registered waiter inside a single critical
//! section, so late arrivals always observe `Idle` and start a fresh cycle of their own.
//!
//! A failed refresh terminates the session exactly once per cycle: the credential store is
//! cleared, every waiter receives [`AuthFailure::RefreshFailed`], and the
//! [`SessionObserver`] is notified.

mod metrics;
mod server;

pub use metrics::RefreshMetrics;
pub use server::*;

// std
use std::mem;
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	error::{AuthFailure, RefreshError},
	http::{ApiRequest, ApiResponse},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::{SessionObserver, SessionTermination, TerminationCause},
	store::CredentialStore,
};

/// A captured request that can be replayed once after a successful refresh.
#[derive(Clone, Debug)]
pub struct PendingRequest {
	/// The request as the caller issued it, before signing.
	pub request: ApiRequest,
	/// Set once the request has been replayed after a refresh.
	pub retried: bool,
}
impl PendingRequest {
	/// Captures `request` for a first attempt.
	pub fn new(request: ApiRequest) -> Self {
		Self { request, retried: false }
	}
}

/// Coordinator phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No refresh is running; the next expired request becomes a leader.
	Idle,
	/// A leader is refreshing; expired requests register as waiters.
	Refreshing {
		/// Cycle the running refresh belongs to.
		cycle: u64,
	},
}

/// Outcome broadcast to every waiter of a refresh cycle.
#[derive(Clone, Debug)]
pub enum RefreshOutcome {
	/// The credential was refreshed; replay the request.
	Refreshed {
		/// Cycle that produced the outcome.
		cycle: u64,
	},
	/// The refresh call failed and the session was terminated.
	Failed {
		/// Cycle that produced the outcome.
		cycle: u64,
		/// Failure reported by the refresh endpoint.
		error: Arc<RefreshError>,
	},
	/// The leader was cancelled before publishing a result; waiters start over.
	Abandoned {
		/// Cycle that produced the outcome.
		cycle: u64,
	},
	/// The session was logged out while the cycle was running.
	LoggedOut {
		/// Cycle that produced the outcome.
		cycle: u64,
	},
}
impl RefreshOutcome {
	/// Cycle the outcome belongs to.
	pub fn cycle(&self) -> u64 {
		match self {
			Self::Refreshed { cycle }
			| Self::Failed { cycle, .. }
			| Self::Abandoned { cycle }
			| Self::LoggedOut { cycle } => *cycle,
		}
	}
}

#[derive(Debug)]
struct RefreshState {
	phase: RefreshPhase,
	waiters: Vec<oneshot::Sender<RefreshOutcome>>,
	last_cycle: u64,
	terminated_cycle: Option<u64>,
}
impl RefreshState {
	fn enroll(&mut self) -> Role {
		match self.phase {
			RefreshPhase::Idle => {
				self.last_cycle += 1;
				self.phase = RefreshPhase::Refreshing { cycle: self.last_cycle };

				Role::Leader { cycle: self.last_cycle }
			},
			RefreshPhase::Refreshing { cycle } => {
				let (tx, rx) = oneshot::channel();

				// Cancelled callers dropped their receivers; forget them.
				self.waiters.retain(|waiter| !waiter.is_canceled());
				self.waiters.push(tx);

				Role::Waiter { cycle, rx }
			},
		}
	}

	/// Resets the phase and hands `outcome` to every registered waiter in one step.
	///
	/// Returns `None` when the cycle was already released (e.g. by a logout), otherwise the
	/// number of waiters that received the outcome.
	fn release(&mut self, outcome: RefreshOutcome) -> Option<usize> {
		if self.phase != (RefreshPhase::Refreshing { cycle: outcome.cycle() }) {
			return None;
		}

		self.phase = RefreshPhase::Idle;

		let waiters = mem::take(&mut self.waiters);
		let mut delivered = 0;

		for waiter in waiters {
			if waiter.send(outcome.clone()).is_ok() {
				delivered += 1;
			}
		}

		Some(delivered)
	}

	fn is_current(&self, cycle: u64) -> bool {
		self.phase == RefreshPhase::Refreshing { cycle }
	}

	fn claim_termination(&mut self, cycle: u64) -> bool {
		if self.terminated_cycle.is_some_and(|terminated| terminated >= cycle) {
			return false;
		}

		self.terminated_cycle = Some(cycle);

		true
	}
}
impl Default for RefreshState {
	fn default() -> Self {
		Self {
			phase: RefreshPhase::Idle,
			waiters: Vec::new(),
			last_cycle: 0,
			terminated_cycle: None,
		}
	}
}

enum Role {
	Leader { cycle: u64 },
	Waiter { cycle: u64, rx: oneshot::Receiver<RefreshOutcome> },
}

/// Releases waiters with [`RefreshOutcome::Abandoned`] if the leader future is dropped before
/// it publishes an outcome.
struct LeaderGuard<'a> {
	coordinator: &'a RefreshCoordinator,
	cycle: u64,
	armed: bool,
}
impl LeaderGuard<'_> {
	fn release(mut self, outcome: RefreshOutcome) -> Option<usize> {
		self.armed = false;

		self.coordinator.release(outcome)
	}
}
impl Drop for LeaderGuard<'_> {
	fn drop(&mut self) {
		if !self.armed {
			return;
		}
		if self.coordinator.release(RefreshOutcome::Abandoned { cycle: self.cycle }).is_some() {
			self.coordinator.metrics.record_abandoned();

			#[cfg(feature = "tracing")]
			tracing::warn!(cycle = self.cycle, "Refresh leader dropped before finishing.");
		}
	}
}

/// Owns the refresh state of one session and arbitrates between leaders and waiters.
pub struct RefreshCoordinator {
	store: Arc<dyn CredentialStore>,
	server: Arc<dyn AuthServer>,
	observer: RwLock<Arc<dyn SessionObserver>>,
	state: Mutex<RefreshState>,
	metrics: Arc<RefreshMetrics>,
}
impl RefreshCoordinator {
	/// Creates an idle coordinator for one session.
	pub fn new(
		store: Arc<dyn CredentialStore>,
		server: Arc<dyn AuthServer>,
		observer: Arc<dyn SessionObserver>,
	) -> Self {
		Self {
			store,
			server,
			observer: RwLock::new(observer),
			state: Default::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the observer notified on session termination.
	///
	/// Takes effect for every client sharing this coordinator, including a cycle already running.
	pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
		*self.observer.write() = observer;
	}

	/// Current phase.
	pub fn phase(&self) -> RefreshPhase {
		self.state.lock().phase
	}

	/// Number of waiters currently registered for the running cycle.
	pub fn waiting(&self) -> usize {
		self.state.lock().waiters.iter().filter(|waiter| !waiter.is_canceled()).count()
	}

	/// Refresh counters for this coordinator.
	pub fn metrics(&self) -> &Arc<RefreshMetrics> {
		&self.metrics
	}

	/// Resolves an expired-credential response for `pending`.
	///
	/// Returns `Ok(())` once the credential has been refreshed and `pending` is marked as
	/// retried; the caller then replays the request exactly once. Fails with
	/// [`Error::AuthenticationFailed`] when `pending` was already replayed, when the refresh
	/// cycle failed, or when the session was logged out meanwhile.
	pub async fn handle_expired(
		&self,
		pending: &mut PendingRequest,
		response: &ApiResponse,
	) -> Result<()> {
		if pending.retried {
			#[cfg(feature = "tracing")]
			tracing::debug!(
				url = %pending.request.url,
				status = response.status.as_u16(),
				"Credential expired again after a replay."
			);

			return Err(Error::auth(AuthFailure::AlreadyRetried));
		}

		#[cfg(not(feature = "tracing"))]
		let _ = response;

		loop {
			let role = self.state.lock().enroll();
			let outcome = match role {
				Role::Leader { cycle } => {
					#[cfg(feature = "tracing")]
					tracing::debug!(cycle, url = %pending.request.url, "Leading refresh cycle.");

					self.lead(cycle).await
				},
				Role::Waiter { cycle, rx } => {
					#[cfg(feature = "tracing")]
					tracing::debug!(cycle, url = %pending.request.url, "Waiting on refresh cycle.");

					match self.wait(cycle, rx).await {
						Some(RefreshOutcome::Abandoned { .. }) => continue,
						Some(outcome) => outcome,
						None => return Err(Error::auth(AuthFailure::Abandoned)),
					}
				},
			};

			return Self::settle(pending, outcome);
		}
	}

	/// Clears the session: releases any waiters with [`AuthFailure::LoggedOut`], clears the
	/// credential store, and notifies the observer.
	pub async fn logout(&self) -> Result<()> {
		let released = {
			let mut state = self.state.lock();
			let phase = state.phase;

			match phase {
				RefreshPhase::Refreshing { cycle } =>
					state.release(RefreshOutcome::LoggedOut { cycle }),
				RefreshPhase::Idle => None,
			}
		};

		if let Some(count) = released {
			self.metrics.record_released(count);
		}

		self.store.clear().await?;
		self.notify(TerminationCause::LoggedOut);

		Ok(())
	}

	async fn lead(&self, cycle: u64) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "lead").with_cycle(cycle);
		let guard = LeaderGuard { coordinator: self, cycle, armed: true };

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		self.metrics.record_attempt();

		let outcome = match span.instrument(self.refresh_credential(cycle)).await {
			Ok(()) => {
				self.metrics.record_success();
				obs::record_flow_outcome(KIND, FlowOutcome::Success);

				RefreshOutcome::Refreshed { cycle }
			},
			Err(err) => {
				let error = Arc::new(err);

				self.metrics.record_failure();
				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				let current = self.state.lock().is_current(cycle);

				// Clear before release so nobody replays against a rejected session.
				if current {
					self.clear_store().await;
				}

				RefreshOutcome::Failed { cycle, error }
			},
		};

		let Some(released) = guard.release(outcome.clone()) else {
			return RefreshOutcome::LoggedOut { cycle };
		};

		self.metrics.record_released(released);

		#[cfg(feature = "tracing")]
		tracing::debug!(cycle, released, "Refresh cycle released its waiters.");

		if let RefreshOutcome::Failed { error, .. } = &outcome {
			self.terminate(cycle, error.clone());
		}

		outcome
	}

	async fn refresh_credential(&self, cycle: u64) -> Result<(), RefreshError> {
		let current = self.store.current().await?;

		let RefreshedCredential::Issued(credential) = self.server.perform_refresh(current).await?
		else {
			return Ok(());
		};
		// A logout during the refresh call owns the store now.
		let still_current = self.state.lock().is_current(cycle);

		if !still_current {
			return Ok(());
		}

		self.store.replace(credential).await?;

		// A logout may have cleared the store while the write was in flight; undo the write.
		let still_current = self.state.lock().is_current(cycle);

		if !still_current {
			#[cfg(feature = "tracing")]
			tracing::debug!(cycle, "Discarding a credential written after logout.");

			self.clear_store().await;
		}

		Ok(())
	}

	async fn wait(
		&self,
		cycle: u64,
		rx: oneshot::Receiver<RefreshOutcome>,
	) -> Option<RefreshOutcome> {
		const KIND: FlowKind = FlowKind::Wait;

		let span = FlowSpan::new(KIND, "await_release").with_cycle(cycle);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		match span.instrument(rx).await {
			Ok(outcome) => {
				let flow_outcome = match outcome {
					RefreshOutcome::Refreshed { .. } => FlowOutcome::Success,
					_ => FlowOutcome::Failure,
				};

				obs::record_flow_outcome(KIND, flow_outcome);

				Some(outcome)
			},
			Err(oneshot::Canceled) => {
				// Every exit path of a leader publishes an outcome before dropping senders.
				if cfg!(debug_assertions) {
					panic!("Refresh cycle {cycle} dropped a waiter without an outcome.");
				}

				obs::record_flow_outcome(KIND, FlowOutcome::Failure);

				None
			},
		}
	}

	fn settle(pending: &mut PendingRequest, outcome: RefreshOutcome) -> Result<()> {
		match outcome {
			RefreshOutcome::Refreshed { .. } => {
				pending.retried = true;

				Ok(())
			},
			RefreshOutcome::Failed { error, .. } =>
				Err(Error::auth(AuthFailure::RefreshFailed(error))),
			RefreshOutcome::Abandoned { .. } => Err(Error::auth(AuthFailure::Abandoned)),
			RefreshOutcome::LoggedOut { .. } => Err(Error::auth(AuthFailure::LoggedOut)),
		}
	}

	fn release(&self, outcome: RefreshOutcome) -> Option<usize> {
		self.state.lock().release(outcome)
	}

	async fn clear_store(&self) {
		if let Err(err) = self.store.clear().await {
			#[cfg(feature = "tracing")]
			tracing::error!(error = %err, "Failed to clear credentials of a terminated session.");
			#[cfg(not(feature = "tracing"))]
			let _ = err;
		}
	}

	fn terminate(&self, cycle: u64, error: Arc<RefreshError>) {
		if !self.state.lock().claim_termination(cycle) {
			return;
		}

		self.metrics.record_termination();
		self.notify(TerminationCause::RefreshFailed { cycle, error });
	}

	fn notify(&self, cause: TerminationCause) {
		// Observers may swap themselves out from the callback.
		let observer = self.observer.read().clone();

		observer.on_terminated(&SessionTermination::new(cause));
	}
}
impl Debug for RefreshCoordinator {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = self.state.lock();

		f.debug_struct("RefreshCoordinator")
			.field("phase", &state.phase)
			.field("waiters", &state.waiters.len())
			.field("last_cycle", &state.last_cycle)
			.finish()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn idle_state_elects_one_leader_then_queues_waiters() {
		let mut state = RefreshState::default();

		assert!(matches!(state.enroll(), Role::Leader { cycle: 1 }));

		let Role::Waiter { cycle, rx: _rx } = state.enroll() else {
			panic!("Second enrollment during a cycle should become a waiter.");
		};

		assert_eq!(cycle, 1);
		assert_eq!(state.waiters.len(), 1);
	}

	#[test]
	fn release_broadcasts_once_and_resets_phase() {
		let mut state = RefreshState::default();
		let _leader = state.enroll();
		let Role::Waiter { rx: mut first, .. } = state.enroll() else {
			panic!("Expected a waiter.");
		};
		let Role::Waiter { rx: mut second, .. } = state.enroll() else {
			panic!("Expected a waiter.");
		};

		assert_eq!(state.release(RefreshOutcome::Refreshed { cycle: 1 }), Some(2));
		assert_eq!(state.phase, RefreshPhase::Idle);
		assert!(state.waiters.is_empty());
		assert!(matches!(first.try_recv(), Ok(Some(RefreshOutcome::Refreshed { cycle: 1 }))));
		assert!(matches!(second.try_recv(), Ok(Some(RefreshOutcome::Refreshed { cycle: 1 }))));
		// A stale leader cannot release a cycle twice.
		assert_eq!(state.release(RefreshOutcome::Refreshed { cycle: 1 }), None);
		assert!(matches!(state.enroll(), Role::Leader { cycle: 2 }));
	}

	#[test]
	fn cancelled_waiters_are_pruned_and_skipped() {
		let mut state = RefreshState::default();
		let _leader = state.enroll();
		let Role::Waiter { rx: cancelled, .. } = state.enroll() else {
			panic!("Expected a waiter.");
		};

		drop(cancelled);

		let Role::Waiter { rx: mut live, .. } = state.enroll() else {
			panic!("Expected a waiter.");
		};

		assert_eq!(state.waiters.len(), 1);
		assert_eq!(state.release(RefreshOutcome::Refreshed { cycle: 1 }), Some(1));
		assert!(matches!(live.try_recv(), Ok(Some(RefreshOutcome::Refreshed { .. }))));
	}

	#[test]
	fn termination_is_claimed_once_per_cycle() {
		let mut state = RefreshState::default();

		assert!(state.claim_termination(1));
		assert!(!state.claim_termination(1));
		assert!(state.claim_termination(2));
	}
}
