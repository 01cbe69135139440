// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"auth_session_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Records how many waiters a refresh cycle released (when enabled).
pub fn record_waiters_released(count: usize) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("auth_session_waiters_released_total").increment(count as u64);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = count;
	}
}
