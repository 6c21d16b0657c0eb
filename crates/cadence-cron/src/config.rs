// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Default heartbeat tick. Small enough to bound scheduling latency without
/// busy-spinning.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(100);

/// What `stop` does with invocations that are already running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBehavior {
	/// Stop scheduling new work, let in-flight invocations finish.
	#[default]
	WaitForInFlight,
	/// Cancel in-flight invocations at stop time, then drain them.
	CancelInFlight,
}

#[derive(Debug, Clone)]
pub struct JobManagerConfig {
	/// Interval between eligibility scans. Bounds how late a due job can
	/// launch.
	pub heartbeat_interval: Duration,
	pub stop_behavior: StopBehavior,
}

impl Default for JobManagerConfig {
	fn default() -> Self {
		Self {
			heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
			stop_behavior: StopBehavior::default(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults() {
		let config = JobManagerConfig::default();
		assert_eq!(config.heartbeat_interval, DEFAULT_HEARTBEAT_INTERVAL);
		assert_eq!(config.stop_behavior, StopBehavior::WaitForInFlight);
	}
}
