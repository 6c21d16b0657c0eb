// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serializable health snapshots derived from per-job run state.
//!
//! The broken/fixed flag is the primary operator-facing signal; raw per-run
//! errors are secondary telemetry carried on the last-run info.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::invocation::{JobStatus, TriggerSource};

/// Derived health of a job, distinct from a single run's pass/fail.
///
/// Transitions are edge-triggered: `Broken` on the first failure after a
/// success (or the initial failure), back to `Healthy` on the next success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
	Healthy,
	Broken,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobHealthStatus {
	pub name: String,
	pub health: HealthState,
	/// Administrative override or the job reporting itself not enabled.
	pub disabled: bool,
	pub running: u32,
	pub consecutive_failures: u32,
	pub next_run: Option<DateTime<Utc>>,
	pub last_run: Option<LastRunInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastRunInfo {
	pub invocation_id: uuid::Uuid,
	pub status: JobStatus,
	pub trigger: TriggerSource,
	pub started_at: DateTime<Utc>,
	pub completed_at: Option<DateTime<Utc>>,
	pub duration_ms: Option<i64>,
	pub error: Option<String>,
}

/// Manager-wide rollup: broken if any job is broken.
#[derive(Debug, Clone, Serialize)]
pub struct JobsHealthStatus {
	pub health: HealthState,
	pub jobs: Vec<JobHealthStatus>,
}

impl JobsHealthStatus {
	pub fn from_jobs(jobs: Vec<JobHealthStatus>) -> Self {
		let health = if jobs.iter().any(|j| j.health == HealthState::Broken) {
			HealthState::Broken
		} else {
			HealthState::Healthy
		};
		Self { health, jobs }
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status(name: &str, health: HealthState) -> JobHealthStatus {
		JobHealthStatus {
			name: name.to_string(),
			health,
			disabled: false,
			running: 0,
			consecutive_failures: 0,
			next_run: None,
			last_run: None,
		}
	}

	#[test]
	fn rollup_is_healthy_when_empty() {
		let rollup = JobsHealthStatus::from_jobs(vec![]);
		assert_eq!(rollup.health, HealthState::Healthy);
	}

	#[test]
	fn rollup_is_broken_when_any_job_is() {
		let rollup = JobsHealthStatus::from_jobs(vec![
			status("a", HealthState::Healthy),
			status("b", HealthState::Broken),
		]);
		assert_eq!(rollup.health, HealthState::Broken);
	}

	#[test]
	fn health_state_serializes_snake_case() {
		assert_eq!(serde_json::to_string(&HealthState::Broken).unwrap(), "\"broken\"");
	}
}
