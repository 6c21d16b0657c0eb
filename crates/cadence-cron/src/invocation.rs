// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One execution attempt of a job, with its own identity, timing, and outcome.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// What caused an invocation to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
	/// Launched by the heartbeat loop because the schedule was due.
	Schedule,
	/// Launched by an explicit `run_job`/`run_jobs`/`run_all_jobs` call.
	Manual,
}

impl fmt::Display for TriggerSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Schedule => write!(f, "schedule"),
			Self::Manual => write!(f, "manual"),
		}
	}
}

/// Outcome of an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
	Running,
	Succeeded,
	Failed,
	Cancelled,
}

impl fmt::Display for JobStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Running => write!(f, "running"),
			Self::Succeeded => write!(f, "succeeded"),
			Self::Failed => write!(f, "failed"),
			Self::Cancelled => write!(f, "cancelled"),
		}
	}
}

/// A single execution attempt of a job.
///
/// Owned by the manager for the duration of the run and immutable once
/// completed; observers receive it by shared reference for read access only.
#[derive(Debug, Clone, Serialize)]
pub struct JobInvocation {
	/// Unique per attempt.
	pub id: Uuid,
	pub job_name: String,
	pub trigger: TriggerSource,
	pub started_at: DateTime<Utc>,
	/// `None` while the invocation is still running.
	pub completed_at: Option<DateTime<Utc>>,
	pub status: JobStatus,
	/// `None` on success.
	pub error: Option<String>,
	/// True when the run was cut short by a timeout or a manager stop with
	/// cancellation requested.
	pub cancelled: bool,
}

impl JobInvocation {
	pub(crate) fn begin(job_name: &str, trigger: TriggerSource) -> Self {
		Self {
			id: Uuid::new_v4(),
			job_name: job_name.to_string(),
			trigger,
			started_at: Utc::now(),
			completed_at: None,
			status: JobStatus::Running,
			error: None,
			cancelled: false,
		}
	}

	pub(crate) fn complete(&mut self, status: JobStatus, error: Option<String>, cancelled: bool) {
		self.completed_at = Some(Utc::now());
		self.status = status;
		self.error = error;
		self.cancelled = cancelled;
	}

	pub fn succeeded(&self) -> bool {
		self.status == JobStatus::Succeeded
	}

	/// Wall-clock duration of the run; `None` while still running.
	pub fn elapsed(&self) -> Option<chrono::TimeDelta> {
		self.completed_at.map(|end| end - self.started_at)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn begin_is_running_with_unique_id() {
		let a = JobInvocation::begin("demo", TriggerSource::Manual);
		let b = JobInvocation::begin("demo", TriggerSource::Manual);
		assert_eq!(a.status, JobStatus::Running);
		assert!(a.completed_at.is_none());
		assert!(a.error.is_none());
		assert_ne!(a.id, b.id);
	}

	#[test]
	fn complete_records_outcome() {
		let mut invocation = JobInvocation::begin("demo", TriggerSource::Schedule);
		invocation.complete(JobStatus::Failed, Some("boom".to_string()), false);
		assert_eq!(invocation.status, JobStatus::Failed);
		assert_eq!(invocation.error.as_deref(), Some("boom"));
		assert!(invocation.completed_at.is_some());
		assert!(invocation.elapsed().is_some());
		assert!(!invocation.succeeded());
	}
}
