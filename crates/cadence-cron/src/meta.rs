// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-job registration record: the job itself, its resolved schedule, the
//! administrative disable flag, and the mutable run-state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::health::{HealthState, JobHealthStatus, LastRunInfo};
use crate::invocation::JobInvocation;
use crate::job::Job;
use crate::schedule::Schedule;

/// Mutable run-state, serialized per-job: the heartbeat loop, `run_job`, and
/// each invocation's completion path can race on the same record.
pub(crate) struct RunState {
	/// Number of in-flight invocations. At most 1 for serial jobs.
	pub running: u32,
	/// When the job is next eligible; `None` retires it from automatic
	/// scheduling.
	pub next_run: Option<DateTime<Utc>>,
	/// The scheduled time consumed by the most recent launch. Feeds the
	/// schedule so intervals stay drift-free.
	pub last_scheduled: Option<DateTime<Utc>>,
	pub last_run: Option<Arc<JobInvocation>>,
	pub consecutive_failures: u32,
	pub health: HealthState,
}

/// One per loaded job; created by `load_job`, destroyed on `unload_job` or
/// manager teardown. The manager is the sole mutator of the wrapped state.
pub struct JobMeta {
	name: String,
	pub(crate) job: Arc<dyn Job>,
	pub(crate) schedule: Option<Box<dyn Schedule>>,
	/// Operator override, independent of the job's own `enabled()`.
	disabled: AtomicBool,
	state: Mutex<RunState>,
}

impl JobMeta {
	pub(crate) fn new(job: Arc<dyn Job>) -> Self {
		let schedule = job.schedule();
		let next_run = schedule.as_ref().and_then(|s| s.next_run_time(None));
		Self {
			name: job.name().to_string(),
			job,
			schedule,
			disabled: AtomicBool::new(false),
			state: Mutex::new(RunState {
				running: 0,
				next_run,
				last_scheduled: None,
				last_run: None,
				consecutive_failures: 0,
				health: HealthState::Healthy,
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	/// True when the job will not be scheduled: either the operator disabled
	/// it or the job reports itself not enabled.
	pub fn is_disabled(&self) -> bool {
		self.disabled.load(Ordering::SeqCst) || !self.job.enabled()
	}

	/// The operator override alone. Manual triggers are refused only on this
	/// flag, never on the job's self-reported `enabled()`.
	pub(crate) fn is_admin_disabled(&self) -> bool {
		self.disabled.load(Ordering::SeqCst)
	}

	pub(crate) fn set_admin_disabled(&self, disabled: bool) {
		self.disabled.store(disabled, Ordering::SeqCst);
	}

	pub fn is_running(&self) -> bool {
		self.run_state().running > 0
	}

	pub fn running_count(&self) -> u32 {
		self.run_state().running
	}

	pub fn health(&self) -> HealthState {
		self.run_state().health
	}

	pub fn consecutive_failures(&self) -> u32 {
		self.run_state().consecutive_failures
	}

	pub fn last_run(&self) -> Option<Arc<JobInvocation>> {
		self.run_state().last_run.clone()
	}

	pub fn next_run(&self) -> Option<DateTime<Utc>> {
		self.run_state().next_run
	}

	/// Point-in-time health snapshot.
	pub fn status(&self) -> JobHealthStatus {
		let state = self.run_state();
		JobHealthStatus {
			name: self.name.clone(),
			health: state.health,
			disabled: self.is_disabled(),
			running: state.running,
			consecutive_failures: state.consecutive_failures,
			next_run: state.next_run,
			last_run: state.last_run.as_deref().map(|run| LastRunInfo {
				invocation_id: run.id,
				status: run.status,
				trigger: run.trigger,
				started_at: run.started_at,
				completed_at: run.completed_at,
				duration_ms: run.elapsed().map(|d| d.num_milliseconds()),
				error: run.error.clone(),
			}),
		}
	}

	// Observer callbacks never run under this lock, so poisoning can only
	// come from an internal bug; recover the guard rather than unwinding.
	pub(crate) fn run_state(&self) -> MutexGuard<'_, RunState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}
}
