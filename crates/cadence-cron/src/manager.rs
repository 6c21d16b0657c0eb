// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The job manager: registry, heartbeat loop, invocation launching and
//! supervision, and the public control surface.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{JobManagerConfig, StopBehavior};
use crate::context::{CancellationToken, JobContext};
use crate::error::{CronError, Result};
use crate::health::{HealthState, JobHealthStatus, JobsHealthStatus};
use crate::hooks::{dispatch, panic_message, JobListener, TraceFinisher, Tracer};
use crate::invocation::{JobInvocation, JobStatus, TriggerSource};
use crate::job::Job;
use crate::meta::JobMeta;

/// Owns the registry of loaded jobs, drives the heartbeat loop, launches and
/// supervises invocations, and dispatches observer callbacks.
///
/// Construct one per embedding application; there is no process-wide
/// singleton. Cloning is cheap and shares the same state.
///
/// `start`/`stop` satisfy a graceful-shutdown contract: `stop` returns only
/// after the heartbeat task has fully exited and in-flight invocations have
/// drained per the configured [`StopBehavior`], so an external supervisor can
/// treat the manager as a drainable unit.
#[derive(Clone)]
pub struct JobManager {
	inner: Arc<Inner>,
}

struct Inner {
	config: JobManagerConfig,
	jobs: RwLock<HashMap<String, Arc<JobMeta>>>,
	listeners: RwLock<Vec<Arc<dyn JobListener>>>,
	tracer: RwLock<Option<Arc<dyn Tracer>>>,
	/// Flips to true on stop; the heartbeat loop and (under
	/// `StopBehavior::CancelInFlight`) every invocation watch it.
	shutdown: watch::Sender<bool>,
	started: AtomicBool,
	heartbeat: Mutex<Option<JoinHandle<()>>>,
	inflight: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for JobManager {
	fn default() -> Self {
		Self::new()
	}
}

impl JobManager {
	pub fn new() -> Self {
		Self::with_config(JobManagerConfig::default())
	}

	pub fn with_config(config: JobManagerConfig) -> Self {
		let (shutdown, _) = watch::channel(false);
		Self {
			inner: Arc::new(Inner {
				config,
				jobs: RwLock::new(HashMap::new()),
				listeners: RwLock::new(Vec::new()),
				tracer: RwLock::new(None),
				shutdown,
				started: AtomicBool::new(false),
				heartbeat: Mutex::new(None),
				inflight: Mutex::new(Vec::new()),
			}),
		}
	}

	/// Register an external lifecycle observer. Settable before `start`.
	pub fn with_listener(self, listener: impl JobListener + 'static) -> Self {
		lock_write(&self.inner.listeners).push(Arc::new(listener));
		self
	}

	/// Assign the tracer. Settable before `start`.
	pub fn with_tracer(self, tracer: impl Tracer + 'static) -> Self {
		*lock_write(&self.inner.tracer) = Some(Arc::new(tracer));
		self
	}

	/// Register a job. Fails with [`CronError::DuplicateJob`] if a job with
	/// the same name is already loaded.
	pub fn load_job(&self, job: Arc<dyn Job>) -> Result<()> {
		let name = job.name().to_string();
		let mut jobs = lock_write(&self.inner.jobs);
		if jobs.contains_key(&name) {
			return Err(CronError::DuplicateJob(name));
		}
		let meta = Arc::new(JobMeta::new(job));
		info!(job = %name, scheduled = meta.next_run().is_some(), "job loaded");
		jobs.insert(name, meta);
		Ok(())
	}

	/// Remove a job from the registry. Does not cancel an in-flight
	/// invocation.
	pub fn unload_job(&self, name: &str) -> Result<()> {
		match lock_write(&self.inner.jobs).remove(name) {
			Some(_) => {
				info!(job = %name, "job unloaded");
				Ok(())
			}
			None => Err(CronError::JobNotFound(name.to_string())),
		}
	}

	pub fn job(&self, name: &str) -> Result<Arc<JobMeta>> {
		lock_read(&self.inner.jobs)
			.get(name)
			.cloned()
			.ok_or_else(|| CronError::JobNotFound(name.to_string()))
	}

	pub fn job_names(&self) -> Vec<String> {
		let mut names: Vec<String> = lock_read(&self.inner.jobs).keys().cloned().collect();
		names.sort();
		names
	}

	/// Set the administrative override. Disabling does not cancel an
	/// in-flight invocation; it only gates new launches.
	pub fn disable_job(&self, name: &str) -> Result<()> {
		let meta = self.job(name)?;
		meta.set_admin_disabled(true);
		info!(job = %name, "job disabled");
		Ok(())
	}

	pub fn enable_job(&self, name: &str) -> Result<()> {
		let meta = self.job(name)?;
		meta.set_admin_disabled(false);
		info!(job = %name, "job enabled");
		Ok(())
	}

	/// True when the job will not be scheduled, either because the operator
	/// disabled it or because it reports itself not enabled. Unknown names
	/// are not disabled.
	pub fn is_disabled(&self, name: &str) -> bool {
		lock_read(&self.inner.jobs)
			.get(name)
			.map(|meta| meta.is_disabled())
			.unwrap_or(false)
	}

	pub fn is_running(&self, name: &str) -> bool {
		lock_read(&self.inner.jobs)
			.get(name)
			.map(|meta| meta.is_running())
			.unwrap_or(false)
	}

	/// Launch one ad-hoc invocation regardless of the job's schedule.
	///
	/// Fails for unknown names, administratively disabled jobs, and serial
	/// jobs that are already running. The job's own `enabled()` is ignored:
	/// a manual trigger is an operator request.
	pub fn run_job(&self, name: &str) -> Result<Uuid> {
		let meta = self.job(name)?;
		if meta.is_admin_disabled() {
			return Err(CronError::JobDisabled(name.to_string()));
		}
		self.inner.launch_manual(&meta)
	}

	/// Fan-out of [`run_job`](Self::run_job): each named job launches
	/// independently; failures are collected, never blocking the rest.
	pub fn run_jobs<I, S>(&self, names: I) -> Result<()>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut errors = Vec::new();
		for name in names {
			if let Err(err) = self.run_job(name.as_ref()) {
				errors.push(err);
			}
		}
		match errors.len() {
			0 => Ok(()),
			1 => Err(errors.remove(0)),
			_ => Err(CronError::Many(errors)),
		}
	}

	pub fn run_all_jobs(&self) -> Result<()> {
		self.run_jobs(self.job_names())
	}

	pub fn job_status(&self, name: &str) -> Result<JobHealthStatus> {
		Ok(self.job(name)?.status())
	}

	/// Snapshot of every loaded job's health, with a worst-state rollup.
	pub fn health_report(&self) -> JobsHealthStatus {
		let jobs = lock_read(&self.inner.jobs)
			.values()
			.map(|meta| meta.status())
			.collect();
		JobsHealthStatus::from_jobs(jobs)
	}

	pub fn is_started(&self) -> bool {
		self.inner.started.load(Ordering::SeqCst)
	}

	/// Launch the heartbeat loop. Idempotent; a no-op if already running.
	/// Must be called from within a tokio runtime.
	pub fn start(&self) {
		if self.inner.started.swap(true, Ordering::SeqCst) {
			return;
		}
		self.inner.shutdown.send_replace(false);
		let shutdown_rx = self.inner.shutdown.subscribe();
		let handle = tokio::spawn(run_loop(Arc::clone(&self.inner), shutdown_rx));
		*lock(&self.inner.heartbeat) = Some(handle);
		info!(heartbeat = ?self.inner.config.heartbeat_interval, "job manager started");
	}

	/// Halt the heartbeat loop and drain in-flight invocations.
	///
	/// Returns only after the heartbeat task has fully exited, so a stop can
	/// never race with the next tick, and then after every in-flight
	/// invocation has completed. With [`StopBehavior::CancelInFlight`] the
	/// in-flight invocations are cancelled first; by default they are left
	/// to finish. Idempotent.
	pub async fn stop(&self) {
		if !self.inner.started.swap(false, Ordering::SeqCst) {
			return;
		}
		self.inner.shutdown.send_replace(true);
		let heartbeat = lock(&self.inner.heartbeat).take();
		if let Some(handle) = heartbeat {
			let _ = handle.await;
		}
		let inflight: Vec<JoinHandle<()>> = lock(&self.inner.inflight).drain(..).collect();
		for handle in inflight {
			let _ = handle.await;
		}
		info!("job manager stopped");
	}
}

impl Inner {
	/// One heartbeat tick: launch every eligible job. Launches are
	/// fire-and-forget; the scan never blocks on invocation completion, so a
	/// slow job cannot delay the eligibility check of others.
	fn scan(self: &Arc<Self>, now: DateTime<Utc>) {
		let metas: Vec<Arc<JobMeta>> = lock_read(&self.jobs).values().cloned().collect();
		for meta in metas {
			if meta.is_disabled() {
				continue;
			}
			let claimed = {
				let mut state = meta.run_state();
				if meta.job.serial() && state.running > 0 {
					continue;
				}
				match state.next_run {
					Some(due) if due <= now => {
						state.running += 1;
						state.last_scheduled = Some(due);
						// Feed the prior *scheduled* time back in so interval
						// schedules stay drift-free.
						state.next_run =
							meta.schedule.as_ref().and_then(|s| s.next_run_time(Some(due)));
						true
					}
					_ => false,
				}
			};
			if claimed {
				let invocation = JobInvocation::begin(meta.name(), TriggerSource::Schedule);
				self.spawn_invocation(&meta, invocation);
			}
		}
	}

	fn launch_manual(self: &Arc<Self>, meta: &Arc<JobMeta>) -> Result<Uuid> {
		{
			let mut state = meta.run_state();
			if meta.job.serial() && state.running > 0 {
				return Err(CronError::JobAlreadyRunning(meta.name().to_string()));
			}
			state.running += 1;
		}
		let invocation = JobInvocation::begin(meta.name(), TriggerSource::Manual);
		let id = invocation.id;
		self.spawn_invocation(meta, invocation);
		Ok(id)
	}

	fn spawn_invocation(self: &Arc<Self>, meta: &Arc<JobMeta>, invocation: JobInvocation) {
		let handle = tokio::spawn(run_invocation(
			Arc::clone(self),
			Arc::clone(meta),
			invocation,
		));
		lock(&self.inflight).push(handle);
	}

	fn reap_finished(&self) {
		lock(&self.inflight).retain(|handle| !handle.is_finished());
	}

	fn listeners_snapshot(&self) -> Vec<Arc<dyn JobListener>> {
		lock_read(&self.listeners).clone()
	}

	fn tracer_snapshot(&self) -> Option<Arc<dyn Tracer>> {
		lock_read(&self.tracer).clone()
	}

	/// Dispatch one lifecycle hook to the job itself and, when the job's
	/// `trigger_listeners` capability allows, to every manager listener.
	/// Each call is individually guarded.
	fn notify(
		&self,
		job: &Arc<dyn Job>,
		fan_out: bool,
		invocation: &JobInvocation,
		hook: &'static str,
		job_hook: impl Fn(&dyn Job, &JobInvocation),
		listener_hook: impl Fn(&dyn JobListener, &JobInvocation),
	) {
		dispatch(&invocation.job_name, hook, || {
			job_hook(job.as_ref(), invocation)
		});
		if fan_out {
			for listener in self.listeners_snapshot() {
				dispatch(&invocation.job_name, hook, || {
					listener_hook(listener.as_ref(), invocation)
				});
			}
		}
	}
}

/// The heartbeat loop. Suspends only on its own tick timer and the stop
/// signal.
async fn run_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>) {
	let mut ticker = tokio::time::interval(inner.config.heartbeat_interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			_ = ticker.tick() => {
				inner.scan(Utc::now());
				inner.reap_finished();
			}
			changed = shutdown.changed() => {
				if changed.is_err() || *shutdown.borrow() {
					break;
				}
			}
		}
	}
	info!("job manager heartbeat exited");
}

enum Outcome {
	Completed(Result<()>),
	Panicked(String),
	TimedOut(Duration),
	Stopped,
}

/// Execute the job under the invocation guard: panics are intercepted here
/// and only here, a declared timeout forcibly cancels at deadline, and a
/// manager stop with cancellation requested aborts the run.
async fn execute_guarded(job: &Arc<dyn Job>, ctx: &JobContext, inner: &Inner) -> Outcome {
	let timeout = job.timeout();
	let deadline = async {
		match timeout {
			Some(after) => {
				tokio::time::sleep(after).await;
				after
			}
			None => std::future::pending().await,
		}
	};
	let stop_requested = async {
		match inner.config.stop_behavior {
			StopBehavior::CancelInFlight => {
				let mut rx = inner.shutdown.subscribe();
				if rx.wait_for(|stopping| *stopping).await.is_err() {
					std::future::pending::<()>().await;
				}
			}
			StopBehavior::WaitForInFlight => std::future::pending().await,
		}
	};
	let execution = AssertUnwindSafe(job.execute(ctx)).catch_unwind();

	tokio::select! {
		result = execution => match result {
			Ok(outcome) => Outcome::Completed(outcome),
			Err(payload) => Outcome::Panicked(panic_message(payload)),
		},
		after = deadline => {
			ctx.cancellation.cancel();
			Outcome::TimedOut(after)
		}
		_ = stop_requested => {
			ctx.cancellation.cancel();
			Outcome::Stopped
		}
	}
}

/// The full life of one invocation: observer start dispatch, guarded
/// execution, run-state update, completion dispatch. Runs as its own task.
async fn run_invocation(inner: Arc<Inner>, meta: Arc<JobMeta>, mut invocation: JobInvocation) {
	let job = Arc::clone(&meta.job);
	let fan_out = job.trigger_listeners();
	let write_output = job.write_output();
	let ctx = JobContext {
		invocation_id: invocation.id,
		job_name: invocation.job_name.clone(),
		trigger: invocation.trigger,
		cancellation: CancellationToken::new(),
	};

	if write_output {
		info!(
			job = %invocation.job_name,
			invocation = %invocation.id,
			trigger = %invocation.trigger,
			"job started"
		);
	}

	inner.notify(
		&job,
		fan_out,
		&invocation,
		"on_start",
		|j, i| j.on_start(i),
		|l, i| l.on_start(i),
	);

	let finisher: Option<Box<dyn TraceFinisher>> = inner.tracer_snapshot().and_then(|tracer| {
		match catch_unwind(AssertUnwindSafe(|| tracer.start(&invocation))) {
			Ok(finisher) => Some(finisher),
			Err(_) => {
				warn!(job = %invocation.job_name, "tracer start panicked; ignoring");
				None
			}
		}
	});

	let outcome = execute_guarded(&job, &ctx, &inner).await;

	let (status, error, cancelled) = match outcome {
		Outcome::Completed(Ok(())) => (JobStatus::Succeeded, None, false),
		Outcome::Completed(Err(err)) => (JobStatus::Failed, Some(err.to_string()), false),
		Outcome::Panicked(message) => (
			JobStatus::Failed,
			Some(CronError::Panicked(message).to_string()),
			false,
		),
		Outcome::TimedOut(after) => (
			JobStatus::Cancelled,
			Some(CronError::TimedOut(after).to_string()),
			true,
		),
		Outcome::Stopped => (
			JobStatus::Cancelled,
			Some(CronError::Cancelled.to_string()),
			true,
		),
	};
	invocation.complete(status, error, cancelled);
	let invocation = Arc::new(invocation);

	// Run-state update and health-edge detection, serialized per job.
	// Cancelled runs are not evidence about job health: they touch neither
	// the failure counter nor the flag.
	let (went_broken, went_fixed) = {
		let mut state = meta.run_state();
		state.running = state.running.saturating_sub(1);
		state.last_run = Some(Arc::clone(&invocation));
		match status {
			JobStatus::Succeeded => {
				state.consecutive_failures = 0;
				if state.health == HealthState::Broken {
					state.health = HealthState::Healthy;
					(false, true)
				} else {
					(false, false)
				}
			}
			JobStatus::Failed => {
				state.consecutive_failures += 1;
				if state.health == HealthState::Healthy {
					state.health = HealthState::Broken;
					(true, false)
				} else {
					(false, false)
				}
			}
			JobStatus::Cancelled | JobStatus::Running => (false, false),
		}
	};

	let duration_ms = invocation.elapsed().map(|d| d.num_milliseconds());
	match status {
		JobStatus::Succeeded => {
			if write_output {
				info!(
					job = %invocation.job_name,
					invocation = %invocation.id,
					duration_ms,
					"job completed"
				);
			}
		}
		JobStatus::Failed => {
			error!(
				job = %invocation.job_name,
				invocation = %invocation.id,
				duration_ms,
				error = invocation.error.as_deref().unwrap_or(""),
				"job failed"
			);
		}
		JobStatus::Cancelled => {
			warn!(
				job = %invocation.job_name,
				invocation = %invocation.id,
				duration_ms,
				error = invocation.error.as_deref().unwrap_or(""),
				"job cancelled"
			);
		}
		JobStatus::Running => {}
	}

	inner.notify(
		&job,
		fan_out,
		&invocation,
		"on_complete",
		|j, i| j.on_complete(i),
		|l, i| l.on_complete(i),
	);
	if went_broken {
		warn!(
			job = %invocation.job_name,
			failures = meta.consecutive_failures(),
			"job broken"
		);
		inner.notify(
			&job,
			fan_out,
			&invocation,
			"on_broken",
			|j, i| j.on_broken(i),
			|l, i| l.on_broken(i),
		);
	}
	if went_fixed {
		info!(job = %invocation.job_name, "job fixed");
		inner.notify(
			&job,
			fan_out,
			&invocation,
			"on_fixed",
			|j, i| j.on_fixed(i),
			|l, i| l.on_fixed(i),
		);
	}
	if invocation.cancelled {
		inner.notify(
			&job,
			fan_out,
			&invocation,
			"on_cancellation",
			|j, i| j.on_cancellation(i),
			|l, i| l.on_cancellation(i),
		);
	}

	// Tracer finish goes last, always, even when a listener above panicked.
	if let Some(finisher) = finisher {
		if catch_unwind(AssertUnwindSafe(|| finisher.finish(&invocation))).is_err() {
			warn!(job = %invocation.job_name, "tracer finish panicked; ignoring");
		}
	}
}

fn lock<'a, T>(mutex: &'a Mutex<T>) -> MutexGuard<'a, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn lock_read<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockReadGuard<'a, T> {
	lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn lock_write<'a, T>(lock: &'a RwLock<T>) -> std::sync::RwLockWriteGuard<'a, T> {
	lock.write().unwrap_or_else(PoisonError::into_inner)
}
