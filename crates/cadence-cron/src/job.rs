// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The [`Job`] trait and a closure-backed [`BasicJob`] for jobs that do not
//! warrant a dedicated type.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::JobContext;
use crate::error::Result;
use crate::invocation::JobInvocation;
use crate::schedule::Schedule;

/// A named unit of recurring work.
///
/// Only `name` and `execute` are required. Everything else is an optional
/// capability with a stated default, resolved by the manager at load time:
/// scheduling (`schedule`), deadline enforcement (`timeout`), eligibility
/// (`enabled`), concurrency policy (`serial`), observer fan-out
/// (`trigger_listeners`), log verbosity (`write_output`), and the lifecycle
/// hooks.
///
/// The capability accessors are called from the heartbeat scan and must not
/// block. Lifecycle hooks run synchronously on the invocation's completion
/// path; each dispatch is individually guarded, so a panicking hook is
/// recovered and logged rather than escalated.
#[async_trait]
pub trait Job: Send + Sync + 'static {
	fn name(&self) -> &str;

	async fn execute(&self, ctx: &JobContext) -> Result<()>;

	/// `None` means the job only runs when triggered manually.
	fn schedule(&self) -> Option<Box<dyn Schedule>> {
		None
	}

	/// Deadline for a single invocation. At the deadline the execution future
	/// is dropped and the invocation completes as cancelled.
	fn timeout(&self) -> Option<Duration> {
		None
	}

	/// Whether the job considers itself eligible for scheduled runs. The
	/// heartbeat silently skips jobs reporting `false`; manual triggers
	/// ignore it. Default `true`.
	fn enabled(&self) -> bool {
		true
	}

	/// Whether at most one invocation may run at a time. Default `true`.
	///
	/// When `false`, concurrent invocations of the same job are allowed and
	/// the running flag becomes a counter. Completion order between
	/// concurrent invocations is unspecified, so the broken/fixed health
	/// transitions may interleave arbitrarily for parallel jobs.
	fn serial(&self) -> bool {
		true
	}

	/// Whether manager-level listeners fire for this job's lifecycle events.
	/// The job's own hooks always fire. Default `true`.
	fn trigger_listeners(&self) -> bool {
		true
	}

	/// Whether routine start/complete log lines are emitted for this job.
	/// Failures are always logged. Default `true`.
	fn write_output(&self) -> bool {
		true
	}

	fn on_start(&self, _invocation: &JobInvocation) {}

	fn on_complete(&self, _invocation: &JobInvocation) {}

	fn on_broken(&self, _invocation: &JobInvocation) {}

	fn on_fixed(&self, _invocation: &JobInvocation) {}

	fn on_cancellation(&self, _invocation: &JobInvocation) {}
}

type JobAction = Arc<dyn Fn(JobContext) -> BoxFuture<'static, Result<()>> + Send + Sync>;

/// A job assembled from a name plus an async closure, with optional
/// capability overrides.
///
/// ```no_run
/// use cadence_cron::{BasicJob, Every};
/// use std::time::Duration;
///
/// let job = BasicJob::named("heartbeat-report")
/// 	.with_schedule(Every(Duration::from_secs(60)))
/// 	.with_timeout(Duration::from_secs(10))
/// 	.with_action(|_ctx| async { Ok(()) });
/// ```
pub struct BasicJob {
	name: String,
	schedule: Option<Arc<dyn Schedule>>,
	timeout: Option<Duration>,
	enabled: bool,
	serial: bool,
	write_output: bool,
	action: Option<JobAction>,
}

impl BasicJob {
	/// A job with the given name and a no-op action.
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			schedule: None,
			timeout: None,
			enabled: true,
			serial: true,
			write_output: true,
			action: None,
		}
	}

	pub fn with_action<F, Fut>(mut self, action: F) -> Self
	where
		F: Fn(JobContext) -> Fut + Send + Sync + 'static,
		Fut: Future<Output = Result<()>> + Send + 'static,
	{
		self.action = Some(Arc::new(move |ctx| Box::pin(action(ctx))));
		self
	}

	pub fn with_schedule(mut self, schedule: impl Schedule + 'static) -> Self {
		self.schedule = Some(Arc::new(schedule));
		self
	}

	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn with_serial(mut self, serial: bool) -> Self {
		self.serial = serial;
		self
	}

	pub fn with_write_output(mut self, write_output: bool) -> Self {
		self.write_output = write_output;
		self
	}
}

#[async_trait]
impl Job for BasicJob {
	fn name(&self) -> &str {
		&self.name
	}

	async fn execute(&self, ctx: &JobContext) -> Result<()> {
		match &self.action {
			Some(action) => action(ctx.clone()).await,
			None => Ok(()),
		}
	}

	fn schedule(&self) -> Option<Box<dyn Schedule>> {
		self.schedule.clone().map(|s| Box::new(SharedSchedule(s)) as Box<dyn Schedule>)
	}

	fn timeout(&self) -> Option<Duration> {
		self.timeout
	}

	fn enabled(&self) -> bool {
		self.enabled
	}

	fn serial(&self) -> bool {
		self.serial
	}

	fn write_output(&self) -> bool {
		self.write_output
	}
}

struct SharedSchedule(Arc<dyn Schedule>);

impl Schedule for SharedSchedule {
	fn next_run_time(
		&self,
		previous: Option<chrono::DateTime<chrono::Utc>>,
	) -> Option<chrono::DateTime<chrono::Utc>> {
		self.0.next_run_time(previous)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::invocation::TriggerSource;
	use crate::schedule::Every;
	use uuid::Uuid;

	fn test_context() -> JobContext {
		JobContext {
			invocation_id: Uuid::new_v4(),
			job_name: "basic".to_string(),
			trigger: TriggerSource::Manual,
			cancellation: crate::CancellationToken::new(),
		}
	}

	#[tokio::test]
	async fn default_action_succeeds() {
		let job = BasicJob::named("noop");
		assert_eq!(job.name(), "noop");
		assert!(job.execute(&test_context()).await.is_ok());
	}

	#[tokio::test]
	async fn action_receives_context() {
		let job = BasicJob::named("ctx").with_action(|ctx| async move {
			assert_eq!(ctx.job_name, "basic");
			Ok(())
		});
		job.execute(&test_context()).await.unwrap();
	}

	#[test]
	fn capability_defaults() {
		let job = BasicJob::named("defaults");
		assert!(job.enabled());
		assert!(job.serial());
		assert!(job.trigger_listeners());
		assert!(job.write_output());
		assert!(job.schedule().is_none());
		assert!(job.timeout().is_none());
	}

	#[test]
	fn overrides_stick() {
		let job = BasicJob::named("overridden")
			.with_schedule(Every(Duration::from_secs(5)))
			.with_timeout(Duration::from_secs(1))
			.with_enabled(false)
			.with_serial(false)
			.with_write_output(false);
		assert!(job.schedule().is_some());
		assert_eq!(job.timeout(), Some(Duration::from_secs(1)));
		assert!(!job.enabled());
		assert!(!job.serial());
		assert!(!job.write_output());
	}
}
