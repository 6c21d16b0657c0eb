// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the job scheduler.

use std::time::Duration;

use thiserror::Error;

/// Result type for scheduler operations.
pub type Result<T> = std::result::Result<T, CronError>;

/// Errors that can occur in scheduler operations.
///
/// Control-surface calls (`load_job`, `run_job`, enable/disable, lookup)
/// return these synchronously. Execution outcomes (`Panicked`, `TimedOut`,
/// `Cancelled`, `Failed`) never propagate to control-surface callers; they
/// are recorded on the [`JobInvocation`](crate::JobInvocation) and surfaced
/// through listeners and the tracer.
#[derive(Debug, Error)]
pub enum CronError {
	#[error("job already loaded: {0}")]
	DuplicateJob(String),

	#[error("job not found: {0}")]
	JobNotFound(String),

	#[error("job disabled: {0}")]
	JobDisabled(String),

	#[error("job already running: {0}")]
	JobAlreadyRunning(String),

	#[error("job panicked: {0}")]
	Panicked(String),

	#[error("job timed out after {0:?}")]
	TimedOut(Duration),

	#[error("job cancelled")]
	Cancelled,

	#[error("job failed: {0}")]
	Failed(String),

	/// Aggregate for fan-out operations (`run_jobs`, `run_all_jobs`): one
	/// failed name does not block launching the others.
	#[error("{}", summarize(.0))]
	Many(Vec<CronError>),
}

impl CronError {
	/// Shorthand for an arbitrary job failure.
	pub fn failed(message: impl Into<String>) -> Self {
		Self::Failed(message.into())
	}
}

fn summarize(errors: &[CronError]) -> String {
	errors
		.iter()
		.map(|e| e.to_string())
		.collect::<Vec<_>>()
		.join("; ")
}
