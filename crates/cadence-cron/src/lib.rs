// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Recurring-job scheduler and executor.
//!
//! A [`JobManager`] owns a registry of named [`Job`]s, decides when each
//! should next run from its pluggable [`Schedule`], launches and supervises
//! each [`JobInvocation`], enforces at-most-one-concurrent-run-per-job
//! semantics (configurable per job), recovers from panics and errors without
//! crashing the process, and notifies observers of lifecycle transitions
//! including a broken/fixed health state derived from consecutive
//! failure/success patterns.
//!
//! ```no_run
//! use std::time::Duration;
//! use cadence_cron::{BasicJob, Every, JobManager};
//!
//! # async fn demo() -> cadence_cron::Result<()> {
//! let manager = JobManager::new();
//! manager.load_job(std::sync::Arc::new(
//! 	BasicJob::named("cleanup")
//! 		.with_schedule(Every(Duration::from_secs(300)))
//! 		.with_action(|_ctx| async { Ok(()) }),
//! ))?;
//! manager.start();
//! // ... later, from the shutdown path:
//! manager.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod health;
pub mod hooks;
pub mod invocation;
pub mod job;
pub mod manager;
pub mod meta;
pub mod schedule;

pub use config::{JobManagerConfig, StopBehavior, DEFAULT_HEARTBEAT_INTERVAL};
pub use context::{CancellationToken, JobContext};
pub use error::{CronError, Result};
pub use health::{HealthState, JobHealthStatus, JobsHealthStatus, LastRunInfo};
pub use hooks::{JobListener, TraceFinisher, Tracer};
pub use invocation::{JobInvocation, JobStatus, TriggerSource};
pub use job::{BasicJob, Job};
pub use manager::JobManager;
pub use meta::JobMeta;
pub use schedule::{At, Every, Immediate, Never, Schedule};
