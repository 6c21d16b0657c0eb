// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Schedule abstraction: a pure function from "previous scheduled run time"
//! to "next run time".
//!
//! Returning `None` permanently retires the job from automatic scheduling;
//! manual [`run_job`](crate::JobManager::run_job) still works. Implementations
//! must be cheap and must never block: they are called from the heartbeat
//! scan for every loaded job.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Determines when a job should next run.
///
/// `previous` is the prior *scheduled* run time (not the time the run
/// actually started or finished), so interval schedules do not accumulate
/// drift from execution latency. `None` means the job has never been
/// scheduled.
pub trait Schedule: Send + Sync {
	fn next_run_time(&self, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>>;
}

/// Fires exactly once, immediately.
pub struct Immediate;

impl Schedule for Immediate {
	fn next_run_time(&self, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
		match previous {
			None => Some(Utc::now()),
			Some(_) => None,
		}
	}
}

/// Fires exactly once at a fixed time.
///
/// A past-due time still yields one run: a job that was due before the
/// manager started must not be skipped.
pub struct At(pub DateTime<Utc>);

impl Schedule for At {
	fn next_run_time(&self, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
		match previous {
			None => Some(self.0),
			Some(_) => None,
		}
	}
}

/// Fires immediately, then every `d` thereafter.
pub struct Every(pub Duration);

impl Schedule for Every {
	fn next_run_time(&self, previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
		let step = TimeDelta::from_std(self.0).unwrap_or(TimeDelta::MAX);
		match previous {
			None => Some(Utc::now()),
			Some(prior) => prior.checked_add_signed(step),
		}
	}
}

/// Never fires.
pub struct Never;

impl Schedule for Never {
	fn next_run_time(&self, _previous: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
		None
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn immediate_fires_once() {
		let schedule = Immediate;
		let before = Utc::now();
		let first = schedule.next_run_time(None).unwrap();
		assert!(first >= before);
		assert!(schedule.next_run_time(Some(first)).is_none());
	}

	#[test]
	fn at_fires_once_even_when_past_due() {
		let due = Utc::now() - TimeDelta::hours(1);
		let schedule = At(due);
		assert_eq!(schedule.next_run_time(None), Some(due));
		assert!(schedule.next_run_time(Some(due)).is_none());
	}

	#[test]
	fn at_fires_once_in_the_future() {
		let due = Utc::now() + TimeDelta::hours(1);
		let schedule = At(due);
		assert_eq!(schedule.next_run_time(None), Some(due));
		assert!(schedule.next_run_time(Some(due)).is_none());
	}

	#[test]
	fn every_first_run_is_immediate() {
		let schedule = Every(Duration::from_secs(30));
		let before = Utc::now();
		let first = schedule.next_run_time(None).unwrap();
		assert!(first >= before);
	}

	#[test]
	fn never_never_fires() {
		let schedule = Never;
		assert!(schedule.next_run_time(None).is_none());
		assert!(schedule.next_run_time(Some(Utc::now())).is_none());
	}

	proptest! {
		// Successive interval runs advance by exactly the interval from the
		// prior scheduled time; actual run latency never leaks in.
		#[test]
		fn every_is_drift_free(step_ms in 1u64..86_400_000, offset_s in -86_400i64..86_400) {
			let schedule = Every(Duration::from_millis(step_ms));
			let prior = Utc::now() + TimeDelta::seconds(offset_s);
			let next = schedule.next_run_time(Some(prior)).unwrap();
			prop_assert_eq!(next - prior, TimeDelta::milliseconds(step_ms as i64));
		}

		#[test]
		fn every_chains_linearly(step_ms in 1u64..3_600_000, hops in 1u32..32) {
			let schedule = Every(Duration::from_millis(step_ms));
			let start = Utc::now();
			let mut current = start;
			for _ in 0..hops {
				current = schedule.next_run_time(Some(current)).unwrap();
			}
			prop_assert_eq!(current - start, TimeDelta::milliseconds(step_ms as i64 * hops as i64));
		}
	}
}
