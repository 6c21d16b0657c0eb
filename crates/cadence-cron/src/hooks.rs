// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Observer hooks: manager-level lifecycle listeners and the tracer seam.
//!
//! Every callback dispatch is individually guarded; a panicking observer is
//! recovered and logged so it can neither corrupt manager state nor block
//! other observers.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::warn;

use crate::invocation::JobInvocation;

/// External observer of job lifecycle transitions.
///
/// Registered on the manager with
/// [`with_listener`](crate::JobManager::with_listener); fires for every job
/// whose [`trigger_listeners`](crate::Job::trigger_listeners) capability is
/// true. This is also the seam for structured-logging sinks: implement
/// `on_complete`/`on_broken`/`on_fixed` and forward to your transport.
pub trait JobListener: Send + Sync {
	fn on_start(&self, _invocation: &JobInvocation) {}

	fn on_complete(&self, _invocation: &JobInvocation) {}

	/// Fired exactly once when a job transitions Healthy -> Broken.
	fn on_broken(&self, _invocation: &JobInvocation) {}

	/// Fired exactly once when a job transitions Broken -> Healthy.
	fn on_fixed(&self, _invocation: &JobInvocation) {}

	fn on_cancellation(&self, _invocation: &JobInvocation) {}
}

/// Distributed-tracing seam. `start` is called after `on_start` dispatch and
/// before execution; the finisher runs last on the completion path, after
/// all other callbacks, even if one of them panicked.
pub trait Tracer: Send + Sync {
	fn start(&self, invocation: &JobInvocation) -> Box<dyn TraceFinisher>;
}

pub trait TraceFinisher: Send {
	fn finish(self: Box<Self>, invocation: &JobInvocation);
}

/// Run one observer callback, containing any panic it raises.
pub(crate) fn dispatch(job_name: &str, hook: &'static str, callback: impl FnOnce()) {
	if catch_unwind(AssertUnwindSafe(callback)).is_err() {
		warn!(job = %job_name, hook, "observer callback panicked; ignoring");
	}
}

/// Best-effort extraction of a panic payload's message.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
	if let Some(message) = payload.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"panic with non-string payload".to_string()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[test]
	fn dispatch_contains_panics() {
		dispatch("test", "on_start", || panic!("listener bug"));
	}

	#[test]
	fn dispatch_runs_callback() {
		let calls = AtomicUsize::new(0);
		dispatch("test", "on_complete", || {
			calls.fetch_add(1, Ordering::SeqCst);
		});
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[test]
	fn panic_message_extracts_str_and_string() {
		assert_eq!(panic_message(Box::new("boom")), "boom");
		assert_eq!(panic_message(Box::new("boom".to_string())), "boom");
		assert_eq!(panic_message(Box::new(42usize)), "panic with non-string payload");
	}
}
