// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use uuid::Uuid;

use crate::invocation::TriggerSource;

/// Per-invocation execution context handed to [`Job::execute`](crate::Job::execute).
///
/// The cancellation token is tripped when the invocation's timeout elapses or
/// when the manager is stopped with cancellation requested. Long-running jobs
/// can poll it at natural checkpoints or race their work against
/// [`cancelled`](CancellationToken::cancelled); the manager additionally drops
/// the execution future at the timeout deadline, so reacting to the token is
/// about releasing external resources promptly, not correctness.
#[derive(Clone)]
pub struct JobContext {
	pub invocation_id: Uuid,
	pub job_name: String,
	pub trigger: TriggerSource,
	pub cancellation: CancellationToken,
}

/// One-shot cancellation signal shared between the manager and an invocation.
///
/// Clones observe the same signal. Once cancelled, a token stays cancelled.
#[derive(Clone, Default)]
pub struct CancellationToken {
	inner: Arc<TokenState>,
}

#[derive(Default)]
struct TokenState {
	cancelled: AtomicBool,
	notify: Notify,
}

impl CancellationToken {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.inner.cancelled.store(true, Ordering::SeqCst);
		self.inner.notify.notify_waiters();
	}

	pub fn is_cancelled(&self) -> bool {
		self.inner.cancelled.load(Ordering::SeqCst)
	}

	/// Resolves once the token has been cancelled; resolves immediately if it
	/// already was. Intended for `select!`-style races inside job actions.
	pub async fn cancelled(&self) {
		// Register with the Notify before the final flag check so a cancel
		// landing between the check and the await cannot be missed.
		let mut notified = pin!(self.inner.notify.notified());
		notified.as_mut().enable();
		if self.is_cancelled() {
			return;
		}
		notified.await;
	}
}
