// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-way readiness latch shared by the gateway, the HTTP surface and the
//! job scheduler.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ReadySignal {
	tx: Arc<watch::Sender<bool>>,
}

impl ReadySignal {
	pub fn new() -> Self {
		let (tx, _rx) = watch::channel(false);
		Self { tx: Arc::new(tx) }
	}

	/// Already-ready signal, for tests and fakes.
	pub fn ready() -> Self {
		let signal = Self::new();
		signal.mark_ready();
		signal
	}

	pub fn mark_ready(&self) {
		self.tx.send_replace(true);
	}

	pub fn is_ready(&self) -> bool {
		*self.tx.borrow()
	}

	/// Resolves once [`mark_ready`](Self::mark_ready) has been called.
	pub async fn wait(&self) {
		let mut rx = self.tx.subscribe();
		// The sender lives in `self`, so the channel cannot close while we wait.
		let _ = rx.wait_for(|ready| *ready).await;
	}
}

impl Default for ReadySignal {
	fn default() -> Self {
		Self::new()
	}
}
