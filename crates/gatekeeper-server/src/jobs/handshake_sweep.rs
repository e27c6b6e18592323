// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use gatekeeper_jobs::{Job, JobContext, JobError, JobOutput};
use gatekeeper_verification::Coordinator;
use tracing::instrument;

pub struct HandshakeSweepJob {
	coordinator: Arc<Coordinator>,
}

impl HandshakeSweepJob {
	pub fn new(coordinator: Arc<Coordinator>) -> Self {
		Self { coordinator }
	}
}

#[async_trait]
impl Job for HandshakeSweepJob {
	fn id(&self) -> &str {
		"handshake-sweep"
	}

	fn name(&self) -> &str {
		"Handshake Sweep"
	}

	fn description(&self) -> &str {
		"Remove expired OAuth state tokens"
	}

	#[instrument(skip(self, ctx), fields(job_id = "handshake-sweep"))]
	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError> {
		if ctx.cancellation_token.is_cancelled() {
			return Err(JobError::Cancelled);
		}

		let removed = self.coordinator.sweep_handshakes().await;

		Ok(JobOutput {
			message: format!("Removed {removed} expired handshakes"),
			metadata: Some(serde_json::json!({ "removed_count": removed })),
		})
	}
}
