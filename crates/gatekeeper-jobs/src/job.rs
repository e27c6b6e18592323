// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::context::JobContext;
use crate::error::JobError;
use crate::types::JobOutput;

/// Retries allowed for a transient failure unless a job says otherwise.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A unit of background work the scheduler runs on an interval.
///
/// Runs must be safe to repeat: a retry re-enters `run` with the same
/// `run_id`. Long runs should check `ctx.cancellation_token` and return
/// [`JobError::Cancelled`] once it is set.
#[async_trait]
pub trait Job: Send + Sync {
	/// Stable key used for registration, history and health output.
	fn id(&self) -> &str;

	fn name(&self) -> &str {
		self.id()
	}

	fn description(&self) -> &str {
		""
	}

	fn max_retries(&self) -> u32 {
		DEFAULT_MAX_RETRIES
	}

	async fn run(&self, ctx: &JobContext) -> Result<JobOutput, JobError>;
}
