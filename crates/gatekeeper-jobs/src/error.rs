// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Errors from job runs and scheduler lookups.

/// Why a run ended without output.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
	/// Transient failures are retried inside the same run record; permanent
	/// ones end the run immediately.
	#[error("job run failed: {message}")]
	Failed { message: String, retryable: bool },

	/// The run saw its cancellation token set, usually during shutdown.
	#[error("job run cancelled")]
	Cancelled,

	#[error("no job registered with id {0:?}")]
	UnknownJob(String),
}

impl JobError {
	/// A failure worth retrying, e.g. a timeout talking to Discord.
	pub fn transient(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: true,
		}
	}

	pub fn permanent(message: impl Into<String>) -> Self {
		JobError::Failed {
			message: message.into(),
			retryable: false,
		}
	}

	pub fn is_retryable(&self) -> bool {
		matches!(self, JobError::Failed { retryable: true, .. })
	}
}

pub type Result<T> = std::result::Result<T, JobError>;
