// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bounded in-memory record of recent job runs.

use std::collections::{HashMap, VecDeque};

use chrono::Utc;
use tokio::sync::Mutex;

use crate::types::{JobRun, JobStatus};

const DEFAULT_RUNS_PER_JOB: usize = 32;

#[derive(Debug)]
pub struct RunHistory {
	runs: Mutex<HashMap<String, VecDeque<JobRun>>>,
	capacity: usize,
}

impl RunHistory {
	pub fn new() -> Self {
		Self::with_capacity(DEFAULT_RUNS_PER_JOB)
	}

	/// Keep at most `capacity` runs per job, newest last.
	pub fn with_capacity(capacity: usize) -> Self {
		Self {
			runs: Mutex::new(HashMap::new()),
			capacity: capacity.max(1),
		}
	}

	pub async fn record_run_start(&self, run: &JobRun) {
		let mut runs = self.runs.lock().await;
		let entries = runs.entry(run.job_id.clone()).or_default();
		entries.push_back(run.clone());
		while entries.len() > self.capacity {
			entries.pop_front();
		}
	}

	pub async fn record_run_complete(
		&self,
		run_id: &str,
		status: JobStatus,
		error_message: Option<String>,
		metadata: Option<serde_json::Value>,
	) {
		let mut runs = self.runs.lock().await;
		let Some(run) = runs
			.values_mut()
			.flat_map(|entries| entries.iter_mut())
			.find(|run| run.id == run_id)
		else {
			return;
		};

		let now = Utc::now();
		run.status = status;
		run.completed_at = Some(now);
		run.duration_ms = Some((now - run.started_at).num_milliseconds());
		run.error_message = error_message;
		run.metadata = metadata;
	}

	pub async fn record_retry(&self, run_id: &str, retry_count: u32) {
		let mut runs = self.runs.lock().await;
		if let Some(run) = runs
			.values_mut()
			.flat_map(|entries| entries.iter_mut())
			.find(|run| run.id == run_id)
		{
			run.retry_count = retry_count;
		}
	}

	pub async fn last_run(&self, job_id: &str) -> Option<JobRun> {
		self.runs.lock().await.get(job_id)?.back().cloned()
	}

	pub async fn runs(&self, job_id: &str) -> Vec<JobRun> {
		self
			.runs
			.lock()
			.await
			.get(job_id)
			.map(|entries| entries.iter().cloned().collect())
			.unwrap_or_default()
	}

	/// Failed runs since the last success or cancellation.
	pub async fn count_consecutive_failures(&self, job_id: &str) -> u32 {
		let runs = self.runs.lock().await;
		let Some(entries) = runs.get(job_id) else {
			return 0;
		};
		entries
			.iter()
			.rev()
			.filter(|run| run.status != JobStatus::Running)
			.take_while(|run| run.status == JobStatus::Failed)
			.count() as u32
	}
}

impl Default for RunHistory {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::TriggerSource;

	fn run(id: &str) -> JobRun {
		JobRun {
			id: id.to_string(),
			job_id: "job".to_string(),
			status: JobStatus::Running,
			started_at: Utc::now(),
			completed_at: None,
			duration_ms: None,
			error_message: None,
			retry_count: 0,
			triggered_by: TriggerSource::Schedule,
			metadata: None,
		}
	}

	#[tokio::test]
	async fn completion_updates_the_matching_run() {
		let history = RunHistory::new();
		history.record_run_start(&run("a")).await;
		history
			.record_run_complete("a", JobStatus::Failed, Some("boom".to_string()), None)
			.await;

		let last = history.last_run("job").await.unwrap();
		assert_eq!(last.status, JobStatus::Failed);
		assert_eq!(last.error_message.as_deref(), Some("boom"));
		assert!(last.completed_at.is_some());
	}

	#[tokio::test]
	async fn consecutive_failures_reset_on_success() {
		let history = RunHistory::new();
		for (id, status) in [
			("1", JobStatus::Failed),
			("2", JobStatus::Succeeded),
			("3", JobStatus::Failed),
			("4", JobStatus::Failed),
		] {
			history.record_run_start(&run(id)).await;
			history.record_run_complete(id, status, None, None).await;
		}
		assert_eq!(history.count_consecutive_failures("job").await, 2);
		assert_eq!(history.count_consecutive_failures("other").await, 0);
	}

	#[tokio::test]
	async fn history_is_bounded() {
		let history = RunHistory::with_capacity(2);
		for id in ["1", "2", "3"] {
			history.record_run_start(&run(id)).await;
		}
		let ids: Vec<_> = history.runs("job").await.into_iter().map(|r| r.id).collect();
		assert_eq!(ids, vec!["2", "3"]);
	}
}
