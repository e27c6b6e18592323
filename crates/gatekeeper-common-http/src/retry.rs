// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Exponential backoff for operations whose failure may be transient.

use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct RetryConfig {
	/// Total attempts including the first one.
	pub max_attempts: u32,
	pub base_delay: Duration,
	pub max_delay: Duration,
	pub backoff_factor: f64,
	pub jitter: bool,
}

impl Default for RetryConfig {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::from_millis(500),
			max_delay: Duration::from_secs(5),
			backoff_factor: 2.0,
			jitter: true,
		}
	}
}

impl RetryConfig {
	/// Fixed-shape backoff without jitter, used where callers need
	/// predictable timing (tests, the post-join member lookup).
	pub fn deterministic(max_attempts: u32, base_delay: Duration) -> Self {
		Self {
			max_attempts,
			base_delay,
			jitter: false,
			..Self::default()
		}
	}
}

pub trait RetryableError {
	fn is_retryable(&self) -> bool;
}

const TRANSIENT_STATUSES: [StatusCode; 5] = [
	StatusCode::TOO_MANY_REQUESTS,
	StatusCode::INTERNAL_SERVER_ERROR,
	StatusCode::BAD_GATEWAY,
	StatusCode::SERVICE_UNAVAILABLE,
	StatusCode::GATEWAY_TIMEOUT,
];

impl RetryableError for reqwest::Error {
	fn is_retryable(&self) -> bool {
		if self.is_timeout() || self.is_connect() {
			return true;
		}
		self
			.status()
			.map(|status| TRANSIENT_STATUSES.contains(&status))
			.unwrap_or(false)
	}
}

pub(crate) fn delay_for(cfg: &RetryConfig, attempt: u32) -> Duration {
	let raw = cfg.base_delay.as_secs_f64() * cfg.backoff_factor.powi(attempt as i32);
	let capped = raw.min(cfg.max_delay.as_secs_f64());
	let scaled = if cfg.jitter {
		capped * (0.5 + fastrand::f64())
	} else {
		capped
	};
	Duration::from_secs_f64(scaled)
}

/// Run `op` until it succeeds, returns a non-retryable error, or
/// `cfg.max_attempts` is reached. The last error is returned unchanged.
pub async fn retry<F, Fut, T, E>(cfg: &RetryConfig, mut op: F) -> Result<T, E>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<T, E>>,
	E: RetryableError + std::fmt::Debug,
{
	let mut attempt = 0u32;

	loop {
		let err = match op().await {
			Ok(value) => return Ok(value),
			Err(err) => err,
		};
		attempt += 1;

		if !err.is_retryable() || attempt >= cfg.max_attempts {
			warn!(error = ?err, attempt, max_attempts = cfg.max_attempts, "giving up");
			return Err(err);
		}

		let delay = delay_for(cfg, attempt - 1);
		warn!(
			error = ?err,
			attempt,
			delay_ms = delay.as_millis() as u64,
			"transient failure, backing off"
		);
		tokio::time::sleep(delay).await;
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::sync::atomic::{AtomicU32, Ordering};
	use std::sync::Arc;

	#[derive(Debug)]
	enum LookupError {
		NotYetVisible,
		Denied,
	}

	impl RetryableError for LookupError {
		fn is_retryable(&self) -> bool {
			matches!(self, LookupError::NotYetVisible)
		}
	}

	#[tokio::test]
	async fn denied_is_not_retried() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);
		let cfg = RetryConfig::deterministic(5, Duration::ZERO);

		let result: Result<(), LookupError> = retry(&cfg, || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(LookupError::Denied)
			}
		})
		.await;

		assert!(matches!(result, Err(LookupError::Denied)));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn stops_after_max_attempts() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);
		let cfg = RetryConfig::deterministic(3, Duration::ZERO);

		let result: Result<(), LookupError> = retry(&cfg, || {
			let counter = Arc::clone(&counter);
			async move {
				counter.fetch_add(1, Ordering::SeqCst);
				Err(LookupError::NotYetVisible)
			}
		})
		.await;

		assert!(matches!(result, Err(LookupError::NotYetVisible)));
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[tokio::test]
	async fn returns_value_once_visible() {
		let calls = Arc::new(AtomicU32::new(0));
		let counter = Arc::clone(&calls);
		let cfg = RetryConfig::deterministic(4, Duration::ZERO);

		let result: Result<u64, LookupError> = retry(&cfg, || {
			let counter = Arc::clone(&counter);
			async move {
				if counter.fetch_add(1, Ordering::SeqCst) < 2 {
					Err(LookupError::NotYetVisible)
				} else {
					Ok(999)
				}
			}
		})
		.await;

		assert_eq!(result.unwrap(), 999);
		assert_eq!(calls.load(Ordering::SeqCst), 3);
	}

	#[test]
	fn first_success_returns_immediately() {
		let cfg = RetryConfig::default();
		let result: Result<u64, LookupError> = tokio_test::block_on(retry(&cfg, || async { Ok(7) }));
		assert_eq!(tokio_test::assert_ok!(result), 7);
	}

	#[tokio::test(start_paused = true)]
	async fn backoff_sleeps_between_attempts() {
		let cfg = RetryConfig::deterministic(3, Duration::from_secs(1));
		let start = tokio::time::Instant::now();

		let _: Result<(), LookupError> =
			retry(&cfg, || async { Err(LookupError::NotYetVisible) }).await;

		// 1s after the first failure, 2s after the second.
		assert_eq!(start.elapsed(), Duration::from_secs(3));
	}

	#[test]
	fn delay_is_capped() {
		let cfg = RetryConfig {
			max_attempts: 10,
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(4),
			backoff_factor: 3.0,
			jitter: false,
		};
		assert_eq!(delay_for(&cfg, 0), Duration::from_secs(1));
		assert_eq!(delay_for(&cfg, 1), Duration::from_secs(3));
		assert_eq!(delay_for(&cfg, 5), Duration::from_secs(4));
	}

	#[test]
	fn jitter_stays_within_half_to_one_and_a_half() {
		let cfg = RetryConfig {
			jitter: true,
			..RetryConfig::deterministic(3, Duration::from_millis(100))
		};
		for _ in 0..50 {
			let delay = delay_for(&cfg, 0);
			assert!(delay >= Duration::from_millis(50));
			assert!(delay <= Duration::from_millis(150));
		}
	}
}
