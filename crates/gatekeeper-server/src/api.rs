// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Application state and router.

use std::sync::Arc;
use std::time::Duration;

use axum::{
	routing::{any, get},
	Router,
};
use gatekeeper_auth_discord::DiscordOAuthClient;
use gatekeeper_common_http::RetryConfig;
use gatekeeper_config::GatekeeperConfig;
use gatekeeper_jobs::JobScheduler;
use gatekeeper_platform::GatewayStats;
use gatekeeper_verification::Coordinator;
use tower_http::trace::TraceLayer;

use crate::routes;

const MAX_LOOKUP_BACKOFF: Duration = Duration::from_secs(5);

/// Knobs for the `/authorize` flow.
#[derive(Debug, Clone)]
pub struct AuthorizeSettings {
	/// `<server_url>/done`
	pub done_url: String,
	/// `<server_url>/error`, query string appended per redirect.
	pub error_base_url: String,
	pub require_state: bool,
	/// Pause between a successful join and the first member lookup.
	pub join_settle_delay: Duration,
	/// Backoff for the post-join member lookup.
	pub member_lookup: RetryConfig,
}

impl AuthorizeSettings {
	pub fn from_config(config: &GatekeeperConfig) -> Self {
		let verification = &config.verification;
		Self {
			done_url: config.http.done_url(),
			error_base_url: config.http.error_base_url(),
			require_state: verification.require_state,
			join_settle_delay: verification.join_settle_delay(),
			member_lookup: RetryConfig {
				max_attempts: verification.member_lookup_attempts,
				base_delay: verification.join_settle_delay(),
				max_delay: MAX_LOOKUP_BACKOFF,
				backoff_factor: 2.0,
				jitter: false,
			},
		}
	}

	/// `<server_url>/error?error=…&error_description=…`, spaces as `%20`.
	pub fn error_url(&self, error: &str, description: &str) -> String {
		format!(
			"{}?error={}&error_description={}",
			self.error_base_url,
			urlencoding::encode(error),
			urlencoding::encode(description)
		)
	}
}

#[derive(Clone)]
pub struct AppState {
	pub coordinator: Arc<Coordinator>,
	pub oauth: Arc<DiscordOAuthClient>,
	pub settings: Arc<AuthorizeSettings>,
	pub scheduler: Option<Arc<JobScheduler>>,
	pub gateway: Option<GatewayStats>,
}

impl AppState {
	pub fn new(
		coordinator: Arc<Coordinator>,
		oauth: Arc<DiscordOAuthClient>,
		settings: AuthorizeSettings,
	) -> Self {
		Self {
			coordinator,
			oauth,
			settings: Arc::new(settings),
			scheduler: None,
			gateway: None,
		}
	}

	pub fn with_scheduler(mut self, scheduler: Arc<JobScheduler>) -> Self {
		self.scheduler = Some(scheduler);
		self
	}

	pub fn with_gateway(mut self, gateway: GatewayStats) -> Self {
		self.gateway = Some(gateway);
		self
	}
}

pub fn create_router(state: AppState) -> Router {
	Router::new()
		.route("/authorize", any(routes::authorize::authorize))
		.route("/health", get(routes::health::health_check))
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn settings() -> AuthorizeSettings {
		AuthorizeSettings {
			done_url: "https://gate.example.com/done".to_string(),
			error_base_url: "https://gate.example.com/error".to_string(),
			require_state: false,
			join_settle_delay: Duration::ZERO,
			member_lookup: RetryConfig::deterministic(3, Duration::ZERO),
		}
	}

	#[test]
	fn error_url_uses_percent_twenty_for_spaces() {
		assert_eq!(
			settings().error_url("access_denied", "User declined"),
			"https://gate.example.com/error?error=access_denied&error_description=User%20declined"
		);
	}

	#[test]
	fn error_url_keeps_empty_code() {
		assert_eq!(
			settings().error_url("", "Unable to get guild"),
			"https://gate.example.com/error?error=&error_description=Unable%20to%20get%20guild"
		);
	}

	#[test]
	fn error_url_escapes_reserved_characters() {
		assert_eq!(
			settings().error_url("a&b", "x=y"),
			"https://gate.example.com/error?error=a%26b&error_description=x%3Dy"
		);
	}
}
