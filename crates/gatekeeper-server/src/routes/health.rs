// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Health HTTP handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use gatekeeper_jobs::{HealthState, JobsHealthStatus};
use gatekeeper_platform::GatewayStatus;
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
	pub status: HealthStatus,
	pub ready: bool,
	pub pending_tracked: usize,
	pub handshakes: usize,
	pub gateway: Option<GatewayStatus>,
	pub jobs: Option<JobsHealthStatus>,
	pub version: &'static str,
}

fn aggregate_status(
	ready: bool,
	gateway: Option<&GatewayStatus>,
	jobs: Option<&JobsHealthStatus>,
) -> HealthStatus {
	if !ready {
		return HealthStatus::Unhealthy;
	}
	// Still serving callbacks, but screening-clear events are not arriving.
	if gateway.is_some_and(|g| !g.connected) {
		return HealthStatus::Degraded;
	}
	match jobs.map(|j| j.status) {
		Some(HealthState::Unhealthy) | Some(HealthState::Degraded) => HealthStatus::Degraded,
		Some(HealthState::Healthy) | None => HealthStatus::Healthy,
	}
}

/// GET /health - readiness, verification state sizes, gateway counters and
/// job health.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
	let ready = state.coordinator.platform().is_ready();
	let gateway = state.gateway.as_ref().map(|g| g.snapshot());
	let jobs = match &state.scheduler {
		Some(scheduler) => Some(scheduler.health_status().await),
		None => None,
	};

	let response = HealthResponse {
		status: aggregate_status(ready, gateway.as_ref(), jobs.as_ref()),
		ready,
		pending_tracked: state.coordinator.pending_count().await,
		handshakes: state.coordinator.handshake_count().await,
		gateway,
		jobs,
		version: env!("CARGO_PKG_VERSION"),
	};

	let http_status = if ready {
		StatusCode::OK
	} else {
		StatusCode::SERVICE_UNAVAILABLE
	};

	(http_status, Json(response))
}
