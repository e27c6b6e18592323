// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `/authorize`: completes the Discord authorization-code flow.

use axum::{
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Redirect, Response},
};
use gatekeeper_common_http::{retry, RetryConfig, RetryableError};
use gatekeeper_platform::{GuildId, Member, Platform, PlatformError, UserId};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::api::{AppState, AuthorizeSettings};

#[derive(Debug, Default, Deserialize)]
pub struct AuthorizeQuery {
	#[serde(rename = "code-required")]
	pub code_required: Option<String>,
	pub code: Option<String>,
	pub state: Option<String>,
	pub error: Option<String>,
	pub error_description: Option<String>,
}

/// Handles every method on `/authorize`.
///
/// The flow runs on its own task so a browser that gives up mid-request does
/// not abort a join or role grant halfway through.
pub async fn authorize(
	State(state): State<AppState>,
	Query(query): Query<AuthorizeQuery>,
) -> Response {
	let settings = state.settings.clone();
	match tokio::spawn(handle_authorize(state, query)).await {
		Ok(response) => response,
		Err(e) => {
			error!(error = %e, "authorize task failed");
			redirect_error(&settings, "internal_error", "Something went wrong")
		}
	}
}

#[tracing::instrument(skip_all)]
async fn handle_authorize(state: AppState, query: AuthorizeQuery) -> Response {
	let platform = state.coordinator.platform().clone();
	platform.wait_until_ready().await;

	if query.code_required.as_deref() == Some("true") {
		let handshake = state.coordinator.issue_handshake().await;
		return Redirect::to(&state.oauth.authorization_url(&handshake)).into_response();
	}

	if let Some(error) = query.error.as_deref() {
		let description = query.error_description.as_deref().unwrap_or_default();
		warn!(error, description, "Discord returned an authorization error");
		return redirect_error(&state.settings, error, description);
	}

	let Some(code) = query.code.as_deref() else {
		debug!("No code provided, ignoring");
		return (StatusCode::BAD_REQUEST, "No code provided").into_response();
	};

	if !state_accepted(&state, query.state.as_deref()).await {
		warn!(state_present = query.state.is_some(), "rejecting callback with invalid state");
		return redirect_error(
			&state.settings,
			"invalid_state",
			"Authorization request expired, please try again",
		);
	}

	let token = match state.oauth.exchange_code(code).await {
		Ok(token) => token,
		Err(e) if e.is_rejection() => {
			error!(error = %e, "Error authorising");
			return redirect_error(&state.settings, "", "Invalid authorization code");
		}
		Err(e) => {
			error!(error = %e, "token endpoint unreachable");
			return redirect_error(
				&state.settings,
				"provider_unavailable",
				"Discord could not be reached, please try again",
			);
		}
	};

	let user = match state.oauth.get_user(token.access_token.expose()).await {
		Ok(user) => user,
		Err(e) => {
			error!(error = %e, "failed to fetch Discord user");
			return redirect_error(
				&state.settings,
				"identity_unavailable",
				"Unable to fetch your Discord account",
			);
		}
	};
	let user_id = UserId(user.id);
	let tag = user.tag();

	let guild_id = state.coordinator.config().guild_id;
	match platform.get_guild(guild_id).await {
		Ok(Some(_)) => {}
		Ok(None) => {
			error!(%guild_id, "Failed to get guild object");
			return redirect_error(&state.settings, "", "Unable to get guild");
		}
		Err(e) => {
			error!(%guild_id, error = %e, "Failed to get guild object");
			return redirect_error(&state.settings, "", "Unable to get guild");
		}
	}

	match platform.get_member(guild_id, user_id).await {
		Ok(Some(member)) => {
			debug!(user = %tag, "in guild already, assigning role");
			state.coordinator.on_join_or_verify(&member).await;
			return Redirect::to(&state.settings.done_url).into_response();
		}
		Ok(None) => {}
		Err(e) => {
			error!(%user_id, error = %e, "member lookup failed");
			return member_unavailable(&state.settings);
		}
	}

	debug!(user = %tag, %user_id, "not in guild, joining");
	if let Err(e) = platform
		.join_guild(guild_id, user_id, &token.access_token)
		.await
	{
		let (code, message) = e.code_and_message();
		warn!(%user_id, error = %e, "joining guild failed");
		return redirect_error(&state.settings, &code, &message);
	}

	tokio::time::sleep(state.settings.join_settle_delay).await;

	let member = match lookup_joined_member(
		platform.as_ref(),
		guild_id,
		user_id,
		&state.settings.member_lookup,
	)
	.await
	{
		Ok(member) => member,
		Err(e) => {
			error!(%user_id, error = ?e, "joined member never became visible");
			return member_unavailable(&state.settings);
		}
	};

	if member.pending {
		state.coordinator.track_pending(member.id()).await;
	}
	state.coordinator.on_join_or_verify(&member).await;
	Redirect::to(&state.settings.done_url).into_response()
}

async fn state_accepted(state: &AppState, token: Option<&str>) -> bool {
	match token {
		Some(token) => state.coordinator.consume_handshake(token).await,
		None => !state.settings.require_state,
	}
}

fn redirect_error(settings: &AuthorizeSettings, error: &str, description: &str) -> Response {
	Redirect::to(&settings.error_url(error, description)).into_response()
}

fn member_unavailable(settings: &AuthorizeSettings) -> Response {
	redirect_error(
		settings,
		"member_unavailable",
		"Joined the server but could not confirm membership, please try again",
	)
}

#[derive(Debug)]
enum LookupError {
	NotVisible,
	Platform(PlatformError),
}

impl RetryableError for LookupError {
	fn is_retryable(&self) -> bool {
		match self {
			LookupError::NotVisible => true,
			LookupError::Platform(e) => e.is_retryable(),
		}
	}
}

async fn lookup_joined_member(
	platform: &dyn Platform,
	guild_id: GuildId,
	user_id: UserId,
	cfg: &RetryConfig,
) -> Result<Member, LookupError> {
	retry(cfg, move || async move {
		match platform.get_member(guild_id, user_id).await {
			Ok(Some(member)) => Ok(member),
			Ok(None) => Err(LookupError::NotVisible),
			Err(e) => Err(LookupError::Platform(e)),
		}
	})
	.await
}
