// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use gatekeeper_common_http::RetryableError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
	/// The bot lacks the permission (or role hierarchy) for the action.
	#[error("forbidden (code {code}): {message}")]
	Forbidden { code: u64, message: String },

	#[error("Discord API returned {status} (code {code}): {message}")]
	Api {
		status: u16,
		code: u64,
		message: String,
	},

	#[error("HTTP request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("failed to parse response: {0}")]
	Parse(String),
}

impl PlatformError {
	/// Discord's JSON error code and message, for relaying to the error page.
	pub fn code_and_message(&self) -> (String, String) {
		match self {
			PlatformError::Forbidden { code, message } => (code.to_string(), message.clone()),
			PlatformError::Api { code, message, .. } => (code.to_string(), message.clone()),
			PlatformError::Http(e) => (String::new(), e.to_string()),
			PlatformError::Parse(message) => (String::new(), message.clone()),
		}
	}

	pub fn is_forbidden(&self) -> bool {
		matches!(self, PlatformError::Forbidden { .. })
	}
}

impl RetryableError for PlatformError {
	fn is_retryable(&self) -> bool {
		match self {
			PlatformError::Http(e) => e.is_retryable(),
			PlatformError::Api { status, .. } => *status == 429 || *status >= 500,
			PlatformError::Forbidden { .. } | PlatformError::Parse(_) => false,
		}
	}
}

#[derive(Debug, Error)]
pub enum GatewayError {
	#[error("websocket error: {0}")]
	WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

	#[error("gateway closed the connection ({code}): {reason}")]
	Closed { code: u16, reason: String },

	#[error("malformed gateway payload: {0}")]
	Decode(#[from] serde_json::Error),

	#[error("gateway protocol violation: {0}")]
	Protocol(String),

	#[error("heartbeat was not acknowledged")]
	Zombied,
}

impl GatewayError {
	/// Close codes after which reconnecting cannot succeed: bad token,
	/// invalid or disallowed intents, invalid API version.
	pub fn is_fatal(&self) -> bool {
		matches!(
			self,
			GatewayError::Closed {
				code: 4004 | 4010 | 4011 | 4012 | 4013 | 4014,
				..
			}
		)
	}
}
