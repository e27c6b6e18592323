// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Outbound HTTP client shared by the OAuth client and the platform adapter.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// Timeout applied to every outbound call unless a caller overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Client builder preconfigured with the Gatekeeper User-Agent and timeout.
pub fn builder() -> ClientBuilder {
	Client::builder()
		.user_agent(user_agent())
		.timeout(DEFAULT_TIMEOUT)
}

/// Build the process-wide client.
///
/// # Panics
///
/// Panics if the TLS backend cannot be initialised.
pub fn new_client() -> Client {
	builder().build().expect("failed to build HTTP client")
}

pub fn new_client_with_timeout(timeout: Duration) -> Client {
	builder()
		.timeout(timeout)
		.build()
		.expect("failed to build HTTP client")
}

/// Discord rejects bot requests whose User-Agent does not follow
/// `DiscordBot ($url, $versionNumber)`.
pub fn user_agent() -> String {
	format!(
		"DiscordBot ({}, {}) gatekeeper",
		env!("CARGO_PKG_REPOSITORY"),
		env!("CARGO_PKG_VERSION")
	)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn user_agent_follows_discord_bot_format() {
		let ua = user_agent();
		assert!(ua.starts_with("DiscordBot ("));
		assert!(ua.contains(env!("CARGO_PKG_VERSION")));
		assert!(ua.ends_with("gatekeeper"));
	}

	#[test]
	fn builder_produces_client() {
		assert!(builder().build().is_ok());
	}

	#[test]
	fn custom_timeout_client_builds() {
		let _client = new_client_with_timeout(Duration::from_secs(2));
	}
}
