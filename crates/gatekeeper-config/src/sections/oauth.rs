// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth2 application credentials.

use gatekeeper_common_secret::SecretString;
use serde::Deserialize;

use crate::snowflake;
use crate::ConfigError;

pub const DEFAULT_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";

/// `identify` to learn who authorized, `guilds.join` so the bot can add them,
/// `guilds` for parity with the consent screen users already know.
pub fn default_scopes() -> Vec<String> {
	vec![
		"identify".to_string(),
		"guilds.join".to_string(),
		"guilds".to_string(),
	]
}

#[derive(Debug, Clone)]
pub struct OAuthConfig {
	pub client_id: String,
	pub client_secret: SecretString,
	pub scopes: Vec<String>,
	pub authorize_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthConfigLayer {
	#[serde(default, deserialize_with = "snowflake::deserialize_opt_string")]
	pub client_id: Option<String>,
	#[serde(default)]
	pub client_secret: Option<SecretString>,
	#[serde(default)]
	pub scopes: Option<Vec<String>>,
	#[serde(default)]
	pub authorize_url: Option<String>,
}

impl OAuthConfigLayer {
	pub fn merge(&mut self, other: OAuthConfigLayer) {
		if other.client_id.is_some() {
			self.client_id = other.client_id;
		}
		if other.client_secret.is_some() {
			self.client_secret = other.client_secret;
		}
		if other.scopes.is_some() {
			self.scopes = other.scopes;
		}
		if other.authorize_url.is_some() {
			self.authorize_url = other.authorize_url;
		}
	}

	pub fn finalize(self) -> Result<OAuthConfig, ConfigError> {
		let client_id = self
			.client_id
			.filter(|s| !s.is_empty())
			.ok_or(ConfigError::MissingField("client_id"))?;
		let client_secret = self
			.client_secret
			.filter(|s| !s.is_empty())
			.ok_or(ConfigError::MissingField("client_secret"))?;
		let scopes = self
			.scopes
			.filter(|s| !s.is_empty())
			.unwrap_or_else(default_scopes);

		Ok(OAuthConfig {
			client_id,
			client_secret,
			scopes,
			authorize_url: self
				.authorize_url
				.unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
		})
	}
}
