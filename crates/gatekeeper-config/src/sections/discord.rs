// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Bot credentials and the guild/role/channel this instance serves.

use gatekeeper_common_secret::SecretString;
use serde::Deserialize;

use crate::snowflake;
use crate::ConfigError;

pub const DEFAULT_API_BASE_URL: &str = "https://discord.com/api/v10";
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

#[derive(Debug, Clone)]
pub struct DiscordConfig {
	pub bot_token: SecretString,
	pub guild_id: u64,
	pub role_id: u64,
	/// Channel that receives one embed per verification decision.
	pub log_channel: Option<u64>,
	pub api_base_url: String,
	pub gateway_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscordConfigLayer {
	#[serde(default)]
	pub bot_token: Option<SecretString>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	pub guild_id: Option<u64>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	pub role_id: Option<u64>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	pub log_channel: Option<u64>,
	#[serde(default)]
	pub api_base_url: Option<String>,
	#[serde(default)]
	pub gateway_url: Option<String>,
}

impl DiscordConfigLayer {
	pub fn merge(&mut self, other: DiscordConfigLayer) {
		if other.bot_token.is_some() {
			self.bot_token = other.bot_token;
		}
		if other.guild_id.is_some() {
			self.guild_id = other.guild_id;
		}
		if other.role_id.is_some() {
			self.role_id = other.role_id;
		}
		if other.log_channel.is_some() {
			self.log_channel = other.log_channel;
		}
		if other.api_base_url.is_some() {
			self.api_base_url = other.api_base_url;
		}
		if other.gateway_url.is_some() {
			self.gateway_url = other.gateway_url;
		}
	}

	pub fn finalize(self) -> Result<DiscordConfig, ConfigError> {
		let bot_token = self
			.bot_token
			.filter(|t| !t.is_empty())
			.ok_or(ConfigError::MissingField("bot_token"))?;

		Ok(DiscordConfig {
			bot_token,
			guild_id: self.guild_id.ok_or(ConfigError::MissingField("guild_id"))?,
			role_id: self.role_id.ok_or(ConfigError::MissingField("role_id"))?,
			log_channel: self.log_channel,
			api_base_url: self
				.api_base_url
				.unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
				.trim_end_matches('/')
				.to_string(),
			gateway_url: self
				.gateway_url
				.unwrap_or_else(|| DEFAULT_GATEWAY_URL.to_string()),
		})
	}
}
