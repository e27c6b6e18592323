// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: legacy `config.json`, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;

use gatekeeper_common_secret::SecretString;
use serde::Deserialize;
use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::GatekeeperConfigLayer;
use crate::sections::{
	DiscordConfigLayer, HttpConfigLayer, LoggingConfigLayer, OAuthConfigLayer,
	VerificationConfigLayer,
};
use crate::snowflake;

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	LegacyJson = 15,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<GatekeeperConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<GatekeeperConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(GatekeeperConfigLayer::default())
	}
}

/// Flat `config.json` as deployed by the first generation of the bot.
///
/// Unknown keys are ignored so old files with extra entries keep loading.
#[derive(Debug, Default, Deserialize)]
struct LegacyConfigFile {
	#[serde(default)]
	bot_token: Option<SecretString>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt_string")]
	client_id: Option<String>,
	#[serde(default)]
	client_secret: Option<SecretString>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	guild_id: Option<u64>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	role_id: Option<u64>,
	#[serde(default, deserialize_with = "snowflake::deserialize_opt")]
	log_channel: Option<u64>,
	#[serde(default)]
	server_url: Option<String>,
}

impl From<LegacyConfigFile> for GatekeeperConfigLayer {
	fn from(legacy: LegacyConfigFile) -> Self {
		GatekeeperConfigLayer {
			http: Some(HttpConfigLayer {
				server_url: legacy.server_url,
				..Default::default()
			}),
			discord: Some(DiscordConfigLayer {
				bot_token: legacy.bot_token,
				guild_id: legacy.guild_id,
				role_id: legacy.role_id,
				log_channel: legacy.log_channel,
				..Default::default()
			}),
			oauth: Some(OAuthConfigLayer {
				client_id: legacy.client_id,
				client_secret: legacy.client_secret,
				..Default::default()
			}),
			..Default::default()
		}
	}
}

/// Legacy flat JSON configuration source.
pub struct LegacyJsonSource {
	path: PathBuf,
}

impl LegacyJsonSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `config.json` in the working directory.
	pub fn working_dir() -> Self {
		Self::new("config.json")
	}
}

impl ConfigSource for LegacyJsonSource {
	fn name(&self) -> &'static str {
		"legacy-json"
	}

	fn precedence(&self) -> Precedence {
		Precedence::LegacyJson
	}

	fn load(&self) -> Result<GatekeeperConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "legacy config not found, skipping");
			return Ok(GatekeeperConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading legacy config");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let legacy: LegacyConfigFile =
			serde_json::from_str(&content).map_err(|e| ConfigError::JsonParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from legacy JSON");
		Ok(legacy.into())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	/// `gatekeeper.toml` in the working directory.
	pub fn working_dir() -> Self {
		Self::new("gatekeeper.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<GatekeeperConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(GatekeeperConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: GatekeeperConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: GATEKEEPER_<FIELD>
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn process() -> Self {
		Self { vars: None }
	}

	/// Reads from a fixed map instead of the process environment.
	pub fn from_map(vars: HashMap<String, String>) -> Self {
		Self { vars: Some(vars) }
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parsed<T: std::str::FromStr>(
		&self,
		name: &str,
		kind: &str,
	) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn snowflake(&self, name: &str) -> Result<Option<u64>, ConfigError> {
		self.var(name)
			.map(|v| snowflake::parse_snowflake(name, &v))
			.transpose()
	}

	fn load_http(&self) -> Result<HttpConfigLayer, ConfigError> {
		Ok(HttpConfigLayer {
			host: self.var("GATEKEEPER_HOST"),
			port: self.parsed("GATEKEEPER_PORT", "u16")?,
			server_url: self.var("GATEKEEPER_SERVER_URL"),
		})
	}

	fn load_discord(&self) -> Result<DiscordConfigLayer, ConfigError> {
		Ok(DiscordConfigLayer {
			bot_token: self.var("GATEKEEPER_BOT_TOKEN").map(SecretString::new),
			guild_id: self.snowflake("GATEKEEPER_GUILD_ID")?,
			role_id: self.snowflake("GATEKEEPER_ROLE_ID")?,
			log_channel: self.snowflake("GATEKEEPER_LOG_CHANNEL")?,
			api_base_url: self.var("GATEKEEPER_DISCORD_API_URL"),
			gateway_url: self.var("GATEKEEPER_DISCORD_GATEWAY_URL"),
		})
	}

	fn load_oauth(&self) -> OAuthConfigLayer {
		OAuthConfigLayer {
			client_id: self.var("GATEKEEPER_CLIENT_ID"),
			client_secret: self.var("GATEKEEPER_CLIENT_SECRET").map(SecretString::new),
			scopes: None,
			authorize_url: self.var("GATEKEEPER_OAUTH_AUTHORIZE_URL"),
		}
	}

	fn load_verification(&self) -> Result<VerificationConfigLayer, ConfigError> {
		Ok(VerificationConfigLayer {
			handshake_ttl_secs: self.parsed("GATEKEEPER_HANDSHAKE_TTL_SECS", "u64")?,
			sweep_interval_secs: self.parsed("GATEKEEPER_SWEEP_INTERVAL_SECS", "u64")?,
			join_settle_delay_ms: self.parsed("GATEKEEPER_JOIN_SETTLE_DELAY_MS", "u64")?,
			member_lookup_attempts: self.parsed("GATEKEEPER_MEMBER_LOOKUP_ATTEMPTS", "u32")?,
			require_state: self.bool("GATEKEEPER_REQUIRE_STATE"),
		})
	}

	fn load_logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: self.var("GATEKEEPER_LOG"),
			// Read raw so an explicitly empty value can switch the file off.
			file: match &self.vars {
				Some(vars) => vars.get("GATEKEEPER_LOG_FILE").cloned(),
				None => std::env::var("GATEKEEPER_LOG_FILE").ok(),
			},
			file_level: self.var("GATEKEEPER_LOG_FILE_LEVEL"),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<GatekeeperConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(GatekeeperConfigLayer {
			http: Some(self.load_http()?),
			discord: Some(self.load_discord()?),
			oauth: Some(self.load_oauth()),
			verification: Some(self.load_verification()?),
			logging: Some(self.load_logging()),
		})
	}
}
