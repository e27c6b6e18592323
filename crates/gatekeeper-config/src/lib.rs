// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for Gatekeeper.
//!
//! Sources, lowest precedence first:
//! - built-in defaults
//! - legacy flat `config.json`
//! - `gatekeeper.toml`
//! - `GATEKEEPER_*` environment variables
//!
//! # Usage
//!
//! ```ignore
//! use gatekeeper_config::load_config;
//!
//! let config = load_config()?;
//! println!("listening on {}", config.socket_addr());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;
mod snowflake;

pub use error::ConfigError;
pub use layer::GatekeeperConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, LegacyJsonSource, Precedence, TomlSource,
};

use std::path::PathBuf;
use tracing::{debug, info};

/// Fully resolved Gatekeeper configuration.
#[derive(Debug, Clone)]
pub struct GatekeeperConfig {
	pub http: HttpConfig,
	pub discord: DiscordConfig,
	pub oauth: OAuthConfig,
	pub verification: VerificationConfig,
	pub logging: LoggingConfig,
}

impl GatekeeperConfig {
	/// Get the socket address string for binding.
	pub fn socket_addr(&self) -> String {
		format!("{}:{}", self.http.host, self.http.port)
	}
}

/// Load configuration from the working directory files and the environment.
pub fn load_config() -> Result<GatekeeperConfig, ConfigError> {
	load_config_with_files(None, None)
}

/// Load configuration with custom file paths. `None` falls back to the
/// working-directory defaults (`gatekeeper.toml`, `config.json`).
pub fn load_config_with_files(
	toml_path: Option<PathBuf>,
	legacy_json_path: Option<PathBuf>,
) -> Result<GatekeeperConfig, ConfigError> {
	let toml = toml_path.map_or_else(TomlSource::working_dir, TomlSource::new);
	let legacy = legacy_json_path.map_or_else(LegacyJsonSource::working_dir, LegacyJsonSource::new);

	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(legacy),
		Box::new(toml),
		Box::new(EnvSource::process()),
	])
}

/// Merge the given sources by precedence and finalize.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<GatekeeperConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = GatekeeperConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: GatekeeperConfigLayer) -> Result<GatekeeperConfig, ConfigError> {
	let http = layer.http.unwrap_or_default().finalize()?;
	let discord = layer.discord.unwrap_or_default().finalize()?;
	let oauth = layer.oauth.unwrap_or_default().finalize()?;
	let verification = layer.verification.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();

	validate_config(&verification)?;

	info!(
		host = %http.host,
		port = http.port,
		server_url = %http.server_url,
		guild_id = discord.guild_id,
		role_id = discord.role_id,
		log_channel = ?discord.log_channel,
		require_state = verification.require_state,
		"Gatekeeper configuration loaded"
	);

	Ok(GatekeeperConfig {
		http,
		discord,
		oauth,
		verification,
		logging,
	})
}

/// Validate cross-field configuration rules.
fn validate_config(verification: &VerificationConfig) -> Result<(), ConfigError> {
	if verification.handshake_ttl_secs == 0 {
		return Err(ConfigError::Validation(
			"handshake_ttl_secs must be greater than zero, otherwise every state token \
			 expires the moment it is issued"
				.to_string(),
		));
	}
	if verification.sweep_interval_secs == 0 {
		return Err(ConfigError::Validation(
			"sweep_interval_secs must be greater than zero".to_string(),
		));
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;
	use std::io::Write;

	fn env(pairs: &[(&str, &str)]) -> Box<dyn ConfigSource> {
		let vars: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		Box::new(EnvSource::from_map(vars))
	}

	fn legacy_file() -> tempfile::NamedTempFile {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		write!(
			file,
			r#"{{
				"bot_token": "legacy-bot",
				"client_id": "100",
				"client_secret": "legacy-secret",
				"guild_id": 1,
				"role_id": 2,
				"log_channel": 3,
				"server_url": "https://legacy.example.org"
			}}"#
		)
		.unwrap();
		file
	}

	#[test]
	fn legacy_json_alone_is_a_complete_config() {
		let file = legacy_file();
		let config = load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(LegacyJsonSource::new(file.path())),
		])
		.unwrap();

		assert_eq!(config.socket_addr(), "localhost:3824");
		assert_eq!(config.discord.guild_id, 1);
		assert_eq!(config.discord.log_channel, Some(3));
		assert_eq!(config.http.server_url, "https://legacy.example.org");
		assert_eq!(config.verification.handshake_ttl_secs, 600);
	}

	#[test]
	fn toml_overrides_legacy_and_env_overrides_toml() {
		let legacy = legacy_file();
		let mut toml = tempfile::NamedTempFile::new().unwrap();
		write!(
			toml,
			r#"
[http]
server_url = "https://toml.example.org"
port = 4000

[discord]
role_id = "20"
"#
		)
		.unwrap();

		// Pushed in reverse order; precedence decides, not position.
		let config = load_config_from_sources(vec![
			env(&[("GATEKEEPER_PORT", "5000")]),
			Box::new(TomlSource::new(toml.path())),
			Box::new(LegacyJsonSource::new(legacy.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.http.port, 5000);
		assert_eq!(config.http.server_url, "https://toml.example.org");
		assert_eq!(config.discord.role_id, 20);
		assert_eq!(config.discord.guild_id, 1);
		assert_eq!(config.oauth.client_secret.expose(), "legacy-secret");
	}

	#[test]
	fn missing_required_field_aborts() {
		let err = load_config_from_sources(vec![env(&[
			("GATEKEEPER_SERVER_URL", "https://verify.example.org"),
			("GATEKEEPER_BOT_TOKEN", "bot"),
			("GATEKEEPER_GUILD_ID", "1"),
		])])
		.unwrap_err();
		assert!(matches!(err, ConfigError::MissingField("role_id")));
	}

	#[test]
	fn zero_ttl_is_rejected() {
		let file = legacy_file();
		let err = load_config_from_sources(vec![
			Box::new(LegacyJsonSource::new(file.path())),
			env(&[("GATEKEEPER_HANDSHAKE_TTL_SECS", "0")]),
		])
		.unwrap_err();
		assert!(matches!(err, ConfigError::Validation(_)));
	}

	#[test]
	fn resolved_config_debug_redacts_secrets() {
		let file = legacy_file();
		let config =
			load_config_from_sources(vec![Box::new(LegacyJsonSource::new(file.path()))]).unwrap();
		let debug = format!("{config:?}");
		assert!(!debug.contains("legacy-bot"));
		assert!(!debug.contains("legacy-secret"));
	}

	mod proptests {
		use super::*;
		use proptest::prelude::*;

		proptest! {
			#[test]
			fn env_port_always_wins(port in 1u16..u16::MAX) {
				let file = legacy_file();
				let port_text = port.to_string();
				let config = load_config_from_sources(vec![
					Box::new(LegacyJsonSource::new(file.path())),
					env(&[("GATEKEEPER_PORT", port_text.as_str())]),
				])
				.unwrap();
				prop_assert_eq!(config.http.port, port);
			}
		}
	}
}
