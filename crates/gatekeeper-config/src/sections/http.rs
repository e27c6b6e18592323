// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! HTTP listener and public URL configuration.

use serde::Deserialize;

use crate::ConfigError;

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3824;

/// HTTP configuration (runtime, fully resolved).
#[derive(Debug, Clone)]
pub struct HttpConfig {
	pub host: String,
	pub port: u16,
	/// Public base URL of the reverse proxy in front of Gatekeeper, without a
	/// trailing slash. `/authorize`, `/done` and `/error` hang off it.
	pub server_url: String,
}

impl HttpConfig {
	/// The redirect URI registered with the OAuth application.
	pub fn redirect_uri(&self) -> String {
		format!("{}/authorize", self.server_url)
	}

	pub fn done_url(&self) -> String {
		format!("{}/done", self.server_url)
	}

	pub fn error_base_url(&self) -> String {
		format!("{}/error", self.server_url)
	}
}

/// HTTP configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpConfigLayer {
	#[serde(default)]
	pub host: Option<String>,
	#[serde(default)]
	pub port: Option<u16>,
	#[serde(default)]
	pub server_url: Option<String>,
}

impl HttpConfigLayer {
	pub fn merge(&mut self, other: HttpConfigLayer) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
		if other.server_url.is_some() {
			self.server_url = other.server_url;
		}
	}

	pub fn finalize(self) -> Result<HttpConfig, ConfigError> {
		let server_url = self
			.server_url
			.filter(|s| !s.trim().is_empty())
			.ok_or(ConfigError::MissingField("server_url"))?;

		if !(server_url.starts_with("http://") || server_url.starts_with("https://")) {
			return Err(ConfigError::InvalidValue {
				key: "server_url".to_string(),
				message: format!("'{server_url}' must start with http:// or https://"),
			});
		}

		Ok(HttpConfig {
			host: self.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
			port: self.port.unwrap_or(DEFAULT_PORT),
			server_url: server_url.trim_end_matches('/').to_string(),
		})
	}
}
