// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use serde::Deserialize;
use std::path::PathBuf;

fn default_level() -> String {
	"info,tower_http=debug".to_string()
}

fn default_file() -> PathBuf {
	PathBuf::from("gatekeeper.log")
}

fn default_file_level() -> String {
	"warn".to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
	/// `EnvFilter` directive for stdout; `RUST_LOG` still wins when set.
	pub level: String,
	/// Diagnostics file truncated on every start. `None` disables it.
	pub file: Option<PathBuf>,
	pub file_level: String,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: default_level(),
			file: Some(default_file()),
			file_level: default_file_level(),
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	#[serde(default)]
	pub level: Option<String>,
	/// An empty string turns the file log off.
	#[serde(default)]
	pub file: Option<String>,
	#[serde(default)]
	pub file_level: Option<String>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.file.is_some() {
			self.file = other.file;
		}
		if other.file_level.is_some() {
			self.file_level = other.file_level;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		let file = match self.file {
			None => Some(default_file()),
			Some(path) if path.trim().is_empty() => None,
			Some(path) => Some(PathBuf::from(path)),
		};
		LoggingConfig {
			level: self.level.unwrap_or_else(default_level),
			file,
			file_level: self.file_level.unwrap_or_else(default_file_level),
		}
	}
}
