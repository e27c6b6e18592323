// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tracing setup: filtered stdout plus a WARN+ diagnostics file.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use gatekeeper_config::LoggingConfig;
use tracing_subscriber::{
	filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Create (or truncate) the diagnostics file.
pub fn open_log_file(path: &Path) -> std::io::Result<File> {
	File::create(path)
}

/// `RUST_LOG` wins over the configured stdout filter when set.
pub fn init_tracing(config: &LoggingConfig) -> anyhow::Result<()> {
	let stdout_filter = EnvFilter::try_from_default_env()
		.or_else(|_| EnvFilter::try_new(&config.level))
		.with_context(|| format!("invalid log filter `{}`", config.level))?;

	let file_layer = match &config.file {
		Some(path) => {
			let file = open_log_file(path)
				.with_context(|| format!("failed to open log file {}", path.display()))?;
			let level: LevelFilter = config
				.file_level
				.parse()
				.with_context(|| format!("invalid file log level `{}`", config.file_level))?;
			Some(
				fmt::layer()
					.with_writer(Arc::new(file))
					.with_ansi(false)
					.with_filter(level),
			)
		}
		None => None,
	};

	tracing_subscriber::registry()
		.with(fmt::layer().with_filter(stdout_filter))
		.with(file_layer)
		.try_init()
		.context("failed to install tracing subscriber")?;

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn log_file_is_truncated_on_open() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("gatekeeper.log");
		std::fs::write(&path, "stale line from the last run\n").unwrap();

		let mut file = open_log_file(&path).unwrap();
		writeln!(file, "fresh").unwrap();
		drop(file);

		assert_eq!(std::fs::read_to_string(&path).unwrap(), "fresh\n");
	}

	#[test]
	fn file_level_parses_like_the_config_default() {
		let level: LevelFilter = LoggingConfig::default().file_level.parse().unwrap();
		assert_eq!(level, LevelFilter::WARN);
	}
}
