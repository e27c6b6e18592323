// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Timing knobs for the verification coordinator and callback flow.

use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct VerificationConfig {
	pub handshake_ttl_secs: u64,
	pub sweep_interval_secs: u64,
	/// Pause between joining a user and looking them up again.
	pub join_settle_delay_ms: u64,
	pub member_lookup_attempts: u32,
	/// Reject callbacks that carry no `state` parameter.
	pub require_state: bool,
}

impl Default for VerificationConfig {
	fn default() -> Self {
		Self {
			handshake_ttl_secs: 600,
			sweep_interval_secs: 600,
			join_settle_delay_ms: 1000,
			member_lookup_attempts: 3,
			require_state: false,
		}
	}
}

impl VerificationConfig {
	pub fn handshake_ttl(&self) -> Duration {
		Duration::from_secs(self.handshake_ttl_secs)
	}

	pub fn sweep_interval(&self) -> Duration {
		Duration::from_secs(self.sweep_interval_secs)
	}

	pub fn join_settle_delay(&self) -> Duration {
		Duration::from_millis(self.join_settle_delay_ms)
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerificationConfigLayer {
	#[serde(default)]
	pub handshake_ttl_secs: Option<u64>,
	#[serde(default)]
	pub sweep_interval_secs: Option<u64>,
	#[serde(default)]
	pub join_settle_delay_ms: Option<u64>,
	#[serde(default)]
	pub member_lookup_attempts: Option<u32>,
	#[serde(default)]
	pub require_state: Option<bool>,
}

impl VerificationConfigLayer {
	pub fn merge(&mut self, other: VerificationConfigLayer) {
		if other.handshake_ttl_secs.is_some() {
			self.handshake_ttl_secs = other.handshake_ttl_secs;
		}
		if other.sweep_interval_secs.is_some() {
			self.sweep_interval_secs = other.sweep_interval_secs;
		}
		if other.join_settle_delay_ms.is_some() {
			self.join_settle_delay_ms = other.join_settle_delay_ms;
		}
		if other.member_lookup_attempts.is_some() {
			self.member_lookup_attempts = other.member_lookup_attempts;
		}
		if other.require_state.is_some() {
			self.require_state = other.require_state;
		}
	}

	pub fn finalize(self) -> VerificationConfig {
		let defaults = VerificationConfig::default();
		VerificationConfig {
			handshake_ttl_secs: self.handshake_ttl_secs.unwrap_or(defaults.handshake_ttl_secs),
			sweep_interval_secs: self
				.sweep_interval_secs
				.unwrap_or(defaults.sweep_interval_secs),
			join_settle_delay_ms: self
				.join_settle_delay_ms
				.unwrap_or(defaults.join_settle_delay_ms),
			member_lookup_attempts: self
				.member_lookup_attempts
				.unwrap_or(defaults.member_lookup_attempts)
				.max(1),
			require_state: self.require_state.unwrap_or(defaults.require_state),
		}
	}
}
