// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-shot OAuth `state` tokens.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;

pub const HANDSHAKE_TOKEN_BYTES: usize = 32;

/// Token → issue time. Entries are removed when consumed or swept.
#[derive(Debug, Default)]
pub struct HandshakeState {
	issued: HashMap<String, DateTime<Utc>>,
}

fn age_reached(issued_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
	// A clock that went backwards yields a negative age, which never expires.
	match (now - issued_at).to_std() {
		Ok(age) => age >= ttl,
		Err(_) => false,
	}
}

impl HandshakeState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn issue(&mut self, now: DateTime<Utc>) -> String {
		let mut bytes = [0u8; HANDSHAKE_TOKEN_BYTES];
		rand::thread_rng().fill_bytes(&mut bytes);
		let token = hex::encode(bytes);
		self.issued.insert(token.clone(), now);
		token
	}

	/// Remove `token`; true if it was known and younger than `ttl`.
	pub fn consume(&mut self, token: &str, now: DateTime<Utc>, ttl: Duration) -> bool {
		match self.issued.remove(token) {
			Some(issued_at) => !age_reached(issued_at, now, ttl),
			None => false,
		}
	}

	/// Drop every entry aged `>= ttl`. Returns how many were dropped.
	pub fn sweep(&mut self, now: DateTime<Utc>, ttl: Duration) -> usize {
		let before = self.issued.len();
		self
			.issued
			.retain(|_, issued_at| !age_reached(*issued_at, now, ttl));
		before - self.issued.len()
	}

	pub fn len(&self) -> usize {
		self.issued.len()
	}

	pub fn is_empty(&self) -> bool {
		self.issued.is_empty()
	}

	#[cfg(test)]
	pub(crate) fn insert_at(&mut self, token: &str, issued_at: DateTime<Utc>) {
		self.issued.insert(token.to_string(), issued_at);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeDelta;
	use proptest::prelude::*;

	const TTL: Duration = Duration::from_secs(600);

	#[test]
	fn tokens_are_64_hex_chars_and_unique() {
		let mut state = HandshakeState::new();
		let now = Utc::now();
		let a = state.issue(now);
		let b = state.issue(now);
		assert_eq!(a.len(), 64);
		assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
		assert_ne!(a, b);
		assert_eq!(state.len(), 2);
	}

	#[test]
	fn consume_is_one_shot() {
		let mut state = HandshakeState::new();
		let now = Utc::now();
		let token = state.issue(now);
		assert!(state.consume(&token, now, TTL));
		assert!(!state.consume(&token, now, TTL));
		assert!(!state.consume("unknown", now, TTL));
	}

	#[test]
	fn expired_token_is_consumed_but_rejected() {
		let mut state = HandshakeState::new();
		let issued = Utc::now();
		let token = state.issue(issued);
		assert!(!state.consume(&token, issued + TimeDelta::seconds(600), TTL));
		assert!(state.is_empty());
	}

	#[test]
	fn sweep_boundary_is_inclusive() {
		let mut state = HandshakeState::new();
		let now = Utc::now();
		state.insert_at("exact", now - TimeDelta::seconds(600));
		state.insert_at("older", now - TimeDelta::seconds(601));
		state.insert_at("fresh", now - TimeDelta::seconds(599));

		assert_eq!(state.sweep(now, TTL), 2);
		assert_eq!(state.len(), 1);
		assert_eq!(state.sweep(now, TTL), 0);
	}

	#[test]
	fn future_issue_time_is_kept() {
		let mut state = HandshakeState::new();
		let now = Utc::now();
		state.insert_at("skewed", now + TimeDelta::seconds(30));
		assert_eq!(state.sweep(now, TTL), 0);
	}

	proptest! {
		#[test]
		fn sweep_removes_exactly_the_aged_entries(ages in proptest::collection::vec(0i64..1200, 0..40)) {
			let mut state = HandshakeState::new();
			let now = Utc::now();
			for (i, age) in ages.iter().enumerate() {
				state.insert_at(&format!("t{i}"), now - TimeDelta::seconds(*age));
			}
			let expected = ages.iter().filter(|age| **age >= 600).count();

			prop_assert_eq!(state.sweep(now, TTL), expected);
			prop_assert_eq!(state.len(), ages.len() - expected);
			prop_assert_eq!(state.sweep(now, TTL), 0);
		}
	}
}
