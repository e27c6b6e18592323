// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashSet;

use gatekeeper_platform::UserId;

use crate::handshake::HandshakeState;

/// Members seen screening during a join or verify. Never shrinks: an entry
/// means "was pending at some point this process lifetime".
#[derive(Debug, Default)]
pub struct PendingSet {
	members: HashSet<UserId>,
}

impl PendingSet {
	/// Returns true if the ID was not already tracked.
	pub fn insert(&mut self, id: UserId) -> bool {
		self.members.insert(id)
	}

	pub fn contains(&self, id: UserId) -> bool {
		self.members.contains(&id)
	}

	pub fn len(&self) -> usize {
		self.members.len()
	}

	pub fn is_empty(&self) -> bool {
		self.members.is_empty()
	}
}

/// Everything the coordinator owns, behind one lock.
#[derive(Debug, Default)]
pub struct VerificationState {
	pub pending: PendingSet,
	pub handshakes: HandshakeState,
}
