// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Last-seen member snapshots.
//!
//! Discord's `GUILD_MEMBER_UPDATE` carries only the new state, so the
//! previous state has to come from here. REST lookups and gateway events
//! both feed it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::types::{GuildId, Member, UserId};

#[derive(Debug, Clone, Default)]
pub struct MemberCache {
	inner: Arc<RwLock<HashMap<(GuildId, UserId), Member>>>,
}

impl MemberCache {
	pub fn new() -> Self {
		Self::default()
	}

	/// Store `member`, returning the snapshot it replaces.
	pub async fn upsert(&self, member: Member) -> Option<Member> {
		let key = (member.guild_id, member.id());
		self.inner.write().await.insert(key, member)
	}

	pub async fn get(&self, guild_id: GuildId, user_id: UserId) -> Option<Member> {
		self.inner.read().await.get(&(guild_id, user_id)).cloned()
	}

	pub async fn remove(&self, guild_id: GuildId, user_id: UserId) -> Option<Member> {
		self.inner.write().await.remove(&(guild_id, user_id))
	}

	pub async fn len(&self) -> usize {
		self.inner.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.inner.read().await.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::User;

	fn member(id: u64, pending: bool) -> Member {
		Member {
			guild_id: GuildId(1),
			user: User {
				id: UserId(id),
				username: format!("user{id}"),
				discriminator: None,
				global_name: None,
				bot: false,
			},
			roles: vec![],
			pending,
		}
	}

	#[tokio::test]
	async fn upsert_returns_previous_snapshot() {
		let cache = MemberCache::new();
		assert!(cache.upsert(member(999, true)).await.is_none());

		let before = cache.upsert(member(999, false)).await.unwrap();
		assert!(before.pending);
		assert!(!cache.get(GuildId(1), UserId(999)).await.unwrap().pending);
		assert_eq!(cache.len().await, 1);
	}

	#[tokio::test]
	async fn keys_are_per_guild() {
		let cache = MemberCache::new();
		cache.upsert(member(5, false)).await;
		assert!(cache.get(GuildId(2), UserId(5)).await.is_none());
		assert!(cache.remove(GuildId(1), UserId(5)).await.is_some());
		assert!(cache.is_empty().await);
	}
}
