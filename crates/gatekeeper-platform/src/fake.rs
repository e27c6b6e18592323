// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`Platform`] for tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use gatekeeper_common_secret::SecretString;

use crate::error::PlatformError;
use crate::platform::Platform;
use crate::ready::ReadySignal;
use crate::types::{
	ChannelId, Embed, Guild, GuildId, JoinOutcome, Member, Role, RoleId, User, UserId,
};

#[derive(Debug, Default)]
struct FakeState {
	guilds: HashMap<GuildId, Guild>,
	members: HashMap<(GuildId, UserId), Member>,
	/// Users who will appear as members once joined, with the number of
	/// lookups that still miss after the join.
	joinable: HashMap<(GuildId, UserId), (Member, u32)>,
	/// Joined but not yet visible to lookups.
	settling: HashMap<(GuildId, UserId), (Member, u32)>,
	role_grants: Vec<(UserId, RoleId)>,
	audits: Vec<(ChannelId, Embed)>,
	joins: Vec<(GuildId, UserId)>,
	member_lookups: u32,
	guild_lookups: u32,
	forbid_add_role: bool,
	forbid_send: bool,
	join_error: Option<(u64, String)>,
}

/// Scriptable stand-in for Discord. Every call is recorded.
#[derive(Debug, Default)]
pub struct FakePlatform {
	state: Mutex<FakeState>,
	ready: ReadySignal,
}

impl FakePlatform {
	/// A ready platform with no guilds.
	pub fn new() -> Self {
		Self {
			state: Mutex::default(),
			ready: ReadySignal::ready(),
		}
	}

	pub fn with_ready_signal(ready: ReadySignal) -> Self {
		Self {
			state: Mutex::default(),
			ready,
		}
	}

	fn state(&self) -> MutexGuard<'_, FakeState> {
		self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
	}

	pub fn add_guild(&self, id: GuildId, name: &str, roles: &[(RoleId, &str)]) {
		let guild = Guild {
			id,
			name: name.to_string(),
			roles: roles
				.iter()
				.map(|(id, name)| Role {
					id: *id,
					name: name.to_string(),
				})
				.collect(),
		};
		self.state().guilds.insert(id, guild);
	}

	pub fn add_member(&self, member: Member) {
		self.state()
			.members
			.insert((member.guild_id, member.id()), member);
	}

	/// `member` becomes visible after a successful `join_guild`, once
	/// `hidden_lookups` further `get_member` calls have missed.
	pub fn allow_join(&self, member: Member, hidden_lookups: u32) {
		self.state()
			.joinable
			.insert((member.guild_id, member.id()), (member, hidden_lookups));
	}

	pub fn forbid_add_role(&self) {
		self.state().forbid_add_role = true;
	}

	pub fn forbid_send(&self) {
		self.state().forbid_send = true;
	}

	pub fn fail_join(&self, code: u64, message: &str) {
		self.state().join_error = Some((code, message.to_string()));
	}

	pub fn member(&self, guild_id: GuildId, user_id: UserId) -> Option<Member> {
		self.state().members.get(&(guild_id, user_id)).cloned()
	}

	pub fn set_pending(&self, guild_id: GuildId, user_id: UserId, pending: bool) -> Option<Member> {
		let mut state = self.state();
		let member = state.members.get_mut(&(guild_id, user_id))?;
		member.pending = pending;
		Some(member.clone())
	}

	pub fn role_grants(&self) -> Vec<(UserId, RoleId)> {
		self.state().role_grants.clone()
	}

	pub fn audits(&self) -> Vec<(ChannelId, Embed)> {
		self.state().audits.clone()
	}

	pub fn joins(&self) -> Vec<(GuildId, UserId)> {
		self.state().joins.clone()
	}

	pub fn member_lookups(&self) -> u32 {
		self.state().member_lookups
	}

	/// Total number of calls that reached Discord.
	pub fn outbound_calls(&self) -> usize {
		let state = self.state();
		state.role_grants.len()
			+ state.audits.len()
			+ state.joins.len()
			+ state.member_lookups as usize
			+ state.guild_lookups as usize
	}
}

/// A plain member, handy for building fixtures.
pub fn member(guild_id: GuildId, user_id: u64, pending: bool) -> Member {
	Member {
		guild_id,
		user: User {
			id: UserId(user_id),
			username: format!("user{user_id}"),
			discriminator: Some("0".to_string()),
			global_name: None,
			bot: false,
		},
		roles: Vec::new(),
		pending,
	}
}

#[async_trait]
impl Platform for FakePlatform {
	async fn wait_until_ready(&self) {
		self.ready.wait().await
	}

	fn is_ready(&self) -> bool {
		self.ready.is_ready()
	}

	async fn get_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, PlatformError> {
		let mut state = self.state();
		state.guild_lookups += 1;
		Ok(state.guilds.get(&guild_id).cloned())
	}

	async fn get_member(
		&self,
		guild_id: GuildId,
		user_id: UserId,
	) -> Result<Option<Member>, PlatformError> {
		let mut state = self.state();
		state.member_lookups += 1;
		let key = (guild_id, user_id);
		if let Some(member) = state.members.get(&key) {
			return Ok(Some(member.clone()));
		}
		match state.settling.remove(&key) {
			Some((member, 0)) => {
				state.members.insert(key, member.clone());
				Ok(Some(member))
			}
			Some((member, hidden)) => {
				state.settling.insert(key, (member, hidden - 1));
				Ok(None)
			}
			None => Ok(None),
		}
	}

	async fn add_role(&self, member: &Member, role_id: RoleId) -> Result<(), PlatformError> {
		let mut state = self.state();
		if state.forbid_add_role {
			return Err(PlatformError::Forbidden {
				code: 50013,
				message: "Missing Permissions".to_string(),
			});
		}
		let stored = state
			.members
			.get_mut(&(member.guild_id, member.id()))
			.ok_or_else(|| PlatformError::Api {
				status: 404,
				code: 10007,
				message: "Unknown Member".to_string(),
			})?;
		if stored.pending {
			// Discord refuses role edits on members still in screening.
			return Err(PlatformError::Forbidden {
				code: 50013,
				message: "Member is pending".to_string(),
			});
		}
		if !stored.has_role(role_id) {
			stored.roles.push(role_id);
		}
		state.role_grants.push((member.id(), role_id));
		Ok(())
	}

	async fn join_guild(
		&self,
		guild_id: GuildId,
		user_id: UserId,
		_access_token: &SecretString,
	) -> Result<JoinOutcome, PlatformError> {
		let mut state = self.state();
		state.joins.push((guild_id, user_id));
		if let Some((code, message)) = state.join_error.clone() {
			return Err(PlatformError::Api {
				status: 400,
				code,
				message,
			});
		}
		if state.members.contains_key(&(guild_id, user_id)) {
			return Ok(JoinOutcome::AlreadyMember);
		}
		let (member, hidden) = state
			.joinable
			.remove(&(guild_id, user_id))
			.ok_or_else(|| PlatformError::Api {
				status: 403,
				code: 50025,
				message: "Invalid OAuth2 access token".to_string(),
			})?;
		if hidden == 0 {
			state.members.insert((guild_id, user_id), member);
		} else {
			state.settling.insert((guild_id, user_id), (member, hidden));
		}
		Ok(JoinOutcome::Joined)
	}

	async fn send_audit(&self, channel_id: ChannelId, embed: &Embed) -> Result<(), PlatformError> {
		let mut state = self.state();
		if state.forbid_send {
			return Err(PlatformError::Forbidden {
				code: 50013,
				message: "Missing Permissions".to_string(),
			});
		}
		state.audits.push((channel_id, embed.clone()));
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const GUILD: GuildId = GuildId(1);
	const ROLE: RoleId = RoleId(7);

	#[tokio::test]
	async fn joined_member_appears_after_hidden_lookups() {
		let fake = FakePlatform::new();
		fake.allow_join(member(GUILD, 999, true), 2);

		let outcome = fake
			.join_guild(GUILD, UserId(999), &SecretString::from("t"))
			.await
			.unwrap();
		assert_eq!(outcome, JoinOutcome::Joined);

		assert!(fake.get_member(GUILD, UserId(999)).await.unwrap().is_none());
		assert!(fake.get_member(GUILD, UserId(999)).await.unwrap().is_none());
		assert!(fake.get_member(GUILD, UserId(999)).await.unwrap().is_some());
		assert_eq!(fake.member_lookups(), 3);
	}

	#[tokio::test]
	async fn pending_members_refuse_roles() {
		let fake = FakePlatform::new();
		let m = member(GUILD, 5, true);
		fake.add_member(m.clone());
		assert!(fake.add_role(&m, ROLE).await.unwrap_err().is_forbidden());

		fake.set_pending(GUILD, UserId(5), false);
		fake.add_role(&m, ROLE).await.unwrap();
		assert!(fake.member(GUILD, UserId(5)).unwrap().has_role(ROLE));
	}

	#[tokio::test]
	async fn default_get_role_goes_through_guild() {
		let fake = FakePlatform::new();
		fake.add_guild(GUILD, "Guild", &[(ROLE, "Verified")]);
		assert_eq!(
			fake.get_role(GUILD, ROLE).await.unwrap().unwrap().name,
			"Verified"
		);
		assert!(fake.get_role(GUILD, RoleId(8)).await.unwrap().is_none());
	}
}
