// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use gatekeeper_common_secret::SecretString;

use crate::error::PlatformError;
use crate::types::{ChannelId, Embed, Guild, GuildId, JoinOutcome, Member, Role, RoleId, UserId};

/// The platform operations the verification flow depends on.
///
/// Lookups return `Ok(None)` when the object does not exist; `Err` is kept for
/// failures where the answer is unknown.
#[async_trait]
pub trait Platform: Send + Sync {
	/// Resolves once the bot session is established.
	async fn wait_until_ready(&self);

	fn is_ready(&self) -> bool;

	async fn get_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, PlatformError>;

	async fn get_role(
		&self,
		guild_id: GuildId,
		role_id: RoleId,
	) -> Result<Option<Role>, PlatformError> {
		Ok(self
			.get_guild(guild_id)
			.await?
			.and_then(|guild| guild.role(role_id).cloned()))
	}

	async fn get_member(
		&self,
		guild_id: GuildId,
		user_id: UserId,
	) -> Result<Option<Member>, PlatformError>;

	async fn add_role(&self, member: &Member, role_id: RoleId) -> Result<(), PlatformError>;

	/// Add a user to the guild using their OAuth access token
	/// (`guilds.join` scope).
	async fn join_guild(
		&self,
		guild_id: GuildId,
		user_id: UserId,
		access_token: &SecretString,
	) -> Result<JoinOutcome, PlatformError>;

	async fn send_audit(&self, channel_id: ChannelId, embed: &Embed) -> Result<(), PlatformError>;
}
