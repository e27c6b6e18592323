// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use gatekeeper_platform::{ChannelId, GuildId, Member, Platform, PlatformError, RoleId, UserId};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::AuditRecord;
use crate::state::VerificationState;

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
	pub guild_id: GuildId,
	pub role_id: RoleId,
	pub log_channel: Option<ChannelId>,
	pub handshake_ttl: Duration,
}

/// Decides and performs verified-role grants.
///
/// The state lock only guards the in-memory collections; it is released
/// before any platform call.
pub struct Coordinator {
	config: CoordinatorConfig,
	platform: Arc<dyn Platform>,
	state: Mutex<VerificationState>,
}

impl Coordinator {
	pub fn new(config: CoordinatorConfig, platform: Arc<dyn Platform>) -> Self {
		Self {
			config,
			platform,
			state: Mutex::new(VerificationState::default()),
		}
	}

	pub fn config(&self) -> &CoordinatorConfig {
		&self.config
	}

	pub fn platform(&self) -> &Arc<dyn Platform> {
		&self.platform
	}

	/// Grant the verified role to a settled member, or remember a screening
	/// one. Returns `None` for members of other guilds.
	#[instrument(skip(self, member), fields(member_id = %member.id(), pending = member.pending))]
	pub async fn on_join_or_verify(&self, member: &Member) -> Option<AuditRecord> {
		if member.guild_id != self.config.guild_id {
			return None;
		}

		let (member, role_added) = if member.pending {
			self.track_pending(member.id()).await;
			match self.recheck_pending(member).await {
				Some(settled) => {
					let role_added = self.grant_role(&settled).await;
					(settled, role_added)
				}
				None => (member.clone(), false),
			}
		} else {
			(member.clone(), self.grant_role(member).await)
		};

		let record = AuditRecord::new(&member, role_added, Utc::now());
		info!(
			role_added = record.role_added,
			still_pending = record.still_pending,
			"User authorized"
		);
		self.post_audit(&record).await;
		Some(record)
	}

	/// Re-run the grant when a tracked member clears screening.
	#[instrument(skip(self, before, after), fields(member_id = %before.id()))]
	pub async fn on_membership_update(&self, before: &Member, after: &Member) -> Option<AuditRecord> {
		if before.guild_id != self.config.guild_id || after.guild_id != self.config.guild_id {
			return None;
		}
		if !self.is_pending_tracked(before.id()).await {
			return None;
		}
		if !(before.pending && !after.pending) {
			debug!("membership update is not a screening-clear edge");
			return None;
		}

		info!("tracked member cleared screening");
		self.on_join_or_verify(after).await
	}

	/// Look the member up again once its ID is tracked. A screening-clear
	/// update that landed before tracking was dropped as untracked, so the
	/// snapshot we hold may already be stale.
	async fn recheck_pending(&self, member: &Member) -> Option<Member> {
		match self.platform.get_member(self.config.guild_id, member.id()).await {
			Ok(Some(fresh)) if !fresh.pending => {
				info!("pending member cleared screening before tracking");
				Some(fresh)
			}
			Ok(_) => None,
			Err(e) => {
				warn!(error = %e, "Failed to re-check pending member");
				None
			}
		}
	}

	pub async fn track_pending(&self, member_id: UserId) {
		if self.state.lock().await.pending.insert(member_id) {
			debug!(%member_id, "tracking pending member");
		}
	}

	pub async fn is_pending_tracked(&self, member_id: UserId) -> bool {
		self.state.lock().await.pending.contains(member_id)
	}

	pub async fn pending_count(&self) -> usize {
		self.state.lock().await.pending.len()
	}

	pub async fn issue_handshake(&self) -> String {
		self.issue_handshake_at(Utc::now()).await
	}

	pub async fn issue_handshake_at(&self, now: DateTime<Utc>) -> String {
		self.state.lock().await.handshakes.issue(now)
	}

	pub async fn consume_handshake(&self, token: &str) -> bool {
		self.consume_handshake_at(token, Utc::now()).await
	}

	pub async fn consume_handshake_at(&self, token: &str, now: DateTime<Utc>) -> bool {
		self
			.state
			.lock()
			.await
			.handshakes
			.consume(token, now, self.config.handshake_ttl)
	}

	pub async fn handshake_count(&self) -> usize {
		self.state.lock().await.handshakes.len()
	}

	pub async fn sweep_handshakes(&self) -> usize {
		self.sweep_handshakes_at(Utc::now()).await
	}

	pub async fn sweep_handshakes_at(&self, now: DateTime<Utc>) -> usize {
		let removed = self
			.state
			.lock()
			.await
			.handshakes
			.sweep(now, self.config.handshake_ttl);
		info!(removed, "swept expired handshakes");
		removed
	}

	async fn grant_role(&self, member: &Member) -> bool {
		let role = match self
			.platform
			.get_role(self.config.guild_id, self.config.role_id)
			.await
		{
			Ok(Some(role)) => role,
			Ok(None) => {
				error!(role_id = %self.config.role_id, "verified role not found in guild");
				return false;
			}
			Err(e) => {
				error!(error = %e, "failed to resolve verified role");
				return false;
			}
		};

		if member.has_role(role.id) {
			debug!(role = %role.name, "member already holds the verified role");
			return false;
		}

		match self.platform.add_role(member, role.id).await {
			Ok(()) => true,
			Err(PlatformError::Forbidden { code, message }) => {
				error!(code, %message, "No permissions to add the verified role");
				false
			}
			Err(e) => {
				error!(error = %e, "failed to add verified role");
				false
			}
		}
	}

	async fn post_audit(&self, record: &AuditRecord) {
		let Some(channel_id) = self.config.log_channel else {
			return;
		};
		match self.platform.send_audit(channel_id, &record.to_embed()).await {
			Ok(()) => {}
			Err(e) if e.is_forbidden() => {
				error!(%channel_id, "No permissions to send messages in log channel!");
			}
			Err(e) => {
				error!(%channel_id, error = %e, "failed to post audit record");
			}
		}
	}
}
