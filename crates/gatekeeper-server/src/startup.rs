// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use gatekeeper_platform::{User, UserId};
use tracing::info;

/// Manage Roles and Create Instant Invite.
pub const BOT_PERMISSIONS: u64 = 268_435_457;

pub fn invite_url(bot_id: UserId) -> String {
	format!(
		"https://discord.com/oauth2/authorize?client_id={bot_id}&scope=bot&permissions={BOT_PERMISSIONS}"
	)
}

pub fn log_ready_banner(bot: &User, server_url: &str) {
	info!("------ Logged in as {} - {} ------", bot.username, bot.id);
	info!("Invite URL: {}", invite_url(bot.id));
	info!("Gatekeeper URL: {}", server_url);
}
