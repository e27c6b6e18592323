// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Discord as seen by Gatekeeper.
//!
//! The [`Platform`] trait is the narrow surface the verification flow needs.
//! [`DiscordRest`] implements it over the HTTP API, [`GatewayConnection`]
//! streams membership events, and `FakePlatform` (feature `test-utils`)
//! stands in for both in tests.

pub mod cache;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod fake;
pub mod gateway;
pub mod platform;
pub mod ready;
pub mod rest;
pub mod types;

pub use cache::MemberCache;
pub use error::{GatewayError, PlatformError};
pub use gateway::{
	GatewayConfig, GatewayConnection, GatewayStats, GatewayStatus, INTENT_GUILDS,
	INTENT_GUILD_MEMBERS,
};
pub use platform::Platform;
pub use ready::ReadySignal;
pub use rest::DiscordRest;
pub use types::{
	ChannelId, Embed, EmbedField, Guild, GuildId, JoinOutcome, Member, MemberEvent, Role, RoleId,
	User, UserId,
};
