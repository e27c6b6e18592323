// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Discord model types, reduced to the fields Gatekeeper reads.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! snowflake_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
		pub struct $name(pub u64);

		impl $name {
			pub const fn new(id: u64) -> Self {
				Self(id)
			}

			pub const fn get(self) -> u64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl From<u64> for $name {
			fn from(id: u64) -> Self {
				Self(id)
			}
		}

		// Discord sends IDs as strings to keep JavaScript clients exact.
		impl Serialize for $name {
			fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
				serializer.collect_str(&self.0)
			}
		}

		impl<'de> Deserialize<'de> for $name {
			fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
				deserialize_snowflake(deserializer).map(Self)
			}
		}
	};
}

snowflake_id!(
	/// A guild (community server).
	GuildId
);
snowflake_id!(UserId);
snowflake_id!(RoleId);
snowflake_id!(ChannelId);

fn deserialize_snowflake<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Raw {
		Number(u64),
		String(String),
	}

	match Raw::deserialize(deserializer)? {
		Raw::Number(n) => Ok(n),
		Raw::String(s) => s
			.parse()
			.map_err(|_| serde::de::Error::custom(format!("invalid snowflake '{s}'"))),
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
	pub id: UserId,
	pub username: String,
	#[serde(default)]
	pub discriminator: Option<String>,
	#[serde(default)]
	pub global_name: Option<String>,
	#[serde(default)]
	pub bot: bool,
}

impl User {
	/// `name#1234` for legacy accounts, plain username otherwise.
	pub fn tag(&self) -> String {
		match self.discriminator.as_deref() {
			Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.username),
			_ => self.username.clone(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
	pub id: RoleId,
	pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
	pub id: GuildId,
	pub name: String,
	#[serde(default)]
	pub roles: Vec<Role>,
}

impl Guild {
	pub fn role(&self, id: RoleId) -> Option<&Role> {
		self.roles.iter().find(|r| r.id == id)
	}
}

/// A guild member as seen at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
	pub guild_id: GuildId,
	pub user: User,
	pub roles: Vec<RoleId>,
	/// Still behind Membership Screening. Role changes are refused while set.
	pub pending: bool,
}

impl Member {
	pub fn id(&self) -> UserId {
		self.user.id
	}

	pub fn mention(&self) -> String {
		format!("<@{}>", self.user.id)
	}

	pub fn has_role(&self, role: RoleId) -> bool {
		self.roles.contains(&role)
	}
}

/// Member object as it arrives over REST and the gateway. REST omits
/// `guild_id`; gateway member events include it.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct MemberPayload {
	pub user: User,
	#[serde(default)]
	pub roles: Vec<RoleId>,
	#[serde(default)]
	pub pending: bool,
	#[serde(default)]
	pub guild_id: Option<GuildId>,
}

impl MemberPayload {
	pub fn into_member(self, fallback_guild: GuildId) -> Member {
		Member {
			guild_id: self.guild_id.unwrap_or(fallback_guild),
			user: self.user,
			roles: self.roles,
			pending: self.pending,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbedField {
	pub name: String,
	pub value: String,
	pub inline: bool,
}

/// Rich message body posted to the audit channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Embed {
	pub title: String,
	#[serde(rename = "color")]
	pub colour: u32,
	pub fields: Vec<EmbedField>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub timestamp: Option<DateTime<Utc>>,
}

impl Embed {
	pub fn new(title: impl Into<String>, colour: u32) -> Self {
		Self {
			title: title.into(),
			colour,
			fields: Vec::new(),
			timestamp: None,
		}
	}

	pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
		self.fields.push(EmbedField {
			name: name.into(),
			value: value.into(),
			inline,
		});
		self
	}

	pub fn timestamp(mut self, at: DateTime<Utc>) -> Self {
		self.timestamp = Some(at);
		self
	}

	pub fn field_value(&self, name: &str) -> Option<&str> {
		self
			.fields
			.iter()
			.find(|f| f.name == name)
			.map(|f| f.value.as_str())
	}
}

/// Result of adding a user to a guild with their OAuth token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
	Joined,
	AlreadyMember,
}

/// Membership notifications from the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberEvent {
	Joined(Member),
	Updated { before: Member, after: Member },
}

impl MemberEvent {
	pub fn member_id(&self) -> UserId {
		match self {
			MemberEvent::Joined(member) => member.id(),
			MemberEvent::Updated { after, .. } => after.id(),
		}
	}
}
