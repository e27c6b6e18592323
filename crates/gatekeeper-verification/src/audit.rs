// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use chrono::{DateTime, Utc};
use gatekeeper_platform::{Embed, Member, UserId};
use serde::Serialize;

pub const AUDIT_TITLE: &str = "User Authorized";
/// rgb(128, 0, 128)
pub const AUDIT_COLOUR: u32 = 0x800080;

/// One grant decision. Posted to the audit channel, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
	pub member_id: UserId,
	pub member_tag: String,
	pub role_added: bool,
	pub still_pending: bool,
	pub at: DateTime<Utc>,
}

impl AuditRecord {
	pub fn new(member: &Member, role_added: bool, at: DateTime<Utc>) -> Self {
		Self {
			member_id: member.id(),
			member_tag: member.user.tag(),
			role_added,
			still_pending: member.pending,
			at,
		}
	}

	pub fn role_added_label(&self) -> &'static str {
		if self.role_added {
			"True"
		} else if self.still_pending {
			"False, user still pending"
		} else {
			"False"
		}
	}

	pub fn to_embed(&self) -> Embed {
		Embed::new(AUDIT_TITLE, AUDIT_COLOUR)
			.field(
				"User",
				format!("<@{}> ({})", self.member_id, self.member_tag),
				true,
			)
			.field("Verified Role Added", self.role_added_label(), true)
			.timestamp(self.at)
	}
}
