// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single consumer for gateway membership events.

use std::sync::Arc;

use gatekeeper_platform::MemberEvent;
use gatekeeper_verification::{AuditRecord, Coordinator};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Drains `events` in arrival order until every sender is dropped.
pub fn spawn_event_loop(
	coordinator: Arc<Coordinator>,
	mut events: mpsc::Receiver<MemberEvent>,
) -> JoinHandle<()> {
	tokio::spawn(async move {
		while let Some(event) = events.recv().await {
			handle_event(&coordinator, event).await;
		}
		info!("member event stream closed");
	})
}

pub async fn handle_event(coordinator: &Coordinator, event: MemberEvent) -> Option<AuditRecord> {
	match event {
		// Joining alone is not a verification; the gateway already cached it.
		MemberEvent::Joined(member) => {
			debug!(member_id = %member.id(), pending = member.pending, "member joined");
			None
		}
		MemberEvent::Updated { before, after } => {
			coordinator.on_membership_update(&before, &after).await
		}
	}
}
