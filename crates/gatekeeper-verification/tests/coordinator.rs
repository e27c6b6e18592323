// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use gatekeeper_platform::fake::{member, FakePlatform};
use gatekeeper_platform::{ChannelId, GuildId, Member, RoleId, UserId};
use gatekeeper_verification::{Coordinator, CoordinatorConfig};
use proptest::prelude::*;

const GUILD: GuildId = GuildId(1);
const ROLE: RoleId = RoleId(7);
const LOG: ChannelId = ChannelId(42);

fn setup(log_channel: Option<ChannelId>) -> (Arc<FakePlatform>, Coordinator) {
	let fake = Arc::new(FakePlatform::new());
	fake.add_guild(GUILD, "Test Guild", &[(ROLE, "Verified")]);
	let coordinator = Coordinator::new(
		CoordinatorConfig {
			guild_id: GUILD,
			role_id: ROLE,
			log_channel,
			handshake_ttl: Duration::from_secs(600),
		},
		fake.clone(),
	);
	(fake, coordinator)
}

fn settled(id: u64) -> Member {
	member(GUILD, id, false)
}

fn screening(id: u64) -> Member {
	member(GUILD, id, true)
}

#[tokio::test]
async fn settled_member_gets_role_and_one_audit() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(settled(5));

	let record = coordinator.on_join_or_verify(&settled(5)).await.unwrap();

	assert!(record.role_added);
	assert!(!record.still_pending);
	assert!(fake.member(GUILD, UserId(5)).unwrap().has_role(ROLE));
	assert_eq!(fake.role_grants(), vec![(UserId(5), ROLE)]);

	let audits = fake.audits();
	assert_eq!(audits.len(), 1);
	assert_eq!(audits[0].0, LOG);
	assert_eq!(audits[0].1.field_value("Verified Role Added"), Some("True"));
	assert_eq!(coordinator.pending_count().await, 0);
}

#[tokio::test]
async fn pending_member_is_tracked_without_role_mutation() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(screening(999));

	let first = coordinator.on_join_or_verify(&screening(999)).await.unwrap();
	let second = coordinator.on_join_or_verify(&screening(999)).await.unwrap();

	assert!(!first.role_added && first.still_pending);
	assert!(!second.role_added);
	assert!(fake.role_grants().is_empty());
	assert!(coordinator.is_pending_tracked(UserId(999)).await);
	assert_eq!(coordinator.pending_count().await, 1);
	assert_eq!(
		fake.audits()[0].1.field_value("Verified Role Added"),
		Some("False, user still pending")
	);
}

#[tokio::test]
async fn other_guild_is_ignored_silently() {
	let (fake, coordinator) = setup(Some(LOG));
	let stranger = member(GuildId(2), 5, false);

	assert!(coordinator.on_join_or_verify(&stranger).await.is_none());
	assert!(coordinator
		.on_membership_update(&member(GuildId(2), 5, true), &stranger)
		.await
		.is_none());
	assert_eq!(fake.outbound_calls(), 0);
}

#[tokio::test]
async fn role_already_held_is_not_granted_again() {
	let (fake, coordinator) = setup(Some(LOG));
	let mut holder = settled(5);
	holder.roles.push(ROLE);
	fake.add_member(holder.clone());

	let record = coordinator.on_join_or_verify(&holder).await.unwrap();

	assert!(!record.role_added);
	assert!(fake.role_grants().is_empty());
	assert_eq!(fake.audits()[0].1.field_value("Verified Role Added"), Some("False"));
}

#[tokio::test]
async fn missing_role_reports_not_added() {
	let fake = Arc::new(FakePlatform::new());
	fake.add_guild(GUILD, "Test Guild", &[]);
	fake.add_member(settled(5));
	let coordinator = Coordinator::new(
		CoordinatorConfig {
			guild_id: GUILD,
			role_id: ROLE,
			log_channel: None,
			handshake_ttl: Duration::from_secs(600),
		},
		fake.clone(),
	);

	let record = coordinator.on_join_or_verify(&settled(5)).await.unwrap();
	assert!(!record.role_added);
	assert!(fake.role_grants().is_empty());
}

#[tokio::test]
async fn grant_failure_is_swallowed() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(settled(5));
	fake.forbid_add_role();

	let record = coordinator.on_join_or_verify(&settled(5)).await.unwrap();

	assert!(!record.role_added);
	assert_eq!(fake.audits().len(), 1);
}

#[tokio::test]
async fn audit_post_failure_does_not_escape() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(settled(5));
	fake.forbid_send();

	let record = coordinator.on_join_or_verify(&settled(5)).await.unwrap();

	assert!(record.role_added);
	assert!(fake.audits().is_empty());
}

#[tokio::test]
async fn no_log_channel_skips_audit_post() {
	let (fake, coordinator) = setup(None);
	fake.add_member(settled(5));

	assert!(coordinator.on_join_or_verify(&settled(5)).await.is_some());
	assert!(fake.audits().is_empty());
}

#[tokio::test]
async fn screening_clear_edge_grants_tracked_member() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(screening(999));
	coordinator.on_join_or_verify(&screening(999)).await;

	let after = fake.set_pending(GUILD, UserId(999), false).unwrap();
	let record = coordinator
		.on_membership_update(&screening(999), &after)
		.await
		.unwrap();

	assert!(record.role_added);
	assert!(fake.member(GUILD, UserId(999)).unwrap().has_role(ROLE));
	assert!(coordinator.is_pending_tracked(UserId(999)).await);
	assert_eq!(fake.audits().len(), 2);
}

#[tokio::test]
async fn screening_cleared_before_tracking_still_grants_role() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(screening(999));
	let stale = screening(999);

	// The clear lands while the caller still holds a pending snapshot.
	let after = fake.set_pending(GUILD, UserId(999), false).unwrap();
	assert!(coordinator.on_membership_update(&stale, &after).await.is_none());

	let record = coordinator.on_join_or_verify(&stale).await.unwrap();

	assert!(record.role_added);
	assert!(!record.still_pending);
	assert!(fake.member(GUILD, UserId(999)).unwrap().has_role(ROLE));
	assert!(coordinator.is_pending_tracked(UserId(999)).await);
	assert_eq!(
		fake.audits()[0].1.field_value("Verified Role Added"),
		Some("True")
	);
}

#[tokio::test]
async fn untracked_member_update_does_nothing() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(settled(5));

	assert!(coordinator
		.on_membership_update(&screening(5), &settled(5))
		.await
		.is_none());
	assert_eq!(fake.outbound_calls(), 0);
}

#[tokio::test]
async fn non_edge_updates_do_nothing() {
	let (fake, coordinator) = setup(Some(LOG));
	coordinator.track_pending(UserId(5)).await;

	for (before, after) in [
		(screening(5), screening(5)),
		(settled(5), settled(5)),
		(settled(5), screening(5)),
	] {
		assert!(coordinator.on_membership_update(&before, &after).await.is_none());
	}
	assert_eq!(fake.outbound_calls(), 0);
}

#[tokio::test]
async fn handshakes_are_one_shot() {
	let (_, coordinator) = setup(None);
	let token = coordinator.issue_handshake().await;

	assert_eq!(coordinator.handshake_count().await, 1);
	assert!(coordinator.consume_handshake(&token).await);
	assert!(!coordinator.consume_handshake(&token).await);
	assert_eq!(coordinator.handshake_count().await, 0);
}

#[tokio::test]
async fn stale_handshake_is_rejected() {
	let (_, coordinator) = setup(None);
	let issued = Utc::now();
	let token = coordinator.issue_handshake_at(issued).await;

	assert!(
		!coordinator
			.consume_handshake_at(&token, issued + TimeDelta::seconds(600))
			.await
	);
}

#[tokio::test]
async fn sweep_is_idempotent_with_inclusive_boundary() {
	let (_, coordinator) = setup(None);
	let now = Utc::now();
	coordinator.issue_handshake_at(now - TimeDelta::seconds(600)).await;
	coordinator.issue_handshake_at(now - TimeDelta::seconds(10)).await;

	assert_eq!(coordinator.sweep_handshakes_at(now).await, 1);
	assert_eq!(coordinator.sweep_handshakes_at(now).await, 0);
	assert_eq!(coordinator.handshake_count().await, 1);
}

#[tokio::test]
async fn concurrent_verifies_of_same_member_are_tolerated() {
	let (fake, coordinator) = setup(Some(LOG));
	fake.add_member(settled(5));
	let coordinator = Arc::new(coordinator);

	let a = tokio::spawn({
		let c = coordinator.clone();
		async move { c.on_join_or_verify(&settled(5)).await }
	});
	let b = tokio::spawn({
		let c = coordinator.clone();
		async move { c.on_join_or_verify(&settled(5)).await }
	});
	a.await.unwrap();
	b.await.unwrap();

	assert!(fake.member(GUILD, UserId(5)).unwrap().has_role(ROLE));
	assert_eq!(fake.audits().len(), 2);
}

proptest! {
	#[test]
	fn tracking_is_idempotent(ids in proptest::collection::vec(1u64..50, 0..60)) {
		let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
		rt.block_on(async {
			let (_, coordinator) = setup(None);
			for id in &ids {
				coordinator.track_pending(UserId(*id)).await;
			}
			let distinct: std::collections::HashSet<_> = ids.iter().collect();
			assert_eq!(coordinator.pending_count().await, distinct.len());
		});
	}
}
