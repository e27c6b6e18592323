// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Discord gateway connection for real-time membership events.
//!
//! Only the `GUILDS` and `GUILD_MEMBERS` intents are requested. Member add and
//! update dispatches feed the [`MemberCache`]; updates are forwarded with the
//! cached previous snapshot so consumers can see the `pending` edge. Removals
//! evict the snapshot.
//!
//! Events are handed to the consumer with `try_send`. A full queue drops the
//! event rather than stalling the read loop, which also drives heartbeats.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gatekeeper_common_secret::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::cache::MemberCache;
use crate::error::GatewayError;
use crate::ready::ReadySignal;
use crate::types::{GuildId, MemberEvent, MemberPayload, User};

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MEMBERS: u64 = 1 << 1;

mod opcode {
	pub const DISPATCH: u8 = 0;
	pub const HEARTBEAT: u8 = 1;
	pub const IDENTIFY: u8 = 2;
	pub const RECONNECT: u8 = 7;
	pub const INVALID_SESSION: u8 = 9;
	pub const HELLO: u8 = 10;
	pub const HEARTBEAT_ACK: u8 = 11;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
	pub url: String,
	pub token: SecretString,
	pub intents: u64,
	pub reconnect_base_delay: Duration,
	pub reconnect_max_delay: Duration,
}

impl GatewayConfig {
	pub fn new(url: impl Into<String>, token: SecretString) -> Self {
		Self {
			url: url.into(),
			token,
			intents: INTENT_GUILDS | INTENT_GUILD_MEMBERS,
			reconnect_base_delay: Duration::from_secs(1),
			reconnect_max_delay: Duration::from_secs(60),
		}
	}

	fn reconnect_delay(&self, consecutive_failures: u32) -> Duration {
		let factor = 2u64.saturating_pow(consecutive_failures.min(10));
		let delay_ms = (self.reconnect_base_delay.as_millis() as u64).saturating_mul(factor);
		Duration::from_millis(delay_ms.min(self.reconnect_max_delay.as_millis() as u64))
	}
}

#[derive(Debug, Serialize, Deserialize)]
struct GatewayPayload {
	op: u8,
	#[serde(default)]
	d: Value,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	s: Option<u64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hello {
	heartbeat_interval: u64,
}

#[derive(Debug, Deserialize)]
struct ReadyData {
	user: User,
	session_id: String,
}

#[derive(Debug, Deserialize)]
struct MemberRemoveData {
	guild_id: GuildId,
	user: User,
}

#[derive(Debug)]
enum Dispatch {
	Ready(ReadyData),
	MemberAdd(MemberPayload),
	MemberUpdate(MemberPayload),
	MemberRemove(MemberRemoveData),
	Ignored,
}

fn decode_dispatch(event: &str, data: Value) -> Result<Dispatch, GatewayError> {
	Ok(match event {
		"READY" => Dispatch::Ready(serde_json::from_value(data)?),
		"GUILD_MEMBER_ADD" => Dispatch::MemberAdd(serde_json::from_value(data)?),
		"GUILD_MEMBER_UPDATE" => Dispatch::MemberUpdate(serde_json::from_value(data)?),
		"GUILD_MEMBER_REMOVE" => Dispatch::MemberRemove(serde_json::from_value(data)?),
		_ => Dispatch::Ignored,
	})
}

fn identify_payload(config: &GatewayConfig) -> GatewayPayload {
	GatewayPayload {
		op: opcode::IDENTIFY,
		d: serde_json::json!({
			"token": config.token.expose(),
			"intents": config.intents,
			"properties": {
				"os": std::env::consts::OS,
				"browser": "gatekeeper",
				"device": "gatekeeper",
			},
			"presence": {
				"status": "online",
				"afk": false,
				"since": null,
				"activities": [{ "name": "absolutely nothing", "type": 1 }],
			},
		}),
		s: None,
		t: None,
	}
}

fn heartbeat_payload(seq: Option<u64>) -> GatewayPayload {
	GatewayPayload {
		op: opcode::HEARTBEAT,
		d: seq.map(Value::from).unwrap_or(Value::Null),
		s: None,
		t: None,
	}
}

/// Where a dispatch ends up.
struct Sinks<'a> {
	cache: &'a MemberCache,
	ready: &'a ReadySignal,
	events: &'a mpsc::Sender<MemberEvent>,
	stats: &'a GatewayStats,
}

impl Sinks<'_> {
	fn forward(&self, event: MemberEvent) {
		match self.events.try_send(event) {
			Ok(()) => {}
			Err(TrySendError::Full(event)) => {
				self.stats.events_dropped.fetch_add(1, Ordering::SeqCst);
				warn!(
					user_id = %event.member_id(),
					"Member event queue full, dropping event"
				);
			}
			Err(TrySendError::Closed(_)) => debug!("member event receiver dropped"),
		}
	}
}

async fn handle_dispatch(dispatch: Dispatch, sinks: &Sinks<'_>) {
	match dispatch {
		Dispatch::Ready(ready) => {
			info!(
				bot = %ready.user.tag(),
				bot_id = %ready.user.id,
				session_id = %ready.session_id,
				"Gateway session ready"
			);
			sinks.ready.mark_ready();
		}
		Dispatch::MemberAdd(payload) => {
			let Some(guild_id) = payload.guild_id else {
				warn!("GUILD_MEMBER_ADD without guild_id");
				return;
			};
			let member = payload.into_member(guild_id);
			sinks.cache.upsert(member.clone()).await;
			sinks.forward(MemberEvent::Joined(member));
		}
		Dispatch::MemberUpdate(payload) => {
			let Some(guild_id) = payload.guild_id else {
				warn!("GUILD_MEMBER_UPDATE without guild_id");
				return;
			};
			let after = payload.into_member(guild_id);
			match sinks.cache.upsert(after.clone()).await {
				Some(before) => sinks.forward(MemberEvent::Updated { before, after }),
				None => {
					debug!(
						user_id = %after.id(),
						guild_id = %guild_id,
						"member update without cached snapshot, cache refreshed"
					);
				}
			}
		}
		Dispatch::MemberRemove(data) => {
			if sinks.cache.remove(data.guild_id, data.user.id).await.is_some() {
				debug!(user_id = %data.user.id, guild_id = %data.guild_id, "member left, snapshot evicted");
			}
		}
		Dispatch::Ignored => {}
	}
}

/// Why a session ended without an error.
#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
	Shutdown,
	Reconnect,
	StreamEnded,
}

/// Live counters for a gateway connection. Clones share the same counters,
/// so a handle can be given to the health endpoint before the loop starts.
#[derive(Debug, Clone, Default)]
pub struct GatewayStats {
	connected: Arc<AtomicBool>,
	reconnect_attempts: Arc<AtomicU64>,
	events_received: Arc<AtomicU64>,
	events_dropped: Arc<AtomicU64>,
}

/// Point-in-time view of [`GatewayStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GatewayStatus {
	pub connected: bool,
	pub reconnect_attempts: u64,
	pub events_received: u64,
	pub events_dropped: u64,
}

impl GatewayStats {
	pub fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}

	pub fn reconnect_attempts(&self) -> u64 {
		self.reconnect_attempts.load(Ordering::SeqCst)
	}

	pub fn events_received(&self) -> u64 {
		self.events_received.load(Ordering::SeqCst)
	}

	/// Member events discarded because the consumer fell behind.
	pub fn events_dropped(&self) -> u64 {
		self.events_dropped.load(Ordering::SeqCst)
	}

	pub fn snapshot(&self) -> GatewayStatus {
		GatewayStatus {
			connected: self.is_connected(),
			reconnect_attempts: self.reconnect_attempts(),
			events_received: self.events_received(),
			events_dropped: self.events_dropped(),
		}
	}
}

/// Manages the gateway connection in a background task.
#[derive(Debug)]
pub struct GatewayConnection {
	stats: GatewayStats,
	task_handle: Option<JoinHandle<()>>,
	shutdown_tx: Option<mpsc::Sender<()>>,
}

impl GatewayConnection {
	pub fn new() -> Self {
		Self {
			stats: GatewayStats::default(),
			task_handle: None,
			shutdown_tx: None,
		}
	}

	pub fn stats(&self) -> GatewayStats {
		self.stats.clone()
	}

	/// Starts the connection loop. Reconnects with exponential backoff
	/// until stopped or the gateway reports a fatal close code.
	pub async fn start(
		&mut self,
		config: GatewayConfig,
		cache: MemberCache,
		ready: ReadySignal,
		events: mpsc::Sender<MemberEvent>,
	) {
		self.stop().await;

		let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
		self.shutdown_tx = Some(shutdown_tx);

		let stats = self.stats.clone();
		self.task_handle = Some(tokio::spawn(async move {
			run_gateway_loop(config, cache, ready, events, stats, shutdown_rx).await;
		}));
	}

	pub async fn stop(&mut self) {
		if let Some(tx) = self.shutdown_tx.take() {
			let _ = tx.send(()).await;
		}
		if let Some(mut handle) = self.task_handle.take() {
			// The loop closes the socket itself when it sees the signal.
			if tokio::time::timeout(Duration::from_secs(5), &mut handle)
				.await
				.is_err()
			{
				handle.abort();
				let _ = handle.await;
			}
		}
		self.stats.connected.store(false, Ordering::SeqCst);
	}
}

impl Default for GatewayConnection {
	fn default() -> Self {
		Self::new()
	}
}

impl Drop for GatewayConnection {
	fn drop(&mut self) {
		if let Some(handle) = self.task_handle.take() {
			handle.abort();
		}
	}
}

async fn run_gateway_loop(
	config: GatewayConfig,
	cache: MemberCache,
	ready: ReadySignal,
	events: mpsc::Sender<MemberEvent>,
	state: GatewayStats,
	mut shutdown_rx: mpsc::Receiver<()>,
) {
	let sinks = Sinks {
		cache: &cache,
		ready: &ready,
		events: &events,
		stats: &state,
	};
	let mut consecutive_failures: u32 = 0;

	loop {
		info!(url = %config.url, "Connecting to Discord gateway");

		match run_session(&config, &sinks, &state, &mut shutdown_rx).await {
			Ok(SessionEnd::Shutdown) => {
				info!("Gateway connection received shutdown signal");
				break;
			}
			Ok(end) => {
				debug!(?end, "gateway session ended");
				consecutive_failures = 0;
			}
			Err(e) if e.is_fatal() => {
				error!(error = %e, "Gateway rejected the session, not reconnecting");
				break;
			}
			Err(e) => {
				error!(error = %e, "Gateway connection error");
				consecutive_failures += 1;
			}
		}

		state.connected.store(false, Ordering::SeqCst);

		let delay = config.reconnect_delay(consecutive_failures);
		state.reconnect_attempts.fetch_add(1, Ordering::SeqCst);
		warn!(
			delay_ms = delay.as_millis() as u64,
			attempts = consecutive_failures,
			"Reconnecting to Discord gateway"
		);

		tokio::select! {
			_ = tokio::time::sleep(delay) => {}
			_ = shutdown_rx.recv() => {
				info!("Gateway connection received shutdown signal during reconnect wait");
				break;
			}
		}
	}

	state.connected.store(false, Ordering::SeqCst);
}

async fn run_session(
	config: &GatewayConfig,
	sinks: &Sinks<'_>,
	state: &GatewayStats,
	shutdown_rx: &mut mpsc::Receiver<()>,
) -> Result<SessionEnd, GatewayError> {
	let (ws_stream, _) = connect_async(config.url.as_str()).await?;
	let (mut write, mut read) = ws_stream.split();

	let hello: GatewayPayload = loop {
		match read.next().await {
			Some(Ok(Message::Text(text))) => break serde_json::from_str(&text)?,
			Some(Ok(Message::Close(frame))) => return Err(closed(frame)),
			Some(Ok(_)) => continue,
			Some(Err(e)) => return Err(e.into()),
			None => return Ok(SessionEnd::StreamEnded),
		}
	};
	if hello.op != opcode::HELLO {
		return Err(GatewayError::Protocol(format!(
			"expected HELLO, got op {}",
			hello.op
		)));
	}
	let hello: Hello = serde_json::from_value(hello.d)?;
	let period = Duration::from_millis(hello.heartbeat_interval.max(1));

	write.send(encode(&identify_payload(config))?).await?;
	state.connected.store(true, Ordering::SeqCst);
	debug!(heartbeat_ms = hello.heartbeat_interval, "identified with gateway");

	let mut heartbeat = interval_at(Instant::now() + period, period);
	let mut acked = true;
	let mut seq: Option<u64> = None;

	loop {
		tokio::select! {
			_ = heartbeat.tick() => {
				if !acked {
					return Err(GatewayError::Zombied);
				}
				acked = false;
				write.send(encode(&heartbeat_payload(seq))?).await?;
			}
			_ = shutdown_rx.recv() => {
				let _ = write.send(Message::Close(None)).await;
				return Ok(SessionEnd::Shutdown);
			}
			message = read.next() => {
				let text = match message {
					Some(Ok(Message::Text(text))) => text,
					Some(Ok(Message::Close(frame))) => return Err(closed(frame)),
					Some(Ok(_)) => continue,
					Some(Err(e)) => return Err(e.into()),
					None => return Ok(SessionEnd::StreamEnded),
				};

				let payload: GatewayPayload = serde_json::from_str(&text)?;
				match payload.op {
					opcode::DISPATCH => {
						seq = payload.s.or(seq);
						state.events_received.fetch_add(1, Ordering::SeqCst);
						let Some(event) = payload.t else { continue };
						match decode_dispatch(&event, payload.d) {
							Ok(dispatch) => handle_dispatch(dispatch, sinks).await,
							Err(e) => warn!(event = %event, error = %e, "Failed to decode dispatch"),
						}
					}
					opcode::HEARTBEAT => {
						write.send(encode(&heartbeat_payload(seq))?).await?;
					}
					opcode::HEARTBEAT_ACK => acked = true,
					opcode::RECONNECT => return Ok(SessionEnd::Reconnect),
					opcode::INVALID_SESSION => {
						warn!("Gateway invalidated the session");
						return Ok(SessionEnd::Reconnect);
					}
					other => debug!(op = other, "ignoring gateway opcode"),
				}
			}
		}
	}
}

fn encode(payload: &GatewayPayload) -> Result<Message, GatewayError> {
	Ok(Message::Text(serde_json::to_string(payload)?))
}

fn closed(
	frame: Option<tokio_tungstenite::tungstenite::protocol::CloseFrame<'_>>,
) -> GatewayError {
	match frame {
		Some(frame) => GatewayError::Closed {
			code: u16::from(frame.code),
			reason: frame.reason.to_string(),
		},
		None => GatewayError::Closed {
			code: 1005,
			reason: String::new(),
		},
	}
}
