// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! [`Platform`] over Discord's HTTP API.

use async_trait::async_trait;
use gatekeeper_common_http::{retry, RetryConfig};
use gatekeeper_common_secret::SecretString;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::cache::MemberCache;
use crate::error::PlatformError;
use crate::platform::Platform;
use crate::ready::ReadySignal;
use crate::types::{
	ChannelId, Embed, Guild, GuildId, JoinOutcome, Member, MemberPayload, RoleId, User, UserId,
};

const AUDIT_LOG_REASON: &str = "Authorized via Gatekeeper";

#[derive(Debug, Deserialize, Default)]
struct ApiErrorBody {
	#[serde(default)]
	code: u64,
	#[serde(default)]
	message: String,
}

#[derive(Debug, Clone)]
pub struct DiscordRest {
	http: reqwest::Client,
	base_url: String,
	bot_token: SecretString,
	cache: MemberCache,
	ready: ReadySignal,
	retry: RetryConfig,
}

impl DiscordRest {
	pub fn new(
		http: reqwest::Client,
		base_url: impl Into<String>,
		bot_token: SecretString,
		cache: MemberCache,
		ready: ReadySignal,
	) -> Self {
		Self {
			http,
			base_url: base_url.into().trim_end_matches('/').to_string(),
			bot_token,
			cache,
			ready,
			retry: RetryConfig::default(),
		}
	}

	pub fn with_retry(mut self, retry: RetryConfig) -> Self {
		self.retry = retry;
		self
	}

	pub fn cache(&self) -> &MemberCache {
		&self.cache
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		self
			.http
			.request(method, format!("{}{path}", self.base_url))
			.header(
				"Authorization",
				format!("Bot {}", self.bot_token.expose()),
			)
	}

	/// The bot's own account.
	#[instrument(skip(self))]
	pub async fn current_user(&self) -> Result<User, PlatformError> {
		let response = check(self.request(Method::GET, "/users/@me").send().await?).await?;
		parse(response).await
	}

	async fn fetch_member(
		&self,
		guild_id: GuildId,
		user_id: UserId,
	) -> Result<Option<Member>, PlatformError> {
		let response = self
			.request(
				Method::GET,
				&format!("/guilds/{guild_id}/members/{user_id}"),
			)
			.send()
			.await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let payload: MemberPayload = parse(check(response).await?).await?;
		Ok(Some(payload.into_member(guild_id)))
	}

	async fn fetch_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, PlatformError> {
		let response = self
			.request(Method::GET, &format!("/guilds/{guild_id}"))
			.send()
			.await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		parse(check(response).await?).await.map(Some)
	}
}

async fn check(response: Response) -> Result<Response, PlatformError> {
	let status = response.status();
	if status.is_success() {
		return Ok(response);
	}

	let body = response.text().await.unwrap_or_default();
	let error: ApiErrorBody = serde_json::from_str(&body).unwrap_or_else(|_| ApiErrorBody {
		code: 0,
		message: body,
	});

	if status == StatusCode::FORBIDDEN {
		return Err(PlatformError::Forbidden {
			code: error.code,
			message: error.message,
		});
	}

	Err(PlatformError::Api {
		status: status.as_u16(),
		code: error.code,
		message: error.message,
	})
}

async fn parse<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
	let body = response.text().await?;
	serde_json::from_str(&body).map_err(|e| PlatformError::Parse(e.to_string()))
}

#[async_trait]
impl Platform for DiscordRest {
	async fn wait_until_ready(&self) {
		self.ready.wait().await
	}

	fn is_ready(&self) -> bool {
		self.ready.is_ready()
	}

	#[instrument(skip(self))]
	async fn get_guild(&self, guild_id: GuildId) -> Result<Option<Guild>, PlatformError> {
		retry(&self.retry, || self.fetch_guild(guild_id)).await
	}

	#[instrument(skip(self))]
	async fn get_member(
		&self,
		guild_id: GuildId,
		user_id: UserId,
	) -> Result<Option<Member>, PlatformError> {
		let member = retry(&self.retry, || self.fetch_member(guild_id, user_id)).await?;
		if let Some(member) = &member {
			self.cache.upsert(member.clone()).await;
		}
		Ok(member)
	}

	#[instrument(skip(self, member), fields(user_id = %member.id()))]
	async fn add_role(&self, member: &Member, role_id: RoleId) -> Result<(), PlatformError> {
		let path = format!(
			"/guilds/{}/members/{}/roles/{role_id}",
			member.guild_id,
			member.id()
		);
		check(
			self
				.request(Method::PUT, &path)
				.header("X-Audit-Log-Reason", AUDIT_LOG_REASON)
				.send()
				.await?,
		)
		.await?;

		let mut updated = member.clone();
		if !updated.has_role(role_id) {
			updated.roles.push(role_id);
		}
		self.cache.upsert(updated).await;
		debug!(%role_id, "role added");
		Ok(())
	}

	#[instrument(skip(self, access_token))]
	async fn join_guild(
		&self,
		guild_id: GuildId,
		user_id: UserId,
		access_token: &SecretString,
	) -> Result<JoinOutcome, PlatformError> {
		let response = self
			.request(Method::PUT, &format!("/guilds/{guild_id}/members/{user_id}"))
			.json(&serde_json::json!({ "access_token": access_token.expose() }))
			.send()
			.await?;

		match check(response).await?.status() {
			StatusCode::NO_CONTENT => Ok(JoinOutcome::AlreadyMember),
			_ => Ok(JoinOutcome::Joined),
		}
	}

	#[instrument(skip(self, embed))]
	async fn send_audit(&self, channel_id: ChannelId, embed: &Embed) -> Result<(), PlatformError> {
		check(
			self
				.request(Method::POST, &format!("/channels/{channel_id}/messages"))
				.json(&serde_json::json!({ "embeds": [embed] }))
				.send()
				.await?,
		)
		.await?;
		Ok(())
	}
}
