// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Discord OAuth 2.0 authentication for Gatekeeper.
//!
//! Gatekeeper uses the authorization code flow with three scopes: `identify`
//! to learn who the user is, `guilds.join` so the bot may add them to the
//! guild on their behalf, and `guilds`.
//!
//! # OAuth Flow
//!
//! 1. **Authorization URL Generation**: [`DiscordOAuthClient::authorization_url`]
//!    builds the consent URL carrying a one-shot `state` token.
//!
//! 2. **User Authorization**: Discord redirects back to the configured
//!    `redirect_uri` with `code` and `state`, or with `error` and
//!    `error_description` if the user declined.
//!
//! 3. **Code Exchange**: [`DiscordOAuthClient::exchange_code`] posts the code to
//!    the token endpoint with the client credentials.
//!
//! 4. **Identity**: [`DiscordOAuthClient::get_user`] calls `/users/@me` with the
//!    bearer token. The token is also what the bot hands to the guild join
//!    endpoint.
//!
//! # Example
//!
//! ```rust,no_run
//! use gatekeeper_auth_discord::{DiscordOAuthClient, DiscordOAuthConfig};
//! use gatekeeper_common_secret::SecretString;
//!
//! # async fn example(http: reqwest::Client) -> Result<(), Box<dyn std::error::Error>> {
//! let config = DiscordOAuthConfig::new(
//! 	"1234567890",
//! 	SecretString::from("client-secret"),
//! 	"https://verify.example.org/authorize",
//! );
//! let client = DiscordOAuthClient::new(config, http)?;
//!
//! let auth_url = client.authorization_url("state-token");
//! let token = client.exchange_code("code-from-callback").await?;
//! let user = client.get_user(token.access_token.expose()).await?;
//! println!("{} authorized", user.tag());
//! # Ok(())
//! # }
//! ```
//!
//! # Security Considerations
//!
//! - The `client_secret` and access tokens are wrapped in [`SecretString`].
//! - All tracing instrumentation skips codes and tokens.

use gatekeeper_common_secret::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

pub const DISCORD_AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";
pub const DISCORD_API_BASE_URL: &str = "https://discord.com/api/v10";

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur when building the client.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	/// A configuration value was empty or invalid.
	#[error("invalid configuration: {0}")]
	InvalidConfig(String),
}

/// Errors that can occur during OAuth operations.
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
	/// The HTTP request to Discord failed (network error, timeout, etc.).
	#[error("HTTP request failed: {0}")]
	HttpRequest(#[from] reqwest::Error),

	/// The token endpoint answered with an OAuth error body
	/// (`invalid_grant` for a reused or expired code, for instance).
	#[error("Discord OAuth error {error}: {description}")]
	Provider { error: String, description: String },

	/// A REST call answered with a non-success status.
	#[error("Discord API returned {status}: {message}")]
	Api { status: u16, message: String },

	/// The response could not be parsed as expected.
	#[error("failed to parse response: {0}")]
	ParseError(String),
}

impl OAuthError {
	/// True when Discord itself rejected the request, as opposed to the
	/// request never completing.
	pub fn is_rejection(&self) -> bool {
		matches!(self, OAuthError::Provider { .. } | OAuthError::Api { .. })
	}
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the Discord OAuth client.
#[derive(Debug, Clone)]
pub struct DiscordOAuthConfig {
	pub client_id: String,
	pub client_secret: SecretString,
	/// Must match a redirect registered on the Discord application.
	pub redirect_uri: String,
	pub scopes: Vec<String>,
	pub authorize_url: String,
	/// Base for `/oauth2/token` and `/users/@me`.
	pub api_base_url: String,
}

impl DiscordOAuthConfig {
	pub fn new(
		client_id: impl Into<String>,
		client_secret: SecretString,
		redirect_uri: impl Into<String>,
	) -> Self {
		Self {
			client_id: client_id.into(),
			client_secret,
			redirect_uri: redirect_uri.into(),
			scopes: default_scopes(),
			authorize_url: DISCORD_AUTHORIZE_URL.to_string(),
			api_base_url: DISCORD_API_BASE_URL.to_string(),
		}
	}

	/// Validate that all configuration fields are usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.client_id.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_id cannot be empty".to_string(),
			));
		}
		if self.client_secret.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"client_secret cannot be empty".to_string(),
			));
		}
		if self.redirect_uri.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"redirect_uri cannot be empty".to_string(),
			));
		}
		if self.scopes.is_empty() {
			return Err(ConfigError::InvalidConfig(
				"at least one scope is required".to_string(),
			));
		}
		Url::parse(&self.api_base_url).map_err(|e| {
			ConfigError::InvalidConfig(format!("api_base_url '{}': {e}", self.api_base_url))
		})?;
		Ok(())
	}

	/// Join scopes into a space-separated string for the authorization URL.
	pub fn scopes_string(&self) -> String {
		self.scopes.join(" ")
	}

	fn token_url(&self) -> String {
		format!("{}/oauth2/token", self.api_base_url.trim_end_matches('/'))
	}

	fn current_user_url(&self) -> String {
		format!("{}/users/@me", self.api_base_url.trim_end_matches('/'))
	}
}

pub fn default_scopes() -> Vec<String> {
	vec![
		"identify".to_string(),
		"guilds.join".to_string(),
		"guilds".to_string(),
	]
}

// =============================================================================
// Response types
// =============================================================================

/// Response from Discord's token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordTokenResponse {
	/// Bearer token; also accepted by the guild join endpoint.
	pub access_token: SecretString,
	pub token_type: String,
	#[serde(default)]
	pub expires_in: Option<u64>,
	#[serde(default)]
	pub refresh_token: Option<SecretString>,
	/// Space-separated granted scopes.
	#[serde(default)]
	pub scope: String,
}

impl DiscordTokenResponse {
	pub fn granted_scopes(&self) -> impl Iterator<Item = &str> {
		self.scope.split_whitespace()
	}
}

/// The authorizing user, from `/users/@me`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DiscordUser {
	#[serde(deserialize_with = "deserialize_snowflake")]
	pub id: u64,
	pub username: String,
	/// `"0"` for accounts migrated to unique usernames.
	#[serde(default)]
	pub discriminator: Option<String>,
	#[serde(default)]
	pub global_name: Option<String>,
}

impl DiscordUser {
	/// `name#1234` for legacy accounts, plain username otherwise.
	pub fn tag(&self) -> String {
		match self.discriminator.as_deref() {
			Some(d) if !d.is_empty() && d != "0" => format!("{}#{d}", self.username),
			_ => self.username.clone(),
		}
	}
}

#[derive(Debug, Deserialize)]
struct DiscordErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DiscordApiError {
	#[serde(default)]
	message: String,
}

fn deserialize_snowflake<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
	D: Deserializer<'de>,
{
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

// =============================================================================
// Client
// =============================================================================

/// OAuth client for the Discord authorization code flow.
#[derive(Debug, Clone)]
pub struct DiscordOAuthClient {
	config: DiscordOAuthConfig,
	authorize_url: Url,
	http_client: reqwest::Client,
}

impl DiscordOAuthClient {
	/// Create a client around a shared HTTP client.
	#[tracing::instrument(skip_all, name = "DiscordOAuthClient::new")]
	pub fn new(config: DiscordOAuthConfig, http_client: reqwest::Client) -> Result<Self, ConfigError> {
		config.validate()?;
		let authorize_url = Url::parse(&config.authorize_url).map_err(|e| {
			ConfigError::InvalidConfig(format!("authorize_url '{}': {e}", config.authorize_url))
		})?;

		Ok(Self {
			config,
			authorize_url,
			http_client,
		})
	}

	pub fn config(&self) -> &DiscordOAuthConfig {
		&self.config
	}

	/// Build the consent URL the user is redirected to.
	#[tracing::instrument(skip(self, state), fields(client_id = %self.config.client_id))]
	pub fn authorization_url(&self, state: &str) -> String {
		let mut url = self.authorize_url.clone();

		url
			.query_pairs_mut()
			.append_pair("client_id", &self.config.client_id)
			.append_pair("redirect_uri", &self.config.redirect_uri)
			.append_pair("response_type", "code")
			.append_pair("scope", &self.config.scopes_string())
			.append_pair("state", state);

		url.to_string()
	}

	/// Exchange an authorization code for an access token.
	///
	/// Discord answers a bad code with a 400 and an OAuth error body, which
	/// surfaces as [`OAuthError::Provider`].
	#[tracing::instrument(skip(self, code), name = "DiscordOAuthClient::exchange_code")]
	pub async fn exchange_code(&self, code: &str) -> Result<DiscordTokenResponse, OAuthError> {
		tracing::debug!("exchanging authorization code for access token");

		let scope = self.config.scopes_string();
		let response = self
			.http_client
			.post(self.config.token_url())
			.header("Accept", "application/json")
			.form(&[
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.expose().as_str()),
				("grant_type", "authorization_code"),
				("code", code),
				("redirect_uri", self.config.redirect_uri.as_str()),
				("scope", scope.as_str()),
			])
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;

		if let Ok(error_response) = serde_json::from_str::<DiscordErrorResponse>(&body) {
			if !error_response.error.is_empty() {
				return Err(OAuthError::Provider {
					description: error_response.error_description.unwrap_or_default(),
					error: error_response.error,
				});
			}
		}

		if !status.is_success() {
			return Err(OAuthError::Api {
				status: status.as_u16(),
				message: body,
			});
		}

		serde_json::from_str(&body)
			.map_err(|e| OAuthError::ParseError(format!("failed to parse token response: {e}")))
	}

	/// Fetch the user who granted the token.
	#[tracing::instrument(skip(self, access_token), name = "DiscordOAuthClient::get_user")]
	pub async fn get_user(&self, access_token: &str) -> Result<DiscordUser, OAuthError> {
		tracing::debug!("fetching Discord user info");

		let response = self
			.http_client
			.get(self.config.current_user_url())
			.header("Accept", "application/json")
			.bearer_auth(access_token)
			.send()
			.await?;

		let status = response.status();
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			let message = serde_json::from_str::<DiscordApiError>(&body)
				.map(|e| e.message)
				.unwrap_or(body);
			return Err(OAuthError::Api {
				status: status.as_u16(),
				message,
			});
		}

		response
			.json()
			.await
			.map_err(|e| OAuthError::ParseError(format!("failed to parse user response: {e}")))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use wiremock::matchers::{body_string_contains, header, method, path};
	use wiremock::{Mock, MockServer, ResponseTemplate};

	fn config() -> DiscordOAuthConfig {
		DiscordOAuthConfig::new(
			"1234567890",
			SecretString::from("client-secret"),
			"https://verify.example.org/authorize",
		)
	}

	fn client_for(server: &MockServer) -> DiscordOAuthClient {
		let mut config = config();
		config.api_base_url = format!("{}/api/v10", server.uri());
		DiscordOAuthClient::new(config, gatekeeper_common_http::new_client()).unwrap()
	}

	#[test]
	fn authorization_url_contains_required_params() {
		let client = DiscordOAuthClient::new(config(), reqwest::Client::new()).unwrap();
		let url = client.authorization_url("state123");

		assert!(url.starts_with("https://discord.com/oauth2/authorize?"));
		assert!(url.contains("client_id=1234567890"));
		assert!(url.contains("redirect_uri=https%3A%2F%2Fverify.example.org%2Fauthorize"));
		assert!(url.contains("response_type=code"));
		assert!(url.contains("scope=identify+guilds.join+guilds"));
		assert!(url.contains("state=state123"));
	}

	#[test]
	fn config_validation_rejects_empty_fields() {
		let mut c = config();
		c.client_id.clear();
		assert!(c.validate().is_err());

		let mut c = config();
		c.client_secret = SecretString::from("");
		assert!(c.validate().is_err());

		let mut c = config();
		c.scopes.clear();
		assert!(c.validate().is_err());

		let mut c = config();
		c.api_base_url = "not a url".to_string();
		assert!(c.validate().is_err());
	}

	#[test]
	fn bad_authorize_url_fails_construction() {
		let mut c = config();
		c.authorize_url = "::".to_string();
		assert!(DiscordOAuthClient::new(c, reqwest::Client::new()).is_err());
	}

	#[test]
	fn discord_user_deserializes_string_id() {
		let json = r#"{
			"id": "80351110224678912",
			"username": "nelly",
			"discriminator": "1337",
			"global_name": null
		}"#;
		let user: DiscordUser = serde_json::from_str(json).unwrap();
		assert_eq!(user.id, 80351110224678912);
		assert_eq!(user.tag(), "nelly#1337");
	}

	#[test]
	fn migrated_user_tag_is_plain_username() {
		let user = DiscordUser {
			id: 1,
			username: "nelly".to_string(),
			discriminator: Some("0".to_string()),
			global_name: Some("Nelly".to_string()),
		};
		assert_eq!(user.tag(), "nelly");
	}

	#[test]
	fn token_response_redacts_tokens() {
		let json = r#"{
			"access_token": "6qrZcUqja7812RVdnEKjpzOL4CvHBFG",
			"token_type": "Bearer",
			"expires_in": 604800,
			"refresh_token": "D43f5y0ahjqew82jZ4NViEr2YafMKhue",
			"scope": "identify guilds.join guilds"
		}"#;
		let token: DiscordTokenResponse = serde_json::from_str(json).unwrap();
		assert_eq!(token.access_token.expose(), "6qrZcUqja7812RVdnEKjpzOL4CvHBFG");
		assert_eq!(
			token.granted_scopes().collect::<Vec<_>>(),
			vec!["identify", "guilds.join", "guilds"]
		);

		let debug = format!("{token:?}");
		assert!(!debug.contains("6qrZcUqja7812RVdnEKjpzOL4CvHBFG"));
		assert!(!debug.contains("D43f5y0ahjqew82jZ4NViEr2YafMKhue"));
	}

	#[tokio::test]
	async fn exchange_code_posts_form_and_parses_token() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v10/oauth2/token"))
			.and(body_string_contains("grant_type=authorization_code"))
			.and(body_string_contains("code=abc123"))
			.and(body_string_contains("client_secret=client-secret"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"access_token": "user-token",
				"token_type": "Bearer",
				"scope": "identify guilds.join guilds"
			})))
			.expect(1)
			.mount(&server)
			.await;

		let token = client_for(&server).exchange_code("abc123").await.unwrap();
		assert_eq!(token.access_token.expose(), "user-token");
	}

	#[tokio::test]
	async fn exchange_code_surfaces_oauth_error_body() {
		let server = MockServer::start().await;
		Mock::given(method("POST"))
			.and(path("/api/v10/oauth2/token"))
			.respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
				"error": "invalid_grant",
				"error_description": "Invalid \"code\" in request."
			})))
			.mount(&server)
			.await;

		let err = client_for(&server).exchange_code("stale").await.unwrap_err();
		assert!(err.is_rejection());
		match err {
			OAuthError::Provider { error, .. } => assert_eq!(error, "invalid_grant"),
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn get_user_sends_bearer_token() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v10/users/@me"))
			.and(header("Authorization", "Bearer user-token"))
			.respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
				"id": "999",
				"username": "newcomer",
				"discriminator": "0",
				"global_name": "Newcomer"
			})))
			.mount(&server)
			.await;

		let user = client_for(&server).get_user("user-token").await.unwrap();
		assert_eq!(user.id, 999);
		assert_eq!(user.global_name.as_deref(), Some("Newcomer"));
	}

	#[tokio::test]
	async fn get_user_maps_unauthorized_to_api_error() {
		let server = MockServer::start().await;
		Mock::given(method("GET"))
			.and(path("/api/v10/users/@me"))
			.respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
				"message": "401: Unauthorized",
				"code": 0
			})))
			.mount(&server)
			.await;

		let err = client_for(&server).get_user("expired").await.unwrap_err();
		match err {
			OAuthError::Api { status, message } => {
				assert_eq!(status, 401);
				assert_eq!(message, "401: Unauthorized");
			}
			other => panic!("unexpected error: {other:?}"),
		}
	}

	#[tokio::test]
	async fn unreachable_provider_is_a_transport_error() {
		let mut c = config();
		c.api_base_url = "http://127.0.0.1:9".to_string();
		let client = DiscordOAuthClient::new(c, reqwest::Client::new()).unwrap();
		let err = client.exchange_code("abc").await.unwrap_err();
		assert!(matches!(err, OAuthError::HttpRequest(_)));
		assert!(!err.is_rejection());
	}
}

#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn authorization_url_always_has_required_params(
			client_id in "[0-9]{5,20}",
			redirect_uri in "https://[a-z]{1,20}\\.[a-z]{2,5}/[a-z]{1,20}",
			state in "[a-f0-9]{64}",
		) {
			let config = DiscordOAuthConfig::new(
				client_id,
				SecretString::from("secret"),
				redirect_uri,
			);
			let client = DiscordOAuthClient::new(config, reqwest::Client::new()).unwrap();
			let url = client.authorization_url(&state);

			prop_assert!(url.starts_with(DISCORD_AUTHORIZE_URL));
			prop_assert!(url.contains("client_id="));
			prop_assert!(url.contains("redirect_uri="));
			prop_assert!(url.contains("response_type=code"));
			let expected_state = format!("state={}", state);
			prop_assert!(url.contains(&expected_state));
		}

		#[test]
		fn client_secret_never_in_debug(secret in "[a-zA-Z0-9]{10,40}") {
			prop_assume!(!secret.contains("REDACTED"));
			prop_assume!(!secret.contains("Secret"));

			let config = DiscordOAuthConfig::new("1", SecretString::new(secret.clone()), "https://e.x/a");
			let debug = format!("{config:?}");
			prop_assert!(!debug.contains(&secret));
		}

		#[test]
		fn numeric_and_string_ids_agree(id in 1u64..i64::MAX as u64) {
			let from_string: DiscordUser = serde_json::from_str(
				&format!(r#"{{"id": "{id}", "username": "u"}}"#),
			).unwrap();
			let from_number: DiscordUser = serde_json::from_str(
				&format!(r#"{{"id": {id}, "username": "u"}}"#),
			).unwrap();
			prop_assert_eq!(from_string.id, from_number.id);
		}
	}
}
