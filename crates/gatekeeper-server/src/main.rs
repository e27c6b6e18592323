// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gatekeeper binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use gatekeeper_auth_discord::{DiscordOAuthClient, DiscordOAuthConfig};
use gatekeeper_jobs::JobScheduler;
use gatekeeper_platform::{
	ChannelId, DiscordRest, GatewayConfig, GatewayConnection, GuildId, MemberCache, Platform,
	ReadySignal, RoleId,
};
use gatekeeper_server::jobs::HandshakeSweepJob;
use gatekeeper_server::startup::log_ready_banner;
use gatekeeper_server::{create_router, init_tracing, spawn_event_loop, AppState, AuthorizeSettings};
use gatekeeper_verification::{Coordinator, CoordinatorConfig};
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Gatekeeper - grants a verified role after Discord OAuth.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper", about = "Discord OAuth verification gate", version)]
struct Args {
	/// TOML configuration file (default: ./gatekeeper.toml)
	#[arg(long, env = "GATEKEEPER_CONFIG")]
	config: Option<PathBuf>,

	/// Legacy flat JSON configuration (default: ./config.json)
	#[arg(long, env = "GATEKEEPER_LEGACY_CONFIG")]
	legacy_config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Show version information
	Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	// Before parsing, so `.env` can supply GATEKEEPER_CONFIG as well.
	dotenvy::dotenv().ok();

	let args = Args::parse();

	if let Some(Command::Version) = args.command {
		println!("gatekeeper {}", env!("CARGO_PKG_VERSION"));
		return Ok(());
	}

	let config = gatekeeper_config::load_config_with_files(args.config, args.legacy_config)
		.context("failed to load configuration")?;

	init_tracing(&config.logging)?;

	tracing::info!(
		host = %config.http.host,
		port = config.http.port,
		guild_id = config.discord.guild_id,
		"starting gatekeeper"
	);

	let http = gatekeeper_common_http::new_client();
	let cache = MemberCache::new();
	let ready = ReadySignal::new();

	let rest = Arc::new(DiscordRest::new(
		http.clone(),
		config.discord.api_base_url.clone(),
		config.discord.bot_token.clone(),
		cache.clone(),
		ready.clone(),
	));
	let platform: Arc<dyn Platform> = rest.clone();

	let coordinator = Arc::new(Coordinator::new(
		CoordinatorConfig {
			guild_id: GuildId(config.discord.guild_id),
			role_id: RoleId(config.discord.role_id),
			log_channel: config.discord.log_channel.map(ChannelId),
			handshake_ttl: config.verification.handshake_ttl(),
		},
		platform,
	));

	let mut oauth_config = DiscordOAuthConfig::new(
		config.oauth.client_id.clone(),
		config.oauth.client_secret.clone(),
		config.http.redirect_uri(),
	);
	oauth_config.scopes = config.oauth.scopes.clone();
	oauth_config.authorize_url = config.oauth.authorize_url.clone();
	oauth_config.api_base_url = config.discord.api_base_url.clone();
	let oauth = Arc::new(
		DiscordOAuthClient::new(oauth_config, http.clone()).context("invalid OAuth configuration")?,
	);

	let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
	let event_loop = spawn_event_loop(Arc::clone(&coordinator), events_rx);

	let mut gateway = GatewayConnection::new();
	gateway
		.start(
			GatewayConfig::new(
				config.discord.gateway_url.clone(),
				config.discord.bot_token.clone(),
			),
			cache,
			ready.clone(),
			events_tx,
		)
		.await;

	let mut scheduler = JobScheduler::new();
	scheduler.register_periodic(
		Arc::new(HandshakeSweepJob::new(Arc::clone(&coordinator))),
		config.verification.sweep_interval(),
	);
	let scheduler = Arc::new(scheduler);

	// Jobs and the banner wait for the gateway session.
	let on_ready = tokio::spawn({
		let rest = Arc::clone(&rest);
		let scheduler = Arc::clone(&scheduler);
		let server_url = config.http.server_url.clone();
		async move {
			ready.wait().await;
			match rest.current_user().await {
				Ok(bot) => log_ready_banner(&bot, &server_url),
				Err(e) => tracing::warn!(error = %e, "failed to fetch bot identity"),
			}
			scheduler.start().await;
		}
	});

	let state = AppState::new(
		Arc::clone(&coordinator),
		oauth,
		AuthorizeSettings::from_config(&config),
	)
	.with_scheduler(Arc::clone(&scheduler))
	.with_gateway(gateway.stats());
	let app = create_router(state);

	let addr = config.socket_addr();
	let listener = tokio::net::TcpListener::bind(&addr)
		.await
		.with_context(|| format!("failed to bind {addr}"))?;
	tracing::info!("Webserver running on {}", addr);

	if let Err(e) = axum::serve(listener, app)
		.with_graceful_shutdown(shutdown_signal())
		.await
	{
		tracing::error!(error = %e, "Server error");
	}

	on_ready.abort();
	scheduler.shutdown().await;
	gateway.stop().await;
	// The gateway task owned the only sender.
	if let Err(e) = event_loop.await {
		tracing::warn!(error = %e, "event loop ended abnormally");
	}
	drop(http);

	tracing::info!("Shutting down");
	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = tokio::signal::ctrl_c().await {
			tracing::error!(error = %e, "failed to listen for Ctrl-C");
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
			Ok(mut signal) => {
				signal.recv().await;
			}
			Err(e) => {
				tracing::error!(error = %e, "failed to listen for SIGTERM");
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {}
		_ = terminate => {}
	}

	tracing::info!("Received shutdown signal");
}
