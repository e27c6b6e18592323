// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

pub mod discord;
pub mod http;
pub mod logging;
pub mod oauth;
pub mod verification;

pub use discord::{DiscordConfig, DiscordConfigLayer};
pub use http::{HttpConfig, HttpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use oauth::{OAuthConfig, OAuthConfigLayer};
pub use verification::{VerificationConfig, VerificationConfigLayer};
