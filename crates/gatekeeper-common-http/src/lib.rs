// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Shared HTTP utilities for Gatekeeper.
//!
//! - One client builder with the User-Agent Discord expects from bots
//! - Exponential backoff for lookups that may briefly lag behind a write

mod client;
mod retry;

pub use client::{builder, new_client, new_client_with_timeout, user_agent, DEFAULT_TIMEOUT};
pub use retry::{retry, RetryConfig, RetryableError};
