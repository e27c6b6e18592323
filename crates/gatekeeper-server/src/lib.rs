// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Gatekeeper server.
//!
//! Serves the OAuth `/authorize` callback, feeds gateway membership events to
//! the verification coordinator and runs the handshake sweep.

pub mod api;
pub mod events;
pub mod jobs;
pub mod logging;
pub mod routes;
pub mod startup;

pub use api::{create_router, AppState, AuthorizeSettings};
pub use events::spawn_event_loop;
pub use logging::init_tracing;
