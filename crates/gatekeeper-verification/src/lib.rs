// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Verification coordinator.
//!
//! Reconciles OAuth callbacks, gateway membership updates and the bot's own
//! join-on-behalf action into role grants. A member who authorized while
//! still behind Membership Screening is remembered and granted the role when
//! the screening-clear update arrives.

pub mod audit;
pub mod coordinator;
pub mod handshake;
pub mod state;

pub use audit::{AuditRecord, AUDIT_COLOUR, AUDIT_TITLE};
pub use coordinator::{Coordinator, CoordinatorConfig};
pub use handshake::{HandshakeState, HANDSHAKE_TOKEN_BYTES};
pub use state::{PendingSet, VerificationState};
