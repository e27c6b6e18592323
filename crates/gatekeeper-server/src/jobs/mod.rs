// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Background jobs.

pub mod handshake_sweep;

pub use handshake_sweep::HandshakeSweepJob;
