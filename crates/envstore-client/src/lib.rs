// SPDX-License-Identifier: GPL-3.0-or-later

//! API client for the envstore environment-management service.
//!
//! This crate drives the server's REST API for end-to-end test scripts:
//! the two-step login exchange, namespace creation with status polling,
//! specification submission with build polling, scoped-token minting, and
//! the deletion operations.

pub mod client;
pub mod error;
pub mod models;
pub mod poll;

pub use client::{EnvstoreClient, EnvstoreClientBuilder};
pub use error::{ClientError, Result};
pub use models::{ApiResponse, BuildStatus, NamespaceStatus, TokenRequest};
pub use poll::{poll_until, PollPolicy, PollStep};
