// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! # UBridge Gateway - Bridging HTTP Server
//!
//! Turns externally-arriving synchronous HTTP requests into asynchronous
//! round-trips through the bridge. The universal side registers routes with
//! `serve`, starts the listener with `setport`, and answers forwarded hits
//! with `respond`; each serving connection blocks on a bounded poll of the
//! session table until its correlated reply arrives or the bound is
//! exceeded.
//!
//! The controller and its tables are ordinary bridge collaborators: routes
//! live in a [`PathTable`], in-flight waits in a [`SessionTable`], and the
//! whole HTTP surface is one [`ServerController`] task handler registered
//! like any other.

pub mod handlers;
pub mod paths;
pub mod server;
pub mod session;

pub use paths::{PathTable, RouteMatch, ServeRegistration};
pub use server::{GatewayState, ServerController};
pub use session::{HttpReply, SessionTable};
