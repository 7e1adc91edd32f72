// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 proceedlabs

//! Error types for bridge operations.
//!
//! The `Display` text of a [`BridgeError`] is exactly what travels to the
//! caller inside an error response, so variants carry everything needed to
//! produce a useful message.

use std::fmt;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while routing or executing a bridge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // ========================================================================
    // Envelope Errors
    // ========================================================================
    /// Wire tuple could not be parsed into a request (rejected before dispatch).
    MalformedMessage(String),

    // ========================================================================
    // Routing Errors
    // ========================================================================
    /// Task name is not present in the registry.
    UnknownTask(String),
    /// Capability name is not present in the capability sub-router.
    UnknownCapability(String),

    // ========================================================================
    // Permission Errors
    // ========================================================================
    /// One or more required permissions are not granted; lists exactly the
    /// missing set.
    PermissionDenied(Vec<String>),

    // ========================================================================
    // Execution Errors
    // ========================================================================
    /// A failure escaped the handler; caught at the dispatcher boundary.
    HandlerFault(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// A single-outstanding-operation was started twice (publish, set-port).
    AlreadyStarted(String),
    /// A stop/unpublish arrived with nothing running.
    NotStarted(String),

    // ========================================================================
    // Gateway Errors
    // ========================================================================
    /// Bounded wait for a correlated reply was exceeded.
    Timeout,
    /// Protocol-level misuse, e.g. an unsupported HTTP status code.
    ProtocolError(String),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Configuration file or value is invalid.
    Config(String),
    /// Underlying I/O failure (socket bind, file read).
    Io(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMessage(msg) => write!(f, "malformed message: {}", msg),
            Self::UnknownTask(name) => write!(f, "task '{}' is not implemented", name),
            Self::UnknownCapability(name) => write!(f, "capability '{}' is not known", name),
            Self::PermissionDenied(missing) => {
                write!(f, "missing permissions: {}", missing.join(", "))
            }
            Self::HandlerFault(msg) => write!(f, "handler failed: {}", msg),
            Self::AlreadyStarted(what) => write!(f, "{} already started", what),
            Self::NotStarted(what) => write!(f, "{}", what),
            Self::Timeout => write!(f, "timeout"),
            Self::ProtocolError(msg) => write!(f, "protocol error: {}", msg),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}
