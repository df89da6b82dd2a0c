// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Error taxonomy for the client engine.
//!
//! A single umbrella [`ClientError`] wraps one sub-enum per failure domain:
//!
//! - [`ConnectError`] — connect pipeline failures (fatal to the attempt,
//!   client returns to `Disconnected`)
//! - [`EndpointError`] — discovery/selection failures, including the
//!   no-exact-security-match case that must never be auto-downgraded
//! - [`BrowseError`] — non-fatal; the facade degrades these to "no children"
//! - [`OperationError`] — read/write failures surfaced to the caller
//! - [`SubscriptionError`] — best-effort path; the facade logs and discards
//! - [`SettingsError`] — persistence helper failures, always ignorable
//! - [`ConfigError`] — invalid configuration or identifier syntax
//!
//! Every error is an explicit value. "Best-effort" paths return `Result` and
//! the caller decides to ignore, rather than this layer swallowing failures.

use std::time::Duration;

use thiserror::Error;

use crate::types::{SecurityMode, SecurityPolicy};

// ============================================================================
// Umbrella error
// ============================================================================

/// Top-level error type for all engine operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connect pipeline failure.
    #[error("connect failed: {0}")]
    Connect(#[from] ConnectError),

    /// Endpoint discovery/selection failure.
    #[error("endpoint resolution failed: {0}")]
    Endpoint(#[from] EndpointError),

    /// Browse failure (non-fatal by contract).
    #[error("browse failed: {0}")]
    Browse(#[from] BrowseError),

    /// Read/write operation failure.
    #[error("operation failed: {0}")]
    Operation(#[from] OperationError),

    /// Subscription engine failure (best-effort by contract).
    #[error("subscription failed: {0}")]
    Subscription(#[from] SubscriptionError),

    /// Settings store failure (best-effort by contract).
    #[error("settings store failed: {0}")]
    Settings(#[from] SettingsError),

    /// Invalid configuration or identifier.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(err: ConfigError) -> Self {
        Self::Config(err)
    }

    /// Returns `true` if retrying the same call may succeed.
    ///
    /// Security mismatches, invalid configuration, and rejected writes are
    /// deterministic and never retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(e) => e.is_retryable(),
            Self::Endpoint(_) => false,
            Self::Browse(_) => true,
            Self::Operation(e) => matches!(e, OperationError::ReadFailed { .. }),
            Self::Subscription(e) => !matches!(e, SubscriptionError::IntervalTooShort { .. }),
            Self::Settings(_) => true,
            Self::Config(_) => false,
        }
    }

    /// Returns a short static category label for logging and metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Endpoint(_) => "endpoint",
            Self::Browse(_) => "browse",
            Self::Operation(_) => "operation",
            Self::Subscription(_) => "subscription",
            Self::Settings(_) => "settings",
            Self::Config(_) => "config",
        }
    }

    /// Logs the error at a severity appropriate to its domain.
    ///
    /// Best-effort domains (browse, subscription, settings) log at `warn`,
    /// everything else at `error`.
    pub fn log(&self) {
        match self {
            Self::Browse(_) | Self::Subscription(_) | Self::Settings(_) => {
                tracing::warn!(category = self.category(), error = %self, "non-fatal failure");
            }
            _ => {
                tracing::error!(category = self.category(), error = %self, "operation failed");
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type ClientResult<T> = Result<T, ClientError>;

// ============================================================================
// Connect errors
// ============================================================================

/// Failures of the connect pipeline. All of these abort the attempt and
/// leave the client `Disconnected` with no partial session retained.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Endpoint discovery did not answer within the discovery timeout.
    /// Fatal, never retried automatically.
    #[error("endpoint discovery timed out after {timeout:?} for {url}")]
    DiscoveryTimedOut {
        /// Server URL queried.
        url: String,
        /// Configured discovery timeout.
        timeout: Duration,
    },

    /// Client certificate could not be loaded or generated.
    #[error("certificate provisioning failed: {reason}")]
    CertificateProvisioning {
        /// Human-readable cause.
        reason: String,
    },

    /// The resolved endpoint does not carry exactly the requested security
    /// configuration. Connecting anyway would silently weaken security.
    #[error(
        "security mismatch: requested {requested_policy}/{requested_mode}, \
         server offered {offered_policy}/{offered_mode}"
    )]
    SecurityMismatch {
        /// Policy the caller asked for.
        requested_policy: SecurityPolicy,
        /// Mode the caller asked for.
        requested_mode: SecurityMode,
        /// Policy on the resolved endpoint.
        offered_policy: SecurityPolicy,
        /// Mode on the resolved endpoint.
        offered_mode: SecurityMode,
    },

    /// The session could not be created or activated on the server.
    #[error("session creation failed on {url}: {reason}")]
    SessionCreation {
        /// Endpoint URL.
        url: String,
        /// Server- or transport-reported cause.
        reason: String,
    },

    /// Server-side session close failed during disconnect. Local state is
    /// released regardless; callers may ignore this.
    #[error("session close failed: {reason}")]
    CloseFailed {
        /// Server- or transport-reported cause.
        reason: String,
    },

    /// An operation required a connected session and none exists.
    #[error("not connected")]
    NotConnected,
}

impl ConnectError {
    /// Creates a discovery-timeout error.
    pub fn discovery_timed_out(url: impl Into<String>, timeout: Duration) -> Self {
        Self::DiscoveryTimedOut { url: url.into(), timeout }
    }

    /// Creates a certificate-provisioning error.
    pub fn certificate(reason: impl Into<String>) -> Self {
        Self::CertificateProvisioning { reason: reason.into() }
    }

    /// Creates a session-creation error.
    pub fn session_creation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionCreation { url: url.into(), reason: reason.into() }
    }

    /// Creates a session-close error.
    pub fn close_failed(reason: impl Into<String>) -> Self {
        Self::CloseFailed { reason: reason.into() }
    }

    /// Returns `true` if retrying the connect may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryTimedOut { .. } | Self::SessionCreation { .. }
        )
    }
}

// ============================================================================
// Endpoint errors
// ============================================================================

/// Failures while resolving a server endpoint.
#[derive(Debug, Error)]
pub enum EndpointError {
    /// No advertised endpoint matches the requested (policy, mode) pair
    /// exactly. Carries the full advertised list for diagnostics; callers
    /// must surface this, never downgrade.
    #[error(
        "no endpoint matches {requested_policy}/{requested_mode} \
         ({} advertised)", .advertised.len()
    )]
    NoExactMatch {
        /// Requested security policy.
        requested_policy: SecurityPolicy,
        /// Requested security mode.
        requested_mode: SecurityMode,
        /// Every (policy, mode) pair the server advertised.
        advertised: Vec<(SecurityPolicy, SecurityMode)>,
    },

    /// The discovery call itself failed.
    #[error("discovery failed for {url}: {reason}")]
    DiscoveryFailed {
        /// Server URL queried.
        url: String,
        /// Transport-reported cause.
        reason: String,
    },
}

impl EndpointError {
    /// Creates a no-exact-match error.
    pub fn no_exact_match(
        requested_policy: SecurityPolicy,
        requested_mode: SecurityMode,
        advertised: Vec<(SecurityPolicy, SecurityMode)>,
    ) -> Self {
        Self::NoExactMatch { requested_policy, requested_mode, advertised }
    }

    /// Creates a discovery-failed error.
    pub fn discovery_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DiscoveryFailed { url: url.into(), reason: reason.into() }
    }
}

// ============================================================================
// Browse errors
// ============================================================================

/// Failures while browsing children of a node. Non-fatal by contract: the
/// facade degrades these to an empty child list.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// The server rejected or failed the browse call.
    #[error("browse of {node} failed: {reason}")]
    ServerFailure {
        /// Node whose children were requested.
        node: String,
        /// Transport-reported cause.
        reason: String,
    },

    /// Browse was attempted without a connected session.
    #[error("browse of {node} attempted while disconnected")]
    NotConnected {
        /// Node whose children were requested.
        node: String,
    },
}

impl BrowseError {
    /// Creates a server-failure error.
    pub fn server_failure(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ServerFailure { node: node.into(), reason: reason.into() }
    }

    /// Creates a not-connected error.
    pub fn not_connected(node: impl Into<String>) -> Self {
        Self::NotConnected { node: node.into() }
    }
}

// ============================================================================
// Operation errors
// ============================================================================

/// Read/write failures. Surfaced to the caller as failed results; no
/// automatic retry.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A value read failed or returned a bad status.
    #[error("read of {node} failed (status 0x{status:08X})")]
    ReadFailed {
        /// Target node.
        node: String,
        /// Server status code.
        status: u32,
    },

    /// A write was rejected by the server or could not be issued.
    #[error("write to {node} rejected (status 0x{status:08X})")]
    WriteRejected {
        /// Target node.
        node: String,
        /// Server status code.
        status: u32,
    },

    /// The target node's declared data type could not be resolved before a
    /// write.
    #[error("could not resolve data type of {node}")]
    TypeResolution {
        /// Target node.
        node: String,
    },
}

impl OperationError {
    /// Creates a read-failed error.
    pub fn read_failed(node: impl Into<String>, status: u32) -> Self {
        Self::ReadFailed { node: node.into(), status }
    }

    /// Creates a write-rejected error.
    pub fn write_rejected(node: impl Into<String>, status: u32) -> Self {
        Self::WriteRejected { node: node.into(), status }
    }

    /// Creates a type-resolution error.
    pub fn type_resolution(node: impl Into<String>) -> Self {
        Self::TypeResolution { node: node.into() }
    }
}

// ============================================================================
// Subscription errors
// ============================================================================

/// Subscription engine failures. The facade treats these as best-effort:
/// it logs and continues, reads/writes remain authoritative.
#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Requested sampling interval is below the accepted minimum. Raised by
    /// the facade guard before the engine is reached.
    #[error("sampling interval {requested_ms} ms below minimum {minimum_ms} ms")]
    IntervalTooShort {
        /// Interval the caller requested.
        requested_ms: u64,
        /// Minimum accepted interval.
        minimum_ms: u64,
    },

    /// The server-side subscription could not be created.
    #[error("subscription creation failed: {reason}")]
    CreateFailed {
        /// Transport-reported cause.
        reason: String,
    },

    /// A monitored item could not be created or removed.
    #[error("monitored item for {node} failed: {reason}")]
    ItemFailed {
        /// Target node.
        node: String,
        /// Transport-reported cause.
        reason: String,
    },

    /// Subscribe was attempted without a connected session.
    #[error("subscribe attempted while disconnected")]
    NotConnected,
}

impl SubscriptionError {
    /// Creates a create-failed error.
    pub fn create_failed(reason: impl Into<String>) -> Self {
        Self::CreateFailed { reason: reason.into() }
    }

    /// Creates an item-failed error.
    pub fn item_failed(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ItemFailed { node: node.into(), reason: reason.into() }
    }
}

// ============================================================================
// Settings errors
// ============================================================================

/// Settings store failures. Always ignorable: persistence is best-effort
/// and must never propagate as an engine failure.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file could not be read or written.
    #[error("settings io failed at {path}: {source}")]
    Io {
        /// File path involved.
        path: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file content is not valid JSON for the expected shape.
    #[error("settings file {path} is malformed: {source}")]
    Malformed {
        /// File path involved.
        path: String,
        /// Underlying serde error.
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Config errors
// ============================================================================

/// Invalid configuration values or identifier syntax.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A node identifier string did not parse.
    #[error("invalid node id '{input}': {reason}")]
    InvalidNodeId {
        /// Offending input.
        input: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A named configuration field holds an invalid value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Configuration field name.
        field: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A security policy or mode name was not recognized.
    #[error("unknown security descriptor '{input}'")]
    UnknownSecurity {
        /// Offending input.
        input: String,
    },

    /// An identity path string did not parse.
    #[error("invalid identity path '{input}'")]
    InvalidIdentityPath {
        /// Offending input.
        input: String,
    },
}

impl ConfigError {
    /// Creates an invalid-node-id error.
    pub fn invalid_node_id(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidNodeId { input: input.into(), reason: reason.into() }
    }

    /// Creates an invalid-value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field: field.into(), reason: reason.into() }
    }
}
