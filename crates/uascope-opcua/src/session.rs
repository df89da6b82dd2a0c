// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session lifecycle manager.
//!
//! Owns the `Disconnected → Connecting → Connected` state machine and the
//! single live [`SessionHandle`]. The connect pipeline:
//!
//! 1. Validate the client configuration (fixed protocol timeouts).
//! 2. Provision a client certificate iff the requested policy needs one.
//! 3. Resolve the endpoint (bounded discovery, exact security match).
//! 4. Verify the resolved endpoint equals the request exactly.
//! 5. Create the session with anonymous identity.
//!
//! Any failure rolls back to `Disconnected` with no partial session.
//! Disconnect is idempotent and releases local state unconditionally, even
//! when the server-side close fails. There is no automatic reconnection.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::certificate;
use crate::endpoint::{self, EndpointDescriptor};
use crate::error::{ClientError, ClientResult, ConnectError};
use crate::transport::UaTransport;
use crate::types::{ClientConfig, SecurityMode, SecurityPolicy};

// ============================================================================
// Connection state
// ============================================================================

/// Connection state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session exists.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// A live session exists.
    Connected,
}

impl ConnectionState {
    /// Returns `true` if a live session exists.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

// ============================================================================
// Session handle
// ============================================================================

/// Owned record of one live session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Server-assigned session id.
    pub session_id: String,
    /// Endpoint the session was established against.
    pub endpoint: EndpointDescriptor,
    /// Negotiated security policy.
    pub policy: SecurityPolicy,
    /// Negotiated security mode.
    pub mode: SecurityMode,
    /// When the session was established.
    pub established_at: DateTime<Utc>,
}

// ============================================================================
// Stats
// ============================================================================

/// Lifecycle counters, readable without locking.
#[derive(Debug, Default)]
pub struct SessionStats {
    connects: AtomicU64,
    disconnects: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    /// Successful connects.
    pub connects: u64,
    /// Completed disconnects.
    pub disconnects: u64,
    /// Failed connect attempts.
    pub failures: u64,
}

impl SessionStats {
    /// Takes a snapshot of the counters.
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            disconnects: self.disconnects.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Session manager
// ============================================================================

/// Owns the connection state machine and the live session handle.
///
/// At most one session exists per manager. A reconnect tears the old
/// session down before creating the new one.
#[derive(Debug)]
pub struct SessionManager {
    config: ClientConfig,
    state: RwLock<ConnectionState>,
    session: RwLock<Option<SessionHandle>>,
    stats: SessionStats,
}

impl SessionManager {
    /// Creates a manager in the `Disconnected` state.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            state: RwLock::new(ConnectionState::Disconnected),
            session: RwLock::new(None),
            stats: SessionStats::default(),
        }
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Returns `true` if a live session exists.
    pub async fn is_connected(&self) -> bool {
        self.state().await.is_connected()
    }

    /// Clone of the live session handle, if any.
    pub async fn session(&self) -> Option<SessionHandle> {
        self.session.read().await.clone()
    }

    /// Lifecycle counters.
    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }

    /// The configuration the manager was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Returns the live session handle or `NotConnected`.
    pub async fn ensure_connected(&self) -> ClientResult<SessionHandle> {
        self.session
            .read()
            .await
            .clone()
            .ok_or_else(|| ClientError::Connect(ConnectError::NotConnected))
    }

    /// Runs the connect pipeline against `transport`.
    ///
    /// An existing session is torn down first. On failure the manager is
    /// left `Disconnected` with no session retained.
    pub async fn connect<T: UaTransport>(
        &self,
        transport: &mut T,
        url: &str,
        policy: SecurityPolicy,
        mode: SecurityMode,
    ) -> ClientResult<SessionHandle> {
        if self.is_connected().await {
            debug!("reconnect requested, tearing down existing session");
            if let Err(e) = self.disconnect(transport).await {
                e.log();
            }
        }

        *self.state.write().await = ConnectionState::Connecting;
        info!(url, %policy, %mode, "connecting");

        match self.connect_inner(transport, url, policy, mode).await {
            Ok(handle) => {
                *self.session.write().await = Some(handle.clone());
                *self.state.write().await = ConnectionState::Connected;
                self.stats.connects.fetch_add(1, Ordering::Relaxed);
                info!(session_id = %handle.session_id, "connected");
                Ok(handle)
            }
            Err(err) => {
                *self.session.write().await = None;
                *self.state.write().await = ConnectionState::Disconnected;
                self.stats.failures.fetch_add(1, Ordering::Relaxed);
                Err(err)
            }
        }
    }

    async fn connect_inner<T: UaTransport>(
        &self,
        transport: &mut T,
        url: &str,
        policy: SecurityPolicy,
        mode: SecurityMode,
    ) -> ClientResult<SessionHandle> {
        self.config.validate()?;

        let identity = if policy.requires_certificate() {
            Some(certificate::ensure_identity(&self.config)?)
        } else {
            None
        };

        let endpoint = endpoint::resolve(&*transport, &self.config, url, policy, mode).await?;

        // resolve() guarantees an exact match, but the handle we retain is
        // built from the endpoint, so the invariant is re-checked here.
        if !endpoint.matches(policy, mode) {
            return Err(ClientError::Connect(ConnectError::SecurityMismatch {
                requested_policy: policy,
                requested_mode: mode,
                offered_policy: endpoint.policy,
                offered_mode: endpoint.mode,
            }));
        }

        let session_id = tokio::time::timeout(
            self.config.operation_timeout,
            transport.create_session(&endpoint, &self.config, identity.as_ref()),
        )
        .await
        .map_err(|_| {
            ConnectError::session_creation(url, "session creation timed out")
        })?
        .map_err(|e| ConnectError::session_creation(url, e.to_string()))?;

        Ok(SessionHandle {
            session_id,
            endpoint,
            policy,
            mode,
            established_at: Utc::now(),
        })
    }

    /// Closes the session. Idempotent: a no-op when already disconnected.
    ///
    /// Local state is released unconditionally; a failed server-side close
    /// is returned but never prevents the release, and callers on the
    /// best-effort path may ignore it.
    pub async fn disconnect<T: UaTransport>(&self, transport: &mut T) -> ClientResult<()> {
        let had_session = self.session.read().await.is_some();
        if !had_session {
            debug!("disconnect with no session, nothing to do");
            return Ok(());
        }

        let close_result = transport.close_session().await;

        *self.session.write().await = None;
        *self.state.write().await = ConnectionState::Disconnected;
        self.stats.disconnects.fetch_add(1, Ordering::Relaxed);
        info!("disconnected");

        if let Err(e) = close_result {
            warn!(error = %e, "server-side session close failed");
            return Err(ClientError::Connect(ConnectError::close_failed(e.to_string())));
        }
        Ok(())
    }

    /// Drops local session state without a server round trip. Used when the
    /// transport is already known to be gone.
    pub async fn invalidate(&self) {
        *self.session.write().await = None;
        *self.state.write().await = ConnectionState::Disconnected;
    }
}
