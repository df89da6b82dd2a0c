// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! High-level client facade.
//!
//! [`UaClient`] ties the engine together: the session lifecycle manager,
//! the node tree, the subscription engine, and a transport serialized
//! behind one `tokio::sync::Mutex`. The underlying session is not assumed
//! safe for unsynchronized concurrent use, so every protocol call —
//! including connect and disconnect — takes that mutex; a disconnect is
//! therefore sequenced after any in-flight operation and no operation ever
//! sees a disposed session.
//!
//! Caller-side guards live here: `subscribe` rejects intervals below
//! [`MIN_SAMPLING_INTERVAL_MS`] before the engine is reached.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tracing::{debug, info};

use crate::browse::{self, NodeDescriptor};
use crate::codec;
use crate::error::{ClientError, ClientResult, OperationError, SubscriptionError};
use crate::session::{ConnectionState, SessionManager, SessionStatsSnapshot};
use crate::subscription::{DataChange, SubscriptionEngine, MIN_SAMPLING_INTERVAL_MS};
use crate::transport::{ReadOutcome, UaTransport, STATUS_BAD_MASK};
use crate::tree::{self, NodeKey, NodeTree};
use crate::types::{ClientConfig, NodeId, SecurityMode, SecurityPolicy, UaDataType};

// ============================================================================
// Stats
// ============================================================================

/// Operation counters, readable without locking.
#[derive(Debug, Default)]
pub struct ClientStats {
    reads: AtomicU64,
    writes: AtomicU64,
    browses: AtomicU64,
    subscribes: AtomicU64,
}

/// Point-in-time copy of [`ClientStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStatsSnapshot {
    /// Value reads issued.
    pub reads: u64,
    /// Writes issued.
    pub writes: u64,
    /// Browse calls issued.
    pub browses: u64,
    /// Monitored items requested.
    pub subscribes: u64,
}

impl ClientStats {
    fn snapshot(&self) -> ClientStatsSnapshot {
        ClientStatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            browses: self.browses.load(Ordering::Relaxed),
            subscribes: self.subscribes.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// OPC UA client engine facade, generic over the transport.
pub struct UaClient<T: UaTransport> {
    transport: Arc<Mutex<T>>,
    session: SessionManager,
    subscriptions: SubscriptionEngine,
    tree: RwLock<NodeTree>,
    stats: ClientStats,
}

impl<T: UaTransport> UaClient<T> {
    /// Creates a client over `transport` with a validated configuration.
    pub fn new(transport: T, config: ClientConfig) -> ClientResult<Self> {
        config.validate()?;
        Ok(Self {
            transport: Arc::new(Mutex::new(transport)),
            session: SessionManager::new(config),
            subscriptions: SubscriptionEngine::new(),
            tree: RwLock::new(NodeTree::new()),
            stats: ClientStats::default(),
        })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        self.session.config()
    }

    /// Current connection state.
    pub async fn state(&self) -> ConnectionState {
        self.session.state().await
    }

    /// Returns `true` while a live session exists.
    pub async fn is_connected(&self) -> bool {
        self.session.is_connected().await
    }

    /// Operation counters.
    pub fn stats(&self) -> ClientStatsSnapshot {
        self.stats.snapshot()
    }

    /// Session lifecycle counters.
    pub fn session_stats(&self) -> SessionStatsSnapshot {
        self.session.stats()
    }

    /// Connects to `url` with the requested security configuration.
    ///
    /// Runs the full pipeline (certificate iff the policy needs one,
    /// bounded discovery, exact endpoint match, anonymous session). Any
    /// previous session's derived state — subscription, monitored items,
    /// tree — is discarded first.
    pub async fn connect(
        &self,
        url: &str,
        policy: SecurityPolicy,
        mode: SecurityMode,
    ) -> ClientResult<()> {
        let mut transport = self.transport.lock().await;

        // On a reconnect over a live session the subscription is deleted
        // server-side before the old session closes; without a session
        // only local state remains to drop.
        if self.session.is_connected().await {
            if let Err(e) = self.subscriptions.shutdown(&*transport).await {
                ClientError::from(e).log();
            }
        } else {
            self.subscriptions.invalidate().await;
        }
        *self.tree.write().await = NodeTree::new();

        self.session.connect(&mut *transport, url, policy, mode).await?;
        Ok(())
    }

    /// Disconnects. Idempotent; safe when already disconnected.
    ///
    /// The subscription is deleted before the session closes; both local
    /// references are released unconditionally even when the server-side
    /// calls fail.
    pub async fn disconnect(&self) -> ClientResult<()> {
        let mut transport = self.transport.lock().await;

        if let Err(e) = self.subscriptions.shutdown(&*transport).await {
            // Best-effort teardown; the session close still proceeds.
            ClientError::from(e).log();
        }
        *self.tree.write().await = NodeTree::new();

        self.session.disconnect(&mut *transport).await
    }

    /// Browses one level of children below `node`.
    ///
    /// An absent session yields an empty list, not an error. A server-side
    /// browse failure is returned; callers treating browse as best-effort
    /// may ignore it and observe "no children".
    pub async fn browse(&self, node: &NodeId) -> ClientResult<Vec<NodeDescriptor>> {
        if !self.session.is_connected().await {
            debug!(node = %node, "browse while disconnected, empty result");
            return Ok(Vec::new());
        }
        let transport = self.transport.lock().await;
        self.stats.browses.fetch_add(1, Ordering::Relaxed);
        Ok(browse::browse_children(&*transport, node).await?)
    }

    /// Reads `node`'s Value attribute with both timestamps.
    pub async fn read(&self, node: &NodeId) -> ClientResult<ReadOutcome> {
        self.session.ensure_connected().await?;
        let transport = self.transport.lock().await;
        self.stats.reads.fetch_add(1, Ordering::Relaxed);

        let outcome = transport
            .read_value(node)
            .await
            .map_err(|_| OperationError::read_failed(node.to_opc_string(), STATUS_BAD_MASK))?;
        if !outcome.is_good() {
            return Err(OperationError::read_failed(node.to_opc_string(), outcome.status).into());
        }
        Ok(outcome)
    }

    /// Writes textual input to `node`, encoding it per the node's declared
    /// data type.
    ///
    /// One round trip resolves the declared type, then a single write is
    /// issued. Fails with `WriteRejected` when the type cannot be read or
    /// the server status is not good. One node per call; no batching.
    pub async fn write(&self, node: &NodeId, text: &str) -> ClientResult<()> {
        self.session.ensure_connected().await?;
        let transport = self.transport.lock().await;
        self.stats.writes.fetch_add(1, Ordering::Relaxed);

        let type_node = transport
            .read_data_type(node)
            .await
            .map_err(|_| OperationError::write_rejected(node.to_opc_string(), STATUS_BAD_MASK))?;
        let data_type = browse::builtin_data_type(&type_node).unwrap_or(UaDataType::String);
        let value = codec::encode(text, data_type);

        let outcome = transport
            .write_value(node, &value)
            .await
            .map_err(|_| OperationError::write_rejected(node.to_opc_string(), STATUS_BAD_MASK))?;
        if !outcome.is_good() {
            return Err(
                OperationError::write_rejected(node.to_opc_string(), outcome.status).into()
            );
        }
        info!(node = %node, value = %value, "write accepted");
        Ok(())
    }

    /// Starts monitoring `node` at `interval_ms`, returning the channel
    /// notifications arrive on.
    ///
    /// Rejects intervals below the 100 ms minimum here, before the engine
    /// is reached. The single subscription is created lazily on first use
    /// and reused by subsequent calls. Failures are explicit but
    /// best-effort by contract; callers may log and continue.
    pub async fn subscribe(
        &self,
        node: &NodeId,
        interval_ms: u64,
    ) -> ClientResult<mpsc::Receiver<DataChange>> {
        if interval_ms < MIN_SAMPLING_INTERVAL_MS {
            return Err(SubscriptionError::IntervalTooShort {
                requested_ms: interval_ms,
                minimum_ms: MIN_SAMPLING_INTERVAL_MS,
            }
            .into());
        }
        if !self.session.is_connected().await {
            return Err(SubscriptionError::NotConnected.into());
        }

        let transport = self.transport.lock().await;
        self.stats.subscribes.fetch_add(1, Ordering::Relaxed);
        Ok(self.subscriptions.subscribe(&*transport, node, interval_ms).await?)
    }

    /// Removes every monitored item, keeping the subscription for reuse.
    /// A no-op without a session or subscription.
    pub async fn unsubscribe_all(&self) -> ClientResult<()> {
        if !self.session.is_connected().await {
            return Ok(());
        }
        let transport = self.transport.lock().await;
        Ok(self.subscriptions.unsubscribe_all(&*transport).await?)
    }

    /// Returns `true` once the lazily created subscription exists.
    pub async fn has_subscription(&self) -> bool {
        self.subscriptions.has_subscription().await
    }

    /// Number of live monitored items.
    pub async fn monitored_count(&self) -> usize {
        self.subscriptions.monitored_count().await
    }

    /// Key of the tree root (the Objects folder).
    pub async fn tree_root(&self) -> NodeKey {
        self.tree.read().await.root()
    }

    /// Descriptor of a tree entry.
    pub async fn node(&self, key: NodeKey) -> Option<NodeDescriptor> {
        self.tree.read().await.descriptor(key).cloned()
    }

    /// Child keys of a tree entry.
    pub async fn node_children(&self, key: NodeKey) -> Vec<NodeKey> {
        self.tree.read().await.children(key).to_vec()
    }

    /// Expands one tree entry, browsing its children on first call.
    /// Idempotent: an expanded entry answers from the tree.
    pub async fn expand_node(&self, key: NodeKey) -> ClientResult<Vec<NodeKey>> {
        self.session.ensure_connected().await?;
        let transport = self.transport.lock().await;
        let mut tree = self.tree.write().await;
        self.stats.browses.fetch_add(1, Ordering::Relaxed);
        Ok(tree::expand(&mut tree, &*transport, key).await?)
    }

    /// Locates a node by serialized identity, expanding unexpanded
    /// ancestors on demand. `None` when disconnected, unreachable, or a
    /// browse along the way fails.
    ///
    /// May issue one browse per unexpanded ancestor; latency grows with
    /// path depth.
    pub async fn resolve_and_expand(&self, target: &NodeId) -> Option<NodeDescriptor> {
        if !self.session.is_connected().await {
            return None;
        }
        let transport = self.transport.lock().await;
        let mut tree = self.tree.write().await;
        let key = tree::resolve_and_expand(&mut tree, &*transport, target).await?;
        tree.descriptor(key).cloned()
    }
}
