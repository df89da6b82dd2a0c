// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription engine: one subscription, many monitored items, channel
//! delivery.
//!
//! The engine owns at most one server-side subscription per session,
//! created lazily on the first subscribe and reused thereafter —
//! [`unsubscribe_all`](SubscriptionEngine::unsubscribe_all) removes every
//! monitored item but keeps the subscription for later reuse. Each
//! monitored item samples one node's Value attribute with a bounded server
//! queue (depth 10, discard oldest).
//!
//! Notifications are not delivered by callback. Each subscribe hands back
//! an `mpsc::Receiver<DataChange>`; a router task drains the transport's
//! raw notification stream and forwards into the owning item's channel
//! with `try_send`, so a slow consumer drops notifications instead of
//! blocking the router.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::codec::UaValue;
use crate::error::SubscriptionError;
use crate::transport::{MonitoredItemSettings, RawNotification, UaTransport};
use crate::types::NodeId;

/// Minimum accepted sampling interval, in milliseconds. Enforced by the
/// facade guard before a request reaches this engine.
pub const MIN_SAMPLING_INTERVAL_MS: u64 = 100;

/// Client-side channel capacity per monitored item.
const ITEM_CHANNEL_CAPACITY: usize = 16;

/// One delivered data-change notification.
#[derive(Debug, Clone, PartialEq)]
pub struct DataChange {
    /// Node the change is for.
    pub node_id: NodeId,
    /// The new value.
    pub value: UaValue,
    /// Source timestamp of the change.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp of the change.
    pub server_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct ActiveSubscription {
    subscription_id: u32,
    publishing_interval: Duration,
    /// Server item id → monitored node.
    items: HashMap<u32, NodeId>,
    /// Monitored node → server item id, for duplicate detection.
    node_to_item: HashMap<NodeId, u32>,
    router: JoinHandle<()>,
}

/// Owns the single subscription and routes notifications to per-item
/// channels.
#[derive(Debug, Default)]
pub struct SubscriptionEngine {
    inner: RwLock<Option<ActiveSubscription>>,
    routes: Arc<RwLock<HashMap<u32, mpsc::Sender<DataChange>>>>,
    dropped: Arc<AtomicU64>,
}

impl SubscriptionEngine {
    /// Creates an engine with no subscription.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the server-side subscription exists.
    pub async fn has_subscription(&self) -> bool {
        self.inner.read().await.is_some()
    }

    /// Number of live monitored items.
    pub async fn monitored_count(&self) -> usize {
        self.inner.read().await.as_ref().map_or(0, |s| s.items.len())
    }

    /// Notifications dropped because an item's channel was full or closed.
    pub fn dropped_notifications(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Adds a monitored item for `node`, lazily creating the subscription
    /// on first use, and returns the item's notification channel.
    pub async fn subscribe<T: UaTransport + ?Sized>(
        &self,
        transport: &T,
        node: &NodeId,
        interval_ms: u64,
    ) -> Result<mpsc::Receiver<DataChange>, SubscriptionError> {
        let mut inner = self.inner.write().await;

        if inner.is_none() {
            let publishing_interval = Duration::from_millis(interval_ms);
            let subscription_id = transport
                .create_subscription(publishing_interval)
                .await
                .map_err(|e| SubscriptionError::create_failed(e.to_string()))?;

            let stream = transport
                .notification_stream()
                .await
                .map_err(|e| SubscriptionError::create_failed(e.to_string()))?;
            let router =
                spawn_router(stream, Arc::clone(&self.routes), Arc::clone(&self.dropped));

            info!(subscription_id, interval_ms, "subscription created");
            *inner = Some(ActiveSubscription {
                subscription_id,
                publishing_interval,
                items: HashMap::new(),
                node_to_item: HashMap::new(),
                router,
            });
        }

        let subscription = inner.as_mut().unwrap_or_else(|| unreachable!());

        if subscription.node_to_item.contains_key(node) {
            return Err(SubscriptionError::item_failed(
                node.to_opc_string(),
                "node is already monitored",
            ));
        }

        let settings = MonitoredItemSettings::with_interval(interval_ms);
        let item_id = transport
            .create_monitored_item(subscription.subscription_id, node, &settings)
            .await
            .map_err(|e| SubscriptionError::item_failed(node.to_opc_string(), e.to_string()))?;

        let (tx, rx) = mpsc::channel(ITEM_CHANNEL_CAPACITY);
        self.routes.write().await.insert(item_id, tx);
        subscription.items.insert(item_id, node.clone());
        subscription.node_to_item.insert(node.clone(), item_id);

        debug!(item_id, node = %node, interval_ms, "monitored item created");
        Ok(rx)
    }

    /// Removes every monitored item, retaining the subscription for reuse.
    ///
    /// A no-op when no subscription exists. Local item state is released
    /// even when the server-side removal fails.
    pub async fn unsubscribe_all<T: UaTransport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<(), SubscriptionError> {
        let mut inner = self.inner.write().await;
        let Some(subscription) = inner.as_mut() else {
            debug!("unsubscribe with no subscription, nothing to do");
            return Ok(());
        };
        if subscription.items.is_empty() {
            return Ok(());
        }

        let item_ids: Vec<u32> = subscription.items.keys().copied().collect();
        let result = transport
            .delete_monitored_items(subscription.subscription_id, &item_ids)
            .await;

        subscription.items.clear();
        subscription.node_to_item.clear();
        self.routes.write().await.clear();
        info!(removed = item_ids.len(), "monitored items removed");

        result.map_err(|e| SubscriptionError::item_failed("*", e.to_string()))
    }

    /// Deletes the server-side subscription and drops all local state.
    /// Used by disconnect; server failure is returned but never blocks the
    /// local release.
    pub async fn shutdown<T: UaTransport + ?Sized>(
        &self,
        transport: &T,
    ) -> Result<(), SubscriptionError> {
        let subscription_id = {
            let mut inner = self.inner.write().await;
            let Some(subscription) = inner.take() else {
                return Ok(());
            };
            subscription.router.abort();
            subscription.subscription_id
        };
        self.routes.write().await.clear();

        transport
            .delete_subscription(subscription_id)
            .await
            .map_err(|e| SubscriptionError::create_failed(e.to_string()))
    }

    /// Drops all local subscription state without server calls. Used when
    /// the session is already gone.
    pub async fn invalidate(&self) {
        if let Some(subscription) = self.inner.write().await.take() {
            subscription.router.abort();
            warn!(
                subscription_id = subscription.subscription_id,
                "subscription invalidated with session"
            );
        }
        self.routes.write().await.clear();
    }

    /// Publishing interval of the live subscription, if any.
    pub async fn publishing_interval(&self) -> Option<Duration> {
        self.inner.read().await.as_ref().map(|s| s.publishing_interval)
    }
}

fn spawn_router(
    mut stream: mpsc::Receiver<RawNotification>,
    routes: Arc<RwLock<HashMap<u32, mpsc::Sender<DataChange>>>>,
    dropped: Arc<AtomicU64>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(raw) = stream.recv().await {
            let routes = routes.read().await;
            let Some(tx) = routes.get(&raw.item_id) else {
                trace!(item_id = raw.item_id, "notification for unknown item dropped");
                dropped.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            let change = DataChange {
                node_id: raw.node_id,
                value: raw.value,
                source_timestamp: raw.source_timestamp,
                server_timestamp: raw.server_timestamp,
            };
            if tx.try_send(change).is_err() {
                // Receiver full or gone. The server-side queue is the
                // authoritative buffer; never block the router.
                dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
        debug!("notification stream ended, router exiting");
    })
}
