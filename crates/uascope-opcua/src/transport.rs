// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Session/channel abstraction the engine orchestrates.
//!
//! The engine never touches wire framing or binary encoding. Everything it
//! needs from the protocol stack — discovery, session create/close, browse,
//! attribute reads, writes, subscription management, and the asynchronous
//! notification stream — is expressed as the [`UaTransport`] trait.
//! Production binds a real stack; tests bind an in-memory mock.
//!
//! Transport methods report failures as [`TransportError`], a plain reason
//! carrier. The layers above map those into their own domain errors.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::certificate::ClientIdentity;
use crate::codec::UaValue;
use crate::endpoint::EndpointDescriptor;
use crate::types::{ClientConfig, NodeClass, NodeId};

/// Bit set on every bad status code.
pub const STATUS_BAD_MASK: u32 = 0x8000_0000;

/// The all-good status code.
pub const STATUS_GOOD: u32 = 0;

/// Returns `true` if a status code is good (severity bits clear).
pub fn status_is_good(status: u32) -> bool {
    status & STATUS_BAD_MASK == 0
}

/// Failure reported by a transport implementation.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct TransportError {
    /// Human-readable cause.
    pub reason: String,
}

impl TransportError {
    /// Creates a transport error from a reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

/// Result alias for transport calls.
pub type TransportResult<T> = Result<T, TransportError>;

// ============================================================================
// Wire-facing result types
// ============================================================================

/// Outcome of reading a node's Value attribute, with both timestamps as
/// reported by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadOutcome {
    /// The value read; `UaValue::Null` on bad status.
    pub value: UaValue,
    /// Server status code for the read.
    pub status: u32,
    /// Source timestamp, when the underlying datum changed.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp, when the server observed the value.
    pub server_timestamp: Option<DateTime<Utc>>,
}

impl ReadOutcome {
    /// Returns `true` if the read carried a good status.
    pub fn is_good(&self) -> bool {
        status_is_good(self.status)
    }
}

/// Outcome of a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    /// Server status code for the write.
    pub status: u32,
}

impl WriteOutcome {
    /// Returns `true` if the server accepted the write.
    pub fn is_good(&self) -> bool {
        status_is_good(self.status)
    }
}

/// One reference returned by a browse call, in server order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceDescription {
    /// Target node of the reference.
    pub node_id: NodeId,
    /// Qualified browse name.
    pub browse_name: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Class of the target node.
    pub node_class: NodeClass,
}

/// Sampling parameters for one monitored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredItemSettings {
    /// Sampling interval in milliseconds.
    pub sampling_interval_ms: u64,
    /// Server-side notification queue depth.
    pub queue_size: u32,
    /// Drop the oldest queued notification on overflow.
    pub discard_oldest: bool,
}

impl MonitoredItemSettings {
    /// Standard settings: caller interval, queue depth 10, discard oldest.
    pub fn with_interval(sampling_interval_ms: u64) -> Self {
        Self { sampling_interval_ms, queue_size: 10, discard_oldest: true }
    }
}

/// A data-change notification as delivered by the server, before the
/// subscription engine routes it to the owning monitored item's channel.
#[derive(Debug, Clone, PartialEq)]
pub struct RawNotification {
    /// Server subscription id.
    pub subscription_id: u32,
    /// Server monitored-item id.
    pub item_id: u32,
    /// Node the notification is for.
    pub node_id: NodeId,
    /// The changed value.
    pub value: UaValue,
    /// Source timestamp of the change.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Server timestamp of the change.
    pub server_timestamp: Option<DateTime<Utc>>,
}

// ============================================================================
// Transport trait
// ============================================================================

/// The session/channel abstraction.
///
/// Implementations must be `Send + Sync`; the engine serializes access
/// through a mutex, so interior state needs no finer locking. Session
/// lifetime calls take `&mut self`, per-operation calls take `&self`.
#[async_trait]
pub trait UaTransport: Send + Sync {
    /// Queries the server's discovery interface for all advertised
    /// endpoints. The caller bounds this with the discovery timeout.
    async fn discover_endpoints(&self, url: &str) -> TransportResult<Vec<EndpointDescriptor>>;

    /// Creates and activates a session with anonymous identity against the
    /// given endpoint. `identity` carries the client certificate when the
    /// endpoint's policy requires one. Returns the server session id.
    async fn create_session(
        &mut self,
        endpoint: &EndpointDescriptor,
        config: &ClientConfig,
        identity: Option<&ClientIdentity>,
    ) -> TransportResult<String>;

    /// Closes the current session. Idempotent at the transport level.
    async fn close_session(&mut self) -> TransportResult<()>;

    /// Browses one level of forward hierarchical references from `node`,
    /// restricted to the given node-class mask. Server ordering preserved.
    async fn browse(
        &self,
        node: &NodeId,
        node_class_mask: u32,
    ) -> TransportResult<Vec<ReferenceDescription>>;

    /// Reads a node's Value attribute with both timestamps.
    async fn read_value(&self, node: &NodeId) -> TransportResult<ReadOutcome>;

    /// Reads a node's DataType attribute, returning the data-type node id.
    async fn read_data_type(&self, node: &NodeId) -> TransportResult<NodeId>;

    /// Reads a node's DisplayName attribute.
    async fn read_display_name(&self, node: &NodeId) -> TransportResult<String>;

    /// Writes a node's Value attribute.
    async fn write_value(&self, node: &NodeId, value: &UaValue) -> TransportResult<WriteOutcome>;

    /// Creates a server-side subscription with publishing enabled and the
    /// given publishing interval. Returns the subscription id.
    async fn create_subscription(&self, publishing_interval: Duration) -> TransportResult<u32>;

    /// Deletes a server-side subscription and all its items.
    async fn delete_subscription(&self, subscription_id: u32) -> TransportResult<()>;

    /// Creates one monitored item sampling `node`'s Value attribute.
    /// Returns the server item id.
    async fn create_monitored_item(
        &self,
        subscription_id: u32,
        node: &NodeId,
        settings: &MonitoredItemSettings,
    ) -> TransportResult<u32>;

    /// Removes monitored items from a subscription and applies the change.
    async fn delete_monitored_items(
        &self,
        subscription_id: u32,
        item_ids: &[u32],
    ) -> TransportResult<()>;

    /// Hands over the server-driven notification stream. Called once per
    /// session by the subscription engine's router task.
    async fn notification_stream(&self) -> TransportResult<mpsc::Receiver<RawNotification>>;
}
