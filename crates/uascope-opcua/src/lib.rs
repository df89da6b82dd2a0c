// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC UA client engine for browsing, observing, and writing an
//! industrial server's address space.
//!
//! The engine orchestrates a session/channel abstraction — it never
//! touches wire framing. What it owns:
//!
//! - **Session lifecycle** — `Disconnected → Connecting → Connected`,
//!   security negotiation with exact endpoint matching, certificate
//!   provisioning for secured policies, idempotent disconnect
//! - **Lazy browsing** — one level per call, Objects and Variables only,
//!   held in an arena tree with explicit idempotent expansion
//! - **Value coding** — text to typed values per a node's declared data
//!   type, with a documented permissive fallback
//! - **Subscriptions** — one server-side subscription, many monitored
//!   items, channel-based notification delivery
//!
//! ```text
//!                    ┌───────────────────────────┐
//!                    │         UaClient          │
//!                    │  (serializes transport)   │
//!                    └──┬──────┬──────┬──────┬───┘
//!                       │      │      │      │
//!              ┌────────▼──┐ ┌─▼────┐ ┌▼─────▼──────┐
//!              │ Session   │ │ Tree │ │ Subscription│
//!              │ Manager   │ │ +Nav │ │ Engine      │
//!              └────────┬──┘ └─┬────┘ └┬────────────┘
//!                       │      │       │
//!                    ┌──▼──────▼───────▼──┐
//!                    │    UaTransport      │
//!                    │ (session/channel    │
//!                    │  abstraction)       │
//!                    └─────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use uascope_opcua::{ClientConfig, SecurityMode, SecurityPolicy, UaClient};
//! # use uascope_opcua::transport::UaTransport;
//! # async fn run<T: UaTransport>(transport: T) -> Result<(), Box<dyn std::error::Error>> {
//! let client = UaClient::new(transport, ClientConfig::default())?;
//! client
//!     .connect("opc.tcp://plant:4840", SecurityPolicy::None, SecurityMode::None)
//!     .await?;
//!
//! let children = client.browse(&uascope_opcua::NodeId::objects_folder()).await?;
//! for child in &children {
//!     println!("{} ({})", child.display_name, child.node_class);
//! }
//!
//! client.disconnect().await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod browse;
pub mod certificate;
pub mod client;
pub mod codec;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod settings;
pub mod subscription;
pub mod transport;
pub mod tree;
pub mod types;

pub use browse::NodeDescriptor;
pub use certificate::{ClientIdentity, ensure_identity};
pub use client::{ClientStatsSnapshot, UaClient};
pub use codec::{encode, UaValue};
pub use endpoint::{select_endpoint, EndpointDescriptor};
pub use error::{
    BrowseError, ClientError, ClientResult, ConfigError, ConnectError, EndpointError,
    OperationError, SettingsError, SubscriptionError,
};
pub use session::{ConnectionState, SessionHandle, SessionManager};
pub use settings::{AppSettings, ConnectionSettings, LastViewedNode, NodePath, SettingsStore};
pub use subscription::{DataChange, SubscriptionEngine, MIN_SAMPLING_INTERVAL_MS};
pub use transport::{ReadOutcome, UaTransport, WriteOutcome};
pub use tree::{NodeKey, NodeTree};
pub use types::{
    ClientConfig, ClientConfigBuilder, NodeClass, NodeId, NodeIdentifier, SecurityMode,
    SecurityPolicy, UaDataType,
};
