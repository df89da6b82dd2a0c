// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Engine integration tests against an in-memory mock transport.
//!
//! The mock models a small plant address space:
//!
//! ```text
//! Objects
//! ├── Plant            (Object)
//! │   ├── Line1        (Object)
//! │   │   └── Speed    (Variable, Int32)
//! │   └── Temp         (Variable, Double)
//! └── Demo             (Object, empty)
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use tokio::sync::{mpsc, RwLock};

use uascope_opcua::certificate::ClientIdentity;
use uascope_opcua::transport::{
    MonitoredItemSettings, RawNotification, ReadOutcome, ReferenceDescription, TransportError,
    TransportResult, UaTransport, WriteOutcome, STATUS_GOOD,
};
use uascope_opcua::{
    ClientConfig, ClientError, ConnectError, EndpointDescriptor, NodeClass, NodeId,
    SecurityMode, SecurityPolicy, SubscriptionError, UaClient, UaValue,
};

const BAD_NODE_UNKNOWN: u32 = 0x8033_0000;

// ============================================================================
// Mock transport
// ============================================================================

#[derive(Default)]
struct MockState {
    endpoints: Vec<EndpointDescriptor>,
    address_space: HashMap<NodeId, Vec<ReferenceDescription>>,
    data_types: HashMap<NodeId, NodeId>,
    display_names: HashMap<NodeId, String>,
    values: RwLock<HashMap<NodeId, (UaValue, DateTime<Utc>)>>,

    connected: AtomicBool,
    session_counter: AtomicU32,
    subscription_counter: AtomicU32,
    item_counter: AtomicU32,

    browse_calls: AtomicU32,
    subscription_creates: AtomicU32,
    subscriptions_deleted: AtomicU32,
    items_deleted: AtomicU32,
    fail_browse: AtomicBool,

    notifier: StdMutex<Option<mpsc::Sender<RawNotification>>>,
}

impl MockState {
    fn last_item_id(&self) -> u32 {
        self.item_counter.load(Ordering::SeqCst)
    }

    /// Pushes a notification through the transport's stream, as a server
    /// publish would.
    async fn notify(&self, item_id: u32, node: NodeId, value: UaValue) {
        let tx = self
            .notifier
            .lock()
            .unwrap()
            .clone()
            .expect("notification stream not taken");
        tx.send(RawNotification {
            subscription_id: 1,
            item_id,
            node_id: node,
            value,
            source_timestamp: Some(Utc::now()),
            server_timestamp: Some(Utc::now()),
        })
        .await
        .unwrap();
    }
}

#[derive(Clone)]
struct MockTransport {
    state: Arc<MockState>,
}

#[async_trait]
impl UaTransport for MockTransport {
    async fn discover_endpoints(&self, _url: &str) -> TransportResult<Vec<EndpointDescriptor>> {
        Ok(self.state.endpoints.clone())
    }

    async fn create_session(
        &mut self,
        _endpoint: &EndpointDescriptor,
        _config: &ClientConfig,
        _identity: Option<&ClientIdentity>,
    ) -> TransportResult<String> {
        let n = self.state.session_counter.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.connected.store(true, Ordering::SeqCst);
        Ok(format!("mock-session-{n}"))
    }

    async fn close_session(&mut self) -> TransportResult<()> {
        self.state.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn browse(
        &self,
        node: &NodeId,
        _node_class_mask: u32,
    ) -> TransportResult<Vec<ReferenceDescription>> {
        self.state.browse_calls.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_browse.load(Ordering::SeqCst) {
            return Err(TransportError::new("simulated browse failure"));
        }
        if !self.state.connected.load(Ordering::SeqCst) {
            return Err(TransportError::new("no session"));
        }
        Ok(self.state.address_space.get(node).cloned().unwrap_or_default())
    }

    async fn read_value(&self, node: &NodeId) -> TransportResult<ReadOutcome> {
        let values = self.state.values.read().await;
        match values.get(node) {
            Some((value, stamp)) => Ok(ReadOutcome {
                value: value.clone(),
                status: STATUS_GOOD,
                source_timestamp: Some(*stamp),
                server_timestamp: Some(Utc::now()),
            }),
            None => Ok(ReadOutcome {
                value: UaValue::Null,
                status: BAD_NODE_UNKNOWN,
                source_timestamp: None,
                server_timestamp: None,
            }),
        }
    }

    async fn read_data_type(&self, node: &NodeId) -> TransportResult<NodeId> {
        self.state
            .data_types
            .get(node)
            .cloned()
            .ok_or_else(|| TransportError::new("no data type"))
    }

    async fn read_display_name(&self, node: &NodeId) -> TransportResult<String> {
        self.state
            .display_names
            .get(node)
            .cloned()
            .ok_or_else(|| TransportError::new("no display name"))
    }

    async fn write_value(&self, node: &NodeId, value: &UaValue) -> TransportResult<WriteOutcome> {
        let mut values = self.state.values.write().await;
        if !values.contains_key(node) {
            return Ok(WriteOutcome { status: BAD_NODE_UNKNOWN });
        }
        // A string payload aimed at a typed node is the mock's stand-in for
        // a server-side type rejection.
        let declared = values.get(node).map(|(v, _)| v.data_type());
        if let Some(Some(declared)) = declared {
            if value.data_type() != Some(declared) {
                return Ok(WriteOutcome { status: 0x8074_0000 }); // type mismatch
            }
        }
        values.insert(node.clone(), (value.clone(), Utc::now()));
        Ok(WriteOutcome { status: STATUS_GOOD })
    }

    async fn create_subscription(&self, _publishing_interval: Duration) -> TransportResult<u32> {
        self.state.subscription_creates.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.subscription_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn delete_subscription(&self, _subscription_id: u32) -> TransportResult<()> {
        self.state.subscriptions_deleted.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_monitored_item(
        &self,
        _subscription_id: u32,
        _node: &NodeId,
        _settings: &MonitoredItemSettings,
    ) -> TransportResult<u32> {
        Ok(self.state.item_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn delete_monitored_items(
        &self,
        _subscription_id: u32,
        item_ids: &[u32],
    ) -> TransportResult<()> {
        self.state.items_deleted.fetch_add(item_ids.len() as u32, Ordering::SeqCst);
        Ok(())
    }

    async fn notification_stream(&self) -> TransportResult<mpsc::Receiver<RawNotification>> {
        let (tx, rx) = mpsc::channel(32);
        *self.state.notifier.lock().unwrap() = Some(tx);
        Ok(rx)
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn node(id: &str) -> NodeId {
    id.parse().unwrap()
}

fn object_ref(id: &str, name: &str) -> ReferenceDescription {
    ReferenceDescription {
        node_id: node(id),
        browse_name: name.to_string(),
        display_name: name.to_string(),
        node_class: NodeClass::Object,
    }
}

fn variable_ref(id: &str, name: &str) -> ReferenceDescription {
    ReferenceDescription {
        node_id: node(id),
        browse_name: name.to_string(),
        display_name: name.to_string(),
        node_class: NodeClass::Variable,
    }
}

fn plant_state() -> Arc<MockState> {
    let mut state = MockState {
        endpoints: vec![
            EndpointDescriptor {
                url: "opc.tcp://plant:4840".to_string(),
                policy: SecurityPolicy::None,
                mode: SecurityMode::None,
                security_level: 0,
            },
            EndpointDescriptor {
                url: "opc.tcp://plant:4840".to_string(),
                policy: SecurityPolicy::Basic256Sha256,
                mode: SecurityMode::SignAndEncrypt,
                security_level: 3,
            },
        ],
        ..MockState::default()
    };

    state.address_space.insert(
        NodeId::objects_folder(),
        vec![object_ref("ns=2;s=Plant", "Plant"), object_ref("ns=2;s=Demo", "Demo")],
    );
    state.address_space.insert(
        node("ns=2;s=Plant"),
        vec![
            object_ref("ns=2;s=Plant.Line1", "Line1"),
            variable_ref("ns=2;s=Plant.Temp", "Temp"),
        ],
    );
    state.address_space.insert(
        node("ns=2;s=Plant.Line1"),
        vec![variable_ref("ns=2;s=Plant.Line1.Speed", "Speed")],
    );

    state.data_types.insert(node("ns=2;s=Plant.Line1.Speed"), NodeId::numeric(0, 6));
    state.data_types.insert(node("ns=2;s=Plant.Temp"), NodeId::numeric(0, 11));
    state.display_names.insert(NodeId::numeric(0, 6), "Int32".to_string());
    state.display_names.insert(NodeId::numeric(0, 11), "Double".to_string());

    let mut values = HashMap::new();
    values.insert(node("ns=2;s=Plant.Line1.Speed"), (UaValue::Int32(0), Utc::now()));
    values.insert(node("ns=2;s=Plant.Temp"), (UaValue::Double(20.5), Utc::now()));
    state.values = RwLock::new(values);

    Arc::new(state)
}

fn client_with(state: &Arc<MockState>, config: ClientConfig) -> UaClient<MockTransport> {
    UaClient::new(MockTransport { state: Arc::clone(state) }, config).unwrap()
}

fn client(state: &Arc<MockState>) -> UaClient<MockTransport> {
    client_with(state, ClientConfig::default())
}

async fn connect_plain(client: &UaClient<MockTransport>) {
    client
        .connect("opc.tcp://plant:4840", SecurityPolicy::None, SecurityMode::None)
        .await
        .unwrap();
}

// ============================================================================
// Connect / disconnect
// ============================================================================

#[tokio::test]
async fn connect_and_disconnect_transitions() {
    let state = plant_state();
    let client = client(&state);

    assert!(!client.is_connected().await);
    connect_plain(&client).await;
    assert!(client.is_connected().await);

    client.disconnect().await.unwrap();
    assert!(!client.is_connected().await);

    // Idempotent: a second disconnect is a no-op.
    client.disconnect().await.unwrap();
    assert_eq!(client.session_stats().disconnects, 1);
}

#[tokio::test]
async fn connect_refuses_near_security_match() {
    let state = plant_state();
    let client = client(&state);

    // Advertised: None/None and Basic256Sha256/SignAndEncrypt. Same policy
    // with Sign only must not connect.
    let err = client
        .connect("opc.tcp://plant:4840", SecurityPolicy::Basic256Sha256, SecurityMode::Sign)
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Endpoint(_)));
    assert!(!client.is_connected().await);
    assert_eq!(client.session_stats().failures, 1);
}

#[tokio::test]
async fn plain_policy_never_touches_certificate_store() {
    let dir = tempfile::tempdir().unwrap();
    let cert_dir = dir.path().join("pki");
    let config = ClientConfig::builder().certificate_dir(&cert_dir).build().unwrap();

    let state = plant_state();
    let client = client_with(&state, config);
    connect_plain(&client).await;

    assert!(client.is_connected().await);
    assert!(!cert_dir.exists());
}

#[tokio::test]
async fn secured_policy_provisions_exactly_one_certificate() {
    let dir = tempfile::tempdir().unwrap();
    let cert_dir = dir.path().join("pki");
    let config = ClientConfig::builder().certificate_dir(&cert_dir).build().unwrap();

    let state = plant_state();
    let client = client_with(&state, config);

    client
        .connect(
            "opc.tcp://plant:4840",
            SecurityPolicy::Basic256Sha256,
            SecurityMode::SignAndEncrypt,
        )
        .await
        .unwrap();
    let first = std::fs::read(cert_dir.join("cert.der")).unwrap();

    // Reconnect must reuse the stored identity, not mint a duplicate.
    client
        .connect(
            "opc.tcp://plant:4840",
            SecurityPolicy::Basic256Sha256,
            SecurityMode::SignAndEncrypt,
        )
        .await
        .unwrap();
    let second = std::fs::read(cert_dir.join("cert.der")).unwrap();

    assert_eq!(first, second);
}

// ============================================================================
// Browse
// ============================================================================

#[tokio::test]
async fn browse_on_unconnected_client_is_empty_not_error() {
    let state = plant_state();
    let client = client(&state);

    let children = client.browse(&NodeId::objects_folder()).await.unwrap();
    assert!(children.is_empty());
    assert_eq!(state.browse_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn browse_preserves_server_order_and_resolves_variable_types() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let children = client.browse(&node("ns=2;s=Plant")).await.unwrap();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].display_name, "Line1");
    assert_eq!(children[0].node_class, NodeClass::Object);
    assert_eq!(children[0].data_type, None);
    assert_eq!(children[1].display_name, "Temp");
    assert_eq!(children[1].node_class, NodeClass::Variable);
    assert_eq!(children[1].data_type.as_deref(), Some("Double"));
}

#[tokio::test]
async fn browse_server_failure_is_explicit_and_ignorable() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;
    state.fail_browse.store(true, Ordering::SeqCst);

    let result = client.browse(&NodeId::objects_folder()).await;
    assert!(matches!(result, Err(ClientError::Browse(_))));
}

// ============================================================================
// Read / write
// ============================================================================

#[tokio::test]
async fn write_then_read_round_trips_with_fresh_timestamp() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let speed = node("ns=2;s=Plant.Line1.Speed");
    let before = Utc::now();

    client.write(&speed, "42").await.unwrap();
    let outcome = client.read(&speed).await.unwrap();

    assert_eq!(outcome.value, UaValue::Int32(42));
    assert!(outcome.source_timestamp.unwrap() >= before);
}

#[tokio::test]
async fn write_of_unparsable_text_passes_raw_and_is_rejected_by_server() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    // The codec does not pre-validate; the raw string reaches the server
    // and the server's status rejects it.
    let speed = node("ns=2;s=Plant.Line1.Speed");
    let err = client.write(&speed, "not-a-number").await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Operation(uascope_opcua::OperationError::WriteRejected { .. })
    ));

    let outcome = client.read(&speed).await.unwrap();
    assert_eq!(outcome.value, UaValue::Int32(0));
}

#[tokio::test]
async fn read_of_unknown_node_fails_with_status() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let err = client.read(&node("ns=9;s=Ghost")).await.unwrap_err();
    assert!(matches!(err, ClientError::Operation(_)));
}

#[tokio::test]
async fn stats_counters_track_issued_operations() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let speed = node("ns=2;s=Plant.Line1.Speed");
    client.browse(&node("ns=2;s=Plant")).await.unwrap();
    client.write(&speed, "5").await.unwrap();
    client.read(&speed).await.unwrap();
    client.read(&speed).await.unwrap();
    let _rx = client.subscribe(&speed, 100).await.unwrap();

    let stats = client.stats();
    assert_eq!(stats.browses, 1);
    assert_eq!(stats.writes, 1);
    assert_eq!(stats.reads, 2);
    assert_eq!(stats.subscribes, 1);
}

#[tokio::test]
async fn operations_require_connection() {
    let state = plant_state();
    let client = client(&state);

    let err = client.read(&node("ns=2;s=Plant.Temp")).await.unwrap_err();
    assert!(matches!(err, ClientError::Connect(ConnectError::NotConnected)));
    let err = client.write(&node("ns=2;s=Plant.Temp"), "1").await.unwrap_err();
    assert!(matches!(err, ClientError::Connect(ConnectError::NotConnected)));
}

// ============================================================================
// Subscriptions
// ============================================================================

#[tokio::test]
async fn interval_below_minimum_never_reaches_engine() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let err = client.subscribe(&node("ns=2;s=Plant.Temp"), 50).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Subscription(SubscriptionError::IntervalTooShort { requested_ms: 50, .. })
    ));
    assert_eq!(state.subscription_creates.load(Ordering::SeqCst), 0);
    assert!(!client.has_subscription().await);
}

#[tokio::test]
async fn single_subscription_is_reused_across_subscribes() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let _speed_rx = client.subscribe(&node("ns=2;s=Plant.Line1.Speed"), 100).await.unwrap();
    let _temp_rx = client.subscribe(&node("ns=2;s=Plant.Temp"), 250).await.unwrap();

    assert_eq!(state.subscription_creates.load(Ordering::SeqCst), 1);
    assert_eq!(client.monitored_count().await, 2);
}

#[tokio::test]
async fn notifications_flow_to_the_item_channel() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let speed = node("ns=2;s=Plant.Line1.Speed");
    let mut rx = client.subscribe(&speed, 100).await.unwrap();
    let item_id = state.last_item_id();

    state.notify(item_id, speed.clone(), UaValue::Int32(7)).await;

    let change = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.node_id, speed);
    assert_eq!(change.value, UaValue::Int32(7));
    assert!(change.source_timestamp.is_some());
}

#[tokio::test]
async fn unsubscribe_all_retains_subscription_for_reuse() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let speed = node("ns=2;s=Plant.Line1.Speed");
    let _rx = client.subscribe(&speed, 100).await.unwrap();

    client.unsubscribe_all().await.unwrap();
    assert_eq!(client.monitored_count().await, 0);
    assert!(client.has_subscription().await);
    assert_eq!(state.items_deleted.load(Ordering::SeqCst), 1);

    // Re-subscribing the same node works without reconnecting, on the
    // same server-side subscription.
    let mut rx = client.subscribe(&speed, 100).await.unwrap();
    assert_eq!(state.subscription_creates.load(Ordering::SeqCst), 1);

    state.notify(state.last_item_id(), speed.clone(), UaValue::Int32(9)).await;
    let change = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(change.value, UaValue::Int32(9));
}

#[tokio::test]
async fn unsubscribe_without_subscription_is_a_noop() {
    let state = plant_state();
    let client = client(&state);

    client.unsubscribe_all().await.unwrap();
    connect_plain(&client).await;
    client.unsubscribe_all().await.unwrap();
}

#[tokio::test]
async fn reconnect_deletes_live_subscription_server_side() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let _rx = client.subscribe(&node("ns=2;s=Plant.Temp"), 100).await.unwrap();
    assert_eq!(state.subscriptions_deleted.load(Ordering::SeqCst), 0);

    // Reconnecting over a live session tears the subscription down on the
    // server before the old session closes.
    connect_plain(&client).await;

    assert_eq!(state.subscriptions_deleted.load(Ordering::SeqCst), 1);
    assert!(!client.has_subscription().await);
    assert_eq!(client.monitored_count().await, 0);
    assert_eq!(client.session_stats().connects, 2);
}

#[tokio::test]
async fn disconnect_invalidates_subscription_state() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let _rx = client.subscribe(&node("ns=2;s=Plant.Temp"), 100).await.unwrap();
    client.disconnect().await.unwrap();

    assert!(!client.has_subscription().await);
    assert_eq!(client.monitored_count().await, 0);
}

// ============================================================================
// Navigator
// ============================================================================

#[tokio::test]
async fn resolving_root_identity_issues_no_browse() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let found = client.resolve_and_expand(&NodeId::objects_folder()).await.unwrap();
    assert_eq!(found.node_id, NodeId::objects_folder());
    assert_eq!(state.browse_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn deep_identity_expands_exactly_the_ancestor_chain() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let target = node("ns=2;s=Plant.Line1.Speed");
    let found = client.resolve_and_expand(&target).await.unwrap();

    assert_eq!(found.node_id, target);
    assert_eq!(found.node_class, NodeClass::Variable);
    // Objects, Plant, Line1 browsed; the Demo sibling is never expanded.
    assert_eq!(state.browse_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn unknown_identity_resolves_to_none() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    assert!(client.resolve_and_expand(&node("ns=9;s=Nowhere")).await.is_none());
}

#[tokio::test]
async fn resolve_while_disconnected_is_none() {
    let state = plant_state();
    let client = client(&state);

    assert!(client.resolve_and_expand(&node("ns=2;s=Plant")).await.is_none());
    assert_eq!(state.browse_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expansion_is_idempotent_through_the_facade() {
    let state = plant_state();
    let client = client(&state);
    connect_plain(&client).await;

    let root = client.tree_root().await;
    let first = client.expand_node(root).await.unwrap();
    let calls_after_first = state.browse_calls.load(Ordering::SeqCst);

    let second = client.expand_node(root).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(state.browse_calls.load(Ordering::SeqCst), calls_after_first);
}
