//! In-memory collaborators for unit tests
//!
//! Every fake is a cheap handle over shared state, so a test can hand one
//! clone to the code under test and inspect the other afterwards.

use crate::application::DeviceApplication;
use crate::context::DeviceContext;
use crate::firmware::{FirmwareOutcome, FirmwareUpdater};
use crate::platform::{Platform, RebootReason};
use crate::store::{ConfigDocument, ConfigError, ConfigStore};
use crate::transport::{NetworkLink, PubSubTransport, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use iotdm_shared::{Endpoint, InboundMessage, SessionCredentials, UpgradeRequest};
use serde_json::{json, Map, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Operations seen by [`FakeTransport`], in call order
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOp {
    Open,
    Connect,
    Subscribe(String),
    Publish(String, Value),
    Disconnect,
}

#[derive(Default)]
struct TransportState {
    open_results: VecDeque<Result<(), TransportError>>,
    connect_results: VecDeque<Result<(), TransportError>>,
    refused_subscription: Option<String>,
    fail_publishes: bool,
    connected: bool,
    inbox: VecDeque<InboundMessage>,
    journal: Vec<TransportOp>,
}

#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport with a live session, for handler tests
    pub fn connected() -> Self {
        let transport = Self::new();
        transport.state.lock().unwrap().connected = true;
        transport
    }

    pub fn script_open(&self, results: impl IntoIterator<Item = Result<(), TransportError>>) {
        self.state.lock().unwrap().open_results.extend(results);
    }

    pub fn script_connect(&self, results: impl IntoIterator<Item = Result<(), TransportError>>) {
        self.state.lock().unwrap().connect_results.extend(results);
    }

    pub fn refuse_subscription(&self, channel: Option<&str>) {
        self.state.lock().unwrap().refused_subscription = channel.map(str::to_string);
    }

    pub fn fail_publishes(&self, fail: bool) {
        self.state.lock().unwrap().fail_publishes = fail;
    }

    pub fn push_inbound(&self, channel: &str, payload: impl Into<Bytes>) {
        self.state
            .lock()
            .unwrap()
            .inbox
            .push_back(InboundMessage::new(channel, payload));
    }

    /// Simulate the broker dropping the session
    pub fn drop_session(&self) {
        self.state.lock().unwrap().connected = false;
    }

    pub fn journal(&self) -> Vec<TransportOp> {
        self.state.lock().unwrap().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.state.lock().unwrap().journal.clear();
    }

    pub fn published(&self) -> Vec<(String, Value)> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::Publish(channel, payload) => Some((channel, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn published_to(&self, channel: &str) -> Vec<Value> {
        self.published()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, payload)| payload)
            .collect()
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter_map(|op| match op {
                TransportOp::Subscribe(channel) => Some(channel),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &TransportOp) -> usize {
        self.journal().iter().filter(|op| *op == wanted).count()
    }
}

#[async_trait]
impl PubSubTransport for FakeTransport {
    async fn open(&mut self, _endpoint: &Endpoint) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TransportOp::Open);
        state.open_results.pop_front().unwrap_or(Ok(()))
    }

    async fn connect(&mut self, _credentials: &SessionCredentials) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.journal.push(TransportOp::Connect);
        let result = state.connect_results.pop_front().unwrap_or(Ok(()));
        state.connected = result.is_ok();
        result
    }

    async fn subscribe(&mut self, channel: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        state.journal.push(TransportOp::Subscribe(channel.to_string()));
        if state.refused_subscription.as_deref() == Some(channel) {
            return Err(TransportError::SubscriptionRefused(channel.to_string()));
        }
        Ok(())
    }

    async fn publish(&mut self, channel: &str, payload: Bytes) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_publishes {
            return Err(TransportError::Io("publish failed".into()));
        }
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        let decoded = serde_json::from_slice(&payload)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&payload).into()));
        state
            .journal
            .push(TransportOp::Publish(channel.to_string(), decoded));
        Ok(())
    }

    async fn poll(&mut self) -> Result<Option<InboundMessage>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }
        Ok(state.inbox.pop_front())
    }

    fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn disconnect(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.journal.push(TransportOp::Disconnect);
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

#[derive(Default)]
struct NetworkState {
    available: bool,
    script: VecDeque<bool>,
    checks: usize,
    rejoins: usize,
}

#[derive(Clone, Default)]
pub struct FakeNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl FakeNetwork {
    pub fn up() -> Self {
        let network = Self::default();
        network.set_available(true);
        network
    }

    pub fn down() -> Self {
        Self::default()
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    /// Answers for the next availability checks, before the steady value
    pub fn script(&self, answers: impl IntoIterator<Item = bool>) {
        self.state.lock().unwrap().script.extend(answers);
    }

    pub fn checks(&self) -> usize {
        self.state.lock().unwrap().checks
    }

    pub fn rejoins(&self) -> usize {
        self.state.lock().unwrap().rejoins
    }
}

#[async_trait]
impl NetworkLink for FakeNetwork {
    async fn is_available(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.checks += 1;
        let steady = state.available;
        state.script.pop_front().unwrap_or(steady)
    }

    async fn rejoin(&self) {
        self.state.lock().unwrap().rejoins += 1;
    }
}

#[derive(Default)]
struct PlatformState {
    reset_asserted: bool,
    reset_checks: usize,
    reboots: Vec<RebootReason>,
}

#[derive(Clone, Default)]
pub struct FakePlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assert_reset(&self, asserted: bool) {
        self.state.lock().unwrap().reset_asserted = asserted;
    }

    pub fn reset_checks(&self) -> usize {
        self.state.lock().unwrap().reset_checks
    }

    pub fn reboots(&self) -> Vec<RebootReason> {
        self.state.lock().unwrap().reboots.clone()
    }
}

#[async_trait]
impl Platform for FakePlatform {
    async fn reset_requested(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.reset_checks += 1;
        state.reset_asserted
    }

    async fn reboot(&self, reason: RebootReason) -> anyhow::Result<()> {
        self.state.lock().unwrap().reboots.push(reason);
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    document: ConfigDocument,
    saves: usize,
    clears: usize,
    fail_saves: bool,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn with_document(document: ConfigDocument) -> Self {
        let store = Self::default();
        store.state.lock().unwrap().document = document;
        store
    }

    pub fn document(&self) -> ConfigDocument {
        self.state.lock().unwrap().document.clone()
    }

    pub fn saves(&self) -> usize {
        self.state.lock().unwrap().saves
    }

    pub fn clears(&self) -> usize {
        self.state.lock().unwrap().clears
    }

    pub fn fail_saves(&self, fail: bool) {
        self.state.lock().unwrap().fail_saves = fail;
    }
}

#[async_trait]
impl ConfigStore for MemoryStore {
    async fn load(&self) -> Result<ConfigDocument, ConfigError> {
        Ok(self.document())
    }

    async fn save(&self, document: &ConfigDocument) -> Result<(), ConfigError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_saves {
            return Err(ConfigError::Io {
                path: "memory".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        state.document = document.clone();
        state.saves += 1;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ConfigError> {
        let mut state = self.state.lock().unwrap();
        state.document = ConfigDocument::default();
        state.clears += 1;
        Ok(())
    }
}

struct FirmwareState {
    outcome: FirmwareOutcome,
    requests: Vec<UpgradeRequest>,
}

#[derive(Clone)]
pub struct FakeFirmware {
    state: Arc<Mutex<FirmwareState>>,
}

impl FakeFirmware {
    pub fn returning(outcome: FirmwareOutcome) -> Self {
        Self {
            state: Arc::new(Mutex::new(FirmwareState {
                outcome,
                requests: Vec::new(),
            })),
        }
    }

    pub fn requests(&self) -> Vec<UpgradeRequest> {
        self.state.lock().unwrap().requests.clone()
    }
}

#[async_trait]
impl FirmwareUpdater for FakeFirmware {
    async fn fetch_and_apply(&mut self, request: &UpgradeRequest) -> FirmwareOutcome {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request.clone());
        state.outcome.clone()
    }
}

#[derive(Default)]
struct ApplicationState {
    commands: Vec<Value>,
    status: Option<Value>,
}

/// Application that records device commands and reports a fixed status
#[derive(Clone, Default)]
pub struct RecordingApplication {
    state: Arc<Mutex<ApplicationState>>,
}

impl RecordingApplication {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(status: Value) -> Self {
        let application = Self::default();
        application.state.lock().unwrap().status = Some(status);
        application
    }

    pub fn commands(&self) -> Vec<Value> {
        self.state.lock().unwrap().commands.clone()
    }
}

impl DeviceApplication for RecordingApplication {
    fn handle_command(&mut self, command: &Map<String, Value>) {
        self.state
            .lock()
            .unwrap()
            .commands
            .push(Value::Object(command.clone()));
    }

    fn status(&self, uptime: Duration) -> Value {
        let status = self.state.lock().unwrap().status.clone();
        status.unwrap_or_else(|| json!({"d": {"uptime": uptime.as_secs()}}))
    }
}

pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// A provisioned configuration for `org`
pub fn sample_config(org: &str) -> ConfigDocument {
    ConfigDocument::new(object(json!({
        "org": org,
        "devType": "Valve",
        "devId": "valve-01",
        "token": "s3cret-token",
        "meta": {"pubInterval": "0", "location": "pump house"},
        "config": "done",
        "ssid": "plant-floor",
        "w_pw": "wifi-pass"
    })))
}

pub fn sample_device(org: &str) -> DeviceContext {
    DeviceContext::from_config(sample_config(org)).unwrap()
}
