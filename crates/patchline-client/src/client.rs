//! Client surface: lifecycle, ports, send and receive.
//!
//! A client owns one send queue and one receive queue shared by all of its
//! ports, plus the registry of ports it services. `activate` installs the
//! period callback with the driver; the callback reaches the client through a
//! `Weak` so a dropped client can never be revived by its own callback.

use crate::diag::{diag_channel, DiagReceiver, Diagnostic};
use crate::driver::{CallbackId, MidiDriver, PeriodPorts};
use crate::error::{Error, Result};
use crate::port::{PortDirection, PortInfo, PortRegistry, MAX_PORTS_PER_CLIENT};
use crate::queue::receive::{receive_channel, ReceiveQueue};
use crate::queue::send::SendQueue;
use crate::sched::PeriodScheduler;
use parking_lot::Mutex;
use patchline_midi::{Message, Payload, PortId, TimeBase, MAX_PAYLOAD_LEN};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

const DEFAULT_SEND_CAPACITY: usize = 64;
const DEFAULT_RECEIVE_CAPACITY: usize = 1024;
const DEFAULT_DIAG_CAPACITY: usize = 64;

/// A message handed back by [`Port::receive`].
#[derive(Clone, Debug, PartialEq)]
pub struct ReceivedMessage {
    pub bytes: Vec<u8>,
    /// Seconds from the start of the period the event was captured in.
    pub time: f64,
}

pub struct ClientBuilder {
    name: String,
    max_payload_len: usize,
    send_capacity: usize,
    receive_capacity: usize,
    diag_capacity: usize,
}

impl ClientBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_payload_len: MAX_PAYLOAD_LEN,
            send_capacity: DEFAULT_SEND_CAPACITY,
            receive_capacity: DEFAULT_RECEIVE_CAPACITY,
            diag_capacity: DEFAULT_DIAG_CAPACITY,
        }
    }

    /// Cap on outbound payload length, clamped to the storage bound.
    pub fn max_payload_len(mut self, max: usize) -> Self {
        self.max_payload_len = max.min(MAX_PAYLOAD_LEN);
        self
    }

    /// Initial capacity of the pending-send queue.
    pub fn send_capacity(mut self, capacity: usize) -> Self {
        self.send_capacity = capacity;
        self
    }

    /// Capacity of the capture ring. Events past it are dropped with a
    /// diagnostic.
    pub fn receive_capacity(mut self, capacity: usize) -> Self {
        self.receive_capacity = capacity;
        self
    }

    /// Capacity of the diagnostic channel.
    pub fn diag_capacity(mut self, capacity: usize) -> Self {
        self.diag_capacity = capacity;
        self
    }

    pub fn build(self, driver: Arc<dyn MidiDriver>) -> Client {
        let registry = PortRegistry::new();
        let send = Arc::new(SendQueue::with_capacity(self.send_capacity));
        let (producer, receive) = receive_channel(self.receive_capacity);
        let (diag_tx, diag_rx) = diag_channel(self.diag_capacity);
        let scheduler = PeriodScheduler::new(
            registry.serviced_handle(),
            Arc::clone(&send),
            producer,
            diag_tx,
        );
        let inner = Arc::new(ClientInner {
            name: self.name,
            driver,
            registry,
            send,
            receive: Mutex::new(receive),
            scheduler: Mutex::new(scheduler),
            diag_rx,
            max_payload_len: self.max_payload_len,
            active: Mutex::new(None),
            closed: AtomicBool::new(false),
        });
        debug!(name = %inner.name, "created client");
        Client { inner }
    }
}

/// One scheduling client: a set of owned ports, a shared send queue, and a
/// capture queue, serviced once per period while active.
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    name: String,
    driver: Arc<dyn MidiDriver>,
    registry: PortRegistry,
    send: Arc<SendQueue>,
    receive: Mutex<ReceiveQueue>,
    /// Claimed by the period callback with a `try_lock`; the application side
    /// never holds it.
    scheduler: Mutex<PeriodScheduler>,
    diag_rx: DiagReceiver,
    max_payload_len: usize,
    active: Mutex<Option<CallbackId>>,
    closed: AtomicBool,
}

impl Client {
    /// Builder with the default capacities.
    pub fn builder(name: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(name)
    }

    /// A client with default configuration.
    pub fn new(name: impl Into<String>, driver: Arc<dyn MidiDriver>) -> Client {
        ClientBuilder::new(name).build(driver)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Register a port owned (and serviced) by this client. Its driver-wide
    /// name is `client:port`.
    pub fn register_port(&self, name: &str, direction: PortDirection) -> Result<Port> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        if self.inner.registry.owned_count() >= MAX_PORTS_PER_CLIENT {
            return Err(Error::TooManyPorts {
                max: MAX_PORTS_PER_CLIENT,
            });
        }
        let full_name = format!("{}:{}", self.inner.name, name);
        let id = self.inner.driver.register_port(&full_name, direction)?;
        let info = PortInfo {
            id,
            name: full_name,
            direction,
            owned: true,
        };
        self.inner.registry.register(info.clone())?;
        debug!(name = %info.name, ?direction, "registered port");
        Ok(Port {
            client: Arc::clone(&self.inner),
            info,
        })
    }

    /// Look up an existing port anywhere on the driver. Unless this client
    /// registered it, the result is a connection endpoint only and is never
    /// serviced.
    pub fn find_port(&self, name: &str) -> Result<Port> {
        let found = self
            .inner
            .driver
            .find_port(name)
            .ok_or_else(|| Error::UnknownPort(name.to_string()))?;
        let owned = self.inner.registry.is_owned(found.id);
        Ok(Port {
            client: Arc::clone(&self.inner),
            info: PortInfo {
                id: found.id,
                name: found.name,
                direction: found.direction,
                owned,
            },
        })
    }

    /// Ports this client has registered, in registration order.
    pub fn owned_ports(&self) -> Vec<PortInfo> {
        self.inner.registry.owned_ports()
    }

    /// List driver ports, optionally filtered by a name substring.
    pub fn ports(&self, name_filter: Option<&str>) -> Vec<PortInfo> {
        self.inner
            .driver
            .ports(name_filter)
            .into_iter()
            .map(|p| PortInfo {
                owned: self.inner.registry.is_owned(p.id),
                id: p.id,
                name: p.name,
                direction: p.direction,
            })
            .collect()
    }

    /// Connect an output port to an input port. Activates first, as sending
    /// does.
    pub fn connect(&self, source: &Port, destination: &Port) -> Result<bool> {
        self.activate()?;
        self.inner.driver.connect(source.id(), destination.id())
    }

    pub fn disconnect(&self, source: &Port, destination: &Port) -> Result<bool> {
        self.inner.driver.disconnect(source.id(), destination.id())
    }

    /// Install the period callback. Idempotent.
    pub fn activate(&self) -> Result<()> {
        ClientInner::activate(&self.inner)
    }

    /// Remove the period callback. On return it is guaranteed not to run
    /// again. Idempotent.
    pub fn deactivate(&self) -> Result<()> {
        self.inner.deactivate()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Pending outbound messages across all ports.
    pub fn pending_sends(&self) -> usize {
        self.inner.send.len()
    }

    /// Captured messages waiting for retrieval across all ports.
    pub fn pending_receives(&self) -> usize {
        self.inner.receive.lock().pending()
    }

    /// Drain faults recorded by the period callback since the last call.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.inner.diag_rx.drain()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.inner.name)
            .field("ports", &self.inner.registry.owned_count())
            .field("active", &self.is_active())
            .finish()
    }
}

impl Drop for Client {
    /// Stops period processing before the queues are drained, so the callback
    /// can never observe a partially-destroyed client.
    fn drop(&mut self) {
        self.inner.closed.store(true, Ordering::Release);
        let _ = self.inner.deactivate();
        self.inner.send.clear();
        self.inner.receive.lock().clear();
    }
}

impl ClientInner {
    fn activate(inner: &Arc<ClientInner>) -> Result<()> {
        if inner.closed.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        let mut active = inner.active.lock();
        if active.is_some() {
            return Ok(());
        }
        let weak = Arc::downgrade(inner);
        let id = inner.driver.activate(Box::new(move |ports, nframes| {
            ClientInner::process(&weak, ports, nframes);
        }))?;
        *active = Some(id);
        debug!(name = %inner.name, "activated");
        Ok(())
    }

    fn deactivate(&self) -> Result<()> {
        let mut active = self.active.lock();
        if let Some(id) = active.take() {
            self.driver.deactivate(id)?;
            debug!(name = %self.name, "deactivated");
        }
        Ok(())
    }

    /// Period callback trampoline. A dead client, or a scheduler claimed by a
    /// concurrent teardown, turns the period into a no-op.
    fn process(weak: &Weak<ClientInner>, ports: &mut dyn PeriodPorts, nframes: u32) {
        let Some(inner) = weak.upgrade() else { return };
        let maybe_scheduler = inner.scheduler.try_lock();
        if let Some(mut scheduler) = maybe_scheduler {
            scheduler.run_period(ports, nframes);
        }
    }

    fn queue_send(&self, port: &PortInfo, bytes: &[u8], seconds: f64) -> Result<()> {
        if !port.owned {
            return Err(Error::Unserviced(port.name.clone()));
        }
        if port.direction != PortDirection::Output {
            return Err(Error::NotOutput(port.name.clone()));
        }
        let payload = Payload::bounded(bytes, self.max_payload_len)?;
        let time = TimeBase::new(self.driver.sample_rate()).frames(seconds);
        self.send.push(Message::new(port.id, time, payload));
        Ok(())
    }

    fn take_received(&self, port: PortId) -> Option<ReceivedMessage> {
        let message = self.receive.lock().take_for_port(port)?;
        let time_base = TimeBase::new(self.driver.sample_rate());
        Some(ReceivedMessage {
            bytes: message.payload.to_vec(),
            time: time_base.seconds(message.time),
        })
    }
}

/// Handle to one port, tied to the client that registered or discovered it.
#[derive(Clone)]
pub struct Port {
    client: Arc<ClientInner>,
    info: PortInfo,
}

impl Port {
    #[inline]
    pub fn id(&self) -> PortId {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    #[inline]
    pub fn direction(&self) -> PortDirection {
        self.info.direction
    }

    /// Whether this client services the port each period.
    #[inline]
    pub fn is_owned(&self) -> bool {
        self.info.owned
    }

    pub fn info(&self) -> &PortInfo {
        &self.info
    }

    /// Queue `bytes` for delivery `seconds` from now. Activates the client on
    /// first use.
    pub fn send(&self, bytes: &[u8], seconds: f64) -> Result<()> {
        ClientInner::activate(&self.client)?;
        self.client.queue_send(&self.info, bytes, seconds)
    }

    /// The oldest captured message for this port, if any. Never blocks and
    /// never errors; `None` is the expected empty-poll result.
    pub fn receive(&self) -> Option<ReceivedMessage> {
        self.client.take_received(self.info.id)
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("name", &self.info.name)
            .field("direction", &self.info.direction)
            .field("owned", &self.info.owned)
            .finish()
    }
}

#[cfg(all(test, feature = "loopback"))]
mod tests {
    use super::*;
    use crate::driver::loopback::LoopbackDriver;

    const RATE: u32 = 48_000;

    fn client() -> (Arc<LoopbackDriver>, Client) {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        let client = Client::new("test", driver.clone());
        (driver, client)
    }

    #[test]
    fn test_register_port_prefixes_client_name() {
        let (_driver, client) = client();
        let port = client
            .register_port("out", PortDirection::Output)
            .unwrap();
        assert_eq!(port.name(), "test:out");
        assert!(port.is_owned());
        assert_eq!(port.direction(), PortDirection::Output);
    }

    #[test]
    fn test_send_requires_an_owned_output_port() {
        let (_driver, client) = client();
        let input = client.register_port("in", PortDirection::Input).unwrap();
        assert!(matches!(
            input.send(&[0xF8], 0.0),
            Err(Error::NotOutput(_))
        ));
    }

    #[test]
    fn test_send_on_discovered_port_is_rejected() {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        let theirs = Client::new("theirs", driver.clone());
        let _their_port = theirs.register_port("out", PortDirection::Output).unwrap();

        let mine = Client::new("mine", driver.clone());
        let discovered = mine.find_port("theirs:out").unwrap();
        assert!(!discovered.is_owned());
        assert!(matches!(
            discovered.send(&[0xF8], 0.0),
            Err(Error::Unserviced(_))
        ));
    }

    #[test]
    fn test_oversized_payload_rejected_at_send() {
        let (_driver, client) = client();
        let out = client.register_port("out", PortDirection::Output).unwrap();
        let oversized = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(matches!(
            out.send(&oversized, 0.0),
            Err(Error::Message(patchline_midi::Error::PayloadTooLarge { .. }))
        ));
    }

    #[test]
    fn test_builder_payload_cap_is_enforced() {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        let client = Client::builder("capped")
            .max_payload_len(3)
            .build(driver.clone());
        let out = client.register_port("out", PortDirection::Output).unwrap();
        assert!(out.send(&[1, 2, 3], 0.0).is_ok());
        assert!(out.send(&[1, 2, 3, 4], 0.0).is_err());
    }

    #[test]
    fn test_send_activates_and_queues() {
        let (_driver, client) = client();
        let out = client.register_port("out", PortDirection::Output).unwrap();
        assert!(!client.is_active());
        out.send(&[0x90, 60, 100], 0.5).unwrap();
        assert!(client.is_active());
        assert_eq!(client.pending_sends(), 1);
    }

    #[test]
    fn test_receive_on_empty_queue_is_none() {
        let (_driver, client) = client();
        let input = client.register_port("in", PortDirection::Input).unwrap();
        assert!(input.receive().is_none());
    }

    #[test]
    fn test_activate_is_idempotent() {
        let (driver, client) = client();
        client.activate().unwrap();
        client.activate().unwrap();
        client.deactivate().unwrap();
        client.deactivate().unwrap();
        // Periods still run without any callback installed.
        driver.run_period(64);
    }

    #[test]
    fn test_ports_listing_marks_ownership() {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        let other = Client::new("other", driver.clone());
        other.register_port("out", PortDirection::Output).unwrap();

        let client = Client::new("me", driver.clone());
        client.register_port("in", PortDirection::Input).unwrap();

        let all = client.ports(None);
        assert_eq!(all.len(), 2);
        let mine = all.iter().find(|p| p.name == "me:in").unwrap();
        let theirs = all.iter().find(|p| p.name == "other:out").unwrap();
        assert!(mine.owned);
        assert!(!theirs.owned);

        let filtered = client.ports(Some("other"));
        assert_eq!(filtered.len(), 1);

        let owned = client.owned_ports();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].name, "me:in");
    }

    #[test]
    fn test_port_handles_outlive_a_dropped_client() {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        let client = Client::new("gone", driver.clone());
        let out = client.register_port("out", PortDirection::Output).unwrap();
        out.send(&[0xF8], 0.0).unwrap();
        drop(client);

        // The client is closed: no revival, no panic.
        assert!(matches!(out.send(&[0xF8], 0.0), Err(Error::Closed)));
        assert!(out.receive().is_none());
        driver.run_period(64);
    }

    #[test]
    fn test_repeated_create_destroy_with_pending_messages() {
        let driver = Arc::new(LoopbackDriver::new(RATE));
        for cycle in 0..50 {
            let client = Client::new(format!("cycle-{cycle}"), driver.clone());
            let out = client
                .register_port("out", PortDirection::Output)
                .unwrap();
            for i in 0..10u8 {
                out.send(&[0x90, i, 100], f64::from(i) * 0.01).unwrap();
            }
            driver.run_period(128);
            // Dropped with messages still pending.
            assert!(client.pending_sends() > 0);
        }
        driver.run_period(128);
    }
}
