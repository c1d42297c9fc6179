//! BLE connection/session management layer
//!
//! The link layer runs in a worker thread that owns the [`GattTransport`] and
//! one [`session::Session`] per connected device, communicating with consumers
//! over channels:
//!
//! - [`LinkCommand`] - requests sent from consumers to the worker (connect,
//!   read, write, subscribe, teardown)
//! - [`LinkEvent`] - broadcast from the worker to every registered listener
//! - [`LinkHandle`] - consumer-side handle for sending commands and
//!   registering listeners
//! - [`BleLink`] - entry point wiring the channels and running the worker
//!
//! # Example
//!
//! ```ignore
//! use blelink_rs::link::BleLink;
//! use blelink_rs::{DeviceId, LinkConfig, LinkEvent};
//!
//! let (link, handle) = BleLink::new(Box::new(my_transport), LinkConfig::default());
//! std::thread::spawn(move || link.run());
//!
//! let listener = handle.register_listener();
//! let device = DeviceId::new("AA:BB:CC:DD:EE:FF");
//! handle.connect(&device);
//!
//! for event in listener.drain() {
//!     match event {
//!         LinkEvent::CharacteristicChanged { value, .. } => {
//!             // decode and chart the sample
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! Completion events for one session are delivered in the order its operations
//! were enqueued; sessions for different devices are independent.

#[cfg(feature = "mock-transport")]
pub mod mock_transport;
pub mod registry;
pub mod session;
pub mod transport;
pub mod worker;

use crate::config::LinkConfig;
use crate::types::{DeviceId, DisconnectReason, OpKind, ServiceInfo};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use uuid::Uuid;

#[cfg(feature = "mock-transport")]
pub use mock_transport::{MockController, MockTransport};
pub use registry::{ListenerId, ListenerRegistry, Subscription};
pub use session::{GattRequest, Session, SessionState, SubmitOutcome};
pub use transport::{GattTransport, TransportEvent};
pub use worker::LinkWorker;

/// Request sent from consumers to the link worker
#[derive(Debug, Clone)]
pub enum LinkCommand {
    /// Establish a session; a no-op if one is already live for the device
    Connect { device: DeviceId },
    /// Negotiate the link MTU (valid once the session is ready; queued
    /// otherwise)
    RequestMtu { device: DeviceId, mtu: u16 },
    /// Subscribe to characteristic notifications
    EnableNotifications {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Unsubscribe from characteristic notifications
    DisableNotifications {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Read a characteristic; the payload arrives as
    /// [`LinkEvent::CharacteristicRead`]
    ReadCharacteristic {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Write a characteristic; completion arrives as
    /// [`LinkEvent::CharacteristicWritten`]
    WriteCharacteristic {
        device: DeviceId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// Cancel the pending queue, disconnect, and destroy the session
    Teardown { device: DeviceId },
    /// Tear down every session and stop the worker
    Shutdown,
}

/// Event broadcast to every registered listener
///
/// Listeners receive events for every device and filter by identity
/// themselves.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// The transport link is up; service discovery is running
    Connected { device: DeviceId },
    /// The session could not be established and has been discarded
    ConnectFailed { device: DeviceId, reason: String },
    /// Discovery finished; the session now accepts operations
    ServicesDiscovered {
        device: DeviceId,
        services: Vec<ServiceInfo>,
    },
    /// MTU negotiation completed
    MtuChanged { device: DeviceId, mtu: u16 },
    /// Notification subscription is active
    NotificationsEnabled {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Notification subscription removed
    NotificationsDisabled {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Read completion with the raw payload
    CharacteristicRead {
        device: DeviceId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// Write completion (success only; no payload echo)
    CharacteristicWritten {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// Unsolicited notification from a subscribed characteristic
    CharacteristicChanged {
        device: DeviceId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// A single operation failed; the session remains usable
    OperationFailed {
        device: DeviceId,
        kind: OpKind,
        reason: String,
    },
    /// A queued operation was discarded by teardown or link loss
    OperationCancelled { device: DeviceId, kind: OpKind },
    /// The session is gone
    Disconnected {
        device: DeviceId,
        reason: DisconnectReason,
    },
}

/// Consumer-side handle to a running link
///
/// Cheap to clone; all clones feed the same worker and registry.
#[derive(Clone)]
pub struct LinkHandle {
    command_tx: Sender<LinkCommand>,
    registry: Arc<ListenerRegistry>,
    config: LinkConfig,
}

impl LinkHandle {
    /// Register a listener; every subsequent event is delivered to it
    pub fn register_listener(&self) -> Subscription {
        self.registry.register(self.config.event_queue_depth)
    }

    /// Remove a listener; no events are delivered after this returns
    pub fn unregister_listener(&self, id: ListenerId) {
        self.registry.unregister(id);
    }

    /// Send a raw command to the worker
    pub fn send_command(&self, command: LinkCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    /// Establish a session with the device (idempotent)
    pub fn connect(&self, device: &DeviceId) {
        let _ = self.command_tx.send(LinkCommand::Connect {
            device: device.clone(),
        });
    }

    /// Negotiate the link MTU
    pub fn request_mtu(&self, device: &DeviceId, mtu: u16) {
        let _ = self.command_tx.send(LinkCommand::RequestMtu {
            device: device.clone(),
            mtu,
        });
    }

    /// Negotiate the configured preferred MTU
    pub fn request_preferred_mtu(&self, device: &DeviceId) {
        self.request_mtu(device, self.config.preferred_mtu);
    }

    /// Subscribe to characteristic notifications
    pub fn enable_notifications(&self, device: &DeviceId, characteristic: Uuid) {
        let _ = self.command_tx.send(LinkCommand::EnableNotifications {
            device: device.clone(),
            characteristic,
        });
    }

    /// Unsubscribe from characteristic notifications
    pub fn disable_notifications(&self, device: &DeviceId, characteristic: Uuid) {
        let _ = self.command_tx.send(LinkCommand::DisableNotifications {
            device: device.clone(),
            characteristic,
        });
    }

    /// Read a characteristic's value
    pub fn read_characteristic(&self, device: &DeviceId, characteristic: Uuid) {
        let _ = self.command_tx.send(LinkCommand::ReadCharacteristic {
            device: device.clone(),
            characteristic,
        });
    }

    /// Write a characteristic's value
    pub fn write_characteristic(&self, device: &DeviceId, characteristic: Uuid, value: Vec<u8>) {
        let _ = self.command_tx.send(LinkCommand::WriteCharacteristic {
            device: device.clone(),
            characteristic,
            value,
        });
    }

    /// Cancel pending operations, disconnect, and discard the session
    pub fn teardown_connection(&self, device: &DeviceId) {
        let _ = self.command_tx.send(LinkCommand::Teardown {
            device: device.clone(),
        });
    }

    /// Tear down all sessions and stop the worker
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(LinkCommand::Shutdown);
    }
}

/// The link layer entry point
///
/// Owns the channels and the transport until [`BleLink::run`] consumes it on
/// the worker thread. All state is created here and torn down with the worker;
/// nothing lives in process globals.
pub struct BleLink {
    config: LinkConfig,
    transport: Box<dyn GattTransport>,
    command_rx: Receiver<LinkCommand>,
    transport_rx: Receiver<TransportEvent>,
    registry: Arc<ListenerRegistry>,
    running: Arc<AtomicBool>,
}

impl BleLink {
    /// Wire a link around the given transport
    ///
    /// Attaches the completion channel to the transport and returns the link
    /// (to be run on its own thread) plus the consumer handle.
    pub fn new(mut transport: Box<dyn GattTransport>, config: LinkConfig) -> (Self, LinkHandle) {
        let (command_tx, command_rx) = bounded(config.command_queue_depth);
        let (event_tx, transport_rx) = bounded(config.event_queue_depth);
        transport.attach(event_tx);

        let registry = Arc::new(ListenerRegistry::new());
        let running = Arc::new(AtomicBool::new(true));

        let handle = LinkHandle {
            command_tx,
            registry: registry.clone(),
            config: config.clone(),
        };

        let link = Self {
            config,
            transport,
            command_rx,
            transport_rx,
            registry,
            running,
        };

        (link, handle)
    }

    /// Run the worker loop until shutdown
    pub fn run(self) {
        let mut worker = LinkWorker::new(
            self.transport,
            self.registry,
            self.command_rx,
            self.transport_rx,
            self.running,
        );
        worker.run();
    }

    /// Flag that stops the worker loop from outside the command surface
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// The configuration this link was built with
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}
