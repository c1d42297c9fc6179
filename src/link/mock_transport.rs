//! In-memory transport for tests and demos
//!
//! [`MockTransport`] implements [`GattTransport`] against an in-memory
//! peripheral: a single sensor service with a data characteristic (notify) and
//! a config characteristic (read/write). Submissions complete synchronously on
//! the completion channel unless the paired [`MockController`] is holding
//! completions, which lets tests pin a session in its busy state and exercise
//! queue ordering and teardown races deterministically.
//!
//! Enable with the `mock-transport` feature.

use super::transport::{GattTransport, TransportEvent};
use crate::error::Result;
use crate::types::{DeviceId, OpKind, ServiceInfo};
use crossbeam_channel::Sender;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Service exposed by the mock peripheral
pub const SENSOR_SERVICE_UUID: Uuid = Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb);
/// Notify characteristic carrying encoded sample points
pub const DATA_CHARACTERISTIC_UUID: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);
/// Read/write characteristic carrying the encoded config register
pub const CONFIG_CHARACTERISTIC_UUID: Uuid =
    Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);

struct MockInner {
    events: Option<Sender<TransportEvent>>,
    services: Vec<ServiceInfo>,
    char_values: HashMap<Uuid, Vec<u8>>,
    connected: HashSet<DeviceId>,
    notifying: HashSet<(DeviceId, Uuid)>,
    connect_attempts: u64,
    fail_connect: bool,
    fail_discovery: bool,
    fail_next: Option<OpKind>,
    hold_completions: bool,
    held: Vec<TransportEvent>,
}

impl MockInner {
    fn emit(&mut self, event: TransportEvent) {
        if self.hold_completions {
            self.held.push(event);
            return;
        }
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    /// Send immediately even while completions are held
    fn emit_now(&mut self, event: TransportEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }

    fn take_failure(&mut self, kind: OpKind) -> bool {
        if self.fail_next == Some(kind) {
            self.fail_next = None;
            true
        } else {
            false
        }
    }
}

/// In-memory GATT transport
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

/// Test-side control surface for a [`MockTransport`]
#[derive(Clone)]
pub struct MockController {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    /// Create a transport and its controller
    ///
    /// The peripheral starts with the sensor service catalogue and an
    /// all-zero config register.
    pub fn new() -> (Self, MockController) {
        let mut char_values = HashMap::new();
        char_values.insert(
            CONFIG_CHARACTERISTIC_UUID,
            vec![0u8; crate::codec::CONFIG_WIRE_LEN],
        );

        let inner = Arc::new(Mutex::new(MockInner {
            events: None,
            services: vec![ServiceInfo::new(
                SENSOR_SERVICE_UUID,
                vec![DATA_CHARACTERISTIC_UUID, CONFIG_CHARACTERISTIC_UUID],
            )],
            char_values,
            connected: HashSet::new(),
            notifying: HashSet::new(),
            connect_attempts: 0,
            fail_connect: false,
            fail_discovery: false,
            fail_next: None,
            hold_completions: false,
            held: Vec::new(),
        }));

        (
            Self {
                inner: inner.clone(),
            },
            MockController { inner },
        )
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().expect("mock transport poisoned")
    }
}

impl GattTransport for MockTransport {
    fn attach(&mut self, events: Sender<TransportEvent>) {
        self.lock().events = Some(events);
    }

    fn connect(&mut self, device: &DeviceId) -> Result<()> {
        let mut inner = self.lock();
        inner.connect_attempts += 1;
        if inner.fail_connect {
            inner.emit(TransportEvent::ConnectFailed {
                device: device.clone(),
                reason: "peripheral unreachable".to_string(),
            });
        } else {
            inner.connected.insert(device.clone());
            inner.emit(TransportEvent::Connected {
                device: device.clone(),
            });
        }
        Ok(())
    }

    fn discover_services(&mut self, device: &DeviceId) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_discovery {
            inner.emit(TransportEvent::DiscoveryFailed {
                device: device.clone(),
                reason: "discovery failed".to_string(),
            });
        } else {
            let services = inner.services.clone();
            inner.emit(TransportEvent::ServicesDiscovered {
                device: device.clone(),
                services,
            });
        }
        Ok(())
    }

    fn request_mtu(&mut self, device: &DeviceId, mtu: u16) -> Result<()> {
        let mut inner = self.lock();
        if inner.take_failure(OpKind::Mtu) {
            inner.emit(TransportEvent::MtuFailed {
                device: device.clone(),
                reason: "mtu rejected".to_string(),
            });
        } else {
            inner.emit(TransportEvent::MtuChanged {
                device: device.clone(),
                mtu,
            });
        }
        Ok(())
    }

    fn set_notify(&mut self, device: &DeviceId, characteristic: Uuid, enable: bool) -> Result<()> {
        let mut inner = self.lock();
        if inner.take_failure(OpKind::Subscribe) {
            inner.emit(TransportEvent::NotifyFailed {
                device: device.clone(),
                characteristic,
                reason: "descriptor write failed".to_string(),
            });
        } else {
            if enable {
                inner.notifying.insert((device.clone(), characteristic));
            } else {
                inner.notifying.remove(&(device.clone(), characteristic));
            }
            inner.emit(TransportEvent::NotifyUpdated {
                device: device.clone(),
                characteristic,
                enabled: enable,
            });
        }
        Ok(())
    }

    fn read_characteristic(&mut self, device: &DeviceId, characteristic: Uuid) -> Result<()> {
        let mut inner = self.lock();
        if inner.take_failure(OpKind::Read) {
            inner.emit(TransportEvent::ReadFailed {
                device: device.clone(),
                characteristic,
                reason: "read failed".to_string(),
            });
        } else {
            let value = inner
                .char_values
                .get(&characteristic)
                .cloned()
                .unwrap_or_default();
            inner.emit(TransportEvent::ReadCompleted {
                device: device.clone(),
                characteristic,
                value,
            });
        }
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()> {
        let mut inner = self.lock();
        if inner.take_failure(OpKind::Write) {
            inner.emit(TransportEvent::WriteFailed {
                device: device.clone(),
                characteristic,
                reason: "write failed".to_string(),
            });
        } else {
            inner.char_values.insert(characteristic, value.to_vec());
            inner.emit(TransportEvent::WriteCompleted {
                device: device.clone(),
                characteristic,
            });
        }
        Ok(())
    }

    fn disconnect(&mut self, device: &DeviceId) -> Result<()> {
        let mut inner = self.lock();
        inner.connected.remove(device);
        inner.notifying.retain(|(d, _)| d != device);
        // Completions held for this device belong to cancelled operations.
        inner.held.retain(|event| event.device() != device);
        inner.emit_now(TransportEvent::Disconnected {
            device: device.clone(),
        });
        Ok(())
    }
}

impl MockController {
    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().expect("mock transport poisoned")
    }

    /// How many `connect` submissions the transport has seen
    pub fn connect_attempts(&self) -> u64 {
        self.lock().connect_attempts
    }

    /// Make every subsequent `connect` fail
    pub fn set_fail_connect(&self, fail: bool) {
        self.lock().fail_connect = fail;
    }

    /// Make every subsequent `discover_services` fail
    pub fn set_fail_discovery(&self, fail: bool) {
        self.lock().fail_discovery = fail;
    }

    /// Fail the next submission of the given kind, then recover
    pub fn fail_next_op(&self, kind: OpKind) {
        self.lock().fail_next = Some(kind);
    }

    /// Buffer completions instead of sending them
    pub fn hold_completions(&self, hold: bool) {
        self.lock().hold_completions = hold;
    }

    /// Send everything buffered while completions were held, in order
    pub fn release_held(&self) {
        let mut inner = self.lock();
        let held = std::mem::take(&mut inner.held);
        for event in held {
            inner.emit_now(event);
        }
    }

    /// Set the value a read of the characteristic returns
    pub fn set_characteristic_value(&self, characteristic: Uuid, value: Vec<u8>) {
        self.lock().char_values.insert(characteristic, value);
    }

    /// Current stored value of a characteristic
    pub fn characteristic_value(&self, characteristic: Uuid) -> Option<Vec<u8>> {
        self.lock().char_values.get(&characteristic).cloned()
    }

    /// Whether a notification subscription is live on the peripheral side
    pub fn is_notifying(&self, device: &DeviceId, characteristic: Uuid) -> bool {
        self.lock()
            .notifying
            .contains(&(device.clone(), characteristic))
    }

    /// Push an unsolicited notification to the link
    pub fn emit_notification(&self, device: &DeviceId, characteristic: Uuid, value: Vec<u8>) {
        self.lock().emit_now(TransportEvent::Notification {
            device: device.clone(),
            characteristic,
            value,
        });
    }

    /// Push an encoded sample point on the data characteristic
    pub fn emit_sample(&self, device: &DeviceId, gas_concentration: f32, timestamp: u32) {
        let sample = crate::codec::SamplePoint {
            gas_concentration,
            timestamp,
            system_stable: 1,
            ..Default::default()
        };
        self.emit_notification(
            device,
            DATA_CHARACTERISTIC_UUID,
            crate::codec::encode_sample(&sample).to_vec(),
        );
    }

    /// Drop the link from the peripheral side
    pub fn emit_link_lost(&self, device: &DeviceId) {
        let mut inner = self.lock();
        inner.connected.remove(device);
        inner.notifying.retain(|(d, _)| d != device);
        inner.emit_now(TransportEvent::Disconnected {
            device: device.clone(),
        });
    }
}
