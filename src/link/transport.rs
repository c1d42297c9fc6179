//! GATT transport boundary
//!
//! [`GattTransport`] is the seam between the link layer and the platform BLE
//! stack. Every submission is asynchronous: the call returns once the request
//! has been handed to the stack, and the outcome arrives later as exactly one
//! [`TransportEvent`] on the channel attached through
//! [`GattTransport::attach`]. The transport permits one outstanding request
//! per connection; the link worker enforces that discipline, implementations
//! do not need their own queueing.
//!
//! Characteristic notifications and unsolicited disconnects arrive on the same
//! channel, which keeps completion ordering and notification ordering
//! consistent with what the stack observed.

use crate::error::Result;
use crate::types::{DeviceId, ServiceInfo};
use crossbeam_channel::Sender;
use uuid::Uuid;

/// Completion and notification events emitted by a transport
///
/// One submission yields exactly one completion variant; `Notification` and
/// unsolicited `Disconnected` events can arrive at any time while connected.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A `connect` submission succeeded
    Connected { device: DeviceId },
    /// A `connect` submission failed
    ConnectFailed { device: DeviceId, reason: String },
    /// A `discover_services` submission completed
    ServicesDiscovered {
        device: DeviceId,
        services: Vec<ServiceInfo>,
    },
    /// A `discover_services` submission failed
    DiscoveryFailed { device: DeviceId, reason: String },
    /// A `request_mtu` submission completed with the negotiated value
    MtuChanged { device: DeviceId, mtu: u16 },
    /// A `request_mtu` submission failed
    MtuFailed { device: DeviceId, reason: String },
    /// A `set_notify` submission completed; the CCCD now holds `enabled`
    NotifyUpdated {
        device: DeviceId,
        characteristic: Uuid,
        enabled: bool,
    },
    /// A `set_notify` submission failed; subscription state is unchanged
    NotifyFailed {
        device: DeviceId,
        characteristic: Uuid,
        reason: String,
    },
    /// A `read_characteristic` submission completed with the raw payload
    ReadCompleted {
        device: DeviceId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// A `read_characteristic` submission failed
    ReadFailed {
        device: DeviceId,
        characteristic: Uuid,
        reason: String,
    },
    /// A `write_characteristic` submission completed (no payload echo)
    WriteCompleted {
        device: DeviceId,
        characteristic: Uuid,
    },
    /// A `write_characteristic` submission failed
    WriteFailed {
        device: DeviceId,
        characteristic: Uuid,
        reason: String,
    },
    /// Unsolicited value push from a subscribed characteristic
    Notification {
        device: DeviceId,
        characteristic: Uuid,
        value: Vec<u8>,
    },
    /// The link is down, either as a `disconnect` completion or unsolicited
    Disconnected { device: DeviceId },
}

/// Platform BLE stack seam
///
/// Implementations must be `Send` so the link worker can own them on its
/// thread. A returned `Err` means the submission itself was rejected; no
/// completion event will follow for that call.
pub trait GattTransport: Send {
    /// Attach the completion/notification channel
    ///
    /// Called once by the link worker before any submission.
    fn attach(&mut self, events: Sender<TransportEvent>);

    /// Establish a link to the device
    fn connect(&mut self, device: &DeviceId) -> Result<()>;

    /// Enumerate services and characteristics on a connected device
    fn discover_services(&mut self, device: &DeviceId) -> Result<()>;

    /// Negotiate the link MTU
    fn request_mtu(&mut self, device: &DeviceId, mtu: u16) -> Result<()>;

    /// Write the characteristic's client-configuration descriptor
    fn set_notify(&mut self, device: &DeviceId, characteristic: Uuid, enable: bool) -> Result<()>;

    /// Read a characteristic's value
    fn read_characteristic(&mut self, device: &DeviceId, characteristic: Uuid) -> Result<()>;

    /// Write a characteristic's value
    fn write_characteristic(
        &mut self,
        device: &DeviceId,
        characteristic: Uuid,
        value: &[u8],
    ) -> Result<()>;

    /// Close the link
    fn disconnect(&mut self, device: &DeviceId) -> Result<()>;
}

impl TransportEvent {
    /// The device this event concerns
    pub fn device(&self) -> &DeviceId {
        match self {
            TransportEvent::Connected { device }
            | TransportEvent::ConnectFailed { device, .. }
            | TransportEvent::ServicesDiscovered { device, .. }
            | TransportEvent::DiscoveryFailed { device, .. }
            | TransportEvent::MtuChanged { device, .. }
            | TransportEvent::MtuFailed { device, .. }
            | TransportEvent::NotifyUpdated { device, .. }
            | TransportEvent::NotifyFailed { device, .. }
            | TransportEvent::ReadCompleted { device, .. }
            | TransportEvent::ReadFailed { device, .. }
            | TransportEvent::WriteCompleted { device, .. }
            | TransportEvent::WriteFailed { device, .. }
            | TransportEvent::Notification { device, .. }
            | TransportEvent::Disconnected { device } => device,
        }
    }
}
