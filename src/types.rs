//! Core identifier and catalogue types
//!
//! - [`DeviceId`] - stable identifier for a remote peripheral (its address)
//! - [`ServiceInfo`] - one discovered GATT service and its characteristics
//! - [`OpKind`] - the kind of a queued GATT operation, used for error and
//!   cancellation reporting
//! - [`DisconnectReason`] - whether a disconnect was requested or unsolicited

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for a remote peripheral
///
/// Wraps the transport's address string (e.g. a Bluetooth MAC). Two sessions
/// are the same session exactly when their `DeviceId`s are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Create a device identifier from an address string
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The underlying address string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(address: &str) -> Self {
        Self::new(address)
    }
}

/// One discovered GATT service and the characteristics beneath it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    /// Service UUID
    pub uuid: Uuid,
    /// UUIDs of the characteristics under this service
    pub characteristics: Vec<Uuid>,
}

impl ServiceInfo {
    /// Create a service entry
    pub fn new(uuid: Uuid, characteristics: Vec<Uuid>) -> Self {
        Self {
            uuid,
            characteristics,
        }
    }
}

/// Flatten a discovered catalogue into its characteristic UUIDs
pub fn characteristics_of(services: &[ServiceInfo]) -> impl Iterator<Item = Uuid> + '_ {
    services.iter().flat_map(|s| s.characteristics.iter().copied())
}

/// The kind of a GATT operation, for error and cancellation reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Read,
    Write,
    Mtu,
    Subscribe,
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Read => write!(f, "read"),
            OpKind::Write => write!(f, "write"),
            OpKind::Mtu => write!(f, "mtu"),
            OpKind::Subscribe => write!(f, "subscribe"),
        }
    }
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisconnectReason {
    /// Teardown was requested through the command surface
    Requested,
    /// The transport reported an unsolicited disconnect
    LinkLost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_equality() {
        let a = DeviceId::new("AA:BB:CC:DD:EE:FF");
        let b = DeviceId::from("AA:BB:CC:DD:EE:FF");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_service_info_serde_round_trip() {
        let service = ServiceInfo::new(
            Uuid::from_u128(0x0000ff00_0000_1000_8000_00805f9b34fb),
            vec![Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb)],
        );
        let json = serde_json::to_string(&service).unwrap();
        let back: ServiceInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, service);
    }

    #[test]
    fn test_characteristics_of_flattens_in_order() {
        let c1 = Uuid::from_u128(1);
        let c2 = Uuid::from_u128(2);
        let c3 = Uuid::from_u128(3);
        let services = vec![
            ServiceInfo::new(Uuid::from_u128(10), vec![c1, c2]),
            ServiceInfo::new(Uuid::from_u128(11), vec![c3]),
        ];
        let flat: Vec<_> = characteristics_of(&services).collect();
        assert_eq!(flat, vec![c1, c2, c3]);
    }
}
