//! # BleLink-RS: BLE Sensor Link Layer
//!
//! A session layer for a BLE gas-sensor peripheral. The architecture separates
//! the GATT transport backend from its consumers: a worker thread owns the
//! transport and one session state machine per device, and everything crosses
//! thread boundaries over channels.
//!
//! ## Architecture
//!
//! - **Codec**: Fixed-layout little-endian records for telemetry samples and
//!   the device configuration register
//! - **Link**: Per-device session state machines over a [`link::GattTransport`]
//!   seam, driven by a worker thread
//! - **Dispatch**: A broadcast registry delivering every [`LinkEvent`] to every
//!   registered listener over bounded channels
//! - **Series**: A bounded ring buffer turning decoded samples into chart
//!   points
//!
//! Sessions allow one in-flight GATT operation; further requests queue in FIFO
//! order and their completions arrive in enqueue order. All state lives in the
//! [`link::BleLink`] instance and its handle; nothing is process-global.
//!
//! ## Example
//!
//! ```ignore
//! use blelink_rs::{
//!     codec, link::BleLink, DeviceId, LinkConfig, LinkEvent, SampleSeries,
//! };
//!
//! let (link, handle) = BleLink::new(transport, LinkConfig::default());
//! std::thread::spawn(move || link.run());
//!
//! let listener = handle.register_listener();
//! let device = DeviceId::new("AA:BB:CC:DD:EE:FF");
//! handle.connect(&device);
//! handle.request_preferred_mtu(&device);
//! handle.enable_notifications(&device, data_characteristic);
//!
//! let mut series = SampleSeries::with_origin(50);
//! while let Some(event) = listener.recv_timeout(std::time::Duration::from_secs(1)) {
//!     if let LinkEvent::CharacteristicChanged { value, .. } = event {
//!         let sample = codec::decode_sample(&value)?;
//!         series.append(sample.gas_concentration as f64);
//!     }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod series;
pub mod types;

pub use codec::{
    decode_config, decode_sample, encode_config, encode_sample, ConfigRegister, DecodeError,
    SamplePoint, CONFIG_WIRE_LEN, SAMPLE_WIRE_LEN,
};
pub use config::LinkConfig;
pub use error::{LinkError, Result};
pub use link::{BleLink, LinkCommand, LinkEvent, LinkHandle, Subscription};
pub use series::{ChartPoint, SampleSeries, DEFAULT_SERIES_CAPACITY};
pub use types::{DeviceId, DisconnectReason, OpKind, ServiceInfo};
