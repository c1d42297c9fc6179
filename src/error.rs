//! Error handling for the link layer
//!
//! [`LinkError`] covers the transport-facing taxonomy: connect failures,
//! per-operation failures (non-fatal to the session), unsolicited link loss
//! (fatal), and cancellation by teardown. Codec failures have their own type,
//! [`crate::codec::DecodeError`], because they are recovered locally by the
//! caller and never touch session state.

use crate::types::{DeviceId, OpKind};
use thiserror::Error;

/// Main error type for link-layer operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// The transport failed to establish the link
    #[error("failed to connect to {device}: {reason}")]
    Connect { device: DeviceId, reason: String },

    /// A single GATT operation failed; the session remains usable
    #[error("{kind} operation failed on {device}: {reason}")]
    Operation {
        device: DeviceId,
        kind: OpKind,
        reason: String,
    },

    /// The transport reported an unsolicited disconnect; the session is gone
    #[error("link to {0} lost")]
    LinkLost(DeviceId),

    /// The operation was discarded because its session was torn down
    #[error("{kind} operation on {device} cancelled by teardown")]
    Cancelled { device: DeviceId, kind: OpKind },

    /// No live session exists for the device
    #[error("no live session for {0}")]
    NoSession(DeviceId),

    /// A command or event channel was closed
    #[error("channel error: {0}")]
    Channel(String),
}

/// Result type alias for link-layer operations
pub type Result<T> = std::result::Result<T, LinkError>;
