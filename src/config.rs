//! Link layer configuration
//!
//! [`LinkConfig`] is passed to [`crate::link::BleLink::new`] at construction;
//! there is no ambient global state and nothing is read from files or the
//! environment. The defaults match the sensor peripheral's expectations
//! (MTU request of 60, chart window of 50 points).

use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::link::BleLink`] instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Depth of the bounded command channel into the worker
    pub command_queue_depth: usize,

    /// Depth of each listener's bounded event channel
    ///
    /// A listener that falls this far behind starts losing events; drops are
    /// logged and counted rather than blocking the dispatch thread.
    pub event_queue_depth: usize,

    /// MTU requested by [`crate::link::LinkHandle::request_preferred_mtu`]
    pub preferred_mtu: u16,

    /// Default capacity for [`crate::series::SampleSeries`] consumers
    pub series_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            command_queue_depth: 256,
            event_queue_depth: 1024,
            preferred_mtu: 60,
            series_capacity: crate::series::DEFAULT_SERIES_CAPACITY,
        }
    }
}
