//! Per-device session state machine
//!
//! A [`Session`] owns everything about one logical connection: its lifecycle
//! state, the discovered service catalogue, the set of characteristics with
//! live notification subscriptions, and the single FIFO queue of pending GATT
//! requests. The transport allows one outstanding call per connection, so the
//! machine dispatches the next request only after the in-flight completion has
//! been observed.
//!
//! Transitions are pure: methods mutate the session and return the request (if
//! any) that the caller must now submit to the transport. This keeps the
//! machine unit-testable without a transport.
//!
//! There is no timeout on a stalled operation; a completion that never arrives
//! blocks this session's queue indefinitely. Teardown bypasses the queue.

use crate::types::{DeviceId, OpKind, ServiceInfo};
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// Lifecycle state of a session
///
/// `Disconnected` has no variant: a disconnected device simply has no session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport's connect completion
    Connecting,
    /// Connected, waiting for the service catalogue
    ServiceDiscovery,
    /// Accepting requests, nothing in flight
    Ready,
    /// One request in flight; new requests queue behind it
    Busy(OpKind),
    /// Teardown issued, waiting for the disconnect completion
    Disconnecting,
}

/// A queued GATT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GattRequest {
    RequestMtu { mtu: u16 },
    SetNotify { characteristic: Uuid, enable: bool },
    Read { characteristic: Uuid },
    Write { characteristic: Uuid, value: Vec<u8> },
}

impl GattRequest {
    /// Operation kind, for error and cancellation reporting
    pub fn kind(&self) -> OpKind {
        match self {
            GattRequest::RequestMtu { .. } => OpKind::Mtu,
            GattRequest::SetNotify { .. } => OpKind::Subscribe,
            GattRequest::Read { .. } => OpKind::Read,
            GattRequest::Write { .. } => OpKind::Write,
        }
    }
}

/// What [`Session::submit`] did with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The session was `Ready`; the caller must dispatch this now
    Dispatch(GattRequest),
    /// The session is establishing or busy; the request waits its turn
    Queued,
    /// Teardown has begun; the request is cancelled and must be reported
    Rejected(GattRequest),
}

/// State for one logical connection to one remote device
#[derive(Debug)]
pub struct Session {
    device: DeviceId,
    state: SessionState,
    services: Vec<ServiceInfo>,
    notifying: HashSet<Uuid>,
    queue: VecDeque<GattRequest>,
    in_flight: Option<GattRequest>,
}

impl Session {
    /// Create a session entering `Connecting`
    pub fn new(device: DeviceId) -> Self {
        Self {
            device,
            state: SessionState::Connecting,
            services: Vec::new(),
            notifying: HashSet::new(),
            queue: VecDeque::new(),
            in_flight: None,
        }
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Discovered service catalogue (empty before discovery completes)
    pub fn services(&self) -> &[ServiceInfo] {
        &self.services
    }

    /// Characteristics with a live notification subscription
    pub fn notifying(&self) -> &HashSet<Uuid> {
        &self.notifying
    }

    /// Number of requests waiting behind the in-flight operation
    pub fn pending_len(&self) -> usize {
        self.queue.len()
    }

    /// Submit a request
    ///
    /// While `Ready` the request must be dispatched by the caller now;
    /// while establishing or busy it queues in FIFO order behind whatever is
    /// ahead of it. Once teardown has begun the request is rejected, and the
    /// caller must report the cancellation so the submitter hears about it.
    pub fn submit(&mut self, request: GattRequest) -> SubmitOutcome {
        match self.state {
            SessionState::Ready => {
                self.state = SessionState::Busy(request.kind());
                self.in_flight = Some(request.clone());
                SubmitOutcome::Dispatch(request)
            }
            SessionState::Disconnecting => {
                tracing::warn!(device = %self.device, "request after teardown, rejecting");
                SubmitOutcome::Rejected(request)
            }
            _ => {
                self.queue.push_back(request);
                SubmitOutcome::Queued
            }
        }
    }

    /// Connect completion observed; proceed to service discovery
    pub fn on_connected(&mut self) {
        tracing::info!(device = %self.device, "connected, discovering services");
        self.state = SessionState::ServiceDiscovery;
    }

    /// Service catalogue received; session becomes `Ready`
    ///
    /// Returns the first queued request to dispatch, if any built up while the
    /// session was establishing.
    pub fn on_services_discovered(&mut self, services: Vec<ServiceInfo>) -> Option<GattRequest> {
        tracing::info!(
            device = %self.device,
            services = services.len(),
            "service discovery complete"
        );
        self.services = services;
        self.state = SessionState::Ready;
        self.dispatch_next()
    }

    /// In-flight completion observed (success or failure)
    ///
    /// Returns the next queued request to dispatch, if any. Must only be
    /// called while `Busy`; completions for unknown operations are the
    /// caller's bug and are ignored with a warning.
    pub fn on_op_complete(&mut self) -> Option<GattRequest> {
        match self.state {
            SessionState::Busy(_) => {
                self.in_flight = None;
                self.state = SessionState::Ready;
                self.dispatch_next()
            }
            _ => {
                tracing::warn!(
                    device = %self.device,
                    state = ?self.state,
                    "completion without in-flight operation"
                );
                None
            }
        }
    }

    /// Record the subscription state confirmed by a CCCD write completion
    pub fn set_notifying(&mut self, characteristic: Uuid, enabled: bool) {
        if enabled {
            self.notifying.insert(characteristic);
        } else {
            self.notifying.remove(&characteristic);
        }
    }

    /// Begin teardown: cancel the queue and the in-flight request
    ///
    /// Returns the cancelled requests in queue order (in-flight first) so the
    /// caller can report them. The session enters `Disconnecting`; its
    /// completion events, including the in-flight one, must no longer be
    /// surfaced.
    pub fn begin_teardown(&mut self) -> Vec<GattRequest> {
        let mut cancelled = Vec::with_capacity(self.queue.len() + 1);
        if let Some(in_flight) = self.in_flight.take() {
            cancelled.push(in_flight);
        }
        cancelled.extend(self.queue.drain(..));
        self.state = SessionState::Disconnecting;
        tracing::info!(
            device = %self.device,
            cancelled = cancelled.len(),
            "session teardown"
        );
        cancelled
    }

    /// Unsolicited disconnect: discard everything, report what was dropped
    pub fn on_link_lost(&mut self) -> Vec<GattRequest> {
        tracing::warn!(device = %self.device, "link lost");
        self.begin_teardown()
    }

    fn dispatch_next(&mut self) -> Option<GattRequest> {
        let next = self.queue.pop_front()?;
        self.state = SessionState::Busy(next.kind());
        self.in_flight = Some(next.clone());
        Some(next)
    }
}
