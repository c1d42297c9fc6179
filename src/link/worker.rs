//! Link worker loop
//!
//! The worker runs on its own thread and owns the transport, the per-device
//! session map, and the broadcast registry. It selects over two channels: the
//! command channel fed by [`crate::link::LinkHandle`] and the completion
//! channel fed by the transport. Commands route to the session for their
//! device; completions advance that session's queue and are re-broadcast as
//! [`LinkEvent`]s.
//!
//! Sessions never share state, so a stalled device blocks only its own queue.
//! Events for a device with no live session (stale completions racing a
//! teardown) are dropped here, which is what guarantees that a cancelled
//! operation's completion is never surfaced.

use super::registry::ListenerRegistry;
use super::session::{GattRequest, Session, SessionState, SubmitOutcome};
use super::transport::{GattTransport, TransportEvent};
use super::{LinkCommand, LinkEvent};
use crate::codec;
use crate::error::LinkError;
use crate::types::{DeviceId, DisconnectReason};
use crossbeam_channel::{select, Receiver};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// How long the select loop waits before re-checking the running flag
const IDLE_TICK: Duration = Duration::from_millis(50);

/// The worker that drives all sessions
pub struct LinkWorker {
    transport: Box<dyn GattTransport>,
    sessions: HashMap<DeviceId, Session>,
    registry: Arc<ListenerRegistry>,
    command_rx: Receiver<LinkCommand>,
    transport_rx: Receiver<TransportEvent>,
    running: Arc<AtomicBool>,
}

impl LinkWorker {
    /// Create a worker over an attached transport
    pub fn new(
        transport: Box<dyn GattTransport>,
        registry: Arc<ListenerRegistry>,
        command_rx: Receiver<LinkCommand>,
        transport_rx: Receiver<TransportEvent>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            transport,
            sessions: HashMap::new(),
            registry,
            command_rx,
            transport_rx,
            running,
        }
    }

    /// Run the main loop until shutdown or channel closure
    pub fn run(&mut self) {
        tracing::info!("link worker started");

        while self.running.load(Ordering::SeqCst) {
            select! {
                recv(self.command_rx) -> command => match command {
                    Ok(command) => self.handle_command(command),
                    Err(_) => break,
                },
                recv(self.transport_rx) -> event => match event {
                    Ok(event) => self.handle_transport_event(event),
                    Err(_) => break,
                },
                default(IDLE_TICK) => {}
            }
        }

        self.teardown_all();
        self.drain_disconnects();
        tracing::info!("link worker stopped");
    }

    /// Consume disconnect confirmations still queued at exit so listeners see
    /// their sessions end
    fn drain_disconnects(&mut self) {
        while let Ok(event) = self.transport_rx.try_recv() {
            if matches!(event, TransportEvent::Disconnected { .. }) {
                self.handle_transport_event(event);
            }
        }
    }

    fn handle_command(&mut self, command: LinkCommand) {
        match command {
            LinkCommand::Connect { device } => self.handle_connect(device),
            LinkCommand::RequestMtu { device, mtu } => {
                self.submit(device, GattRequest::RequestMtu { mtu });
            }
            LinkCommand::EnableNotifications {
                device,
                characteristic,
            } => {
                self.submit(
                    device,
                    GattRequest::SetNotify {
                        characteristic,
                        enable: true,
                    },
                );
            }
            LinkCommand::DisableNotifications {
                device,
                characteristic,
            } => {
                self.submit(
                    device,
                    GattRequest::SetNotify {
                        characteristic,
                        enable: false,
                    },
                );
            }
            LinkCommand::ReadCharacteristic {
                device,
                characteristic,
            } => {
                self.submit(device, GattRequest::Read { characteristic });
            }
            LinkCommand::WriteCharacteristic {
                device,
                characteristic,
                value,
            } => {
                self.submit(
                    device,
                    GattRequest::Write {
                        characteristic,
                        value,
                    },
                );
            }
            LinkCommand::Teardown { device } => self.handle_teardown(device),
            LinkCommand::Shutdown => {
                self.teardown_all();
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Establish a session; idempotent per device
    fn handle_connect(&mut self, device: DeviceId) {
        if self.sessions.contains_key(&device) {
            tracing::debug!(device = %device, "session already live, connect ignored");
            return;
        }

        tracing::info!(device = %device, "connecting");
        self.sessions
            .insert(device.clone(), Session::new(device.clone()));
        if let Err(e) = self.transport.connect(&device) {
            self.fail_connect(device, e.to_string());
        }
    }

    /// Route a request into the device's session queue
    fn submit(&mut self, device: DeviceId, request: GattRequest) {
        let Some(session) = self.sessions.get_mut(&device) else {
            tracing::warn!(device = %device, kind = %request.kind(), "operation without session");
            self.registry.broadcast(&LinkEvent::OperationFailed {
                device: device.clone(),
                kind: request.kind(),
                reason: LinkError::NoSession(device.clone()).to_string(),
            });
            return;
        };

        match session.submit(request) {
            SubmitOutcome::Dispatch(request) => self.dispatch(device, request),
            SubmitOutcome::Queued => {}
            SubmitOutcome::Rejected(request) => {
                self.registry.broadcast(&LinkEvent::OperationCancelled {
                    device,
                    kind: request.kind(),
                });
            }
        }
    }

    /// Hand a request to the transport
    ///
    /// A rejected submission is a completed (failed) operation: it is reported
    /// and the session's queue keeps draining.
    fn dispatch(&mut self, device: DeviceId, mut request: GattRequest) {
        loop {
            let result = match &request {
                GattRequest::RequestMtu { mtu } => self.transport.request_mtu(&device, *mtu),
                GattRequest::SetNotify {
                    characteristic,
                    enable,
                } => self.transport.set_notify(&device, *characteristic, *enable),
                GattRequest::Read { characteristic } => {
                    self.transport.read_characteristic(&device, *characteristic)
                }
                GattRequest::Write {
                    characteristic,
                    value,
                } => self
                    .transport
                    .write_characteristic(&device, *characteristic, value),
            };

            match result {
                Ok(()) => break,
                Err(e) => {
                    tracing::warn!(device = %device, kind = %request.kind(), error = %e, "submission rejected");
                    self.registry.broadcast(&LinkEvent::OperationFailed {
                        device: device.clone(),
                        kind: request.kind(),
                        reason: e.to_string(),
                    });
                    match self
                        .sessions
                        .get_mut(&device)
                        .and_then(|s| s.on_op_complete())
                    {
                        Some(next) => request = next,
                        None => break,
                    }
                }
            }
        }
    }

    /// Cancel the queue, disconnect, and discard the session
    fn handle_teardown(&mut self, device: DeviceId) {
        let Some(session) = self.sessions.get_mut(&device) else {
            tracing::debug!(device = %device, "teardown without session");
            return;
        };

        for request in session.begin_teardown() {
            self.registry.broadcast(&LinkEvent::OperationCancelled {
                device: device.clone(),
                kind: request.kind(),
            });
        }

        if self.transport.disconnect(&device).is_err() {
            // The link is already down as far as the transport is concerned.
            self.sessions.remove(&device);
            self.registry.broadcast(&LinkEvent::Disconnected {
                device,
                reason: DisconnectReason::Requested,
            });
        }
        // Otherwise the session stays in `Disconnecting` until the transport
        // confirms with a `Disconnected` event.
    }

    fn teardown_all(&mut self) {
        let devices: Vec<DeviceId> = self.sessions.keys().cloned().collect();
        for device in devices {
            if let Some(session) = self.sessions.get_mut(&device) {
                if session.state() != SessionState::Disconnecting {
                    self.handle_teardown(device);
                }
            }
        }
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        let device = event.device().clone();
        let Some(state) = self.sessions.get(&device).map(|s| s.state()) else {
            tracing::debug!(device = %device, "event for unknown session dropped");
            return;
        };

        // After teardown only the disconnect confirmation is of interest;
        // completions for cancelled operations must never surface.
        if state == SessionState::Disconnecting
            && !matches!(event, TransportEvent::Disconnected { .. })
        {
            tracing::debug!(device = %device, "event after teardown dropped");
            return;
        }

        match event {
            TransportEvent::Connected { device } => {
                if let Some(session) = self.sessions.get_mut(&device) {
                    session.on_connected();
                }
                self.registry.broadcast(&LinkEvent::Connected {
                    device: device.clone(),
                });
                if let Err(e) = self.transport.discover_services(&device) {
                    self.fail_connect(device, e.to_string());
                }
            }
            TransportEvent::ConnectFailed { device, reason } => {
                self.fail_connect(device, reason);
            }
            TransportEvent::ServicesDiscovered { device, services } => {
                self.registry.broadcast(&LinkEvent::ServicesDiscovered {
                    device: device.clone(),
                    services: services.clone(),
                });
                let next = self
                    .sessions
                    .get_mut(&device)
                    .and_then(|s| s.on_services_discovered(services));
                if let Some(request) = next {
                    self.dispatch(device, request);
                }
            }
            TransportEvent::DiscoveryFailed { device, reason } => {
                self.fail_connect(device, reason);
            }
            TransportEvent::MtuChanged { device, mtu } => {
                tracing::info!(device = %device, mtu, "mtu updated");
                self.registry.broadcast(&LinkEvent::MtuChanged {
                    device: device.clone(),
                    mtu,
                });
                self.advance(&device);
            }
            TransportEvent::MtuFailed { device, reason } => {
                self.operation_failed(device, crate::types::OpKind::Mtu, reason);
            }
            TransportEvent::NotifyUpdated {
                device,
                characteristic,
                enabled,
            } => {
                if let Some(session) = self.sessions.get_mut(&device) {
                    session.set_notifying(characteristic, enabled);
                }
                let event = if enabled {
                    LinkEvent::NotificationsEnabled {
                        device: device.clone(),
                        characteristic,
                    }
                } else {
                    LinkEvent::NotificationsDisabled {
                        device: device.clone(),
                        characteristic,
                    }
                };
                self.registry.broadcast(&event);
                self.advance(&device);
            }
            TransportEvent::NotifyFailed { device, reason, .. } => {
                self.operation_failed(device, crate::types::OpKind::Subscribe, reason);
            }
            TransportEvent::ReadCompleted {
                device,
                characteristic,
                value,
            } => {
                tracing::debug!(
                    device = %device,
                    characteristic = %characteristic,
                    payload = %codec::hex_string(&value),
                    "read complete"
                );
                self.registry.broadcast(&LinkEvent::CharacteristicRead {
                    device: device.clone(),
                    characteristic,
                    value,
                });
                self.advance(&device);
            }
            TransportEvent::ReadFailed { device, reason, .. } => {
                self.operation_failed(device, crate::types::OpKind::Read, reason);
            }
            TransportEvent::WriteCompleted {
                device,
                characteristic,
            } => {
                self.registry.broadcast(&LinkEvent::CharacteristicWritten {
                    device: device.clone(),
                    characteristic,
                });
                self.advance(&device);
            }
            TransportEvent::WriteFailed { device, reason, .. } => {
                self.operation_failed(device, crate::types::OpKind::Write, reason);
            }
            TransportEvent::Notification {
                device,
                characteristic,
                value,
            } => {
                self.registry.broadcast(&LinkEvent::CharacteristicChanged {
                    device,
                    characteristic,
                    value,
                });
            }
            TransportEvent::Disconnected { device } => {
                let requested = state == SessionState::Disconnecting;
                if let Some(mut session) = self.sessions.remove(&device) {
                    if !requested {
                        for request in session.on_link_lost() {
                            self.registry.broadcast(&LinkEvent::OperationCancelled {
                                device: device.clone(),
                                kind: request.kind(),
                            });
                        }
                    }
                }
                let reason = if requested {
                    DisconnectReason::Requested
                } else {
                    DisconnectReason::LinkLost
                };
                self.registry
                    .broadcast(&LinkEvent::Disconnected { device, reason });
            }
        }
    }

    /// Report a non-fatal operation failure and keep the queue draining
    fn operation_failed(&mut self, device: DeviceId, kind: crate::types::OpKind, reason: String) {
        tracing::warn!(device = %device, kind = %kind, reason = %reason, "operation failed");
        self.registry.broadcast(&LinkEvent::OperationFailed {
            device: device.clone(),
            kind,
            reason,
        });
        self.advance(&device);
    }

    /// Observe the in-flight completion and dispatch the next queued request
    fn advance(&mut self, device: &DeviceId) {
        let next = self
            .sessions
            .get_mut(device)
            .and_then(|s| s.on_op_complete());
        if let Some(request) = next {
            self.dispatch(device.clone(), request);
        }
    }

    /// Discard a session that never became ready
    fn fail_connect(&mut self, device: DeviceId, reason: String) {
        tracing::warn!(device = %device, reason = %reason, "connect failed");
        if let Some(mut session) = self.sessions.remove(&device) {
            for request in session.begin_teardown() {
                self.registry.broadcast(&LinkEvent::OperationCancelled {
                    device: device.clone(),
                    kind: request.kind(),
                });
            }
        }
        self.registry
            .broadcast(&LinkEvent::ConnectFailed { device, reason });
    }

    #[cfg(test)]
    fn session_state(&self, device: &DeviceId) -> Option<SessionState> {
        self.sessions.get(device).map(|s| s.state())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use crate::link::registry::Subscription;
    use crate::types::{OpKind, ServiceInfo};
    use crossbeam_channel::bounded;
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Connect(DeviceId),
        Discover(DeviceId),
        Mtu(DeviceId, u16),
        Notify(DeviceId, Uuid, bool),
        Read(DeviceId, Uuid),
        Write(DeviceId, Uuid, Vec<u8>),
        Disconnect(DeviceId),
    }

    /// Records submissions; completions are injected by the tests directly.
    struct RecordingTransport {
        calls: Arc<Mutex<Vec<Call>>>,
        reject_all: bool,
    }

    impl GattTransport for RecordingTransport {
        fn attach(&mut self, _events: crossbeam_channel::Sender<TransportEvent>) {}

        fn connect(&mut self, device: &DeviceId) -> crate::error::Result<()> {
            self.record(Call::Connect(device.clone()))
        }

        fn discover_services(&mut self, device: &DeviceId) -> crate::error::Result<()> {
            self.record(Call::Discover(device.clone()))
        }

        fn request_mtu(&mut self, device: &DeviceId, mtu: u16) -> crate::error::Result<()> {
            self.record(Call::Mtu(device.clone(), mtu))
        }

        fn set_notify(
            &mut self,
            device: &DeviceId,
            characteristic: Uuid,
            enable: bool,
        ) -> crate::error::Result<()> {
            self.record(Call::Notify(device.clone(), characteristic, enable))
        }

        fn read_characteristic(
            &mut self,
            device: &DeviceId,
            characteristic: Uuid,
        ) -> crate::error::Result<()> {
            self.record(Call::Read(device.clone(), characteristic))
        }

        fn write_characteristic(
            &mut self,
            device: &DeviceId,
            characteristic: Uuid,
            value: &[u8],
        ) -> crate::error::Result<()> {
            self.record(Call::Write(device.clone(), characteristic, value.to_vec()))
        }

        fn disconnect(&mut self, device: &DeviceId) -> crate::error::Result<()> {
            self.record(Call::Disconnect(device.clone()))
        }
    }

    impl RecordingTransport {
        fn record(&mut self, call: Call) -> crate::error::Result<()> {
            self.calls.lock().unwrap().push(call);
            if self.reject_all {
                Err(LinkError::Channel("injected rejection".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn test_worker(reject_all: bool) -> (LinkWorker, Arc<Mutex<Vec<Call>>>, Subscription) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let transport = RecordingTransport {
            calls: calls.clone(),
            reject_all,
        };
        let registry = Arc::new(ListenerRegistry::new());
        let sub = registry.register(64);
        let (_cmd_tx, cmd_rx) = bounded(8);
        let (_ev_tx, ev_rx) = bounded(8);
        let worker = LinkWorker::new(
            Box::new(transport),
            registry,
            cmd_rx,
            ev_rx,
            Arc::new(AtomicBool::new(true)),
        );
        (worker, calls, sub)
    }

    fn device() -> DeviceId {
        DeviceId::new("AA:BB:CC:DD:EE:FF")
    }

    fn data_char() -> Uuid {
        Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb)
    }

    fn bring_to_ready(worker: &mut LinkWorker) {
        worker.handle_command(LinkCommand::Connect { device: device() });
        worker.handle_transport_event(TransportEvent::Connected { device: device() });
        worker.handle_transport_event(TransportEvent::ServicesDiscovered {
            device: device(),
            services: vec![ServiceInfo::new(Uuid::from_u128(0xff00), vec![data_char()])],
        });
        assert_eq!(worker.session_state(&device()), Some(SessionState::Ready));
    }

    #[test]
    fn test_connect_flow_reaches_ready() {
        let (mut worker, calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);

        assert_eq!(
            *calls.lock().unwrap(),
            vec![Call::Connect(device()), Call::Discover(device())]
        );
        let events = sub.drain();
        assert!(matches!(events[0], LinkEvent::Connected { .. }));
        assert!(matches!(events[1], LinkEvent::ServicesDiscovered { .. }));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let (mut worker, calls, _sub) = test_worker(false);
        bring_to_ready(&mut worker);

        worker.handle_command(LinkCommand::Connect { device: device() });
        worker.handle_command(LinkCommand::Connect { device: device() });

        let connects = calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, Call::Connect(_)))
            .count();
        assert_eq!(connects, 1, "no duplicate connect attempts");
        assert_eq!(worker.session_state(&device()), Some(SessionState::Ready));
    }

    #[test]
    fn test_operations_serialize_in_enqueue_order() {
        let (mut worker, calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });
        worker.handle_command(LinkCommand::WriteCharacteristic {
            device: device(),
            characteristic: data_char(),
            value: vec![1, 2],
        });

        // The write waits behind the in-flight read.
        assert!(!calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::Write(..))));

        worker.handle_transport_event(TransportEvent::ReadCompleted {
            device: device(),
            characteristic: data_char(),
            value: vec![9],
        });
        assert!(calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::Write(..))));

        worker.handle_transport_event(TransportEvent::WriteCompleted {
            device: device(),
            characteristic: data_char(),
        });

        let events = sub.drain();
        assert!(matches!(events[0], LinkEvent::CharacteristicRead { .. }));
        assert!(matches!(events[1], LinkEvent::CharacteristicWritten { .. }));
    }

    #[test]
    fn test_teardown_suppresses_pending_read_completion() {
        let (mut worker, calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });
        worker.handle_command(LinkCommand::Teardown { device: device() });

        // The read's completion races the teardown and must be dropped.
        worker.handle_transport_event(TransportEvent::ReadCompleted {
            device: device(),
            characteristic: data_char(),
            value: vec![1],
        });
        worker.handle_transport_event(TransportEvent::Disconnected { device: device() });

        let events = sub.drain();
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, LinkEvent::CharacteristicRead { .. })),
            "cancelled read must never surface"
        );
        assert!(events.iter().any(|e| matches!(
            e,
            LinkEvent::OperationCancelled {
                kind: OpKind::Read,
                ..
            }
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            LinkEvent::Disconnected {
                reason: DisconnectReason::Requested,
                ..
            }
        )));
        assert_eq!(worker.session_state(&device()), None);
        assert!(calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::Disconnect(_))));
    }

    #[test]
    fn test_submit_during_teardown_reports_cancellation() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        worker.handle_command(LinkCommand::Teardown { device: device() });
        sub.drain();

        // Session still exists in Disconnecting until the transport confirms;
        // a request landing in that window must not vanish silently.
        assert_eq!(
            worker.session_state(&device()),
            Some(SessionState::Disconnecting)
        );
        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });

        let events = sub.drain();
        assert!(matches!(
            events[0],
            LinkEvent::OperationCancelled {
                kind: OpKind::Read,
                ..
            }
        ));
    }

    #[test]
    fn test_link_lost_cancels_queue_and_destroys_session() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });
        worker.handle_command(LinkCommand::WriteCharacteristic {
            device: device(),
            characteristic: data_char(),
            value: vec![0],
        });

        worker.handle_transport_event(TransportEvent::Disconnected { device: device() });

        let events = sub.drain();
        let cancelled: Vec<OpKind> = events
            .iter()
            .filter_map(|e| match e {
                LinkEvent::OperationCancelled { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(cancelled, vec![OpKind::Read, OpKind::Write]);
        assert!(events.iter().any(|e| matches!(
            e,
            LinkEvent::Disconnected {
                reason: DisconnectReason::LinkLost,
                ..
            }
        )));
        assert_eq!(worker.session_state(&device()), None);
    }

    #[test]
    fn test_operation_failure_is_non_fatal() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_command(LinkCommand::RequestMtu {
            device: device(),
            mtu: 60,
        });
        worker.handle_transport_event(TransportEvent::MtuFailed {
            device: device(),
            reason: "rejected".to_string(),
        });

        let events = sub.drain();
        assert!(events.iter().any(|e| matches!(
            e,
            LinkEvent::OperationFailed {
                kind: OpKind::Mtu,
                ..
            }
        )));
        assert_eq!(worker.session_state(&device()), Some(SessionState::Ready));

        // The session keeps working after the failure.
        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });
        worker.handle_transport_event(TransportEvent::ReadCompleted {
            device: device(),
            characteristic: data_char(),
            value: vec![1],
        });
        assert!(sub
            .drain()
            .iter()
            .any(|e| matches!(e, LinkEvent::CharacteristicRead { .. })));
    }

    #[test]
    fn test_subscribe_failure_leaves_subscription_state_unchanged() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_command(LinkCommand::EnableNotifications {
            device: device(),
            characteristic: data_char(),
        });
        worker.handle_transport_event(TransportEvent::NotifyFailed {
            device: device(),
            characteristic: data_char(),
            reason: "cccd write failed".to_string(),
        });

        assert!(sub.drain().iter().any(|e| matches!(
            e,
            LinkEvent::OperationFailed {
                kind: OpKind::Subscribe,
                ..
            }
        )));
        assert!(worker
            .sessions
            .get(&device())
            .unwrap()
            .notifying()
            .is_empty());
    }

    #[test]
    fn test_operation_without_session_reports_failure() {
        let (mut worker, _calls, sub) = test_worker(false);
        worker.handle_command(LinkCommand::ReadCharacteristic {
            device: device(),
            characteristic: data_char(),
        });

        let events = sub.drain();
        assert!(matches!(
            &events[0],
            LinkEvent::OperationFailed { kind: OpKind::Read, reason, .. } if reason.contains("no live session")
        ));
    }

    #[test]
    fn test_rejected_connect_submission_discards_session() {
        let (mut worker, _calls, sub) = test_worker(true);
        worker.handle_command(LinkCommand::Connect { device: device() });

        let events = sub.drain();
        assert!(matches!(events[0], LinkEvent::ConnectFailed { .. }));
        assert_eq!(worker.session_state(&device()), None);
    }

    #[test]
    fn test_notification_broadcasts_characteristic_changed() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        sub.drain();

        worker.handle_transport_event(TransportEvent::Notification {
            device: device(),
            characteristic: data_char(),
            value: vec![1, 2, 3],
        });

        let events = sub.drain();
        assert!(matches!(
            &events[0],
            LinkEvent::CharacteristicChanged { value, .. } if value == &vec![1, 2, 3]
        ));
    }

    #[test]
    fn test_sessions_are_independent() {
        let (mut worker, _calls, sub) = test_worker(false);
        bring_to_ready(&mut worker);
        let other = DeviceId::new("11:22:33:44:55:66");
        worker.handle_command(LinkCommand::Connect {
            device: other.clone(),
        });
        sub.drain();

        // Tearing down one device leaves the other connecting.
        worker.handle_command(LinkCommand::Teardown { device: device() });
        assert_eq!(
            worker.session_state(&other),
            Some(SessionState::Connecting)
        );
    }

    #[test]
    fn test_shutdown_tears_down_all_sessions() {
        let (mut worker, calls, _sub) = test_worker(false);
        bring_to_ready(&mut worker);

        worker.handle_command(LinkCommand::Shutdown);
        assert!(!worker.running.load(Ordering::SeqCst));
        assert!(calls
            .lock()
            .unwrap()
            .iter()
            .any(|c| matches!(c, Call::Disconnect(_))));
    }
}
