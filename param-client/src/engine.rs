//! The engine loop.
//!
//! One task owns the [`SyncMachine`]. Each iteration it:
//! 1. samples the shutdown flag
//! 2. applies queued requests
//! 3. waits up to the poll interval for one inbound message and feeds it in
//! 4. polls the machine
//! 5. executes the resulting actions and publishes a status snapshot
//!
//! Campaign requests pass through a [`CampaignSlot`] that the facade fills
//! before sending. The engine empties it when it rejects the request, or
//! once a snapshot showing the campaign over has been published.
//!
//! On exit it stops the link and waits for it, bounded by the shutdown
//! timeout, before publishing `NotStarted`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use mavparam_core::{Action, ConnectionState, EngineEvent, ParameterStore, Request, SyncMachine};
use tokio::sync::{broadcast, mpsc, watch, Mutex};

use crate::transport::{InboundQueue, LinkReceiver, OutboundQueue};

/// Snapshot of the engine, published after every cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStatus {
    /// Current connection state.
    pub state: ConnectionState,
    /// Whether heartbeats are arriving.
    pub link_up: bool,
    /// Whether the last campaign left every parameter in sync.
    pub synchronised: bool,
}

/// The single campaign request a caller may have outstanding.
#[derive(Debug, Default)]
pub(crate) struct CampaignSlot(std::sync::Mutex<Option<Request>>);

impl CampaignSlot {
    /// Claim the slot, or return the request already holding it.
    pub(crate) fn reserve(&self, request: Request) -> Result<(), Request> {
        let mut slot = self.lock();
        match *slot {
            Some(pending) => Err(pending),
            None => {
                *slot = Some(request);
                Ok(())
            }
        }
    }

    pub(crate) fn release(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<Request>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Everything the engine task owns.
pub(crate) struct Engine<S, L> {
    pub(crate) machine: SyncMachine,
    pub(crate) store: Arc<Mutex<S>>,
    pub(crate) link: Arc<L>,
    pub(crate) inbound: InboundQueue,
    pub(crate) outbound: OutboundQueue,
    pub(crate) requests: mpsc::Receiver<Request>,
    pub(crate) status: watch::Sender<EngineStatus>,
    pub(crate) events: broadcast::Sender<EngineEvent>,
    pub(crate) shutdown: Arc<AtomicBool>,
    pub(crate) campaign_slot: Arc<CampaignSlot>,
    /// An accepted campaign request is still running.
    pub(crate) holding_campaign: bool,
    pub(crate) poll_interval: Duration,
    pub(crate) shutdown_timeout: Duration,
}

fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

impl<S, L> Engine<S, L>
where
    S: ParameterStore + Send + 'static,
    L: LinkReceiver,
{
    /// Run until the shutdown flag is raised.
    pub(crate) async fn run(mut self) {
        self.machine.start();
        self.publish();

        while !self.shutdown.load(Ordering::Acquire) {
            self.cycle().await;
        }

        tracing::info!("Sync engine stopping");
        self.machine.stop();
        self.holding_campaign = false;
        self.campaign_slot.release();
        self.link.stop();
        if let Err(e) = self.link.join(self.shutdown_timeout).await {
            tracing::warn!("Link did not shut down cleanly: {}", e);
        }
        self.publish();
        tracing::info!("Sync engine stopped");
    }

    async fn cycle(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            match self.machine.handle_request(request, now()) {
                Ok(()) => {
                    if request.campaign().is_some() {
                        self.holding_campaign = true;
                    }
                }
                Err(reason) => {
                    tracing::debug!("Rejecting stale request {:?}: {}", request, reason);
                    self.campaign_slot.release();
                    let _ = self
                        .events
                        .send(EngineEvent::RequestRejected { request, reason });
                }
            }
        }

        if let Some(message) = self.inbound.pop(self.poll_interval).await {
            let actions = {
                let mut store = self.store.lock().await;
                self.machine.handle_message(message, now(), &mut *store)
            };
            self.execute(actions);
        }

        let actions = {
            let mut store = self.store.lock().await;
            self.machine.poll(now(), &mut *store)
        };
        self.execute(actions);
        self.publish();
    }

    fn execute(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(command) => {
                    let kind = command.kind();
                    if let Err(e) = self.outbound.push(command) {
                        // The campaign deadline covers the lost command.
                        tracing::warn!("Dropping {}: {}", kind, e);
                    }
                }
                Action::Emit(event) => {
                    // No subscribers is fine.
                    let _ = self.events.send(event);
                }
            }
        }
    }

    fn publish(&mut self) {
        let snapshot = EngineStatus {
            state: self.machine.state(),
            link_up: self.machine.link_up(),
            synchronised: self.machine.is_synchronised(),
        };
        self.status.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });

        // Callers that see the slot free also see this snapshot.
        if self.holding_campaign && snapshot.state.campaign().is_none() {
            self.holding_campaign = false;
            self.campaign_slot.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BoundedQueue;
    use crate::transport::MockLink;
    use mavparam_core::{MemoryParameterStore, RequestError, SyncConfig};
    use mavparam_types::{
        CommandAck, Heartbeat, InboundMessage, MemoryAreaAction, MemoryAreaRequest, Target,
        MAV_CMD_PREFLIGHT_STORAGE,
    };

    const VEHICLE: Target = Target::new(1, 1);

    struct Harness {
        engine: Engine<MemoryParameterStore, MockLink>,
        requests: mpsc::Sender<Request>,
        events: broadcast::Receiver<EngineEvent>,
        _status: watch::Receiver<EngineStatus>,
        slot: Arc<CampaignSlot>,
        inbound: InboundQueue,
    }

    fn harness() -> Harness {
        let config = SyncConfig::default();
        let (requests, request_rx) = mpsc::channel(config.request_capacity);
        let (status_tx, status) = watch::channel(EngineStatus::default());
        let (events_tx, events) = broadcast::channel(16);
        let slot = Arc::new(CampaignSlot::default());
        let inbound: InboundQueue = Arc::new(BoundedQueue::inbound(config.inbound_capacity));
        let mut engine = Engine {
            machine: SyncMachine::new(config.clone()),
            store: Arc::new(Mutex::new(MemoryParameterStore::new())),
            link: Arc::new(MockLink::new()),
            inbound: Arc::clone(&inbound),
            outbound: Arc::new(BoundedQueue::outbound(config.outbound_capacity)),
            requests: request_rx,
            status: status_tx,
            events: events_tx,
            shutdown: Arc::new(AtomicBool::new(false)),
            campaign_slot: Arc::clone(&slot),
            holding_campaign: false,
            poll_interval: config.poll_interval(),
            shutdown_timeout: config.shutdown_timeout(),
        };
        engine.machine.start();
        Harness {
            engine,
            requests,
            events,
            _status: status,
            slot,
            inbound,
        }
    }

    fn submit(h: &Harness, request: Request) {
        h.slot.reserve(request).unwrap();
        h.requests.try_send(request).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_request_is_reported_and_frees_the_slot() {
        let mut h = harness();
        submit(&h, Request::Refresh);

        h.engine.cycle().await;

        assert_eq!(
            h.events.try_recv().unwrap(),
            EngineEvent::RequestRejected {
                request: Request::Refresh,
                reason: RequestError::NotQuiescent {
                    state: ConnectionState::NotConnected
                },
            }
        );
        assert!(h.slot.reserve(Request::WriteChanged).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn slot_is_held_until_the_campaign_is_published_over() {
        let mut h = harness();
        h.inbound
            .push(InboundMessage::Heartbeat(Heartbeat::new(VEHICLE)))
            .unwrap();
        h.engine.cycle().await;
        assert_eq!(h.engine.machine.state(), ConnectionState::Connected);

        let write = Request::MemoryArea(MemoryAreaRequest::new(MemoryAreaAction::Write, 2));
        submit(&h, write);
        h.engine.cycle().await;
        assert_eq!(h.engine.machine.state(), ConnectionState::WritingMemArea);
        assert_eq!(h.slot.reserve(Request::Refresh), Err(write));

        h.inbound
            .push(InboundMessage::CommandAck(CommandAck {
                source: VEHICLE,
                command: MAV_CMD_PREFLIGHT_STORAGE,
                result: 0,
            }))
            .unwrap();
        h.engine.cycle().await;

        assert_eq!(h.engine.machine.state(), ConnectionState::Connected);
        assert!(h.slot.reserve(Request::Refresh).is_ok());
    }
}
