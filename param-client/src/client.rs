//! ParamSyncClient - the main interface for mavparam.
//!
//! This module provides [`ParamSyncClient`], the API applications use to keep
//! a local parameter store in step with a vehicle.
//!
//! # Architecture
//!
//! The client owns the two link queues and spawns the engine task. The engine
//! drives a pure state machine (from mavparam-core) and interprets its
//! actions; the link runs on its own task and only touches the queues.
//!
//! ```text
//! Application → ParamSyncClient ──requests──▶ engine task ──▶ outbound queue ──▶ link
//!                    ▲                           │    ▲                            │
//!                    └──── status / events ──────┘    └──────── inbound queue ◀────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use mavparam_client::{ParamSyncClient, SimulatedVehicle};
//! use mavparam_core::{MemoryParameterStore, SyncConfig};
//!
//! let link = SimulatedVehicle::demo(Target::default());
//! let mut client = ParamSyncClient::new(SyncConfig::default(), MemoryParameterStore::new(), link);
//!
//! client.start().await?;
//! client.wait_for_state(|s| s.state.is_quiescent(), Duration::from_secs(5)).await?;
//! client.request_refresh()?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use mavparam_core::{
    Campaign, ConnectionState, EngineEvent, ParameterStore, Request, SyncConfig, SyncMachine,
};
use mavparam_types::{MemoryAreaAction, MemoryAreaRequest, OutboundCommand};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use crate::engine::{CampaignSlot, Engine, EngineStatus};
use crate::queue::BoundedQueue;
use crate::transport::{InboundQueue, LinkError, LinkReceiver, OutboundQueue};

/// Capacity of the event broadcast channel.
const EVENT_CAPACITY: usize = 64;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Link error.
    #[error("link error: {0}")]
    Link(#[from] LinkError),

    /// Configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The client is not running.
    #[error("client not running ({0})")]
    NotRunning(Lifecycle),

    /// `start()` is only valid once, from `Created`.
    #[error("cannot start client in lifecycle {0}")]
    AlreadyStarted(Lifecycle),

    /// The outbound queue is full.
    #[error("transmit buffer full")]
    TransmitBufferFull,

    /// Requests are only accepted while connected and idle.
    #[error("engine busy or disconnected (state: {state})")]
    NotQuiescent {
        /// State at the time of the request.
        state: ConnectionState,
    },

    /// A memory-area operation is already in flight.
    #[error("memory-area operation already pending")]
    AreaOperationPending,

    /// Another campaign was requested and has not finished yet.
    #[error("{0} campaign already pending")]
    CampaignPending(Campaign),

    /// The request channel is full.
    #[error("request queue full")]
    RequestQueueFull,

    /// A wait ran out of time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Client lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, engine not spawned.
    Created,
    /// Engine task running.
    Running,
    /// Shutdown in progress.
    Stopping,
    /// Engine task finished; terminal.
    Stopped,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Lifecycle::Created => "created",
            Lifecycle::Running => "running",
            Lifecycle::Stopping => "stopping",
            Lifecycle::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Parameter synchronisation client.
///
/// Generic over the parameter store `S` and the link `L`.
pub struct ParamSyncClient<S, L> {
    config: SyncConfig,
    store: Arc<Mutex<S>>,
    link: Arc<L>,
    inbound: InboundQueue,
    outbound: OutboundQueue,
    lifecycle: Lifecycle,
    requests: Option<mpsc::Sender<Request>>,
    status_tx: Option<watch::Sender<EngineStatus>>,
    status: watch::Receiver<EngineStatus>,
    events: broadcast::Sender<EngineEvent>,
    shutdown: Arc<AtomicBool>,
    campaign_slot: Arc<CampaignSlot>,
    task: Option<JoinHandle<()>>,
}

impl<S, L> ParamSyncClient<S, L>
where
    S: ParameterStore + Send + 'static,
    L: LinkReceiver,
{
    /// Create a client. Nothing runs until [`start`](Self::start).
    pub fn new(config: SyncConfig, store: S, link: L) -> Self {
        let (status_tx, status) = watch::channel(EngineStatus::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inbound: Arc::new(BoundedQueue::inbound(config.inbound_capacity)),
            outbound: Arc::new(BoundedQueue::outbound(config.outbound_capacity)),
            config,
            store: Arc::new(Mutex::new(store)),
            link: Arc::new(link),
            lifecycle: Lifecycle::Created,
            requests: None,
            status_tx: Some(status_tx),
            status,
            events,
            shutdown: Arc::new(AtomicBool::new(false)),
            campaign_slot: Arc::new(CampaignSlot::default()),
            task: None,
        }
    }

    /// Start the link and spawn the engine task.
    pub async fn start(&mut self) -> Result<(), ClientError> {
        if self.lifecycle != Lifecycle::Created {
            return Err(ClientError::AlreadyStarted(self.lifecycle));
        }
        self.config.validate().map_err(ClientError::InvalidConfig)?;
        self.link
            .start(Arc::clone(&self.inbound), Arc::clone(&self.outbound))
            .await?;
        let Some(status_tx) = self.status_tx.take() else {
            return Err(ClientError::AlreadyStarted(self.lifecycle));
        };

        let (request_tx, request_rx) = mpsc::channel(self.config.request_capacity);
        let engine = Engine {
            machine: SyncMachine::new(self.config.clone()),
            store: Arc::clone(&self.store),
            link: Arc::clone(&self.link),
            inbound: Arc::clone(&self.inbound),
            outbound: Arc::clone(&self.outbound),
            requests: request_rx,
            status: status_tx,
            events: self.events.clone(),
            shutdown: Arc::clone(&self.shutdown),
            campaign_slot: Arc::clone(&self.campaign_slot),
            holding_campaign: false,
            poll_interval: self.config.poll_interval(),
            shutdown_timeout: self.config.shutdown_timeout(),
        };
        self.task = Some(tokio::spawn(engine.run()));
        self.requests = Some(request_tx);
        self.lifecycle = Lifecycle::Running;
        tracing::info!("Parameter sync client started for {}", self.config.target());
        Ok(())
    }

    /// Stop the engine and the link.
    ///
    /// Cooperative: the engine notices within one poll interval, then waits
    /// at most the shutdown timeout for the link. Idempotent.
    pub async fn stop(&mut self) -> Result<(), ClientError> {
        match self.lifecycle {
            Lifecycle::Stopped | Lifecycle::Stopping => return Ok(()),
            Lifecycle::Created => {
                self.lifecycle = Lifecycle::Stopped;
                return Ok(());
            }
            Lifecycle::Running => {}
        }

        self.lifecycle = Lifecycle::Stopping;
        self.shutdown.store(true, Ordering::Release);
        self.requests = None;

        if let Some(mut task) = self.task.take() {
            let bound = self.config.shutdown_timeout() * 2 + self.config.poll_interval();
            match tokio::time::timeout(bound, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Engine task failed: {}", e),
                Err(_) => {
                    tracing::error!("Engine did not stop within {:?}, aborting", bound);
                    task.abort();
                }
            }
        }

        self.lifecycle = Lifecycle::Stopped;
        tracing::info!("Parameter sync client stopped");
        Ok(())
    }

    /// Current lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Latest engine status.
    pub fn status(&self) -> EngineStatus {
        *self.status.borrow()
    }

    /// Latest connection state.
    pub fn state(&self) -> ConnectionState {
        self.status().state
    }

    /// Receive engine events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    /// Shared handle to the parameter store.
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }

    /// The link this client was built with.
    pub fn link(&self) -> &L {
        &self.link
    }

    /// Configuration in use.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Queue a raw command for transmission.
    pub fn submit_outbound(&self, command: OutboundCommand) -> Result<(), ClientError> {
        self.ensure_running()?;
        self.outbound
            .push(command)
            .map_err(|_| ClientError::TransmitBufferFull)
    }

    /// Re-read every parameter from the vehicle.
    pub fn request_refresh(&self) -> Result<(), ClientError> {
        self.request(Request::Refresh)
    }

    /// Push locally changed parameters to the vehicle.
    pub fn request_write_changed(&self) -> Result<(), ClientError> {
        self.request(Request::WriteChanged)
    }

    /// Write, read or clear one memory area.
    pub fn request_memory_area(
        &self,
        action: MemoryAreaAction,
        area_id: u8,
    ) -> Result<(), ClientError> {
        self.request(Request::MemoryArea(MemoryAreaRequest::new(action, area_id)))
    }

    /// Forget that the store is synchronised.
    pub fn invalidate_sync(&self) -> Result<(), ClientError> {
        self.request(Request::InvalidateSync)
    }

    fn ensure_running(&self) -> Result<(), ClientError> {
        if self.lifecycle == Lifecycle::Running {
            Ok(())
        } else {
            Err(ClientError::NotRunning(self.lifecycle))
        }
    }

    /// Campaign requests claim the campaign slot before they are sent, so a
    /// second one is refused here even if the status snapshot still says
    /// `Connected`.
    fn request(&self, request: Request) -> Result<(), ClientError> {
        self.ensure_running()?;
        let reserved = request.campaign().is_some();
        if reserved {
            if let Err(pending) = self.campaign_slot.reserve(request) {
                return Err(match (request, pending.campaign()) {
                    (Request::MemoryArea(_), Some(Campaign::MemoryArea(_))) => {
                        ClientError::AreaOperationPending
                    }
                    (_, Some(campaign)) => ClientError::CampaignPending(campaign),
                    (_, None) => ClientError::NotQuiescent {
                        state: self.state(),
                    },
                });
            }
            let state = self.state();
            if !state.is_quiescent() {
                self.campaign_slot.release();
                return Err(ClientError::NotQuiescent { state });
            }
        }

        let sent = match self.requests.as_ref() {
            Some(sender) => sender.try_send(request).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => ClientError::RequestQueueFull,
                mpsc::error::TrySendError::Closed(_) => ClientError::NotRunning(self.lifecycle),
            }),
            None => Err(ClientError::NotRunning(self.lifecycle)),
        };
        if sent.is_err() && reserved {
            self.campaign_slot.release();
        }
        sent
    }

    /// Wait until the published status satisfies `pred`.
    pub async fn wait_for_state<F>(
        &self,
        pred: F,
        timeout: Duration,
    ) -> Result<EngineStatus, ClientError>
    where
        F: Fn(&EngineStatus) -> bool,
    {
        let mut status = self.status.clone();
        let wait = async {
            loop {
                let current = *status.borrow_and_update();
                if pred(&current) {
                    return Ok(current);
                }
                if status.changed().await.is_err() {
                    // Engine gone; the final snapshot is all there will be.
                    let last = *status.borrow();
                    return if pred(&last) {
                        Ok(last)
                    } else {
                        Err(ClientError::NotRunning(self.lifecycle))
                    };
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| ClientError::Timeout(timeout))?
    }
}

impl<S, L> Drop for ParamSyncClient<S, L> {
    fn drop(&mut self) {
        // Let a still-running engine wind down on its own.
        self.shutdown.store(true, Ordering::Release);
    }
}

impl<S, L> fmt::Debug for ParamSyncClient<S, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParamSyncClient")
            .field("target", &self.config.target())
            .field("lifecycle", &self.lifecycle)
            .field("status", &*self.status.borrow())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockLink, SimulatedVehicle};
    use mavparam_core::{MemoryParameterStore, Parameter};
    use mavparam_types::{
        CommandAck, Heartbeat, InboundMessage, MemoryAreaResult, ParamType, ParamValue, Target,
        MAV_CMD_PREFLIGHT_STORAGE,
    };

    const VEHICLE: Target = Target::new(1, 1);
    const WAIT: Duration = Duration::from_secs(30);

    fn mock_client() -> (ParamSyncClient<MemoryParameterStore, MockLink>, MockLink) {
        let link = MockLink::new();
        let client =
            ParamSyncClient::new(SyncConfig::default(), MemoryParameterStore::new(), link.clone());
        (client, link)
    }

    fn sim_client(
        vehicle: &SimulatedVehicle,
    ) -> ParamSyncClient<MemoryParameterStore, SimulatedVehicle> {
        ParamSyncClient::new(
            SyncConfig::default(),
            MemoryParameterStore::new(),
            vehicle.clone(),
        )
    }

    async fn connected<S, L>(client: &ParamSyncClient<S, L>)
    where
        S: ParameterStore + Send + 'static,
        L: LinkReceiver,
    {
        client
            .wait_for_state(|s| s.state == ConnectionState::Connected, WAIT)
            .await
            .unwrap();
    }

    async fn next_event(events: &mut broadcast::Receiver<EngineEvent>) -> EngineEvent {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    async fn event_matching<F>(events: &mut broadcast::Receiver<EngineEvent>, pred: F) -> EngineEvent
    where
        F: Fn(&EngineEvent) -> bool,
    {
        loop {
            let event = next_event(events).await;
            if pred(&event) {
                return event;
            }
        }
    }

    // ===========================================
    // Lifecycle
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn calls_before_start_fail_fast() {
        let (client, _link) = mock_client();

        assert_eq!(client.lifecycle(), Lifecycle::Created);
        assert_eq!(client.state(), ConnectionState::NotStarted);
        assert!(matches!(
            client.request_refresh(),
            Err(ClientError::NotRunning(Lifecycle::Created))
        ));
        assert!(matches!(
            client.submit_outbound(OutboundCommand::ParamRequestList { target: VEHICLE }),
            Err(ClientError::NotRunning(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn start_runs_engine_and_waits_for_heartbeat() {
        let (mut client, link) = mock_client();

        client.start().await.unwrap();

        assert_eq!(client.lifecycle(), Lifecycle::Running);
        assert!(link.is_started());
        let status = client
            .wait_for_state(|s| s.state == ConnectionState::NotConnected, WAIT)
            .await
            .unwrap();
        assert!(!status.link_up);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let (mut client, _link) = mock_client();
        client.start().await.unwrap();

        assert!(matches!(
            client.start().await,
            Err(ClientError::AlreadyStarted(Lifecycle::Running))
        ));
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn link_start_failure_is_reported() {
        let (mut client, link) = mock_client();
        link.fail_next_start("no such port");

        let result = client.start().await;

        assert!(matches!(result, Err(ClientError::Link(LinkError::StartFailed(_)))));
        assert_eq!(client.lifecycle(), Lifecycle::Created);
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_config_is_rejected() {
        let config = SyncConfig {
            outbound_capacity: 0,
            ..SyncConfig::default()
        };
        let mut client = ParamSyncClient::new(config, MemoryParameterStore::new(), MockLink::new());

        assert!(matches!(
            client.start().await,
            Err(ClientError::InvalidConfig(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_bounded_and_final() {
        let (mut client, link) = mock_client();
        link.hang_on_join();
        client.start().await.unwrap();

        let started = tokio::time::Instant::now();
        client.stop().await.unwrap();

        assert!(started.elapsed() <= Duration::from_secs(6));
        assert!(link.is_stopped());
        assert_eq!(client.lifecycle(), Lifecycle::Stopped);
        assert_eq!(client.state(), ConnectionState::NotStarted);
        assert!(matches!(
            client.request_refresh(),
            Err(ClientError::NotRunning(Lifecycle::Stopped))
        ));
        assert!(client.stop().await.is_ok());
    }

    // ===========================================
    // Requests and Outbound Traffic
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn refresh_while_disconnected_is_rejected() {
        let (mut client, link) = mock_client();
        client.start().await.unwrap();
        client
            .wait_for_state(|s| s.state == ConnectionState::NotConnected, WAIT)
            .await
            .unwrap();

        assert!(matches!(
            client.request_refresh(),
            Err(ClientError::NotQuiescent {
                state: ConnectionState::NotConnected
            })
        ));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(link.sent().is_empty());
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn full_transmit_buffer_is_reported() {
        let (mut client, _link) = mock_client();
        client.start().await.unwrap();

        let command = OutboundCommand::ParamRequestRead {
            target: VEHICLE,
            index: 0,
        };
        for _ in 0..client.config().outbound_capacity {
            client.submit_outbound(command.clone()).unwrap();
        }

        assert!(matches!(
            client.submit_outbound(command),
            Err(ClientError::TransmitBufferFull)
        ));
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn memory_area_over_mock_link() {
        let (mut client, link) = mock_client();
        let mut events = client.subscribe();
        client.start().await.unwrap();
        link.inject(InboundMessage::Heartbeat(Heartbeat::new(VEHICLE)));
        connected(&client).await;

        client
            .request_memory_area(MemoryAreaAction::Write, 2)
            .unwrap();
        client
            .wait_for_state(|s| s.state == ConnectionState::WritingMemArea, WAIT)
            .await
            .unwrap();
        assert!(matches!(
            client.request_memory_area(MemoryAreaAction::Write, 2),
            Err(ClientError::AreaOperationPending)
        ));
        let sent = link.take_sent();
        assert!(matches!(
            sent.as_slice(),
            [OutboundCommand::MemoryArea { command, .. }] if command.area_id == 2
        ));

        link.inject(InboundMessage::CommandAck(CommandAck {
            source: VEHICLE,
            command: MAV_CMD_PREFLIGHT_STORAGE,
            result: 0,
        }));
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::MemoryAreaCompleted(_))
        })
        .await;

        let expected = MemoryAreaResult {
            action: MemoryAreaAction::Write,
            area_id: 2,
            result: 0,
        };
        assert_eq!(event, EngineEvent::MemoryAreaCompleted(expected));
        assert_eq!(client.store().lock().await.area_results(), &[expected]);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn back_to_back_requests_are_refused_before_the_engine_runs() {
        let (mut client, link) = mock_client();
        let mut events = client.subscribe();
        client.start().await.unwrap();
        link.inject(InboundMessage::Heartbeat(Heartbeat::new(VEHICLE)));
        connected(&client).await;

        // No await between the calls: the engine has not seen the first yet.
        client
            .request_memory_area(MemoryAreaAction::Write, 2)
            .unwrap();
        assert!(matches!(
            client.request_memory_area(MemoryAreaAction::Clear, 3),
            Err(ClientError::AreaOperationPending)
        ));
        assert!(matches!(
            client.request_refresh(),
            Err(ClientError::CampaignPending(Campaign::MemoryArea(
                MemoryAreaAction::Write
            )))
        ));

        client
            .wait_for_state(|s| s.state == ConnectionState::WritingMemArea, WAIT)
            .await
            .unwrap();
        link.inject(InboundMessage::CommandAck(CommandAck {
            source: VEHICLE,
            command: MAV_CMD_PREFLIGHT_STORAGE,
            result: 0,
        }));
        event_matching(&mut events, |e| matches!(e, EngineEvent::MemoryAreaCompleted(_))).await;
        client
            .wait_for_state(|s| s.state == ConnectionState::Connected, WAIT)
            .await
            .unwrap();

        // Slot is free again once the campaign is over.
        client
            .request_memory_area(MemoryAreaAction::Clear, 3)
            .unwrap();
        client
            .wait_for_state(|s| s.state == ConnectionState::ClearingMemArea, WAIT)
            .await
            .unwrap();
        let sent = link.take_sent();
        let areas: Vec<_> = sent
            .iter()
            .filter_map(|c| match c {
                OutboundCommand::MemoryArea { command, .. } => Some(command.area_id),
                _ => None,
            })
            .collect();
        assert_eq!(areas, vec![2, 3]);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn foreign_parameters_are_filtered() {
        let (mut client, link) = mock_client();
        client.start().await.unwrap();
        link.inject(InboundMessage::Heartbeat(Heartbeat::new(VEHICLE)));
        connected(&client).await;

        link.inject(InboundMessage::ParamValue(ParamValue {
            source: Target::new(1, 154),
            param_index: 0,
            param_count: 1,
            param_id: "CAM_TRIGG".into(),
            value: 1.0,
            param_type: ParamType::Uint8,
            is_last: true,
        }));
        tokio::time::sleep(Duration::from_millis(500)).await;

        assert!(client.store().lock().await.is_empty());
        client.stop().await.unwrap();
    }

    // ===========================================
    // End to End Against the Simulated Vehicle
    // ===========================================

    #[tokio::test(start_paused = true)]
    async fn refresh_reads_every_parameter() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let mut client = sim_client(&vehicle);
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;

        client.request_refresh().unwrap();
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::SyncComplete { .. })
        })
        .await;

        assert_eq!(
            event,
            EngineEvent::SyncComplete {
                campaign: Campaign::ReadAll
            }
        );
        let store = client.store().lock().await;
        assert_eq!(store.len(), vehicle.param_count());
        assert!(store.iter().all(|p| p.synced));
        assert_eq!(store.get("RTL_ALT").map(|p| p.value), Some(1500.0));
        drop(store);
        assert!(client.status().synchronised);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_repairs_lost_parameters() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        vehicle.lose_next(2);
        vehicle.lose_next(5);
        let mut client = sim_client(&vehicle);
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;

        client.request_refresh().unwrap();
        event_matching(&mut events, |e| matches!(e, EngineEvent::SyncComplete { .. })).await;

        assert_eq!(vehicle.activity().read_requests, vec![2, 5]);
        let store = client.store().lock().await;
        assert!(store.iter().all(|p| p.synced));
        assert_eq!(store.iter().count(), vehicle.param_count());
        drop(store);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn write_changed_pushes_local_edits() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let mut client = sim_client(&vehicle);
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;
        client.request_refresh().unwrap();
        event_matching(&mut events, |e| matches!(e, EngineEvent::SyncComplete { .. })).await;
        client
            .wait_for_state(|s| s.state.is_quiescent() && s.synchronised, WAIT)
            .await
            .unwrap();

        {
            let mut store = client.store().lock().await;
            store.set_local("RTL_ALT", 2500.0).unwrap();
            store.set_local("WPNAV_SPEED", 750.0).unwrap();
        }
        client.request_write_changed().unwrap();
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::SyncComplete { .. })
        })
        .await;

        assert_eq!(
            event,
            EngineEvent::SyncComplete {
                campaign: Campaign::WriteChanged
            }
        );
        assert_eq!(vehicle.value("RTL_ALT"), Some(2500.0));
        assert_eq!(vehicle.value("WPNAV_SPEED"), Some(750.0));
        assert_eq!(vehicle.activity().writes.len(), 2);
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_reads_are_abandoned() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let store = MemoryParameterStore::with_parameters(
            (0..3).map(|i| Parameter::new(i, &format!("P{}", i), 0.0, ParamType::Real32)),
        );
        let mut client = ParamSyncClient::new(SyncConfig::default(), store, vehicle.clone());
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;
        vehicle.set_mute_replies(true);

        client.request_refresh().unwrap();
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::SyncAbandoned { .. })
        })
        .await;

        assert_eq!(
            event,
            EngineEvent::SyncAbandoned {
                campaign: Campaign::ReadAll,
                attempts: 3
            }
        );
        assert_eq!(client.state(), ConnectionState::Connected);
        assert_eq!(
            client.store().lock().await.abandoned(),
            &[Campaign::ReadAll]
        );
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_vehicle_disconnects() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let mut client = sim_client(&vehicle);
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;

        vehicle.set_silent(true);
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::Disconnected { .. })
        })
        .await;

        assert_eq!(event, EngineEvent::Disconnected { abandoned: None });
        assert_eq!(client.state(), ConnectionState::NotConnected);
        assert!(!client.status().link_up);

        vehicle.set_silent(false);
        connected(&client).await;
        client.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn lost_storage_ack_times_out() {
        let vehicle = SimulatedVehicle::new(VEHICLE);
        vehicle.set_storage_result(None);
        let mut client = sim_client(&vehicle);
        let mut events = client.subscribe();
        client.start().await.unwrap();
        connected(&client).await;

        client
            .request_memory_area(MemoryAreaAction::Clear, 1)
            .unwrap();
        let event = event_matching(&mut events, |e| {
            matches!(e, EngineEvent::MemoryAreaTimedOut(_))
        })
        .await;

        assert_eq!(
            event,
            EngineEvent::MemoryAreaTimedOut(MemoryAreaRequest::new(MemoryAreaAction::Clear, 1))
        );
        assert_eq!(client.state(), ConnectionState::Connected);
        client.stop().await.unwrap();
    }
}
