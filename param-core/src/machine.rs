//! The parameter synchronisation state machine.
//!
//! [`SyncMachine`] owns the [`ConnectionState`], the heartbeat monitor, the
//! retry counter and the single in-flight reference (pending read, pending
//! write or pending memory-area request). It is driven by three inputs:
//!
//! - [`SyncMachine::handle_request`] - an external trigger, accepted only
//!   while quiescent
//! - [`SyncMachine::handle_message`] - one decoded inbound message
//! - [`SyncMachine::poll`] - once per loop iteration: heartbeat staleness,
//!   then state dispatch and deadline check
//!
//! Only a relevant reply counts as progress: any value of the bulk transfer,
//! the re-requested index, or the echo of the pending write. Anything else
//! updates the store but leaves the retry budget alone.
//!
//! It performs no I/O. Outbound commands and application events come back as
//! [`Action`]s; the parameter store is consulted through the
//! [`ParameterStore`] trait. Time is always passed in, which keeps every
//! transition deterministic under test.

use std::time::Instant;

use mavparam_types::{
    is_storage_command, CommandAck, InboundMessage, MemoryAreaRequest, MemoryAreaResult,
    OutboundCommand, ParamValue, Target,
};

use crate::config::SyncConfig;
use crate::heartbeat::HeartbeatMonitor;
use crate::retry::{RetryCounter, RetryOutcome};
use crate::state::{Action, Campaign, ConnectionState, EngineEvent, Request, RequestError};
use crate::store::ParameterStore;

/// The parameter being written, kept to correlate the vehicle's echo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    /// Index in the store.
    pub index: u16,
    /// Parameter name, matched against the echoed PARAM_VALUE.
    pub param_id: String,
}

/// Connection/synchronisation state machine.
#[derive(Debug)]
pub struct SyncMachine {
    config: SyncConfig,
    target: Target,
    state: ConnectionState,
    heartbeat: HeartbeatMonitor,
    retry: RetryCounter,
    pending_read: Option<u16>,
    pending_write: Option<PendingWrite>,
    pending_area: Option<MemoryAreaRequest>,
    synchronised: bool,
}

impl SyncMachine {
    /// Create a machine in `NotStarted`.
    pub fn new(config: SyncConfig) -> Self {
        Self {
            target: config.target(),
            heartbeat: HeartbeatMonitor::new(config.heartbeat_timeout()),
            retry: RetryCounter::new(config.max_attempts),
            config,
            state: ConnectionState::NotStarted,
            pending_read: None,
            pending_write: None,
            pending_area: None,
            synchronised: false,
        }
    }

    /// Enter `NotConnected` and wait for a heartbeat.
    pub fn start(&mut self) {
        self.reset();
        self.state = ConnectionState::NotConnected;
        tracing::info!("Sync engine started, waiting for heartbeat from {}", self.target);
    }

    /// Return to `NotStarted`, abandoning anything in flight.
    pub fn stop(&mut self) {
        if let Some(campaign) = self.state.campaign() {
            tracing::info!("Abandoning {} campaign on shutdown", campaign);
        }
        self.reset();
        self.state = ConnectionState::NotStarted;
    }

    fn reset(&mut self) {
        self.heartbeat.reset();
        self.retry.disarm();
        self.pending_read = None;
        self.pending_write = None;
        self.pending_area = None;
        self.synchronised = false;
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether heartbeats are arriving.
    pub fn link_up(&self) -> bool {
        self.heartbeat.link_up()
    }

    /// Whether the last campaign left the store fully in sync.
    pub fn is_synchronised(&self) -> bool {
        self.synchronised
    }

    /// Vehicle identity this machine synchronises with.
    pub fn target(&self) -> Target {
        self.target
    }

    /// Memory-area request awaiting acknowledgement.
    pub fn pending_area(&self) -> Option<MemoryAreaRequest> {
        self.pending_area
    }

    /// Index re-requested during missing-parameter repair.
    pub fn pending_read(&self) -> Option<u16> {
        self.pending_read
    }

    /// Parameter awaiting its echo.
    pub fn pending_write(&self) -> Option<&PendingWrite> {
        self.pending_write.as_ref()
    }

    /// Deadline expiries counted in the current campaign.
    pub fn attempts(&self) -> u32 {
        self.retry.attempts()
    }

    /// Apply an external trigger.
    ///
    /// Rejected requests leave the machine untouched.
    pub fn handle_request(&mut self, request: Request, now: Instant) -> Result<(), RequestError> {
        if let Request::InvalidateSync = request {
            self.synchronised = false;
            return Ok(());
        }
        if matches!(request, Request::MemoryArea(_)) && self.pending_area.is_some() {
            return Err(RequestError::AreaOperationPending);
        }
        if !self.state.is_quiescent() {
            return Err(RequestError::NotQuiescent { state: self.state });
        }

        match request {
            Request::Refresh => {
                self.retry.arm(now, self.config.reply_timeout());
                self.state = ConnectionState::ReadAll;
            }
            Request::WriteChanged => {
                self.retry.arm(now, self.config.reply_timeout());
                self.state = ConnectionState::WriteChanged;
            }
            Request::MemoryArea(area) => {
                self.pending_area = Some(area);
                self.state = ConnectionState::for_memory_area(area.action);
            }
            Request::InvalidateSync => {}
        }
        tracing::debug!("Request {:?} accepted, entering {}", request, self.state);
        Ok(())
    }

    /// Feed one inbound message.
    pub fn handle_message<S: ParameterStore + ?Sized>(
        &mut self,
        message: InboundMessage,
        now: Instant,
        store: &mut S,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state == ConnectionState::NotStarted {
            return actions;
        }

        match message {
            InboundMessage::Heartbeat(hb) => {
                if hb.source.system_id != self.target.system_id {
                    tracing::debug!("Ignoring heartbeat from {}", hb.source);
                    return actions;
                }
                let up_edge = self.heartbeat.observe(now);
                if up_edge && self.state == ConnectionState::NotConnected {
                    self.on_connect(store, &mut actions);
                }
            }
            InboundMessage::ParamValue(value) => {
                if value.source != self.target {
                    tracing::debug!(
                        "Discarding PARAM_VALUE {} from {} (target {})",
                        value.param_id,
                        value.source,
                        self.target
                    );
                    return actions;
                }
                self.on_param_value(&value, now, store);
            }
            InboundMessage::CommandAck(ack) => {
                self.on_command_ack(ack, store, &mut actions);
            }
            InboundMessage::Other { message_id, .. } => {
                tracing::trace!("Ignoring message id {}", message_id);
            }
        }
        actions
    }

    /// Run one cycle: heartbeat staleness, then state dispatch and the
    /// deadline check while the link is up.
    pub fn poll<S: ParameterStore + ?Sized>(&mut self, now: Instant, store: &mut S) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.state == ConnectionState::NotStarted {
            return actions;
        }

        if self.heartbeat.check(now) {
            self.on_disconnect(store, &mut actions);
        }
        if self.heartbeat.link_up() {
            self.dispatch(now, store, &mut actions);
            self.check_deadline(now, store, &mut actions);
        }
        actions
    }

    fn on_connect<S: ParameterStore + ?Sized>(&mut self, store: &mut S, actions: &mut Vec<Action>) {
        tracing::info!("Vehicle {} connected", self.target);
        self.state = ConnectionState::Connected;
        self.synchronised = false;
        store.invalidate();
        actions.push(Action::Emit(EngineEvent::Connected));
    }

    fn on_disconnect<S: ParameterStore + ?Sized>(
        &mut self,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        let abandoned = self.state.campaign();
        match abandoned {
            Some(campaign) => tracing::info!(
                "Vehicle {} disconnected, abandoning {} campaign",
                self.target,
                campaign
            ),
            None => tracing::info!("Vehicle {} disconnected", self.target),
        }
        self.state = ConnectionState::NotConnected;
        self.retry.disarm();
        self.pending_read = None;
        self.pending_write = None;
        self.pending_area = None;
        self.synchronised = false;
        store.invalidate();
        actions.push(Action::Emit(EngineEvent::Disconnected { abandoned }));
    }

    fn on_param_value<S: ParameterStore + ?Sized>(
        &mut self,
        value: &ParamValue,
        now: Instant,
        store: &mut S,
    ) {
        let last = store.apply_value(value);

        match self.state {
            ConnectionState::ReadingAll => {
                self.retry.extend(now, self.config.reply_timeout());
                if last {
                    tracing::info!("Bulk read complete, checking for missing parameters");
                    self.state = ConnectionState::ReadMissing;
                }
            }
            ConnectionState::ReadingMissing => {
                if self.pending_read != Some(value.param_index) {
                    tracing::debug!(
                        "PARAM_VALUE {} is not the requested index {:?}",
                        value.param_index,
                        self.pending_read
                    );
                    return;
                }
                tracing::debug!("Received {}, looking for the next missing one", value.param_id);
                self.retry.extend(now, self.config.reply_timeout());
                self.pending_read = None;
                self.state = ConnectionState::ReadMissing;
            }
            ConnectionState::WritingChanged => {
                let confirmed = self
                    .pending_write
                    .as_ref()
                    .is_some_and(|pending| pending.param_id == value.param_id);
                if confirmed {
                    tracing::debug!("Vehicle confirmed {} = {}", value.param_id, value.value);
                    self.retry.extend(now, self.config.reply_timeout());
                    self.pending_write = None;
                    self.state = ConnectionState::WriteChanged;
                }
            }
            _ => {}
        }
    }

    fn on_command_ack<S: ParameterStore + ?Sized>(
        &mut self,
        ack: CommandAck,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        if !is_storage_command(ack.command) || ack.source != self.target {
            return;
        }
        if !matches!(
            self.state,
            ConnectionState::WritingMemArea
                | ConnectionState::LoadingMemArea
                | ConnectionState::ClearingMemArea
        ) {
            tracing::debug!("Storage acknowledgement outside a memory-area operation");
            return;
        }
        let Some(request) = self.pending_area.take() else {
            return;
        };

        let result = MemoryAreaResult {
            action: request.action,
            area_id: request.area_id,
            result: ack.result,
        };
        tracing::info!(
            "Memory area {} {} acknowledged (result {})",
            request.area_id,
            request.action,
            ack.result
        );
        self.retry.disarm();
        self.state = ConnectionState::Connected;
        store.memory_area_result(result);
        actions.push(Action::Emit(EngineEvent::MemoryAreaCompleted(result)));
    }

    fn dispatch<S: ParameterStore + ?Sized>(
        &mut self,
        now: Instant,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        match self.state {
            ConnectionState::ReadAll => {
                store.clear_sync();
                self.synchronised = false;
                self.retry.arm(now, self.config.read_all_timeout());
                actions.push(Action::Send(OutboundCommand::ParamRequestList {
                    target: self.target,
                }));
                self.state = ConnectionState::ReadingAll;
                tracing::info!("Reading all parameters");
            }
            ConnectionState::ReadMissing => match store.next_unsynced() {
                None => self.complete(Campaign::ReadAll, store, actions),
                Some(index) => {
                    tracing::debug!("Requesting missing parameter {}", index);
                    actions.push(Action::Send(OutboundCommand::ParamRequestRead {
                        target: self.target,
                        index,
                    }));
                    self.pending_read = Some(index);
                    self.retry.set_deadline(now, self.config.reply_timeout());
                    self.state = ConnectionState::ReadingMissing;
                }
            },
            ConnectionState::WriteChanged => match store.next_unsynced() {
                None => self.complete(Campaign::WriteChanged, store, actions),
                Some(index) => match store.parameter(index) {
                    Some(param) => {
                        tracing::debug!("Writing {} = {}", param.param_id, param.value);
                        actions.push(Action::Send(OutboundCommand::ParamSet {
                            target: self.target,
                            param_id: param.param_id.clone(),
                            value: param.value,
                            param_type: param.param_type,
                        }));
                        self.pending_write = Some(PendingWrite {
                            index,
                            param_id: param.param_id,
                        });
                        self.retry.set_deadline(now, self.config.reply_timeout());
                        self.state = ConnectionState::WritingChanged;
                    }
                    None => {
                        tracing::warn!(
                            "Parameter {} is out of sync but unknown locally, cannot write it",
                            index
                        );
                        self.give_up(Campaign::WriteChanged, store, actions);
                    }
                },
            },
            ConnectionState::WriteMemArea
            | ConnectionState::LoadMemArea
            | ConnectionState::ClearMemArea => {
                let Some(request) = self.pending_area else {
                    self.state = ConnectionState::Connected;
                    return;
                };
                actions.push(Action::Send(OutboundCommand::MemoryArea {
                    target: self.target,
                    command: request.into(),
                }));
                self.retry.arm(now, self.config.memory_area_timeout());
                self.state = match self.state {
                    ConnectionState::WriteMemArea => ConnectionState::WritingMemArea,
                    ConnectionState::LoadMemArea => ConnectionState::LoadingMemArea,
                    _ => ConnectionState::ClearingMemArea,
                };
                tracing::info!("Memory area {} {} requested", request.area_id, request.action);
            }
            ConnectionState::NotStarted
            | ConnectionState::NotConnected
            | ConnectionState::Connected
            | ConnectionState::ReadingAll
            | ConnectionState::ReadingMissing
            | ConnectionState::WritingChanged
            | ConnectionState::WritingMemArea
            | ConnectionState::LoadingMemArea
            | ConnectionState::ClearingMemArea => {}
        }
    }

    fn check_deadline<S: ParameterStore + ?Sized>(
        &mut self,
        now: Instant,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        if !self.state.is_awaiting_reply() || !self.retry.is_expired(now) {
            return;
        }

        match self.state {
            ConnectionState::ReadingAll | ConnectionState::ReadingMissing => {
                match self.retry.record_expiry(now, self.config.reply_timeout()) {
                    RetryOutcome::Retry => {
                        tracing::warn!(
                            "Parameter read timed out in {} (attempt {}), re-requesting missing",
                            self.state,
                            self.retry.attempts()
                        );
                        self.pending_read = None;
                        self.state = ConnectionState::ReadMissing;
                    }
                    RetryOutcome::GiveUp => self.give_up(Campaign::ReadAll, store, actions),
                }
            }
            ConnectionState::WritingChanged => {
                match self.retry.record_expiry(now, self.config.reply_timeout()) {
                    RetryOutcome::Retry => {
                        tracing::warn!(
                            "No echo for written parameter (attempt {}), writing again",
                            self.retry.attempts()
                        );
                        self.pending_write = None;
                        self.state = ConnectionState::WriteChanged;
                    }
                    RetryOutcome::GiveUp => self.give_up(Campaign::WriteChanged, store, actions),
                }
            }
            ConnectionState::WritingMemArea
            | ConnectionState::LoadingMemArea
            | ConnectionState::ClearingMemArea => {
                self.retry.disarm();
                self.state = ConnectionState::Connected;
                if let Some(request) = self.pending_area.take() {
                    tracing::warn!(
                        "No acknowledgement for memory area {} {}",
                        request.area_id,
                        request.action
                    );
                    actions.push(Action::Emit(EngineEvent::MemoryAreaTimedOut(request)));
                }
            }
            _ => {}
        }
    }

    fn complete<S: ParameterStore + ?Sized>(
        &mut self,
        campaign: Campaign,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        tracing::info!("{} campaign complete, all parameters in sync", campaign);
        self.retry.disarm();
        self.pending_read = None;
        self.pending_write = None;
        self.state = ConnectionState::Connected;
        self.synchronised = true;
        store.sync_complete();
        actions.push(Action::Emit(EngineEvent::SyncComplete { campaign }));
    }

    fn give_up<S: ParameterStore + ?Sized>(
        &mut self,
        campaign: Campaign,
        store: &mut S,
        actions: &mut Vec<Action>,
    ) {
        let attempts = self.retry.attempts();
        tracing::warn!("Giving up {} campaign after {} attempts", campaign, attempts);
        self.retry.disarm();
        self.pending_read = None;
        self.pending_write = None;
        self.state = ConnectionState::Connected;
        self.synchronised = false;
        store.sync_abandoned(campaign);
        actions.push(Action::Emit(EngineEvent::SyncAbandoned { campaign, attempts }));
    }
}
