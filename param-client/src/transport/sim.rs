//! Simulated vehicle link.
//!
//! Behaves like an autopilot on the other end of a link: it sends
//! heartbeats, answers parameter list/read requests, echoes parameter
//! writes and acknowledges storage commands. Faults can be injected to
//! exercise the retry and disconnect paths.

use std::collections::{BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use mavparam_types::{
    CommandAck, Heartbeat, InboundMessage, OutboundCommand, ParamType, ParamValue,
    StorageCommand, Target, MAV_RESULT_ACCEPTED,
};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::{InboundQueue, LinkError, LinkReceiver, OutboundQueue};

/// How often the simulated link services its queues.
const TICK: Duration = Duration::from_millis(10);

/// Replies handed to the inbound queue per tick.
const REPLY_BURST: usize = 4;

/// Default heartbeat period, matching a typical autopilot.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);

/// Commands the simulated vehicle has received.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleActivity {
    /// PARAM_REQUEST_LIST count.
    pub list_requests: usize,
    /// Indices asked for with PARAM_REQUEST_READ.
    pub read_requests: Vec<u16>,
    /// PARAM_SET name/value pairs.
    pub writes: Vec<(String, f32)>,
    /// Storage commands.
    pub storage_commands: Vec<StorageCommand>,
}

#[derive(Debug, Clone)]
struct VehicleParam {
    id: String,
    value: f32,
    param_type: ParamType,
}

#[derive(Debug)]
struct VehicleState {
    identity: Target,
    params: Vec<VehicleParam>,
    silent: bool,
    mute_replies: bool,
    lose_once: BTreeSet<u16>,
    storage_result: Option<u8>,
    activity: VehicleActivity,
}

/// A simulated autopilot behind a [`LinkReceiver`].
#[derive(Debug, Clone)]
pub struct SimulatedVehicle {
    state: Arc<Mutex<VehicleState>>,
    heartbeat_interval: Duration,
    stop: Arc<Notify>,
    task: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl SimulatedVehicle {
    /// Create a vehicle with an empty parameter table.
    pub fn new(identity: Target) -> Self {
        Self {
            state: Arc::new(Mutex::new(VehicleState {
                identity,
                params: Vec::new(),
                silent: false,
                mute_replies: false,
                lose_once: BTreeSet::new(),
                storage_result: Some(MAV_RESULT_ACCEPTED),
                activity: VehicleActivity::default(),
            })),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            stop: Arc::new(Notify::new()),
            task: Arc::new(Mutex::new(None)),
        }
    }

    /// A vehicle with a small, plausible parameter table.
    pub fn demo(identity: Target) -> Self {
        Self::new(identity)
            .with_parameter("SYSID_THISMAV", f32::from(identity.system_id), ParamType::Int32)
            .with_parameter("ARMING_CHECK", 1.0, ParamType::Int32)
            .with_parameter("BATT_CAPACITY", 5200.0, ParamType::Int32)
            .with_parameter("FS_THR_ENABLE", 1.0, ParamType::Uint8)
            .with_parameter("RTL_ALT", 1500.0, ParamType::Int32)
            .with_parameter("WPNAV_SPEED", 500.0, ParamType::Real32)
            .with_parameter("ANGLE_MAX", 3000.0, ParamType::Int16)
            .with_parameter("PILOT_SPEED_UP", 250.0, ParamType::Int16)
            .with_parameter("LOIT_SPEED", 1250.0, ParamType::Real32)
            .with_parameter("COMPASS_USE", 1.0, ParamType::Int8)
    }

    /// Append a parameter to the table.
    pub fn with_parameter(self, id: &str, value: f32, param_type: ParamType) -> Self {
        self.state().params.push(VehicleParam {
            id: id.to_string(),
            value,
            param_type,
        });
        self
    }

    /// Set the heartbeat period.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    fn state(&self) -> MutexGuard<'_, VehicleState> {
        lock(&self.state)
    }

    /// Drop the next transmission of the parameter at `index`.
    pub fn lose_next(&self, index: u16) {
        self.state().lose_once.insert(index);
    }

    /// Stop sending anything, heartbeats included.
    pub fn set_silent(&self, silent: bool) {
        self.state().silent = silent;
    }

    /// Keep sending heartbeats but ignore every command.
    pub fn set_mute_replies(&self, mute: bool) {
        self.state().mute_replies = mute;
    }

    /// Result code for storage acknowledgements; `None` never acknowledges.
    pub fn set_storage_result(&self, result: Option<u8>) {
        self.state().storage_result = result;
    }

    /// Snapshot of received commands.
    pub fn activity(&self) -> VehicleActivity {
        self.state().activity.clone()
    }

    /// Current value of a parameter on the vehicle.
    pub fn value(&self, id: &str) -> Option<f32> {
        self.state()
            .params
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.value)
    }

    /// Size of the parameter table.
    pub fn param_count(&self) -> usize {
        self.state().params.len()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl VehicleState {
    fn answer(&mut self, command: OutboundCommand) -> Vec<InboundMessage> {
        if command.target() != self.identity {
            tracing::debug!(
                "Vehicle {} ignoring {} for {}",
                self.identity,
                command.kind(),
                command.target()
            );
            return Vec::new();
        }

        match command {
            OutboundCommand::ParamRequestList { .. } => {
                self.activity.list_requests += 1;
                let count = self.params.len();
                (0..count)
                    .filter_map(|i| self.transmit(i, i + 1 == count))
                    .collect()
            }
            OutboundCommand::ParamRequestRead { index, .. } => {
                self.activity.read_requests.push(index);
                self.transmit(usize::from(index), false).into_iter().collect()
            }
            OutboundCommand::ParamSet {
                param_id, value, ..
            } => {
                self.activity.writes.push((param_id.clone(), value));
                let Some(index) = self.params.iter().position(|p| p.id == param_id) else {
                    return Vec::new();
                };
                self.params[index].value = value;
                self.transmit(index, false).into_iter().collect()
            }
            OutboundCommand::MemoryArea { command, .. } => {
                self.activity.storage_commands.push(command);
                match self.storage_result {
                    Some(result) if self.replies_enabled() => {
                        vec![InboundMessage::CommandAck(CommandAck {
                            source: self.identity,
                            command: command.command_id(),
                            result,
                        })]
                    }
                    _ => Vec::new(),
                }
            }
        }
    }

    fn replies_enabled(&self) -> bool {
        !self.silent && !self.mute_replies
    }

    fn transmit(&mut self, index: usize, is_last: bool) -> Option<InboundMessage> {
        if !self.replies_enabled() {
            return None;
        }
        let index16 = u16::try_from(index).ok()?;
        if self.lose_once.remove(&index16) {
            tracing::debug!("Vehicle dropping parameter {}", index);
            return None;
        }
        let param = self.params.get(index)?;
        Some(InboundMessage::ParamValue(ParamValue {
            source: self.identity,
            param_index: index16,
            param_count: u16::try_from(self.params.len()).unwrap_or(u16::MAX),
            param_id: param.id.clone(),
            value: param.value,
            param_type: param.param_type,
            is_last,
        }))
    }
}

async fn run_vehicle(
    state: Arc<Mutex<VehicleState>>,
    inbound: InboundQueue,
    outbound: OutboundQueue,
    stop: Arc<Notify>,
    heartbeat_interval: Duration,
) {
    let mut heartbeat = tokio::time::interval(heartbeat_interval);
    let mut tick = tokio::time::interval(TICK);
    let mut pending: VecDeque<InboundMessage> = VecDeque::new();

    loop {
        tokio::select! {
            _ = stop.notified() => break,
            _ = heartbeat.tick() => {
                let state = lock(&state);
                if !state.silent {
                    let _ = inbound.push(InboundMessage::Heartbeat(Heartbeat::new(state.identity)));
                }
            }
            _ = tick.tick() => {
                {
                    let mut state = lock(&state);
                    for command in outbound.drain() {
                        pending.extend(state.answer(command));
                    }
                }
                let burst = pending.len().min(REPLY_BURST);
                for message in pending.drain(..burst) {
                    let _ = inbound.push(message);
                }
            }
        }
    }
    tracing::debug!("Simulated vehicle stopped");
}

#[async_trait]
impl LinkReceiver for SimulatedVehicle {
    async fn start(
        &self,
        inbound: InboundQueue,
        outbound: OutboundQueue,
    ) -> Result<(), LinkError> {
        let mut task = lock(&self.task);
        if task.is_some() {
            return Err(LinkError::AlreadyStarted);
        }
        tracing::info!("Simulated vehicle {} online", self.state().identity);
        *task = Some(tokio::spawn(run_vehicle(
            Arc::clone(&self.state),
            inbound,
            outbound,
            Arc::clone(&self.stop),
            self.heartbeat_interval,
        )));
        Ok(())
    }

    fn stop(&self) {
        self.stop.notify_one();
    }

    async fn join(&self, timeout: Duration) -> Result<(), LinkError> {
        let handle = lock(&self.task).take();
        let Some(handle) = handle else {
            return Ok(());
        };
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LinkError::TaskFailed(e.to_string())),
            Err(_) => Err(LinkError::JoinTimeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::BoundedQueue;
    use mavparam_types::MemoryAreaAction;

    const VEHICLE: Target = Target::new(1, 1);

    async fn started(vehicle: &SimulatedVehicle) -> (InboundQueue, OutboundQueue) {
        let inbound = Arc::new(BoundedQueue::inbound(32));
        let outbound = Arc::new(BoundedQueue::outbound(4));
        vehicle
            .start(inbound.clone(), outbound.clone())
            .await
            .unwrap();
        (inbound, outbound)
    }

    async fn collect(inbound: &InboundQueue, wait: Duration) -> Vec<InboundMessage> {
        tokio::time::sleep(wait).await;
        inbound.drain()
    }

    fn param_values(messages: &[InboundMessage]) -> Vec<&ParamValue> {
        messages
            .iter()
            .filter_map(|m| match m {
                InboundMessage::ParamValue(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn sends_heartbeats() {
        let vehicle = SimulatedVehicle::new(VEHICLE);
        let (inbound, _outbound) = started(&vehicle).await;

        let messages = collect(&inbound, Duration::from_millis(2500)).await;

        let heartbeats = messages
            .iter()
            .filter(|m| matches!(m, InboundMessage::Heartbeat(_)))
            .count();
        assert_eq!(heartbeats, 3);
        vehicle.stop();
        vehicle.join(Duration::from_secs(1)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn answers_request_list_with_last_flag() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let (inbound, outbound) = started(&vehicle).await;

        outbound
            .push(OutboundCommand::ParamRequestList { target: VEHICLE })
            .unwrap();
        let messages = collect(&inbound, Duration::from_millis(200)).await;
        let values = param_values(&messages);

        assert_eq!(values.len(), vehicle.param_count());
        assert!(values.last().is_some_and(|v| v.is_last));
        assert_eq!(values.iter().filter(|v| v.is_last).count(), 1);
        assert_eq!(vehicle.activity().list_requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn lost_parameter_is_sent_on_retry() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        vehicle.lose_next(3);
        let (inbound, outbound) = started(&vehicle).await;

        outbound
            .push(OutboundCommand::ParamRequestList { target: VEHICLE })
            .unwrap();
        let first = collect(&inbound, Duration::from_millis(200)).await;
        assert!(param_values(&first).iter().all(|v| v.param_index != 3));

        outbound
            .push(OutboundCommand::ParamRequestRead {
                target: VEHICLE,
                index: 3,
            })
            .unwrap();
        let second = collect(&inbound, Duration::from_millis(50)).await;
        let values = param_values(&second);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].param_id, "FS_THR_ENABLE");
    }

    #[tokio::test(start_paused = true)]
    async fn param_set_updates_and_echoes() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let (inbound, outbound) = started(&vehicle).await;

        outbound
            .push(OutboundCommand::ParamSet {
                target: VEHICLE,
                param_id: "RTL_ALT".into(),
                value: 3000.0,
                param_type: ParamType::Int32,
            })
            .unwrap();
        let messages = collect(&inbound, Duration::from_millis(50)).await;

        assert_eq!(vehicle.value("RTL_ALT"), Some(3000.0));
        let values = param_values(&messages);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].value, 3000.0);
    }

    #[tokio::test(start_paused = true)]
    async fn acknowledges_storage_commands() {
        let vehicle = SimulatedVehicle::new(VEHICLE);
        let (inbound, outbound) = started(&vehicle).await;

        let command = StorageCommand {
            action: MemoryAreaAction::Clear,
            area_id: 4,
        };
        outbound
            .push(OutboundCommand::MemoryArea {
                target: VEHICLE,
                command,
            })
            .unwrap();
        let messages = collect(&inbound, Duration::from_millis(50)).await;

        assert!(messages.iter().any(|m| matches!(
            m,
            InboundMessage::CommandAck(ack) if ack.is_accepted()
        )));
        assert_eq!(vehicle.activity().storage_commands, vec![command]);
    }

    #[tokio::test(start_paused = true)]
    async fn ignores_commands_for_other_vehicles() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        let (inbound, outbound) = started(&vehicle).await;

        outbound
            .push(OutboundCommand::ParamRequestList {
                target: Target::new(9, 1),
            })
            .unwrap();
        let messages = collect(&inbound, Duration::from_millis(100)).await;

        assert!(param_values(&messages).is_empty());
        assert_eq!(vehicle.activity().list_requests, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_vehicle_sends_nothing() {
        let vehicle = SimulatedVehicle::demo(VEHICLE);
        vehicle.set_silent(true);
        let (inbound, outbound) = started(&vehicle).await;

        outbound
            .push(OutboundCommand::ParamRequestList { target: VEHICLE })
            .unwrap();
        let messages = collect(&inbound, Duration::from_secs(3)).await;

        assert!(messages.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_and_join_finishes_task() {
        let vehicle = SimulatedVehicle::new(VEHICLE);
        let _queues = started(&vehicle).await;

        vehicle.stop();

        assert!(vehicle.join(Duration::from_millis(100)).await.is_ok());
        // A second join has nothing left to wait for.
        assert!(vehicle.join(Duration::from_millis(100)).await.is_ok());
    }
}
