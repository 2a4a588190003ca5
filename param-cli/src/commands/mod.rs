//! CLI command implementations.

pub mod area;
pub mod refresh;
pub mod status;
pub mod write;

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use mavparam_client::{EngineStatus, ParamSyncClient, SimulatedVehicle};
use mavparam_core::{Campaign, EngineEvent, MemoryParameterStore, SyncConfig};
use tokio::sync::broadcast;

/// Upper bound for one campaign, retries included.
const CAMPAIGN_TIMEOUT: Duration = Duration::from_secs(60);

/// A running client connected to a simulated vehicle.
pub struct Session {
    /// The client facade.
    pub client: ParamSyncClient<MemoryParameterStore, SimulatedVehicle>,
    /// The vehicle on the other end.
    pub vehicle: SimulatedVehicle,
    events: broadcast::Receiver<EngineEvent>,
}

impl Session {
    /// Start the client and wait for the vehicle's first heartbeat.
    pub async fn connect(config: SyncConfig, vehicle: SimulatedVehicle) -> Result<Self> {
        let connect_timeout = config.heartbeat_timeout() * 2;
        let mut client = ParamSyncClient::new(config, MemoryParameterStore::new(), vehicle.clone());
        let events = client.subscribe();

        client.start().await.context("Failed to start sync client")?;
        client
            .wait_for_state(|s| s.state.is_quiescent(), connect_timeout)
            .await
            .context("Vehicle did not connect")?;

        Ok(Self {
            client,
            vehicle,
            events,
        })
    }

    /// Wait for the end of the running campaign.
    pub async fn finish_campaign(&mut self, campaign: Campaign) -> Result<()> {
        let event = self
            .next_event(|e| {
                matches!(
                    e,
                    EngineEvent::SyncComplete { .. }
                        | EngineEvent::SyncAbandoned { .. }
                        | EngineEvent::Disconnected { .. }
                        | EngineEvent::RequestRejected { .. }
                )
            })
            .await?;

        match event {
            EngineEvent::SyncComplete { campaign: done } if done == campaign => Ok(()),
            EngineEvent::SyncAbandoned { attempts, .. } => {
                bail!("{} gave up after {} attempts", campaign, attempts)
            }
            EngineEvent::Disconnected { .. } => bail!("Vehicle disconnected during {}", campaign),
            EngineEvent::RequestRejected { reason, .. } => {
                bail!("Engine refused {}: {}", campaign, reason)
            }
            other => bail!("Unexpected event during {}: {:?}", campaign, other),
        }
    }

    /// Wait for the first event matching `pred`.
    pub async fn next_event<F>(&mut self, pred: F) -> Result<EngineEvent>
    where
        F: Fn(&EngineEvent) -> bool,
    {
        let events = &mut self.events;
        let wait = async {
            loop {
                match events.recv().await {
                    Ok(event) if pred(&event) => return Ok(event),
                    Ok(event) => tracing::debug!("Event {:?}", event),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} engine events", n)
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(anyhow!("Engine stopped"))
                    }
                }
            }
        };
        tokio::time::timeout(CAMPAIGN_TIMEOUT, wait)
            .await
            .context("Timed out waiting for the engine")?
    }

    /// Latest engine status.
    pub fn status(&self) -> EngineStatus {
        self.client.status()
    }

    /// Stop the client.
    pub async fn close(mut self) -> Result<()> {
        self.client.stop().await.context("Failed to stop sync client")
    }
}
