//! Run a memory-area operation.

use anyhow::{bail, Result};
use mavparam_client::SimulatedVehicle;
use mavparam_core::{EngineEvent, SyncConfig};
use mavparam_types::MemoryAreaAction;

use super::Session;

/// Run the area command.
pub async fn run(
    config: SyncConfig,
    action: MemoryAreaAction,
    area_id: u8,
    result: Option<u8>,
) -> Result<()> {
    let vehicle = SimulatedVehicle::new(config.target());
    if let Some(code) = result {
        vehicle.set_storage_result(Some(code));
    }
    let mut session = Session::connect(config, vehicle).await?;

    println!("Memory area {}: {}...", area_id, action);
    session.client.request_memory_area(action, area_id)?;
    let event = session
        .next_event(|e| {
            matches!(
                e,
                EngineEvent::MemoryAreaCompleted(_)
                    | EngineEvent::MemoryAreaTimedOut(_)
                    | EngineEvent::Disconnected { .. }
                    | EngineEvent::RequestRejected { .. }
            )
        })
        .await?;
    session.close().await?;

    match event {
        EngineEvent::MemoryAreaCompleted(done) if done.is_accepted() => {
            println!("Accepted (result {})", done.result);
            Ok(())
        }
        EngineEvent::MemoryAreaCompleted(done) => {
            bail!("Vehicle refused {} of area {} (result {})", action, area_id, done.result)
        }
        EngineEvent::MemoryAreaTimedOut(_) => bail!("No acknowledgement from vehicle"),
        EngineEvent::RequestRejected { reason, .. } => bail!("Engine refused request: {}", reason),
        other => bail!("Vehicle lost during memory-area operation: {:?}", other),
    }
}
