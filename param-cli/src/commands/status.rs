//! Show configuration and engine status.

use anyhow::Result;
use mavparam_client::SimulatedVehicle;
use mavparam_core::SyncConfig;

use super::Session;

/// Run the status command.
pub async fn run(config: SyncConfig) -> Result<()> {
    println!("=== mavparam status ===");
    println!();
    println!("Target:        {}", config.target());
    println!("Poll interval: {:?}", config.poll_interval());
    println!("Heartbeat:     {:?} timeout", config.heartbeat_timeout());
    println!(
        "Replies:       {:?} timeout, {} attempts",
        config.reply_timeout(),
        config.max_attempts
    );
    println!("Bulk read:     {:?} timeout", config.read_all_timeout());
    println!("Memory area:   {:?} timeout", config.memory_area_timeout());
    println!(
        "Queues:        inbound {}, outbound {}",
        config.inbound_capacity, config.outbound_capacity
    );
    println!();

    let vehicle = SimulatedVehicle::demo(config.target());
    let session = Session::connect(config, vehicle).await?;
    let status = session.status();

    println!("Engine:");
    println!("  State:        {}", status.state);
    println!("  Link:         {}", if status.link_up { "up" } else { "down" });
    println!("  Synchronised: {}", status.synchronised);
    println!("  Vehicle:      {} parameters (simulated)", session.vehicle.param_count());

    session.close().await
}
