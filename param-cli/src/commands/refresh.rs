//! Read the whole parameter table.

use anyhow::Result;
use mavparam_client::SimulatedVehicle;
use mavparam_core::{Campaign, MemoryParameterStore, SyncConfig};

use super::Session;

/// Run the refresh command.
pub async fn run(config: SyncConfig, lose: &[u16]) -> Result<()> {
    let vehicle = SimulatedVehicle::demo(config.target());
    for &index in lose {
        vehicle.lose_next(index);
    }

    let mut session = Session::connect(config, vehicle).await?;
    println!("Reading parameters from {}...", session.client.config().target());

    session.client.request_refresh()?;
    let outcome = session.finish_campaign(Campaign::ReadAll).await;

    print_table(&*session.client.store().lock().await);
    let repaired = session.vehicle.activity().read_requests;
    if !repaired.is_empty() {
        println!();
        println!("Re-requested individually: {:?}", repaired);
    }

    session.close().await?;
    outcome
}

/// Print every known parameter, index order.
pub fn print_table(store: &MemoryParameterStore) {
    println!();
    println!("{:>5}  {:<16}  {:>12}  {:<6}  {}", "IDX", "NAME", "VALUE", "TYPE", "SYNC");
    for param in store.iter() {
        println!(
            "{:>5}  {:<16}  {:>12}  {:<6}  {}",
            param.index,
            param.param_id,
            param.value,
            param.param_type,
            if param.synced { "yes" } else { "no" }
        );
    }
    println!();
    println!(
        "{} of {} parameters known, store {}",
        store.iter().count(),
        store.len(),
        if store.is_synchronised() {
            "synchronised"
        } else {
            "NOT synchronised"
        }
    );
}
