//! Change parameters and write them to the vehicle.

use anyhow::{bail, Context, Result};
use mavparam_client::SimulatedVehicle;
use mavparam_core::{Campaign, SyncConfig};
use mavparam_types::validate_param_id;

use super::Session;

/// Run the write command.
pub async fn run(config: SyncConfig, assignments: &[String]) -> Result<()> {
    let changes = assignments
        .iter()
        .map(|a| parse_assignment(a))
        .collect::<Result<Vec<_>>>()?;

    let vehicle = SimulatedVehicle::demo(config.target());
    let mut session = Session::connect(config, vehicle).await?;

    // Local edits need a table to edit.
    session.client.request_refresh()?;
    session.finish_campaign(Campaign::ReadAll).await?;
    session
        .client
        .wait_for_state(|s| s.state.is_quiescent(), std::time::Duration::from_secs(1))
        .await?;

    let mut unknown = Vec::new();
    {
        let mut store = session.client.store().lock().await;
        for (name, value) in &changes {
            if store.set_local(name, *value).is_none() {
                unknown.push(name.as_str());
            }
        }
    }
    if !unknown.is_empty() {
        session.close().await?;
        bail!("Vehicle has no parameter named {}", unknown.join(", "));
    }

    println!("Writing {} parameter(s)...", changes.len());
    session.client.request_write_changed()?;
    let outcome = session.finish_campaign(Campaign::WriteChanged).await;

    for (name, value) in &changes {
        match session.vehicle.value(name) {
            Some(actual) if actual == *value => println!("  {} = {} (confirmed)", name, actual),
            Some(actual) => println!("  {} = {} (wanted {})", name, actual, value),
            None => println!("  {} missing on vehicle", name),
        }
    }

    session.close().await?;
    outcome
}

/// Parse `NAME=VALUE`.
pub fn parse_assignment(input: &str) -> Result<(String, f32)> {
    let (name, value) = input
        .split_once('=')
        .with_context(|| format!("Expected NAME=VALUE, got '{}'", input))?;
    let name = name.trim();
    validate_param_id(name)?;
    let value = value
        .trim()
        .parse::<f32>()
        .with_context(|| format!("Invalid value for {}", name))?;
    Ok((name.to_string(), value))
}
