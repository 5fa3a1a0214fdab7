use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use shared::domain::{AmbulanceId, AmbulanceStatus, GeoPoint, IncidentStatus, Location};
use store::{
    seed, views, CoordinationStore, NoLatency, StoreSettings, SystemClock, TransitionPolicy,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Transition policy applied by the store.
    #[arg(long, value_enum, default_value_t = PolicyArg::ForwardOnly)]
    policy: PolicyArg,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the seeded dataset as JSON.
    Snapshot,
    /// List active incidents in dispatch order.
    Queue {
        /// Only incidents in this status, by wire name (e.g. `sos_acionado`).
        #[arg(long)]
        status: Option<IncidentStatus>,
    },
    /// List incident statuses in lifecycle order.
    Statuses,
    /// Check the seeded dataset for broken cross-references.
    Check,
    /// Run one incident from SOS to hospital and print every store event.
    Simulate {
        #[arg(long, default_value = "joao.silva@example.com")]
        email: String,
        #[arg(long, default_value = "1")]
        ambulance: String,
        #[arg(long, default_value = "Hospital das Clínicas")]
        hospital: String,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum PolicyArg {
    #[value(name = "forward_only", alias = "forward-only")]
    ForwardOnly,
    Lenient,
}

impl From<PolicyArg> for TransitionPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::ForwardOnly => TransitionPolicy::ForwardOnly,
            PolicyArg::Lenient => TransitionPolicy::Lenient,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let store = CoordinationStore::new_with_dependencies(
        StoreSettings {
            transition_policy: cli.policy.into(),
            ..StoreSettings::default()
        },
        seed::mock_dataset(),
        Arc::new(SystemClock),
        Arc::new(NoLatency),
    );

    match cli.command {
        Command::Snapshot => {
            println!("{}", serde_json::to_string_pretty(&store.snapshot())?);
        }
        Command::Queue { status } => {
            let incidents = store.incidents();
            for incident in views::dispatch_queue(&incidents, status) {
                println!(
                    "{}\t{}\t{}\t{}",
                    incident.id,
                    incident.status.label(),
                    incident.user_name,
                    incident.location.address
                );
            }
        }
        Command::Statuses => {
            for status in IncidentStatus::ALL {
                println!("{}\t{}\t{}", status.rank(), status, status.label());
            }
        }
        Command::Check => {
            let violations = store.verify_consistency();
            if violations.is_empty() {
                println!("dataset is consistent");
            } else {
                for violation in &violations {
                    println!("{violation}");
                }
                bail!("{} consistency violations", violations.len());
            }
        }
        Command::Simulate {
            email,
            ambulance,
            hospital,
        } => simulate(&store, &email, &AmbulanceId::new(ambulance), &hospital).await?,
    }

    Ok(())
}

async fn simulate(
    store: &CoordinationStore,
    email: &str,
    ambulance_id: &AmbulanceId,
    hospital: &str,
) -> Result<()> {
    let mut events = store.subscribe();

    let user = store.login(email, "simulation").await?;
    let origin = Location::new(-23.561, -46.655, format!("{} (simulated)", user.address));
    let incident = store.trigger_sos(origin.clone())?;
    info!(incident_id = %incident.id, "simulated SOS opened");

    store.update_incident_status(&incident.id, IncidentStatus::CentralEmContato, None)?;
    store.assign_ambulance_to_incident(&incident.id, ambulance_id, 8)?;
    store.update_incident_status(&incident.id, IncidentStatus::AmbulanciaACaminho, None)?;

    let start = store
        .ambulance(ambulance_id)
        .map(|ambulance| ambulance.location)
        .ok_or_else(|| anyhow!("ambulance {ambulance_id} not found"))?;
    let target = origin.point();
    for step in 1..=3u32 {
        let fraction = f64::from(step) / 3.0;
        let position = GeoPoint::new(
            start.latitude + (target.latitude - start.latitude) * fraction,
            start.longitude + (target.longitude - start.longitude) * fraction,
        );
        store.update_ambulance_position(ambulance_id, position)?;
    }

    store.update_incident_status(&incident.id, IncidentStatus::AmbulanciaChegou, None)?;
    store.update_incident_status(&incident.id, IncidentStatus::PacienteEmbarcado, None)?;
    store.assign_hospital_to_incident(&incident.id, hospital)?;
    store.update_incident_status(&incident.id, IncidentStatus::ACaminhoHospital, None)?;
    store.update_incident_status(
        &incident.id,
        IncidentStatus::PacienteHospital,
        Some(hospital.to_string()),
    )?;
    store.update_ambulance_status(ambulance_id, AmbulanceStatus::Available)?;
    store.logout()?;

    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }

    let violations = store.verify_consistency();
    if !violations.is_empty() {
        bail!("simulation left {} consistency violations", violations.len());
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
