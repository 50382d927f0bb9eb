//! vlanbulk - operator CLI
//!
//! Entry point for bulk port VLAN changes, swaps and rollbacks.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vlanbulk::{
    resolve_switches, targets_for, targets_on_vlan, BulkDispatcher, BulkReport, BulkRollbackReport,
    DashboardClient, Ledger, MutationEngine, MutationOutcome, RollbackEngine, RollbackOutcome,
    SwitchScope, VlanBulkConfig, VlanField, DEFAULT_CONFIG_PATH,
};
use vlanbulk_common::{
    display_vlan, AuditSink, FileAuditLog, MutationTarget, OperationKind, PortService, VlanId,
};

/// Bulk switch-port VLAN editor with rollback
#[derive(Parser, Debug)]
#[command(name = "vlanbulk")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Rollback ledger file (overrides config)
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Audit log file (overrides config)
    #[arg(long)]
    audit_log: Option<PathBuf>,

    /// Worker count for bulk operations, 1-4 (overrides config)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Change one port's VLAN and/or voice VLAN
    Change {
        /// Switch serial
        #[arg(short, long)]
        serial: String,
        /// Port identifier
        #[arg(short, long)]
        port: String,
        /// New VLAN
        #[arg(long)]
        vlan: Option<VlanId>,
        /// New voice VLAN
        #[arg(long)]
        voice_vlan: Option<VlanId>,
    },

    /// Change many ports across one or more switches
    BulkChange {
        /// Switch serials (comma-separated or repeated)
        #[arg(
            short,
            long,
            value_delimiter = ',',
            required_unless_present_any = ["switch_name", "all_switches"],
            conflicts_with_all = ["switch_name", "all_switches"]
        )]
        serial: Vec<String>,
        /// Switch names or name prefixes (comma-separated or repeated)
        #[arg(short = 'n', long, value_delimiter = ',', conflicts_with = "all_switches")]
        switch_name: Vec<String>,
        /// Every switch in the organization
        #[arg(long)]
        all_switches: bool,
        /// Port identifiers (comma-separated or repeated)
        #[arg(short, long, value_delimiter = ',', conflicts_with_all = ["on_vlan", "on_voice_vlan"])]
        port: Vec<String>,
        /// Select every port currently on this VLAN
        #[arg(long, conflicts_with = "on_voice_vlan")]
        on_vlan: Option<VlanId>,
        /// Select every port currently on this voice VLAN
        #[arg(long)]
        on_voice_vlan: Option<VlanId>,
        /// New VLAN
        #[arg(long)]
        vlan: Option<VlanId>,
        /// New voice VLAN
        #[arg(long)]
        voice_vlan: Option<VlanId>,
    },

    /// Swap the VLAN assignments of two ports on one switch
    Swap {
        /// Switch serial
        #[arg(short, long)]
        serial: String,
        /// First port
        port_a: String,
        /// Second port
        port_b: String,
    },

    /// Roll back one port change by ledger ID
    Rollback {
        /// Ledger ID
        id: u64,
    },

    /// Roll back a swap by its two ledger IDs
    RollbackSwap {
        /// Ledger ID of the first port
        id1: u64,
        /// Ledger ID of the second port
        id2: u64,
    },

    /// Roll back many port changes concurrently
    BulkRollback {
        /// Ledger IDs (comma-separated or repeated)
        #[arg(value_delimiter = ',', required = true)]
        ids: Vec<u64>,
    },

    /// List rollback ledger entries
    List {
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove every rollback ledger entry
    ClearLedger,

    /// Truncate the audit log
    ClearLog,
}

/// Initializes tracing/logging subsystem
fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("Invalid log level")?;

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Shared services built from configuration
struct App {
    config: VlanBulkConfig,
    ledger: Arc<Ledger>,
    audit: Arc<FileAuditLog>,
}

impl App {
    fn load(args: &Args) -> Result<Self> {
        let mut config = VlanBulkConfig::load_or_default(&args.config)?;
        if let Some(path) = &args.ledger {
            config.storage.ledger_path = path.clone();
        }
        if let Some(path) = &args.audit_log {
            config.storage.audit_log_path = path.clone();
        }
        if let Some(workers) = args.workers {
            config.dispatch.workers = workers;
        }
        config.validate()?;

        let ledger = Ledger::open(&config.storage.ledger_path).with_context(|| {
            format!(
                "Failed to open rollback ledger {}",
                config.storage.ledger_path.display()
            )
        })?;
        let audit = FileAuditLog::new(&config.storage.audit_log_path);

        Ok(Self {
            config,
            ledger: Arc::new(ledger),
            audit: Arc::new(audit),
        })
    }

    fn engine(&self) -> Result<MutationEngine> {
        let env = &self.config.dashboard.api_key_env;
        let api_key = std::env::var(env)
            .with_context(|| format!("Dashboard API key not set (expected in ${})", env))?;
        let client = DashboardClient::new(
            self.config.dashboard.base_url.clone(),
            api_key,
            self.config.request_timeout(),
        )?
        .with_organization(self.config.dashboard.organization_id.clone());

        let service: Arc<dyn PortService> = Arc::new(client);
        let audit: Arc<dyn AuditSink> = self.audit.clone();
        Ok(MutationEngine::new(service, Arc::clone(&self.ledger), audit))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let ctx = match App::load(&args) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("vlanbulk: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(&ctx.config.log_level) {
        eprintln!("vlanbulk: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args.command, &ctx).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %format!("{:#}", e), "vlanbulk failed");
            eprintln!("vlanbulk: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs one command; `Ok(false)` means it finished with failed targets
async fn run(command: Command, ctx: &App) -> Result<bool> {
    match command {
        Command::Change {
            serial,
            port,
            vlan,
            voice_vlan,
        } => {
            let target = MutationTarget::new(serial, port, vlan, voice_vlan)?;
            let engine = ctx.engine()?;
            let outcome = engine
                .apply_change(
                    target,
                    vlanbulk::ChangeMode::Capture(OperationKind::SingleChange),
                )
                .await;
            print_outcome(&outcome);
            Ok(outcome.is_success())
        }

        Command::BulkChange {
            serial,
            switch_name,
            all_switches,
            port,
            on_vlan,
            on_voice_vlan,
            vlan,
            voice_vlan,
        } => {
            let engine = ctx.engine()?;
            let pool = ctx.config.worker_pool();

            let scope = if all_switches {
                SwitchScope::All
            } else if !switch_name.is_empty() {
                SwitchScope::Names(switch_name)
            } else {
                SwitchScope::Serials(serial)
            };
            let serial = resolve_switches(engine.service().as_ref(), scope).await?;
            if serial.is_empty() {
                println!("No switches selected");
                return Ok(true);
            }

            let selector = match (on_vlan, on_voice_vlan) {
                (Some(v), _) => Some((v, VlanField::Data)),
                (None, Some(v)) => Some((v, VlanField::Voice)),
                (None, None) => None,
            };
            let targets = match selector {
                Some((current, field)) => {
                    let selection = targets_on_vlan(
                        Arc::clone(engine.service()),
                        &pool,
                        serial,
                        current,
                        field,
                        vlan,
                        voice_vlan,
                    )
                    .await?;
                    for (switch, e) in &selection.unreachable {
                        println!("Could not list ports on {}: {}", switch, e);
                    }
                    selection.targets
                }
                None if port.is_empty() => bail!("Either --port or --on-vlan/--on-voice-vlan is required"),
                None => targets_for(&serial, &port, vlan, voice_vlan)?,
            };

            if targets.is_empty() {
                println!("No ports selected");
                return Ok(true);
            }

            info!(targets = targets.len(), "Dispatching bulk change");
            let report = BulkDispatcher::new(engine, pool)
                .dispatch(targets, OperationKind::BulkChange)
                .await;
            print_bulk_report(&report);
            Ok(report.is_clean())
        }

        Command::Swap {
            serial,
            port_a,
            port_b,
        } => {
            let engine = ctx.engine()?;
            let outcome = engine.swap(&serial, &port_a, &port_b, true).await?;
            println!(
                "Swapped ports {} and {} on {}",
                port_a, port_b, serial
            );
            if let Some((id_a, id_b)) = outcome.ledger_ids {
                println!("Rollback IDs: {} {}", id_a, id_b);
            }
            Ok(true)
        }

        Command::Rollback { id } => {
            let rollback = RollbackEngine::new(ctx.engine()?, ctx.config.worker_pool());
            match rollback.rollback_by_id(id).await? {
                RollbackOutcome::Restored(state) => {
                    println!(
                        "Restored {} port {} to VLAN {} / voice VLAN {}",
                        state.switch_serial,
                        state.port_id,
                        display_vlan(state.vlan),
                        display_vlan(state.voice_vlan)
                    );
                    Ok(true)
                }
                RollbackOutcome::NotFound => {
                    println!("No rollback data available for ID {}", id);
                    Ok(false)
                }
            }
        }

        Command::RollbackSwap { id1, id2 } => {
            let rollback = RollbackEngine::new(ctx.engine()?, ctx.config.worker_pool());
            let [first, second] = rollback.rollback_swap(id1, id2).await?;
            println!(
                "Port swap rollback completed: {} ports {} and {}",
                first.switch_serial, first.port_id, second.port_id
            );
            Ok(true)
        }

        Command::BulkRollback { ids } => {
            let rollback = RollbackEngine::new(ctx.engine()?, ctx.config.worker_pool());
            let report = rollback.bulk_rollback(ids).await;
            print_rollback_report(&report);
            Ok(report.failed.is_empty() && report.not_found.is_empty())
        }

        Command::List { json } => {
            let entries = ctx.ledger.list()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No rollback entries found.");
            } else {
                for entry in &entries {
                    println!(
                        "ID: {}, Operation: {}, Switch: {}, Port: {}, VLAN: {}, Voice VLAN: {}",
                        entry.id,
                        entry.kind,
                        entry.switch_serial,
                        entry.port_id,
                        display_vlan(entry.vlan),
                        display_vlan(entry.voice_vlan)
                    );
                }
            }
            Ok(true)
        }

        Command::ClearLedger => {
            ctx.ledger.clear()?;
            println!("Rollback data cleared.");
            Ok(true)
        }

        Command::ClearLog => {
            ctx.audit.clear().with_context(|| {
                format!("Failed to clear {}", ctx.audit.path().display())
            })?;
            println!("VLAN changes log cleared.");
            Ok(true)
        }
    }
}

fn print_outcome(outcome: &MutationOutcome) {
    match (&outcome.applied, &outcome.error) {
        (Some(state), _) => println!(
            "Changed {} to VLAN {} / voice VLAN {}{}",
            outcome.target,
            display_vlan(state.vlan),
            display_vlan(state.voice_vlan),
            outcome
                .ledger_id
                .map(|id| format!(" (rollback ID {})", id))
                .unwrap_or_default()
        ),
        (None, Some(e)) => println!("Failed {}: {}", outcome.target, e),
        (None, None) => println!("Failed {}", outcome.target),
    }
}

fn print_bulk_report(report: &BulkReport) {
    println!(
        "Bulk change finished: {} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    for outcome in &report.succeeded {
        print_outcome(outcome);
    }
    for outcome in &report.failed {
        print_outcome(outcome);
    }
}

fn print_rollback_report(report: &BulkRollbackReport) {
    println!(
        "Bulk rollback finished: {} restored, {} not found, {} failed",
        report.restored.len(),
        report.not_found.len(),
        report.failed.len()
    );
    if !report.restored.is_empty() {
        println!("Restored IDs: {:?}", report.restored);
    }
    if !report.not_found.is_empty() {
        println!("Unknown IDs: {:?}", report.not_found);
    }
    for (id, e) in &report.failed {
        println!("Rollback {} failed: {}", id, e);
    }
}
