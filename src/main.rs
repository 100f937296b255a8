use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use toolward::config::ApprovalMode;
use toolward::security::approval::{ApprovalBroker, AutoDenyBroker, CliApprovalBroker};
use toolward::{
    ActionOutcome, ActionRequest, Config, InputSource, Orchestrator, OutputTarget,
    ProcessSupervisor, ReversibleOperationStore, RiskEngine, UndoOutcome, WhitelistGate,
};

#[derive(Parser)]
#[command(
    name = "toolward",
    version,
    about = "Trust & safety core for assistant tool execution"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Invoke a capability on a whitelisted tool server
    Call {
        /// Executable path of the tool server
        #[arg(long)]
        server: PathBuf,
        /// Capability to invoke
        #[arg(long)]
        tool: String,
        /// JSON argument map
        #[arg(long, default_value = "{}")]
        args: String,
        /// Free-text content for sensitivity scanning
        #[arg(long, default_value = "")]
        content: String,
        /// user_entry | clipboard | file | network_page | prior_selection
        #[arg(long, default_value = "user_entry")]
        input_source: String,
        /// display | clipboard | file_write | network_send
        #[arg(long, default_value = "display")]
        output_target: String,
        /// Destination file for mutating file-write actions
        #[arg(long)]
        target_file: Option<PathBuf>,
    },
    /// Manage reversible operations
    Undo {
        #[command(subcommand)]
        command: UndoCommand,
    },
    /// Inspect the server whitelist
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommand,
    },
}

#[derive(Subcommand)]
enum UndoCommand {
    /// List stored snapshots, newest first
    List,
    /// Restore a snapshot by id
    Restore { id: String },
    /// Delete expired snapshots
    Cleanup,
}

#[derive(Subcommand)]
enum WhitelistCommand {
    /// Show the loaded whitelist
    Show,
    /// Check whether a path is admissible
    Check { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to install tracing subscriber")?;

    let config = Config::load()?;
    let cli = Cli::parse();

    match cli.command {
        Command::Call {
            server,
            tool,
            args,
            content,
            input_source,
            output_target,
            target_file,
        } => {
            let input_source: InputSource = input_source
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown input source: {input_source}"))?;
            let output_target: OutputTarget = output_target
                .parse()
                .map_err(|_| anyhow::anyhow!("unknown output target: {output_target}"))?;
            let arguments: serde_json::Value =
                serde_json::from_str(&args).context("invalid --args JSON")?;

            let mut request = ActionRequest::new(&tool, &content, input_source, output_target)
                .with_server(server)
                .with_arguments(arguments);
            if let Some(target) = target_file {
                request = request.with_target_file(target);
            }

            let orchestrator = build_orchestrator(&config).await?;
            match orchestrator.execute(request).await? {
                ActionOutcome::Completed {
                    output,
                    duration_ms,
                    assessment,
                    snapshot_id,
                } => {
                    println!("{output}");
                    tracing::info!(
                        tier = %assessment.tier,
                        duration_ms,
                        snapshot = snapshot_id.as_deref().unwrap_or("-"),
                        "call completed"
                    );
                }
                ActionOutcome::Denied { assessment, reason } => {
                    eprintln!("denied ({}): {reason}", assessment.tier);
                    for r in &assessment.reasons {
                        eprintln!("  - {r}");
                    }
                    std::process::exit(1);
                }
            }
        }

        Command::Undo { command } => {
            let store = open_store(&config).await?;
            match command {
                UndoCommand::List => {
                    let snapshots = store.list().await;
                    if snapshots.is_empty() {
                        println!("no snapshots");
                    }
                    for snapshot in snapshots {
                        println!(
                            "{}  {}  {}  {}",
                            snapshot.id,
                            snapshot.created_at.format("%Y-%m-%d %H:%M"),
                            snapshot.pattern_id,
                            snapshot.description
                        );
                    }
                }
                UndoCommand::Restore { id } => match store.undo(&id).await {
                    UndoOutcome::Restored { message } => println!("{message}"),
                    UndoOutcome::Expired => {
                        eprintln!("snapshot {id} has expired");
                        std::process::exit(1);
                    }
                    UndoOutcome::NotFound => {
                        eprintln!("snapshot {id} not found");
                        std::process::exit(1);
                    }
                    UndoOutcome::Failed { error } => {
                        eprintln!("restore failed: {error}");
                        std::process::exit(1);
                    }
                },
                UndoCommand::Cleanup => {
                    let swept = store.cleanup_expired().await;
                    println!("removed {swept} expired snapshot(s)");
                }
            }
        }

        Command::Whitelist { command } => {
            let gate = WhitelistGate::load(&config.whitelist_path());
            match command {
                WhitelistCommand::Show => {
                    println!(
                        "whitelist v{} — {}",
                        gate.version(),
                        gate.description()
                    );
                    for entry in gate.entries() {
                        println!("  {entry}");
                    }
                    if gate.is_empty() {
                        println!("  (empty — all servers denied)");
                    }
                }
                WhitelistCommand::Check { path } => {
                    if gate.contains(&path) {
                        println!("{} is whitelisted", path.display());
                    } else {
                        println!("{} is NOT whitelisted", path.display());
                        std::process::exit(1);
                    }
                }
            }
        }
    }

    Ok(())
}

async fn build_orchestrator(config: &Config) -> Result<Orchestrator> {
    let whitelist = Arc::new(WhitelistGate::load(&config.whitelist_path()));
    let supervisor = Arc::new(ProcessSupervisor::new(
        config.rpc_timeout(),
        &config.rpc.protocol_version,
    ));
    let undo = open_store(config).await?;

    let approvals: Arc<dyn ApprovalBroker> = match config.approval.mode {
        ApprovalMode::Cli => Arc::new(CliApprovalBroker::default_timeout()),
        ApprovalMode::Deny => Arc::new(AutoDenyBroker {
            reason: "approvals disabled by config".to_string(),
        }),
    };

    Ok(Orchestrator::new(
        whitelist,
        supervisor,
        RiskEngine::new(),
        undo,
        approvals,
        config.audit_dir(),
    ))
}

async fn open_store(config: &Config) -> Result<Arc<ReversibleOperationStore>> {
    let store =
        ReversibleOperationStore::open(&config.snapshot_dir(), config.undo.ttl_days).await?;
    Ok(Arc::new(store))
}
