//! Tenantvault CLI: run gateway and backup operations against the configured
//! object store.
//!
//! Configuration comes from the environment (or `.env`): STORAGE_BACKEND,
//! S3_BUCKET, S3_REGION, ALLOWED_CONTAINERS, OVERWRITE_POLICY, ...

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tenantvault_cli::{error_report, init_tracing};
use tenantvault_core::{GatewayConfig, GatewayError};
use tenantvault_gateway::{build_gateway, BackupOrchestrator, CancellationToken, StorageGateway};

#[derive(Parser)]
#[command(name = "tenantvault", about = "Multi-tenant object storage gateway CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file for a tenant
    Upload {
        container: String,
        tenant: String,
        /// Path of the local file to upload
        file: PathBuf,
        /// Declared content type; never inferred from the extension
        #[arg(long)]
        content_type: String,
        /// Stored file name (defaults to the local file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Download a tenant's file
    Download {
        container: String,
        tenant: String,
        name: String,
        /// Where to write the content
        #[arg(long, short)]
        output: PathBuf,
    },
    /// Delete a tenant's file
    Delete {
        container: String,
        tenant: String,
        name: String,
    },
    /// List a tenant's files in a container
    List { container: String, tenant: String },
    /// Issue temporary read access to a file
    Url {
        container: String,
        tenant: String,
        name: String,
        /// Expiry in minutes (default from TEMP_ACCESS_EXPIRY_MINUTES)
        #[arg(long)]
        expiry_minutes: Option<u32>,
    },
    /// Backup operations
    Backup {
        #[command(subcommand)]
        sub: BackupCommands,
    },
}

#[derive(Subcommand)]
enum BackupCommands {
    /// Back up a tenant's files from one or more containers
    Create {
        tenant: String,
        /// Comma-separated source containers
        #[arg(long, value_delimiter = ',', required = true)]
        containers: Vec<String>,
    },
    /// Restore a backup into its original containers
    Restore { tenant: String, backup_id: String },
    /// List a tenant's backups, newest first
    List { tenant: String },
    /// Delete a backup and its manifest
    Delete { tenant: String, backup_id: String },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn run(
    command: Commands,
    gateway: Arc<StorageGateway>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Commands::Upload {
            container,
            tenant,
            file,
            content_type,
            name,
        } => {
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Cannot derive a file name; pass --name")?,
            };
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let outcome = gateway
                .upload(&container, &tenant, &name, reader, &content_type, cancel)
                .await?;
            print_json(&outcome)?;
        }
        Commands::Download {
            container,
            tenant,
            name,
            output,
        } => {
            let object = gateway.download(&container, &tenant, &name, cancel).await?;
            tokio::fs::write(&output, &object.data)
                .await
                .with_context(|| format!("Failed to write {}", output.display()))?;
            print_json(&object.metadata)?;
        }
        Commands::Delete {
            container,
            tenant,
            name,
        } => {
            let deleted = gateway.delete(&container, &tenant, &name, cancel).await?;
            print_json(&serde_json::json!({ "deleted": deleted }))?;
        }
        Commands::List { container, tenant } => {
            let names = gateway.list(&container, &tenant, cancel).await?;
            print_json(&names)?;
        }
        Commands::Url {
            container,
            tenant,
            name,
            expiry_minutes,
        } => {
            let access = gateway
                .temporary_access(&container, &tenant, &name, expiry_minutes, cancel)
                .await?;
            print_json(&access)?;
        }
        Commands::Backup { sub } => {
            let backups = BackupOrchestrator::new(gateway);
            match sub {
                BackupCommands::Create { tenant, containers } => {
                    let manifest = backups.create_backup(&tenant, &containers, cancel).await?;
                    print_json(&manifest)?;
                }
                BackupCommands::Restore { tenant, backup_id } => {
                    let result = backups.restore_backup(&tenant, &backup_id, cancel).await?;
                    print_json(&result)?;
                }
                BackupCommands::List { tenant } => {
                    let listed = backups.list_backups(&tenant, cancel).await?;
                    print_json(&listed)?;
                }
                BackupCommands::Delete { tenant, backup_id } => {
                    let deleted = backups.delete_backup(&tenant, &backup_id, cancel).await?;
                    print_json(&serde_json::json!({ "deleted": deleted }))?;
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = GatewayConfig::from_env().context("Invalid configuration")?;
    let gateway = Arc::new(
        build_gateway(&config)
            .await
            .context("Failed to initialize storage gateway")?,
    );

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; the addressed objects may be in an unknown state");
            on_interrupt.cancel();
        }
    });

    if let Err(err) = run(cli.command, gateway, &cancel).await {
        if let Some(gateway_err) = err.downcast_ref::<GatewayError>() {
            let report = error_report(gateway_err, config.is_production());
            eprintln!("{}", serde_json::to_string_pretty(&report)?);
        }
        return Err(err);
    }

    Ok(())
}
