//! medialife: run the media lifecycle worker or drive the service from the command line.
//!
//! Configuration comes from the environment (and `.env`). Without DATABASE_URL the service runs
//! on an in-memory store, which only makes sense for `worker` smoke tests.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use clap::{Parser, Subcommand};
use medialife_cli::{file_chunks, file_name_of, guess_mime, parse_metadata, print_json};
use medialife_core::models::{ListFilters, MediaPatch, MediaType};
use medialife_core::Config;
use medialife_infra::{init_telemetry, shutdown_telemetry, LogFormat};
use medialife_services::{build_media_service, ServiceHandle, UploadInfo, UploadRequest};

#[derive(Parser)]
#[command(name = "medialife", about = "Media lifecycle service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the task queue and the pending sweep until interrupted
    Worker {
        /// Seconds between pending sweeps
        #[arg(long, default_value = "30")]
        sweep_interval_secs: u64,
    },
    /// Upload a file as-is and schedule processing
    Upload {
        file: PathBuf,
        /// Uploader identity
        #[arg(long)]
        created_by: String,
        /// Content type; guessed from the extension when omitted
        #[arg(long)]
        mime_type: Option<String>,
        /// Stored name; defaults to the file name
        #[arg(long)]
        name: Option<String>,
        /// Metadata entry, repeatable
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },
    /// Upload a file in chunks; the stored payload is the canonical image encoding
    UploadStream {
        file: PathBuf,
        #[arg(long)]
        created_by: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },
    /// Get a media record by id
    Get { id: String },
    /// List media with filters and pagination
    List {
        #[arg(long)]
        created_by: Option<String>,
        /// image, video, audio or other
        #[arg(long)]
        r#type: Option<String>,
        #[arg(long)]
        mime_type: Option<String>,
        #[arg(long, default_value = "20")]
        limit: i64,
        #[arg(long, default_value = "0")]
        offset: i64,
        /// createdAt, name, size or updatedAt
        #[arg(long, default_value = "")]
        sort_by: String,
        /// asc or desc
        #[arg(long, default_value = "")]
        sort_order: String,
    },
    /// Rename a media or change its metadata; an empty value removes the key
    Update {
        id: String,
        /// Acting identity; must be the uploader
        #[arg(long)]
        actor: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },
    /// Delete a media, its variants and their blobs
    Delete {
        id: String,
        #[arg(long)]
        actor: String,
    },
    /// List the variants of a media
    Variants { media_id: String },
    /// Delete a single variant
    DeleteVariant { variant_id: String },
    /// Process a media inline
    Process { id: String },
    /// Process records still pending, once
    ProcessPending {
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Time-limited URL for the primary blob
    SignedUrl {
        id: String,
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate()?;

    let format: LogFormat = config.log_format().parse()?;
    init_telemetry(config.service_name(), config.environment(), format)?;

    let handle = build_media_service(&config).await?;
    let result = run(cli.command, &config, &handle).await;

    handle.shutdown().await;
    shutdown_telemetry().await;
    result
}

async fn run(command: Commands, config: &Config, handle: &ServiceHandle) -> anyhow::Result<()> {
    let service = &handle.service;

    match command {
        Commands::Worker {
            sweep_interval_secs,
        } => {
            run_worker(
                handle,
                Duration::from_secs(sweep_interval_secs.max(1)),
                config.pending_sweep_limit(),
            )
            .await;
        }
        Commands::Upload {
            file,
            created_by,
            mime_type,
            name,
            metadata,
        } => {
            let mime_type = match mime_type {
                Some(mime_type) => mime_type,
                None => guess_mime(&file).map(str::to_string).with_context(|| {
                    format!(
                        "Cannot guess content type of {}; pass --mime-type",
                        file.display()
                    )
                })?,
            };
            let file_name = match name {
                Some(name) => name,
                None => file_name_of(&file)?,
            };
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let media = service
                .upload_media(UploadRequest {
                    file_name,
                    mime_type,
                    expected_size: Some(data.len() as u64),
                    data: Bytes::from(data),
                    created_by,
                    metadata: parse_metadata(&metadata)?,
                })
                .await?;
            print_json(&media)?;
        }
        Commands::UploadStream {
            file,
            created_by,
            name,
            metadata,
        } => {
            let reader = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let expected_size = reader.metadata().await.ok().map(|m| m.len());
            let info = UploadInfo {
                file_name: match name {
                    Some(name) => name,
                    None => file_name_of(&file)?,
                },
                created_by,
                metadata: parse_metadata(&metadata)?,
                expected_size,
            };

            let media = service
                .upload_media_stream(file_chunks(reader, info))
                .await?;
            print_json(&media)?;
        }
        Commands::Get { id } => {
            print_json(&service.get_media(&id).await?)?;
        }
        Commands::List {
            created_by,
            r#type,
            mime_type,
            limit,
            offset,
            sort_by,
            sort_order,
        } => {
            let media_type = r#type
                .as_deref()
                .map(str::parse::<MediaType>)
                .transpose()?;
            let page = service
                .list_media(&ListFilters {
                    created_by,
                    media_type,
                    mime_type,
                    limit,
                    offset,
                    sort_by,
                    sort_order,
                })
                .await?;
            print_json(&page)?;
        }
        Commands::Update {
            id,
            actor,
            name,
            metadata,
        } => {
            let patch = MediaPatch {
                name,
                metadata: if metadata.is_empty() {
                    None
                } else {
                    Some(parse_metadata(&metadata)?)
                },
            };
            print_json(&service.update_media(&id, &actor, patch).await?)?;
        }
        Commands::Delete { id, actor } => {
            let deleted = service.delete_media(&id, &actor).await?;
            print_json(&serde_json::json!({ "success": deleted, "id": id }))?;
        }
        Commands::Variants { media_id } => {
            print_json(&service.get_media_variants(&media_id).await?)?;
        }
        Commands::DeleteVariant { variant_id } => {
            let deleted = service.delete_variant(&variant_id).await?;
            print_json(&serde_json::json!({ "success": deleted, "id": variant_id }))?;
        }
        Commands::Process { id } => {
            let media = service.process_media(&id).await?;
            print_json(&serde_json::json!({
                "success": true,
                "id": media.id,
                "processingStatus": media.processing_status,
            }))?;
        }
        Commands::ProcessPending { limit } => {
            let limit = limit.unwrap_or_else(|| config.pending_sweep_limit());
            let processed = service.process_pending(limit).await?;
            print_json(&serde_json::json!({ "processed": processed }))?;
        }
        Commands::SignedUrl { id, ttl_secs } => {
            let url = service
                .signed_url(&id, ttl_secs.map(Duration::from_secs))
                .await?;
            print_json(&serde_json::json!({ "url": url }))?;
        }
    }

    Ok(())
}

/// Sweep pending records on a fixed interval until a shutdown signal arrives. Queued tasks are
/// handled by the queue's own workers meanwhile.
async fn run_worker(handle: &ServiceHandle, every: Duration, limit: i64) {
    tracing::info!(
        sweep_interval_secs = every.as_secs(),
        sweep_limit = limit,
        "Worker started"
    );

    let mut ticker = tokio::time::interval(every);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                match handle.service.process_pending(limit).await {
                    Ok(0) => {}
                    Ok(processed) => tracing::info!(processed, "Pending records processed"),
                    Err(e) => tracing::warn!(error = %e, "Pending sweep failed"),
                }
            }
        }
    }

    tracing::info!("Worker stopping");
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        _ = terminate => tracing::info!("Received terminate signal"),
    }
}
