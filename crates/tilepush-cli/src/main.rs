//! tilepush: batch uploader of CityGML files to Cesium ion.
//!
//! Set CESIUM_ION_TOKEN (or put it in a `.env` file). Other settings come from
//! the environment and can be overridden by flags.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use tilepush_api_client::ApiClient;
use tilepush_cli::{
    discover_files, follow_up_hint, format_archive_info, format_asset_info, format_asset_line,
    init_tracing, recent_assets, status_marker,
};
use tilepush_core::models::{ArchiveId, ArchiveInfo, ArchiveStatus, AssetId};
use tilepush_core::UploaderConfig;
use tilepush_storage::S3Uploader;
use tilepush_worker::{
    save_download, AssetWorkflow, BatchRunner, TracingObserver, WorkflowOptions,
};

#[derive(Parser)]
#[command(name = "tilepush", about = "Upload CityGML files to Cesium ion and track their tiling")]
struct Cli {
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Print command results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload every matching file in a directory
    Upload(UploadArgs),
    /// Show the status of one or more assets
    Status {
        /// Asset ids
        #[arg(required = true)]
        asset_ids: Vec<AssetId>,
        /// Re-check until every asset is COMPLETE, ERROR or DATA_ERROR
        #[arg(long)]
        monitor: bool,
        /// Seconds between checks when monitoring
        #[arg(long, default_value = "30")]
        interval: u64,
    },
    /// List recent assets, newest first
    List {
        /// Maximum number of assets
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// List archives
    Archives,
    /// Download archives (all completed ones unless ids are given)
    Download {
        /// Specific archive ids
        #[arg(long, num_args = 1..)]
        archive_ids: Vec<ArchiveId>,
        /// Output directory for archives
        #[arg(long, env = "OUTPUT_DIR", default_value = "converted")]
        output_dir: PathBuf,
        /// Only list what is available
        #[arg(long)]
        list_only: bool,
    },
}

#[derive(Args)]
struct UploadArgs {
    /// Directory to scan for input files
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// File extension to pick up
    #[arg(long)]
    extension: Option<String>,
    /// Maximum concurrent uploads
    #[arg(long)]
    workers: Option<usize>,
    /// Wait for processing to complete
    #[arg(long)]
    wait: bool,
    /// Create an archive after processing (requires --wait)
    #[arg(long)]
    archive: bool,
    /// Download the archive (requires --archive)
    #[arg(long)]
    download: bool,
    /// Output directory for downloaded archives
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Seconds between processing status checks
    #[arg(long)]
    poll_interval: Option<u64>,
    /// Seconds to wait for processing before giving up
    #[arg(long)]
    processing_timeout: Option<u64>,
    /// Seconds to wait for an archive before giving up
    #[arg(long)]
    archive_timeout: Option<u64>,
}

impl UploadArgs {
    fn apply(&self, config: &mut UploaderConfig) {
        if let Some(ref dir) = self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(ref ext) = self.extension {
            config.file_extension = ext.trim_start_matches('.').to_lowercase();
        }
        if let Some(workers) = self.workers {
            config.concurrency = workers;
        }
        config.wait_for_completion |= self.wait;
        config.create_archive |= self.archive;
        config.download_archive |= self.download;
        if let Some(ref dir) = self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(secs) = self.poll_interval {
            config.processing_poll_interval_secs = secs;
        }
        if let Some(secs) = self.processing_timeout {
            config.processing_timeout_secs = secs;
        }
        if let Some(secs) = self.archive_timeout {
            config.archive_timeout_secs = secs;
        }
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

fn load_config() -> anyhow::Result<UploaderConfig> {
    UploaderConfig::from_env().context(
        "Failed to load configuration. Set CESIUM_ION_TOKEN (a .env file with CESIUM_ION_TOKEN=... works too)",
    )
}

/// Cancel `token` on the first Ctrl+C.
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping");
            token.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref(), cli.log_json)?;

    match cli.command {
        Commands::Upload(args) => upload(args, cli.json).await,
        Commands::Status {
            asset_ids,
            monitor,
            interval,
        } => {
            let client = ApiClient::from_config(&load_config()?)?;
            if monitor {
                monitor_assets(&client, &asset_ids, Duration::from_secs(interval.max(1))).await
            } else {
                check_assets(&client, &asset_ids, cli.json).await
            }
        }
        Commands::List { limit } => {
            let client = ApiClient::from_config(&load_config()?)?;
            let assets = recent_assets(
                client.list_assets().await.context("Failed to list assets")?,
                limit,
            );
            if cli.json {
                print_json(&assets)?;
            } else if assets.is_empty() {
                println!("No assets found");
            } else {
                println!("Recent assets (limit: {})", limit);
                println!("{}", "=".repeat(60));
                for (i, asset) in assets.iter().enumerate() {
                    println!(
                        "{:2}. {} [{}] {} - {}",
                        i + 1,
                        status_marker(&asset.status),
                        asset.id,
                        asset.name.as_deref().unwrap_or("Unnamed"),
                        asset.status
                    );
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Archives => {
            let client = ApiClient::from_config(&load_config()?)?;
            let archives = client
                .list_archives()
                .await
                .context("Failed to list archives")?;
            print_archives(&archives, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download {
            archive_ids,
            output_dir,
            list_only,
        } => {
            let client = ApiClient::from_config(&load_config()?)?;
            download_archives(&client, archive_ids, output_dir, list_only, cli.json).await
        }
    }
}

async fn upload(args: UploadArgs, json: bool) -> anyhow::Result<ExitCode> {
    let mut config = load_config()?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let files = discover_files(&config.data_dir, &config.file_extension).with_context(|| {
        format!("Failed to read input directory {}", config.data_dir.display())
    })?;
    if files.is_empty() {
        println!(
            "No .{} files found in {}",
            config.file_extension,
            config.data_dir.display()
        );
        return Ok(ExitCode::SUCCESS);
    }
    println!(
        "Found {} .{} files in {}",
        files.len(),
        config.file_extension,
        config.data_dir.display()
    );
    if config.wait_for_completion {
        println!("Will wait for processing to complete");
    }

    let client = ApiClient::from_config(&config).context("Failed to create API client")?;
    let workflow = AssetWorkflow::new(
        Arc::new(client),
        Arc::new(S3Uploader::default()),
        Arc::new(TracingObserver),
        WorkflowOptions::from_config(&config),
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    let runner = BatchRunner::new(workflow, config.concurrency).with_cancellation(cancel);

    let result = runner.run(files).await;

    if json {
        print_json(&result)?;
    } else {
        println!("\n{}", result);
    }

    if !config.wait_for_completion {
        if let Some(hint) = follow_up_hint(&result.asset_ids()) {
            println!("\nMonitor processing status with:");
            println!("   {}", hint);
        }
    }

    if result.is_full_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::from(1))
    }
}

async fn check_assets(
    client: &ApiClient,
    asset_ids: &[AssetId],
    json: bool,
) -> anyhow::Result<ExitCode> {
    let mut all_found = true;

    if let [asset_id] = asset_ids {
        match client.get_asset(*asset_id).await {
            Ok(asset) if json => print_json(&asset)?,
            Ok(asset) => {
                println!("{} Status: {}", status_marker(&asset.status), asset.status);
                println!("{}", format_asset_info(&asset));
            }
            Err(e) => {
                all_found = false;
                println!("Could not retrieve asset {}: {}", asset_id, e);
            }
        }
    } else {
        let mut found = Vec::new();
        for (i, asset_id) in asset_ids.iter().enumerate() {
            match client.get_asset(*asset_id).await {
                Ok(asset) => {
                    if !json {
                        println!("[{}/{}] {}", i + 1, asset_ids.len(), format_asset_line(&asset));
                    }
                    found.push(asset);
                }
                Err(e) => {
                    all_found = false;
                    println!("[{}/{}] Could not retrieve asset {}: {}", i + 1, asset_ids.len(), asset_id, e);
                }
            }
        }
        if json {
            print_json(&found)?;
        }
    }

    Ok(if all_found {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn monitor_assets(
    client: &ApiClient,
    asset_ids: &[AssetId],
    interval: Duration,
) -> anyhow::Result<ExitCode> {
    println!(
        "Monitoring {} assets (checking every {}s). Press Ctrl+C to stop.",
        asset_ids.len(),
        interval.as_secs()
    );

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    loop {
        println!("\nStatus check at {}", chrono::Local::now().format("%H:%M:%S"));
        println!("{}", "-".repeat(40));

        let mut all_terminal = true;
        for asset_id in asset_ids {
            match client.get_asset(*asset_id).await {
                Ok(asset) => {
                    if !asset.status.is_terminal() {
                        all_terminal = false;
                    }
                    println!("{}", format_asset_line(&asset));
                }
                Err(e) => {
                    // Transient errors keep the asset under watch.
                    if e.is_transient() {
                        all_terminal = false;
                    }
                    println!("{}: could not retrieve ({})", asset_id, e);
                }
            }
        }

        if all_terminal {
            println!("\nAll monitored assets have finished processing");
            return Ok(ExitCode::SUCCESS);
        }

        println!("\nNext check in {} seconds...", interval.as_secs());
        tokio::select! {
            _ = cancel.cancelled() => {
                println!("\nMonitoring stopped by user");
                return Ok(ExitCode::SUCCESS);
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

fn print_archives(archives: &[ArchiveInfo], json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&archives);
    }
    if archives.is_empty() {
        println!("No archives found");
        return Ok(());
    }
    println!("Archives:");
    println!("{}", "-".repeat(40));
    for archive in archives {
        println!("{}", format_archive_info(archive));
    }
    Ok(())
}

#[derive(Serialize)]
struct DownloadResult {
    archive_id: ArchiveId,
    path: Option<PathBuf>,
    error: Option<String>,
}

async fn download_one(client: &ApiClient, archive: &ArchiveInfo, output_dir: &Path) -> DownloadResult {
    let saved = match client.download_archive(archive.id).await {
        Ok(download) => save_download(download, output_dir, &archive.file_name())
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match saved {
        Ok(saved) => DownloadResult {
            archive_id: archive.id,
            path: Some(saved.path),
            error: None,
        },
        Err(error) => {
            tracing::warn!(archive_id = archive.id, error = %error, "Archive download failed");
            DownloadResult {
                archive_id: archive.id,
                path: None,
                error: Some(error),
            }
        }
    }
}

async fn download_archives(
    client: &ApiClient,
    archive_ids: Vec<ArchiveId>,
    output_dir: PathBuf,
    list_only: bool,
    json: bool,
) -> anyhow::Result<ExitCode> {
    if list_only {
        let archives = client
            .list_archives()
            .await
            .context("Failed to list archives")?;
        print_archives(&archives, json)?;
        return Ok(ExitCode::SUCCESS);
    }

    let mut results = Vec::new();
    if archive_ids.is_empty() {
        let completed: Vec<ArchiveInfo> = client
            .list_archives()
            .await
            .context("Failed to list archives")?
            .into_iter()
            .filter(|a| a.status == ArchiveStatus::Complete)
            .collect();
        if completed.is_empty() {
            println!("No completed archives to download");
            return Ok(ExitCode::SUCCESS);
        }
        for archive in &completed {
            results.push(download_one(client, archive, &output_dir).await);
        }
    } else {
        for archive_id in archive_ids {
            let result = match client.get_archive(archive_id).await {
                Ok(archive) if archive.status == ArchiveStatus::Complete => {
                    download_one(client, &archive, &output_dir).await
                }
                Ok(archive) => DownloadResult {
                    archive_id,
                    path: None,
                    error: Some(format!("archive is not complete (status {})", archive.status)),
                },
                Err(e) => DownloadResult {
                    archive_id,
                    path: None,
                    error: Some(e.to_string()),
                },
            };
            results.push(result);
        }
    }

    let succeeded = results.iter().filter(|r| r.path.is_some()).count();
    if json {
        print_json(&results)?;
    } else {
        println!(
            "\nDownload summary: {}/{} archives downloaded",
            succeeded,
            results.len()
        );
        for result in &results {
            match (&result.path, &result.error) {
                (Some(path), _) => println!("  ✅ {}: {}", result.archive_id, path.display()),
                (None, Some(error)) => println!("  ❌ {}: {}", result.archive_id, error),
                (None, None) => println!("  ❌ {}", result.archive_id),
            }
        }
        if succeeded > 0 {
            println!("\nFiles are saved in: {}", output_dir.display());
        }
    }

    Ok(if succeeded == results.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
