//! TagFS daemon binary.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tagfs_blobstore::BlobStore;
use tagfs_core::{DaemonConfig, Endpoints};
use tagfs_daemon::{DaemonTransport, Dispatcher, FsModel};
use tagfs_metadata::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// TagFS - a tag-oriented user-space filesystem daemon
#[derive(Parser, Debug)]
#[command(name = "tagfsd")]
#[command(version, about, long_about = None)]
struct Args {
    /// Mount point of the filesystem bridge
    #[arg(long)]
    mount: PathBuf,

    /// Storage root holding blobs and metadata
    #[arg(long)]
    root: PathBuf,

    /// Write a log file under <root>/metadata/ instead of stderr
    #[arg(long)]
    log: bool,

    /// Serve the tag view instead of the default folder tree
    #[arg(long = "tag-view")]
    tag_view: bool,

    /// Runtime directory for the transport endpoints
    #[arg(long, env = "TAGFS_RUNTIME_DIR")]
    runtime_dir: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // SAFETY: geteuid has no preconditions and cannot fail.
    if unsafe { libc::geteuid() } == 0 {
        bail!("refusing to run as the super-user");
    }

    let config = DaemonConfig {
        mount_point: args.mount,
        root: args.root,
        enable_logging: args.log,
        tag_view: args.tag_view,
    };

    std::fs::create_dir_all(config.metadata_dir())
        .with_context(|| format!("failed to create {}", config.metadata_dir().display()))?;

    init_tracing(&config)?;
    tracing::info!(
        mount = %config.mount_point.display(),
        root = %config.root.display(),
        tag_view = config.tag_view,
        "tagfsd v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let endpoints = Endpoints::in_dir(
        args.runtime_dir
            .unwrap_or_else(Endpoints::default_runtime_dir),
    );

    let metadata = SqliteStore::open(config.db_path())
        .await
        .context("failed to open metadata store")?;
    let blobs = BlobStore::new(&config.root)
        .await
        .context("failed to open blob store")?;
    let model = FsModel::new(metadata, blobs)
        .await
        .context("failed to build filesystem model")?;

    let transport = DaemonTransport::bind(endpoints).context(
        "failed to bind inbound endpoint (is another daemon running, or a stale socket left over?)",
    )?;
    tracing::info!("endpoints bound, dispatching requests");

    let mut dispatcher = Dispatcher::new(model, transport, config.tag_view);
    let run_result = dispatcher.run().await;

    // Flush-to-disk happens even when the loop died on a transport error;
    // losing mutations because a peer vanished is worse than the error.
    let (model, transport) = dispatcher.into_parts();
    model
        .metadata()
        .save(config.db_path())
        .await
        .context("failed to save metadata to backing file")?;
    transport.unlink_all();

    run_result.context("dispatcher failed")?;
    tracing::info!("tagfsd shut down cleanly");
    Ok(())
}

/// Route tracing output to the log file under `metadata/` when logging is
/// enabled, to stderr otherwise.
fn init_tracing(config: &DaemonConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());

    if config.enable_logging {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())
            .with_context(|| format!("failed to open {}", config.log_path().display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}
