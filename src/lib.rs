//! # nntp-importer
//!
//! Bridges a Major BBS (MBBS) NNTP endpoint with an upstream Usenet server.
//!
//! Two independent jobs run side by side until shutdown:
//! - **Importer** - scans a local directory for `*.txt` message files and pushes
//!   each one to the MBBS with `IHAVE`, deleting files the server accepted or
//!   already had
//! - **Downloader** - walks the newsgroups listed in a status file, fetches every
//!   new article from the upstream server with `ARTICLE`, writes one file per
//!   article and persists the per-group cursor
//!
//! A fatal error in either job cancels the other one.
//!
//! ## Quick Start
//!
//! ```no_run
//! use nntp_importer::config::{
//!     Config, DownloaderConfig, ImporterConfig, RetryConfig, ServerConfig,
//! };
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         importer: ImporterConfig {
//!             server: ServerConfig::new("bbs.example.com"),
//!             import_dir: "messages".into(),
//!             interval: Duration::from_secs(5 * 60),
//!         },
//!         downloader: DownloaderConfig {
//!             server: ServerConfig::new("news.example.com"),
//!             credentials: None,
//!             download_dir: "messages".into(),
//!             status_file: "NNTPImporter.cfg".into(),
//!             interval: Duration::from_secs(5 * 60),
//!         },
//!         retry: RetryConfig::default(),
//!     };
//!
//!     // Runs until SIGINT/SIGTERM or a fatal job error
//!     nntp_importer::run_until_signal(config).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Downloader job (upstream server → files)
pub mod downloader;
/// Error types
pub mod error;
/// Importer job (files → MBBS)
pub mod importer;
/// Line-oriented NNTP client session
pub mod nntp;
/// Connect retry and cancellable sleeps
pub mod retry;
/// Newsgroup status file persistence
pub mod status_store;
/// Runs both jobs under one cancellation token
pub mod supervisor;
/// Core types
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use config::{
    Config, Credentials, DownloaderConfig, ImporterConfig, RetryConfig, ServerConfig,
};
pub use downloader::Downloader;
pub use error::{Error, Result};
pub use importer::Importer;
pub use nntp::NntpSession;
pub use status_store::StatusStore;
pub use types::{
    DownloadReport, GroupReport, ImportOutcome, ImportReport, NewsgroupRange, NewsgroupStatus,
};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run both jobs until a termination signal arrives or one of them fails.
///
/// SIGTERM and SIGINT (Ctrl+C on non-unix platforms) cancel both jobs, which
/// then finish the item in hand and stop. Returns the first fatal job error.
pub async fn run_until_signal(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn(cancel_on_signal(cancel.clone()));

    let result = supervisor::run(config, cancel.clone()).await;

    // Releases the signal task when the jobs ended on their own
    cancel.cancel();
    let _ = signal_task.await;

    result
}

/// Cancel `cancel` on SIGTERM or SIGINT; returns early if it is cancelled elsewhere
#[cfg(unix)]
async fn cancel_on_signal(cancel: CancellationToken) {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration can fail in restricted environments
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
                return cancel_on_ctrl_c(cancel).await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, stopping jobs"),
        _ = sigint.recv() => info!("Received SIGINT (Ctrl+C), stopping jobs"),
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}

#[cfg(not(unix))]
async fn cancel_on_signal(cancel: CancellationToken) {
    cancel_on_ctrl_c(cancel).await
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Received Ctrl+C, stopping jobs"),
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl+C, signals will not stop the jobs");
                return;
            }
        },
        _ = cancel.cancelled() => return,
    }
    cancel.cancel();
}
