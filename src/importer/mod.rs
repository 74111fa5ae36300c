//! Importer job: local message files → MBBS
//!
//! The import directory is the queue. Every cycle the directory is scanned
//! (non-recursively) for `*.txt` files; when there are none the cycle ends
//! without connecting. Otherwise one connection is opened and each file is
//! offered with `IHAVE <message-id>`:
//!
//! | Reply          | Action                                              |
//! |----------------|-----------------------------------------------------|
//! | `335`          | send the dot-stuffed body; delete on `235`, else keep |
//! | `435`          | server already has it, delete                        |
//! | anything else  | keep the file for the next cycle                     |
//!
//! Files without a `Message-ID:` header stay in the directory and are looked
//! at again every cycle.

use crate::config::{ImporterConfig, RetryConfig, interval_minutes};
use crate::error::{Error, Result};
use crate::nntp::{NntpSession, codes, reply_is};
use crate::retry::{connect_session, sleep_or_cancelled};
use crate::types::{ImportOutcome, ImportReport};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod message_id;

pub use message_id::extract_message_id;

/// Extension of the files picked up from the import directory
pub const MESSAGE_FILE_EXTENSION: &str = "txt";

/// Long-running job that feeds queued message files into the MBBS
pub struct Importer {
    config: ImporterConfig,
    retry: RetryConfig,
}

impl Importer {
    /// Create an importer; nothing is scanned or connected until [`run`](Self::run)
    pub fn new(config: ImporterConfig, retry: RetryConfig) -> Self {
        Self { config, retry }
    }

    /// Run import cycles until cancelled or a fatal error occurs.
    ///
    /// A missing import directory is fatal immediately. Returns `Ok(())` when
    /// cancellation was requested.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(server = %self.config.server.addr(), "Importer started");

        if !tokio::fs::metadata(&self.config.import_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(Error::config(
                "import_dir",
                format!(
                    "import directory not found: {}",
                    self.config.import_dir.display()
                ),
            ));
        }

        loop {
            let report = self.run_cycle(&cancel).await?;
            if report.connected {
                info!(
                    transferred = report.transferred,
                    already_present = report.already_present,
                    rejected = report.rejected,
                    skipped = report.skipped,
                    "Finished importing messages"
                );
            }

            if cancel.is_cancelled() {
                break;
            }
            info!(
                "Sleeping for {} minute(s)",
                interval_minutes(self.config.interval)
            );
            if !sleep_or_cancelled(&cancel, self.config.interval).await {
                break;
            }
        }

        info!("Importer stopped");
        Ok(())
    }

    /// Scan the directory and, if anything is queued, deliver it over one connection
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> Result<ImportReport> {
        info!("Started importing messages");

        let files = scan_message_files(&self.config.import_dir).await?;
        let mut report = ImportReport {
            scanned: files.len(),
            ..Default::default()
        };

        if files.is_empty() {
            info!("No message files found to import");
            return Ok(report);
        }

        let Some(mut session) = connect_session(&self.config.server, &self.retry, cancel).await?
        else {
            return Ok(report);
        };
        report.connected = true;

        self.import_files(&mut session, &files, &mut report, cancel)
            .await?;
        Ok(report)
    }

    /// Offer each file on an open session, ending with `QUIT`
    pub async fn import_files<S>(
        &self,
        session: &mut NntpSession<S>,
        files: &[PathBuf],
        report: &mut ImportReport,
        cancel: &CancellationToken,
    ) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        session.greeting().await?;

        for path in files {
            if cancel.is_cancelled() {
                info!("Shutdown requested, ending import cycle early");
                break;
            }
            let outcome = import_file(session, path).await?;
            report.record(&outcome);
        }

        session.quit().await?;
        Ok(())
    }
}

/// `*.txt` files directly inside `dir`, sorted by name
pub async fn scan_message_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_message = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(MESSAGE_FILE_EXTENSION))
            .unwrap_or(false);

        if is_message && entry.file_type().await?.is_file() {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Offer one file and act on the server's answers.
///
/// Only transport failures are returned as errors; everything else is an
/// [`ImportOutcome`].
async fn import_file<S>(session: &mut NntpSession<S>, path: &Path) -> Result<ImportOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let contents = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(file = %name, error = %e, "Error reading file");
            return Ok(ImportOutcome::Unreadable);
        }
    };

    // Only the header lookup needs text; the body is sent byte for byte
    let text = String::from_utf8_lossy(&contents);
    let Some(message_id) = extract_message_id(&text) else {
        debug!(file = %name, "No Message-ID header, skipping");
        return Ok(ImportOutcome::NoMessageId);
    };

    let reply = session.command(&format!("IHAVE {}", message_id)).await?;

    let outcome = if reply_is(reply.as_deref(), codes::SEND_ARTICLE) {
        session.send_body(body_lines(&contents)).await?;
        let reply = session.read_reply().await?;

        if reply_is(reply.as_deref(), codes::TRANSFER_OK) {
            ImportOutcome::Transferred
        } else {
            warn!(
                file = %name,
                reply = ?reply,
                "Message not accepted, file retained"
            );
            ImportOutcome::NotAccepted { response: reply }
        }
    } else if reply_is(reply.as_deref(), codes::NOT_WANTED) {
        debug!(file = %name, %message_id, "Server already has the article");
        ImportOutcome::AlreadyPresent
    } else {
        warn!(
            file = %name,
            reply = ?reply,
            "IHAVE rejected by server, file not sent"
        );
        ImportOutcome::Rejected { response: reply }
    };

    if matches!(
        outcome,
        ImportOutcome::Transferred | ImportOutcome::AlreadyPresent
    ) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(file = %name, error = %e, "Unable to delete imported file");
        }
    }

    Ok(outcome)
}

/// Split file contents into lines without decoding them.
///
/// Lines end at `\n` with an optional preceding `\r`; a final terminator
/// does not start an extra empty line.
fn body_lines(contents: &[u8]) -> impl Iterator<Item = &[u8]> {
    let trimmed = contents.strip_suffix(b"\n").unwrap_or(contents);
    (!contents.is_empty())
        .then(|| trimmed.split(|&b| b == b'\n'))
        .into_iter()
        .flatten()
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
}
