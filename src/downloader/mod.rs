//! Downloader job: NNTP server → local article files
//!
//! Each cycle connects to the news server, walks the configured groups in
//! status-file order and fetches every article after the stored cursor up to
//! the group's last article. Each article lands in its own
//! `<group>_article_<id>.txt` file. The cursors are persisted once per cycle,
//! then the job sleeps and starts over.
//!
//! A group's cursor only moves forward over articles that were actually
//! captured. When an article id does not answer `220`, later ids in the same
//! pass are still fetched, but the cursor stays in front of the gap so the
//! missing id is requested again next cycle. An article that never becomes
//! available is therefore retried every cycle.

use crate::config::{DownloaderConfig, RetryConfig, interval_minutes};
use crate::error::{Error, Result};
use crate::nntp::{NntpSession, codes, probe_group, reply_is};
use crate::retry::{connect_session, sleep_or_cancelled};
use crate::status_store::StatusStore;
use crate::types::{DownloadReport, GroupReport, NewsgroupStatus};
use futures::{TryStreamExt, pin_mut};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufWriter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// File name an article is stored under inside the download directory
pub fn article_file_name(group: &str, article_id: u64) -> String {
    format!("{}_article_{}.txt", group, article_id)
}

/// Long-running job that downloads new articles from the configured groups
pub struct Downloader {
    config: DownloaderConfig,
    retry: RetryConfig,
    store: StatusStore,
}

impl Downloader {
    /// Create a downloader; nothing is read or connected until [`run`](Self::run)
    pub fn new(config: DownloaderConfig, retry: RetryConfig) -> Self {
        let store = StatusStore::new(config.status_file.clone());
        Self {
            config,
            retry,
            store,
        }
    }

    /// Run download cycles until cancelled or a fatal error occurs.
    ///
    /// Returns `Ok(())` when cancellation was requested. A missing or malformed
    /// status file, a dropped connection mid-cycle, or a malformed `GROUP` reply
    /// end the job with an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        info!(server = %self.config.server.addr(), "Downloader started");

        let mut groups = self.store.load().await?;

        tokio::fs::create_dir_all(&self.config.download_dir)
            .await
            .map_err(|e| {
                Error::config(
                    "download_dir",
                    format!(
                        "unable to create download directory {}: {}",
                        self.config.download_dir.display(),
                        e
                    ),
                )
            })?;

        loop {
            let Some(mut session) =
                connect_session(&self.config.server, &self.retry, &cancel).await?
            else {
                break;
            };

            info!("Download cycle started");
            let cycle = self.run_cycle(&mut session, &mut groups, &cancel).await;
            drop(session);

            // Cursors only move over captured articles, so they are safe to
            // persist even when the cycle failed part-way.
            let saved = self.store.save(&groups).await;
            let report = match cycle {
                Ok(report) => report,
                Err(e) => {
                    if let Err(save_err) = saved {
                        error!(error = %save_err, "Failed to save newsgroup status");
                    }
                    return Err(e);
                }
            };
            saved?;

            info!(
                downloaded = report.total_downloaded(),
                groups = report.groups.len(),
                "Download cycle finished"
            );

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

        info!("Downloader stopped");
        Ok(())
    }

    /// One pass over all groups on an open session, ending with `QUIT`.
    ///
    /// Cursors in `groups` are advanced in place.
    pub async fn run_cycle<S>(
        &self,
        session: &mut NntpSession<S>,
        groups: &mut [NewsgroupStatus],
        cancel: &CancellationToken,
    ) -> Result<DownloadReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        session.greeting().await?;

        if let Some(credentials) = &self.config.credentials {
            session.authenticate(credentials).await?;
        }

        let mut report = DownloadReport::default();
        for group in groups.iter_mut() {
            if cancel.is_cancelled() {
                info!("Shutdown requested, ending download cycle early");
                break;
            }
            report
                .groups
                .push(self.download_group(session, group, cancel).await?);
        }

        session.quit().await?;
        Ok(report)
    }

    async fn download_group<S>(
        &self,
        session: &mut NntpSession<S>,
        group: &mut NewsgroupStatus,
        cancel: &CancellationToken,
    ) -> Result<GroupReport>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut report = GroupReport {
            name: group.name.clone(),
            selected: false,
            downloaded: 0,
            unavailable: 0,
        };

        let Some(range) = probe_group(session, &group.name).await? else {
            return Ok(report);
        };
        report.selected = true;

        // Select the group again so the ARTICLE commands below run right after
        // a GROUP on every server.
        session.command(&format!("GROUP {}", group.name)).await?;

        info!(group = %group.name, "Downloading new articles");

        let Some(start) = group.next_article(&range) else {
            return Ok(report);
        };
        let mut contiguous = true;

        for article_id in start..=range.last_article {
            if cancel.is_cancelled() {
                break;
            }

            let reply = session
                .command(&format!("ARTICLE {}", article_id))
                .await?
                .ok_or_else(|| {
                    Error::closed(format!("waiting for the ARTICLE {} reply", article_id))
                })?;

            if !reply_is(Some(reply.as_str()), codes::ARTICLE_FOLLOWS) {
                debug!(
                    group = %group.name,
                    article_id,
                    reply = %reply,
                    "Article unavailable"
                );
                report.unavailable += 1;
                contiguous = false;
                continue;
            }

            self.save_article(session, &range.name, article_id).await?;
            report.downloaded += 1;
            if contiguous {
                group.advance(article_id);
            }
        }

        info!(
            group = %group.name,
            downloaded = report.downloaded,
            cursor = group.last_article_downloaded,
            "{} new articles downloaded",
            report.downloaded
        );
        Ok(report)
    }

    /// Stream one article body to disk.
    ///
    /// The body is written to a `.part` file that is renamed into place only
    /// after the terminator has been read.
    async fn save_article<S>(
        &self,
        session: &mut NntpSession<S>,
        group: &str,
        article_id: u64,
    ) -> Result<PathBuf>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let path = self
            .config
            .download_dir
            .join(article_file_name(group, article_id));
        let part = path.with_extension("txt.part");

        let result = async {
            let mut file = BufWriter::new(tokio::fs::File::create(&part).await?);

            let body = session.read_body();
            pin_mut!(body);
            while let Some(line) = body.try_next().await? {
                file.write_all(&line).await?;
                file.write_all(b"\n").await?;
            }

            file.flush().await?;
            drop(file);
            tokio::fs::rename(&part, &path).await?;
            Ok::<_, Error>(())
        }
        .await;

        if let Err(e) = result {
            tokio::fs::remove_file(&part).await.ok();
            return Err(e);
        }

        debug!(file = %path.display(), "Article saved");
        Ok(path)
    }
}
