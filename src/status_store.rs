//! Newsgroup status file
//!
//! One record per line, `<group> <last article downloaded>`, whitespace
//! separated. The file lists the groups to download and is the only record of
//! where each group resumes, so a missing or malformed file is fatal to the
//! downloader.
//!
//! Saving rewrites the whole file: records go to a sibling `.tmp` file which is
//! then renamed over the original, so a crash mid-write leaves the previous
//! contents intact.

use crate::error::{Error, Result};
use crate::types::NewsgroupStatus;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Reads and writes the per-group download cursors
#[derive(Clone, Debug)]
pub struct StatusStore {
    path: PathBuf,
}

impl StatusStore {
    /// Store backed by the file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records in file order.
    ///
    /// Blank lines are ignored. Fails when the file cannot be read, a line is
    /// malformed, or no groups are listed.
    pub async fn load(&self) -> Result<Vec<NewsgroupStatus>> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.error(None, format!("unable to read: {}", e)))?;

        let groups = parse_status(&contents)
            .map_err(|(line, reason)| self.error(Some(line), reason))?;

        if groups.is_empty() {
            return Err(self.error(None, "no newsgroups configured".to_string()));
        }

        debug!(
            path = %self.path.display(),
            groups = groups.len(),
            "Loaded newsgroup status"
        );
        Ok(groups)
    }

    /// Replace the file with `groups`, preserving their order
    pub async fn save(&self, groups: &[NewsgroupStatus]) -> Result<()> {
        let tmp = self.tmp_path();

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(format_status(groups).as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp, &self.path).await
        };

        if let Err(e) = write.await {
            tokio::fs::remove_file(&tmp).await.ok();
            return Err(self.error(None, format!("unable to write: {}", e)));
        }

        debug!(
            path = %self.path.display(),
            groups = groups.len(),
            "Saved newsgroup status"
        );
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn error(&self, line: Option<usize>, reason: String) -> Error {
        Error::StatusFile {
            path: self.path.clone(),
            line,
            reason,
        }
    }
}

/// Parse status file contents; on failure returns the 1-based line number and reason
fn parse_status(
    contents: &str,
) -> std::result::Result<Vec<NewsgroupStatus>, (usize, String)> {
    let mut groups = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line_no = index + 1;
        let mut parts = line.split_whitespace();

        let Some(name) = parts.next() else {
            continue;
        };

        let malformed = || {
            (
                line_no,
                format!("line {}: expected '<group> <article>', got {:?}", line_no, line),
            )
        };

        let last = parts
            .next()
            .and_then(|n| n.parse::<u64>().ok())
            .ok_or_else(malformed)?;

        if parts.next().is_some() {
            return Err(malformed());
        }

        groups.push(NewsgroupStatus::new(name, last));
    }

    Ok(groups)
}

fn format_status(groups: &[NewsgroupStatus]) -> String {
    groups
        .iter()
        .map(|g| format!("{} {}\n", g.name, g.last_article_downloaded))
        .collect()
}
