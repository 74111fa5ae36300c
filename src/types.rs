//! Core types shared by the jobs

/// Article range reported by a successful `GROUP` probe
///
/// Produced fresh on every probe and never persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewsgroupRange {
    /// Newsgroup name
    pub name: String,
    /// Server's estimate of the number of articles
    pub estimated_count: u64,
    /// Lowest article number currently available
    pub first_article: u64,
    /// Highest article number currently available
    pub last_article: u64,
}

/// Download cursor for one configured newsgroup
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewsgroupStatus {
    /// Newsgroup name
    pub name: String,
    /// Last article number fetched successfully; `0` means never downloaded
    pub last_article_downloaded: u64,
}

impl NewsgroupStatus {
    /// Create a status entry
    pub fn new(name: impl Into<String>, last_article_downloaded: u64) -> Self {
        Self {
            name: name.into(),
            last_article_downloaded,
        }
    }

    /// First article id to request given the probed range.
    ///
    /// A group that was never downloaded starts at the range's first article,
    /// otherwise at the article after the cursor. `None` when the cursor is
    /// already at the largest representable id.
    pub fn next_article(&self, range: &NewsgroupRange) -> Option<u64> {
        if self.last_article_downloaded == 0 {
            Some(range.first_article)
        } else {
            self.last_article_downloaded.checked_add(1)
        }
    }

    /// Record a successfully captured article. The cursor never moves backwards.
    pub fn advance(&mut self, article_id: u64) {
        self.last_article_downloaded = self.last_article_downloaded.max(article_id);
    }
}

/// What happened to one message file during an import cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Server took the body (`335` then `235`); source file deleted
    Transferred,
    /// Server already had the article (`435`); source file deleted
    AlreadyPresent,
    /// Server refused the offer; file retained
    Rejected {
        /// Reply line to `IHAVE`, if any
        response: Option<String>,
    },
    /// Body was sent but not confirmed with `235`; file retained
    NotAccepted {
        /// Final reply line, if any
        response: Option<String>,
    },
    /// No `Message-ID:` header; file retained
    NoMessageId,
    /// File could not be read; file retained
    Unreadable,
}

/// Summary of one import cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Files found by the directory scan
    pub scanned: usize,
    /// Whether a connection to the MBBS was made
    pub connected: bool,
    /// Bodies transferred and confirmed
    pub transferred: usize,
    /// Articles the server already had
    pub already_present: usize,
    /// Offers refused or transfers not confirmed
    pub rejected: usize,
    /// Files skipped (no message id or unreadable)
    pub skipped: usize,
}

impl ImportReport {
    /// Tally one file outcome
    pub fn record(&mut self, outcome: &ImportOutcome) {
        match outcome {
            ImportOutcome::Transferred => self.transferred += 1,
            ImportOutcome::AlreadyPresent => self.already_present += 1,
            ImportOutcome::Rejected { .. } | ImportOutcome::NotAccepted { .. } => {
                self.rejected += 1
            }
            ImportOutcome::NoMessageId | ImportOutcome::Unreadable => self.skipped += 1,
        }
    }
}

/// Per-group result of a download cycle
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupReport {
    /// Newsgroup name
    pub name: String,
    /// `false` when the `GROUP` probe failed and the group was skipped
    pub selected: bool,
    /// Articles written to disk this cycle
    pub downloaded: u64,
    /// Article ids that did not answer `220`
    pub unavailable: u64,
}

/// Summary of one download cycle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// One entry per group visited, in status-file order
    pub groups: Vec<GroupReport>,
}

impl DownloadReport {
    /// Total number of articles downloaded across all groups
    pub fn total_downloaded(&self) -> u64 {
        self.groups.iter().map(|g| g.downloaded).sum()
    }
}
