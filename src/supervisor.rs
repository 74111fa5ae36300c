//! Runs the importer and downloader side by side
//!
//! Both jobs get a clone of one [`CancellationToken`]. When either job ends
//! with an error (or panics) the token is cancelled, the other job unwinds at
//! its next checkpoint, and the first error is returned once both are done.

use crate::config::Config;
use crate::downloader::Downloader;
use crate::error::{Error, Result};
use crate::importer::Importer;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span};

/// Run both jobs until they have both stopped.
///
/// Returns the first fatal job error, or `Ok(())` if both jobs stopped because
/// `cancel` was triggered from outside.
pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
    let importer = Importer::new(config.importer, config.retry.clone());
    let downloader = Downloader::new(config.downloader, config.retry);

    let mut jobs = JoinSet::new();
    jobs.spawn(
        importer
            .run(cancel.clone())
            .instrument(info_span!("importer")),
    );
    jobs.spawn(
        downloader
            .run(cancel.clone())
            .instrument(info_span!("downloader")),
    );

    let mut first_error: Option<Error> = None;

    while let Some(joined) = jobs.join_next().await {
        let result = joined.map_err(Error::from).and_then(|r| r);
        if let Err(e) = result {
            error!(error = %e, "Job stopped with an unrecoverable error, stopping all jobs");
            cancel.cancel();
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("All jobs stopped");
            Ok(())
        }
    }
}
