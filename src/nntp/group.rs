//! `GROUP` probe

use super::{NntpSession, codes};
use crate::error::{Error, Result};
use crate::types::NewsgroupRange;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::warn;

/// Select `name` and return its article range.
///
/// Any reply other than `211` (including a closed connection) yields `None`,
/// meaning the caller should skip the group this cycle. A `211` reply that
/// cannot be parsed is an error.
pub async fn probe_group<S>(
    session: &mut NntpSession<S>,
    name: &str,
) -> Result<Option<NewsgroupRange>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let reply = session.command(&format!("GROUP {}", name)).await?;

    match reply {
        Some(line) if line.starts_with(codes::GROUP_SELECTED) => {
            parse_group_reply(name, &line).map(Some)
        }
        other => {
            warn!(
                group = %name,
                reply = ?other,
                "Failed to select group, possible server authentication issue"
            );
            Ok(None)
        }
    }
}

/// Parse `211 <count> <first> <last> [name]`
pub fn parse_group_reply(name: &str, line: &str) -> Result<NewsgroupRange> {
    let invalid = || Error::InvalidResponse {
        command: format!("GROUP {}", name),
        line: line.to_string(),
    };

    let mut parts = line.split_whitespace().skip(1);
    let mut number = || -> Result<u64> {
        parts
            .next()
            .and_then(|part| part.parse().ok())
            .ok_or_else(invalid)
    };

    Ok(NewsgroupRange {
        name: name.to_string(),
        estimated_count: number()?,
        first_article: number()?,
        last_article: number()?,
    })
}
