//! NNTP line protocol session
//!
//! [`NntpSession`] owns one connection and provides the request/response
//! primitives both jobs are built on:
//! - [`send_line`](NntpSession::send_line) writes one command and flushes it
//! - [`read_line`](NntpSession::read_line) reads one raw line (`None` once the server hung up)
//! - [`read_reply`](NntpSession::read_reply) reads one status line as text
//! - [`read_body`](NntpSession::read_body) lazily yields a multi-line body up to the lone-dot terminator
//! - [`send_body`](NntpSession::send_body) writes a dot-stuffed body followed by the terminator
//!
//! Body lines are bytes. Articles are not necessarily UTF-8, so they pass
//! through unchanged; only status lines are decoded.
//!
//! The session is generic over the byte stream so it can be driven by scripted
//! I/O in tests. Dropping it closes the connection.

use crate::config::{Credentials, ServerConfig};
use crate::error::{Error, Result};
use futures::Stream;
use std::borrow::Cow;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, warn};

mod group;

pub use group::{parse_group_reply, probe_group};

/// Reply codes the jobs act on
pub mod codes {
    /// `GROUP` succeeded: `211 count first last name`
    pub const GROUP_SELECTED: &str = "211";
    /// `ARTICLE` succeeded, body follows
    pub const ARTICLE_FOLLOWS: &str = "220";
    /// Transferred article accepted
    pub const TRANSFER_OK: &str = "235";
    /// Authentication accepted
    pub const AUTH_ACCEPTED: &str = "281";
    /// `IHAVE` offer accepted, send the article
    pub const SEND_ARTICLE: &str = "335";
    /// `AUTHINFO USER` accepted, password required
    pub const PASSWORD_REQUIRED: &str = "381";
    /// `IHAVE` offer declined, article already present
    pub const NOT_WANTED: &str = "435";
}

/// Line that terminates a multi-line body
pub const BODY_TERMINATOR: &[u8] = b".";

/// Whether a reply line exists and starts with the given status code
pub fn reply_is(reply: Option<&str>, code: &str) -> bool {
    reply.is_some_and(|line| line.starts_with(code))
}

/// Escape a body line for transmission: a leading dot is doubled.
pub fn stuff_line(line: &[u8]) -> Cow<'_, [u8]> {
    if line.starts_with(b".") {
        let mut stuffed = Vec::with_capacity(line.len() + 1);
        stuffed.push(b'.');
        stuffed.extend_from_slice(line);
        Cow::Owned(stuffed)
    } else {
        Cow::Borrowed(line)
    }
}

/// Reverse [`stuff_line`] on a received body line.
pub fn unstuff_line(mut line: Vec<u8>) -> Vec<u8> {
    if line.starts_with(b"..") {
        line.remove(0);
    }
    line
}

/// One connection to an NNTP-speaking server
pub struct NntpSession<S = TcpStream> {
    stream: BufReader<S>,
}

impl NntpSession<TcpStream> {
    /// Open a TCP connection, giving up after `timeout`.
    ///
    /// When the timeout fires the pending connect is dropped, which closes the
    /// half-open socket.
    pub async fn connect(server: &ServerConfig, timeout: Duration) -> Result<Self> {
        let addr = server.addr();
        debug!(%addr, "Connecting");

        match tokio::time::timeout(
            timeout,
            TcpStream::connect((server.host.as_str(), server.port)),
        )
        .await
        {
            Ok(Ok(stream)) => Ok(Self::new(stream)),
            Ok(Err(source)) => Err(Error::Connect { addr, source }),
            Err(_) => Err(Error::ConnectTimeout { addr, timeout }),
        }
    }
}

impl<S> NntpSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established byte stream
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Write one line plus CRLF and flush it
    pub async fn send_line(&mut self, text: &str) -> Result<()> {
        let mut line = String::with_capacity(text.len() + 2);
        line.push_str(text);
        line.push_str("\r\n");
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Read one line without its `\r\n` (or bare `\n`) terminator.
    ///
    /// Returns `None` when the stream is closed. The bytes are not decoded.
    pub async fn read_line(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = self.stream.read_until(b'\n', &mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        Ok(Some(buf))
    }

    /// Read one status line as text; `None` when the stream is closed.
    pub async fn read_reply(&mut self) -> Result<Option<String>> {
        Ok(self
            .read_line()
            .await?
            .map(|line| String::from_utf8_lossy(&line).into_owned()))
    }

    /// Send a command and read its single-line reply
    pub async fn command(&mut self, text: &str) -> Result<Option<String>> {
        self.send_line(text).await?;
        self.read_reply().await
    }

    /// Read the server greeting that follows a fresh connection
    pub async fn greeting(&mut self) -> Result<String> {
        self.read_reply()
            .await?
            .ok_or_else(|| Error::closed("waiting for the server greeting"))
    }

    /// Lazily read a multi-line body.
    ///
    /// Yields each line dot-unstuffed and stops at the lone-dot terminator,
    /// which is never yielded. A stream that closes before the terminator ends
    /// with [`Error::ConnectionClosed`]. The sequence can only be consumed once.
    pub fn read_body(&mut self) -> impl Stream<Item = Result<Vec<u8>>> + '_ {
        futures::stream::try_unfold(self, |session| async move {
            match session.read_line().await? {
                None => Err(Error::closed("reading a multi-line body")),
                Some(line) if line == BODY_TERMINATOR => Ok(None),
                Some(line) => Ok(Some((unstuff_line(line), session))),
            }
        })
    }

    /// Send a body with dot-stuffing, then the terminator, in one flushed write
    pub async fn send_body<'a, I>(&mut self, lines: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut body = Vec::new();
        for line in lines {
            body.extend_from_slice(&stuff_line(line));
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(BODY_TERMINATOR);
        body.extend_from_slice(b"\r\n");
        self.stream.write_all(&body).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Log in with `AUTHINFO USER` / `AUTHINFO PASS`.
    ///
    /// Unexpected replies are only logged; a server that still requires
    /// authentication will refuse the commands that follow.
    pub async fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        let reply = self
            .command(&format!("AUTHINFO USER {}", credentials.username))
            .await?;
        if reply_is(reply.as_deref(), codes::AUTH_ACCEPTED) {
            return Ok(());
        }
        if !reply_is(reply.as_deref(), codes::PASSWORD_REQUIRED) {
            warn!(reply = ?reply, "Unexpected reply to AUTHINFO USER");
        }

        let reply = self
            .command(&format!("AUTHINFO PASS {}", credentials.password))
            .await?;
        if !reply_is(reply.as_deref(), codes::AUTH_ACCEPTED) {
            warn!(reply = ?reply, "Authentication not accepted");
        }
        Ok(())
    }

    /// Send `QUIT` and discard the reply
    pub async fn quit(&mut self) -> Result<()> {
        let reply = self.command("QUIT").await?;
        debug!(reply = ?reply, "Session closed");
        Ok(())
    }
}
