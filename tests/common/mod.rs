//! Common test utilities for nntp-importer integration tests

#![allow(dead_code)]

use nntp_importer::config::{
    Config, DownloaderConfig, ImporterConfig, RetryConfig, ServerConfig,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Minimal NNTP server with one group `alt.test` holding article 1.
///
/// Accepts every `IHAVE` offer and records the offered message ids.
pub struct MiniServer {
    pub port: u16,
    pub offered: Arc<Mutex<Vec<String>>>,
}

impl MiniServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let offered = Arc::new(Mutex::new(Vec::new()));

        let seen = offered.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(serve(stream, seen.clone()));
            }
        });

        Self { port, offered }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
        }
    }
}

async fn serve(stream: TcpStream, offered: Arc<Mutex<Vec<String>>>) {
    let (read, mut write) = stream.into_split();
    let mut lines = BufReader::new(read).lines();

    if write.write_all(b"200 mini server ready\r\n").await.is_err() {
        return;
    }

    while let Ok(Some(line)) = lines.next_line().await {
        let reply = if line.starts_with("GROUP alt.test") {
            "211 1 1 1 alt.test\r\n".to_string()
        } else if line.starts_with("GROUP") {
            "411 no such group\r\n".to_string()
        } else if line == "ARTICLE 1" {
            "220 1 <1@mini>\r\nSubject: hello\r\n\r\nfrom upstream\r\n.\r\n".to_string()
        } else if line.starts_with("ARTICLE") {
            "423 no such article\r\n".to_string()
        } else if let Some(id) = line.strip_prefix("IHAVE ") {
            offered.lock().unwrap().push(id.to_string());
            if write.write_all(b"335 send it\r\n").await.is_err() {
                return;
            }
            while let Ok(Some(body)) = lines.next_line().await {
                if body == "." {
                    break;
                }
            }
            "235 article transferred\r\n".to_string()
        } else if line == "QUIT" {
            let _ = write.write_all(b"205 bye\r\n").await;
            return;
        } else {
            "500 unknown command\r\n".to_string()
        };

        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Port that refuses connections
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Retry policy that keeps a refused connection in backoff for the whole test
pub fn slow_retry() -> RetryConfig {
    RetryConfig {
        connect_timeout: Duration::from_secs(2),
        retry_delay: Duration::from_secs(3600),
    }
}

pub fn test_config(
    import_dir: &Path,
    mbbs: ServerConfig,
    download_dir: &Path,
    status_file: &Path,
    nntp: ServerConfig,
) -> Config {
    Config {
        importer: ImporterConfig {
            server: mbbs,
            import_dir: import_dir.to_path_buf(),
            interval: Duration::from_secs(3600),
        },
        downloader: DownloaderConfig {
            server: nntp,
            credentials: None,
            download_dir: download_dir.to_path_buf(),
            status_file: status_file.to_path_buf(),
            interval: Duration::from_secs(3600),
        },
        retry: slow_retry(),
    }
}
