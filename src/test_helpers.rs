//! In-process fake NNTP server shared by the job tests.
//!
//! Listens on `127.0.0.1:0`, greets every connection, and answers `GROUP`,
//! `ARTICLE`, `IHAVE`, `AUTHINFO` and `QUIT` from a scripted [`FakeState`].
//! Every command line received is recorded for assertions.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::config::ServerConfig;
use crate::nntp::{stuff_line, unstuff_line};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// How the fake server answers an `IHAVE` offer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum IhaveBehavior {
    /// `335`, then `235` once the body arrives
    Accept,
    /// `335`, then `437` once the body arrives
    AcceptThenReject,
    /// `435` already have it
    AlreadyHave,
    /// `437` rejected outright
    Refuse,
}

/// One newsgroup on the fake server
#[derive(Clone, Debug, Default)]
pub(crate) struct FakeGroup {
    pub first: u64,
    pub last: u64,
    /// Articles that answer `220`; ids missing here answer `423`
    pub articles: BTreeMap<u64, Vec<String>>,
}

impl FakeGroup {
    /// Group whose every id in `first..=last` is available with a generated body
    pub fn full(first: u64, last: u64) -> Self {
        let articles = (first..=last)
            .map(|id| {
                let body = vec![
                    format!("Subject: article {}", id),
                    String::new(),
                    format!("body {}", id),
                ];
                (id, body)
            })
            .collect();
        Self {
            first,
            last,
            articles,
        }
    }
}

/// Scripted server state plus everything observed
#[derive(Debug)]
pub(crate) struct FakeState {
    pub groups: HashMap<String, FakeGroup>,
    pub ihave: HashMap<String, IhaveBehavior>,
    pub default_ihave: IhaveBehavior,
    /// Close the connection instead of answering `ARTICLE <id>`
    pub hang_up_on_article: Option<u64>,
    pub commands: Vec<String>,
    /// Message ids and unstuffed bodies received through `IHAVE`
    pub received: Vec<(String, Vec<String>)>,
    pub connections: usize,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            groups: HashMap::new(),
            ihave: HashMap::new(),
            default_ihave: IhaveBehavior::Accept,
            hang_up_on_article: None,
            commands: Vec::new(),
            received: Vec::new(),
            connections: 0,
        }
    }
}

/// Handle to a running fake server
pub(crate) struct FakeServer {
    pub port: u16,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeServer {
    /// Start serving `state` in the background
    pub async fn start(state: FakeState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let state = Arc::new(Mutex::new(state));

        let shared = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                shared.lock().unwrap().connections += 1;
                tokio::spawn(serve(socket, shared.clone()));
            }
        });

        Self { port, state }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: self.port,
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Commands received that start with `prefix`
    pub fn commands_starting_with(&self, prefix: &str) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn connections(&self) -> usize {
        self.state.lock().unwrap().connections
    }

    pub fn received(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().received.clone()
    }
}

async fn serve(socket: TcpStream, state: Arc<Mutex<FakeState>>) {
    let mut stream = BufReader::new(socket);
    if stream.write_all(b"200 fake news server ready\r\n").await.is_err() {
        return;
    }

    let mut current_group: Option<String> = None;
    let mut line = Vec::new();

    loop {
        line.clear();
        match stream.read_until(b'\n', &mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = String::from_utf8_lossy(&line).trim_end().to_string();
        state.lock().unwrap().commands.push(command.clone());

        let (verb, arg) = match command.split_once(' ') {
            Some((verb, arg)) => (verb.to_ascii_uppercase(), arg.to_string()),
            None => (command.to_ascii_uppercase(), String::new()),
        };

        let reply = match verb.as_str() {
            "AUTHINFO" if arg.starts_with("USER") => "381 password required\r\n".to_string(),
            "AUTHINFO" => "281 authentication accepted\r\n".to_string(),
            "GROUP" => {
                let st = state.lock().unwrap();
                match st.groups.get(&arg) {
                    Some(g) => {
                        current_group = Some(arg.clone());
                        let count = g.articles.len();
                        format!("211 {} {} {} {}\r\n", count, g.first, g.last, arg)
                    }
                    None => "411 no such group\r\n".to_string(),
                }
            }
            "ARTICLE" => {
                let id: u64 = arg.parse().unwrap_or(0);
                let st = state.lock().unwrap();
                if st.hang_up_on_article == Some(id) {
                    return;
                }
                let body = current_group
                    .as_ref()
                    .and_then(|g| st.groups.get(g))
                    .and_then(|g| g.articles.get(&id));
                match body {
                    Some(lines) => {
                        let mut out = format!("220 {} <{}@fake>\r\n", id, id).into_bytes();
                        for l in lines {
                            out.extend_from_slice(&stuff_line(l.as_bytes()));
                            out.extend_from_slice(b"\r\n");
                        }
                        out.extend_from_slice(b".\r\n");
                        // Bodies here are built from `String`s
                        String::from_utf8(out).unwrap()
                    }
                    None => "423 no such article number in this group\r\n".to_string(),
                }
            }
            "IHAVE" => {
                let behavior = {
                    let st = state.lock().unwrap();
                    st.ihave.get(&arg).copied().unwrap_or(st.default_ihave)
                };
                match behavior {
                    IhaveBehavior::AlreadyHave => "435 article not wanted\r\n".to_string(),
                    IhaveBehavior::Refuse => "437 transfer rejected\r\n".to_string(),
                    IhaveBehavior::Accept | IhaveBehavior::AcceptThenReject => {
                        if stream.write_all(b"335 send article\r\n").await.is_err() {
                            return;
                        }
                        let mut body = Vec::new();
                        loop {
                            line.clear();
                            match stream.read_until(b'\n', &mut line).await {
                                Ok(0) | Err(_) => return,
                                Ok(_) => {}
                            }
                            let body_line = line
                                .strip_suffix(b"\r\n")
                                .unwrap_or(&line)
                                .to_vec();
                            if body_line == b"." {
                                break;
                            }
                            let body_line = unstuff_line(body_line);
                            body.push(String::from_utf8_lossy(&body_line).into_owned());
                        }
                        state.lock().unwrap().received.push((arg.clone(), body));
                        if behavior == IhaveBehavior::Accept {
                            "235 article transferred ok\r\n".to_string()
                        } else {
                            "437 transfer rejected\r\n".to_string()
                        }
                    }
                }
            }
            "QUIT" => {
                stream.write_all(b"205 closing connection\r\n").await.ok();
                return;
            }
            _ => "500 command not recognized\r\n".to_string(),
        };

        if stream.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}
