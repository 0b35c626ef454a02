//! The MPD connection layer: dialing TCP or a local domain socket, password auth, subscribing
//! to the inbound control channel, and the reconnect-on-transport-failure policy described in
//! the connection layer's contract.
//!
//! [`ManagedConnection`] owns one underlying stream and mirrors the handful of [`mpd_client::Client`]
//! methods the dynamizer loop and its collaborators need. Every one of them goes through
//! [`ManagedConnection::retry`], which redials (reconnecting, re-authenticating, and
//! re-subscribing) and re-issues the same command up to three times, 500ms apart, before giving
//! up. A command that instead returns an `ACK` (a [`CommandError::ErrorResponse`]) is a protocol
//! error, not a transport one, and is never retried.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;
use std::thread;
use std::time::Duration;

use tracing::{info, warn};

use mpd_client::responses::{Song, Stats, Status};
use mpd_client::CommandError;

use crate::control::ControlMpd;
use crate::pool::PoolSource;
use crate::rules::Lookup;

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Host/port/password for the MPD server, plus the inbound channel to subscribe to (server
/// mode) or `None` (a one-shot, non-subscribing connection).
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    /// Hostname, or an absolute path to a local domain socket.
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
}

/// A TCP stream or (on unix targets) a local domain socket stream.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    fn dial(info: &ConnectionInfo) -> io::Result<Self> {
        #[cfg(unix)]
        if info.host.starts_with('/') {
            return UnixStream::connect(&info.host).map(Stream::Unix);
        }

        TcpStream::connect((info.host.as_str(), info.port)).map(Stream::Tcp)
    }
}

impl Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.read(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.read(buf),
        }
    }
}

impl Write for Stream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Stream::Tcp(s) => s.write(buf),
            #[cfg(unix)]
            Stream::Unix(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Stream::Tcp(s) => s.flush(),
            #[cfg(unix)]
            Stream::Unix(s) => s.flush(),
        }
    }
}

fn dial(info: &ConnectionInfo, subscribe_channel: Option<&str>) -> Result<mpd_client::Client<Stream>, CommandError> {
    let stream = Stream::dial(info).map_err(|e| CommandError::Protocol(mpd_protocol::MpdProtocolError::Io(e)))?;

    let mut client = match &info.password {
        Some(password) => mpd_client::Client::connect_with_password(stream, password)?,
        None => mpd_client::Client::connect(stream)?,
    };

    if let Some(channel) = subscribe_channel {
        client.subscribe(channel)?;
    }

    Ok(client)
}

/// Whether `e` represents a transport failure (worth reconnecting for) rather than an `ACK`
/// protocol error (which is never retried).
fn is_transport_error(e: &CommandError) -> bool {
    matches!(e, CommandError::Protocol(_))
}

/// A single long-lived MPD connection that redials and retries on transport failure.
#[derive(Debug)]
pub struct ManagedConnection {
    info: ConnectionInfo,
    subscribe_channel: Option<&'static str>,
    client: mpd_client::Client<Stream>,
}

impl ManagedConnection {
    /// Dials the initial connection. `subscribe_channel`, if given, is (re-)subscribed to on
    /// every redial, matching server mode's `subscribe cantata-dynamic-in` on connect.
    pub fn connect(info: ConnectionInfo, subscribe_channel: Option<&'static str>) -> Result<Self, CommandError> {
        let client = dial(&info, subscribe_channel)?;
        Ok(ManagedConnection { info, subscribe_channel, client })
    }

    /// Runs `f` against the current client. On a transport error, redials (up to
    /// [`RETRY_ATTEMPTS`] total attempts, [`RETRY_BACKOFF`] apart) and retries the same `f`;
    /// persistent failure returns the last transport error, which callers treat as "no data this
    /// round" (`ErrorResponse`s are returned immediately, without retrying).
    fn retry<T>(
        &mut self,
        mut f: impl FnMut(&mut mpd_client::Client<Stream>) -> Result<T, CommandError>,
    ) -> Result<T, CommandError> {
        let mut last_err = None;

        for attempt in 0..RETRY_ATTEMPTS {
            match f(&mut self.client) {
                Ok(value) => return Ok(value),
                Err(e) if is_transport_error(&e) => {
                    warn!(attempt, error = %e, "mpd command failed, reconnecting");
                    last_err = Some(e);

                    if attempt + 1 < RETRY_ATTEMPTS {
                        thread::sleep(RETRY_BACKOFF);
                    }
                    match dial(&self.info, self.subscribe_channel) {
                        Ok(client) => {
                            info!("reconnected to mpd");
                            self.client = client;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.expect("loop runs at least once"))
    }

    pub fn status(&mut self) -> Result<Status, CommandError> {
        self.retry(|c| c.status())
    }

    pub fn stats(&mut self) -> Result<Stats, CommandError> {
        self.retry(|c| c.stats())
    }

    pub fn playlist(&mut self) -> Result<Vec<mpd_client::responses::SongInQueue>, CommandError> {
        self.retry(|c| c.playlist())
    }

    pub fn delete(&mut self, position: usize) -> Result<(), CommandError> {
        self.retry(|c| c.delete(position))
    }

    pub fn add(&mut self, uri: &str) -> Result<(), CommandError> {
        self.retry(|c| c.add(uri))
    }

    pub fn play(&mut self, position: usize) -> Result<(), CommandError> {
        self.retry(|c| c.play(position))
    }

    pub fn lsinfo(&mut self, uri: &str) -> Result<Option<Song>, CommandError> {
        self.retry(|c| c.lsinfo(uri))
    }

    pub fn sticker_get(&mut self, uri: &str, name: &str) -> Result<mpd_client::responses::StickerGet, CommandError> {
        self.retry(|c| c.sticker_get(uri, name))
    }

    pub fn idle(&mut self, subsystems: &[&str]) -> Result<Vec<String>, CommandError> {
        self.retry(|c| c.idle(subsystems))
    }

    pub fn read_messages(&mut self) -> Result<Vec<(String, String)>, CommandError> {
        self.retry(|c| c.read_messages())
    }

    pub fn send_message(&mut self, channel: &str, text: &str) -> Result<(), CommandError> {
        self.retry(|c| c.send_message(channel, text))
    }
}

impl Lookup for ManagedConnection {
    fn list_genre(&mut self) -> Vec<String> {
        match self.retry(|c| c.list("list Genre")) {
            Ok(list) => list.values().map(str::to_owned).collect(),
            Err(e) => {
                warn!(error = %e, "list genre failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn list_artist(&mut self) -> Vec<String> {
        match self.retry(|c| c.list("list Artist")) {
            Ok(list) => list.values().map(str::to_owned).collect(),
            Err(e) => {
                warn!(error = %e, "list artist failed, treating as empty");
                Vec::new()
            }
        }
    }
}

impl PoolSource for ManagedConnection {
    fn find(&mut self, query_line: &str) -> Vec<String> {
        match self.retry(|c| c.find(query_line)) {
            Ok(songs) => songs.into_iter().map(|s| s.url).collect(),
            Err(e) => {
                warn!(error = %e, query_line, "find failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn list_artist(&mut self) -> Vec<String> {
        Lookup::list_artist(self)
    }

    fn sticker_ratings(&mut self) -> HashMap<String, String> {
        match self.retry(|c| c.sticker_find("", "rating")) {
            Ok(find) => find.value,
            Err(e) => {
                warn!(error = %e, "sticker find rating failed, treating as empty");
                Default::default()
            }
        }
    }
}

impl ControlMpd for ManagedConnection {
    fn clear_queue(&mut self) -> bool {
        self.retry(|c| c.clear()).is_ok()
    }
}
