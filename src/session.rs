// This file is part of gatehouse.
//
// gatehouse is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// gatehouse is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Per-connection state: the read loop, frame-check table, dispatch, and
//! the handlers for everything except the login pipeline itself (see
//! [`crate::login`]).

use std::io::{BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, info};

use crate::ConnectionId;
use crate::directory::Directories;
use crate::error::{PolicyViolation, SessionError};
use crate::wire::catalogue::ClientMessageId;
use crate::wire::framing;
use crate::wire::message::{ClientMessage, ClientVersion, Credential, ServerMessage};

/// The session state machine's four states (§4.C).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Status {
    ExpectVersion = 0,
    ExpectCredential = 1,
    ExpectQueuePosition = 2,
    Idle = 3,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::ExpectVersion,
            1 => Self::ExpectCredential,
            2 => Self::ExpectQueuePosition,
            _ => Self::Idle,
        }
    }
}

/// What a session needs to call back into the server for: claiming an
/// account slot and reading the current host snapshot. Passed in as a
/// capability at construction so a session is testable without a real
/// `Server`.
pub trait SessionHost: Send + Sync {
    fn control_account(
        &self,
        account_id: i64,
        session: &Arc<Session>,
    ) -> Result<(), PolicyViolation>;
    fn release_account(&self, account_id: i64, session_id: ConnectionId);
    fn current_hosts(&self) -> ServerMessage;
}

/// A simple token bucket mirroring `golang.org/x/time/rate.Limiter`: one
/// token per second, burst of five, `wait` blocks the calling thread
/// instead of rejecting.
struct RateLimiter {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl RateLimiter {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        RateLimiter {
            tokens: capacity,
            capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn wait(&mut self) {
        loop {
            let now = Instant::now();
            let elapsed = now.duration_since(self.last_refill).as_secs_f64();
            self.last_refill = now;
            self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);

            if self.tokens >= 1.0 {
                self.tokens -= 1.0;
                return;
            }

            let shortfall = 1.0 - self.tokens;
            let delay = Duration::from_secs_f64(shortfall / self.refill_per_sec);
            std::thread::sleep(delay);
        }
    }
}

pub struct Session {
    pub id: ConnectionId,
    peer_addr: SocketAddr,
    write_stream: Mutex<TcpStream>,
    salt: String,
    status: AtomicU8,
    version: Mutex<Option<ClientVersion>>,
    credential: Mutex<Option<Credential>>,
    account_id: Mutex<Option<i64>>,
    connection_timeout: Duration,
    directories: Directories,
    host: Arc<dyn SessionHost>,
    rate_limiter: Mutex<RateLimiter>,
}

impl Session {
    #[must_use]
    pub fn new(
        id: ConnectionId,
        stream: TcpStream,
        peer_addr: SocketAddr,
        salt: String,
        connection_timeout: Duration,
        directories: Directories,
        host: Arc<dyn SessionHost>,
    ) -> anyhow::Result<Self> {
        Ok(Session {
            id,
            peer_addr,
            write_stream: Mutex::new(stream),
            salt,
            status: AtomicU8::new(Status::ExpectVersion as u8),
            version: Mutex::new(None),
            credential: Mutex::new(None),
            account_id: Mutex::new(None),
            connection_timeout,
            directories,
            host,
            rate_limiter: Mutex::new(RateLimiter::new(5.0, 1.0)),
        })
    }

    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    #[must_use]
    pub fn salt(&self) -> &str {
        &self.salt
    }

    #[must_use]
    pub fn directories(&self) -> &Directories {
        &self.directories
    }

    #[must_use]
    pub fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.status.store(status as u8, Ordering::Release);
    }

    #[must_use]
    pub fn account_id(&self) -> Option<i64> {
        *self.account_id.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn set_account_id(&self, account_id: i64) {
        *self.account_id.lock().unwrap_or_else(|e| e.into_inner()) = Some(account_id);
    }

    #[must_use]
    pub fn version(&self) -> Option<ClientVersion> {
        *self.version.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[must_use]
    pub fn credential(&self) -> Option<Credential> {
        self.credential.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// The server capability this session claims accounts and reads the
    /// host snapshot through. Exposed to [`crate::login`], which is the
    /// only other module that needs it.
    #[must_use]
    pub(crate) fn host(&self) -> &Arc<dyn SessionHost> {
        &self.host
    }

    /// Closes the underlying socket from any thread. Used for eviction by
    /// `control_account` and for server shutdown; safe with a concurrent
    /// read in the owning thread, which simply errors out and tears down.
    pub fn evict(&self) {
        if let Ok(stream) = self.write_stream.lock() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    pub fn send(&self, message: &ServerMessage) -> Result<(), SessionError> {
        let record = framing::encode_record(&message.encode());
        let mut stream = self
            .write_stream
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        stream.write_all(&record)?;
        Ok(())
    }

    /// Whether `id` is allowed to be dispatched given the current status
    /// (§4.C's frame table).
    fn frame_allows(&self, id: ClientMessageId) -> bool {
        match self.status() {
            Status::ExpectVersion => id == ClientMessageId::AccountVersion,
            Status::ExpectCredential => id == ClientMessageId::AccountCredential,
            Status::ExpectQueuePosition => id == ClientMessageId::AccountQueuePosition,
            Status::Idle => {
                id != ClientMessageId::AccountVersion && id != ClientMessageId::AccountCredential
            }
        }
    }

    fn handle_search_for_friend(&self, pseudo: &str) -> Result<(), SessionError> {
        let user = match self.directories.users.by_nickname(pseudo) {
            Ok(user) => user,
            Err(crate::directory::DirectoryError::NotFound) => {
                self.send(&ServerMessage::AccountFriendServerList { servers: Vec::new() })?;
                return Ok(());
            }
            Err(crate::directory::DirectoryError::Backend(err)) => {
                return Err(SessionError::Upstream(err));
            }
        };

        let accounts = self
            .directories
            .users
            .accounts_by_user_id(user.id)
            .map_err(SessionError::Upstream)?;

        let servers = aggregate_character_counts(&self.directories, &accounts)?;
        self.send(&ServerMessage::AccountFriendServerList { servers })?;
        Ok(())
    }

    fn handle_get_servers_list(&self) -> Result<(), SessionError> {
        let account_id = self
            .account_id()
            .ok_or_else(|| SessionError::ProtocolFraming("idle session with no account".into()))?;
        let account = self
            .directories
            .accounts
            .by_id(account_id)
            .map_err(|err| SessionError::Upstream(err.into()))?;
        let servers = aggregate_character_counts(&self.directories, std::slice::from_ref(&account))?;
        self.send(&ServerMessage::AccountServersListSuccess {
            subscription: account.subscription,
            servers,
        })?;
        Ok(())
    }

    fn handle_set_server(&self, server_id: i64) -> Result<(), SessionError> {
        let account_id = self
            .account_id()
            .ok_or_else(|| SessionError::ProtocolFraming("idle session with no account".into()))?;
        let game_server = self
            .directories
            .game_servers
            .by_id(server_id)
            .map_err(|err| SessionError::Upstream(err.into()))?;
        let ticket = self
            .directories
            .tickets
            .create(account_id, game_server.id)
            .map_err(SessionError::Upstream)?;

        self.send(&ServerMessage::AccountSelectServerPlainSuccess {
            host: game_server.host,
            port: game_server.port,
            ticket: ticket.id,
        })?;
        Err(SessionError::EndOfService)
    }
}

/// Decodes, frame-checks and dispatches one record. Needs the owning
/// `Arc` only to hand to [`crate::login::run`] when a queue-position
/// packet triggers the login pipeline.
fn dispatch(session: &Arc<Session>, record: &str) -> Result<(), SessionError> {
    let id = ClientMessageId::by_record(record)
        .ok_or_else(|| SessionError::ProtocolFraming(format!("unknown message id in {record:?}")))?;

    if !session.frame_allows(id) {
        return Err(SessionError::Policy(PolicyViolation::InvalidFrame));
    }

    let message = ClientMessage::decode(record).map_err(|err| SessionError::ProtocolFraming(err.to_string()))?;

    match message {
        ClientMessage::AccountVersion(version) => {
            *session.version.lock().unwrap_or_else(|e| e.into_inner()) = Some(version);
            session.set_status(Status::ExpectCredential);
            Ok(())
        }
        ClientMessage::AccountCredential(credential) => {
            *session.credential.lock().unwrap_or_else(|e| e.into_inner()) = Some(credential);
            session.set_status(Status::ExpectQueuePosition);
            Ok(())
        }
        ClientMessage::AccountQueuePosition => {
            session.send(&ServerMessage::AccountNewQueue {
                position: 1,
                total_subscribers: 0,
                total_non_subscribers: 1,
                subscriber: false,
                queue_id: 0,
            })?;
            if session.status() == Status::ExpectQueuePosition {
                crate::login::run(session)?;
            }
            Ok(())
        }
        ClientMessage::AccountSearchForFriend { pseudo } => session.handle_search_for_friend(&pseudo),
        ClientMessage::AccountGetServersList => session.handle_get_servers_list(),
        ClientMessage::AccountSetServer { server_id } => session.handle_set_server(server_id),
    }
}

fn aggregate_character_counts(
    directories: &Directories,
    accounts: &[crate::directory::Account],
) -> Result<Vec<crate::wire::message::ServerCharacterCount>, SessionError> {
    use std::collections::BTreeMap;

    let mut counts: BTreeMap<i64, u32> = BTreeMap::new();
    for account in accounts {
        let characters = directories
            .characters
            .by_account_id(account.id)
            .map_err(SessionError::Upstream)?;
        for character in characters {
            *counts.entry(character.game_server_id).or_insert(0) += 1;
        }
    }
    Ok(counts
        .into_iter()
        .map(|(server_id, count)| crate::wire::message::ServerCharacterCount { server_id, count })
        .collect())
}

/// Runs a session to completion on the calling thread: sends the welcome
/// salt, reads packets until a fatal condition, then tears down.
pub fn serve(session: Arc<Session>, read_side: TcpStream) {
    info!("client connected: {}", session.peer_addr());

    if let Err(err) = session.send(&ServerMessage::AksHelloConnect {
        salt: session.salt().to_string(),
    }) {
        debug!("could not send welcome packet to {}: {err}", session.peer_addr());
        teardown(&session);
        return;
    }

    let result = read_loop(&session, read_side);

    if let Err(err) = &result
        && err.is_alarming()
    {
        log::error!("session {} ended abnormally: {err}", session.id);
    } else if let Err(err) = &result {
        debug!("session {} ended: {err}", session.id);
    }

    teardown(&session);
    info!("client disconnected: {}", session.peer_addr());
}

/// Read buffer size the spec calls for: small enough that a slow-loris
/// client can't pin an unbounded amount of unread data per connection.
const READ_BUFFER_BYTES: usize = 256;

fn read_loop(session: &Arc<Session>, read_side: TcpStream) -> Result<(), SessionError> {
    read_side.set_read_timeout(Some(session.connection_timeout))?;
    let mut reader = BufReader::with_capacity(READ_BUFFER_BYTES, read_side);

    loop {
        let record = match framing::read_record(&mut reader) {
            Ok(Some(record)) => record,
            Ok(None) => return Err(SessionError::TransientIo("connection closed".into())),
            Err(err) if is_read_timeout(&err) => {
                let _ = session.send(&ServerMessage::AksServerMessage { code: "01".to_string() });
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        session.rate_limiter.lock().unwrap_or_else(|e| e.into_inner()).wait();

        if record.is_empty() {
            continue;
        }

        // The read deadline is a rolling idle timeout, not a connection
        // lifetime cap: every real packet pushes it back out. An empty
        // record doesn't count, so spamming them can't hold the
        // connection open past the idle window.
        reader.get_ref().set_read_timeout(Some(session.connection_timeout))?;

        // Any `AccountLoginError` a policy violation warrants is sent at
        // the point of failure (login pipeline or the frame check above);
        // by the time it gets here there is nothing left to tell the
        // client, only the connection to close. A panicking handler is
        // isolated to this session rather than unwinding into the thread
        // pool and taking registry locks down with it.
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatch(session, &record))) {
            Ok(result) => result?,
            Err(payload) => {
                return Err(SessionError::Upstream(anyhow::Error::msg(panic_message(&payload))));
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked with a non-string payload".to_string()
    }
}

fn is_read_timeout(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
    )
}

fn teardown(session: &Arc<Session>) {
    if let Some(account_id) = session.account_id() {
        session.host.release_account(account_id, session.id);
    }
    session.evict();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_a_burst_then_blocks_briefly() {
        let mut limiter = RateLimiter::new(5.0, 1.0);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.wait();
        }
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn frame_table_matches_status() {
        // Constructed indirectly via a loopback pair in integration tests;
        // here we only check the pure table logic through Status.
        assert_eq!(Status::from_u8(0), Status::ExpectVersion);
        assert_eq!(Status::from_u8(3), Status::Idle);
        assert_eq!(Status::from_u8(99), Status::Idle);
    }
}
