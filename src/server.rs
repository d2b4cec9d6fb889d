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

//! Owns the listener, the session registry and the host snapshot; spawns
//! a thread per accepted connection plus the host publisher and ticket
//! reaper background loops (§4.F).

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use log::{debug, error, info};

use crate::ConnectionId;
use crate::config::ServerConfig;
use crate::crypto;
use crate::directory::{Directories, Host};
use crate::error::PolicyViolation;
use crate::session::{self, Session, SessionHost};
use crate::wire::message::ServerMessage;
use crate::{host_publisher, ticket_reaper};

const KEEPALIVE_PERIOD: Duration = Duration::from_secs(60);
const SALT_LEN: usize = 32;
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Default)]
struct SessionRegistry {
    sessions: HashMap<ConnectionId, Arc<Session>>,
    by_account_id: HashMap<i64, Arc<Session>>,
}

pub struct Server {
    config: ServerConfig,
    directories: Directories,
    registry: Mutex<SessionRegistry>,
    hosts: RwLock<String>,
    next_id: AtomicU64,
    connection_threads: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl Server {
    #[must_use]
    pub fn new(config: ServerConfig, directories: Directories) -> Self {
        Server {
            config,
            directories,
            registry: Mutex::new(SessionRegistry::default()),
            hosts: RwLock::new(ServerMessage::AccountHosts { hosts: Vec::new() }.encode()),
            next_id: AtomicU64::new(1),
            connection_threads: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn directories(&self) -> &Directories {
        &self.directories
    }

    /// Binds the listener, runs the host publisher's synchronous initial
    /// fetch, then the accept loop and the two background loops until
    /// `shutdown` is set. Joins every spawned thread before returning.
    pub fn run(self: Arc<Self>, shutdown: &Arc<AtomicBool>) -> anyhow::Result<()> {
        self.publish_hosts_once()?;

        let listener = TcpListener::bind(self.config.address.as_str())?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", self.config.address);

        let mut workers = Vec::new();

        {
            let server = Arc::clone(&self);
            let shutdown = Arc::clone(shutdown);
            workers.push(thread::spawn(move || {
                host_publisher::run(&server, &shutdown);
            }));
        }
        {
            let directories = self.directories.clone();
            let ticket_ttl = self.config.ticket_ttl;
            let shutdown = Arc::clone(shutdown);
            workers.push(thread::spawn(move || {
                ticket_reaper::run(&directories, ticket_ttl, &shutdown);
            }));
        }

        while !shutdown.load(Ordering::Acquire) {
            match listener.accept() {
                Ok((stream, peer_addr)) => {
                    let server = Arc::clone(&self);
                    let handle = thread::spawn(move || server.handle_connection(stream, peer_addr));
                    let mut threads = self.connection_threads.lock().unwrap_or_else(|e| e.into_inner());
                    threads.retain(|h| !h.is_finished());
                    threads.push(handle);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(err) => {
                    error!("accept failed: {err}");
                    shutdown.store(true, Ordering::Release);
                }
            }
        }

        drop(listener);
        self.evict_all();
        for worker in workers {
            let _ = worker.join();
        }
        let connection_threads =
            std::mem::take(&mut *self.connection_threads.lock().unwrap_or_else(|e| e.into_inner()));
        for thread in connection_threads {
            let _ = thread.join();
        }
        info!("stopped listening on {}", self.config.address);
        Ok(())
    }

    fn handle_connection(self: Arc<Self>, stream: TcpStream, peer_addr: std::net::SocketAddr) {
        if let Err(err) = enable_keepalive(&stream) {
            debug!("could not enable keepalive for {peer_addr}: {err}");
        }
        let read_side = match stream.try_clone() {
            Ok(clone) => clone,
            Err(err) => {
                error!("could not clone socket for {peer_addr}: {err}");
                return;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let salt = crypto::random_salt_of_len(SALT_LEN);
        let session = match Session::new(
            id,
            stream,
            peer_addr,
            salt,
            self.config.connection_timeout,
            self.directories.clone(),
            Arc::clone(&self) as Arc<dyn SessionHost>,
        ) {
            Ok(session) => Arc::new(session),
            Err(err) => {
                error!("could not set up session for {peer_addr}: {err}");
                return;
            }
        };

        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sessions
            .insert(id, Arc::clone(&session));

        session::serve(Arc::clone(&session), read_side);

        self.registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sessions
            .remove(&id);
    }

    fn publish_hosts_once(&self) -> anyhow::Result<()> {
        let encoded = self.fetch_encoded_hosts()?;
        *self.hosts.write().unwrap_or_else(|e| e.into_inner()) = encoded;
        Ok(())
    }

    /// Fetches the directory's game server list and encodes it the way
    /// the wire wants it: sorted ascending by id, every host reachable.
    pub(crate) fn fetch_encoded_hosts(&self) -> anyhow::Result<String> {
        let mut game_servers = self.directories.game_servers.list()?;
        game_servers.sort_by_key(|server| server.id);
        let hosts: Vec<Host> = game_servers.iter().map(Host::from).collect();
        Ok(ServerMessage::AccountHosts { hosts }.encode())
    }

    pub(crate) fn stored_hosts(&self) -> String {
        self.hosts.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub(crate) fn store_hosts(&self, encoded: &str) {
        *self.hosts.write().unwrap_or_else(|e| e.into_inner()) = encoded.to_string();
    }

    pub(crate) fn broadcast_to_idle(&self, message: &ServerMessage) {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        for session in registry.sessions.values() {
            if session.status() == session::Status::Idle {
                let _ = session.send(message);
            }
        }
    }

    fn evict_all(&self) {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        for session in registry.sessions.values() {
            let _ = session.send(&ServerMessage::AksServerMessage { code: "04".to_string() });
            session.evict();
        }
    }
}

impl SessionHost for Server {
    fn control_account(
        &self,
        account_id: i64,
        session: &Arc<Session>,
    ) -> Result<(), PolicyViolation> {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = registry.by_account_id.get(&account_id) {
            existing.evict();
            return Err(PolicyViolation::AlreadyLogged);
        }
        registry.by_account_id.insert(account_id, Arc::clone(session));
        Ok(())
    }

    fn release_account(&self, account_id: i64, session_id: ConnectionId) {
        let mut registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        if registry.by_account_id.get(&account_id).map(|s| s.id) == Some(session_id) {
            registry.by_account_id.remove(&account_id);
        }
    }

    fn current_hosts(&self) -> ServerMessage {
        let encoded = self.stored_hosts();
        ServerMessage::decode(&encoded).unwrap_or(ServerMessage::AccountHosts { hosts: Vec::new() })
    }
}

fn enable_keepalive(stream: &TcpStream) -> std::io::Result<()> {
    let socket = socket2::SockRef::from(stream);
    let keepalive = socket2::TcpKeepalive::new().with_time(KEEPALIVE_PERIOD);
    socket.set_tcp_keepalive(&keepalive)
}
