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

//! Read-only projections of accounts, users, characters and game servers,
//! plus ticket CRUD. The core never persists anything itself; it only
//! consumes these traits. [`memory`] is the one concrete implementation
//! this crate ships, seeded from a [`fixture`] file at startup.

pub mod fixture;
pub mod memory;

use std::fmt;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A game server's advertised readiness, as tracked by the directory.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum GameServerState {
    Offline,
    #[default]
    Starting,
    Online,
    Full,
}

impl GameServerState {
    /// The single ASCII digit this state serializes to on the wire.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::Offline => '0',
            Self::Starting => '1',
            Self::Online => '2',
            Self::Full => '3',
        }
    }

    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            '0' => Some(Self::Offline),
            '1' => Some(Self::Starting),
            '2' => Some(Self::Online),
            '3' => Some(Self::Full),
            _ => None,
        }
    }
}

impl fmt::Display for GameServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A game world as the directory records it.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct GameServer {
    pub id: i64,
    pub state: GameServerState,
    pub completion: u8,
    /// Where a ticket holder should dial in to actually play.
    pub host: String,
    pub port: u16,
}

/// A game world as advertised to clients in an `AccountHosts` packet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Host {
    pub id: i64,
    pub state: GameServerState,
    pub completion: u8,
    pub can_log: bool,
}

impl From<&GameServer> for Host {
    fn from(server: &GameServer) -> Self {
        Host {
            id: server.id,
            state: server.state,
            completion: server.completion,
            can_log: true,
        }
    }
}

/// A billing/login account. One user may own several.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Account {
    pub id: i64,
    pub name: String,
    pub user_id: i64,
    pub admin: bool,
    pub subscription: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub last_ip: Option<IpAddr>,
}

/// The human behind one or more accounts.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct User {
    pub id: i64,
    pub nickname: String,
    pub community: i32,
    pub secret_question: String,
    /// Opaque KDF-encoded hash string, as produced by [`crate::kdf`].
    pub hash: String,
}

/// An in-world avatar tied to one account on one game server.
#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
pub struct Character {
    pub account_id: i64,
    pub game_server_id: i64,
}

/// A one-time, short-lived authorization to connect to a game server.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Ticket {
    pub id: String,
    pub account_id: i64,
    pub game_server_id: i64,
    pub created: DateTime<Utc>,
}

/// Why a directory lookup failed.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("not found")]
    NotFound,
    #[error("directory backend: {0}")]
    Backend(#[from] anyhow::Error),
}

pub trait Accounts: Send + Sync {
    fn by_name(&self, name: &str) -> Result<Account, DirectoryError>;
    fn by_id(&self, id: i64) -> Result<Account, DirectoryError>;
    fn set_last_access_and_ip(
        &self,
        id: i64,
        accessed: DateTime<Utc>,
        ip: Option<IpAddr>,
    ) -> anyhow::Result<()>;
}

pub trait Users: Send + Sync {
    fn by_id(&self, id: i64) -> Result<User, DirectoryError>;
    fn by_nickname(&self, nickname: &str) -> Result<User, DirectoryError>;
    fn accounts_by_user_id(&self, user_id: i64) -> anyhow::Result<Vec<Account>>;
}

pub trait Characters: Send + Sync {
    fn by_account_id(&self, account_id: i64) -> anyhow::Result<Vec<Character>>;
}

pub trait GameServers: Send + Sync {
    fn list(&self) -> anyhow::Result<Vec<GameServer>>;
    fn by_id(&self, id: i64) -> Result<GameServer, DirectoryError>;
}

pub trait Tickets: Send + Sync {
    fn create(&self, account_id: i64, game_server_id: i64) -> anyhow::Result<Ticket>;
    /// Deletes every ticket with `created < cutoff`. Returns how many were removed.
    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize>;
}

/// The five directory collaborators, grouped for passing to a session or
/// background loop as one handle.
#[derive(Clone)]
pub struct Directories {
    pub accounts: std::sync::Arc<dyn Accounts>,
    pub users: std::sync::Arc<dyn Users>,
    pub characters: std::sync::Arc<dyn Characters>,
    pub game_servers: std::sync::Arc<dyn GameServers>,
    pub tickets: std::sync::Arc<dyn Tickets>,
}
