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

//! `RwLock`-guarded in-memory directory, seeded once at construction and
//! mutated only through the trait methods (ticket creation/expiry,
//! last-access bookkeeping).

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use super::{
    Account, Accounts, Character, Characters, DirectoryError, GameServer, GameServers, Ticket,
    Tickets, User, Users,
};

/// The full directory snapshot a fixture file deserializes into.
#[derive(Clone, Debug, Default, serde::Deserialize)]
pub struct Fixture {
    pub accounts: Vec<Account>,
    pub users: Vec<User>,
    pub characters: Vec<Character>,
    pub game_servers: Vec<GameServer>,
}

pub struct MemoryDirectory {
    accounts: RwLock<HashMap<i64, Account>>,
    users: RwLock<HashMap<i64, User>>,
    characters: RwLock<Vec<Character>>,
    game_servers: RwLock<HashMap<i64, GameServer>>,
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl MemoryDirectory {
    #[must_use]
    pub fn from_fixture(fixture: Fixture) -> Self {
        let accounts = fixture.accounts.into_iter().map(|a| (a.id, a)).collect();
        let users = fixture.users.into_iter().map(|u| (u.id, u)).collect();
        let game_servers = fixture
            .game_servers
            .into_iter()
            .map(|g| (g.id, g))
            .collect();
        MemoryDirectory {
            accounts: RwLock::new(accounts),
            users: RwLock::new(users),
            characters: RwLock::new(fixture.characters),
            game_servers: RwLock::new(game_servers),
            tickets: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces a game server's directory entry in place, as an external
    /// operator changing world state would. Used by tests and by the
    /// `--systemd` notify-reload path.
    pub fn set_game_server(&self, server: GameServer) {
        let mut guard = self.game_servers.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(server.id, server);
    }
}

impl Accounts for MemoryDirectory {
    fn by_name(&self, name: &str) -> Result<Account, DirectoryError> {
        let guard = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        guard
            .values()
            .find(|a| a.name == name)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    fn by_id(&self, id: i64) -> Result<Account, DirectoryError> {
        let guard = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        guard.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    fn set_last_access_and_ip(
        &self,
        id: i64,
        accessed: DateTime<Utc>,
        ip: Option<IpAddr>,
    ) -> anyhow::Result<()> {
        let mut guard = self.accounts.write().unwrap_or_else(|e| e.into_inner());
        let account = guard
            .get_mut(&id)
            .ok_or_else(|| anyhow::Error::msg(format!("no such account: {id}")))?;
        account.last_access = accessed;
        account.last_ip = ip;
        Ok(())
    }
}

impl Users for MemoryDirectory {
    fn by_id(&self, id: i64) -> Result<User, DirectoryError> {
        let guard = self.users.read().unwrap_or_else(|e| e.into_inner());
        guard.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }

    fn by_nickname(&self, nickname: &str) -> Result<User, DirectoryError> {
        let guard = self.users.read().unwrap_or_else(|e| e.into_inner());
        guard
            .values()
            .find(|u| u.nickname == nickname)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    fn accounts_by_user_id(&self, user_id: i64) -> anyhow::Result<Vec<Account>> {
        let guard = self.accounts.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .values()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect())
    }
}

impl Characters for MemoryDirectory {
    fn by_account_id(&self, account_id: i64) -> anyhow::Result<Vec<Character>> {
        let guard = self.characters.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard
            .iter()
            .filter(|c| c.account_id == account_id)
            .copied()
            .collect())
    }
}

impl GameServers for MemoryDirectory {
    fn list(&self) -> anyhow::Result<Vec<GameServer>> {
        let guard = self.game_servers.read().unwrap_or_else(|e| e.into_inner());
        Ok(guard.values().cloned().collect())
    }

    fn by_id(&self, id: i64) -> Result<GameServer, DirectoryError> {
        let guard = self.game_servers.read().unwrap_or_else(|e| e.into_inner());
        guard.get(&id).cloned().ok_or(DirectoryError::NotFound)
    }
}

impl Tickets for MemoryDirectory {
    fn create(&self, account_id: i64, game_server_id: i64) -> anyhow::Result<Ticket> {
        let ticket = Ticket {
            id: uuid_like_id(),
            account_id,
            game_server_id,
            created: Utc::now(),
        };
        let mut guard = self.tickets.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(ticket.id.clone(), ticket.clone());
        Ok(ticket)
    }

    fn delete_older_than(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let mut guard = self.tickets.write().unwrap_or_else(|e| e.into_inner());
        let before = guard.len();
        guard.retain(|_, ticket| ticket.created >= cutoff);
        Ok(before - guard.len())
    }
}

/// A random-enough opaque ticket id without pulling in a UUID crate just
/// for this one call site.
fn uuid_like_id() -> String {
    use old_rand::RngCore;
    let mut bytes = [0u8; 16];
    old_rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_fixture() -> Fixture {
        Fixture::default()
    }

    #[test]
    fn ticket_create_then_reap() {
        let dir = MemoryDirectory::from_fixture(empty_fixture());
        let ticket = dir.create(1, 2).unwrap();
        assert_eq!(ticket.account_id, 1);
        assert_eq!(dir.delete_older_than(Utc::now() - chrono::Duration::seconds(10)).unwrap(), 0);
        assert_eq!(dir.delete_older_than(Utc::now() + chrono::Duration::seconds(10)).unwrap(), 1);
    }

    #[test]
    fn account_lookup_by_name_and_id() {
        let mut fixture = empty_fixture();
        fixture.accounts.push(Account {
            id: 1,
            name: "alice".into(),
            user_id: 10,
            admin: false,
            subscription: Utc::now(),
            last_access: Utc::now(),
            last_ip: None,
        });
        let dir = MemoryDirectory::from_fixture(fixture);
        assert_eq!(dir.by_name("alice").unwrap().id, 1);
        assert_eq!(dir.by_id(1).unwrap().name, "alice");
        assert!(matches!(dir.by_name("bob"), Err(DirectoryError::NotFound)));
    }
}
