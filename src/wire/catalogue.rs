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

//! The fixed id tables for each direction. Ids are ASCII prefixes of a
//! record; a record's id is the *longest* registered prefix that matches.
//! `AksServerMessage`'s `"AHM"` is a prefix-superstring of `AksHelloConnect`'s
//! `"AH"`, which is why `by_record` resolves ties by longest match rather
//! than by declaration order.

use std::fmt;

/// Ids the server accepts from the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClientMessageId {
    AccountVersion,
    AccountCredential,
    AccountQueuePosition,
    AccountGetServersList,
    AccountSearchForFriend,
    AccountSetServer,
}

impl ClientMessageId {
    /// Every known id, longest prefix first so a linear scan picks the
    /// longest match without needing a trie.
    const ALL: &'static [Self] = &[
        Self::AccountVersion,
        Self::AccountCredential,
        Self::AccountQueuePosition,
        Self::AccountGetServersList,
        Self::AccountSearchForFriend,
        Self::AccountSetServer,
    ];

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::AccountVersion => "AV",
            Self::AccountCredential => "AT",
            Self::AccountQueuePosition => "AQ",
            Self::AccountGetServersList => "AX",
            Self::AccountSearchForFriend => "AF",
            Self::AccountSetServer => "AS",
        }
    }

    /// The id whose prefix the record starts with, longest match wins.
    #[must_use]
    pub fn by_record(record: &str) -> Option<Self> {
        longest_prefix_match(record, Self::ALL, Self::prefix)
    }
}

impl fmt::Display for ClientMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Ids the client accepts from the server.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ServerMessageId {
    AksHelloConnect,
    AccountNewQueue,
    AccountLoginError,
    AccountLoginSuccess,
    AccountPseudo,
    AccountCommunity,
    AccountSecretQuestion,
    AccountHosts,
    AccountServersListSuccess,
    AccountFriendServerList,
    AccountSelectServerPlainSuccess,
    BasicsNothing,
    AksServerMessage,
}

impl ServerMessageId {
    const ALL: &'static [Self] = &[
        Self::AksHelloConnect,
        Self::AccountNewQueue,
        Self::AccountLoginError,
        Self::AccountLoginSuccess,
        Self::AccountPseudo,
        Self::AccountCommunity,
        Self::AccountSecretQuestion,
        Self::AccountHosts,
        Self::AccountServersListSuccess,
        Self::AccountFriendServerList,
        Self::AccountSelectServerPlainSuccess,
        Self::BasicsNothing,
        Self::AksServerMessage,
    ];

    #[must_use]
    pub fn prefix(self) -> &'static str {
        match self {
            Self::AksHelloConnect => "AH",
            Self::AccountNewQueue => "AQ",
            Self::AccountLoginError => "AE",
            Self::AccountLoginSuccess => "AL",
            Self::AccountPseudo => "AP",
            Self::AccountCommunity => "AC",
            Self::AccountSecretQuestion => "ASQ",
            Self::AccountHosts => "AX",
            Self::AccountServersListSuccess => "ASL",
            Self::AccountFriendServerList => "AFL",
            Self::AccountSelectServerPlainSuccess => "ASS",
            Self::BasicsNothing => "BN",
            Self::AksServerMessage => "AHM",
        }
    }

    #[must_use]
    pub fn by_record(record: &str) -> Option<Self> {
        longest_prefix_match(record, Self::ALL, Self::prefix)
    }
}

impl fmt::Display for ServerMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

fn longest_prefix_match<T: Copy>(record: &str, all: &[T], prefix: impl Fn(T) -> &'static str) -> Option<T> {
    all.iter()
        .copied()
        .filter(|id| record.starts_with(prefix(*id)))
        .max_by_key(|id| prefix(*id).len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longest_prefix_wins_over_shorter_one() {
        let matched = ServerMessageId::by_record("AHM01");
        assert_eq!(matched, Some(ServerMessageId::AksServerMessage));
        let matched = ServerMessageId::by_record("AHsomesalt");
        assert_eq!(matched, Some(ServerMessageId::AksHelloConnect));
    }

    #[test]
    fn unknown_record_has_no_id() {
        assert_eq!(ClientMessageId::by_record("zzz"), None);
        assert_eq!(ServerMessageId::by_record(""), None);
    }

    #[test]
    fn every_id_round_trips_through_its_own_prefix() {
        for id in ClientMessageId::ALL {
            assert_eq!(ClientMessageId::by_record(id.prefix()), Some(*id));
        }
        for id in ServerMessageId::ALL {
            assert_eq!(ServerMessageId::by_record(id.prefix()), Some(*id));
        }
    }
}
