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

//! The message catalogue's body grammars, and the `decode`/`encode` pair
//! the round-trip law binds: `decode(encode(m)) == m` for every message
//! here, `encode(decode(s)) == s` for every well-formed record.

use std::fmt;

use crate::directory::{GameServerState, Host};

use super::catalogue::{ClientMessageId, ServerMessageId};

/// `<major>.<minor>.<patch>.<build>`, the client's reported protocol version.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ClientVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub build: u32,
}

impl fmt::Display for ClientVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}.{}", self.major, self.minor, self.patch, self.build)
    }
}

impl std::str::FromStr for ClientVersion {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        let mut parts = value.splitn(4, '.');
        let mut next = || -> anyhow::Result<u32> {
            parts
                .next()
                .ok_or_else(|| anyhow::Error::msg("version has too few components"))?
                .parse()
                .map_err(|_| anyhow::Error::msg("version component is not an integer"))
        };
        let version = ClientVersion {
            major: next()?,
            minor: next()?,
            patch: next()?,
            build: next()?,
        };
        if parts.next().is_some() {
            anyhow::bail!("version has too many components");
        }
        Ok(version)
    }
}

/// The obfuscated credential a client presents.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Credential {
    pub crypto_method: u8,
    pub username: String,
    pub hash: String,
}

/// One row of a server's per-account or per-friend character breakdown:
/// how many characters that account has on game server `server_id`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ServerCharacterCount {
    pub server_id: i64,
    pub count: u32,
}

/// Why a login attempt was refused, as sent to the client.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoginErrorReason {
    BadVersion,
    UnsupportedCrypto,
    AccessDenied,
    AlreadyLogged,
}

impl LoginErrorReason {
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Self::BadVersion => '0',
            Self::UnsupportedCrypto => '1',
            Self::AccessDenied => '2',
            Self::AlreadyLogged => '3',
        }
    }
}

/// A decoded message from the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ClientMessage {
    AccountVersion(ClientVersion),
    AccountCredential(Credential),
    AccountQueuePosition,
    AccountGetServersList,
    AccountSearchForFriend { pseudo: String },
    AccountSetServer { server_id: i64 },
}

/// A message the server can send.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ServerMessage {
    AksHelloConnect {
        salt: String,
    },
    AccountNewQueue {
        position: u32,
        total_subscribers: u32,
        total_non_subscribers: u32,
        subscriber: bool,
        queue_id: u32,
    },
    AccountLoginError {
        reason: LoginErrorReason,
        extra: String,
    },
    AccountLoginSuccess {
        authorized: bool,
    },
    AccountPseudo {
        nickname: String,
    },
    AccountCommunity {
        id: i32,
    },
    AccountSecretQuestion {
        value: String,
    },
    AccountHosts {
        hosts: Vec<Host>,
    },
    AccountServersListSuccess {
        subscription: chrono::DateTime<chrono::Utc>,
        servers: Vec<ServerCharacterCount>,
    },
    AccountFriendServerList {
        servers: Vec<ServerCharacterCount>,
    },
    AccountSelectServerPlainSuccess {
        host: String,
        port: u16,
        ticket: String,
    },
    BasicsNothing,
    AksServerMessage {
        code: String,
    },
}

impl ClientMessage {
    /// Decodes a framed record (post null-strip) into a known message.
    pub fn decode(record: &str) -> anyhow::Result<Self> {
        let id = ClientMessageId::by_record(record)
            .ok_or_else(|| anyhow::Error::msg("unknown message id"))?;
        let body = &record[id.prefix().len()..];
        match id {
            ClientMessageId::AccountVersion => Ok(Self::AccountVersion(body.parse()?)),
            ClientMessageId::AccountCredential => {
                let mut chars = body.chars();
                let crypto_method = chars
                    .next()
                    .ok_or_else(|| anyhow::Error::msg("credential body is empty"))?;
                let crypto_method = crypto_method
                    .to_digit(10)
                    .ok_or_else(|| anyhow::Error::msg("crypto method is not a digit"))?
                    as u8;
                let rest = chars.as_str();
                let (username, hash) = rest
                    .split_once('\n')
                    .ok_or_else(|| anyhow::Error::msg("credential body has no newline"))?;
                Ok(Self::AccountCredential(Credential {
                    crypto_method,
                    username: username.to_string(),
                    hash: hash.to_string(),
                }))
            }
            ClientMessageId::AccountQueuePosition => Ok(Self::AccountQueuePosition),
            ClientMessageId::AccountGetServersList => Ok(Self::AccountGetServersList),
            ClientMessageId::AccountSearchForFriend => Ok(Self::AccountSearchForFriend {
                pseudo: body.to_string(),
            }),
            ClientMessageId::AccountSetServer => Ok(Self::AccountSetServer {
                server_id: body
                    .parse()
                    .map_err(|_| anyhow::Error::msg("server id is not an integer"))?,
            }),
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::AccountVersion(version) => {
                format!("{}{version}", ClientMessageId::AccountVersion)
            }
            Self::AccountCredential(credential) => format!(
                "{}{}{}\n{}",
                ClientMessageId::AccountCredential,
                credential.crypto_method,
                credential.username,
                credential.hash
            ),
            Self::AccountQueuePosition => ClientMessageId::AccountQueuePosition.to_string(),
            Self::AccountGetServersList => ClientMessageId::AccountGetServersList.to_string(),
            Self::AccountSearchForFriend { pseudo } => {
                format!("{}{pseudo}", ClientMessageId::AccountSearchForFriend)
            }
            Self::AccountSetServer { server_id } => {
                format!("{}{server_id}", ClientMessageId::AccountSetServer)
            }
        }
    }
}

fn encode_server_character_counts(servers: &[ServerCharacterCount]) -> String {
    servers
        .iter()
        .map(|s| format!("{},{}", s.server_id, s.count))
        .collect::<Vec<_>>()
        .join("|")
}

fn decode_server_character_counts(body: &str) -> anyhow::Result<Vec<ServerCharacterCount>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split('|')
        .map(|entry| {
            let (id, count) = entry
                .split_once(',')
                .ok_or_else(|| anyhow::Error::msg("server entry missing comma"))?;
            Ok(ServerCharacterCount {
                server_id: id
                    .parse()
                    .map_err(|_| anyhow::Error::msg("server id is not an integer"))?,
                count: count
                    .parse()
                    .map_err(|_| anyhow::Error::msg("character count is not an integer"))?,
            })
        })
        .collect()
}

fn encode_hosts(hosts: &[Host]) -> String {
    hosts
        .iter()
        .map(|h| {
            format!(
                "{};{};{};{}",
                h.id,
                h.state.code(),
                h.completion,
                u8::from(h.can_log)
            )
        })
        .collect::<Vec<_>>()
        .join("|")
}

fn decode_hosts(body: &str) -> anyhow::Result<Vec<Host>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split('|')
        .map(|entry| {
            let mut fields = entry.split(';');
            let id = fields
                .next()
                .ok_or_else(|| anyhow::Error::msg("host entry missing id"))?
                .parse()
                .map_err(|_| anyhow::Error::msg("host id is not an integer"))?;
            let state_code = fields
                .next()
                .and_then(|s| s.chars().next())
                .ok_or_else(|| anyhow::Error::msg("host entry missing state"))?;
            let state = GameServerState::from_code(state_code)
                .ok_or_else(|| anyhow::Error::msg("unknown host state code"))?;
            let completion = fields
                .next()
                .ok_or_else(|| anyhow::Error::msg("host entry missing completion"))?
                .parse()
                .map_err(|_| anyhow::Error::msg("completion is not an integer"))?;
            let can_log = fields
                .next()
                .ok_or_else(|| anyhow::Error::msg("host entry missing can_log"))?
                == "1";
            Ok(Host {
                id,
                state,
                completion,
                can_log,
            })
        })
        .collect()
}

impl ServerMessage {
    pub fn decode(record: &str) -> anyhow::Result<Self> {
        let id = ServerMessageId::by_record(record)
            .ok_or_else(|| anyhow::Error::msg("unknown message id"))?;
        let body = &record[id.prefix().len()..];
        match id {
            ServerMessageId::AksHelloConnect => Ok(Self::AksHelloConnect {
                salt: body.to_string(),
            }),
            ServerMessageId::AccountNewQueue => {
                let mut fields = body.split('|');
                let mut next = |what: &str| -> anyhow::Result<&str> {
                    fields
                        .next()
                        .ok_or_else(|| anyhow::Error::msg(format!("queue body missing {what}")))
                };
                let position = next("position")?
                    .parse()
                    .map_err(|_| anyhow::Error::msg("position is not an integer"))?;
                let total_subscribers = next("totalSub")?
                    .parse()
                    .map_err(|_| anyhow::Error::msg("totalSub is not an integer"))?;
                let total_non_subscribers = next("totalNonSub")?
                    .parse()
                    .map_err(|_| anyhow::Error::msg("totalNonSub is not an integer"))?;
                let subscriber = next("sub")? == "1";
                let queue_id = next("queueId")?
                    .parse()
                    .map_err(|_| anyhow::Error::msg("queueId is not an integer"))?;
                Ok(Self::AccountNewQueue {
                    position,
                    total_subscribers,
                    total_non_subscribers,
                    subscriber,
                    queue_id,
                })
            }
            ServerMessageId::AccountLoginError => {
                let mut chars = body.chars();
                let code = chars
                    .next()
                    .ok_or_else(|| anyhow::Error::msg("login error body is empty"))?;
                let reason = match code {
                    '0' => LoginErrorReason::BadVersion,
                    '1' => LoginErrorReason::UnsupportedCrypto,
                    '2' => LoginErrorReason::AccessDenied,
                    '3' => LoginErrorReason::AlreadyLogged,
                    _ => anyhow::bail!("unknown login error reason code"),
                };
                Ok(Self::AccountLoginError {
                    reason,
                    extra: chars.as_str().to_string(),
                })
            }
            ServerMessageId::AccountLoginSuccess => Ok(Self::AccountLoginSuccess {
                authorized: body == "1",
            }),
            ServerMessageId::AccountPseudo => Ok(Self::AccountPseudo {
                nickname: body.to_string(),
            }),
            ServerMessageId::AccountCommunity => Ok(Self::AccountCommunity {
                id: body
                    .parse()
                    .map_err(|_| anyhow::Error::msg("community id is not an integer"))?,
            }),
            ServerMessageId::AccountSecretQuestion => Ok(Self::AccountSecretQuestion {
                value: body.to_string(),
            }),
            ServerMessageId::AccountHosts => Ok(Self::AccountHosts {
                hosts: decode_hosts(body)?,
            }),
            ServerMessageId::AccountServersListSuccess => {
                let (subscription, rest) = body
                    .split_once('|')
                    .map_or((body, ""), |(sub, rest)| (sub, rest));
                let timestamp: i64 = subscription
                    .parse()
                    .map_err(|_| anyhow::Error::msg("subscription is not a unix timestamp"))?;
                let subscription = chrono::DateTime::from_timestamp(timestamp, 0)
                    .ok_or_else(|| anyhow::Error::msg("subscription timestamp out of range"))?;
                Ok(Self::AccountServersListSuccess {
                    subscription,
                    servers: decode_server_character_counts(rest)?,
                })
            }
            ServerMessageId::AccountFriendServerList => Ok(Self::AccountFriendServerList {
                servers: decode_server_character_counts(body)?,
            }),
            ServerMessageId::AccountSelectServerPlainSuccess => {
                let (address, ticket) = body
                    .split_once(';')
                    .ok_or_else(|| anyhow::Error::msg("select-server body missing ticket"))?;
                let (host, port) = address
                    .rsplit_once(':')
                    .ok_or_else(|| anyhow::Error::msg("select-server body missing port"))?;
                Ok(Self::AccountSelectServerPlainSuccess {
                    host: host.to_string(),
                    port: port
                        .parse()
                        .map_err(|_| anyhow::Error::msg("port is not an integer"))?,
                    ticket: ticket.to_string(),
                })
            }
            ServerMessageId::BasicsNothing => Ok(Self::BasicsNothing),
            ServerMessageId::AksServerMessage => Ok(Self::AksServerMessage {
                code: body.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::AksHelloConnect { salt } => format!("{}{salt}", ServerMessageId::AksHelloConnect),
            Self::AccountNewQueue {
                position,
                total_subscribers,
                total_non_subscribers,
                subscriber,
                queue_id,
            } => format!(
                "{}{position}|{total_subscribers}|{total_non_subscribers}|{}|{queue_id}",
                ServerMessageId::AccountNewQueue,
                u8::from(*subscriber)
            ),
            Self::AccountLoginError { reason, extra } => {
                format!("{}{}{extra}", ServerMessageId::AccountLoginError, reason.code())
            }
            Self::AccountLoginSuccess { authorized } => format!(
                "{}{}",
                ServerMessageId::AccountLoginSuccess,
                u8::from(*authorized)
            ),
            Self::AccountPseudo { nickname } => {
                format!("{}{nickname}", ServerMessageId::AccountPseudo)
            }
            Self::AccountCommunity { id } => format!("{}{id}", ServerMessageId::AccountCommunity),
            Self::AccountSecretQuestion { value } => {
                format!("{}{value}", ServerMessageId::AccountSecretQuestion)
            }
            Self::AccountHosts { hosts } => {
                format!("{}{}", ServerMessageId::AccountHosts, encode_hosts(hosts))
            }
            Self::AccountServersListSuccess {
                subscription,
                servers,
            } => format!(
                "{}{}|{}",
                ServerMessageId::AccountServersListSuccess,
                subscription.timestamp(),
                encode_server_character_counts(servers)
            ),
            Self::AccountFriendServerList { servers } => format!(
                "{}{}",
                ServerMessageId::AccountFriendServerList,
                encode_server_character_counts(servers)
            ),
            Self::AccountSelectServerPlainSuccess { host, port, ticket } => format!(
                "{}{host}:{port};{ticket}",
                ServerMessageId::AccountSelectServerPlainSuccess
            ),
            Self::BasicsNothing => ServerMessageId::BasicsNothing.to_string(),
            Self::AksServerMessage { code } => {
                format!("{}{code}", ServerMessageId::AksServerMessage)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_version_round_trips() {
        let msg = ClientMessage::AccountVersion(ClientVersion {
            major: 1,
            minor: 29,
            patch: 0,
            build: 0,
        });
        let encoded = msg.encode();
        assert_eq!(ClientMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn account_credential_round_trips() {
        let msg = ClientMessage::AccountCredential(Credential {
            crypto_method: 1,
            username: "alice".to_string(),
            hash: "abcd1234".to_string(),
        });
        let encoded = msg.encode();
        assert_eq!(encoded, "AT1alice\nabcd1234");
        assert_eq!(ClientMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn account_hosts_round_trips_and_sorts_are_caller_responsibility() {
        let msg = ServerMessage::AccountHosts {
            hosts: vec![
                Host {
                    id: 1,
                    state: GameServerState::Online,
                    completion: 50,
                    can_log: true,
                },
                Host {
                    id: 2,
                    state: GameServerState::Starting,
                    completion: 0,
                    can_log: true,
                },
            ],
        };
        let encoded = msg.encode();
        assert_eq!(encoded, "AX1;2;50;1|2;1;0;1");
        assert_eq!(ServerMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn account_new_queue_matches_s1_scenario() {
        let msg = ServerMessage::AccountNewQueue {
            position: 1,
            total_subscribers: 0,
            total_non_subscribers: 1,
            subscriber: false,
            queue_id: 0,
        };
        assert_eq!(msg.encode(), "AQ1|0|1|0|0");
    }

    #[test]
    fn account_select_server_plain_success_round_trips() {
        let msg = ServerMessage::AccountSelectServerPlainSuccess {
            host: "10.0.0.5".to_string(),
            port: 5000,
            ticket: "deadbeef".to_string(),
        };
        let encoded = msg.encode();
        assert_eq!(ServerMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn aks_server_message_round_trips_and_is_not_shadowed_by_hello_connect() {
        let msg = ServerMessage::AksServerMessage { code: "01".to_string() };
        let encoded = msg.encode();
        assert_eq!(encoded, "AHM01");
        assert_eq!(ServerMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn unknown_id_is_an_error() {
        assert!(ClientMessage::decode("ZZfoo").is_err());
    }

    #[test]
    fn basics_nothing_round_trips() {
        let encoded = ServerMessage::BasicsNothing.encode();
        assert_eq!(encoded, "BN");
        assert_eq!(ServerMessage::decode(&encoded).unwrap(), ServerMessage::BasicsNothing);
    }
}
