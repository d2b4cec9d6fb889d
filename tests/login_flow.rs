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

//! End-to-end login pipeline scenarios, driven over a real loopback socket
//! against an in-process [`Server`].

use std::io::BufReader;
use std::net::TcpStream;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use gatehouse::Server;
use gatehouse::config::ServerConfig;
use gatehouse::directory::memory::{Fixture, MemoryDirectory};
use gatehouse::directory::{Account, Directories, GameServer, GameServerState, Tickets, User};
use gatehouse::wire::framing;
use gatehouse::wire::message::{ClientMessage, ClientVersion, Credential, LoginErrorReason, ServerMessage};

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";

/// The inverse of `crypto::decrypt_password`, played forward so a test can
/// pretend to be the reference client without a real one on hand.
fn encode_password(plain: &str, salt: &str) -> String {
    let len = ALPHABET.len() as i32;
    let key = salt.as_bytes();
    let mut out = String::new();
    for (i, ch) in plain.chars().enumerate() {
        let code = ch as i32;
        let key_byte = i32::from(key[i]);
        let a_pass = code / 16;
        let a_key = code % 16;
        let mut anb = a_pass + key_byte;
        anb %= len;
        let mut anb2 = a_key + key_byte;
        anb2 %= len;
        out.push(ALPHABET[anb as usize] as char);
        out.push(ALPHABET[anb2 as usize] as char);
    }
    out
}

fn connect(addr: &str) -> TcpStream {
    for _ in 0..200 {
        if let Ok(stream) = TcpStream::connect(addr) {
            return stream;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("could not connect to {addr}");
}

fn send(stream: &mut TcpStream, message: &ClientMessage) {
    use std::io::Write;
    stream
        .write_all(&framing::encode_record(&message.encode()))
        .unwrap();
}

fn recv(reader: &mut BufReader<TcpStream>) -> ServerMessage {
    let record = framing::read_record(reader)
        .unwrap()
        .expect("connection closed before expected message");
    ServerMessage::decode(&record).unwrap()
}

fn recv_is_closed(reader: &mut BufReader<TcpStream>) -> bool {
    matches!(framing::read_record(reader), Ok(None) | Err(_))
}

fn alice_account() -> Account {
    Account {
        id: 1,
        name: "alice".to_string(),
        user_id: 1,
        admin: false,
        subscription: Utc::now(),
        last_access: Utc::now(),
        last_ip: None,
    }
}

fn alice_user() -> User {
    User {
        id: 1,
        nickname: "Alice".to_string(),
        community: 0,
        secret_question: "q".to_string(),
        hash: gatehouse::kdf::hash("pw123").unwrap(),
    }
}

fn game_servers() -> Vec<GameServer> {
    vec![
        GameServer {
            id: 1,
            state: GameServerState::Online,
            completion: 50,
            host: "host1".to_string(),
            port: 7777,
        },
        GameServer {
            id: 2,
            state: GameServerState::Starting,
            completion: 0,
            host: "host2".to_string(),
            port: 7778,
        },
    ]
}

/// Spawns a server on `addr` against `memory`, returning the shutdown flag
/// and join handle the caller must signal and join when done.
fn spawn_server(addr: &str, memory: Arc<MemoryDirectory>) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let mut config = ServerConfig::default();
    config.address = addr.to_string();

    let directories = Directories {
        accounts: memory.clone(),
        users: memory.clone(),
        characters: memory.clone(),
        game_servers: memory.clone(),
        tickets: memory,
    };

    let server = Arc::new(Server::new(config, directories));
    let shutdown = Arc::new(AtomicBool::new(false));
    let handle = {
        let shutdown = Arc::clone(&shutdown);
        thread::spawn(move || {
            server.run(&shutdown).unwrap();
        })
    };
    (shutdown, handle)
}

fn stop(shutdown: Arc<AtomicBool>, handle: thread::JoinHandle<()>) {
    shutdown.store(true, Ordering::Release);
    handle.join().unwrap();
}

/// Runs version + credential + queue-position, returning the reader/writer
/// pair positioned right after the welcome salt has been consumed.
fn handshake(addr: &str, version: ClientVersion, password: &str) -> (TcpStream, BufReader<TcpStream>, String) {
    let mut stream = connect(addr);
    let mut reader = BufReader::new(stream.try_clone().unwrap());

    let salt = match recv(&mut reader) {
        ServerMessage::AksHelloConnect { salt } => salt,
        other => panic!("expected welcome salt, got {other:?}"),
    };

    send(&mut stream, &ClientMessage::AccountVersion(version));
    send(
        &mut stream,
        &ClientMessage::AccountCredential(Credential {
            crypto_method: 1,
            username: "alice".to_string(),
            hash: encode_password(password, &salt),
        }),
    );
    send(&mut stream, &ClientMessage::AccountQueuePosition);

    (stream, reader, salt)
}

#[test]
fn s1_happy_path_logs_in_and_reaches_idle() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: game_servers(),
    }));
    let (shutdown, handle) = spawn_server("127.0.0.1:48761", memory);

    let (_stream, mut reader, _salt) = handshake("127.0.0.1:48761", ClientVersion { major: 1, minor: 29, patch: 0, build: 0 }, "pw123");

    assert_eq!(
        recv(&mut reader),
        ServerMessage::AccountNewQueue {
            position: 1,
            total_subscribers: 0,
            total_non_subscribers: 1,
            subscriber: false,
            queue_id: 0,
        }
    );
    assert_eq!(recv(&mut reader), ServerMessage::AccountPseudo { nickname: "Alice".to_string() });
    assert_eq!(recv(&mut reader), ServerMessage::AccountCommunity { id: 0 });
    assert_eq!(recv(&mut reader), ServerMessage::AccountSecretQuestion { value: "q".to_string() });
    match recv(&mut reader) {
        ServerMessage::AccountHosts { hosts } => {
            assert_eq!(hosts.len(), 2);
            assert_eq!(hosts[0].id, 1);
            assert_eq!(hosts[0].state, GameServerState::Online);
            assert_eq!(hosts[1].id, 2);
            assert_eq!(hosts[1].state, GameServerState::Starting);
        }
        other => panic!("expected AccountHosts, got {other:?}"),
    }
    assert_eq!(recv(&mut reader), ServerMessage::AccountLoginSuccess { authorized: false });

    stop(shutdown, handle);
}

#[test]
fn s2_version_too_old_is_rejected() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: Vec::new(),
    }));
    let (shutdown, handle) = spawn_server("127.0.0.1:48762", memory);

    let (_stream, mut reader, _salt) = handshake("127.0.0.1:48762", ClientVersion { major: 1, minor: 28, patch: 0, build: 0 }, "pw123");

    let _ = recv(&mut reader); // AccountNewQueue
    assert_eq!(
        recv(&mut reader),
        ServerMessage::AccountLoginError { reason: LoginErrorReason::BadVersion, extra: "^1.29.0".to_string() }
    );
    assert!(recv_is_closed(&mut reader));

    stop(shutdown, handle);
}

#[test]
fn s3_wrong_password_is_rejected() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: Vec::new(),
    }));
    let (shutdown, handle) = spawn_server("127.0.0.1:48763", memory);

    let (_stream, mut reader, _salt) = handshake("127.0.0.1:48763", ClientVersion { major: 1, minor: 29, patch: 0, build: 0 }, "not-pw123");

    let _ = recv(&mut reader); // AccountNewQueue
    assert_eq!(
        recv(&mut reader),
        ServerMessage::AccountLoginError { reason: LoginErrorReason::AccessDenied, extra: String::new() }
    );
    assert!(recv_is_closed(&mut reader));

    stop(shutdown, handle);
}

#[test]
fn s4_second_login_evicts_first_and_both_end_logged_out() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: Vec::new(),
    }));
    let (shutdown, handle) = spawn_server("127.0.0.1:48764", memory);

    let version = ClientVersion { major: 1, minor: 29, patch: 0, build: 0 };
    let (_first_stream, mut first_reader, _salt) = handshake("127.0.0.1:48764", version, "pw123");
    for _ in 0..6 {
        recv(&mut first_reader); // drain the welcome burst up to AccountLoginSuccess
    }

    let watcher = thread::spawn(move || recv_is_closed(&mut first_reader));

    let (_second_stream, mut second_reader, _salt2) = handshake("127.0.0.1:48764", version, "pw123");
    let _ = recv(&mut second_reader); // AccountNewQueue
    assert_eq!(
        recv(&mut second_reader),
        ServerMessage::AccountLoginError { reason: LoginErrorReason::AlreadyLogged, extra: String::new() }
    );
    assert!(recv_is_closed(&mut second_reader));
    assert!(watcher.join().unwrap(), "first session should be evicted on conflict");

    stop(shutdown, handle);
}

#[test]
fn s5_set_server_issues_a_ticket_and_closes() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: game_servers(),
    }));
    let tickets = memory.clone();
    let (shutdown, handle) = spawn_server("127.0.0.1:48765", memory);

    let version = ClientVersion { major: 1, minor: 29, patch: 0, build: 0 };
    let (mut stream, mut reader, _salt) = handshake("127.0.0.1:48765", version, "pw123");
    for _ in 0..6 {
        recv(&mut reader);
    }

    send(&mut stream, &ClientMessage::AccountSetServer { server_id: 1 });
    match recv(&mut reader) {
        ServerMessage::AccountSelectServerPlainSuccess { host, port, ticket } => {
            assert_eq!(host, "host1");
            assert_eq!(port, 7777);
            assert!(!ticket.is_empty());
        }
        other => panic!("expected AccountSelectServerPlainSuccess, got {other:?}"),
    }
    assert!(recv_is_closed(&mut reader));

    let deleted = tickets
        .delete_older_than(Utc::now() + chrono::Duration::seconds(5))
        .unwrap();
    assert_eq!(deleted, 1, "the ticket issued above should still be on record");

    stop(shutdown, handle);
}

#[test]
fn s6_host_change_reaches_idle_sessions_within_a_couple_of_ticks() {
    let memory = Arc::new(MemoryDirectory::from_fixture(Fixture {
        accounts: vec![alice_account()],
        users: vec![alice_user()],
        characters: Vec::new(),
        game_servers: game_servers(),
    }));
    let flip = memory.clone();
    let (shutdown, handle) = spawn_server("127.0.0.1:48766", memory);

    let version = ClientVersion { major: 1, minor: 29, patch: 0, build: 0 };
    let (_idle_stream, mut idle_reader, _salt) = handshake("127.0.0.1:48766", version, "pw123");
    for _ in 0..6 {
        recv(&mut idle_reader); // now IDLE
    }

    let mut pending_stream = connect("127.0.0.1:48766");
    let mut pending_reader = BufReader::new(pending_stream.try_clone().unwrap());
    let _ = recv(&mut pending_reader); // welcome salt only; stays in EXPECT_VERSION

    let mut changed = game_servers();
    changed[1].state = GameServerState::Online;
    flip.set_game_server(changed[1].clone());

    idle_reader
        .get_ref()
        .set_read_timeout(Some(Duration::from_secs(3)))
        .unwrap();
    match recv(&mut idle_reader) {
        ServerMessage::AccountHosts { hosts } => {
            assert_eq!(hosts[1].id, 2);
            assert_eq!(hosts[1].state, GameServerState::Online);
        }
        other => panic!("expected AccountHosts broadcast, got {other:?}"),
    }

    pending_stream
        .set_read_timeout(Some(Duration::from_millis(200)))
        .unwrap();
    let mut probe = [0u8; 1];
    use std::io::Read;
    assert!(matches!(
        pending_stream.read(&mut probe),
        Err(ref err) if err.kind() == std::io::ErrorKind::WouldBlock || err.kind() == std::io::ErrorKind::TimedOut
    ));

    stop(shutdown, handle);
}
