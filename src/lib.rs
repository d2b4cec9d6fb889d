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

//! The TCP login front-door for a multi-server game.
//!
//! A client opens a long-lived connection, authenticates, browses the list
//! of game worlds, and is handed a short-lived ticket authorising a
//! connection to the world it picked. This crate never forwards game
//! traffic; it only gates access to it.
//!
//! ## Wire Protocol
//!
//! See [`wire`] for the null-terminated ASCII framing and message catalogue.

#![deny(clippy::panic)]
#![deny(clippy::expect_used)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod crypto;
pub mod directory;
pub mod error;
pub mod host_publisher;
pub mod kdf;
pub mod login;
pub mod server;
pub mod session;
pub mod ticket_reaper;
pub mod utils;
pub mod wire;

pub use config::ServerConfig;
pub use server::Server;

/// Stable identifier for a TCP connection, assigned by the acceptor.
pub type ConnectionId = u64;

pub const VERSION_ID: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_ADDRESS: &str = "0.0.0.0:5555";

pub const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\nLicensed under the AGPLv3");
