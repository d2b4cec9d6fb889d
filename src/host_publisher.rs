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

//! 1 Hz loop (§4.D): re-fetches the game server list, and broadcasts the
//! decoded `AccountHosts` to every idle session when the encoded snapshot
//! changes. The initial fetch that seeds the first welcome burst happens
//! synchronously in `Server::run`, before this loop is even spawned.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use log::error;

use crate::server::Server;
use crate::wire::message::ServerMessage;

const TICK: Duration = Duration::from_secs(1);

pub fn run(server: &Arc<Server>, shutdown: &Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(TICK);
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        match server.fetch_encoded_hosts() {
            Ok(encoded) => {
                if encoded != server.stored_hosts() {
                    server.store_hosts(&encoded);
                    if let Ok(message) = ServerMessage::decode(&encoded) {
                        server.broadcast_to_idle(&message);
                    }
                }
            }
            Err(err) => {
                error!("host publisher: {err}");
                shutdown.store(true, Ordering::Release);
            }
        }
    }
}
