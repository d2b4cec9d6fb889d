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

//! 1 Hz loop (§4.E): deletes every ticket older than the configured TTL.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use chrono::Utc;
use log::{debug, error};

use crate::directory::Directories;

const TICK: Duration = Duration::from_secs(1);

pub fn run(directories: &Directories, ticket_ttl: Duration, shutdown: &Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Acquire) {
        thread::sleep(TICK);
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        let cutoff = Utc::now()
            - chrono::Duration::from_std(ticket_ttl).unwrap_or(chrono::Duration::zero());

        match directories.tickets.delete_older_than(cutoff) {
            Ok(0) => {}
            Ok(count) => debug!("deleted {count} expired tickets"),
            Err(err) => {
                error!("ticket reaper: {err}");
                shutdown.store(true, Ordering::Release);
            }
        }
    }
}
