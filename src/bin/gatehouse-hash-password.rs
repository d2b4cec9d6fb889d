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

#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unwrap_used)]

//! Hashes a password for pasting into a fixture file's `User.hash` field.
//! Reads the password from stdin rather than `argv` so it never ends up
//! in shell history or `ps`.

use std::io::{self, BufRead};

use gatehouse::kdf;

fn main() -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut line = String::new();
    stdin.lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\n', '\r']);

    if password.is_empty() {
        anyhow::bail!("no password given on stdin");
    }

    println!("{}", kdf::hash(password)?);
    Ok(())
}
