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

use std::path::PathBuf;

use clap::Parser;
use gatehouse::LONG_VERSION;

/// Gatehouse login server
///
/// TCP front-door for a multi-server game: authenticates accounts, hands
/// out the current world list, and issues play tickets.
#[derive(Parser, Debug)]
#[command(long_version = LONG_VERSION, about = "Gatehouse login server")]
pub(crate) struct Args {
    /// Path to a RON config file. Overridden by `GATEHOUSE_*` environment
    /// variables, which are themselves overridden by `--address`.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to a RON fixture seeding accounts, users and game servers
    #[arg(long)]
    pub fixture: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:5555
    #[arg(long)]
    pub address: Option<String>,

    /// Whether to log on the debug level
    #[arg(long)]
    pub debug: bool,

    /// Whether the application is being run by systemd
    #[arg(long)]
    pub systemd: bool,

    /// Build the manpage
    #[arg(long)]
    pub man: bool,
}
