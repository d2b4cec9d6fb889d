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

use std::env;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use env_logger::Builder;
use log::LevelFilter;

/// Sets up `env_logger` the way the process' systemd unit (or lack of one)
/// expects: under systemd, the journal already timestamps every line, so
/// the format drops the redundant clock.
pub fn init_logger(target: &str, debug: bool, systemd: bool) {
    let mut builder = Builder::new();

    if systemd {
        builder.format(|formatter, record| {
            writeln!(formatter, "[{}]: {}", record.level(), record.args())
        });
    } else {
        builder.format(|formatter, record| {
            writeln!(
                formatter,
                "{} [{}] ({}): {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S %z"),
                record.level(),
                record.target(),
                record.args()
            )
        });
    }

    if let Ok(var) = env::var("RUST_LOG") {
        builder.parse_filters(&var);
    } else if debug {
        builder.filter(Some(target), LevelFilter::Debug);
        builder.filter(None, LevelFilter::Info);
    } else {
        builder.filter(None, LevelFilter::Info);
    }

    builder.init();
}

/// Where config/fixture files default to when not given `--config`.
#[must_use]
pub fn data_file(file: &str) -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_default();
    path.push("gatehouse");
    path.push(file);
    path
}
