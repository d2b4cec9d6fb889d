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

mod command_line;

use std::fmt;
use std::fs;
use std::process::exit;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{CommandFactory, Parser};
use gatehouse::config::{ConfigOverrides, ServerConfig};
use gatehouse::directory::memory::{Fixture, MemoryDirectory};
use gatehouse::directory::{Directories, fixture};
use gatehouse::{Server, utils};
use log::{error, info};

use crate::command_line::Args;

const CONFIG_FILE: &str = "gatehouse.ron";
const FIXTURE_FILE: &str = "fixture.ron";

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    utils::init_logger("gatehouse_server", args.debug, args.systemd);

    if args.man {
        let cmd = Args::command().name("gatehouse-server").long_version(None);
        let man = clap_mangen::Man::new(cmd);
        let mut buffer: Vec<u8> = Vec::new();
        man.render(&mut buffer)?;
        fs::write("gatehouse-server.1", buffer)?;
        return Ok(());
    }

    let config_path = args.config.clone().unwrap_or_else(|| utils::data_file(CONFIG_FILE));
    let overrides = ConfigOverrides {
        address: args.address.clone(),
        fixture_path: args.fixture.clone(),
    };
    let config = ServerConfig::load(Some(&config_path), overrides)?;

    let fixture_path = config
        .fixture_path
        .clone()
        .unwrap_or_else(|| utils::data_file(FIXTURE_FILE));
    let fixture = if fixture_path.exists() {
        fixture::load(&fixture_path)?
    } else {
        info!("no fixture at {}, starting with an empty directory", fixture_path.display());
        Fixture::default()
    };

    let memory = Arc::new(MemoryDirectory::from_fixture(fixture));
    let directories = Directories {
        accounts: memory.clone(),
        users: memory.clone(),
        characters: memory.clone(),
        game_servers: memory.clone(),
        tickets: memory,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        let systemd = args.systemd;
        ctrlc::set_handler(move || {
            if !systemd {
                println!();
            }
            shutdown.store(true, Ordering::Release);
        })?;
    }

    let server = Arc::new(Server::new(config, directories));
    handle_error(server.run(&shutdown));
    Ok(())
}

fn handle_error<T, E: fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => {
            error!("{error}");
            exit(1)
        }
    }
}
