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

//! Loading a [`super::memory::Fixture`] from a RON file on disk, the way
//! [`crate::config`] loads the server's own configuration.

use std::path::Path;

use anyhow::Context;

use super::memory::Fixture;

pub fn load(path: &Path) -> anyhow::Result<Fixture> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture file {}", path.display()))?;
    ron::from_str(&text).with_context(|| format!("parsing fixture file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_fixture() {
        let dir = tempdir_with(
            "fixture.ron",
            r#"(
                accounts: [],
                users: [],
                characters: [],
                game_servers: [],
            )"#,
        );
        let fixture = load(&dir.join("fixture.ron")).unwrap();
        assert!(fixture.accounts.is_empty());
    }

    fn tempdir_with(name: &str, contents: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "gatehouse-fixture-test-{}-{name}",
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), contents).unwrap();
        dir
    }
}
