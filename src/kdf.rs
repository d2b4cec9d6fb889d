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

//! The memory-hard password comparator the login pipeline calls after
//! decrypting the client's payload. A concrete KDF is out of the core's
//! scope per the component design, but the crate needs one to be runnable:
//! this wraps `argon2`, also used by the `gatehouse-hash-password` helper
//! binary to seed fixtures.

use argon2::{Argon2, PasswordVerifier};
use password_hash::{PasswordHash, PasswordHasher, SaltString};

/// Compares `candidate` against a stored Argon2id hash string.
///
/// Returns `Ok(false)` on a clean mismatch, `Err` only if `stored` is not a
/// well-formed hash string.
pub fn verify(candidate: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|err| anyhow::Error::msg(format!("malformed password hash: {err}")))?;
    Ok(Argon2::default()
        .verify_password(candidate.as_bytes(), &parsed)
        .is_ok())
}

/// Hashes a plaintext password for fixture seeding. `password-hash 0.5`
/// wants a `rand_core 0.6`-compatible RNG for `SaltString::generate`, which
/// `rand 0.9`'s `OsRng` no longer is, hence the `old_rand` dependency.
pub fn hash(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut old_rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow::Error::msg(format!("hashing password: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_hash_and_verify() {
        let stored = hash("pw123").unwrap();
        assert!(verify("pw123", &stored).unwrap());
        assert!(!verify("wrong", &stored).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_error() {
        assert!(verify("pw123", "not-a-hash").is_err());
    }
}
