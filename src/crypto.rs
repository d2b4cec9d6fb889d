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

//! Reversing the client-side password obfuscation, and generating the
//! per-session salt it's keyed on.
//!
//! The client never sends a plaintext password. It encodes it, two input
//! characters at a time, against the session salt using a 64-symbol
//! alphabet; the server runs the same transform to recover the password
//! before handing it to the KDF comparator.

use old_rand::RngCore;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789-_";
const SALT_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

fn alphabet_index(symbol: u8) -> Option<i32> {
    ALPHABET.iter().position(|&b| b == symbol).map(|i| i as i32)
}

/// Recovers the plaintext password the client obfuscated against `salt`.
///
/// Mirrors the reference client's encoder bit for bit: `encrypted` must have
/// even length and consist only of alphabet characters, `salt` must be at
/// least half as long as `encrypted`.
pub fn decrypt_password(encrypted: &str, salt: &str) -> anyhow::Result<String> {
    if salt.is_empty() {
        anyhow::bail!("salt is empty");
    }
    if encrypted.len() % 2 != 0 || !encrypted.bytes().all(|b| alphabet_index(b).is_some()) {
        anyhow::bail!("encrypted password is malformed");
    }
    let key = salt.as_bytes();
    let body = encrypted.as_bytes();
    if key.len() < body.len() / 2 {
        anyhow::bail!("salt too short for encrypted password");
    }

    let len = ALPHABET.len() as i32;
    let mut out = String::with_capacity(body.len() / 2);
    for (pair_index, chunk) in body.chunks_exact(2).enumerate() {
        let key_byte = i32::from(key[pair_index]);
        let anb = alphabet_index(chunk[0]).expect("validated above");
        let anb2 = alphabet_index(chunk[1]).expect("validated above");

        let mut a_pass = (anb + len) - key_byte;
        if a_pass < 0 {
            a_pass += len;
        }
        a_pass *= 16;

        let mut a_key = (anb2 + len) - key_byte;
        if a_key < 0 {
            a_key += len;
        }

        let code = a_pass + a_key;
        let ch = char::from_u32(code as u32)
            .ok_or_else(|| anyhow::Error::msg("decrypted code point is not valid unicode"))?;
        out.push(ch);
    }
    Ok(out)
}

/// A fresh 32-character lowercase-ASCII salt, stable for a session's lifetime.
#[must_use]
pub fn random_salt() -> String {
    random_salt_of_len(32)
}

#[must_use]
pub fn random_salt_of_len(len: usize) -> String {
    let mut bytes = vec![0u8; len];
    old_rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
        .into_iter()
        .map(|b| SALT_ALPHABET[usize::from(b) % SALT_ALPHABET.len()] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encodes a plaintext the same way the reference client does, purely
    /// so the round trip below can assert against it without a fixture.
    fn encode_password(plain: &str, salt: &str) -> String {
        let len = ALPHABET.len() as i32;
        let key = salt.as_bytes();
        let mut out = String::new();
        for (i, ch) in plain.chars().enumerate() {
            let code = ch as i32;
            let key_byte = i32::from(key[i]);
            let a_pass = code / 16;
            let a_key = code % 16;
            let anb = {
                let mut v = a_pass + key_byte;
                v %= len;
                v
            };
            let anb2 = {
                let mut v = a_key + key_byte;
                v %= len;
                v
            };
            out.push(ALPHABET[anb as usize] as char);
            out.push(ALPHABET[anb2 as usize] as char);
        }
        out
    }

    #[test]
    fn round_trips_through_encode_decode() {
        let salt = random_salt();
        let encrypted = encode_password("pw123", &salt);
        assert_eq!(decrypt_password(&encrypted, &salt).unwrap(), "pw123");
    }

    #[test]
    fn rejects_odd_length_payload() {
        assert!(decrypt_password("abc", "somesaltsomesaltsomesaltsomesalt").is_err());
    }

    #[test]
    fn rejects_empty_salt() {
        assert!(decrypt_password("abcd", "").is_err());
    }

    #[test]
    fn salt_is_32_lowercase_ascii_chars() {
        let salt = random_salt();
        assert_eq!(salt.len(), 32);
        assert!(salt.bytes().all(|b| b.is_ascii_lowercase()));
    }
}
