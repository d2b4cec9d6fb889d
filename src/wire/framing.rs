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

//! Splitting a byte stream into null-terminated ASCII records and joining
//! records back into bytes for the socket.

use std::io::{self, BufRead};

/// Reads one `\x00`-terminated record from `reader`, stripping a trailing
/// `\n` if present just before the terminator.
///
/// Returns `Ok(None)` on a clean EOF with no partial record pending.
pub fn read_record<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut buf = Vec::new();
    let read = reader.read_until(0, &mut buf)?;
    if read == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&0) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "stream ended mid-record",
        ));
    }
    buf.pop();
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
    let text = String::from_utf8(buf)
        .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
    Ok(Some(text))
}

/// Appends the `\x00` terminator a record needs on the wire.
#[must_use]
pub fn encode_record(body: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 1);
    out.extend_from_slice(body.as_bytes());
    out.push(0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_one_record_per_null_byte() {
        let mut cursor = Cursor::new(b"AV1.0.0.0\x00AQ\x00".to_vec());
        assert_eq!(
            read_record(&mut cursor).unwrap(),
            Some("AV1.0.0.0".to_string())
        );
        assert_eq!(read_record(&mut cursor).unwrap(), Some("AQ".to_string()));
        assert_eq!(read_record(&mut cursor).unwrap(), None);
    }

    #[test]
    fn strips_trailing_newline_before_terminator() {
        let mut cursor = Cursor::new(b"AQ\n\x00".to_vec());
        assert_eq!(read_record(&mut cursor).unwrap(), Some("AQ".to_string()));
    }

    #[test]
    fn empty_record_decodes_to_empty_string() {
        let mut cursor = Cursor::new(b"\x00AQ\x00".to_vec());
        assert_eq!(read_record(&mut cursor).unwrap(), Some(String::new()));
        assert_eq!(read_record(&mut cursor).unwrap(), Some("AQ".to_string()));
    }

    #[test]
    fn unterminated_tail_is_an_error_not_a_silent_record() {
        let mut cursor = Cursor::new(b"AQ\x00AV1.0".to_vec());
        assert_eq!(read_record(&mut cursor).unwrap(), Some("AQ".to_string()));
        assert!(read_record(&mut cursor).is_err());
    }

    #[test]
    fn encode_round_trips_with_read() {
        let encoded = encode_record("AQ");
        let mut cursor = Cursor::new(encoded);
        assert_eq!(read_record(&mut cursor).unwrap(), Some("AQ".to_string()));
    }
}
