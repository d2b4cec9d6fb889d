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

//! Error kinds for a single session, classified the way the read loop and
//! the accept loop need to log and teardown: fatal-and-loud, fatal-and-quiet,
//! or a clean close that was the point all along.

use std::fmt;

use thiserror::Error;

/// Every way a session's read loop or a handler can end.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Malformed framing: unterminated record, unknown message id, bad body.
    #[error("protocol framing: {0}")]
    ProtocolFraming(String),

    /// The client violated a login/session policy (bad version, wrong
    /// crypto method, bad credentials, already logged in elsewhere).
    #[error("policy: {0}")]
    Policy(#[from] PolicyViolation),

    /// A directory or KDF call failed.
    #[error("upstream: {0}")]
    Upstream(#[from] anyhow::Error),

    /// EOF, read-deadline expiry, shutdown, or a closed socket. Not alarming.
    #[error("transient: {0}")]
    TransientIo(String),

    /// `AccountSetServer` succeeded and handed out a ticket, or a policy
    /// rejection already told the client why. Close the connection quietly.
    #[error("end of service")]
    EndOfService,
}

impl SessionError {
    /// Whether this error deserves an `error!`-level log, or just `debug!`.
    /// Malformed packets, frame violations, timeouts and a clean EOF are
    /// all routine traffic from the client's point of view; only a
    /// directory/KDF failure is actually unexpected.
    #[must_use]
    pub fn is_alarming(&self) -> bool {
        matches!(self, SessionError::Upstream(_))
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::UnexpectedEof => {
                SessionError::TransientIo(err.to_string())
            }
            _ => {
                if is_closed_conn_error(&err) {
                    SessionError::TransientIo(err.to_string())
                } else {
                    SessionError::Upstream(anyhow::Error::new(err))
                }
            }
        }
    }
}

/// `std::net` has no dedicated error kind for "the other side already shut
/// the socket down"; it surfaces as an OS-specific message.
#[must_use]
pub fn is_closed_conn_error(err: &std::io::Error) -> bool {
    err.to_string().contains("use of closed network connection")
}

/// Why a login attempt or an already-established session was rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PolicyViolation {
    BadVersion,
    UnsupportedCrypto,
    AccessDenied,
    AlreadyLogged,
    InvalidFrame,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyViolation::BadVersion => write!(f, "bad client version"),
            PolicyViolation::UnsupportedCrypto => write!(f, "unsupported crypto method"),
            PolicyViolation::AccessDenied => write!(f, "access denied"),
            PolicyViolation::AlreadyLogged => write!(f, "already logged in"),
            PolicyViolation::InvalidFrame => write!(f, "message not allowed in current state"),
        }
    }
}

impl std::error::Error for PolicyViolation {}
