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

//! The login pipeline (§4.G): runs once, inside `AccountQueuePosition`, the
//! first time a session reaches `EXPECT_QUEUE_POSITION`. Every rejection
//! that tells the client why sends its `AccountLoginError` right here,
//! at the point of failure, the way the original server does; by the
//! time an error reaches the read loop there is nothing left to say.

use std::sync::Arc;

use chrono::Utc;
use log::debug;

use crate::crypto;
use crate::directory::DirectoryError;
use crate::error::{PolicyViolation, SessionError};
use crate::kdf;
use crate::session::{Session, Status};
use crate::wire::message::{LoginErrorReason, ServerMessage};

const MIN_CLIENT_VERSION: &str = "^1.29.0";

/// Runs the pipeline for `session`. A return of `Ok(())` means either a
/// full login (status is now `IDLE`) or a quiet invitation to retry
/// (account not found); any `Err` is fatal for this connection.
pub fn run(session: &Arc<Session>) -> Result<(), SessionError> {
    let version = session.version().ok_or_else(|| {
        SessionError::ProtocolFraming("login reached with no client version on record".into())
    })?;
    let credential = session.credential().ok_or_else(|| {
        SessionError::ProtocolFraming("login reached with no credential on record".into())
    })?;

    if version.major != 1 || version.minor < 29 {
        session.send(&ServerMessage::AccountLoginError {
            reason: LoginErrorReason::BadVersion,
            extra: MIN_CLIENT_VERSION.to_string(),
        })?;
        debug!(
            "{}: rejecting client version {version}",
            session.peer_addr()
        );
        return Err(SessionError::Policy(PolicyViolation::BadVersion));
    }

    if credential.crypto_method != 1 {
        debug!(
            "{}: unhandled crypto method {}",
            session.peer_addr(),
            credential.crypto_method
        );
        return Err(SessionError::Policy(PolicyViolation::UnsupportedCrypto));
    }

    let password = crypto::decrypt_password(&credential.hash, session.salt()).map_err(|err| {
        debug!("{}: could not decrypt password: {err}", session.peer_addr());
        SessionError::ProtocolFraming("malformed credential payload".into())
    })?;

    let account = match session.directories().accounts.by_name(&credential.username) {
        Ok(account) => account,
        Err(DirectoryError::NotFound) => {
            session.send(&ServerMessage::AccountLoginError {
                reason: LoginErrorReason::AccessDenied,
                extra: String::new(),
            })?;
            debug!(
                "{}: no account named {:?}",
                session.peer_addr(),
                credential.username
            );
            return Ok(());
        }
        Err(DirectoryError::Backend(err)) => {
            session.send(&ServerMessage::AccountLoginError {
                reason: LoginErrorReason::AccessDenied,
                extra: String::new(),
            })?;
            return Err(SessionError::Upstream(err));
        }
    };

    let user = session
        .directories()
        .users
        .by_id(account.user_id)
        .map_err(|err| SessionError::Upstream(anyhow::Error::new(err)))?;

    let matches = kdf::verify(&password, &user.hash).map_err(SessionError::Upstream)?;
    if !matches {
        session.send(&ServerMessage::AccountLoginError {
            reason: LoginErrorReason::AccessDenied,
            extra: String::new(),
        })?;
        debug!("{}: wrong password for {:?}", session.peer_addr(), account.name);
        return Err(SessionError::Policy(PolicyViolation::AccessDenied));
    }

    if let Err(violation) = session.host().control_account(account.id, session) {
        session.send(&ServerMessage::AccountLoginError {
            reason: LoginErrorReason::AlreadyLogged,
            extra: String::new(),
        })?;
        debug!(
            "{}: could not claim account {}: {violation}",
            session.peer_addr(),
            account.id
        );
        return Err(SessionError::Policy(violation));
    }
    session.set_account_id(account.id);

    session
        .directories()
        .accounts
        .set_last_access_and_ip(account.id, Utc::now(), Some(session.peer_addr().ip()))
        .map_err(SessionError::Upstream)?;

    session.send(&ServerMessage::AccountPseudo { nickname: user.nickname })?;
    session.send(&ServerMessage::AccountCommunity { id: user.community })?;
    session.send(&ServerMessage::AccountSecretQuestion { value: user.secret_question })?;
    session.send(&session.host().current_hosts())?;
    session.send(&ServerMessage::AccountLoginSuccess { authorized: account.admin })?;

    session.set_status(Status::Idle);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_client_version_matches_the_spec_string() {
        assert_eq!(MIN_CLIENT_VERSION, "^1.29.0");
    }
}
