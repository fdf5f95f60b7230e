// Copyright 2016 Pierre-Étienne Meunier
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
//! Method drivers (§4.4) and the shared response wait (§4.3), grounded on
//! `ssh_userauth_none`/`_try_publickey`/`_publickey`/`_agent_publickey`/
//! `_password`/`_kbdint_init`/`_kbdint_send` in `auth.c`.
//!
//! Every driver follows the same shape as the original's `pending_call`
//! switch: a fresh call (`pending == Idle`) builds and sends a packet and
//! tags `session.pending`; a call that finds its own tag already pending
//! is a no-op, so retrying after `AuthOutcome::Again` is always safe; a
//! call that finds a *different* tag pending is `Error::BadCall`.

use crate::agent::{Agent, AgentIdentity};
use crate::auth::{AuthOutcome, AuthState, PendingCall};
use crate::msg;
use crate::pki::{PkiKey, PkiSigner};
use crate::transport::{Poll, Transport};
use crate::wire::Encoding;
use crate::{Error, SessionAuth};
use cryptovec::CryptoVec;
use std::time::Duration;
use zeroize::Zeroizing;

fn is_terminal(s: &SessionAuth) -> bool {
    matches!(
        s.state,
        AuthState::Success | AuthState::Failed | AuthState::Error | AuthState::Info
    )
}

/// Wait for the in-flight call to reach a terminal outcome, or for
/// `timeout` to elapse. Mirrors `ssh_userauth_get_response`: it doesn't
/// send anything itself, it only pumps the transport and reinterprets
/// `session.state` (§4.3).
pub fn await_response(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    timeout: Duration,
) -> Result<AuthOutcome, Error> {
    if session.pending == PendingCall::Idle && !is_terminal(session) {
        return Err(Error::BadCall);
    }
    if !is_terminal(session) {
        let mut predicate = |s: &SessionAuth| is_terminal(s);
        match transport.handle_packets_until(session, timeout, &mut predicate)? {
            Poll::Again => return Ok(AuthOutcome::Again),
            Poll::Timeout => {
                session.pending = PendingCall::Idle;
                return Err(Error::Timeout);
            }
            Poll::Ready => {}
        }
    }
    match session.state {
        AuthState::Success => {
            session.state = AuthState::None;
            session.pending = PendingCall::Idle;
            Ok(AuthOutcome::Success)
        }
        AuthState::Failed => {
            let partial = session.partial_success;
            session.state = AuthState::None;
            session.pending = PendingCall::Idle;
            Ok(if partial {
                AuthOutcome::Partial
            } else {
                AuthOutcome::Denied
            })
        }
        AuthState::Info => Ok(AuthOutcome::Info),
        AuthState::Error => Err(Error::Inconsistent("authentication ended in an error state")),
        AuthState::None | AuthState::Sent | AuthState::PkOk | AuthState::KbdintSent => Err(
            Error::Inconsistent("transport reported ready without reaching a terminal state"),
        ),
    }
}

fn ensure_service_accepted(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
) -> Result<bool, Error> {
    if session.service_accepted {
        return Ok(true);
    }
    match transport.service_request("ssh-userauth")? {
        Poll::Ready => {
            session.service_accepted = true;
            Ok(true)
        }
        Poll::Again => Ok(false),
        Poll::Timeout => Err(Error::Timeout),
    }
}

/// Returns `Ok(true)` if the caller should build and send a fresh
/// request, `Ok(false)` if it should return immediately (either the call
/// is already in flight, or the service request hasn't completed yet).
fn begin_call(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    tag: PendingCall,
) -> Result<bool, Error> {
    match session.pending {
        PendingCall::Idle => {}
        p if p == tag => return Ok(false),
        _ => return Err(Error::BadCall),
    }
    if !ensure_service_accepted(session, transport)? {
        return Ok(false);
    }
    Ok(true)
}

fn request_prefix(buf: &mut CryptoVec, username: &str, method: &str) {
    buf.extend_u8(msg::USERAUTH_REQUEST);
    buf.extend_ssh_string(username.as_bytes());
    buf.extend_ssh_string(b"ssh-connection");
    buf.extend_ssh_string(method.as_bytes());
}

/// RFC 4252 section 5.2, the `none` method: usually sent first, purely to
/// learn which methods the server will accept.
pub fn userauth_none(session: &mut SessionAuth, transport: &mut impl Transport) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::AuthNone)? {
        return Ok(());
    }
    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "none");
    transport.packet_send(&buf)?;
    session.pending = PendingCall::AuthNone;
    session.state = AuthState::Sent;
    Ok(())
}

/// RFC 4252 section 7, probing whether a key would be accepted before
/// paying for a signature: `USERAUTH_REQUEST` with the "have signature"
/// flag unset.
pub fn userauth_try_publickey(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    key: &impl PkiKey,
) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::TryPublickey)? {
        return Ok(());
    }
    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "publickey");
    buf.extend_u8(0);
    buf.extend_ssh_string(key.algorithm_name().as_bytes());
    buf.extend_ssh_string(&key.pubkey_blob());
    transport.packet_send(&buf)?;
    session.pending = PendingCall::TryPublickey;
    session.state = AuthState::PkOk;
    Ok(())
}

/// The data a `publickey` signature covers (RFC 4252 section 7): the
/// session id, then the request up to (not including) the signature
/// itself.
fn publickey_to_sign(session_id: &[u8], username: &str, algorithm: &str, blob: &[u8]) -> CryptoVec {
    let mut buf = CryptoVec::new();
    buf.extend_ssh_string(session_id);
    request_prefix(&mut buf, username, "publickey");
    buf.extend_u8(1);
    buf.extend_ssh_string(algorithm.as_bytes());
    buf.extend_ssh_string(blob);
    buf
}

/// RFC 4252 section 7, signing with a key this crate holds directly
/// (grounded on `ssh_userauth_publickey`, which signs via
/// `ssh_pki_do_sign`).
pub fn userauth_publickey(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    signer: &impl PkiSigner,
    session_id: &[u8],
) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::Publickey)? {
        return Ok(());
    }
    let algorithm = signer.algorithm_name().to_string();
    let blob = signer.pubkey_blob();
    let to_sign = publickey_to_sign(session_id, &session.config.username, &algorithm, &blob);
    let signature = signer.do_sign(&to_sign)?;

    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "publickey");
    buf.extend_u8(1);
    buf.extend_ssh_string(algorithm.as_bytes());
    buf.extend_ssh_string(&blob);
    buf.extend_ssh_string(&signature);
    transport.packet_send(&buf)?;
    session.pending = PendingCall::Publickey;
    session.state = AuthState::Sent;
    Ok(())
}

/// RFC 4252 section 7, signing through an `ssh-agent` (grounded on
/// `ssh_userauth_agent_publickey`, which signs via
/// `ssh_pki_do_sign_agent`).
pub fn userauth_agent_publickey(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    agent: &mut impl Agent,
    identity: &AgentIdentity,
    session_id: &[u8],
) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::AgentPublickey)? {
        return Ok(());
    }
    let to_sign = publickey_to_sign(
        session_id,
        &session.config.username,
        &identity.algorithm,
        &identity.blob,
    );
    let signature = agent.sign(&identity.blob, &to_sign)?;

    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "publickey");
    buf.extend_u8(1);
    buf.extend_ssh_string(identity.algorithm.as_bytes());
    buf.extend_ssh_string(&identity.blob);
    buf.extend_ssh_string(&signature);
    transport.packet_send(&buf)?;
    session.pending = PendingCall::AgentPublickey;
    session.state = AuthState::Sent;
    Ok(())
}

/// RFC 4252 section 8. The password is zeroized as soon as it's written
/// into the outbound buffer.
pub fn userauth_password(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    password: &str,
) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::Password)? {
        return Ok(());
    }
    let password = Zeroizing::new(password.to_string());
    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "password");
    buf.extend_u8(0);
    buf.extend_ssh_string(password.as_bytes());
    transport.packet_send(&buf)?;
    session.pending = PendingCall::Password;
    session.state = AuthState::Sent;
    Ok(())
}

/// RFC 4256 section 3.1, phase one: propose keyboard-interactive and wait
/// for the challenge (`ssh_userauth_kbdint_init`).
pub fn userauth_kbdint_init(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
    submethods: &str,
) -> Result<(), Error> {
    if !begin_call(session, transport, PendingCall::KbdintInit)? {
        return Ok(());
    }
    let mut buf = CryptoVec::new();
    request_prefix(&mut buf, &session.config.username, "keyboard-interactive");
    buf.extend_ssh_string(b"");
    buf.extend_ssh_string(submethods.as_bytes());
    transport.packet_send(&buf)?;
    session.pending = PendingCall::KbdintInit;
    session.state = AuthState::KbdintSent;
    Ok(())
}

/// RFC 4256 section 3.4, phase two: send back the answers collected
/// through `SessionAuth::kbdint` (`ssh_userauth_kbdint_send`). Requires
/// `await_response` to have already returned `AuthOutcome::Info`.
pub fn userauth_kbdint_send(
    session: &mut SessionAuth,
    transport: &mut impl Transport,
) -> Result<(), Error> {
    // Only require a challenge to be present when starting a fresh send;
    // an idempotent resume (`pending` already `KbdintSend`) already
    // consumed it on the first call.
    if session.pending == PendingCall::Idle && session.kbdint.is_none() {
        return Err(Error::BadCall);
    }
    if !begin_call(session, transport, PendingCall::KbdintSend)? {
        return Ok(());
    }
    let kbdint = session.kbdint.take().expect("checked above");
    let nprompts = kbdint.getnprompts() as usize;

    let mut buf = CryptoVec::new();
    buf.extend_u8(msg::USERAUTH_INFO_RESPONSE);
    buf.extend_u32(nprompts as u32);
    for i in 0..nprompts {
        let answer = kbdint.answers.get(i).map(|a| a.as_str()).unwrap_or("");
        buf.extend_ssh_string(answer.as_bytes());
    }
    transport.packet_send(&buf)?;
    session.pending = PendingCall::KbdintSend;
    session.state = AuthState::Sent;
    Ok(())
}
