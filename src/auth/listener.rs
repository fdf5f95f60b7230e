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
//! The response listener (§4.2): four plain functions the embedder's own
//! packet dispatch calls into, mirroring how `client_read_encrypted`
//! matches on `buf[0]` and delegates per message type. Grounded on
//! `ssh_packet_userauth_banner`/`_failure`/`_success`/`_pk_ok` in
//! `auth.c`.

use crate::auth::kbdint::{KbdInt, KBDINT_MAX_PROMPT};
use crate::auth::{AuthState, MethodSet};
use crate::wire::reader;
use crate::{Error, SessionAuth};
use crate::msg;

/// Route one inbound `ssh-userauth` packet to the right listener. The
/// embedder calls this from its own packet loop (e.g. inside its
/// `Transport::handle_packets_until`); `msg_type` is the leading
/// message-number byte, `payload` is everything after it.
pub fn dispatch(
    session: &mut SessionAuth,
    transport: &mut impl crate::transport::Transport,
    msg_type: u8,
    payload: &[u8],
) -> Result<(), Error> {
    match msg_type {
        msg::USERAUTH_BANNER => on_banner(session, payload),
        msg::USERAUTH_FAILURE => on_failure(session, payload),
        msg::USERAUTH_SUCCESS => on_success(session, transport, payload),
        msg::USERAUTH_PK_OK => on_code60(session, payload),
        msg::USERAUTH_INFO_RESPONSE => {
            log::warn!("server sent USERAUTH_INFO_RESPONSE, which is a client-to-server message");
            session.state = AuthState::Error;
            Ok(())
        }
        other => {
            log::trace!("ignoring non-userauth packet type {}", other);
            Ok(())
        }
    }
}

/// `SSH_MSG_USERAUTH_BANNER` (RFC 4252 section 5.4). Purely informational:
/// a malformed banner is logged and dropped, never fatal to the exchange.
pub fn on_banner(session: &mut SessionAuth, payload: &[u8]) -> Result<(), Error> {
    let mut r = reader(payload);
    match (|| -> Result<String, Error> { r.read_utf8_string() })() {
        Ok(message) => {
            log::info!("userauth banner: {}", message);
            session.banner = Some(message);
        }
        Err(_) => {
            log::debug!("dropping malformed USERAUTH_BANNER");
        }
    }
    Ok(())
}

/// `SSH_MSG_USERAUTH_FAILURE` (RFC 4252 section 5.1).
pub fn on_failure(session: &mut SessionAuth, payload: &[u8]) -> Result<(), Error> {
    let mut r = reader(payload);
    let list = match r.read_utf8_string() {
        Ok(s) => s,
        Err(e) => {
            log::debug!("malformed USERAUTH_FAILURE: {}", e);
            session.state = AuthState::Error;
            return Ok(());
        }
    };
    let partial = match r.read_bool() {
        Ok(b) => b,
        Err(e) => {
            log::debug!("malformed USERAUTH_FAILURE: {}", e);
            session.state = AuthState::Error;
            return Ok(());
        }
    };

    // A partial success ORs the newly advertised methods onto what the
    // server has already told us, accumulating across successive partial
    // failures; a full denial rebuilds the set from scratch.
    session.methods_remaining = if partial {
        session.methods_remaining | MethodSet::from_name_list(&list)
    } else {
        MethodSet::from_name_list(&list)
    };
    session.partial_success = partial;
    session.kbdint = None;
    session.pending = crate::auth::PendingCall::Idle;
    session.state = AuthState::Failed;
    log::debug!(
        "userauth failure, methods remaining = {:?}, partial = {}",
        session.methods_remaining,
        partial
    );
    Ok(())
}

/// `SSH_MSG_USERAUTH_SUCCESS` (RFC 4252 section 5.1). No fields.
///
/// Also activates any delayed compression direction the transport
/// negotiated at key exchange but held off enabling until authentication
/// completed.
pub fn on_success(
    session: &mut SessionAuth,
    transport: &mut impl crate::transport::Transport,
    _payload: &[u8],
) -> Result<(), Error> {
    log::info!("userauth success");
    session.pending = crate::auth::PendingCall::Idle;
    session.kbdint = None;
    session.state = AuthState::Success;
    transport.enable_delayed_compression()?;
    Ok(())
}

/// Message number 60, shared between `SSH_MSG_USERAUTH_PK_OK` (RFC 4252
/// section 7) and `SSH_MSG_USERAUTH_INFO_REQUEST` (RFC 4256 section 3.2).
/// Disambiguated the same way the original does: by whether we're
/// currently waiting on a keyboard-interactive negotiation
/// (`AuthState::KbdintSent`) or a publickey probe (`AuthState::PkOk`).
pub fn on_code60(session: &mut SessionAuth, payload: &[u8]) -> Result<(), Error> {
    match session.state {
        AuthState::KbdintSent => on_info_request(session, payload),
        AuthState::PkOk => on_pk_ok(session, payload),
        other => {
            log::warn!("unexpected code-60 message in state {:?}", other);
            session.state = AuthState::Error;
            Ok(())
        }
    }
}

fn on_pk_ok(session: &mut SessionAuth, payload: &[u8]) -> Result<(), Error> {
    let mut r = reader(payload);
    if r.read_string().is_err() || r.read_string().is_err() {
        log::debug!("malformed USERAUTH_PK_OK");
        session.state = AuthState::Error;
        return Ok(());
    }
    log::debug!("server accepted publickey probe");
    session.pending = crate::auth::PendingCall::Idle;
    session.state = AuthState::Success;
    Ok(())
}

fn on_info_request(session: &mut SessionAuth, payload: &[u8]) -> Result<(), Error> {
    let mut r = reader(payload);
    let parsed = (|| -> Result<KbdInt, Error> {
        let name = r.read_utf8_string()?;
        let instruction = r.read_utf8_string()?;
        let _language = r.read_utf8_string()?;
        let nprompts = r.read_u32()?;
        if nprompts == 0 {
            return Err(Error::Inconsistent("keyboard-interactive challenge with no prompts"));
        }
        if nprompts > KBDINT_MAX_PROMPT {
            return Err(Error::Inconsistent("too many keyboard-interactive prompts"));
        }
        let mut kbdint = KbdInt::new(name, instruction);
        for _ in 0..nprompts {
            let prompt = r.read_utf8_string()?;
            let echo = r.read_bool()?;
            kbdint.push_prompt(prompt, echo);
        }
        Ok(kbdint)
    })();

    match parsed {
        Ok(kbdint) => {
            log::debug!(
                "keyboard-interactive challenge '{}' with {} prompt(s)",
                kbdint.getname(),
                kbdint.getnprompts()
            );
            session.kbdint = Some(kbdint);
            session.pending = crate::auth::PendingCall::Idle;
            session.state = AuthState::Info;
        }
        Err(e) => {
            log::debug!("malformed USERAUTH_INFO_REQUEST: {}", e);
            session.state = AuthState::Error;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::PendingCall;
    use crate::transport::tests::FakeTransport;
    use crate::wire::Encoding;
    use crate::AuthConfig;
    use cryptovec::CryptoVec;

    fn session_in(state: AuthState) -> SessionAuth {
        let mut s = SessionAuth::new(AuthConfig::default());
        s.state = state;
        s
    }

    #[test]
    fn banner_is_stored_without_changing_state() {
        let mut s = session_in(AuthState::Sent);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"welcome");
        buf.extend_ssh_string(b"en");
        on_banner(&mut s, &buf).unwrap();
        assert_eq!(s.banner.as_deref(), Some("welcome"));
        assert_eq!(s.state, AuthState::Sent);
    }

    #[test]
    fn failure_narrows_methods_and_clears_pending() {
        let mut s = session_in(AuthState::Sent);
        s.pending = PendingCall::Password;
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"publickey,keyboard-interactive");
        buf.extend_u8(0);
        on_failure(&mut s, &buf).unwrap();
        assert_eq!(s.state, AuthState::Failed);
        assert!(!s.partial_success);
        assert_eq!(s.pending, PendingCall::Idle);
        assert!(s.methods_remaining.contains(MethodSet::PUBLICKEY));
        assert!(!s.methods_remaining.contains(MethodSet::PASSWORD));
    }

    #[test]
    fn failure_with_partial_success_is_recorded() {
        let mut s = session_in(AuthState::Sent);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"keyboard-interactive");
        buf.extend_u8(1);
        on_failure(&mut s, &buf).unwrap();
        assert!(s.partial_success);
    }

    #[test]
    fn successive_partial_failures_accumulate_methods() {
        let mut s = session_in(AuthState::Sent);
        let mut first = CryptoVec::new();
        first.extend_ssh_string(b"password");
        first.extend_u8(1);
        on_failure(&mut s, &first).unwrap();
        assert!(s.methods_remaining.contains(MethodSet::PASSWORD));

        let mut second = CryptoVec::new();
        second.extend_ssh_string(b"publickey");
        second.extend_u8(1);
        on_failure(&mut s, &second).unwrap();
        assert!(s.methods_remaining.contains(MethodSet::PASSWORD));
        assert!(s.methods_remaining.contains(MethodSet::PUBLICKEY));
    }

    #[test]
    fn full_denial_after_partial_rebuilds_methods_instead_of_accumulating() {
        let mut s = session_in(AuthState::Sent);
        let mut first = CryptoVec::new();
        first.extend_ssh_string(b"password");
        first.extend_u8(1);
        on_failure(&mut s, &first).unwrap();

        let mut second = CryptoVec::new();
        second.extend_ssh_string(b"publickey");
        second.extend_u8(0);
        on_failure(&mut s, &second).unwrap();
        assert!(!s.methods_remaining.contains(MethodSet::PASSWORD));
        assert!(s.methods_remaining.contains(MethodSet::PUBLICKEY));
    }

    #[test]
    fn success_sets_terminal_state() {
        let mut s = session_in(AuthState::Sent);
        let mut t = FakeTransport::new();
        on_success(&mut s, &mut t, &[]).unwrap();
        assert_eq!(s.state, AuthState::Success);
        assert!(t.delayed_compression_enabled);
    }

    #[test]
    fn code60_as_pk_ok_when_waiting_on_probe() {
        let mut s = session_in(AuthState::PkOk);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"ssh-ed25519");
        buf.extend_ssh_string(b"blob");
        on_code60(&mut s, &buf).unwrap();
        assert_eq!(s.state, AuthState::Success);
    }

    #[test]
    fn code60_as_info_request_when_waiting_on_kbdint() {
        let mut s = session_in(AuthState::KbdintSent);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"name");
        buf.extend_ssh_string(b"instr");
        buf.extend_ssh_string(b"");
        buf.extend_u32(1);
        buf.extend_ssh_string(b"Password: ");
        buf.extend_u8(0);
        on_code60(&mut s, &buf).unwrap();
        assert_eq!(s.state, AuthState::Info);
        let kbdint = s.kbdint.as_ref().unwrap();
        assert_eq!(kbdint.getnprompts(), 1);
        assert_eq!(kbdint.getprompt(0), Some(("Password: ", false)));
    }

    #[test]
    fn code60_rejects_too_many_prompts() {
        let mut s = session_in(AuthState::KbdintSent);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"name");
        buf.extend_ssh_string(b"instr");
        buf.extend_ssh_string(b"");
        buf.extend_u32(KBDINT_MAX_PROMPT + 1);
        on_code60(&mut s, &buf).unwrap();
        assert_eq!(s.state, AuthState::Error);
    }

    #[test]
    fn code60_rejects_zero_prompts() {
        let mut s = session_in(AuthState::KbdintSent);
        let mut buf = CryptoVec::new();
        buf.extend_ssh_string(b"name");
        buf.extend_ssh_string(b"instr");
        buf.extend_ssh_string(b"");
        buf.extend_u32(0);
        on_code60(&mut s, &buf).unwrap();
        assert_eq!(s.state, AuthState::Error);
    }

    #[test]
    fn code60_in_unexpected_state_is_an_error() {
        let mut s = session_in(AuthState::Sent);
        on_code60(&mut s, &[]).unwrap();
        assert_eq!(s.state, AuthState::Error);
    }
}
