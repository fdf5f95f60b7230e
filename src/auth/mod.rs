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
//! The authentication state machine: `AuthState`, `PendingCall`, the
//! method bitflags, and the public `AuthOutcome` result type (§3, §6.4,
//! §7).

pub mod auto;
pub mod drivers;
pub mod kbdint;
pub mod listener;

bitflags::bitflags! {
    /// Which `ssh-userauth` methods the server has said it will still
    /// accept. Grounded on `thrussh::auth::MethodSet`.
    pub struct MethodSet: u32 {
        const NONE = 1;
        const PASSWORD = 2;
        const PUBLICKEY = 4;
        const HOSTBASED = 8;
        const KEYBOARD_INTERACTIVE = 16;
    }
}

impl MethodSet {
    /// Name of a single flag as it appears on the wire.
    pub fn name(self) -> &'static str {
        match self {
            MethodSet::NONE => "none",
            MethodSet::PASSWORD => "password",
            MethodSet::PUBLICKEY => "publickey",
            MethodSet::HOSTBASED => "hostbased",
            MethodSet::KEYBOARD_INTERACTIVE => "keyboard-interactive",
            _ => "",
        }
    }

    /// Parse a server `name-list` (comma-separated, but we don't bother
    /// splitting it) the way `ssh_packet_userauth_failure` does in the
    /// original: a plain substring search per known method name. A
    /// server that sent a future method we don't recognize just never
    /// sets that bit, which is the correct behavior either way.
    pub fn from_name_list(list: &str) -> MethodSet {
        let mut set = MethodSet::empty();
        for m in &[
            MethodSet::NONE,
            MethodSet::PASSWORD,
            MethodSet::PUBLICKEY,
            MethodSet::HOSTBASED,
            MethodSet::KEYBOARD_INTERACTIVE,
        ] {
            if list.contains(m.name()) {
                set |= *m;
            }
        }
        set
    }
}

/// Phase of the exchange a `SessionAuth` is in (§3). Renamed from the
/// original's `auth_state` integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No request outstanding; a driver may be called.
    None,
    /// A `USERAUTH_REQUEST` was sent and we're waiting on
    /// `FAILURE`/`SUCCESS`/`BANNER`.
    Sent,
    /// A `publickey` probe ("am I allowed to try this key") is pending a
    /// `PK_OK` or `FAILURE`.
    PkOk,
    /// A keyboard-interactive `USERAUTH_REQUEST` was sent and we're
    /// waiting specifically for `USERAUTH_INFO_REQUEST` (code 60, the
    /// other meaning of that message number).
    KbdintSent,
    /// A `USERAUTH_INFO_REQUEST` arrived and `session.kbdint` now holds
    /// the challenge; caller should read it and call the kbdint "send"
    /// driver with answers.
    Info,
    /// The exchange ended in `SUCCESS`. Reused, exactly as the original
    /// reuses `SSH_AUTH_SUCCESS`, for both "fully authenticated" and "the
    /// publickey probe in `try_publickey` says go ahead and sign" — the
    /// caller knows which from which driver it called (§9).
    Success,
    /// The most recent `FAILURE`. Whether that was a partial success or
    /// an outright denial is carried separately in
    /// `SessionAuth::partial_success`, since the wire message is the same
    /// either way.
    Failed,
    /// Something fatal happened (malformed packet, protocol violation);
    /// the session is no longer usable for authentication.
    Error,
}

/// The method call presently in flight, if any. A closed sum type in
/// place of the original's ad-hoc `pending_call_state` integer plus a
/// separately-tracked method name (§9: "a tagged pending operation").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingCall {
    /// No call in flight; any driver may be invoked.
    Idle,
    /// `userauth_none`: the `none` auth method, not "no call pending".
    AuthNone,
    TryPublickey,
    Publickey,
    AgentPublickey,
    Password,
    KbdintInit,
    KbdintSend,
}

/// The outcome of a method driver or of [`drivers::await_response`].
/// Distinct from [`crate::Error`]: these are RFC 4252 protocol results,
/// not failures of this crate (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// `SSH_MSG_USERAUTH_SUCCESS`.
    Success,
    /// `SSH_MSG_USERAUTH_FAILURE` with `partial_success` set.
    Partial,
    /// `SSH_MSG_USERAUTH_FAILURE` with `partial_success` unset.
    Denied,
    /// A keyboard-interactive challenge is ready in `SessionAuth::kbdint`;
    /// caller should read its prompts and call the kbdint "send" driver.
    Info,
    /// The call would block; caller should retry later.
    Again,
}
