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
//! Client-side SSH user authentication, as defined by
//! [RFC 4252](https://tools.ietf.org/html/rfc4252) (`ssh-userauth`) and
//! [RFC 4256](https://tools.ietf.org/html/rfc4256) (`keyboard-interactive`).
//!
//! This crate does not open sockets, negotiate key exchange, or parse
//! arbitrary SSH packets: it is the part of an SSH client that sits between
//! an already-authenticated-to-the-transport-layer session and the
//! application, driving `SSH_MSG_USERAUTH_*` exchanges to completion. The
//! surrounding transport, host-key verification and signing are supplied by
//! the embedder through the [`transport::Transport`], [`pki::PkiKey`] /
//! [`pki::PkiSigner`] and [`agent::Agent`] traits.
//!
//! ```no_run
//! use sshauth::{SessionAuth, auth::drivers};
//! use std::time::Duration;
//!
//! fn try_password(session: &mut SessionAuth, transport: &mut impl sshauth::transport::Transport, password: &str) -> Result<sshauth::auth::AuthOutcome, sshauth::Error> {
//!     drivers::userauth_password(session, transport, password)?;
//!     drivers::await_response(session, transport, Duration::from_secs(10))
//! }
//! ```

pub mod agent;
pub mod auth;
pub mod msg;
pub mod pki;
pub mod transport;
pub mod wire;

use auth::kbdint::KbdInt;
use auth::{AuthState, MethodSet, PendingCall};
use std::time::Duration;

/// Everything that can go wrong while driving authentication.
///
/// This is distinct from [`auth::AuthOutcome`]: `Error` is this crate's
/// own failure mode (a malformed packet, a collaborator I/O error, a
/// misuse of the API), while `AuthOutcome` carries the protocol-level
/// results (`FAILURE`, `SUCCESS`, ...) that RFC 4252 itself defines.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A driver was called while a different method's call was still
    /// pending, or a response arrived that didn't match the call in
    /// flight.
    #[error("a different authentication call is already pending")]
    BadCall,

    /// An inbound packet ran past the end of its own buffer.
    #[error("index out of bounds while parsing a packet")]
    IndexOutOfBounds,

    /// The peer sent something that is syntactically valid SSH but
    /// makes no sense in the current state (e.g. `USERAUTH_SUCCESS`
    /// before any request was ever sent).
    #[error("inconsistent authentication protocol state: {0}")]
    Inconsistent(&'static str),

    /// `await_response` ran out of time waiting for the peer.
    #[error("timed out waiting for a response")]
    Timeout,

    /// No more public/private keys to try in `publickey_auto`.
    #[error("no more identities to try")]
    IdentitiesExhausted,

    /// `import_privkey_file`/`import_pubkey_file` found no file at the
    /// given path. Distinct from [`Error::Collaborator`], which covers a
    /// file that exists but fails to decrypt or parse — callers that
    /// walk an identity list skip the former silently and log the
    /// latter.
    #[error("no such key file")]
    NotFound,

    /// Bubbled up from a collaborator (agent, PKI backend, transport).
    #[error("{0}")]
    Collaborator(String),

    /// Bubbled up from the underlying transport.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Configuration for a single authentication attempt, supplied by the
/// embedder (not negotiated over the wire).
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Default username to authenticate as, when a driver isn't given one
    /// explicitly.
    pub username: String,
    /// Ordered list of private key paths to try in
    /// [`auth::auto::publickey_auto`].
    pub identities: Vec<std::path::PathBuf>,
    /// How long [`auth::drivers::await_response`] waits for a server
    /// reply before returning [`Error::Timeout`].
    pub timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            username: String::new(),
            identities: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// The authentication context carried by a single SSH session.
///
/// Owned by the embedder alongside its transport/channel state; this
/// crate only ever sees it through `&mut` borrows handed to drivers and
/// listener callbacks.
#[derive(Debug)]
pub struct SessionAuth {
    pub config: AuthConfig,
    /// Authentication methods the server has told us it still accepts.
    /// Starts out as "all of them" until the first `FAILURE` narrows it.
    pub methods_remaining: MethodSet,
    /// Current phase of the exchange (§3 of the data model).
    pub state: AuthState,
    /// The call presently in flight; `PendingCall::Idle` means the
    /// session is idle and any driver may be invoked.
    pub pending: PendingCall,
    /// Set once the `ssh-userauth` service request has been accepted.
    pub service_accepted: bool,
    /// Whether the most recent `FAILURE` carried `partial_success`.
    /// Meaningless unless `state == AuthState::Failed`.
    pub partial_success: bool,
    /// Present only between `USERAUTH_INFO_REQUEST` and its matching
    /// `USERAUTH_INFO_RESPONSE`.
    pub kbdint: Option<KbdInt>,
    /// Most recent `USERAUTH_BANNER` text, if any.
    pub banner: Option<String>,
}

impl SessionAuth {
    pub fn new(config: AuthConfig) -> Self {
        SessionAuth {
            config,
            methods_remaining: MethodSet::all(),
            state: AuthState::None,
            pending: PendingCall::Idle,
            service_accepted: false,
            partial_success: false,
            kbdint: None,
            banner: None,
        }
    }
}
