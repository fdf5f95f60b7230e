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
//! The `Transport` collaborator contract (§6.3). This crate never owns a
//! socket or a packet-framing layer; it is handed one that already speaks
//! the binary SSH protocol below `ssh-userauth`.

use crate::{Error, SessionAuth};
use std::time::Duration;

/// Whether a blocking collaborator call completed, should be retried
/// later, or ran out of time waiting. `Again` means "nothing to read right
/// now, try me again" (non-blocking mode, or a blocking mode that hasn't
/// hit its deadline yet); `Timeout` means the caller's configured
/// deadline elapsed without reaching a terminal state, which
/// `await_response` turns into [`crate::Error::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll {
    Ready,
    Again,
    Timeout,
}

/// What a session looks like from this crate's point of view: something
/// that can request the `ssh-userauth` service, send fully-built packets,
/// and pump inbound packets until a predicate over [`SessionAuth`] holds.
pub trait Transport {
    /// Send `SSH_MSG_SERVICE_REQUEST` for `service_name` and wait for
    /// `SSH_MSG_SERVICE_ACCEPT`. Called once per session before the first
    /// method driver runs.
    fn service_request(&mut self, service_name: &str) -> Result<Poll, Error>;

    /// Send a fully-built packet, including its leading message-number
    /// byte.
    fn packet_send(&mut self, payload: &[u8]) -> Result<(), Error>;

    /// Read and dispatch inbound packets — calling into
    /// `crate::auth::listener::dispatch` for anything `ssh-userauth`
    /// related — until `predicate(session)` holds or `timeout` elapses.
    fn handle_packets_until(
        &mut self,
        session: &mut SessionAuth,
        timeout: Duration,
        predicate: &mut dyn FnMut(&SessionAuth) -> bool,
    ) -> Result<Poll, Error>;

    /// Activate delayed compression directions negotiated at key exchange
    /// but held off until authentication completed (RFC 4252 section 5.1,
    /// called once from [`crate::auth::listener::on_success`]). A
    /// transport that never negotiated delayed compression, or that
    /// isn't compressing at all, is a no-op.
    fn enable_delayed_compression(&mut self) -> Result<(), Error>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::listener;
    use std::collections::VecDeque;

    /// A canned, in-memory `Transport`: packets to "receive" are queued up
    /// front, packets "sent" are recorded for assertions.
    pub struct FakeTransport {
        pub inbox: VecDeque<(u8, Vec<u8>)>,
        pub sent: Vec<Vec<u8>>,
        pub service_accept: bool,
        /// When the inbox empties before the predicate holds: `false`
        /// (the default) simulates non-blocking mode, returning `Again`;
        /// `true` simulates a blocking deadline having already elapsed,
        /// returning `Timeout`.
        pub expired_when_empty: bool,
        pub delayed_compression_enabled: bool,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            FakeTransport {
                inbox: VecDeque::new(),
                sent: Vec::new(),
                service_accept: true,
                expired_when_empty: false,
                delayed_compression_enabled: false,
            }
        }

        pub fn push(&mut self, msg_type: u8, payload: Vec<u8>) {
            self.inbox.push_back((msg_type, payload));
        }
    }

    impl Transport for FakeTransport {
        fn service_request(&mut self, _service_name: &str) -> Result<Poll, Error> {
            if self.service_accept {
                Ok(Poll::Ready)
            } else {
                Ok(Poll::Again)
            }
        }

        fn packet_send(&mut self, payload: &[u8]) -> Result<(), Error> {
            self.sent.push(payload.to_vec());
            Ok(())
        }

        fn handle_packets_until(
            &mut self,
            session: &mut SessionAuth,
            _timeout: Duration,
            predicate: &mut dyn FnMut(&SessionAuth) -> bool,
        ) -> Result<Poll, Error> {
            while !predicate(session) {
                match self.inbox.pop_front() {
                    Some((msg_type, payload)) => listener::dispatch(session, self, msg_type, &payload)?,
                    None if self.expired_when_empty => return Ok(Poll::Timeout),
                    None => return Ok(Poll::Again),
                }
            }
            Ok(Poll::Ready)
        }

        fn enable_delayed_compression(&mut self) -> Result<(), Error> {
            self.delayed_compression_enabled = true;
            Ok(())
        }
    }
}
