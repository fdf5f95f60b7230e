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
//! The `Agent` collaborator contract (§6.3), standing in for
//! `ssh-agent(1)`. Grounded on `thrussh_keys::agent::client::AgentClient`,
//! whose `request_identities`/`sign_request` pair this trait's
//! `identities`/`sign` mirror — but without the socket, since connecting
//! to an agent is a transport-layer concern out of scope here.

use crate::Error;

/// One identity offered by a running agent: its `publickey`-algorithm
/// name and blob, exactly as they'd appear in a `publickey` request.
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    pub algorithm: String,
    pub blob: Vec<u8>,
    pub comment: String,
}

pub trait Agent {
    /// Whether an agent is reachable at all. `ssh_userauth_publickey_auto`
    /// falls straight through to the identity file list when this is
    /// `false`, rather than treating a missing agent as an error.
    fn is_running(&self) -> bool;

    /// All identities the agent is willing to offer, in the order the
    /// agent returned them. Replaces `first_ident`/`next_ident`'s C-style
    /// two-call cursor with a single iterator.
    fn identities(&mut self) -> Result<Vec<AgentIdentity>, Error>;

    /// Ask the agent to sign `data` with the identity named by `blob`.
    fn sign(&mut self, blob: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub struct FakeAgent {
        pub running: bool,
        pub idents: Vec<AgentIdentity>,
    }

    impl FakeAgent {
        pub fn new() -> Self {
            FakeAgent {
                running: true,
                idents: Vec::new(),
            }
        }

        pub fn not_running() -> Self {
            FakeAgent {
                running: false,
                idents: Vec::new(),
            }
        }

        pub fn with_identity(mut self, algorithm: &str, blob: &[u8]) -> Self {
            self.idents.push(AgentIdentity {
                algorithm: algorithm.to_string(),
                blob: blob.to_vec(),
                comment: String::new(),
            });
            self
        }
    }

    impl Agent for FakeAgent {
        fn is_running(&self) -> bool {
            self.running
        }

        fn identities(&mut self) -> Result<Vec<AgentIdentity>, Error> {
            Ok(self.idents.clone())
        }

        fn sign(&mut self, blob: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
            if !self.idents.iter().any(|i| i.blob == blob) {
                return Err(Error::Collaborator("unknown identity".into()));
            }
            let mut sig = b"agentsig:".to_vec();
            sig.extend_from_slice(data);
            Ok(sig)
        }
    }
}
