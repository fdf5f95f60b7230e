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
//! The `PkiKey` / `PkiSigner` collaborator contracts (§6.3). This crate
//! never parses a key file or touches a private exponent itself — those
//! concerns, and their crypto backend, belong to the embedder, the way
//! `thrussh_keys::key::{PublicKey, KeyPair}` do for the teacher.

use crate::Error;
use std::path::Path;

/// A key usable on the wire: at minimum, something with an algorithm name
/// and a blob that can go into a `publickey` request or a `PK_OK` probe.
pub trait PkiKey: Sized {
    /// Load a bare public key from an OpenSSH `.pub` file.
    fn import_pubkey_file(path: &Path) -> Result<Self, Error>;

    /// Write this key out as an OpenSSH `.pub` file, used by
    /// [`crate::auth::auto::publickey_auto`] to cache keys it derived
    /// from a private key it hadn't seen a sibling `.pub` for.
    fn export_pubkey_file(&self, path: &Path) -> Result<(), Error>;

    fn is_public(&self) -> bool;

    /// The `publickey`-algorithm name to send in the request
    /// (`ssh-ed25519`, `rsa-sha2-512`, ...).
    fn algorithm_name(&self) -> &str;

    /// The raw key blob, as it appears in a `publickey` request or a
    /// `PK_OK` response — not length-prefixed.
    fn pubkey_blob(&self) -> Vec<u8>;
}

/// A key that can also produce signatures, i.e. one with a private half.
pub trait PkiSigner: PkiKey {
    /// Load a private key (and, transitively, its public half) from an
    /// OpenSSH private key file.
    ///
    /// `passphrase` unlocks an encrypted key outright; if the key is
    /// encrypted and no passphrase was given, `prompt` is called once to
    /// ask for one (a closure stands in for the original's
    /// `prompt_cb`/`cb_data` pair, since a closure already carries
    /// whatever state `cb_data` would have). Returns
    /// [`Error::NotFound`] when `path` doesn't exist, distinct from any
    /// other error (bad passphrase, corrupt key) so callers walking an
    /// identity list can skip a missing file silently while still
    /// logging a real parse failure.
    fn import_privkey_file(
        path: &Path,
        passphrase: Option<&str>,
        prompt: Option<&mut dyn FnMut() -> Option<String>>,
    ) -> Result<Self, Error>;

    fn is_private(&self) -> bool;

    /// The public key that corresponds to this private key, used when no
    /// `.pub` sibling file exists yet.
    fn export_privkey_to_pubkey(&self) -> Result<Self, Error>
    where
        Self: Clone;

    /// Sign `data` (the session id prefix plus the to-be-signed request,
    /// per RFC 4252 section 7) and return the raw signature blob.
    fn do_sign(&self, data: &[u8]) -> Result<Vec<u8>, Error>;
}
