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
//! The keyboard-interactive challenge (§4.6), grounded on `auth.c`'s
//! `ssh_kbdint_new`/`ssh_userauth_kbdint_get*`/`_setanswer`.

use zeroize::Zeroizing;

/// Upper bound on the number of prompts a single `USERAUTH_INFO_REQUEST`
/// may carry, enforced in [`crate::auth::listener::on_info_request`]. The
/// original rejects anything larger outright rather than allocating an
/// attacker-controlled amount of memory.
pub const KBDINT_MAX_PROMPT: u32 = 32;

/// One keyboard-interactive challenge, alive between `USERAUTH_INFO_REQUEST`
/// and the matching `USERAUTH_INFO_RESPONSE`.
#[derive(Debug, Default)]
pub struct KbdInt {
    pub name: String,
    pub instruction: String,
    pub prompts: Vec<Zeroizing<String>>,
    pub echo: Vec<bool>,
    pub answers: Vec<Zeroizing<String>>,
}

impl KbdInt {
    pub fn new(name: String, instruction: String) -> Self {
        KbdInt {
            name,
            instruction,
            prompts: Vec::new(),
            echo: Vec::new(),
            answers: Vec::new(),
        }
    }

    pub fn getnprompts(&self) -> u32 {
        self.prompts.len() as u32
    }

    pub fn getname(&self) -> &str {
        &self.name
    }

    pub fn getinstruction(&self) -> &str {
        &self.instruction
    }

    /// Returns the `i`-th prompt and its echo flag.
    ///
    /// The bound check is `i > nprompts`, not `i >= nprompts` — the same
    /// off-by-one the original has (§9 preserves it deliberately rather
    /// than silently tightening behavior an embedder might depend on).
    /// Unlike the C original, going one past the last real prompt can't
    /// read out of bounds here: `Vec::get` still returns `None` for
    /// `i == nprompts`, so the preserved quirk is observable only as
    /// "the guard lets one extra index through before the container
    /// itself says no", not as memory unsafety.
    pub fn getprompt(&self, i: u32) -> Option<(&str, bool)> {
        if i > self.getnprompts() {
            return None;
        }
        let idx = i as usize;
        match (self.prompts.get(idx), self.echo.get(idx)) {
            (Some(p), Some(e)) => Some((p.as_str(), *e)),
            _ => None,
        }
    }

    /// Records the answer to prompt `i`, lazily growing `answers` as the
    /// original lazily allocates its answer array. Same off-by-one guard
    /// as `getprompt`.
    pub fn setanswer(&mut self, i: u32, answer: String) -> Option<()> {
        if i > self.getnprompts() {
            return None;
        }
        let idx = i as usize;
        if idx >= self.prompts.len() {
            return None;
        }
        if self.answers.len() <= idx {
            self.answers.resize_with(idx + 1, || Zeroizing::new(String::new()));
        }
        self.answers[idx] = Zeroizing::new(answer);
        Some(())
    }

    pub(crate) fn push_prompt(&mut self, prompt: String, echo: bool) {
        self.prompts.push(Zeroizing::new(prompt));
        self.echo.push(echo);
    }
}
