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
//! Minimal SSH wire primitives: `uint8`, `uint32` big-endian, and the
//! length-prefixed `string` type (RFC 4251 section 5).
//!
//! Trimmed to what `ssh-userauth` needs: no mpint, no name-lists. Kex and
//! host-key encoding live in the (out of scope) transport layer.

use crate::Error;
use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use cryptovec::CryptoVec;

/// Push SSH primitives onto an outbound buffer.
pub trait Encoding {
    fn extend_u8(&mut self, v: u8);
    fn extend_u32(&mut self, v: u32);
    fn extend_ssh_string(&mut self, s: &[u8]);
}

impl Encoding for CryptoVec {
    fn extend_u8(&mut self, v: u8) {
        self.push(v);
    }
    fn extend_u32(&mut self, v: u32) {
        self.push_u32_be(v);
    }
    fn extend_ssh_string(&mut self, s: &[u8]) {
        self.push_u32_be(s.len() as u32);
        self.extend(s);
    }
}

impl Encoding for Vec<u8> {
    fn extend_u8(&mut self, v: u8) {
        self.push(v);
    }
    fn extend_u32(&mut self, v: u32) {
        self.write_u32::<BigEndian>(v).unwrap();
    }
    fn extend_ssh_string(&mut self, s: &[u8]) {
        self.write_u32::<BigEndian>(s.len() as u32).unwrap();
        self.extend(s);
    }
}

/// A cursor-like type to read SSH-encoded values out of an inbound packet.
#[derive(Debug)]
pub struct Position<'a> {
    s: &'a [u8],
    position: usize,
}

impl<'a> Position<'a> {
    pub fn new(s: &'a [u8]) -> Self {
        Position { s, position: 0 }
    }

    pub fn read_u8(&mut self) -> Result<u8, Error> {
        if self.position + 1 <= self.s.len() {
            let b = self.s[self.position];
            self.position += 1;
            Ok(b)
        } else {
            Err(Error::IndexOutOfBounds)
        }
    }

    pub fn read_u32(&mut self) -> Result<u32, Error> {
        if self.position + 4 <= self.s.len() {
            let v = BigEndian::read_u32(&self.s[self.position..]);
            self.position += 4;
            Ok(v)
        } else {
            Err(Error::IndexOutOfBounds)
        }
    }

    pub fn read_string(&mut self) -> Result<&'a [u8], Error> {
        let len = self.read_u32()? as usize;
        if self.position + len <= self.s.len() {
            let result = &self.s[self.position..self.position + len];
            self.position += len;
            Ok(result)
        } else {
            Err(Error::IndexOutOfBounds)
        }
    }

    pub fn read_utf8_string(&mut self) -> Result<String, Error> {
        let bytes = self.read_string()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| Error::IndexOutOfBounds)
    }

    pub fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }
}

/// Build a reader over an inbound packet body, skipping the leading
/// message-number byte already consumed by the caller's dispatch.
pub fn reader(buf: &[u8]) -> Position<'_> {
    Position::new(buf)
}
