// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/body.rs - Reassembly buffer for block-wise bodies.
 */

/// Growable buffer a body is reassembled in from block payloads arriving at arbitrary offsets.
///
/// The total size announced by the peer (Size1/Size2) is only a hint: the buffer grows beyond
/// it whenever a deposit requires it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BodyBuffer {
    data: Vec<u8>,
    hint: usize,
}

impl BodyBuffer {
    pub fn new() -> BodyBuffer {
        BodyBuffer::default()
    }

    pub fn with_hint(hint: usize) -> BodyBuffer {
        BodyBuffer {
            data: Vec::with_capacity(hint),
            hint,
        }
    }

    /// Writes `bytes` at `offset`, growing the buffer if necessary.
    ///
    /// A larger `hint` revises the expected total size upward.
    pub fn deposit(&mut self, offset: usize, bytes: &[u8], hint: usize) {
        if hint > self.hint {
            self.hint = hint;
            self.data.reserve(hint.saturating_sub(self.data.len()));
        }
        let end = offset + bytes.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[offset..end].copy_from_slice(bytes);
    }

    /// Returns the number of bytes covered by deposits so far.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Expected total size of the body.
    pub fn hint(&self) -> usize {
        self.hint
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.hint = 0;
    }

    /// Takes the reassembled body out of the buffer, leaving it empty.
    pub fn take(&mut self) -> Box<[u8]> {
        self.hint = 0;
        std::mem::take(&mut self.data).into_boxed_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deposits_out_of_order() {
        let mut body = BodyBuffer::with_hint(6);
        body.deposit(4, b"ef", 6);
        body.deposit(0, b"ab", 6);
        body.deposit(2, b"cd", 6);
        assert_eq!(body.as_slice(), b"abcdef");
    }

    #[test]
    fn small_hint_is_not_an_error() {
        let mut body = BodyBuffer::with_hint(2);
        body.deposit(0, b"0123", 2);
        body.deposit(4, b"4567", 2);
        assert_eq!(body.len(), 8);
        assert_eq!(body.take().as_ref(), b"01234567");
        assert!(body.is_empty());
    }

    #[test]
    fn large_hint_does_not_pad_body() {
        let mut body = BodyBuffer::new();
        body.deposit(0, b"abc", 100);
        assert_eq!(body.hint(), 100);
        assert_eq!(body.len(), 3);
    }

    #[test]
    fn latest_deposit_wins() {
        let mut body = BodyBuffer::new();
        body.deposit(0, b"aaaa", 4);
        body.deposit(2, b"bb", 4);
        assert_eq!(body.as_slice(), b"aabb");
    }
}
