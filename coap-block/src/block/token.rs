// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/token.rs - On-wire tokens for block-wise continuation messages.
 */

use crate::{
    protocol::COAP_MAX_TOKEN_LENGTH,
    types::{decode_var_len_u64, encode_var_len_u64},
};

/// Mask for the part of a [StateToken] that identifies a transfer.
pub const STATE_TOKEN_BASE_MASK: u64 = 0xFFFF_FFFF_FFFF;
const STATE_TOKEN_RETRY_SHIFT: u32 = 48;

/// Token used on the wire for the messages of a block-wise transfer.
///
/// The lower 48 bits (the base) identify the transfer, the upper 16 bits count retries, so
/// every continuation message carries a fresh token while still mapping to the same record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct StateToken(u64);

impl StateToken {
    pub fn new(base: u64, retry: u16) -> StateToken {
        StateToken((base & STATE_TOKEN_BASE_MASK) | ((retry as u64) << STATE_TOKEN_RETRY_SHIFT))
    }

    pub fn base(&self) -> u64 {
        self.0 & STATE_TOKEN_BASE_MASK
    }

    pub fn retry(&self) -> u16 {
        (self.0 >> STATE_TOKEN_RETRY_SHIFT) as u16
    }

    /// Returns the token for the next message of the same transfer.
    pub fn next(&self) -> StateToken {
        StateToken::new(self.base(), self.retry().wrapping_add(1))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Interprets received token bytes as a state token.
    pub fn from_bytes(token: &[u8]) -> Option<StateToken> {
        (!token.is_empty() && token.len() <= COAP_MAX_TOKEN_LENGTH).then(|| StateToken(decode_var_len_u64(token)))
    }

    /// Returns the minimal on-wire encoding of this token.
    pub fn to_bytes(&self) -> Box<[u8]> {
        encode_var_len_u64(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retries_keep_the_base() {
        let token = StateToken::new(0x1234, 0);
        let next = token.next().next();
        assert_eq!(next.base(), 0x1234);
        assert_eq!(next.retry(), 2);
        assert_ne!(next.to_bytes(), token.to_bytes());
        assert_eq!(StateToken::from_bytes(&next.to_bytes()), Some(next));
    }

    #[test]
    fn base_is_truncated_to_48_bits() {
        let token = StateToken::new(0xFFFF_0000_0000_0001, 3);
        assert_eq!(token.base(), 1);
        assert_eq!(token.retry(), 3);
        assert_eq!(token.to_bytes().len(), 8);
    }

    #[test]
    fn retry_counter_wraps() {
        let token = StateToken::new(7, u16::MAX).next();
        assert_eq!(token.base(), 7);
        assert_eq!(token.retry(), 0);
    }

    #[test]
    fn empty_or_oversized_tokens_are_not_state_tokens() {
        assert_eq!(StateToken::from_bytes(&[]), None);
        assert_eq!(StateToken::from_bytes(&[0; 9]), None);
    }
}
