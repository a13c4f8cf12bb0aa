// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * types.rs - Basic types and conversion helpers shared across the crate.
 */

//! Basic types shared by the block-wise transfer engine.

use std::fmt::{Display, Formatter};

use num_derive::FromPrimitive;

/// Identifier for a CoAP message.
pub type CoapMessageId = u16;
/// Value for maximum retransmits.
pub type MaxRetransmit = u16;
/// Monotonic time value used by the engine, in ticks (see [COAP_TICKS_PER_SECOND]).
pub type CoapTick = u64;
/// Identifier of a session inside a [CoapContext](crate::CoapContext).
pub type CoapSessionId = u32;

/// Number of ticks per second.
pub const COAP_TICKS_PER_SECOND: CoapTick = 1000;

/// Transport protocols a session can run over.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromPrimitive)]
#[non_exhaustive]
pub enum CoapProtocol {
    Udp = 1,
    Dtls = 2,
    Tcp = 3,
    Tls = 4,
    Ws = 5,
    Wss = 6,
}

impl CoapProtocol {
    pub fn is_secure(&self) -> bool {
        matches!(self, CoapProtocol::Dtls | CoapProtocol::Tls | CoapProtocol::Wss)
    }

    /// Returns whether the protocol is stream based (and therefore uses the RFC 8323 framing,
    /// CSM exchange and may use BERT).
    pub fn is_reliable(&self) -> bool {
        !matches!(self, CoapProtocol::Udp | CoapProtocol::Dtls)
    }
}

impl Display for CoapProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CoapProtocol::Udp => "UDP",
            CoapProtocol::Dtls => "DTLS",
            CoapProtocol::Tcp => "TCP",
            CoapProtocol::Tls => "TLS",
            CoapProtocol::Ws => "WS",
            CoapProtocol::Wss => "WSS",
        })
    }
}

/// Fixed point value consisting of an integer part and a fractional part in thousandths,
/// as used for the ACK_TIMEOUT and ACK_RANDOM_FACTOR transmission parameters.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct CoapFixedPoint {
    pub integer_part: u16,
    pub fractional_part: u16,
}

impl CoapFixedPoint {
    pub const fn new(integer_part: u16, fractional_part: u16) -> CoapFixedPoint {
        CoapFixedPoint {
            integer_part,
            fractional_part,
        }
    }

    /// Returns the value scaled by 1000.
    pub fn as_millis(&self) -> u64 {
        self.integer_part as u64 * 1000 + self.fractional_part as u64
    }
}

impl From<(u16, u16)> for CoapFixedPoint {
    fn from((integer_part, fractional_part): (u16, u16)) -> Self {
        CoapFixedPoint::new(integer_part, fractional_part)
    }
}

fn convert_to_fixed_size_slice(n: usize, val: &[u8]) -> Box<[u8]> {
    let mut buffer: Vec<u8> = vec![0; n];
    // Values longer than the target size keep their least significant bytes.
    let val = &val[val.len().saturating_sub(n)..];
    let (_, target_buffer) = buffer.split_at_mut(n - val.len());
    target_buffer.copy_from_slice(val);
    buffer.into_boxed_slice()
}

pub(crate) fn decode_var_len_u32(val: &[u8]) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&convert_to_fixed_size_slice(4, val));
    u32::from_be_bytes(bytes)
}

pub(crate) fn encode_var_len_u32(val: u32) -> Box<[u8]> {
    let bytes_to_discard = val.leading_zeros() / 8;
    let mut ret_val = Vec::from(val.to_be_bytes());
    ret_val.drain(..bytes_to_discard as usize);
    ret_val.into_boxed_slice()
}

pub(crate) fn decode_var_len_u64(val: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&convert_to_fixed_size_slice(8, val));
    u64::from_be_bytes(bytes)
}

pub(crate) fn encode_var_len_u64(val: u64) -> Box<[u8]> {
    let bytes_to_discard = val.leading_zeros() / 8;
    let mut ret_val = Vec::from(val.to_be_bytes());
    ret_val.drain(..bytes_to_discard as usize);
    ret_val.into_boxed_slice()
}

pub(crate) fn decode_var_len_u16(val: &[u8]) -> u16 {
    let mut bytes = [0u8; 2];
    bytes.copy_from_slice(&convert_to_fixed_size_slice(2, val));
    u16::from_be_bytes(bytes)
}

pub(crate) fn encode_var_len_u16(val: u16) -> Box<[u8]> {
    let bytes_to_discard = val.leading_zeros() / 8;
    let mut ret_val = Vec::from(val.to_be_bytes());
    ret_val.drain(..bytes_to_discard as usize);
    ret_val.into_boxed_slice()
}

pub(crate) fn decode_var_len_u8(val: &[u8]) -> u8 {
    val.last().copied().unwrap_or(0)
}

pub(crate) fn encode_var_len_u8(val: u8) -> Box<[u8]> {
    match val {
        0 => Box::new([]),
        v => Box::new([v]),
    }
}
