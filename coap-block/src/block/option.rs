// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/option.rs - Block1/Block2 option values.
 */

use crate::{
    error::BlockError,
    message::{CoapMessage, CoapMessageCommon},
    protocol::CoapOptionType,
    types::{decode_var_len_u32, encode_var_len_u32},
};

/// Largest block number that can be expressed in a block option.
pub const COAP_BLOCK_MAX_NUM: u32 = 0xF_FFFF;
/// Announced size exponent signalling a BERT block.
pub const COAP_BERT_SZX: u8 = 7;
/// Unit in which BERT blocks are numbered and sized.
pub const COAP_BERT_BLOCK_SIZE: usize = 1024;

/// Returns the block size for a (non-BERT) size exponent.
pub const fn szx_to_size(szx: u8) -> usize {
    1 << (szx as usize + 4)
}

/// Checks that blocks up to `last` (counted in `block_size` bytes) lie within a body of the
/// announced length.
pub(crate) fn check_block_range(last: u32, block_size: usize, total_len: Option<usize>) -> Result<(), BlockError> {
    match total_len {
        Some(total) if last as usize > total.saturating_sub(1) / block_size => Err(BlockError::IllegalBlock),
        _ => Ok(()),
    }
}

/// A parsed Block1 or Block2 option.
///
/// `szx` is the effective size exponent used to compute offsets, `aszx` the exponent that is
/// written to the wire. They only differ for BERT blocks, where `aszx` is 7, `szx` is 6 and
/// `chunk_size` is a multiple of 1024 bytes.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct CoapBlock {
    pub num: u32,
    pub m: bool,
    pub szx: u8,
    pub aszx: u8,
    pub bert: bool,
    pub defined: bool,
    pub chunk_size: usize,
}

impl CoapBlock {
    /// Creates a regular block option value.
    pub fn new(num: u32, m: bool, szx: u8) -> Result<CoapBlock, BlockError> {
        if num > COAP_BLOCK_MAX_NUM || szx >= COAP_BERT_SZX {
            return Err(BlockError::IllegalBlock);
        }
        Ok(CoapBlock {
            num,
            m,
            szx,
            aszx: szx,
            bert: false,
            defined: true,
            chunk_size: szx_to_size(szx),
        })
    }

    /// Creates a BERT block option value carrying `chunk_size` bytes (a multiple of 1024).
    pub fn new_bert(num: u32, m: bool, chunk_size: usize) -> Result<CoapBlock, BlockError> {
        if num > COAP_BLOCK_MAX_NUM || chunk_size == 0 || chunk_size % COAP_BERT_BLOCK_SIZE != 0 {
            return Err(BlockError::IllegalBlock);
        }
        Ok(CoapBlock {
            num,
            m,
            szx: 6,
            aszx: COAP_BERT_SZX,
            bert: true,
            defined: true,
            chunk_size,
        })
    }

    /// Returns the size of one block in bytes, i.e. the unit block numbers are counted in.
    pub fn block_size(&self) -> usize {
        szx_to_size(self.szx)
    }

    /// Returns the byte offset of this block within the body.
    pub fn offset(&self) -> usize {
        self.num as usize * self.block_size()
    }

    /// Returns the option value as an integer (`num << 4 | m << 3 | szx`).
    pub fn to_value(&self) -> u32 {
        (self.num << 4) | ((self.m as u32) << 3) | self.aszx as u32
    }

    /// Encodes the option value using the minimal number of bytes (0 to 3).
    pub fn encode(&self) -> Box<[u8]> {
        encode_var_len_u32(self.to_value())
    }

    /// Decodes a raw block option value into `(num, m, szx)`.
    pub fn decode_raw(value: &[u8]) -> Result<(u32, bool, u8), BlockError> {
        if value.len() > 3 {
            return Err(BlockError::IllegalBlock);
        }
        let value = decode_var_len_u32(value);
        Ok((value >> 4, value & 0x8 != 0, (value & 0x7) as u8))
    }

    /// Decodes a block option value.
    ///
    /// `bert_allowed` states whether BERT is in force for the session. `payload_len` is the
    /// length of the payload that accompanies the option and is used to size BERT blocks.
    pub fn decode(value: &[u8], bert_allowed: bool, payload_len: usize) -> Result<CoapBlock, BlockError> {
        let (num, m, aszx) = CoapBlock::decode_raw(value)?;
        if aszx != COAP_BERT_SZX {
            return CoapBlock::new(num, m, aszx);
        }
        if !bert_allowed {
            return Err(BlockError::IllegalBlock);
        }
        let chunk_size = if m {
            (payload_len / COAP_BERT_BLOCK_SIZE).max(1) * COAP_BERT_BLOCK_SIZE
        } else {
            COAP_BERT_BLOCK_SIZE
        };
        CoapBlock::new_bert(num, m, chunk_size)
    }

    /// Reads the block option of the given type from a message.
    ///
    /// Returns a block value with `defined == false` if the option is absent.
    pub fn from_message(
        message: &CoapMessage,
        opt_type: CoapOptionType,
        bert_allowed: bool,
    ) -> Result<CoapBlock, BlockError> {
        match message.option(opt_type.to_raw_option_num()) {
            Some(value) => {
                let payload_len = message.data().map(|d| d.len()).unwrap_or(0);
                CoapBlock::decode(value, bert_allowed, payload_len)
            },
            None => Ok(CoapBlock::default()),
        }
    }

    /// Writes this block value into the message, replacing any previous value.
    pub fn write_to(&self, message: &mut CoapMessage, opt_type: CoapOptionType) {
        message.set_option(opt_type.to_raw_option_num(), self.encode());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_value_packing() {
        let block = CoapBlock::new(1, true, 2).unwrap();
        assert_eq!(block.to_value(), 0x1A);
        assert_eq!(block.encode().as_ref(), &[0x1A]);
        let block = CoapBlock::new(0, false, 0).unwrap();
        assert!(block.encode().is_empty());
        let block = CoapBlock::new(COAP_BLOCK_MAX_NUM, true, 6).unwrap();
        assert_eq!(block.encode().len(), 3);
    }

    #[test]
    fn block_option_survives_encode_and_decode() {
        for num in [0, 1, 15, 16, 4095, 4096, COAP_BLOCK_MAX_NUM] {
            for m in [false, true] {
                for szx in 0..=7u8 {
                    let value = (num << 4) | ((m as u32) << 3) | szx as u32;
                    let bytes = encode_var_len_u32(value);
                    assert_eq!(CoapBlock::decode_raw(&bytes).unwrap(), (num, m, szx));
                    let block = CoapBlock::decode(&bytes, true, 2048).unwrap();
                    assert_eq!(block.encode(), bytes);
                }
            }
        }
    }

    #[test]
    fn illegal_blocks_are_rejected() {
        assert_eq!(CoapBlock::new(COAP_BLOCK_MAX_NUM + 1, false, 0), Err(BlockError::IllegalBlock));
        assert_eq!(CoapBlock::new(0, false, 7), Err(BlockError::IllegalBlock));
        assert_eq!(CoapBlock::decode(&[0x0F], false, 0), Err(BlockError::IllegalBlock));
        assert_eq!(CoapBlock::decode_raw(&[1, 2, 3, 4]), Err(BlockError::IllegalBlock));
    }

    #[test]
    fn blocks_beyond_announced_length() {
        assert_eq!(check_block_range(3, 32, Some(100)), Ok(()));
        assert_eq!(check_block_range(4, 32, Some(100)), Err(BlockError::IllegalBlock));
        assert_eq!(check_block_range(0, 16, Some(0)), Ok(()));
        assert_eq!(check_block_range(COAP_BLOCK_MAX_NUM, 1024, Some(100)), Err(BlockError::IllegalBlock));
        assert_eq!(check_block_range(COAP_BLOCK_MAX_NUM, 1024, None), Ok(()));
    }

    #[test]
    fn bert_block_sizes() {
        let block = CoapBlock::decode(&[0x1F], true, 3000).unwrap();
        assert!(block.bert);
        assert_eq!(block.szx, 6);
        assert_eq!(block.aszx, 7);
        assert_eq!(block.chunk_size, 2048);
        assert_eq!(block.offset(), 1024);
        let last = CoapBlock::decode(&[0x37], true, 100).unwrap();
        assert_eq!(last.chunk_size, COAP_BERT_BLOCK_SIZE);
        assert_eq!(last.offset(), 3 * 1024);
    }
}
