// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * error.rs - CoAP error types.
 */

//! Error types

use std::string::FromUtf8Error;

use thiserror::Error;

use crate::{
    protocol::CoapOptionType,
    types::{CoapMessageId, CoapSessionId},
};

/// Errors of the block-wise transfer engine.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum BlockError {
    /// Block number exceeds 2^20-1, the block size exponent is invalid or the block lies beyond
    /// the end of the body.
    #[error("CoAP block error: illegal block")]
    IllegalBlock,
    /// The maximum PDU size of the session cannot even fit a block of 16 bytes.
    #[error("CoAP block error: PDU size too small for block-wise transfer")]
    TooSmallForBlock,
    /// The set of received block ranges has too many holes.
    #[error("CoAP block error: too many holes in received body")]
    TooManyHoles,
    /// The Content-Format changed in the middle of a body.
    #[error("CoAP block error: content format changed during transfer")]
    ContentFormatChange,
    /// The ETag changed in the middle of a body.
    #[error("CoAP block error: ETag changed during transfer")]
    EtagChanged,
    /// The transport failed to send the message with the given ID.
    #[error("CoAP block error: unable to send message {:?}", .0)]
    SendFailure(Option<CoapMessageId>),
    /// The given session is not known to the context.
    #[error("CoAP block error: unknown session {}", .0)]
    UnknownSession(CoapSessionId),
    /// There is no outstanding request for the given token.
    #[error("CoAP block error: no request with the given token is outstanding")]
    NoSuchRequest,
    /// The message handed to the engine is malformed.
    #[error("CoAP block error: invalid message")]
    InvalidMessage(#[from] MessageConversionError),
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum ConfigError {
    /// NSTART must allow at least one outstanding confirmable message.
    #[error("CoAP configuration error: NSTART must be at least 1")]
    InvalidNstart,
    /// The MTU is too small to carry a CoAP message with a minimal block.
    #[error("CoAP configuration error: MTU of {} bytes is too small", .0)]
    MtuTooSmall(usize),
    /// The ACK random factor must be at least 1.0.
    #[error("CoAP configuration error: ACK random factor must be at least 1.0")]
    InvalidAckRandomFactor,
    /// Fractional parts are given in thousandths and must be below 1000.
    #[error("CoAP configuration error: fractional part must be below 1000")]
    InvalidFractionalPart,
    /// The maximum number of retransmissions exceeds the supported range.
    #[error("CoAP configuration error: max_retransmit of {} is too large", .0)]
    MaxRetransmitTooLarge(u16),
    /// OBS_MAX_NON and OBS_MAX_FAIL are limited to 255.
    #[error("CoAP configuration error: observe limit of {} exceeds 255", .0)]
    ObserveLimitTooLarge(u32),
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum UnknownOptionError {
    /// Option number is not known to this crate.
    #[error("CoAP option conversion error: unknown option")]
    Unknown,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum OptionValueError {
    /// Provided value for option is too short.
    #[error("CoAP option has invalid value: too short")]
    TooShort,
    /// Provided value for option is too long.
    #[error("CoAP option has invalid value: too long")]
    TooLong,
    /// A string value could not be converted to UTF-8.
    #[error("CoAP option has invalid value: invalid string")]
    StringConversion(#[from] FromUtf8Error),
    /// Option has an illegal value.
    #[error("CoAP option has invalid value")]
    IllegalValue,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MessageConversionError {
    /// Value of an option is invalid.
    #[error("CoAP message conversion error: invalid option value for {:?}", .0)]
    InvalidOptionValue(Option<CoapOptionType>, #[source] OptionValueError),
    /// Non-repeatable option was repeated.
    #[error("CoAP message conversion error: non-repeatable option of type {:?} repeated", .0)]
    NonRepeatableOptionRepeated(CoapOptionType),
    /// Invalid message code.
    #[error("CoAP message conversion error: invalid message code")]
    InvalidMessageCode(#[from] MessageCodeError),
    /// A message with code 0.00 (Empty) contains data.
    #[error("CoAP message conversion error: empty message contains data")]
    DataInEmptyMessage,
    /// Token is longer than 8 bytes.
    #[error("CoAP message conversion error: token too long")]
    TokenTooLong,
    /// Message has no ID.
    #[error("CoAP message conversion error: message id missing")]
    MissingMessageId,
}

#[derive(Error, Debug, Copy, Clone, Eq, PartialEq)]
pub enum MessageCodeError {
    /// Provided message code for request was not a request code.
    #[error("CoAP message code conversion error: not a request code")]
    NotARequestCode,
    /// Provided message code for response was not a response code.
    #[error("CoAP message code conversion error: not a response code")]
    NotAResponseCode,
    /// Provided message code was not a signaling code.
    #[error("CoAP message code conversion error: not a signaling code")]
    NotASignalingCode,
}

