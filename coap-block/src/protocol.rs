// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * protocol.rs - Types specified by the CoAP standard and its extensions.
 */

//! Various types that are specified and defined in the CoAP standard and its extensions.

use std::fmt::{Display, Formatter};

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use crate::error::{MessageCodeError, UnknownOptionError};

pub type ETag = Box<[u8]>;
pub type MaxAge = u32;
pub type UriPath = String;
pub type UriQuery = String;
pub type ContentFormat = u16;
pub type Size = u32;
pub type Block = u32;
pub type NoResponse = u8;
pub type Observe = u32;
pub type Echo = Box<[u8]>;
pub type RequestTag = Box<[u8]>;

pub type CoapOptionNum = u16;
pub type CoapToken = Box<[u8]>;

/// Maximum length of a CoAP token (for RFC 7252 framing without extended token lengths).
pub const COAP_MAX_TOKEN_LENGTH: usize = 8;

/// Observe option value used to register an observation.
pub const COAP_OBSERVE_ESTABLISH: Observe = 0;
/// Observe option value used to cancel an observation.
pub const COAP_OBSERVE_CANCEL: Observe = 1;

/// Signaling option: Max-Message-Size in a 7.01 CSM ([RFC 8323, Section 5.3.1](https://datatracker.ietf.org/doc/html/rfc8323#section-5.3.1)).
pub const COAP_SIGNALING_OPTION_MAX_MESSAGE_SIZE: CoapOptionNum = 2;
/// Signaling option: Block-Wise-Transfer in a 7.01 CSM ([RFC 8323, Section 5.3.2](https://datatracker.ietf.org/doc/html/rfc8323#section-5.3.2)).
pub const COAP_SIGNALING_OPTION_BLOCK_WISE_TRANSFER: CoapOptionNum = 4;

/// CoAP option types as defined in [RFC 7252, Section 5.10](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10)
/// and later CoAP extensions.
///
/// The enum value corresponds to the appropriate option number and can be retrieved using
/// `[value] as u16` or [to_raw_option_num()](CoapOptionType::to_raw_option_num()).
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#option-numbers> for a
/// list of option numbers registered with the IANA.
#[repr(u16)]
#[non_exhaustive]
#[derive(FromPrimitive, Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CoapOptionType {
    /// If-Match option ([RFC 7252, Section 5.10.8.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.1)).
    IfMatch = 1,
    /// Uri-Host option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriHost = 3,
    /// ETag option ([RFC 7252, Section 5.10.6](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.6)).
    ETag = 4,
    /// If-None-Match option ([RFC 7252, Section 5.10.8.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.8.2)).
    IfNoneMatch = 5,
    /// Observe option ([RFC 7641, Section 2](https://datatracker.ietf.org/doc/html/rfc7641#section-2)).
    Observe = 6,
    /// Uri-Port option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriPort = 7,
    /// Location-Path option ([RFC 7252, Section 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7)).
    LocationPath = 8,
    /// Uri-Path option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriPath = 11,
    /// Content-Format option ([RFC 7252, Section 5.10.3](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.3)).
    ContentFormat = 12,
    /// Max-Age option ([RFC 7252, Section 5.10.5](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.5)).
    MaxAge = 14,
    /// Uri-Query option ([RFC 7252, Section 5.10.1](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.1)).
    UriQuery = 15,
    /// Hop-Limit option ([RFC 8768, Section 3](https://datatracker.ietf.org/doc/html/rfc8768#section-3)).
    HopLimit = 16,
    /// Accept option ([RFC 7252, Section 5.10.4](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.4)).
    Accept = 17,
    /// Location-Query option ([RFC 7252, Section 5.10.7](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.7)).
    LocationQuery = 20,
    /// Block2 option ([RFC 7959, Section 2.1](https://datatracker.ietf.org/doc/html/rfc7959#section-2.1)).
    Block2 = 23,
    /// Block1 option ([RFC 7959, Section 2.1](https://datatracker.ietf.org/doc/html/rfc7959#section-2.1)).
    Block1 = 27,
    /// Size2 option ([RFC 7959, Section 4](https://datatracker.ietf.org/doc/html/rfc7959#section-4)).
    Size2 = 28,
    /// Proxy-Uri option ([RFC 7252, Section 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2)).
    ProxyUri = 35,
    /// Proxy-Scheme option ([RFC 7252, Section 5.10.2](https://datatracker.ietf.org/doc/html/rfc7252#section-5.10.2)).
    ProxyScheme = 39,
    /// Size1 option ([RFC 7959, Section 4](https://datatracker.ietf.org/doc/html/rfc7959#section-4)).
    Size1 = 60,
    /// Echo option ([RFC 9175, Section 2.2](https://datatracker.ietf.org/doc/html/rfc9175#section-2.2)).
    Echo = 252,
    /// No-Response option ([RFC 7967, Section 2](https://datatracker.ietf.org/doc/html/rfc7967#section-2)).
    NoResponse = 258,
    /// Request-Tag option ([RFC 9175, Section 3.2](https://datatracker.ietf.org/doc/html/rfc9175#section-3.2)).
    RequestTag = 292,
}

impl CoapOptionType {
    /// Returns the option number this type belongs to.
    pub fn to_raw_option_num(self) -> CoapOptionNum {
        self as u16
    }

    /// Returns the maximum size in bytes that a value of this option type should have.
    pub fn max_len(&self) -> usize {
        match self {
            CoapOptionType::IfMatch => 8,
            CoapOptionType::UriHost => 255,
            CoapOptionType::ETag => 8,
            CoapOptionType::IfNoneMatch => 0,
            CoapOptionType::Observe => 3,
            CoapOptionType::UriPort => 2,
            CoapOptionType::LocationPath => 255,
            CoapOptionType::UriPath => 255,
            CoapOptionType::ContentFormat => 2,
            CoapOptionType::MaxAge => 4,
            CoapOptionType::UriQuery => 255,
            CoapOptionType::HopLimit => 1,
            CoapOptionType::Accept => 2,
            CoapOptionType::LocationQuery => 255,
            CoapOptionType::Block2 => 3,
            CoapOptionType::Block1 => 3,
            CoapOptionType::Size2 => 4,
            CoapOptionType::ProxyUri => 1034,
            CoapOptionType::ProxyScheme => 255,
            CoapOptionType::Size1 => 4,
            CoapOptionType::Echo => 40,
            CoapOptionType::NoResponse => 1,
            CoapOptionType::RequestTag => 8,
        }
    }

    /// Returns the minimum size in bytes that a value of this option type should have.
    pub fn min_len(&self) -> usize {
        match self {
            CoapOptionType::UriHost => 1,
            CoapOptionType::ETag => 1,
            CoapOptionType::HopLimit => 1,
            CoapOptionType::ProxyUri => 1,
            CoapOptionType::ProxyScheme => 1,
            CoapOptionType::Echo => 1,
            _ => 0,
        }
    }

    /// Returns whether the option may occur more than once in a message.
    pub fn is_repeatable(&self) -> bool {
        matches!(
            self,
            CoapOptionType::IfMatch
                | CoapOptionType::ETag
                | CoapOptionType::LocationPath
                | CoapOptionType::UriPath
                | CoapOptionType::UriQuery
                | CoapOptionType::LocationQuery
                | CoapOptionType::RequestTag
        )
    }
}

impl TryFrom<CoapOptionNum> for CoapOptionType {
    type Error = UnknownOptionError;

    fn try_from(num: CoapOptionNum) -> Result<Self, Self::Error> {
        <CoapOptionType as FromPrimitive>::from_u16(num).ok_or(UnknownOptionError::Unknown)
    }
}

/// Various content formats that can be used for CoAP requests.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#content-formats> for
/// values that are currently registered with the IANA.
#[repr(u16)]
#[derive(Copy, Clone, FromPrimitive, Eq, PartialEq, Hash, Debug)]
#[non_exhaustive]
pub enum CoapContentFormat {
    TextPlain = 0,
    LinkFormat = 40,
    ApplicationXml = 41,
    OctetStream = 42,
    Exi = 47,
    Json = 50,
    Cbor = 60,
    SenMlJson = 110,
    SenMlCbor = 112,
    Other = 0xffff,
}

impl From<ContentFormat> for CoapContentFormat {
    fn from(value: u16) -> Self {
        <CoapContentFormat as FromPrimitive>::from_u16(value).unwrap_or(CoapContentFormat::Other)
    }
}

/// Representation of a CoAP message code.
/// Can be a request code, a response code, a signaling code or the empty message code.
///
/// The numeric value (see [to_raw_pdu_code()](CoapMessageCode::to_raw_pdu_code())) corresponds to
/// the values defined in <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#codes>.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CoapMessageCode {
    Empty,
    Request(CoapRequestCode),
    Response(CoapResponseCode),
    Signaling(CoapSignalingCode),
}

impl CoapMessageCode {
    /// Returns the raw code (`class << 5 | detail`) for this message code.
    pub fn to_raw_pdu_code(self) -> u8 {
        match self {
            CoapMessageCode::Empty => 0,
            CoapMessageCode::Request(req) => req as u8,
            CoapMessageCode::Response(rsp) => rsp as u8,
            CoapMessageCode::Signaling(sig) => sig as u8,
        }
    }

    /// Returns the code class (the `c` in `c.dd`).
    pub fn class(self) -> u8 {
        self.to_raw_pdu_code() >> 5
    }

    /// Returns whether this is a response code of class 2 (Success).
    pub fn is_success(self) -> bool {
        matches!(self, CoapMessageCode::Response(_)) && self.class() == 2
    }
}

impl From<CoapRequestCode> for CoapMessageCode {
    fn from(code: CoapRequestCode) -> Self {
        CoapMessageCode::Request(code)
    }
}

impl From<CoapResponseCode> for CoapMessageCode {
    fn from(code: CoapResponseCode) -> Self {
        CoapMessageCode::Response(code)
    }
}

impl From<CoapSignalingCode> for CoapMessageCode {
    fn from(code: CoapSignalingCode) -> Self {
        CoapMessageCode::Signaling(code)
    }
}

impl TryFrom<u8> for CoapMessageCode {
    type Error = MessageCodeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(CoapMessageCode::Empty),
            code => CoapRequestCode::try_from(code)
                .map(CoapMessageCode::Request)
                .or_else(|_| CoapResponseCode::try_from(code).map(CoapMessageCode::Response))
                .or_else(|_| CoapSignalingCode::try_from(code).map(CoapMessageCode::Signaling)),
        }
    }
}

/// Representation of a CoAP request/method code.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#method-codes> for the
/// values currently registered with the IANA.
#[repr(u8)]
#[non_exhaustive]
#[derive(FromPrimitive, Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum CoapRequestCode {
    Get = 1,
    Post = 2,
    Put = 3,
    Delete = 4,
    Fetch = 5,
    Patch = 6,
    IPatch = 7,
}

impl TryFrom<u8> for CoapRequestCode {
    type Error = MessageCodeError;

    fn try_from(req: u8) -> Result<Self, Self::Error> {
        <CoapRequestCode as FromPrimitive>::from_u8(req).ok_or(MessageCodeError::NotARequestCode)
    }
}

/// Representation of a CoAP response code.
///
/// See <https://www.iana.org/assignments/core-parameters/core-parameters.xhtml#response-codes> for
/// the possible values currently registered with the IANA.
#[repr(u8)]
#[non_exhaustive]
#[derive(Clone, Copy, FromPrimitive, Debug, Eq, PartialEq, Hash)]
pub enum CoapResponseCode {
    Created = 65,
    Deleted = 66,
    Valid = 67,
    Changed = 68,
    Content = 69,
    Continue = 95,
    BadRequest = 128,
    Unauthorized = 129,
    BadOption = 130,
    Forbidden = 131,
    NotFound = 132,
    NotAllowed = 133,
    NotAcceptable = 134,
    Incomplete = 136,
    Conflict = 137,
    PreconditionFailed = 140,
    RequestTooLarge = 141,
    UnsupportedContentFormat = 143,
    Unprocessable = 150,
    TooManyRequests = 157,
    InternalError = 160,
    NotImplemented = 161,
    BadGateway = 162,
    ServiceUnavailable = 163,
    GatewayTimeout = 164,
    ProxyingNotSupported = 165,
    HopLimitReached = 168,
}

impl Display for CoapResponseCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let raw = *self as u8;
        let phrase = match self {
            CoapResponseCode::Created => "Created",
            CoapResponseCode::Deleted => "Deleted",
            CoapResponseCode::Valid => "Valid",
            CoapResponseCode::Changed => "Changed",
            CoapResponseCode::Content => "Content",
            CoapResponseCode::Continue => "Continue",
            CoapResponseCode::BadRequest => "Bad Request",
            CoapResponseCode::Unauthorized => "Unauthorized",
            CoapResponseCode::BadOption => "Bad Option",
            CoapResponseCode::Forbidden => "Forbidden",
            CoapResponseCode::NotFound => "Not Found",
            CoapResponseCode::NotAllowed => "Method Not Allowed",
            CoapResponseCode::NotAcceptable => "Not Acceptable",
            CoapResponseCode::Incomplete => "Request Entity Incomplete",
            CoapResponseCode::Conflict => "Conflict",
            CoapResponseCode::PreconditionFailed => "Precondition Failed",
            CoapResponseCode::RequestTooLarge => "Request Entity Too Large",
            CoapResponseCode::UnsupportedContentFormat => "Unsupported Content-Format",
            CoapResponseCode::Unprocessable => "Unprocessable Entity",
            CoapResponseCode::TooManyRequests => "Too Many Requests",
            CoapResponseCode::InternalError => "Internal Server Error",
            CoapResponseCode::NotImplemented => "Not Implemented",
            CoapResponseCode::BadGateway => "Bad Gateway",
            CoapResponseCode::ServiceUnavailable => "Service Unavailable",
            CoapResponseCode::GatewayTimeout => "Gateway Timeout",
            CoapResponseCode::ProxyingNotSupported => "Proxying Not Supported",
            CoapResponseCode::HopLimitReached => "Hop Limit Reached",
        };
        write!(f, "{}.{:02} {}", raw >> 5, raw & 0x1f, phrase)
    }
}

impl TryFrom<u8> for CoapResponseCode {
    type Error = MessageCodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        <CoapResponseCode as FromPrimitive>::from_u8(value).ok_or(MessageCodeError::NotAResponseCode)
    }
}

/// Signaling codes used over reliable transports ([RFC 8323, Section 5](https://datatracker.ietf.org/doc/html/rfc8323#section-5)).
#[repr(u8)]
#[non_exhaustive]
#[derive(Clone, Copy, FromPrimitive, Debug, Eq, PartialEq, Hash)]
pub enum CoapSignalingCode {
    Csm = 225,
    Ping = 226,
    Pong = 227,
    Release = 228,
    Abort = 229,
}

impl TryFrom<u8> for CoapSignalingCode {
    type Error = MessageCodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        <CoapSignalingCode as FromPrimitive>::from_u8(value).ok_or(MessageCodeError::NotASignalingCode)
    }
}

/// CoAP message types as defined in [RFC 7252, Section 3](https://datatracker.ietf.org/doc/html/rfc7252#section-3)
/// and described in [RFC 7252, Section 4.2 and 4.3](https://datatracker.ietf.org/doc/html/rfc7252#section-4.2).
#[repr(u8)]
#[derive(Copy, Clone, Hash, Eq, PartialEq, FromPrimitive, Debug)]
pub enum CoapMessageType {
    /// Confirmable message, i.e. a message whose reception should be confirmed by the peer.
    Con = 0,
    /// Non-confirmable message, i.e. a message whose reception should not be confirmed by the peer.
    Non = 1,
    /// Acknowledgement for a previous message.
    Ack = 2,
    /// Non-acknowledgement for a previous message.
    Rst = 3,
}
