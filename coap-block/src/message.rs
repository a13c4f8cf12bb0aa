// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * message.rs - Types related to CoAP messages.
 */

//! Types related to CoAP messages.
//!
//! [CoapMessage] is the in-memory PDU representation the block-wise engine operates on: options
//! are stored as raw values ordered by option number, so the engine can get, set, insert and
//! remove them without knowing their semantics, while [CoapOption] provides typed access for
//! applications.

use num_traits::FromPrimitive;

use crate::{
    error::{MessageConversionError, OptionValueError},
    protocol::{
        Block, CoapMessageCode, CoapMessageType, CoapOptionNum, CoapOptionType, CoapRequestCode, ContentFormat,
        Echo, ETag, MaxAge, NoResponse, Observe, RequestTag, Size, UriPath, UriQuery, COAP_MAX_TOKEN_LENGTH,
    },
    types::{
        decode_var_len_u16, decode_var_len_u32, decode_var_len_u8, encode_var_len_u16, encode_var_len_u32,
        encode_var_len_u8, CoapMessageId, CoapProtocol,
    },
};

/// Representation of a CoAP option including its value.
///
/// For an enum describing the possible option types (and their associated option numbers), see
/// [CoapOptionType], for the data type representing option numbers, see [CoapOptionNum].
#[derive(Debug, Hash, Eq, PartialEq, Clone)]
pub enum CoapOption {
    IfMatch(Option<ETag>),
    IfNoneMatch,
    UriHost(String),
    UriPort(u16),
    UriPath(UriPath),
    UriQuery(UriQuery),
    LocationPath(UriPath),
    LocationQuery(UriQuery),
    ProxyUri(String),
    ProxyScheme(String),
    ContentFormat(ContentFormat),
    Accept(ContentFormat),
    Size1(Size),
    Size2(Size),
    Block1(Block),
    Block2(Block),
    HopLimit(u8),
    NoResponse(NoResponse),
    ETag(ETag),
    MaxAge(MaxAge),
    Observe(Observe),
    Echo(Echo),
    RequestTag(RequestTag),
    Other(CoapOptionNum, Box<[u8]>),
}

impl CoapOption {
    /// Creates a typed CoAP option from its option number and raw value.
    pub fn from_raw(number: CoapOptionNum, value: &[u8]) -> Result<CoapOption, OptionValueError> {
        let opt_type = match CoapOptionType::try_from(number) {
            Ok(opt_type) => opt_type,
            Err(_) => return Ok(CoapOption::Other(number, Box::from(value))),
        };
        if opt_type.min_len() > value.len() {
            return Err(OptionValueError::TooShort);
        } else if opt_type.max_len() < value.len() {
            return Err(OptionValueError::TooLong);
        }
        let string = || String::from_utf8(value.to_vec());
        Ok(match opt_type {
            CoapOptionType::IfMatch => CoapOption::IfMatch((!value.is_empty()).then(|| Box::from(value))),
            CoapOptionType::UriHost => CoapOption::UriHost(string()?),
            CoapOptionType::ETag => CoapOption::ETag(Box::from(value)),
            CoapOptionType::IfNoneMatch => CoapOption::IfNoneMatch,
            CoapOptionType::Observe => CoapOption::Observe(decode_var_len_u32(value)),
            CoapOptionType::UriPort => CoapOption::UriPort(decode_var_len_u16(value)),
            CoapOptionType::LocationPath => CoapOption::LocationPath(string()?),
            CoapOptionType::UriPath => CoapOption::UriPath(string()?),
            CoapOptionType::ContentFormat => CoapOption::ContentFormat(decode_var_len_u16(value)),
            CoapOptionType::MaxAge => CoapOption::MaxAge(decode_var_len_u32(value)),
            CoapOptionType::UriQuery => CoapOption::UriQuery(string()?),
            CoapOptionType::HopLimit => CoapOption::HopLimit(decode_var_len_u8(value)),
            CoapOptionType::Accept => CoapOption::Accept(decode_var_len_u16(value)),
            CoapOptionType::LocationQuery => CoapOption::LocationQuery(string()?),
            CoapOptionType::Block2 => CoapOption::Block2(decode_var_len_u32(value)),
            CoapOptionType::Block1 => CoapOption::Block1(decode_var_len_u32(value)),
            CoapOptionType::Size2 => CoapOption::Size2(decode_var_len_u32(value)),
            CoapOptionType::ProxyUri => CoapOption::ProxyUri(string()?),
            CoapOptionType::ProxyScheme => CoapOption::ProxyScheme(string()?),
            CoapOptionType::Size1 => CoapOption::Size1(decode_var_len_u32(value)),
            CoapOptionType::Echo => CoapOption::Echo(Box::from(value)),
            CoapOptionType::NoResponse => CoapOption::NoResponse(decode_var_len_u8(value)),
            CoapOptionType::RequestTag => CoapOption::RequestTag(Box::from(value)),
        })
    }

    /// Returns the option number associated with this option.
    pub fn number(&self) -> CoapOptionNum {
        let opt_type = match self {
            CoapOption::IfMatch(_) => CoapOptionType::IfMatch,
            CoapOption::IfNoneMatch => CoapOptionType::IfNoneMatch,
            CoapOption::UriHost(_) => CoapOptionType::UriHost,
            CoapOption::UriPort(_) => CoapOptionType::UriPort,
            CoapOption::UriPath(_) => CoapOptionType::UriPath,
            CoapOption::UriQuery(_) => CoapOptionType::UriQuery,
            CoapOption::LocationPath(_) => CoapOptionType::LocationPath,
            CoapOption::LocationQuery(_) => CoapOptionType::LocationQuery,
            CoapOption::ProxyUri(_) => CoapOptionType::ProxyUri,
            CoapOption::ProxyScheme(_) => CoapOptionType::ProxyScheme,
            CoapOption::ContentFormat(_) => CoapOptionType::ContentFormat,
            CoapOption::Accept(_) => CoapOptionType::Accept,
            CoapOption::Size1(_) => CoapOptionType::Size1,
            CoapOption::Size2(_) => CoapOptionType::Size2,
            CoapOption::Block1(_) => CoapOptionType::Block1,
            CoapOption::Block2(_) => CoapOptionType::Block2,
            CoapOption::HopLimit(_) => CoapOptionType::HopLimit,
            CoapOption::NoResponse(_) => CoapOptionType::NoResponse,
            CoapOption::ETag(_) => CoapOptionType::ETag,
            CoapOption::MaxAge(_) => CoapOptionType::MaxAge,
            CoapOption::Observe(_) => CoapOptionType::Observe,
            CoapOption::Echo(_) => CoapOptionType::Echo,
            CoapOption::RequestTag(_) => CoapOptionType::RequestTag,
            CoapOption::Other(num, _) => return *num,
        };
        opt_type.to_raw_option_num()
    }

    /// Converts the option into a `Box<[u8]>` containing the value bytes.
    pub fn into_value_bytes(self) -> Result<Box<[u8]>, OptionValueError> {
        let num = self.number();
        let bytes = match self {
            CoapOption::IfMatch(val) => val.unwrap_or_default(),
            CoapOption::IfNoneMatch => Box::new([]),
            CoapOption::UriHost(value)
            | CoapOption::UriPath(value)
            | CoapOption::UriQuery(value)
            | CoapOption::LocationPath(value)
            | CoapOption::LocationQuery(value)
            | CoapOption::ProxyUri(value)
            | CoapOption::ProxyScheme(value) => value.into_boxed_str().into_boxed_bytes(),
            CoapOption::UriPort(value) | CoapOption::ContentFormat(value) | CoapOption::Accept(value) => {
                encode_var_len_u16(value)
            },
            CoapOption::Size1(value)
            | CoapOption::Size2(value)
            | CoapOption::Block1(value)
            | CoapOption::Block2(value)
            | CoapOption::MaxAge(value)
            | CoapOption::Observe(value) => encode_var_len_u32(value),
            CoapOption::HopLimit(value) => Box::new([value]),
            CoapOption::NoResponse(value) => encode_var_len_u8(value),
            CoapOption::ETag(value) | CoapOption::Echo(value) | CoapOption::RequestTag(value) => value,
            CoapOption::Other(_num, data) => data,
        };
        if let Some(opt_type) = <CoapOptionType as FromPrimitive>::from_u16(num) {
            if bytes.len() < opt_type.min_len() {
                return Err(OptionValueError::TooShort);
            } else if bytes.len() > opt_type.max_len() {
                return Err(OptionValueError::TooLong);
            }
        }
        Ok(bytes)
    }
}

/// Interface for CoAP messages common between requests, responses and other messages.
pub trait CoapMessageCommon {
    /// Add the supplied CoAP option to this message.
    ///
    /// Non-repeatable options replace any previously added value.
    fn add_option(&mut self, option: CoapOption) -> Result<(), MessageConversionError> {
        let num = option.number();
        let value = option
            .into_value_bytes()
            .map_err(|e| MessageConversionError::InvalidOptionValue(CoapOptionType::try_from(num).ok(), e))?;
        let message = self.as_message_mut();
        match CoapOptionType::try_from(num) {
            Ok(opt_type) if !opt_type.is_repeatable() => message.set_option(num, value),
            _ => message.insert_option(num, value),
        }
        Ok(())
    }

    /// Clear the list of options of this message.
    fn clear_options(&mut self) {
        self.as_message_mut().options.clear();
    }

    /// Returns the CoAP message type (confirmable, non-confirmable, acknowledgement, rst) of this message.
    fn type_(&self) -> CoapMessageType {
        self.as_message().type_
    }

    /// Sets the CoAP message type (confirmable, non-confirmable, acknowledgement, rst) of this message.
    fn set_type_(&mut self, type_: CoapMessageType) {
        self.as_message_mut().type_ = type_;
    }

    /// Returns the message code of this message.
    fn code(&self) -> CoapMessageCode {
        self.as_message().code
    }

    /// Sets the message code of this message.
    fn set_code<C: Into<CoapMessageCode>>(&mut self, code: C) {
        self.as_message_mut().code = code.into();
    }

    /// Returns the CoAP message ID for this message.
    fn mid(&self) -> Option<CoapMessageId> {
        self.as_message().mid
    }

    /// Sets the CoAP message ID for this message.
    fn set_mid(&mut self, mid: Option<CoapMessageId>) {
        self.as_message_mut().mid = mid;
    }

    /// Returns a reference to the data/body of this message.
    fn data(&self) -> Option<&[u8]> {
        self.as_message().data.as_deref()
    }

    /// Sets the data/body of this message.
    fn set_data<D: Into<Box<[u8]>>>(&mut self, data: Option<D>) {
        let message = self.as_message_mut();
        message.data = data.map(Into::into);
        message.body_offset = 0;
        message.body_total = None;
    }

    /// Returns the message token.
    fn token(&self) -> Option<&[u8]> {
        self.as_message().token.as_deref()
    }

    /// Sets the message token.
    ///
    /// Note that [CoapContext::send_request()](crate::CoapContext::send_request()) will
    /// automatically set the token if you don't.
    fn set_token<D: Into<Box<[u8]>>>(&mut self, token: Option<D>) {
        self.as_message_mut().token = token.map(Into::into);
    }

    /// Returns a reference to this message.
    fn as_message(&self) -> &CoapMessage;
    /// Returns a mutable reference to this message.
    fn as_message_mut(&mut self) -> &mut CoapMessage;
}

/// Representation of a CoAP message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoapMessage {
    /// CoAP message type (CON, NON, ACK, RST).
    type_: CoapMessageType,
    /// CoAP message code (e.g. 2.05 Content or 4.04 Not Found)
    code: CoapMessageCode,
    /// ID of this message – unique to each message sent over this session.
    mid: Option<CoapMessageId>,
    /// Raw option values, ordered by option number (insertion order among equal numbers).
    options: Vec<(CoapOptionNum, Box<[u8]>)>,
    /// CoAP message token – used for request-response-matching.
    token: Option<Box<[u8]>>,
    /// Payload of this message.
    data: Option<Box<[u8]>>,
    /// Offset of `data` within the complete body.
    body_offset: usize,
    /// Announced or known total length of the body, if any.
    body_total: Option<usize>,
}

impl CoapMessage {
    /// Creates a new CoAP message with the given type and code.
    pub fn new<C: Into<CoapMessageCode>>(type_: CoapMessageType, code: C) -> CoapMessage {
        CoapMessage {
            type_,
            code: code.into(),
            mid: None,
            options: Vec::new(),
            token: None,
            data: None,
            body_offset: 0,
            body_total: None,
        }
    }

    /// Returns the first value of the option with the given number.
    pub fn option(&self, number: CoapOptionNum) -> Option<&[u8]> {
        self.options.iter().find(|(n, _)| *n == number).map(|(_, v)| v.as_ref())
    }

    /// Returns all values of the option with the given number, in message order.
    pub fn option_values(&self, number: CoapOptionNum) -> impl Iterator<Item = &[u8]> {
        self.options
            .iter()
            .filter(move |(n, _)| *n == number)
            .map(|(_, v)| v.as_ref())
    }

    /// Returns the option with the given type interpreted as an unsigned integer.
    pub fn option_uint(&self, opt_type: CoapOptionType) -> Option<u32> {
        self.option(opt_type.to_raw_option_num()).map(decode_var_len_u32)
    }

    pub fn has_option(&self, opt_type: CoapOptionType) -> bool {
        self.option(opt_type.to_raw_option_num()).is_some()
    }

    /// Inserts an option value after all options with a number lower than or equal to `number`.
    pub fn insert_option<V: Into<Box<[u8]>>>(&mut self, number: CoapOptionNum, value: V) {
        let pos = self.options.partition_point(|(n, _)| *n <= number);
        self.options.insert(pos, (number, value.into()));
    }

    /// Replaces all values of the option with the given number by `value`.
    pub fn set_option<V: Into<Box<[u8]>>>(&mut self, number: CoapOptionNum, value: V) {
        self.remove_option(number);
        self.insert_option(number, value);
    }

    /// Sets an option to the minimal encoding of the given unsigned integer.
    pub fn set_option_uint(&mut self, opt_type: CoapOptionType, value: u32) {
        self.set_option(opt_type.to_raw_option_num(), encode_var_len_u32(value));
    }

    /// Removes all values of the option with the given number, returning whether one was present.
    pub fn remove_option(&mut self, number: CoapOptionNum) -> bool {
        let len = self.options.len();
        self.options.retain(|(n, _)| *n != number);
        len != self.options.len()
    }

    /// Returns an iterator over the raw options of this message.
    pub fn raw_options(&self) -> impl Iterator<Item = (CoapOptionNum, &[u8])> {
        self.options.iter().map(|(n, v)| (*n, v.as_ref()))
    }

    /// Parses all options of this message into their typed representation.
    pub fn options(&self) -> Result<Vec<CoapOption>, MessageConversionError> {
        let mut options = Vec::with_capacity(self.options.len());
        let mut previous = None;
        for (num, value) in &self.options {
            let opt_type = CoapOptionType::try_from(*num).ok();
            if let Some(opt_type) = opt_type {
                if previous == Some(*num) && !opt_type.is_repeatable() {
                    return Err(MessageConversionError::NonRepeatableOptionRepeated(opt_type));
                }
            }
            previous = Some(*num);
            options.push(
                CoapOption::from_raw(*num, value)
                    .map_err(|e| MessageConversionError::InvalidOptionValue(opt_type, e))?,
            );
        }
        Ok(options)
    }

    /// Returns the request code if this message is a request.
    pub fn request_code(&self) -> Option<CoapRequestCode> {
        match self.code {
            CoapMessageCode::Request(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self.code, CoapMessageCode::Request(_))
    }

    pub fn is_response(&self) -> bool {
        matches!(self.code, CoapMessageCode::Response(_))
    }

    /// Returns the Uri-Path options joined by `/`.
    pub fn uri_path(&self) -> String {
        let segments: Vec<String> = self
            .option_values(CoapOptionType::UriPath.to_raw_option_num())
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        segments.join("/")
    }

    /// Returns the Uri-Query options joined by `&`, if there are any.
    pub fn uri_query(&self) -> Option<String> {
        let segments: Vec<String> = self
            .option_values(CoapOptionType::UriQuery.to_raw_option_num())
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .collect();
        (!segments.is_empty()).then(|| segments.join("&"))
    }

    pub fn etag(&self) -> Option<&[u8]> {
        self.option(CoapOptionType::ETag.to_raw_option_num())
    }

    pub fn echo(&self) -> Option<&[u8]> {
        self.option(CoapOptionType::Echo.to_raw_option_num())
    }

    pub fn request_tag(&self) -> Option<&[u8]> {
        self.option(CoapOptionType::RequestTag.to_raw_option_num())
    }

    pub fn content_format(&self) -> Option<ContentFormat> {
        self.option(CoapOptionType::ContentFormat.to_raw_option_num())
            .map(decode_var_len_u16)
    }

    pub fn observe(&self) -> Option<Observe> {
        self.option_uint(CoapOptionType::Observe)
    }

    /// Returns the offset of this message's payload within the complete body.
    pub fn body_offset(&self) -> usize {
        self.body_offset
    }

    /// Returns the total length of the body this message's payload is part of.
    ///
    /// For messages that are not part of a block-wise transfer, this is the payload length.
    pub fn body_total(&self) -> usize {
        self.body_total
            .unwrap_or_else(|| self.data.as_ref().map(|d| d.len()).unwrap_or(0))
    }

    /// Sets the payload together with its position within a larger body.
    pub fn set_body_part<D: Into<Box<[u8]>>>(&mut self, data: Option<D>, offset: usize, total: usize) {
        self.data = data.map(Into::into);
        self.body_offset = offset;
        self.body_total = Some(total);
    }

    /// Takes the payload out of this message.
    pub fn take_data(&mut self) -> Option<Box<[u8]>> {
        self.body_offset = 0;
        self.body_total = None;
        self.data.take()
    }

    /// Creates a copy of this message without payload and message ID, using `token` as the new
    /// token and leaving out all options whose number is contained in `drop_options`.
    pub fn duplicate(&self, token: Option<&[u8]>, drop_options: &[CoapOptionNum]) -> CoapMessage {
        CoapMessage {
            type_: self.type_,
            code: self.code,
            mid: None,
            options: self
                .options
                .iter()
                .filter(|(n, _)| !drop_options.contains(n))
                .cloned()
                .collect(),
            token: token.map(Box::from).or_else(|| self.token.clone()),
            data: None,
            body_offset: 0,
            body_total: None,
        }
    }

    /// Returns the encoded size of all options of this message.
    pub fn options_size(&self) -> usize {
        let mut previous = 0;
        self.options
            .iter()
            .map(|(num, value)| {
                let delta = (*num - previous) as usize;
                previous = *num;
                1 + option_ext_size(delta) + option_ext_size(value.len()) + value.len()
            })
            .sum()
    }

    /// Returns the size of options, payload marker and payload.
    fn body_size(&self) -> usize {
        let payload = self.data.as_ref().map(|d| d.len()).unwrap_or(0);
        self.options_size() + if payload > 0 { payload + 1 } else { 0 }
    }

    /// Returns the header size (excluding the token) of this message for the given transport.
    pub fn header_size(&self, proto: CoapProtocol) -> usize {
        header_size_for(proto, self.body_size())
    }

    /// Returns the size of this message once encoded for the given transport.
    pub fn encoded_size(&self, proto: CoapProtocol) -> usize {
        let token_len = self.token.as_ref().map(|t| t.len()).unwrap_or(0);
        self.header_size(proto) + token_len + self.body_size()
    }

    /// Returns the encoded size this message would have with a payload of `payload_len` bytes
    /// instead of its current one.
    pub fn encoded_size_with_payload(&self, proto: CoapProtocol, payload_len: usize) -> usize {
        let token_len = self.token.as_ref().map(|t| t.len()).unwrap_or(0);
        let body_size = self.options_size() + if payload_len > 0 { payload_len + 1 } else { 0 };
        header_size_for(proto, body_size) + token_len + body_size
    }

    /// Checks the invariants a message has to fulfill before it can be handed to a transport.
    pub fn validate(&self) -> Result<(), MessageConversionError> {
        if self.token.as_ref().map(|t| t.len()).unwrap_or(0) > COAP_MAX_TOKEN_LENGTH {
            return Err(MessageConversionError::TokenTooLong);
        }
        if self.code == CoapMessageCode::Empty && (self.data.is_some() || !self.options.is_empty()) {
            return Err(MessageConversionError::DataInEmptyMessage);
        }
        // Signaling options have their own number space.
        if matches!(self.code, CoapMessageCode::Signaling(_)) {
            return Ok(());
        }
        self.options().map(|_| ())
    }
}

impl CoapMessageCommon for CoapMessage {
    fn as_message(&self) -> &CoapMessage {
        self
    }

    fn as_message_mut(&mut self) -> &mut CoapMessage {
        self
    }
}

/// Returns the number of extension bytes needed to encode an option delta or length.
fn option_ext_size(value: usize) -> usize {
    match value {
        0..=12 => 0,
        13..=268 => 1,
        _ => 2,
    }
}

/// Returns the header size (without token) for a message with the given size of options and
/// payload.
pub(crate) fn header_size_for(proto: CoapProtocol, body_size: usize) -> usize {
    match proto {
        CoapProtocol::Udp | CoapProtocol::Dtls => 4,
        CoapProtocol::Ws | CoapProtocol::Wss => 2,
        CoapProtocol::Tcp | CoapProtocol::Tls => match body_size {
            0..=12 => 2,
            13..=268 => 3,
            269..=65804 => 4,
            _ => 6,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(opt_type: CoapOptionType) -> CoapOptionNum {
        opt_type.to_raw_option_num()
    }

    #[test]
    fn options_are_ordered_by_number() {
        let mut message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Get);
        message.set_option_uint(CoapOptionType::Size1, 60);
        message.insert_option(num(CoapOptionType::UriPath), "a".as_bytes());
        message.insert_option(num(CoapOptionType::ETag), vec![0x01]);
        message.insert_option(num(CoapOptionType::UriPath), "b".as_bytes());

        let numbers: Vec<_> = message.raw_options().map(|(n, _)| n).collect();
        assert_eq!(
            numbers,
            vec![
                num(CoapOptionType::ETag),
                num(CoapOptionType::UriPath),
                num(CoapOptionType::UriPath),
                num(CoapOptionType::Size1)
            ]
        );
        assert_eq!(message.uri_path(), "a/b");
        assert!(message.remove_option(num(CoapOptionType::UriPath)));
        assert!(!message.remove_option(num(CoapOptionType::UriPath)));
    }

    #[test]
    fn duplicate_replaces_token_and_drops_options() {
        let mut message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Put);
        message.set_mid(Some(5));
        message.set_token(Some(vec![0x01]));
        message.insert_option(num(CoapOptionType::UriPath), "r".as_bytes());
        message.set_option_uint(CoapOptionType::Block1, 0x0A);
        message.set_data(Some(vec![0u8; 10]));

        let copy = message.duplicate(Some([0x09u8, 0x09].as_slice()), &[num(CoapOptionType::Block1)]);
        assert_eq!(copy.mid(), None);
        assert_eq!(copy.token(), Some([0x09u8, 0x09].as_slice()));
        assert_eq!(copy.data(), None);
        assert!(copy.has_option(CoapOptionType::UriPath));
        assert!(!copy.has_option(CoapOptionType::Block1));

        let same_token = message.duplicate(None, &[]);
        assert_eq!(same_token.token(), Some([0x01u8].as_slice()));
    }

    #[test]
    fn encoded_size_depends_on_transport() {
        let mut message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Put);
        message.set_token(Some(vec![0x01, 0x02]));
        message.insert_option(num(CoapOptionType::UriPath), "r".as_bytes());
        message.set_data(Some(vec![0u8; 10]));

        // Uri-Path takes 2 bytes, the payload marker and payload 11.
        assert_eq!(message.options_size(), 2);
        assert_eq!(message.encoded_size(CoapProtocol::Udp), 4 + 2 + 13);
        assert_eq!(message.encoded_size(CoapProtocol::Tcp), 3 + 2 + 13);
        assert_eq!(message.encoded_size_with_payload(CoapProtocol::Udp, 0), 4 + 2 + 2);
    }

    #[test]
    fn overlong_token_is_invalid() {
        let mut message = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Get);
        message.set_token(Some(vec![0u8; COAP_MAX_TOKEN_LENGTH + 1]));
        assert_eq!(message.validate(), Err(MessageConversionError::TokenTooLong));
    }
}
