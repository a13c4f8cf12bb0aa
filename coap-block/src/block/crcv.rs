// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/crcv.rs - Receiving large response bodies.
 */

use log::{debug, info, warn};

use crate::{
    block::{check_block_range, szx_to_size, BlockIo, BodyBuffer, CoapBlock, RangeSet, StateToken},
    config::CoapBlockMode,
    error::BlockError,
    message::{CoapMessage, CoapMessageCommon},
    protocol::{
        CoapMessageCode, CoapOptionType, CoapResponseCode, CoapToken, ContentFormat, ETag, Observe,
        COAP_OBSERVE_CANCEL,
    },
    session::CoapSession,
    types::CoapTick,
};

/// State of a response body that is received block by block.
#[derive(Debug)]
pub(crate) struct LgCrcv {
    /// Token of the application's request, used for everything handed to the application.
    pub(crate) app_token: CoapToken,
    /// Token used for the requests for further blocks.
    pub(crate) state: StateToken,
    /// Token of the response that established an observation, used to cancel it.
    pub(crate) obs_token: Option<CoapToken>,
    /// The application's request, used as template for requests for further blocks.
    pub(crate) skeleton: CoapMessage,
    pub(crate) observe: Option<Observe>,
    pub(crate) observe_set: bool,
    pub(crate) etag: Option<ETag>,
    pub(crate) content_format: Option<ContentFormat>,
    pub(crate) szx: u8,
    pub(crate) bert: bool,
    pub(crate) total_len: Option<usize>,
    pub(crate) last_num: Option<u32>,
    pub(crate) ranges: RangeSet,
    pub(crate) body: BodyBuffer,
    /// Waiting for block 0 of a (new) representation.
    pub(crate) initial: bool,
    pub(crate) single_body: bool,
    pub(crate) last_used: CoapTick,
}

/// Result of feeding a response into a [LgCrcv].
enum CrcvStep {
    /// The record stays alive. The message, if any, is delivered to the application.
    Keep(Option<CoapMessage>),
    /// The record is finished.
    Done(Option<CoapMessage>),
}

impl LgCrcv {
    fn reset(&mut self) {
        self.ranges.clear();
        self.body.clear();
        self.last_num = None;
        self.total_len = None;
        self.initial = true;
    }
}

impl CoapSession {
    fn find_crcv(&self, token: &[u8]) -> Option<u64> {
        if let Some(state) = StateToken::from_bytes(token) {
            if self.lg_crcv.contains_key(&state.base()) {
                return Some(state.base());
            }
        }
        self.lg_crcv.iter().find_map(|(base, crcv)| {
            (crcv.app_token.as_ref() == token || crcv.obs_token.as_deref() == Some(token)).then_some(*base)
        })
    }

    /// Creates the record for a response body that has to be fetched block by block, if the
    /// response calls for one.
    fn lg_crcv_create(
        &mut self,
        io: &BlockIo,
        pdu: &CoapMessage,
        relink: Option<&(u64, CoapToken)>,
    ) -> Option<(u64, LgCrcv)> {
        let token: CoapToken = pdu.token().map(Box::from).unwrap_or_default();
        let pending = self.pending_requests.get(&token)?;
        let bert = self.bert_in_force();
        let preset = CoapBlock::from_message(&pending.request, CoapOptionType::Block2, bert).unwrap_or_default();
        if preset.defined && preset.num != 0 {
            // The application asked for a specific block.
            return None;
        }
        let block2 = CoapBlock::from_message(pdu, CoapOptionType::Block2, bert).unwrap_or_default();
        let echo = pdu.code() == CoapMessageCode::from(CoapResponseCode::Unauthorized) && pdu.echo().is_some();
        let observed = relink.is_some() && pdu.observe().is_some();
        if !(block2.defined && block2.m) && !echo && !observed {
            return None;
        }
        let skeleton = pending.request.clone();
        let observe_set = pending.observe;
        let (base, obs_token) = match relink {
            Some((base, wire_token)) => (*base, pdu.observe().map(|_| wire_token.clone())),
            None => (self.new_token_base(), pdu.observe().map(|_| token.clone())),
        };
        debug!("session {}: receiving response body for token {:02x?}", self.id(), token);
        Some((
            base,
            LgCrcv {
                app_token: token,
                state: StateToken::new(base, 0),
                obs_token,
                skeleton,
                observe: None,
                observe_set,
                etag: None,
                content_format: None,
                szx: if preset.defined { preset.szx } else { block2.szx },
                bert: block2.bert,
                total_len: None,
                last_num: None,
                ranges: RangeSet::new(),
                body: BodyBuffer::new(),
                initial: true,
                single_body: self.block_mode(CoapBlockMode::SINGLE_BODY),
                last_used: io.now,
            },
        ))
    }

    /// Feeds a response into the matching response body (creating one if needed).
    ///
    /// Returns the message that has to be delivered to the application, if any.
    pub(crate) fn lg_crcv_handle_response(
        &mut self,
        io: &mut BlockIo,
        mut pdu: CoapMessage,
        relink: Option<(u64, CoapToken)>,
    ) -> Option<CoapMessage> {
        let token: CoapToken = pdu.token().map(Box::from).unwrap_or_default();
        let existing = self
            .find_crcv(&token)
            .or_else(|| relink.as_ref().map(|(base, _)| *base).filter(|base| self.lg_crcv.contains_key(base)))
            .and_then(|base| self.lg_crcv.remove(&base).map(|crcv| (base, crcv)));
        let (base, mut crcv) = match existing {
            Some(record) => record,
            None => match self.lg_crcv_create(io, &pdu, relink.as_ref()) {
                Some(record) => record,
                None => {
                    // Either not block-wise or a block the application asked for itself.
                    if let Ok(block2) = CoapBlock::from_message(&pdu, CoapOptionType::Block2, self.bert_in_force()) {
                        if block2.defined {
                            let data = pdu.take_data();
                            let total = pdu
                                .option_uint(CoapOptionType::Size2)
                                .map(|size| size as usize)
                                .unwrap_or(block2.offset() + data.as_ref().map(|d| d.len()).unwrap_or(0));
                            pdu.set_body_part(data, block2.offset(), total);
                        }
                    }
                    return Some(pdu);
                },
            },
        };
        match self.lg_crcv_advance(io, &mut crcv, pdu) {
            CrcvStep::Keep(delivery) => {
                self.lg_crcv.insert(base, crcv);
                delivery
            },
            CrcvStep::Done(delivery) => delivery,
        }
    }

    fn lg_crcv_advance(&mut self, io: &mut BlockIo, crcv: &mut LgCrcv, mut pdu: CoapMessage) -> CrcvStep {
        crcv.last_used = io.now;
        let wire_token: CoapToken = pdu.token().map(Box::from).unwrap_or_default();

        if pdu.code() == CoapMessageCode::from(CoapResponseCode::Unauthorized) {
            if let Some(echo) = pdu.echo().map(Box::<[u8]>::from) {
                crcv.skeleton.set_option(CoapOptionType::Echo.to_raw_option_num(), echo);
                let num = if crcv.initial { 0 } else { crcv.ranges.first_missing() };
                debug!("session {}: repeating request for block {} with Echo", self.id(), num);
                return match self.lg_crcv_request_block(io, crcv, num) {
                    Ok(()) => CrcvStep::Keep(None),
                    Err(_) => CrcvStep::Done(None),
                };
            }
        }
        pdu.set_token(Some(crcv.app_token.clone()));
        if !pdu.code().is_success() {
            debug!("session {}: response body request failed with {:?}", self.id(), pdu.code());
            return CrcvStep::Done(Some(pdu));
        }
        let block2 = match CoapBlock::from_message(&pdu, CoapOptionType::Block2, self.bert_in_force()) {
            Ok(block2) => block2,
            Err(e) => {
                warn!("session {}: invalid Block2 option in response: {}", self.id(), e);
                return CrcvStep::Done(Some(pdu));
            },
        };
        if !block2.defined {
            return if crcv.observe_set && pdu.observe().is_some() {
                crcv.reset();
                CrcvStep::Keep(Some(pdu))
            } else {
                CrcvStep::Done(Some(pdu))
            };
        }

        if crcv.initial {
            if block2.num != 0 {
                debug!("session {}: ignoring block {} of an unknown body", self.id(), block2.num);
                return CrcvStep::Keep(None);
            }
            crcv.etag = pdu.etag().map(Box::from);
            crcv.total_len = pdu.option_uint(CoapOptionType::Size2).map(|size| size as usize);
            crcv.content_format = pdu.content_format();
            crcv.szx = block2.szx;
            crcv.bert = block2.bert;
            crcv.ranges.clear();
            crcv.body = BodyBuffer::with_hint(crcv.total_len.unwrap_or(0));
            crcv.last_num = None;
            if let Some(observe) = pdu.observe() {
                crcv.observe = Some(observe);
                if crcv.obs_token.is_none() {
                    crcv.obs_token = Some(wire_token);
                }
            }
            crcv.initial = false;
        } else {
            if crcv.etag.is_some() && pdu.etag() != crcv.etag.as_deref() {
                warn!(
                    "session {}: {}, restarting",
                    self.id(),
                    BlockError::EtagChanged
                );
                crcv.reset();
                crcv.etag = None;
                io.events.handle_partial_block(self, &crcv.app_token);
                return match self.lg_crcv_request_block(io, crcv, 0) {
                    Ok(()) => CrcvStep::Keep(None),
                    Err(_) => CrcvStep::Done(None),
                };
            }
            if crcv.single_body && pdu.content_format() != crcv.content_format {
                debug!(
                    "session {}: {}, delivering blocks individually",
                    self.id(),
                    BlockError::ContentFormatChange
                );
                crcv.single_body = false;
            }
        }

        if !block2.bert && block2.szx < crcv.szx {
            crcv.ranges.rescale_down(crcv.szx - block2.szx);
            crcv.szx = block2.szx;
        }
        let unit = szx_to_size(crcv.szx);
        let offset = block2.offset();
        let payload_len = pdu.data().map(|d| d.len()).unwrap_or(0);
        let first = (offset / unit) as u32;
        let last = if payload_len > unit {
            ((offset + payload_len - 1) / unit) as u32
        } else {
            first
        };
        if let Err(e) = check_block_range(last, unit, crcv.total_len) {
            warn!(
                "session {}: abandoning response body, block {} lies beyond {:?} bytes: {}",
                self.id(),
                block2.num,
                crcv.total_len,
                e
            );
            io.events.handle_partial_block(self, &crcv.app_token);
            return CrcvStep::Done(None);
        }
        if !block2.m {
            crcv.last_num = Some(last);
        }
        match crcv.ranges.insert_range(first, last) {
            Ok(true) => {},
            Ok(false) => {
                debug!("session {}: ignoring duplicate block {}", self.id(), block2.num);
                return CrcvStep::Keep(None);
            },
            Err(e) => {
                warn!("session {}: abandoning response body: {}", self.id(), e);
                io.events.handle_partial_block(self, &crcv.app_token);
                return CrcvStep::Done(None);
            },
        }
        let total = crcv.total_len.unwrap_or(0);
        if crcv.single_body {
            if let Some(data) = pdu.data() {
                crcv.body.deposit(offset, data, total);
            }
        }
        let complete = crcv
            .last_num
            .map(|last| crcv.ranges.complete_through(last))
            .unwrap_or(false);

        let delivery = if crcv.single_body {
            None
        } else {
            let mut part = pdu.clone();
            let data = part.take_data();
            let total = total.max(offset + payload_len);
            part.set_body_part(data, offset, total);
            Some(part)
        };
        if !complete {
            let next = crcv.ranges.first_missing();
            return match self.lg_crcv_request_block(io, crcv, next) {
                Ok(()) => CrcvStep::Keep(delivery),
                Err(_) => CrcvStep::Done(delivery),
            };
        }

        let delivery = if crcv.single_body {
            let body = crcv.body.take();
            info!("session {}: received response body of {} bytes", self.id(), body.len());
            let mut response = pdu;
            response.remove_option(CoapOptionType::Block2.to_raw_option_num());
            if let Some(observe) = crcv.observe {
                response.set_option_uint(CoapOptionType::Observe, observe);
            }
            let total = body.len();
            response.set_body_part(Some(body), 0, total);
            Some(response)
        } else {
            delivery
        };
        if crcv.observe_set {
            crcv.reset();
            crcv.single_body = self.block_mode(CoapBlockMode::SINGLE_BODY);
            CrcvStep::Keep(delivery)
        } else {
            CrcvStep::Done(delivery)
        }
    }

    /// Requests block `num` of the response body.
    fn lg_crcv_request_block(&mut self, io: &mut BlockIo, crcv: &mut LgCrcv, num: u32) -> Result<(), BlockError> {
        crcv.state = crcv.state.next();
        let mut request = crcv.skeleton.duplicate(
            Some(&crcv.state.to_bytes()),
            &[
                CoapOptionType::Observe.to_raw_option_num(),
                CoapOptionType::Block2.to_raw_option_num(),
            ],
        );
        if let Some(data) = crcv.skeleton.data() {
            request.set_data(Some(data));
        }
        let block = match crcv.bert {
            true => CoapBlock::new_bert(num, false, crate::block::COAP_BERT_BLOCK_SIZE)?,
            false => CoapBlock::new(num, false, crcv.szx)?,
        };
        block.write_to(&mut request, CoapOptionType::Block2);
        self.send_pdu(io, request).map(|_| ())
    }

    /// Cancels the observation established by the request with the given token.
    pub(crate) fn cancel_observe(&mut self, io: &mut BlockIo, app_token: &[u8]) -> Result<(), BlockError> {
        let base = self
            .lg_crcv
            .iter()
            .find_map(|(base, crcv)| (crcv.app_token.as_ref() == app_token).then_some(*base));
        let request = match base.and_then(|base| self.lg_crcv.get_mut(&base)) {
            Some(crcv) => {
                crcv.observe_set = false;
                let token = crcv.obs_token.clone().unwrap_or_else(|| crcv.app_token.clone());
                let mut request = crcv
                    .skeleton
                    .duplicate(Some(&token), &[CoapOptionType::Block2.to_raw_option_num()]);
                if let Some(data) = crcv.skeleton.data() {
                    request.set_data(Some(data));
                }
                request
            },
            None => {
                let pending = self.pending_requests.get_mut(app_token).ok_or(BlockError::NoSuchRequest)?;
                pending.observe = false;
                let mut request = pending.request.duplicate(None, &[]);
                if let Some(data) = pending.request.data() {
                    request.set_data(Some(data));
                }
                request
            },
        };
        let mut request = request;
        request.set_option_uint(CoapOptionType::Observe, COAP_OBSERVE_CANCEL);
        info!("session {}: cancelling observation for token {:02x?}", self.id(), app_token);
        self.send_pdu(io, request).map(|_| ())
    }
}
