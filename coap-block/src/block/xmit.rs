// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/xmit.rs - Sending large bodies.
 */

use log::{debug, info, warn};
use rand::Rng;

use crate::{
    block::{BlockIo, CoapBlock, CoapLargeData, StateToken, COAP_BERT_BLOCK_SIZE},
    error::BlockError,
    message::{header_size_for, CoapMessage, CoapMessageCommon},
    protocol::{
        CoapMessageCode, CoapOptionType, CoapRequestCode, CoapResponseCode, CoapToken, ETag, COAP_MAX_TOKEN_LENGTH,
    },
    resource::CoapResourceHandle,
    session::CoapSession,
    types::{CoapMessageId, CoapTick, COAP_TICKS_PER_SECOND},
};

/// Time a response body is kept after its last block was sent, so that late requests for
/// blocks can still be answered.
pub(crate) const LG_XMIT_RETAIN: CoapTick = 8 * COAP_TICKS_PER_SECOND;

const COAP_ETAG_LENGTH: usize = 8;
/// Smallest amount of payload space for which a block-wise transfer is possible.
const COAP_MIN_BLOCK_SPACE: usize = 16;

#[derive(Debug)]
pub(crate) enum LgXmitKind {
    /// Request body sent with Block1.
    Request { app_token: CoapToken, state: StateToken },
    /// Response body sent with Block2.
    Response {
        resource: CoapResourceHandle,
        query: Option<String>,
        method: CoapRequestCode,
        etag: ETag,
        maxage_expire: Option<CoapTick>,
    },
}

/// State of a large body that is being sent.
#[derive(Debug)]
pub(crate) struct LgXmit {
    pub(crate) kind: LgXmitKind,
    /// Block1 or Block2.
    pub(crate) option: CoapOptionType,
    /// Block size in force. `chunk_size` is the number of bytes sent per message.
    pub(crate) block: CoapBlock,
    pub(crate) data: CoapLargeData,
    /// Offset of the block last sent (or, after an acknowledgement, of the next one).
    pub(crate) offset: usize,
    pub(crate) current_block: u32,
    /// Last block acknowledged by the peer.
    pub(crate) last_block: Option<u32>,
    /// Message all blocks are derived from, without payload and block option.
    pub(crate) skeleton: CoapMessage,
    pub(crate) last_bert_size: usize,
    pub(crate) last_mid: Option<CoapMessageId>,
    pub(crate) last_sent: CoapTick,
    pub(crate) last_all_sent: Option<CoapTick>,
}

/// What became of a response after it was matched against the large sends of a session.
#[derive(Debug)]
pub(crate) enum XmitOutcome {
    /// The response does not belong to a large send.
    Unmatched(CoapMessage),
    /// The response was consumed by a large send that is still in progress.
    Handled,
    /// The large send is finished, `response` (carrying the application's token) is the final
    /// response to it.
    Completed {
        response: CoapMessage,
        base: u64,
        wire_token: CoapToken,
    },
}

impl LgXmit {
    pub(crate) fn app_token(&self) -> &[u8] {
        match &self.kind {
            LgXmitKind::Request { app_token, .. } => app_token,
            LgXmitKind::Response { .. } => self.skeleton.token().unwrap_or_default(),
        }
    }

    pub(crate) fn is_response(&self) -> bool {
        matches!(self.kind, LgXmitKind::Response { .. })
    }

    fn size_option(&self) -> CoapOptionType {
        size_option_for(self.option)
    }

    /// Builds the message carrying block `num`. Also returns whether more blocks follow.
    fn build_block(&self, num: u32) -> Result<(CoapMessage, bool), BlockError> {
        let offset = num as usize * self.block.block_size();
        let total = self.data.len();
        if offset > total || (offset == total && total != 0) {
            return Err(BlockError::IllegalBlock);
        }
        let payload = self.data.chunk(offset, self.block.chunk_size);
        let more = offset + payload.len() < total;
        let block = if self.block.bert {
            let units = (payload.len() + COAP_BERT_BLOCK_SIZE - 1) / COAP_BERT_BLOCK_SIZE;
            CoapBlock::new_bert(num, more, units.max(1) * COAP_BERT_BLOCK_SIZE)?
        } else {
            CoapBlock::new(num, more, self.block.szx)?
        };
        let mut pdu = self.skeleton.duplicate(None, &[]);
        block.write_to(&mut pdu, self.option);
        if num != 0 {
            pdu.remove_option(self.size_option().to_raw_option_num());
            pdu.remove_option(CoapOptionType::Observe.to_raw_option_num());
        }
        if !payload.is_empty() {
            pdu.set_body_part(Some(payload.to_vec()), offset, total);
        }
        Ok((pdu, more))
    }
}

fn size_option_for(option: CoapOptionType) -> CoapOptionType {
    match option {
        CoapOptionType::Block1 => CoapOptionType::Size1,
        _ => CoapOptionType::Size2,
    }
}

impl CoapSession {
    /// Determines the block size for sending a body with the given message.
    ///
    /// The size is the largest power of two (or multiple of 1024 for BERT) that fits into the
    /// session's maximum PDU size together with the message's options, a maximum length token
    /// and the block, size and Request-Tag/ETag options. A block size preset by the
    /// application or requested by the peer is never exceeded.
    pub(crate) fn lg_xmit_block_params(
        &self,
        skeleton: &CoapMessage,
        option: CoapOptionType,
        preset: &CoapBlock,
    ) -> Result<CoapBlock, BlockError> {
        let mut probe = skeleton.duplicate(None, &[]);
        probe.set_option(option.to_raw_option_num(), vec![0u8; 3]);
        probe.set_option(size_option_for(option).to_raw_option_num(), vec![0u8; 4]);
        let tag_option = match option {
            CoapOptionType::Block1 => CoapOptionType::RequestTag,
            _ => CoapOptionType::ETag,
        };
        if !probe.has_option(tag_option) {
            probe.set_option(tag_option.to_raw_option_num(), vec![0u8; COAP_ETAG_LENGTH]);
        }
        let max_pdu = self.max_pdu_size();
        let overhead = header_size_for(self.proto(), max_pdu) + COAP_MAX_TOKEN_LENGTH + probe.options_size() + 1;
        let avail = max_pdu
            .checked_sub(overhead)
            .filter(|avail| *avail >= COAP_MIN_BLOCK_SPACE)
            .ok_or(BlockError::TooSmallForBlock)?;

        // floor(log2(avail)) - 4
        let fitting_szx = (usize::BITS - 1 - avail.leading_zeros()) as u8 - 4;
        let wanted_szx = if preset.defined { preset.aszx } else { 7 };
        let szx = fitting_szx.min(wanted_szx);
        if szx < 7 {
            return CoapBlock::new(0, false, szx);
        }
        let bert_chunk = (avail / COAP_BERT_BLOCK_SIZE) * COAP_BERT_BLOCK_SIZE;
        if self.bert_in_force() && bert_chunk > 0 {
            CoapBlock::new_bert(0, false, bert_chunk)
        } else {
            CoapBlock::new(0, false, 6)
        }
    }

    /// Sends block `num` of a large body.
    ///
    /// For responses, `reply` supplies message type, message ID and token (e.g. to piggyback
    /// the block on the acknowledgement of the request). Request blocks after the first are sent
    /// with a new state token.
    fn lg_xmit_send_block(
        &mut self,
        io: &mut BlockIo,
        xmit: &mut LgXmit,
        num: u32,
        reply: Option<&CoapMessage>,
    ) -> Result<CoapMessageId, BlockError> {
        let (mut pdu, more) = xmit.build_block(num)?;
        match (&mut xmit.kind, reply) {
            (_, Some(reply)) => {
                pdu.set_type_(reply.type_());
                pdu.set_mid(reply.mid());
                pdu.set_token(reply.token().map(Box::<[u8]>::from));
            },
            (LgXmitKind::Request { app_token, state }, None) => {
                if num == 0 && xmit.last_mid.is_none() {
                    pdu.set_token(Some(app_token.clone()));
                } else {
                    *state = state.next();
                    pdu.set_token(Some(state.to_bytes()));
                }
            },
            (LgXmitKind::Response { .. }, None) => {},
        }
        let payload_len = pdu.data().map(|d| d.len()).unwrap_or(0);
        let mid = self.send_pdu(io, pdu)?;
        xmit.current_block = num;
        xmit.offset = num as usize * xmit.block.block_size();
        xmit.last_bert_size = payload_len;
        xmit.last_mid = Some(mid);
        xmit.last_sent = io.now;
        if !more && xmit.is_response() {
            xmit.last_all_sent = Some(io.now);
        }
        Ok(mid)
    }

    /// Destroys a large send that cannot be completed and notifies the application.
    pub(crate) fn lg_xmit_failed(&mut self, io: &mut BlockIo, xmit: LgXmit) {
        let token: CoapToken = xmit.app_token().into();
        warn!(
            "session {}: large send for token {:02x?} failed at block {}",
            self.id(),
            token,
            xmit.current_block
        );
        drop(xmit);
        io.events.handle_xmit_block_fail(self, &token);
    }

    /// Destroys the large send (if any) whose last message was not delivered.
    pub(crate) fn lg_xmit_fail_mid(&mut self, io: &mut BlockIo, mid: CoapMessageId) {
        let base = self
            .lg_xmit
            .iter()
            .find(|(_, xmit)| xmit.last_mid == Some(mid) && !xmit.is_response())
            .map(|(base, _)| *base);
        if let Some(xmit) = base.and_then(|base| self.lg_xmit.remove(&base)) {
            self.lg_xmit_failed(io, xmit);
        }
    }

    /// Finds the request body a response belongs to. A match on the state token of a
    /// continuation block takes precedence over a match on the application's token.
    fn find_request_xmit(&self, token: &[u8]) -> Option<u64> {
        let by_state_token = StateToken::from_bytes(token).map(|state| state.base()).filter(|base| {
            matches!(
                self.lg_xmit.get(base).map(|xmit| &xmit.kind),
                Some(LgXmitKind::Request { .. })
            )
        });
        by_state_token.or_else(|| self.find_request_xmit_by_app_token(token))
    }

    fn find_request_xmit_by_app_token(&self, token: &[u8]) -> Option<u64> {
        self.lg_xmit.iter().find_map(|(base, xmit)| match &xmit.kind {
            LgXmitKind::Request { app_token, .. } if app_token.as_ref() == token => Some(*base),
            _ => None,
        })
    }

    fn find_response_xmit(
        &self,
        resource: CoapResourceHandle,
        query: Option<&str>,
        method: CoapRequestCode,
    ) -> Option<u64> {
        self.lg_xmit.iter().find_map(|(base, xmit)| match &xmit.kind {
            LgXmitKind::Response {
                resource: r,
                query: q,
                method: m,
                ..
            } if *r == resource && q.as_deref() == query && *m == method => Some(*base),
            _ => None,
        })
    }

    /// Sends a request body, splitting it into Block1 blocks if it does not fit into a single
    /// message.
    pub(crate) fn lg_xmit_send_request(
        &mut self,
        io: &mut BlockIo,
        mut request: CoapMessage,
        data: Option<CoapLargeData>,
    ) -> Result<CoapMessageId, BlockError> {
        let Some(data) = data else {
            return self.send_pdu(io, request);
        };
        let preset = CoapBlock::from_message(&request, CoapOptionType::Block1, self.bert_in_force())?;
        if !preset.defined && request.encoded_size_with_payload(self.proto(), data.len()) <= self.max_pdu_size() {
            request.set_data(Some(data.to_vec()));
            return self.send_pdu(io, request);
        }

        let app_token: CoapToken = request.token().map(Box::from).unwrap_or_default();
        if let Some(old) = self
            .find_request_xmit_by_app_token(&app_token)
            .and_then(|base| self.lg_xmit.remove(&base))
        {
            debug!("session {}: new request body replaces running transfer", self.id());
            self.lg_xmit_failed(io, old);
        }

        let mut skeleton = request.duplicate(None, &[CoapOptionType::Block1.to_raw_option_num()]);
        skeleton.set_option_uint(CoapOptionType::Size1, data.len() as u32);
        let request_tag = self.new_request_tag();
        skeleton.set_option(CoapOptionType::RequestTag.to_raw_option_num(), request_tag);
        let block = match self.lg_xmit_block_params(&skeleton, CoapOptionType::Block1, &preset) {
            Ok(block) => block,
            Err(e) => {
                warn!("session {}: unable to send request body: {}", self.id(), e);
                drop(data);
                io.events.handle_xmit_block_fail(self, &app_token);
                return Err(e);
            },
        };

        if preset.defined && data.len() <= block.chunk_size {
            // The whole body fits into block 0.
            let single = match block.bert {
                true => CoapBlock::new_bert(0, false, block.chunk_size)?,
                false => CoapBlock::new(0, false, block.szx)?,
            };
            single.write_to(&mut request, CoapOptionType::Block1);
            request.set_data(Some(data.to_vec()));
            return self.send_pdu(io, request);
        }

        let base = self.new_token_base();
        info!(
            "session {}: sending request body of {} bytes in blocks of {} bytes",
            self.id(),
            data.len(),
            block.chunk_size
        );
        let mut xmit = LgXmit {
            kind: LgXmitKind::Request {
                app_token,
                state: StateToken::new(base, 0),
            },
            option: CoapOptionType::Block1,
            block,
            data,
            offset: 0,
            current_block: 0,
            last_block: None,
            skeleton,
            last_bert_size: 0,
            last_mid: None,
            last_sent: io.now,
            last_all_sent: None,
        };
        match self.lg_xmit_send_block(io, &mut xmit, 0, None) {
            Ok(mid) => {
                self.lg_xmit.insert(base, xmit);
                Ok(mid)
            },
            Err(e) => {
                self.lg_xmit_failed(io, xmit);
                Err(e)
            },
        }
    }

    /// Matches a response against the request bodies in progress and advances the matching
    /// transfer.
    pub(crate) fn lg_xmit_handle_response(&mut self, io: &mut BlockIo, mut pdu: CoapMessage) -> XmitOutcome {
        let wire_token: CoapToken = pdu.token().map(Box::from).unwrap_or_default();
        let Some(base) = self.find_request_xmit(&wire_token) else {
            return XmitOutcome::Unmatched(pdu);
        };
        let Some(mut xmit) = self.lg_xmit.remove(&base) else {
            return XmitOutcome::Unmatched(pdu);
        };
        let app_token: CoapToken = xmit.app_token().into();

        if pdu.code() == CoapMessageCode::from(CoapResponseCode::Unauthorized) {
            if let Some(echo) = pdu.echo().map(Box::<[u8]>::from) {
                debug!("session {}: repeating block {} with Echo", self.id(), xmit.current_block);
                xmit.skeleton.set_option(CoapOptionType::Echo.to_raw_option_num(), echo);
                let current = xmit.current_block;
                match self.lg_xmit_send_block(io, &mut xmit, current, None) {
                    Ok(_) => {
                        self.lg_xmit.insert(base, xmit);
                    },
                    Err(_) => self.lg_xmit_failed(io, xmit),
                }
                return XmitOutcome::Handled;
            }
        }

        let block = match pdu.code() {
            CoapMessageCode::Response(_) if pdu.code().is_success() => {
                CoapBlock::from_message(&pdu, CoapOptionType::Block1, self.bert_in_force())
            },
            _ => {
                debug!("session {}: request body rejected with {:?}", self.id(), pdu.code());
                Ok(CoapBlock::default())
            },
        };
        let block = match block {
            Ok(block) if block.defined => block,
            Ok(_) => {
                // Not (or no longer) block-wise, this is the final response.
                pdu.set_token(Some(app_token));
                return XmitOutcome::Completed {
                    response: pdu,
                    base,
                    wire_token,
                };
            },
            Err(e) => {
                warn!("session {}: invalid Block1 option in response: {}", self.id(), e);
                self.lg_xmit_failed(io, xmit);
                return XmitOutcome::Handled;
            },
        };

        if xmit.last_block == Some(block.num) {
            debug!("session {}: ignoring repeated acknowledgement of block {}", self.id(), block.num);
            self.lg_xmit.insert(base, xmit);
            return XmitOutcome::Handled;
        }

        let mut num = block.num;
        if !xmit.block.bert && !block.bert && block.szx != xmit.block.szx {
            let end = xmit.offset + xmit.block.block_size();
            let new_size = crate::block::szx_to_size(block.szx);
            match CoapBlock::new(0, false, block.szx) {
                Ok(new_block) if end % new_size == 0 => {
                    debug!(
                        "session {}: peer changed block size from {} to {} bytes",
                        self.id(),
                        xmit.block.block_size(),
                        new_size
                    );
                    num = (end / new_size) as u32 - 1;
                    xmit.block = new_block;
                    xmit.current_block = num;
                },
                _ => {
                    debug!(
                        "session {}: ignoring unaligned block size change to {} bytes",
                        self.id(),
                        new_size
                    );
                    num = xmit.current_block;
                },
            }
        }
        if num != xmit.current_block {
            debug!(
                "session {}: ignoring acknowledgement of block {} while block {} is in flight",
                self.id(),
                num,
                xmit.current_block
            );
            self.lg_xmit.insert(base, xmit);
            return XmitOutcome::Handled;
        }
        if xmit.block.bert {
            let units = (xmit.last_bert_size + COAP_BERT_BLOCK_SIZE - 1) / COAP_BERT_BLOCK_SIZE;
            num += units.max(1) as u32 - 1;
        }

        xmit.last_block = Some(num);
        xmit.offset = (num as usize + 1) * xmit.block.block_size();
        if xmit.offset < xmit.data.len() {
            match self.lg_xmit_send_block(io, &mut xmit, num + 1, None) {
                Ok(_) => {
                    self.lg_xmit.insert(base, xmit);
                },
                Err(_) => self.lg_xmit_failed(io, xmit),
            }
            return XmitOutcome::Handled;
        }

        info!(
            "session {}: request body of {} bytes completely sent",
            self.id(),
            xmit.data.len()
        );
        drop(xmit);
        pdu.set_token(Some(app_token));
        XmitOutcome::Completed {
            response: pdu,
            base,
            wire_token,
        }
    }

    /// Sends the response to a request, splitting its body into Block2 blocks if it does not
    /// fit into a single message or if the peer asked for a specific block.
    pub(crate) fn send_response(
        &mut self,
        io: &mut BlockIo,
        request: &CoapMessage,
        resource: CoapResourceHandle,
        mut response: CoapMessage,
    ) {
        let data = response.take_data().unwrap_or_default();
        let requested =
            CoapBlock::from_message(request, CoapOptionType::Block2, self.bert_in_force()).unwrap_or_default();
        let passthrough = !matches!(response.code(), CoapMessageCode::Response(_))
            || response.has_option(CoapOptionType::Block2)
            || (!requested.defined
                && response.encoded_size_with_payload(self.proto(), data.len()) <= self.max_pdu_size());
        if passthrough {
            if !data.is_empty() {
                response.set_data(Some(data));
            }
            if let Err(e) = self.send_pdu(io, response) {
                debug!("session {}: unable to send response: {}", self.id(), e);
            }
            return;
        }

        let block = match self.lg_xmit_block_params(&response, CoapOptionType::Block2, &requested) {
            Ok(block) => block,
            Err(e) => {
                warn!("session {}: unable to send response body: {}", self.id(), e);
                self.respond_code(io, request, CoapResponseCode::InternalError);
                return;
            },
        };
        let num = if requested.defined {
            (requested.offset() / block.block_size()) as u32
        } else {
            0
        };
        if num == 0 && data.len() <= block.chunk_size {
            let single = match block.bert {
                true => CoapBlock::new_bert(0, false, block.chunk_size),
                false => CoapBlock::new(0, false, block.szx),
            };
            if let Ok(single) = single {
                single.write_to(&mut response, CoapOptionType::Block2);
            }
            response.set_option_uint(CoapOptionType::Size2, data.len() as u32);
            if !data.is_empty() {
                response.set_data(Some(data));
            }
            if let Err(e) = self.send_pdu(io, response) {
                debug!("session {}: unable to send response: {}", self.id(), e);
            }
            return;
        }
        if num as usize * block.block_size() >= data.len() {
            debug!("session {}: requested block {} lies beyond the body", self.id(), num);
            self.respond_code(io, request, CoapResponseCode::BadRequest);
            return;
        }

        let method = request.request_code().unwrap_or(CoapRequestCode::Get);
        let query = request.uri_query();
        if let Some(base) = self.find_response_xmit(resource, query.as_deref(), method) {
            debug!("session {}: replacing response body of resource {}", self.id(), resource.id);
            self.lg_xmit.remove(&base);
        }
        if response.etag().is_none() {
            let etag: [u8; COAP_ETAG_LENGTH] = rand::thread_rng().gen();
            response.set_option(CoapOptionType::ETag.to_raw_option_num(), etag.to_vec());
        }
        let etag: ETag = response.etag().map(Box::from).unwrap_or_default();
        let maxage_expire = response
            .option_uint(CoapOptionType::MaxAge)
            .map(|max_age| io.now + max_age as CoapTick * COAP_TICKS_PER_SECOND);
        let mut skeleton = response.duplicate(None, &[CoapOptionType::Block2.to_raw_option_num()]);
        skeleton.set_option_uint(CoapOptionType::Size2, data.len() as u32);

        info!(
            "session {}: sending response body of {} bytes in blocks of {} bytes",
            self.id(),
            data.len(),
            block.chunk_size
        );
        let base = self.new_token_base();
        let mut xmit = LgXmit {
            kind: LgXmitKind::Response {
                resource,
                query,
                method,
                etag,
                maxage_expire,
            },
            option: CoapOptionType::Block2,
            block,
            data: CoapLargeData::new(data),
            offset: 0,
            current_block: 0,
            last_block: None,
            skeleton,
            last_bert_size: 0,
            last_mid: None,
            last_sent: io.now,
            last_all_sent: None,
        };
        match self.lg_xmit_send_block(io, &mut xmit, num, Some(&response)) {
            Ok(_) => {
                self.lg_xmit.insert(base, xmit);
            },
            Err(e) => debug!("session {}: unable to send response body: {}", self.id(), e),
        }
    }

    /// Answers a request for a block of a response body that is still being served.
    ///
    /// Returns false if there is no matching body (or a new one has to be generated), in which
    /// case the request has to be passed to the resource handler.
    pub(crate) fn lg_xmit_serve_request(
        &mut self,
        io: &mut BlockIo,
        resource: CoapResourceHandle,
        method: CoapRequestCode,
        request: &CoapMessage,
        block2: CoapBlock,
    ) -> bool {
        let query = request.uri_query();
        let Some(base) = self.find_response_xmit(resource, query.as_deref(), method) else {
            return false;
        };
        let Some(mut xmit) = self.lg_xmit.remove(&base) else {
            return false;
        };
        let (etag, expired) = match &xmit.kind {
            LgXmitKind::Response {
                etag, maxage_expire, ..
            } => (etag.clone(), maxage_expire.map(|expire| io.now >= expire).unwrap_or(false)),
            LgXmitKind::Request { .. } => {
                self.lg_xmit.insert(base, xmit);
                return false;
            },
        };
        if expired {
            debug!("session {}: cached response body of resource {} expired", self.id(), resource.id);
            return false;
        }
        if block2.num == 0 {
            if request.etag() == Some(etag.as_ref()) {
                let mut valid = self.response_skeleton(request, CoapResponseCode::Valid);
                valid.set_option(CoapOptionType::ETag.to_raw_option_num(), etag);
                self.lg_xmit.insert(base, xmit);
                if let Err(e) = self.send_pdu(io, valid) {
                    debug!("session {}: unable to send response: {}", self.id(), e);
                }
                return true;
            }
            return false;
        }

        if !xmit.block.bert && !block2.bert && block2.szx < xmit.block.szx {
            if let Ok(smaller) = CoapBlock::new(0, false, block2.szx) {
                debug!(
                    "session {}: peer requested smaller blocks of {} bytes",
                    self.id(),
                    smaller.block_size()
                );
                xmit.block = smaller;
            }
        }
        let offset = block2.offset();
        if offset >= xmit.data.len() {
            debug!("session {}: requested block {} lies beyond the body", self.id(), block2.num);
            self.lg_xmit.insert(base, xmit);
            self.respond_code(io, request, CoapResponseCode::BadRequest);
            return true;
        }
        let num = (offset / xmit.block.block_size()) as u32;
        let reply = self.response_skeleton(request, CoapResponseCode::Content);
        match self.lg_xmit_send_block(io, &mut xmit, num, Some(&reply)) {
            Ok(_) => {
                self.lg_xmit.insert(base, xmit);
            },
            Err(e) => debug!("session {}: unable to send block {}: {}", self.id(), num, e),
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::CoapSessionConfig,
        protocol::{CoapMessageType, CoapRequestCode},
        types::CoapProtocol,
    };

    fn session(proto: CoapProtocol, mtu: usize) -> CoapSession {
        let config = CoapSessionConfig::default().with_mtu(mtu).unwrap();
        CoapSession::new(1, proto, config)
    }

    #[test]
    fn block_size_fits_into_mtu() {
        let session = session(CoapProtocol::Udp, 128);
        let response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Content);
        // 128 - (4 header + 8 token + 19 options + 1 marker) = 96 bytes available
        let block = session
            .lg_xmit_block_params(&response, CoapOptionType::Block2, &CoapBlock::default())
            .unwrap();
        assert_eq!(block.szx, 2);
        assert_eq!(block.chunk_size, 64);
    }

    #[test]
    fn preset_block_size_is_not_exceeded() {
        let session = session(CoapProtocol::Udp, 1152);
        let response = CoapMessage::new(CoapMessageType::Ack, CoapResponseCode::Content);
        let block = session
            .lg_xmit_block_params(&response, CoapOptionType::Block2, &CoapBlock::new(0, false, 1).unwrap())
            .unwrap();
        assert_eq!(block.szx, 1);
        let unlimited = session
            .lg_xmit_block_params(&response, CoapOptionType::Block2, &CoapBlock::default())
            .unwrap();
        assert_eq!(unlimited.szx, 6);
        assert!(!unlimited.bert);
    }

    #[test]
    fn too_small_pdu_is_rejected() {
        let session = session(CoapProtocol::Udp, 64);
        let mut request = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Put);
        request.add_option(crate::message::CoapOption::UriPath("a-rather-long-path-segment".to_string())).unwrap();
        request.add_option(crate::message::CoapOption::UriQuery("and=a-long-query".to_string())).unwrap();
        assert_eq!(
            session.lg_xmit_block_params(&request, CoapOptionType::Block1, &CoapBlock::default()),
            Err(BlockError::TooSmallForBlock)
        );
    }
}
