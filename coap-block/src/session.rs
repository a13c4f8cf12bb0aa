// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * session.rs - Types relating to CoAP sessions.
 */

//! Per-session state and the dispatch of inbound and outbound messages.

use std::collections::{HashMap, VecDeque};

use log::{debug, info, warn};
use rand::Rng;

use crate::{
    block::{BlockIo, CoapBlock, LgCrcv, LgSrcv, LgXmit, SrcvKey, StateToken, XmitOutcome, STATE_TOKEN_BASE_MASK},
    config::{CoapBlockMode, CoapSessionConfig, COAP_DEFAULT_MAX_MESSAGE_SIZE},
    error::{BlockError, MessageCodeError, MessageConversionError},
    event::CoapNackReason,
    message::{CoapMessage, CoapMessageCommon},
    protocol::{
        CoapMessageCode, CoapMessageType, CoapOptionType, CoapRequestCode, CoapResponseCode, CoapSignalingCode,
        CoapToken, COAP_OBSERVE_ESTABLISH, COAP_SIGNALING_OPTION_BLOCK_WISE_TRANSFER,
        COAP_SIGNALING_OPTION_MAX_MESSAGE_SIZE,
    },
    resource::{CoapResourceHandle, CoapResourceRegistry},
    transport::CoapSendResult,
    types::{
        decode_var_len_u32, encode_var_len_u32, CoapMessageId, CoapProtocol, CoapSessionId, CoapTick,
        COAP_TICKS_PER_SECOND,
    },
};

/// Per-record overhead of DTLS that reduces the usable MTU.
const COAP_DTLS_OVERHEAD: usize = 29;

/// Request sent by the application for which responses are still expected.
#[derive(Debug, Clone)]
pub(crate) struct PendingRequest {
    /// Copy of the request without payload (except for FETCH) and without Block1 options.
    pub(crate) request: CoapMessage,
    /// Whether the request established an observation.
    pub(crate) observe: bool,
}

/// Handle that can be used to retrieve the responses to a request.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct CoapRequestHandle {
    mid: CoapMessageId,
    token: CoapToken,
}

impl CoapRequestHandle {
    pub fn new<T: Into<Box<[u8]>>>(mid: CoapMessageId, token: T) -> CoapRequestHandle {
        CoapRequestHandle {
            mid,
            token: token.into(),
        }
    }

    /// Message ID of the (first) message that carried the request.
    pub fn mid(&self) -> CoapMessageId {
        self.mid
    }

    /// Token the application uses for this request.
    pub fn token(&self) -> &[u8] {
        &self.token
    }
}

/// A CoAP session with a single peer.
///
/// The session keeps the state of all large transfers in progress with the peer, the message
/// ID, token and Request-Tag counters, NSTART accounting and the queue of messages that could
/// not be sent yet.
#[derive(Debug)]
pub struct CoapSession {
    id: CoapSessionId,
    proto: CoapProtocol,
    config: CoapSessionConfig,
    remote_max_message_size: usize,
    remote_bert: bool,
    tls_failed: bool,
    next_mid: CoapMessageId,
    token_counter: u64,
    rtag_counter: u64,
    pub(crate) lg_xmit: HashMap<u64, LgXmit>,
    pub(crate) lg_crcv: HashMap<u64, LgCrcv>,
    pub(crate) lg_srcv: HashMap<SrcvKey, LgSrcv>,
    delay_queue: VecDeque<CoapMessage>,
    inflight: Vec<CoapMessageId>,
    pub(crate) pending_requests: HashMap<CoapToken, PendingRequest>,
    received_responses: HashMap<CoapToken, VecDeque<CoapMessage>>,
}

impl CoapSession {
    pub(crate) fn new(id: CoapSessionId, proto: CoapProtocol, config: CoapSessionConfig) -> CoapSession {
        let mut rng = rand::thread_rng();
        CoapSession {
            id,
            proto,
            config,
            remote_max_message_size: COAP_DEFAULT_MAX_MESSAGE_SIZE,
            remote_bert: false,
            tls_failed: false,
            next_mid: rng.gen(),
            token_counter: rng.gen::<u64>() & STATE_TOKEN_BASE_MASK,
            rtag_counter: rng.gen(),
            lg_xmit: HashMap::new(),
            lg_crcv: HashMap::new(),
            lg_srcv: HashMap::new(),
            delay_queue: VecDeque::new(),
            inflight: Vec::new(),
            pending_requests: HashMap::new(),
            received_responses: HashMap::new(),
        }
    }

    pub fn id(&self) -> CoapSessionId {
        self.id
    }

    pub fn proto(&self) -> CoapProtocol {
        self.proto
    }

    pub fn config(&self) -> &CoapSessionConfig {
        &self.config
    }

    pub(crate) fn block_mode(&self, mode: CoapBlockMode) -> bool {
        self.config.block_mode().contains(mode)
    }

    /// Returns the maximum size of a message that can be sent over this session.
    pub fn max_pdu_size(&self) -> usize {
        match self.proto {
            CoapProtocol::Udp => self.config.mtu(),
            CoapProtocol::Dtls => self.config.mtu().saturating_sub(COAP_DTLS_OVERHEAD),
            _ => self.remote_max_message_size,
        }
    }

    /// Returns whether BERT may be used, i.e. the transport is reliable and both peers have
    /// advertised support for it.
    pub fn bert_in_force(&self) -> bool {
        self.proto.is_reliable() && self.config.bert() && self.remote_bert
    }

    /// MAX_TRANSMIT_WAIT of this session in ticks.
    pub fn max_transmit_wait(&self) -> CoapTick {
        let retransmissions = (1u64 << (self.config.max_retransmit() + 1)) - 1;
        self.config.ack_timeout().as_millis() * retransmissions * self.config.ack_random_factor().as_millis() / 1000
            * COAP_TICKS_PER_SECOND
            / 1000
    }

    /// Initial retransmission timeout for a confirmable message, randomized between ACK_TIMEOUT
    /// and ACK_TIMEOUT * ACK_RANDOM_FACTOR.
    pub(crate) fn initial_timeout(&self) -> CoapTick {
        let ack_timeout = self.config.ack_timeout().as_millis();
        let max = ack_timeout * self.config.ack_random_factor().as_millis() / 1000;
        rand::thread_rng().gen_range(ack_timeout..=max) * COAP_TICKS_PER_SECOND / 1000
    }

    /// Number of large sends currently tracked.
    pub fn lg_xmit_count(&self) -> usize {
        self.lg_xmit.len()
    }

    /// Number of large client-side receives currently tracked.
    pub fn lg_crcv_count(&self) -> usize {
        self.lg_crcv.len()
    }

    /// Number of large server-side receives currently tracked.
    pub fn lg_srcv_count(&self) -> usize {
        self.lg_srcv.len()
    }

    /// Number of messages waiting in the delay queue.
    pub fn queued_count(&self) -> usize {
        self.delay_queue.len()
    }

    pub(crate) fn new_mid(&mut self) -> CoapMessageId {
        let mid = self.next_mid;
        self.next_mid = self.next_mid.wrapping_add(1);
        mid
    }

    /// Returns a new transfer identifier, never 0.
    pub(crate) fn new_token_base(&mut self) -> u64 {
        self.token_counter = (self.token_counter + 1) & STATE_TOKEN_BASE_MASK;
        if self.token_counter == 0 {
            self.token_counter = 1;
        }
        self.token_counter
    }

    /// Generates a token for a new request.
    ///
    /// Tokens are drawn from the same counter as the bases of [StateToken]s, so they never
    /// collide with the tokens of continuation messages.
    pub fn new_token(&mut self) -> CoapToken {
        StateToken::new(self.new_token_base(), 0).to_bytes()
    }

    pub(crate) fn new_request_tag(&mut self) -> Box<[u8]> {
        self.rtag_counter = self.rtag_counter.wrapping_add(1);
        Box::new(self.rtag_counter.to_be_bytes())
    }

    pub(crate) fn mark_tls_failed(&mut self) {
        self.tls_failed = true;
    }

    /// Builds the CSM this endpoint sends after a reliable connection has been established.
    pub fn build_csm(&self) -> CoapMessage {
        let mut csm = CoapMessage::new(CoapMessageType::Con, CoapSignalingCode::Csm);
        csm.insert_option(
            COAP_SIGNALING_OPTION_MAX_MESSAGE_SIZE,
            encode_var_len_u32(self.config.csm_max_message_size() as u32),
        );
        if self.config.bert() {
            csm.insert_option(COAP_SIGNALING_OPTION_BLOCK_WISE_TRANSFER, Box::<[u8]>::default());
        }
        csm
    }

    /// Applies the settings of a CSM received from the peer.
    pub(crate) fn handle_csm(&mut self, csm: &CoapMessage) {
        if let Some(size) = csm.option(COAP_SIGNALING_OPTION_MAX_MESSAGE_SIZE) {
            self.remote_max_message_size = decode_var_len_u32(size) as usize;
        }
        self.remote_bert = csm.option(COAP_SIGNALING_OPTION_BLOCK_WISE_TRANSFER).is_some();
        info!(
            "session {}: peer max message size {}, BERT {}",
            self.id,
            self.remote_max_message_size,
            if self.bert_in_force() { "in force" } else { "not in force" }
        );
    }

    fn needs_ack(&self, pdu: &CoapMessage) -> bool {
        pdu.type_() == CoapMessageType::Con && !self.proto.is_reliable()
    }

    /// Sends a message, assigning a message ID if it has none.
    ///
    /// Confirmable messages beyond NSTART are queued and sent once earlier ones have been
    /// acknowledged.
    pub(crate) fn send_pdu(&mut self, io: &mut BlockIo, mut pdu: CoapMessage) -> Result<CoapMessageId, BlockError> {
        let mid = match pdu.mid() {
            Some(mid) => mid,
            None => {
                let mid = self.new_mid();
                pdu.set_mid(Some(mid));
                mid
            },
        };
        pdu.validate()?;
        if self.needs_ack(&pdu) && (self.inflight.len() >= self.config.nstart() || !self.delay_queue.is_empty()) {
            debug!("session {}: delaying message {} (NSTART reached)", self.id, mid);
            self.delay_queue.push_back(pdu);
            return Ok(mid);
        }
        self.transmit(io, pdu, false).map(|_| mid)
    }

    /// Hands a message to the transport. Returns `Ok(false)` if the transport deferred it.
    fn transmit(&mut self, io: &mut BlockIo, pdu: CoapMessage, requeue_front: bool) -> Result<bool, BlockError> {
        let mid = pdu.mid();
        match io.transport.send(self.id, &pdu) {
            CoapSendResult::Sent => {
                if self.needs_ack(&pdu) {
                    if let Some(mid) = mid {
                        self.inflight.push(mid);
                    }
                    io.transport.schedule_retransmit(self.id, &pdu, self.initial_timeout());
                }
                Ok(true)
            },
            CoapSendResult::Deferred => {
                debug!("session {}: transport deferred message {:?}", self.id, mid);
                if requeue_front {
                    self.delay_queue.push_front(pdu);
                } else {
                    self.delay_queue.push_back(pdu);
                }
                Ok(false)
            },
            CoapSendResult::Error(reason) => {
                warn!("session {}: unable to send message {:?}: {:?}", self.id, mid, reason);
                if let Some(mid) = mid {
                    io.events.handle_nack(self, mid, reason);
                }
                Err(BlockError::SendFailure(mid))
            },
        }
    }

    /// Sends queued messages as far as NSTART and the transport permit.
    pub(crate) fn flush(&mut self, io: &mut BlockIo) {
        while let Some(pdu) = self.delay_queue.pop_front() {
            if self.needs_ack(&pdu) && self.inflight.len() >= self.config.nstart() {
                self.delay_queue.push_front(pdu);
                break;
            }
            match self.transmit(io, pdu, true) {
                Ok(true) => {},
                Ok(false) => break,
                Err(BlockError::SendFailure(Some(mid))) => self.lg_xmit_fail_mid(io, mid),
                Err(_) => {},
            }
        }
    }

    fn ack_received(&mut self, mid: Option<CoapMessageId>) {
        if let Some(mid) = mid {
            self.inflight.retain(|m| *m != mid);
        }
    }

    fn send_empty(&mut self, io: &mut BlockIo, type_: CoapMessageType, mid: Option<CoapMessageId>) {
        let mut pdu = CoapMessage::new(type_, CoapMessageCode::Empty);
        pdu.set_mid(mid);
        if let Err(e) = self.send_pdu(io, pdu) {
            debug!("session {}: unable to send empty message: {}", self.id, e);
        }
    }

    /// Sends a request on behalf of the application.
    ///
    /// `data`, if given, is the body of the request and replaces any payload set on `request`.
    pub(crate) fn send_request(
        &mut self,
        io: &mut BlockIo,
        mut request: CoapMessage,
        data: Option<crate::block::CoapLargeData>,
    ) -> Result<CoapRequestHandle, BlockError> {
        let method = request.request_code().ok_or(MessageConversionError::InvalidMessageCode(
            MessageCodeError::NotARequestCode,
        ))?;
        let token: CoapToken = match request.token() {
            Some(token) if !token.is_empty() => Box::from(token),
            _ => {
                let token = self.new_token();
                request.set_token(Some(token.clone()));
                token
            },
        };
        let payload = request.take_data();
        let data = data.or_else(|| payload.map(crate::block::CoapLargeData::new));

        let mut skeleton = request.duplicate(
            None,
            &[
                CoapOptionType::Block1.to_raw_option_num(),
                CoapOptionType::Size1.to_raw_option_num(),
                CoapOptionType::RequestTag.to_raw_option_num(),
            ],
        );
        if method == CoapRequestCode::Fetch {
            skeleton.set_data(data.as_ref().map(|d| d.to_vec()));
        }
        let observe = request.observe() == Some(COAP_OBSERVE_ESTABLISH);
        self.pending_requests.insert(
            token.clone(),
            PendingRequest {
                request: skeleton,
                observe,
            },
        );
        self.received_responses.entry(token.clone()).or_default();

        let result = if self.block_mode(CoapBlockMode::USE_LIBCOAP) {
            self.lg_xmit_send_request(io, request, data)
        } else {
            request.set_data(data.map(|d| d.to_vec()));
            self.send_pdu(io, request)
        };
        match result {
            Ok(mid) => Ok(CoapRequestHandle::new(mid, token)),
            Err(e) => {
                self.pending_requests.remove(&token);
                self.received_responses.remove(&token);
                Err(e)
            },
        }
    }

    /// Processes a message received from the peer.
    pub(crate) fn handle_incoming(
        &mut self,
        io: &mut BlockIo,
        registry: &mut dyn CoapResourceRegistry,
        pdu: CoapMessage,
    ) {
        let mid = pdu.mid();
        match pdu.code() {
            CoapMessageCode::Empty => match pdu.type_() {
                CoapMessageType::Ack => self.ack_received(mid),
                CoapMessageType::Rst => {
                    if let Some(mid) = mid {
                        self.handle_nack(io, mid, CoapNackReason::Rst);
                    }
                },
                // CoAP ping
                CoapMessageType::Con => self.send_empty(io, CoapMessageType::Rst, mid),
                CoapMessageType::Non => {},
            },
            CoapMessageCode::Signaling(CoapSignalingCode::Csm) => self.handle_csm(&pdu),
            CoapMessageCode::Signaling(CoapSignalingCode::Ping) => {
                let mut pong = CoapMessage::new(CoapMessageType::Con, CoapSignalingCode::Pong);
                pong.set_token(pdu.token().map(Box::<[u8]>::from));
                if let Err(e) = self.send_pdu(io, pong) {
                    debug!("session {}: unable to send pong: {}", self.id, e);
                }
            },
            CoapMessageCode::Signaling(_) => {},
            CoapMessageCode::Request(_) => self.handle_request(io, registry, pdu),
            CoapMessageCode::Response(_) => {
                match pdu.type_() {
                    CoapMessageType::Ack => self.ack_received(mid),
                    CoapMessageType::Con => self.send_empty(io, CoapMessageType::Ack, mid),
                    _ => {},
                }
                self.handle_response(io, pdu);
            },
        }
        self.flush(io);
    }

    fn handle_response(&mut self, io: &mut BlockIo, pdu: CoapMessage) {
        if !self.block_mode(CoapBlockMode::USE_LIBCOAP) {
            self.deliver_response(pdu);
            return;
        }
        let (pdu, relink) = match self.lg_xmit_handle_response(io, pdu) {
            XmitOutcome::Handled => return,
            XmitOutcome::Unmatched(pdu) => (pdu, None),
            XmitOutcome::Completed {
                response,
                base,
                wire_token,
            } => (response, Some((base, wire_token))),
        };
        if let Some(pdu) = self.lg_crcv_handle_response(io, pdu, relink) {
            self.deliver_response(pdu);
        }
    }

    /// Hands a response to the application by queueing it for its request handle.
    pub(crate) fn deliver_response(&mut self, pdu: CoapMessage) {
        let token: CoapToken = pdu.token().map(Box::from).unwrap_or_default();
        let final_response = pdu.observe().is_none() && pdu.code() != CoapMessageCode::from(CoapResponseCode::Continue);
        match self.received_responses.get_mut(&token) {
            Some(queue) => queue.push_back(pdu),
            None => {
                debug!("session {}: dropping response for unknown token {:02x?}", self.id, token);
                return;
            },
        }
        if final_response && !self.lg_crcv.values().any(|c| c.app_token == token) {
            self.pending_requests.remove(&token);
        }
    }

    fn handle_request(&mut self, io: &mut BlockIo, registry: &mut dyn CoapResourceRegistry, request: CoapMessage) {
        let Some(method) = request.request_code() else {
            return;
        };
        let path = request.uri_path();
        let Some(resource) = registry.resolve(method, &path) else {
            debug!("session {}: no resource for {:?} /{}", self.id, method, path);
            self.respond_code(io, &request, CoapResponseCode::NotFound);
            return;
        };
        if !self.block_mode(CoapBlockMode::USE_LIBCOAP) {
            let response = self.call_handler(registry, resource, &request);
            if let Err(e) = self.send_pdu(io, response) {
                debug!("session {}: unable to send response: {}", self.id, e);
            }
            return;
        }
        let bert = self.bert_in_force();
        let blocks = CoapBlock::from_message(&request, CoapOptionType::Block1, bert)
            .and_then(|b1| CoapBlock::from_message(&request, CoapOptionType::Block2, bert).map(|b2| (b1, b2)));
        let (block1, block2) = match blocks {
            Ok(blocks) => blocks,
            Err(e) => {
                debug!("session {}: rejecting request with invalid block option: {}", self.id, e);
                self.respond_code(io, &request, CoapResponseCode::BadRequest);
                return;
            },
        };
        if block2.defined && !block1.defined && self.lg_xmit_serve_request(io, resource, method, &request, block2) {
            return;
        }
        if block1.defined {
            self.lg_srcv_handle_request(io, registry, resource, request, block1);
            return;
        }
        let response = self.call_handler(registry, resource, &request);
        self.send_response(io, &request, resource, response);
    }

    /// Creates the response skeleton for a request: piggybacked for confirmable requests,
    /// non-confirmable otherwise.
    pub(crate) fn response_skeleton(&self, request: &CoapMessage, code: CoapResponseCode) -> CoapMessage {
        let (type_, mid) = match request.type_() {
            CoapMessageType::Con => (CoapMessageType::Ack, request.mid()),
            _ => (CoapMessageType::Non, None),
        };
        let mut response = CoapMessage::new(type_, code);
        response.set_mid(mid);
        response.set_token(request.token().map(Box::<[u8]>::from));
        response
    }

    /// Lets the resource registry produce the response to a request.
    pub(crate) fn call_handler(
        &mut self,
        registry: &mut dyn CoapResourceRegistry,
        resource: CoapResourceHandle,
        request: &CoapMessage,
    ) -> CoapMessage {
        let mut response = self.response_skeleton(request, CoapResponseCode::Content);
        registry.dispatch(resource, self, request, &mut response);
        response
    }

    /// Answers a request with an empty response carrying `code`.
    pub(crate) fn respond_code(&mut self, io: &mut BlockIo, request: &CoapMessage, code: CoapResponseCode) {
        let response = self.response_skeleton(request, code);
        if let Err(e) = self.send_pdu(io, response) {
            debug!("session {}: unable to send {} response: {}", self.id, code, e);
        }
    }

    /// Handles a confirmable message that was not delivered.
    pub(crate) fn handle_nack(&mut self, io: &mut BlockIo, mid: CoapMessageId, reason: CoapNackReason) {
        self.inflight.retain(|m| *m != mid);
        io.events.handle_nack(self, mid, reason);
        self.lg_xmit_fail_mid(io, mid);
    }

    /// Destroys all state of the session.
    ///
    /// Every queued confirmable message is reported as not deliverable and the payloads of all
    /// large sends are released.
    pub(crate) fn close(&mut self, io: &mut BlockIo) {
        let reason = if self.tls_failed {
            CoapNackReason::TlsFailed
        } else {
            CoapNackReason::NotDeliverable
        };
        let queued: Vec<CoapMessage> = self.delay_queue.drain(..).collect();
        for pdu in queued.iter().filter(|pdu| pdu.type_() == CoapMessageType::Con) {
            if let Some(mid) = pdu.mid() {
                io.events.handle_nack(self, mid, reason);
            }
        }
        info!(
            "session {}: closing with {} large sends, {} client receives, {} server receives",
            self.id,
            self.lg_xmit.len(),
            self.lg_crcv.len(),
            self.lg_srcv.len()
        );
        self.lg_xmit.clear();
        self.lg_crcv.clear();
        self.lg_srcv.clear();
        self.inflight.clear();
        self.pending_requests.clear();
        io.events.handle_session_closed(self);
    }

    /// Returns the responses received for the given request so far.
    pub fn poll_handle(&mut self, handle: &CoapRequestHandle) -> Vec<CoapMessage> {
        self.received_responses
            .get_mut(handle.token())
            .map(|queue| queue.drain(..).collect())
            .unwrap_or_default()
    }

    /// Stops tracking responses for the given request.
    pub fn remove_handle(&mut self, handle: CoapRequestHandle) {
        self.received_responses.remove(handle.token());
        self.pending_requests.remove(handle.token());
    }
}
