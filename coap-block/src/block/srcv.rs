// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/srcv.rs - Receiving large request bodies.
 */

use log::{debug, info, warn};

use crate::{
    block::{check_block_range, szx_to_size, BlockIo, BodyBuffer, CoapBlock, RangeSet},
    config::CoapBlockMode,
    error::BlockError,
    message::{CoapMessage, CoapMessageCommon},
    protocol::{
        CoapMessageCode, CoapMessageType, CoapOptionType, CoapResponseCode, ContentFormat, Observe, RequestTag,
    },
    resource::{CoapResourceHandle, CoapResourceRegistry},
    session::CoapSession,
    types::{CoapMessageId, CoapTick},
};

/// Identifies a request body in progress: the resource, the path for requests to the
/// catch-all resource, and the Request-Tag.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct SrcvKey {
    resource: CoapResourceHandle,
    path: Option<String>,
    rtag: Option<RequestTag>,
}

/// State of a request body that is received block by block.
#[derive(Debug)]
pub(crate) struct LgSrcv {
    pub(crate) observe: Option<Observe>,
    pub(crate) content_format: Option<ContentFormat>,
    pub(crate) szx: u8,
    pub(crate) total_len: Option<usize>,
    pub(crate) last_num: Option<u32>,
    pub(crate) ranges: RangeSet,
    pub(crate) body: BodyBuffer,
    pub(crate) last_mid: Option<CoapMessageId>,
    pub(crate) last_used: CoapTick,
    /// Reassembled body kept while the application waits for the client to repeat the final
    /// block with an Echo option.
    pub(crate) echo_body: Option<Box<[u8]>>,
}

impl CoapSession {
    /// Feeds a request carrying a Block1 option into the matching request body.
    pub(crate) fn lg_srcv_handle_request(
        &mut self,
        io: &mut BlockIo,
        registry: &mut dyn CoapResourceRegistry,
        resource: CoapResourceHandle,
        mut request: CoapMessage,
        block1: CoapBlock,
    ) {
        let key = SrcvKey {
            resource,
            path: resource.unknown.then(|| request.uri_path()),
            rtag: request.request_tag().map(Box::from),
        };
        let max_body_size = self.config().max_body_size();
        let size1 = request.option_uint(CoapOptionType::Size1).map(|size| size as usize);
        if max_body_size > 0 && size1.map(|size| size > max_body_size).unwrap_or(false) {
            self.lg_srcv.remove(&key);
            self.respond_too_large(io, &request);
            return;
        }

        let existing = match self.lg_srcv.remove(&key) {
            Some(srcv) if block1.num == 0 && srcv.last_mid != request.mid() && srcv.echo_body.is_none() => {
                debug!("session {}: new request body replaces the one in progress", self.id());
                None
            },
            existing => existing,
        };
        let mut srcv = match existing {
            Some(srcv) => srcv,
            None if block1.num == 0 && !block1.m => {
                let response = self.call_handler(registry, resource, &request);
                self.send_response(io, &request, resource, response);
                return;
            },
            None if block1.num != 0 => {
                // A single block the client chose to send on its own.
                let data = request.take_data();
                let len = data.as_ref().map(|d| d.len()).unwrap_or(0);
                request.set_body_part(data, block1.offset(), size1.unwrap_or(block1.offset() + len));
                let response = self.call_handler(registry, resource, &request);
                self.send_response(io, &request, resource, response);
                return;
            },
            None => LgSrcv {
                observe: request.observe(),
                content_format: request.content_format(),
                szx: block1.szx,
                total_len: size1,
                last_num: None,
                ranges: RangeSet::new(),
                body: BodyBuffer::with_hint(size1.unwrap_or(0)),
                last_mid: request.mid(),
                last_used: io.now,
                echo_body: None,
            },
        };
        srcv.last_used = io.now;

        if let Some(body) = srcv.echo_body.take() {
            if !block1.m && request.echo().is_some() {
                self.lg_srcv_complete(io, registry, key, srcv, request, block1, body);
                return;
            }
            srcv.echo_body = Some(body);
        }

        if request.has_option(CoapOptionType::ContentFormat) && request.content_format() != srcv.content_format {
            warn!("session {}: {}", self.id(), BlockError::ContentFormatChange);
            self.respond_code(io, &request, CoapResponseCode::Incomplete);
            return;
        }

        if block1.szx < srcv.szx && !block1.bert {
            srcv.ranges.rescale_down(srcv.szx - block1.szx);
            srcv.szx = block1.szx;
        }
        let unit = szx_to_size(srcv.szx);
        let offset = block1.offset();
        let payload_len = request.data().map(|d| d.len()).unwrap_or(0);
        let first = (offset / unit) as u32;
        let last = if payload_len > unit {
            ((offset + payload_len - 1) / unit) as u32
        } else {
            first
        };
        if let Err(e) = check_block_range(last, unit, srcv.total_len) {
            warn!(
                "session {}: abandoning request body, block {} lies beyond {:?} bytes: {}",
                self.id(),
                block1.num,
                srcv.total_len,
                e
            );
            self.respond_code(io, &request, CoapResponseCode::BadRequest);
            return;
        }
        let repeated = srcv.last_mid == request.mid() && srcv.ranges.contains(first);
        srcv.last_mid = request.mid();
        if !block1.m {
            srcv.last_num = Some(last);
        }
        match srcv.ranges.insert_range(first, last) {
            Ok(true) => {},
            Ok(false) => {
                debug!(
                    "session {}: duplicate block {}{}",
                    self.id(),
                    block1.num,
                    if repeated { " (retransmission)" } else { "" }
                );
                if request.type_() == CoapMessageType::Con {
                    self.respond_continue(io, &request, block1);
                }
                self.lg_srcv.insert(key, srcv);
                return;
            },
            Err(e) => {
                warn!("session {}: abandoning request body: {}", self.id(), e);
                self.respond_code(io, &request, CoapResponseCode::Incomplete);
                io.events.handle_partial_block(self, request.token().unwrap_or_default());
                return;
            },
        }
        let single_body = self.block_mode(CoapBlockMode::SINGLE_BODY);
        if single_body {
            if let Some(data) = request.data() {
                srcv.body.deposit(offset, data, srcv.total_len.unwrap_or(0));
            }
            if max_body_size > 0 && srcv.body.len() > max_body_size {
                self.respond_too_large(io, &request);
                return;
            }
        }
        let complete = srcv
            .last_num
            .map(|last| srcv.ranges.complete_through(last))
            .unwrap_or(false);

        if !single_body {
            let data = request.take_data();
            let total = srcv.total_len.unwrap_or(offset + payload_len);
            request.set_body_part(data, offset, total);
            let mut response = self.call_handler(registry, resource, &request);
            if !complete && response.code().is_success() {
                response.set_code(CoapResponseCode::Continue);
                response.take_data();
            }
            block1.write_to(&mut response, CoapOptionType::Block1);
            if !complete {
                self.lg_srcv.insert(key, srcv);
            }
            self.send_response(io, &request, resource, response);
            return;
        }
        if !complete {
            self.respond_continue(io, &request, block1);
            self.lg_srcv.insert(key, srcv);
            return;
        }
        let body = srcv.body.take();
        self.lg_srcv_complete(io, registry, key, srcv, request, block1, body);
    }

    /// Hands a completely received request body to the resource handler.
    #[allow(clippy::too_many_arguments)]
    fn lg_srcv_complete(
        &mut self,
        io: &mut BlockIo,
        registry: &mut dyn CoapResourceRegistry,
        key: SrcvKey,
        mut srcv: LgSrcv,
        mut request: CoapMessage,
        block1: CoapBlock,
        body: Box<[u8]>,
    ) {
        info!("session {}: received request body of {} bytes", self.id(), body.len());
        request.remove_option(CoapOptionType::Block1.to_raw_option_num());
        request.remove_option(CoapOptionType::Size1.to_raw_option_num());
        if let Some(observe) = srcv.observe {
            request.set_option_uint(CoapOptionType::Observe, observe);
        }
        let total = body.len();
        request.set_body_part(Some(body.clone()), 0, total);
        let mut response = self.call_handler(registry, key.resource, &request);
        if response.code() == CoapMessageCode::from(CoapResponseCode::Unauthorized) && response.echo().is_some() {
            debug!("session {}: keeping request body until the client repeats it with Echo", self.id());
            srcv.echo_body = Some(body);
            self.lg_srcv.insert(key.clone(), srcv);
        }
        CoapBlock { m: false, ..block1 }.write_to(&mut response, CoapOptionType::Block1);
        self.send_response(io, &request, key.resource, response);
    }

    /// Acknowledges a block with 2.31 Continue.
    fn respond_continue(&mut self, io: &mut BlockIo, request: &CoapMessage, block1: CoapBlock) {
        let mut response = self.response_skeleton(request, CoapResponseCode::Continue);
        block1.write_to(&mut response, CoapOptionType::Block1);
        if let Err(e) = self.send_pdu(io, response) {
            debug!("session {}: unable to acknowledge block {}: {}", self.id(), block1.num, e);
        }
    }

    /// Rejects a request body exceeding the configured maximum.
    fn respond_too_large(&mut self, io: &mut BlockIo, request: &CoapMessage) {
        warn!(
            "session {}: request body exceeds the maximum of {} bytes",
            self.id(),
            self.config().max_body_size()
        );
        let mut response = self.response_skeleton(request, CoapResponseCode::RequestTooLarge);
        response.set_option_uint(CoapOptionType::Size1, self.config().max_body_size() as u32);
        if let Err(e) = self.send_pdu(io, response) {
            debug!("session {}: unable to send response: {}", self.id(), e);
        }
    }
}
