// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * tests/common/mod.rs - Common code for integration tests.
 */

#![allow(dead_code)]

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

use coap_block::{
    block::CoapBlock,
    message::{CoapMessage, CoapMessageCommon, CoapOption},
    protocol::{CoapMessageType, CoapOptionType, CoapRequestCode},
    transport::{CoapSendResult, CoapTransport},
    types::{CoapMessageId, CoapProtocol, CoapSessionId, CoapTick},
    CoapContext, CoapEventHandler, CoapNackReason, CoapResourceTable, CoapSession, CoapSessionConfig,
};

/// Transport that keeps sent messages in memory until the test hands them to the peer.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoopbackTransport {
    outbox: Rc<RefCell<VecDeque<CoapMessage>>>,
    sent: Rc<RefCell<Vec<CoapMessage>>>,
    defer: Rc<Cell<usize>>,
    fail: Rc<Cell<usize>>,
}

impl LoopbackTransport {
    /// Takes all messages that have not been delivered yet.
    pub(crate) fn take(&self) -> Vec<CoapMessage> {
        self.outbox.borrow_mut().drain(..).collect()
    }

    /// Returns a copy of every message sent so far.
    pub(crate) fn sent(&self) -> Vec<CoapMessage> {
        self.sent.borrow().clone()
    }

    pub(crate) fn sent_count(&self) -> usize {
        self.sent.borrow().len()
    }

    pub(crate) fn last_sent(&self) -> Option<CoapMessage> {
        self.sent.borrow().last().cloned()
    }

    /// Makes the transport defer the next `count` messages.
    pub(crate) fn defer_next(&self, count: usize) {
        self.defer.set(count);
    }

    /// Makes the transport fail the next `count` messages.
    pub(crate) fn fail_next(&self, count: usize) {
        self.fail.set(count);
    }
}

impl CoapTransport for LoopbackTransport {
    fn send(&mut self, _session: CoapSessionId, pdu: &CoapMessage) -> CoapSendResult {
        if self.defer.get() > 0 {
            self.defer.set(self.defer.get() - 1);
            return CoapSendResult::Deferred;
        }
        if self.fail.get() > 0 {
            self.fail.set(self.fail.get() - 1);
            return CoapSendResult::Error(CoapNackReason::SendFailed);
        }
        self.outbox.borrow_mut().push_back(pdu.clone());
        self.sent.borrow_mut().push(pdu.clone());
        CoapSendResult::Sent
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) enum RecordedEvent {
    PartialBlock(Box<[u8]>),
    XmitBlockFail(Box<[u8]>),
    Nack(CoapMessageId, CoapNackReason),
    SessionClosed(CoapSessionId),
}

/// Event handler that records every event it receives.
#[derive(Debug, Default, Clone)]
pub(crate) struct EventRecorder {
    events: Rc<RefCell<Vec<RecordedEvent>>>,
}

impl EventRecorder {
    pub(crate) fn events(&self) -> Vec<RecordedEvent> {
        self.events.borrow().clone()
    }
}

impl CoapEventHandler for EventRecorder {
    fn handle_partial_block(&mut self, _session: &CoapSession, token: &[u8]) {
        self.events.borrow_mut().push(RecordedEvent::PartialBlock(token.into()));
    }

    fn handle_xmit_block_fail(&mut self, _session: &CoapSession, token: &[u8]) {
        self.events.borrow_mut().push(RecordedEvent::XmitBlockFail(token.into()));
    }

    fn handle_nack(&mut self, _session: &CoapSession, mid: CoapMessageId, reason: CoapNackReason) {
        self.events.borrow_mut().push(RecordedEvent::Nack(mid, reason));
    }

    fn handle_session_closed(&mut self, session: &CoapSession) {
        self.events.borrow_mut().push(RecordedEvent::SessionClosed(session.id()));
    }
}

/// A context with a single session, together with its transport and recorded events.
#[derive(Debug)]
pub(crate) struct TestEndpoint {
    pub(crate) context: CoapContext,
    pub(crate) session: CoapSessionId,
    pub(crate) wire: LoopbackTransport,
    pub(crate) events: EventRecorder,
}

impl TestEndpoint {
    pub(crate) fn new(proto: CoapProtocol, config: CoapSessionConfig, resources: CoapResourceTable) -> TestEndpoint {
        let wire = LoopbackTransport::default();
        let events = EventRecorder::default();
        let mut context = CoapContext::new(wire.clone(), resources);
        context.set_event_handler(events.clone());
        let session = context.add_session(proto, config);
        TestEndpoint {
            context,
            session,
            wire,
            events,
        }
    }

    pub(crate) fn client(config: CoapSessionConfig) -> TestEndpoint {
        TestEndpoint::new(CoapProtocol::Udp, config, CoapResourceTable::new())
    }

    pub(crate) fn session(&self) -> &CoapSession {
        self.context.session(self.session).expect("test session is gone")
    }

    pub(crate) fn session_mut(&mut self) -> &mut CoapSession {
        self.context.session_mut(self.session).expect("test session is gone")
    }

    /// Hands a message received from the peer to the context.
    pub(crate) fn receive(&mut self, pdu: CoapMessage, now: CoapTick) {
        self.context
            .handle_incoming(self.session, pdu, now)
            .expect("unable to handle incoming message");
    }
}

/// Delivers messages between the two endpoints until neither has anything left to send.
pub(crate) fn exchange(a: &mut TestEndpoint, b: &mut TestEndpoint, now: CoapTick) {
    exchange_filtered(a, b, now, |_| true)
}

/// Like [exchange()], but only delivers messages for which `deliver` returns true.
pub(crate) fn exchange_filtered<F: FnMut(&CoapMessage) -> bool>(
    a: &mut TestEndpoint,
    b: &mut TestEndpoint,
    now: CoapTick,
    mut deliver: F,
) {
    for _ in 0..1000 {
        let to_b = a.wire.take();
        let to_a = b.wire.take();
        if to_b.is_empty() && to_a.is_empty() {
            return;
        }
        for pdu in to_b.into_iter().filter(|pdu| deliver(pdu)) {
            b.receive(pdu, now);
        }
        for pdu in to_a.into_iter().filter(|pdu| deliver(pdu)) {
            a.receive(pdu, now);
        }
    }
    panic!("endpoints did not stop exchanging messages");
}

/// Generates a body whose bytes differ from block to block.
pub(crate) fn test_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub(crate) fn gen_test_request(code: CoapRequestCode, path: &str) -> CoapMessage {
    let mut request = CoapMessage::new(CoapMessageType::Con, code);
    for segment in path.split('/').filter(|segment| !segment.is_empty()) {
        request
            .add_option(CoapOption::UriPath(segment.to_string()))
            .expect("unable to add Uri-Path option");
    }
    request
}

pub(crate) fn block_of(pdu: &CoapMessage, opt_type: CoapOptionType) -> CoapBlock {
    CoapBlock::from_message(pdu, opt_type, true).expect("invalid block option")
}
