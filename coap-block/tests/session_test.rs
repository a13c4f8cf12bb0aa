// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * session_test.rs - Tests for message queueing, timeouts and session teardown.
 */

use std::{cell::Cell, rc::Rc};

use coap_block::{
    block::CoapBlock,
    error::BlockError,
    message::{CoapMessage, CoapMessageCommon},
    protocol::{CoapMessageCode, CoapMessageType, CoapOptionType, CoapRequestCode, CoapResponseCode},
    types::CoapProtocol,
    CoapLargeData, CoapNackReason, CoapResource, CoapResourceTable, CoapSession, CoapSessionConfig,
};

mod common;

use common::{exchange, gen_test_request, test_body, RecordedEvent, TestEndpoint};

fn large_put() -> CoapMessage {
    let mut request = gen_test_request(CoapRequestCode::Put, "r");
    CoapBlock::new(0, false, 1)
        .unwrap()
        .write_to(&mut request, CoapOptionType::Block1);
    request
}

/// Body whose release is counted.
fn counted_body(len: usize, released: &Rc<Cell<usize>>) -> CoapLargeData {
    let released = Rc::clone(released);
    CoapLargeData::with_release(test_body(len), move |data| {
        assert_eq!(data.len(), len);
        released.set(released.get() + 1);
    })
}

fn piggybacked_response(request: &CoapMessage, code: CoapResponseCode) -> CoapMessage {
    let mut response = CoapMessage::new(CoapMessageType::Ack, code);
    response.set_mid(request.mid());
    response.set_token(request.token().map(Box::<[u8]>::from));
    response
}

#[test]
pub fn confirmable_requests_are_limited_by_nstart() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let first = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "a"), 0)
        .unwrap();
    let second = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "b"), 0)
        .unwrap();
    assert_eq!(client.wire.sent_count(), 1);
    assert_eq!(client.session().queued_count(), 1);

    let request = client.wire.last_sent().unwrap();
    assert_eq!(request.mid(), Some(first.mid()));
    client.receive(piggybacked_response(&request, CoapResponseCode::Content), 0);
    assert_eq!(client.wire.sent_count(), 2);
    assert_eq!(client.session().queued_count(), 0);
    assert_eq!(client.wire.last_sent().unwrap().mid(), Some(second.mid()));

    let responses = client.session_mut().poll_handle(&first);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].code(), CoapMessageCode::Response(CoapResponseCode::Content));
    assert!(client.session_mut().poll_handle(&second).is_empty());
}

#[test]
pub fn deferred_messages_are_sent_on_flush() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    client.wire.defer_next(1);
    let handle = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "a"), 0)
        .unwrap();
    assert_eq!(client.wire.sent_count(), 0);
    assert_eq!(client.session().queued_count(), 1);

    client.context.flush(10);
    assert_eq!(client.wire.sent_count(), 1);
    assert_eq!(client.session().queued_count(), 0);
    assert_eq!(client.wire.last_sent().unwrap().mid(), Some(handle.mid()));
}

#[test]
pub fn failed_send_is_reported() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    client.wire.fail_next(1);
    let result = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "a"), 0);
    let mid = match result {
        Err(BlockError::SendFailure(Some(mid))) => mid,
        other => panic!("send did not fail: {:?}", other),
    };
    assert_eq!(
        client.events.events(),
        vec![RecordedEvent::Nack(mid, CoapNackReason::SendFailed)]
    );
}

#[test]
pub fn failed_first_block_releases_body() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let released = Rc::new(Cell::new(0));
    let mut request = large_put();
    request.set_token(Some(vec![0x07u8]));
    client.wire.fail_next(1);
    let result = client
        .context
        .send_large_request(client.session, request, counted_body(200, &released), 0);
    assert!(result.is_err());
    assert_eq!(released.get(), 1);
    let events = client.events.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], RecordedEvent::Nack(_, CoapNackReason::SendFailed)));
    assert_eq!(events[1], RecordedEvent::XmitBlockFail(vec![0x07u8].into()));
    assert_eq!(client.session().lg_xmit_count(), 0);
}

#[test]
pub fn new_request_body_replaces_running_one() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let released = Rc::new(Cell::new(0));
    for _ in 0..2 {
        let mut request = large_put();
        request.set_token(Some(vec![0x07u8]));
        client
            .context
            .send_large_request(client.session, request, counted_body(200, &released), 0)
            .unwrap();
    }
    assert_eq!(released.get(), 1);
    assert_eq!(
        client.events.events(),
        vec![RecordedEvent::XmitBlockFail(vec![0x07u8].into())]
    );
    assert_eq!(client.session().lg_xmit_count(), 1);
}

#[test]
pub fn stalled_request_body_times_out() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let released = Rc::new(Cell::new(0));
    let handle = client
        .context
        .send_large_request(client.session, large_put(), counted_body(200, &released), 0)
        .unwrap();
    assert_eq!(client.session().max_transmit_wait(), 93_000);

    assert_eq!(client.context.tick(92_999), Some(93_000));
    assert_eq!(released.get(), 0);
    assert_eq!(client.context.tick(93_000), None);
    assert_eq!(released.get(), 1);
    assert_eq!(
        client.events.events(),
        vec![RecordedEvent::XmitBlockFail(handle.token().into())]
    );
    assert_eq!(client.session().lg_xmit_count(), 0);
}

#[test]
pub fn reset_aborts_request_body() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let released = Rc::new(Cell::new(0));
    let handle = client
        .context
        .send_large_request(client.session, large_put(), counted_body(200, &released), 0)
        .unwrap();
    let mut rst = CoapMessage::new(CoapMessageType::Rst, CoapMessageCode::Empty);
    rst.set_mid(Some(handle.mid()));
    client.receive(rst, 0);

    assert_eq!(released.get(), 1);
    assert_eq!(
        client.events.events(),
        vec![
            RecordedEvent::Nack(handle.mid(), CoapNackReason::Rst),
            RecordedEvent::XmitBlockFail(handle.token().into()),
        ]
    );
}

#[test]
pub fn stalled_receives_time_out() {
    let mut resources = CoapResourceTable::new();
    let mut resource = CoapResource::new("r", ());
    resource.set_method_handler(
        CoapRequestCode::Put,
        Some(|_: &mut (), _: &CoapSession, _: &CoapMessage, response: &mut CoapMessage| {
            response.set_code(CoapResponseCode::Changed);
        }),
    );
    resources.add_resource(resource);
    let mut server = TestEndpoint::new(CoapProtocol::Udp, CoapSessionConfig::default(), resources);
    let mut client = TestEndpoint::client(CoapSessionConfig::default().with_nstart(2).unwrap());

    // Only the first block of the request body reaches the server.
    let mut request = large_put();
    request.set_data(Some(test_body(200)));
    client.context.send_request(client.session, request, 0).unwrap();
    for pdu in client.wire.take() {
        server.receive(pdu, 0);
    }
    assert_eq!(server.session().lg_srcv_count(), 1);

    // Only the first block of a response body reaches the client.
    let handle = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "s"), 0)
        .unwrap();
    let get = client.wire.last_sent().unwrap();
    assert_eq!(get.mid(), Some(handle.mid()));
    let mut block = piggybacked_response(&get, CoapResponseCode::Content);
    CoapBlock::new(0, true, 2)
        .unwrap()
        .write_to(&mut block, CoapOptionType::Block2);
    block.set_data(Some(test_body(64)));
    client.receive(block, 0);
    assert_eq!(client.session().lg_crcv_count(), 1);

    server.context.tick(93_000);
    client.context.tick(93_000);
    assert_eq!(server.session().lg_srcv_count(), 0);
    assert_eq!(client.session().lg_crcv_count(), 0);
}

#[test]
pub fn unknown_resource_is_not_found() {
    let mut server = TestEndpoint::new(CoapProtocol::Udp, CoapSessionConfig::default(), CoapResourceTable::new());
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let handle = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "missing"), 0)
        .unwrap();
    exchange(&mut client, &mut server, 0);

    let responses = client.session_mut().poll_handle(&handle);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].code(), CoapMessageCode::Response(CoapResponseCode::NotFound));
}

#[test]
pub fn closing_session_releases_everything() {
    let mut client = TestEndpoint::client(CoapSessionConfig::default());
    let released = Rc::new(Cell::new(0));
    client
        .context
        .send_large_request(client.session, large_put(), counted_body(200, &released), 0)
        .unwrap();
    let queued = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "a"), 0)
        .unwrap();
    assert_eq!(client.session().queued_count(), 1);

    let session = client.session;
    client.context.close_session(session, 10).unwrap();
    assert_eq!(released.get(), 1);
    assert_eq!(
        client.events.events(),
        vec![
            RecordedEvent::Nack(queued.mid(), CoapNackReason::NotDeliverable),
            RecordedEvent::SessionClosed(session),
        ]
    );
    assert!(client.context.session(session).is_none());
    assert_eq!(
        client
            .context
            .send_request(session, gen_test_request(CoapRequestCode::Get, "a"), 10)
            .unwrap_err(),
        BlockError::UnknownSession(session)
    );
}

#[test]
pub fn tls_failure_closes_session() {
    let mut client = TestEndpoint::new(CoapProtocol::Dtls, CoapSessionConfig::default(), CoapResourceTable::new());
    client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "a"), 0)
        .unwrap();
    let queued = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "b"), 0)
        .unwrap();

    let session = client.session;
    client.context.handle_tls_failure(session, 0).unwrap();
    assert_eq!(
        client.events.events(),
        vec![
            RecordedEvent::Nack(queued.mid(), CoapNackReason::TlsFailed),
            RecordedEvent::SessionClosed(session),
        ]
    );
}
