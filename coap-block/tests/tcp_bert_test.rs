// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * tcp_bert_test.rs - Tests for block-wise transfers over reliable transports (BERT).
 */

use std::{cell::RefCell, rc::Rc};

use coap_block::{
    message::{CoapMessage, CoapMessageCommon},
    protocol::{CoapMessageCode, CoapOptionType, CoapRequestCode, CoapResponseCode},
    types::CoapProtocol,
    CoapResource, CoapResourceTable, CoapSession, CoapSessionConfig,
};

mod common;

use common::{block_of, exchange, gen_test_request, test_body, TestEndpoint};

type Bodies = Rc<RefCell<Vec<Vec<u8>>>>;

/// Server with a resource `r` that records PUT bodies and answers GET requests with `content`.
fn tcp_server(config: CoapSessionConfig, content: Vec<u8>) -> (TestEndpoint, Bodies) {
    let received = Bodies::default();
    let mut resources = CoapResourceTable::new();
    let mut resource = CoapResource::new("r", (Rc::clone(&received), content));
    resource.set_method_handler(
        CoapRequestCode::Put,
        Some(
            |(received, _): &mut (Bodies, Vec<u8>),
             _: &CoapSession,
             request: &CoapMessage,
             response: &mut CoapMessage| {
                received.borrow_mut().push(request.data().unwrap_or_default().to_vec());
                response.set_code(CoapResponseCode::Changed);
            },
        ),
    );
    resource.set_method_handler(
        CoapRequestCode::Get,
        Some(
            |(_, content): &mut (Bodies, Vec<u8>), _: &CoapSession, _: &CoapMessage, response: &mut CoapMessage| {
                response.set_code(CoapResponseCode::Content);
                response.set_data(Some(content.clone()));
            },
        ),
    );
    resources.add_resource(resource);
    (TestEndpoint::new(CoapProtocol::Tcp, config, resources), received)
}

fn bert_config() -> CoapSessionConfig {
    CoapSessionConfig::default()
        .with_bert(true)
        .with_csm_max_message_size(8192)
        .unwrap()
}

/// Sends the CSMs of both endpoints and delivers them.
fn establish(client: &mut TestEndpoint, server: &mut TestEndpoint) {
    client.context.send_csm(client.session, 0).unwrap();
    server.context.send_csm(server.session, 0).unwrap();
    exchange(client, server, 0);
}

#[test]
pub fn bert_request_body() {
    let body = test_body(20000);
    let (mut server, received) = tcp_server(bert_config(), Vec::new());
    let mut client = TestEndpoint::new(CoapProtocol::Tcp, bert_config(), CoapResourceTable::new());
    establish(&mut client, &mut server);
    assert!(client.session().bert_in_force());
    assert!(server.session().bert_in_force());
    assert_eq!(client.session().max_pdu_size(), 8192);

    let mut request = gen_test_request(CoapRequestCode::Put, "r");
    request.set_data(Some(body.clone()));
    let handle = client.context.send_request(client.session, request, 0).unwrap();
    exchange(&mut client, &mut server, 0);

    let blocks: Vec<_> = client
        .wire
        .sent()
        .into_iter()
        .filter(|pdu| pdu.code() == CoapMessageCode::Request(CoapRequestCode::Put))
        .collect();
    let layout: Vec<_> = blocks
        .iter()
        .map(|pdu| {
            let block = block_of(pdu, CoapOptionType::Block1);
            (block.num, block.bert, pdu.data().map(|d| d.len()).unwrap_or(0))
        })
        .collect();
    assert_eq!(layout, vec![(0, true, 7168), (7, true, 7168), (14, true, 5664)]);

    assert_eq!(*received.borrow(), vec![body]);
    let responses = client.session_mut().poll_handle(&handle);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].code(), CoapMessageCode::Response(CoapResponseCode::Changed));
    assert_eq!(client.session().lg_xmit_count(), 0);
    assert_eq!(server.session().lg_srcv_count(), 0);
}

#[test]
pub fn bert_response_body() {
    let body = test_body(20000);
    let (mut server, _) = tcp_server(bert_config(), body.clone());
    let mut client = TestEndpoint::new(CoapProtocol::Tcp, bert_config(), CoapResourceTable::new());
    establish(&mut client, &mut server);

    let handle = client
        .context
        .send_request(client.session, gen_test_request(CoapRequestCode::Get, "r"), 0)
        .unwrap();
    exchange(&mut client, &mut server, 0);

    let blocks: Vec<_> = server
        .wire
        .sent()
        .into_iter()
        .filter(|pdu| pdu.code() == CoapMessageCode::Response(CoapResponseCode::Content))
        .map(|pdu| block_of(&pdu, CoapOptionType::Block2).num)
        .collect();
    assert_eq!(blocks, vec![0, 7, 14]);

    let responses = client.session_mut().poll_handle(&handle);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].data().unwrap_or_default(), body.as_slice());
    assert_eq!(client.session().lg_crcv_count(), 0);
}

#[test]
pub fn without_bert_blocks_are_limited_to_1024_bytes() {
    let body = test_body(5000);
    let (mut server, received) = tcp_server(bert_config(), Vec::new());
    let mut client = TestEndpoint::new(CoapProtocol::Tcp, CoapSessionConfig::default(), CoapResourceTable::new());
    establish(&mut client, &mut server);
    assert!(!client.session().bert_in_force());
    assert!(!server.session().bert_in_force());

    let mut request = gen_test_request(CoapRequestCode::Put, "r");
    request.set_data(Some(body.clone()));
    client.context.send_request(client.session, request, 0).unwrap();
    exchange(&mut client, &mut server, 0);

    let sizes: Vec<_> = client
        .wire
        .sent()
        .into_iter()
        .filter(|pdu| pdu.code() == CoapMessageCode::Request(CoapRequestCode::Put))
        .map(|pdu| {
            let block = block_of(&pdu, CoapOptionType::Block1);
            assert!(!block.bert);
            assert_eq!(block.block_size(), 1024);
            pdu.data().map(|d| d.len()).unwrap_or(0)
        })
        .collect();
    assert_eq!(sizes, vec![1024, 1024, 1024, 1024, 904]);
    assert_eq!(*received.borrow(), vec![body]);
}
