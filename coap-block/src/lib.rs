// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * lib.rs - Main library entry point for the CoAP block-wise transfer engine.
 */

//! Block-wise transfers for CoAP ([RFC 7959](https://datatracker.ietf.org/doc/html/rfc7959)).
//!
//! This crate implements the part of a CoAP stack that moves bodies larger than a single
//! message between two endpoints: splitting outgoing bodies into Block1/Block2 blocks,
//! reassembling incoming ones, matching continuation messages to their transfer and expiring
//! transfers that stall.
//!
//! # Feature support
//! - [x] Sending large request bodies (Block1) and large response bodies (Block2)
//! - [x] Receiving large request and response bodies, in any order and with retransmissions
//! - [x] Block size negotiation (the peer may ask for smaller blocks)
//! - [x] BERT over reliable transports ([RFC 8323](https://datatracker.ietf.org/doc/html/rfc8323))
//! - [x] Observe notifications with large bodies
//! - [x] Request-Tag and Echo ([RFC 9175](https://datatracker.ietf.org/doc/html/rfc9175))
//! - [x] NSTART-limited sending of confirmable messages
//! - [ ] Encoding messages for the wire, sockets, (D)TLS and retransmission timers. These are up
//!       to the [CoapTransport](transport::CoapTransport) the context is created with.
//!
//! # Example
//! A client sending a large body to a server. Both contexts use a transport that simply
//! collects the messages they send, which are then handed to the other side.
//!
//! ```
//! use std::{cell::RefCell, rc::Rc};
//!
//! use coap_block::{
//!     message::{CoapMessage, CoapMessageCommon, CoapOption},
//!     protocol::{CoapMessageCode, CoapMessageType, CoapRequestCode, CoapResponseCode},
//!     transport::{CoapSendResult, CoapTransport},
//!     types::{CoapProtocol, CoapSessionId},
//!     CoapContext, CoapResource, CoapResourceTable, CoapSession, CoapSessionConfig,
//! };
//!
//! #[derive(Debug, Default, Clone)]
//! struct Outbox(Rc<RefCell<Vec<CoapMessage>>>);
//!
//! impl CoapTransport for Outbox {
//!     fn send(&mut self, _session: CoapSessionId, pdu: &CoapMessage) -> CoapSendResult {
//!         self.0.borrow_mut().push(pdu.clone());
//!         CoapSendResult::Sent
//!     }
//! }
//!
//! let received = Rc::new(RefCell::new(Vec::new()));
//! let mut resources = CoapResourceTable::new();
//! let mut resource = CoapResource::new("upload", Rc::clone(&received));
//! resource.set_method_handler(
//!     CoapRequestCode::Put,
//!     Some(|body: &mut Rc<RefCell<Vec<u8>>>, _: &CoapSession, request: &CoapMessage, response: &mut CoapMessage| {
//!         body.borrow_mut().extend_from_slice(request.data().unwrap_or_default());
//!         response.set_code(CoapResponseCode::Changed);
//!     }),
//! );
//! resources.add_resource(resource);
//!
//! let (client_out, server_out) = (Outbox::default(), Outbox::default());
//! let mut client = CoapContext::new(client_out.clone(), CoapResourceTable::new());
//! let mut server = CoapContext::new(server_out.clone(), resources);
//! let client_session = client.add_session(CoapProtocol::Udp, CoapSessionConfig::default());
//! let server_session = server.add_session(CoapProtocol::Udp, CoapSessionConfig::default());
//!
//! let mut request = CoapMessage::new(CoapMessageType::Con, CoapRequestCode::Put);
//! request.add_option(CoapOption::UriPath("upload".to_string())).unwrap();
//! request.set_data(Some(vec![0x55u8; 5000]));
//! let handle = client.send_request(client_session, request, 0).unwrap();
//!
//! loop {
//!     let to_server: Vec<_> = client_out.0.borrow_mut().drain(..).collect();
//!     let to_client: Vec<_> = server_out.0.borrow_mut().drain(..).collect();
//!     if to_server.is_empty() && to_client.is_empty() {
//!         break;
//!     }
//!     for pdu in to_server {
//!         server.handle_incoming(server_session, pdu, 0).unwrap();
//!     }
//!     for pdu in to_client {
//!         client.handle_incoming(client_session, pdu, 0).unwrap();
//!     }
//! }
//!
//! assert_eq!(received.borrow().len(), 5000);
//! let responses = client.session_mut(client_session).unwrap().poll_handle(&handle);
//! assert_eq!(responses[0].code(), CoapMessageCode::Response(CoapResponseCode::Changed));
//! ```

pub use block::{CoapBlock, CoapLargeData};
pub use config::{CoapBlockMode, CoapSessionConfig};
pub use context::CoapContext;
pub use event::{CoapEventHandler, CoapNackReason};
pub use resource::{
    CoapRequestHandler, CoapResource, CoapResourceHandle, CoapResourceId, CoapResourceRegistry, CoapResourceTable,
    UntypedCoapResource,
};
pub use session::{CoapRequestHandle, CoapSession};

pub mod block;
pub mod config;
mod context;
pub mod error;
mod event;
pub mod message;
pub mod protocol;
mod resource;
mod session;
pub mod transport;
pub mod types;
