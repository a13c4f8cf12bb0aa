// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * context.rs - CoAP context related code.
 */

//! Module containing context-related functions and types.

use std::collections::HashMap;

use log::{debug, info};

use crate::{
    block::{BlockIo, CoapLargeData},
    config::CoapSessionConfig,
    error::BlockError,
    event::{CoapEventHandler, CoapNackReason},
    message::{CoapMessage, CoapMessageCommon},
    resource::CoapResourceRegistry,
    session::{CoapRequestHandle, CoapSession},
    transport::CoapTransport,
    types::{CoapMessageId, CoapProtocol, CoapSessionId, CoapTick},
};

/// A CoAP context: the set of sessions of an endpoint together with the transport they use, the
/// resources they serve and the handler for their events.
///
/// The context does not keep time on its own. Every entry point takes the current time in ticks
/// (milliseconds), and [tick()](CoapContext::tick()) has to be called regularly (at the latest
/// at the time it returned last) so that stalled transfers are removed.
#[derive(Debug)]
pub struct CoapContext {
    transport: Box<dyn CoapTransport>,
    resources: Box<dyn CoapResourceRegistry>,
    event_handler: Box<dyn CoapEventHandler>,
    sessions: HashMap<CoapSessionId, CoapSession>,
    next_session_id: CoapSessionId,
}

impl CoapContext {
    pub fn new<T: CoapTransport + 'static, R: CoapResourceRegistry + 'static>(
        transport: T,
        resources: R,
    ) -> CoapContext {
        CoapContext {
            transport: Box::new(transport),
            resources: Box::new(resources),
            event_handler: Box::new(()),
            sessions: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Sets the event handler that is notified about failed transfers, undeliverable messages and
    /// closed sessions.
    pub fn set_event_handler<H: CoapEventHandler + 'static>(&mut self, handler: H) {
        self.event_handler = Box::new(handler);
    }

    /// Creates a new session using the given protocol and configuration.
    pub fn add_session(&mut self, proto: CoapProtocol, config: CoapSessionConfig) -> CoapSessionId {
        let id = self.next_session_id;
        self.next_session_id = self.next_session_id.wrapping_add(1);
        self.sessions.insert(id, CoapSession::new(id, proto, config));
        debug!("created {:?} session {}", proto, id);
        id
    }

    pub fn session(&self, session: CoapSessionId) -> Option<&CoapSession> {
        self.sessions.get(&session)
    }

    pub fn session_mut(&mut self, session: CoapSessionId) -> Option<&mut CoapSession> {
        self.sessions.get_mut(&session)
    }

    /// Runs `f` on a session together with the collaborators it needs.
    fn with_session<T>(
        &mut self,
        session: CoapSessionId,
        now: CoapTick,
        f: impl FnOnce(&mut CoapSession, &mut BlockIo, &mut dyn CoapResourceRegistry) -> T,
    ) -> Result<T, BlockError> {
        let session = self
            .sessions
            .get_mut(&session)
            .ok_or(BlockError::UnknownSession(session))?;
        let mut io = BlockIo {
            transport: self.transport.as_mut(),
            events: self.event_handler.as_mut(),
            now,
        };
        Ok(f(session, &mut io, self.resources.as_mut()))
    }

    /// Sends the CSM of a session over a reliable transport.
    pub fn send_csm(&mut self, session: CoapSessionId, now: CoapTick) -> Result<CoapMessageId, BlockError> {
        self.with_session(session, now, |session, io, _| {
            let csm = session.build_csm();
            session.send_pdu(io, csm)
        })?
    }

    /// Sends a request.
    ///
    /// A payload set on the request that does not fit into a single message is sent block-wise.
    /// If the request has no token, a new one is generated. Use the returned handle to retrieve
    /// the responses with [CoapSession::poll_handle()].
    pub fn send_request(
        &mut self,
        session: CoapSessionId,
        request: CoapMessage,
        now: CoapTick,
    ) -> Result<CoapRequestHandle, BlockError> {
        self.with_session(session, now, |session, io, _| session.send_request(io, request, None))?
    }

    /// Sends a request with a body that is owned by the context until the transfer has ended.
    ///
    /// The release callback of `data` (if any) is called exactly once: when the transfer
    /// completes, fails, is replaced or the session is closed.
    pub fn send_large_request(
        &mut self,
        session: CoapSessionId,
        request: CoapMessage,
        data: CoapLargeData,
        now: CoapTick,
    ) -> Result<CoapRequestHandle, BlockError> {
        self.with_session(session, now, |session, io, _| {
            session.send_request(io, request, Some(data))
        })?
    }

    /// Sends a notification for an observed resource.
    ///
    /// `request` is the request that registered the observer, `response` the notification to
    /// send (its type decides whether it is confirmable). Bodies that do not fit into a single
    /// message are sent block-wise.
    pub fn send_notification(
        &mut self,
        session: CoapSessionId,
        request: &CoapMessage,
        mut response: CoapMessage,
        now: CoapTick,
    ) -> Result<(), BlockError> {
        self.with_session(session, now, |session, io, resources| {
            let method = request.request_code().ok_or(BlockError::NoSuchRequest)?;
            let resource = resources
                .resolve(method, &request.uri_path())
                .ok_or(BlockError::NoSuchRequest)?;
            response.set_mid(None);
            if response.token().is_none() {
                response.set_token(request.token().map(Box::<[u8]>::from));
            }
            session.send_response(io, request, resource, response);
            session.flush(io);
            Ok(())
        })?
    }

    /// Processes a message received over the given session.
    pub fn handle_incoming(
        &mut self,
        session: CoapSessionId,
        pdu: CoapMessage,
        now: CoapTick,
    ) -> Result<(), BlockError> {
        pdu.validate()?;
        self.with_session(session, now, |session, io, resources| {
            session.handle_incoming(io, resources, pdu)
        })
    }

    /// Reports that a confirmable message could not be delivered.
    pub fn handle_nack(
        &mut self,
        session: CoapSessionId,
        mid: CoapMessageId,
        reason: CoapNackReason,
        now: CoapTick,
    ) -> Result<(), BlockError> {
        self.with_session(session, now, |session, io, _| {
            session.handle_nack(io, mid, reason);
            session.flush(io);
        })
    }

    /// Sends messages that were queued because of NSTART or because the transport deferred them.
    pub fn flush(&mut self, now: CoapTick) {
        let mut io = BlockIo {
            transport: self.transport.as_mut(),
            events: self.event_handler.as_mut(),
            now,
        };
        for session in self.sessions.values_mut() {
            session.flush(&mut io);
        }
    }

    /// Removes expired block-wise transfers of all sessions.
    ///
    /// Returns the point in time at which this function has to be called again, if any transfer
    /// is still in progress.
    pub fn tick(&mut self, now: CoapTick) -> Option<CoapTick> {
        let mut io = BlockIo {
            transport: self.transport.as_mut(),
            events: self.event_handler.as_mut(),
            now,
        };
        let mut next: Option<CoapTick> = None;
        for session in self.sessions.values_mut() {
            if let Some(expiry) = session.lg_timeouts(&mut io) {
                next = Some(next.map_or(expiry, |next| next.min(expiry)));
            }
            session.flush(&mut io);
        }
        next
    }

    /// Cancels the observation established by the request with the given token.
    pub fn cancel_observe(&mut self, session: CoapSessionId, token: &[u8], now: CoapTick) -> Result<(), BlockError> {
        self.with_session(session, now, |session, io, _| session.cancel_observe(io, token))?
    }

    /// Closes a session, discarding all of its transfers.
    pub fn close_session(&mut self, session: CoapSessionId, now: CoapTick) -> Result<(), BlockError> {
        let mut closed = self.sessions.remove(&session).ok_or(BlockError::UnknownSession(session))?;
        let mut io = BlockIo {
            transport: self.transport.as_mut(),
            events: self.event_handler.as_mut(),
            now,
        };
        closed.close(&mut io);
        info!("session {} closed", session);
        Ok(())
    }

    /// Closes a session after its (D)TLS layer failed.
    pub fn handle_tls_failure(&mut self, session: CoapSessionId, now: CoapTick) -> Result<(), BlockError> {
        self.sessions
            .get_mut(&session)
            .ok_or(BlockError::UnknownSession(session))?
            .mark_tls_failed();
        self.close_session(session, now)
    }
}
