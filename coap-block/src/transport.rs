// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * transport.rs - Interface to the transport layer.
 */

//! Interface between the block-wise transfer engine and the transport layer.
//!
//! The engine never performs I/O itself. Complete messages are handed to a [CoapTransport],
//! which encodes them for the session's protocol and sends them (or buffers them for later).

use std::fmt::Debug;

use crate::{event::CoapNackReason, message::CoapMessage, types::{CoapSessionId, CoapTick}};

/// Result of handing a message to the transport.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CoapSendResult {
    /// The message was sent.
    Sent,
    /// The transport cannot accept the message right now, it will be queued and retried.
    Deferred,
    /// The message could not be sent.
    Error(CoapNackReason),
}

/// Transport collaborator of a [CoapContext](crate::CoapContext).
pub trait CoapTransport: Debug {
    /// Sends a complete message over the given session.
    fn send(&mut self, session: CoapSessionId, pdu: &CoapMessage) -> CoapSendResult;

    /// Asks the transport to retransmit a confirmable message if it has not been acknowledged
    /// after `timeout` ticks.
    ///
    /// Transports that retransmit on their own report exhausted retransmissions through
    /// [CoapContext::handle_nack()](crate::CoapContext::handle_nack()).
    #[allow(unused_variables)]
    fn schedule_retransmit(&mut self, session: CoapSessionId, pdu: &CoapMessage, timeout: CoapTick) {}
}
