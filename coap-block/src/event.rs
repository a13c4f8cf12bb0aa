// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * event.rs - Event handling traits.
 */

//! Event handling-related code

use std::fmt::Debug;

use crate::{session::CoapSession, types::CoapMessageId};

/// Reasons why a confirmable message could not be delivered.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[non_exhaustive]
pub enum CoapNackReason {
    /// The message was retransmitted MAX_RETRANSMIT times without being acknowledged.
    TooManyRetries,
    /// The session was closed while the message was still queued.
    NotDeliverable,
    /// The peer answered with a reset message.
    Rst,
    /// The (D)TLS layer of the session failed.
    TlsFailed,
    /// The transport could not send the message.
    SendFailed,
}

/// Trait for CoAP event handlers.
///
/// Implementations of this trait can be provided to a [CoapContext](crate::CoapContext) to
/// handle events relating to sessions and their block-wise transfers.
pub trait CoapEventHandler: Debug {
    /// Handle a partially received body.
    ///
    /// This event is triggered when a block-wise receive had to be abandoned (too many holes
    /// in the received body) or restarted (the representation changed while it was being
    /// transferred). `token` is the token the application used for the transfer.
    #[allow(unused_variables)]
    fn handle_partial_block(&mut self, session: &CoapSession, token: &[u8]) {}

    /// Handle a failed block-wise send.
    ///
    /// This event is triggered when a block-wise send times out, cannot be transmitted, or is
    /// replaced by a new transfer using the same token.
    #[allow(unused_variables)]
    fn handle_xmit_block_fail(&mut self, session: &CoapSession, token: &[u8]) {}

    /// Handle a confirmable message that could not be delivered.
    #[allow(unused_variables)]
    fn handle_nack(&mut self, session: &CoapSession, mid: CoapMessageId, reason: CoapNackReason) {}

    /// Handle a session closed event.
    #[allow(unused_variables)]
    fn handle_session_closed(&mut self, session: &CoapSession) {}
}

impl CoapEventHandler for () {}
