// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/mod.rs - Block-wise transfers.
 */

//! Block-wise transfers ([RFC 7959](https://datatracker.ietf.org/doc/html/rfc7959)), including
//! BERT ([RFC 8323, Section 6](https://datatracker.ietf.org/doc/html/rfc8323#section-6)).
//!
//! Large bodies are tracked by three kinds of records that belong to a
//! [CoapSession](crate::CoapSession):
//! - `LgXmit` for bodies this endpoint sends (request bodies using Block1, response bodies
//!   using Block2),
//! - `LgCrcv` for response bodies received as a client,
//! - `LgSrcv` for request bodies received as a server.
//!
//! Records that make no progress are removed by the timeout reaper.

pub use body::BodyBuffer;
pub(crate) use crcv::LgCrcv;
pub use data::{CoapLargeData, CoapReleaseCallback};
pub(crate) use option::check_block_range;
pub use option::{szx_to_size, CoapBlock, COAP_BERT_BLOCK_SIZE, COAP_BERT_SZX, COAP_BLOCK_MAX_NUM};
pub use range::{BlockRange, RangeSet, RBLOCK_CNT};
pub(crate) use srcv::{LgSrcv, SrcvKey};
pub use token::{StateToken, STATE_TOKEN_BASE_MASK};
pub(crate) use xmit::{LgXmit, XmitOutcome, LG_XMIT_RETAIN};

use crate::{event::CoapEventHandler, transport::CoapTransport, types::CoapTick};

mod body;
mod crcv;
mod data;
mod option;
mod range;
mod reaper;
mod srcv;
mod token;
mod xmit;

/// Collaborators a session needs while processing a message or timeout.
pub(crate) struct BlockIo<'a> {
    pub(crate) transport: &'a mut dyn CoapTransport,
    pub(crate) events: &'a mut dyn CoapEventHandler,
    pub(crate) now: CoapTick,
}
