// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/reaper.rs - Expiry of stalled block-wise transfers.
 */

use log::debug;

use crate::{
    block::{BlockIo, LG_XMIT_RETAIN},
    session::CoapSession,
    types::CoapTick,
};

fn earliest(current: Option<CoapTick>, candidate: CoapTick) -> Option<CoapTick> {
    Some(current.map_or(candidate, |current| current.min(candidate)))
}

impl CoapSession {
    /// Removes all block-wise transfers that made no progress within MAX_TRANSMIT_WAIT (or,
    /// for completely sent response bodies, within the retention time).
    ///
    /// Returns the point in time at which the next record expires, if any.
    pub(crate) fn lg_timeouts(&mut self, io: &mut BlockIo) -> Option<CoapTick> {
        let now = io.now;
        let wait = self.max_transmit_wait();
        let mut next = None;

        let mut failed = Vec::new();
        let mut retired = Vec::new();
        for (base, xmit) in &self.lg_xmit {
            if let Some(all_sent) = xmit.last_all_sent {
                let expiry = all_sent + LG_XMIT_RETAIN;
                if expiry <= now {
                    retired.push(*base);
                } else {
                    next = earliest(next, expiry);
                }
                continue;
            }
            let expiry = xmit.last_sent + wait;
            if expiry <= now {
                failed.push(*base);
            } else {
                next = earliest(next, expiry);
            }
        }
        for base in retired {
            debug!("session {}: discarding completely sent body", self.id());
            self.lg_xmit.remove(&base);
        }
        for base in failed {
            if let Some(xmit) = self.lg_xmit.remove(&base) {
                self.lg_xmit_failed(io, xmit);
            }
        }

        let mut expired = Vec::new();
        for (base, crcv) in &self.lg_crcv {
            if crcv.observe_set {
                continue;
            }
            let expiry = crcv.last_used + wait;
            if expiry <= now {
                expired.push(*base);
            } else {
                next = earliest(next, expiry);
            }
        }
        for base in expired {
            debug!("session {}: response body timed out", self.id());
            self.lg_crcv.remove(&base);
        }

        let mut expired = Vec::new();
        for (key, srcv) in &self.lg_srcv {
            let expiry = srcv.last_used + wait;
            if expiry <= now {
                expired.push(key.clone());
            } else {
                next = earliest(next, expiry);
            }
        }
        for key in expired {
            debug!("session {}: request body timed out", self.id());
            self.lg_srcv.remove(&key);
        }

        next
    }
}
