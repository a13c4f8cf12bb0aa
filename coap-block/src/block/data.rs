// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/data.rs - Payload buffers of large transfers.
 */

use std::{
    fmt::{Debug, Formatter},
    ops::Deref,
};

/// Callback that receives the payload back once a large transfer no longer needs it.
pub type CoapReleaseCallback = Box<dyn FnOnce(Box<[u8]>)>;

/// Payload of a large transfer.
///
/// The engine owns the payload for as long as the transfer is in progress. When the transfer
/// completes, times out, is replaced or the session is closed, the payload is handed back to
/// the release callback (if any). This happens exactly once, when the value is dropped.
pub struct CoapLargeData {
    data: Box<[u8]>,
    release: Option<CoapReleaseCallback>,
}

impl CoapLargeData {
    pub fn new<D: Into<Box<[u8]>>>(data: D) -> CoapLargeData {
        CoapLargeData {
            data: data.into(),
            release: None,
        }
    }

    pub fn with_release<D: Into<Box<[u8]>>, F: FnOnce(Box<[u8]>) + 'static>(data: D, release: F) -> CoapLargeData {
        CoapLargeData {
            data: data.into(),
            release: Some(Box::new(release)),
        }
    }

    /// Returns the slice of the payload starting at `offset` with at most `len` bytes.
    pub fn chunk(&self, offset: usize, len: usize) -> &[u8] {
        let start = offset.min(self.data.len());
        let end = offset.saturating_add(len).min(self.data.len());
        &self.data[start..end]
    }
}

impl Deref for CoapLargeData {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl From<Vec<u8>> for CoapLargeData {
    fn from(value: Vec<u8>) -> Self {
        CoapLargeData::new(value)
    }
}

impl From<Box<[u8]>> for CoapLargeData {
    fn from(value: Box<[u8]>) -> Self {
        CoapLargeData::new(value)
    }
}

impl Debug for CoapLargeData {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoapLargeData")
            .field("len", &self.data.len())
            .field("release", &self.release.is_some())
            .finish()
    }
}

impl Drop for CoapLargeData {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(std::mem::take(&mut self.data));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, rc::Rc};

    use super::*;

    #[test]
    fn release_runs_once_on_drop() {
        let released = Rc::new(Cell::new(0));
        let counter = Rc::clone(&released);
        let data = CoapLargeData::with_release(vec![1u8, 2, 3], move |data| {
            assert_eq!(data.as_ref(), &[1, 2, 3]);
            counter.set(counter.get() + 1);
        });
        assert_eq!(data.chunk(1, 10), &[2, 3]);
        assert_eq!(data.chunk(5, 10), &[] as &[u8]);
        drop(data);
        assert_eq!(released.get(), 1);
    }
}
