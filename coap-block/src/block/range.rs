// SPDX-License-Identifier: BSD-2-Clause
/*
 * Copyright © The libcoap-rs Contributors, all rights reserved.
 * This file is part of the libcoap-rs project, see the README file for
 * general information on this project and the NOTICE.md and LICENSE files
 * for information regarding copyright ownership and terms of use.
 *
 * block/range.rs - Sets of received block ranges.
 */

use crate::error::BlockError;

/// Maximum number of disjoint ranges a [RangeSet] can hold.
pub const RBLOCK_CNT: usize = 4;

/// Inclusive range of block numbers.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct BlockRange {
    pub begin: u32,
    pub end: u32,
}

/// Ordered set of received block numbers, stored as at most [RBLOCK_CNT] inclusive ranges.
///
/// Ranges are kept ordered, non-overlapping and non-adjacent: adjacent ranges are merged on
/// insertion.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RangeSet {
    ranges: Vec<BlockRange>,
}

impl RangeSet {
    pub fn new() -> RangeSet {
        RangeSet {
            ranges: Vec::with_capacity(RBLOCK_CNT),
        }
    }

    /// Inserts a single block number.
    ///
    /// Returns `Ok(false)` if the block was already present.
    pub fn insert(&mut self, num: u32) -> Result<bool, BlockError> {
        self.insert_range(num, num)
    }

    /// Inserts all block numbers from `begin` to `end` (inclusive).
    ///
    /// Returns `Ok(false)` if all of them were already present, and
    /// [BlockError::TooManyHoles] if the range can neither be merged into an existing one nor
    /// stored separately. The set is unchanged in both cases.
    pub fn insert_range(&mut self, begin: u32, end: u32) -> Result<bool, BlockError> {
        let (begin, end) = (begin.min(end), begin.max(end));
        if self.ranges.iter().any(|r| r.begin <= begin && end <= r.end) {
            return Ok(false);
        }
        // Ranges overlapping or directly adjacent to the new one.
        let first = self.ranges.partition_point(|r| r.end.saturating_add(1) < begin);
        let last = self.ranges.partition_point(|r| r.begin <= end.saturating_add(1));
        if first == last {
            if self.ranges.len() == RBLOCK_CNT {
                return Err(BlockError::TooManyHoles);
            }
            self.ranges.insert(first, BlockRange { begin, end });
            return Ok(true);
        }
        let merged = BlockRange {
            begin: begin.min(self.ranges[first].begin),
            end: end.max(self.ranges[last - 1].end),
        };
        self.ranges.drain(first..last);
        self.ranges.insert(first, merged);
        Ok(true)
    }

    pub fn contains(&self, num: u32) -> bool {
        self.ranges.iter().any(|r| r.begin <= num && num <= r.end)
    }

    /// Returns whether all blocks from 0 up to and including `last` have been received.
    pub fn complete_through(&self, last: u32) -> bool {
        matches!(self.ranges.first(), Some(r) if r.begin == 0 && r.end >= last)
    }

    /// Returns the lowest block number that has not been received yet.
    pub fn first_missing(&self) -> u32 {
        match self.ranges.first() {
            Some(r) if r.begin == 0 => r.end.saturating_add(1),
            _ => 0,
        }
    }

    pub fn ranges(&self) -> &[BlockRange] {
        &self.ranges
    }

    /// Number of ranges currently in use.
    pub fn used(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Converts all ranges to a block size that is `2^shift` times smaller.
    pub fn rescale_down(&mut self, shift: u8) {
        for range in &mut self.ranges {
            range.begin <<= shift;
            range.end = ((range.end + 1) << shift) - 1;
        }
    }
}
