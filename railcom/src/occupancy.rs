//! Occupancy sample aggregation
//!
//! A mobile decoder draws current intermittently, so a single momentary sample may miss it.
//! The aggregator keeps the most recent raw samples and reports a channel as occupied while
//! any of them saw current draw on it.

use heapless::HistoryBuffer;

use crate::core::{ChannelIndex, ChannelSet};

/// Consumer of raw occupancy samples
pub trait OccupancySink {
    fn add_sample(&mut self, sample: ChannelSet);
}

impl<T: OccupancySink + ?Sized> OccupancySink for &mut T {
    fn add_sample(&mut self, sample: ChannelSet) {
        (**self).add_sample(sample)
    }
}

/// Rolling window over the last `DEPTH` samples
///
/// Only the channels the aggregator was created for are reported, occupied or free.
pub struct RollingOccupancy<const DEPTH: usize> {
    samples: HistoryBuffer<ChannelSet, DEPTH>,
    channels: ChannelSet,
    reported: ChannelSet,
}

impl<const DEPTH: usize> RollingOccupancy<DEPTH> {
    const _ASSERT: usize = DEPTH - 1;

    /// Creates an aggregator covering all channels.
    pub const fn new() -> Self {
        Self::with_channel_count(ChannelIndex::COUNT)
    }

    /// Creates an aggregator covering the first `count` channels.
    pub const fn with_channel_count(count: usize) -> Self {
        let _ = Self::_ASSERT;
        Self {
            samples: HistoryBuffer::new(),
            channels: ChannelSet::new_lt(count),
            reported: ChannelSet::NONE,
        }
    }

    /// Channels covered by the aggregator
    pub fn channels(&self) -> ChannelSet {
        self.channels
    }

    /// Channels that drew current in any retained sample
    pub fn occupied(&self) -> ChannelSet {
        self.samples
            .oldest_ordered()
            .fold(ChannelSet::NONE, |acc, sample| acc | *sample)
            & self.channels
    }

    /// Channels that drew current in no retained sample
    pub fn free(&self) -> ChannelSet {
        self.channels & !self.occupied()
    }

    /// The most recent raw sample
    pub fn last_sample(&self) -> Option<ChannelSet> {
        self.samples.recent().copied()
    }

    /// Returns the filtered state if it changed since the last call.
    pub fn take_change(&mut self) -> Option<ChannelSet> {
        let occupied = self.occupied();
        if occupied != self.reported {
            self.reported = occupied;
            Some(occupied)
        } else {
            None
        }
    }

    /// Forgets all samples. The next `take_change` reports the empty state if needed.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl<const DEPTH: usize> Default for RollingOccupancy<DEPTH> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const DEPTH: usize> OccupancySink for RollingOccupancy<DEPTH> {
    fn add_sample(&mut self, sample: ChannelSet) {
        self.samples.write(sample);
    }
}
