//! Feedback record and the delivery contract of the decoder

use heapless::Vec;

use crate::core::ChannelIndex;

/// Maximum payload of the first cutout window
pub const CH1_CAPACITY: usize = 2;
/// Maximum payload of the second cutout window
pub const CH2_CAPACITY: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PayloadFull;

/// Decoded data of a single channel for a single cutout
///
/// Payload bytes are stored as received; 4/8 decoding is left to the protocol layer.
/// A record with no payload at all is a valid delivery: it tells the consumer that the
/// cutout took place.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Feedback {
    pub channel: ChannelIndex,
    /// Opaque tag of the track command that preceded the cutout
    pub feedback_key: u32,
    pub ch1: Vec<u8, CH1_CAPACITY>,
    pub ch2: Vec<u8, CH2_CAPACITY>,
}

impl Feedback {
    pub const fn new(channel: ChannelIndex, feedback_key: u32) -> Self {
        Self {
            channel,
            feedback_key,
            ch1: Vec::new(),
            ch2: Vec::new(),
        }
    }

    /// Resets the record for reuse.
    pub fn reset(&mut self, channel: ChannelIndex, feedback_key: u32) {
        self.channel = channel;
        self.feedback_key = feedback_key;
        self.ch1.clear();
        self.ch2.clear();
    }

    pub fn add_ch1_data(&mut self, byte: u8) -> Result<(), PayloadFull> {
        self.ch1.push(byte).map_err(|_| PayloadFull)
    }

    pub fn add_ch2_data(&mut self, byte: u8) -> Result<(), PayloadFull> {
        self.ch2.push(byte).map_err(|_| PayloadFull)
    }

    pub fn is_empty(&self) -> bool {
        self.ch1.is_empty() && self.ch2.is_empty()
    }
}

impl Default for Feedback {
    fn default() -> Self {
        Self::new(ChannelIndex::MIN, 0)
    }
}

/// Record allocator and delivery queue as seen by the decoder
///
/// All methods are called from the cutout timing context and must not block.
///
/// A `Record` handle is owned by the decoder until it is passed to `commit`. The handle
/// cannot be used afterwards, so committed records are never mutated.
pub trait FeedbackSink {
    /// Handle of an owned record. Only valid with the sink that allocated it.
    type Record;

    /// Allocates an empty record. Returns `None` if the pool is exhausted.
    fn alloc(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<Self::Record>;

    /// Allocates the record of an empty delivery.
    ///
    /// Implementations may keep spare capacity for this call so that every cutout produces
    /// a delivery.
    fn alloc_reserved(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<Self::Record> {
        self.alloc(channel, feedback_key)
    }

    fn push_ch1(&mut self, record: &mut Self::Record, byte: u8);

    fn push_ch2(&mut self, record: &mut Self::Record, byte: u8);

    /// Hands the record over to the consumer.
    fn commit(&mut self, record: Self::Record);

    /// Wakes the consumer to drain committed records.
    fn raise_pending_work(&mut self);

    /// Returns an uncommitted record to the pool without delivering it.
    ///
    /// Only used when the cutout sequence was broken off.
    fn discard(&mut self, record: Self::Record) {
        let _ = record;
    }
}
