//! RailCom feedback core data types
//!
//! This crate provides basic data type definitions used by other railcom crates.
//! Users should not depend on this crate directly. Use the `railcom::core` reexport instead.
#![no_std]

#[derive(Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidValue;

/// Index of a detector channel
///
/// Each channel is an independent detector section with its own serial receiver.
/// The index range is limited by the width of the occupancy sample: one bit per channel.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelIndex(u8);

impl ChannelIndex {
    const MAX_VALUE: u8 = 7;
    /// Number of distinct channel indices
    pub const COUNT: usize = Self::MAX_VALUE as usize + 1;
    pub const MIN: ChannelIndex = ChannelIndex(0);
    pub const MAX: ChannelIndex = ChannelIndex(Self::MAX_VALUE);

    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX_VALUE {
            Some(Self::from_u8_truncating(value))
        } else {
            None
        }
    }

    pub const fn from_u8_truncating(value: u8) -> Self {
        Self(value & Self::MAX_VALUE)
    }

    pub const fn into_u8(self) -> u8 {
        self.0
    }

    /// Iterates over the first `count` channel indices.
    ///
    /// `count` is clamped to [`ChannelIndex::COUNT`].
    pub fn iter(count: usize) -> impl Iterator<Item = ChannelIndex> {
        let count = count.min(Self::COUNT) as u8;
        (0..count).map(ChannelIndex)
    }
}

impl From<ChannelIndex> for u8 {
    fn from(value: ChannelIndex) -> Self {
        value.into_u8()
    }
}

impl From<ChannelIndex> for usize {
    fn from(value: ChannelIndex) -> Self {
        u8::from(value).into()
    }
}

impl TryFrom<u8> for ChannelIndex {
    type Error = InvalidValue;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(InvalidValue)
    }
}

impl TryFrom<usize> for ChannelIndex {
    type Error = InvalidValue;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .ok()
            .and_then(Self::new)
            .ok_or(InvalidValue)
    }
}

/// A set of channels
///
/// Doubles as the occupancy sample format: bit `i` is set when channel `i` draws current.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelSet(u8);

impl ChannelSet {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(u8::MAX);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn into_bits(self) -> u8 {
        self.0
    }

    /// Creates a set of the first `count` channels.
    pub const fn new_lt(count: usize) -> Self {
        if count >= ChannelIndex::COUNT {
            Self::ALL
        } else {
            Self(!(u8::MAX << count))
        }
    }

    pub const fn new_eq(channel: ChannelIndex) -> Self {
        Self(1u8 << channel.into_u8())
    }

    pub const fn complement(self) -> Self {
        Self(!self.0)
    }

    pub const fn contains(&self, channel: ChannelIndex) -> bool {
        (self.0 >> channel.into_u8()) & 0x1 != 0
    }

    pub const fn insert(&mut self, channel: ChannelIndex) {
        self.0 |= Self::new_eq(channel).0
    }

    pub const fn remove(&mut self, channel: ChannelIndex) {
        self.0 &= Self::new_eq(channel).complement().0
    }

    pub const fn first(&self) -> Option<ChannelIndex> {
        ChannelIndex::new(self.0.trailing_zeros() as u8)
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == Self::NONE.0
    }
}

impl Default for ChannelSet {
    fn default() -> Self {
        ChannelSet::NONE
    }
}

impl From<ChannelIndex> for ChannelSet {
    fn from(value: ChannelIndex) -> Self {
        Self::new_eq(value)
    }
}

impl core::ops::Not for ChannelSet {
    type Output = Self;
    fn not(self) -> Self::Output {
        Self(!self.0)
    }
}

impl core::ops::BitAnd<ChannelSet> for ChannelSet {
    type Output = Self;
    fn bitand(self, rhs: ChannelSet) -> Self::Output {
        ChannelSet(self.0 & rhs.0)
    }
}

impl core::ops::BitAndAssign<ChannelSet> for ChannelSet {
    fn bitand_assign(&mut self, rhs: ChannelSet) {
        self.0 &= rhs.0
    }
}

impl core::ops::BitOr<ChannelSet> for ChannelSet {
    type Output = Self;
    fn bitor(self, rhs: ChannelSet) -> Self::Output {
        ChannelSet(self.0 | rhs.0)
    }
}

impl core::ops::BitOrAssign<ChannelSet> for ChannelSet {
    fn bitor_assign(&mut self, rhs: ChannelSet) {
        self.0 |= rhs.0;
    }
}

impl core::iter::IntoIterator for ChannelSet {
    type Item = ChannelIndex;
    type IntoIter = ChannelSetIterator;
    fn into_iter(self) -> Self::IntoIter {
        ChannelSetIterator { residual: self }
    }
}

impl core::iter::FromIterator<ChannelIndex> for ChannelSet {
    fn from_iter<I: IntoIterator<Item = ChannelIndex>>(iter: I) -> Self {
        let mut set = ChannelSet::NONE;
        for channel in iter {
            set.insert(channel);
        }
        set
    }
}

pub struct ChannelSetIterator {
    residual: ChannelSet,
}

impl core::iter::Iterator for ChannelSetIterator {
    type Item = ChannelIndex;
    fn next(&mut self) -> Option<Self::Item> {
        let first = self.residual.first();
        if let Some(channel) = first {
            self.residual.remove(channel);
        }
        first
    }
}
