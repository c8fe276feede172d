#![allow(dead_code)]

use railcom::Feedback;
use railcom::core::{ChannelIndex, ChannelSet};
use railcom::feedback::FeedbackSink;
use railcom::hw::{Direction, RailcomBoard, RailcomUart, RxByte};
use std::collections::VecDeque;

pub fn ch(value: u8) -> ChannelIndex {
    ChannelIndex::new(value).unwrap()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UartEvent {
    Enable,
    Disable,
    Direction(Direction),
    ClearFramingError,
}

/// Receiver with a scripted hardware buffer
///
/// Bytes are buffered regardless of the direction so tests control exactly what each
/// phase finds.
#[derive(Debug)]
pub struct MockUart {
    pub rx: VecDeque<RxByte>,
    pub enabled: bool,
    pub direction: Direction,
    pub framing_error: bool,
    pub events: Vec<UartEvent>,
}

impl MockUart {
    pub fn new() -> Self {
        Self {
            rx: VecDeque::new(),
            enabled: false,
            direction: Direction::Idle,
            framing_error: false,
            events: Vec::new(),
        }
    }

    pub fn receive(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied().map(RxByte::valid));
    }

    pub fn receive_corrupted(&mut self, byte: u8) {
        self.rx.push_back(RxByte::corrupted(byte));
    }

    pub fn count(&self, event: UartEvent) -> usize {
        self.events.iter().filter(|e| **e == event).count()
    }
}

impl RailcomUart for MockUart {
    fn enable(&mut self) {
        self.enabled = true;
        self.events.push(UartEvent::Enable);
    }

    fn disable(&mut self) {
        self.enabled = false;
        self.events.push(UartEvent::Disable);
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.events.push(UartEvent::Direction(direction));
    }

    fn has_data(&self) -> bool {
        !self.rx.is_empty()
    }

    fn read(&mut self) -> RxByte {
        let byte = self.rx.pop_front().expect("read without data");
        self.framing_error |= byte.framing_error;
        byte
    }

    fn clear_framing_error(&mut self) {
        self.framing_error = false;
        self.events.push(UartEvent::ClearFramingError);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    EnableMeasurement { active_high: bool },
    DisableMeasurement,
    Sample,
    MiddleHook,
}

#[derive(Debug, Default)]
pub struct MockBoard {
    pub need_ch1: bool,
    pub sample: ChannelSet,
    pub events: Vec<BoardEvent>,
}

impl RailcomBoard for MockBoard {
    fn enable_measurement(&mut self, active_high: bool) {
        self.events
            .push(BoardEvent::EnableMeasurement { active_high });
    }

    fn disable_measurement(&mut self) {
        self.events.push(BoardEvent::DisableMeasurement);
    }

    fn sample(&mut self) -> ChannelSet {
        self.events.push(BoardEvent::Sample);
        self.sample
    }

    fn need_ch1_cutout(&self) -> bool {
        self.need_ch1
    }

    fn middle_cutout_hook(&mut self) {
        self.events.push(BoardEvent::MiddleHook);
    }
}

/// Handle of a record in `RecordingSink`
#[derive(Debug)]
pub struct Handle(usize);

/// Sink that keeps every record and counts signals
#[derive(Debug, Default)]
pub struct RecordingSink {
    /// Number of allocations that succeed; unlimited if `None`
    pub alloc_limit: Option<usize>,
    pub allocs: usize,
    pub records: Vec<Feedback>,
    pub committed: Vec<Feedback>,
    pub pending_signals: usize,
    pub discarded: usize,
}

impl RecordingSink {
    pub fn with_alloc_limit(limit: usize) -> Self {
        Self {
            alloc_limit: Some(limit),
            ..Default::default()
        }
    }
}

impl FeedbackSink for RecordingSink {
    type Record = Handle;

    fn alloc(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<Handle> {
        if self.alloc_limit.is_some_and(|limit| self.allocs >= limit) {
            return None;
        }
        self.allocs += 1;
        self.records.push(Feedback::new(channel, feedback_key));
        Some(Handle(self.records.len() - 1))
    }

    fn push_ch1(&mut self, record: &mut Handle, byte: u8) {
        let _ = self.records[record.0].add_ch1_data(byte);
    }

    fn push_ch2(&mut self, record: &mut Handle, byte: u8) {
        let _ = self.records[record.0].add_ch2_data(byte);
    }

    fn commit(&mut self, record: Handle) {
        self.committed.push(self.records[record.0].clone());
    }

    fn raise_pending_work(&mut self) {
        self.pending_signals += 1;
    }

    fn discard(&mut self, _record: Handle) {
        self.discarded += 1;
    }
}
