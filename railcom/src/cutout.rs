//! Cutout phase controller
//!
//! The signal generator opens a cutout in the track signal after each command packet.
//! Mobile decoders answer in two windows: window 1 carries a short address broadcast,
//! window 2 the data addressed to the command station. Every detector channel has its own
//! receiver; all channels share the cutout timeline.
//!
//! The signal generator calls the phase entry points at fixed instants:
//!
//! ```text
//!  track signal  ───┐                           ┌───
//!                   └───────────────────────────┘
//!                   ▲            ▲              ▲
//!                 start()     middle()        end()
//!                   │ window 1   │   window 2   │
//! ```
//!
//! A slot without a cutout is reported with `none()`. Each entry point only drains the bytes
//! already buffered by the receivers and returns. Every cutout yields at least one delivery:
//! a record per channel that received anything, or a single empty record for channel 0.

use railcom_driver::{Direction, RailcomBoard, RailcomUart};

use crate::config::{Ch1Listen, Config};
use crate::core::{ChannelIndex, ChannelSet};
use crate::feedback::FeedbackSink;
use crate::occupancy::OccupancySink;
use crate::trace::{CutoutTrace, NoTrace, Window};

/// Shared cutout timeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CutoutPhase {
    /// Between cutouts
    Idle,
    /// Window 1 is open
    BeforeMiddle,
    /// Window 2 is open
    AfterMiddle,
}

/// Multi-channel RailCom decoder
///
/// Owns the receivers of `N` channels, the board, the feedback sink and the trace
/// collaborator. Entry points must be called in the order `start → middle → end` or
/// `start → none`, never concurrently. None of them blocks or fails: framing errors and
/// pool exhaustion are recovered by dropping data.
pub struct CutoutDecoder<U, B, S, const N: usize, T = NoTrace>
where
    S: FeedbackSink,
{
    uarts: [U; N],
    board: B,
    sink: S,
    trace: T,
    config: Config,
    feedback_key: u32,
    records: [Option<S::Record>; N],
    phase: CutoutPhase,
}

impl<U, B, S, const N: usize> CutoutDecoder<U, B, S, N>
where
    U: RailcomUart,
    B: RailcomBoard,
    S: FeedbackSink,
{
    pub fn new(uarts: [U; N], board: B, sink: S, config: Config) -> Self {
        Self::with_trace(uarts, board, sink, NoTrace, config)
    }
}

impl<U, B, S, const N: usize, T> CutoutDecoder<U, B, S, N, T>
where
    U: RailcomUart,
    B: RailcomBoard,
    S: FeedbackSink,
    T: CutoutTrace,
{
    const _ASSERT: usize = ChannelIndex::COUNT - N;

    pub fn with_trace(uarts: [U; N], board: B, sink: S, trace: T, config: Config) -> Self {
        let _ = Self::_ASSERT;
        Self {
            uarts,
            board,
            sink,
            trace,
            config,
            feedback_key: 0,
            records: core::array::from_fn(|_| None),
            phase: CutoutPhase::Idle,
        }
    }

    /// Enables the receivers with reception turned off.
    pub fn enable(&mut self) {
        for uart in self.uarts.iter_mut() {
            uart.set_direction(Direction::Idle);
            uart.enable();
        }
    }

    pub fn disable(&mut self) {
        for uart in self.uarts.iter_mut() {
            uart.disable();
        }
    }

    /// Sets the tag copied into records of the following cutouts.
    pub fn set_feedback_key(&mut self, key: u32) {
        self.feedback_key = key;
    }

    pub fn feedback_key(&self) -> u32 {
        self.feedback_key
    }

    pub fn phase(&self) -> CutoutPhase {
        self.phase
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn uart(&self, channel: ChannelIndex) -> Option<&U> {
        self.uarts.get(usize::from(channel))
    }

    pub fn uart_mut(&mut self, channel: ChannelIndex) -> Option<&mut U> {
        self.uarts.get_mut(usize::from(channel))
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn trace(&self) -> &T {
        &self.trace
    }

    /// Channels holding an uncommitted record
    pub fn open_records(&self) -> ChannelSet {
        ChannelIndex::iter(N)
            .filter(|channel| self.records[usize::from(*channel)].is_some())
            .collect()
    }

    /// The track signal has just been cut.
    ///
    /// `need_ch1` requests window 1 reception for this cutout.
    pub fn start(&mut self, need_ch1: bool) {
        if self.phase != CutoutPhase::Idle {
            debug!("cutout start in phase {:?}", self.phase);
        }
        self.board.enable_measurement(false);
        let listen = need_ch1
            || self.config.ch1_listen == Ch1Listen::Always
            || self.board.need_ch1_cutout();
        self.trace.cutout_start(listen);

        for (uart, record) in self.uarts.iter_mut().zip(self.records.iter_mut()) {
            if listen {
                uart.set_direction(Direction::Receive);
            }
            // Line noise before the cutout must not leak into the new record
            while uart.has_data() {
                if uart.read().framing_error {
                    uart.clear_framing_error();
                }
            }
            if let Some(record) = record.take() {
                debug!("discarding record of an unfinished cutout");
                self.sink.discard(record);
            }
        }
        self.phase = CutoutPhase::BeforeMiddle;
    }

    /// Window 1 is over, window 2 begins.
    pub fn middle(&mut self) {
        if self.phase != CutoutPhase::BeforeMiddle {
            debug!("cutout middle in phase {:?}", self.phase);
        }
        self.trace.cutout_middle();

        for channel in ChannelIndex::iter(N) {
            self.drain(channel, Window::Ch1);
            let uart = &mut self.uarts[usize::from(channel)];
            uart.disable();
            uart.set_direction(Direction::Receive);
            uart.enable();
        }
        self.board.middle_cutout_hook();
        self.phase = CutoutPhase::AfterMiddle;
    }

    /// The track signal is restored. Commits the records of this cutout.
    pub fn end(&mut self) {
        if self.phase != CutoutPhase::AfterMiddle {
            debug!("cutout end in phase {:?}", self.phase);
        }
        self.board.disable_measurement();

        let mut delivered = ChannelSet::NONE;
        for channel in ChannelIndex::iter(N) {
            self.drain(channel, Window::Ch2);
            let idx = usize::from(channel);
            self.uarts[idx].set_direction(Direction::Idle);
            if let Some(record) = self.records[idx].take() {
                self.sink.commit(record);
                self.sink.raise_pending_work();
                self.trace.record_committed(channel);
                delivered.insert(channel);
            }
        }
        if delivered.is_empty() {
            self.deliver_empty();
        }
        trace!("cutout end, delivered {:#x}", delivered.into_bits());

        self.trace.cutout_end();
        self.phase = CutoutPhase::Idle;
    }

    /// The slot had no cutout. Delivers an empty record to keep the consumer cadence.
    pub fn none(&mut self) {
        if self.phase == CutoutPhase::AfterMiddle {
            debug!("no cutout after cutout middle");
        }
        for record in self.records.iter_mut() {
            if let Some(record) = record.take() {
                self.sink.discard(record);
            }
        }
        self.trace.no_cutout();
        self.deliver_empty();
        self.phase = CutoutPhase::Idle;
    }

    /// Takes a momentary occupancy sample and forwards it to `aggregator`.
    ///
    /// Independent of the cutout phase. Bits of absent channels are cleared.
    pub fn sample_occupancy(&mut self, aggregator: &mut impl OccupancySink) {
        self.board.enable_measurement(true);
        let sample = self.board.sample();
        self.board.disable_measurement();
        aggregator.add_sample(sample & ChannelSet::new_lt(N));
    }

    /// Moves the buffered bytes of a channel into its record.
    fn drain(&mut self, channel: ChannelIndex, window: Window) {
        let idx = usize::from(channel);
        let uart = &mut self.uarts[idx];
        let slot = &mut self.records[idx];

        while uart.has_data() {
            // Allocation precedes the framing check: a channel whose only byte is corrupted
            // still delivers an (empty) record.
            if slot.is_none() {
                *slot = self.sink.alloc(channel, self.feedback_key);
            }
            let Some(record) = slot.as_mut() else {
                self.trace.alloc_failed(channel, window);
                break;
            };

            let rx = uart.read();
            if rx.framing_error {
                self.trace.framing_error(channel, window);
                if window == Window::Ch1 {
                    // Colliding window 1 broadcasts leave the receiver out of sync with the
                    // transmitter. Restart it while the line is between bytes.
                    uart.set_direction(Direction::Idle);
                }
                uart.clear_framing_error();
                continue;
            }

            match window {
                Window::Ch1 => self.sink.push_ch1(record, rx.data),
                Window::Ch2 => self.sink.push_ch2(record, rx.data),
            }
            self.trace.byte_received(channel, window, rx.data);
        }
    }

    /// Delivers an empty record for channel 0.
    fn deliver_empty(&mut self) {
        match self.sink.alloc_reserved(ChannelIndex::MIN, self.feedback_key) {
            Some(record) => {
                self.sink.commit(record);
                self.sink.raise_pending_work();
                self.trace.empty_delivery();
            }
            None => {
                warn!("no free feedback record, cutout delivery lost");
                self.trace.delivery_missed();
            }
        }
    }
}

impl<U, B, S, const N: usize, T> Drop for CutoutDecoder<U, B, S, N, T>
where
    S: FeedbackSink,
{
    fn drop(&mut self) {
        // Uncommitted records go back to the pool
        for record in self.records.iter_mut() {
            if let Some(record) = record.take() {
                self.sink.discard(record);
            }
        }
    }
}
