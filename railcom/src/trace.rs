//! Decoder instrumentation
//!
//! The decoder reports every notable step to a `CutoutTrace` collaborator. Boards typically
//! map these calls to debug pins to observe cutout timing on a logic analyzer. `NoTrace`
//! compiles to nothing.

use crate::core::ChannelIndex;

/// Cutout window a byte was received in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Window {
    /// Window 1, the short address broadcast
    Ch1,
    /// Window 2, the data window
    Ch2,
}

/// Receives decoder events. All methods default to no-ops.
///
/// Called from the cutout timing context: implementations must be short and must not block.
pub trait CutoutTrace {
    /// Cutout started. `listening` tells whether the receivers listen in window 1.
    fn cutout_start(&mut self, _listening: bool) {}

    fn cutout_middle(&mut self) {}

    fn cutout_end(&mut self) {}

    /// The slot had no cutout at all.
    fn no_cutout(&mut self) {}

    /// A byte with valid framing was stored.
    fn byte_received(&mut self, _channel: ChannelIndex, _window: Window, _byte: u8) {}

    /// A byte was discarded because of a framing error.
    fn framing_error(&mut self, _channel: ChannelIndex, _window: Window) {}

    /// No record was available; the channel stops draining for the rest of the window.
    fn alloc_failed(&mut self, _channel: ChannelIndex, _window: Window) {}

    fn record_committed(&mut self, _channel: ChannelIndex) {}

    /// No channel produced a record; an empty one was delivered instead.
    fn empty_delivery(&mut self) {}

    /// The empty delivery could not be allocated.
    fn delivery_missed(&mut self) {}
}

impl<T: CutoutTrace + ?Sized> CutoutTrace for &mut T {
    fn cutout_start(&mut self, listening: bool) {
        (**self).cutout_start(listening)
    }

    fn cutout_middle(&mut self) {
        (**self).cutout_middle()
    }

    fn cutout_end(&mut self) {
        (**self).cutout_end()
    }

    fn no_cutout(&mut self) {
        (**self).no_cutout()
    }

    fn byte_received(&mut self, channel: ChannelIndex, window: Window, byte: u8) {
        (**self).byte_received(channel, window, byte)
    }

    fn framing_error(&mut self, channel: ChannelIndex, window: Window) {
        (**self).framing_error(channel, window)
    }

    fn alloc_failed(&mut self, channel: ChannelIndex, window: Window) {
        (**self).alloc_failed(channel, window)
    }

    fn record_committed(&mut self, channel: ChannelIndex) {
        (**self).record_committed(channel)
    }

    fn empty_delivery(&mut self) {
        (**self).empty_delivery()
    }

    fn delivery_missed(&mut self) {
        (**self).delivery_missed()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTrace;

impl CutoutTrace for NoTrace {}

/// Window 2 line value counted separately. Not a valid 4/8 code; it is a frequent
/// artefact of colliding transmitters.
pub const COLLISION_PATTERN: u8 = 0xe0;

/// Event counters
///
/// Counters wrap on overflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TraceCounters {
    pub cutouts: u32,
    pub no_cutouts: u32,
    pub ch1_bytes: u32,
    pub ch2_bytes: u32,
    /// Window 2 bytes equal to [`COLLISION_PATTERN`]
    pub collision_patterns: u32,
    pub framing_errors: u32,
    pub alloc_failures: u32,
    pub records: u32,
    pub empty_deliveries: u32,
    pub missed_deliveries: u32,
}

impl TraceCounters {
    pub const fn new() -> Self {
        Self {
            cutouts: 0,
            no_cutouts: 0,
            ch1_bytes: 0,
            ch2_bytes: 0,
            collision_patterns: 0,
            framing_errors: 0,
            alloc_failures: 0,
            records: 0,
            empty_deliveries: 0,
            missed_deliveries: 0,
        }
    }
}

fn bump(counter: &mut u32) {
    *counter = counter.wrapping_add(1);
}

impl CutoutTrace for TraceCounters {
    fn cutout_start(&mut self, _listening: bool) {
        bump(&mut self.cutouts);
    }

    fn no_cutout(&mut self) {
        bump(&mut self.no_cutouts);
    }

    fn byte_received(&mut self, _channel: ChannelIndex, window: Window, byte: u8) {
        match window {
            Window::Ch1 => bump(&mut self.ch1_bytes),
            Window::Ch2 => {
                bump(&mut self.ch2_bytes);
                if byte == COLLISION_PATTERN {
                    bump(&mut self.collision_patterns);
                }
            }
        }
    }

    fn framing_error(&mut self, _channel: ChannelIndex, _window: Window) {
        bump(&mut self.framing_errors);
    }

    fn alloc_failed(&mut self, _channel: ChannelIndex, _window: Window) {
        bump(&mut self.alloc_failures);
    }

    fn record_committed(&mut self, _channel: ChannelIndex) {
        bump(&mut self.records);
    }

    fn empty_delivery(&mut self) {
        bump(&mut self.empty_deliveries);
    }

    fn delivery_missed(&mut self) {
        bump(&mut self.missed_deliveries);
    }
}
