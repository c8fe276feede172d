//! RailCom receiver hardware interface
//!
//! The crate provides an interface between detector hardware and the railcom decoder.
//! Limited scope facilitates compatibility across versions.
//! Hardware support crates should depend on this crate. Decoder users should depend on
//! the `railcom` crate instead.
//!
//! The decoder drives two kinds of capabilities:
//! * `RailcomUart` is a serial receiver of a single detector channel
//! * `RailcomBoard` covers board-wide functions: the occupancy measurement mode and
//!   hardware-specific cutout policy hooks
//!
//! All methods are called from the cutout timing context, typically an interrupt handler.
//! They must not block. A receiver only reports bytes that are already buffered in hardware;
//! the decoder never waits for more data to arrive.
//!
//! Baud rate, framing and pin mapping are configured by the implementation before the
//! decoder takes ownership.

#![no_std]

pub mod uart;

pub use railcom_core::{ChannelIndex, ChannelSet};
pub use uart::{Direction, RailcomUart, RxByte};

/// Board-wide capabilities shared by all channels
pub trait RailcomBoard {
    /// Switches the detector inputs to the current measurement mode.
    ///
    /// `active_high` selects the polarity of the occupancy comparators. The decoder enables
    /// the active-low mode for the duration of a cutout.
    fn enable_measurement(&mut self, active_high: bool);

    /// Returns the detector inputs to normal operation.
    fn disable_measurement(&mut self);

    /// Takes a momentary occupancy sample.
    ///
    /// Bit `i` is set when channel `i` draws current. Only meaningful while the measurement
    /// mode is enabled.
    fn sample(&mut self) -> ChannelSet;

    /// Hardware override forcing the receivers to listen during the first cutout window.
    fn need_ch1_cutout(&self) -> bool {
        false
    }

    /// Called once the first cutout window has been drained on all channels.
    fn middle_cutout_hook(&mut self) {}
}

impl<T: RailcomBoard + ?Sized> RailcomBoard for &mut T {
    fn enable_measurement(&mut self, active_high: bool) {
        (**self).enable_measurement(active_high)
    }

    fn disable_measurement(&mut self) {
        (**self).disable_measurement()
    }

    fn sample(&mut self) -> ChannelSet {
        (**self).sample()
    }

    fn need_ch1_cutout(&self) -> bool {
        (**self).need_ch1_cutout()
    }

    fn middle_cutout_hook(&mut self) {
        (**self).middle_cutout_hook()
    }
}
