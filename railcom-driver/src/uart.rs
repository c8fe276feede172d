//! Per-channel serial receiver

/// Receiver transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// The receiver ignores the line
    Idle,
    /// The receiver samples the line and buffers complete bytes
    Receive,
}

/// A received byte together with its line status
///
/// Hardware families expose the framing error flag differently: a separate status register,
/// an extra data register bit, or a FIFO entry tag. Implementations must sample data and
/// status as a single unit so the flag always refers to the returned byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxByte {
    pub data: u8,
    /// The stop bit was not detected. Typically caused by several transmitters
    /// talking over each other.
    pub framing_error: bool,
}

impl RxByte {
    pub const fn valid(data: u8) -> Self {
        Self {
            data,
            framing_error: false,
        }
    }

    pub const fn corrupted(data: u8) -> Self {
        Self {
            data,
            framing_error: true,
        }
    }
}

/// Serial receiver of a single detector channel
pub trait RailcomUart {
    /// Enables the peripheral. Reception additionally requires `Direction::Receive`.
    fn enable(&mut self);

    fn disable(&mut self);

    fn set_direction(&mut self, direction: Direction);

    /// Returns true if a received byte is buffered. Never waits.
    fn has_data(&self) -> bool;

    /// Pops the oldest buffered byte with its status.
    ///
    /// Called only after `has_data` returned true.
    fn read(&mut self) -> RxByte;

    /// Clears a latched framing error so that reception can continue.
    fn clear_framing_error(&mut self);
}

impl<T: RailcomUart + ?Sized> RailcomUart for &mut T {
    fn enable(&mut self) {
        (**self).enable()
    }

    fn disable(&mut self) {
        (**self).disable()
    }

    fn set_direction(&mut self, direction: Direction) {
        (**self).set_direction(direction)
    }

    fn has_data(&self) -> bool {
        (**self).has_data()
    }

    fn read(&mut self) -> RxByte {
        (**self).read()
    }

    fn clear_framing_error(&mut self) {
        (**self).clear_framing_error()
    }
}
