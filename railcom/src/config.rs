//! Decoder configuration

/// Receiver policy for the first cutout window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ch1Listen {
    /// Listen only when the signal generator or the board asks for it.
    ///
    /// Window 1 carries the address broadcast of the mobile decoder. A detector that does
    /// not localize decoders may skip it and keep its receivers quiet.
    #[default]
    OnRequest,
    /// Listen on every cutout
    Always,
}

/// Decoder configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub struct Config {
    pub ch1_listen: Ch1Listen,
}

impl Config {
    pub const fn new(ch1_listen: Ch1Listen) -> Self {
        Self { ch1_listen }
    }
}
