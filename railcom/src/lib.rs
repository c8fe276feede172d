//! # railcom
//!
//! This library decodes RailCom feedback on multi-channel detectors in no_std environments.
//! It uses fixed-size pools and queues, requiring no dynamic memory allocation.
//!
//! The decoder is designed to run inside the cutout timing interrupt of a DCC signal
//! generator. No entry point blocks: each call drains only what the receivers have already
//! buffered, and its duration is bounded by the receiver buffer depth.
//!
//! ## Architecture
//!
//! ```text
//!  ┌──────────────────┐
//!  │ Signal generator │  start / middle / end / none
//!  └────────┬─────────┘
//!           ▼
//!  ┌──────────────────┐     ┌──────────────┐
//!  │  CutoutDecoder   ├────►│ RailcomUart  │ × N
//!  │                  ├────►│ RailcomBoard │
//!  └────────┬─────────┘     └──────────────┘
//!           │ alloc / append / commit / raise_pending_work
//!           ▼
//!  ┌──────────────────┐     ┌──────────────────┐
//!  │ FeedbackProducer ├────►│ FeedbackConsumer │  protocol task
//!  └──────────────────┘     └──────────────────┘
//! ```
//! Components:
//! * _CutoutDecoder_ runs the cutout phases, classifies received bytes and owns the
//!   uncommitted record of each channel.
//! * _RailcomUart_ and _RailcomBoard_ are the hardware capabilities, see the `railcom-driver`
//!   crate.
//! * _FeedbackQueue_ is a bounded record pool. Its producer end allocates and commits
//!   records from the interrupt; its consumer end is drained by an async task woken by the
//!   pending-work signal.
//! * _RollingOccupancy_ aggregates momentary current-draw samples.
//! * _CutoutTrace_ receives instrumentation events, e.g. for debug pins.
//!
//! ## Concurrency model
//!
//! The decoder itself is single-threaded: the signal generator serializes the phase calls.
//! A record is mutated only while the decoder holds its handle and is handed over exactly once
//! at commit, so producer and consumer never touch the same record. The queue bookkeeping is
//! guarded by an `embassy_sync` blocking mutex:
//! * _CriticalSectionRawMutex_ allows the consumer to run at a lower interrupt level or in
//!   thread mode while the decoder runs in an interrupt.
//! * _NoopRawMutex_ suffices when both ends run in the same execution context.
//!
//! ## Example
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use railcom::config::Config;
//! use railcom::cutout::CutoutDecoder;
//! use railcom::hw::{ChannelSet, Direction, RailcomBoard, RailcomUart, RxByte};
//! use railcom::queue::FeedbackQueue;
//!
//! struct Silent;
//!
//! impl RailcomUart for Silent {
//!     fn enable(&mut self) {}
//!     fn disable(&mut self) {}
//!     fn set_direction(&mut self, _direction: Direction) {}
//!     fn has_data(&self) -> bool { false }
//!     fn read(&mut self) -> RxByte { RxByte::valid(0) }
//!     fn clear_framing_error(&mut self) {}
//! }
//!
//! struct Board;
//!
//! impl RailcomBoard for Board {
//!     fn enable_measurement(&mut self, _active_high: bool) {}
//!     fn disable_measurement(&mut self) {}
//!     fn sample(&mut self) -> ChannelSet { ChannelSet::NONE }
//! }
//!
//! let mut queue = FeedbackQueue::<NoopRawMutex, 8>::new();
//! let (producer, mut consumer) = queue.split();
//! let mut decoder = CutoutDecoder::new([Silent, Silent], Board, producer, Config::default());
//!
//! decoder.enable();
//! decoder.start(false);
//! decoder.middle();
//! decoder.end();
//!
//! // A silent cutout still produces one empty record
//! let feedback = consumer.try_receive().unwrap();
//! assert!(feedback.is_empty());
//! ```
#![no_std]

pub use railcom_core as core;
pub use railcom_driver as hw;

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod config;
pub mod cutout;
pub mod feedback;
pub mod occupancy;
pub mod queue;
pub mod trace;

pub use config::Config;
pub use cutout::{CutoutDecoder, CutoutPhase};
pub use feedback::{Feedback, FeedbackSink};
pub use queue::{FeedbackConsumer, FeedbackProducer, FeedbackQueue};
