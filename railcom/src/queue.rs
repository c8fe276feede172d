//! Bounded feedback record pool shared between the decoder and its consumer
//!
//! The queue owns a fixed array of `N` records. A slot is always in one of three states:
//! * free: available for allocation
//! * owned: allocated by the producer and being filled; only the producer has its handle
//! * ready: committed and waiting for the consumer
//!
//! The producer runs in the cutout timing context, the consumer in a task woken by the
//! pending-work signal. Both sides only touch a slot while they own it, so the mutex is
//! held just for index bookkeeping and single-byte appends. All critical sections are O(1).
//!
//! ## Examples
//!
//! ```
//! use embassy_sync::blocking_mutex::raw::NoopRawMutex;
//! use railcom::core::ChannelIndex;
//! use railcom::feedback::FeedbackSink;
//! use railcom::queue::FeedbackQueue;
//!
//! let mut queue = FeedbackQueue::<NoopRawMutex, 4>::new();
//! let (mut producer, mut consumer) = queue.split();
//!
//! let mut record = producer.alloc(ChannelIndex::MIN, 0).unwrap();
//! producer.push_ch2(&mut record, 0xa5);
//! producer.commit(record);
//! producer.raise_pending_work();
//!
//! let feedback = consumer.try_receive().unwrap();
//! assert_eq!(feedback.ch2.as_slice(), &[0xa5]);
//! ```

use core::cell::RefCell;
use core::future::poll_fn;
use core::task::Poll;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::waitqueue::WakerRegistration;
use heapless::Deque;

use crate::core::ChannelIndex;
use crate::feedback::{Feedback, FeedbackSink};

/// Number of slots regular allocations leave untouched
pub const RESERVED_SLOTS: usize = 1;

pub const MAX_CAPACITY: usize = u8::MAX as usize + 1;

/// Handle of an owned record
///
/// Not clonable: passing it to `commit` gives up access to the record.
/// The handle is only valid with the producer of the queue that allocated it.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FeedbackSlot {
    idx: u8,
    queue: usize,
}

struct State<const N: usize> {
    slots: [Feedback; N],
    free: Deque<u8, N>,
    ready: Deque<u8, N>,
    consumer: WakerRegistration,
    overruns: u32,
}

impl<const N: usize> State<N> {
    fn take_free(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<u8> {
        let idx = self.free.pop_front()?;
        self.slots[usize::from(idx)].reset(channel, feedback_key);
        Some(idx)
    }

    fn pop_ready(&mut self) -> Option<Feedback> {
        let idx = self.ready.pop_front()?;
        let feedback = self.slots[usize::from(idx)].clone();
        unwrap!(self.free.push_back(idx));
        Some(feedback)
    }
}

/// Fixed capacity pool of feedback records with a FIFO hand-off
pub struct FeedbackQueue<M: RawMutex, const N: usize> {
    state: Mutex<M, RefCell<State<N>>>,
}

impl<M: RawMutex, const N: usize> FeedbackQueue<M, N> {
    const _ASSERT_MIN: usize = N - RESERVED_SLOTS - 1;
    const _ASSERT_MAX: usize = MAX_CAPACITY - N;

    pub fn new() -> Self {
        let _ = (Self::_ASSERT_MIN, Self::_ASSERT_MAX);

        let mut free = Deque::new();
        for i in 0..N {
            let idx = unwrap!(u8::try_from(i));
            unwrap!(free.push_back(idx));
        }

        Self {
            state: Mutex::new(RefCell::new(State {
                slots: core::array::from_fn(|_| Feedback::default()),
                free,
                ready: Deque::new(),
                consumer: WakerRegistration::new(),
                overruns: 0,
            })),
        }
    }

    /// Splits the queue into its producer and consumer ends.
    pub fn split(&mut self) -> (FeedbackProducer<'_, M, N>, FeedbackConsumer<'_, M, N>) {
        let queue = &*self;
        (FeedbackProducer { queue }, FeedbackConsumer { queue })
    }

    fn id(&self) -> usize {
        core::ptr::from_ref(self).addr()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut State<N>) -> R) -> R {
        self.state.lock(|cell| f(&mut cell.borrow_mut()))
    }
}

impl<M: RawMutex, const N: usize> Default for FeedbackQueue<M, N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer end, handed to the decoder
pub struct FeedbackProducer<'a, M: RawMutex, const N: usize> {
    queue: &'a FeedbackQueue<M, N>,
}

impl<'a, M: RawMutex, const N: usize> FeedbackProducer<'a, M, N> {
    fn slot(&self, idx: u8) -> FeedbackSlot {
        FeedbackSlot {
            idx,
            queue: self.queue.id(),
        }
    }

    /// Index of an owned slot of this queue.
    fn owned_index(&self, record: &FeedbackSlot) -> u8 {
        assert!(
            record.queue == self.queue.id(),
            "feedback slot from another queue"
        );
        record.idx
    }
}

impl<'a, M: RawMutex, const N: usize> FeedbackSink for FeedbackProducer<'a, M, N> {
    type Record = FeedbackSlot;

    fn alloc(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<FeedbackSlot> {
        let idx = self.queue.with_state(|state| {
            if state.free.len() > RESERVED_SLOTS {
                state.take_free(channel, feedback_key)
            } else {
                None
            }
        })?;
        Some(self.slot(idx))
    }

    fn alloc_reserved(&mut self, channel: ChannelIndex, feedback_key: u32) -> Option<FeedbackSlot> {
        let idx = self.queue.with_state(|state| {
            let idx = state.take_free(channel, feedback_key);
            if idx.is_none() {
                state.overruns = state.overruns.wrapping_add(1);
            }
            idx
        })?;
        Some(self.slot(idx))
    }

    fn push_ch1(&mut self, record: &mut FeedbackSlot, byte: u8) {
        let idx = usize::from(self.owned_index(record));
        let overflow = self
            .queue
            .with_state(|state| state.slots[idx].add_ch1_data(byte).is_err());
        if overflow {
            trace!("window 1 payload full, dropped {:#x}", byte);
        }
    }

    fn push_ch2(&mut self, record: &mut FeedbackSlot, byte: u8) {
        let idx = usize::from(self.owned_index(record));
        let overflow = self
            .queue
            .with_state(|state| state.slots[idx].add_ch2_data(byte).is_err());
        if overflow {
            trace!("window 2 payload full, dropped {:#x}", byte);
        }
    }

    fn commit(&mut self, record: FeedbackSlot) {
        let idx = self.owned_index(&record);
        self.queue.with_state(|state| {
            // Every index is either free, owned or ready, so the ready deque never overflows
            unwrap!(state.ready.push_back(idx));
        });
    }

    fn raise_pending_work(&mut self) {
        self.queue.with_state(|state| state.consumer.wake());
    }

    fn discard(&mut self, record: FeedbackSlot) {
        let idx = self.owned_index(&record);
        self.queue.with_state(|state| {
            unwrap!(state.free.push_back(idx));
        });
    }
}

/// Consumer end, drained by the task that forwards feedback to the protocol layer
pub struct FeedbackConsumer<'a, M: RawMutex, const N: usize> {
    queue: &'a FeedbackQueue<M, N>,
}

impl<'a, M: RawMutex, const N: usize> FeedbackConsumer<'a, M, N> {
    /// Pops the oldest committed record, if any. The slot returns to the pool.
    pub fn try_receive(&mut self) -> Option<Feedback> {
        self.queue.with_state(State::pop_ready)
    }

    /// Asynchronously waits for the next committed record. Safe to drop.
    ///
    /// The task is woken by the producer's pending-work signal.
    pub async fn receive(&mut self) -> Feedback {
        poll_fn(|cx| {
            self.queue.with_state(|state| {
                if let Some(feedback) = state.pop_ready() {
                    Poll::Ready(feedback)
                } else {
                    // Registered under the lock, so a later pending-work signal cannot be missed
                    state.consumer.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// Number of committed records waiting to be received
    pub fn len(&self) -> usize {
        self.queue.with_state(|state| state.ready.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of cutouts whose delivery was lost because no slot was free
    pub fn overrun_count(&self) -> u32 {
        self.queue.with_state(|state| state.overruns)
    }
}
