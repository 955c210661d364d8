//! Bounded-buffer channel behind one mailbox
//!
//! A ring of K + 1 fixed-size cells. One cell always stays empty, so
//! `start == end` means empty and `(end + 1) % (K + 1) == start` means full.
//!
//! Two semaphores gate access: `empty` counts free cells, `full` counts
//! stored messages. Cell contents and cursor moves happen only under the
//! channel lock, which is taken after the semaphore wait and released
//! before the paired signal. The cursors are mirrored in atomics so that
//! `is_full` can be answered without the lock.

use core::sync::atomic::{AtomicUsize, Ordering};

use alloc::boxed::Box;
use alloc::vec;

use crate::platform::{Platform, Semaphore};
use crate::sync::{LockCell, LockCellGuard};

/// One stored message
struct Cell {
    len: usize,
    bytes: Box<[u8]>,
}

/// Cell storage, owned by the channel lock
pub(crate) struct Ring {
    cells: Box<[Cell]>,
}

pub(crate) type RingGuard<'a, P> = LockCellGuard<'a, <P as Platform>::Lock, Ring>;

pub(crate) struct Channel<P: Platform> {
    ring: LockCell<P::Lock, Ring>,
    start: AtomicUsize,
    end: AtomicUsize,
    /// Stored messages
    full: P::Semaphore,
    /// Free cells
    empty: P::Semaphore,
    capacity: usize,
}

impl<P: Platform> Channel<P> {
    pub(crate) fn new(capacity: usize, max_message_len: usize) -> Self {
        let cells = (0..=capacity)
            .map(|_| Cell {
                len: 0,
                bytes: vec![0u8; max_message_len].into_boxed_slice(),
            })
            .collect();

        Self {
            ring: LockCell::new(Ring { cells }),
            start: AtomicUsize::new(0),
            end: AtomicUsize::new(0),
            full: P::Semaphore::new(0),
            empty: P::Semaphore::new(capacity),
            capacity,
        }
    }

    /// Ring length: capacity plus the sentinel cell
    #[inline]
    fn slots(&self) -> usize {
        self.capacity + 1
    }

    pub(crate) fn lock(&self) -> RingGuard<'_, P> {
        self.ring.lock()
    }

    /// Block until a cell is free
    pub(crate) fn reserve_cell(&self) {
        self.empty.down();
    }

    /// Wake one receiver
    pub(crate) fn publish(&self) {
        self.full.up();
    }

    /// Block until a message is stored
    pub(crate) fn reserve_message(&self) {
        self.full.down();
    }

    /// Wake one sender
    pub(crate) fn release_cell(&self) {
        self.empty.up();
    }

    /// Store `data` at `end`, truncated to the cell size. The caller holds
    /// a free cell (`reserve_cell`) and the lock. Returns the stored length.
    pub(crate) fn write(&self, ring: &mut Ring, data: &[u8]) -> usize {
        let end = self.end.load(Ordering::Acquire);
        let cell = &mut ring.cells[end];
        let len = data.len().min(cell.bytes.len());
        cell.bytes[..len].copy_from_slice(&data[..len]);
        cell.len = len;
        self.end.store((end + 1) % self.slots(), Ordering::Release);
        len
    }

    /// Copy the message at `start` into `out`, truncated to `out.len()`.
    /// The caller holds a stored message (`reserve_message`) and the lock.
    /// Returns the copied length and the stored length.
    pub(crate) fn read(&self, ring: &mut Ring, out: &mut [u8]) -> (usize, usize) {
        let start = self.start.load(Ordering::Acquire);
        let cell = &mut ring.cells[start];
        let len = cell.len.min(out.len());
        out[..len].copy_from_slice(&cell.bytes[..len]);
        let stored = cell.len;
        cell.len = 0;
        self.start.store((start + 1) % self.slots(), Ordering::Release);
        (len, stored)
    }

    /// Length of the message at `start`. Only meaningful with a stored
    /// message reserved.
    pub(crate) fn peek_len(&self, ring: &Ring) -> usize {
        ring.cells[self.start.load(Ordering::Acquire)].len
    }

    /// Discard every message and restore the empty-channel counts.
    /// The caller holds the lock and no task may be blocked on the channel.
    pub(crate) fn reset(&self, ring: &mut Ring) {
        for cell in ring.cells.iter_mut() {
            cell.len = 0;
        }
        self.start.store(0, Ordering::Release);
        self.end.store(0, Ordering::Release);
        self.full.init(0);
        self.empty.init(self.capacity);
    }

    /// Point-in-time full check; not a synchronization primitive
    pub(crate) fn is_full(&self) -> bool {
        let start = self.start.load(Ordering::Acquire);
        let end = self.end.load(Ordering::Acquire);
        (end + 1) % self.slots() == start
    }

    /// `full` semaphore count: messages receivers may take
    pub(crate) fn stored(&self) -> usize {
        self.full.count()
    }

    /// `empty` semaphore count: cells senders may claim
    pub(crate) fn free(&self) -> usize {
        self.empty.count()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Point-in-time message count
    pub(crate) fn len(&self) -> usize {
        let start = self.start.load(Ordering::Acquire);
        let end = self.end.load(Ordering::Acquire);
        (end + self.slots() - start) % self.slots()
    }
}
