//! Bounded lock-free single-producer/single-consumer queue
//!
//! Moves MIDI messages and UI notification events off the driver thread
//! without taking a lock. The queue is a ring over `capacity` pre-allocated
//! slots. `head` and `tail` are free-running positions (slot = position modulo
//! capacity); `head` is advanced only by the producer, `tail` by whichever side
//! retires the oldest item.
//!
//! Contract: at most one thread pushes and at most one thread pops at a time.
//! The producer may additionally evict the oldest item (see
//! [`SpscQueue::push_overwrite`]); tail advancement is a compare-exchange so
//! an eviction and a concurrent pop never retire the same slot twice.
//! Nothing checks the contract at runtime.
//!
//! A pop copies the slot before claiming it. If the producer evicts that item
//! in between, it may rewrite the slot while the copy is taken; the claim then
//! fails and the copy is discarded without ever being treated as a `T`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Keeps `head` and `tail` on separate cache lines.
#[repr(align(64))]
struct CachePadded(AtomicUsize);

pub struct SpscQueue<T> {
    /// Next position to write (producer only)
    head: CachePadded,
    /// Oldest occupied position
    tail: CachePadded,
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
}

// SAFETY: a slot is written only by the producer while its position lies
// outside [tail, head). Head/tail publication uses release/acquire ordering so
// item writes are visible before the position moves. Reads that may overlap a
// write are discarded, see `pop`.
unsafe impl<T: Send> Send for SpscQueue<T> {}
unsafe impl<T: Send> Sync for SpscQueue<T> {}

impl<T: Copy> SpscQueue<T> {
    /// Create a queue holding at most `capacity` items.
    ///
    /// # Panics
    /// If `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be at least 1");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            head: CachePadded(AtomicUsize::new(0)),
            tail: CachePadded(AtomicUsize::new(0)),
            slots,
        }
    }

    #[inline]
    fn slot(&self, position: usize) -> *mut MaybeUninit<T> {
        self.slots[position % self.slots.len()].get()
    }

    /// Push an item. Hands the item back if the queue is full.
    ///
    /// Producer side only.
    #[inline]
    pub fn push(&self, item: T) -> Result<(), T> {
        let head = self.head.0.load(Ordering::Relaxed);
        if head.wrapping_sub(self.tail.0.load(Ordering::Acquire)) >= self.capacity() {
            return Err(item);
        }

        // SAFETY: position `head` is outside [tail, head), so no pop can claim
        // it until head is published below.
        unsafe {
            (*self.slot(head)).write(item);
        }

        self.head.0.store(head.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Push an item, evicting the oldest one first if the queue is full.
    ///
    /// Returns true when an item was evicted. Producer side only.
    pub fn push_overwrite(&self, mut item: T) -> bool {
        let mut evicted = false;
        loop {
            match self.push(item) {
                Ok(()) => return evicted,
                Err(rejected) => {
                    item = rejected;
                    evicted |= self.pop().is_some();
                }
            }
        }
    }

    /// Remove and return the oldest item, or `None` when empty.
    #[inline]
    pub fn pop(&self) -> Option<T> {
        loop {
            let tail = self.tail.0.load(Ordering::Acquire);
            if tail == self.head.0.load(Ordering::Acquire) {
                return None;
            }

            // Copied as raw `MaybeUninit` bytes. If the producer evicts this
            // position meanwhile it may be rewriting the slot, so the copy is
            // only trusted after the claim below succeeds.
            // SAFETY: the slot is in bounds and holds no drop glue (`T: Copy`).
            let copy = unsafe { std::ptr::read(self.slot(tail)) };

            // Positions never repeat, so a successful claim means no eviction
            // (and no rewrite of this slot) happened since `tail` was loaded.
            if self
                .tail
                .0
                .compare_exchange(tail, tail.wrapping_add(1), Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                // SAFETY: the producer wrote this position before publishing
                // head, and nothing rewrote it before the claim.
                return Some(unsafe { copy.assume_init() });
            }
        }
    }

    /// Number of items currently queued
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.0.load(Ordering::Acquire);
        let head = self.head.0.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Pop every queued item, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let mut items = Vec::with_capacity(self.len());
        while let Some(item) = self.pop() {
            items.push(item);
        }
        items
    }
}

impl<T> std::fmt::Debug for SpscQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpscQueue")
            .field("capacity", &self.slots.len())
            .field("head", &self.head.0.load(Ordering::Relaxed))
            .field("tail", &self.tail.0.load(Ordering::Relaxed))
            .finish()
    }
}
