//! Lock-free sample FIFO between the audio thread and the display thread
//!
//! The FIFO is split into a [`FifoProducer`] owned by the audio thread and a
//! [`FifoConsumer`] owned by the display thread. Neither side ever blocks:
//! the producer drops whatever does not fit, and the consumer takes whatever
//! is ready.
//!
//! Performance characteristics:
//! - Wait-free on both sides
//! - Cache-padded positions to prevent false sharing
//! - No allocations after construction

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Shared {
    buffer: Box<[UnsafeCell<f32>]>,

    /// Total samples ever written (only the producer stores)
    write_pos: CachePadded<AtomicUsize>,

    /// Total samples ever read (only the consumer stores)
    read_pos: CachePadded<AtomicUsize>,

    /// Power of two
    capacity: usize,
    mask: usize,
}

// SAFETY: the producer only writes slots in [write_pos, read_pos + capacity)
// and the consumer only reads slots in [read_pos, write_pos). The two
// ranges never overlap, and each position is published with Release and
// observed with Acquire before the slots it covers are touched.
unsafe impl Sync for Shared {}

impl Shared {
    #[inline]
    fn slot(&self, index: usize) -> *mut f32 {
        debug_assert!(index < self.capacity);
        // SAFETY: index is masked by every caller, so it is in bounds
        unsafe { UnsafeCell::raw_get(self.buffer.as_ptr().add(index)) }
    }

    #[inline]
    fn len(&self) -> usize {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        write_pos.wrapping_sub(read_pos)
    }
}

/// Constructor for a producer/consumer pair
pub struct SampleFifo;

impl SampleFifo {
    /// Create a FIFO holding at least `capacity` samples
    ///
    /// Capacity is rounded up to the next power of two.
    #[allow(clippy::new_ret_no_self)]
    pub fn with_capacity(capacity: usize) -> (FifoProducer, FifoConsumer) {
        let capacity = capacity.max(1).next_power_of_two();
        let buffer = (0..capacity).map(|_| UnsafeCell::new(0.0)).collect();

        let shared = Arc::new(Shared {
            buffer,
            write_pos: CachePadded::new(AtomicUsize::new(0)),
            read_pos: CachePadded::new(AtomicUsize::new(0)),
            capacity,
            mask: capacity - 1,
        });

        (
            FifoProducer {
                shared: Arc::clone(&shared),
                dropped: 0,
            },
            FifoConsumer { shared },
        )
    }
}

/// Writing half, owned by the audio thread
pub struct FifoProducer {
    shared: Arc<Shared>,
    dropped: u64,
}

impl FifoProducer {
    /// Write as many samples as fit, returns the number written
    ///
    /// Samples that do not fit are dropped; this never waits for the reader.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        let shared = &*self.shared;
        let write_pos = shared.write_pos.load(Ordering::Relaxed);
        let read_pos = shared.read_pos.load(Ordering::Acquire);

        let free = shared.capacity - write_pos.wrapping_sub(read_pos);
        let count = samples.len().min(free);
        self.dropped += (samples.len() - count) as u64;

        if count > 0 {
            let start = write_pos & shared.mask;
            let first = count.min(shared.capacity - start);

            // SAFETY: [start, start + first) and [0, count - first) lie inside
            // the buffer and inside the free region the consumer is not reading
            unsafe {
                std::ptr::copy_nonoverlapping(samples.as_ptr(), shared.slot(start), first);
                if count > first {
                    std::ptr::copy_nonoverlapping(
                        samples.as_ptr().add(first),
                        shared.slot(0),
                        count - first,
                    );
                }
            }

            shared
                .write_pos
                .store(write_pos.wrapping_add(count), Ordering::Release);
        }

        count
    }

    /// Space currently available for writing
    pub fn free_space(&self) -> usize {
        self.shared.capacity - self.shared.len()
    }

    /// Samples dropped so far because the FIFO was full
    pub fn dropped_samples(&self) -> u64 {
        self.dropped
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}

/// Reading half, owned by the display thread
pub struct FifoConsumer {
    shared: Arc<Shared>,
}

impl FifoConsumer {
    /// Hand every ready sample to `f` and release it
    ///
    /// The ready region is passed as at most two contiguous chunks, the
    /// second one only when it wraps around the end of the buffer. Returns
    /// the number of samples consumed.
    pub fn drain<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&[f32]),
    {
        let shared = &*self.shared;
        let read_pos = shared.read_pos.load(Ordering::Relaxed);
        let write_pos = shared.write_pos.load(Ordering::Acquire);

        let available = write_pos.wrapping_sub(read_pos);
        if available == 0 {
            return 0;
        }

        let start = read_pos & shared.mask;
        let first = available.min(shared.capacity - start);

        // SAFETY: both chunks lie inside the published region, which the
        // producer does not touch until read_pos moves past it
        unsafe {
            f(std::slice::from_raw_parts(shared.slot(start), first));
            if available > first {
                f(std::slice::from_raw_parts(shared.slot(0), available - first));
            }
        }

        shared
            .read_pos
            .store(read_pos.wrapping_add(available), Ordering::Release);

        available
    }

    /// Copy up to `output.len()` samples out, returns the number read
    pub fn pop(&mut self, output: &mut [f32]) -> usize {
        let shared = &*self.shared;
        let read_pos = shared.read_pos.load(Ordering::Relaxed);
        let write_pos = shared.write_pos.load(Ordering::Acquire);

        let count = write_pos.wrapping_sub(read_pos).min(output.len());
        for (i, out) in output.iter_mut().take(count).enumerate() {
            let index = read_pos.wrapping_add(i) & shared.mask;
            // SAFETY: index is masked and inside the published region
            *out = unsafe { *shared.slot(index) };
        }

        shared
            .read_pos
            .store(read_pos.wrapping_add(count), Ordering::Release);
        count
    }

    /// Discard every ready sample
    pub fn clear(&mut self) -> usize {
        self.drain(|_| {})
    }

    pub fn len(&self) -> usize {
        self.shared.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }
}
