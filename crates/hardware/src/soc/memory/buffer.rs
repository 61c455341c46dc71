//! Atomic RAM Buffer.
//!
//! This module provides the backing store of the reference RAM. Storage is a vector
//! of `AtomicU64` words so that every hart can read page tables and update their
//! A/D bits through a shared reference, with no lock around the whole buffer.

use std::sync::atomic::{AtomicU64, Ordering};

/// Word-granular RAM contents shared between harts.
#[derive(Debug)]
pub struct WordBuffer {
    words: Vec<AtomicU64>,
}

impl WordBuffer {
    /// Creates a zeroed buffer of at least `size` bytes (rounded up to whole words).
    pub fn new(size: usize) -> Self {
        let words = size.div_ceil(8);
        Self {
            words: (0..words).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Returns the size of the buffer in bytes.
    pub fn len(&self) -> usize {
        self.words.len() * 8
    }

    /// Returns true if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn word(&self, offset: usize) -> Option<&AtomicU64> {
        self.words.get(offset / 8)
    }

    /// Reads the aligned doubleword at `offset`.
    pub fn load_u64(&self, offset: usize) -> Option<u64> {
        if offset % 8 != 0 {
            return None;
        }
        self.word(offset).map(|w| w.load(Ordering::Acquire))
    }

    /// Reads the aligned word at `offset`.
    pub fn load_u32(&self, offset: usize) -> Option<u32> {
        if offset % 4 != 0 {
            return None;
        }
        let shift = (offset % 8) * 8;
        self.word(offset)
            .map(|w| (w.load(Ordering::Acquire) >> shift) as u32)
    }

    /// Stores the aligned doubleword at `offset`. Returns false if out of range or misaligned.
    pub fn store_u64(&self, offset: usize, val: u64) -> bool {
        match self.word(offset) {
            Some(w) if offset % 8 == 0 => {
                w.store(val, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Stores the aligned word at `offset`. Returns false if out of range or misaligned.
    pub fn store_u32(&self, offset: usize, val: u32) -> bool {
        let Some(w) = self.word(offset).filter(|_| offset % 4 == 0) else {
            return false;
        };
        let shift = (offset % 8) * 8;
        let mask = 0xFFFF_FFFFu64 << shift;
        let _ = w.fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
            Some((old & !mask) | (u64::from(val) << shift))
        });
        true
    }

    /// Compare-and-swap of the aligned doubleword at `offset`.
    ///
    /// Returns `None` if the offset is not backed.
    pub fn cas_u64(&self, offset: usize, current: u64, new: u64) -> Option<Result<u64, u64>> {
        if offset % 8 != 0 {
            return None;
        }
        let w = self.word(offset)?;
        Some(w.compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire))
    }

    /// Compare-and-swap of the aligned word at `offset`.
    ///
    /// Concurrent changes to the other half of the containing doubleword do not
    /// make the swap fail.
    pub fn cas_u32(&self, offset: usize, current: u32, new: u32) -> Option<Result<u32, u32>> {
        if offset % 4 != 0 {
            return None;
        }
        let w = self.word(offset)?;
        let shift = (offset % 8) * 8;
        let mask = 0xFFFF_FFFFu64 << shift;
        let result = w.fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
            ((old >> shift) as u32 == current).then(|| (old & !mask) | (u64::from(new) << shift))
        });
        Some(
            result
                .map(|old| (old >> shift) as u32)
                .map_err(|old| (old >> shift) as u32),
        )
    }
}
