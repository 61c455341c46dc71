//! Reference Physical Memory.
//!
//! This module implements plain RAM for the privileged core. It provides:
//! 1. **Buffer:** Atomic word storage (`WordBuffer`) shared by every hart.
//! 2. **Ram:** The `PhysicalMemory` implementation that maps the buffer at a physical base address.
//!
//! An embedding emulator with MMIO and ROM regions supplies its own `PhysicalMemory`;
//! `Ram` reports every backed address as ordinary writable memory.

/// Atomic word storage for RAM contents.
pub mod buffer;

use self::buffer::WordBuffer;
use crate::common::PhysAddr;
use crate::soc::traits::PhysicalMemory;

/// System RAM mapped at a fixed physical base.
#[derive(Debug)]
pub struct Ram {
    /// Backing storage.
    buffer: WordBuffer,
    /// The base physical address where this memory is mapped.
    base_addr: u64,
}

impl Ram {
    /// Creates `size` bytes of zeroed RAM at `base_addr`.
    pub fn new(base_addr: u64, size: usize) -> Self {
        Self {
            buffer: WordBuffer::new(size),
            base_addr,
        }
    }

    /// Returns (base_address, size_in_bytes).
    pub fn address_range(&self) -> (u64, u64) {
        (self.base_addr, self.buffer.len() as u64)
    }

    fn offset(&self, addr: PhysAddr) -> Option<usize> {
        let off = addr.val().checked_sub(self.base_addr)?;
        let off = usize::try_from(off).ok()?;
        (off < self.buffer.len()).then_some(off)
    }

    /// Writes a doubleword. Returns false if the address is not backed or misaligned.
    pub fn write_u64(&self, addr: PhysAddr, val: u64) -> bool {
        self.offset(addr)
            .is_some_and(|off| self.buffer.store_u64(off, val))
    }

    /// Writes a word. Returns false if the address is not backed or misaligned.
    pub fn write_u32(&self, addr: PhysAddr, val: u32) -> bool {
        self.offset(addr)
            .is_some_and(|off| self.buffer.store_u32(off, val))
    }
}

impl PhysicalMemory for Ram {
    fn read_u32(&self, addr: PhysAddr) -> u32 {
        self.offset(addr)
            .and_then(|off| self.buffer.load_u32(off))
            .unwrap_or(0)
    }

    fn read_u64(&self, addr: PhysAddr) -> u64 {
        self.offset(addr)
            .and_then(|off| self.buffer.load_u64(off))
            .unwrap_or(0)
    }

    fn compare_exchange_u32(&self, addr: PhysAddr, current: u32, new: u32) -> Result<u32, u32> {
        self.offset(addr)
            .and_then(|off| self.buffer.cas_u32(off, current, new))
            .unwrap_or(Err(0))
    }

    fn compare_exchange_u64(&self, addr: PhysAddr, current: u64, new: u64) -> Result<u64, u64> {
        self.offset(addr)
            .and_then(|off| self.buffer.cas_u64(off, current, new))
            .unwrap_or(Err(0))
    }

    fn is_ram(&self, addr: PhysAddr) -> bool {
        self.offset(addr).is_some()
    }
}
