//! Collaborator traits at the edge of the privileged core.
//!
//! This module defines what the hart needs from the rest of the emulator. It provides:
//! 1. **Physical Memory:** Word reads, word-wide compare-and-swap, and the "ordinary RAM" predicate
//!    the page-table walker needs for atomic A/D updates.
//! 2. **Translation Cache:** The install/flush interface of the TLB the fill protocol feeds.
//!
//! All implementors of `PhysicalMemory` must be `Send + Sync`: page tables are shared by every
//! hart, and each hart walks them from its own thread.

use crate::common::{Permissions, PhysAddr, VirtAddr};

/// Physical memory as seen by the page-table walker.
///
/// Reads of unbacked addresses return zero. Compare-and-swap returns the value
/// found in memory: `Ok(current)` when the swap happened, `Err(found)` otherwise.
pub trait PhysicalMemory: Send + Sync {
    /// Reads four bytes (little-endian) at the given physical address.
    fn read_u32(&self, addr: PhysAddr) -> u32;

    /// Reads eight bytes (little-endian) at the given physical address.
    fn read_u64(&self, addr: PhysAddr) -> u64;

    /// Atomically replaces the word at `addr` with `new` if it still holds `current`.
    ///
    /// # Errors
    ///
    /// Returns the value actually found when it differs from `current`.
    fn compare_exchange_u32(&self, addr: PhysAddr, current: u32, new: u32) -> Result<u32, u32>;

    /// Atomically replaces the doubleword at `addr` with `new` if it still holds `current`.
    ///
    /// # Errors
    ///
    /// Returns the value actually found when it differs from `current`.
    fn compare_exchange_u64(&self, addr: PhysAddr, current: u64, new: u64) -> Result<u64, u64>;

    /// Returns true if `addr` is ordinary writable RAM (not MMIO or ROM).
    fn is_ram(&self, addr: PhysAddr) -> bool;
}

/// Translation cache fed by the fill protocol.
pub trait TranslationCache: Send {
    /// Installs a page-aligned mapping with the permissions the walk granted.
    fn install(&mut self, vpage: VirtAddr, ppage: PhysAddr, perms: Permissions);

    /// Drops every cached translation.
    fn invalidate_all(&mut self);
}
