//! Translation units.
//!
//! This module contains the memory management unit: the page-table walker, the
//! physical memory protection unit and the reference translation cache.

/// Memory Management Unit with TLB, PMP and page table walker.
pub mod mmu;
