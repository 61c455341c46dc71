//! Global Constants.
//!
//! This module defines constants shared by the privileged core. It includes:
//! 1. **Memory Constants:** Page sizes, masks, and shifts for memory management.
//! 2. **Trap Constants:** Interrupt flag placement and vector entry size.
//! 3. **Walker Constants:** Default bound on page-walk restarts.

/// Page size in bytes (4KB).
pub const PAGE_SIZE: u64 = 4096;

/// Number of bits to shift to convert between bytes and pages.
pub const PAGE_SHIFT: u64 = 12;

/// Mask for extracting the page offset from an address.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Bit mask indicating that an RV64 trap cause represents an interrupt.
pub const CAUSE_INTERRUPT_BIT: u64 = 1 << 63;

/// Bit mask indicating that an RV32 trap cause represents an interrupt.
pub const CAUSE_INTERRUPT_BIT_RV32: u64 = 1 << 31;

/// Size of one entry in a vectored trap table, in bytes.
pub const TRAP_VECTOR_ENTRY_SIZE: u64 = 4;

/// Mask of the low `xtvec` bits holding the vector mode.
pub const TVEC_MODE_MASK: u64 = 0x3;

/// `xtvec` mode value selecting vectored interrupt dispatch.
pub const TVEC_MODE_VECTORED: u64 = 1;

/// Default number of times a page walk restarts after losing an A/D update race.
pub const DEFAULT_MAX_WALK_RESTARTS: u32 = 64;
