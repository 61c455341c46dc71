//! Privileged hart core.
//!
//! This module contains the architectural definitions, the hart state machine and the
//! translation units it drives.

/// Architecture-specific components (CSRs, privilege modes, trap causes).
pub mod arch;

/// Hart privileged state: interrupts, traps, privilege transitions and translation glue.
pub mod hart;

/// Translation units (page-table walker, PMP, TLB).
pub mod units;

pub use self::hart::Hart;
