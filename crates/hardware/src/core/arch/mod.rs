//! RISC-V architecture-specific components.
//!
//! This module contains the architectural definitions the hart is built on.
//! It includes the following modules:
//! 1. **CSRs:** Control and Status Register definitions, field masks and storage.
//! 2. **Modes:** Privilege mode definitions and the virtualization flag set.
//! 3. **Traps:** Exception cause codes and cause names.

/// Control and Status Register (CSR) definitions and access logic.
pub mod csr;

/// Privilege mode definitions and transitions.
pub mod mode;

/// Trap cause codes and names.
pub mod trap;
