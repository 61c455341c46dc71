//! RISC-V privileged hart core.
//!
//! This crate implements the privileged execution environment of a RISC-V hart for use
//! inside an instruction-set emulator. It provides the following:
//! 1. **Mode State:** Privilege, virtualization and the force-HS flag, with the
//!    virtual-supervisor shadow swap.
//! 2. **Interrupts:** A cross-thread pending register and the interrupt resolver.
//! 3. **Translation:** Sv32/Sv39/Sv48/Sv57 page-table walks, two-stage translation and PMP.
//! 4. **Traps:** Delegation, delivery to M/HS/S/VS, and `MRET`/`SRET`.
//! 5. **Fill Glue:** The translation-cache fill protocol and fault classification.
//!
//! Instruction execution, the memory map and TLB storage belong to the embedding
//! emulator and are reached through the traits in [`soc::traits`].

/// Common types and constants (addresses, traps, access types).
pub mod common;
/// Hart configuration (defaults, extensions, JSON loading).
pub mod config;
/// Hart core (arch definitions, hart state machine, MMU).
pub mod core;
/// Collaborator traits and the reference RAM.
pub mod soc;

/// Hart configuration; use `HartConfig::default()` or `HartConfig::from_json`.
pub use crate::config::HartConfig;
/// One hart's privileged state.
pub use crate::core::Hart;
