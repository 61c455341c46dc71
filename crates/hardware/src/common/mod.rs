//! Common utilities and types used throughout the privileged core.
//!
//! This module provides fundamental building blocks that are shared across all components.
//! It includes:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Constants:** Page geometry and trap-vector constants.
//! 3. **Memory Access:** Access kinds (Fetch/Read/Write) and permission sets.
//! 4. **Error Handling:** Trap representations and translation/claim error types.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Common constants used throughout the core.
pub mod constants;

/// Memory access type definitions.
pub mod data;

/// Error types and trap definitions.
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use constants::{PAGE_SHIFT, PAGE_SIZE};
pub use data::{AccessType, Permissions};
pub use error::{ClaimError, FillError, Interrupt, Stage, Trap, WalkError};
