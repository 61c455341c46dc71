//! System-on-Chip (SoC) Boundary.
//!
//! This module holds what the privileged core consumes from the surrounding system:
//! the physical-memory and translation-cache traits, and a reference RAM.

/// Reference RAM backed by atomic words.
pub mod memory;

/// Physical-memory and translation-cache trait definitions.
pub mod traits;

pub use memory::Ram;
pub use traits::{PhysicalMemory, TranslationCache};
