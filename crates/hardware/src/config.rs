//! Configuration system for the privileged hart core.
//!
//! This module defines the configuration structures used to parameterize a hart. It provides:
//! 1. **Defaults:** Baseline constants (reset vector, PMP entry count, TLB size).
//! 2. **Structures:** Hart-level settings and the set of optional extensions.
//! 3. **Loading:** JSON deserialization and validation of the assembled configuration.
//!
//! Configuration is supplied as JSON by the embedding emulator, or use `HartConfig::default()`.

use serde::Deserialize;
use thiserror::Error;

use crate::common::constants::{
    CAUSE_INTERRUPT_BIT, CAUSE_INTERRUPT_BIT_RV32, DEFAULT_MAX_WALK_RESTARTS,
};
use crate::core::units::mmu::pmp::PMP_MAX_ENTRIES;

/// Default configuration constants for a hart.
mod defaults {
    /// Reset program counter (start of RAM on the reference platforms).
    pub const RESET_VECTOR: u64 = 0x8000_0000;

    /// Number of implemented PMP entries.
    pub const PMP_ENTRIES: usize = 16;

    /// Translation cache entry count for the reference `Tlb`.
    pub const TLB_SIZE: usize = 32;
}

/// Errors produced while loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The JSON document could not be parsed.
    #[error("invalid hart configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The document parsed but describes an impossible hart.
    #[error("invalid hart configuration: {0}")]
    Invalid(String),
}

/// Native register width of the hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum Xlen {
    /// 32-bit harts: `satp` has a 1-bit mode field, Sv32 is the only paged scheme.
    #[serde(alias = "rv32", alias = "RV32")]
    Rv32,
    /// 64-bit harts: `satp` has a 4-bit mode field (Sv39/Sv48/Sv57).
    #[default]
    #[serde(alias = "rv64", alias = "RV64")]
    Rv64,
}

impl Xlen {
    /// Returns the register width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::Rv32 => 32,
            Self::Rv64 => 64,
        }
    }

    /// Returns the flag bit that marks an interrupt in `xcause`.
    pub const fn cause_interrupt_bit(self) -> u64 {
        match self {
            Self::Rv32 => CAUSE_INTERRUPT_BIT_RV32,
            Self::Rv64 => CAUSE_INTERRUPT_BIT,
        }
    }
}

/// Optional architectural features of a hart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ExtensionConfig {
    /// Hypervisor extension (virtualization, VS shadow registers, two-stage translation).
    #[serde(default)]
    pub hypervisor: bool,

    /// Paged virtual memory. When absent every access is identity-mapped.
    #[serde(default = "ExtensionConfig::default_enabled")]
    pub mmu: bool,

    /// Physical memory protection.
    #[serde(default = "ExtensionConfig::default_enabled")]
    pub pmp: bool,
}

impl ExtensionConfig {
    /// Paging and PMP are on unless explicitly disabled.
    const fn default_enabled() -> bool {
        true
    }
}

impl Default for ExtensionConfig {
    fn default() -> Self {
        Self {
            hypervisor: false,
            mmu: true,
            pmp: true,
        }
    }
}

/// Root configuration for one hart.
///
/// # Examples
///
/// ```
/// use rvpriv_core::config::{HartConfig, Xlen};
///
/// let json = r#"{
///     "hart_id": 2,
///     "xlen": "Rv64",
///     "extensions": { "hypervisor": true },
///     "tlb_size": 64
/// }"#;
///
/// let config = HartConfig::from_json(json).unwrap();
/// assert_eq!(config.hart_id, 2);
/// assert_eq!(config.xlen, Xlen::Rv64);
/// assert!(config.extensions.hypervisor);
/// assert!(config.extensions.mmu);
/// assert_eq!(config.tlb_size, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HartConfig {
    /// Value of `mhartid`, also used to tag trap traces.
    #[serde(default)]
    pub hart_id: u64,

    /// Register width.
    #[serde(default)]
    pub xlen: Xlen,

    /// Optional features.
    #[serde(default)]
    pub extensions: ExtensionConfig,

    /// Number of implemented PMP entries (at most 64).
    #[serde(default = "HartConfig::default_pmp_entries")]
    pub pmp_entries: usize,

    /// Entry count of the reference translation cache.
    #[serde(default = "HartConfig::default_tlb_size")]
    pub tlb_size: usize,

    /// PC loaded at reset.
    #[serde(default = "HartConfig::default_reset_vector")]
    pub reset_vector: u64,

    /// How many times a walk may restart after losing an A/D update race.
    #[serde(default = "HartConfig::default_max_walk_restarts")]
    pub max_walk_restarts: u32,
}

impl HartConfig {
    const fn default_pmp_entries() -> usize {
        defaults::PMP_ENTRIES
    }

    const fn default_tlb_size() -> usize {
        defaults::TLB_SIZE
    }

    const fn default_reset_vector() -> u64 {
        defaults::RESET_VECTOR
    }

    const fn default_max_walk_restarts() -> u32 {
        DEFAULT_MAX_WALK_RESTARTS
    }

    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] for malformed input and
    /// [`ConfigError::Invalid`] when [`HartConfig::validate`] rejects it.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pmp_entries > PMP_MAX_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "pmp_entries = {} exceeds the architectural maximum of {PMP_MAX_ENTRIES}",
                self.pmp_entries
            )));
        }
        if self.tlb_size == 0 {
            return Err(ConfigError::Invalid("tlb_size must be non-zero".into()));
        }
        if self.max_walk_restarts == 0 {
            return Err(ConfigError::Invalid(
                "max_walk_restarts must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for HartConfig {
    fn default() -> Self {
        Self {
            hart_id: 0,
            xlen: Xlen::default(),
            extensions: ExtensionConfig::default(),
            pmp_entries: defaults::PMP_ENTRIES,
            tlb_size: defaults::TLB_SIZE,
            reset_vector: defaults::RESET_VECTOR,
            max_walk_restarts: DEFAULT_MAX_WALK_RESTARTS,
        }
    }
}
