//! Memory Management Unit (MMU).
//!
//! This module holds the address-translation machinery of a hart. It provides:
//! 1. **Addressing Schemes:** Decoding of `satp`/`vsatp`/`hgatp` into Bare, Sv32, Sv39, Sv48 or Sv57.
//! 2. **Page Table Walker:** The multi-level walk with A/D updates (see [`ptw`]).
//! 3. **Physical Memory Protection:** The PMP unit consulted for table reads and final accesses.
//! 4. **Reference TLB:** A direct-mapped [`tlb::Tlb`] implementing the translation-cache interface.

/// Physical Memory Protection (PMP).
pub mod pmp;

/// Page table walker for Sv32/Sv39/Sv48/Sv57, including second-stage translation.
pub mod ptw;

/// Translation Lookaside Buffer (TLB) for caching virtual-to-physical address translations.
pub mod tlb;

use std::fmt;

use crate::common::{Permissions, PhysAddr, VirtAddr};
use crate::config::Xlen;
use crate::core::arch::csr::{
    SATP_MODE_BARE, SATP_MODE_SV32, SATP_MODE_SV39, SATP_MODE_SV48, SATP_MODE_SV57, split_atp,
};

/// Page-table format selected by an address-translation register.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AddressingScheme {
    /// No translation.
    Bare,
    /// Two levels of 1024 four-byte entries (RV32).
    Sv32,
    /// Three levels of 512 eight-byte entries.
    Sv39,
    /// Four levels of 512 eight-byte entries.
    Sv48,
    /// Five levels of 512 eight-byte entries.
    Sv57,
}

impl AddressingScheme {
    /// Decodes the mode field of a translation register.
    ///
    /// Returns `None` for encodings not implemented at this register width.
    pub const fn decode(mode: u64, xlen: Xlen) -> Option<Self> {
        match (xlen, mode) {
            (_, SATP_MODE_BARE) => Some(Self::Bare),
            (Xlen::Rv32, SATP_MODE_SV32) => Some(Self::Sv32),
            (Xlen::Rv64, SATP_MODE_SV39) => Some(Self::Sv39),
            (Xlen::Rv64, SATP_MODE_SV48) => Some(Self::Sv48),
            (Xlen::Rv64, SATP_MODE_SV57) => Some(Self::Sv57),
            _ => None,
        }
    }

    /// Number of table levels walked.
    pub const fn levels(self) -> u32 {
        match self {
            Self::Bare => 0,
            Self::Sv32 => 2,
            Self::Sv39 => 3,
            Self::Sv48 => 4,
            Self::Sv57 => 5,
        }
    }

    /// Virtual-address bits consumed per level.
    pub const fn index_bits(self) -> u32 {
        match self {
            Self::Bare => 0,
            Self::Sv32 => 10,
            _ => 9,
        }
    }

    /// Size of one page-table entry in bytes.
    pub const fn pte_size(self) -> u64 {
        match self {
            Self::Sv32 => 4,
            _ => 8,
        }
    }

    /// Width of the translated virtual address.
    pub const fn va_bits(self) -> u32 {
        12 + self.levels() * self.index_bits()
    }

    /// Returns true when no translation happens.
    pub const fn is_bare(self) -> bool {
        matches!(self, Self::Bare)
    }
}

impl fmt::Display for AddressingScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bare => "Bare",
            Self::Sv32 => "Sv32",
            Self::Sv39 => "Sv39",
            Self::Sv48 => "Sv48",
            Self::Sv57 => "Sv57",
        })
    }
}

/// A decoded translation register: scheme plus root table address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddressSpace {
    /// Page-table format.
    pub scheme: AddressingScheme,
    /// Physical (or, for a nested first stage, guest-physical) root table address.
    pub root: PhysAddr,
}

impl AddressSpace {
    /// Identity address space.
    pub const BARE: Self = Self {
        scheme: AddressingScheme::Bare,
        root: PhysAddr::new(0),
    };

    /// Decodes `satp`, `vsatp` or `hgatp`.
    pub const fn from_atp(atp: u64, xlen: Xlen) -> Option<Self> {
        let (mode, ppn) = split_atp(atp, xlen);
        match AddressingScheme::decode(mode, xlen) {
            Some(scheme) => Some(Self {
                scheme,
                root: PhysAddr::from_parts(ppn, 0),
            }),
            None => None,
        }
    }
}

/// Successful translation: the physical address of the access and the
/// permissions a translation-cache entry for its page may carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    /// Physical address, including the in-page offset.
    pub addr: PhysAddr,
    /// Granted permissions.
    pub perms: Permissions,
}

impl Translation {
    /// Identity mapping with full permissions.
    pub const fn identity(addr: VirtAddr) -> Self {
        Self {
            addr: PhysAddr::new(addr.val()),
            perms: Permissions::ALL,
        }
    }
}
