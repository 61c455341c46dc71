//! Physical Memory Protection (PMP).
//!
//! This module implements the PMP unit consulted for every physical access a
//! hart makes, including the implicit reads of the page-table walker. It provides:
//! 1. **Entries:** Configuration bytes and address registers, with the lock bit honoured on writes.
//! 2. **Matching:** TOR, NA4 and NAPOT region decoding.
//! 3. **Policy:** `has_privs`, which answers whether a mode may access a byte range.
//!
//! Policy summary:
//! - No active entry: every access is permitted.
//! - First entry covering the whole range decides. A range that only partially
//!   overlaps an entry is denied.
//! - Machine mode bypasses unlocked entries.
//! - No entry matched: only Machine mode is permitted.

use crate::common::{Permissions, PhysAddr};
use crate::core::arch::mode::PrivilegeMode;

/// Maximum number of PMP entries the architecture allows.
pub const PMP_MAX_ENTRIES: usize = 64;

/// PMP address-matching mode field (bits 4:3 of pmpcfg).
const A_SHIFT: u8 = 3;
const A_MASK: u8 = 0x3;

/// PMP configuration permission bits.
const PMP_R: u8 = 1 << 0;
const PMP_W: u8 = 1 << 1;
const PMP_X: u8 = 1 << 2;
const PMP_L: u8 = 1 << 7;

/// Address matching mode extracted from pmpcfg.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PmpAddrMatch {
    /// Entry is off.
    Off = 0,
    /// Top of Range: region is `[pmpaddr[i-1], pmpaddr[i])`.
    Tor = 1,
    /// Naturally aligned 4-byte region.
    Na4 = 2,
    /// Naturally aligned power-of-two region.
    Napot = 3,
}

impl PmpAddrMatch {
    /// Decodes the 2-bit A field of a pmpcfg byte.
    pub const fn from_bits(bits: u8) -> Self {
        match bits & A_MASK {
            0 => Self::Off,
            1 => Self::Tor,
            2 => Self::Na4,
            _ => Self::Napot,
        }
    }
}

/// Configuration and address register of one PMP entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PmpEntry {
    /// Raw configuration byte from pmpcfg.
    pub cfg: u8,
    /// Raw pmpaddr register value (byte address >> 2).
    pub addr: u64,
}

impl PmpEntry {
    /// Returns the address-matching mode.
    pub const fn match_mode(&self) -> PmpAddrMatch {
        PmpAddrMatch::from_bits((self.cfg >> A_SHIFT) & A_MASK)
    }

    /// Returns true if the L (lock) bit is set.
    pub const fn is_locked(&self) -> bool {
        self.cfg & PMP_L != 0
    }

    /// Returns the R/W/X bits of the entry as a permission set.
    pub fn permissions(&self) -> Permissions {
        let mut perms = Permissions::NONE;
        if self.cfg & PMP_R != 0 {
            perms |= Permissions::READ;
        }
        if self.cfg & PMP_W != 0 {
            perms |= Permissions::WRITE;
        }
        if self.cfg & PMP_X != 0 {
            perms |= Permissions::EXEC;
        }
        perms
    }
}

/// Physical Memory Protection unit.
#[derive(Clone, Debug)]
pub struct Pmp {
    entries: Vec<PmpEntry>,
}

impl Pmp {
    /// Creates a PMP unit with `count` entries, all disabled.
    ///
    /// `count` is clamped to [`PMP_MAX_ENTRIES`].
    pub fn new(count: usize) -> Self {
        Self {
            entries: vec![PmpEntry::default(); count.min(PMP_MAX_ENTRIES)],
        }
    }

    /// Returns the implemented entries.
    pub fn entries(&self) -> &[PmpEntry] {
        &self.entries
    }

    /// Clears every entry, including locked ones (reset).
    pub fn reset(&mut self) {
        self.entries.fill(PmpEntry::default());
    }

    /// Sets the configuration byte for entry `idx`. Locked entries are not modified.
    pub fn set_cfg(&mut self, idx: usize, cfg: u8) {
        if let Some(entry) = self.entries.get_mut(idx)
            && !entry.is_locked()
        {
            entry.cfg = cfg;
        }
    }

    /// Sets the address register for entry `idx` (physical address >> 2).
    pub fn set_addr(&mut self, idx: usize, addr: u64) {
        if let Some(entry) = self.entries.get_mut(idx)
            && !entry.is_locked()
        {
            entry.addr = addr;
        }
    }

    /// Reads the configuration byte for entry `idx`, zero if unimplemented.
    pub fn cfg(&self, idx: usize) -> u8 {
        self.entries.get(idx).map_or(0, |e| e.cfg)
    }

    /// Reads the address register for entry `idx`, zero if unimplemented.
    pub fn addr(&self, idx: usize) -> u64 {
        self.entries.get(idx).map_or(0, |e| e.addr)
    }

    /// Returns the number of entries whose matching mode is not `Off`.
    pub fn active_rules(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.match_mode() != PmpAddrMatch::Off)
            .count()
    }

    /// Byte range `[lo, hi)` covered by entry `idx`, or `None` when off.
    fn range(&self, idx: usize) -> Option<(u64, u64)> {
        let entry = self.entries.get(idx)?;
        match entry.match_mode() {
            PmpAddrMatch::Off => None,
            PmpAddrMatch::Tor => {
                let lo = idx
                    .checked_sub(1)
                    .and_then(|prev| self.entries.get(prev))
                    .map_or(0, |prev| prev.addr << 2);
                Some((lo, entry.addr << 2))
            }
            PmpAddrMatch::Na4 => {
                let base = entry.addr << 2;
                Some((base, base.wrapping_add(4)))
            }
            PmpAddrMatch::Napot => {
                // Trailing ones select the size: 2^(ones + 3) bytes.
                let ones = u64::from((!entry.addr).trailing_zeros());
                let size = 1u64.checked_shl((ones + 3) as u32).unwrap_or(0);
                let base = (entry.addr << 2) & !size.wrapping_sub(1);
                Some((base, base.wrapping_add(size)))
            }
        }
    }

    /// Returns true if `mode` may perform an access needing `privs` on the
    /// `size` bytes starting at `addr`.
    pub fn has_privs(
        &self,
        addr: PhysAddr,
        size: u64,
        privs: Permissions,
        mode: PrivilegeMode,
    ) -> bool {
        if self.active_rules() == 0 {
            return true;
        }

        let start = addr.val();
        let end = start.wrapping_add(size.max(1) - 1);

        for idx in 0..self.entries.len() {
            let Some((lo, hi)) = self.range(idx) else {
                continue;
            };
            let start_in = start >= lo && start < hi;
            let end_in = end >= lo && end < hi;

            if start_in != end_in {
                tracing::debug!(
                    addr = %addr,
                    size,
                    entry = idx,
                    "PMP: access partially overlaps a rule"
                );
                return false;
            }
            if start_in {
                let entry = &self.entries[idx];
                if mode == PrivilegeMode::Machine && !entry.is_locked() {
                    return true;
                }
                return entry.permissions().contains(privs);
            }
        }

        mode == PrivilegeMode::Machine
    }
}
