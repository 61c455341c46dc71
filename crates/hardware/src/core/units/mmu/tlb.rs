//! Translation Lookaside Buffer (TLB).
//!
//! A direct-mapped cache of completed translations. Each entry maps a virtual
//! page to a physical page together with the permission set the walk granted,
//! so a hit never has to re-check R/W/X against the page table.

use crate::common::{AccessType, Permissions, PhysAddr, VirtAddr};
use crate::soc::traits::TranslationCache;

/// A single entry in the TLB.
#[derive(Clone, Copy, Debug, Default)]
struct TlbEntry {
    /// Virtual Page Number (Tag).
    vpn: u64,
    /// Physical Page Number (Data).
    ppn: u64,
    /// Entry validity flag.
    valid: bool,
    /// Permissions granted by the walk that installed the entry.
    perms: Permissions,
}

/// Translation Lookaside Buffer structure.
#[derive(Clone, Debug)]
pub struct Tlb {
    /// Vector of TLB entries.
    entries: Vec<TlbEntry>,
    /// Mask used for indexing (size - 1).
    mask: usize,
}

impl Tlb {
    /// Creates a new TLB with the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of entries (will be rounded up to next power of 2).
    pub fn new(size: usize) -> Self {
        let safe_size = size.max(1).next_power_of_two();

        Self {
            entries: vec![TlbEntry::default(); safe_size],
            mask: safe_size - 1,
        }
    }

    /// Returns the number of entries.
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    #[inline(always)]
    const fn index(&self, vpn: u64) -> usize {
        (vpn as usize) & self.mask
    }

    /// Looks up the page holding `vaddr`.
    ///
    /// # Returns
    ///
    /// `Some((ppage, perms))` if found, otherwise `None`.
    pub fn lookup(&self, vaddr: VirtAddr) -> Option<(PhysAddr, Permissions)> {
        let vpn = vaddr.page_number();
        let entry = self.entries.get(self.index(vpn))?;

        if entry.valid && entry.vpn == vpn {
            return Some((PhysAddr::from_parts(entry.ppn, 0), entry.perms));
        }
        None
    }

    /// Translates `vaddr` for `access` if a cached entry permits it.
    pub fn translate(&self, vaddr: VirtAddr, access: AccessType) -> Option<PhysAddr> {
        let (ppage, perms) = self.lookup(vaddr)?;
        perms
            .allows(access)
            .then(|| PhysAddr::new(ppage.val() | vaddr.page_offset()))
    }

    /// Returns the number of valid entries.
    pub fn occupancy(&self) -> usize {
        self.entries.iter().filter(|e| e.valid).count()
    }
}

impl TranslationCache for Tlb {
    fn install(&mut self, vpage: VirtAddr, ppage: PhysAddr, perms: Permissions) {
        let vpn = vpage.page_number();
        let idx = self.index(vpn);
        if let Some(slot) = self.entries.get_mut(idx) {
            *slot = TlbEntry {
                vpn,
                ppn: ppage.page_number(),
                valid: true,
                perms,
            };
        }
    }

    /// Called on `SFENCE.VMA`, translation-register writes and virtualization switches.
    fn invalidate_all(&mut self) {
        for e in &mut self.entries {
            e.valid = false;
        }
    }
}
