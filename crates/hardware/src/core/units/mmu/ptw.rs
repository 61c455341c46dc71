//! Page Table Walker (PTW).
//!
//! This module implements the page-table walking algorithm shared by every paged
//! scheme. It performs the following:
//! 1. **Canonical Check:** Rejects addresses whose upper bits do not extend the top in-range bit.
//! 2. **Walk:** Descends from the root, checking PMP read access on every table entry.
//! 3. **Leaf Validation:** Reserved encodings, U-bit rules, superpage alignment and R/W/X.
//! 4. **A/D Update:** Sets Accessed/Dirty with a compare-and-swap, restarting the walk on a lost race.
//! 5. **Nesting:** When a second stage is supplied, table addresses and the result of the
//!    first stage are guest-physical and are translated through it.

use std::fmt;

use tracing::{trace, warn};

use crate::common::{AccessType, PAGE_SHIFT, Permissions, PhysAddr, Stage, VirtAddr, WalkError};
use crate::config::Xlen;
use crate::core::arch::mode::PrivilegeMode;
use crate::core::units::mmu::pmp::Pmp;
use crate::core::units::mmu::{AddressSpace, AddressingScheme, Translation};
use crate::soc::traits::PhysicalMemory;

/// Page Table Entry valid bit (bit 0).
const PTE_VALID_BIT: u64 = 1;

/// Page Table Entry read permission bit (bit 1).
const PTE_READ_BIT: u64 = 1 << 1;

/// Page Table Entry write permission bit (bit 2).
const PTE_WRITE_BIT: u64 = 1 << 2;

/// Page Table Entry execute permission bit (bit 3).
const PTE_EXEC_BIT: u64 = 1 << 3;

/// Page Table Entry user mode access bit (bit 4).
const PTE_USER_BIT: u64 = 1 << 4;

/// Page Table Entry accessed bit (bit 6).
const PTE_ACCESSED_BIT: u64 = 1 << 6;

/// Page Table Entry dirty bit (bit 7).
const PTE_DIRTY_BIT: u64 = 1 << 7;

/// Bit shift to extract Physical Page Number from PTE.
const PTE_PPN_SHIFT: u64 = 10;

/// PPN width of an 8-byte entry (bits 10-53).
const PTE64_PPN_MASK: u64 = (1 << 44) - 1;

/// PPN width of a 4-byte entry (bits 10-31).
const PTE32_PPN_MASK: u64 = (1 << 22) - 1;

/// A strongly-typed wrapper around a raw page-table entry.
#[derive(Clone, Copy, Debug)]
struct PageTableEntry(u64);

impl PageTableEntry {
    const fn is_valid(self) -> bool {
        self.0 & PTE_VALID_BIT != 0
    }

    const fn can_read(self) -> bool {
        self.0 & PTE_READ_BIT != 0
    }

    const fn can_write(self) -> bool {
        self.0 & PTE_WRITE_BIT != 0
    }

    const fn can_exec(self) -> bool {
        self.0 & PTE_EXEC_BIT != 0
    }

    const fn is_user(self) -> bool {
        self.0 & PTE_USER_BIT != 0
    }

    const fn ppn(self, scheme: AddressingScheme) -> u64 {
        let mask = match scheme {
            AddressingScheme::Sv32 => PTE32_PPN_MASK,
            _ => PTE64_PPN_MASK,
        };
        (self.0 >> PTE_PPN_SHIFT) & mask
    }

    /// Valid with R=W=X=0: points at the next level.
    const fn is_pointer(self) -> bool {
        self.0 & (PTE_READ_BIT | PTE_WRITE_BIT | PTE_EXEC_BIT) == 0
    }

    /// W without R is reserved, with or without X.
    const fn is_reserved_leaf(self) -> bool {
        self.can_write() && !self.can_read()
    }

    /// Entry with Accessed set, and Dirty for stores.
    const fn touched(self, access: AccessType) -> Self {
        let dirty = if matches!(access, AccessType::Write) {
            PTE_DIRTY_BIT
        } else {
            0
        };
        Self(self.0 | PTE_ACCESSED_BIT | dirty)
    }
}

/// Parameters of one translation stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageConfig {
    /// Table format and root.
    pub space: AddressSpace,
    /// Privilege the U-bit rules are evaluated for.
    pub mode: PrivilegeMode,
    /// `SUM`: supervisor may touch user pages.
    pub sum: bool,
    /// `MXR`: executable pages are readable.
    pub mxr: bool,
}

impl StageConfig {
    /// Second-stage parameters: every access is checked as a User access.
    pub const fn guest_physical(space: AddressSpace, mxr: bool) -> Self {
        Self {
            space,
            mode: PrivilegeMode::User,
            sum: false,
            mxr,
        }
    }
}

/// Outcome of a single pass over the tables.
enum Pass {
    Leaf(Translation),
    Restart,
}

/// Walks page tables held in a [`PhysicalMemory`].
#[derive(Clone, Copy)]
pub struct PageTableWalker<'a> {
    memory: &'a dyn PhysicalMemory,
    pmp: Option<&'a Pmp>,
    xlen: Xlen,
    max_restarts: u32,
}

impl fmt::Debug for PageTableWalker<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTableWalker")
            .field("pmp", &self.pmp.is_some())
            .field("xlen", &self.xlen)
            .field("max_restarts", &self.max_restarts)
            .finish_non_exhaustive()
    }
}

impl<'a> PageTableWalker<'a> {
    /// Creates a walker.
    ///
    /// `pmp` is `None` when the hart has no PMP unit, in which case table reads are unchecked.
    pub const fn new(
        memory: &'a dyn PhysicalMemory,
        pmp: Option<&'a Pmp>,
        xlen: Xlen,
        max_restarts: u32,
    ) -> Self {
        Self {
            memory,
            pmp,
            xlen,
            max_restarts,
        }
    }

    /// Translates `addr` for `access`.
    ///
    /// With a `second` stage, the first stage produces a guest-physical address and
    /// its table reads are themselves translated; the granted permissions are the
    /// intersection of both stages.
    ///
    /// # Errors
    ///
    /// Returns [`WalkError::Translation`] or [`WalkError::Protection`] tagged with
    /// the stage that failed.
    pub fn translate(
        &self,
        addr: VirtAddr,
        access: AccessType,
        first: &StageConfig,
        second: Option<&StageConfig>,
    ) -> Result<Translation, WalkError> {
        let guest = self.walk(addr, access, first, Stage::First, second)?;
        let Some(second) = second else {
            return Ok(guest);
        };

        let host = self.walk(
            VirtAddr::new(guest.addr.val()),
            access,
            second,
            Stage::Second,
            None,
        )?;
        Ok(Translation {
            addr: host.addr,
            perms: guest.perms & host.perms,
        })
    }

    fn walk(
        &self,
        addr: VirtAddr,
        access: AccessType,
        cfg: &StageConfig,
        stage: Stage,
        nested: Option<&StageConfig>,
    ) -> Result<Translation, WalkError> {
        let scheme = cfg.space.scheme;
        if scheme.is_bare() {
            return Ok(Translation::identity(addr));
        }

        if !self.in_range(addr, scheme, stage) {
            trace!(addr = %addr, %scheme, %stage, "PTW: address outside the translated range");
            return Err(WalkError::Translation { stage });
        }

        for _ in 0..=self.max_restarts {
            match self.pass(addr, access, cfg, stage, nested)? {
                Pass::Leaf(t) => return Ok(t),
                Pass::Restart => {
                    trace!(addr = %addr, %stage, "PTW: A/D update lost a race, restarting");
                }
            }
        }

        warn!(
            addr = %addr,
            %stage,
            restarts = self.max_restarts,
            "PTW: giving up after repeated A/D update races"
        );
        Err(WalkError::Translation { stage })
    }

    /// First-stage addresses must be sign-extended from the top in-range bit;
    /// guest-physical addresses must be zero-extended.
    fn in_range(&self, addr: VirtAddr, scheme: AddressingScheme, stage: Stage) -> bool {
        let va = addr.val();
        let va_bits = scheme.va_bits();
        match stage {
            Stage::First => {
                let upper = self.xlen.bits().saturating_sub(va_bits - 1);
                let mask = 1u64.checked_shl(upper).map_or(u64::MAX, |v| v - 1);
                let msbs = (va >> (va_bits - 1)) & mask;
                msbs == 0 || msbs == mask
            }
            // The G-stage is not widened by two bits (no Sv39x4/Sv48x4 root), so
            // guest-physical addresses share the first-stage width.
            Stage::Second => va.checked_shr(va_bits).unwrap_or(0) == 0,
        }
    }

    fn pass(
        &self,
        addr: VirtAddr,
        access: AccessType,
        cfg: &StageConfig,
        stage: Stage,
        nested: Option<&StageConfig>,
    ) -> Result<Pass, WalkError> {
        let scheme = cfg.space.scheme;
        let index_bits = scheme.index_bits();
        let pte_size = scheme.pte_size();
        let va = addr.val();
        let fail = WalkError::Translation { stage };

        let mut base = cfg.space.root.val();

        for level in (0..scheme.levels()).rev() {
            let ptshift = level * index_bits;
            let idx = (va >> (PAGE_SHIFT + u64::from(ptshift))) & ((1 << index_bits) - 1);
            let mut pte_addr = PhysAddr::new(base.wrapping_add(idx * pte_size));

            if let Some(nested) = nested {
                pte_addr = self
                    .walk(
                        VirtAddr::new(pte_addr.val()),
                        AccessType::Read,
                        nested,
                        Stage::Second,
                        None,
                    )?
                    .addr;
            }

            if let Some(pmp) = self.pmp
                && !pmp.has_privs(pte_addr, pte_size, Permissions::READ, PrivilegeMode::Supervisor)
            {
                trace!(pte_addr = %pte_addr, level, %stage, "PTW: PMP denied table read");
                return Err(WalkError::Protection { stage });
            }

            let pte = self.read_pte(pte_addr, scheme);
            let ppn = pte.ppn(scheme);

            if !pte.is_valid() {
                return Err(fail);
            }
            if pte.is_pointer() {
                base = ppn << PAGE_SHIFT;
                continue;
            }
            if pte.is_reserved_leaf() {
                return Err(fail);
            }
            if pte.is_user()
                && cfg.mode != PrivilegeMode::User
                && (!cfg.sum || access == AccessType::Fetch)
            {
                return Err(fail);
            }
            if !pte.is_user() && cfg.mode != PrivilegeMode::Supervisor {
                return Err(fail);
            }

            let superpage_mask = (1u64 << ptshift) - 1;
            if ppn & superpage_mask != 0 {
                return Err(fail);
            }

            let readable = pte.can_read() || (pte.can_exec() && cfg.mxr);
            let permitted = match access {
                AccessType::Read => readable,
                AccessType::Write => pte.can_write(),
                AccessType::Fetch => pte.can_exec(),
            };
            if !permitted {
                return Err(fail);
            }

            let updated = pte.touched(access);
            if updated.0 != pte.0 {
                if !self.memory.is_ram(pte_addr) {
                    trace!(pte_addr = %pte_addr, "PTW: A/D update target is not RAM");
                    return Err(fail);
                }
                if !self.swap_pte(pte_addr, scheme, pte, updated) {
                    return Ok(Pass::Restart);
                }
            }

            let vpn = addr.page_number();
            let phys = PhysAddr::from_parts(ppn | (vpn & superpage_mask), addr.page_offset());

            let mut perms = Permissions::NONE;
            if readable {
                perms |= Permissions::READ;
            }
            if pte.can_exec() {
                perms |= Permissions::EXEC;
            }
            if pte.can_write() && access == AccessType::Write {
                perms |= Permissions::WRITE;
            }

            return Ok(Pass::Leaf(Translation { addr: phys, perms }));
        }

        Err(fail)
    }

    fn read_pte(&self, addr: PhysAddr, scheme: AddressingScheme) -> PageTableEntry {
        match scheme {
            AddressingScheme::Sv32 => PageTableEntry(u64::from(self.memory.read_u32(addr))),
            _ => PageTableEntry(self.memory.read_u64(addr)),
        }
    }

    /// Returns false if the entry changed since it was read.
    fn swap_pte(
        &self,
        addr: PhysAddr,
        scheme: AddressingScheme,
        old: PageTableEntry,
        new: PageTableEntry,
    ) -> bool {
        match scheme {
            AddressingScheme::Sv32 => self
                .memory
                .compare_exchange_u32(addr, old.0 as u32, new.0 as u32)
                .is_ok(),
            _ => self.memory.compare_exchange_u64(addr, old.0, new.0).is_ok(),
        }
    }
}
