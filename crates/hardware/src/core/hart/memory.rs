//! Address Translation and Fault Glue.
//!
//! This module connects the page-table walker to the rest of the hart. It performs the following:
//! 1. **Effective Privilege:** `MPRV` makes Machine-mode data accesses translate as `MPP`.
//! 2. **Translation:** Builds the first and (when virtualized) second stage from
//!    `satp`/`hgatp` and runs the walk.
//! 3. **Fill Protocol:** Misalignment check, walk, final PMP check, then either a
//!    translation-cache install, a silent probe failure, or a delivered trap.
//! 4. **Fault Classification:** Page fault vs access fault vs guest-page fault, with the
//!    force-HS flag set or cleared for the failing stage before delivery.

use tracing::trace;

use super::Hart;
use crate::common::{AccessType, FillError, PhysAddr, Stage, Trap, VirtAddr, WalkError};
use crate::config::Xlen;
use crate::core::arch::csr::{MSTATUS_MPRV, MSTATUS_MXR, MSTATUS_SUM};
use crate::core::arch::mode::PrivilegeMode;
use crate::core::units::mmu::ptw::{PageTableWalker, StageConfig};
use crate::core::units::mmu::{AddressSpace, Translation};

impl Hart {
    /// Privilege an access of kind `access` is translated and checked with.
    pub fn effective_privilege(&self, access: AccessType) -> PrivilegeMode {
        let privilege = self.mode.privilege();
        if privilege == PrivilegeMode::Machine
            && access != AccessType::Fetch
            && self.csrs.mstatus & MSTATUS_MPRV != 0
        {
            return PrivilegeMode::from_u8(self.csrs.mpp());
        }
        privilege
    }

    fn first_stage_space(&self) -> Option<AddressSpace> {
        AddressSpace::from_atp(self.csrs.satp, self.config.xlen)
    }

    fn second_stage_space(&self) -> Option<AddressSpace> {
        if !self.mode.is_virtualized() {
            return Some(AddressSpace::BARE);
        }
        AddressSpace::from_atp(self.csrs.hgatp, self.config.xlen)
    }

    /// Translates `addr` for `access` without touching the translation cache or
    /// raising anything.
    ///
    /// Machine mode (after `MPRV`) and harts without paging are identity-mapped.
    ///
    /// # Errors
    ///
    /// Returns the walk failure, tagged with the stage that failed.
    pub fn translate(&self, addr: VirtAddr, access: AccessType) -> Result<Translation, WalkError> {
        let mode = self.effective_privilege(access);
        if mode == PrivilegeMode::Machine || !self.config.extensions.mmu {
            return Ok(Translation::identity(addr));
        }

        let xlen = self.config.xlen;
        let addr = match xlen {
            Xlen::Rv32 => VirtAddr::new(addr.val() & 0xFFFF_FFFF),
            Xlen::Rv64 => addr,
        };

        let mstatus = self.csrs.mstatus;
        let mxr = mstatus & MSTATUS_MXR != 0;
        let first = StageConfig {
            space: self
                .first_stage_space()
                .ok_or(WalkError::Translation { stage: Stage::First })?,
            mode,
            sum: mstatus & MSTATUS_SUM != 0,
            mxr,
        };
        let second = self
            .second_stage_space()
            .ok_or(WalkError::Translation {
                stage: Stage::Second,
            })?;
        let second = (!second.scheme.is_bare()).then(|| StageConfig::guest_physical(second, mxr));

        let pmp = self.config.extensions.pmp.then_some(&self.pmp);
        let walker = PageTableWalker::new(
            self.memory.as_ref(),
            pmp,
            xlen,
            self.config.max_walk_restarts,
        );
        walker.translate(addr, access, &first, second.as_ref())
    }

    /// Translation-cache fill for an access of `size` bytes.
    ///
    /// On success the page-aligned mapping is installed and the translation
    /// returned. On failure with `probe` set, nothing changes and
    /// [`FillError::ProbeFailed`] is returned; otherwise the matching trap is
    /// delivered and returned in [`FillError::Raised`].
    ///
    /// # Errors
    ///
    /// See above.
    pub fn tlb_fill(
        &mut self,
        addr: VirtAddr,
        size: u64,
        access: AccessType,
        probe: bool,
    ) -> Result<Translation, FillError> {
        trace!(
            hart = self.config.hart_id,
            addr = %addr,
            ?access,
            mmu_index = self.mmu_index(),
            probe,
            "tlb_fill"
        );

        if size > 1 && addr.val() % size != 0 {
            if probe {
                return Err(FillError::ProbeFailed(addr));
            }
            let trap = self.unaligned_access(addr, access);
            return Err(FillError::Raised { addr, trap });
        }

        let mode = self.effective_privilege(access);
        let result = self.translate(addr, access).and_then(|t| {
            if self.config.extensions.pmp
                && !self.pmp.has_privs(t.addr, size, access.required(), mode)
            {
                Err(WalkError::Protection { stage: Stage::First })
            } else {
                Ok(t)
            }
        });

        trace!(
            hart = self.config.hart_id,
            addr = %addr,
            result = ?result,
            "tlb_fill walk result"
        );

        match result {
            Ok(t) => {
                self.tlb.install(addr.page_base(), t.addr.page_base(), t.perms);
                Ok(t)
            }
            Err(_) if probe => Err(FillError::ProbeFailed(addr)),
            Err(err) => {
                let trap = self.mmu_fault(addr, access, err);
                self.dispatch_trap(trap);
                Err(FillError::Raised { addr, trap })
            }
        }
    }

    /// Classifies a walk failure and updates the force-HS flag for its stage.
    ///
    /// A failure is a page fault only when the failing stage has paging on and
    /// the failure is not a PMP denial. Second-stage page faults are guest-page
    /// faults and force the trap into HS mode; first-stage failures clear the flag.
    pub fn mmu_fault(&mut self, addr: VirtAddr, access: AccessType, err: WalkError) -> Trap {
        let stage = err.stage();
        let paging = match stage {
            Stage::First => self.first_stage_space(),
            Stage::Second => self.second_stage_space(),
        }
        .is_some_and(|space| !space.scheme.is_bare());
        let page_fault = paging && !err.is_protection();

        let a = addr.val();
        let trap = match (access, page_fault, stage) {
            (AccessType::Fetch, false, _) => Trap::InstructionAccessFault(a),
            (AccessType::Read, false, _) => Trap::LoadAccessFault(a),
            (AccessType::Write, false, _) => Trap::StoreAccessFault(a),
            (AccessType::Fetch, true, Stage::First) => Trap::InstructionPageFault(a),
            (AccessType::Read, true, Stage::First) => Trap::LoadPageFault(a),
            (AccessType::Write, true, Stage::First) => Trap::StorePageFault(a),
            (AccessType::Fetch, true, Stage::Second) => Trap::InstructionGuestPageFault(a),
            (AccessType::Read, true, Stage::Second) => Trap::LoadGuestPageFault(a),
            (AccessType::Write, true, Stage::Second) => Trap::StoreGuestPageFault(a),
        };

        self.set_force_hs(stage == Stage::Second);
        trap
    }

    /// Physical address backing `addr` for a debugger, or `None` if unmapped.
    ///
    /// Uses the current translation context as a load would; never raises a trap.
    pub fn debug_translate(&self, addr: VirtAddr) -> Option<PhysAddr> {
        self.translate(addr, AccessType::Read).ok().map(|t| t.addr)
    }

    /// Access to an unassigned physical address: delivers a load or store access fault.
    pub fn bus_error(&mut self, addr: PhysAddr, is_write: bool) -> Trap {
        let trap = if is_write {
            Trap::StoreAccessFault(addr.val())
        } else {
            Trap::LoadAccessFault(addr.val())
        };
        self.dispatch_trap(trap);
        trap
    }

    /// Misaligned access: delivers the matching address-misaligned exception.
    pub fn unaligned_access(&mut self, addr: VirtAddr, access: AccessType) -> Trap {
        let a = addr.val();
        let trap = match access {
            AccessType::Fetch => Trap::InstructionAddressMisaligned(a),
            AccessType::Read => Trap::LoadAddressMisaligned(a),
            AccessType::Write => Trap::StoreAddressMisaligned(a),
        };
        self.dispatch_trap(trap);
        trap
    }
}
