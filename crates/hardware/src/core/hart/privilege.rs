//! Privilege Transitions.
//!
//! This module implements the mode-changing operations of a hart. It performs the following:
//! 1. **Privilege Changes:** Every change drops the load reservation; entering Machine mode
//!    leaves virtualization.
//! 2. **Virtualization:** Toggling the virtualization flag flushes the translation cache.
//! 3. **Shadow Swap:** Exchanging the live supervisor registers with their virtual-supervisor
//!    shadows, which is how the hart enters and leaves a guest.

use tracing::{debug, warn};

use super::Hart;
use crate::config::Xlen;
use crate::core::arch::csr::{
    MSTATUS_FS, MSTATUS_MXR, MSTATUS_SIE, MSTATUS_SPIE, MSTATUS_SPP, MSTATUS_SUM, MSTATUS64_UXL,
    SUPERVISOR_INTERRUPTS,
};
use crate::core::arch::mode::PrivilegeMode;

impl Hart {
    /// Returns true if the hart is running a guest.
    pub const fn is_virtualized(&self) -> bool {
        self.mode.is_virtualized()
    }

    /// Returns the sticky force-HS trap flag.
    pub const fn force_hs(&self) -> bool {
        self.mode.force_hs()
    }

    /// Sets the privilege and invalidates the load reservation.
    pub fn set_privilege(&mut self, privilege: PrivilegeMode) {
        if self.mode.set_privilege(privilege) {
            debug!(hart = self.config.hart_id, "virtualization off on entry to Machine mode");
            self.tlb.invalidate_all();
        }
        self.load_reservation = None;
    }

    /// Sets the privilege from its 2-bit architectural encoding.
    ///
    /// The reserved encoding and anything above Machine become User.
    pub fn set_privilege_encoded(&mut self, encoding: u8) {
        if !PrivilegeMode::is_valid_encoding(encoding) {
            warn!(
                hart = self.config.hart_id,
                encoding, "invalid privilege encoding, entering User mode"
            );
        }
        self.set_privilege(PrivilegeMode::from_u8(encoding));
    }

    /// Enters or leaves virtualized execution.
    ///
    /// No-op without the hypervisor extension. The translation cache is flushed
    /// whenever the flag actually changes.
    pub fn set_virtualized(&mut self, enable: bool) {
        if self.mode.set_virtualized(enable) {
            debug!(hart = self.config.hart_id, enable, "virtualization changed, flushing TLB");
            self.tlb.invalidate_all();
        }
    }

    /// Sets the force-HS trap flag. No-op without the hypervisor extension.
    pub const fn set_force_hs(&mut self, enable: bool) {
        self.mode.set_force_hs(enable);
    }

    /// Exchanges the live supervisor context with the virtual-supervisor shadows.
    ///
    /// Swaps the supervisor view of `mstatus`, the supervisor enables in `mie`,
    /// and `stvec`/`sscratch`/`sepc`/`scause`/`stval`/`satp`. The supervisor
    /// pending bits of the shared register are exchanged with `vsip`.
    /// Does nothing without the hypervisor extension.
    pub fn swap_virtualization_shadow(&mut self) {
        if !self.mode.has_hypervisor() {
            warn!(hart = self.config.hart_id, "shadow swap without the hypervisor extension");
            return;
        }

        let mut status_mask =
            MSTATUS_MXR | MSTATUS_SUM | MSTATUS_FS | MSTATUS_SPP | MSTATUS_SPIE | MSTATUS_SIE;
        if self.config.xlen == Xlen::Rv64 {
            status_mask |= MSTATUS64_UXL;
        }

        let c = &mut self.csrs;

        let guest = c.vsstatus & status_mask;
        c.vsstatus = c.mstatus & status_mask;
        c.mstatus = (c.mstatus & !status_mask) | guest;

        let guest = c.vsie & SUPERVISOR_INTERRUPTS;
        c.vsie = c.mie & SUPERVISOR_INTERRUPTS;
        c.mie = (c.mie & !SUPERVISOR_INTERRUPTS) | guest;

        std::mem::swap(&mut c.stvec, &mut c.vstvec);
        std::mem::swap(&mut c.sscratch, &mut c.vsscratch);
        std::mem::swap(&mut c.sepc, &mut c.vsepc);
        std::mem::swap(&mut c.scause, &mut c.vscause);
        std::mem::swap(&mut c.stval, &mut c.vstval);
        std::mem::swap(&mut c.satp, &mut c.vsatp);

        let old = self.lines.update_pending(SUPERVISOR_INTERRUPTS, self.csrs.vsip);
        self.csrs.vsip = old & SUPERVISOR_INTERRUPTS;
    }
}
