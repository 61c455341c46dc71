//! Trap Delivery and Return.
//!
//! This module implements the trap state machine of a hart. It performs the following:
//! 1. **Cause Normalization:** The generic environment call becomes the mode-specific cause.
//! 2. **Target Selection:** A pure decision over privilege, virtualization, the delegation
//!    bits and the force-HS flag picks Machine, HS, plain Supervisor or VS.
//! 3. **Context Saving:** Previous-enable and previous-privilege archiving, cause/epc/tval,
//!    hypervisor status bookkeeping and the shadow swap when leaving a guest.
//! 4. **Return Handling:** `MRET` and `SRET`, including re-entry into a guest.

use tracing::trace;

use super::Hart;
use crate::common::Trap;
use crate::common::constants::{TRAP_VECTOR_ENTRY_SIZE, TVEC_MODE_MASK, TVEC_MODE_VECTORED};
use crate::core::arch::csr::{
    HSTATUS_SP2P, HSTATUS_SP2V, HSTATUS_SPV, HSTATUS_STL, HSTATUS_VTSR, MSTATUS_MIE,
    MSTATUS_MPIE, MSTATUS_MPP, MSTATUS_MPP_SHIFT, MSTATUS_MPV, MSTATUS_MTL, MSTATUS_SIE,
    MSTATUS_SPIE, MSTATUS_SPP, MSTATUS_TSR, with_bit,
};
use crate::core::arch::mode::PrivilegeMode;
use crate::core::arch::trap::TrapHandler;

/// Where a trap is delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrapTarget {
    /// Stays in the guest: the guest's supervisor registers are updated, no swap.
    VirtualSupervisor,
    /// Hypervisor-extended supervisor.
    HypervisorSupervisor {
        /// The hart was running a guest; the shadow swap runs first.
        from_guest: bool,
    },
    /// Supervisor on a hart without the hypervisor extension.
    Supervisor,
    /// Machine mode.
    Machine,
}

/// Everything [`select_target`] decides on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DelegationInputs {
    /// Privilege the trap is taken from.
    pub privilege: PrivilegeMode,
    /// Whether a guest is running.
    pub virtualized: bool,
    /// Force-HS flag.
    pub force_hs: bool,
    /// Whether the hypervisor extension is present.
    pub hypervisor: bool,
    /// `mideleg` for interrupts, `medeleg` for exceptions.
    pub deleg: u64,
    /// `hideleg` for interrupts, `hedeleg` for exceptions.
    pub hdeleg: u64,
}

const fn bit_set(mask: u64, cause: u64) -> bool {
    cause < 64 && (mask >> cause) & 1 != 0
}

/// Chooses the delivery target of a cause.
///
/// | delegated | H ext | virtualized | guest-delegated, !force-HS | target |
/// |-----------|-------|-------------|----------------------------|--------|
/// | no        | -     | -           | -                          | M      |
/// | yes       | no    | -           | -                          | S      |
/// | yes       | yes   | yes         | yes                        | VS     |
/// | yes       | yes   | yes         | no                         | HS (swap) |
/// | yes       | yes   | no          | -                          | HS     |
///
/// A cause is delegated only when taken at Supervisor or below.
pub const fn select_target(cause: u64, inputs: &DelegationInputs) -> TrapTarget {
    let delegated = !matches!(inputs.privilege, PrivilegeMode::Machine) && bit_set(inputs.deleg, cause);
    if !delegated {
        return TrapTarget::Machine;
    }
    if !inputs.hypervisor {
        return TrapTarget::Supervisor;
    }
    if inputs.virtualized && bit_set(inputs.hdeleg, cause) && !inputs.force_hs {
        return TrapTarget::VirtualSupervisor;
    }
    TrapTarget::HypervisorSupervisor {
        from_guest: inputs.virtualized,
    }
}

/// Rewrites the generic environment call into the cause for the calling mode.
pub const fn specialize_cause(trap: Trap, privilege: PrivilegeMode, virtualized: bool) -> Trap {
    match trap {
        Trap::EnvironmentCall => match privilege {
            PrivilegeMode::Machine => Trap::EnvironmentCallFromMMode,
            PrivilegeMode::Supervisor if virtualized => Trap::EnvironmentCallFromVSMode,
            PrivilegeMode::Supervisor => Trap::EnvironmentCallFromHSMode,
            PrivilegeMode::User => Trap::EnvironmentCallFromUMode,
        },
        other => other,
    }
}

/// Base of `xtvec`, plus the vector offset for asynchronous traps in vectored mode.
const fn vector_target(tvec: u64, cause: u64, is_async: bool) -> u64 {
    let base = tvec & !TVEC_MODE_MASK;
    if is_async && tvec & TVEC_MODE_MASK == TVEC_MODE_VECTORED {
        base.wrapping_add(cause * TRAP_VECTOR_ENTRY_SIZE)
    } else {
        base
    }
}

impl Hart {
    /// Records `trap` as the pending event and delivers it immediately.
    pub fn dispatch_trap(&mut self, trap: Trap) {
        self.pending_event = Some(trap);
        let _ = self.deliver_pending_event();
    }

    /// Rebuilds a trap from a raw cause and delivers it.
    ///
    /// Returns the trap as delivered, or `None` (nothing delivered) for a cause
    /// the core does not model.
    pub fn dispatch_raw(&mut self, cause: u64, is_async: bool, tval: u64) -> Option<Trap> {
        self.pending_event = Some(Trap::from_raw(cause, is_async, tval)?);
        self.deliver_pending_event()
    }

    /// Records an exception to be delivered by the next [`Hart::deliver_pending_event`].
    pub const fn raise(&mut self, trap: Trap) {
        self.pending_event = Some(trap);
    }

    /// Delivers the pending event, if any, and clears it.
    ///
    /// Returns the trap as delivered, after cause re-specialization.
    pub fn deliver_pending_event(&mut self) -> Option<Trap> {
        let event = self.pending_event.take()?;
        let privilege = self.mode.privilege();
        let virtualized = self.mode.is_virtualized();

        let trap = specialize_cause(event, privilege, virtualized);
        let is_async = trap.is_interrupt();
        let cause = trap.code();
        let tval = trap.tval();

        trace!(
            hart = self.config.hart_id,
            is_async,
            cause,
            pc = self.pc,
            tval,
            name = TrapHandler::cause_name(&trap),
            "trap"
        );

        let (deleg, hdeleg) = if is_async {
            (self.csrs.mideleg, self.csrs.hideleg)
        } else {
            (self.csrs.medeleg, self.csrs.hedeleg)
        };
        let target = select_target(
            cause,
            &DelegationInputs {
                privilege,
                virtualized,
                force_hs: self.mode.force_hs(),
                hypervisor: self.mode.has_hypervisor(),
                deleg,
                hdeleg,
            },
        );

        match target {
            TrapTarget::Machine => self.enter_machine(cause, is_async, tval),
            TrapTarget::VirtualSupervisor | TrapTarget::Supervisor => {
                self.enter_supervisor(cause, is_async, tval);
            }
            TrapTarget::HypervisorSupervisor { from_guest } => {
                if from_guest {
                    self.swap_virtualization_shadow();
                }
                self.record_hypervisor_entry(from_guest);
                if from_guest {
                    self.set_virtualized(false);
                    self.set_force_hs(false);
                }
                self.enter_supervisor(cause, is_async, tval);
            }
        }
        Some(trap)
    }

    /// Archives the previous virtualization and privilege into `hstatus`.
    fn record_hypervisor_entry(&mut self, from_guest: bool) {
        let c = &mut self.csrs;
        let spv = c.hstatus & HSTATUS_SPV != 0;
        let spp = c.mstatus & MSTATUS_SPP != 0;
        let mut h = c.hstatus;
        h = with_bit(h, HSTATUS_SP2V, spv);
        h = with_bit(h, HSTATUS_SP2P, spp);
        h = with_bit(h, HSTATUS_SPV, self.mode.is_virtualized());
        if from_guest {
            h = with_bit(h, HSTATUS_STL, self.mode.force_hs());
        }
        c.hstatus = h;
    }

    fn enter_supervisor(&mut self, cause: u64, is_async: bool, tval: u64) {
        let privilege = self.mode.privilege();
        let c = &mut self.csrs;

        let mut s = c.mstatus;
        s = with_bit(s, MSTATUS_SPIE, s & MSTATUS_SIE != 0);
        s = with_bit(s, MSTATUS_SPP, privilege != PrivilegeMode::User);
        s &= !MSTATUS_SIE;
        c.mstatus = s;

        c.scause = cause | if is_async { c.xlen.cause_interrupt_bit() } else { 0 };
        c.sepc = self.pc;
        c.stval = tval;
        self.pc = vector_target(c.stvec, cause, is_async);
        self.set_privilege(PrivilegeMode::Supervisor);
    }

    fn enter_machine(&mut self, cause: u64, is_async: bool, tval: u64) {
        if self.mode.has_hypervisor() {
            let virtualized = self.mode.is_virtualized();
            if virtualized {
                self.swap_virtualization_shadow();
            }
            self.csrs.mstatus = with_bit(self.csrs.mstatus, MSTATUS_MPV, virtualized);
            self.csrs.mstatus = with_bit(self.csrs.mstatus, MSTATUS_MTL, self.mode.force_hs());
            self.set_virtualized(false);
        }

        let privilege = self.mode.privilege();
        let c = &mut self.csrs;

        let mut s = c.mstatus;
        s = with_bit(s, MSTATUS_MPIE, s & MSTATUS_MIE != 0);
        s = (s & !MSTATUS_MPP) | (u64::from(privilege.to_u8()) << MSTATUS_MPP_SHIFT);
        s &= !MSTATUS_MIE;
        c.mstatus = s;

        c.mcause = cause | if is_async { c.xlen.cause_interrupt_bit() } else { 0 };
        c.mepc = self.pc;
        c.mtval = tval;
        self.pc = vector_target(c.mtvec, cause, is_async);
        self.set_privilege(PrivilegeMode::Machine);
    }

    /// Executes `MRET`.
    ///
    /// # Errors
    ///
    /// Returns [`Trap::IllegalInstruction`] outside Machine mode.
    pub fn mret(&mut self) -> Result<(), Trap> {
        if self.mode.privilege() != PrivilegeMode::Machine {
            return Err(Trap::IllegalInstruction);
        }

        let mut s = self.csrs.mstatus;
        let prev_priv = self.csrs.mpp();
        let mpv = s & MSTATUS_MPV != 0;

        s = with_bit(s, MSTATUS_MIE, s & MSTATUS_MPIE != 0);
        s |= MSTATUS_MPIE;
        s &= !MSTATUS_MPP;
        s &= !MSTATUS_MPV;
        self.csrs.mstatus = s;
        self.pc = self.csrs.mepc;

        self.set_privilege_encoded(prev_priv);
        if self.mode.has_hypervisor() {
            // MPV is ignored when MPP selects Machine.
            let prev_virt = mpv && self.mode.privilege() != PrivilegeMode::Machine;
            if prev_virt {
                self.swap_virtualization_shadow();
            }
            self.set_virtualized(prev_virt);
        }
        Ok(())
    }

    /// Executes `SRET`.
    ///
    /// # Errors
    ///
    /// Returns [`Trap::IllegalInstruction`] below Supervisor mode, in HS/S mode with
    /// `mstatus.TSR`, or in a guest with `hstatus.VTSR`.
    pub fn sret(&mut self) -> Result<(), Trap> {
        let privilege = self.mode.privilege();
        let virtualized = self.mode.is_virtualized();
        if privilege < PrivilegeMode::Supervisor {
            return Err(Trap::IllegalInstruction);
        }
        if privilege == PrivilegeMode::Supervisor && self.csrs.mstatus & MSTATUS_TSR != 0 {
            return Err(Trap::IllegalInstruction);
        }
        if virtualized && self.csrs.hstatus & HSTATUS_VTSR != 0 {
            return Err(Trap::IllegalInstruction);
        }

        let mut s = self.csrs.mstatus;
        let prev_priv = if s & MSTATUS_SPP != 0 {
            PrivilegeMode::Supervisor
        } else {
            PrivilegeMode::User
        };
        self.pc = self.csrs.sepc;

        if self.mode.has_hypervisor() && !virtualized {
            let mut h = self.csrs.hstatus;
            let prev_virt = h & HSTATUS_SPV != 0;
            h = with_bit(h, HSTATUS_SPV, h & HSTATUS_SP2V != 0);
            s = with_bit(s, MSTATUS_SPP, h & HSTATUS_SP2P != 0);
            h &= !(HSTATUS_SP2V | HSTATUS_SP2P);
            s = with_bit(s, MSTATUS_SIE, s & MSTATUS_SPIE != 0);
            s |= MSTATUS_SPIE;
            self.csrs.mstatus = s;
            self.csrs.hstatus = h;

            self.set_privilege(prev_priv);
            if prev_virt {
                self.swap_virtualization_shadow();
            }
            self.set_virtualized(prev_virt);
        } else {
            s = with_bit(s, MSTATUS_SIE, s & MSTATUS_SPIE != 0);
            s |= MSTATUS_SPIE;
            s &= !MSTATUS_SPP;
            self.csrs.mstatus = s;
            self.set_privilege(prev_priv);
        }
        Ok(())
    }
}
