//! Interrupt Signalling and Resolution.
//!
//! This module implements how interrupts reach a hart and which one it takes. It provides:
//! 1. **Shared Pending Register:** `InterruptLines`, written by any thread with a
//!    compare-and-swap loop, plus the claim mask used by interrupt-controller models.
//! 2. **Line Notifications:** Pending-register updates flag the hart's interrupt-request
//!    line as stale; the hart re-reads the level itself at an instruction boundary.
//! 3. **Resolver:** A pure function picking the single interrupt to deliver from a snapshot.
//! 4. **Servicing:** The hart-side hook that drains notifications, resolves and dispatches.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tracing::trace;

use super::Hart;
use crate::common::{ClaimError, Interrupt, Trap};
use crate::core::arch::csr::{MSTATUS_MIE, MSTATUS_SIE};
use crate::core::arch::mode::PrivilegeMode;

/// Level change of a hart's interrupt-request line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// At least one pending bit is set.
    Raise,
    /// No pending bit is set.
    Lower,
}

/// Pending-interrupt state shared between a hart and everything that signals it.
///
/// Harts, timers and interrupt-controller models hold an `Arc<InterruptLines>` and
/// may call [`InterruptLines::update_pending`] from any thread. The owning hart
/// picks up the resulting line changes with [`Hart::service_interrupts`].
///
/// Notifications coalesce: however many updates land between two drains, the
/// hart sees one event carrying the level at drain time.
#[derive(Debug, Default)]
pub struct InterruptLines {
    mip: AtomicU64,
    claimed: AtomicU64,
    stale: AtomicBool,
}

impl InterruptLines {
    /// Creates an empty register with nothing claimed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current pending bits.
    pub fn pending(&self) -> u64 {
        self.mip.load(Ordering::Acquire)
    }

    /// Returns the bits claimed by interrupt-controller models.
    pub fn claimed(&self) -> u64 {
        self.claimed.load(Ordering::Acquire)
    }

    /// Replaces the bits selected by `mask` with those of `value`.
    ///
    /// Returns the pending register as it was before this update, and flags the
    /// owning hart's line for re-evaluation.
    pub fn update_pending(&self, mask: u64, value: u64) -> u64 {
        let old = match self
            .mip
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |old| {
                Some((old & !mask) | (value & mask))
            }) {
            Ok(old) | Err(old) => old,
        };
        self.stale.store(true, Ordering::Release);
        old
    }

    /// Marks `mask` as owned by an interrupt-controller model.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Conflict`] if any bit of `mask` is already claimed;
    /// the claimed set is left unchanged.
    pub fn claim(&self, mask: u64) -> Result<(), ClaimError> {
        self.claimed
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |claimed| {
                (claimed & mask == 0).then_some(claimed | mask)
            })
            .map(|_| ())
            .map_err(|already_claimed| ClaimError::Conflict {
                requested: mask,
                already_claimed,
            })
    }

    /// Takes the pending line notification, if any update happened since the last call.
    ///
    /// The flag is cleared before the register is read, so an update racing with
    /// this call leaves a fresh notification behind.
    pub fn take_event(&self) -> Option<LineEvent> {
        if !self.stale.swap(false, Ordering::AcqRel) {
            return None;
        }
        Some(if self.pending() == 0 {
            LineEvent::Lower
        } else {
            LineEvent::Raise
        })
    }

    /// Drops any pending notification without reading the register.
    pub fn clear_event(&self) {
        self.stale.store(false, Ordering::Release);
    }
}

/// Snapshot of everything the resolver looks at.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct InterruptInputs {
    /// Current privilege.
    pub privilege: PrivilegeMode,
    /// Whether a guest is running.
    pub virtualized: bool,
    /// Machine-level pending bits.
    pub mip: u64,
    /// Machine-level enable bits.
    pub mie: u64,
    /// Machine interrupt delegation.
    pub mideleg: u64,
    /// Virtual-supervisor pending bits.
    pub vsip: u64,
    /// Virtual-supervisor enable bits.
    pub vsie: u64,
    /// Machine status (`MIE`, `SIE`).
    pub mstatus: u64,
    /// Virtual-supervisor status (`SIE`).
    pub vsstatus: u64,
}

/// Interrupt chosen by [`resolve_interrupt`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResolvedInterrupt {
    /// The interrupt to deliver.
    pub interrupt: Interrupt,
    /// True if it came from the virtual-supervisor set, which forces the trap to HS.
    pub virtual_supervisor: bool,
}

/// Picks the interrupt a hart should take, if any.
///
/// Machine-level interrupts are globally enabled below Machine mode or with
/// `mstatus.MIE`; delegated ones below Supervisor or in Supervisor with `SIE`.
/// While virtualized, any enabled virtual-supervisor interrupt wins outright.
/// Within a set the lowest bit index wins.
pub fn resolve_interrupt(inputs: &InterruptInputs) -> Option<ResolvedInterrupt> {
    let privilege = inputs.privilege;
    let pending = inputs.mip & inputs.mie & Interrupt::MASK;
    let vs_pending = inputs.vsip & inputs.vsie & Interrupt::MASK;

    let m_enabled = privilege < PrivilegeMode::Machine || inputs.mstatus & MSTATUS_MIE != 0;
    let s_enabled = privilege < PrivilegeMode::Supervisor
        || (privilege == PrivilegeMode::Supervisor && inputs.mstatus & MSTATUS_SIE != 0);
    let vs_enabled = privilege < PrivilegeMode::Supervisor
        || (privilege == PrivilegeMode::Supervisor && inputs.vsstatus & MSTATUS_SIE != 0);

    let gate = |bits: u64, enabled: bool| if enabled { bits } else { 0 };
    let selected = gate(pending & !inputs.mideleg, m_enabled) | gate(pending & inputs.mideleg, s_enabled);

    if inputs.virtualized {
        let vs_selected = gate(vs_pending, vs_enabled);
        if vs_selected != 0 {
            return Interrupt::from_index(u64::from(vs_selected.trailing_zeros())).map(|interrupt| {
                ResolvedInterrupt {
                    interrupt,
                    virtual_supervisor: true,
                }
            });
        }
    }

    if selected == 0 {
        return None;
    }
    Interrupt::from_index(u64::from(selected.trailing_zeros())).map(|interrupt| ResolvedInterrupt {
        interrupt,
        virtual_supervisor: false,
    })
}

impl Hart {
    /// Returns a handle other threads use to signal this hart.
    pub fn interrupt_lines(&self) -> Arc<InterruptLines> {
        Arc::clone(&self.lines)
    }

    /// Atomically updates the masked bits of the pending register. See
    /// [`InterruptLines::update_pending`].
    pub fn update_pending(&self, mask: u64, value: u64) -> u64 {
        self.lines.update_pending(mask, value)
    }

    /// Claims interrupt bits for an interrupt-controller model.
    ///
    /// # Errors
    ///
    /// Returns [`ClaimError::Conflict`] when a bit is already claimed.
    pub fn claim_interrupts(&self, mask: u64) -> Result<(), ClaimError> {
        self.lines.claim(mask)
    }

    /// Returns the level of the hart's interrupt-request line.
    pub const fn irq_requested(&self) -> bool {
        self.irq_line
    }

    /// Takes a snapshot of the interrupt state. The pending register is read once.
    pub fn interrupt_inputs(&self) -> InterruptInputs {
        InterruptInputs {
            privilege: self.mode.privilege(),
            virtualized: self.mode.is_virtualized(),
            mip: self.lines.pending(),
            mie: self.csrs.mie,
            mideleg: self.csrs.mideleg,
            vsip: self.csrs.vsip,
            vsie: self.csrs.vsie,
            mstatus: self.csrs.mstatus,
            vsstatus: self.csrs.vsstatus,
        }
    }

    /// Resolves the interrupt to take now, without taking it.
    ///
    /// A virtual-supervisor interrupt sets the force-HS flag so the dispatcher
    /// delivers it to the hypervisor.
    pub fn resolve_pending_interrupt(&mut self) -> Option<Interrupt> {
        let resolved = resolve_interrupt(&self.interrupt_inputs())?;
        if resolved.virtual_supervisor {
            self.mode.set_force_hs(true);
        }
        Some(resolved.interrupt)
    }

    /// Applies the pending line notification to the interrupt-request line.
    pub fn drain_line_events(&mut self) {
        if let Some(event) = self.lines.take_event() {
            self.irq_line = event == LineEvent::Raise;
        }
    }

    /// Instruction-boundary hook: applies line notifications and, if the line is
    /// raised and an interrupt is deliverable, dispatches it.
    ///
    /// Returns true if an interrupt was taken.
    pub fn service_interrupts(&mut self) -> bool {
        self.drain_line_events();
        if !self.irq_line {
            return false;
        }
        let Some(interrupt) = self.resolve_pending_interrupt() else {
            return false;
        };
        trace!(hart = self.config.hart_id, %interrupt, "taking interrupt");
        self.dispatch_trap(Trap::Interrupt(interrupt));
        true
    }
}
