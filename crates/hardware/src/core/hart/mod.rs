//! Hart Privileged State.
//!
//! This module defines the `Hart` structure, the single owner of one hardware thread's
//! privileged state. It coordinates the following:
//! 1. **Mode State:** Privilege, virtualization and force-HS flags (see [`privilege`]).
//! 2. **Interrupts:** The shared pending register and the resolver (see [`interrupt`]).
//! 3. **Traps:** Delivery, cause re-specialization and trap return (see [`trap`]).
//! 4. **Memory:** Translation, PMP and the translation-cache fill protocol (see [`memory`]).
//!
//! Everything except the pending-interrupt register is mutated only by the thread that
//! runs the hart.

/// Address translation, PMP and translation-cache fills.
pub mod memory;

/// Privilege transitions and the virtualization shadow swap.
pub mod privilege;

/// Shared pending register, line notifications and the interrupt resolver.
pub mod interrupt;

/// Trap delivery and trap return.
pub mod trap;

use std::fmt;
use std::sync::Arc;

use self::interrupt::InterruptLines;
use crate::common::Trap;
use crate::config::{ConfigError, HartConfig, Xlen};
use crate::core::arch::csr::{
    self, Csrs, MIP_SSIP, MIP_VSEIP, MIP_VSSIP, MIP_VSTIP, MSTATUS_FS, SUPERVISOR_INTERRUPTS,
};
use crate::core::arch::mode::{ModeState, PrivilegeMode};
use crate::core::units::mmu::pmp::Pmp;
use crate::soc::traits::{PhysicalMemory, TranslationCache};

/// `misa` extension bits reported by every hart (I, S, U).
const MISA_BASE_EXTENSIONS: u64 = (1 << 8) | (1 << 18) | (1 << 20);

/// `misa` bit of the hypervisor extension.
const MISA_EXT_H: u64 = 1 << 7;

/// One hardware thread's privileged state.
pub struct Hart {
    config: HartConfig,
    /// Program counter.
    pub pc: u64,
    /// Control and Status Registers (all but the shared pending register).
    pub csrs: Csrs,
    mode: ModeState,
    /// Address reserved by the last load-reserved, if still valid.
    pub load_reservation: Option<u64>,
    pending_event: Option<Trap>,
    lines: Arc<InterruptLines>,
    irq_line: bool,
    pmp: Pmp,
    memory: Arc<dyn PhysicalMemory>,
    tlb: Box<dyn TranslationCache>,
}

impl fmt::Debug for Hart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hart")
            .field("hart_id", &self.config.hart_id)
            .field("pc", &format_args!("{:#x}", self.pc))
            .field("mode", &self.mode)
            .field("pending_event", &self.pending_event)
            .field("irq_line", &self.irq_line)
            .finish_non_exhaustive()
    }
}

impl Hart {
    /// Creates a hart in its reset state.
    ///
    /// # Arguments
    ///
    /// * `config` - Hart parameters, validated here.
    /// * `memory` - Physical memory holding page tables.
    /// * `tlb` - Translation cache the fill protocol installs into.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `config` fails validation.
    pub fn new(
        config: HartConfig,
        memory: Arc<dyn PhysicalMemory>,
        tlb: Box<dyn TranslationCache>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut hart = Self {
            pc: config.reset_vector,
            csrs: Csrs::new(config.xlen),
            mode: ModeState::new(config.extensions.hypervisor),
            load_reservation: None,
            pending_event: None,
            lines: Arc::new(InterruptLines::new()),
            irq_line: false,
            pmp: Pmp::new(config.pmp_entries),
            memory,
            tlb,
            config,
        };
        hart.reset();
        Ok(hart)
    }

    /// Returns the hart to its reset state: Machine mode, registers zeroed.
    ///
    /// The shared pending register and claims belong to the platform and are kept;
    /// the interrupt-request line drops until the next pending-register update.
    pub fn reset(&mut self) {
        self.pc = self.config.reset_vector;
        self.csrs = Csrs::new(self.config.xlen);
        self.csrs.misa = self.misa();
        self.mode = ModeState::new(self.config.extensions.hypervisor);
        self.load_reservation = None;
        self.pending_event = None;
        self.irq_line = false;
        self.lines.clear_event();
        self.pmp.reset();
        self.tlb.invalidate_all();
        tracing::debug!(hart = self.config.hart_id, pc = self.pc, "hart reset");
    }

    fn misa(&self) -> u64 {
        let mxl = match self.config.xlen {
            Xlen::Rv32 => 1u64 << 30,
            Xlen::Rv64 => 2u64 << 62,
        };
        let h = if self.config.extensions.hypervisor {
            MISA_EXT_H
        } else {
            0
        };
        mxl | MISA_BASE_EXTENSIONS | h
    }

    /// Returns the configuration the hart was built with.
    pub const fn config(&self) -> &HartConfig {
        &self.config
    }

    /// Returns the privilege, virtualization and force-HS flags.
    pub const fn mode_state(&self) -> ModeState {
        self.mode
    }

    /// Returns the event waiting to be dispatched, if any.
    pub const fn pending_event(&self) -> Option<Trap> {
        self.pending_event
    }

    /// Returns the PMP unit.
    pub const fn pmp(&self) -> &Pmp {
        &self.pmp
    }

    /// Returns the PMP unit for configuration.
    pub const fn pmp_mut(&mut self) -> &mut Pmp {
        &mut self.pmp
    }

    /// Returns the physical memory the hart walks page tables in.
    pub fn memory(&self) -> &dyn PhysicalMemory {
        self.memory.as_ref()
    }

    /// Returns the translation cache.
    pub fn translation_cache(&self) -> &dyn TranslationCache {
        self.tlb.as_ref()
    }

    /// Translation context index used to tag translation-cache entries.
    pub const fn mmu_index(&self) -> u8 {
        self.mode.privilege().to_u8()
    }

    /// Returns true if floating-point instructions may execute.
    ///
    /// Needs `mstatus.FS` non-Off, and while virtualized also the guest's `FS`.
    pub const fn fp_enabled(&self) -> bool {
        if self.csrs.mstatus & MSTATUS_FS == 0 {
            return false;
        }
        !(self.mode.is_virtualized() && self.csrs.vsstatus & MSTATUS_FS == 0)
    }

    /// Reads a CSR, including the shared pending register and `mhartid`.
    pub fn read_csr(&self, addr: u32) -> Option<u64> {
        match addr {
            csr::MHARTID => Some(self.config.hart_id),
            csr::MIP => Some(self.lines.pending()),
            csr::SIP => Some(self.lines.pending() & self.csrs.mideleg),
            csr::VSIP => Some(self.csrs.vsip),
            _ => self.csrs.read(addr),
        }
    }

    /// Writes a CSR. Returns false if the register does not exist or is read-only.
    ///
    /// Writes to `mip`/`sip` only touch software-writable bits and go through the
    /// atomic update path. Writes to translation registers flush the translation cache.
    pub fn write_csr(&mut self, addr: u32, val: u64) -> bool {
        match addr {
            csr::MHARTID => false,
            csr::MIP => {
                let _ = self.lines.update_pending(self.writable_mip(), val);
                true
            }
            csr::SIP => {
                let _ = self
                    .lines
                    .update_pending(MIP_SSIP & self.csrs.mideleg, val);
                true
            }
            csr::VSIP => {
                self.csrs.vsip = val & SUPERVISOR_INTERRUPTS;
                true
            }
            csr::SATP | csr::VSATP | csr::HGATP => {
                let written = self.csrs.write(addr, val);
                self.tlb.invalidate_all();
                written
            }
            _ => self.csrs.write(addr, val),
        }
    }

    const fn writable_mip(&self) -> u64 {
        let vs = if self.mode.has_hypervisor() {
            MIP_VSSIP | MIP_VSTIP | MIP_VSEIP
        } else {
            0
        };
        SUPERVISOR_INTERRUPTS | vs
    }

    /// Returns the current privilege.
    pub const fn privilege(&self) -> PrivilegeMode {
        self.mode.privilege()
    }
}
