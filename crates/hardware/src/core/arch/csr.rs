//! Control and Status Register (CSR) definitions and storage.
//!
//! This module implements the privileged register file of a hart. It provides:
//! 1. **Address Definitions:** Constants for the machine, supervisor and hypervisor CSRs.
//! 2. **Field Masks:** Bitmasks and shifts for status, hypervisor status and address translation.
//! 3. **Register Storage:** The `Csrs` struct, including the virtual-supervisor shadows.
//! 4. **Access Logic:** Read and write by address, with the `sstatus`/`sie` views of
//!    their machine-level registers and WARL handling of `satp`/`hgatp`.
//!
//! The interrupt-pending register is not stored here: it is shared with other
//! harts and lives in [`crate::core::hart::interrupt::InterruptLines`].

use crate::common::Interrupt;
use crate::config::Xlen;

/// Machine hardware thread ID CSR address.
pub const MHARTID: u32 = 0xF14;
/// Machine status register CSR address.
pub const MSTATUS: u32 = 0x300;
/// Machine ISA register CSR address.
pub const MISA: u32 = 0x301;
/// Machine exception delegation register CSR address.
pub const MEDELEG: u32 = 0x302;
/// Machine interrupt delegation register CSR address.
pub const MIDELEG: u32 = 0x303;
/// Machine interrupt enable register CSR address.
pub const MIE: u32 = 0x304;
/// Machine trap vector base address register CSR address.
pub const MTVEC: u32 = 0x305;
/// Machine scratch register CSR address.
pub const MSCRATCH: u32 = 0x340;
/// Machine exception program counter CSR address.
pub const MEPC: u32 = 0x341;
/// Machine cause register CSR address.
pub const MCAUSE: u32 = 0x342;
/// Machine trap value register CSR address.
pub const MTVAL: u32 = 0x343;
/// Machine interrupt pending register CSR address.
pub const MIP: u32 = 0x344;

/// Supervisor status register CSR address.
pub const SSTATUS: u32 = 0x100;
/// Supervisor interrupt enable register CSR address.
pub const SIE: u32 = 0x104;
/// Supervisor trap vector base address register CSR address.
pub const STVEC: u32 = 0x105;
/// Supervisor scratch register CSR address.
pub const SSCRATCH: u32 = 0x140;
/// Supervisor exception program counter CSR address.
pub const SEPC: u32 = 0x141;
/// Supervisor cause register CSR address.
pub const SCAUSE: u32 = 0x142;
/// Supervisor trap value register CSR address.
pub const STVAL: u32 = 0x143;
/// Supervisor interrupt pending register CSR address.
pub const SIP: u32 = 0x144;
/// Supervisor address translation and protection register CSR address.
pub const SATP: u32 = 0x180;

/// Hypervisor status register CSR address.
pub const HSTATUS: u32 = 0x600;
/// Hypervisor exception delegation register CSR address.
pub const HEDELEG: u32 = 0x602;
/// Hypervisor interrupt delegation register CSR address.
pub const HIDELEG: u32 = 0x603;
/// Hypervisor guest address translation register CSR address.
pub const HGATP: u32 = 0x680;

/// Virtual supervisor status register CSR address.
pub const VSSTATUS: u32 = 0x200;
/// Virtual supervisor interrupt enable register CSR address.
pub const VSIE: u32 = 0x204;
/// Virtual supervisor trap vector register CSR address.
pub const VSTVEC: u32 = 0x205;
/// Virtual supervisor scratch register CSR address.
pub const VSSCRATCH: u32 = 0x240;
/// Virtual supervisor exception program counter CSR address.
pub const VSEPC: u32 = 0x241;
/// Virtual supervisor cause register CSR address.
pub const VSCAUSE: u32 = 0x242;
/// Virtual supervisor trap value register CSR address.
pub const VSTVAL: u32 = 0x243;
/// Virtual supervisor interrupt pending register CSR address.
pub const VSIP: u32 = 0x244;
/// Virtual supervisor address translation register CSR address.
pub const VSATP: u32 = 0x280;

/// Supervisor interrupt enable bit in `mstatus` register.
pub const MSTATUS_SIE: u64 = 1 << 1;
/// Machine interrupt enable bit in `mstatus` register.
pub const MSTATUS_MIE: u64 = 1 << 3;
/// Supervisor previous interrupt enable bit in `mstatus` register.
pub const MSTATUS_SPIE: u64 = 1 << 5;
/// Machine previous interrupt enable bit in `mstatus` register.
pub const MSTATUS_MPIE: u64 = 1 << 7;
/// Supervisor previous privilege mode bit in `mstatus` register.
pub const MSTATUS_SPP: u64 = 1 << 8;
/// Machine previous privilege mode field mask in `mstatus` register.
pub const MSTATUS_MPP: u64 = 3 << 11;
/// Bit shift for machine previous privilege mode field in `mstatus` register.
pub const MSTATUS_MPP_SHIFT: u64 = 11;
/// Bit mask for machine previous privilege mode field in `mstatus` register.
pub const MSTATUS_MPP_MASK: u64 = 3;
/// Floating-point state field mask in `mstatus` register.
pub const MSTATUS_FS: u64 = 3 << 13;
/// Modify privilege bit in `mstatus` register.
pub const MSTATUS_MPRV: u64 = 1 << 17;
/// Supervisor user memory access bit in `mstatus` register.
pub const MSTATUS_SUM: u64 = 1 << 18;
/// Make executable readable bit in `mstatus` register.
pub const MSTATUS_MXR: u64 = 1 << 19;
/// Trap SRET bit in `mstatus` register.
pub const MSTATUS_TSR: u64 = 1 << 22;
/// User XLEN field in RV64 `mstatus`.
pub const MSTATUS64_UXL: u64 = 3 << 32;
/// Machine trap taken while guest page tables were force-trapped (hypervisor).
pub const MSTATUS_MTL: u64 = 1 << 38;
/// Machine previous virtualization mode (hypervisor).
pub const MSTATUS_MPV: u64 = 1 << 39;

/// Bits of `mstatus` visible through `sstatus`.
pub const SSTATUS_MASK: u64 = MSTATUS_SIE
    | MSTATUS_SPIE
    | MSTATUS_SPP
    | MSTATUS_FS
    | MSTATUS_SUM
    | MSTATUS_MXR
    | MSTATUS64_UXL;

/// Supervisor trap taken while guest page tables were force-trapped.
pub const HSTATUS_STL: u64 = 1 << 6;
/// Supervisor previous virtualization mode.
pub const HSTATUS_SPV: u64 = 1 << 7;
/// Supervisor second previous privilege.
pub const HSTATUS_SP2P: u64 = 1 << 8;
/// Supervisor second previous virtualization mode.
pub const HSTATUS_SP2V: u64 = 1 << 9;
/// Trap SRET from VS-mode.
pub const HSTATUS_VTSR: u64 = 1 << 22;

/// Supervisor software interrupt pending bit in `mip` register.
pub const MIP_SSIP: u64 = Interrupt::SupervisorSoftware.bit();
/// Virtual supervisor software interrupt pending bit in `mip` register.
pub const MIP_VSSIP: u64 = Interrupt::VirtualSupervisorSoftware.bit();
/// Machine software interrupt pending bit in `mip` register.
pub const MIP_MSIP: u64 = Interrupt::MachineSoftware.bit();
/// Supervisor timer interrupt pending bit in `mip` register.
pub const MIP_STIP: u64 = Interrupt::SupervisorTimer.bit();
/// Virtual supervisor timer interrupt pending bit in `mip` register.
pub const MIP_VSTIP: u64 = Interrupt::VirtualSupervisorTimer.bit();
/// Machine timer interrupt pending bit in `mip` register.
pub const MIP_MTIP: u64 = Interrupt::MachineTimer.bit();
/// Supervisor external interrupt pending bit in `mip` register.
pub const MIP_SEIP: u64 = Interrupt::SupervisorExternal.bit();
/// Virtual supervisor external interrupt pending bit in `mip` register.
pub const MIP_VSEIP: u64 = Interrupt::VirtualSupervisorExternal.bit();
/// Machine external interrupt pending bit in `mip` register.
pub const MIP_MEIP: u64 = Interrupt::MachineExternal.bit();

/// Supervisor-level interrupt bits shared between HS and VS contexts.
pub const SUPERVISOR_INTERRUPTS: u64 = MIP_SSIP | MIP_STIP | MIP_SEIP;

/// Bit shift for the mode field in RV64 `satp`/`hgatp`.
pub const SATP64_MODE_SHIFT: u64 = 60;
/// Mask for the mode field in RV64 `satp`/`hgatp` (after shifting).
pub const SATP64_MODE_MASK: u64 = 0xF;
/// Physical page number mask in RV64 `satp`/`hgatp`.
pub const SATP64_PPN_MASK: u64 = 0xFFF_FFFF_FFFF;
/// Bit shift for the mode bit in RV32 `satp`/`hgatp`.
pub const SATP32_MODE_SHIFT: u64 = 31;
/// Mask for the mode field in RV32 `satp`/`hgatp` (after shifting).
pub const SATP32_MODE_MASK: u64 = 0x1;
/// Physical page number mask in RV32 `satp`/`hgatp`.
pub const SATP32_PPN_MASK: u64 = 0x3F_FFFF;

/// Bare (no translation) mode encoding.
pub const SATP_MODE_BARE: u64 = 0;
/// Sv32 mode encoding (RV32 only).
pub const SATP_MODE_SV32: u64 = 1;
/// Sv39 mode encoding (RV64 only).
pub const SATP_MODE_SV39: u64 = 8;
/// Sv48 mode encoding (RV64 only).
pub const SATP_MODE_SV48: u64 = 9;
/// Sv57 mode encoding (RV64 only).
pub const SATP_MODE_SV57: u64 = 10;

/// Splits an address-translation register (`satp`, `vsatp`, `hgatp`) into mode and root PPN.
pub const fn split_atp(value: u64, xlen: Xlen) -> (u64, u64) {
    match xlen {
        Xlen::Rv32 => (
            (value >> SATP32_MODE_SHIFT) & SATP32_MODE_MASK,
            value & SATP32_PPN_MASK,
        ),
        Xlen::Rv64 => (
            (value >> SATP64_MODE_SHIFT) & SATP64_MODE_MASK,
            value & SATP64_PPN_MASK,
        ),
    }
}

/// Returns true if `mode` is an implemented translation mode for `xlen`.
pub const fn atp_mode_supported(mode: u64, xlen: Xlen) -> bool {
    match xlen {
        Xlen::Rv32 => matches!(mode, SATP_MODE_BARE | SATP_MODE_SV32),
        Xlen::Rv64 => matches!(
            mode,
            SATP_MODE_BARE | SATP_MODE_SV39 | SATP_MODE_SV48 | SATP_MODE_SV57
        ),
    }
}

/// Control and Status Register file.
///
/// Holds the machine, supervisor and hypervisor registers of one hart, plus the
/// virtual-supervisor shadows. While a guest runs, the live supervisor fields hold
/// the guest's values and the `vs*` fields hold the host's.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Csrs {
    /// Register width, used for WARL handling of translation registers.
    pub xlen: Xlen,
    /// Machine status register.
    pub mstatus: u64,
    /// Machine ISA register.
    pub misa: u64,
    /// Machine exception delegation.
    pub medeleg: u64,
    /// Machine interrupt delegation.
    pub mideleg: u64,
    /// Machine interrupt enable.
    pub mie: u64,
    /// Machine trap vector base address.
    pub mtvec: u64,
    /// Machine scratch register.
    pub mscratch: u64,
    /// Machine exception program counter.
    pub mepc: u64,
    /// Machine trap cause.
    pub mcause: u64,
    /// Machine trap value.
    pub mtval: u64,
    /// Supervisor trap vector base address.
    pub stvec: u64,
    /// Supervisor scratch register.
    pub sscratch: u64,
    /// Supervisor exception program counter.
    pub sepc: u64,
    /// Supervisor trap cause.
    pub scause: u64,
    /// Supervisor trap value.
    pub stval: u64,
    /// Supervisor address translation and protection (SATP).
    pub satp: u64,
    /// Hypervisor status.
    pub hstatus: u64,
    /// Hypervisor exception delegation.
    pub hedeleg: u64,
    /// Hypervisor interrupt delegation.
    pub hideleg: u64,
    /// Hypervisor guest address translation and protection.
    pub hgatp: u64,
    /// Virtual supervisor status shadow.
    pub vsstatus: u64,
    /// Virtual supervisor interrupt enable shadow.
    pub vsie: u64,
    /// Virtual supervisor interrupt pending.
    pub vsip: u64,
    /// Virtual supervisor trap vector shadow.
    pub vstvec: u64,
    /// Virtual supervisor scratch shadow.
    pub vsscratch: u64,
    /// Virtual supervisor exception program counter shadow.
    pub vsepc: u64,
    /// Virtual supervisor trap cause shadow.
    pub vscause: u64,
    /// Virtual supervisor trap value shadow.
    pub vstval: u64,
    /// Virtual supervisor address translation shadow.
    pub vsatp: u64,
}

impl Csrs {
    /// Creates a zeroed register file for a hart of the given width.
    pub fn new(xlen: Xlen) -> Self {
        Self {
            xlen,
            ..Self::default()
        }
    }

    /// Reads a CSR value by its address.
    ///
    /// Returns `None` for addresses not stored in this file (including `mip`,
    /// `sip` and `vsip`, which the hart reads from its shared pending register).
    pub const fn read(&self, addr: u32) -> Option<u64> {
        let val = match addr {
            MSTATUS => self.mstatus,
            MISA => self.misa,
            MEDELEG => self.medeleg,
            MIDELEG => self.mideleg,
            MIE => self.mie,
            MTVEC => self.mtvec,
            MSCRATCH => self.mscratch,
            MEPC => self.mepc,
            MCAUSE => self.mcause,
            MTVAL => self.mtval,
            SSTATUS => self.mstatus & SSTATUS_MASK,
            SIE => self.mie & self.mideleg,
            STVEC => self.stvec,
            SSCRATCH => self.sscratch,
            SEPC => self.sepc,
            SCAUSE => self.scause,
            STVAL => self.stval,
            SATP => self.satp,
            HSTATUS => self.hstatus,
            HEDELEG => self.hedeleg,
            HIDELEG => self.hideleg,
            HGATP => self.hgatp,
            VSSTATUS => self.vsstatus,
            VSIE => self.vsie,
            VSTVEC => self.vstvec,
            VSSCRATCH => self.vsscratch,
            VSEPC => self.vsepc,
            VSCAUSE => self.vscause,
            VSTVAL => self.vstval,
            VSATP => self.vsatp,
            _ => return None,
        };
        Some(val)
    }

    /// Writes a value to a CSR by its address.
    ///
    /// Returns false if the address is not stored in this file. Translation
    /// registers are WARL: a write selecting an unsupported mode is dropped.
    pub const fn write(&mut self, addr: u32, val: u64) -> bool {
        match addr {
            MSTATUS => self.mstatus = val,
            MISA => self.misa = val,
            MEDELEG => self.medeleg = val,
            MIDELEG => self.mideleg = val,
            MIE => self.mie = val,
            MTVEC => self.mtvec = val,
            MSCRATCH => self.mscratch = val,
            MEPC => self.mepc = val,
            MCAUSE => self.mcause = val,
            MTVAL => self.mtval = val,
            SSTATUS => self.mstatus = (self.mstatus & !SSTATUS_MASK) | (val & SSTATUS_MASK),
            SIE => self.mie = (self.mie & !self.mideleg) | (val & self.mideleg),
            STVEC => self.stvec = val,
            SSCRATCH => self.sscratch = val,
            SEPC => self.sepc = val,
            SCAUSE => self.scause = val,
            STVAL => self.stval = val,
            SATP => {
                if atp_mode_supported(split_atp(val, self.xlen).0, self.xlen) {
                    self.satp = val;
                }
            }
            HSTATUS => self.hstatus = val,
            HEDELEG => self.hedeleg = val,
            HIDELEG => self.hideleg = val,
            HGATP => {
                if atp_mode_supported(split_atp(val, self.xlen).0, self.xlen) {
                    self.hgatp = val;
                }
            }
            VSSTATUS => self.vsstatus = val,
            VSIE => self.vsie = val,
            VSTVEC => self.vstvec = val,
            VSSCRATCH => self.vsscratch = val,
            VSEPC => self.vsepc = val,
            VSCAUSE => self.vscause = val,
            VSTVAL => self.vstval = val,
            VSATP => {
                if atp_mode_supported(split_atp(val, self.xlen).0, self.xlen) {
                    self.vsatp = val;
                }
            }
            _ => return false,
        }
        true
    }

    /// Returns the `MPP` field decoded as an encoding.
    pub const fn mpp(&self) -> u8 {
        ((self.mstatus >> MSTATUS_MPP_SHIFT) & MSTATUS_MPP_MASK) as u8
    }

    /// Returns true if every bit of `mask` is set in `mstatus`.
    pub const fn mstatus_has(&self, mask: u64) -> bool {
        self.mstatus & mask == mask
    }
}

/// Returns `reg` with the bits in `mask` set when `on`, cleared otherwise.
#[inline]
pub const fn with_bit(reg: u64, mask: u64, on: bool) -> u64 {
    if on { reg | mask } else { reg & !mask }
}
