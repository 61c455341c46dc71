//! Trap and Translation Error definitions.
//!
//! This module defines the error handling and trap mechanisms for the privileged core. It provides:
//! 1. **Trap Representation:** All synchronous exceptions and asynchronous interrupts a hart can take.
//! 2. **Walk Failures:** The two page-walk failure kinds, reported per translation stage.
//! 3. **Fill and Claim Errors:** Outcomes surfaced to the translation-cache fill protocol
//!    and to interrupt-controller models.

use std::fmt;

use thiserror::Error;

use super::addr::VirtAddr;
use crate::core::arch::trap::{exception, interrupt_name};

/// Asynchronous interrupt causes.
///
/// The discriminant is both the cause code and the bit index in `mip`/`mie`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Interrupt {
    /// User software interrupt.
    UserSoftware = 0,
    /// Supervisor software interrupt.
    SupervisorSoftware = 1,
    /// Virtual-supervisor software interrupt.
    VirtualSupervisorSoftware = 2,
    /// Machine software interrupt.
    MachineSoftware = 3,
    /// User timer interrupt.
    UserTimer = 4,
    /// Supervisor timer interrupt.
    SupervisorTimer = 5,
    /// Virtual-supervisor timer interrupt.
    VirtualSupervisorTimer = 6,
    /// Machine timer interrupt.
    MachineTimer = 7,
    /// User external interrupt.
    UserExternal = 8,
    /// Supervisor external interrupt.
    SupervisorExternal = 9,
    /// Virtual-supervisor external interrupt.
    VirtualSupervisorExternal = 10,
    /// Machine external interrupt.
    MachineExternal = 11,
}

impl Interrupt {
    /// Every architectural interrupt, in priority (bit index) order.
    pub const ALL: [Self; 12] = [
        Self::UserSoftware,
        Self::SupervisorSoftware,
        Self::VirtualSupervisorSoftware,
        Self::MachineSoftware,
        Self::UserTimer,
        Self::SupervisorTimer,
        Self::VirtualSupervisorTimer,
        Self::MachineTimer,
        Self::UserExternal,
        Self::SupervisorExternal,
        Self::VirtualSupervisorExternal,
        Self::MachineExternal,
    ];

    /// Mask covering every architectural interrupt bit.
    pub const MASK: u64 = 0xFFF;

    /// Returns the cause code (equal to the pending-bit index).
    pub const fn code(self) -> u64 {
        self as u64
    }

    /// Returns the single `mip`/`mie` bit for this interrupt.
    pub const fn bit(self) -> u64 {
        1 << (self as u64)
    }

    /// Maps a bit index back to an interrupt.
    pub fn from_index(index: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(index).ok()?).copied()
    }
}

impl fmt::Display for Interrupt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(interrupt_name(self.code()))
    }
}

/// RISC-V trap types representing exceptions and interrupts.
///
/// Traps cause the hart to transfer control to a trap handler. Exceptions that
/// report a faulting address carry it; it becomes `xtval` on delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trap {
    /// Instruction address misaligned exception.
    InstructionAddressMisaligned(u64),

    /// Instruction access fault exception (PMP denial or unbacked address).
    InstructionAccessFault(u64),

    /// Illegal instruction exception.
    IllegalInstruction,

    /// Breakpoint exception.
    Breakpoint,

    /// Load address misaligned exception.
    LoadAddressMisaligned(u64),

    /// Load access fault exception.
    LoadAccessFault(u64),

    /// Store/AMO address misaligned exception.
    StoreAddressMisaligned(u64),

    /// Store/AMO access fault exception.
    StoreAccessFault(u64),

    /// Environment call as reported by the execution engine.
    ///
    /// The engine does not know the mode-specific code; the dispatcher
    /// re-specializes it from the current privilege and virtualization state.
    EnvironmentCall,

    /// Environment call from user mode.
    EnvironmentCallFromUMode,

    /// Environment call from (hypervisor-extended) supervisor mode.
    EnvironmentCallFromHSMode,

    /// Environment call from virtual-supervisor mode.
    EnvironmentCallFromVSMode,

    /// Environment call from machine mode.
    EnvironmentCallFromMMode,

    /// Instruction page fault exception.
    InstructionPageFault(u64),

    /// Load page fault exception.
    LoadPageFault(u64),

    /// Store/AMO page fault exception.
    StorePageFault(u64),

    /// Instruction guest-page fault (second-stage translation failure).
    InstructionGuestPageFault(u64),

    /// Load guest-page fault (second-stage translation failure).
    LoadGuestPageFault(u64),

    /// Store/AMO guest-page fault (second-stage translation failure).
    StoreGuestPageFault(u64),

    /// Asynchronous interrupt.
    Interrupt(Interrupt),
}

impl Trap {
    /// Returns true for asynchronous interrupts.
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupt(_))
    }

    /// Returns the cause code without the interrupt flag.
    pub const fn code(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned(_) => exception::INSTRUCTION_ADDRESS_MISALIGNED,
            Self::InstructionAccessFault(_) => exception::INSTRUCTION_ACCESS_FAULT,
            Self::IllegalInstruction => exception::ILLEGAL_INSTRUCTION,
            Self::Breakpoint => exception::BREAKPOINT,
            Self::LoadAddressMisaligned(_) => exception::LOAD_ADDRESS_MISALIGNED,
            Self::LoadAccessFault(_) => exception::LOAD_ACCESS_FAULT,
            Self::StoreAddressMisaligned(_) => exception::STORE_ADDRESS_MISALIGNED,
            Self::StoreAccessFault(_) => exception::STORE_ACCESS_FAULT,
            Self::EnvironmentCall | Self::EnvironmentCallFromUMode => {
                exception::ENVIRONMENT_CALL_FROM_U_MODE
            }
            Self::EnvironmentCallFromHSMode => exception::ENVIRONMENT_CALL_FROM_HS_MODE,
            Self::EnvironmentCallFromVSMode => exception::ENVIRONMENT_CALL_FROM_VS_MODE,
            Self::EnvironmentCallFromMMode => exception::ENVIRONMENT_CALL_FROM_M_MODE,
            Self::InstructionPageFault(_) => exception::INSTRUCTION_PAGE_FAULT,
            Self::LoadPageFault(_) => exception::LOAD_PAGE_FAULT,
            Self::StorePageFault(_) => exception::STORE_PAGE_FAULT,
            Self::InstructionGuestPageFault(_) => exception::INSTRUCTION_GUEST_PAGE_FAULT,
            Self::LoadGuestPageFault(_) => exception::LOAD_GUEST_PAGE_FAULT,
            Self::StoreGuestPageFault(_) => exception::STORE_GUEST_PAGE_FAULT,
            Self::Interrupt(irq) => irq.code(),
        }
    }

    /// Returns the value recorded in `xtval` when this trap is delivered.
    ///
    /// Only address-carrying exceptions report a value; everything else records zero.
    pub const fn tval(&self) -> u64 {
        match self {
            Self::InstructionAddressMisaligned(a)
            | Self::InstructionAccessFault(a)
            | Self::LoadAddressMisaligned(a)
            | Self::LoadAccessFault(a)
            | Self::StoreAddressMisaligned(a)
            | Self::StoreAccessFault(a)
            | Self::InstructionPageFault(a)
            | Self::LoadPageFault(a)
            | Self::StorePageFault(a)
            | Self::InstructionGuestPageFault(a)
            | Self::LoadGuestPageFault(a)
            | Self::StoreGuestPageFault(a) => *a,
            _ => 0,
        }
    }

    /// Rebuilds a trap from a raw cause code, an async flag and a trap value.
    ///
    /// Cause 8 decodes to the generic [`Trap::EnvironmentCall`]. Returns `None`
    /// for codes the core does not model.
    pub fn from_raw(code: u64, is_async: bool, tval: u64) -> Option<Self> {
        if is_async {
            return Interrupt::from_index(code).map(Self::Interrupt);
        }
        let trap = match code {
            exception::INSTRUCTION_ADDRESS_MISALIGNED => Self::InstructionAddressMisaligned(tval),
            exception::INSTRUCTION_ACCESS_FAULT => Self::InstructionAccessFault(tval),
            exception::ILLEGAL_INSTRUCTION => Self::IllegalInstruction,
            exception::BREAKPOINT => Self::Breakpoint,
            exception::LOAD_ADDRESS_MISALIGNED => Self::LoadAddressMisaligned(tval),
            exception::LOAD_ACCESS_FAULT => Self::LoadAccessFault(tval),
            exception::STORE_ADDRESS_MISALIGNED => Self::StoreAddressMisaligned(tval),
            exception::STORE_ACCESS_FAULT => Self::StoreAccessFault(tval),
            exception::ENVIRONMENT_CALL_FROM_U_MODE => Self::EnvironmentCall,
            exception::ENVIRONMENT_CALL_FROM_HS_MODE => Self::EnvironmentCallFromHSMode,
            exception::ENVIRONMENT_CALL_FROM_VS_MODE => Self::EnvironmentCallFromVSMode,
            exception::ENVIRONMENT_CALL_FROM_M_MODE => Self::EnvironmentCallFromMMode,
            exception::INSTRUCTION_PAGE_FAULT => Self::InstructionPageFault(tval),
            exception::LOAD_PAGE_FAULT => Self::LoadPageFault(tval),
            exception::STORE_PAGE_FAULT => Self::StorePageFault(tval),
            exception::INSTRUCTION_GUEST_PAGE_FAULT => Self::InstructionGuestPageFault(tval),
            exception::LOAD_GUEST_PAGE_FAULT => Self::LoadGuestPageFault(tval),
            exception::STORE_GUEST_PAGE_FAULT => Self::StoreGuestPageFault(tval),
            _ => return None,
        };
        Some(trap)
    }
}

impl fmt::Display for Trap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt(irq) => write!(f, "Interrupt({irq})"),
            Self::IllegalInstruction => f.write_str("IllegalInstruction"),
            Self::Breakpoint => f.write_str("Breakpoint"),
            Self::EnvironmentCall => f.write_str("EnvironmentCall"),
            Self::EnvironmentCallFromUMode => f.write_str("EnvironmentCallFromUMode"),
            Self::EnvironmentCallFromHSMode => f.write_str("EnvironmentCallFromHSMode"),
            Self::EnvironmentCallFromVSMode => f.write_str("EnvironmentCallFromVSMode"),
            Self::EnvironmentCallFromMMode => f.write_str("EnvironmentCallFromMMode"),
            other => {
                let name = crate::core::arch::trap::exception_name(other.code());
                write!(f, "{name}({:#x})", other.tval())
            }
        }
    }
}

impl std::error::Error for Trap {}

/// Which translation stage a walk failure happened in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Virtual (or guest-virtual) to physical (or guest-physical) translation.
    First,
    /// Guest-physical to host-physical translation (hypervisor `hgatp`).
    Second,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::First => "first-stage",
            Self::Second => "second-stage",
        })
    }
}

/// Failure of a page-table walk.
///
/// The two kinds map to different architectural causes: a translation failure
/// becomes a page fault when paging is active, a protection failure is always
/// an access fault.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum WalkError {
    /// Malformed or invalid entry, reserved encoding, permission mismatch,
    /// non-canonical address, misaligned superpage or unwritable A/D update.
    #[error("{stage} translation failure")]
    Translation {
        /// Stage that failed.
        stage: Stage,
    },
    /// Physical-memory-protection denial of a table read or of the final address.
    #[error("{stage} protection failure")]
    Protection {
        /// Stage that failed.
        stage: Stage,
    },
}

impl WalkError {
    /// Returns the stage the failure happened in.
    pub const fn stage(&self) -> Stage {
        match self {
            Self::Translation { stage } | Self::Protection { stage } => *stage,
        }
    }

    /// Returns true for physical-memory-protection denials.
    pub const fn is_protection(&self) -> bool {
        matches!(self, Self::Protection { .. })
    }
}

/// Outcome of a failed translation-cache fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FillError {
    /// Probing fill failed; no trap was raised and hart state is untouched.
    #[error("probe of {0} failed")]
    ProbeFailed(VirtAddr),
    /// The failure was converted into a trap and delivered to the hart.
    #[error("fill of {addr} raised {trap}")]
    Raised {
        /// Address whose fill failed.
        addr: VirtAddr,
        /// Trap that was delivered.
        trap: Trap,
    },
}

/// Error returned to interrupt-controller models.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ClaimError {
    /// At least one requested interrupt bit is already owned by another controller.
    #[error("interrupts {requested:#x} conflict with claimed set {already_claimed:#x}")]
    Conflict {
        /// Mask the caller tried to claim.
        requested: u64,
        /// Mask that was already claimed.
        already_claimed: u64,
    },
}
