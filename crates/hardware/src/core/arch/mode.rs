//! RISC-V Privilege Modes.
//!
//! This module defines the privilege levels supported by the hart and the flag set
//! that describes its virtualization status. It implements the following:
//! 1. **Mode Classification:** User (U), Supervisor (S), and Machine (M) modes.
//! 2. **Encoding:** Conversion between the 2-bit architectural encoding and enum variants.
//! 3. **Mode State:** Privilege plus virtualization and force-HS flags, with their invariants.

/// RISC-V privilege mode levels.
///
/// Hypervisor-extended supervisor (HS) and virtual supervisor (VS) are both
/// `Supervisor`; they differ only in [`ModeState::is_virtualized`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum PrivilegeMode {
    /// User mode (U-mode).
    User = 0,

    /// Supervisor mode (S-mode).
    Supervisor = 1,

    /// Machine mode (M-mode).
    #[default]
    Machine = 3,
}

impl PrivilegeMode {
    /// Decodes an architectural privilege encoding.
    ///
    /// The reserved encoding 2 and anything above Machine decode to `User`,
    /// matching how a mode transition treats an `xPP` field holding them.
    pub const fn from_u8(val: u8) -> Self {
        match val {
            1 => Self::Supervisor,
            3 => Self::Machine,
            _ => Self::User,
        }
    }

    /// Returns true if `val` is one of the three defined encodings.
    pub const fn is_valid_encoding(val: u8) -> bool {
        matches!(val, 0 | 1 | 3)
    }

    /// Converts a privilege mode to its `u8` representation.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns the human-readable name of the privilege mode.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Supervisor => "Supervisor",
            Self::Machine => "Machine",
        }
    }
}

impl std::fmt::Display for PrivilegeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Current privilege and virtualization status of a hart.
///
/// Invariants held by every mutator:
/// - `Machine` is never virtualized.
/// - the virtualization and force-HS flags stay clear without the hypervisor extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeState {
    privilege: PrivilegeMode,
    virtualized: bool,
    force_hs: bool,
    hypervisor: bool,
}

impl ModeState {
    /// Reset state: Machine mode, not virtualized.
    pub const fn new(hypervisor: bool) -> Self {
        Self {
            privilege: PrivilegeMode::Machine,
            virtualized: false,
            force_hs: false,
            hypervisor,
        }
    }

    /// Returns the current privilege.
    pub const fn privilege(&self) -> PrivilegeMode {
        self.privilege
    }

    /// Returns true if the hart is running a guest.
    pub const fn is_virtualized(&self) -> bool {
        self.virtualized
    }

    /// Returns the sticky force-HS trap flag.
    pub const fn force_hs(&self) -> bool {
        self.force_hs
    }

    /// Returns true if the hypervisor extension is present.
    pub const fn has_hypervisor(&self) -> bool {
        self.hypervisor
    }

    /// Sets the privilege. Entering Machine mode leaves virtualization.
    ///
    /// Returns true if virtualization was switched off as a consequence.
    pub const fn set_privilege(&mut self, privilege: PrivilegeMode) -> bool {
        self.privilege = privilege;
        if matches!(privilege, PrivilegeMode::Machine) && self.virtualized {
            self.virtualized = false;
            return true;
        }
        false
    }

    /// Sets the virtualization flag.
    ///
    /// Ignored without the hypervisor extension, and enabling is ignored while
    /// in Machine mode. Returns true if the flag actually changed.
    pub const fn set_virtualized(&mut self, enable: bool) -> bool {
        if !self.hypervisor {
            return false;
        }
        if enable && matches!(self.privilege, PrivilegeMode::Machine) {
            return false;
        }
        let changed = self.virtualized != enable;
        self.virtualized = enable;
        changed
    }

    /// Sets the force-HS trap flag. Ignored without the hypervisor extension.
    pub const fn set_force_hs(&mut self, enable: bool) {
        if self.hypervisor {
            self.force_hs = enable;
        }
    }
}

impl Default for ModeState {
    fn default() -> Self {
        Self::new(false)
    }
}
