//! Memory Access Types.
//!
//! This module defines the classification of memory accesses used throughout the core.
//! These types are used for the following:
//! 1. **Permission Validation:** Checking Read/Write/Execute (RWX) permissions in the walker and PMP.
//! 2. **Fault Generation:** Determining the correct page fault or access fault trap type.
//! 3. **Cache Fills:** Describing the permissions installed in a translation-cache entry.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Type of memory access operation.
///
/// Used to distinguish between instruction fetches, data loads, and data stores
/// for proper memory management and permission enforcement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AccessType {
    /// Instruction fetch access. Requires Execute (X) permission.
    Fetch,

    /// Data read access. Requires Read (R) permission, or X with MXR.
    Read,

    /// Data write access, including AMOs. Requires Write (W) permission.
    Write,
}

impl AccessType {
    /// Returns the permission an access of this kind needs.
    pub const fn required(self) -> Permissions {
        match self {
            Self::Fetch => Permissions::EXEC,
            Self::Read => Permissions::READ,
            Self::Write => Permissions::WRITE,
        }
    }
}

/// Set of page permissions granted by a translation.
///
/// Mirrors the protection bits a translation cache attaches to an entry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Permissions(u8);

impl Permissions {
    /// No access.
    pub const NONE: Self = Self(0);
    /// Data reads.
    pub const READ: Self = Self(1 << 0);
    /// Data writes.
    pub const WRITE: Self = Self(1 << 1);
    /// Instruction fetches.
    pub const EXEC: Self = Self(1 << 2);
    /// Read, write, and execute.
    pub const ALL: Self = Self(0b111);

    /// Returns the raw permission bits.
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Returns true if every permission in `other` is present in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no permission is granted.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the access kind is permitted.
    pub const fn allows(self, access: AccessType) -> bool {
        self.contains(access.required())
    }
}

impl BitOr for Permissions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Permissions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Permissions {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Permissions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |p: Self, c: char| if self.contains(p) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Self::READ, 'r'),
            flag(Self::WRITE, 'w'),
            flag(Self::EXEC, 'x')
        )
    }
}
