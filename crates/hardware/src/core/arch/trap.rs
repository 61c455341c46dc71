//! Trap Cause Codes and Helpers.
//!
//! This module defines the cause codes written to `mcause`/`scause` and their trace
//! names. It provides:
//! 1. **Cause Codes:** Exception and interrupt codes, including the hypervisor additions.
//! 2. **Naming:** Human-readable cause names for trap tracing.

use crate::common::Trap;

/// Exception cause codes (interrupt flag clear).
pub mod exception {
    /// Instruction address misaligned (0).
    pub const INSTRUCTION_ADDRESS_MISALIGNED: u64 = 0;
    /// Instruction access fault (1).
    pub const INSTRUCTION_ACCESS_FAULT: u64 = 1;
    /// Illegal instruction (2).
    pub const ILLEGAL_INSTRUCTION: u64 = 2;
    /// Breakpoint (3).
    pub const BREAKPOINT: u64 = 3;
    /// Load address misaligned (4).
    pub const LOAD_ADDRESS_MISALIGNED: u64 = 4;
    /// Load access fault (5).
    pub const LOAD_ACCESS_FAULT: u64 = 5;
    /// Store/AMO address misaligned (6).
    pub const STORE_ADDRESS_MISALIGNED: u64 = 6;
    /// Store/AMO access fault (7).
    pub const STORE_ACCESS_FAULT: u64 = 7;
    /// Environment call from U-mode (8). Also the generic code reported by the engine.
    pub const ENVIRONMENT_CALL_FROM_U_MODE: u64 = 8;
    /// Environment call from HS-mode (9).
    pub const ENVIRONMENT_CALL_FROM_HS_MODE: u64 = 9;
    /// Environment call from VS-mode (10).
    pub const ENVIRONMENT_CALL_FROM_VS_MODE: u64 = 10;
    /// Environment call from M-mode (11).
    pub const ENVIRONMENT_CALL_FROM_M_MODE: u64 = 11;
    /// Instruction page fault (12).
    pub const INSTRUCTION_PAGE_FAULT: u64 = 12;
    /// Load page fault (13).
    pub const LOAD_PAGE_FAULT: u64 = 13;
    /// Store/AMO page fault (15).
    pub const STORE_PAGE_FAULT: u64 = 15;
    /// Instruction guest-page fault (20).
    pub const INSTRUCTION_GUEST_PAGE_FAULT: u64 = 20;
    /// Load guest-page fault (21).
    pub const LOAD_GUEST_PAGE_FAULT: u64 = 21;
    /// Store/AMO guest-page fault (23).
    pub const STORE_GUEST_PAGE_FAULT: u64 = 23;
}

const EXCEPTION_NAMES: [&str; 24] = [
    "misaligned_fetch",
    "fault_fetch",
    "illegal_instruction",
    "breakpoint",
    "misaligned_load",
    "fault_load",
    "misaligned_store",
    "fault_store",
    "user_ecall",
    "supervisor_ecall",
    "hypervisor_ecall",
    "machine_ecall",
    "exec_page_fault",
    "load_page_fault",
    "reserved",
    "store_page_fault",
    "reserved",
    "reserved",
    "reserved",
    "reserved",
    "guest_exec_page_fault",
    "guest_load_page_fault",
    "reserved",
    "guest_store_page_fault",
];

const INTERRUPT_NAMES: [&str; 12] = [
    "u_software",
    "s_software",
    "vs_software",
    "m_software",
    "u_timer",
    "s_timer",
    "vs_timer",
    "m_timer",
    "u_external",
    "s_external",
    "vs_external",
    "m_external",
];

/// Returns the trace name of an exception cause code.
pub fn exception_name(code: u64) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|i| EXCEPTION_NAMES.get(i))
        .copied()
        .unwrap_or("(unknown)")
}

/// Returns the trace name of an interrupt cause code.
pub fn interrupt_name(code: u64) -> &'static str {
    usize::try_from(code)
        .ok()
        .and_then(|i| INTERRUPT_NAMES.get(i))
        .copied()
        .unwrap_or("(unknown)")
}

/// Trap handler utility functions.
#[derive(Debug)]
pub struct TrapHandler;

impl TrapHandler {
    /// Returns the trace name of a trap's cause.
    pub fn cause_name(trap: &Trap) -> &'static str {
        if trap.is_interrupt() {
            interrupt_name(trap.code())
        } else {
            exception_name(trap.code())
        }
    }
}
