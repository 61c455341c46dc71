//! # Translation and Fill Tests
//!
//! End-to-end checks of the fill protocol on a hart backed by real RAM: cache
//! installs, fault classification, probes, PMP on the final address, `MPRV`,
//! guest-page faults and the debug/bus/misalignment entry points.

use pretty_assertions::assert_eq;
use rstest::rstest;
use rvpriv_core::common::{
    AccessType, FillError, Permissions, PhysAddr, Stage, Trap, VirtAddr, WalkError,
};
use rvpriv_core::config::HartConfig;
use rvpriv_core::core::arch::csr::{HSTATUS_STL, MSTATUS_MPRV};
use rvpriv_core::core::arch::mode::PrivilegeMode;

use crate::common::harness::{
    PTE_A, PTE_D, PTE_R, PTE_U, PTE_W, PTE_X, RAM_BASE, RAM_SIZE, TABLE_BASE, sv32_atp, sv39_atp,
};
use crate::common::{PageTables, TestContext};

const DATA: u64 = 0x8010_0000;
const HOST_ROOT: u64 = RAM_BASE + 0x60_0000;
const GUEST_ROOT_HOST: u64 = RAM_BASE + 0x50_0000;

fn va(addr: u64) -> VirtAddr {
    VirtAddr::new(addr)
}

/// Supervisor-mode hart with Sv39 tables at `TABLE_BASE` mapping 0x4000 to `DATA`.
fn supervisor(flags: u64) -> (TestContext, PageTables) {
    let mut tc = TestContext::new().enter(PrivilegeMode::Supervisor, false);
    let mut tables = PageTables::sv39(&tc.ram, TABLE_BASE);
    tables.map(0x4000, DATA, flags, 0);
    tc.hart.csrs.satp = sv39_atp(TABLE_BASE);
    (tc, tables)
}

const fn napot(base: u64, size: u64) -> u64 {
    (base >> 2) | ((size >> 3) - 1)
}

// ══════════════════════════════════════════════════════════
// 1. Successful fills
// ══════════════════════════════════════════════════════════

#[test]
fn test_fill_installs_page_mapping() {
    let (mut tc, mut tables) = supervisor(PTE_R | PTE_W);
    let leaf = tables.entry_addr(0x4000, 0);

    let t = tc
        .hart
        .tlb_fill(va(0x4008), 8, AccessType::Read, false)
        .unwrap();

    assert_eq!(t.addr, PhysAddr::new(DATA + 8));
    assert_eq!(t.perms, Permissions::READ);
    assert_eq!(
        tc.cache.lock().installs,
        vec![(va(0x4000), PhysAddr::new(DATA), Permissions::READ)]
    );
    assert_eq!(tables.pte(leaf) & (PTE_A | PTE_D), PTE_A);
    assert_eq!(tc.hart.pending_event(), None);
}

#[test]
fn test_write_fill_grants_write_and_sets_dirty() {
    let (mut tc, mut tables) = supervisor(PTE_R | PTE_W);
    let leaf = tables.entry_addr(0x4000, 0);

    let t = tc
        .hart
        .tlb_fill(va(0x4000), 8, AccessType::Write, false)
        .unwrap();

    assert_eq!(t.perms, Permissions::READ | Permissions::WRITE);
    assert_eq!(tables.pte(leaf) & (PTE_A | PTE_D), PTE_A | PTE_D);
}

/// A load through a root-level leaf is granted read only; write is granted
/// by the store that also sets the dirty bit.
#[test]
fn test_sv39_root_leaf_supervisor_load() {
    let mut tc = TestContext::new().enter(PrivilegeMode::Supervisor, false);
    let mut tables = PageTables::sv39(&tc.ram, TABLE_BASE);
    let leaf = tables.map(0x4000, RAM_BASE, PTE_R | PTE_W, 2);
    assert_eq!(leaf, TABLE_BASE);
    tc.hart.csrs.satp = sv39_atp(TABLE_BASE);

    let t = tc.hart.translate(va(0x4010), AccessType::Read).unwrap();

    assert_eq!(t.addr, PhysAddr::new(RAM_BASE + 0x4010));
    assert_eq!(t.perms, Permissions::READ);
    assert_eq!(tables.pte(leaf) & (PTE_A | PTE_D), PTE_A);
}

#[test]
fn test_machine_mode_is_identity() {
    let (mut tc, _tables) = supervisor(PTE_R);
    tc.hart.set_privilege(PrivilegeMode::Machine);

    let t = tc
        .hart
        .tlb_fill(va(0x8000_1234), 4, AccessType::Read, false)
        .unwrap();
    assert_eq!(t.addr, PhysAddr::new(0x8000_1234));
    assert_eq!(t.perms, Permissions::ALL);
    assert_eq!(
        tc.cache.lock().installs,
        vec![(va(0x8000_1000), PhysAddr::new(0x8000_1000), Permissions::ALL)]
    );
}

#[test]
fn test_bare_satp_is_identity() {
    let mut tc = TestContext::new().enter(PrivilegeMode::User, false);
    let t = tc
        .hart
        .tlb_fill(va(0x8000_2000), 4, AccessType::Fetch, false)
        .unwrap();
    assert_eq!(t.addr, PhysAddr::new(0x8000_2000));
}

#[test]
fn test_mmu_disabled_is_identity() {
    let mut config = HartConfig::default();
    config.extensions.mmu = false;
    let mut tc = TestContext::with_config(config).enter(PrivilegeMode::Supervisor, false);
    tc.hart.csrs.satp = sv39_atp(TABLE_BASE);

    let t = tc.hart.translate(va(0x4000), AccessType::Read).unwrap();
    assert_eq!(t.addr, PhysAddr::new(0x4000));
}

#[test]
fn test_mprv_translates_data_accesses_only() {
    let (mut tc, _tables) = supervisor(PTE_R | PTE_X);
    tc.hart.set_privilege(PrivilegeMode::Machine);
    tc.hart.csrs.mstatus = MSTATUS_MPRV | (1 << 11);

    assert_eq!(tc.hart.effective_privilege(AccessType::Read), PrivilegeMode::Supervisor);
    assert_eq!(tc.hart.effective_privilege(AccessType::Fetch), PrivilegeMode::Machine);

    let load = tc.hart.translate(va(0x4000), AccessType::Read).unwrap();
    assert_eq!(load.addr, PhysAddr::new(DATA));
    let fetch = tc.hart.translate(va(0x4000), AccessType::Fetch).unwrap();
    assert_eq!(fetch.addr, PhysAddr::new(0x4000));
}

#[test]
fn test_rv32_sv32_fill() {
    let mut tc = TestContext::rv32().enter(PrivilegeMode::Supervisor, false);
    let mut tables = PageTables::sv32(&tc.ram, TABLE_BASE);
    tables.map(0x0040_1000, 0x8030_0000, PTE_R | PTE_W, 0);
    tc.hart.csrs.satp = sv32_atp(TABLE_BASE);

    let t = tc
        .hart
        .tlb_fill(va(0x0040_1ABC), 4, AccessType::Write, false)
        .unwrap();
    assert_eq!(t.addr, PhysAddr::new(0x8030_0ABC));

    // Bits above 32 are dropped before the walk.
    let t = tc
        .hart
        .translate(va(0xF_0040_1ABC), AccessType::Read)
        .unwrap();
    assert_eq!(t.addr, PhysAddr::new(0x8030_0ABC));
}

// ══════════════════════════════════════════════════════════
// 2. Failed fills
// ══════════════════════════════════════════════════════════

#[test]
fn test_unmapped_read_raises_page_fault() {
    let (mut tc, _tables) = supervisor(PTE_R);
    tc.hart.pc = 0x8000_0444;

    let err = tc
        .hart
        .tlb_fill(va(0x9000), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x9000),
            trap: Trap::LoadPageFault(0x9000),
        }
    );
    assert_eq!(tc.hart.privilege(), PrivilegeMode::Machine);
    assert_eq!(tc.hart.csrs.mcause, 13);
    assert_eq!(tc.hart.csrs.mtval, 0x9000);
    assert_eq!(tc.hart.csrs.mepc, 0x8000_0444);
    assert_eq!(tc.install_count(), 0);
}

#[test]
fn test_non_canonical_address_is_page_fault() {
    let (mut tc, _tables) = supervisor(PTE_R);
    let addr = 1 << 40;

    let err = tc
        .hart
        .tlb_fill(va(addr), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(addr),
            trap: Trap::LoadPageFault(addr),
        }
    );
}

#[rstest]
#[case(AccessType::Read, Trap::LoadPageFault(0x4000))]
#[case(AccessType::Write, Trap::StorePageFault(0x4000))]
#[case(AccessType::Fetch, Trap::InstructionPageFault(0x4000))]
fn test_write_only_leaf_is_reserved(#[case] access: AccessType, #[case] expected: Trap) {
    let (mut tc, _tables) = supervisor(PTE_W);
    let err = tc.hart.tlb_fill(va(0x4000), 4, access, false).unwrap_err();
    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x4000),
            trap: expected,
        }
    );
}

#[test]
fn test_user_page_denied_to_supervisor_without_sum() {
    let (mut tc, _tables) = supervisor(PTE_R | PTE_U);
    let err = tc
        .hart
        .tlb_fill(va(0x4000), 8, AccessType::Read, false)
        .unwrap_err();
    assert!(matches!(
        err,
        FillError::Raised {
            trap: Trap::LoadPageFault(_),
            ..
        }
    ));
}

#[test]
fn test_misaligned_fill_raises_misaligned() {
    let (mut tc, _tables) = supervisor(PTE_R);

    let err = tc
        .hart
        .tlb_fill(va(0x4004), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x4004),
            trap: Trap::LoadAddressMisaligned(0x4004),
        }
    );
    assert_eq!(tc.hart.csrs.mcause, 4);
    assert_eq!(tc.install_count(), 0);
}

#[test]
fn test_single_byte_never_misaligned() {
    let (mut tc, _tables) = supervisor(PTE_R);
    assert!(
        tc.hart
            .tlb_fill(va(0x4003), 1, AccessType::Read, false)
            .is_ok()
    );
}

#[rstest]
#[case::unmapped(0x9000, 8)]
#[case::misaligned(0x4004, 8)]
fn test_probe_failure_changes_nothing(#[case] addr: u64, #[case] size: u64) {
    let (mut tc, _tables) = supervisor(PTE_R);
    tc.hart.pc = 0x8000_0500;
    let csrs = tc.hart.csrs.clone();

    let err = tc
        .hart
        .tlb_fill(va(addr), size, AccessType::Read, true)
        .unwrap_err();

    assert_eq!(err, FillError::ProbeFailed(va(addr)));
    assert_eq!(tc.hart.csrs, csrs);
    assert_eq!(tc.hart.pc, 0x8000_0500);
    assert_eq!(tc.hart.privilege(), PrivilegeMode::Supervisor);
    assert_eq!(tc.hart.pending_event(), None);
    assert_eq!(tc.install_count(), 0);
}

#[test]
fn test_pmp_denied_final_address_is_access_fault() {
    let (mut tc, _tables) = supervisor(PTE_R);
    let pmp = tc.hart.pmp_mut();
    pmp.set_addr(0, napot(DATA, 0x1000));
    pmp.set_cfg(0, 3 << 3);
    pmp.set_addr(1, napot(RAM_BASE, RAM_SIZE as u64));
    pmp.set_cfg(1, (3 << 3) | 0b111);

    let err = tc
        .hart
        .tlb_fill(va(0x4000), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x4000),
            trap: Trap::LoadAccessFault(0x4000),
        }
    );
    assert_eq!(tc.hart.csrs.mcause, 5);
}

#[test]
fn test_pmp_denied_table_read_is_access_fault() {
    let (mut tc, _tables) = supervisor(PTE_R);
    let pmp = tc.hart.pmp_mut();
    pmp.set_addr(0, napot(DATA, 0x1000));
    pmp.set_cfg(0, (3 << 3) | 0b111);

    let err = tc
        .hart
        .tlb_fill(va(0x4000), 8, AccessType::Write, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x4000),
            trap: Trap::StoreAccessFault(0x4000),
        }
    );
}

#[test]
fn test_pmp_ignored_without_extension() {
    let mut config = HartConfig::default();
    config.extensions.pmp = false;
    let mut tc = TestContext::with_config(config).enter(PrivilegeMode::User, false);
    let pmp = tc.hart.pmp_mut();
    pmp.set_addr(0, napot(RAM_BASE, 0x1000));
    pmp.set_cfg(0, 3 << 3);

    assert!(
        tc.hart
            .tlb_fill(va(RAM_BASE), 8, AccessType::Read, false)
            .is_ok()
    );
}

// ══════════════════════════════════════════════════════════
// 3. Fault classification
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::bare_translation(0, WalkError::Translation { stage: Stage::First }, Trap::LoadAccessFault(0x7000))]
#[case::paged_translation(sv39_atp(TABLE_BASE), WalkError::Translation { stage: Stage::First }, Trap::LoadPageFault(0x7000))]
#[case::paged_protection(sv39_atp(TABLE_BASE), WalkError::Protection { stage: Stage::First }, Trap::LoadAccessFault(0x7000))]
fn test_mmu_fault_classification(
    #[case] satp: u64,
    #[case] err: WalkError,
    #[case] expected: Trap,
) {
    let mut tc = TestContext::new().enter(PrivilegeMode::Supervisor, false);
    tc.hart.csrs.satp = satp;
    assert_eq!(tc.hart.mmu_fault(va(0x7000), AccessType::Read, err), expected);
}

/// Guest with bare first stage and an `hgatp` root at `HOST_ROOT`.
fn guest_context() -> (TestContext, PageTables) {
    let mut tc = TestContext::hypervisor().enter(PrivilegeMode::Supervisor, true);
    tc.hart.csrs.hgatp = sv39_atp(HOST_ROOT);
    let host = PageTables::sv39(&tc.ram, HOST_ROOT);
    (tc, host)
}

#[test]
fn test_guest_physical_fault_goes_to_hypervisor() {
    let (mut tc, _host) = guest_context();
    tc.hart.csrs.medeleg = 1 << 21;
    tc.hart.csrs.hedeleg = 1 << 21;
    tc.hart.csrs.vstvec = 0x8000_0300;

    let err = tc
        .hart
        .tlb_fill(va(0x1000), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x1000),
            trap: Trap::LoadGuestPageFault(0x1000),
        }
    );
    // Forced to HS even though the guest delegates the cause.
    assert!(!tc.hart.is_virtualized());
    assert!(!tc.hart.force_hs());
    assert_eq!(tc.hart.privilege(), PrivilegeMode::Supervisor);
    assert_eq!(tc.hart.csrs.scause, 21);
    assert_eq!(tc.hart.csrs.stval, 0x1000);
    assert_ne!(tc.hart.csrs.hstatus & HSTATUS_STL, 0);
    assert_eq!(tc.hart.pc, 0x8000_0300);
}

#[test]
fn test_guest_physical_address_limited_to_first_stage_width() {
    let (tc, mut host) = guest_context();
    host.map(0, RAM_BASE, PTE_R | PTE_W | PTE_U, 2);

    // Below 2^39 the G-stage maps; the Sv39x4 range above it does not.
    assert!(tc.hart.translate(va(0x10), AccessType::Read).is_ok());
    assert_eq!(
        tc.hart.translate(va(1 << 39), AccessType::Read),
        Err(WalkError::Translation {
            stage: Stage::Second
        })
    );
}

#[test]
fn test_first_stage_fault_in_guest_stays_in_guest() {
    let (mut tc, _host) = guest_context();
    tc.hart.csrs.hgatp = 0;
    tc.hart.csrs.satp = sv39_atp(TABLE_BASE);
    tc.hart.csrs.stvec = 0x8000_0700;
    tc.hart.csrs.medeleg = 1 << 13;
    tc.hart.csrs.hedeleg = 1 << 13;
    tc.hart.set_force_hs(true);

    let err = tc
        .hart
        .tlb_fill(va(0x9000), 8, AccessType::Read, false)
        .unwrap_err();

    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x9000),
            trap: Trap::LoadPageFault(0x9000),
        }
    );
    assert!(tc.hart.is_virtualized());
    assert!(!tc.hart.force_hs());
    assert_eq!(tc.hart.csrs.scause, 13);
    assert_eq!(tc.hart.pc, 0x8000_0700);
}

#[test]
fn test_guest_fill_through_both_stages() {
    let (mut tc, mut host) = guest_context();
    host.map(0, RAM_BASE, PTE_R | PTE_W | PTE_X | PTE_U, 2);
    let mut guest = PageTables::sv39(&tc.ram, GUEST_ROOT_HOST).guest(RAM_BASE);
    guest.map(0x4000, 0x0030_0000, PTE_R, 0);
    tc.hart.csrs.satp = sv39_atp(guest.root_view());

    let t = tc
        .hart
        .tlb_fill(va(0x4010), 8, AccessType::Read, false)
        .unwrap();

    assert_eq!(t.addr, PhysAddr::new(0x8030_0010));
    assert_eq!(
        tc.cache.lock().installs,
        vec![(va(0x4000), PhysAddr::new(0x8030_0000), Permissions::READ)]
    );
}

// ══════════════════════════════════════════════════════════
// 4. Debug, bus and misalignment entry points
// ══════════════════════════════════════════════════════════

#[test]
fn test_debug_translate_never_raises() {
    let (mut tc, _tables) = supervisor(PTE_R);
    tc.hart.pc = 0x8000_0900;

    assert_eq!(tc.hart.debug_translate(va(0x4123)), Some(PhysAddr::new(DATA + 0x123)));
    assert_eq!(tc.hart.debug_translate(va(0x9000)), None);
    assert_eq!(tc.hart.pc, 0x8000_0900);
    assert_eq!(tc.hart.privilege(), PrivilegeMode::Supervisor);
    assert_eq!(tc.install_count(), 0);
}

#[rstest]
#[case(false, Trap::LoadAccessFault(0x1000_0000), 5)]
#[case(true, Trap::StoreAccessFault(0x1000_0000), 7)]
fn test_bus_error_delivers_access_fault(
    #[case] is_write: bool,
    #[case] expected: Trap,
    #[case] cause: u64,
) {
    let mut tc = TestContext::new().enter(PrivilegeMode::User, false);
    assert_eq!(tc.hart.bus_error(PhysAddr::new(0x1000_0000), is_write), expected);
    assert_eq!(tc.hart.csrs.mcause, cause);
    assert_eq!(tc.hart.csrs.mtval, 0x1000_0000);
}

#[test]
fn test_unaligned_fetch() {
    let mut tc = TestContext::new().enter(PrivilegeMode::User, false);
    assert_eq!(
        tc.hart.unaligned_access(va(0x8000_0002), AccessType::Fetch),
        Trap::InstructionAddressMisaligned(0x8000_0002)
    );
    assert_eq!(tc.hart.csrs.mcause, 0);
    assert_eq!(tc.hart.csrs.mtval, 0x8000_0002);
}

#[test]
fn test_misaligned_store_fill() {
    let mut tc = TestContext::new().enter(PrivilegeMode::User, false);
    let err = tc
        .hart
        .tlb_fill(va(0x8000_0006), 4, AccessType::Write, false)
        .unwrap_err();
    assert_eq!(
        err,
        FillError::Raised {
            addr: va(0x8000_0006),
            trap: Trap::StoreAddressMisaligned(0x8000_0006),
        }
    );
    assert_eq!(tc.hart.csrs.mcause, 6);
}
