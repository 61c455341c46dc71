//! # Address Arithmetic Tests
//!
//! This module contains unit tests for the `VirtAddr` and `PhysAddr` types.
//! It verifies page offsets, page numbers and page bases, which the walker and
//! the fill protocol rely on.

use proptest::prelude::*;
use rvpriv_core::common::{PhysAddr, VirtAddr};

/// Tests that a page-aligned virtual address has a page offset of zero.
#[test]
fn virt_addr_page_offset_aligned() {
    assert_eq!(VirtAddr::new(0x8000_0000).page_offset(), 0);
}

/// Tests that `page_offset` extracts the low twelve bits.
#[test]
fn virt_addr_page_offset_nonzero() {
    assert_eq!(VirtAddr::new(0x8000_0ABC).page_offset(), 0xABC);
}

#[test]
fn virt_addr_page_number_and_base() {
    let va = VirtAddr::new(0x0000_0040_1234_5678);
    assert_eq!(va.page_number(), 0x0000_0040_1234_5);
    assert_eq!(va.page_base(), VirtAddr::new(0x0000_0040_1234_5000));
}

#[test]
fn phys_addr_from_parts_masks_offset() {
    // Offset bits above the page are dropped.
    let pa = PhysAddr::from_parts(0x80123, 0x1_0ABC);
    assert_eq!(pa, PhysAddr::new(0x8012_3ABC));
}

#[test]
fn phys_addr_page_base() {
    assert_eq!(PhysAddr::new(0x8000_1FFF).page_base(), PhysAddr::new(0x8000_1000));
    assert_eq!(PhysAddr::new(0x8000_1FFF).page_number(), 0x80001);
}

#[test]
fn display_tags_address_space() {
    assert_eq!(VirtAddr::new(0x1000).to_string(), "va:0x1000");
    assert_eq!(PhysAddr::new(0x2000).to_string(), "pa:0x2000");
}

proptest! {
    /// Splitting an address into page base and offset loses nothing.
    #[test]
    fn page_base_plus_offset_is_identity(addr in any::<u64>()) {
        let va = VirtAddr::new(addr);
        prop_assert_eq!(va.page_base().val() | va.page_offset(), addr);
        let pa = PhysAddr::from_parts(va.page_number(), va.page_offset());
        prop_assert_eq!(pa.val(), addr);
    }
}
