//! Word Buffer Unit Tests.
//!
//! Verifies allocation, aligned loads and stores, bounds checks and the
//! compare-and-swap primitives the walker uses for A/D updates.

use std::sync::Arc;
use std::thread;

use rvpriv_core::soc::memory::buffer::WordBuffer;

// ══════════════════════════════════════════════════════════
// 1. Allocation and size
// ══════════════════════════════════════════════════════════

#[test]
fn buffer_rounds_up_to_words() {
    assert_eq!(WordBuffer::new(4096).len(), 4096);
    assert_eq!(WordBuffer::new(13).len(), 16);
    assert!(WordBuffer::new(0).is_empty());
}

#[test]
fn buffer_initial_zeroed() {
    let buf = WordBuffer::new(256);
    for off in (0..256).step_by(8) {
        assert_eq!(buf.load_u64(off), Some(0), "offset {off}");
    }
}

// ══════════════════════════════════════════════════════════
// 2. Loads and stores
// ══════════════════════════════════════════════════════════

#[test]
fn buffer_store_load_u64() {
    let buf = WordBuffer::new(64);
    assert!(buf.store_u64(8, 0xDEAD_BEEF_CAFE_F00D));
    assert_eq!(buf.load_u64(8), Some(0xDEAD_BEEF_CAFE_F00D));
}

#[test]
fn buffer_u32_halves_are_little_endian() {
    let buf = WordBuffer::new(64);
    assert!(buf.store_u64(0, 0x1111_2222_3333_4444));
    assert_eq!(buf.load_u32(0), Some(0x3333_4444));
    assert_eq!(buf.load_u32(4), Some(0x1111_2222));

    assert!(buf.store_u32(4, 0xAAAA_BBBB));
    assert_eq!(buf.load_u64(0), Some(0xAAAA_BBBB_3333_4444));
}

#[test]
fn buffer_rejects_misaligned_and_out_of_range() {
    let buf = WordBuffer::new(16);
    assert_eq!(buf.load_u64(4), None);
    assert_eq!(buf.load_u32(2), None);
    assert_eq!(buf.load_u64(16), None);
    assert!(!buf.store_u64(3, 1));
    assert!(!buf.store_u32(16, 1));
}

// ══════════════════════════════════════════════════════════
// 3. Compare-and-swap
// ══════════════════════════════════════════════════════════

#[test]
fn buffer_cas_u64_success_and_failure() {
    let buf = WordBuffer::new(16);
    assert!(buf.store_u64(0, 5));
    assert_eq!(buf.cas_u64(0, 5, 7), Some(Ok(5)));
    assert_eq!(buf.cas_u64(0, 5, 9), Some(Err(7)));
    assert_eq!(buf.load_u64(0), Some(7));
    assert_eq!(buf.cas_u64(16, 0, 1), None);
}

#[test]
fn buffer_cas_u32_ignores_other_half() {
    let buf = WordBuffer::new(16);
    assert!(buf.store_u64(0, 0x0000_0001_0000_0002));
    assert_eq!(buf.cas_u32(0, 2, 3), Some(Ok(2)));
    assert_eq!(buf.cas_u32(4, 1, 9), Some(Ok(1)));
    assert_eq!(buf.load_u64(0), Some(0x0000_0009_0000_0003));
    assert_eq!(buf.cas_u32(0, 2, 4), Some(Err(3)));
}

#[test]
fn buffer_concurrent_cas_increments_are_not_lost() {
    let buf = Arc::new(WordBuffer::new(8));
    thread::scope(|s| {
        for _ in 0..4 {
            let buf = Arc::clone(&buf);
            s.spawn(move || {
                for _ in 0..1000 {
                    loop {
                        let cur = buf.load_u64(0).unwrap();
                        if buf.cas_u64(0, cur, cur + 1) == Some(Ok(cur)) {
                            break;
                        }
                    }
                }
            });
        }
    });
    assert_eq!(buf.load_u64(0), Some(4000));
}
