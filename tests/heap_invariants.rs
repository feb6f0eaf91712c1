//! Block-list scenario tests: first-fit reuse, coalescing, rounding, and
//! the structural invariants over the whole arena.

use std::ptr::NonNull;

use strictbox::heap::{Arena, BlockAllocator, HEADER_SIZE, MIN_CHUNK};

const KIB: usize = 1024;

struct TestHeap {
    heap: BlockAllocator,
    _backing: Vec<u64>,
}

fn test_heap(capacity: usize) -> TestHeap {
    assert_eq!(capacity % 8, 0);
    let mut backing = vec![0u64; capacity / 8];
    let base = NonNull::new(backing.as_mut_ptr().cast::<u8>()).expect("backing allocation");
    // SAFETY: backing lives as long as the allocator and u64 storage gives
    // header alignment.
    let arena = unsafe { Arena::from_raw_parts(base, capacity) };
    TestHeap {
        heap: BlockAllocator::new(arena),
        _backing: backing,
    }
}

#[test]
fn first_fit_reuses_a_released_middle_block() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let _a = heap.allocate(100).unwrap();
    let b = heap.allocate(200).unwrap().as_ptr();
    let _c = heap.allocate(300).unwrap();
    let brk_before = heap.arena().brk();
    heap.verify_layout().unwrap();

    heap.release(b).unwrap();
    heap.verify_layout().unwrap();

    // D fits in B's freed region; the scan starts at the head, so it must
    // land exactly where B was, and the arena must not grow.
    let d = heap.allocate(150).unwrap().as_ptr();
    assert_eq!(d, b);
    assert_eq!(heap.arena().brk(), brk_before);
    heap.verify_layout().unwrap();
}

#[test]
fn released_block_is_immediately_reusable() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let e = heap.allocate(500).unwrap().as_ptr();
    let brk_before = heap.arena().brk();

    heap.release(e).unwrap();
    let f = heap.allocate(500).unwrap().as_ptr();
    assert_eq!(f, e);
    assert_eq!(heap.arena().brk(), brk_before);

    // Equal-or-smaller also reuses without extension.
    heap.release(f).unwrap();
    let g = heap.allocate(40).unwrap().as_ptr();
    assert_eq!(g, e);
    assert_eq!(heap.arena().brk(), brk_before);
    heap.verify_layout().unwrap();
}

#[test]
fn release_null_is_a_noop() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    heap.allocate(100).unwrap();
    let before = heap.spans();
    heap.release(std::ptr::null_mut()).unwrap();
    assert_eq!(heap.spans(), before);
}

#[test]
fn resize_of_null_behaves_as_allocate() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let p = heap.resize(std::ptr::null_mut(), 300).unwrap();
    let spans = heap.spans();
    heap.release(p.as_ptr()).unwrap();

    let mut control = test_heap(64 * KIB);
    control.heap.allocate(300).unwrap();
    assert_eq!(control.heap.spans(), spans);
}

#[test]
fn resize_to_zero_behaves_as_release() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let p = heap.allocate(300).unwrap().as_ptr();
    assert!(heap.resize(p, 0).is_none());

    // The whole chunk coalesced back into one free block.
    let spans = heap.spans();
    assert_eq!(spans.len(), 1);
    assert!(!spans[0].allocated);
    heap.verify_layout().unwrap();
}

#[test]
fn every_block_size_is_a_header_multiple() {
    let mut t = test_heap(256 * KIB);
    let heap = &mut t.heap;

    for n in [0, 1, 7, 31, 32, 33, 100, 1000, 4096] {
        heap.allocate(n).unwrap();
        for span in heap.spans() {
            assert_eq!(span.size % HEADER_SIZE, 0, "after allocate({n})");
        }
        heap.verify_layout().unwrap();
    }
}

#[test]
fn double_release_reports_and_preserves_the_list() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let a = heap.allocate(100).unwrap().as_ptr();
    let _b = heap.allocate(100).unwrap();

    heap.release(a).unwrap();
    let before = heap.spans();

    let err = heap.release(a).unwrap_err();
    assert_eq!(err.addr, a as usize);
    assert_eq!(heap.spans(), before, "invalid release must not mutate");
    heap.verify_layout().unwrap();
}

#[test]
fn oversized_request_fails_without_partial_mutation() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    // While the list is still empty.
    assert!(heap.allocate(128 * KIB).is_none());
    assert!(heap.spans().is_empty());
    assert_eq!(heap.arena().brk(), 0);

    // And once the arena is partially used.
    heap.allocate(100).unwrap();
    let before = heap.spans();
    let brk_before = heap.arena().brk();
    assert!(heap.allocate(128 * KIB).is_none());
    assert_eq!(heap.spans(), before);
    assert_eq!(heap.arena().brk(), brk_before);
    heap.verify_layout().unwrap();
}

#[test]
fn no_adjacent_free_blocks_after_any_sequence() {
    let mut t = test_heap(256 * KIB);
    let heap = &mut t.heap;

    let mut live = Vec::new();
    for round in 0..8 {
        for n in [24, 100, 512, 60, 2000] {
            live.push(heap.allocate(n + round).unwrap().as_ptr());
        }
        // Release every other pointer, oldest first.
        let mut index = 0;
        live.retain(|&p| {
            index += 1;
            if index % 2 == 0 {
                heap.release(p).unwrap();
                false
            } else {
                true
            }
        });
        heap.verify_layout()
            .unwrap_or_else(|violation| panic!("round {round}: {violation}"));
    }

    for p in live {
        heap.release(p).unwrap();
        heap.verify_layout().unwrap();
    }

    // Everything released: one free block spanning the whole used arena.
    let spans = heap.spans();
    assert_eq!(spans.len(), 1);
    assert!(!spans[0].allocated);
    assert_eq!(spans[0].size, heap.arena().brk());
}

#[test]
fn resize_failure_leaves_the_original_block_intact() {
    let mut t = test_heap(MIN_CHUNK);
    let heap = &mut t.heap;

    let a = heap.allocate(100).unwrap().as_ptr();
    // SAFETY: `a` points at 100 usable bytes.
    unsafe {
        for i in 0..100u8 {
            a.add(i as usize).write(i);
        }
    }
    let before = heap.spans();

    assert!(heap.resize(a, 2 * MIN_CHUNK).is_none());
    assert_eq!(heap.spans(), before);
    // SAFETY: the original block was left untouched.
    unsafe {
        for i in 0..100u8 {
            assert_eq!(a.add(i as usize).read(), i);
        }
    }
}

#[test]
fn resize_truncates_when_shrinking() {
    let mut t = test_heap(64 * KIB);
    let heap = &mut t.heap;

    let a = heap.allocate(200).unwrap().as_ptr();
    // Pin so the shrunken copy cannot land on the same spot.
    let _pin = heap.allocate(64).unwrap();
    // SAFETY: `a` points at 200 usable bytes.
    unsafe {
        for i in 0..200usize {
            a.add(i).write((i % 251) as u8);
        }
    }

    let small = heap.resize(a, 50).unwrap().as_ptr();
    assert_ne!(small, a);
    // SAFETY: `small` holds at least 50 bytes copied from the old region.
    unsafe {
        for i in 0..50usize {
            assert_eq!(small.add(i).read(), (i % 251) as u8);
        }
    }
    heap.verify_layout().unwrap();
}
