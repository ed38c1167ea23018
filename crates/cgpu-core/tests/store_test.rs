//! Integration test: ResourceStore
//!
//! Verifies handle uniqueness, free-list reuse, generation checks and
//! rejection of null, stale and double-freed handles.
//!
//! Run with: cargo test -p cgpu-core --test store_test

use std::collections::HashSet;

use cgpu_core::{BufferHandle, CoreError, Handle, ImageHandle, ResourceStore, StoreHandle};

#[test]
fn test_live_handles_are_unique() {
    let mut store: ResourceStore<BufferHandle, u32> = ResourceStore::with_capacity(4);
    let mut live: Vec<BufferHandle> = Vec::new();

    // Interleave allocations and frees so slots get reused.
    for i in 0..200u32 {
        if i % 3 == 2 {
            let victim = live.remove((i as usize * 7) % live.len());
            store.free(victim).expect("free live handle");
        } else {
            live.push(store.allocate(i));
        }

        let distinct: HashSet<u64> = live.iter().map(|h| h.raw()).collect();
        assert_eq!(distinct.len(), live.len(), "duplicate live handle after step {}", i);
        assert_eq!(store.len(), live.len());
    }

    for handle in &live {
        assert!(store.contains(*handle));
    }
    println!("{} live handles across {} slots", live.len(), store.capacity());
}

#[test]
fn test_resolve_after_free_fails() {
    let mut store: ResourceStore<ImageHandle, String> = ResourceStore::new();
    let handles: Vec<ImageHandle> = (0..16).map(|i| store.allocate(format!("image {}", i))).collect();

    for handle in &handles {
        assert_eq!(store.free(*handle).expect("free"), store_name_of(handle, &handles));
        assert!(store.get(*handle).is_none());
        match store.resolve(*handle) {
            Err(CoreError::InvalidHandle { kind, raw }) => {
                assert_eq!(kind, "image");
                assert_eq!(raw, handle.raw());
            }
            other => panic!("expected InvalidHandle, got {:?}", other),
        }
    }
    assert!(store.is_empty());
}

fn store_name_of(handle: &ImageHandle, handles: &[ImageHandle]) -> String {
    let position = handles.iter().position(|h| h == handle).expect("known handle");
    format!("image {}", position)
}

#[test]
fn test_stale_handle_rejected_after_reuse() {
    let mut store: ResourceStore<BufferHandle, &'static str> = ResourceStore::new();
    let first = store.allocate("first");
    store.free(first).expect("free first");

    let second = store.allocate("second");
    assert_ne!(first, second, "reused slot must carry a new generation");
    assert_eq!(first.handle().index(), second.handle().index());
    assert_eq!(store.capacity(), 1);

    assert!(store.get(first).is_none());
    assert_eq!(store.get(second), Some(&"second"));
}

#[test]
fn test_double_free_rejected() {
    let mut store: ResourceStore<BufferHandle, u8> = ResourceStore::new();
    let handle = store.allocate(7);
    assert_eq!(store.free(handle).expect("first free"), 7);

    match store.free(handle) {
        Err(CoreError::InvalidHandle { .. }) => {}
        other => panic!("expected InvalidHandle, got {:?}", other),
    }
    assert_eq!(store.len(), 0);

    // The slot went on the free list exactly once.
    let a = store.allocate(1);
    let b = store.allocate(2);
    assert_ne!(a.handle().index(), b.handle().index());
}

#[test]
fn test_null_and_out_of_range_handles() {
    let mut store: ResourceStore<BufferHandle, u8> = ResourceStore::new();
    store.allocate(1);

    assert!(store.get(BufferHandle::NULL).is_none());
    assert!(BufferHandle::NULL.is_null());

    let beyond = BufferHandle::from_handle(Handle::from_raw((1u64 << 32) | 50));
    assert!(store.get(beyond).is_none());

    // Right slot, wrong generation.
    let forged = BufferHandle::from_handle(Handle::from_raw((9u64 << 32) | 1));
    assert!(store.get(forged).is_none());
}

#[test]
fn test_free_list_is_lifo() {
    let mut store: ResourceStore<BufferHandle, u8> = ResourceStore::new();
    let a = store.allocate(0);
    let b = store.allocate(1);
    let _c = store.allocate(2);
    store.free(a).expect("free a");
    store.free(b).expect("free b");

    let reused = store.allocate(3);
    assert_eq!(reused.handle().index(), b.handle().index());
    let reused_again = store.allocate(4);
    assert_eq!(reused_again.handle().index(), a.handle().index());
    assert_eq!(store.capacity(), 3);
}

#[test]
fn test_get_mut_and_iteration() {
    let mut store: ResourceStore<BufferHandle, u32> = ResourceStore::new();
    let a = store.allocate(10);
    let b = store.allocate(20);
    *store.resolve_mut(a).expect("resolve a") += 5;
    store.free(b).expect("free b");

    let entries: Vec<(BufferHandle, u32)> = store.iter().map(|(h, v)| (h, *v)).collect();
    assert_eq!(entries, vec![(a, 15)]);
    assert_eq!(store.handles(), vec![a]);
}
