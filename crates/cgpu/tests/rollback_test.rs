//! Integration test: rollback guard
//!
//! Run with: cargo test -p cgpu --test rollback_test

use std::cell::RefCell;

use cgpu::rollback::Rollback;

#[test]
fn test_unwinds_in_reverse_order() {
    let log = RefCell::new(Vec::new());
    {
        let mut rollback = Rollback::new();
        for step in ["instance", "device", "pool", "allocator"] {
            let log = &log;
            rollback.push(move || log.borrow_mut().push(step));
        }
        assert_eq!(rollback.len(), 4);
    }
    assert_eq!(*log.borrow(), vec!["allocator", "pool", "device", "instance"]);
}

#[test]
fn test_commit_keeps_everything() {
    let log = RefCell::new(Vec::<&str>::new());
    {
        let mut rollback = Rollback::new();
        rollback.push(|| log.borrow_mut().push("buffer"));
        rollback.push(|| log.borrow_mut().push("memory"));
        rollback.commit();
    }
    assert!(log.borrow().is_empty());
}

#[test]
fn test_early_return_unwinds_completed_steps() {
    fn build(log: &RefCell<Vec<u32>>, fail_at: u32) -> Result<(), u32> {
        let mut rollback = Rollback::new();
        for step in 0..4 {
            if step == fail_at {
                return Err(step);
            }
            rollback.push(move || log.borrow_mut().push(step));
        }
        rollback.commit();
        Ok(())
    }

    let log = RefCell::new(Vec::new());
    assert_eq!(build(&log, 2), Err(2));
    assert_eq!(*log.borrow(), vec![1, 0]);

    log.borrow_mut().clear();
    assert_eq!(build(&log, 9), Ok(()));
    assert!(log.borrow().is_empty());
}
