//! Scoped cleanup for multi-step construction.
//!
//! Each successful sub-step pushes the action that undoes it. If the guard is
//! dropped before [`Rollback::commit`], the actions run in reverse order.

pub struct Rollback<'a> {
    actions: Vec<Box<dyn FnOnce() + 'a>>,
}

impl<'a> Rollback<'a> {
    pub fn new() -> Self {
        Self { actions: Vec::new() }
    }

    pub fn push(&mut self, action: impl FnOnce() + 'a) {
        self.actions.push(Box::new(action));
    }

    /// Number of pending cleanup actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keep everything constructed so far.
    pub fn commit(mut self) {
        self.actions.clear();
    }
}

impl Default for Rollback<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        while let Some(action) = self.actions.pop() {
            action();
        }
    }
}
