//! Live safe-iterator accounting with linear tokens.
//!
//! A safe iterator takes one token from its dictionary's [`IteratorCount`]
//! on its first advance and must hand it back through
//! [`IteratorCount::release`]. The count gates opportunistic rehashing, so a
//! token that vanished without being returned would disable incremental
//! rehashing forever; dropping one therefore panics.
//!
//! Every count carries a process-unique id and its tokens remember it, so a
//! token returned to a different count is caught instead of unbalancing both.

use core::cell::Cell;
use core::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_COUNT_ID: AtomicU64 = AtomicU64::new(1);

/// Proof that one live-iterator slot was acquired from a particular count.
#[derive(Debug)]
pub(crate) struct IterToken {
    owner: u64,
    _nosend: PhantomData<*mut ()>,
}

impl Drop for IterToken {
    fn drop(&mut self) {
        // Don't turn an unrelated panic into an abort.
        if !std::thread::panicking() {
            panic!("safe iterator dropped without release");
        }
    }
}

#[derive(Debug)]
pub(crate) struct IteratorCount {
    id: u64,
    live: Cell<u32>,
}

impl IteratorCount {
    pub(crate) fn new() -> Self {
        Self {
            id: NEXT_COUNT_ID.fetch_add(1, Ordering::Relaxed),
            live: Cell::new(0),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn acquire(&self) -> IterToken {
        let n = self
            .live
            .get()
            .checked_add(1)
            .expect("live iterator count overflow");
        self.live.set(n);
        IterToken {
            owner: self.id,
            _nosend: PhantomData,
        }
    }

    /// Return a token. Returns true when no safe iterator remains.
    #[inline]
    pub(crate) fn release(&self, t: IterToken) -> bool {
        assert_eq!(t.owner, self.id, "iterator token returned to another dictionary");
        let c = self.live.get();
        assert!(c > 0, "live iterator count underflow");
        self.live.set(c - 1);
        core::mem::forget(t);
        c == 1
    }

    #[inline]
    pub(crate) fn live(&self) -> u32 {
        self.live.get()
    }

    #[inline]
    pub(crate) fn is_idle(&self) -> bool {
        self.live.get() == 0
    }
}
