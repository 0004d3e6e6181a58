//! Dictionary configuration and the shared resize policy.

use core::cell::Cell;
use std::rc::Rc;

/// Smallest table a dictionary allocates.
pub const DEFAULT_INITIAL_SIZE: usize = 4;

/// Growth proceeds even while resizing is disabled once `len / capacity`
/// exceeds this ratio.
pub const DEFAULT_FORCE_RESIZE_RATIO: usize = 5;

/// Buckets migrated per batch by [`Dict::rehash_for`](crate::Dict::rehash_for).
pub const DEFAULT_REHASH_BATCH: usize = 100;

#[derive(Debug)]
struct PolicyState {
    can_resize: Cell<bool>,
    force_resize_ratio: usize,
}

/// Resize throttle shared between dictionaries.
///
/// Clones share one toggle, so a host can disable growth on every
/// dictionary at once (e.g. while a copy-on-write snapshot is running).
/// Dictionaries built from unrelated policies do not see each other's
/// toggles.
#[derive(Clone, Debug)]
pub struct ResizePolicy {
    state: Rc<PolicyState>,
}

impl ResizePolicy {
    pub fn new() -> Self {
        Self::with_force_ratio(DEFAULT_FORCE_RESIZE_RATIO)
    }

    pub fn with_force_ratio(force_resize_ratio: usize) -> Self {
        Self {
            state: Rc::new(PolicyState {
                can_resize: Cell::new(true),
                force_resize_ratio,
            }),
        }
    }

    pub fn enable(&self) {
        self.state.can_resize.set(true);
    }

    pub fn disable(&self) {
        self.state.can_resize.set(false);
    }

    pub fn can_resize(&self) -> bool {
        self.state.can_resize.get()
    }

    pub fn force_resize_ratio(&self) -> usize {
        self.state.force_resize_ratio
    }
}

impl Default for ResizePolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Construction-time settings for a [`Dict`](crate::Dict).
#[derive(Clone, Debug)]
pub struct DictConfig {
    /// Rounded up to a power of two.
    pub initial_size: usize,
    pub rehash_batch: usize,
    pub policy: ResizePolicy,
    /// Seed for random sampling; `None` seeds from OS entropy.
    pub rng_seed: Option<u64>,
}

impl DictConfig {
    pub fn with_policy(mut self, policy: ResizePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_initial_size(mut self, initial_size: usize) -> Self {
        self.initial_size = initial_size;
        self
    }

    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.initial_size = self.initial_size.max(1).next_power_of_two();
        self.rehash_batch = self.rehash_batch.max(1);
        self
    }
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            initial_size: DEFAULT_INITIAL_SIZE,
            rehash_batch: DEFAULT_REHASH_BATCH,
            policy: ResizePolicy::default(),
            rng_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_toggle() {
        let a = ResizePolicy::new();
        let b = a.clone();
        let unrelated = ResizePolicy::new();

        b.disable();
        assert!(!a.can_resize());
        assert!(unrelated.can_resize());

        a.enable();
        assert!(b.can_resize());
        assert_eq!(a.force_resize_ratio(), DEFAULT_FORCE_RESIZE_RATIO);
    }

    #[test]
    fn normalization_rounds_sizes() {
        let c = DictConfig::default().with_initial_size(5).normalized();
        assert_eq!(c.initial_size, 8);
        let c = DictConfig::default().with_initial_size(0).normalized();
        assert_eq!(c.initial_size, 1);
        let c = DictConfig {
            rehash_batch: 0,
            ..DictConfig::default()
        }
        .normalized();
        assert_eq!(c.rehash_batch, 1);
    }
}
