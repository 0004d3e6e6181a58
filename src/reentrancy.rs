//! Debug-only guard against type callbacks re-entering their dictionary.
//!
//! `hash` and `key_eq` run while the dictionary is walking its chains. A
//! callback that reaches back into the same dictionary would observe it
//! mid-probe, so debug builds panic on nested entry. Release builds compile
//! the guard away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug)]
pub(crate) struct CallbackGuard {
    #[cfg(debug_assertions)]
    active: Cell<bool>,
    // !Send + !Sync: dictionaries are owned by one thread.
    _nosend: PhantomData<*mut ()>,
}

impl CallbackGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(false),
            _nosend: PhantomData,
        }
    }

    /// Mark the start of a section that calls into the dictionary type.
    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.active.replace(true),
                "dictionary re-entered from a type callback"
            );
            Section { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            Section { _z: PhantomData }
        }
    }
}

pub(crate) struct Section<'a> {
    #[cfg(debug_assertions)]
    owner: &'a CallbackGuard,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.active.set(false);
    }
}
