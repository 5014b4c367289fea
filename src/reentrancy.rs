//! Debug-only guard against user strategies re-entering the table.
//!
//! Hashing, ordering and equality are user code, and they run while a
//! bucket may be half-linked (mid-rehash, mid-treeify). A strategy that
//! reaches back into the same table through a raw pointer would observe that
//! state. In debug builds the table records which operation is in progress
//! and panics, naming both operations, on a nested entry. Release builds
//! compile the guard away.
//!
//! The scope owns a handle to the shared slot instead of borrowing the
//! guard, so a guarded method can keep calling `&mut self` helpers.
//!
//! The table is single-threaded, so the slot is an `Rc<Cell<_>>` and the
//! guard makes its owner neither `Send` nor `Sync`, in every build.

use core::cell::Cell;
use core::marker::PhantomData;
#[cfg(debug_assertions)]
use std::rc::Rc;

#[cfg(debug_assertions)]
type Slot = Rc<Cell<Option<&'static str>>>;

#[derive(Debug)]
pub(crate) struct CallbackGuard {
    #[cfg(debug_assertions)]
    active: Slot,
    _nosend: PhantomData<*mut ()>,
}

impl CallbackGuard {
    pub(crate) fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Rc::new(Cell::new(None)),
            _nosend: PhantomData,
        }
    }

    /// Mark `op` as running until the returned scope is dropped.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> Scope {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("hash table re-entered by `{op}` while `{outer}` was running");
            }
            self.active.set(Some(op));
            Scope {
                active: Rc::clone(&self.active),
            }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            Scope { _z: () }
        }
    }
}

impl Default for CallbackGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CallbackGuard {
    // A clone starts idle whatever the source was doing.
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[must_use = "the operation is only marked while the scope is alive"]
pub(crate) struct Scope {
    #[cfg(debug_assertions)]
    active: Slot,
    #[cfg(not(debug_assertions))]
    _z: (),
}

impl Drop for Scope {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.active.get().is_some());
            self.active.set(None);
        }
    }
}
