//! Debug-only reentrancy detection.
//!
//! Engines call into user code (comparators, `Hash`/`Eq`, update and purge
//! callbacks) while links are transiently inconsistent. Each engine embeds
//! a `DebugReentrancy` and takes `let _g = self.reentrancy.enter();` at
//! the top of every such entry point. Debug builds panic on nested entry;
//! release builds compile the tracker away.

use core::cell::Cell;
use core::marker::PhantomData;
#[cfg(debug_assertions)]
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct DebugReentrancy {
    // Shared with outstanding guards so that a guard does not borrow the
    // engine, whose `&mut self` helpers run while it is held.
    #[cfg(debug_assertions)]
    busy: Rc<Cell<bool>>,
    // Engines are single-threaded; keep them !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl DebugReentrancy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the engine busy until the returned guard drops.
    #[inline]
    #[allow(clippy::needless_return)]
    pub fn enter(&self) -> Entered {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "engine re-entered from a user callback"
            );
            return Entered {
                busy: Rc::clone(&self.busy),
            };
        }

        #[cfg(not(debug_assertions))]
        {
            return Entered { _z: PhantomData };
        }
    }
}

impl Clone for DebugReentrancy {
    // A copy of an engine starts idle regardless of the source's state.
    fn clone(&self) -> Self {
        Self::new()
    }
}

/// RAII marker returned by [`DebugReentrancy::enter`].
pub struct Entered {
    #[cfg(debug_assertions)]
    busy: Rc<Cell<bool>>,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<Cell<()>>,
}

impl Drop for Entered {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.busy.set(false);
    }
}
