//! Cursor model shared by both engines.
//!
//! A cursor is a small `Copy` handle naming one element or the synthetic
//! end position. Cursors never borrow the engine; every access goes back
//! through it, so a cursor whose element was removed simply stops
//! resolving (`get` returns `None`, `remove` reports `StalePosition`).

use core::iter::FusedIterator;

pub trait Cursors {
    type Item;
    type Cursor: Copy + Eq;

    /// Cursor at the first element, or `end()` when empty.
    fn begin(&self) -> Self::Cursor;

    /// The one-past-the-last position.
    fn end(&self) -> Self::Cursor;

    /// Position after `at`. Advancing `end()` stays at `end()`.
    fn advance(&self, at: Self::Cursor) -> Self::Cursor;

    /// Position before `at`. Retreating `end()` yields the last element;
    /// retreating `begin()` yields `end()`.
    fn retreat(&self, at: Self::Cursor) -> Self::Cursor;

    /// Element under the cursor; `None` for `end()` or stale cursors.
    fn get(&self, at: Self::Cursor) -> Option<&Self::Item>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> Iter<'_, Self>
    where
        Self: Sized,
    {
        Iter {
            engine: self,
            at: self.begin(),
            remaining: self.len(),
        }
    }
}

/// Borrowing iterator walking `begin()..end()` through any engine.
pub struct Iter<'a, E: Cursors> {
    engine: &'a E,
    at: E::Cursor,
    remaining: usize,
}

impl<'a, E: Cursors> Iterator for Iter<'a, E> {
    type Item = &'a E::Item;

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = self.engine.get(self.at)?;
        self.at = self.engine.advance(self.at);
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<E: Cursors> ExactSizeIterator for Iter<'_, E> {}

impl<E: Cursors> FusedIterator for Iter<'_, E> {}

impl<E: Cursors> Clone for Iter<'_, E> {
    fn clone(&self) -> Self {
        Self {
            engine: self.engine,
            at: self.at,
            remaining: self.remaining,
        }
    }
}
