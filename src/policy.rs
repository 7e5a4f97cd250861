//! Strategy objects injected into the engines at construction time.

use core::cmp::Ordering;

/// What `add` does when an equal element is already present.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Duplicates {
    /// Keep a single element per key; a second `add` hands the incoming
    /// value to the engine's [`Update`] strategy and reports "not added".
    #[default]
    Reject,
    /// Always insert. Equal elements stay adjacent in iteration order.
    Allow,
}

impl Duplicates {
    #[inline]
    pub fn allowed(self) -> bool {
        self == Duplicates::Allow
    }
}

/// Three-way comparison used by the tree engine.
///
/// Must be a total order; an inconsistent comparator yields an arbitrary
/// (but memory safe) tree shape, which `RbTree::check` will report.
pub trait Compare<T: ?Sized> {
    fn compare(&self, a: &T, b: &T) -> Ordering;
}

/// Compare through `Ord`.
#[derive(Copy, Clone, Debug, Default)]
pub struct Natural;

impl<T: ?Sized + Ord> Compare<T> for Natural {
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        a.cmp(b)
    }
}

impl<T: ?Sized, F> Compare<T> for F
where
    F: Fn(&T, &T) -> Ordering,
{
    #[inline]
    fn compare(&self, a: &T, b: &T) -> Ordering {
        self(a, b)
    }
}

/// Called when `add` meets an equal element under [`Duplicates::Reject`].
pub trait Update<T> {
    fn update(&mut self, existing: &mut T, incoming: T);
}

/// Leave the stored element alone and drop the incoming one.
#[derive(Copy, Clone, Debug, Default)]
pub struct Keep;

impl<T> Update<T> for Keep {
    #[inline]
    fn update(&mut self, _existing: &mut T, _incoming: T) {}
}

/// Overwrite the stored element with the incoming one. Useful for maps
/// whose elements compare by key only.
#[derive(Copy, Clone, Debug, Default)]
pub struct Replace;

impl<T> Update<T> for Replace {
    #[inline]
    fn update(&mut self, existing: &mut T, incoming: T) {
        *existing = incoming;
    }
}

impl<T, F> Update<T> for F
where
    F: FnMut(&mut T, T),
{
    #[inline]
    fn update(&mut self, existing: &mut T, incoming: T) {
        self(existing, incoming)
    }
}
