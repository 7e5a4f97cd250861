//! Doubly-linked chain nodes stored in a slot arena.
//!
//! A bucket is named by its head key (`None` when empty). A non-empty
//! chain is circular: the head's `prev` is the tail and the tail's `next`
//! is the head, so a singleton links to itself. Walks stop when they come
//! back around to the head.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of a [`Link`].
    pub struct LinkKey;
}

pub(crate) type Links<T> = SlotMap<LinkKey, Link<T>>;

#[derive(Clone, Debug)]
pub(crate) struct Link<T> {
    pub(crate) next: LinkKey,
    pub(crate) prev: LinkKey,
    /// Full hash computed once on insertion; indexing never rehashes.
    pub(crate) hash: u64,
    pub(crate) value: T,
}

/// Allocate a detached singleton link.
pub(crate) fn alloc<T>(links: &mut Links<T>, value: T, hash: u64) -> LinkKey {
    links.insert_with_key(|k| Link {
        next: k,
        prev: k,
        hash,
        value,
    })
}

/// `a.next = b` and `b.prev = a`.
#[inline]
pub(crate) fn attach<T>(links: &mut Links<T>, a: LinkKey, b: LinkKey) {
    links[a].next = b;
    links[b].prev = a;
}

/// Make `key` the new head of the chain.
pub(crate) fn push_front<T>(links: &mut Links<T>, head: &mut Option<LinkKey>, key: LinkKey) {
    match *head {
        None => attach(links, key, key),
        Some(h) => {
            let tail = links[h].prev;
            attach(links, tail, key);
            attach(links, key, h);
        }
    }
    *head = Some(key);
}

/// Link `key` immediately before `at`, which must be in the chain.
pub(crate) fn insert_before<T>(
    links: &mut Links<T>,
    head: &mut Option<LinkKey>,
    at: LinkKey,
    key: LinkKey,
) {
    let prev = links[at].prev;
    attach(links, prev, key);
    attach(links, key, at);
    if *head == Some(at) {
        *head = Some(key);
    }
}

/// Take `key` out of its chain, fixing the head when needed. The link
/// itself stays allocated and becomes a singleton.
pub(crate) fn unlink<T>(links: &mut Links<T>, head: &mut Option<LinkKey>, key: LinkKey) {
    let (prev, next) = (links[key].prev, links[key].next);
    if next == key {
        debug_assert_eq!(*head, Some(key));
        *head = None;
        return;
    }
    attach(links, prev, next);
    if *head == Some(key) {
        *head = Some(next);
    }
    attach(links, key, key);
}

/// Successor of `key` inside its chain, `None` past the tail.
#[inline]
pub(crate) fn chain_next<T>(links: &Links<T>, head: LinkKey, key: LinkKey) -> Option<LinkKey> {
    let next = links[key].next;
    (next != head).then_some(next)
}

/// Predecessor of `key` inside its chain, `None` before the head.
#[inline]
pub(crate) fn chain_prev<T>(links: &Links<T>, head: LinkKey, key: LinkKey) -> Option<LinkKey> {
    (key != head).then(|| links[key].prev)
}

#[inline]
pub(crate) fn tail<T>(links: &Links<T>, head: LinkKey) -> LinkKey {
    links[head].prev
}

/// First link from the head satisfying `pred`.
pub(crate) fn find_in<T, F>(links: &Links<T>, head: Option<LinkKey>, mut pred: F) -> Option<LinkKey>
where
    F: FnMut(&Link<T>) -> bool,
{
    chain(links, head).find(|&k| pred(&links[k]))
}

/// Keys of a chain in order. The chain must not be relinked while the
/// walk is in progress.
pub(crate) fn chain<T>(links: &Links<T>, head: Option<LinkKey>) -> Chain<'_, T> {
    Chain {
        links,
        head,
        at: head,
    }
}

pub(crate) struct Chain<'a, T> {
    links: &'a Links<T>,
    head: Option<LinkKey>,
    at: Option<LinkKey>,
}

impl<T> Iterator for Chain<'_, T> {
    type Item = LinkKey;

    fn next(&mut self) -> Option<LinkKey> {
        let at = self.at?;
        let head = self.head?;
        self.at = chain_next(self.links, head, at);
        Some(at)
    }
}
