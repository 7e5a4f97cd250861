//! RbTree: red-black tree engine with stable cursors.
//!
//! Nodes live in a slot arena and never move; removal of a node with two
//! children swaps tree positions with its successor instead of copying
//! values, so a cursor keeps naming the same value until that exact value
//! is removed.

use crate::cursor::{Cursors, Iter};
use crate::error::{Error, Violation};
use crate::policy::{Compare, Duplicates, Keep, Natural, Update};
use crate::rb_node::{
    is_red, leftmost, predecessor, rightmost, successor, Anchor, Color, Dir, NodeKey, Nodes, RbNode,
    Sentinel, Structure,
};
use crate::reentrancy::DebugReentrancy;
use core::cmp::Ordering;
use core::fmt;
use tracing::{debug, trace};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TreeConfig {
    pub duplicates: Duplicates,
}

impl TreeConfig {
    pub fn with_duplicates(mut self, duplicates: Duplicates) -> Self {
        self.duplicates = duplicates;
        self
    }
}

/// Cursor into an [`RbTree`]: a node or the sentinel end position.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Cursor {
    Node(NodeKey),
    End,
}

impl Cursor {
    pub fn is_end(&self) -> bool {
        *self == Cursor::End
    }
}

impl From<Option<NodeKey>> for Cursor {
    fn from(k: Option<NodeKey>) -> Self {
        k.map_or(Cursor::End, Cursor::Node)
    }
}

#[derive(Clone)]
pub struct RbTree<T, C = Natural, U = Keep> {
    compare: C,
    update: U,
    config: TreeConfig,
    nodes: Nodes<T>,
    end: Sentinel,
    reentrancy: DebugReentrancy,
}

impl<T: Ord> RbTree<T> {
    pub fn new() -> Self {
        Self::with_comparator(Natural)
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self::from_parts(config, Natural, Keep)
    }
}

impl<T: Ord> Default for RbTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Compare<T>> RbTree<T, C> {
    pub fn with_comparator(compare: C) -> Self {
        Self::from_parts(TreeConfig::default(), compare, Keep)
    }
}

/// Leftmost node for which `probe` answers `Equal`; with `leftmost_only`
/// unset the descent stops at the first match.
fn lower_match<T, F>(
    nodes: &Nodes<T>,
    root: Option<NodeKey>,
    leftmost_only: bool,
    mut probe: F,
) -> Option<NodeKey>
where
    F: FnMut(&T) -> Ordering,
{
    let mut at = root;
    let mut found = None;
    while let Some(k) = at {
        at = match probe(&nodes[k].value) {
            Ordering::Less => nodes[k][Dir::Left],
            Ordering::Greater => nodes[k][Dir::Right],
            Ordering::Equal => {
                found = Some(k);
                if !leftmost_only {
                    break;
                }
                nodes[k][Dir::Left]
            }
        };
    }
    found
}

// Structural operations: no user code runs here.
impl<T, C, U> RbTree<T, C, U> {
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn reserve(&mut self, additional: usize) {
        self.nodes.reserve(additional);
    }

    /// Smallest element.
    pub fn first(&self) -> Option<&T> {
        self.end
            .left
            .map(|r| &self.nodes[leftmost(&self.nodes, r)].value)
    }

    /// Largest element.
    pub fn last(&self) -> Option<&T> {
        self.end
            .left
            .map(|r| &self.nodes[rightmost(&self.nodes, r)].value)
    }

    /// Mutable access to an element. Its position in the comparator's
    /// order must not change.
    pub fn get_mut(&mut self, at: Cursor) -> Option<&mut T> {
        match at {
            Cursor::Node(k) => self.nodes.get_mut(k).map(|n| &mut n.value),
            Cursor::End => None,
        }
    }

    /// Remove the element under `at`, returning the cursor of its in-order
    /// successor (or `End`).
    pub fn remove(&mut self, at: Cursor) -> Result<Cursor, Error> {
        self.take(at).map(|(_, next)| next)
    }

    /// Remove and return the element under `at` with its successor cursor.
    pub fn take(&mut self, at: Cursor) -> Result<(T, Cursor), Error> {
        let Cursor::Node(k) = at else {
            return Err(Error::EndPosition);
        };
        if !self.nodes.contains_key(k) {
            return Err(Error::StalePosition);
        }
        let next = successor(&self.nodes, k);
        let value = self.free(k).ok_or(Error::StalePosition)?;
        Ok((value, next.into()))
    }

    pub fn clear(&mut self) {
        let len = self.nodes.len();
        self.nodes.clear();
        self.end.left = None;
        debug!(len, "cleared tree");
    }

    #[inline]
    fn structure(&mut self) -> Structure<'_, T> {
        Structure {
            nodes: &mut self.nodes,
            end: &mut self.end,
        }
    }

    fn free(&mut self, k: NodeKey) -> Option<T> {
        if !self.nodes.contains_key(k) {
            return None;
        }
        self.structure().detach(k, true);
        self.nodes.remove(k).map(|n| n.value)
    }

    fn first_key(&self) -> Option<NodeKey> {
        self.end.left.map(|r| leftmost(&self.nodes, r))
    }
}

impl<T, C, U> RbTree<T, C, U>
where
    C: Compare<T>,
    U: Update<T>,
{
    pub fn from_parts(config: TreeConfig, compare: C, update: U) -> Self {
        Self {
            compare,
            update,
            config,
            nodes: Nodes::with_key(),
            end: Sentinel::default(),
            reentrancy: DebugReentrancy::new(),
        }
    }

    /// Insert `value`. Under [`Duplicates::Reject`] an equal element is
    /// handed the value through the update strategy instead and `false` is
    /// returned. Under [`Duplicates::Allow`] ties descend right, so the new
    /// element lands after every element equal to it.
    pub fn add(&mut self, value: T) -> bool {
        let _g = self.reentrancy.enter();
        let allow = self.config.duplicates.allowed();
        let (mut parent, mut dir, mut at) = (Anchor::End, Dir::Left, self.end.left);
        while let Some(k) = at {
            dir = match self.compare.compare(&value, &self.nodes[k].value) {
                Ordering::Less => Dir::Left,
                Ordering::Greater => Dir::Right,
                Ordering::Equal if allow => Dir::Right,
                Ordering::Equal => {
                    self.update.update(&mut self.nodes[k].value, value);
                    return false;
                }
            };
            parent = Anchor::Node(k);
            at = self.nodes[k][dir];
        }
        let k = self.nodes.insert(RbNode::new(value));
        self.structure().attach(parent, dir, k);
        true
    }

    fn locate(&self, probe: &T) -> Option<NodeKey> {
        let allow = self.config.duplicates.allowed();
        lower_match(&self.nodes, self.end.left, allow, |v| {
            self.compare.compare(probe, v)
        })
    }

    /// Cursor at an element equal to `probe`, or `End`. With duplicates
    /// allowed this is the leftmost equal element, so advancing from it
    /// walks the whole run.
    pub fn find(&self, probe: &T) -> Cursor {
        let _g = self.reentrancy.enter();
        self.locate(probe).into()
    }

    /// Like [`find`](Self::find) with a caller-supplied probe: `probe(v)`
    /// orders the sought key relative to `v`. Lets keyed adapters search
    /// without building a whole element.
    pub fn find_by<F>(&self, probe: F) -> Cursor
    where
        F: FnMut(&T) -> Ordering,
    {
        let _g = self.reentrancy.enter();
        let allow = self.config.duplicates.allowed();
        lower_match(&self.nodes, self.end.left, allow, probe).into()
    }

    pub fn contains(&self, probe: &T) -> bool {
        let _g = self.reentrancy.enter();
        self.locate(probe).is_some()
    }

    fn run_of(&self, probe: &T) -> Vec<NodeKey> {
        let mut run = Vec::new();
        let mut at = self.locate(probe);
        while let Some(k) = at {
            if self.compare.compare(probe, &self.nodes[k].value) != Ordering::Equal {
                break;
            }
            run.push(k);
            at = successor(&self.nodes, k);
        }
        run
    }

    /// Number of elements equal to `probe`.
    pub fn count_all(&self, probe: &T) -> usize {
        let _g = self.reentrancy.enter();
        self.run_of(probe).len()
    }

    /// Remove every element equal to `probe`; returns how many went.
    pub fn remove_all(&mut self, probe: &T) -> usize {
        let _g = self.reentrancy.enter();
        let run = self.run_of(probe);
        for &k in &run {
            self.free(k);
        }
        run.len()
    }

    /// Remove one element equal to `probe` (the leftmost) and return it.
    pub fn remove_value(&mut self, probe: &T) -> Option<T> {
        let _g = self.reentrancy.enter();
        let k = self.locate(probe)?;
        self.free(k)
    }

    /// Visit every element in order; those for which `visit` returns `true`
    /// are removed. Returns the number removed.
    pub fn purge<F>(&mut self, mut visit: F) -> usize
    where
        F: FnMut(&mut T) -> bool,
    {
        let _g = self.reentrancy.enter();
        let mut removed = 0;
        let mut at = self.first_key();
        while let Some(k) = at {
            let next = successor(&self.nodes, k);
            if visit(&mut self.nodes[k].value) {
                self.free(k);
                removed += 1;
            }
            at = next;
        }
        trace!(removed, "purged tree");
        removed
    }

    /// Keep only elements that also appear in `subset`; returns how many
    /// were dropped.
    ///
    /// Each match is unhooked from the old tree without rebalancing (the
    /// old tree is discarded afterwards, it only has to stay searchable)
    /// and re-attached to a fresh tree with the normal insert fix-up.
    /// Unmatched nodes are freed at the end. With duplicates allowed each
    /// occurrence in `subset` keeps one matching element.
    pub fn intersect<'q, I>(&mut self, subset: I) -> usize
    where
        I: IntoIterator<Item = &'q T>,
        T: 'q,
    {
        let _g = self.reentrancy.enter();
        self.rebuild_matching(subset, |c, q, v| c.compare(*q, v))
    }

    /// Like [`intersect`](Self::intersect) with keys instead of elements:
    /// `order(key, v)` orders `key` relative to `v`, consistently with the
    /// tree's comparator. Lets keyed adapters intersect on keys alone.
    pub fn intersect_by<K, I, F>(&mut self, keys: I, mut order: F) -> usize
    where
        I: IntoIterator<Item = K>,
        F: FnMut(&K, &T) -> Ordering,
    {
        let _g = self.reentrancy.enter();
        self.rebuild_matching(keys, |_, k, v| order(k, v))
    }

    fn rebuild_matching<K, I, F>(&mut self, keys: I, mut order: F) -> usize
    where
        I: IntoIterator<Item = K>,
        F: FnMut(&C, &K, &T) -> Ordering,
    {
        let before = self.nodes.len();
        let mut old = core::mem::take(&mut self.end);
        let allow = self.config.duplicates.allowed();
        for q in keys {
            let compare = &self.compare;
            let Some(k) = lower_match(&self.nodes, old.left, allow, |v| order(compare, &q, v))
            else {
                continue;
            };
            Structure {
                nodes: &mut self.nodes,
                end: &mut old,
            }
            .detach(k, false);

            let (mut parent, mut dir, mut at) = (Anchor::End, Dir::Left, self.end.left);
            while let Some(n) = at {
                dir = match self.compare.compare(&self.nodes[k].value, &self.nodes[n].value) {
                    Ordering::Less => Dir::Left,
                    _ => Dir::Right,
                };
                parent = Anchor::Node(n);
                at = self.nodes[n][dir];
            }
            self.structure().attach(parent, dir, k);
        }

        let mut stack: Vec<NodeKey> = old.left.into_iter().collect();
        while let Some(k) = stack.pop() {
            if let Some(n) = self.nodes.remove(k) {
                stack.extend(n[Dir::Left]);
                stack.extend(n[Dir::Right]);
            }
        }
        let removed = before - self.nodes.len();
        trace!(kept = self.nodes.len(), "swapped in rebuilt tree");
        debug!(kept = self.nodes.len(), removed, "intersected tree");
        removed
    }

    /// Verify parent links, the red-black properties, in-order ordering
    /// and the element count. Returns the black height (counting the empty
    /// leaves). Intended for tests.
    pub fn check(&self) -> Result<usize, Violation> {
        let _g = self.reentrancy.enter();
        let mut walk = Walk {
            tree: self,
            prev: None,
            seen: 0,
            path: String::new(),
        };
        if let Some(root) = self.end.left {
            if self.nodes.get(root).map(|n| n.parent) != Some(Anchor::End) {
                return Err(Violation::ParentLink {
                    path: String::new(),
                });
            }
            if self.nodes[root].color != Color::Black {
                return Err(Violation::RootNotBlack);
            }
        }
        let height = walk.visit(self.end.left)?;
        if walk.seen != self.nodes.len() {
            return Err(Violation::Count {
                expected: self.nodes.len(),
                found: walk.seen,
            });
        }
        Ok(height)
    }
}

/// Recursive state of `RbTree::check`.
struct Walk<'a, T, C, U> {
    tree: &'a RbTree<T, C, U>,
    prev: Option<NodeKey>,
    seen: usize,
    path: String,
}

impl<T, C: Compare<T>, U> Walk<'_, T, C, U> {
    fn visit(&mut self, at: Option<NodeKey>) -> Result<usize, Violation> {
        let Some(k) = at else {
            return Ok(1);
        };
        let tree = self.tree;
        let nodes = &tree.nodes;
        self.seen += 1;
        if self.seen > nodes.len() {
            return Err(Violation::Count {
                expected: nodes.len(),
                found: self.seen,
            });
        }
        let node = &nodes[k];
        for (dir, step) in [(Dir::Left, 'L'), (Dir::Right, 'R')] {
            if let Some(c) = node[dir] {
                if nodes.get(c).map(|n| n.parent) != Some(Anchor::Node(k)) {
                    self.path.push(step);
                    return Err(Violation::ParentLink {
                        path: self.path.clone(),
                    });
                }
            }
        }
        let red_child = is_red(nodes, node[Dir::Left]) || is_red(nodes, node[Dir::Right]);
        if node.color == Color::Red && red_child {
            return Err(Violation::RedRed {
                path: self.path.clone(),
            });
        }

        self.path.push('L');
        let left = self.visit(node[Dir::Left])?;
        self.path.pop();

        if let Some(p) = self.prev {
            match tree.compare.compare(&nodes[p].value, &node.value) {
                Ordering::Greater => {
                    return Err(Violation::Order {
                        path: self.path.clone(),
                    })
                }
                Ordering::Equal if !tree.config.duplicates.allowed() => {
                    return Err(Violation::Duplicate {
                        path: self.path.clone(),
                    })
                }
                _ => {}
            }
        }
        self.prev = Some(k);

        self.path.push('R');
        let right = self.visit(node[Dir::Right])?;
        self.path.pop();

        if left != right {
            return Err(Violation::BlackHeight {
                path: self.path.clone(),
                left,
                right,
            });
        }
        Ok(left + usize::from(node.color == Color::Black))
    }
}

impl<T, C, U> Cursors for RbTree<T, C, U> {
    type Item = T;
    type Cursor = Cursor;

    fn begin(&self) -> Cursor {
        self.first_key().into()
    }

    fn end(&self) -> Cursor {
        Cursor::End
    }

    fn advance(&self, at: Cursor) -> Cursor {
        match at {
            Cursor::Node(k) if self.nodes.contains_key(k) => successor(&self.nodes, k).into(),
            _ => Cursor::End,
        }
    }

    fn retreat(&self, at: Cursor) -> Cursor {
        match at {
            Cursor::End => self.end.left.map(|r| rightmost(&self.nodes, r)).into(),
            Cursor::Node(k) if self.nodes.contains_key(k) => predecessor(&self.nodes, k).into(),
            Cursor::Node(_) => Cursor::End,
        }
    }

    fn get(&self, at: Cursor) -> Option<&T> {
        match at {
            Cursor::Node(k) => self.nodes.get(k).map(|n| &n.value),
            Cursor::End => None,
        }
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

impl<'a, T, C, U> IntoIterator for &'a RbTree<T, C, U> {
    type Item = &'a T;
    type IntoIter = Iter<'a, RbTree<T, C, U>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C, U> Extend<T> for RbTree<T, C, U>
where
    C: Compare<T>,
    U: Update<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.add(value);
        }
    }
}

impl<T: Ord> FromIterator<T> for RbTree<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut tree = RbTree::new();
        tree.extend(iter);
        tree
    }
}

impl<T: fmt::Debug, C, U> fmt::Debug for RbTree<T, C, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}
