//! Red-black node primitives over a slot arena.
//!
//! Nodes refer to each other by [`NodeKey`]. The parent of the root is the
//! tree's [`Sentinel`], named by [`Anchor::End`]; the sentinel is never a
//! data node and its only link is `left`, which holds the root. Every
//! child assignment goes through [`Structure::set_child`], which also
//! points the child's `parent` back at its new owner, so the two
//! directions of a link can never disagree.

use core::ops::{Index, IndexMut};
use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Arena key of a tree node.
    pub struct NodeKey;
}

pub(crate) type Nodes<T> = SlotMap<NodeKey, RbNode<T>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Color {
    Red,
    Black,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Dir {
    Left,
    Right,
}

impl Dir {
    #[inline]
    pub(crate) fn opposite(self) -> Dir {
        match self {
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }
}

/// Owner of a child link: another node or the tree's sentinel.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Anchor {
    End,
    Node(NodeKey),
}

#[derive(Clone, Debug)]
pub(crate) struct RbNode<T> {
    child: [Option<NodeKey>; 2],
    pub(crate) parent: Anchor,
    pub(crate) color: Color,
    pub(crate) value: T,
}

impl<T> RbNode<T> {
    /// A fresh, unattached red node.
    pub(crate) fn new(value: T) -> Self {
        Self {
            child: [None, None],
            parent: Anchor::End,
            color: Color::Red,
            value,
        }
    }
}

impl<T> Index<Dir> for RbNode<T> {
    type Output = Option<NodeKey>;

    fn index(&self, dir: Dir) -> &Self::Output {
        match dir {
            Dir::Left => &self.child[0],
            Dir::Right => &self.child[1],
        }
    }
}

impl<T> IndexMut<Dir> for RbNode<T> {
    fn index_mut(&mut self, dir: Dir) -> &mut Self::Output {
        match dir {
            Dir::Left => &mut self.child[0],
            Dir::Right => &mut self.child[1],
        }
    }
}

/// The tree's end marker: one past the maximum and parent of the root.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct Sentinel {
    pub(crate) left: Option<NodeKey>,
}

#[inline]
pub(crate) fn is_red<T>(nodes: &Nodes<T>, k: Option<NodeKey>) -> bool {
    k.is_some_and(|k| nodes[k].color == Color::Red)
}

pub(crate) fn leftmost<T>(nodes: &Nodes<T>, mut k: NodeKey) -> NodeKey {
    while let Some(l) = nodes[k][Dir::Left] {
        k = l;
    }
    k
}

pub(crate) fn rightmost<T>(nodes: &Nodes<T>, mut k: NodeKey) -> NodeKey {
    while let Some(r) = nodes[k][Dir::Right] {
        k = r;
    }
    k
}

/// In-order neighbour of `k` in direction `dir`; `None` past either end.
fn neighbour<T>(nodes: &Nodes<T>, k: NodeKey, dir: Dir) -> Option<NodeKey> {
    if let Some(c) = nodes[k][dir] {
        return Some(match dir {
            Dir::Right => leftmost(nodes, c),
            Dir::Left => rightmost(nodes, c),
        });
    }
    let mut at = k;
    loop {
        match nodes[at].parent {
            Anchor::End => return None,
            Anchor::Node(p) => {
                if nodes[p][dir.opposite()] == Some(at) {
                    return Some(p);
                }
                at = p;
            }
        }
    }
}

#[inline]
pub(crate) fn successor<T>(nodes: &Nodes<T>, k: NodeKey) -> Option<NodeKey> {
    neighbour(nodes, k, Dir::Right)
}

#[inline]
pub(crate) fn predecessor<T>(nodes: &Nodes<T>, k: NodeKey) -> Option<NodeKey> {
    neighbour(nodes, k, Dir::Left)
}

/// Mutable view of one tree: the shared arena plus the sentinel that
/// owns the root. Two views over the same arena with different sentinels
/// describe two disjoint trees, which is how `intersect` rebuilds.
pub(crate) struct Structure<'a, T> {
    pub(crate) nodes: &'a mut Nodes<T>,
    pub(crate) end: &'a mut Sentinel,
}

impl<T> Structure<'_, T> {
    #[inline]
    fn child(&self, parent: Anchor, dir: Dir) -> Option<NodeKey> {
        match parent {
            Anchor::End => self.end.left.filter(|_| dir == Dir::Left),
            Anchor::Node(p) => self.nodes[p][dir],
        }
    }

    /// Store `child` under `parent` and point it back at `parent`.
    pub(crate) fn set_child(&mut self, parent: Anchor, dir: Dir, child: Option<NodeKey>) {
        match parent {
            Anchor::End => {
                debug_assert_eq!(dir, Dir::Left, "sentinel only has a left child");
                self.end.left = child;
            }
            Anchor::Node(p) => self.nodes[p][dir] = child,
        }
        if let Some(c) = child {
            self.nodes[c].parent = parent;
        }
    }

    /// Side of its parent that `k` hangs on. The root is the sentinel's
    /// left child.
    fn side(&self, k: NodeKey) -> Dir {
        match self.nodes[k].parent {
            Anchor::End => Dir::Left,
            Anchor::Node(p) if self.nodes[p][Dir::Left] == Some(k) => Dir::Left,
            Anchor::Node(_) => Dir::Right,
        }
    }

    /// Rotate `t` towards `dir`: its child on the other side takes its
    /// place, `t` becomes that child's `dir` child, and the child's former
    /// `dir` subtree moves under `t`. The rising child must exist.
    pub(crate) fn rotate(&mut self, t: NodeKey, dir: Dir) {
        let rising = dir.opposite();
        let Some(c) = self.nodes[t][rising] else {
            debug_assert!(false, "rotation without a child to lift");
            return;
        };
        let grand = self.nodes[t].parent;
        let side = self.side(t);
        let middle = self.nodes[c][dir];
        self.set_child(Anchor::Node(t), rising, middle);
        self.set_child(Anchor::Node(c), dir, Some(t));
        self.set_child(grand, side, Some(c));
    }

    /// Hang the red node `k` at the empty slot `(parent, dir)` and restore
    /// the red-black properties.
    pub(crate) fn attach(&mut self, parent: Anchor, dir: Dir, k: NodeKey) {
        debug_assert!(self.child(parent, dir).is_none());
        let node = &mut self.nodes[k];
        node[Dir::Left] = None;
        node[Dir::Right] = None;
        node.color = Color::Red;
        self.set_child(parent, dir, Some(k));
        self.insert_fixup(k);
    }

    fn insert_fixup(&mut self, mut x: NodeKey) {
        loop {
            let Anchor::Node(p) = self.nodes[x].parent else {
                self.nodes[x].color = Color::Black;
                return;
            };
            if self.nodes[p].color == Color::Black {
                return;
            }
            let Anchor::Node(g) = self.nodes[p].parent else {
                // Red root: blackening it is always safe.
                self.nodes[p].color = Color::Black;
                return;
            };
            let parent_side = self.side(p);
            let uncle = self.nodes[g][parent_side.opposite()];
            if let Some(u) = uncle.filter(|&u| self.nodes[u].color == Color::Red) {
                self.nodes[p].color = Color::Black;
                self.nodes[u].color = Color::Black;
                self.nodes[g].color = Color::Red;
                x = g;
                continue;
            }
            let mut top = p;
            if self.side(x) != parent_side {
                // Inner grandchild: straighten the zig-zag first.
                self.rotate(p, parent_side);
                top = x;
            }
            self.nodes[top].color = Color::Black;
            self.nodes[g].color = Color::Red;
            self.rotate(g, parent_side.opposite());
            return;
        }
    }

    /// Exchange the tree positions (links and colors) of `a` and its
    /// in-order successor `b`, leaving both values where they are. `a`
    /// must have two children.
    fn swap_with_successor(&mut self, a: NodeKey, b: NodeKey) {
        let a_parent = self.nodes[a].parent;
        let a_side = self.side(a);
        let a_left = self.nodes[a][Dir::Left];
        let a_right = self.nodes[a][Dir::Right];
        let b_parent = self.nodes[b].parent;
        let b_right = self.nodes[b][Dir::Right];
        debug_assert!(self.nodes[b][Dir::Left].is_none());

        let a_color = self.nodes[a].color;
        self.nodes[a].color = self.nodes[b].color;
        self.nodes[b].color = a_color;

        self.set_child(a_parent, a_side, Some(b));
        self.set_child(Anchor::Node(b), Dir::Left, a_left);
        if a_right == Some(b) {
            self.set_child(Anchor::Node(b), Dir::Right, Some(a));
        } else {
            self.set_child(Anchor::Node(b), Dir::Right, a_right);
            self.set_child(b_parent, Dir::Left, Some(a));
        }
        self.set_child(Anchor::Node(a), Dir::Left, None);
        self.set_child(Anchor::Node(a), Dir::Right, b_right);
    }

    /// Unhook `z` from the tree. The node stays in the arena as a detached
    /// singleton; the caller frees or re-attaches it.
    ///
    /// A node with two children first trades places with its successor, so
    /// keys held for any other node keep naming the same value. With
    /// `rebalance == false` the tree stays a valid search tree but colors
    /// are left as they fall; only `intersect` uses that, on a tree it is
    /// about to discard.
    pub(crate) fn detach(&mut self, z: NodeKey, rebalance: bool) {
        if let (Some(_), Some(r)) = (self.nodes[z][Dir::Left], self.nodes[z][Dir::Right]) {
            let s = leftmost(self.nodes, r);
            self.swap_with_successor(z, s);
        }
        let child = self.nodes[z][Dir::Left].or(self.nodes[z][Dir::Right]);
        let parent = self.nodes[z].parent;
        let side = self.side(z);
        self.set_child(parent, side, child);

        let node = &mut self.nodes[z];
        node[Dir::Left] = None;
        node[Dir::Right] = None;
        node.parent = Anchor::End;
        if rebalance && node.color == Color::Black {
            self.delete_fixup(child, parent);
        }
    }

    /// Repay the black-height debt carried by `x` (possibly an empty
    /// subtree) hanging under `parent`.
    fn delete_fixup(&mut self, mut x: Option<NodeKey>, mut parent: Anchor) {
        while !is_red(self.nodes, x) {
            let Anchor::Node(p) = parent else {
                break;
            };
            let x_side = if self.nodes[p][Dir::Left] == x {
                Dir::Left
            } else {
                Dir::Right
            };
            let s_side = x_side.opposite();
            let Some(mut s) = self.nodes[p][s_side] else {
                debug_assert!(false, "black deficit without a sibling");
                break;
            };
            if self.nodes[s].color == Color::Red {
                self.nodes[s].color = Color::Black;
                self.nodes[p].color = Color::Red;
                self.rotate(p, x_side);
                match self.nodes[p][s_side] {
                    Some(next) => s = next,
                    None => break,
                }
            }
            let near = self.nodes[s][x_side];
            let far = self.nodes[s][s_side];
            if !is_red(self.nodes, near) && !is_red(self.nodes, far) {
                self.nodes[s].color = Color::Red;
                x = Some(p);
                parent = self.nodes[p].parent;
                continue;
            }
            if !is_red(self.nodes, far) {
                if let Some(n) = near {
                    self.nodes[n].color = Color::Black;
                }
                self.nodes[s].color = Color::Red;
                self.rotate(s, s_side);
                match self.nodes[p][s_side] {
                    Some(next) => s = next,
                    None => break,
                }
            }
            self.nodes[s].color = self.nodes[p].color;
            self.nodes[p].color = Color::Black;
            if let Some(f) = self.nodes[s][s_side] {
                self.nodes[f].color = Color::Black;
            }
            self.rotate(p, x_side);
            x = self.end.left;
            break;
        }
        if let Some(x) = x {
            self.nodes[x].color = Color::Black;
        }
    }
}
