//! Order-statistics AVL map.
//!
//! A height-balanced binary search tree where every node also tracks its
//! subtree size, so the k-th smallest entry can be found in O(log n) via
//! [`AvlMap::select`]. Key design decisions:
//!
//! 1. **Injected comparison**: the ordering is a zero-sized strategy type
//!    ([`Comparator`]), not a trait object, so the tree stays reusable for
//!    any key without dynamic dispatch. [`NaturalOrder`] delegates to `Ord`.
//!
//! 2. **Recursive insert/remove, iterative everything else**: insert and
//!    remove recurse along a root-to-leaf path, which is bounded by the
//!    balance invariant at O(log n). `clear` (and therefore `Drop`) must
//!    not recurse at all, since a dying tree can hold millions of nodes;
//!    it degenerates the tree into a right spine by rotating left children
//!    up, detaching one childless node per step.
//!
//! 3. **Duplicate keys are rejected**, not overwritten. Callers that need
//!    to re-key an entry remove and reinsert it.

use std::cmp::Ordering;

/// Comparison strategy for tree keys.
pub trait Comparator<K> {
    fn cmp(&self, a: &K, b: &K) -> Ordering;
}

/// The default strategy: compare with the key's `Ord` implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NaturalOrder;

impl<K: Ord> Comparator<K> for NaturalOrder {
    fn cmp(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

struct Node<K, V> {
    key: K,
    value: V,
    height: i32,
    size: usize,
    left: Link<K, V>,
    right: Link<K, V>,
}

type Link<K, V> = Option<Box<Node<K, V>>>;

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Node<K, V> {
        Node {
            key,
            value,
            height: 1,
            size: 1,
            left: None,
            right: None,
        }
    }

    fn recalc(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.size = 1 + size(&self.left) + size(&self.right);
    }

    fn balance(&self) -> i32 {
        height(&self.left) - height(&self.right)
    }
}

fn height<K, V>(link: &Link<K, V>) -> i32 {
    match link {
        Some(node) => node.height,
        None => 0,
    }
}

fn size<K, V>(link: &Link<K, V>) -> usize {
    match link {
        Some(node) => node.size,
        None => 0,
    }
}

fn child_balance<K, V>(link: &Link<K, V>) -> i32 {
    match link {
        Some(node) => node.balance(),
        None => 0,
    }
}

/// Rotate the subtree rooted at `link` to the right: the left child
/// becomes the new subtree root.
fn rotate_right<K, V>(link: &mut Link<K, V>) {
    let Some(mut y) = link.take() else { return };
    let Some(mut x) = y.left.take() else {
        *link = Some(y);
        return;
    };
    y.left = x.right.take();
    y.recalc();
    x.right = Some(y);
    x.recalc();
    *link = Some(x);
}

/// Rotate the subtree rooted at `link` to the left: the right child
/// becomes the new subtree root.
fn rotate_left<K, V>(link: &mut Link<K, V>) {
    let Some(mut x) = link.take() else { return };
    let Some(mut y) = x.right.take() else {
        *link = Some(x);
        return;
    };
    x.right = y.left.take();
    x.recalc();
    y.left = Some(x);
    y.recalc();
    *link = Some(y);
}

/// Restore the balance invariant at `link` after a child subtree changed.
/// The classic four cases: when the heavy child leans the opposite way,
/// rotate it into line first, then rotate `link` itself.
fn rebalance<K, V>(link: &mut Link<K, V>) {
    let bf = match link {
        Some(node) => {
            node.recalc();
            node.balance()
        }
        None => return,
    };
    if bf > 1 {
        if let Some(node) = link {
            if child_balance(&node.left) < 0 {
                rotate_left(&mut node.left);
            }
        }
        rotate_right(link);
    } else if bf < -1 {
        if let Some(node) = link {
            if child_balance(&node.right) > 0 {
                rotate_right(&mut node.right);
            }
        }
        rotate_left(link);
    }
}

/// Insert along the search path; hands `(key, value)` back on a duplicate.
fn insert_rec<K, V, C: Comparator<K>>(
    cmp: &C,
    link: &mut Link<K, V>,
    key: K,
    value: V,
) -> Option<(K, V)> {
    let Some(node) = link else {
        *link = Some(Box::new(Node::new(key, value)));
        return None;
    };
    let rejected = match cmp.cmp(&key, &node.key) {
        Ordering::Less => insert_rec(cmp, &mut node.left, key, value),
        Ordering::Greater => insert_rec(cmp, &mut node.right, key, value),
        Ordering::Equal => return Some((key, value)),
    };
    if rejected.is_none() {
        rebalance(link);
    }
    rejected
}

/// Detach and return the smallest entry of the subtree at `link`,
/// rebalancing the descent path on the way back up.
fn pop_min<K, V>(link: &mut Link<K, V>) -> Option<(K, V)> {
    let has_left = match link {
        Some(node) => node.left.is_some(),
        None => return None,
    };
    if has_left {
        let entry = match link {
            Some(node) => pop_min(&mut node.left),
            None => None,
        };
        rebalance(link);
        entry
    } else {
        let mut node = link.take()?;
        *link = node.right.take();
        Some((node.key, node.value))
    }
}

fn remove_rec<K, V, C: Comparator<K>>(cmp: &C, link: &mut Link<K, V>, key: &K) -> bool {
    let Some(node) = link else { return false };
    let removed = match cmp.cmp(key, &node.key) {
        Ordering::Less => remove_rec(cmp, &mut node.left, key),
        Ordering::Greater => remove_rec(cmp, &mut node.right, key),
        Ordering::Equal => {
            if node.left.is_some() && node.right.is_some() {
                // Two children: take over the in-order successor's entry,
                // which pop_min splices out of the right subtree.
                if let Some((k, v)) = pop_min(&mut node.right) {
                    node.key = k;
                    node.value = v;
                }
                true
            } else {
                // Zero or one child: splice this node out directly. The
                // surviving child subtree is untouched, so only ancestors
                // need rebalancing.
                let child = node.left.take().or_else(|| node.right.take());
                *link = child;
                return true;
            }
        }
    };
    if removed {
        rebalance(link);
    }
    removed
}

/// An ordered map with O(log n) insert/remove/find and 1-indexed
/// positional select.
pub struct AvlMap<K, V, C: Comparator<K> = NaturalOrder> {
    root: Link<K, V>,
    cmp: C,
}

impl<K: Ord, V> AvlMap<K, V> {
    /// Create an empty map ordered by the key's `Ord`.
    pub fn new() -> AvlMap<K, V> {
        AvlMap {
            root: None,
            cmp: NaturalOrder,
        }
    }
}

impl<K: Ord, V> Default for AvlMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C: Comparator<K>> AvlMap<K, V, C> {
    /// Create an empty map with an explicit comparison strategy.
    pub fn with_comparator(cmp: C) -> AvlMap<K, V, C> {
        AvlMap { root: None, cmp }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        size(&self.root)
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Insert an entry. Returns false (and changes nothing) if the key is
    /// already present.
    pub fn insert(&mut self, key: K, value: V) -> bool {
        insert_rec(&self.cmp, &mut self.root, key, value).is_none()
    }

    /// Remove the entry for `key`. Returns false if it was absent.
    pub fn remove(&mut self, key: &K) -> bool {
        remove_rec(&self.cmp, &mut self.root, key)
    }

    /// Look up the value stored for `key`.
    pub fn find(&self, key: &K) -> Option<&V> {
        let mut cur = &self.root;
        while let Some(node) = cur {
            match self.cmp.cmp(key, &node.key) {
                Ordering::Less => cur = &node.left,
                Ordering::Greater => cur = &node.right,
                Ordering::Equal => return Some(&node.value),
            }
        }
        None
    }

    /// Look up the value stored for `key`, mutably.
    pub fn find_mut(&mut self, key: &K) -> Option<&mut V> {
        let mut cur = &mut self.root;
        while let Some(node) = cur {
            match self.cmp.cmp(key, &node.key) {
                Ordering::Less => cur = &mut node.left,
                Ordering::Greater => cur = &mut node.right,
                Ordering::Equal => return Some(&mut node.value),
            }
        }
        None
    }

    /// The k-th smallest entry, 1-indexed. `None` outside `[1, len]`.
    pub fn select(&self, k: usize) -> Option<(&K, &V)> {
        if k == 0 || k > self.len() {
            return None;
        }
        let mut remaining = k;
        let mut cur = &self.root;
        while let Some(node) = cur {
            let left = size(&node.left);
            if remaining == left + 1 {
                return Some((&node.key, &node.value));
            }
            if remaining <= left {
                cur = &node.left;
            } else {
                remaining -= left + 1;
                cur = &node.right;
            }
        }
        None
    }

    /// Drop every entry without recursing: rotate the left child up until
    /// there is none, then detach the (now childless on the left) node and
    /// continue into the right subtree. O(n) work, O(1) auxiliary stack.
    pub fn clear(&mut self) {
        let mut cur = self.root.take();
        while let Some(mut node) = cur {
            match node.left.take() {
                Some(mut l) => {
                    node.left = l.right.take();
                    l.right = Some(node);
                    cur = Some(l);
                }
                None => {
                    cur = node.right.take();
                }
            }
        }
    }
}

impl<K, V, C: Comparator<K>> Drop for AvlMap<K, V, C> {
    fn drop(&mut self) {
        self.clear();
    }
}
