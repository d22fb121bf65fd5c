//! Block records and the union-find that merges them.
//!
//! A block is both a group of members and a union-find node. Merges are
//! directed: the forced block is attached under the forcing block and its
//! aggregates are folded into the new root, so a merge costs O(1) no
//! matter how many members the blocks hold. Key design decisions:
//!
//! 1. **Arena indices, not pointers**: blocks live in a `Vec` owned by the
//!    arena and reference each other by [`BlockRef`]. The parent link is a
//!    plain structural index; the arena itself is the ownership list and
//!    frees everything when dropped.
//!
//! 2. **Lazy potentials**: a root carries `lazy_fights`, a "+1 fight for
//!    everyone under me" counter bumped once per clash. When a root is
//!    attached under another, it records offsets (`fight_offset`,
//!    `prefix_offset`) chosen so that every member's closed-form answer is
//!    unchanged by the merge. Per-member state is never touched.
//!
//! 3. **Path compression with offset folding**: [`BlockArena::resolve_root`]
//!    repoints every node on the walked path directly at the root, folding
//!    the parent's (already root-relative) offsets into the node first.
//!    The fold happens nearest-root first, which makes repeated calls
//!    idempotent: after compression a node's offsets are exactly its
//!    offsets to the root.
//!
//! Invariant: for a node `x` with root `r`, the total lazy fight count
//! that applies to members joined at `x` is `r.lazy_fights` plus the sum
//! of `fight_offset` along the path from `x` to `r`; analogously for the
//! ability prefix. Compression preserves both sums exactly.

use smallvec::SmallVec;

use crate::ability::Ability;
use crate::error::{Error, Result};

/// Index of a block in its arena. Copyable, structurally non-owning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockRef(u32);

impl BlockRef {
    fn index(self) -> usize {
        return self.0 as usize;
    }
}

/// A group of members; simultaneously a union-find node.
///
/// The aggregate fields (`experience`, `member_count`, `aura_sum`,
/// `ability_sum`) are authoritative only while the block is a root.
pub struct Block<A> {
    pub id: i32,
    pub alive: bool,
    pub experience: i64,
    pub member_count: i64,
    pub aura_sum: i64,
    pub ability_sum: A,
    /// Root lazy counter: fights applied to every member under this root.
    pub lazy_fights: i64,
    parent: Option<BlockRef>,
    fight_offset: i64,
    prefix_offset: A,
}

impl<A> Block<A> {
    /// Whether this block is currently a union-find root.
    pub fn is_root(&self) -> bool {
        return self.parent.is_none();
    }
}

/// Owning arena of every allocated block, plus the union-find operations.
pub struct BlockArena<A> {
    blocks: Vec<Block<A>>,
}

impl<A: Ability> BlockArena<A> {
    pub fn new() -> BlockArena<A> {
        return BlockArena { blocks: Vec::new() };
    }

    /// Number of allocated blocks (roots and attached alike).
    pub fn len(&self) -> usize {
        return self.blocks.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.blocks.is_empty();
    }

    /// Allocate a fresh live root block with zeroed aggregates.
    pub fn alloc(&mut self, id: i32) -> Result<BlockRef> {
        self.blocks.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        let block = BlockRef(self.blocks.len() as u32);
        self.blocks.push(Block {
            id,
            alive: true,
            experience: 0,
            member_count: 0,
            aura_sum: 0,
            ability_sum: A::zero(),
            lazy_fights: 0,
            parent: None,
            fight_offset: 0,
            prefix_offset: A::zero(),
        });
        return Ok(block);
    }

    pub fn get(&self, block: BlockRef) -> &Block<A> {
        return &self.blocks[block.index()];
    }

    pub fn get_mut(&mut self, block: BlockRef) -> &mut Block<A> {
        return &mut self.blocks[block.index()];
    }

    /// Find the root of `x`, compressing the walked path.
    ///
    /// Compression folds each node's parent offsets into the node before
    /// repointing it at the root. Nodes are processed from the root side
    /// outward so a parent's offsets are already root-relative when its
    /// child folds them in; the offset sum along any path to the root is
    /// preserved exactly.
    pub fn resolve_root(&mut self, x: BlockRef) -> BlockRef {
        let mut path: SmallVec<[BlockRef; 16]> = SmallVec::new();
        let mut cur = x;
        while let Some(parent) = self.blocks[cur.index()].parent {
            path.push(cur);
            cur = parent;
        }
        let root = cur;

        for &node in path.iter().rev() {
            let Some(parent) = self.blocks[node.index()].parent else {
                continue;
            };
            let (parent_fights, parent_prefix) = {
                let p = &self.blocks[parent.index()];
                (p.fight_offset, p.prefix_offset)
            };
            let n = &mut self.blocks[node.index()];
            n.fight_offset += parent_fights;
            n.prefix_offset = n.prefix_offset + parent_prefix;
            n.parent = Some(root);
        }
        return root;
    }

    /// Total lazy fight count applicable to members joined at `x`:
    /// the root's lazy counter plus `x`'s (compressed) offset to it.
    pub fn fight_potential(&mut self, x: BlockRef) -> i64 {
        let root = self.resolve_root(x);
        return self.blocks[root.index()].lazy_fights + self.blocks[x.index()].fight_offset;
    }

    /// Total ability prefix shift applicable to members joined at `x`.
    pub fn prefix_shift(&mut self, x: BlockRef) -> A {
        self.resolve_root(x);
        return self.blocks[x.index()].prefix_offset;
    }

    /// Directed union: attach root `b` under root `a` and fold `b`'s
    /// aggregates into `a`. Never the reverse; the caller decides the
    /// direction.
    ///
    /// `b`'s offsets are fixed so existing answers are preserved:
    /// members under `b` previously counted `b.lazy_fights` lazy fights,
    /// and will now count `a.lazy_fights + b.fight_offset`; all of `a`'s
    /// members precede all of `b`'s chronologically, so `b`'s subtree
    /// gains `a`'s full accumulated ability sum as a prefix.
    pub fn link(&mut self, a: BlockRef, b: BlockRef) {
        debug_assert!(self.blocks[a.index()].is_root());
        debug_assert!(self.blocks[b.index()].is_root());
        debug_assert!(a != b);

        let (a_lazy, a_sum) = {
            let fa = &self.blocks[a.index()];
            (fa.lazy_fights, fa.ability_sum)
        };

        let (b_experience, b_count, b_aura, b_sum) = {
            let fb = &mut self.blocks[b.index()];
            fb.fight_offset = fb.lazy_fights - a_lazy;
            fb.prefix_offset = a_sum;
            fb.parent = Some(a);
            (fb.experience, fb.member_count, fb.aura_sum, fb.ability_sum)
        };

        let fa = &mut self.blocks[a.index()];
        fa.experience += b_experience;
        fa.member_count += b_count;
        fa.aura_sum += b_aura;
        fa.ability_sum = fa.ability_sum + b_sum;
    }
}

impl<A: Ability> Default for BlockArena<A> {
    fn default() -> Self {
        return Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ability::Power;

    fn arena() -> BlockArena<Power> {
        return BlockArena::new();
    }

    #[test]
    fn fresh_block_is_live_root() {
        let mut blocks = arena();
        let a = blocks.alloc(1).unwrap();
        assert!(blocks.get(a).is_root());
        assert!(blocks.get(a).alive);
        assert_eq!(blocks.resolve_root(a), a);
        assert_eq!(blocks.fight_potential(a), 0);
        assert_eq!(blocks.prefix_shift(a), Power(0));
    }

    #[test]
    fn link_preserves_fight_counts() {
        let mut blocks = arena();
        let a = blocks.alloc(1).unwrap();
        let b = blocks.alloc(2).unwrap();

        // a has seen 5 clashes, b has seen 2
        blocks.get_mut(a).lazy_fights = 5;
        blocks.get_mut(b).lazy_fights = 2;
        blocks.get_mut(a).member_count = 1;
        blocks.get_mut(b).member_count = 1;

        blocks.link(a, b);

        // members under b must still see 2 total
        assert_eq!(blocks.fight_potential(b), 2);
        // members under a still see 5
        assert_eq!(blocks.fight_potential(a), 5);

        // fights after the merge reach both sides
        blocks.get_mut(a).lazy_fights += 1;
        assert_eq!(blocks.fight_potential(b), 3);
        assert_eq!(blocks.fight_potential(a), 6);
    }

    #[test]
    fn link_shifts_ability_prefix() {
        let mut blocks = arena();
        let a = blocks.alloc(1).unwrap();
        let b = blocks.alloc(2).unwrap();

        blocks.get_mut(a).ability_sum = Power(10);
        blocks.get_mut(b).ability_sum = Power(4);

        blocks.link(a, b);

        // b's members now sit after a's 10 accumulated ability
        assert_eq!(blocks.prefix_shift(b), Power(10));
        assert_eq!(blocks.prefix_shift(a), Power(0));
        assert_eq!(blocks.get(a).ability_sum, Power(14));
    }

    #[test]
    fn link_folds_aggregates_into_root() {
        let mut blocks = arena();
        let a = blocks.alloc(1).unwrap();
        let b = blocks.alloc(2).unwrap();

        {
            let fa = blocks.get_mut(a);
            fa.experience = 3;
            fa.member_count = 2;
            fa.aura_sum = 20;
        }
        {
            let fb = blocks.get_mut(b);
            fb.experience = 1;
            fb.member_count = 1;
            fb.aura_sum = 7;
        }

        blocks.link(a, b);

        let fa = blocks.get(a);
        assert_eq!(fa.experience, 4);
        assert_eq!(fa.member_count, 3);
        assert_eq!(fa.aura_sum, 27);
        assert!(!blocks.get(b).is_root());
    }

    #[test]
    fn resolve_is_idempotent() {
        let mut blocks = arena();
        let a = blocks.alloc(1).unwrap();
        let b = blocks.alloc(2).unwrap();
        let c = blocks.alloc(3).unwrap();

        blocks.get_mut(a).lazy_fights = 1;
        blocks.get_mut(b).lazy_fights = 4;
        blocks.get_mut(c).lazy_fights = 9;

        blocks.link(b, c); // c under b
        blocks.link(a, b); // b (and c) under a

        let first = blocks.fight_potential(c);
        let second = blocks.fight_potential(c);
        let third = blocks.fight_potential(c);
        assert_eq!(first, 9);
        assert_eq!(second, first);
        assert_eq!(third, first);
        // path is now compressed flat
        assert_eq!(blocks.resolve_root(c), a);
    }

    #[test]
    fn deep_chain_resolves_without_overflow() {
        // Directed merges can build arbitrarily deep chains; resolution
        // must not recurse on the call stack.
        let mut blocks = arena();
        let n = 100_000;
        let mut refs = Vec::with_capacity(n);
        for i in 0..n {
            let r = blocks.alloc(i as i32 + 1).unwrap();
            blocks.get_mut(r).lazy_fights = i as i64;
            refs.push(r);
        }
        // chain: refs[0] <- refs[1] <- ... <- refs[n-1]
        for i in (1..n).rev() {
            blocks.link(refs[i - 1], refs[i]);
        }
        // the oldest lazy count must survive the whole chain
        assert_eq!(blocks.fight_potential(refs[n - 1]), (n - 1) as i64);
        assert_eq!(blocks.resolve_root(refs[n - 1]), refs[0]);
    }
}
