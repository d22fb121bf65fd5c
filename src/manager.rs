//! The `Meld` manager: blocks, members, clashes, and forced merges.
//!
//! `Meld` owns every structure: the block arena (union-find), the member
//! arena, two id hash indices, and the rank map ordered by (aura, id).
//! Key design decisions:
//!
//! 1. **Validation first**: every operation checks its arguments before
//!    touching state, so an `InvalidInput` or `Failed` return never leaves
//!    a partial mutation behind.
//!
//! 2. **Remove, mutate, reinsert**: the rank map's key is derived from a
//!    root's mutable `aura_sum`, so any operation that changes it takes
//!    the entry out first and reinserts it under the new key afterwards.
//!    Doing it in any other order silently corrupts the map's ordering.
//!
//! 3. **Members are write-once**: a member records three scalars at join
//!    time (`base_fights`, `prefix_at_join`, its own ability) plus the
//!    block it joined. Every historical query is answered in closed form
//!    from those plus the union-find state; no clash or merge ever visits
//!    a member.
//!
//! 4. **Queries take `&mut self`** where they resolve union-find paths,
//!    since resolution compresses as it goes.

use crate::ability::{Ability, Power};
use crate::avl::AvlMap;
use crate::dsu::{BlockArena, BlockRef};
use crate::error::{Error, Result};
use crate::hash_index::HashIndex;

/// Composite rank key: aura total first, block id as tie-break.
/// The derived `Ord` gives exactly that lexicographic ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScoreKey {
    pub aura: i64,
    pub block: i32,
}

/// Result of a clash between two blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Scores and ability sums both tied; each side gains 1 experience.
    Draw = 0,
    /// The first block won on experience + aura (+3 experience).
    FirstByScore = 1,
    /// Scores tied; the first block won on ability sum (+3 experience).
    FirstByAbility = 2,
    /// The second block won on experience + aura (+3 experience).
    SecondByScore = 3,
    /// Scores tied; the second block won on ability sum (+3 experience).
    SecondByAbility = 4,
}

/// Index of a member in the member arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MemberRef(u32);

impl MemberRef {
    fn index(self) -> usize {
        return self.0 as usize;
    }
}

/// A member's immutable record: fixed at join, never touched again.
struct Member<A> {
    ability: A,
    /// Fight count relative to the joined root's lazy counter, fixed so
    /// that `base_fights + fight_potential(home)` is the true total.
    base_fights: i64,
    /// The root's accumulated ability sum just before this member joined.
    prefix_at_join: A,
    /// The block joined at creation; may since have been merged under
    /// another root, but is never deallocated while the manager lives.
    home: BlockRef,
}

/// The engine: a dynamic population of members in mergeable, rankable
/// blocks.
///
/// All state lives here; dropping the `Meld` frees every block and member.
pub struct Meld<A: Ability = Power> {
    blocks: BlockArena<A>,
    members: Vec<Member<A>>,
    block_ids: HashIndex<BlockRef>,
    member_ids: HashIndex<MemberRef>,
    by_score: AvlMap<ScoreKey, BlockRef>,
}

impl<A: Ability> Meld<A> {
    /// Create an empty engine.
    pub fn new() -> Meld<A> {
        return Meld {
            blocks: BlockArena::new(),
            members: Vec::new(),
            block_ids: HashIndex::new(),
            member_ids: HashIndex::new(),
            by_score: AvlMap::new(),
        };
    }

    /// Number of blocks still addressable by id.
    pub fn block_count(&self) -> usize {
        return self.block_ids.len();
    }

    /// Number of members ever added.
    pub fn member_count(&self) -> usize {
        return self.members.len();
    }

    /// Whether a member id is known (living or not).
    pub fn has_member(&self, member_id: i32) -> bool {
        return self.member_ids.find(member_id).is_some();
    }

    /// Create an empty block. Fails if the id is already taken.
    pub fn add_block(&mut self, block_id: i32) -> Result<()> {
        if block_id <= 0 {
            return Err(Error::InvalidInput);
        }
        if self.block_ids.find(block_id).is_some() {
            return Err(Error::Failed);
        }

        let block = self.blocks.alloc(block_id)?;
        self.block_ids.insert(block_id, block)?;
        let _ = self.by_score.insert(
            ScoreKey {
                aura: 0,
                block: block_id,
            },
            block,
        );
        return Ok(());
    }

    /// Remove a block: it loses its rank entry and its id, and its
    /// union-find root is marked dead, which kills every member that
    /// resolves to it. No member record is visited.
    pub fn remove_block(&mut self, block_id: i32) -> Result<()> {
        if block_id <= 0 {
            return Err(Error::InvalidInput);
        }
        let Some(&block) = self.block_ids.find(block_id) else {
            return Err(Error::Failed);
        };

        let aura = self.blocks.get(block).aura_sum;
        let _ = self.by_score.remove(&ScoreKey {
            aura,
            block: block_id,
        });
        self.block_ids.remove(block_id);

        let root = self.blocks.resolve_root(block);
        self.blocks.get_mut(root).alive = false;
        return Ok(());
    }

    /// Add a member to a block. `prior_fights` is the fight count the
    /// member brings along; it is folded into `base_fights` so the very
    /// first `member_fights` query already reports it.
    pub fn add_member(
        &mut self,
        member_id: i32,
        block_id: i32,
        ability: A,
        aura: i64,
        prior_fights: i64,
    ) -> Result<()> {
        if member_id <= 0 || block_id <= 0 || !ability.is_valid() || aura < 0 || prior_fights < 0 {
            return Err(Error::InvalidInput);
        }
        if self.member_ids.find(member_id).is_some() {
            return Err(Error::Failed);
        }
        let Some(&block) = self.block_ids.find(block_id) else {
            return Err(Error::Failed);
        };
        let root = self.blocks.resolve_root(block);
        if !self.blocks.get(root).alive {
            return Err(Error::Failed);
        }

        // All fallible allocation happens before the rank entry comes
        // out, so an out-of-memory return leaves the map intact.
        self.members.try_reserve(1).map_err(|_| Error::OutOfMemory)?;
        let member = MemberRef(self.members.len() as u32);
        self.member_ids.insert(member_id, member)?;

        let old_key = ScoreKey {
            aura: self.blocks.get(root).aura_sum,
            block: self.blocks.get(root).id,
        };
        let _ = self.by_score.remove(&old_key);

        let base_fights = prior_fights - self.blocks.fight_potential(root);
        let prefix_at_join = self.blocks.get(root).ability_sum;
        self.members.push(Member {
            ability,
            base_fights,
            prefix_at_join,
            home: root,
        });

        let b = self.blocks.get_mut(root);
        b.member_count += 1;
        b.aura_sum += aura;
        b.ability_sum = b.ability_sum + ability;
        let new_key = ScoreKey {
            aura: b.aura_sum,
            block: b.id,
        };
        let _ = self.by_score.insert(new_key, root);
        return Ok(());
    }

    /// A clash between two blocks. Higher `experience + aura_sum` wins
    /// (+3 experience); a score tie falls to the ability sums (+3); a
    /// full tie gives +1 to both. Either way every member of both blocks
    /// fought once, applied lazily at the roots in O(1).
    pub fn clash(&mut self, first_id: i32, second_id: i32) -> Result<Outcome> {
        if first_id <= 0 || second_id <= 0 || first_id == second_id {
            return Err(Error::InvalidInput);
        }
        let Some(&first) = self.block_ids.find(first_id) else {
            return Err(Error::Failed);
        };
        let Some(&second) = self.block_ids.find(second_id) else {
            return Err(Error::Failed);
        };

        let a = self.blocks.resolve_root(first);
        let b = self.blocks.resolve_root(second);
        {
            let (fa, fb) = (self.blocks.get(a), self.blocks.get(b));
            if !fa.alive || !fb.alive {
                return Err(Error::Failed);
            }
            if fa.member_count == 0 || fb.member_count == 0 {
                return Err(Error::Failed);
            }
        }

        let score_a = self.blocks.get(a).experience + self.blocks.get(a).aura_sum;
        let score_b = self.blocks.get(b).experience + self.blocks.get(b).aura_sum;

        let outcome = if score_a > score_b {
            self.blocks.get_mut(a).experience += 3;
            Outcome::FirstByScore
        } else if score_b > score_a {
            self.blocks.get_mut(b).experience += 3;
            Outcome::SecondByScore
        } else {
            let sum_a = self.blocks.get(a).ability_sum;
            let sum_b = self.blocks.get(b).ability_sum;
            if sum_a > sum_b {
                self.blocks.get_mut(a).experience += 3;
                Outcome::FirstByAbility
            } else if sum_b > sum_a {
                self.blocks.get_mut(b).experience += 3;
                Outcome::SecondByAbility
            } else {
                self.blocks.get_mut(a).experience += 1;
                self.blocks.get_mut(b).experience += 1;
                Outcome::Draw
            }
        };

        self.blocks.get_mut(a).lazy_fights += 1;
        self.blocks.get_mut(b).lazy_fights += 1;
        return Ok(outcome);
    }

    /// Total fights a member has seen: its join-time base plus the lazy
    /// potential accumulated by its block's merge history. Answers even
    /// for members of removed blocks; the history is still well-defined.
    pub fn member_fights(&mut self, member_id: i32) -> Result<i64> {
        if member_id <= 0 {
            return Err(Error::InvalidInput);
        }
        let Some(&member) = self.member_ids.find(member_id) else {
            return Err(Error::Failed);
        };

        let m = &self.members[member.index()];
        let (home, base) = (m.home, m.base_fights);
        return Ok(base + self.blocks.fight_potential(home));
    }

    /// A live block's experience total.
    pub fn block_experience(&mut self, block_id: i32) -> Result<i64> {
        if block_id <= 0 {
            return Err(Error::InvalidInput);
        }
        let Some(&block) = self.block_ids.find(block_id) else {
            return Err(Error::Failed);
        };

        let root = self.blocks.resolve_root(block);
        let b = self.blocks.get(root);
        if !b.alive {
            return Err(Error::Failed);
        }
        return Ok(b.experience);
    }

    /// Id of the block at the given 1-indexed rank, ascending by
    /// (aura total, id).
    pub fn block_at_rank(&self, rank: i32) -> Result<i32> {
        if rank < 1 || rank as usize > self.by_score.len() {
            return Err(Error::Failed);
        }
        let Some((key, _)) = self.by_score.select(rank as usize) else {
            return Err(Error::Failed);
        };
        return Ok(key.block);
    }

    /// A member's accumulated ability standing: everything that preceded
    /// it chronologically (within its block and through every merge its
    /// block was on the losing side of) plus its own contribution.
    /// Requires a live root.
    pub fn member_ability(&mut self, member_id: i32) -> Result<A> {
        if member_id <= 0 {
            return Err(Error::InvalidInput);
        }
        let Some(&member) = self.member_ids.find(member_id) else {
            return Err(Error::Failed);
        };

        let m = &self.members[member.index()];
        let (home, prefix, own) = (m.home, m.prefix_at_join, m.ability);

        let root = self.blocks.resolve_root(home);
        if !self.blocks.get(root).alive {
            return Err(Error::Failed);
        }

        let shift = self.blocks.prefix_shift(home);
        return Ok(prefix + shift + own);
    }

    /// Irreversible directed merge: the forcing block absorbs the forced
    /// one. Requires a non-empty forcing block and, when the forced block
    /// is non-empty, strictly greater combined strength
    /// (`experience + aura + effective ability`). Afterwards the forced
    /// id is no longer addressable; its members answer queries through
    /// the union-find.
    pub fn force_merge(&mut self, forcing_id: i32, forced_id: i32) -> Result<()> {
        if forcing_id <= 0 || forced_id <= 0 || forcing_id == forced_id {
            return Err(Error::InvalidInput);
        }
        let Some(&forcing) = self.block_ids.find(forcing_id) else {
            return Err(Error::Failed);
        };
        let Some(&forced) = self.block_ids.find(forced_id) else {
            return Err(Error::Failed);
        };

        let a = self.blocks.resolve_root(forcing);
        let b = self.blocks.resolve_root(forced);

        let (key_a, key_b);
        {
            let (fa, fb) = (self.blocks.get(a), self.blocks.get(b));
            if !fa.alive || !fb.alive {
                return Err(Error::Failed);
            }
            if fa.member_count == 0 {
                return Err(Error::Failed);
            }
            if fb.member_count != 0 {
                let forcing_strength = fa.experience + fa.aura_sum + fa.ability_sum.effective();
                let forced_strength = fb.experience + fb.aura_sum + fb.ability_sum.effective();
                // strictly greater, ties do not force
                if forcing_strength <= forced_strength {
                    return Err(Error::Failed);
                }
            }
            key_a = ScoreKey {
                aura: fa.aura_sum,
                block: fa.id,
            };
            key_b = ScoreKey {
                aura: fb.aura_sum,
                block: fb.id,
            };
        }

        let _ = self.by_score.remove(&key_a);
        let _ = self.by_score.remove(&key_b);

        self.blocks.link(a, b);
        self.block_ids.remove(forced_id);

        let merged = self.blocks.get(a);
        let _ = self.by_score.insert(
            ScoreKey {
                aura: merged.aura_sum,
                block: merged.id,
            },
            a,
        );
        return Ok(());
    }
}

impl<A: Ability> Default for Meld<A> {
    fn default() -> Self {
        return Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Meld {
        return Meld::new();
    }

    #[test]
    fn add_block_validates_id() {
        let mut m = engine();
        assert_eq!(m.add_block(0), Err(Error::InvalidInput));
        assert_eq!(m.add_block(-3), Err(Error::InvalidInput));
        assert_eq!(m.add_block(1), Ok(()));
        assert_eq!(m.add_block(1), Err(Error::Failed));
    }

    #[test]
    fn add_member_validations() {
        let mut m = engine();
        m.add_block(1).unwrap();

        assert_eq!(m.add_member(0, 1, Power(1), 0, 0), Err(Error::InvalidInput));
        assert_eq!(m.add_member(10, 0, Power(1), 0, 0), Err(Error::InvalidInput));
        assert_eq!(m.add_member(10, 1, Power(-1), 0, 0), Err(Error::InvalidInput));
        assert_eq!(m.add_member(10, 1, Power(1), -5, 0), Err(Error::InvalidInput));
        assert_eq!(m.add_member(10, 1, Power(1), 0, -1), Err(Error::InvalidInput));
        assert_eq!(m.add_member(10, 9, Power(1), 0, 0), Err(Error::Failed));

        assert_eq!(m.add_member(10, 1, Power(1), 0, 0), Ok(()));
        assert_eq!(m.add_member(10, 1, Power(1), 0, 0), Err(Error::Failed));
    }

    #[test]
    fn prior_fights_count_from_the_start() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_member(10, 1, Power(1), 0, 7).unwrap();
        assert_eq!(m.member_fights(10), Ok(7));
    }

    #[test]
    fn clash_second_wins_on_aura() {
        // The worked example: block 2 wins on aura 7 vs 5.
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(1), 5, 0).unwrap();
        m.add_member(11, 2, Power(1), 7, 0).unwrap();

        assert_eq!(m.clash(1, 2), Ok(Outcome::SecondByScore));
        assert_eq!(m.block_experience(2), Ok(3));
        assert_eq!(m.block_experience(1), Ok(0));
        assert_eq!(m.member_fights(10), Ok(1));
        assert_eq!(m.member_fights(11), Ok(1));
    }

    #[test]
    fn clash_tie_breaks_on_ability_then_draw() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(9), 5, 0).unwrap();
        m.add_member(11, 2, Power(2), 5, 0).unwrap();

        // equal scores, block 1 has the bigger ability sum
        assert_eq!(m.clash(1, 2), Ok(Outcome::FirstByAbility));
        assert_eq!(m.block_experience(1), Ok(3));

        // now block 1 is ahead on score outright
        assert_eq!(m.clash(2, 1), Ok(Outcome::SecondByScore));

        let mut d = engine();
        d.add_block(1).unwrap();
        d.add_block(2).unwrap();
        d.add_member(10, 1, Power(4), 5, 0).unwrap();
        d.add_member(11, 2, Power(4), 5, 0).unwrap();
        assert_eq!(d.clash(1, 2), Ok(Outcome::Draw));
        assert_eq!(d.block_experience(1), Ok(1));
        assert_eq!(d.block_experience(2), Ok(1));
    }

    #[test]
    fn clash_rejects_bad_pairs() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();

        assert_eq!(m.clash(1, 1), Err(Error::InvalidInput));
        assert_eq!(m.clash(-1, 2), Err(Error::InvalidInput));
        assert_eq!(m.clash(1, 3), Err(Error::Failed));
        // both blocks empty
        assert_eq!(m.clash(1, 2), Err(Error::Failed));

        m.add_member(10, 1, Power(1), 5, 0).unwrap();
        // one side still empty
        assert_eq!(m.clash(1, 2), Err(Error::Failed));
    }

    #[test]
    fn force_merge_worked_example() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(1), 5, 0).unwrap();
        m.add_member(11, 2, Power(1), 7, 0).unwrap();
        m.clash(1, 2).unwrap();

        // block 2: exp 3 + aura 7 + ability 1 = 11 > block 1: 0 + 5 + 1
        assert_eq!(m.force_merge(2, 1), Ok(()));

        // block 1 no longer addressable
        assert_eq!(m.block_experience(1), Err(Error::Failed));
        assert_eq!(m.force_merge(2, 1), Err(Error::Failed));

        // member 10's history is intact through the union-find
        assert_eq!(m.member_fights(10), Ok(1));
        assert_eq!(m.block_at_rank(1), Ok(2));
        assert_eq!(m.block_experience(2), Ok(3));
    }

    #[test]
    fn force_merge_requires_strict_inequality() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(2), 5, 0).unwrap();
        m.add_member(11, 2, Power(2), 5, 0).unwrap();

        // identical strength on both sides: neither direction forces
        assert_eq!(m.force_merge(1, 2), Err(Error::Failed));
        assert_eq!(m.force_merge(2, 1), Err(Error::Failed));
    }

    #[test]
    fn force_merge_into_empty_block() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(1), 5, 0).unwrap();

        // empty forcing block never forces
        assert_eq!(m.force_merge(2, 1), Err(Error::Failed));
        // non-empty forcing an empty block needs no inequality
        assert_eq!(m.force_merge(1, 2), Ok(()));
        assert_eq!(m.block_experience(2), Err(Error::Failed));
        assert_eq!(m.block_at_rank(1), Ok(1));
    }

    #[test]
    fn merged_members_keep_ability_prefix() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(10), 50, 0).unwrap();
        m.add_member(11, 2, Power(3), 1, 0).unwrap();

        // within-block prefix: second joiner sits after the first
        m.add_member(12, 2, Power(4), 1, 0).unwrap();
        assert_eq!(m.member_ability(11), Ok(Power(3)));
        assert_eq!(m.member_ability(12), Ok(Power(7)));

        // 1 forces 2: all of block 1 precedes all of block 2
        m.force_merge(1, 2).unwrap();
        assert_eq!(m.member_ability(10), Ok(Power(10)));
        assert_eq!(m.member_ability(11), Ok(Power(13)));
        assert_eq!(m.member_ability(12), Ok(Power(17)));
    }

    #[test]
    fn remove_block_kills_members_transitively() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(5), 10, 0).unwrap();
        m.add_member(11, 2, Power(5), 1, 0).unwrap();
        m.force_merge(1, 2).unwrap();

        m.remove_block(1).unwrap();

        // live-root queries fail for members on both sides of the merge
        assert_eq!(m.member_ability(10), Err(Error::Failed));
        assert_eq!(m.member_ability(11), Err(Error::Failed));
        assert_eq!(m.block_experience(1), Err(Error::Failed));

        // but the members are still known, and their fight history reads
        assert!(m.has_member(10));
        assert!(m.has_member(11));
        assert_eq!(m.member_fights(10), Ok(0));
        assert_eq!(m.member_fights(11), Ok(0));
    }

    #[test]
    fn rank_tracks_aura_changes() {
        let mut m = engine();
        for id in 1..=3 {
            m.add_block(id).unwrap();
        }
        // all empty: ranked by id at aura 0
        assert_eq!(m.block_at_rank(1), Ok(1));
        assert_eq!(m.block_at_rank(3), Ok(3));

        m.add_member(10, 1, Power(1), 5, 0).unwrap();
        m.add_member(11, 3, Power(1), 2, 0).unwrap();

        // block 2 (aura 0) < block 3 (aura 2) < block 1 (aura 5)
        assert_eq!(m.block_at_rank(1), Ok(2));
        assert_eq!(m.block_at_rank(2), Ok(3));
        assert_eq!(m.block_at_rank(3), Ok(1));

        assert_eq!(m.block_at_rank(0), Err(Error::Failed));
        assert_eq!(m.block_at_rank(4), Err(Error::Failed));
        assert_eq!(m.block_at_rank(-1), Err(Error::Failed));
    }

    #[test]
    fn removed_block_leaves_rank_map() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.remove_block(1).unwrap();

        assert_eq!(m.block_at_rank(1), Ok(2));
        assert_eq!(m.block_at_rank(2), Err(Error::Failed));
        assert_eq!(m.remove_block(1), Err(Error::Failed));
        // the freed id can be reused
        assert_eq!(m.add_block(1), Ok(()));
    }

    #[test]
    fn dead_root_rejects_new_members() {
        let mut m = engine();
        m.add_block(1).unwrap();
        m.add_block(2).unwrap();
        m.add_member(10, 1, Power(5), 10, 0).unwrap();
        m.force_merge(1, 2).unwrap();
        m.remove_block(1).unwrap();

        // block 2's id is gone (merged), block 1's root is dead
        assert_eq!(m.add_member(11, 2, Power(1), 0, 0), Err(Error::Failed));
        assert_eq!(m.add_member(11, 1, Power(1), 0, 0), Err(Error::Failed));
    }

    #[test]
    fn merge_chain_keeps_fight_counts_exact() {
        let mut m = engine();
        for id in 1..=3 {
            m.add_block(id).unwrap();
            m.add_member(id + 10, id, Power(1), (4 - id) as i64 * 10, 0).unwrap();
        }
        // auras: block 1 = 30, block 2 = 20, block 3 = 10

        m.clash(1, 2).unwrap(); // members 11, 12 at 1 fight
        m.force_merge(1, 2).unwrap();
        m.clash(1, 3).unwrap(); // members 11, 12, 13 all fought once more
        m.force_merge(1, 3).unwrap();

        assert_eq!(m.member_fights(11), Ok(2));
        assert_eq!(m.member_fights(12), Ok(2));
        assert_eq!(m.member_fights(13), Ok(1));

        // one combined block remains
        assert_eq!(m.block_count(), 1);
        assert_eq!(m.block_at_rank(1), Ok(1));
        assert_eq!(m.block_at_rank(2), Err(Error::Failed));
    }
}
