//! Meld - mergeable, rankable groups with O(1) merges.
//!
//! A `Meld` holds a dynamic population of members organized into blocks.
//! Blocks clash (every member fights), merge irreversibly (one block
//! absorbs another), and rank against each other by accumulated aura.
//! Per-member history (total fights, chronological ability prefix) is
//! answered in closed form from union-find potentials, so no operation
//! ever walks a block's member list.
//!
//! # Quick Start
//!
//! ```
//! use meld::ability::Power;
//! use meld::manager::Meld;
//!
//! let mut meld: Meld = Meld::new();
//!
//! meld.add_block(1)?;
//! meld.add_block(2)?;
//! meld.add_member(10, 1, Power(5), 20, 0)?;
//! meld.add_member(11, 2, Power(3), 8, 0)?;
//!
//! // block 1 outweighs block 2 and absorbs it
//! meld.force_merge(1, 2)?;
//! assert_eq!(meld.block_at_rank(1)?, 1);
//! assert_eq!(meld.member_fights(11)?, 0);
//! # Ok::<(), meld::error::Error>(())
//! ```

pub mod ability;
pub mod avl;
pub mod dsu;
pub mod error;
pub mod hash_index;
pub mod manager;
