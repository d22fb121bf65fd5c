//! Integer-keyed hash index with chained buckets.
//!
//! Built for small positive integer identifiers. Bucket counts are drawn
//! from a fixed table of primes that roughly doubles at each step, which
//! keeps the modulus prime and clustering low. Each bucket is a `SmallVec`
//! chain, so the common one-entry bucket stays inline with no extra
//! allocation.
//!
//! Growth happens before an insert would push the load factor past 0.75
//! (`4 * count >= 3 * capacity`), and the new bucket array is reserved
//! fallibly, so an out-of-memory insert returns an error with the index
//! untouched.

use smallvec::SmallVec;

use crate::error::{Error, Result};

/// Bucket counts, roughly doubling. The last entry caps growth.
const PRIMES: &[usize] = &[
    17, 37, 79, 163, 331, 673, 1361, 2729, 5471, 10949, 21911, 43853, 87719, 175447, 350899,
    701819, 1403641, 2807303, 5614657, 11229331, 22458671, 44917381, 89834777, 179669557,
];

/// Smallest table prime at or above `min`.
fn next_prime(min: usize) -> usize {
    for &p in PRIMES {
        if p >= min {
            return p;
        }
    }
    PRIMES[PRIMES.len() - 1]
}

/// Integer avalanche mixer (multiply/xor-shift), good enough for ids.
fn mix(x: u32) -> u32 {
    let mut x = x;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

struct Entry<V> {
    key: i32,
    value: V,
}

type Bucket<V> = SmallVec<[Entry<V>; 1]>;

/// A chained hash map from `i32` ids to values.
pub struct HashIndex<V> {
    buckets: Vec<Bucket<V>>,
    count: usize,
}

impl<V> HashIndex<V> {
    /// Create an empty index at the smallest table capacity.
    pub fn new() -> HashIndex<V> {
        let capacity = next_prime(17);
        let mut buckets = Vec::with_capacity(capacity);
        buckets.resize_with(capacity, SmallVec::new);
        HashIndex { buckets, count: 0 }
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.count
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn bucket_of(&self, key: i32) -> usize {
        mix(key as u32) as usize % self.buckets.len()
    }

    /// Look up the value stored for `key`.
    pub fn find(&self, key: i32) -> Option<&V> {
        let bucket = &self.buckets[self.bucket_of(key)];
        bucket.iter().find(|e| e.key == key).map(|e| &e.value)
    }

    /// Look up the value stored for `key`, mutably.
    pub fn find_mut(&mut self, key: i32) -> Option<&mut V> {
        let idx = self.bucket_of(key);
        self.buckets[idx]
            .iter_mut()
            .find(|e| e.key == key)
            .map(|e| &mut e.value)
    }

    /// Insert an entry. `Ok(false)` (no mutation) if the key is already
    /// present; `Err(OutOfMemory)` if the table needed to grow and could
    /// not.
    pub fn insert(&mut self, key: i32, value: V) -> Result<bool> {
        if self.find(key).is_some() {
            return Ok(false);
        }
        if 4 * (self.count + 1) >= 3 * self.buckets.len() {
            let target = next_prime(self.buckets.len() * 2);
            if target > self.buckets.len() {
                self.rehash(target)?;
            }
        }
        let idx = self.bucket_of(key);
        self.buckets[idx].insert(0, Entry { key, value });
        self.count += 1;
        Ok(true)
    }

    /// Remove the entry for `key`. Returns false if it was absent.
    pub fn remove(&mut self, key: i32) -> bool {
        let idx = self.bucket_of(key);
        let bucket = &mut self.buckets[idx];
        match bucket.iter().position(|e| e.key == key) {
            Some(pos) => {
                bucket.remove(pos);
                self.count -= 1;
                true
            }
            None => false,
        }
    }

    /// Re-bucket every entry under `new_capacity`. Count is unchanged.
    fn rehash(&mut self, new_capacity: usize) -> Result<()> {
        let mut fresh: Vec<Bucket<V>> = Vec::new();
        fresh.try_reserve(new_capacity).map_err(|_| Error::OutOfMemory)?;
        fresh.resize_with(new_capacity, SmallVec::new);

        let old = std::mem::replace(&mut self.buckets, fresh);
        for bucket in old {
            for entry in bucket {
                let idx = mix(entry.key as u32) as usize % self.buckets.len();
                self.buckets[idx].insert(0, entry);
            }
        }
        Ok(())
    }
}

impl<V> Default for HashIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}
