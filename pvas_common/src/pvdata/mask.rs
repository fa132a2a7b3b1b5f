//! Change masks.

use super::structure::Structure;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

const WORD_BITS: usize = 64;

/// Growable bit set marking which parts of a value changed.
///
/// Bit 0 stands for the whole structure, bit `i + 1` for field `i`.
/// Equality and hashing look at set bits only, not at storage width.
#[derive(Debug, Clone, Default, Eq, Serialize, Deserialize)]
pub struct ChangeMask {
    words: Vec<u64>,
}

impl ChangeMask {
    /// Empty mask.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mask with only bit 0 (whole structure) set.
    pub fn whole() -> Self {
        let mut mask = Self::new();
        mask.set(0);
        mask
    }

    /// Mask with every field bit of `structure` set (bit 0 left clear).
    pub fn all(structure: &Structure) -> Self {
        let mut mask = Self::new();
        for bit in 1..structure.num_bits() {
            mask.set(bit);
        }
        mask
    }

    /// Set a bit.
    pub fn set(&mut self, bit: usize) {
        let word = bit / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (bit % WORD_BITS);
    }

    /// Clear a bit.
    pub fn clear(&mut self, bit: usize) {
        if let Some(w) = self.words.get_mut(bit / WORD_BITS) {
            *w &= !(1u64 << (bit % WORD_BITS));
        }
    }

    /// Test a bit.
    pub fn get(&self, bit: usize) -> bool {
        self.words
            .get(bit / WORD_BITS)
            .is_some_and(|w| w & (1u64 << (bit % WORD_BITS)) != 0)
    }

    /// Clear all bits.
    pub fn clear_all(&mut self) {
        self.words.clear();
    }

    /// True if no bit is set.
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Number of set bits.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// `self |= other`.
    pub fn or_assign(&mut self, other: &ChangeMask) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, src) in self.words.iter_mut().zip(&other.words) {
            *dst |= *src;
        }
    }

    /// True if any bit is set in both masks.
    pub fn intersects(&self, other: &ChangeMask) -> bool {
        self.words
            .iter()
            .zip(&other.words)
            .any(|(a, b)| a & b != 0)
    }

    /// Whether field `index` is covered, either directly or through bit 0.
    pub fn covers_field(&self, index: usize) -> bool {
        self.get(0) || self.get(index + 1)
    }

    /// Words up to the last non-zero one.
    fn significant(&self) -> &[u64] {
        let len = self
            .words
            .iter()
            .rposition(|w| *w != 0)
            .map_or(0, |i| i + 1);
        &self.words[..len]
    }

    /// Iterate set bit indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, w)| {
            (0..WORD_BITS)
                .filter(move |b| w & (1u64 << b) != 0)
                .map(move |b| wi * WORD_BITS + b)
        })
    }
}

impl PartialEq for ChangeMask {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Hash for ChangeMask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pvdata::ScalarType;

    #[test]
    fn set_get_clear_across_words() {
        let mut m = ChangeMask::new();
        m.set(3);
        m.set(70);
        assert!(m.get(3));
        assert!(m.get(70));
        assert!(!m.get(4));
        assert_eq!(m.count(), 2);
        assert_eq!(m.iter().collect::<Vec<_>>(), vec![3, 70]);

        m.clear(70);
        assert!(!m.get(70));
        m.clear(500);
        assert_eq!(m.count(), 1);
    }

    #[test]
    fn or_assign_grows() {
        let mut a = ChangeMask::new();
        a.set(1);
        let mut b = ChangeMask::new();
        b.set(100);
        a.or_assign(&b);
        assert!(a.get(1) && a.get(100));
        assert!(a.intersects(&b));
    }

    #[test]
    fn equality_ignores_storage_width() {
        use std::collections::hash_map::DefaultHasher;

        let hash = |m: &ChangeMask| {
            let mut h = DefaultHasher::new();
            m.hash(&mut h);
            h.finish()
        };

        let mut wide = ChangeMask::new();
        wide.set(70);
        wide.clear(70);
        assert_eq!(wide, ChangeMask::new());
        assert_eq!(hash(&wide), hash(&ChangeMask::new()));

        wide.set(1);
        let mut narrow = ChangeMask::new();
        narrow.set(1);
        assert_eq!(wide, narrow);
        assert_eq!(hash(&wide), hash(&narrow));

        narrow.set(2);
        assert_ne!(wide, narrow);
    }

    #[test]
    fn all_covers_every_field() {
        let s = Structure::builder("t")
            .add("a", ScalarType::Int)
            .add("b", ScalarType::Int)
            .build();
        let m = ChangeMask::all(&s);
        assert!(!m.get(0));
        assert!(m.covers_field(0) && m.covers_field(1));
        assert!(ChangeMask::whole().covers_field(7));
        assert!(ChangeMask::new().is_empty());
    }
}
