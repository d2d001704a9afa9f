//! Growable bit set used for reaching-definition tracking.
//!
//! Sized to the actual definition count per function; there is no fixed
//! capacity past which tracking degrades.

const WORD_BITS: usize = 64;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(WORD_BITS)],
        }
    }

    fn ensure(&mut self, bit: usize) {
        let needed = bit / WORD_BITS + 1;
        if self.words.len() < needed {
            self.words.resize(needed, 0);
        }
    }

    pub fn set(&mut self, bit: usize) {
        self.ensure(bit);
        self.words[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
    }

    pub fn clear(&mut self, bit: usize) {
        if let Some(word) = self.words.get_mut(bit / WORD_BITS) {
            *word &= !(1 << (bit % WORD_BITS));
        }
    }

    pub fn get(&self, bit: usize) -> bool {
        self.words
            .get(bit / WORD_BITS)
            .is_some_and(|w| w & (1 << (bit % WORD_BITS)) != 0)
    }

    pub fn clear_all(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// self |= other. Returns true if any bit changed.
    pub fn union_with(&mut self, other: &BitSet) -> bool {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        let mut changed = false;
        for (dst, &src) in self.words.iter_mut().zip(other.words.iter()) {
            let next = *dst | src;
            changed |= next != *dst;
            *dst = next;
        }
        changed
    }

    /// self ^= other
    pub fn xor_with(&mut self, other: &BitSet) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (dst, &src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst ^= src;
        }
    }

    /// self &= !other (kill)
    pub fn difference_with(&mut self, other: &BitSet) {
        for (dst, &src) in self.words.iter_mut().zip(other.words.iter()) {
            *dst &= !src;
        }
    }

    /// Number of bits set in self & other
    pub fn intersect_count(&self, other: &BitSet) -> u32 {
        self.words
            .iter()
            .zip(other.words.iter())
            .map(|(&a, &b)| (a & b).count_ones())
            .sum()
    }

    pub fn count(&self) -> u32 {
        self.words.iter().map(|w| w.count_ones()).sum()
    }
}
