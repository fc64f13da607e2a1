/// Fixed-length array of `bits`-wide unsigned entries packed into `u64`s.
///
/// Entries are packed sequentially with no entry spanning two words, so
/// `64 / bits` entries share each word and the remainder bits are unused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedArray {
    bits: u8,
    per_word: usize,
    mask: u64,
    len: usize,
    words: Box<[u64]>,
}

impl PackedArray {
    /// `len` zeroed entries of `bits` bits each (`1..=32`).
    pub fn new(bits: u8, len: usize) -> Self {
        assert!((1..=32).contains(&bits), "unsupported entry width {bits}");
        let per_word = 64 / bits as usize;
        Self {
            bits,
            per_word,
            mask: (1u64 << bits) - 1,
            len,
            words: vec![0u64; len.div_ceil(per_word)].into_boxed_slice(),
        }
    }

    pub fn bits(&self) -> u8 {
        self.bits
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn locate(&self, index: usize) -> (usize, usize) {
        debug_assert!(index < self.len, "index {index} out of {}", self.len);
        (index / self.per_word, (index % self.per_word) * self.bits as usize)
    }

    #[inline]
    pub fn get(&self, index: usize) -> u32 {
        let (word, shift) = self.locate(index);
        ((self.words[word] >> shift) & self.mask) as u32
    }

    /// Store `value` (masked to the entry width) and return the previous entry.
    #[inline]
    pub fn swap(&mut self, index: usize, value: u32) -> u32 {
        let (word, shift) = self.locate(index);
        let slot = &mut self.words[word];
        let old = ((*slot >> shift) & self.mask) as u32;
        *slot = (*slot & !(self.mask << shift)) | ((value as u64 & self.mask) << shift);
        old
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u32) {
        self.swap(index, value);
    }

    /// Set every entry to `value`.
    pub fn fill(&mut self, value: u32) {
        let value = value as u64 & self.mask;
        let mut word = 0u64;
        for i in 0..self.per_word {
            word |= value << (i * self.bits as usize);
        }
        self.words.fill(word);
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).map(|i| self.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_layout_has_no_spanning_entries() {
        let array = PackedArray::new(5, 4096);
        // 12 entries per word
        assert_eq!(array.words.len(), 4096usize.div_ceil(12));
    }

    #[test]
    fn entries_are_independent() {
        let mut array = PackedArray::new(10, 4096);
        for i in 0..4096 {
            array.set(i, (i * 7 % 1024) as u32);
        }
        for i in 0..4096 {
            assert_eq!(array.get(i), (i * 7 % 1024) as u32);
        }
        assert_eq!(array.swap(100, 3), 700 % 1024);
        assert_eq!(array.get(100), 3);
        assert_eq!(array.get(99), (99 * 7 % 1024) as u32);
        assert_eq!(array.get(101), (101 * 7 % 1024) as u32);
    }

    #[test]
    fn values_are_masked() {
        let mut array = PackedArray::new(4, 16);
        array.set(0, 0x1F);
        assert_eq!(array.get(0), 0xF);
        assert_eq!(array.get(1), 0);
    }

    #[test]
    fn fill_sets_everything() {
        let mut array = PackedArray::new(12, 4096);
        array.fill(0xABC);
        assert!(array.iter().all(|v| v == 0xABC));
    }
}
