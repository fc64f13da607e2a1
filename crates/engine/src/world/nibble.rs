use crate::error::StorageError;

use super::section::{SECTION_VOLUME, index};

/// Byte length of a 16³ nibble channel.
pub const NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

/// 4 bits per cell over a 16³ volume.
///
/// Cell `(y << 8) | (z << 4) | x` lives in byte `index >> 1`; even indices use
/// the low nibble, odd indices the high one.
#[derive(Clone, PartialEq, Eq)]
pub struct NibbleChannel {
    data: Box<[u8; NIBBLE_BYTES]>,
}

impl NibbleChannel {
    pub fn new() -> Self {
        Self::filled(0)
    }

    pub fn filled(value: u8) -> Self {
        let value = value & 0x0F;
        Self {
            data: Box::new([value | (value << 4); NIBBLE_BYTES]),
        }
    }

    pub fn from_bytes(field: &'static str, bytes: &[u8]) -> Result<Self, StorageError> {
        let data: [u8; NIBBLE_BYTES] = bytes.try_into().map_err(|_| StorageError::BadLength {
            field,
            expected: NIBBLE_BYTES,
            actual: bytes.len(),
        })?;
        Ok(Self {
            data: Box::new(data),
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> u8 {
        self.get_index(index(x, y, z))
    }

    /// Store `value`; bits above the low nibble are dropped.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, z: usize, value: u8) {
        self.set_index(index(x, y, z), value);
    }

    #[inline]
    pub fn get_index(&self, index: usize) -> u8 {
        let byte = self.data[index >> 1];
        if index & 1 == 0 { byte & 0x0F } else { byte >> 4 }
    }

    #[inline]
    pub fn set_index(&mut self, index: usize, value: u8) {
        let byte = &mut self.data[index >> 1];
        let value = value & 0x0F;
        if index & 1 == 0 {
            *byte = (*byte & 0xF0) | value;
        } else {
            *byte = (*byte & 0x0F) | (value << 4);
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Whether every cell is zero.
    pub fn is_zero(&self) -> bool {
        self.data.iter().all(|&b| b == 0)
    }
}

impl Default for NibbleChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for NibbleChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lit = self.data.iter().filter(|&&b| b != 0).count();
        write!(f, "NibbleChannel({lit} non-zero bytes)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_value_reads_back() {
        let mut channel = NibbleChannel::new();
        for value in 0..16u8 {
            for (x, y, z) in [(0, 0, 0), (1, 0, 0), (15, 15, 15), (7, 3, 9)] {
                channel.set(x, y, z, value);
                assert_eq!(channel.get(x, y, z), value);
            }
        }
    }

    #[test]
    fn neighbor_sharing_a_byte_is_untouched() {
        let mut channel = NibbleChannel::new();
        for y in 0..16 {
            for z in 0..16 {
                for x in (0..16).step_by(2) {
                    channel.set(x, y, z, 0x9);
                    channel.set(x + 1, y, z, 0x6);
                    assert_eq!(channel.get(x, y, z), 0x9);
                    channel.set(x, y, z, 0x3);
                    assert_eq!(channel.get(x + 1, y, z), 0x6);
                }
            }
        }
    }

    #[test]
    fn set_truncates_to_four_bits() {
        let mut channel = NibbleChannel::new();
        channel.set(4, 4, 4, 0xAB);
        assert_eq!(channel.get(4, 4, 4), 0xB);
        assert_eq!(channel.get(5, 4, 4), 0);
    }

    #[test]
    fn from_bytes_checks_length() {
        assert!(matches!(
            NibbleChannel::from_bytes("SkyLight", &[0; 10]),
            Err(StorageError::BadLength { field: "SkyLight", expected: 2048, actual: 10 })
        ));
        let filled = NibbleChannel::filled(15);
        let copy = NibbleChannel::from_bytes("SkyLight", filled.as_bytes()).unwrap();
        assert_eq!(copy.get(3, 2, 1), 15);
    }
}
