//! Xor distance between two identifiers, and the routing table partition it maps to.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Formatter};

use crate::{Error, Result};

/// Partition of the zero distance (a node to itself).
///
/// Non zero distances map to `1..=bits`, so this partition is never populated.
pub const SELF_PARTITION: u8 = 0;

#[derive(Clone, PartialEq, Eq, Hash)]
/// Byte string result of xoring two identifiers.
///
/// Ordered as a big-endian unsigned integer, only against distances of the same width.
pub struct Distance(Box<[u8]>);

impl Distance {
    /// Wrap an already calculated xor result.
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Distance {
        Distance(bytes.as_ref().into())
    }

    /// Xor two serialized identifiers.
    ///
    /// Fails with [Error::DistanceWidth] if they have different lengths.
    pub fn between(a: &[u8], b: &[u8]) -> Result<Distance> {
        if a.len() != b.len() {
            return Err(Error::DistanceWidth(a.len(), b.len()));
        }

        Ok(Distance(a.iter().zip(b).map(|(x, y)| x ^ y).collect()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns `true` for the distance between an identifier and itself.
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }

    /// Unsigned big-endian comparison.
    ///
    /// Distances of different widths are incomparable and return [Ordering::Equal],
    /// use [PartialOrd] to tell these apart from actually equal distances.
    pub fn compare(&self, other: &Distance) -> Ordering {
        self.partial_cmp(other).unwrap_or(Ordering::Equal)
    }

    /// Index of the highest set bit, counting from 1 at the least significant bit
    /// of the whole buffer.
    ///
    /// `[0, 4]` is partition 3, `[0x80, 0]` is partition 16, and the zero distance
    /// is [SELF_PARTITION].
    ///
    /// Saturates at 255 for distances wider than 32 bytes. Distances between
    /// [crate::Id]s are 16 bytes wide and always fall in `1..=128`.
    pub fn partition(&self) -> u8 {
        if self.is_zero() {
            return SELF_PARTITION;
        }

        let width = self.0.len();

        for (i, byte) in self.0.iter().enumerate() {
            if *byte != 0 {
                let bits_below = (width - i - 1) * 8;
                let partition = bits_below + (8 - byte.leading_zeros() as usize);

                return partition.min(u8::MAX as usize) as u8;
            }
        }

        SELF_PARTITION
    }
}

impl PartialOrd for Distance {
    fn partial_cmp(&self, other: &Distance) -> Option<Ordering> {
        if self.0.len() != other.0.len() {
            return None;
        }

        Some(self.0.cmp(&other.0))
    }
}

impl Debug for Distance {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Distance({:02x?})", &self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn partition_fixture() {
        assert_eq!(Distance::from_bytes([0, 4]).partition(), 3);
    }

    #[test]
    fn partition_bounds() {
        assert_eq!(Distance::from_bytes([0, 1]).partition(), 1);
        assert_eq!(Distance::from_bytes([0x80, 0]).partition(), 16);
        assert_eq!(Distance::from_bytes([0xff; 16]).partition(), 128);
        assert_eq!(Distance::from_bytes([0; 16]).partition(), SELF_PARTITION);
    }

    #[test]
    fn partition_saturates_beyond_32_bytes() {
        assert_eq!(Distance::from_bytes([0x80; 32]).partition(), 255);

        let mut wide = [0; 33];
        wide[0] = 1;
        assert_eq!(Distance::from_bytes(wide).partition(), 255);

        wide[0] = 0;
        wide[1] = 0x80;
        assert_eq!(Distance::from_bytes(wide).partition(), 255);

        wide[1] = 0x40;
        assert_eq!(Distance::from_bytes(wide).partition(), 255);
        wide[1] = 0;
        wide[2] = 0x80;
        assert_eq!(Distance::from_bytes(wide).partition(), 248);
    }

    #[test]
    fn compare() {
        let near = Distance::from_bytes([0, 1]);
        let far = Distance::from_bytes([1, 0]);

        assert_eq!(near.compare(&far), Ordering::Less);
        assert_eq!(far.compare(&near), Ordering::Greater);
        assert_eq!(near.compare(&near.clone()), Ordering::Equal);
    }

    #[test]
    fn different_widths_are_incomparable() {
        let a = Distance::from_bytes([0, 1]);
        let b = Distance::from_bytes([0, 0, 1]);

        assert_eq!(a.partial_cmp(&b), None);
        assert_eq!(a.compare(&b), Ordering::Equal);
        assert_ne!(a, b);
    }

    #[test]
    fn between() {
        let d = Distance::between(&[0b1010, 1], &[0b0110, 1]).unwrap();
        assert_eq!(d.as_bytes(), &[0b1100, 0]);

        assert!(matches!(
            Distance::between(&[1, 2], &[1]),
            Err(Error::DistanceWidth(2, 1))
        ));
    }
}
