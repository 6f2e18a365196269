// SPDX-License-Identifier: Apache-2.0

//! Conversion between the canonical bit-string form of a signal value and
//! the word-packed form used when driving or checking an RTL model.
//!
//! Bit-strings are written MSB-leftmost, matching hardware range notation:
//! `"1100"` for `x[3:0]` means `x[3]=1, x[2]=1, x[1]=0, x[0]=0`.
//!
//! Word-packed values hold the least significant 32 bits in word 0; word `k`
//! holds bits `[32k+31 : 32k]`. The value is zero-extended on the most
//! significant side to fill the last word.

use bitvec::field::BitField;
use bitvec::order::Lsb0;
use bitvec::vec::BitVec;

use crate::goldcheck_error::{GoldcheckError, Result};

pub const WORD_BITS: usize = 32;

/// Number of 32-bit words needed to hold a value of `width` bits.
pub fn word_count(width: usize) -> usize {
    (width + WORD_BITS - 1) / WORD_BITS
}

/// Returns true iff `s` is composed only of `0` and `1`.
pub fn is_binary(s: &str) -> bool {
    s.chars().all(|c| c == '0' || c == '1')
}

/// A declared hardware index range such as `[7:0]` or `[0:7]`.
///
/// The left bound (`msb`) is always the most significant bit and therefore
/// the leftmost character of the bit-string, whichever way the range runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BitRange {
    pub msb: i64,
    pub lsb: i64,
}

impl BitRange {
    pub fn new(msb: i64, lsb: i64) -> Self {
        BitRange { msb, lsb }
    }

    /// The conventional `[width-1:0]` range.
    pub fn with_width(width: usize) -> Self {
        BitRange {
            msb: width as i64 - 1,
            lsb: 0,
        }
    }

    pub fn width(&self) -> usize {
        (self.msb - self.lsb).unsigned_abs() as usize + 1
    }

    pub fn is_descending(&self) -> bool {
        self.msb >= self.lsb
    }

    pub fn contains(&self, declared: i64) -> bool {
        let (lo, hi) = if self.is_descending() {
            (self.lsb, self.msb)
        } else {
            (self.msb, self.lsb)
        };
        lo <= declared && declared <= hi
    }
}

impl std::fmt::Display for BitRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}]", self.msb, self.lsb)
    }
}

/// Maps a declared index to its position in the MSB-first bit-string.
///
/// Position 0 is the leftmost character, i.e. the range's left bound. Every
/// place that relates a declared bit to a string character or to a word
/// slice goes through this function or [`declared_index`].
pub fn bit_index(range: &BitRange, declared: i64) -> Option<usize> {
    if !range.contains(declared) {
        return None;
    }
    Some((range.msb - declared).unsigned_abs() as usize)
}

/// Inverse of [`bit_index`]: the declared index of string position
/// `position`.
pub fn declared_index(range: &BitRange, position: usize) -> Option<i64> {
    if position >= range.width() {
        return None;
    }
    let offset = position as i64;
    Some(if range.is_descending() {
        range.msb - offset
    } else {
        range.msb + offset
    })
}

/// Declared part-select bounds `(left, right)` of word `word` within
/// `range`, e.g. word 1 of `[39:0]` is `(39, 32)`.
pub fn word_select(range: &BitRange, word: usize) -> Option<(i64, i64)> {
    let width = range.width();
    let low_significance = word * WORD_BITS;
    if low_significance >= width {
        return None;
    }
    let high_significance = std::cmp::min(low_significance + WORD_BITS, width) - 1;
    // Significance s lives at string position width-1-s.
    let left = declared_index(range, width - 1 - high_significance)?;
    let right = declared_index(range, width - 1 - low_significance)?;
    Some((left, right))
}

/// A fixed-width bit-vector value.
///
/// Storage is LSB-first: `bits[0]` is the least significant bit.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct BitValue {
    bits: BitVec<u32, Lsb0>,
}

impl BitValue {
    pub fn zero(width: usize) -> Self {
        BitValue {
            bits: BitVec::repeat(false, width),
        }
    }

    /// Interprets `bitstring` strictly in base two.
    ///
    /// Fails with `MalformedSignal` if the length differs from `width` or any
    /// character is not `0`/`1`.
    pub fn decode(bitstring: &str, width: usize) -> Result<Self> {
        Self::decode_for("<unnamed>", bitstring, width)
    }

    /// As [`BitValue::decode`], attributing errors to signal `signal`.
    pub fn decode_for(signal: &str, bitstring: &str, width: usize) -> Result<Self> {
        if bitstring.len() != width {
            return Err(GoldcheckError::malformed_signal(
                signal,
                bitstring,
                format!("expected {} bits, got {}", width, bitstring.len()),
            ));
        }
        let mut bits: BitVec<u32, Lsb0> = BitVec::with_capacity(width);
        for c in bitstring.chars().rev() {
            match c {
                '0' => bits.push(false),
                '1' => bits.push(true),
                other => {
                    return Err(GoldcheckError::malformed_signal(
                        signal,
                        bitstring,
                        format!("invalid character {:?}", other),
                    ))
                }
            }
        }
        Ok(BitValue { bits })
    }

    /// Builds a value from its low `width` bits of `value`.
    pub fn from_u64(value: u64, width: usize) -> Self {
        let mut bits: BitVec<u32, Lsb0> = BitVec::with_capacity(width);
        for i in 0..width {
            bits.push(i < 64 && (value >> i) & 1 == 1);
        }
        BitValue { bits }
    }

    /// Reassembles a value from LSW-first words.
    ///
    /// `words` must hold exactly `word_count(width)` entries and any bits
    /// above `width` in the last word must be zero.
    pub fn from_words(words: &[u32], width: usize) -> Result<Self> {
        let want = word_count(width);
        if words.len() != want {
            return Err(GoldcheckError::malformed_signal(
                "<words>",
                &format!("{:?}", words),
                format!("expected {} words for width {}", want, width),
            ));
        }
        let spill = width % WORD_BITS;
        if spill != 0 {
            if let Some(last) = words.last() {
                if last >> spill != 0 {
                    return Err(GoldcheckError::malformed_signal(
                        "<words>",
                        &format!("{:?}", words),
                        format!("bits set above width {}", width),
                    ));
                }
            }
        }
        let mut bits: BitVec<u32, Lsb0> = BitVec::from_vec(words.to_vec());
        bits.truncate(width);
        Ok(BitValue { bits })
    }

    pub fn width(&self) -> usize {
        self.bits.len()
    }

    /// Bit at `significance` (0 is the LSB).
    pub fn get(&self, significance: usize) -> Option<bool> {
        self.bits.get(significance).map(|b| *b)
    }

    pub fn to_bitstring(&self) -> String {
        self.bits
            .iter()
            .rev()
            .map(|b| if *b { '1' } else { '0' })
            .collect()
    }

    /// Word-packed form, LSW first, `word_count(width)` entries.
    pub fn to_words(&self) -> Vec<u32> {
        self.bits
            .chunks(WORD_BITS)
            .map(|chunk| chunk.load_le::<u32>())
            .collect()
    }

    /// The value as a `u64` when it fits.
    pub fn to_u64(&self) -> Option<u64> {
        if self.bits.is_empty() {
            return Some(0);
        }
        if self.bits.iter_ones().any(|i| i >= 64) {
            return None;
        }
        let low = std::cmp::min(self.width(), 64);
        Some(self.bits[..low].load_le::<u64>())
    }

    /// Upper-case hex digits, zero-padded to `ceil(width/4)` digits.
    pub fn to_hex(&self) -> String {
        let width = self.width();
        let digits = (width + 3) / 4;
        let mut s = String::with_capacity(digits);
        for nibble in (0..digits).rev() {
            let lo = nibble * 4;
            let hi = std::cmp::min(lo + 4, width);
            let v = self.bits[lo..hi].load_le::<u8>();
            s.push(std::char::from_digit(v as u32, 16).map_or('?', |c| c.to_ascii_uppercase()));
        }
        s
    }
}

impl std::fmt::Display for BitValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_bitstring())
    }
}

impl std::fmt::Debug for BitValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BitValue({}'b{})", self.width(), self.to_bitstring())
    }
}

/// Decodes `bitstring` as a `width`-bit value.
pub fn decode(bitstring: &str, width: usize) -> Result<BitValue> {
    BitValue::decode(bitstring, width)
}

/// Packs a bit-string of any length into LSW-first 32-bit words.
pub fn to_words(bitstring: &str) -> Result<Vec<u32>> {
    Ok(BitValue::decode(bitstring, bitstring.len())?.to_words())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_decode_declared_bits() {
        let range = BitRange::with_width(4);
        let v = decode("1100", 4).unwrap();
        for (declared, want) in [(3, true), (2, true), (1, false), (0, false)] {
            let position = bit_index(&range, declared).unwrap();
            assert_eq!(v.get(v.width() - 1 - position), Some(want));
        }
        assert_eq!(v.to_u64(), Some(0b1100));
    }

    #[test_case("101", 4; "too short")]
    #[test_case("10101", 4; "too long")]
    #[test_case("10x1", 4; "dont care")]
    #[test_case("1 01", 4; "space")]
    fn test_decode_rejects(bitstring: &str, width: usize) {
        let err = decode(bitstring, width).unwrap_err();
        assert!(
            matches!(err, GoldcheckError::MalformedSignal { .. }),
            "got {:?}",
            err
        );
    }

    #[test]
    fn test_forty_bit_all_ones_packs_into_two_words() {
        let s = "1".repeat(40);
        assert_eq!(to_words(&s).unwrap(), vec![0xFFFF_FFFF, 0xFF]);
    }

    #[test]
    fn test_words_are_least_significant_first() {
        // 33 bits: MSB set, LSB set.
        let s = format!("1{}1", "0".repeat(31));
        assert_eq!(to_words(&s).unwrap(), vec![0x0000_0001, 0x1]);
        let s = format!("{}{}", "1".repeat(32), "0".repeat(32));
        assert_eq!(to_words(&s).unwrap(), vec![0, 0xFFFF_FFFF]);
    }

    /// Packs by hand: significance `s` is character `width-1-s` and lands in
    /// bit `s % 32` of word `s / 32`.
    fn reference_words(bitstring: &str) -> Vec<u32> {
        let width = bitstring.len();
        let mut words = vec![0u32; word_count(width)];
        for (position, c) in bitstring.chars().enumerate() {
            if c == '1' {
                let significance = width - 1 - position;
                words[significance / WORD_BITS] |= 1u32 << (significance % WORD_BITS);
            }
        }
        words
    }

    #[test]
    fn test_words_reassemble_to_bitstring() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};

        let mut rng = StdRng::seed_from_u64(0x601d);
        for width in 1..=130 {
            let mut samples = vec!["1".repeat(width), "0".repeat(width)];
            for _ in 0..4 {
                samples.push(
                    (0..width)
                        .map(|_| if rng.gen::<bool>() { '1' } else { '0' })
                        .collect(),
                );
            }
            for s in samples {
                let words = to_words(&s).unwrap();
                assert_eq!(words.len(), word_count(width), "width {}", width);
                assert_eq!(words, reference_words(&s), "bitstring {}", s);
                let back = BitValue::from_words(&words, width).unwrap();
                assert_eq!(back.to_bitstring(), s);
            }
        }
    }

    #[test_case(32, 1; "one full word")]
    #[test_case(33, 2; "one bit over")]
    #[test_case(64, 2; "two full words")]
    #[test_case(65, 3; "two words and a bit")]
    fn test_word_boundaries(width: usize, words: usize) {
        let s = format!("1{}", "0".repeat(width - 1));
        let packed = to_words(&s).unwrap();
        assert_eq!(packed.len(), words);
        let top = width - 1;
        assert_eq!(packed[top / WORD_BITS], 1u32 << (top % WORD_BITS));
        assert!(packed[..top / WORD_BITS].iter().all(|w| *w == 0));
    }

    #[test]
    fn test_from_words_rejects_bits_above_width() {
        assert!(BitValue::from_words(&[0, 0x100], 40).is_err());
        assert!(BitValue::from_words(&[0], 40).is_err());
        assert!(BitValue::from_words(&[0, 0xFF], 40).is_ok());
    }

    #[test]
    fn test_bit_index_ends() {
        let range = BitRange::with_width(8);
        assert_eq!(bit_index(&range, 7), Some(0));
        assert_eq!(bit_index(&range, 0), Some(7));
        assert_eq!(declared_index(&range, 0), Some(7));
        assert_eq!(declared_index(&range, 7), Some(0));
        assert_eq!(bit_index(&range, 8), None);
        assert_eq!(declared_index(&range, 8), None);
    }

    #[test]
    fn test_bit_index_offset_and_ascending_ranges() {
        let offset = BitRange::new(4, 1);
        assert_eq!(offset.width(), 4);
        assert_eq!(bit_index(&offset, 4), Some(0));
        assert_eq!(bit_index(&offset, 1), Some(3));
        assert_eq!(bit_index(&offset, 0), None);

        let ascending = BitRange::new(0, 3);
        assert_eq!(ascending.width(), 4);
        assert_eq!(bit_index(&ascending, 0), Some(0));
        assert_eq!(bit_index(&ascending, 3), Some(3));
        for position in 0..4 {
            let declared = declared_index(&ascending, position).unwrap();
            assert_eq!(bit_index(&ascending, declared), Some(position));
        }
    }

    #[test]
    fn test_word_select() {
        let range = BitRange::with_width(40);
        assert_eq!(word_select(&range, 0), Some((31, 0)));
        assert_eq!(word_select(&range, 1), Some((39, 32)));
        assert_eq!(word_select(&range, 2), None);

        let ascending = BitRange::new(0, 39);
        assert_eq!(word_select(&ascending, 0), Some((8, 39)));
        assert_eq!(word_select(&ascending, 1), Some((0, 7)));
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(decode("1100", 4).unwrap().to_hex(), "C");
        assert_eq!(decode("10000", 5).unwrap().to_hex(), "10");
        assert_eq!(
            decode(&"1".repeat(40), 40).unwrap().to_hex(),
            "FFFFFFFFFF"
        );
        assert_eq!(BitValue::zero(9).to_hex(), "000");
    }

    #[test]
    fn test_to_u64_overflow() {
        let wide = decode(&format!("1{}", "0".repeat(64)), 65).unwrap();
        assert_eq!(wide.to_u64(), None);
        let fits = decode(&format!("0{}", "1".repeat(64)), 65).unwrap();
        assert_eq!(fits.to_u64(), Some(u64::MAX));
    }

    #[test]
    fn test_from_u64_truncates_to_width() {
        let v = BitValue::from_u64(0x1F, 4);
        assert_eq!(v.to_bitstring(), "1111");
    }
}
