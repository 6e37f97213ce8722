//! Bit-mask algebra for packed sub-word fields.
//!
//! Bits are addressed in MSB-first order: bit 0 is the high bit of the word,
//! regardless of the word's size. A mask `[3, 4]` on an 8-bit word selects
//! `0b0001_1110`.

use crate::errors::LayoutError;

/// Width of the word a bit field lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordSize {
    W8 = 8,
    W16 = 16,
    W32 = 32,
}

impl WordSize {
    pub fn bits(self) -> u32 {
        self as u32
    }

    pub fn bytes(self) -> usize {
        self as usize / 8
    }
}

/// A contiguous run of bits: `offset` of the first bit from the MSB, and `length`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitMask {
    pub offset: u32,
    pub length: u32,
}

impl BitMask {
    pub fn new(offset: u32, length: u32) -> Self {
        BitMask { offset, length }
    }

    /// Checks that the mask fits into a word of `size`.
    pub fn validate(self, size: WordSize) -> Result<Self, LayoutError> {
        mask(self.offset, self.length, size).map(|_| self)
    }
}

impl From<(u32, u32)> for BitMask {
    fn from((offset, length): (u32, u32)) -> Self {
        BitMask { offset, length }
    }
}

fn shift(offset: u32, length: u32, size: WordSize) -> u32 {
    size.bits() - offset - length
}

/// Computes the mask selecting `length` bits starting `offset` bits below the MSB.
pub fn mask(offset: u32, length: u32, size: WordSize) -> Result<u32, LayoutError> {
    if length == 0 || offset.checked_add(length).map_or(true, |end| end > size.bits()) {
        return Err(LayoutError::InvalidBitMask {
            offset,
            length,
            size: size.bits(),
        });
    }

    if length == 32 {
        return Ok(u32::MAX);
    }

    Ok(((1u32 << length) - 1) << shift(offset, length, size))
}

/// Truncates `value` to the unsigned range of `size`.
pub fn clamp(value: u64, size: WordSize) -> u32 {
    match size {
        WordSize::W8 => value as u8 as u32,
        WordSize::W16 => value as u16 as u32,
        WordSize::W32 => value as u32,
    }
}

/// Reads the masked bits of `word` as an unsigned number.
pub fn extract(word: u32, mask_bits: BitMask, size: WordSize) -> Result<u32, LayoutError> {
    let m = mask(mask_bits.offset, mask_bits.length, size)?;
    Ok((word & m) >> shift(mask_bits.offset, mask_bits.length, size))
}

/// Writes `value` into the masked bits of `word`, leaving other bits untouched.
pub fn insert(word: u32, mask_bits: BitMask, value: u64, size: WordSize) -> Result<u32, LayoutError> {
    let m = mask(mask_bits.offset, mask_bits.length, size)?;
    if mask_bits.length == 32 {
        return Ok(value as u32);
    }

    let placed = ((value as u32 as u64) << shift(mask_bits.offset, mask_bits.length, size)) as u32;
    Ok(clamp(((word & !m) | (placed & m)) as u64, size))
}
