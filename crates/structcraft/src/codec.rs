//! Endianness-aware encoding and decoding of scalar fields.
//!
//! Every function works on the exact byte span of one field. Masked fields read
//! the whole word first and then extract or insert their bits.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::bits::{self, BitMask, WordSize};
use crate::errors::RecordError;
use crate::field::Scalar;
use crate::value::Value;

/// Encoding parameters of one scalar field.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ScalarCodec<'a> {
    pub name: &'a str,
    pub scalar: Scalar,
    pub mask: Option<BitMask>,
    pub big_endian: bool,
}

/// Reads an unsigned word of `bytes.len()` bytes (1, 2, 4 or 8).
pub(crate) fn read_word(bytes: &[u8], big_endian: bool) -> u64 {
    match (bytes.len(), big_endian) {
        (1, _) => bytes[0] as u64,
        (2, true) => BigEndian::read_u16(bytes) as u64,
        (2, false) => LittleEndian::read_u16(bytes) as u64,
        (4, true) => BigEndian::read_u32(bytes) as u64,
        (4, false) => LittleEndian::read_u32(bytes) as u64,
        (_, true) => BigEndian::read_u64(bytes),
        (_, false) => LittleEndian::read_u64(bytes),
    }
}

/// Writes the low `bytes.len()` bytes of `word`.
pub(crate) fn write_word(bytes: &mut [u8], big_endian: bool, word: u64) {
    match (bytes.len(), big_endian) {
        (1, _) => bytes[0] = word as u8,
        (2, true) => BigEndian::write_u16(bytes, word as u16),
        (2, false) => LittleEndian::write_u16(bytes, word as u16),
        (4, true) => BigEndian::write_u32(bytes, word as u32),
        (4, false) => LittleEndian::write_u32(bytes, word as u32),
        (_, true) => BigEndian::write_u64(bytes, word),
        (_, false) => LittleEndian::write_u64(bytes, word),
    }
}

fn bcd_decode(byte: u8) -> u64 {
    (byte >> 4) as u64 * 10 + (byte & 0x0f) as u64
}

fn bcd_encode(value: u64) -> u8 {
    ((value / 10) * 16 + value % 10) as u8
}

impl ScalarCodec<'_> {
    fn unmasked(&self) -> Result<(), RecordError> {
        match self.mask {
            Some(_) => Err(RecordError::MaskNotSupported(self.name.to_string())),
            None => Ok(()),
        }
    }

    fn word_size(&self) -> Result<WordSize, RecordError> {
        self.scalar
            .mask_word()
            .ok_or_else(|| RecordError::MaskNotSupported(self.name.to_string()))
    }

    fn mismatch(&self, expected: &'static str) -> RecordError {
        RecordError::TypeMismatch {
            field: self.name.to_string(),
            expected,
        }
    }

    /// Reads the unsigned word and applies the mask, if any.
    fn masked_word(&self, bytes: &[u8]) -> Result<u64, RecordError> {
        let word = read_word(bytes, self.big_endian);
        match self.mask {
            None => Ok(word),
            Some(mask) => {
                let size = self.word_size()?;
                bits::extract(word as u32, mask, size)
                    .map(u64::from)
                    .map_err(|_| RecordError::MaskNotSupported(self.name.to_string()))
            }
        }
    }

    /// Merges `word` into the current bytes through the mask, if any.
    fn store_word(&self, bytes: &mut [u8], word: u64) -> Result<(), RecordError> {
        let stored = match self.mask {
            None => word,
            Some(mask) => {
                let size = self.word_size()?;
                let current = read_word(bytes, self.big_endian) as u32;
                bits::insert(current, mask, word, size)
                    .map(u64::from)
                    .map_err(|_| RecordError::MaskNotSupported(self.name.to_string()))?
            }
        };
        write_word(bytes, self.big_endian, stored);
        Ok(())
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<Value, RecordError> {
        let be = self.big_endian;
        match self.scalar {
            Scalar::UInt8 | Scalar::UInt16 | Scalar::UInt32 => {
                Ok(Value::UInt(self.masked_word(bytes)?))
            }
            Scalar::Boolean8 | Scalar::Boolean16 | Scalar::Boolean32 => {
                Ok(Value::Bool(self.masked_word(bytes)? != 0))
            }
            Scalar::UInt64 => {
                self.unmasked()?;
                Ok(Value::UInt(read_word(bytes, be)))
            }
            Scalar::Int8 => {
                self.unmasked()?;
                Ok(Value::Int(bytes[0] as i8 as i64))
            }
            Scalar::Int16 => {
                self.unmasked()?;
                Ok(Value::Int(read_word(bytes, be) as u16 as i16 as i64))
            }
            Scalar::Int32 => {
                self.unmasked()?;
                Ok(Value::Int(read_word(bytes, be) as u32 as i32 as i64))
            }
            Scalar::Int64 => {
                self.unmasked()?;
                Ok(Value::Int(read_word(bytes, be) as i64))
            }
            Scalar::Float32 => {
                self.unmasked()?;
                Ok(Value::Float(f32::from_bits(read_word(bytes, be) as u32) as f64))
            }
            Scalar::Float64 => {
                self.unmasked()?;
                Ok(Value::Float(f64::from_bits(read_word(bytes, be))))
            }
            Scalar::Bcd => {
                self.unmasked()?;
                Ok(Value::UInt(bcd_decode(bytes[0])))
            }
        }
    }

    pub fn encode(&self, bytes: &mut [u8], value: &Value) -> Result<(), RecordError> {
        let be = self.big_endian;
        match self.scalar {
            Scalar::UInt8 | Scalar::UInt16 | Scalar::UInt32 => {
                let v = value.as_u64().ok_or_else(|| self.mismatch("a number"))?;
                self.store_word(bytes, v)
            }
            Scalar::Boolean8 | Scalar::Boolean16 | Scalar::Boolean32 => {
                let v = value.as_bool().ok_or_else(|| self.mismatch("a boolean"))?;
                self.store_word(bytes, if v { u64::MAX } else { 0 })
            }
            Scalar::Float32 | Scalar::Float64 => {
                self.unmasked()?;
                let v = value.as_f64().ok_or_else(|| self.mismatch("a number"))?;
                let word = match self.scalar {
                    Scalar::Float32 => (v as f32).to_bits() as u64,
                    _ => v.to_bits(),
                };
                write_word(bytes, be, word);
                Ok(())
            }
            Scalar::Bcd => {
                self.unmasked()?;
                let v = value
                    .as_u64()
                    .filter(|&v| v <= 99)
                    .ok_or_else(|| self.mismatch("a decimal in 0..=99"))?;
                bytes[0] = bcd_encode(v);
                Ok(())
            }
            Scalar::UInt64 => {
                self.unmasked()?;
                let v = value.as_u64().ok_or_else(|| self.mismatch("a number"))?;
                write_word(bytes, be, v);
                Ok(())
            }
            Scalar::Int8 | Scalar::Int16 | Scalar::Int32 | Scalar::Int64 => {
                self.unmasked()?;
                let v = value.as_i64().ok_or_else(|| self.mismatch("a number"))?;
                write_word(bytes, be, v as u64);
                Ok(())
            }
        }
    }

    /// The value `value` reads back as once stored in this field.
    pub fn normalize(&self, value: &Value) -> Result<Value, RecordError> {
        let mut scratch = [0u8; 8];
        let bytes = &mut scratch[..self.scalar.width()];
        self.encode(bytes, value)?;
        self.decode(bytes)
    }
}
