//! Layout builder: declares fields one after another and compiles them into a
//! [RecordType].
//!
//! The builder keeps a cursor. Every declaration places the field at the cursor
//! and advances it by the field's size; [Layout::seek], [Layout::back] and the
//! `align*` methods move the cursor explicitly, which is how unions and aliased
//! views are expressed. The base size of the record is the largest cursor
//! position ever reached.
//!
//! ```
//! use structcraft::Layout;
//!
//! let header = Layout::named("Header")
//!     .uint8("version")?
//!     .uint16_be("length")?
//!     .bits8([("urgent", (0, 1)), ("kind", (1, 7))])?
//!     .compile();
//! assert_eq!(header.base_size(), 4);
//! assert_eq!(header.offset_of("kind"), Some(3));
//! # Ok::<(), structcraft::LayoutError>(())
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::bits::{BitMask, WordSize};
use crate::codec::ScalarCodec;
use crate::compiled::RecordType;
use crate::encoding::TextCodec;
use crate::errors::LayoutError;
use crate::field::{Checksum, Extent, FieldDesc, FieldType, Hooks, Scalar};
use crate::value::Value;

/// One field name or a list of aliases sharing a field.
#[derive(Debug, Clone)]
pub struct Names(Vec<String>);

impl From<&str> for Names {
    fn from(name: &str) -> Self {
        Names(vec![name.to_string()])
    }
}

impl From<String> for Names {
    fn from(name: String) -> Self {
        Names(vec![name])
    }
}

impl<const N: usize> From<[&str; N]> for Names {
    fn from(names: [&str; N]) -> Self {
        Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<&[&str]> for Names {
    fn from(names: &[&str]) -> Self {
        Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<String>> for Names {
    fn from(names: Vec<String>) -> Self {
        Names(names)
    }
}

/// Mutable layout under construction.
#[derive(Default)]
pub struct Layout {
    name: Option<String>,
    fields: Vec<FieldDesc>,
    /// Declaration order of names and aliases, pointing into `fields`.
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    position: usize,
    size: usize,
    tailed: bool,
    codec: Option<Arc<dyn TextCodec>>,
}

macro_rules! scalar_fields {
    ($($method:ident => $scalar:ident, $be:expr;)*) => {
        $(
            pub fn $method(self, names: impl Into<Names>) -> Result<Self, LayoutError> {
                let mut desc = FieldDesc::new(FieldType::Scalar(Scalar::$scalar), Extent::Single);
                desc.big_endian = $be;
                self.declare(names.into(), desc)
            }
        )*
    };
}

macro_rules! array_fields {
    ($($method:ident => $scalar:ident;)*) => {
        $(
            /// Numeric array of `len` elements, or a tail array when `len` is `None`.
            pub fn $method(self, names: impl Into<Names>, len: Option<usize>) -> Result<Self, LayoutError> {
                self.declare(names.into(), FieldDesc::new(FieldType::Scalar(Scalar::$scalar), counted(len)))
            }
        )*
    };
}

macro_rules! checksum_fields {
    ($($method:ident, $with:ident => $scalar:ident, $be:expr;)*) => {
        $(
            pub fn $method(self, name: &str) -> Result<Self, LayoutError> {
                self.trailer(name, Scalar::$scalar, $be)
            }

            pub fn $with(self, name: &str, checksum: Checksum) -> Result<Self, LayoutError> {
                self.trailer(name, Scalar::$scalar, $be)?.checksum(checksum)
            }
        )*
    };
}

fn counted(len: Option<usize>) -> Extent {
    match len {
        Some(len) => Extent::Count(len),
        None => Extent::Tail { reserve: 0 },
    }
}

impl Layout {
    pub fn new() -> Self {
        Layout::default()
    }

    /// Layout whose compiled type reports `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Layout {
            name: Some(name.into()),
            ..Layout::default()
        }
    }

    /// Uses `codec` instead of the process-wide text backend for this record's strings.
    pub fn with_codec(mut self, codec: Arc<dyn TextCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Current size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn offset_of(&self, name: &str) -> Option<isize> {
        self.index.get(name).map(|&i| self.fields[i].offset)
    }

    pub fn offsets(&self) -> BTreeMap<String, isize> {
        self.entries
            .iter()
            .map(|(name, i)| (name.clone(), self.fields[*i].offset))
            .collect()
    }

    fn move_to(&mut self, position: isize) {
        self.position = position.max(0) as usize;
        self.size = self.size.max(self.position);
    }

    fn check_names(&self, names: &[String]) -> Result<(), LayoutError> {
        for (i, name) in names.iter().enumerate() {
            if self.index.contains_key(name) || names[..i].contains(name) {
                return Err(LayoutError::DuplicateField(name.clone()));
            }
        }

        if let Some(last) = self.fields.last() {
            if last.is_checksum() {
                return Err(LayoutError::AfterChecksum(names[0].clone()));
            }
        }

        Ok(())
    }

    fn register(&mut self, names: Vec<String>, desc: FieldDesc) {
        let index = self.fields.len();
        self.fields.push(desc);
        for name in names {
            self.index.insert(name.clone(), index);
            self.entries.push((name, index));
        }
    }

    fn declare(mut self, names: Names, mut desc: FieldDesc) -> Result<Self, LayoutError> {
        let names = names.0;
        if names.is_empty() {
            return Err(LayoutError::NoField);
        }
        self.check_names(&names)?;
        if self.tailed {
            return Err(LayoutError::AfterTail(names[0].clone()));
        }

        let count = match desc.extent {
            Extent::Single => 1,
            Extent::Count(count) => count,
            Extent::Tail { reserve } if desc.ty.is_byte_run() => reserve,
            Extent::Tail { .. } => 1,
            Extent::Trailer => 0,
        };
        let end = count
            .checked_mul(desc.item_size())
            .and_then(|advance| self.position.checked_add(advance))
            .filter(|&end| end <= isize::MAX as usize)
            .ok_or_else(|| LayoutError::SizeOverflow(names[0].clone()))?;

        desc.offset = self.position as isize;
        self.tailed = desc.is_tail();
        self.register(names, desc);
        self.move_to(end as isize);
        Ok(self)
    }

    scalar_fields! {
        int8 => Int8, false;
        uint8 => UInt8, false;
        int16_le => Int16, false;
        int16_be => Int16, true;
        uint16_le => UInt16, false;
        uint16_be => UInt16, true;
        int32_le => Int32, false;
        int32_be => Int32, true;
        uint32_le => UInt32, false;
        uint32_be => UInt32, true;
        int64_le => Int64, false;
        int64_be => Int64, true;
        uint64_le => UInt64, false;
        uint64_be => UInt64, true;
        float32_le => Float32, false;
        float32_be => Float32, true;
        float64_le => Float64, false;
        float64_be => Float64, true;
        boolean8 => Boolean8, false;
        boolean16 => Boolean16, false;
        boolean32 => Boolean32, false;
        bcd => Bcd, false;
    }

    array_fields! {
        int8_array => Int8;
        uint8_array => UInt8;
        int16_array => Int16;
        uint16_array => UInt16;
        int32_array => Int32;
        uint32_array => UInt32;
        int64_array => Int64;
        uint64_array => UInt64;
        float32_array => Float32;
        float64_array => Float64;
    }

    /// Raw bytes. `None` makes a tail buffer; a negative length makes a tail
    /// buffer that leaves `-len` trailing bytes for a checksum.
    pub fn buffer(self, names: impl Into<Names>, len: Option<isize>) -> Result<Self, LayoutError> {
        let extent = match len {
            None => Extent::Tail { reserve: 0 },
            Some(len) if len < 0 => Extent::Tail {
                reserve: len.unsigned_abs(),
            },
            Some(len) => Extent::Count(len as usize),
        };
        self.declare(names.into(), FieldDesc::new(FieldType::Buffer, extent))
    }

    /// Nested record.
    pub fn record(self, names: impl Into<Names>, nested: &RecordType) -> Result<Self, LayoutError> {
        self.declare(
            names.into(),
            FieldDesc::new(FieldType::Struct(nested.clone()), Extent::Single),
        )
    }

    /// Array of `len` nested records, or as many as fit when `len` is `None`.
    pub fn record_array(
        self,
        names: impl Into<Names>,
        nested: &RecordType,
        len: Option<usize>,
    ) -> Result<Self, LayoutError> {
        self.declare(
            names.into(),
            FieldDesc::new(FieldType::Struct(nested.clone()), counted(len)),
        )
    }

    /// Zero-terminated string of `len` bytes, or a tail string when `len` is `None`.
    pub fn string(self, names: impl Into<Names>, len: Option<usize>) -> Result<Self, LayoutError> {
        self.declare(names.into(), FieldDesc::new(FieldType::String, counted(len)))
    }

    /// `lines` strings of `len` bytes each.
    pub fn string_array(
        self,
        names: impl Into<Names>,
        lines: usize,
        len: usize,
    ) -> Result<Self, LayoutError> {
        let mut desc = FieldDesc::new(FieldType::StringArray, Extent::Count(lines));
        desc.line_length = Some(len);
        self.declare(names.into(), desc)
    }

    /// Field of `size` bytes (a tail when `None`) read and written through `hooks`.
    /// The first name is the type tag passed to the hooks. Without hooks the
    /// field is exposed as raw bytes.
    pub fn custom(
        self,
        names: impl Into<Names>,
        size: Option<usize>,
        hooks: Hooks,
    ) -> Result<Self, LayoutError> {
        let names = names.into();
        let tag = names.0.first().cloned().unwrap_or_default();
        let mut desc = FieldDesc::new(FieldType::Custom(tag), counted(size));
        if !hooks.is_empty() {
            desc.hooks = Some(hooks);
        }
        self.declare(names, desc)
    }

    fn bit_fields<N, M>(
        mut self,
        scalar: Scalar,
        size: WordSize,
        fields: impl IntoIterator<Item = (N, M)>,
    ) -> Result<Self, LayoutError>
    where
        N: Into<String>,
        M: Into<BitMask>,
    {
        let offset = self.position as isize;
        for (name, mask) in fields {
            let name = name.into();
            let mask = mask.into().validate(size)?;
            self.check_names(std::slice::from_ref(&name))?;
            if self.tailed {
                return Err(LayoutError::AfterTail(name));
            }

            let mut desc = FieldDesc::new(FieldType::Scalar(scalar), Extent::Single);
            desc.offset = offset;
            desc.mask = Some(mask);
            desc.big_endian = true;
            self.register(vec![name], desc);
        }

        self.move_to(offset + size.bytes() as isize);
        Ok(self)
    }

    /// Unsigned bit fields sharing one byte.
    pub fn bits8<N, M>(self, fields: impl IntoIterator<Item = (N, M)>) -> Result<Self, LayoutError>
    where
        N: Into<String>,
        M: Into<BitMask>,
    {
        self.bit_fields(Scalar::UInt8, WordSize::W8, fields)
    }

    /// Unsigned bit fields sharing one big-endian 16-bit word.
    pub fn bits16<N, M>(self, fields: impl IntoIterator<Item = (N, M)>) -> Result<Self, LayoutError>
    where
        N: Into<String>,
        M: Into<BitMask>,
    {
        self.bit_fields(Scalar::UInt16, WordSize::W16, fields)
    }

    /// Unsigned bit fields sharing one big-endian 32-bit word.
    pub fn bits32<N, M>(self, fields: impl IntoIterator<Item = (N, M)>) -> Result<Self, LayoutError>
    where
        N: Into<String>,
        M: Into<BitMask>,
    {
        self.bit_fields(Scalar::UInt32, WordSize::W32, fields)
    }

    fn trailer(mut self, name: &str, scalar: Scalar, big_endian: bool) -> Result<Self, LayoutError> {
        let names = vec![name.to_string()];
        self.check_names(&names)?;

        let size = scalar.width();
        let prev = match self.fields.last_mut() {
            Some(prev) if prev.ty.is_byte_run() => prev,
            _ => return Err(LayoutError::ChecksumPlacement(name.to_string())),
        };

        let advance = match prev.extent {
            Extent::Tail { reserve: 0 } => {
                prev.extent = Extent::Tail { reserve: size };
                size
            }
            Extent::Tail { reserve } if reserve == size => 0,
            Extent::Tail { reserve } => {
                return Err(LayoutError::ChecksumSizeMismatch {
                    name: name.to_string(),
                    expected: size,
                    found: reserve,
                });
            }
            _ => size,
        };

        let mut desc = FieldDesc::new(FieldType::Scalar(scalar), Extent::Trailer);
        desc.offset = -(size as isize);
        desc.big_endian = big_endian;
        self.register(names, desc);
        self.move_to((self.position + advance) as isize);
        Ok(self)
    }

    checksum_fields! {
        crc8, crc8_with => UInt8, false;
        crc16_le, crc16_le_with => UInt16, false;
        crc16_be, crc16_be_with => UInt16, true;
        crc32_le, crc32_le_with => UInt32, false;
        crc32_be, crc32_be_with => UInt32, true;
    }

    fn last_mut(&mut self) -> Result<(String, &mut FieldDesc), LayoutError> {
        let (name, index) = self.entries.last().cloned().ok_or(LayoutError::NoField)?;
        Ok((name, &mut self.fields[index]))
    }

    /// Fixes the value of the most recent scalar or string field. The value is
    /// written when a record is constructed; writing any other value fails.
    pub fn literal(mut self, value: impl Into<Value>) -> Result<Self, LayoutError> {
        let value = value.into();
        let (name, desc) = self.last_mut()?;
        let invalid = || LayoutError::InvalidModifier {
            modifier: "literal",
            field: name.clone(),
        };

        let literal = match (&desc.ty, desc.extent, desc.mask) {
            (FieldType::Scalar(scalar), Extent::Single, None) => ScalarCodec {
                name: &name,
                scalar: *scalar,
                mask: None,
                big_endian: desc.big_endian,
            }
            .normalize(&value)
            .map_err(|_| invalid())?,
            (FieldType::String, _, _) if value.as_str().is_some() => value,
            _ => return Err(invalid()),
        };

        desc.literal = Some(literal);
        Ok(self)
    }

    /// Sets the text encoding of the most recent string or string-array field.
    pub fn encoding(mut self, encoding: &str) -> Result<Self, LayoutError> {
        let (name, desc) = self.last_mut()?;
        match desc.ty {
            FieldType::String | FieldType::StringArray => {
                desc.encoding = Some(encoding.to_string());
                Ok(self)
            }
            _ => Err(LayoutError::InvalidModifier {
                modifier: "encoding",
                field: name,
            }),
        }
    }

    /// Attaches a calculator to the checksum field just declared.
    pub fn checksum(mut self, checksum: Checksum) -> Result<Self, LayoutError> {
        let (name, desc) = self.last_mut()?;
        if !desc.is_checksum() {
            return Err(LayoutError::InvalidModifier {
                modifier: "checksum",
                field: name,
            });
        }

        desc.checksum = Some(checksum);
        Ok(self)
    }

    /// Moves the cursor by `bytes`. Zero moves it to the current end of the record.
    pub fn seek(mut self, bytes: isize) -> Self {
        if bytes == 0 {
            self.move_to(self.size as isize);
        } else {
            self.move_to((self.position as isize).saturating_add(bytes));
        }
        self
    }

    /// Moves the cursor to the offset of the entry declared `steps` entries ago
    /// (`1` is the most recent one). Zero moves it to the start of the record.
    pub fn back(mut self, steps: usize) -> Result<Self, LayoutError> {
        let max = self.entries.len();
        if steps > max {
            return Err(LayoutError::InvalidBack { steps, max });
        }

        if steps == 0 {
            self.move_to(0);
        } else {
            let (_, index) = self.entries[max - steps];
            self.move_to(self.fields[index].offset);
        }
        Ok(self)
    }

    fn align(mut self, boundary: usize) -> Self {
        let remainder = self.position % boundary;
        if remainder != 0 {
            self.move_to((self.position + boundary - remainder) as isize);
        }
        self
    }

    pub fn align2(self) -> Self {
        self.align(2)
    }

    pub fn align4(self) -> Self {
        self.align(4)
    }

    pub fn align8(self) -> Self {
        self.align(8)
    }

    /// Freezes the layout.
    pub fn compile(self) -> RecordType {
        log::debug!(
            "compiled record {}: {} fields, {} names, base size {}",
            self.name.as_deref().unwrap_or("<anonymous>"),
            self.fields.len(),
            self.entries.len(),
            self.size
        );

        RecordType::new(
            self.name,
            self.size,
            self.fields,
            self.entries,
            self.index,
            self.codec,
        )
    }
}
