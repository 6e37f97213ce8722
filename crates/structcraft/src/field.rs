//! Field descriptors produced by a [crate::layout::Layout].

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use crate::bits::{BitMask, WordSize};
use crate::compiled::RecordType;
use crate::value::Value;

/// Fixed-width primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    Boolean8,
    Boolean16,
    Boolean32,
    /// Binary-coded decimal byte: `0x43` is 43.
    Bcd,
}

impl Scalar {
    /// Size in bytes.
    pub fn width(self) -> usize {
        match self {
            Scalar::Int8 | Scalar::UInt8 | Scalar::Boolean8 | Scalar::Bcd => 1,
            Scalar::Int16 | Scalar::UInt16 | Scalar::Boolean16 => 2,
            Scalar::Int32 | Scalar::UInt32 | Scalar::Boolean32 | Scalar::Float32 => 4,
            Scalar::Int64 | Scalar::UInt64 | Scalar::Float64 => 8,
        }
    }

    /// 64-bit integers, projected as decimal text.
    pub fn is_wide(self) -> bool {
        matches!(self, Scalar::Int64 | Scalar::UInt64)
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Scalar::Int8
                | Scalar::UInt8
                | Scalar::Int16
                | Scalar::UInt16
                | Scalar::Int32
                | Scalar::UInt32
                | Scalar::Int64
                | Scalar::UInt64
                | Scalar::Bcd
        )
    }

    /// Word size for bit masks; `None` for types that cannot carry one.
    pub fn mask_word(self) -> Option<WordSize> {
        match self {
            Scalar::UInt8 | Scalar::Boolean8 => Some(WordSize::W8),
            Scalar::UInt16 | Scalar::Boolean16 => Some(WordSize::W16),
            Scalar::UInt32 | Scalar::Boolean32 => Some(WordSize::W32),
            _ => None,
        }
    }
}

/// What a field holds.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// A primitive value, or a numeric array when the extent is not [Extent::Single].
    Scalar(Scalar),
    /// A nested record, or an array of them.
    Struct(RecordType),
    /// Raw bytes.
    Buffer,
    /// Zero-terminated text.
    String,
    /// Fixed grid of zero-terminated lines.
    StringArray,
    /// User-defined type handled by [Hooks], tagged with the field's first name.
    Custom(String),
}

impl FieldType {
    pub fn scalar(&self) -> Option<Scalar> {
        match self {
            FieldType::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn is_byte_run(&self) -> bool {
        matches!(self, FieldType::Buffer | FieldType::String)
    }
}

/// How many bytes a field covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extent {
    /// One element.
    Single,
    /// Explicit element count, or byte length for buffers and strings.
    Count(usize),
    /// Everything from the offset to the end of the buffer, minus `reserve` trailing bytes.
    Tail { reserve: usize },
    /// Checksum stored in the last bytes of the buffer.
    Trailer,
}

pub type Getter = Arc<dyn Fn(&str, &[u8]) -> Option<Value> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&str, &mut [u8], &Value) -> bool + Send + Sync>;

/// Getter and setter for a custom field. A getter returns `None` and a setter
/// returns `false` when the type tag is unknown to them.
#[derive(Clone, Default)]
pub struct Hooks {
    pub getter: Option<Getter>,
    pub setter: Option<Setter>,
}

impl Hooks {
    pub fn new() -> Self {
        Hooks::default()
    }

    pub fn getter(
        mut self,
        getter: impl Fn(&str, &[u8]) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter(
        mut self,
        setter: impl Fn(&str, &mut [u8], &Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.getter.is_none() && self.setter.is_none()
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("getter", &self.getter.is_some())
            .field("setter", &self.setter.is_some())
            .finish()
    }
}

pub type ChecksumFn = Arc<dyn Fn(&[u8], u64) -> u64 + Send + Sync>;

/// Checksum calculator: `calc(covered_bytes, initial)` over bytes from `start`
/// up to the checksum field.
#[derive(Clone)]
pub struct Checksum {
    pub calc: ChecksumFn,
    pub initial: u64,
    pub start: usize,
}

impl Checksum {
    pub fn new(calc: impl Fn(&[u8], u64) -> u64 + Send + Sync + 'static) -> Self {
        Checksum {
            calc: Arc::new(calc),
            initial: 0,
            start: 0,
        }
    }

    /// Seed passed to the calculator.
    pub fn initial(mut self, initial: u64) -> Self {
        self.initial = initial;
        self
    }

    /// First covered byte.
    pub fn start(mut self, start: usize) -> Self {
        self.start = start;
        self
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Checksum")
            .field("initial", &self.initial)
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

/// Description of one field. Aliases share a descriptor.
#[derive(Debug, Clone)]
pub struct FieldDesc {
    pub ty: FieldType,
    /// Byte offset from the record start; `-size` for a checksum trailer.
    pub offset: isize,
    pub extent: Extent,
    pub mask: Option<BitMask>,
    pub big_endian: bool,
    pub literal: Option<Value>,
    pub hooks: Option<Hooks>,
    pub encoding: Option<String>,
    /// Byte width of each line of a string array.
    pub line_length: Option<usize>,
    pub checksum: Option<Checksum>,
}

impl FieldDesc {
    pub fn new(ty: FieldType, extent: Extent) -> Self {
        FieldDesc {
            ty,
            offset: 0,
            extent,
            mask: None,
            big_endian: false,
            literal: None,
            hooks: None,
            encoding: None,
            line_length: None,
            checksum: None,
        }
    }

    /// Bytes per element.
    pub fn item_size(&self) -> usize {
        match &self.ty {
            FieldType::Scalar(s) => s.width(),
            FieldType::Struct(nested) => nested.base_size(),
            FieldType::StringArray => self.line_length.unwrap_or(0),
            FieldType::Buffer | FieldType::String | FieldType::Custom(_) => 1,
        }
    }

    pub fn is_tail(&self) -> bool {
        matches!(self.extent, Extent::Tail { .. })
    }

    pub fn is_checksum(&self) -> bool {
        self.extent == Extent::Trailer
    }

    /// Fields accessed through a single value rather than a view.
    pub fn is_value(&self) -> bool {
        match &self.ty {
            FieldType::Scalar(_) => matches!(self.extent, Extent::Single | Extent::Trailer),
            FieldType::String => true,
            FieldType::Custom(_) => self.hooks.as_ref().is_some_and(|h| !h.is_empty()),
            _ => false,
        }
    }

    /// Resolved byte range inside a buffer of `buf_len` bytes.
    pub(crate) fn span(&self, buf_len: usize) -> Range<usize> {
        let item = self.item_size();
        match self.extent {
            Extent::Trailer => buf_len.saturating_sub(item)..buf_len,
            Extent::Single => {
                let start = self.offset as usize;
                start..start + item
            }
            Extent::Count(count) => {
                let start = self.offset as usize;
                start..start + count * item
            }
            Extent::Tail { .. } => {
                let start = self.offset as usize;
                start..start + self.count(buf_len) * item
            }
        }
    }

    /// Number of elements inside a buffer of `buf_len` bytes.
    pub(crate) fn count(&self, buf_len: usize) -> usize {
        match self.extent {
            Extent::Single | Extent::Trailer => 1,
            Extent::Count(count) => count,
            Extent::Tail { reserve } => {
                let item = self.item_size();
                if item == 0 {
                    return 0;
                }
                let available = buf_len
                    .saturating_sub(reserve)
                    .saturating_sub(self.offset as usize);
                available / item
            }
        }
    }
}
