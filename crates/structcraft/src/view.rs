//! Zero-copy views over array fields.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Range;
use std::sync::Arc;

use byteorder::{ByteOrder, LittleEndian};

use crate::buffer::Buffer;
use crate::encoding::{self, TextCodec};
use crate::errors::RecordError;
use crate::field::Scalar;
use crate::record::Record;

mod sealed {
    pub trait Sealed {}
}

/// Element type of an [ArrayView]. Elements are stored little-endian.
pub trait Element: Copy + fmt::Debug + sealed::Sealed {
    const SCALAR: Scalar;

    fn load(bytes: &[u8]) -> Self;

    fn store(self, bytes: &mut [u8]);
}

impl sealed::Sealed for u8 {}
impl Element for u8 {
    const SCALAR: Scalar = Scalar::UInt8;

    fn load(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn store(self, bytes: &mut [u8]) {
        bytes[0] = self;
    }
}

impl sealed::Sealed for i8 {}
impl Element for i8 {
    const SCALAR: Scalar = Scalar::Int8;

    fn load(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn store(self, bytes: &mut [u8]) {
        bytes[0] = self as u8;
    }
}

macro_rules! element {
    ($($t:ty => $scalar:ident, $read:ident, $write:ident;)*) => {
        $(
            impl sealed::Sealed for $t {}
            impl Element for $t {
                const SCALAR: Scalar = Scalar::$scalar;

                fn load(bytes: &[u8]) -> Self {
                    LittleEndian::$read(bytes)
                }

                fn store(self, bytes: &mut [u8]) {
                    LittleEndian::$write(bytes, self)
                }
            }
        )*
    };
}

element! {
    i16 => Int16, read_i16, write_i16;
    u16 => UInt16, read_u16, write_u16;
    i32 => Int32, read_i32, write_i32;
    u32 => UInt32, read_u32, write_u32;
    i64 => Int64, read_i64, write_i64;
    u64 => UInt64, read_u64, write_u64;
    f32 => Float32, read_f32, write_f32;
    f64 => Float64, read_f64, write_f64;
}

fn out_of_bounds(field: &str, index: usize, len: usize) -> RecordError {
    RecordError::IndexOutOfBounds {
        field: field.to_string(),
        index,
        len,
    }
}

/// Typed view of a numeric array field. Reads and writes go straight to the
/// record's buffer.
#[derive(Clone)]
pub struct ArrayView<T> {
    name: String,
    buf: Buffer,
    _marker: PhantomData<T>,
}

impl<T: Element> ArrayView<T> {
    pub(crate) fn new(name: &str, buf: Buffer) -> Self {
        ArrayView {
            name: name.to_string(),
            buf,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len() / T::SCALAR.width()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn range(&self, index: usize) -> Result<Range<usize>, RecordError> {
        let len = self.len();
        if index >= len {
            return Err(out_of_bounds(&self.name, index, len));
        }
        let width = T::SCALAR.width();
        Ok(index * width..(index + 1) * width)
    }

    pub fn get(&self, index: usize) -> Result<T, RecordError> {
        let range = self.range(index)?;
        Ok(self.buf.read(|bytes| T::load(&bytes[range])))
    }

    pub fn set(&self, index: usize, value: T) -> Result<(), RecordError> {
        let range = self.range(index)?;
        self.buf.write(|bytes| value.store(&mut bytes[range]));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let width = T::SCALAR.width();
        (0..self.len()).map(move |i| self.buf.read(|bytes| T::load(&bytes[i * width..(i + 1) * width])))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// The viewed bytes.
    pub fn raw(&self) -> &Buffer {
        &self.buf
    }
}

impl<T: Element> fmt::Debug for ArrayView<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Fixed-shape array of nested records.
#[derive(Clone)]
pub struct RecordArray {
    name: String,
    items: Vec<Record>,
}

impl RecordArray {
    pub(crate) fn new(name: &str, items: Vec<Record>) -> Self {
        RecordArray {
            name: name.to_string(),
            items,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Record, RecordError> {
        self.items
            .get(index)
            .ok_or_else(|| out_of_bounds(&self.name, index, self.items.len()))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.items.iter()
    }
}

impl<'a> IntoIterator for &'a RecordArray {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

/// Fixed grid of zero-terminated strings.
#[derive(Clone)]
pub struct StringArray {
    name: String,
    buf: Buffer,
    width: usize,
    encoding: String,
    codec: Arc<dyn TextCodec>,
}

impl StringArray {
    pub(crate) fn new(
        name: &str,
        buf: Buffer,
        width: usize,
        encoding: &str,
        codec: Arc<dyn TextCodec>,
    ) -> Self {
        StringArray {
            name: name.to_string(),
            buf,
            width,
            encoding: encoding.to_string(),
            codec,
        }
    }

    /// Number of lines.
    pub fn len(&self) -> usize {
        if self.width == 0 {
            return 0;
        }
        self.buf.len() / self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte width of each line.
    pub fn width(&self) -> usize {
        self.width
    }

    fn range(&self, index: usize) -> Result<Range<usize>, RecordError> {
        let len = self.len();
        if index >= len {
            return Err(out_of_bounds(&self.name, index, len));
        }
        Ok(index * self.width..(index + 1) * self.width)
    }

    pub fn get(&self, index: usize) -> Result<String, RecordError> {
        let range = self.range(index)?;
        self.buf.read(|bytes| {
            encoding::read_text(self.codec.as_ref(), &bytes[range], &self.encoding)
        })
    }

    pub fn set(&self, index: usize, text: &str) -> Result<(), RecordError> {
        let range = self.range(index)?;
        self.buf.write(|bytes| {
            encoding::write_text(
                self.codec.as_ref(),
                &mut bytes[range],
                &self.name,
                text,
                &self.encoding,
            )
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<String, RecordError>> + '_ {
        (0..self.len()).map(move |i| self.get(i))
    }

    pub fn to_vec(&self) -> Result<Vec<String>, RecordError> {
        self.iter().collect()
    }
}

impl fmt::Debug for StringArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StringArray")
            .field("name", &self.name)
            .field("lines", &self.len())
            .field("width", &self.width)
            .field("encoding", &self.encoding)
            .finish()
    }
}
