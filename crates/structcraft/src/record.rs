//! Record instances: name-keyed accessors over a shared buffer.

use crate::buffer::Buffer;
use crate::codec::ScalarCodec;
use crate::compiled::RecordType;
use crate::encoding::{self, DEFAULT_ENCODING};
use crate::errors::RecordError;
use crate::field::{Extent, FieldDesc, FieldType, Scalar};
use crate::value::Value;
use crate::view::{ArrayView, Element, RecordArray, StringArray};

/// A record bound to one buffer. Cloning the handle shares the buffer.
#[derive(Clone)]
pub struct Record {
    ty: RecordType,
    buf: Buffer,
}

fn mismatch(field: &str, expected: &'static str) -> RecordError {
    RecordError::TypeMismatch {
        field: field.to_string(),
        expected,
    }
}

fn scalar_codec<'a>(name: &'a str, scalar: Scalar, desc: &FieldDesc) -> ScalarCodec<'a> {
    ScalarCodec {
        name,
        scalar,
        mask: desc.mask,
        big_endian: desc.big_endian,
    }
}

/// Little-endian, unmasked codec for array elements.
fn element_codec(name: &str, scalar: Scalar) -> ScalarCodec<'_> {
    ScalarCodec {
        name,
        scalar,
        mask: None,
        big_endian: false,
    }
}

fn is_single(desc: &FieldDesc) -> bool {
    matches!(desc.extent, Extent::Single | Extent::Trailer)
}

fn exact_integer(value: &Value) -> Option<i128> {
    match value {
        Value::Int(v) => Some(*v as i128),
        Value::UInt(v) => Some(*v as i128),
        _ => None,
    }
}

impl Record {
    pub(crate) fn bind(ty: RecordType, buf: Buffer) -> Self {
        Record { ty, buf }
    }

    pub fn record_type(&self) -> &RecordType {
        &self.ty
    }

    /// The bound buffer.
    pub fn raw(&self) -> &Buffer {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<&FieldDesc, RecordError> {
        self.ty
            .field(name)
            .ok_or_else(|| RecordError::UnknownField(name.to_string()))
    }

    /// Reads a scalar, bit-field, checksum, string or hooked custom field.
    pub fn get(&self, name: &str) -> Result<Value, RecordError> {
        let desc = self.lookup(name)?;
        let span = desc.span(self.len());

        match &desc.ty {
            FieldType::Scalar(scalar) if is_single(desc) => {
                let codec = scalar_codec(name, *scalar, desc);
                self.buf.read(|bytes| codec.decode(&bytes[span]))
            }
            FieldType::String => {
                let codec = self.ty.codec();
                let enc = desc.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
                self.buf
                    .read(|bytes| encoding::read_text(codec.as_ref(), &bytes[span], enc))
                    .map(Value::Text)
            }
            FieldType::Custom(tag) => {
                let unknown = || RecordError::UnknownType(tag.clone());
                let getter = desc
                    .hooks
                    .as_ref()
                    .and_then(|hooks| hooks.getter.as_ref())
                    .ok_or_else(unknown)?;
                self.buf
                    .read(|bytes| getter(tag, &bytes[span]))
                    .ok_or_else(unknown)
            }
            _ => Err(mismatch(name, "a scalar, string or custom field")),
        }
    }

    /// Writes a field readable with [Record::get]. Fields with a literal only
    /// accept that literal.
    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), RecordError> {
        let value = value.into();
        let desc = self.lookup(name)?;

        if let Some(literal) = &desc.literal {
            let accepted = match (desc.ty.scalar(), exact_integer(&value), exact_integer(literal)) {
                // Compared before encoding so out-of-range integers cannot wrap onto the literal.
                (Some(scalar), Some(given), Some(expected)) if scalar.is_integer() => given == expected,
                (Some(scalar), ..) => scalar_codec(name, scalar, desc).normalize(&value)? == *literal,
                (None, ..) => value == *literal,
            };
            if !accepted {
                return Err(RecordError::LiteralViolation {
                    field: name.to_string(),
                    expected: literal.to_string(),
                });
            }
        }

        self.write_unchecked(desc, name, &value)
    }

    pub(crate) fn write_unchecked(
        &self,
        desc: &FieldDesc,
        name: &str,
        value: &Value,
    ) -> Result<(), RecordError> {
        let span = desc.span(self.len());

        match &desc.ty {
            FieldType::Scalar(scalar) if is_single(desc) => {
                let codec = scalar_codec(name, *scalar, desc);
                self.buf.write(|bytes| codec.encode(&mut bytes[span], value))
            }
            FieldType::String => {
                let text = value.as_str().ok_or_else(|| mismatch(name, "text"))?;
                let codec = self.ty.codec();
                let enc = desc.encoding.as_deref().unwrap_or(DEFAULT_ENCODING);
                self.buf.write(|bytes| {
                    encoding::write_text(codec.as_ref(), &mut bytes[span], name, text, enc)
                })
            }
            FieldType::Custom(tag) => {
                let setter = desc
                    .hooks
                    .as_ref()
                    .and_then(|hooks| hooks.setter.as_ref())
                    .ok_or_else(|| RecordError::UnknownType(tag.clone()))?;
                if self.buf.write(|bytes| setter(tag, &mut bytes[span], value)) {
                    Ok(())
                } else {
                    Err(RecordError::UnknownType(tag.clone()))
                }
            }
            _ => Err(mismatch(name, "a scalar, string or custom field")),
        }
    }

    /// Zero-copy view of a numeric array field. Buffer fields can be viewed as `u8`.
    pub fn array<T: Element>(&self, name: &str) -> Result<ArrayView<T>, RecordError> {
        let desc = self.lookup(name)?;
        let fits = match desc.ty {
            FieldType::Scalar(scalar) => scalar == T::SCALAR && !is_single(desc),
            FieldType::Buffer => T::SCALAR == Scalar::UInt8,
            _ => false,
        };
        if !fits {
            return Err(mismatch(name, "a numeric array of the requested element type"));
        }

        Ok(ArrayView::new(name, self.buf.slice(desc.span(self.len()))))
    }

    /// Zero-copy view of a buffer field or a custom field without hooks.
    pub fn bytes(&self, name: &str) -> Result<Buffer, RecordError> {
        let desc = self.lookup(name)?;
        match desc.ty {
            FieldType::Buffer => {}
            FieldType::Custom(_) if desc.hooks.is_none() => {}
            _ => return Err(mismatch(name, "a buffer")),
        }

        Ok(self.buf.slice(desc.span(self.len())))
    }

    /// Nested record sharing this record's buffer.
    pub fn nested(&self, name: &str) -> Result<Record, RecordError> {
        let desc = self.lookup(name)?;
        match &desc.ty {
            FieldType::Struct(nested) if desc.extent == Extent::Single => Ok(Record::bind(
                nested.clone(),
                self.buf.slice(desc.span(self.len())),
            )),
            _ => Err(mismatch(name, "a nested record")),
        }
    }

    /// Array of nested records sharing this record's buffer.
    pub fn records(&self, name: &str) -> Result<RecordArray, RecordError> {
        let desc = self.lookup(name)?;
        let nested = match &desc.ty {
            FieldType::Struct(nested) if desc.extent != Extent::Single => nested,
            _ => return Err(mismatch(name, "a record array")),
        };

        let len = self.len();
        let start = desc.span(len).start;
        let size = nested.base_size();
        let items = (0..desc.count(len))
            .map(|i| {
                let offset = start + i * size;
                Record::bind(nested.clone(), self.buf.slice(offset..offset + size))
            })
            .collect();
        Ok(RecordArray::new(name, items))
    }

    /// View of a string-array field.
    pub fn strings(&self, name: &str) -> Result<StringArray, RecordError> {
        let desc = self.lookup(name)?;
        if !matches!(desc.ty, FieldType::StringArray) {
            return Err(mismatch(name, "a string array"));
        }

        Ok(StringArray::new(
            name,
            self.buf.slice(desc.span(self.len())),
            desc.line_length.unwrap_or(0),
            desc.encoding.as_deref().unwrap_or(DEFAULT_ENCODING),
            self.ty.codec(),
        ))
    }

    /// Reverses the byte order of every element of a field in place and
    /// returns a view of the field's bytes.
    pub fn swap(&self, name: &str) -> Result<Buffer, RecordError> {
        let desc = self.lookup(name)?;
        let width = match &desc.ty {
            FieldType::Scalar(scalar) => scalar.width(),
            FieldType::Struct(_) => return Err(RecordError::NoElementWidth(name.to_string())),
            FieldType::Buffer
            | FieldType::String
            | FieldType::StringArray
            | FieldType::Custom(_) => 1,
        };

        let view = self.buf.slice(desc.span(self.len()));
        view.swap(width);
        Ok(view)
    }

    /// Decodes every element of a numeric array field.
    pub(crate) fn elements(&self, name: &str, desc: &FieldDesc) -> Result<Vec<Value>, RecordError> {
        let scalar = desc.ty.scalar().ok_or_else(|| mismatch(name, "a numeric array"))?;
        let codec = element_codec(name, scalar);
        let span = desc.span(self.len());
        self.buf.read(|bytes| {
            bytes[span]
                .chunks_exact(scalar.width())
                .map(|chunk| codec.decode(chunk))
                .collect()
        })
    }

    /// Writes one element of a numeric array field.
    pub(crate) fn set_element(
        &self,
        name: &str,
        desc: &FieldDesc,
        index: usize,
        value: &Value,
    ) -> Result<(), RecordError> {
        let scalar = desc.ty.scalar().ok_or_else(|| mismatch(name, "a numeric array"))?;
        let len = desc.count(self.len());
        if index >= len {
            return Err(RecordError::IndexOutOfBounds {
                field: name.to_string(),
                index,
                len,
            });
        }

        let codec = element_codec(name, scalar);
        let start = desc.span(self.len()).start + index * scalar.width();
        self.buf
            .write(|bytes| codec.encode(&mut bytes[start..start + scalar.width()], value))
    }
}
