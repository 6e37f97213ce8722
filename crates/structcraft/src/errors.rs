//! Error types for layout construction and record access.

use thiserror::Error;

/// Errors produced while declaring fields on a [crate::layout::Layout].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    /// A field name or alias is already taken.
    #[error("field \"{0}\" already exists")]
    DuplicateField(String),
    /// A field was declared after a tail field that consumes the remaining bytes.
    #[error("invalid field \"{0}\": the tail field is already declared")]
    AfterTail(String),
    /// A field was declared after the checksum trailer.
    #[error("invalid field \"{0}\": the checksum must be the last field")]
    AfterChecksum(String),
    /// The checksum does not directly follow a buffer or string field.
    #[error("checksum \"{0}\" must follow immediately after a buffer or string field")]
    ChecksumPlacement(String),
    /// The tail field already reserved a different number of trailing bytes.
    #[error("invalid tail length for checksum \"{name}\": expected {expected} reserved bytes, found {found}")]
    ChecksumSizeMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
    /// `back` was called with a step count outside `0..=entries`.
    #[error("invalid argument for back: {steps}, expected 0..={max}")]
    InvalidBack { steps: usize, max: usize },
    /// Bit mask does not fit into its word.
    #[error("invalid bit mask [{offset}, {length}] for a {size}-bit word")]
    InvalidBitMask { offset: u32, length: u32, size: u32 },
    /// The field would end past the largest addressable offset.
    #[error("field \"{0}\" does not fit into an addressable record")]
    SizeOverflow(String),
    /// A modifier was applied before any field was declared.
    #[error("no field declared yet")]
    NoField,
    /// A modifier does not apply to the most recent field.
    #[error("{modifier} cannot be applied to field \"{field}\"")]
    InvalidModifier { modifier: &'static str, field: String },
}

/// Errors produced when constructing records or accessing their fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// Buffer is shorter than the record's base size.
    #[error("buffer size must be at least {expected} ({actual})")]
    BufferTooSmall { expected: usize, actual: usize },
    /// Write to a literal-constrained field with a different value.
    #[error("invalid value for \"{field}\", expected {expected}")]
    LiteralViolation { field: String, expected: String },
    /// Encoded text does not fit into the field.
    #[error("string is too long for \"{field}\": {len} bytes, at most {max}")]
    StringTooLong {
        field: String,
        len: usize,
        max: usize,
    },
    /// A custom hook did not recognize its type tag.
    #[error("unknown type \"{0}\"")]
    UnknownType(String),
    /// No field with this name exists.
    #[error("unknown field name \"{0}\"")]
    UnknownField(String),
    /// Index past the end of an array view.
    #[error("index {index} is out of bounds for \"{field}\" (length {len})")]
    IndexOutOfBounds {
        field: String,
        index: usize,
        len: usize,
    },
    /// The value or accessor does not match the field's type.
    #[error("field \"{field}\" expects {expected}")]
    TypeMismatch { field: String, expected: &'static str },
    /// Bit masks are only supported on unsigned and boolean types.
    #[error("field \"{0}\": signed and float types do not support bit masks")]
    MaskNotSupported(String),
    /// The text backend does not know the encoding.
    #[error("unknown encoding \"{0}\"")]
    UnknownEncoding(String),
    /// Text cannot be represented in the encoding.
    #[error("text cannot be encoded as {0}")]
    InvalidText(String),
    /// Byte order swap requested on a field without an element width.
    #[error("field \"{0}\" has no element width to swap")]
    NoElementWidth(String),
    /// The snapshot shape does not match the record.
    #[error("invalid snapshot for \"{field}\": {reason}")]
    InvalidSnapshot { field: String, reason: &'static str },
}
