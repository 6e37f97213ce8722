//! Compiled record types.
//!
//! A [RecordType] is the frozen result of a [crate::layout::Layout]. It is
//! cheap to clone, immutable and shared by every record built from it.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::encoding::{self, TextCodec};
use crate::errors::RecordError;
use crate::field::{Checksum, Extent, FieldDesc, FieldType};
use crate::record::Record;
use crate::snapshot::Snapshot;

struct Inner {
    name: Option<String>,
    base_size: usize,
    fields: Vec<FieldDesc>,
    entries: Vec<(String, usize)>,
    index: HashMap<String, usize>,
    codec: Option<Arc<dyn TextCodec>>,
}

/// Immutable description of a record: base size, field descriptors and name table.
#[derive(Clone)]
pub struct RecordType {
    inner: Arc<Inner>,
}

impl RecordType {
    pub(crate) fn new(
        name: Option<String>,
        base_size: usize,
        fields: Vec<FieldDesc>,
        entries: Vec<(String, usize)>,
        index: HashMap<String, usize>,
        codec: Option<Arc<dyn TextCodec>>,
    ) -> Self {
        RecordType {
            inner: Arc::new(Inner {
                name,
                base_size,
                fields,
                entries,
                index,
                codec,
            }),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Minimum buffer length of a record of this type.
    pub fn base_size(&self) -> usize {
        self.inner.base_size
    }

    pub fn field(&self, name: &str) -> Option<&FieldDesc> {
        self.inner.index.get(name).map(|&i| &self.inner.fields[i])
    }

    /// Names in declaration order, aliases included, with their descriptors.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDesc)> {
        self.inner
            .entries
            .iter()
            .map(|(name, i)| (name.as_str(), &self.inner.fields[*i]))
    }

    /// Distinct descriptors in declaration order.
    pub(crate) fn descriptors(&self) -> &[FieldDesc] {
        &self.inner.fields
    }

    /// Byte offset of `name`. Checksum fields report a negative offset from the end.
    pub fn offset_of(&self, name: &str) -> Option<isize> {
        self.field(name).map(|desc| desc.offset)
    }

    pub fn offsets(&self) -> BTreeMap<String, isize> {
        self.fields()
            .map(|(name, desc)| (name.to_string(), desc.offset))
            .collect()
    }

    /// True when both handles come from the same compiled layout.
    pub fn same_type(&self, other: &RecordType) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn codec(&self) -> Arc<dyn TextCodec> {
        match &self.inner.codec {
            Some(codec) => Arc::clone(codec),
            None => encoding::backend(),
        }
    }

    /// Record over `base_size` zero bytes.
    pub fn alloc(&self) -> Result<Record, RecordError> {
        self.wrap(Buffer::alloc(self.base_size()))
    }

    /// Record over `len` zero bytes; `len` must cover the base size.
    pub fn alloc_len(&self, len: usize) -> Result<Record, RecordError> {
        self.check_len(len)?;
        self.wrap(Buffer::alloc(len))
    }

    /// Record aliasing `buffer`: writes through the record are visible to every
    /// other holder of the same allocation.
    pub fn wrap(&self, buffer: Buffer) -> Result<Record, RecordError> {
        self.check_len(buffer.len())?;
        init_literals(self, &buffer)?;
        Ok(Record::bind(self.clone(), buffer))
    }

    /// Record over a private copy of `buffer`.
    pub fn wrap_cloned(&self, buffer: &Buffer) -> Result<Record, RecordError> {
        self.check_len(buffer.len())?;
        self.wrap(buffer.deep_clone())
    }

    /// Record over a copy of `bytes`.
    pub fn from_bytes(&self, bytes: &[u8]) -> Result<Record, RecordError> {
        self.check_len(bytes.len())?;
        self.wrap(Buffer::copy_from(bytes))
    }

    fn check_len(&self, actual: usize) -> Result<(), RecordError> {
        if actual < self.base_size() {
            return Err(RecordError::BufferTooSmall {
                expected: self.base_size(),
                actual,
            });
        }
        Ok(())
    }

    /// Checksum operation, available when the last field is a checksum with a calculator.
    pub fn checksum(&self) -> Option<ChecksumOp<'_>> {
        let (name, index) = self.inner.entries.last()?;
        let desc = &self.inner.fields[*index];
        let checksum = desc.checksum.as_ref()?;
        Some(ChecksumOp {
            ty: self,
            name,
            desc,
            checksum,
        })
    }

    /// Snapshot of a copy of `bytes`, or `None` when they cannot hold a record.
    pub fn snapshot_of(&self, bytes: &[u8]) -> Option<Snapshot> {
        self.from_bytes(bytes).ok()?.to_snapshot().ok()
    }
}

/// Writes literal values, including those of nested records, in declaration order.
fn init_literals(ty: &RecordType, buffer: &Buffer) -> Result<(), RecordError> {
    let len = buffer.len();
    let record = Record::bind(ty.clone(), buffer.clone());
    for desc in ty.descriptors() {
        match (&desc.ty, &desc.literal) {
            (_, Some(literal)) => record.write_unchecked(desc, "literal", literal)?,
            (FieldType::Struct(nested), None) => {
                let size = nested.base_size();
                let span = desc.span(len);
                for i in 0..desc.count(len) {
                    let start = span.start + i * size;
                    init_literals(nested, &buffer.slice(start..start + size))?;
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Checksum calculation bound to a record type.
pub struct ChecksumOp<'a> {
    ty: &'a RecordType,
    name: &'a str,
    desc: &'a FieldDesc,
    checksum: &'a Checksum,
}

impl ChecksumOp<'_> {
    /// Name of the checksum field.
    pub fn field(&self) -> &str {
        self.name
    }

    /// Runs the calculator over the covered bytes of `record` and returns the
    /// result, storing it in the checksum field when `update` is set.
    pub fn compute(&self, record: &Record, update: bool) -> Result<u64, RecordError> {
        if !record.record_type().same_type(self.ty) {
            return Err(RecordError::TypeMismatch {
                field: self.name.to_string(),
                expected: "a record of the checksum's type",
            });
        }

        let size = self.desc.item_size();
        let value = record.raw().read(|bytes| {
            let end = bytes.len() - size;
            let start = self.checksum.start.min(end);
            (self.checksum.calc)(&bytes[start..end], self.checksum.initial)
        });
        log::trace!(
            "checksum {} over {} bytes = {:#x}",
            self.name,
            record.len() - size,
            value
        );

        if update {
            record.set(self.name, value)?;
        }
        Ok(value)
    }
}

impl fmt::Debug for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RecordType");
        s.field("name", &self.name())
            .field("base_size", &self.base_size());
        for (name, desc) in self.fields() {
            let extent = match desc.extent {
                Extent::Single => String::new(),
                Extent::Count(count) => format!("[{}]", count),
                Extent::Tail { .. } => "[..]".to_string(),
                Extent::Trailer => "@end".to_string(),
            };
            s.field(name, &format_args!("{}{}", desc.offset, extent));
        }
        s.finish()
    }
}
