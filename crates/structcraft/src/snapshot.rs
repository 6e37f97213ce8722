//! Detached snapshots of records and partial assignment from them.
//!
//! [Record::to_snapshot] copies every field into a plain [Snapshot] tree in
//! declaration order. 64-bit integers become decimal text so they survive
//! formats with double-precision numbers. [Record::assign] merges a partial
//! snapshot back into a live record.

use crate::errors::RecordError;
use crate::field::{Extent, FieldDesc, FieldType, Scalar};
use crate::record::Record;
use crate::value::Value;

/// Plain, detached value tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Snapshot>),
    /// Named fields in declaration order.
    Record(Vec<(String, Snapshot)>),
}

impl Snapshot {
    /// Builds a record snapshot from `(name, value)` pairs.
    pub fn record<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Snapshot>,
    {
        Snapshot::Record(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Value of `key` in a record snapshot.
    pub fn get(&self, key: &str) -> Option<&Snapshot> {
        match self {
            Snapshot::Record(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Snapshot]> {
        match self {
            Snapshot::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Snapshot::Null)
    }

    /// Converts to a field value. Lists of integers become bytes.
    fn to_value(&self, field: &str) -> Result<Value, RecordError> {
        let invalid = |reason| RecordError::InvalidSnapshot {
            field: field.to_string(),
            reason,
        };
        match self {
            Snapshot::Bool(v) => Ok(Value::Bool(*v)),
            Snapshot::Int(v) => Ok(Value::Int(*v)),
            Snapshot::Float(v) => Ok(Value::Float(*v)),
            Snapshot::Text(v) => Ok(Value::Text(v.clone())),
            Snapshot::List(items) => items
                .iter()
                .map(|item| match item {
                    Snapshot::Int(v) => u8::try_from(*v).map_err(|_| invalid("byte out of range")),
                    _ => Err(invalid("expected a list of bytes")),
                })
                .collect::<Result<Vec<u8>, _>>()
                .map(Value::Bytes),
            Snapshot::Null | Snapshot::Record(_) => Err(invalid("expected a value")),
        }
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        match value {
            Value::Bool(v) => Snapshot::Bool(v),
            Value::Int(v) => Snapshot::Int(v),
            Value::UInt(v) => match i64::try_from(v) {
                Ok(v) => Snapshot::Int(v),
                Err(_) => Snapshot::Text(v.to_string()),
            },
            Value::Float(v) => Snapshot::Float(v),
            Value::Text(v) => Snapshot::Text(v),
            Value::Bytes(v) => Snapshot::List(v.into_iter().map(|b| Snapshot::Int(b as i64)).collect()),
        }
    }
}

macro_rules! snapshot_from {
    ($variant:ident as $target:ty: $($t:ty),*) => {
        $(
            impl From<$t> for Snapshot {
                fn from(v: $t) -> Self {
                    Snapshot::$variant(v as $target)
                }
            }
        )*
    };
}

snapshot_from!(Int as i64: i8, i16, i32, i64, u8, u16, u32);
snapshot_from!(Float as f64: f32, f64);

impl From<bool> for Snapshot {
    fn from(v: bool) -> Self {
        Snapshot::Bool(v)
    }
}

impl From<&str> for Snapshot {
    fn from(v: &str) -> Self {
        Snapshot::Text(v.to_string())
    }
}

impl From<String> for Snapshot {
    fn from(v: String) -> Self {
        Snapshot::Text(v)
    }
}

impl<T: Into<Snapshot>> From<Vec<T>> for Snapshot {
    fn from(items: Vec<T>) -> Self {
        Snapshot::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Snapshot>> From<Option<T>> for Snapshot {
    fn from(v: Option<T>) -> Self {
        v.map_or(Snapshot::Null, Into::into)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Snapshot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::{SerializeMap, SerializeSeq};

        match self {
            Snapshot::Null => serializer.serialize_none(),
            Snapshot::Bool(v) => serializer.serialize_bool(*v),
            Snapshot::Int(v) => serializer.serialize_i64(*v),
            Snapshot::Float(v) => serializer.serialize_f64(*v),
            Snapshot::Text(v) => serializer.serialize_str(v),
            Snapshot::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Snapshot::Record(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

fn wide_aware(value: Value, wide: bool) -> Snapshot {
    if wide {
        Snapshot::Text(value.to_string())
    } else {
        Snapshot::from(value)
    }
}

/// Text snapshots of 64-bit fields parse back into integers.
fn parse_wide(field: &str, text: &str, signed: bool) -> Result<Value, RecordError> {
    let invalid = || RecordError::InvalidSnapshot {
        field: field.to_string(),
        reason: "expected a decimal integer",
    };
    if signed {
        text.parse().map(Value::Int).map_err(|_| invalid())
    } else {
        text.parse().map(Value::UInt).map_err(|_| invalid())
    }
}

fn scalar_value(field: &str, desc: &FieldDesc, snapshot: &Snapshot) -> Result<Value, RecordError> {
    match (desc.ty.scalar(), snapshot) {
        (Some(scalar), Snapshot::Text(text)) if scalar.is_wide() => {
            parse_wide(field, text, scalar == Scalar::Int64)
        }
        _ => snapshot.to_value(field),
    }
}

fn expect_list<'a>(field: &str, snapshot: &'a Snapshot) -> Result<&'a [Snapshot], RecordError> {
    snapshot.as_list().ok_or_else(|| RecordError::InvalidSnapshot {
        field: field.to_string(),
        reason: "expected a list",
    })
}

impl Record {
    /// Copies every field into a detached snapshot. Custom fields with only a
    /// setter are left out.
    pub fn to_snapshot(&self) -> Result<Snapshot, RecordError> {
        let mut entries = Vec::new();
        for (name, desc) in self.record_type().fields() {
            if let Some(snapshot) = self.field_snapshot(name, desc)? {
                entries.push((name.to_string(), snapshot));
            }
        }
        Ok(Snapshot::Record(entries))
    }

    fn field_snapshot(&self, name: &str, desc: &FieldDesc) -> Result<Option<Snapshot>, RecordError> {
        let single = matches!(desc.extent, Extent::Single | Extent::Trailer);
        let snapshot = match &desc.ty {
            FieldType::Scalar(scalar) if single => wide_aware(self.get(name)?, scalar.is_wide()),
            FieldType::Scalar(scalar) => Snapshot::List(
                self.elements(name, desc)?
                    .into_iter()
                    .map(|v| wide_aware(v, scalar.is_wide()))
                    .collect(),
            ),
            FieldType::String => Snapshot::from(self.get(name)?),
            FieldType::Buffer => Snapshot::from(Value::Bytes(self.bytes(name)?.to_vec())),
            FieldType::StringArray => Snapshot::from(self.strings(name)?.to_vec()?),
            FieldType::Struct(_) if single => self.nested(name)?.to_snapshot()?,
            FieldType::Struct(_) => Snapshot::List(
                self.records(name)?
                    .iter()
                    .map(Record::to_snapshot)
                    .collect::<Result<_, _>>()?,
            ),
            FieldType::Custom(_) => match &desc.hooks {
                None => Snapshot::from(Value::Bytes(self.bytes(name)?.to_vec())),
                Some(hooks) if hooks.getter.is_some() => Snapshot::from(self.get(name)?),
                Some(_) => return Ok(None),
            },
        };
        Ok(Some(snapshot))
    }

    /// Merges a partial record snapshot into this record. `Null` entries and
    /// `Null` list slots are skipped; fields not named keep their bytes.
    /// Custom fields with only a getter are skipped too, so a snapshot of this
    /// record can always be assigned back.
    pub fn assign(&self, snapshot: &Snapshot) -> Result<(), RecordError> {
        let Snapshot::Record(entries) = snapshot else {
            return Err(RecordError::InvalidSnapshot {
                field: self.record_type().name().unwrap_or("<record>").to_string(),
                reason: "expected a record",
            });
        };

        for (name, value) in entries {
            if value.is_null() {
                continue;
            }
            let desc = self.lookup(name)?;
            self.assign_field(name, desc, value)?;
        }
        Ok(())
    }

    fn assign_field(&self, name: &str, desc: &FieldDesc, value: &Snapshot) -> Result<(), RecordError> {
        let single = matches!(desc.extent, Extent::Single | Extent::Trailer);
        match &desc.ty {
            FieldType::Scalar(_) if single => self.set(name, scalar_value(name, desc, value)?),
            FieldType::Scalar(_) => {
                for (i, item) in expect_list(name, value)?.iter().enumerate() {
                    if !item.is_null() {
                        self.set_element(name, desc, i, &scalar_value(name, desc, item)?)?;
                    }
                }
                Ok(())
            }
            FieldType::String => self.set(name, value.to_value(name)?),
            FieldType::Custom(_) if desc.hooks.as_ref().is_some_and(|h| h.setter.is_none()) => Ok(()),
            FieldType::Custom(_) if desc.hooks.is_some() => self.set(name, value.to_value(name)?),
            FieldType::Buffer | FieldType::Custom(_) => {
                let bytes = self.bytes(name)?;
                let len = bytes.len();
                for (i, item) in expect_list(name, value)?.iter().enumerate() {
                    match item {
                        Snapshot::Null => {}
                        Snapshot::Int(b) if i < len => {
                            let byte = u8::try_from(*b).map_err(|_| RecordError::InvalidSnapshot {
                                field: name.to_string(),
                                reason: "byte out of range",
                            })?;
                            bytes.write(|dest| dest[i] = byte);
                        }
                        Snapshot::Int(_) => {
                            return Err(RecordError::IndexOutOfBounds {
                                field: name.to_string(),
                                index: i,
                                len,
                            });
                        }
                        _ => {
                            return Err(RecordError::InvalidSnapshot {
                                field: name.to_string(),
                                reason: "expected a list of bytes",
                            });
                        }
                    }
                }
                Ok(())
            }
            FieldType::StringArray => {
                let strings = self.strings(name)?;
                for (i, item) in expect_list(name, value)?.iter().enumerate() {
                    match item {
                        Snapshot::Null => {}
                        Snapshot::Text(text) => strings.set(i, text)?,
                        _ => {
                            return Err(RecordError::InvalidSnapshot {
                                field: name.to_string(),
                                reason: "expected a list of text",
                            });
                        }
                    }
                }
                Ok(())
            }
            FieldType::Struct(_) if single => self.nested(name)?.assign(value),
            FieldType::Struct(_) => {
                let records = self.records(name)?;
                for (i, item) in expect_list(name, value)?.iter().enumerate() {
                    if !item.is_null() {
                        records.get(i)?.assign(item)?;
                    }
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;

    #[test]
    fn test_wide_integers_as_text() {
        let ty = Layout::new()
            .uint64_le("big")
            .unwrap()
            .int64_array("list", Some(2))
            .unwrap()
            .compile();
        let record = ty.alloc().unwrap();
        record.set("big", u64::MAX).unwrap();
        record.array::<i64>("list").unwrap().set(1, -2).unwrap();

        let snapshot = record.to_snapshot().unwrap();
        assert_eq!(
            snapshot,
            Snapshot::record([
                ("big", Snapshot::from("18446744073709551615")),
                ("list", Snapshot::from(vec!["0", "-2"])),
            ])
        );

        let copy = ty.alloc().unwrap();
        copy.assign(&snapshot).unwrap();
        assert_eq!(copy.raw(), record.raw());
    }

    #[test]
    fn test_assign_skips_null() {
        let ty = Layout::new().uint8("a").unwrap().uint8("b").unwrap().compile();
        let record = ty.from_bytes(&[1, 2]).unwrap();
        record
            .assign(&Snapshot::record([("a", Snapshot::Null), ("b", Snapshot::Int(9))]))
            .unwrap();
        assert_eq!(record.raw(), &[1u8, 9][..]);
    }

    #[test]
    fn test_assign_unknown_key() {
        let ty = Layout::new().uint8("a").unwrap().compile();
        let record = ty.alloc().unwrap();
        assert_eq!(
            record.assign(&Snapshot::record([("z", 1)])).unwrap_err(),
            RecordError::UnknownField("z".to_string())
        );
    }

    #[test]
    fn test_assign_requires_record() {
        let record = Layout::named("Foo").uint8("a").unwrap().compile().alloc().unwrap();
        assert_eq!(
            record.assign(&Snapshot::Int(1)).unwrap_err(),
            RecordError::InvalidSnapshot {
                field: "Foo".to_string(),
                reason: "expected a record"
            }
        );
    }

    #[test]
    fn test_sparse_buffer_assign() {
        let ty = Layout::new().buffer("data", Some(3)).unwrap().compile();
        let record = ty.from_bytes(&[1, 2, 3]).unwrap();
        record
            .assign(&Snapshot::record([(
                "data",
                Snapshot::List(vec![Snapshot::Null, Snapshot::Int(7)]),
            )]))
            .unwrap();
        assert_eq!(record.raw(), &[1u8, 7, 3][..]);
    }

    #[test]
    fn test_assign_byte_out_of_range() {
        let ty = Layout::new().buffer("data", Some(2)).unwrap().compile();
        let record = ty.from_bytes(&[1, 2]).unwrap();
        for bad in [300i64, -1] {
            assert_eq!(
                record
                    .assign(&Snapshot::record([("data", Snapshot::from(vec![bad]))]))
                    .unwrap_err(),
                RecordError::InvalidSnapshot {
                    field: "data".to_string(),
                    reason: "byte out of range",
                }
            );
        }
        assert_eq!(record.raw(), &[1u8, 2][..]);
        assert_eq!(
            Snapshot::from(vec![256i64]).to_value("data").unwrap_err(),
            RecordError::InvalidSnapshot {
                field: "data".to_string(),
                reason: "byte out of range",
            }
        );
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize_as_map() {
        let snapshot = Snapshot::record([
            ("id", Snapshot::Int(1)),
            ("name", Snapshot::from("x")),
            ("tags", Snapshot::from(vec![1i64, 2])),
        ]);
        assert_eq!(
            serde_json::to_string(&snapshot).unwrap(),
            r#"{"id":1,"name":"x","tags":[1,2]}"#
        );
    }
}
