use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use structcraft::{Buffer, Hooks, Layout, NativeCodec, RecordError, RecordType, Snapshot, TextCodec, Value};

/// Windows-1251 subset: ASCII plus the basic Cyrillic alphabet.
struct Cp1251;

impl TextCodec for Cp1251 {
    fn decode(&self, bytes: &[u8], encoding: &str) -> Result<String, RecordError> {
        if encoding != "cp1251" {
            return NativeCodec.decode(bytes, encoding);
        }
        bytes
            .iter()
            .map(|&b| match b {
                0xc0..=0xff => char::from_u32(0x410 + (b - 0xc0) as u32),
                0x00..=0x7f => Some(b as char),
                _ => None,
            })
            .collect::<Option<String>>()
            .ok_or_else(|| RecordError::InvalidText(encoding.to_string()))
    }

    fn encode(&self, text: &str, encoding: &str) -> Result<Vec<u8>, RecordError> {
        if encoding != "cp1251" {
            return NativeCodec.encode(text, encoding);
        }
        text.chars()
            .map(|c| match c as u32 {
                code @ 0x410..=0x44f => Some((code - 0x410 + 0xc0) as u8),
                code @ 0..=0x7f => Some(code as u8),
                _ => None,
            })
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| RecordError::InvalidText(encoding.to_string()))
    }
}

fn point() -> RecordType {
    Layout::named("Point")
        .int16_le("x")
        .unwrap()
        .int16_le("y")
        .unwrap()
        .compile()
}

#[test]
fn test_strings_with_layout_codec() {
    let ty = Layout::named("Text")
        .with_codec(Arc::new(Cp1251))
        .string("cyrillic", Some(10))
        .unwrap()
        .encoding("cp1251")
        .unwrap()
        .string("plain", Some(10))
        .unwrap()
        .compile();
    let record = ty.alloc().unwrap();

    record.set("cyrillic", "Привет").unwrap();
    assert_eq!(record.raw().slice(0..7), [0xcfu8, 0xf0, 0xe8, 0xe2, 0xe5, 0xf2, 0]);
    assert_eq!(record.get("cyrillic").unwrap(), Value::from("Привет"));

    assert_eq!(
        record.set("plain", "Привет").unwrap_err(),
        RecordError::StringTooLong {
            field: "plain".to_string(),
            len: 12,
            max: 10
        }
    );
    record.set("plain", "Hello").unwrap();
    assert_eq!(record.get("plain").unwrap(), Value::from("Hello"));
}

#[test]
fn test_string_overwrite_clears_tail() {
    let ty = Layout::new().string("name", Some(6)).unwrap().compile();
    let record = ty.alloc().unwrap();
    record.set("name", "abcdef").unwrap();
    record.set("name", "xy").unwrap();
    assert_eq!(record.raw(), &b"xy\0\0\0\0"[..]);
    assert_eq!(record.get("name").unwrap(), Value::from("xy"));
}

#[test]
fn test_unknown_encoding() {
    let ty = Layout::new()
        .string("name", Some(4))
        .unwrap()
        .encoding("koi8-r")
        .unwrap()
        .compile();
    let record = ty.alloc().unwrap();
    assert_eq!(
        record.get("name").unwrap_err(),
        RecordError::UnknownEncoding("koi8-r".to_string())
    );
}

#[test]
fn test_string_array_grid() {
    let ty = Layout::new().string_array("lines", 5, 20).unwrap().compile();
    assert_eq!(ty.base_size(), 100);

    let record = ty.alloc().unwrap();
    let lines = record.strings("lines").unwrap();
    assert_eq!(lines.len(), 5);
    lines.set(0, "first").unwrap();
    lines.set(4, "last").unwrap();
    assert_eq!(
        lines.to_vec().unwrap(),
        vec!["first", "", "", "", "last"]
    );
    assert_eq!(record.raw().get(80), Some(b'l'));
    assert_eq!(
        lines.get(5).unwrap_err(),
        RecordError::IndexOutOfBounds {
            field: "lines".to_string(),
            index: 5,
            len: 5
        }
    );
    assert!(lines.set(7, "nope").is_err());
}

#[test]
fn test_nested_record_shares_buffer() {
    let ty = Layout::new()
        .uint8("tag")
        .unwrap()
        .record("origin", &point())
        .unwrap()
        .compile();
    assert_eq!(ty.base_size(), 5);

    let record = ty.alloc().unwrap();
    let origin = record.nested("origin").unwrap();
    origin.set("x", -2).unwrap();
    origin.set("y", 0x0102).unwrap();

    assert_eq!(record.raw(), &[0u8, 0xfe, 0xff, 0x02, 0x01][..]);
    assert_eq!(
        record.nested("origin").unwrap().get("x").unwrap(),
        Value::Int(-2)
    );
}

#[test]
fn test_record_arrays() {
    let fixed = Layout::new()
        .record_array("points", &point(), Some(3))
        .unwrap()
        .compile();
    assert_eq!(fixed.base_size(), 12);

    let tail = Layout::new()
        .uint8("count")
        .unwrap()
        .record_array("points", &point(), None)
        .unwrap()
        .compile();
    assert_eq!(tail.base_size(), 5);

    let record = tail.alloc_len(15).unwrap();
    let points = record.records("points").unwrap();
    assert_eq!(points.len(), 3);
    points.get(2).unwrap().set("y", 5).unwrap();
    assert_eq!(record.raw().slice(11..13), [5u8, 0]);
    assert!(matches!(
        points.get(3),
        Err(RecordError::IndexOutOfBounds { index: 3, len: 3, .. })
    ));

    let xs: Vec<Value> = points.iter().map(|p| p.get("x").unwrap()).collect();
    assert_eq!(xs, vec![Value::Int(0); 3]);
}

#[test]
fn test_numeric_array_views() {
    let ty = Layout::new()
        .uint16_array("words", Some(2))
        .unwrap()
        .float32_array("samples", None)
        .unwrap()
        .compile();
    assert_eq!(ty.base_size(), 8);

    let record = ty.alloc_len(12).unwrap();
    let words = record.array::<u16>("words").unwrap();
    words.set(0, 0x0102).unwrap();
    assert_eq!(record.raw().slice(0..2), [0x02u8, 0x01]);

    let samples = record.array::<f32>("samples").unwrap();
    assert_eq!(samples.len(), 2);
    samples.set(1, -0.5).unwrap();
    assert_eq!(samples.to_vec(), vec![0.0, -0.5]);
    assert!(samples.get(2).is_err());
}

#[test]
fn test_wrap_aliases_caller_buffer() {
    let ty = Layout::new().uint32_be("id").unwrap().compile();
    let buffer = Buffer::from_vec(vec![0, 0, 0, 1, 0xff]);
    let record = ty.wrap(buffer.clone()).unwrap();
    assert_eq!(record.get("id").unwrap(), Value::UInt(1));

    buffer.write(|bytes| bytes[2] = 1);
    assert_eq!(record.get("id").unwrap(), Value::UInt(0x101));
    assert!(record.raw().same_view(&buffer));

    assert_eq!(
        ty.from_bytes(&[1, 2]).unwrap_err(),
        RecordError::BufferTooSmall {
            expected: 4,
            actual: 2
        }
    );
}

#[test]
fn test_swap_field() {
    let ty = Layout::new()
        .uint32_le("value")
        .unwrap()
        .int16_array("pair", Some(2))
        .unwrap()
        .buffer("raw", Some(2))
        .unwrap()
        .compile();
    let record = ty.alloc().unwrap();
    record.set("value", 0x1122_3344u32).unwrap();
    record.array::<i16>("pair").unwrap().set(1, 0x0102).unwrap();

    let view = record.swap("value").unwrap();
    assert_eq!(view, [0x11u8, 0x22, 0x33, 0x44]);
    assert_eq!(record.get("value").unwrap(), Value::UInt(0x4433_2211));

    record.swap("pair").unwrap();
    assert_eq!(record.array::<i16>("pair").unwrap().get(1).unwrap(), 0x0201);

    record.raw().write(|bytes| bytes[8] = 9);
    assert_eq!(record.swap("raw").unwrap(), [9u8, 0]);
}

fn ip_hooks() -> Hooks {
    Hooks::new()
        .getter(|tag, bytes| match tag {
            "ip" => Some(Value::Text(
                bytes.iter().map(u8::to_string).collect::<Vec<_>>().join("."),
            )),
            _ => None,
        })
        .setter(|tag, bytes, value| {
            let parts: Option<Vec<u8>> = match (tag, value.as_str()) {
                ("ip", Some(text)) => text.split('.').map(|p| p.parse().ok()).collect(),
                _ => None,
            };
            match parts {
                Some(parts) if parts.len() == bytes.len() => {
                    bytes.copy_from_slice(&parts);
                    true
                }
                _ => false,
            }
        })
}

#[test]
fn test_custom_hooks() {
    let ty = Layout::new()
        .custom("ip", Some(4), ip_hooks())
        .unwrap()
        .custom("mac", Some(6), ip_hooks())
        .unwrap()
        .compile();
    assert_eq!(ty.base_size(), 10);

    let record = ty.alloc().unwrap();
    record.set("ip", "192.168.0.1").unwrap();
    assert_eq!(record.raw().slice(0..4), [192u8, 168, 0, 1]);
    assert_eq!(record.get("ip").unwrap(), Value::from("192.168.0.1"));

    assert_eq!(
        record.get("mac").unwrap_err(),
        RecordError::UnknownType("mac".to_string())
    );
    assert_eq!(
        record.set("mac", "00:11").unwrap_err(),
        RecordError::UnknownType("mac".to_string())
    );
}

#[test]
fn test_custom_snapshot_rules() {
    let write_only = Hooks::new().setter(|_, bytes, value| {
        bytes[0] = value.as_u64().unwrap_or(0) as u8;
        true
    });
    let ty = Layout::new()
        .custom("ip", Some(4), ip_hooks())
        .unwrap()
        .custom("sink", Some(1), write_only)
        .unwrap()
        .custom("blob", Some(2), Hooks::new())
        .unwrap()
        .compile();
    let record = ty.from_bytes(&[10, 0, 0, 1, 7, 0xaa, 0xbb]).unwrap();

    assert_eq!(
        record.to_snapshot().unwrap(),
        Snapshot::record([
            ("ip", Snapshot::from("10.0.0.1")),
            ("blob", Snapshot::from(vec![0xaai64, 0xbb])),
        ])
    );
}

#[test]
fn test_getter_only_custom_round_trip() {
    let read_only = Hooks::new().getter(|_, bytes| Some(Value::UInt(bytes[0] as u64 * 2)));
    let ty = Layout::new()
        .uint8("id")
        .unwrap()
        .custom("doubled", Some(1), read_only)
        .unwrap()
        .compile();
    let record = ty.from_bytes(&[1, 21]).unwrap();
    let snapshot = record.to_snapshot().unwrap();
    assert_eq!(snapshot.get("doubled"), Some(&Snapshot::Int(42)));

    let copy = ty.alloc().unwrap();
    copy.assign(&snapshot).unwrap();
    assert_eq!(copy.raw(), &[1u8, 0][..]);
}

fn device() -> RecordType {
    Layout::named("Device")
        .uint8("id")
        .unwrap()
        .uint64_le("serial")
        .unwrap()
        .string("name", Some(8))
        .unwrap()
        .int16_array("offsets", Some(2))
        .unwrap()
        .record("origin", &point())
        .unwrap()
        .record_array("path", &point(), Some(2))
        .unwrap()
        .string_array("notes", 2, 4)
        .unwrap()
        .buffer("payload", None)
        .unwrap()
        .compile()
}

#[test]
fn test_snapshot_serializes_to_json() {
    let ty = device();
    let record = ty.alloc_len(ty.base_size() + 2).unwrap();
    record.set("id", 1u8).unwrap();
    record.set("serial", u64::MAX).unwrap();
    record.set("name", "dev").unwrap();
    record.array::<i16>("offsets").unwrap().set(1, -2).unwrap();
    record.nested("origin").unwrap().set("x", 3).unwrap();
    record.records("path").unwrap().get(1).unwrap().set("y", 4).unwrap();
    record.strings("notes").unwrap().set(0, "ok").unwrap();
    record.bytes("payload").unwrap().copy_from_slice(&[9, 8]);

    let snapshot = record.to_snapshot().unwrap();
    assert_eq!(
        serde_json::to_value(&snapshot).unwrap(),
        json!({
            "id": 1,
            "serial": "18446744073709551615",
            "name": "dev",
            "offsets": [0, -2],
            "origin": {"x": 3, "y": 0},
            "path": [{"x": 0, "y": 0}, {"x": 0, "y": 4}],
            "notes": ["ok", ""],
            "payload": [9, 8]
        })
    );

    assert_eq!(ty.snapshot_of(&record.raw().to_vec()), Some(snapshot));
    assert_eq!(ty.snapshot_of(&[0; 4]), None);
}

#[test]
fn test_deep_assign_merges() {
    let ty = device();
    let record = ty.alloc().unwrap();
    record.set("id", 5u8).unwrap();
    record.nested("origin").unwrap().set("x", 11).unwrap();

    record
        .assign(&Snapshot::record([
            ("serial", Snapshot::from("42")),
            ("origin", Snapshot::record([("y", 12)])),
            (
                "path",
                Snapshot::List(vec![Snapshot::Null, Snapshot::record([("x", 7)])]),
            ),
            ("notes", Snapshot::List(vec![Snapshot::Null, Snapshot::from("hey")])),
            ("offsets", Snapshot::List(vec![Snapshot::Int(-1)])),
            ("name", Snapshot::Null),
        ]))
        .unwrap();

    assert_eq!(record.get("id").unwrap(), Value::UInt(5));
    assert_eq!(record.get("serial").unwrap(), Value::UInt(42));
    let origin = record.nested("origin").unwrap();
    assert_eq!(origin.get("x").unwrap(), Value::Int(11));
    assert_eq!(origin.get("y").unwrap(), Value::Int(12));
    let path = record.records("path").unwrap();
    assert_eq!(path.get(1).unwrap().get("x").unwrap(), Value::Int(7));
    assert_eq!(record.strings("notes").unwrap().get(1).unwrap(), "hey");
    assert_eq!(record.array::<i16>("offsets").unwrap().to_vec(), vec![-1, 0]);

    assert_eq!(
        record
            .assign(&Snapshot::record([("origin", Snapshot::record([("z", 1)]))]))
            .unwrap_err(),
        RecordError::UnknownField("z".to_string())
    );
}

#[test]
fn test_snapshot_round_trip_through_assign() {
    let ty = device();
    let source = ty.alloc().unwrap();
    source.set("serial", 1u64 << 60).unwrap();
    source.set("name", "copy").unwrap();
    source.records("path").unwrap().get(0).unwrap().set("x", -9).unwrap();

    let target = ty.alloc().unwrap();
    target.assign(&source.to_snapshot().unwrap()).unwrap();
    assert_eq!(target.raw(), source.raw());
}

#[test]
fn test_display_and_debug() {
    let ty = Layout::named("Pair")
        .uint8("a")
        .unwrap()
        .uint16_be("b")
        .unwrap()
        .compile();
    let record = ty.from_bytes(&[1, 2, 3]).unwrap();
    assert_eq!(record.to_string(), "Pair <01=0203>");
    assert!(format!("{:?}", record).starts_with("Pair Record("));
}

proptest! {
    #[test]
    fn swap_twice_restores(bytes in proptest::collection::vec(any::<u8>(), 16)) {
        let ty = Layout::new()
            .uint64_array("wide", Some(1))
            .unwrap()
            .uint32_le("word")
            .unwrap()
            .uint16_array("pair", Some(2))
            .unwrap()
            .compile();
        let record = ty.from_bytes(&bytes).unwrap();
        for name in ["wide", "word", "pair"] {
            record.swap(name).unwrap();
            record.swap(name).unwrap();
        }
        prop_assert_eq!(record.raw().to_vec(), bytes);
    }

    #[test]
    fn scalar_round_trip(a in any::<i32>(), b in any::<u16>(), c in any::<f64>().prop_filter("finite", |v| v.is_finite())) {
        let ty = Layout::new()
            .int32_be("a")
            .unwrap()
            .uint16_le("b")
            .unwrap()
            .float64_be("c")
            .unwrap()
            .compile();
        let record = ty.alloc().unwrap();
        record.set("a", a).unwrap();
        record.set("b", b).unwrap();
        record.set("c", c).unwrap();
        prop_assert_eq!(record.get("a").unwrap(), Value::Int(a as i64));
        prop_assert_eq!(record.get("b").unwrap(), Value::UInt(b as u64));
        prop_assert_eq!(record.get("c").unwrap(), Value::Float(c));
    }
}
