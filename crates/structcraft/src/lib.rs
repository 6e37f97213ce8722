//! # structcraft
//!
//! Declarative binary record layouts with zero-copy accessors.
//!
//! Describe a record once with a [Layout]: scalars in either byte order, bit
//! fields, numeric arrays, strings, nested records, custom types and a trailing
//! checksum. Compile it into a [RecordType], then bind records to byte buffers
//! and read or write fields by name. Nested records and array views share the
//! record's buffer, so every write is visible through every view.
//!
//! ## Example
//!
//! ```
//! use structcraft::{Checksum, Layout, Snapshot, Value};
//!
//! let point = Layout::named("Point").int16_le("x")?.int16_le("y")?.compile();
//!
//! let packet = Layout::named("Packet")
//!     .uint16_be("magic")?
//!     .literal(0xcafeu16)?
//!     .bits8([("version", (0, 3)), ("flags", (3, 5))])?
//!     .record("origin", &point)?
//!     .string("label", Some(8))?
//!     .buffer("payload", None)?
//!     .crc8_with("crc", Checksum::new(|bytes, init| {
//!         bytes.iter().fold(init, |acc, b| (acc + *b as u64) & 0xff)
//!     }))?
//!     .compile();
//!
//! let record = packet.alloc_len(packet.base_size() + 2)?;
//! record.set("version", 2u8)?;
//! record.nested("origin")?.set("x", -7)?;
//! record.set("label", "hello")?;
//! record.bytes("payload")?.copy_from_slice(&[1, 2]);
//! packet.checksum().ok_or("no checksum")?.compute(&record, true)?;
//!
//! assert_eq!(record.get("magic")?, Value::UInt(0xcafe));
//! assert_eq!(record.get("version")?, Value::UInt(2));
//! assert_eq!(
//!     record.to_snapshot()?.get("origin"),
//!     Some(&Snapshot::record([("x", -7), ("y", 0)]))
//! );
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod bits;
pub mod buffer;
mod codec;
pub mod compiled;
pub mod encoding;
pub mod errors;
pub mod field;
mod inspect;
pub mod layout;
pub mod record;
pub mod snapshot;
pub mod value;
pub mod view;

pub use bits::{BitMask, WordSize};
pub use buffer::Buffer;
pub use compiled::{ChecksumOp, RecordType};
pub use encoding::{NativeCodec, TextCodec};
pub use errors::{LayoutError, RecordError};
pub use field::{Checksum, Hooks, Scalar};
pub use layout::Layout;
pub use record::Record;
pub use snapshot::Snapshot;
pub use value::Value;
pub use view::{ArrayView, Element, RecordArray, StringArray};
