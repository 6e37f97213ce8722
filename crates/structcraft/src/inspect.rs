//! Human-readable formatting of records.
//!
//! `Display` prints the record name followed by the hex bytes of every field in
//! declaration order, fields separated by `=`:
//!
//! ```text
//! Packet <01=3412=6869000000>
//! ```
//!
//! `Debug` prints the record's snapshot.

use std::fmt;

use crate::record::Record;

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ty = self.record_type();
        let len = self.len();
        write!(f, "{} <", ty.name().unwrap_or("Record"))?;
        self.raw().read(|bytes| {
            for (i, desc) in ty.descriptors().iter().enumerate() {
                if i > 0 {
                    f.write_str("=")?;
                }
                for byte in &bytes[desc.span(len)] {
                    write!(f, "{:02x}", byte)?;
                }
            }
            Ok(())
        })?;
        f.write_str(">")
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.record_type().name().unwrap_or("Record");
        match self.to_snapshot() {
            Ok(snapshot) => write!(f, "{} {:?}", name, snapshot),
            Err(err) => write!(f, "{} <{}>", name, err),
        }
    }
}
