//! Text encoding backends for string fields.
//!
//! String fields name their encoding (`"utf8"` when unspecified). The bytes are
//! converted by a [TextCodec]: a layout's own codec when one was set with
//! [crate::layout::Layout::with_codec], otherwise the process-wide backend.
//! The process-wide backend is [NativeCodec] unless another one was installed
//! with [install] before first use.

use std::sync::{Arc, OnceLock};

use crate::errors::RecordError;

/// Converts between text and bytes for a named encoding.
pub trait TextCodec: Send + Sync {
    fn decode(&self, bytes: &[u8], encoding: &str) -> Result<String, RecordError>;

    fn encode(&self, text: &str, encoding: &str) -> Result<Vec<u8>, RecordError>;
}

/// Encoding used when a string field does not name one.
pub const DEFAULT_ENCODING: &str = "utf8";

/// Built-in encodings: `utf8`, `ascii`, `latin1` (`binary`), `utf16le` (`ucs2`) and `hex`.
///
/// Decoding never fails for a known encoding: invalid sequences become
/// U+FFFD and ASCII drops the high bit. Encoding rejects text the encoding
/// cannot represent.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeCodec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Native {
    Utf8,
    Ascii,
    Latin1,
    Utf16Le,
    Hex,
}

impl Native {
    fn lookup(encoding: &str) -> Result<Native, RecordError> {
        match encoding.to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Native::Utf8),
            "ascii" => Ok(Native::Ascii),
            "latin1" | "binary" | "iso-8859-1" => Ok(Native::Latin1),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(Native::Utf16Le),
            "hex" => Ok(Native::Hex),
            _ => Err(RecordError::UnknownEncoding(encoding.to_string())),
        }
    }
}

fn invalid(encoding: &str) -> RecordError {
    RecordError::InvalidText(encoding.to_string())
}

impl TextCodec for NativeCodec {
    fn decode(&self, bytes: &[u8], encoding: &str) -> Result<String, RecordError> {
        match Native::lookup(encoding)? {
            Native::Utf8 => Ok(String::from_utf8_lossy(bytes).into_owned()),
            Native::Ascii => Ok(bytes.iter().map(|&b| (b & 0x7f) as char).collect()),
            Native::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Native::Utf16Le => {
                let units = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
                Ok(char::decode_utf16(units)
                    .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
                    .collect())
            }
            Native::Hex => Ok(bytes.iter().map(|b| format!("{:02x}", b)).collect()),
        }
    }

    fn encode(&self, text: &str, encoding: &str) -> Result<Vec<u8>, RecordError> {
        match Native::lookup(encoding)? {
            Native::Utf8 => Ok(text.as_bytes().to_vec()),
            Native::Ascii => {
                if !text.is_ascii() {
                    return Err(invalid(encoding));
                }
                Ok(text.as_bytes().to_vec())
            }
            Native::Latin1 => text
                .chars()
                .map(|c| u8::try_from(c as u32).map_err(|_| invalid(encoding)))
                .collect(),
            Native::Utf16Le => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Native::Hex => {
                if text.len() % 2 != 0 {
                    return Err(invalid(encoding));
                }
                (0..text.len())
                    .step_by(2)
                    .map(|i| {
                        text.get(i..i + 2)
                            .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                            .ok_or_else(|| invalid(encoding))
                    })
                    .collect()
            }
        }
    }
}

static BACKEND: OnceLock<Arc<dyn TextCodec>> = OnceLock::new();

/// Installs the process-wide backend. Fails, returning the codec, when a
/// backend is already in use.
pub fn install(codec: Arc<dyn TextCodec>) -> Result<(), Arc<dyn TextCodec>> {
    BACKEND.set(codec)?;
    log::debug!("installed custom text encoding backend");
    Ok(())
}

/// The process-wide backend.
pub fn backend() -> Arc<dyn TextCodec> {
    Arc::clone(BACKEND.get_or_init(|| Arc::new(NativeCodec)))
}

/// Decodes text up to the first zero byte.
pub(crate) fn read_text(
    codec: &dyn TextCodec,
    bytes: &[u8],
    encoding: &str,
) -> Result<String, RecordError> {
    let end = match Native::lookup(encoding) {
        Ok(Native::Utf16Le) => bytes
            .chunks_exact(2)
            .position(|unit| unit == [0, 0])
            .map_or(bytes.len() & !1, |units| units * 2),
        _ => bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len()),
    };
    codec.decode(&bytes[..end], encoding)
}

/// Encodes `text` into `dest`, zero-filling the remainder.
pub(crate) fn write_text(
    codec: &dyn TextCodec,
    dest: &mut [u8],
    field: &str,
    text: &str,
    encoding: &str,
) -> Result<(), RecordError> {
    let encoded = codec.encode(text, encoding)?;
    if encoded.len() > dest.len() {
        return Err(RecordError::StringTooLong {
            field: field.to_string(),
            len: encoded.len(),
            max: dest.len(),
        });
    }

    dest[..encoded.len()].copy_from_slice(&encoded);
    dest[encoded.len()..].fill(0);
    Ok(())
}
