//! Type-directed decoding of remote values.
//!
//! The declared type of a key picks the snapshot accessor: primitives go
//! through the widest matching accessor and are narrowed with `as` casts
//! (truncating for integers, round-to-nearest for `f32`), text is unquoted,
//! and everything else is decoded from the raw JSON text through the key's
//! [`TypeDescriptor`](prefsync_types::TypeDescriptor).

use crate::error::{SyncError, SyncResult};
use crate::remote::SnapshotReader;
use prefsync_types::{PrefValue, TypedKey, ValueType};

/// Outcome of decoding one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The snapshot has no entry with exactly this name.
    Absent,
    /// The entry exists but decodes to no value.
    Null,
    /// A value of the key's declared type.
    Value(PrefValue),
}

impl Decoded {
    /// The decoded value, if any.
    pub fn into_value(self) -> Option<PrefValue> {
        match self {
            Decoded::Value(v) => Some(v),
            Decoded::Absent | Decoded::Null => None,
        }
    }
}

/// Whether `reader` holds an entry named exactly `name`.
///
/// Prefix listings may include longer names, so the exact name must be
/// among the matches.
pub fn is_present<R: SnapshotReader + ?Sized>(name: &str, reader: &R) -> bool {
    reader.keys_with_prefix(name).contains(name)
}

/// Decodes `key` from the snapshot exposed by `reader`.
///
/// Only structured keys can fail; the error names the key and leaves the
/// rest of a pass unaffected.
pub fn decode_key<R: SnapshotReader + ?Sized>(key: &TypedKey, reader: &R) -> SyncResult<Decoded> {
    let name = key.name();
    if !is_present(name, reader) {
        return Ok(Decoded::Absent);
    }

    let value = match key.value_type() {
        ValueType::Bool => PrefValue::Bool(reader.get_bool(name)),
        ValueType::Text => PrefValue::Text(strip_json_quotes(&reader.get_string(name)).to_string()),
        ValueType::I32 => PrefValue::I32(reader.get_i64(name) as i32),
        ValueType::I64 => PrefValue::I64(reader.get_i64(name)),
        ValueType::F32 => PrefValue::F32(reader.get_f64(name) as f32),
        ValueType::F64 => PrefValue::F64(reader.get_f64(name)),
        ValueType::I16 => PrefValue::I16(reader.get_i64(name) as i16),
        ValueType::I8 => PrefValue::I8(reader.get_i64(name) as i8),
        ValueType::Other(descriptor) => {
            let json = reader.get_string(name);
            match descriptor.decode(&json) {
                Ok(Some(value)) => PrefValue::Structured(value),
                Ok(None) => return Ok(Decoded::Null),
                Err(source) => {
                    return Err(SyncError::Decode {
                        key: name.to_string(),
                        source,
                    });
                }
            }
        }
    };
    Ok(Decoded::Value(value))
}

/// Removes one pair of surrounding double quotes.
///
/// Strings shorter than two characters are returned unchanged, so a lone
/// `"` stays `"`.
pub fn strip_json_quotes(raw: &str) -> &str {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        &raw[1..raw.len() - 1]
    } else {
        raw
    }
}
