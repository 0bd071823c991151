//! Typed preference keys.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::value::PrefType;
use crate::Error;

/// Decodes a JSON document into a structured type and returns its canonical
/// JSON form, or `None` when the document decodes to no value.
pub type DecodeFn = fn(&str) -> Result<Option<serde_json::Value>, serde_json::Error>;

/// Runtime descriptor of a structured value type.
///
/// Built from any `T: Serialize + DeserializeOwned`. Decoding goes through `T`,
/// so a payload that does not fit `T` is rejected, and the stored form is
/// whatever `T` serializes back to.
#[derive(Clone, Copy)]
pub struct TypeDescriptor {
    name: &'static str,
    decode: DecodeFn,
}

impl TypeDescriptor {
    /// Descriptor for the structured type `T`.
    pub fn of<T: Serialize + DeserializeOwned>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            decode: decode_as::<T>,
        }
    }

    /// Descriptor accepting any JSON document.
    pub fn json() -> Self {
        Self::of::<serde_json::Value>()
    }

    /// The Rust type name this descriptor decodes into.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether this descriptor accepts arbitrary JSON.
    pub fn is_json(&self) -> bool {
        self.name == std::any::type_name::<serde_json::Value>()
    }

    /// Decodes `json` into the described type.
    pub fn decode(&self, json: &str) -> Result<Option<serde_json::Value>, serde_json::Error> {
        (self.decode)(json)
    }
}

fn decode_as<T: Serialize + DeserializeOwned>(
    json: &str,
) -> Result<Option<serde_json::Value>, serde_json::Error> {
    // An empty document carries no value rather than being malformed.
    if json.trim().is_empty() {
        return Ok(None);
    }
    let decoded: Option<T> = serde_json::from_str(json)?;
    decoded.map(|v| serde_json::to_value(&v)).transpose()
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TypeDescriptor").field(&self.name).finish()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

/// The declared type of a preference value.
///
/// The mapping from declared type to extraction path is closed: every
/// primitive kind has its own accessor, everything else is a structured
/// value decoded from JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Bool,
    Text,
    I32,
    I64,
    F32,
    F64,
    I16,
    I8,
    Other(TypeDescriptor),
}

impl ValueType {
    /// Short tag used in manifests and persisted rows.
    pub fn tag(&self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Text => "text",
            ValueType::I32 => "i32",
            ValueType::I64 => "i64",
            ValueType::F32 => "f32",
            ValueType::F64 => "f64",
            ValueType::I16 => "i16",
            ValueType::I8 => "i8",
            ValueType::Other(_) => "json",
        }
    }

    /// Whether values of this type go through the generic JSON decoder.
    pub fn is_structured(&self) -> bool {
        matches!(self, ValueType::Other(_))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Other(desc) if !desc.is_json() => write!(f, "json<{}>", desc.name()),
            other => f.write_str(other.tag()),
        }
    }
}

impl FromStr for ValueType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bool" => Ok(ValueType::Bool),
            "text" | "string" => Ok(ValueType::Text),
            "i32" => Ok(ValueType::I32),
            "i64" => Ok(ValueType::I64),
            "f32" => Ok(ValueType::F32),
            "f64" => Ok(ValueType::F64),
            "i16" => Ok(ValueType::I16),
            "i8" => Ok(ValueType::I8),
            "json" => Ok(ValueType::Other(TypeDescriptor::json())),
            other => Err(Error::UnknownValueType(other.to_string())),
        }
    }
}

impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(serde::de::Error::custom)
    }
}

/// Identifies a preference and the type its value must have.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypedKey {
    name: String,
    #[serde(rename = "type")]
    value_type: ValueType,
}

impl TypedKey {
    /// Creates a key with an explicit value type.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    /// Creates a key for a primitive preference type.
    pub fn of<T: PrefType>(name: impl Into<String>) -> Self {
        Self::new(name, T::value_type())
    }

    /// Creates a key whose value is the structured type `T`, decoded from JSON.
    pub fn structured<T: Serialize + DeserializeOwned>(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Other(TypeDescriptor::of::<T>()))
    }

    /// The key name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared value type.
    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }
}

impl fmt::Display for TypedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.value_type)
    }
}
