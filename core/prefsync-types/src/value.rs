//! Dynamically typed preference values.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::key::ValueType;
use crate::{Error, Result};

/// A preference value of one of the supported kinds.
///
/// Equality is structural: two `Structured` values are equal when their JSON
/// trees are equal. Floats compare by bit pattern with every NaN collapsed
/// to one, so `NaN == NaN` and `0.0 != -0.0`.
#[derive(Debug, Clone)]
pub enum PrefValue {
    Bool(bool),
    Text(String),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    I16(i16),
    I8(i8),
    Structured(serde_json::Value),
}

impl PrefValue {
    /// Tag of this value's kind, matching [`ValueType::tag`].
    pub fn kind(&self) -> &'static str {
        match self {
            PrefValue::Bool(_) => "bool",
            PrefValue::Text(_) => "text",
            PrefValue::I32(_) => "i32",
            PrefValue::I64(_) => "i64",
            PrefValue::F32(_) => "f32",
            PrefValue::F64(_) => "f64",
            PrefValue::I16(_) => "i16",
            PrefValue::I8(_) => "i8",
            PrefValue::Structured(_) => "json",
        }
    }

    /// Whether this value may be stored under a key of the given type.
    pub fn matches(&self, value_type: &ValueType) -> bool {
        self.kind() == value_type.tag()
    }

    /// Builds a structured value from any serializable type.
    pub fn structured<T: Serialize>(value: &T) -> Result<Self> {
        Ok(PrefValue::Structured(serde_json::to_value(value)?))
    }

    /// Converts a structured value back into `T`.
    pub fn into_structured<T: DeserializeOwned>(self) -> Result<T> {
        match self {
            PrefValue::Structured(json) => Ok(serde_json::from_value(json)?),
            other => Err(Error::TypeMismatch {
                expected: "json".to_string(),
                found: other.kind(),
            }),
        }
    }

    /// Converts into a primitive preference type.
    pub fn into_typed<T: PrefType>(self) -> Result<T> {
        let found = self.kind();
        T::from_pref(self).ok_or_else(|| Error::TypeMismatch {
            expected: T::value_type().to_string(),
            found,
        })
    }

    /// JSON form of the value, used for persistence and display.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PrefValue::Bool(v) => serde_json::Value::from(*v),
            PrefValue::Text(v) => serde_json::Value::from(v.as_str()),
            PrefValue::I32(v) => serde_json::Value::from(*v),
            PrefValue::I64(v) => serde_json::Value::from(*v),
            PrefValue::F32(v) => float_to_json(f64::from(*v)),
            PrefValue::F64(v) => float_to_json(*v),
            PrefValue::I16(v) => serde_json::Value::from(*v),
            PrefValue::I8(v) => serde_json::Value::from(*v),
            PrefValue::Structured(v) => v.clone(),
        }
    }

    /// Rebuilds a value of the declared type from its JSON form.
    ///
    /// Float kinds also accept `"NaN"`, `"Infinity"` and `"-Infinity"`.
    pub fn from_json(value_type: &ValueType, json: serde_json::Value) -> Result<Self> {
        let value = match value_type {
            ValueType::Bool => PrefValue::Bool(serde_json::from_value(json)?),
            ValueType::Text => PrefValue::Text(serde_json::from_value(json)?),
            ValueType::I32 => PrefValue::I32(serde_json::from_value(json)?),
            ValueType::I64 => PrefValue::I64(serde_json::from_value(json)?),
            ValueType::F32 => PrefValue::F32(float_from_json(json)? as f32),
            ValueType::F64 => PrefValue::F64(float_from_json(json)?),
            ValueType::I16 => PrefValue::I16(serde_json::from_value(json)?),
            ValueType::I8 => PrefValue::I8(serde_json::from_value(json)?),
            ValueType::Other(_) => PrefValue::Structured(json),
        };
        Ok(value)
    }
}

impl PartialEq for PrefValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PrefValue::Bool(a), PrefValue::Bool(b)) => a == b,
            (PrefValue::Text(a), PrefValue::Text(b)) => a == b,
            (PrefValue::I32(a), PrefValue::I32(b)) => a == b,
            (PrefValue::I64(a), PrefValue::I64(b)) => a == b,
            (PrefValue::F32(a), PrefValue::F32(b)) => f32_bits(*a) == f32_bits(*b),
            (PrefValue::F64(a), PrefValue::F64(b)) => f64_bits(*a) == f64_bits(*b),
            (PrefValue::I16(a), PrefValue::I16(b)) => a == b,
            (PrefValue::I8(a), PrefValue::I8(b)) => a == b,
            (PrefValue::Structured(a), PrefValue::Structured(b)) => a == b,
            _ => false,
        }
    }
}

fn f32_bits(v: f32) -> u32 {
    if v.is_nan() { f32::NAN.to_bits() } else { v.to_bits() }
}

fn f64_bits(v: f64) -> u64 {
    if v.is_nan() { f64::NAN.to_bits() } else { v.to_bits() }
}

// JSON numbers cannot carry non-finite floats; those persist as strings.
fn float_to_json(v: f64) -> serde_json::Value {
    if v.is_nan() {
        serde_json::Value::from("NaN")
    } else if v == f64::INFINITY {
        serde_json::Value::from("Infinity")
    } else if v == f64::NEG_INFINITY {
        serde_json::Value::from("-Infinity")
    } else {
        serde_json::Value::from(v)
    }
}

fn float_from_json(json: serde_json::Value) -> Result<f64> {
    match json.as_str() {
        Some("NaN") => Ok(f64::NAN),
        Some("Infinity") => Ok(f64::INFINITY),
        Some("-Infinity") => Ok(f64::NEG_INFINITY),
        _ => Ok(serde_json::from_value(json)?),
    }
}

/// A primitive Rust type that maps one-to-one onto a [`ValueType`].
pub trait PrefType: Sized {
    /// The declared type for keys holding `Self`.
    fn value_type() -> ValueType;

    /// Wraps `self` as a preference value.
    fn into_pref(self) -> PrefValue;

    /// Unwraps a preference value of the matching kind.
    fn from_pref(value: PrefValue) -> Option<Self>;
}

macro_rules! impl_pref_type {
    ($ty:ty, $variant:ident) => {
        impl PrefType for $ty {
            fn value_type() -> ValueType {
                ValueType::$variant
            }

            fn into_pref(self) -> PrefValue {
                PrefValue::$variant(self)
            }

            fn from_pref(value: PrefValue) -> Option<Self> {
                match value {
                    PrefValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }

        impl From<$ty> for PrefValue {
            fn from(value: $ty) -> Self {
                PrefValue::$variant(value)
            }
        }
    };
}

impl_pref_type!(bool, Bool);
impl_pref_type!(String, Text);
impl_pref_type!(i32, I32);
impl_pref_type!(i64, I64);
impl_pref_type!(f32, F32);
impl_pref_type!(f64, F64);
impl_pref_type!(i16, I16);
impl_pref_type!(i8, I8);

impl From<&str> for PrefValue {
    fn from(value: &str) -> Self {
        PrefValue::Text(value.to_string())
    }
}
