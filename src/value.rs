use std::collections::HashMap;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// Macro for basic TryInto implementation (non-numeric primitives, collections)
macro_rules! try_into_impl_basic {
  ($target_type:ty, $variant:ident, $expected_type_str:literal) => {
    impl TryInto<$target_type> for PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(inner_value),
          other => Err(ConfigError::TypeMismatch {
            // Key context is not available within TryInto itself.
            // The caller (get_into) handles KeyNotFound before converting.
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }

    impl TryInto<$target_type> for &PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(inner_value.clone()),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }
  };
  // Override for Copy types where clone isn't needed on ref access
  ($target_type:ty, $variant:ident, $expected_type_str:literal, Copy) => {
    impl TryInto<$target_type> for PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(inner_value),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }

    impl TryInto<$target_type> for &PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(*inner_value),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }
  };
}

// Macro for numeric TryInto where a narrowing cast occurs
macro_rules! try_into_impl_numeric_cast {
  ($target_type:ty, $variant:ident, $expected_type_str:literal) => {
    impl TryInto<$target_type> for PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(inner_value as $target_type),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }

    impl TryInto<$target_type> for &PropValue {
      type Error = ConfigError;

      #[inline]
      fn try_into(self) -> Result<$target_type, Self::Error> {
        match self {
          PropValue::$variant(inner_value) => Ok(*inner_value as $target_type),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: $expected_type_str,
            found_type: other.type_name(),
          }),
        }
      }
    }
  };
}

// Macro to implement From<primitive> for PropValue
macro_rules! from_impl_numeric {
  ($from_type:ty, $variant:ident, $cast_type:ty) => {
    impl From<$from_type> for PropValue {
      #[inline]
      fn from(value: $from_type) -> Self {
        PropValue::$variant(value as $cast_type)
      }
    }
  };
}

// Macro for Vec<T> TryInto conversion
macro_rules! try_into_impl_vec {
  ($target_element_type:ty) => {
    impl TryInto<Vec<$target_element_type>> for PropValue {
      type Error = ConfigError;

      fn try_into(self) -> Result<Vec<$target_element_type>, Self::Error> {
        match self {
          PropValue::Array(inner_value) => inner_value
            .into_iter()
            .map(|item| item.try_into())
            .collect::<Result<Vec<$target_element_type>, ConfigError>>(),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: "Array",
            found_type: other.type_name(),
          }),
        }
      }
    }

    impl TryInto<Vec<$target_element_type>> for &PropValue {
      type Error = ConfigError;

      fn try_into(self) -> Result<Vec<$target_element_type>, Self::Error> {
        match self {
          PropValue::Array(inner_value) => inner_value
            .iter()
            .map(|item_ref| item_ref.try_into())
            .collect::<Result<Vec<$target_element_type>, ConfigError>>(),
          other => Err(ConfigError::TypeMismatch {
            key: "_conversion_".to_string(),
            expected_type: "Array",
            found_type: other.type_name(),
          }),
        }
      }
    }
  };
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropValue {
  Null,
  Bytes(Vec<u8>),
  Boolean(bool),
  // Numbers that parsed as signed
  Integer(i64),
  // Numbers that parsed as non-negative
  UInteger(u64),
  Float(f64),
  String(String),
  Array(Vec<PropValue>),
  Map(HashMap<String, PropValue>),
}

impl PropValue {
  pub(crate) fn type_name(&self) -> &'static str {
    match self {
      PropValue::Null => "Null",
      PropValue::Bytes(_) => "Bytes",
      PropValue::Boolean(_) => "Boolean",
      PropValue::Integer(_) => "Integer",
      PropValue::UInteger(_) => "UInteger",
      PropValue::Float(_) => "Float",
      PropValue::String(_) => "String",
      PropValue::Array(_) => "Array",
      PropValue::Map(_) => "Map",
    }
  }
}

// --- From Implementations ---

impl From<()> for PropValue {
  #[inline] fn from(_value: ()) -> Self { PropValue::Null }
}
impl From<Vec<u8>> for PropValue {
  #[inline] fn from(value: Vec<u8>) -> Self { PropValue::Bytes(value) }
}
impl From<bool> for PropValue {
  #[inline] fn from(value: bool) -> Self { PropValue::Boolean(value) }
}
impl From<String> for PropValue {
  #[inline] fn from(value: String) -> Self { PropValue::String(value) }
}
impl From<&str> for PropValue {
  #[inline] fn from(value: &str) -> Self { PropValue::String(value.to_string()) }
}
impl From<i64> for PropValue {
  #[inline] fn from(value: i64) -> Self { PropValue::Integer(value) }
}
impl From<u64> for PropValue {
  #[inline] fn from(value: u64) -> Self { PropValue::UInteger(value) }
}
impl From<f64> for PropValue {
  #[inline] fn from(value: f64) -> Self { PropValue::Float(value) }
}
impl From<Vec<PropValue>> for PropValue {
  #[inline] fn from(value: Vec<PropValue>) -> Self { PropValue::Array(value) }
}
impl From<HashMap<String, PropValue>> for PropValue {
  #[inline] fn from(value: HashMap<String, PropValue>) -> Self { PropValue::Map(value) }
}

from_impl_numeric!(i8, Integer, i64);
from_impl_numeric!(i16, Integer, i64);
from_impl_numeric!(i32, Integer, i64);
from_impl_numeric!(isize, Integer, i64);
from_impl_numeric!(u8, UInteger, u64);
from_impl_numeric!(u16, UInteger, u64);
from_impl_numeric!(u32, UInteger, u64);
from_impl_numeric!(usize, UInteger, u64);
from_impl_numeric!(f32, Float, f64);

// --- TryInto Implementations ---

try_into_impl_basic!(Vec<u8>, Bytes, "Bytes");
try_into_impl_basic!(bool, Boolean, "Boolean", Copy);
try_into_impl_basic!(String, String, "String");
try_into_impl_basic!(f64, Float, "Float", Copy);

// i64 also accepts UInteger when in range
impl TryInto<i64> for PropValue {
  type Error = ConfigError;
  #[inline]
  fn try_into(self) -> Result<i64, Self::Error> {
    match self {
      PropValue::Integer(i) => Ok(i),
      PropValue::UInteger(u) => {
        if u <= i64::MAX as u64 {
          Ok(u as i64)
        } else {
          Err(ConfigError::ConversionError {
            key: "_conversion_".to_string(),
            message: format!("UInteger value {} out of range for i64", u),
          })
        }
      },
      other => Err(ConfigError::TypeMismatch {
        key: "_conversion_".to_string(),
        expected_type: "Integer or UInteger",
        found_type: other.type_name(),
      }),
    }
  }
}
impl TryInto<i64> for &PropValue {
  type Error = ConfigError;
  #[inline]
  fn try_into(self) -> Result<i64, Self::Error> {
    match self {
      PropValue::Integer(i) => Ok(*i),
      PropValue::UInteger(u) => {
        if *u <= i64::MAX as u64 {
          Ok(*u as i64)
        } else {
          Err(ConfigError::ConversionError {
            key: "_conversion_".to_string(),
            message: format!("UInteger value {} out of range for i64", u),
          })
        }
      },
      other => Err(ConfigError::TypeMismatch {
        key: "_conversion_".to_string(),
        expected_type: "Integer or UInteger",
        found_type: other.type_name(),
      }),
    }
  }
}

// u64 also accepts Integer when non-negative
impl TryInto<u64> for PropValue {
  type Error = ConfigError;
  #[inline]
  fn try_into(self) -> Result<u64, Self::Error> {
    match self {
      PropValue::UInteger(u) => Ok(u),
      PropValue::Integer(i) => {
        if i >= 0 {
          Ok(i as u64)
        } else {
          Err(ConfigError::ConversionError {
            key: "_conversion_".to_string(),
            message: format!("Negative Integer value {} cannot be converted to u64", i),
          })
        }
      },
      other => Err(ConfigError::TypeMismatch {
        key: "_conversion_".to_string(),
        expected_type: "Integer or UInteger",
        found_type: other.type_name(),
      }),
    }
  }
}
impl TryInto<u64> for &PropValue {
  type Error = ConfigError;
  #[inline]
  fn try_into(self) -> Result<u64, Self::Error> {
    match self {
      PropValue::UInteger(u) => Ok(*u),
      PropValue::Integer(i) => {
        if *i >= 0 {
          Ok(*i as u64)
        } else {
          Err(ConfigError::ConversionError {
            key: "_conversion_".to_string(),
            message: format!("Negative Integer value {} cannot be converted to u64", i),
          })
        }
      },
      other => Err(ConfigError::TypeMismatch {
        key: "_conversion_".to_string(),
        expected_type: "Integer or UInteger",
        found_type: other.type_name(),
      }),
    }
  }
}

// Narrowing casts only check the stored variant, not the range.
try_into_impl_numeric_cast!(i8, Integer, "Integer");
try_into_impl_numeric_cast!(i16, Integer, "Integer");
try_into_impl_numeric_cast!(i32, Integer, "Integer");
try_into_impl_numeric_cast!(isize, Integer, "Integer");
try_into_impl_numeric_cast!(u8, UInteger, "UInteger");
try_into_impl_numeric_cast!(u16, UInteger, "UInteger");
try_into_impl_numeric_cast!(u32, UInteger, "UInteger");
try_into_impl_numeric_cast!(usize, UInteger, "UInteger");
try_into_impl_numeric_cast!(f32, Float, "Float");

// --- Collection TryInto Implementations ---

try_into_impl_basic!(Vec<PropValue>, Array, "Array");
try_into_impl_basic!(HashMap<String, PropValue>, Map, "Map");

try_into_impl_vec!(String);
try_into_impl_vec!(bool);
try_into_impl_vec!(i64);
try_into_impl_vec!(u64);
try_into_impl_vec!(f64);

/// Converts a `PropValue` tree into a `serde_json::Value`, the intermediate
/// representation used to bind configuration subtrees onto typed structs.
/// Bytes are represented as a base64 string.
pub(crate) fn prop_value_to_serde_json(value: PropValue) -> Result<serde_json::Value, ConfigError> {
  match value {
    PropValue::Null => Ok(serde_json::Value::Null),
    PropValue::Bytes(b) => Ok(serde_json::Value::String(
      base64::engine::general_purpose::STANDARD.encode(&b),
    )),
    PropValue::Boolean(b) => Ok(serde_json::Value::Bool(b)),
    PropValue::Integer(i) => Ok(serde_json::json!(i)),
    PropValue::UInteger(u) => Ok(serde_json::json!(u)),
    PropValue::Float(f) => Ok(serde_json::json!(f)),
    PropValue::String(s) => Ok(serde_json::Value::String(s)),
    PropValue::Array(arr) => {
      let mut json_arr = Vec::with_capacity(arr.len());
      for item in arr {
        json_arr.push(prop_value_to_serde_json(item)?);
      }
      Ok(serde_json::Value::Array(json_arr))
    }
    PropValue::Map(map) => {
      let mut json_map = serde_json::Map::with_capacity(map.len());
      for (key, item) in map {
        json_map.insert(key, prop_value_to_serde_json(item)?);
      }
      Ok(serde_json::Value::Object(json_map))
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::{prop_value_to_serde_json, PropValue};
  use crate::error::ConfigError;

  #[test]
  fn test_try_into_string() {
    let value = PropValue::String("hunter2".to_string());

    let converted: String = value.try_into().unwrap();
    assert_eq!(converted, "hunter2");
  }

  #[test]
  fn test_try_into_numeric_widening() {
    let converted: i64 = PropValue::UInteger(42).try_into().unwrap();
    assert_eq!(converted, 42i64);

    let converted: u64 = PropValue::Integer(42).try_into().unwrap();
    assert_eq!(converted, 42u64);

    let negative: Result<u64, ConfigError> = PropValue::Integer(-1).try_into();
    assert!(matches!(negative, Err(ConfigError::ConversionError { .. })));
  }

  #[test]
  fn test_try_into_type_mismatch() {
    let result: Result<String, ConfigError> = PropValue::Boolean(true).try_into();

    assert!(matches!(result, Err(ConfigError::TypeMismatch { expected_type: "String", .. })));
  }

  #[test]
  fn test_try_into_string_vec() {
    let value = PropValue::Array(vec![
      PropValue::String("vault".to_string()),
      PropValue::String("kubernetes".to_string()),
    ]);

    let converted: Vec<String> = value.try_into().unwrap();
    assert_eq!(converted, vec!["vault".to_string(), "kubernetes".to_string()]);
  }

  #[test]
  fn test_prop_value_to_serde_json() {
    let mut map = HashMap::new();
    map.insert("value".to_string(), PropValue::String("injected".to_string()));
    map.insert("attempts".to_string(), PropValue::UInteger(3));

    let json = prop_value_to_serde_json(PropValue::Map(map)).unwrap();

    assert_eq!(json["value"], serde_json::json!("injected"));
    assert_eq!(json["attempts"], serde_json::json!(3));
  }

  #[test]
  fn test_prop_value_to_serde_json_bytes_as_base64() {
    let json = prop_value_to_serde_json(PropValue::Bytes(b"abcd".to_vec())).unwrap();

    assert_eq!(json, serde_json::json!("YWJjZA=="));
  }
}
