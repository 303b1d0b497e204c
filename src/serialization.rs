use std::collections::HashMap;

use crate::providers::RawPropValue;
use crate::value::PropValue;

pub fn deserialize_json(raw_value: RawPropValue) -> PropValue {

  let value_result: Result<serde_json::Value, serde_json::Error>;

  match raw_value {
    RawPropValue::Bytes(data) => {
      value_result = serde_json::from_slice(data.as_slice());
    },
    RawPropValue::String(data) => {
      value_result = serde_json::from_str(&data);
    }
  }

  if value_result.is_err() {
    return PropValue::Null;
  }

  return serde_json_val_to_prop_value(value_result.unwrap());
}

pub fn deserialize_yaml(raw_value: RawPropValue) -> PropValue {

  let value_result: Result<serde_yaml::Value, serde_yaml::Error>;

  match raw_value {
    RawPropValue::Bytes(data) => {
      value_result = serde_yaml::from_slice(data.as_slice());
    },
    RawPropValue::String(data) => {
      value_result = serde_yaml::from_str(&data);
    }
  }

  if value_result.is_err() {
    return PropValue::Null;
  }

  return serde_yaml_val_to_prop_value(value_result.unwrap());
}

pub fn serde_yaml_val_to_prop_value(raw_value: serde_yaml::Value) -> PropValue {

  return match raw_value {
    serde_yaml::Value::Null => PropValue::Null,
    serde_yaml::Value::Bool(value) => PropValue::Boolean(value),
    serde_yaml::Value::String(value) => PropValue::String(value),
    serde_yaml::Value::Number(value) => {
      if value.is_f64() {
        PropValue::Float(value.as_f64().unwrap())
      } else if value.is_u64() {
        PropValue::UInteger(value.as_u64().unwrap())
      } else {
        PropValue::Integer(value.as_i64().unwrap())
      }
    },
    serde_yaml::Value::Sequence(value) => {
      PropValue::Array(value.into_iter().map(serde_yaml_val_to_prop_value).collect())
    },
    serde_yaml::Value::Mapping(value) => {
      let mut new_map = HashMap::new();

      for (key, item) in value {
        let final_key = match key {
          serde_yaml::Value::String(key_str) => key_str,
          serde_yaml::Value::Number(key_num) => key_num.to_string(),
          serde_yaml::Value::Bool(key_bool) => key_bool.to_string(),
          serde_yaml::Value::Null => "null".to_string(),
          _ => {
            continue; // Sequences and mappings cannot be key paths
          }
        };
        new_map.insert(final_key, serde_yaml_val_to_prop_value(item));
      }

      PropValue::Map(new_map)
    },
    serde_yaml::Value::Tagged(tagged) => serde_yaml_val_to_prop_value(tagged.value),
  };
}

pub fn serde_json_val_to_prop_value(raw_value: serde_json::Value) -> PropValue {

  return match raw_value {
    serde_json::Value::Null => PropValue::Null,
    serde_json::Value::Bool(value) => PropValue::Boolean(value),
    serde_json::Value::String(value) => PropValue::String(value),
    serde_json::Value::Number(value) => {
      if value.is_f64() {
        PropValue::Float(value.as_f64().unwrap())
      } else if value.is_i64() {
        PropValue::Integer(value.as_i64().unwrap())
      } else {
        PropValue::UInteger(value.as_u64().unwrap())
      }
    },
    serde_json::Value::Array(value) => {
      PropValue::Array(value.into_iter().map(serde_json_val_to_prop_value).collect())
    },
    serde_json::Value::Object(value) => {
      let mut new_map = HashMap::new();

      for (key, item) in value {
        new_map.insert(key, serde_json_val_to_prop_value(item));
      }

      PropValue::Map(new_map)
    },
  };
}

pub(crate) fn map_from_serde_yaml_valuemap(value_map: HashMap<String, serde_yaml::Value>) -> HashMap<String, PropValue> {

  let mut result = HashMap::new();

  for (key, value) in value_map {
    result.insert(key, serde_yaml_val_to_prop_value(value));
  }

  return result;
}

#[cfg(feature = "toml")]
pub fn toml_val_to_prop_value(raw_value: toml::Value) -> PropValue {

  return match raw_value {
    toml::Value::String(value) => PropValue::String(value),
    toml::Value::Integer(value) => PropValue::Integer(value),
    toml::Value::Float(value) => PropValue::Float(value),
    toml::Value::Boolean(value) => PropValue::Boolean(value),
    toml::Value::Datetime(value) => PropValue::String(value.to_string()),
    toml::Value::Array(value) => {
      PropValue::Array(value.into_iter().map(toml_val_to_prop_value).collect())
    },
    toml::Value::Table(value) => {
      let mut new_map = HashMap::new();

      for (key, item) in value {
        new_map.insert(key, toml_val_to_prop_value(item));
      }

      PropValue::Map(new_map)
    },
  };
}

#[cfg(feature = "toml")]
pub(crate) fn map_from_toml_value_map(value_map: HashMap<String, toml::Value>) -> HashMap<String, PropValue> {

  let mut result = HashMap::new();

  for (key, value) in value_map {
    result.insert(key, toml_val_to_prop_value(value));
  }

  return result;
}

#[cfg(test)]
mod tests {
  use super::{deserialize_json, deserialize_yaml};
  use crate::providers::RawPropValue;
  use crate::value::PropValue;

  #[test]
  fn test_deserialize_json_object() {
    let raw = RawPropValue::String(Box::from(r#"{"username": "app", "attempts": 3}"#));

    let value = deserialize_json(raw);

    if let PropValue::Map(map) = value {
      assert_eq!(map.get("username"), Some(&PropValue::String("app".to_string())));
      assert_eq!(map.get("attempts"), Some(&PropValue::UInteger(3)));
    } else {
      panic!("expected a map");
    }
  }

  #[test]
  fn test_deserialize_json_invalid_yields_null() {
    let raw = RawPropValue::String(Box::from("{not json"));

    assert_eq!(deserialize_json(raw), PropValue::Null);
  }

  #[test]
  fn test_deserialize_yaml_scalar() {
    let raw = RawPropValue::Bytes(b"hello".to_vec());

    assert_eq!(deserialize_yaml(raw), PropValue::String("hello".to_string()));
  }
}
