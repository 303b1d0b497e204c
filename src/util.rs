use std::collections::HashMap;

use crate::error::ConfigError;
use crate::options::Case;
use crate::providers::CONFIG_KEY_PROVIDER;
use crate::value::PropValue;

/// NOTE: For use by depending libraries
pub fn expand_vars(template_str: &str, variables: &HashMap<String, String>) -> Result<String, ConfigError> {
  let interpolator = |var_name: &str| -> Result<Option<String>, ConfigError> {
    let lower_var_name = var_name.to_lowercase();

    match variables.get(&lower_var_name) {
      Some(value) => Ok(Some(value.clone())),
      None => Err(ConfigError::Message(format!(
        "Could not find variable: '{}' in string: '{}'",
        var_name, template_str
      ))),
    }
  };

  return shellexpand::env_with_context(template_str, interpolator)
    .map(|expanded| expanded.to_string())
    .map_err(|err| err.cause);
}

/// Expands environment variable references (e.g. "${VAULT_SECRETS_DIR}") in a path.
pub(crate) fn expand_env_path(path: &str) -> Result<String, ConfigError> {
  return shellexpand::env(path)
    .map(|expanded| expanded.to_string())
    .map_err(|err| ConfigError::Message(format!(
      "Could not expand '{}': variable '{}' is not set",
      path, err.var_name
    )));
}

// Recursive helper for flattening maps. Doesn't modify the source map.
fn build_flat_map_recursive(
  source_map: &HashMap<String, PropValue>,
  flat_map_out: &mut HashMap<String, PropValue>,
  current_path: &str,
) {
  for (key, value) in source_map.iter() {
    let new_keypath = if current_path.is_empty() {
      key.clone()
    } else {
      format!("{}.{}", current_path, key)
    };

    match value {
      PropValue::Map(sub_map) => {
        // A map that is a provider directive is a leaf. The whole map is the
        // final value and flattening must not descend into it.
        if sub_map.contains_key(CONFIG_KEY_PROVIDER) {
          flat_map_out.insert(new_keypath, value.clone());
        } else {
          build_flat_map_recursive(sub_map, flat_map_out, &new_keypath);
        }
      }
      // Primitives, Bytes, Strings, Booleans, Null, and Arrays
      _ => {
        flat_map_out.insert(new_keypath, value.clone());
      }
    }
  }
}

/// Flattens a nested `HashMap<String, PropValue>` into a single-level map
/// where keys represent the full path (e.g., "a.b.c").
pub(crate) fn build_flat_map(
  raw_config_data: &HashMap<String, PropValue>,
  config_data: &mut HashMap<String, PropValue>,
  keypath: String,
) {
  build_flat_map_recursive(raw_config_data, config_data, &keypath);
}

// Helper function to convert a snake_case or UPPER_SNAKE_CASE string to a specific case.
pub(crate) fn convert_case(s: &str, case: Case) -> String {
  let lower = s.to_lowercase();
  match case {
    Case::Lower => lower.replace('_', ""),
    Case::Snake => lower,
    Case::Kebab => lower.replace('_', "-"),
    Case::Camel => {
      let mut result = String::with_capacity(s.len());
      let mut capitalize = false;
      for c in lower.chars() {
        if c == '_' {
          capitalize = true;
        } else if capitalize {
          result.push(c.to_ascii_uppercase());
          capitalize = false;
        } else {
          result.push(c);
        }
      }
      result
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::{build_flat_map, convert_case, expand_vars};
  use crate::options::Case;
  use crate::value::PropValue;

  #[test]
  fn test_convert_case() {
    assert_eq!(convert_case("MAX_RETRIES", Case::Camel), "maxRetries");
    assert_eq!(convert_case("MAX_RETRIES", Case::Snake), "max_retries");
    assert_eq!(convert_case("MAX_RETRIES", Case::Kebab), "max-retries");
    assert_eq!(convert_case("MAX_RETRIES", Case::Lower), "maxretries");
  }

  #[test]
  fn test_build_flat_map_nested() {
    let mut inner = HashMap::new();
    inner.insert("value".to_string(), PropValue::String("abc".to_string()));

    let mut source = HashMap::new();
    source.insert("vaultinjected".to_string(), PropValue::Map(inner));
    source.insert("port".to_string(), PropValue::UInteger(8080));

    let mut flat = HashMap::new();
    build_flat_map(&source, &mut flat, String::new());

    assert_eq!(flat.get("vaultinjected.value"), Some(&PropValue::String("abc".to_string())));
    assert_eq!(flat.get("port"), Some(&PropValue::UInteger(8080)));
    assert_eq!(flat.len(), 2);
  }

  #[test]
  fn test_expand_vars() {
    let mut variables = HashMap::new();
    variables.insert("mount".to_string(), "/vault/secrets".to_string());

    let expanded = expand_vars("${MOUNT}/value", &variables).unwrap();
    assert_eq!(expanded, "/vault/secrets/value");

    assert!(expand_vars("${MISSING}/value", &variables).is_err());
  }
}
