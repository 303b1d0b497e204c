use std::collections::{Bound, HashMap};
use std::sync::Arc;

use natlex_sort::NatLexOrderedString;
use parking_lot::{RwLock, RwLockReadGuard};
use skiplist::SkipMap;

use crate::config_source::ConfigSource;
use crate::error::ConfigError;
use crate::value::PropValue;

pub struct PropDataValueRef<'a> {
  pub(self) _lock: RwLockReadGuard<'a, SkipMap<NatLexOrderedString, (PropValue, ConfigSource)>>,
  pub(self) _natural_key_path: NatLexOrderedString,
}

impl<'a> PropDataValueRef<'a> {
  pub fn value(&'a self) -> Option<&'a PropValue> {
    self
      ._lock
      .get(&self._natural_key_path)
      .map(|(value, _source)| value)
  }

  pub fn source(&'a self) -> Option<&'a ConfigSource> {
    self
      ._lock
      .get(&self._natural_key_path)
      .map(|(_value, source)| source)
  }
}

// Flat keypath storage. Keys are held in natural-lexicographic order so that
// prefix queries and subtree reconstruction are range scans.
#[derive(Clone)]
pub(crate) struct PropDataStore {
  _data: Arc<RwLock<SkipMap<NatLexOrderedString, (PropValue, ConfigSource)>>>,
}

impl PropDataStore {
  pub fn new() -> PropDataStore {
    return PropDataStore {
      _data: Arc::new(RwLock::new(SkipMap::new())),
    };
  }

  // Gets, if exists, cloned value from config
  pub fn get_data(&self, key: &str) -> Option<PropValue> {
    let natural_key_path = NatLexOrderedString::from(key);
    let rwlock = self._data.read();

    return rwlock
      .get(&natural_key_path)
      .map(|(value, _source)| value.clone());
  }

  // Gets, if exists, a reference context to value.
  // This exists if there are memory use concerns around calling get_data
  pub fn get_data_ref(&self, key: &str) -> Option<PropDataValueRef> {
    let natural_key_path = NatLexOrderedString::from(key);
    let rwlock = self._data.read();
    let contains_key = rwlock.contains_key(&natural_key_path);

    if contains_key {
      return Some(PropDataValueRef {
        _lock: rwlock,
        _natural_key_path: natural_key_path,
      });
    }

    return None;
  }

  pub(crate) fn set_data(
    &self,
    key: &str,
    value: PropValue,
    source: ConfigSource,
  ) -> Option<PropValue> {
    return self
      ._data
      .write()
      .insert(NatLexOrderedString::from(key), (value, source))
      .map(|(old_value, _old_source)| old_value);
  }

  pub fn get_source_info(&self, key: &str) -> Option<ConfigSource> {
    let natural_key_path = NatLexOrderedString::from(key);
    let rwlock = self._data.read();

    return rwlock
      .get(&natural_key_path)
      .map(|(_value, source)| source.clone());
  }

  /// Check if the exact key exists
  pub fn exists(&self, key: &str) -> bool {
    return self
      ._data
      .read()
      .contains_key(&NatLexOrderedString::from(key));
  }

  /// Checks if the key's prefix exists
  pub fn prefix_key_exists(&self, key: &str) -> bool {
    if self.exists(key) {
      return true;
    }

    let natural_key_path = NatLexOrderedString::from(key);
    let rwlock = self._data.read();

    let prefix_dot = key.to_string() + ".";
    let mut range = rwlock.range(Bound::Included(&natural_key_path), Bound::Unbounded);

    // Check the first element greater than or equal to the key itself.
    // "a.b" is a path prefix of "a.b.c" but not of "a.bc".
    if let Some((found_key, _)) = range.next() {
      if found_key.0 != key && found_key.0.starts_with(&prefix_dot) {
        return true;
      }
    }

    return false;
  }

  pub fn keys_with_prefix(&self, key_path_option: Option<&str>) -> Vec<String> {
    return match key_path_option {
      None => self
        ._data
        .read()
        .iter()
        .map(|entry| (entry.0).0.clone())
        .collect(),
      Some(key_path) => {
        let mut result = vec![];

        let prefix_key = key_path.to_string() + ".";
        let natural_key_path = NatLexOrderedString::from(key_path);
        let rwlock = self._data.read();
        let range = rwlock.range(Bound::Included(&natural_key_path), Bound::Unbounded);

        for entry in range {
          let entry_key = &(entry.0).0;

          if entry_key.as_str() == key_path {
            // The prefix itself may exist as an exact key; children follow it.
            continue;
          }

          if !entry_key.starts_with(&prefix_key) {
            break;
          }

          result.push(entry_key.clone());
        }

        result
      }
    };
  }

  /// Fetches all configuration entries under a given prefix and reconstructs
  /// them into a hierarchical `PropValue`. Numeric path segments are treated
  /// as array indices where possible, otherwise as object keys.
  ///
  /// Returns `Ok(PropValue::Null)` if the prefix has no children or does not
  /// exist.
  pub(crate) fn fetch_children_as_value(&self, prefix: &str) -> Result<PropValue, ConfigError> {
    let data_lock = self._data.read();
    let mut root_value = PropValue::Map(HashMap::new());

    let (search_prefix, prefix_len_to_strip) = if prefix.is_empty() {
      (String::new(), 0) // Fetch all, strip nothing
    } else {
      (format!("{}.", prefix), prefix.len() + 1) // Fetch children, strip "prefix."
    };
    let search_prefix_nat_lex = NatLexOrderedString::from(search_prefix.as_str());

    let start_bound = if prefix.is_empty() {
      Bound::Unbounded
    } else {
      Bound::Included(&search_prefix_nat_lex)
    };

    let range = data_lock.range(start_bound, Bound::Unbounded);

    let mut found_children = false;
    for (key_nat_lex, (prop_value, _source)) in range {
      let full_key = &key_nat_lex.0;

      if !prefix.is_empty() && !full_key.starts_with(&search_prefix) {
        break;
      }

      let relative_path = &full_key[prefix_len_to_strip..];
      if relative_path.is_empty() {
        continue;
      }

      found_children = true;

      let value_to_insert = prop_value.clone();

      let path_parts: Vec<&str> = relative_path.split('.').collect();
      if let Err(e_str) = insert_nested_value(&mut root_value, &path_parts, value_to_insert) {
        return Err(ConfigError::Internal(format!(
          "Failed to reconstruct structure for key '{}' at path '{}': {}",
          full_key, relative_path, e_str
        )));
      }
    }

    if !found_children && matches!(&root_value, PropValue::Map(m) if m.is_empty()) {
      Ok(PropValue::Null)
    } else {
      Ok(root_value)
    }
  }
}

/// Inserts a value into a nested `PropValue` structure based on path parts.
/// Attempts to create arrays for numeric keys.
fn insert_nested_value<'a>(
  mut node: &'a mut PropValue,
  path_parts: &[&str],
  value_to_insert: PropValue,
) -> Result<(), String> {
  for (i, part) in path_parts.iter().enumerate() {
    if part.is_empty() {
      return Err(format!("Encountered empty segment in path: {:?}", path_parts));
    }
    let is_last = i == path_parts.len() - 1;
    let maybe_index: Option<usize> = part.parse().ok();

    if is_last {
      match node {
        PropValue::Map(map) => {
          map.insert(part.to_string(), value_to_insert);
          return Ok(());
        }
        PropValue::Array(arr) => {
          if let Some(index) = maybe_index {
            if index >= arr.len() {
              arr.resize_with(index + 1, || PropValue::Null);
            }
            arr[index] = value_to_insert;
            return Ok(());
          } else {
            return Err(format!(
              "Type mismatch: Cannot insert string key '{}' into an existing Array.",
              part
            ));
          }
        }
        _ => {
          return Err(format!(
            "Type mismatch: Cannot insert key '{}' into non-container node (found {}).",
            part,
            node.type_name()
          ));
        }
      }
    } else {
      let next_part_is_index: bool = path_parts
        .get(i + 1)
        .and_then(|p| p.parse::<usize>().ok())
        .is_some();

      let create_default_container = || {
        if next_part_is_index {
          PropValue::Array(vec![])
        } else {
          PropValue::Map(HashMap::new())
        }
      };

      match node {
        PropValue::Map(map) => {
          let entry_node = map
            .entry(part.to_string())
            .or_insert_with(create_default_container);

          if (next_part_is_index && !matches!(entry_node, PropValue::Array(_)))
            || (!next_part_is_index && !matches!(entry_node, PropValue::Map(_)))
          {
            return Err(format!(
              "Type mismatch at key '{}'. Expected {} based on next key '{}', but found {}.",
              part,
              if next_part_is_index { "Array" } else { "Map" },
              path_parts[i + 1],
              entry_node.type_name()
            ));
          }
          node = entry_node;
        }
        PropValue::Array(arr) => {
          if let Some(index) = maybe_index {
            if index >= arr.len() {
              arr.resize_with(index + 1, || PropValue::Null);
            }

            let element = &mut arr[index];
            if matches!(element, PropValue::Null) {
              *element = create_default_container();
            }

            if (next_part_is_index && !matches!(element, PropValue::Array(_)))
              || (!next_part_is_index && !matches!(element, PropValue::Map(_)))
            {
              return Err(format!(
                "Type mismatch at index {}. Expected {} based on next key '{}', but found {}.",
                index,
                if next_part_is_index { "Array" } else { "Map" },
                path_parts[i + 1],
                element.type_name()
              ));
            }
            node = element;
          } else {
            return Err(format!(
              "Type mismatch: Cannot traverse using string key '{}' within an existing Array.",
              part
            ));
          }
        }
        _ => {
          return Err(format!(
            "Type mismatch: Cannot traverse using key '{}' into non-container node (found {}).",
            part,
            node.type_name()
          ));
        }
      }
    }
  }
  unreachable!("Loop should handle all path parts or error out.");
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;

  use super::PropDataStore;
  use crate::config_source::ConfigSource;
  use crate::value::PropValue;

  fn _store_with(entries: &[(&str, PropValue)]) -> PropDataStore {
    let store = PropDataStore::new();
    for (key, value) in entries {
      store.set_data(key, value.clone(), ConfigSource::Unknown);
    }
    return store;
  }

  #[test]
  fn test_prefix_key_exists() {
    let store = _store_with(&[("vaultinjected.value", PropValue::String("x".to_string()))]);

    assert!(store.prefix_key_exists("vaultinjected"));
    assert!(store.prefix_key_exists("vaultinjected.value"));
    assert!(!store.prefix_key_exists("vaultinject"));
    assert!(!store.prefix_key_exists("vaultinjected.value.more"));
  }

  #[test]
  fn test_keys_with_prefix() {
    let store = _store_with(&[
      ("challenge.difficulty", PropValue::UInteger(2)),
      ("challenge.name", PropValue::String("vault".to_string())),
      ("challengers", PropValue::UInteger(9)),
    ]);

    let keys = store.keys_with_prefix(Some("challenge"));
    assert_eq!(keys, vec!["challenge.difficulty".to_string(), "challenge.name".to_string()]);

    let all_keys = store.keys_with_prefix(None);
    assert_eq!(all_keys.len(), 3);
  }

  #[test]
  fn test_fetch_children_as_value_rebuilds_maps() {
    let store = _store_with(&[
      ("vaultpassword.password", PropValue::String("s3cr3t".to_string())),
      ("vaultpassword.meta.version", PropValue::UInteger(2)),
    ]);

    let value = store.fetch_children_as_value("vaultpassword").unwrap();

    let mut meta = HashMap::new();
    meta.insert("version".to_string(), PropValue::UInteger(2));
    let mut expected = HashMap::new();
    expected.insert("password".to_string(), PropValue::String("s3cr3t".to_string()));
    expected.insert("meta".to_string(), PropValue::Map(meta));

    assert_eq!(value, PropValue::Map(expected));
  }

  #[test]
  fn test_fetch_children_as_value_rebuilds_arrays() {
    let store = _store_with(&[
      ("svc.endpoints.0", PropValue::String("10.0.0.1".to_string())),
      ("svc.endpoints.1", PropValue::String("10.0.0.2".to_string())),
    ]);

    let value = store.fetch_children_as_value("svc").unwrap();

    let mut expected = HashMap::new();
    expected.insert(
      "endpoints".to_string(),
      PropValue::Array(vec![
        PropValue::String("10.0.0.1".to_string()),
        PropValue::String("10.0.0.2".to_string()),
      ]),
    );

    assert_eq!(value, PropValue::Map(expected));
  }

  #[test]
  fn test_fetch_children_missing_prefix_is_null() {
    let store = _store_with(&[("a.b", PropValue::UInteger(1))]);

    assert_eq!(store.fetch_children_as_value("missing").unwrap(), PropValue::Null);
  }
}
