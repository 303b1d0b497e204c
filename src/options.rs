use std::{
  collections::HashMap,
  env,
  ffi::OsStr,
  fs::{self, read_dir},
  path::PathBuf,
  sync::Arc,
};

use log::{debug, warn};
use multimap::MultiMap;

use crate::config_source::ConfigSource;
use crate::error::ConfigError;
use crate::internal::PropDataStore;
#[cfg(feature = "toml")]
use crate::serialization::map_from_toml_value_map;
use crate::serialization::map_from_serde_yaml_valuemap;
use crate::telemetry::Logger;
use crate::providers::{CONFIG_KEY_KEYNAME, CONFIG_KEY_KEYPATH, CONFIG_KEY_PROVIDER};
use crate::util::{self, convert_case};
use crate::value::PropValue;

/// Environment variables starting with this prefix override file values.
pub(crate) const ENV_VAR_PREFIX: &str = "VP_";
pub(crate) const ENV_VAR_SEPARATOR: &str = "__";

/// Defines the case style to apply when converting environment variables to config keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
  /// Converts `VAR_NAME` to `varName`. Recommended for use with `serde(rename_all = "camelCase")`.
  Camel,
  /// Converts `VAR_NAME` to `var_name`. Recommended for use with `serde(rename_all = "snake_case")`.
  Snake,
  /// Converts `VAR_NAME` to `var-name`. Recommended for use with `serde(rename_all = "kebab-case")`.
  Kebab,
  /// Converts `VAR_NAME` to `varname`. The original, simple lowercasing behavior.
  Lower,
}

pub struct PropStoreOptions {
  pub logger: Option<Arc<dyn Logger>>,
  /// The case style to use for environment variable keys. Defaults to `Case::Camel`.
  pub env_case: Case,
  #[cfg(feature = "dotenv")]
  pub dotenv_path: Option<PathBuf>, // Path to .env file
}

impl Default for PropStoreOptions {
  fn default() -> Self {
    return Self {
      logger: None,
      env_case: Case::Camel,
      #[cfg(feature = "dotenv")]
      dotenv_path: None,
    };
  }
}

/// Reads configuration from specified paths (files/directories), merges them,
/// applies environment variable overrides, separates provider directives,
/// and applies the final values to the store.
///
/// Handles YAML (and, behind the `toml` feature, TOML) file formats. Reads
/// environment variables starting with "VP_" using "__" as a separator
/// (e.g. VP_DATABASE__HOST becomes database.host).
///
/// Order of precedence: Environment Variables > Last File Read > First File Read.
pub(crate) fn read_config_data(
  config_file_paths: &[PathBuf],
  data_store: &PropDataStore,
  provided_data: &mut MultiMap<String, PropValue>,
  env_case: Case,
) -> Result<(), ConfigError> {
  let mut file_config_merged: HashMap<String, PropValue> = HashMap::new(); // Holds NESTED structure from files
  let mut files_to_process: Vec<PathBuf> = Vec::new();
  let mut file_source_map: HashMap<String, PathBuf> = HashMap::new(); // Tracks top-level key source file

  // --- 1. Expand directories ---
  for path in config_file_paths {
    if path.is_dir() {
      match read_dir(path) {
        Ok(entries) => {
          let mut dir_files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.is_file())
            .collect();
          dir_files.sort();
          files_to_process.extend(dir_files);
        }
        Err(e) => {
          return Err(ConfigError::IoError {
            path: path.clone(),
            source: e,
          });
        }
      }
    } else if path.is_file() {
      files_to_process.push(path.clone());
    } else if path.exists() {
      warn!(
        "[Config] Warning: Path {:?} exists but is not a file or directory.",
        path
      );
    } else {
      debug!("[Config] Info: Optional config path {:?} not found.", path);
    }
  }

  // --- 2. Load, merge files, and extract provider directives ---
  for file_path in &files_to_process {
    let extension = file_path.extension().and_then(OsStr::to_str);
    type ParserFn = fn(&str, &PathBuf) -> Result<HashMap<String, PropValue>, ConfigError>;
    let parser: Option<ParserFn> = match extension {
      Some("yaml") | Some("yml") => Some(|content, path| {
        serde_yaml::from_str::<HashMap<String, serde_yaml::Value>>(content)
          .map_err(|e| ConfigError::YamlParseError {
            path: path.clone(),
            source: e,
          })
          .map(map_from_serde_yaml_valuemap)
      }),
      #[cfg(feature = "toml")]
      Some("toml") => Some(|content, path| {
        toml::from_str::<HashMap<String, toml::Value>>(content)
          .map_err(|e| ConfigError::TomlParseError {
            path: path.clone(),
            source: e,
          })
          .map(map_from_toml_value_map)
      }),
      _ => None,
    };

    if let Some(parse_fn) = parser {
      match fs::read_to_string(file_path) {
        Ok(content) => {
          match parse_fn(&content, file_path) {
            Ok(mut config_from_file) => {
              debug!("[Config] Processing config from file {:?}", file_path);

              // Track file source for top-level keys BEFORE extraction/merging
              for key in config_from_file.keys() {
                file_source_map.insert(key.clone(), file_path.clone());
              }

              // Removes provider directive sections from config_from_file in place
              _take_provided_data(&mut config_from_file, provided_data);

              _merge(&mut file_config_merged, &config_from_file);
            }
            Err(e) => return Err(e),
          }
        }
        Err(e) => {
          if e.kind() == std::io::ErrorKind::NotFound {
            warn!("[Config] Warning: File {:?} not found during read.", file_path);
          } else {
            return Err(ConfigError::IoError {
              path: file_path.clone(),
              source: e,
            });
          }
        }
      }
    }
  }

  // --- 3. Merge environment variables into the nested structure ---
  let mut env_source_flat_map: HashMap<String, ConfigSource> = HashMap::new();

  for (env_key_name, value_str) in env::vars() {
    if env_key_name.starts_with(ENV_VAR_PREFIX) {
      let trimmed_key = env_key_name.trim_start_matches(ENV_VAR_PREFIX);

      // Split by path separator, convert case for each part, then join.
      let prop_key = trimmed_key
        .split(ENV_VAR_SEPARATOR)
        .map(|part| convert_case(part, env_case))
        .collect::<Vec<String>>()
        .join(".");

      if prop_key.split('.').any(|part| part.is_empty()) {
        warn!(
          "[Config] Warning: Skipping env var '{}' due to invalid key format '{}'",
          env_key_name, prop_key
        );
        continue;
      }

      debug!("[Config] Processing env var '{}' for key '{}'", env_key_name, prop_key);

      env_source_flat_map.insert(prop_key.clone(), ConfigSource::EnvironmentVariable(env_key_name.clone()));

      merge_env_var_nested(&mut file_config_merged, &prop_key, &value_str)?;
    }
  }

  // --- 4. Flatten the final nested structure ---
  let mut final_flat_map = HashMap::new();
  util::build_flat_map(&file_config_merged, &mut final_flat_map, String::new());

  // --- 5. Apply to store with correct sources ---
  for (key, value) in final_flat_map {
    let final_source = match env_source_flat_map.get(&key) {
      Some(env_source) => env_source.clone(), // Env var took precedence
      None => {
        // Must have come from a file
        let top_level_key = key.split('.').next().unwrap_or(&key);
        file_source_map
          .get(top_level_key)
          .map(|path| ConfigSource::File(path.clone()))
          .unwrap_or(ConfigSource::Unknown)
      }
    };
    data_store.set_data(&key, value, final_source);
  }

  Ok(())
}

// Helper function to attempt parsing env var strings into store value types
pub(crate) fn parse_env_var_value(value_str: &str) -> PropValue {
  if value_str.eq_ignore_ascii_case("true") {
    return PropValue::Boolean(true);
  }
  if value_str.eq_ignore_ascii_case("false") {
    return PropValue::Boolean(false);
  }
  if let Ok(i) = value_str.parse::<i64>() {
    return PropValue::Integer(i);
  }
  // Values beyond i64::MAX still fit u64
  if let Ok(u) = value_str.parse::<u64>() {
    return PropValue::UInteger(u);
  }
  if let Ok(f) = value_str.parse::<f64>() {
    return PropValue::Float(f);
  }
  PropValue::String(value_str.to_string())
}

// Helper to merge a single environment variable into the nested structure
fn merge_env_var_nested(
  target_map: &mut HashMap<String, PropValue>,
  prop_key: &str,
  value_str: &str,
) -> Result<(), ConfigError> {
  let mut current_level_map = target_map;
  let key_parts: Vec<&str> = prop_key.split('.').collect();

  for (i, part) in key_parts.iter().enumerate() {
    if part.is_empty() {
      return Err(ConfigError::Message(format!(
        "Invalid key format: Encountered empty segment in env var key '{}'",
        prop_key
      )));
    }

    if i == key_parts.len() - 1 {
      // Last part: insert the final value
      current_level_map.insert(part.to_string(), parse_env_var_value(value_str));
      return Ok(());
    } else {
      // Intermediate part: ensure a map exists and descend
      match current_level_map.entry(part.to_string()) {
        std::collections::hash_map::Entry::Occupied(occ_entry) => {
          if !matches!(occ_entry.get(), PropValue::Map(_)) {
            return Err(ConfigError::Message(format!(
              "Env var key conflict: Cannot create nested structure for '{}' because part '{}' conflicts with an existing non-map value.",
              prop_key, part
            )));
          }
        }
        std::collections::hash_map::Entry::Vacant(vac_entry) => {
          vac_entry.insert(PropValue::Map(HashMap::new()));
        }
      }

      if let Some(PropValue::Map(next_map)) = current_level_map.get_mut(*part) {
        current_level_map = next_map;
      } else {
        unreachable!(
          "Map for part '{}' should exist here but wasn't found or wasn't a Map",
          part
        );
      }
    }
  }

  unreachable!("Loop should handle all parts or return early");
}

// Helper to recursively merge hashmaps, src overwrites dest.
// Ensures nested maps are merged correctly.
fn _merge(dest: &mut HashMap<String, PropValue>, src: &HashMap<String, PropValue>) {
  for (src_key, src_value) in src.iter() {
    match dest.entry(src_key.clone()) {
      std::collections::hash_map::Entry::Occupied(mut entry) => {
        let dest_val = entry.get_mut();
        if let (PropValue::Map(dest_map), PropValue::Map(src_map)) = (dest_val, src_value) {
          _merge(dest_map, src_map);
        } else {
          // Not both maps, source overwrites destination value
          *entry.into_mut() = src_value.clone();
        }
      }
      std::collections::hash_map::Entry::Vacant(entry) => {
        entry.insert(src_value.clone());
      }
    }
  }
}

// Helper to extract provider directives into provided_data, grouped by provider name
fn _take_provided_data(
  raw_config_data: &mut HashMap<String, PropValue>,
  provided_data: &mut MultiMap<String, PropValue>,
) {
  _take_provided_data_helper(raw_config_data, provided_data, String::new());
}

fn _take_provided_data_helper(
  current_map: &mut HashMap<String, PropValue>,
  provided_data: &mut MultiMap<String, PropValue>,
  current_keypath: String,
) {
  let keys: Vec<String> = current_map.keys().cloned().collect();

  for key in keys {
    let new_keypath = if current_keypath.is_empty() {
      key.clone()
    } else {
      format!("{}.{}", current_keypath, key)
    };

    let is_provider_directive = if let Some(PropValue::Map(data_map)) = current_map.get(&key) {
      data_map.contains_key(CONFIG_KEY_PROVIDER)
    } else {
      false
    };

    if is_provider_directive {
      if let Some(PropValue::Map(mut data_map)) = current_map.remove(&key) {
        data_map.insert(CONFIG_KEY_KEYPATH.to_string(), PropValue::String(new_keypath.clone()));
        data_map.insert(CONFIG_KEY_KEYNAME.to_string(), PropValue::String(key.clone()));
        if let Some(PropValue::String(provider_name)) = data_map.get(CONFIG_KEY_PROVIDER) {
          provided_data.insert(provider_name.clone(), PropValue::Map(data_map));
        } else {
          warn!(
            "[Config] Error: Provider directive at '{}' has non-string value for '.provider'",
            new_keypath
          );
        }
      }
    } else if let Some(PropValue::Map(sub_map)) = current_map.get_mut(&key) {
      _take_provided_data_helper(sub_map, provided_data, new_keypath);
      if sub_map.is_empty() {
        current_map.remove(&key);
      }
    }
  }
}

pub fn default_config_paths(config_dir: &str, release_env: &str, env: &str, region: &str) -> Vec<PathBuf> {
  let mut paths = vec![];

  paths.push(PathBuf::from(format!("{}/common.yaml", config_dir)));
  paths.push(PathBuf::from(format!("{}/{}.yaml", config_dir, release_env).as_str()));
  paths.push(PathBuf::from(format!("{}/{}.yaml", config_dir, env).as_str()));
  paths.push(PathBuf::from(format!("{}/{}.yaml", config_dir, region).as_str()));
  paths.push(PathBuf::from(
    format!("{}/{}-{}.yaml", config_dir, env, region).as_str(),
  ));

  return paths;
}
