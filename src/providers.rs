use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::Engine;

use crate::error::ConfigError;
use crate::serialization::{deserialize_json, deserialize_yaml};
use crate::util::expand_env_path;
use crate::value::PropValue;
use crate::{HydrateContext, SetDataFn};

pub(in crate) const CONFIG_KEY_KEYNAME: &str = ".key";
pub(in crate) const CONFIG_KEY_KEYPATH: &str = ".keyPath";
pub(in crate) const CONFIG_KEY_PROVIDER: &str = ".provider";

pub enum RawPropValue {
  Bytes(Vec<u8>),
  String(Box<str>),
}

pub type PropValueDeserializer = dyn Fn(RawPropValue) -> PropValue + Send + Sync;

/// A source of configuration values that live outside the config files, keyed
/// by directives in those files. Providers are registered on the store
/// manager and hydrated once at startup.
pub trait PropValueProvider: Send + Sync {

  fn register(&mut self, data: &PropValue) -> Result<(), ConfigError>;

  fn unregister(&mut self, key: &str);

  fn hydrate(&self, set_data_fn: &SetDataFn, context: &HydrateContext) -> Result<(), ConfigError>;
}

/// The common part of every provider directive: which provider serves the
/// key, the flattened key path it lands on, and the key's own name.
pub struct ProviderDirective {
  pub provider: Box<str>,
  pub key_path: Box<str>,
  pub key: Box<str>,
}

impl ProviderDirective {

  pub fn from_map(map: &HashMap<String, PropValue>) -> Result<ProviderDirective, ConfigError> {

    let provider = _require_string_entry(map, CONFIG_KEY_PROVIDER)?;
    let key_path = _require_string_entry(map, CONFIG_KEY_KEYPATH)?;
    let key = _require_string_entry(map, CONFIG_KEY_KEYNAME)?;

    return Ok(ProviderDirective {
      provider,
      key_path,
      key,
    });
  }
}

fn _require_string_entry(map: &HashMap<String, PropValue>, entry_key: &str) -> Result<Box<str>, ConfigError> {

  return match map.get(entry_key) {
    Some(PropValue::String(value)) => Ok(value.clone().into_boxed_str()),
    Some(other) => Err(ConfigError::InvalidProviderDirective {
      key_path: entry_key.to_string(),
      message: format!("'{}' must be a string, found {}", entry_key, other.type_name()),
    }),
    None => Err(ConfigError::InvalidProviderDirective {
      key_path: entry_key.to_string(),
      message: format!("'{}' is missing", entry_key),
    }),
  };
}

fn _optional_string_entry(
  map: &HashMap<String, PropValue>,
  entry_key: &str,
  default: &str,
) -> Result<Box<str>, ConfigError> {

  return match map.get(entry_key) {
    Some(PropValue::String(value)) => Ok(value.clone().into_boxed_str()),
    Some(other) => Err(ConfigError::InvalidProviderDirective {
      key_path: entry_key.to_string(),
      message: format!("'{}' must be a string, found {}", entry_key, other.type_name()),
    }),
    None => Ok(Box::from(default)),
  };
}

/// Directive for one Vault-injected secret file: the file's path relative to
/// the mount directory, its payload format, and its on-disk encoding.
pub struct VaultEntryDirective {
  pub directive: ProviderDirective,
  pub path: Box<str>,
  pub encoding: Box<str>,
  pub format: Box<str>,
}

/// Reads secret files that a Vault agent (or any injector) has written under
/// a mount directory, e.g. `/vault/secrets`. Which keys it serves is declared
/// in the config files:
///
/// ```yaml
/// vaultinjected:
///   value:
///     .provider: vault
///     path: value
///     format: raw
///     encoding: utf8
/// ```
///
/// Formats `json` and `yaml` are parsed and flattened under the key path;
/// `raw` stores the payload as-is. Encodings: `utf8` (default, one trailing
/// newline stripped), `base64`, `binary`.
pub struct VaultFileValueProvider {
  _secrets_dir: Box<str>,
  _entries: HashMap<Box<str>, VaultEntryDirective>,
  _deserializers: HashMap<Box<str>, Box<PropValueDeserializer>>,
}

impl VaultFileValueProvider {

  pub fn new(secrets_dir: &str) -> VaultFileValueProvider {

    return VaultFileValueProvider {
      _secrets_dir: Box::from(secrets_dir),
      _entries: HashMap::new(),
      _deserializers: HashMap::new(),
    };
  }

  /// A provider with the `json` and `yaml` payload formats pre-registered.
  pub fn default_provider(secrets_dir: &str) -> VaultFileValueProvider {

    let mut provider = VaultFileValueProvider::new(secrets_dir);

    provider.register_deserializer("json", deserialize_json);
    provider.register_deserializer("yaml", deserialize_yaml);

    return provider;
  }

  pub fn register_deserializer<Deserializer>(&mut self, format_name: &str, deserializer: Deserializer)
  where Deserializer: 'static + Fn(RawPropValue) -> PropValue + Send + Sync {

    self._deserializers.insert(
      Box::from(format_name),
      Box::from(deserializer),
    );
  }

  fn _resolve_file_path(&self, entry: &VaultEntryDirective) -> Result<PathBuf, ConfigError> {

    let mut file_path = PathBuf::from(&*entry.path);

    if !file_path.is_absolute() {
      let expanded_dir = expand_env_path(&self._secrets_dir)?;
      file_path = Path::new(&expanded_dir).join(&*entry.path);
    }

    return Ok(file_path);
  }

  fn _decode(&self, entry: &VaultEntryDirective, file_bytes: Vec<u8>) -> Result<RawPropValue, ConfigError> {

    return match &*entry.encoding {
      "utf8" => {
        let mut text = String::from_utf8(file_bytes).map_err(|err| ConfigError::ProviderHydrateError {
          provider: entry.directive.provider.to_string(),
          key_path: entry.directive.key_path.to_string(),
          message: format!("payload is not valid UTF-8: {}", err),
        })?;

        // Injectors commonly newline-terminate text files. The secret is the
        // line, not the terminator.
        if text.ends_with('\n') {
          text.pop();
          if text.ends_with('\r') {
            text.pop();
          }
        }

        Ok(RawPropValue::String(text.into_boxed_str()))
      }
      "base64" => {
        let decoded = base64::engine::general_purpose::STANDARD
          .decode(file_bytes.trim_ascii())
          .map_err(|err| ConfigError::ProviderHydrateError {
            provider: entry.directive.provider.to_string(),
            key_path: entry.directive.key_path.to_string(),
            message: format!("payload is not valid base64: {}", err),
          })?;

        Ok(RawPropValue::Bytes(decoded))
      }
      "binary" => Ok(RawPropValue::Bytes(file_bytes)),
      other => Err(ConfigError::InvalidProviderDirective {
        key_path: entry.directive.key_path.to_string(),
        message: format!("unknown encoding '{}'", other),
      }),
    };
  }
}

impl PropValueProvider for VaultFileValueProvider {

  fn register(&mut self, data: &PropValue) -> Result<(), ConfigError> {

    let map = match data {
      PropValue::Map(map) => map,
      other => {
        return Err(ConfigError::InvalidProviderDirective {
          key_path: String::new(),
          message: format!("directive must be a map, found {}", other.type_name()),
        });
      }
    };

    let directive = ProviderDirective::from_map(map)?;
    let path = _require_string_entry(map, "path")?;
    let encoding = _optional_string_entry(map, "encoding", "utf8")?;
    let format = _optional_string_entry(map, "format", "raw")?;

    let entry = VaultEntryDirective {
      directive,
      path,
      encoding,
      format,
    };

    self._entries.insert(entry.directive.key_path.clone(), entry);

    return Ok(());
  }

  fn unregister(&mut self, key: &str) {

    self._entries.remove(key);
  }

  fn hydrate(&self, set_data_fn: &SetDataFn, context: &HydrateContext) -> Result<(), ConfigError> {

    for (key_path, entry) in self._entries.iter() {

      let file_path = self._resolve_file_path(entry)?;

      let file_bytes = match fs::read(&file_path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
          // An unbound secret degrades to an absent key, never an error.
          context.logger.warn(
            format!(
              "Secret file {:?} for `{}` is not present, leaving key unset",
              file_path, key_path
            )
            .as_str(),
          );
          continue;
        }
        Err(err) => {
          return Err(ConfigError::IoError {
            path: file_path,
            source: err,
          });
        }
      };

      let raw_value = self._decode(entry, file_bytes)?;

      let value = if &*entry.format == "raw" {
        match raw_value {
          RawPropValue::String(text) => PropValue::String(text.into_string()),
          RawPropValue::Bytes(bytes) => PropValue::Bytes(bytes),
        }
      } else {
        match self._deserializers.get(&entry.format) {
          Some(deserializer) => deserializer(raw_value),
          None => {
            context.logger.warn(
              format!(
                "`{}` cannot be deserialized since deserializer {} does not exist",
                key_path, entry.format
              )
              .as_str(),
            );
            continue;
          }
        }
      };

      HydrateContext::push_value_to_data_store(set_data_fn, key_path, value);
    }

    return Ok(());
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashMap;
  use std::fs;
  use std::sync::Arc;

  use parking_lot::Mutex;
  use tempfile::tempdir;

  use super::{PropValueProvider, VaultFileValueProvider, CONFIG_KEY_KEYNAME, CONFIG_KEY_KEYPATH, CONFIG_KEY_PROVIDER};
  use crate::telemetry::ConsoleLogger;
  use crate::value::PropValue;
  use crate::HydrateContext;

  fn _directive(key_path: &str, key: &str, path: &str, format: &str, encoding: &str) -> PropValue {
    let mut map = HashMap::new();
    map.insert(CONFIG_KEY_PROVIDER.to_string(), PropValue::String("vault".to_string()));
    map.insert(CONFIG_KEY_KEYPATH.to_string(), PropValue::String(key_path.to_string()));
    map.insert(CONFIG_KEY_KEYNAME.to_string(), PropValue::String(key.to_string()));
    map.insert("path".to_string(), PropValue::String(path.to_string()));
    map.insert("format".to_string(), PropValue::String(format.to_string()));
    map.insert("encoding".to_string(), PropValue::String(encoding.to_string()));
    return PropValue::Map(map);
  }

  fn _hydrate(provider: &VaultFileValueProvider) -> HashMap<String, PropValue> {
    let collected = Arc::new(Mutex::new(HashMap::new()));
    let sink = collected.clone();
    let set_data_fn = move |key: &str, value: PropValue| {
      sink.lock().insert(key.to_string(), value);
    };
    let context = HydrateContext {
      logger: Arc::new(ConsoleLogger {}),
    };

    provider.hydrate(&set_data_fn, &context).unwrap();

    let collected_map = collected.lock().clone();
    return collected_map;
  }

  #[test]
  fn test_hydrate_raw_utf8_strips_trailing_newline() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("value"), b"injected-from-vault\n").unwrap();

    let mut provider = VaultFileValueProvider::default_provider(dir.path().to_str().unwrap());
    provider
      .register(&_directive("vaultinjected.value", "value", "value", "raw", "utf8"))
      .unwrap();

    let collected = _hydrate(&provider);

    assert_eq!(
      collected.get("vaultinjected.value"),
      Some(&PropValue::String("injected-from-vault".to_string()))
    );
  }

  #[test]
  fn test_hydrate_json_flattens_under_key_path() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("credentials.json"), br#"{"username": "app", "password": "pw"}"#).unwrap();

    let mut provider = VaultFileValueProvider::default_provider(dir.path().to_str().unwrap());
    provider
      .register(&_directive("vaultdb", "vaultdb", "credentials.json", "json", "utf8"))
      .unwrap();

    let collected = _hydrate(&provider);

    assert_eq!(collected.get("vaultdb.username"), Some(&PropValue::String("app".to_string())));
    assert_eq!(collected.get("vaultdb.password"), Some(&PropValue::String("pw".to_string())));
  }

  #[test]
  fn test_hydrate_base64_decodes_to_bytes() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("material"), b"YmFzZTY0LXNlY3JldA==\n").unwrap();

    let mut provider = VaultFileValueProvider::default_provider(dir.path().to_str().unwrap());
    provider
      .register(&_directive("vaultkey.material", "material", "material", "raw", "base64"))
      .unwrap();

    let collected = _hydrate(&provider);

    assert_eq!(
      collected.get("vaultkey.material"),
      Some(&PropValue::Bytes(b"base64-secret".to_vec()))
    );
  }

  #[test]
  fn test_hydrate_missing_file_leaves_key_unset() {
    let dir = tempdir().unwrap();

    let mut provider = VaultFileValueProvider::default_provider(dir.path().to_str().unwrap());
    provider
      .register(&_directive("vaultoptional.token", "token", "missing/token", "raw", "utf8"))
      .unwrap();

    let collected = _hydrate(&provider);

    assert!(collected.is_empty());
  }

  #[test]
  fn test_register_rejects_non_map_directive() {
    let mut provider = VaultFileValueProvider::new("/vault/secrets");

    assert!(provider.register(&PropValue::String("nope".to_string())).is_err());
  }

  #[test]
  fn test_unregister_removes_entry() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("value"), b"secret\n").unwrap();

    let mut provider = VaultFileValueProvider::default_provider(dir.path().to_str().unwrap());
    provider
      .register(&_directive("vaultinjected.value", "value", "value", "raw", "utf8"))
      .unwrap();
    provider.unregister("vaultinjected.value");

    let collected = _hydrate(&provider);

    assert!(collected.is_empty());
  }
}
