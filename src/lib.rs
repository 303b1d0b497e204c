mod internal;
pub mod config_source;
pub mod error;
pub mod options;
pub mod props;
pub mod providers;
pub mod serialization;
pub mod telemetry;
pub mod util;
pub mod value;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use multimap::MultiMap;

pub use crate::config_source::ConfigSource;
pub use crate::error::ConfigError;
pub use crate::internal::PropDataValueRef;
pub use crate::options::{default_config_paths, Case, PropStoreOptions};
pub use crate::props::{ConfigProperties, VaultInjected, VaultPassword};

use crate::internal::PropDataStore;
use crate::options::read_config_data;
use crate::providers::PropValueProvider;
use crate::telemetry::{ConsoleLogger, Logger};
use crate::util::build_flat_map;
use crate::value::{prop_value_to_serde_json, PropValue};

pub type SetDataFn = dyn Fn(&str, PropValue) + Send + Sync;

pub struct HydrateContext {
  pub logger: Arc<dyn Logger>,
}

impl HydrateContext {
  /// Providers call this to land a hydrated value. Map values are flattened
  /// so that every leaf gets its own key path under `key`.
  pub fn push_value_to_data_store(set_data_fn: &SetDataFn, key: &str, value: PropValue) {

    match value {
      PropValue::Map(value_map) => {

        let mut config_data = HashMap::new();
        build_flat_map(&value_map, &mut config_data, String::from(key));

        for (entry_key, entry_value) in config_data {
          set_data_fn(&entry_key, entry_value);
        }
      }
      _ => {
        set_data_fn(key, value);
      }
    }
  }
}

pub trait PropStore {
  fn get(&self, key_path: &str) -> Option<PropValue>;

  fn get_ref(&self, key_path: &str) -> Option<PropDataValueRef>;

  fn get_into<Val>(&self, key_path: &str) -> Result<Val, ConfigError>
  where PropValue: TryInto<Val, Error = ConfigError>;

  //
  // Deserializes the configuration subtree under Props::PREFIX (relative to
  // the current key path) into a typed holder. An unbound prefix yields the
  // holder's defaults, not an error.
  //
  fn bind<Props: ConfigProperties>(&self) -> Result<Props, ConfigError>;

  fn exists(&self, key_path: &str) -> bool;

  fn path_exists(&self, key_path: &str) -> bool;

  fn branch(&self, key_path: &str) -> PropStoreBranch;

  //
  // Searches for all keypaths relative to currentKeyPath + given keyPath
  // @return A list of Key Paths
  //
  fn key_paths_with_prefix(&self, key_path: Option<&str>) -> Vec<String>;

  //
  // @return empty if root, prefix key if branch
  //
  fn current_key_path(&self) -> &str;

  fn source_of(&self, key_path: &str) -> Option<ConfigSource>;
}

#[derive(Clone)]
pub struct PropStoreRoot {
  _data_store: PropDataStore,
}

impl PropStoreRoot {
  pub(in crate) fn new(data_store: PropDataStore) -> PropStoreRoot {

    return PropStoreRoot {
      _data_store: data_store,
    };
  }

  fn _bind_at<Props: ConfigProperties>(&self, prefix: &str) -> Result<Props, ConfigError> {

    let subtree = self._data_store.fetch_children_as_value(prefix)?;

    let json_value = match subtree {
      PropValue::Null => serde_json::Value::Object(serde_json::Map::new()),
      other => prop_value_to_serde_json(other)?,
    };

    return serde_json::from_value(json_value).map_err(|err| ConfigError::DeserializationError {
      prefix: prefix.to_string(),
      source: err,
    });
  }
}

impl PropStore for PropStoreRoot {

  fn get(&self, key_path: &str) -> Option<PropValue> {

    return self._data_store.get_data(key_path);
  }

  fn get_ref(&self, key_path: &str) -> Option<PropDataValueRef> {

    return self._data_store.get_data_ref(key_path);
  }

  fn get_into<Val>(&self, key_path: &str) -> Result<Val, ConfigError>
  where PropValue: TryInto<Val, Error = ConfigError> {

    return match self._data_store.get_data(key_path) {
      Some(value) => value.try_into(),
      None => Err(ConfigError::KeyNotFound(key_path.to_string())),
    };
  }

  fn bind<Props: ConfigProperties>(&self) -> Result<Props, ConfigError> {

    return self._bind_at(Props::PREFIX);
  }

  fn exists(&self, key_path: &str) -> bool {

    return self._data_store.exists(key_path);
  }

  fn path_exists(&self, key_path: &str) -> bool {

    return self._data_store.prefix_key_exists(key_path);
  }

  fn branch(&self, key_path: &str) -> PropStoreBranch {
    return PropStoreBranch {
      _root: self.clone(),
      _key_path: key_path.to_string(),
    };
  }

  fn key_paths_with_prefix(&self, key_path: Option<&str>) -> Vec<String> {
    return self._data_store.keys_with_prefix(key_path);
  }

  fn current_key_path(&self) -> &str {
    return "";
  }

  fn source_of(&self, key_path: &str) -> Option<ConfigSource> {
    return self._data_store.get_source_info(key_path);
  }
}

#[derive(Clone)]
pub struct PropStoreBranch {
  _root: PropStoreRoot,
  _key_path: String,
}

impl PropStoreBranch {
  fn _merge_key_path(&self, key_path: &str) -> String {

    return self._key_path.to_string() + "." + key_path;
  }
}

impl PropStore for PropStoreBranch {
  fn get(&self, key_path: &str) -> Option<PropValue> {

    return self._root.get(&self._merge_key_path(key_path));
  }

  fn get_ref(&self, key_path: &str) -> Option<PropDataValueRef> {

    return self._root.get_ref(&self._merge_key_path(key_path));
  }

  fn get_into<Val>(&self, key_path: &str) -> Result<Val, ConfigError>
  where PropValue: TryInto<Val, Error = ConfigError> {

    return self._root.get_into(&self._merge_key_path(key_path));
  }

  fn bind<Props: ConfigProperties>(&self) -> Result<Props, ConfigError> {

    return self._root._bind_at(&self._merge_key_path(Props::PREFIX));
  }

  fn exists(&self, key_path: &str) -> bool {

    return self._root.exists(&self._merge_key_path(key_path));
  }

  fn path_exists(&self, key_path: &str) -> bool {

    return self._root.path_exists(&self._merge_key_path(key_path));
  }

  fn branch(&self, key_path: &str) -> PropStoreBranch {
    return PropStoreBranch {
      _root: self._root.clone(),
      _key_path: self._merge_key_path(key_path),
    };
  }

  fn key_paths_with_prefix(&self, key_path_option: Option<&str>) -> Vec<String> {

    return match key_path_option {
      Some(key_path) => {

        let merged_key_path = self._merge_key_path(key_path);
        self._root.key_paths_with_prefix(Some(&merged_key_path))
      },
      None => self._root.key_paths_with_prefix(Some(&self._key_path)),
    };
  }

  fn current_key_path(&self) -> &str {
    return &self._key_path;
  }

  fn source_of(&self, key_path: &str) -> Option<ConfigSource> {
    return self._root.source_of(&self._merge_key_path(key_path));
  }
}

pub struct PropStoreMgr {
  _value_providers: HashMap<String, Box<dyn PropValueProvider>>,
  _data_store: PropDataStore,
  _logger: Arc<dyn Logger>,
  _provided_data: MultiMap<String, PropValue>,
}

impl PropStoreMgr {
  fn new(
    data_store: PropDataStore,
    logger: Arc<dyn Logger>,
    provided_data: MultiMap<String, PropValue>,
  ) -> PropStoreMgr {

    return PropStoreMgr {
      _value_providers: HashMap::new(),
      _data_store: data_store,
      _logger: logger,
      _provided_data: provided_data,
    };
  }

  /// Registers a provider under `name`, hands it every directive declared for
  /// that name in the config files, and hydrates it once. Values never change
  /// after startup, so there is no refresh scheduling.
  pub fn set_value_provider<ValueProvider>(
    &mut self,
    name: &str,
    mut value_provider: ValueProvider,
  ) -> Result<(), ConfigError>
  where ValueProvider: 'static + PropValueProvider
  {

    let hydrate_context = HydrateContext {
      logger: self._logger.clone(),
    };

    let provided_data_option = self._provided_data.get_vec(name);

    if provided_data_option.is_none() {

      self._logger.warn(format!("{} value provider has no data to provide. Either remove this value provider or add configuration it must provide.", name).as_str());
      return Ok(());
    }

    for p_data in provided_data_option.unwrap() {
      value_provider.register(p_data)?;
    }

    let data_store = self._data_store.clone();
    let provider_name = name.to_string();
    let set_data_fn: Arc<SetDataFn> = Arc::new(move |key: &str, value: PropValue| {
      data_store.set_data(key, value, ConfigSource::Provider(provider_name.clone()));
    });

    value_provider.hydrate(&*set_data_fn, &hydrate_context)?;

    self._value_providers.insert(name.to_string(), Box::from(value_provider));

    return Ok(());
  }
}

impl Drop for PropStoreMgr {
  fn drop(&mut self) {

    self._logger.info("Stopping PropStoreMgr");

    self._value_providers.clear();

    self._logger.info("Stopped PropStoreMgr");
  }
}

pub fn create_prop_store(
  config_file_paths: &[PathBuf],
  options_option: Option<PropStoreOptions>,
) -> Result<(PropStoreRoot, PropStoreMgr), ConfigError> {

  let options = options_option.unwrap_or_default();

  let logger: Arc<dyn Logger> = match options.logger {
    Some(logger) => logger,
    None => Arc::new(ConsoleLogger {}),
  };

  #[cfg(feature = "dotenv")]
  if let Some(dotenv_path) = &options.dotenv_path {
    dotenvy::from_path(dotenv_path).map_err(|err| ConfigError::DotEnvLoadError {
      path: dotenv_path.clone(),
      source: err,
    })?;
  }

  let data_store = PropDataStore::new();
  let root = PropStoreRoot::new(data_store.clone());

  let mut provided_data: MultiMap<String, PropValue> = MultiMap::new();

  read_config_data(config_file_paths, &data_store, &mut provided_data, options.env_case)?;

  let mgr = PropStoreMgr::new(data_store, logger, provided_data);

  return Ok((root, mgr));
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use serial_test::serial;

  use crate::props::{VaultInjected, VaultPassword};
  use crate::providers::VaultFileValueProvider;
  use crate::value::PropValue;
  use crate::{create_prop_store, default_config_paths, ConfigError, ConfigSource, PropStore, PropStoreMgr, PropStoreRoot};

  fn _init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
  }

  fn _create_store() -> (PropStoreRoot, PropStoreMgr) {
    _init_test_logging();

    let config_file_paths = default_config_paths("configs/test/config", "development", "local", "private");

    return create_prop_store(&config_file_paths, None).unwrap();
  }

  fn _create_vault_store() -> (PropStoreRoot, PropStoreMgr) {
    _init_test_logging();

    let config_file_paths = vec![PathBuf::from("configs/vault_test/vault_config.yaml")];
    let (store, mut mgr) = create_prop_store(&config_file_paths, None).unwrap();

    mgr
      .set_value_provider("vault", VaultFileValueProvider::default_provider("configs/vault_test/secrets"))
      .unwrap();

    return (store, mgr);
  }

  #[test]
  #[serial]
  fn test_config_key_existence() {
    let (store, _mgr) = _create_store();

    assert_eq!(store.exists("app.name"), true);
    assert_eq!(store.exists("app"), false);
    assert_eq!(store.path_exists("app.name"), true);
    assert_eq!(store.path_exists("app.name."), false);
    assert_eq!(store.path_exists("app"), true);
  }

  #[test]
  #[serial]
  fn test_config_values_and_typed_access() {
    let (store, _mgr) = _create_store();

    assert_eq!(store.get("app.name").unwrap(), PropValue::String(String::from("wrongsecrets")));
    assert_eq!(store.get_into::<u64>("app.port").unwrap(), 8080u64);
    assert_eq!(
      store.get_into::<Vec<String>>("challenge.tags").unwrap(),
      vec![String::from("vault"), String::from("kubernetes")]
    );

    let missing = store.get_into::<String>("app.missing");
    assert!(matches!(missing, Err(ConfigError::KeyNotFound(_))));
  }

  #[test]
  #[serial]
  fn test_later_files_override_earlier_ones() {
    let (store, _mgr) = _create_store();

    // local.yaml overrides common.yaml for scalars, merges for maps
    assert_eq!(store.get("database.host").unwrap(), PropValue::String(String::from("127.0.0.1")));
    assert_eq!(store.get_into::<u64>("challenge.difficulty").unwrap(), 3u64);
    assert_eq!(store.get("app.name").unwrap(), PropValue::String(String::from("wrongsecrets")));

    assert_eq!(
      store.source_of("database.host").unwrap(),
      ConfigSource::File(PathBuf::from("configs/test/config/local.yaml"))
    );
  }

  #[test]
  #[serial]
  fn test_get_ref() {
    let (store, _mgr) = _create_store();

    let value_ref = store.get_ref("app.name").unwrap();
    assert_eq!(value_ref.value().unwrap(), &PropValue::String(String::from("wrongsecrets")));
  }

  #[test]
  #[serial]
  fn test_key_paths_with_prefix() {
    let (store, _mgr) = _create_store();

    let keys = store.key_paths_with_prefix(Some("challenge"));
    assert_eq!(keys, vec![String::from("challenge.difficulty"), String::from("challenge.tags")]);
  }

  #[test]
  #[serial]
  fn test_branch_scopes_key_paths() {
    let (store, _mgr) = _create_store();

    let database = store.branch("database");
    assert_eq!(database.current_key_path(), "database");
    assert_eq!(database.get("host").unwrap(), PropValue::String(String::from("127.0.0.1")));
    assert!(database.exists("host"));
    assert!(!database.exists("port"));
  }

  #[test]
  #[serial]
  fn test_env_var_overrides_files() {
    unsafe {
      std::env::set_var("VP_DATABASE__HOST", "10.0.0.5");
      std::env::set_var("VP_CHALLENGE__MAX_ATTEMPTS", "7");
    }

    let (store, _mgr) = _create_store();

    unsafe {
      std::env::remove_var("VP_DATABASE__HOST");
      std::env::remove_var("VP_CHALLENGE__MAX_ATTEMPTS");
    }

    assert_eq!(store.get("database.host").unwrap(), PropValue::String(String::from("10.0.0.5")));
    assert_eq!(store.get_into::<u64>("challenge.maxAttempts").unwrap(), 7u64);
    assert_eq!(
      store.source_of("database.host").unwrap(),
      ConfigSource::EnvironmentVariable(String::from("VP_DATABASE__HOST"))
    );
  }

  #[test]
  #[serial]
  fn test_vault_provider_hydrates_injected_secrets() {
    let (store, _mgr) = _create_vault_store();

    assert_eq!(
      store.get("vaultinjected.value").unwrap(),
      PropValue::String(String::from("injected-from-vault"))
    );
    assert_eq!(
      store.get("vaultpassword.password").unwrap(),
      PropValue::String(String::from("s3cr3t-from-vault"))
    );
    assert_eq!(
      store.source_of("vaultpassword.password").unwrap(),
      ConfigSource::Provider(String::from("vault"))
    );

    // Non-provider keys from the same file load normally
    assert_eq!(store.get("challenge.name").unwrap(), PropValue::String(String::from("challenge-7")));
  }

  #[test]
  #[serial]
  fn test_vault_provider_flattens_json_payloads() {
    let (store, _mgr) = _create_vault_store();

    assert_eq!(store.get("vaultdb.username").unwrap(), PropValue::String(String::from("app")));
    assert_eq!(store.get("vaultdb.password").unwrap(), PropValue::String(String::from("pw")));
  }

  #[test]
  #[serial]
  fn test_vault_provider_missing_secret_file_leaves_key_unset() {
    let (store, _mgr) = _create_vault_store();

    assert_eq!(store.get("vaultoptional.token"), None);
  }

  #[test]
  #[serial]
  fn test_bind_vault_holders() {
    let (store, _mgr) = _create_vault_store();

    let injected: VaultInjected = store.bind().unwrap();
    assert_eq!(injected.value(), "injected-from-vault");

    let password: VaultPassword = store.bind().unwrap();
    assert_eq!(password.password(), "s3cr3t-from-vault");
  }

  #[test]
  #[serial]
  fn test_bind_unbound_prefixes_default_to_empty() {
    let (store, _mgr) = _create_store();

    let injected: VaultInjected = store.bind().unwrap();
    assert_eq!(injected.value(), "");

    let password: VaultPassword = store.bind().unwrap();
    assert_eq!(password.password(), "");
  }
}
