use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("Key not found: {0}")]
  KeyNotFound(String),

  #[error("Type mismatch for key '{key}': expected {expected_type}, found {found_type}")]
  TypeMismatch {
    key: String,
    expected_type: &'static str,
    found_type: &'static str,
  },

  #[error("Conversion error for key '{key}': {message}")]
  ConversionError {
    key: String,
    message: String,
  },

  #[error("Failed to deserialize into target struct for prefix '{prefix}': {source}")]
  DeserializationError {
    prefix: String,
    #[source]
    source: serde_json::Error, // serde_json is the binding intermediate
  },

  #[error("IO error accessing path {path:?}: {source}")]
  IoError {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("Failed to parse YAML file {path:?}: {source}")]
  YamlParseError {
    path: PathBuf,
    #[source]
    source: serde_yaml::Error,
  },

  #[cfg(feature = "toml")]
  #[error("Failed to parse TOML file {path:?}: {source}")]
  TomlParseError {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },

  #[cfg(feature = "dotenv")]
  #[error("Failed to load .env file {path:?}: {source}")]
  DotEnvLoadError {
    path: PathBuf,
    #[source]
    source: dotenvy::Error,
  },

  #[error("Invalid provider directive at '{key_path}': {message}")]
  InvalidProviderDirective {
    key_path: String,
    message: String,
  },

  #[error("Provider '{provider}' failed to hydrate '{key_path}': {message}")]
  ProviderHydrateError {
    provider: String,
    key_path: String,
    message: String,
  },

  #[error("Configuration Error: {0}")]
  Message(String),

  #[error("Internal error: {0}")]
  Internal(String),
}
