use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A struct that binds to the configuration subtree under a fixed key prefix.
///
/// Implementors are plain data holders: every field should be deserializable
/// and carry a default so an unbound prefix yields an empty holder rather
/// than an error. Bind one with [`PropStore::bind`](crate::PropStore::bind).
pub trait ConfigProperties: DeserializeOwned {
  /// The key prefix this type binds to, e.g. `"vaultinjected"`.
  const PREFIX: &'static str;
}

/// Holder for the value injected by the Vault agent, bound to the
/// `vaultinjected` prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInjected {
  #[serde(default)]
  value: String,
}

impl VaultInjected {
  pub fn value(&self) -> &str {
    return &self.value;
  }

  pub fn set_value(&mut self, value: impl Into<String>) {
    self.value = value.into();
  }
}

impl ConfigProperties for VaultInjected {
  const PREFIX: &'static str = "vaultinjected";
}

/// Holder for the password sourced from Vault, bound to the `vaultpassword`
/// prefix.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPassword {
  #[serde(default)]
  password: String,
}

impl VaultPassword {
  pub fn password(&self) -> &str {
    return &self.password;
  }

  pub fn set_password(&mut self, password: impl Into<String>) {
    self.password = password.into();
  }
}

impl ConfigProperties for VaultPassword {
  const PREFIX: &'static str = "vaultpassword";
}
