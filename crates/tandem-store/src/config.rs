use serde::{Deserialize, Serialize};

use crate::error::StoreResult;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Author recorded on commits made by this process.
    pub author: String,
    /// Share one placeholder and one fetch between concurrent `get`s of the
    /// same id. Off by default: each `get` of an unknown id fetches.
    ///
    /// Only the first caller receives the fetch's handle. Callers that join
    /// it get no handle; a failed fetch leaves their placeholder without
    /// data, and the next `get` starts a fresh fetch.
    pub dedupe_fetches: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            author: "local".to_string(),
            dedupe_fetches: false,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(text: &str) -> StoreResult<Self> {
        Ok(toml::from_str(text)?)
    }
}
