use std::collections::HashMap;

use crate::ConfigError;

/// Snapshot of the variable store the binaries are configured from. Production
/// code takes it from the process environment; tests build it from literal
/// pairs so they never touch the real environment.
pub struct Vars(HashMap<String, String>);

impl Vars {
    pub fn from_env() -> Self {
        Self(std::env::vars().collect())
    }

    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).cloned()
    }

    pub fn get_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    pub fn require(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    pub fn require_json_list(&self, name: &'static str) -> Result<Vec<String>, ConfigError> {
        let raw = self.require(name)?;
        serde_json::from_str(&raw).map_err(|error| ConfigError::Json(name, error))
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Vars {
    fn from(pairs: [(&str, &str); N]) -> Self {
        Self(
            pairs
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
        )
    }
}
