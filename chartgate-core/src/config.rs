//! Configuration-file convention: a `Config` trait that validates, then
//! saves/loads as YAML.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration is invalid: {0:?}")]
    Invalid(Vec<String>),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A type that can be loaded from, and saved to, a YAML file on disk, with a
/// validation pass run before every save.
pub trait Config: serde::Serialize {
    fn validate(&self) -> Result<(), Vec<String>>;

    fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Err(e) = self.validate() {
            return Err(ConfigError::Invalid(e));
        }
        let s = serde_yaml::to_string(self)?;
        let mut f = File::create(path)?;
        f.write_all(s.as_bytes())?;
        Ok(())
    }

    fn load<A>(path: &Path) -> Result<A, ConfigError>
    where
        for<'de> A: Config + serde::Deserialize<'de>,
    {
        let mut f = File::open(path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        let parsed: A = serde_yaml::from_str(&s)?;
        if let Err(e) = parsed.validate() {
            return Err(ConfigError::Invalid(e));
        }
        Ok(parsed)
    }
}

impl Config for chartgate_types::GatewayConfig {
    fn validate(&self) -> Result<(), Vec<String>> {
        chartgate_types::GatewayConfig::validate(self)
    }
}
