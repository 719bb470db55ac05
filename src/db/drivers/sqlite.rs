// SQLite Driver Configuration
// File-based databases addressed as sqlite:<path>

use super::{params_from_json, ConfigError, ConnectionParams, DriverConfig, DriverSettings};

pub const SQLITE_DRIVER: &str = "sqlite";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDriverConfig {
    settings: DriverSettings,
    /// Path to the database file, `:memory:` for an in-memory database
    path: Option<String>,
}

impl FileDriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_params<I, K, V>(params: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = Self::new();
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            if config.settings.apply(key, value)? {
                continue;
            }
            match key {
                "path" => {
                    config.set_path(value);
                }
                _ => return Err(ConfigError::UnknownParameter(key.to_string())),
            }
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_params(params_from_json(json)?)
    }

    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = Some(path.into());
        self
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl DriverConfig for FileDriverConfig {
    fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut DriverSettings {
        &mut self.settings
    }

    fn name(&self) -> &str {
        SQLITE_DRIVER
    }

    fn export(&self) -> ConnectionParams {
        let mut params = ConnectionParams::default();
        params.insert("driver", Some(SQLITE_DRIVER.to_string()));
        params.insert("path", self.path.clone());
        params
    }

    fn connection_string(&self) -> Result<String, ConfigError> {
        let path = self.path.as_deref().ok_or(ConfigError::MissingField("path"))?;
        Ok(format!("{}:{}", SQLITE_DRIVER, path))
    }
}
