// Network Driver Configuration
// Host/port based relational databases addressed by a PDO-style DSN

use super::{params_from_json, ConfigError, ConnectionParams, DriverConfig, DriverSettings};

/// Driver names accepted by `set_driver`
pub const ALLOWED_DRIVERS: [&str; 3] = ["pgsql", "mysql", "curbid"];

#[derive(Clone, PartialEq, Eq)]
pub struct NetworkDriverConfig {
    settings: DriverSettings,
    driver: Option<String>,
    host: String,
    port: Option<u16>,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl Default for NetworkDriverConfig {
    fn default() -> Self {
        Self {
            settings: DriverSettings::default(),
            driver: None,
            host: "localhost".to_string(),
            port: None,
            name: None,
            user: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for NetworkDriverConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkDriverConfig")
            .field("settings", &self.settings)
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

impl NetworkDriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from bulk parameters; any unknown key fails the whole construction
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
                "driver" => {
                    config.set_driver(value)?;
                }
                "host" => {
                    config.set_host(value);
                }
                "port" => {
                    let port = value.parse().map_err(|_| ConfigError::InvalidValue {
                        key: key.to_string(),
                        value: value.to_string(),
                    })?;
                    config.set_port(port);
                }
                "name" => {
                    config.set_name(value);
                }
                "user" => {
                    config.set_user(value);
                }
                "password" => {
                    config.set_password(value);
                }
                _ => return Err(ConfigError::UnknownParameter(key.to_string())),
            }
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Self::from_params(params_from_json(json)?)
    }

    /// Restrict the driver to the allow-list
    pub fn set_driver(&mut self, driver: &str) -> Result<&mut Self, ConfigError> {
        if !ALLOWED_DRIVERS.contains(&driver) {
            return Err(ConfigError::DriverNotAllowed {
                driver: driver.to_string(),
                allowed: ALLOWED_DRIVERS.join(", "),
            });
        }
        self.driver = Some(driver.to_string());
        Ok(self)
    }

    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = host.into();
        self
    }

    pub fn set_port(&mut self, port: u16) -> &mut Self {
        self.port = Some(port);
        self
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    pub fn set_user(&mut self, user: impl Into<String>) -> &mut Self {
        self.user = Some(user.into());
        self
    }

    pub fn set_password(&mut self, password: impl Into<String>) -> &mut Self {
        self.password = Some(password.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }
}

impl DriverConfig for NetworkDriverConfig {
    fn settings(&self) -> &DriverSettings {
        &self.settings
    }

    fn settings_mut(&mut self) -> &mut DriverSettings {
        &mut self.settings
    }

    fn name(&self) -> &str {
        self.driver.as_deref().unwrap_or_default()
    }

    fn export(&self) -> ConnectionParams {
        let mut params = ConnectionParams::default();
        params.insert("driver", Some(self.name().to_string()));
        params.insert("host", Some(self.host.clone()));
        params.insert("port", self.port.map(|p| p.to_string()));
        params.insert("user", self.user.clone());
        params.insert("name", self.name.clone());
        params.insert("pass", self.password.clone());
        params
    }

    fn connection_string(&self) -> Result<String, ConfigError> {
        if self.user.is_none() {
            return Err(ConfigError::MissingField("user"));
        }
        if self.password.is_none() {
            return Err(ConfigError::MissingField("password"));
        }
        let driver = self.driver.as_deref().ok_or(ConfigError::MissingField("driver"))?;
        let name = self.name.as_deref().ok_or(ConfigError::MissingField("name"))?;

        let mut dsn = format!("{}:host={};dbname={}", driver, self.host, name);
        // Without a port the driver default applies; an empty `port=` is never emitted
        if let Some(port) = self.port {
            dsn.push_str(&format!(";port={}", port));
        }
        Ok(dsn)
    }
}
