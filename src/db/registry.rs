// Connection Registry
// Maps connection keys to engine sessions and tracks which one is active

use std::sync::{Arc, Mutex};

use crate::db::drivers::DriverConfig;
use crate::db::engine::SqliteEngine;
use crate::db::models::{ModelCatalog, ModelFactory, ValidationContext};
use crate::db::traits::{DatabaseResult, EngineError, NewConnection, PersistenceEngine};

/// Key used when none is given
pub const DEFAULT_KEY: &str = "default";

/// Registry for keyed database sessions.
///
/// Share it by `Arc`; several registries can live side by side. Switching keys
/// from different threads still needs external ordering.
pub struct ConnectionRegistry {
    engine: Mutex<Box<dyn PersistenceEngine>>,
    catalog: Arc<ModelCatalog>,
    validation_context: ValidationContext,
}

impl ConnectionRegistry {
    /// Create a registry over an engine with no sessions yet
    pub fn new(
        engine: impl PersistenceEngine + 'static,
        catalog: ModelCatalog,
        validation_context: ValidationContext,
    ) -> Self {
        Self {
            engine: Mutex::new(Box::new(engine)),
            catalog: Arc::new(catalog),
            validation_context,
        }
    }

    /// Registry over a fresh SQLite engine
    pub fn sqlite(catalog: ModelCatalog, validation_context: ValidationContext) -> Self {
        Self::new(SqliteEngine::new(), catalog, validation_context)
    }

    /// Create a registry and register `config` under the default key
    pub fn connect(
        config: &dyn DriverConfig,
        engine: impl PersistenceEngine + 'static,
        catalog: ModelCatalog,
        validation_context: ValidationContext,
    ) -> DatabaseResult<Self> {
        let registry = Self::new(engine, catalog, validation_context);
        registry.switch_default(config)?;
        Ok(registry)
    }

    /// Register `config` under `key` and make it active.
    ///
    /// An already registered key is only re-activated; `config` is ignored.
    pub fn switch_database(
        &self,
        config: &dyn DriverConfig,
        key: &str,
        frozen: Option<bool>,
    ) -> DatabaseResult<()> {
        self.with_engine(|engine| {
            if engine.has_connection(key) {
                engine.select_connection(key)?;
                tracing::debug!("[Registry] Re-activated connection: {}", key);
                return Ok(());
            }

            let model_factory = (key == DEFAULT_KEY).then(|| self.model_factory_for(config));
            let frozen = frozen.unwrap_or_else(|| config.frozen());

            let dsn = config.connection_string()?;
            let params = config.export();
            engine.add_connection(NewConnection {
                key: key.to_string(),
                dsn,
                user: params.get("user").map(str::to_string),
                password: params.get("pass").map(str::to_string),
                frozen,
                model_factory,
            })?;
            engine.select_connection(key)?;

            tracing::info!(
                "[Registry] Registered connection: {} (driver: {}, frozen: {})",
                key,
                config.name(),
                frozen
            );
            Ok(())
        })
    }

    /// Register under the default key, frozen flag taken from `config`
    pub fn switch_default(&self, config: &dyn DriverConfig) -> DatabaseResult<()> {
        self.switch_database(config, DEFAULT_KEY, None)
    }

    /// Close the active session
    pub fn disconnect(&self) -> DatabaseResult<()> {
        self.with_engine(|engine| {
            engine.close_connection();
            tracing::debug!("[Registry] Disconnected: {:?}", engine.active_key());
            Ok(())
        })
    }

    /// Liveness of the active session; false when nothing is active
    pub fn is_connected(&self) -> bool {
        self.with_engine(|engine| Ok::<_, EngineError>(engine.is_session_connected()))
            .unwrap_or(false)
    }

    pub fn has_connection(&self, key: &str) -> bool {
        self.with_engine(|engine| Ok::<_, EngineError>(engine.has_connection(key)))
            .unwrap_or(false)
    }

    pub fn active_key(&self) -> Option<String> {
        self.with_engine(|engine| Ok::<_, EngineError>(engine.active_key().map(str::to_string)))
            .ok()
            .flatten()
    }

    /// Execute a function with exclusive engine access
    pub fn with_engine<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn PersistenceEngine) -> Result<T, E>,
        E: From<EngineError>,
    {
        let mut engine = self.engine.lock().map_err(|_| EngineError::LockPoisoned)?;
        f(engine.as_mut())
    }

    /// Model factory for the default key, injecting the validation context into new models
    fn model_factory_for(&self, config: &dyn DriverConfig) -> ModelFactory {
        let context = Arc::clone(&self.validation_context);
        ModelFactory::new(
            config.namespace(),
            config.fail_if_model_missing(),
            Arc::clone(&self.catalog),
        )
        .with_hook(move |model| model.set_validation_context(Arc::clone(&context)))
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry")
            .field("active_key", &self.active_key())
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::drivers::{ConfigError, FileDriverConfig, NetworkDriverConfig};
    use crate::db::models::tests::{contact_catalog, Contact};
    use crate::db::models::{Model, ModelError};
    use crate::db::traits::{CellValue, DatabaseError, Row};
    use std::collections::HashMap;

    /// Records what the registry asked for instead of opening anything
    #[derive(Default)]
    struct MockEngine {
        sessions: HashMap<String, (String, bool, bool)>,
        active: Option<String>,
        closed: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl PersistenceEngine for MockEngine {
        fn add_connection(&mut self, request: NewConnection) -> Result<(), EngineError> {
            if let Ok(mut log) = self.log.lock() {
                log.push(format!("add {} {}", request.key, request.dsn));
            }
            self.sessions.insert(
                request.key,
                (request.dsn, request.frozen, request.model_factory.is_some()),
            );
            Ok(())
        }

        fn select_connection(&mut self, key: &str) -> Result<(), EngineError> {
            self.active = Some(key.to_string());
            self.closed = false;
            Ok(())
        }

        fn has_connection(&self, key: &str) -> bool {
            self.sessions.contains_key(key)
        }

        fn active_key(&self) -> Option<&str> {
            self.active.as_deref()
        }

        fn close_connection(&mut self) {
            self.closed = true;
        }

        fn is_session_connected(&self) -> bool {
            self.active.is_some() && !self.closed
        }

        fn run_query_all(&mut self, sql: &str, _bindings: &[CellValue]) -> Result<Vec<Row>, EngineError> {
            let active = self.active.clone().ok_or(EngineError::NoActiveSession)?;
            let (dsn, frozen, has_factory) = self.sessions[&active].clone();
            let mut row = Row::new();
            row.push("sql", sql);
            row.push("dsn", dsn);
            row.push("frozen", frozen);
            row.push("has_factory", has_factory);
            Ok(vec![row])
        }

        fn exec(&mut self, _sql: &str, _bindings: &[CellValue]) -> Result<usize, EngineError> {
            Ok(0)
        }

        fn resolve_model(&self, _declared_type: &str) -> Result<Option<Box<dyn Model>>, ModelError> {
            Ok(None)
        }
    }

    fn network_config(name: &str) -> NetworkDriverConfig {
        let mut config = NetworkDriverConfig::new();
        config
            .set_driver("pgsql")
            .unwrap()
            .set_name(name)
            .set_user("user")
            .set_password("secret");
        config
    }

    fn registry_with_log() -> (ConnectionRegistry, Arc<Mutex<Vec<String>>>) {
        let engine = MockEngine::default();
        let log = Arc::clone(&engine.log);
        let registry = ConnectionRegistry::new(engine, ModelCatalog::new(), Arc::new(()));
        (registry, log)
    }

    fn active_row(registry: &ConnectionRegistry) -> Row {
        registry
            .with_engine(|engine| engine.run_query_all("SELECT 1", &[]))
            .unwrap()
            .remove(0)
    }

    #[test]
    fn test_not_connected_before_switch() {
        let (registry, _) = registry_with_log();
        assert!(!registry.is_connected());
        assert!(registry.active_key().is_none());
    }

    #[test]
    fn test_switch_registers_and_activates() {
        let (registry, log) = registry_with_log();
        registry.switch_default(&network_config("first")).unwrap();

        assert!(registry.is_connected());
        assert_eq!(registry.active_key().as_deref(), Some(DEFAULT_KEY));
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["add default pgsql:host=localhost;dbname=first"]
        );
        assert_eq!(
            active_row(&registry).get("has_factory"),
            Some(&CellValue::Bool(true))
        );
    }

    #[test]
    fn test_reregistering_key_keeps_original_session() {
        let (registry, log) = registry_with_log();
        registry.switch_default(&network_config("first")).unwrap();
        registry.switch_default(&network_config("second")).unwrap();

        // Even an invalid config only re-activates
        registry
            .switch_database(&NetworkDriverConfig::new(), DEFAULT_KEY, Some(true))
            .unwrap();

        assert_eq!(log.lock().unwrap().len(), 1);
        assert_eq!(
            active_row(&registry).get("dsn"),
            Some(&CellValue::from("pgsql:host=localhost;dbname=first"))
        );
    }

    #[test]
    fn test_switching_between_keys() {
        let (registry, _) = registry_with_log();
        registry.switch_default(&network_config("main")).unwrap();
        registry
            .switch_database(&network_config("reports"), "reports", None)
            .unwrap();

        assert_eq!(registry.active_key().as_deref(), Some("reports"));
        assert_eq!(
            active_row(&registry).get("has_factory"),
            Some(&CellValue::Bool(false))
        );

        registry.switch_default(&network_config("ignored")).unwrap();
        assert_eq!(registry.active_key().as_deref(), Some(DEFAULT_KEY));
        assert!(registry.has_connection("reports"));
    }

    #[test]
    fn test_frozen_override() {
        let (registry, _) = registry_with_log();
        let mut config = network_config("main");
        config.set_frozen(true);

        registry.switch_database(&config, "plain", None).unwrap();
        assert_eq!(active_row(&registry).get("frozen"), Some(&CellValue::Bool(true)));

        registry.switch_database(&config, "fluid", Some(false)).unwrap();
        assert_eq!(active_row(&registry).get("frozen"), Some(&CellValue::Bool(false)));
    }

    #[test]
    fn test_config_error_before_engine_call() {
        let (registry, log) = registry_with_log();
        let mut config = NetworkDriverConfig::new();
        config.set_user("user");

        let err = registry.switch_default(&config).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Config(ConfigError::MissingField("password"))
        ));
        assert!(log.lock().unwrap().is_empty());
        assert!(!registry.is_connected());
    }

    #[test]
    fn test_disconnect() {
        let (registry, _) = registry_with_log();
        registry.switch_default(&network_config("main")).unwrap();
        assert!(registry.is_connected());

        registry.disconnect().unwrap();
        assert!(!registry.is_connected());
    }

    #[test]
    fn test_sqlite_registry_binds_validation_context() {
        let mut config = FileDriverConfig::new();
        config.set_path(":memory:").set_namespace("tests::");

        let context: ValidationContext = Arc::new(42_u32);
        let registry = ConnectionRegistry::connect(
            &config,
            SqliteEngine::new(),
            contact_catalog("tests::"),
            Arc::clone(&context),
        )
        .unwrap();
        assert!(registry.is_connected());

        let model = registry
            .with_engine(|engine| Ok::<_, DatabaseError>(engine.resolve_model("contact")?))
            .unwrap()
            .unwrap();
        let contact = model.as_any().downcast_ref::<Contact>().unwrap();
        let bound = contact.context.as_ref().unwrap();
        assert_eq!(bound.downcast_ref::<u32>(), Some(&42));

        let err = registry
            .with_engine(|engine| Ok::<_, DatabaseError>(engine.resolve_model("invoice")?))
            .err();
        assert!(matches!(err, Some(DatabaseError::Model(ModelError::NotFound(_)))));

        registry.disconnect().unwrap();
        assert!(!registry.is_connected());
    }

    #[test]
    fn test_engine_errors_propagate() {
        let registry = ConnectionRegistry::sqlite(ModelCatalog::new(), Arc::new(()));
        let err = registry.switch_default(&network_config("main")).unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Engine(EngineError::UnsupportedDriver(_))
        ));
        assert!(!registry.is_connected());
    }
}
