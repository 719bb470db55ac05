// Model Resolution
// Maps a row's declared type to a registered model constructor under a namespace

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::db::traits::{CellValue, Row};

/// Opaque object handed to every constructed model; never interpreted here
pub type ValidationContext = Arc<dyn Any + Send + Sync>;

pub type ModelConstructor = Arc<dyn Fn() -> Box<dyn Model> + Send + Sync>;

/// Runs on every freshly constructed model
pub type ModelHook = Arc<dyn Fn(&mut dyn Model) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    #[error("Model not exists: {0}")]
    NotFound(String),
}

/// Per-type record wrapper
pub trait Model: Any {
    fn model_name(&self) -> &str;

    fn set_validation_context(&mut self, context: ValidationContext);

    fn validation_context(&self) -> Option<&ValidationContext>;

    /// Allow downcasting to the concrete model
    fn as_any(&self) -> &dyn Any;
}

/// Explicit map of fully qualified model names to constructors, filled at startup
#[derive(Clone, Default)]
pub struct ModelCatalog {
    constructors: HashMap<String, ModelConstructor>,
}

impl ModelCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, class_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn Model> + Send + Sync + 'static,
    {
        self.constructors
            .insert(class_name.into(), Arc::new(constructor));
        self
    }

    /// Register a `Default`-constructible model
    pub fn register_default<M>(&mut self, class_name: impl Into<String>) -> &mut Self
    where
        M: Model + Default,
    {
        self.register(class_name, || Box::new(M::default()) as Box<dyn Model>)
    }

    pub fn construct(&self, class_name: &str) -> Option<Box<dyn Model>> {
        self.constructors.get(class_name).map(|constructor| constructor())
    }
}

impl fmt::Debug for ModelCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("ModelCatalog").field("models", &names).finish()
    }
}

/// Resolves declared row types to model instances
#[derive(Clone)]
pub struct ModelFactory {
    namespace: String,
    fail_if_missing: bool,
    catalog: Arc<ModelCatalog>,
    hook: Option<ModelHook>,
}

impl ModelFactory {
    pub fn new(namespace: impl Into<String>, fail_if_missing: bool, catalog: Arc<ModelCatalog>) -> Self {
        Self {
            namespace: namespace.into(),
            fail_if_missing,
            catalog,
            hook: None,
        }
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut dyn Model) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn fail_if_missing(&self) -> bool {
        self.fail_if_missing
    }

    /// `<namespace><Capitalized>` for a declared type
    pub fn class_name_for(&self, declared_type: &str) -> String {
        let mut chars = declared_type.chars();
        let capitalized: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        format!("{}{}", self.namespace, capitalized)
    }

    pub fn resolve(&self, declared_type: &str) -> Result<Option<Box<dyn Model>>, ModelError> {
        let class_name = self.class_name_for(declared_type);
        match self.catalog.construct(&class_name) {
            Some(mut model) => {
                if let Some(hook) = &self.hook {
                    hook(model.as_mut());
                }
                Ok(Some(model))
            }
            None if self.fail_if_missing => Err(ModelError::NotFound(declared_type.to_string())),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for ModelFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelFactory")
            .field("namespace", &self.namespace)
            .field("fail_if_missing", &self.fail_if_missing)
            .field("catalog", &self.catalog)
            .field("hook", &self.hook.is_some())
            .finish()
    }
}

/// A row tagged with its declared type and, when one is registered, its model
pub struct Bean {
    type_name: String,
    row: Row,
    model: Option<Box<dyn Model>>,
}

impl Bean {
    pub fn new(type_name: impl Into<String>, row: Row, model: Option<Box<dyn Model>>) -> Self {
        Self {
            type_name: type_name.into(),
            row,
            model,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn row(&self) -> &Row {
        &self.row
    }

    pub fn row_mut(&mut self) -> &mut Row {
        &mut self.row
    }

    /// Positive `id` of a stored record; `None` for a dispensed bean
    pub fn id(&self) -> Option<i64> {
        self.row
            .get("id")
            .and_then(CellValue::as_i64)
            .filter(|id| *id > 0)
    }

    pub fn model(&self) -> Option<&dyn Model> {
        self.model.as_deref()
    }

    /// Downcast the bound model
    pub fn model_as<M: Model>(&self) -> Option<&M> {
        self.model()?.as_any().downcast_ref::<M>()
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("type_name", &self.type_name)
            .field("row", &self.row)
            .field("model", &self.model.as_ref().map(|m| m.model_name().to_string()))
            .finish()
    }
}
