// Database Module
// Driver configs, keyed connection registry, query builder and data providers

pub mod drivers;
pub mod engine;
pub mod facade;
pub mod models;
pub mod pagination;
pub mod provider;
pub mod query;
pub mod registry;
pub mod traits;

pub use drivers::{
    ConfigError, ConnectionParams, DriverConfig, DriverSettings, FileDriverConfig,
    NetworkDriverConfig, ALLOWED_DRIVERS, DEFAULT_MODEL_NAMESPACE,
};
pub use engine::SqliteEngine;
pub use facade::Db;
pub use models::{
    Bean, Model, ModelCatalog, ModelError, ModelFactory, ModelHook, ValidationContext,
};
pub use pagination::{Paginate, PaginationSpec, PaginationSummary, Paginator, PaginatorFactory};
pub use provider::{DataProvider, SqlEntification};
pub use query::{ClausePiece, QueryBuilder};
pub use registry::{ConnectionRegistry, DEFAULT_KEY};
pub use traits::{
    CellValue, DatabaseError, DatabaseResult, EngineError, NewConnection, PersistenceEngine, Row,
};
