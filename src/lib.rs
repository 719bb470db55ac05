// sqlbean
// Keyed SQL connections, a clause query builder and paginated data providers

pub mod db;
pub mod entity;

pub use db::{
    CellValue, ConnectionRegistry, DataProvider, DatabaseError, DatabaseResult, Db, DriverConfig,
    FileDriverConfig, NetworkDriverConfig, QueryBuilder, Row, SqlEntification,
};
pub use entity::{
    BasicHandlers, Entity, EntityHandlers, EntityInfo, EntityOptions, HandlersLoader,
    SharedHandlersLoader,
};
