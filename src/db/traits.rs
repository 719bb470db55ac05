// Persistence Engine Traits
// Shared value types and the narrow engine facade the registry and providers talk to

use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::db::drivers::ConfigError;
use crate::db::models::{Model, ModelError, ModelFactory};

/// Errors raised by a persistence engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Unsupported driver for this engine: {0}")]
    UnsupportedDriver(String),

    #[error("Invalid connection string: {0}")]
    InvalidDsn(String),

    #[error("A database has already been specified for this key: {0}")]
    DuplicateKey(String),

    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    #[error("No active database session")]
    NoActiveSession,

    #[error("Engine lock poisoned")]
    LockPoisoned,
}

/// Crate-wide error type
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Cell value in a result set, also used for positional bindings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Binary(Vec<u8>),
}

impl CellValue {
    /// Integer view of the cell. Numeric text is parsed, reals are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int(v) => Some(*v),
            CellValue::Bool(v) => Some(i64::from(*v)),
            CellValue::Float(v) => Some(*v as i64),
            CellValue::String(s) => s.trim().parse().ok(),
            CellValue::Null | CellValue::Binary(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Int(value)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Int(i64::from(value))
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Float(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl<T: Into<CellValue>> From<Option<T>> for CellValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(CellValue::Null, Into::into)
    }
}

impl From<ValueRef<'_>> for CellValue {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => CellValue::Null,
            ValueRef::Integer(v) => CellValue::Int(v),
            ValueRef::Real(v) => CellValue::Float(v),
            ValueRef::Text(t) => CellValue::String(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => CellValue::Binary(b.to_vec()),
        }
    }
}

impl ToSql for CellValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            CellValue::Null => ToSqlOutput::Owned(Value::Null),
            CellValue::Bool(v) => ToSqlOutput::Owned(Value::Integer(i64::from(*v))),
            CellValue::Int(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            CellValue::Float(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            CellValue::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            CellValue::Binary(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

/// One result row: column names paired with values, in select order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    cells: Vec<(String, CellValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            cells: Vec::with_capacity(capacity),
        }
    }

    /// Append a cell. A repeated column name shadows the earlier one on lookup.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.push((column.into(), value.into()));
    }

    /// Replace the value of `column`, or append it when absent
    pub fn set(&mut self, column: &str, value: impl Into<CellValue>) {
        let value = value.into();
        match self.cells.iter_mut().rev().find(|(name, _)| name == column) {
            Some((_, cell)) => *cell = value,
            None => self.cells.push((column.to_string(), value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .rev()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        let idx = self.cells.iter().position(|(name, _)| name == column)?;
        Some(self.cells.remove(idx).1)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.cells.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.push(column, value);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, value) in &self.cells {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Everything an engine needs to open a keyed session
pub struct NewConnection {
    pub key: String,
    pub dsn: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub frozen: bool,
    /// Only bound for the default key
    pub model_factory: Option<ModelFactory>,
}

impl std::fmt::Debug for NewConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewConnection")
            .field("key", &self.key)
            .field("dsn", &self.dsn)
            .field("user", &self.user)
            .field("frozen", &self.frozen)
            .field("model_factory", &self.model_factory.is_some())
            .finish_non_exhaustive()
    }
}

/// Persistence engine facade - keyed sessions plus raw SQL primitives.
///
/// The registry never touches a transport directly; everything goes through here.
pub trait PersistenceEngine: Send {
    /// Open and register a session under `request.key`. Does not select it.
    fn add_connection(&mut self, request: NewConnection) -> Result<(), EngineError>;

    /// Make a registered session the active one
    fn select_connection(&mut self, key: &str) -> Result<(), EngineError>;

    fn has_connection(&self, key: &str) -> bool;

    fn active_key(&self) -> Option<&str>;

    /// Close the active session's transport
    fn close_connection(&mut self);

    /// Liveness of the active session
    fn is_session_connected(&self) -> bool;

    fn run_query_all(&mut self, sql: &str, bindings: &[CellValue]) -> Result<Vec<Row>, EngineError>;

    /// First column of the first row, `None` when the query yields nothing
    fn run_query_cell(
        &mut self,
        sql: &str,
        bindings: &[CellValue],
    ) -> Result<Option<CellValue>, EngineError> {
        let rows = self.run_query_all(sql, bindings)?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.cells.into_iter().next())
            .map(|(_, value)| value))
    }

    /// Run a statement that returns no rows; yields the affected row count
    fn exec(&mut self, sql: &str, bindings: &[CellValue]) -> Result<usize, EngineError>;

    /// Resolve a declared row type through the active session's model factory
    fn resolve_model(&self, declared_type: &str) -> Result<Option<Box<dyn Model>>, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_and_order() {
        let row: Row = vec![("id", CellValue::Int(1)), ("name", CellValue::from("John"))]
            .into_iter()
            .collect();

        assert_eq!(row.get("name"), Some(&CellValue::String("John".to_string())));
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name"]);
        assert!(row.get("missing").is_none());
    }

    #[test]
    fn test_row_serializes_in_column_order() {
        let mut row = Row::new();
        row.push("zeta", 1);
        row.push("alpha", "a");
        row.push("empty", CellValue::Null);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":"a","empty":null}"#);
    }

    #[test]
    fn test_cell_as_i64() {
        assert_eq!(CellValue::Int(10).as_i64(), Some(10));
        assert_eq!(CellValue::from(" 42 ").as_i64(), Some(42));
        assert_eq!(CellValue::from("ten").as_i64(), None);
        assert_eq!(CellValue::Null.as_i64(), None);
    }

    #[test]
    fn test_row_set_replaces_in_place() {
        let mut row: Row = vec![("id", 0), ("name", 1)].into_iter().collect();
        row.set("id", 7);
        row.set("extra", "x");
        assert_eq!(row.columns().collect::<Vec<_>>(), vec!["id", "name", "extra"]);
        assert_eq!(row.get("id"), Some(&CellValue::Int(7)));
    }

    #[test]
    fn test_row_remove() {
        let mut row: Row = vec![("a", 1), ("b", 2)].into_iter().collect();
        assert_eq!(row.remove("a"), Some(CellValue::Int(1)));
        assert_eq!(row.len(), 1);
        assert_eq!(row.remove("a"), None);
    }
}
