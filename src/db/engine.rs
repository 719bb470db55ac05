// SQLite Persistence Engine
// Keyed rusqlite sessions behind the PersistenceEngine facade

use rusqlite::{params_from_iter, Connection, OpenFlags};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::db::drivers::sqlite::SQLITE_DRIVER;
use crate::db::models::{Model, ModelError, ModelFactory};
use crate::db::traits::{CellValue, EngineError, NewConnection, PersistenceEngine, Row};

/// One registered SQLite database
struct SqliteSession {
    id: String,
    path: PathBuf,
    conn: Option<Connection>,
    frozen: bool,
    model_factory: Option<ModelFactory>,
}

impl SqliteSession {
    /// Transport for this session, reopened if it was closed
    fn connection(&mut self) -> Result<&Connection, EngineError> {
        if self.conn.is_none() {
            tracing::debug!("[SqliteEngine] Reopening session {} at {:?}", self.id, self.path);
            self.conn = Some(open_connection(&self.path)?);
        }
        self.conn.as_ref().ok_or(EngineError::NoActiveSession)
    }

    fn is_alive(&self) -> bool {
        match &self.conn {
            Some(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            None => false,
        }
    }
}

/// SQLite engine holding any number of keyed sessions, one of them active
#[derive(Default)]
pub struct SqliteEngine {
    sessions: HashMap<String, SqliteSession>,
    active: Option<String>,
}

impl SqliteEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frozen flag the active session was registered with
    pub fn is_frozen(&self) -> Option<bool> {
        self.active_session().map(|session| session.frozen)
    }

    /// Unique id of the active session
    pub fn session_id(&self) -> Option<&str> {
        self.active_session().map(|session| session.id.as_str())
    }

    fn active_session(&self) -> Option<&SqliteSession> {
        self.active.as_ref().and_then(|key| self.sessions.get(key))
    }

    fn active_connection(&mut self) -> Result<&Connection, EngineError> {
        let key = self.active.as_ref().ok_or(EngineError::NoActiveSession)?;
        let session = self
            .sessions
            .get_mut(key)
            .ok_or_else(|| EngineError::ConnectionNotFound(key.clone()))?;
        session.connection()
    }
}

/// Extract the database path from a `sqlite:<path>` DSN
fn database_path(dsn: &str) -> Result<PathBuf, EngineError> {
    let (driver, path) = dsn
        .split_once(':')
        .ok_or_else(|| EngineError::InvalidDsn(dsn.to_string()))?;

    if driver != SQLITE_DRIVER {
        return Err(EngineError::UnsupportedDriver(driver.to_string()));
    }
    if path.is_empty() {
        return Err(EngineError::InvalidDsn(dsn.to_string()));
    }

    // Expand ~ to home directory if present
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return Ok(dirs.home_dir().join(rest));
        }
    }

    Ok(PathBuf::from(path))
}

fn open_connection(path: &Path) -> Result<Connection, EngineError> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
    )?;
    Ok(conn)
}

impl PersistenceEngine for SqliteEngine {
    fn add_connection(&mut self, request: NewConnection) -> Result<(), EngineError> {
        if self.sessions.contains_key(&request.key) {
            return Err(EngineError::DuplicateKey(request.key));
        }

        let path = database_path(&request.dsn)?;
        let conn = open_connection(&path)?;
        let session = SqliteSession {
            id: uuid::Uuid::new_v4().to_string(),
            path,
            conn: Some(conn),
            frozen: request.frozen,
            model_factory: request.model_factory,
        };

        tracing::debug!(
            "[SqliteEngine] Opened session {} for key '{}' (frozen: {})",
            session.id,
            request.key,
            session.frozen
        );
        self.sessions.insert(request.key, session);
        Ok(())
    }

    fn select_connection(&mut self, key: &str) -> Result<(), EngineError> {
        if !self.sessions.contains_key(key) {
            return Err(EngineError::ConnectionNotFound(key.to_string()));
        }
        self.active = Some(key.to_string());
        Ok(())
    }

    fn has_connection(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    fn active_key(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn close_connection(&mut self) {
        let Some(key) = self.active.as_ref() else {
            return;
        };
        if let Some(session) = self.sessions.get_mut(key) {
            if session.conn.take().is_some() {
                tracing::debug!("[SqliteEngine] Closed session {} for key '{}'", session.id, key);
            }
        }
    }

    fn is_session_connected(&self) -> bool {
        self.active_session().map(SqliteSession::is_alive).unwrap_or(false)
    }

    fn run_query_all(&mut self, sql: &str, bindings: &[CellValue]) -> Result<Vec<Row>, EngineError> {
        let conn = self.active_connection()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut result = Vec::new();
        let mut rows = stmt.query(params_from_iter(bindings.iter()))?;
        while let Some(row) = rows.next()? {
            let mut out = Row::with_capacity(columns.len());
            for (idx, name) in columns.iter().enumerate() {
                out.push(name.clone(), CellValue::from(row.get_ref(idx)?));
            }
            result.push(out);
        }
        Ok(result)
    }

    fn run_query_cell(
        &mut self,
        sql: &str,
        bindings: &[CellValue],
    ) -> Result<Option<CellValue>, EngineError> {
        let conn = self.active_connection()?;
        let mut stmt = conn.prepare(sql)?;
        if stmt.column_count() == 0 {
            return Ok(None);
        }
        let mut rows = stmt.query(params_from_iter(bindings.iter()))?;
        let value = match rows.next()? {
            Some(row) => Some(CellValue::from(row.get_ref(0)?)),
            None => None,
        };
        Ok(value)
    }

    fn exec(&mut self, sql: &str, bindings: &[CellValue]) -> Result<usize, EngineError> {
        let conn = self.active_connection()?;
        let affected = conn.execute(sql, params_from_iter(bindings.iter()))?;
        Ok(affected)
    }

    fn resolve_model(&self, declared_type: &str) -> Result<Option<Box<dyn Model>>, ModelError> {
        match self.active_session().and_then(|s| s.model_factory.as_ref()) {
            Some(factory) => factory.resolve(declared_type),
            None => Ok(None),
        }
    }
}
