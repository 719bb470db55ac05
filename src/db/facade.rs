// Database Facade
// Raw SQL and bean helpers executed against the registry's active session

use std::sync::Arc;

use crate::db::models::Bean;
use crate::db::registry::ConnectionRegistry;
use crate::db::traits::{CellValue, DatabaseError, DatabaseResult, Row};

/// Execution facade over a shared connection registry
#[derive(Debug, Clone)]
pub struct Db {
    registry: Arc<ConnectionRegistry>,
}

impl Db {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn connection(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// All rows of a query
    pub fn get_all(&self, sql: &str, bindings: &[CellValue]) -> DatabaseResult<Vec<Row>> {
        self.registry
            .with_engine(|engine| Ok(engine.run_query_all(sql, bindings)?))
    }

    /// First column of the first row
    pub fn get_cell(&self, sql: &str, bindings: &[CellValue]) -> DatabaseResult<Option<CellValue>> {
        self.registry
            .with_engine(|engine| Ok(engine.run_query_cell(sql, bindings)?))
    }

    /// First row, if any
    pub fn get_row(&self, sql: &str, bindings: &[CellValue]) -> DatabaseResult<Option<Row>> {
        Ok(self.get_all(sql, bindings)?.into_iter().next())
    }

    /// Run a statement and return the number of affected rows
    pub fn exec(&self, sql: &str, bindings: &[CellValue]) -> DatabaseResult<usize> {
        self.registry
            .with_engine(|engine| Ok(engine.exec(sql, bindings)?))
    }

    /// Number of `type_name` records, optionally narrowed by `add_sql`
    pub fn count(&self, type_name: &str, add_sql: &str, bindings: &[CellValue]) -> DatabaseResult<i64> {
        let sql = format!("SELECT COUNT(*) FROM {} {}", type_name, where_snippet(add_sql));
        let cell = self.get_cell(sql.trim_end(), bindings)?;
        Ok(cell.as_ref().and_then(CellValue::as_i64).unwrap_or(0))
    }

    /// Records of `type_name` as beans, each with its resolved model
    pub fn find_all(
        &self,
        type_name: &str,
        sql: Option<&str>,
        bindings: &[CellValue],
    ) -> DatabaseResult<Vec<Bean>> {
        let query = format!(
            "SELECT * FROM {} {}",
            type_name,
            sql.map(where_snippet).unwrap_or_default()
        );
        let query = query.trim_end();

        self.registry.with_engine(|engine| {
            let rows = engine.run_query_all(query, bindings)?;
            rows.into_iter()
                .map(|row| {
                    let model = engine.resolve_model(type_name)?;
                    Ok::<_, DatabaseError>(Bean::new(type_name, row, model))
                })
                .collect()
        })
    }

    /// First matching record of `type_name`
    pub fn find_one(
        &self,
        type_name: &str,
        sql: Option<&str>,
        bindings: &[CellValue],
    ) -> DatabaseResult<Option<Bean>> {
        let condition = sql.map(where_snippet).unwrap_or_default();
        let limited = format!("{} LIMIT 1", condition);
        Ok(self
            .find_all(type_name, Some(limited.trim()), bindings)?
            .into_iter()
            .next())
    }

    /// Record of `type_name` with the given id
    pub fn load(&self, type_name: &str, id: i64) -> DatabaseResult<Option<Bean>> {
        self.find_one(type_name, Some("id = ?1"), &[id.into()])
    }

    /// Empty bean of `type_name` with its model resolved
    pub fn dispense(&self, type_name: &str) -> DatabaseResult<Bean> {
        let model = self
            .registry
            .with_engine(|engine| Ok::<_, DatabaseError>(engine.resolve_model(type_name)?))?;
        Ok(Bean::new(type_name, Row::new(), model))
    }

    /// Insert a dispensed bean or update a stored one by `id`.
    ///
    /// The id is written back into the bean and returned. The table must exist.
    pub fn store(&self, bean: &mut Bean) -> DatabaseResult<i64> {
        let table = bean.type_name().to_string();
        let (columns, mut bindings): (Vec<String>, Vec<CellValue>) = bean
            .row()
            .iter()
            .filter(|(column, _)| *column != "id")
            .map(|(column, value)| (column.to_string(), value.clone()))
            .unzip();

        let id = match bean.id() {
            Some(id) => {
                if !columns.is_empty() {
                    let assignments: Vec<String> = columns
                        .iter()
                        .enumerate()
                        .map(|(idx, column)| format!("{} = ?{}", column, idx + 1))
                        .collect();
                    bindings.push(id.into());
                    let sql = format!(
                        "UPDATE {} SET {} WHERE id = ?{}",
                        table,
                        assignments.join(", "),
                        bindings.len()
                    );
                    self.exec(&sql, &bindings)?;
                }
                id
            }
            None => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES RETURNING id", table)
                } else {
                    let placeholders: Vec<String> =
                        (1..=columns.len()).map(|idx| format!("?{}", idx)).collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({}) RETURNING id",
                        table,
                        columns.join(", "),
                        placeholders.join(", ")
                    )
                };
                self.get_cell(&sql, &bindings)?
                    .as_ref()
                    .and_then(CellValue::as_i64)
                    .unwrap_or(0)
            }
        };

        bean.row_mut().set("id", id);
        tracing::debug!("[Db] Stored {} #{}", table, id);
        Ok(id)
    }

    /// Delete the bean's record; a bean without id deletes nothing
    pub fn trash(&self, bean: &Bean) -> DatabaseResult<usize> {
        let Some(id) = bean.id() else {
            return Ok(0);
        };
        let sql = format!("DELETE FROM {} WHERE id = ?1", bean.type_name());
        let deleted = self.exec(&sql, &[id.into()])?;
        tracing::debug!("[Db] Trashed {} #{}", bean.type_name(), id);
        Ok(deleted)
    }
}

/// Leading words that let a snippet follow the table name as-is
const SNIPPET_KEYWORDS: [&str; 12] = [
    "INNER", "LEFT", "RIGHT", "JOIN", "AND", "OR", "WHERE", "ORDER", "GROUP", "HAVING", "LIMIT",
    "OFFSET",
];

/// Prefix a bare condition with `WHERE`. A leading `AND` becomes `WHERE`.
fn where_snippet(sql: &str) -> String {
    let snippet = sql.trim();
    if snippet.is_empty() {
        return String::new();
    }

    let first = snippet.split_whitespace().next().unwrap_or_default();
    let rest = snippet[first.len()..].trim_start();
    let keyword = SNIPPET_KEYWORDS
        .iter()
        .find(|keyword| keyword.eq_ignore_ascii_case(first));

    match keyword {
        Some(&"AND") if !rest.is_empty() => format!("WHERE {}", rest),
        Some(_) if !rest.is_empty() => snippet.to_string(),
        _ => format!("WHERE {}", snippet),
    }
}
