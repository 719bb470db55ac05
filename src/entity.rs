// Entity Handling
// Wraps provider result sets for downstream validation and export

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::sync::Arc;

use crate::db::pagination::PaginationSummary;
use crate::db::traits::Row;

/// Options exposed by a handler set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityOptions {
    /// Drop `hidden_fields` from exported rows
    pub allow_hide_filter: bool,
    pub hidden_fields: Vec<String>,
}

/// Per-row handling applied on export
pub trait EntityHandlers: Send + Sync {
    fn options(&self) -> &EntityOptions;

    /// Normalize one row, or report its field errors
    fn handle(&self, row: Row) -> Result<Row, Vec<String>>;
}

/// Loads the handler set for a model name
pub trait HandlersLoader: Send + Sync {
    fn handlers_for(&self, model_name: &str) -> Arc<dyn EntityHandlers>;
}

/// Handlers that only apply the hide filter
#[derive(Debug, Clone, Default)]
pub struct BasicHandlers {
    options: EntityOptions,
}

impl BasicHandlers {
    pub fn new(options: EntityOptions) -> Self {
        Self { options }
    }
}

impl EntityHandlers for BasicHandlers {
    fn options(&self) -> &EntityOptions {
        &self.options
    }

    fn handle(&self, mut row: Row) -> Result<Row, Vec<String>> {
        if self.options.allow_hide_filter {
            for field in &self.options.hidden_fields {
                row.remove(field);
            }
        }
        Ok(row)
    }
}

/// Loader returning the same handler set for every model
#[derive(Clone)]
pub struct SharedHandlersLoader {
    handlers: Arc<dyn EntityHandlers>,
}

impl SharedHandlersLoader {
    pub fn new(handlers: Arc<dyn EntityHandlers>) -> Self {
        Self { handlers }
    }
}

impl Default for SharedHandlersLoader {
    fn default() -> Self {
        Self::new(Arc::new(BasicHandlers::default()))
    }
}

impl HandlersLoader for SharedHandlersLoader {
    fn handlers_for(&self, _model_name: &str) -> Arc<dyn EntityHandlers> {
        Arc::clone(&self.handlers)
    }
}

/// Metadata attached to a result set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityInfo {
    /// `None` when the query was not paginated; serialized as `{}`
    #[serde(serialize_with = "serialize_pagination")]
    pub pagination: Option<PaginationSummary>,
}

fn serialize_pagination<S: Serializer>(
    pagination: &Option<PaginationSummary>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match pagination {
        Some(summary) => summary.serialize(serializer),
        None => serializer.serialize_map(Some(0))?.end(),
    }
}

/// Result set produced by a data provider
pub struct Entity {
    handlers: Arc<dyn EntityHandlers>,
    rows: Vec<Row>,
    info: EntityInfo,
    errors: Vec<String>,
}

impl Entity {
    pub fn new(handlers: Arc<dyn EntityHandlers>, rows: Vec<Row>, info: EntityInfo) -> Self {
        Self {
            handlers,
            rows,
            info,
            errors: Vec::new(),
        }
    }

    /// Raw rows as returned by the query
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    pub fn pagination(&self) -> Option<&PaginationSummary> {
        self.info.pagination.as_ref()
    }

    pub fn options(&self) -> &EntityOptions {
        self.handlers.options()
    }

    /// Handled rows; rows failing their handlers are skipped and their errors kept
    pub fn export(&mut self) -> Vec<Row> {
        let mut exported = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            match self.handlers.handle(row.clone()) {
                Ok(row) => exported.push(row),
                Err(errors) => self.errors.extend(errors),
            }
        }
        exported
    }

    /// First handled row
    pub fn export_one(&mut self) -> Option<Row> {
        let row = self.rows.first()?.clone();
        match self.handlers.handle(row) {
            Ok(row) => Some(row),
            Err(errors) => {
                self.errors.extend(errors);
                None
            }
        }
    }

    /// Errors collected by previous exports; drained on read
    pub fn errors(&mut self) -> Option<Vec<String>> {
        if self.errors.is_empty() {
            return None;
        }
        Some(std::mem::take(&mut self.errors))
    }

    /// Exported rows plus info as JSON
    pub fn to_json(&mut self, pretty: bool) -> Result<String, serde_json::Error> {
        let rows = self.export();
        let value = serde_json::json!({
            "rows": rows,
            "info": self.info,
        });
        if pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        }
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("rows", &self.rows)
            .field("info", &self.info)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}
