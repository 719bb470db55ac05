// Data Provider
// Builds or accepts a query for one table, runs it with optional pagination and wraps the result

use std::sync::Arc;

use crate::db::facade::Db;
use crate::db::pagination::{PaginationSpec, PaginationSummary, Paginator, PaginatorFactory};
use crate::db::query::QueryBuilder;
use crate::db::traits::{CellValue, DatabaseResult, Row};
use crate::entity::{Entity, EntityHandlers, EntityInfo, EntityOptions, HandlersLoader};

/// One-shot query state for a single table.
///
/// Explicit query, bindings, pagination and builder clauses are consumed by
/// the next [`DataProvider::get_entity`] call, whether it succeeds or not.
pub struct DataProvider {
    handlers: Arc<dyn EntityHandlers>,
    db: Db,
    table: String,
    builder: QueryBuilder,
    query: Option<String>,
    bindings: Vec<CellValue>,
    pagination: Option<PaginationSpec>,
    paginator: PaginatorFactory,
}

impl DataProvider {
    pub fn new(
        handlers: Arc<dyn EntityHandlers>,
        db: Db,
        table: impl Into<String>,
        query: Option<String>,
        bindings: Vec<CellValue>,
    ) -> Self {
        let table = table.into();
        Self {
            handlers,
            db,
            builder: QueryBuilder::for_table(table.clone()),
            table,
            query,
            bindings,
            pagination: None,
            paginator: Paginator::boxed,
        }
    }

    /// Swap the paginator used for counted pages
    pub fn with_paginator(mut self, paginator: PaginatorFactory) -> Self {
        self.paginator = paginator;
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn options(&self) -> &EntityOptions {
        self.handlers.options()
    }

    /// Paginate the next execution, five neighbour pages on each side
    pub fn paginate(&mut self, per_page: u32, page: u32) -> &mut Self {
        self.paginate_with(PaginationSpec {
            page,
            per_page,
            ..PaginationSpec::default()
        })
    }

    pub fn paginate_with(&mut self, spec: PaginationSpec) -> &mut Self {
        self.pagination = Some(spec);
        self
    }

    /// Explicit SQL for the next execution; takes precedence over the builder
    pub fn set_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.query = Some(query.into());
        self
    }

    pub fn set_bindings(&mut self, bindings: Vec<CellValue>) -> &mut Self {
        self.bindings = bindings;
        self
    }

    pub fn builder(&mut self) -> &mut QueryBuilder {
        &mut self.builder
    }

    pub fn select(&mut self, columns: impl Into<String>) -> &mut Self {
        self.builder.select(columns);
        self
    }

    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        self.builder.from(table);
        self
    }

    pub fn join(&mut self, table: impl Into<String>, condition: impl Into<String>) -> &mut Self {
        self.builder.join(table, condition);
        self
    }

    pub fn where_(&mut self, condition: impl Into<String>) -> &mut Self {
        self.builder.where_(condition);
        self
    }

    pub fn order_by(&mut self, columns: impl Into<String>) -> &mut Self {
        self.builder.order_by(columns);
        self
    }

    pub fn group_by(&mut self, columns: impl Into<String>) -> &mut Self {
        self.builder.group_by(columns);
        self
    }

    pub fn having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.builder.having(condition);
        self
    }

    pub fn subquery(&mut self, query: &str, alias: Option<&str>) -> &mut Self {
        self.builder.subquery(query, alias);
        self
    }

    pub fn raw(&mut self, token: impl Into<String>) -> &mut Self {
        self.builder.raw(token);
        self
    }

    pub fn set_glue(&mut self, glue: impl Into<String>) -> &mut Self {
        self.builder.set_glue(glue);
        self
    }

    pub fn reset_query(&mut self) -> &mut Self {
        self.builder.reset_query();
        self
    }

    pub fn build_query(&self) -> String {
        self.builder.build_query()
    }

    /// Run the pending query and wrap the rows.
    ///
    /// Without an explicit query or builder clauses the whole table is selected.
    pub fn get_entity(&mut self) -> DatabaseResult<Entity> {
        let built = self.builder.build_query();
        self.builder.reset_query();
        let query = self.query.take();
        let bindings = std::mem::take(&mut self.bindings);
        let pagination = self.pagination.take();

        let mut sql = query.unwrap_or(built);
        if sql.trim().is_empty() {
            sql = format!("SELECT * FROM {}", self.table);
        }

        let mut info = EntityInfo::default();
        let rows = match pagination {
            Some(spec) => {
                let (rows, summary) = self.fetch_page(&sql, &bindings, spec)?;
                info.pagination = Some(summary);
                rows
            }
            None => {
                tracing::debug!("[DataProvider] {}: {}", self.table, sql);
                self.db.get_all(&sql, &bindings)?
            }
        };

        Ok(Entity::new(Arc::clone(&self.handlers), rows, info))
    }

    fn fetch_page(
        &self,
        sql: &str,
        bindings: &[CellValue],
        spec: PaginationSpec,
    ) -> DatabaseResult<(Vec<Row>, PaginationSummary)> {
        let count_sql = format!("SELECT COUNT(*) FROM ({}) AS count_query", sql);
        let total = self
            .db
            .get_row(&count_sql, bindings)?
            .and_then(|row| row.get("COUNT(*)").and_then(CellValue::as_i64))
            .unwrap_or(0)
            .max(0) as u64;

        let paginator = (self.paginator)(spec.page, spec.per_page, total);
        let page_sql = format!("{} LIMIT {}, {}", sql, paginator.offset(), spec.per_page.max(1));
        tracing::debug!(
            "[DataProvider] {} (page {}, total {}): {}",
            self.table,
            spec.page,
            total,
            page_sql
        );

        let rows = self.db.get_all(&page_sql, bindings)?;
        let summary = paginator.to_summary(rows.len(), spec.prev_count, spec.next_count);
        Ok((rows, summary))
    }
}

impl std::fmt::Debug for DataProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataProvider")
            .field("table", &self.table)
            .field("builder", &self.builder)
            .field("query", &self.query)
            .field("bindings", &self.bindings)
            .field("pagination", &self.pagination)
            .finish_non_exhaustive()
    }
}

/// Creates data providers with the handler set registered for each model
#[derive(Clone)]
pub struct SqlEntification {
    loader: Arc<dyn HandlersLoader>,
    db: Db,
}

impl SqlEntification {
    pub fn new(loader: Arc<dyn HandlersLoader>, db: Db) -> Self {
        Self { loader, db }
    }

    /// Provider over `model_name`'s table
    pub fn data_provider(
        &self,
        model_name: &str,
        bindings: Vec<CellValue>,
        query: Option<String>,
    ) -> DataProvider {
        let handlers = self.loader.handlers_for(model_name);
        DataProvider::new(handlers, self.db.clone(), model_name, query, bindings)
    }
}
