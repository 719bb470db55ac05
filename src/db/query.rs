// Query Builder
// Accumulates clause pieces in order and renders them to SQL text

/// One accumulated fragment of a builder query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClausePiece {
    /// Raw token, emitted as ` <token> `
    Raw(String),
    /// `<keyword> <content>`; clears any pending glue
    Clause {
        keyword: &'static str,
        content: String,
    },
    /// Glue-chained fragment, `<glue> <content>`.
    /// `default_glue` is used when no glue is pending; `keyword` is not rendered.
    Chained {
        keyword: &'static str,
        default_glue: String,
        content: String,
    },
}

/// Ordered clause list plus pending glue, optionally bound to a table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    table: Option<String>,
    pieces: Vec<ClausePiece>,
    glue: Option<String>,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder whose `from` always targets `table`. An empty name binds nothing.
    pub fn for_table(table: impl Into<String>) -> Self {
        let table = table.into();
        Self {
            table: (!table.is_empty()).then_some(table),
            ..Self::default()
        }
    }

    /// Start with a pending glue value. An empty glue is ignored.
    pub fn with_glue(mut self, glue: impl Into<String>) -> Self {
        let glue = glue.into();
        if !glue.is_empty() {
            self.glue = Some(glue);
        }
        self
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn pieces(&self) -> &[ClausePiece] {
        &self.pieces
    }

    pub fn glue(&self) -> Option<&str> {
        self.glue.as_deref()
    }

    fn clause(&mut self, keyword: &'static str, content: impl Into<String>) -> &mut Self {
        self.pieces.push(ClausePiece::Clause {
            keyword,
            content: content.into(),
        });
        self
    }

    pub fn select(&mut self, columns: impl Into<String>) -> &mut Self {
        self.clause("SELECT", columns)
    }

    /// A bound table takes precedence over `table`
    pub fn from(&mut self, table: impl Into<String>) -> &mut Self {
        let table = match &self.table {
            Some(bound) => bound.clone(),
            None => table.into(),
        };
        self.clause("FROM", table)
    }

    /// Renders as `<table> <condition>`: the table name stands in as glue and no
    /// `JOIN` keyword is emitted.
    pub fn join(&mut self, table: impl Into<String>, condition: impl Into<String>) -> &mut Self {
        self.pieces.push(ClausePiece::Chained {
            keyword: "JOIN",
            default_glue: table.into(),
            content: condition.into(),
        });
        self
    }

    pub fn where_(&mut self, condition: impl Into<String>) -> &mut Self {
        self.clause("WHERE", condition)
    }

    pub fn order_by(&mut self, columns: impl Into<String>) -> &mut Self {
        self.clause("ORDER BY", columns)
    }

    pub fn group_by(&mut self, columns: impl Into<String>) -> &mut Self {
        self.clause("GROUP BY", columns)
    }

    pub fn having(&mut self, condition: impl Into<String>) -> &mut Self {
        self.clause("HAVING", condition)
    }

    /// `(<query>)`, with ` AS <alias>` when an alias is given
    pub fn subquery(&mut self, query: &str, alias: Option<&str>) -> &mut Self {
        let mut subquery = format!("({})", query);
        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            subquery.push_str(" AS ");
            subquery.push_str(alias);
        }
        self.clause("SUBQUERY", subquery)
    }

    pub fn raw(&mut self, token: impl Into<String>) -> &mut Self {
        self.pieces.push(ClausePiece::Raw(token.into()));
        self
    }

    pub fn set_glue(&mut self, glue: impl Into<String>) -> &mut Self {
        self.glue = Some(glue.into());
        self
    }

    pub fn reset_query(&mut self) -> &mut Self {
        self.glue = None;
        self.pieces.clear();
        self
    }

    /// Render all pieces in insertion order. Builder state is left untouched.
    pub fn build_query(&self) -> String {
        let mut sql = String::new();
        let mut glue = self.glue.as_deref();

        for piece in &self.pieces {
            match piece {
                ClausePiece::Raw(token) => {
                    sql.push(' ');
                    sql.push_str(token);
                    sql.push(' ');
                }
                ClausePiece::Clause { keyword, content } => {
                    glue = None;
                    sql.push_str(keyword);
                    sql.push(' ');
                    sql.push_str(content);
                    sql.push(' ');
                }
                ClausePiece::Chained {
                    default_glue,
                    content,
                    ..
                } => {
                    sql.push_str(glue.take().unwrap_or(default_glue.as_str()));
                    sql.push(' ');
                    sql.push_str(content);
                    sql.push(' ');
                }
            }
        }

        sql.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_from_where() {
        let mut builder = QueryBuilder::new();
        builder.select("*").from("users").where_("id = 1");
        assert_eq!(builder.build_query(), "SELECT * FROM users WHERE id = 1");
    }

    #[test]
    fn test_reset_yields_empty_query() {
        let mut builder = QueryBuilder::new();
        builder.select("id").from("users").set_glue("AND");
        builder.reset_query();

        assert_eq!(builder.build_query(), "");
        assert!(builder.glue().is_none());
        assert!(builder.pieces().is_empty());
    }

    #[test]
    fn test_build_does_not_clear_state() {
        let mut builder = QueryBuilder::new();
        builder.select("*").from("users");
        let first = builder.build_query();
        assert_eq!(builder.build_query(), first);
        assert_eq!(builder.pieces().len(), 2);
    }

    #[test]
    fn test_bound_table_overrides_from() {
        let mut builder = QueryBuilder::for_table("contact");
        builder.select("*").from("ignored");
        assert_eq!(builder.build_query(), "SELECT * FROM contact");

        let mut unbound = QueryBuilder::for_table("");
        unbound.select("*").from("orders");
        assert_eq!(unbound.build_query(), "SELECT * FROM orders");
    }

    #[test]
    fn test_full_clause_order() {
        let mut builder = QueryBuilder::new();
        builder
            .select("status, COUNT(*)")
            .from("orders")
            .where_("total > 10")
            .group_by("status")
            .having("COUNT(*) > 1")
            .order_by("status DESC");
        assert_eq!(
            builder.build_query(),
            "SELECT status, COUNT(*) FROM orders WHERE total > 10 GROUP BY status HAVING COUNT(*) > 1 ORDER BY status DESC"
        );
    }

    #[test]
    fn test_join_uses_table_as_glue() {
        let mut builder = QueryBuilder::new();
        builder
            .select("*")
            .from("users")
            .join("orders", "ON orders.user_id = users.id");
        assert_eq!(
            builder.build_query(),
            "SELECT * FROM users orders ON orders.user_id = users.id"
        );
        assert!(matches!(
            &builder.pieces()[2],
            ClausePiece::Chained { keyword: "JOIN", default_glue, .. } if default_glue == "orders"
        ));
    }

    #[test]
    fn test_pending_glue_consumed_by_join() {
        let mut builder = QueryBuilder::new().with_glue("LEFT JOIN orders");
        builder.join("ignored", "ON orders.user_id = users.id");
        builder.join("payments", "ON payments.order_id = orders.id");
        assert_eq!(
            builder.build_query(),
            "LEFT JOIN orders ON orders.user_id = users.id payments ON payments.order_id = orders.id"
        );
    }

    #[test]
    fn test_clause_clears_pending_glue() {
        let mut builder = QueryBuilder::new();
        builder.set_glue("INNER JOIN orders");
        builder.select("*").join("payments", "ON 1 = 1");
        assert_eq!(builder.build_query(), "SELECT * payments ON 1 = 1");
    }

    #[test]
    fn test_subquery_and_raw() {
        let mut builder = QueryBuilder::new();
        builder
            .select("*")
            .raw("FROM")
            .subquery("SELECT id FROM users", Some("u"));
        assert_eq!(
            builder.build_query(),
            "SELECT *  FROM SUBQUERY (SELECT id FROM users) AS u"
        );

        let mut plain = QueryBuilder::new();
        plain.subquery("SELECT 1", None);
        assert_eq!(plain.build_query(), "SUBQUERY (SELECT 1)");
    }
}
