//! Batched statement building.
//!
//! Turns an ordered list of descriptors into one [`SqlBatch`] whose
//! statements appear in descriptor order. Operand values are always bound
//! as parameters; the SQL text only ever contains quoted identifiers,
//! keywords and placeholders.

use ormbatch_proto::{
    ComparisonOp, Field, FilterCondition, FilterGroup, OrderDirection, QueryDescriptor, Value,
};
use tracing::debug;

use super::dialect::{BatchMode, Dialect, HintPlacement, LimitClause};
use crate::error::{Error, Result};

/// One rendered statement and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    /// SQL text with placeholders.
    pub sql: String,
    /// Parameter values in placeholder order.
    pub params: Vec<Value>,
}

/// Statements of one batched call, in descriptor order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlBatch {
    mode: BatchMode,
    separator: &'static str,
    statements: Vec<SqlStatement>,
}

impl SqlBatch {
    /// How the driver must send the statements.
    pub fn mode(&self) -> BatchMode {
        self.mode
    }

    /// Statements in order.
    pub fn statements(&self) -> &[SqlStatement] {
        &self.statements
    }

    /// Number of statements, which is the number of result sets expected.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether the batch has no statements.
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// The whole batch as one command text.
    pub fn text(&self) -> String {
        self.statements
            .iter()
            .map(|s| s.sql.as_str())
            .collect::<Vec<_>>()
            .join(self.separator)
    }

    /// All parameter values across the batch, in order.
    ///
    /// For [`BatchMode::MultiStatement`] this is the parameter list that
    /// goes with [`text`](Self::text).
    pub fn parameters(&self) -> Vec<Value> {
        self.statements
            .iter()
            .flat_map(|s| s.params.iter().cloned())
            .collect()
    }
}

/// Input for one statement: a descriptor and its normalized filter.
#[derive(Debug, Clone, Copy)]
pub struct StatementSpec<'a> {
    pub descriptor: &'a QueryDescriptor,
    pub filter: Option<&'a FilterGroup>,
}

impl<'a> StatementSpec<'a> {
    pub fn new(descriptor: &'a QueryDescriptor, filter: Option<&'a FilterGroup>) -> Self {
        Self { descriptor, filter }
    }
}

/// Renders descriptors for one dialect.
pub struct StatementBuilder<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> StatementBuilder<'d> {
    /// Create a builder for a dialect.
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    /// Build a batch from specs, preserving their order.
    pub fn build(&self, specs: &[StatementSpec<'_>]) -> Result<SqlBatch> {
        let mode = self.dialect.batch_mode();
        let mut statements = Vec::with_capacity(specs.len());
        let mut offset = 0;

        for spec in specs {
            let statement = self.build_statement(spec, offset)?;
            if mode == BatchMode::MultiStatement {
                offset += statement.params.len();
            }
            statements.push(statement);
        }

        let batch = SqlBatch {
            mode,
            separator: self.dialect.statement_separator(),
            statements,
        };
        debug!(
            dialect = self.dialect.name(),
            statements = batch.len(),
            parameters = batch.statements.iter().map(|s| s.params.len()).sum::<usize>(),
            "built batch"
        );
        Ok(batch)
    }

    /// Render one statement. Placeholders start after `offset` already
    /// bound parameters.
    pub fn build_statement(&self, spec: &StatementSpec<'_>, offset: usize) -> Result<SqlStatement> {
        let descriptor = spec.descriptor;
        let mut out = Render {
            dialect: self.dialect,
            sql: String::with_capacity(128),
            params: Vec::new(),
            offset,
        };

        let hint = descriptor.hint.as_deref().filter(|h| !h.trim().is_empty());
        if let Some(hint) = hint {
            check_hint(hint)?;
        }
        let hint_placement = self.dialect.hint_placement();
        let limit = (descriptor.limit > 0).then(|| self.dialect.limit(descriptor.limit));

        if let (Some(hint), HintPlacement::LeadingComment) = (hint, hint_placement) {
            out.sql.push_str("/*+ ");
            out.sql.push_str(hint);
            out.sql.push_str(" */ ");
        }

        out.sql.push_str("SELECT ");
        if let Some(LimitClause::Prefix(clause)) = &limit {
            out.sql.push_str(clause);
            out.sql.push(' ');
        }
        out.projection(&descriptor.fields);

        out.sql.push_str(" FROM ");
        out.sql.push_str(&self.dialect.quote_identifier(&descriptor.table));
        if let (Some(hint), HintPlacement::AfterTable) = (hint, hint_placement) {
            out.sql.push(' ');
            out.sql.push_str(hint);
        }

        if let Some(filter) = spec.filter {
            out.sql.push_str(" WHERE ");
            out.group(filter)?;
        }

        if !descriptor.order_by.is_empty() {
            out.sql.push_str(" ORDER BY ");
            let order = descriptor
                .order_by
                .iter()
                .map(|o| {
                    let direction = match o.direction {
                        OrderDirection::Asc => "ASC",
                        OrderDirection::Desc => "DESC",
                    };
                    format!("{} {}", self.dialect.quote_identifier(&o.field), direction)
                })
                .collect::<Vec<_>>()
                .join(", ");
            out.sql.push_str(&order);
        }

        if let Some(LimitClause::Suffix(clause)) = &limit {
            out.sql.push(' ');
            out.sql.push_str(clause);
        }

        Ok(SqlStatement {
            sql: out.sql,
            params: out.params,
        })
    }
}

/// Hints are spliced into the statement text, so they may not end the
/// hint comment, open a new comment or start another statement.
fn check_hint(hint: &str) -> Result<()> {
    match ["*/", "/*", "--", ";"].into_iter().find(|t| hint.contains(*t)) {
        Some(token) => Err(Error::InvalidHint(format!(
            "hint '{hint}' contains '{token}'"
        ))),
        None => Ok(()),
    }
}

struct Render<'d> {
    dialect: &'d dyn Dialect,
    sql: String,
    params: Vec<Value>,
    offset: usize,
}

impl Render<'_> {
    fn bind(&mut self, value: &Value) -> String {
        self.params.push(value.clone());
        self.dialect.placeholder(self.offset + self.params.len())
    }

    fn projection(&mut self, fields: &[Field]) {
        if fields.is_empty() {
            self.sql.push('*');
            return;
        }

        let rendered = fields
            .iter()
            .map(|field| {
                let column = self.dialect.quote_identifier(&field.name);
                match &field.sql_type {
                    Some(sql_type) => format!(
                        "{} AS {}",
                        self.dialect.cast(&column, sql_type, field.size),
                        column
                    ),
                    None => column,
                }
            })
            .collect::<Vec<_>>()
            .join(", ");
        self.sql.push_str(&rendered);
    }

    /// Every combinator node is parenthesized, the root included.
    fn group(&mut self, group: &FilterGroup) -> Result<()> {
        match group {
            FilterGroup::Condition(condition) => self.condition(condition),
            FilterGroup::Combinator(node) => {
                let keyword = node.op().keyword();
                self.sql.push('(');
                for (i, child) in node.children().iter().enumerate() {
                    if i > 0 {
                        self.sql.push(' ');
                        self.sql.push_str(keyword);
                        self.sql.push(' ');
                    }
                    self.group(child)?;
                }
                self.sql.push(')');
                Ok(())
            }
        }
    }

    fn condition(&mut self, condition: &FilterCondition) -> Result<()> {
        // `= NULL` is never true; equality against null is a null test.
        let op = match (condition.op(), condition.values()) {
            (ComparisonOp::Eq, [Value::Null]) => ComparisonOp::IsNull,
            (ComparisonOp::Ne, [Value::Null]) => ComparisonOp::IsNotNull,
            (op, _) => op,
        };
        let keyword = self
            .dialect
            .operator(op)
            .ok_or(Error::UnsupportedOperator {
                op,
                dialect: self.dialect.name(),
            })?;
        let column = self.dialect.quote_identifier(condition.field());
        let values = condition.values();

        let rendered = match op {
            ComparisonOp::IsNull | ComparisonOp::IsNotNull => format!("{column} {keyword}"),
            ComparisonOp::Between | ComparisonOp::NotBetween => {
                let low = self.bind(&values[0]);
                let high = self.bind(&values[1]);
                format!("{column} {keyword} {low} AND {high}")
            }
            ComparisonOp::In | ComparisonOp::NotIn => {
                let list = values
                    .iter()
                    .map(|v| self.bind(v))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{column} {keyword} ({list})")
            }
            ComparisonOp::Like
            | ComparisonOp::NotLike
            | ComparisonOp::ILike
            | ComparisonOp::NotILike => {
                let pattern = self.bind(&values[0]);
                match self.dialect.like_escape() {
                    Some(escape) => format!("{column} {keyword} {pattern} {escape}"),
                    None => format!("{column} {keyword} {pattern}"),
                }
            }
            _ => {
                let value = self.bind(&values[0]);
                format!("{column} {keyword} {value}")
            }
        };

        self.sql.push_str(&rendered);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::dialect::{MySqlDialect, PostgresDialect, SqlServerDialect, SqliteDialect};
    use ormbatch_proto::{FilterCondition, OrderField};
    use pretty_assertions::assert_eq;

    fn range_filter() -> FilterGroup {
        FilterGroup::all_of(vec![FilterCondition::gt("age", 30), FilterCondition::lt("age", 50)])
            .unwrap()
    }

    #[test]
    fn test_single_statement_postgres() {
        let descriptor = QueryDescriptor::new("users")
            .with_order(OrderField::asc("name"))
            .with_limit(10);
        let filter = range_filter();
        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();

        assert_eq!(batch.len(), 1);
        assert_eq!(
            batch.statements()[0].sql,
            r#"SELECT * FROM "users" WHERE ("age" > $1 AND "age" < $2) ORDER BY "name" ASC LIMIT 10"#
        );
        assert_eq!(batch.parameters(), vec![Value::Int32(30), Value::Int32(50)]);
    }

    #[test]
    fn test_mixed_nesting_is_parenthesized() {
        let filter = FilterGroup::or(vec![
            FilterCondition::eq("status", "active").into(),
            FilterGroup::and(vec![
                FilterCondition::ge("age", 18).into(),
                FilterGroup::any_of(vec![
                    FilterCondition::is_null("email"),
                    FilterCondition::like("email", "%@corp.com"),
                ])
                .unwrap(),
            ])
            .unwrap(),
        ])
        .unwrap();
        let descriptor = QueryDescriptor::new("users");
        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();

        assert_eq!(
            batch.statements()[0].sql,
            r#"SELECT * FROM "users" WHERE ("status" = $1 OR ("age" >= $2 AND ("email" IS NULL OR "email" LIKE $3)))"#
        );
    }

    #[test]
    fn test_multi_statement_numbering_is_global() {
        let users = QueryDescriptor::new("users");
        let orders = QueryDescriptor::new("orders").with_limit(5);
        let user_filter = FilterGroup::Condition(FilterCondition::eq("status", "active"));
        let order_filter = FilterGroup::Condition(FilterCondition::between("total", 10, 20));

        let batch = StatementBuilder::new(&SqlServerDialect)
            .build(&[
                StatementSpec::new(&users, Some(&user_filter)),
                StatementSpec::new(&orders, Some(&order_filter)),
            ])
            .unwrap();

        assert_eq!(batch.mode(), BatchMode::MultiStatement);
        assert_eq!(
            batch.text(),
            "SELECT * FROM [users] WHERE [status] = @p1;\n\
             SELECT TOP (5) * FROM [orders] WHERE [total] BETWEEN @p2 AND @p3"
        );
        assert_eq!(batch.parameters().len(), 3);
    }

    #[test]
    fn test_sequential_numbering_restarts() {
        let a = QueryDescriptor::new("a");
        let b = QueryDescriptor::new("b");
        let fa = FilterGroup::Condition(FilterCondition::eq("x", 1));
        let fb = FilterGroup::Condition(FilterCondition::eq("y", 2));

        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&a, Some(&fa)), StatementSpec::new(&b, Some(&fb))])
            .unwrap();

        assert_eq!(batch.mode(), BatchMode::Sequential);
        assert_eq!(batch.statements()[0].sql, r#"SELECT * FROM "a" WHERE "x" = $1"#);
        assert_eq!(batch.statements()[1].sql, r#"SELECT * FROM "b" WHERE "y" = $1"#);
    }

    #[test]
    fn test_statements_follow_input_order() {
        let tables = ["c", "a", "b", "g", "e", "f", "d"];
        let descriptors: Vec<QueryDescriptor> =
            tables.iter().map(|t| QueryDescriptor::new(*t)).collect();
        let specs: Vec<StatementSpec<'_>> =
            descriptors.iter().map(|d| StatementSpec::new(d, None)).collect();

        let batch = StatementBuilder::new(&MySqlDialect).build(&specs).unwrap();
        assert_eq!(batch.len(), 7);
        for (statement, table) in batch.statements().iter().zip(tables) {
            assert_eq!(statement.sql, format!("SELECT * FROM `{table}`"));
        }
    }

    #[test]
    fn test_projection_and_hints() {
        let descriptor = QueryDescriptor::new("users")
            .select("id")
            .select(Field::typed("name", "NVARCHAR").with_size(50))
            .with_hint("WITH (NOLOCK)");
        let batch = StatementBuilder::new(&SqlServerDialect)
            .build(&[StatementSpec::new(&descriptor, None)])
            .unwrap();
        assert_eq!(
            batch.statements()[0].sql,
            "SELECT [id], CAST([name] AS NVARCHAR(50)) AS [name] FROM [users] WITH (NOLOCK)"
        );

        let descriptor = QueryDescriptor::new("users").with_hint("IndexScan(users)");
        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, None)])
            .unwrap();
        assert_eq!(
            batch.statements()[0].sql,
            r#"/*+ IndexScan(users) */ SELECT * FROM "users""#
        );
    }

    #[test]
    fn test_hint_cannot_escape_its_comment() {
        let descriptor = QueryDescriptor::new("users").with_hint("x */ DELETE FROM users; /*");
        let err = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, None)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHint(_)));

        let descriptor = QueryDescriptor::new("users").with_hint("WITH (NOLOCK); DROP TABLE users");
        let err = StatementBuilder::new(&SqlServerDialect)
            .build(&[StatementSpec::new(&descriptor, None)])
            .unwrap_err();
        assert!(matches!(err, Error::InvalidHint(_)));

        let descriptor = QueryDescriptor::new("users").with_hint("INDEXED BY idx -- x");
        assert!(StatementBuilder::new(&SqliteDialect)
            .build(&[StatementSpec::new(&descriptor, None)])
            .is_err());
    }

    #[test]
    fn test_null_equality_renders_null_test() {
        let filter = FilterGroup::all_of(vec![
            FilterCondition::eq("email", Value::Null),
            FilterCondition::ne("deleted_at", Value::Null),
            FilterCondition::eq("status", "active"),
        ])
        .unwrap();
        let descriptor = QueryDescriptor::new("users");
        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();

        assert_eq!(
            batch.text(),
            r#"SELECT * FROM "users" WHERE ("email" IS NULL AND "deleted_at" IS NOT NULL AND "status" = $1)"#
        );
        assert_eq!(batch.parameters(), vec![Value::String("active".into())]);
    }

    #[test]
    fn test_in_list_and_like_escape() {
        let filter = FilterGroup::all_of(vec![
            FilterCondition::in_values("id", vec![Value::Int32(1), Value::Int32(2), Value::Int32(3)])
                .unwrap(),
            FilterCondition::like("name", "%\\_x%"),
        ])
        .unwrap();
        let descriptor = QueryDescriptor::new("users");
        let batch = StatementBuilder::new(&SqliteDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();
        assert_eq!(
            batch.statements()[0].sql,
            r#"SELECT * FROM "users" WHERE ("id" IN (?1, ?2, ?3) AND "name" LIKE ?4 ESCAPE '\')"#
        );
    }

    #[test]
    fn test_unsupported_operator() {
        let filter = FilterGroup::Condition(FilterCondition::ilike("name", "a%"));
        let descriptor = QueryDescriptor::new("users");
        let err = StatementBuilder::new(&MySqlDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedOperator {
                op: ComparisonOp::ILike,
                dialect: "mysql"
            }
        ));

        let ok = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();
        assert_eq!(ok.statements()[0].sql, r#"SELECT * FROM "users" WHERE "name" ILIKE $1"#);
    }

    #[test]
    fn test_values_never_appear_in_text() {
        let filter = FilterGroup::Condition(FilterCondition::eq("name", "Robert'); DROP TABLE users;--"));
        let descriptor = QueryDescriptor::new("users");
        let batch = StatementBuilder::new(&PostgresDialect)
            .build(&[StatementSpec::new(&descriptor, Some(&filter))])
            .unwrap();
        assert!(!batch.text().contains("DROP"));
        assert_eq!(
            batch.parameters(),
            vec![Value::String("Robert'); DROP TABLE users;--".into())]
        );
    }
}
