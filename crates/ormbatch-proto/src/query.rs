//! Filter model and per-target query descriptors.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::predicate::Predicate;
use crate::value::Value;

/// A projected column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Optional SQL type the column is cast to (e.g. `VARCHAR`).
    pub sql_type: Option<String>,
    /// Optional size for the cast type (e.g. `50` in `VARCHAR(50)`).
    pub size: Option<u32>,
}

impl Field {
    /// Create a field projecting a column as-is.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: None,
            size: None,
        }
    }

    /// Create a field cast to an explicit SQL type.
    pub fn typed(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: Some(sql_type.into()),
            size: None,
        }
    }

    /// Set the size of the cast type.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Field::new(name)
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Field::new(name)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

/// Ordering on one column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderField {
    /// Column to order by.
    pub field: String,
    /// Sort direction.
    pub direction: OrderDirection,
}

impl OrderField {
    /// Create an ascending order field.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Asc,
        }
    }

    /// Create a descending order field.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: OrderDirection::Desc,
        }
    }
}

/// Comparison operator of a leaf condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    /// Case-insensitive LIKE. Not every dialect renders it.
    ILike,
    NotILike,
    In,
    NotIn,
    Between,
    NotBetween,
    IsNull,
    IsNotNull,
}

/// Number of operands an operator takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeastOne,
}

impl Arity {
    /// Check an operand count against this arity.
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeastOne => count >= 1,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Arity::Exactly(0) => "0",
            Arity::Exactly(1) => "1",
            Arity::Exactly(_) => "2",
            Arity::AtLeastOne => "at least 1",
        }
    }
}

impl ComparisonOp {
    /// Operand arity for this operator.
    pub fn arity(self) -> Arity {
        match self {
            ComparisonOp::IsNull | ComparisonOp::IsNotNull => Arity::Exactly(0),
            ComparisonOp::Between | ComparisonOp::NotBetween => Arity::Exactly(2),
            ComparisonOp::In | ComparisonOp::NotIn => Arity::AtLeastOne,
            _ => Arity::Exactly(1),
        }
    }

    /// The operator selecting exactly the rows this one rejects.
    ///
    /// Null semantics follow SQL: `NOT (a < b)` and `a >= b` agree for
    /// non-null `a`, which is what a pushed-down negation relies on.
    pub fn negate(self) -> ComparisonOp {
        match self {
            ComparisonOp::Eq => ComparisonOp::Ne,
            ComparisonOp::Ne => ComparisonOp::Eq,
            ComparisonOp::Lt => ComparisonOp::Ge,
            ComparisonOp::Ge => ComparisonOp::Lt,
            ComparisonOp::Le => ComparisonOp::Gt,
            ComparisonOp::Gt => ComparisonOp::Le,
            ComparisonOp::Like => ComparisonOp::NotLike,
            ComparisonOp::NotLike => ComparisonOp::Like,
            ComparisonOp::ILike => ComparisonOp::NotILike,
            ComparisonOp::NotILike => ComparisonOp::ILike,
            ComparisonOp::In => ComparisonOp::NotIn,
            ComparisonOp::NotIn => ComparisonOp::In,
            ComparisonOp::Between => ComparisonOp::NotBetween,
            ComparisonOp::NotBetween => ComparisonOp::Between,
            ComparisonOp::IsNull => ComparisonOp::IsNotNull,
            ComparisonOp::IsNotNull => ComparisonOp::IsNull,
        }
    }

    /// The operator to use when the operands of a binary comparison are
    /// swapped (`30 < age` becomes `age > 30`).
    pub fn mirror(self) -> Option<ComparisonOp> {
        match self {
            ComparisonOp::Eq => Some(ComparisonOp::Eq),
            ComparisonOp::Ne => Some(ComparisonOp::Ne),
            ComparisonOp::Lt => Some(ComparisonOp::Gt),
            ComparisonOp::Gt => Some(ComparisonOp::Lt),
            ComparisonOp::Le => Some(ComparisonOp::Ge),
            ComparisonOp::Ge => Some(ComparisonOp::Le),
            _ => None,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ComparisonOp::Eq => "equals",
            ComparisonOp::Ne => "not-equals",
            ComparisonOp::Lt => "less-than",
            ComparisonOp::Le => "less-than-or-equal",
            ComparisonOp::Gt => "greater-than",
            ComparisonOp::Ge => "greater-than-or-equal",
            ComparisonOp::Like => "like",
            ComparisonOp::NotLike => "not-like",
            ComparisonOp::ILike => "ilike",
            ComparisonOp::NotILike => "not-ilike",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "not-in",
            ComparisonOp::Between => "between",
            ComparisonOp::NotBetween => "not-between",
            ComparisonOp::IsNull => "is-null",
            ComparisonOp::IsNotNull => "is-not-null",
        };
        f.write_str(name)
    }
}

/// A single column comparison.
///
/// The operand count always matches the operator's arity; the constructors
/// and deserialization enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCondition", into = "RawCondition")]
pub struct FilterCondition {
    field: String,
    op: ComparisonOp,
    values: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
struct RawCondition {
    field: String,
    op: ComparisonOp,
    #[serde(default)]
    values: Vec<Value>,
}

impl TryFrom<RawCondition> for FilterCondition {
    type Error = Error;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        FilterCondition::new(raw.field, raw.op, raw.values)
    }
}

impl From<FilterCondition> for RawCondition {
    fn from(c: FilterCondition) -> Self {
        RawCondition {
            field: c.field,
            op: c.op,
            values: c.values,
        }
    }
}

impl FilterCondition {
    /// Create a condition, validating operand arity.
    pub fn new(
        field: impl Into<String>,
        op: ComparisonOp,
        values: Vec<Value>,
    ) -> Result<Self, Error> {
        let field = field.into();
        let arity = op.arity();
        if !arity.accepts(values.len()) {
            return Err(Error::InvalidCondition {
                field,
                op,
                expected: arity.describe(),
                actual: values.len(),
            });
        }
        Ok(Self { field, op, values })
    }

    fn unary(field: impl Into<String>, op: ComparisonOp, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            values: vec![value],
        }
    }

    /// Create an equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Eq, value.into())
    }

    /// Create a not-equal condition.
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Ne, value.into())
    }

    /// Create a less-than condition.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Lt, value.into())
    }

    /// Create a less-than-or-equal condition.
    pub fn le(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Le, value.into())
    }

    /// Create a greater-than condition.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Gt, value.into())
    }

    /// Create a greater-than-or-equal condition.
    pub fn ge(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::unary(field, ComparisonOp::Ge, value.into())
    }

    /// Create a LIKE condition.
    pub fn like(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::unary(field, ComparisonOp::Like, Value::String(pattern.into()))
    }

    /// Create a case-insensitive LIKE condition.
    pub fn ilike(field: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::unary(field, ComparisonOp::ILike, Value::String(pattern.into()))
    }

    /// Create a BETWEEN condition (inclusive on both ends).
    pub fn between(
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            op: ComparisonOp::Between,
            values: vec![low.into(), high.into()],
        }
    }

    /// Create an IN condition. Fails on an empty value list.
    pub fn in_values(field: impl Into<String>, values: Vec<Value>) -> Result<Self, Error> {
        Self::new(field, ComparisonOp::In, values)
    }

    /// Create a NOT IN condition. Fails on an empty value list.
    pub fn not_in_values(field: impl Into<String>, values: Vec<Value>) -> Result<Self, Error> {
        Self::new(field, ComparisonOp::NotIn, values)
    }

    /// Create an IS NULL condition.
    pub fn is_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: ComparisonOp::IsNull,
            values: vec![],
        }
    }

    /// Create an IS NOT NULL condition.
    pub fn is_not_null(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: ComparisonOp::IsNotNull,
            values: vec![],
        }
    }

    /// Column name.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Comparison operator.
    pub fn op(&self) -> ComparisonOp {
        self.op
    }

    /// Operand values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The condition selecting the complement of this one.
    pub fn negated(self) -> Self {
        Self {
            field: self.field,
            op: self.op.negate(),
            values: self.values,
        }
    }

    /// Replace the column name, keeping operator and operands.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = field.into();
        self
    }
}

/// Logical combinator of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// The combinator obtained by De Morgan's law.
    pub fn flip(self) -> LogicalOp {
        match self {
            LogicalOp::And => LogicalOp::Or,
            LogicalOp::Or => LogicalOp::And,
        }
    }

    /// SQL keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }
}

/// An AND/OR node over an ordered, non-empty list of children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCombinator", into = "RawCombinator")]
pub struct Combinator {
    op: LogicalOp,
    children: Vec<FilterGroup>,
}

#[derive(Serialize, Deserialize)]
struct RawCombinator {
    op: LogicalOp,
    children: Vec<FilterGroup>,
}

impl TryFrom<RawCombinator> for Combinator {
    type Error = Error;

    fn try_from(raw: RawCombinator) -> Result<Self, Self::Error> {
        Combinator::new(raw.op, raw.children)
    }
}

impl From<Combinator> for RawCombinator {
    fn from(c: Combinator) -> Self {
        RawCombinator {
            op: c.op,
            children: c.children,
        }
    }
}

impl Combinator {
    /// Create a combinator node. Fails when `children` is empty.
    pub fn new(op: LogicalOp, children: Vec<FilterGroup>) -> Result<Self, Error> {
        if children.is_empty() {
            return Err(Error::EmptyGroup(op.keyword()));
        }
        Ok(Self { op, children })
    }

    /// The combinator.
    pub fn op(&self) -> LogicalOp {
        self.op
    }

    /// Child nodes in order.
    pub fn children(&self) -> &[FilterGroup] {
        &self.children
    }

    /// Consume into operator and children.
    pub fn into_parts(self) -> (LogicalOp, Vec<FilterGroup>) {
        (self.op, self.children)
    }
}

/// The filter tree selecting rows for one target.
///
/// A tree of owned nodes: either a leaf condition or a combinator over
/// further groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterGroup {
    /// A single leaf condition.
    Condition(FilterCondition),
    /// An AND/OR node.
    Combinator(Combinator),
}

impl FilterGroup {
    /// AND over `children`. Fails when `children` is empty.
    pub fn and(children: Vec<FilterGroup>) -> Result<Self, Error> {
        Combinator::new(LogicalOp::And, children).map(FilterGroup::Combinator)
    }

    /// OR over `children`. Fails when `children` is empty.
    pub fn or(children: Vec<FilterGroup>) -> Result<Self, Error> {
        Combinator::new(LogicalOp::Or, children).map(FilterGroup::Combinator)
    }

    /// AND over leaf conditions.
    pub fn all_of(conditions: Vec<FilterCondition>) -> Result<Self, Error> {
        Self::and(conditions.into_iter().map(FilterGroup::Condition).collect())
    }

    /// OR over leaf conditions.
    pub fn any_of(conditions: Vec<FilterCondition>) -> Result<Self, Error> {
        Self::or(conditions.into_iter().map(FilterGroup::Condition).collect())
    }

    /// Leaf conditions in depth-first order.
    pub fn conditions(&self) -> Vec<&FilterCondition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a FilterCondition>) {
        match self {
            FilterGroup::Condition(c) => out.push(c),
            FilterGroup::Combinator(node) => {
                for child in node.children() {
                    child.collect_conditions(out);
                }
            }
        }
    }

    /// Nesting depth; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            FilterGroup::Condition(_) => 1,
            FilterGroup::Combinator(node) => {
                1 + node.children().iter().map(FilterGroup::depth).max().unwrap_or(0)
            }
        }
    }
}

impl From<FilterCondition> for FilterGroup {
    fn from(condition: FilterCondition) -> Self {
        FilterGroup::Condition(condition)
    }
}

/// How a result cache key is obtained.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheKey {
    /// A caller-declared key.
    Explicit(String),
    /// A key derived from the normalized query itself.
    Fingerprint,
}

/// Result caching policy of one descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CachePolicy {
    /// Key selection.
    pub key: CacheKey,
    /// Time-to-live; `None` uses the engine's configured default.
    pub expiration: Option<Duration>,
}

impl CachePolicy {
    /// Cache under an explicit key.
    pub fn keyed(key: impl Into<String>, expiration: Duration) -> Self {
        Self {
            key: CacheKey::Explicit(key.into()),
            expiration: Some(expiration),
        }
    }

    /// Cache under a key derived from the query.
    pub fn fingerprint(expiration: Duration) -> Self {
        Self {
            key: CacheKey::Fingerprint,
            expiration: Some(expiration),
        }
    }

    /// Cache under an explicit key with the engine's default expiration.
    pub fn with_default_expiration(key: impl Into<String>) -> Self {
        Self {
            key: CacheKey::Explicit(key.into()),
            expiration: None,
        }
    }
}

/// Full per-target query specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    /// Table to select from.
    pub table: String,
    /// Row predicate; `None` selects every row.
    pub predicate: Option<Predicate>,
    /// Projected columns; empty means all columns.
    pub fields: Vec<Field>,
    /// Ordering, most significant first.
    pub order_by: Vec<OrderField>,
    /// Maximum number of rows; 0 means unbounded.
    pub limit: u64,
    /// Provider-specific hint text.
    pub hint: Option<String>,
    /// Result caching; `None` disables caching for this target.
    pub cache: Option<CachePolicy>,
}

impl QueryDescriptor {
    /// Create a descriptor selecting all rows and columns of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            predicate: None,
            fields: vec![],
            order_by: vec![],
            limit: 0,
            hint: None,
            cache: None,
        }
    }

    /// Set the predicate.
    pub fn with_predicate(mut self, predicate: impl Into<Predicate>) -> Self {
        self.predicate = Some(predicate.into());
        self
    }

    /// Set the projected fields.
    pub fn with_fields(mut self, fields: Vec<Field>) -> Self {
        self.fields = fields;
        self
    }

    /// Add a projected field.
    pub fn select(mut self, field: impl Into<Field>) -> Self {
        self.fields.push(field.into());
        self
    }

    /// Add ordering.
    pub fn with_order(mut self, order: OrderField) -> Self {
        self.order_by.push(order);
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    /// Set the provider-specific hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Enable result caching.
    pub fn with_cache(mut self, policy: CachePolicy) -> Self {
        self.cache = Some(policy);
        self
    }
}
