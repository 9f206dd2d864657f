//! Predicate normalization.
//!
//! Every accepted predicate shape is turned into a [`FilterGroup`]. Key/value
//! predicates and host expressions are checked against the members of the
//! target type; conditions and groups are already canonical and pass
//! through unchanged.

use ormbatch_proto::{
    CompareOp, ComparisonOp, Expr, FilterCondition, FilterGroup, LogicalOp, Predicate, Value,
};

use crate::entity::Entity;
use crate::error::{Error, Result};

/// Member-to-column mapping of one target, used to resolve names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetColumns {
    target: String,
    members: Vec<(String, String)>,
}

impl TargetColumns {
    /// Create a mapping from `(member, column)` pairs.
    pub fn new<M, C>(target: impl Into<String>, members: impl IntoIterator<Item = (M, C)>) -> Self
    where
        M: Into<String>,
        C: Into<String>,
    {
        Self {
            target: target.into(),
            members: members
                .into_iter()
                .map(|(m, c)| (m.into(), c.into()))
                .collect(),
        }
    }

    /// The mapping declared by an entity type.
    pub fn of<E: Entity>() -> Self {
        Self::new(
            E::type_name(),
            E::members().iter().map(|m| (m.name, m.column_name())),
        )
    }

    /// Target type name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Resolve a key/value key to its column. Keys may name either the
    /// column or the member, case-insensitively.
    pub fn resolve_key(&self, key: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|(_, column)| column.eq_ignore_ascii_case(key))
            .or_else(|| {
                self.members
                    .iter()
                    .find(|(member, _)| member.eq_ignore_ascii_case(key))
            })
            .map(|(_, column)| column.as_str())
    }

    /// Resolve a member referenced by an expression to its column.
    pub fn resolve_member(&self, member: &str) -> Option<&str> {
        self.members
            .iter()
            .find(|(name, _)| name == member)
            .or_else(|| {
                self.members
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(member))
            })
            .map(|(_, column)| column.as_str())
    }
}

/// Normalize a predicate into a filter tree.
pub fn normalize(predicate: &Predicate, columns: &TargetColumns) -> Result<FilterGroup> {
    match predicate {
        Predicate::KeyValue(pairs) => normalize_key_values(pairs, columns),
        Predicate::Expression(expr) => Lowering { columns }.lower(expr, false),
        Predicate::Condition(condition) => Ok(FilterGroup::Condition(condition.clone())),
        Predicate::Group(group) => Ok(group.clone()),
    }
}

fn normalize_key_values(pairs: &[(String, Value)], columns: &TargetColumns) -> Result<FilterGroup> {
    if pairs.is_empty() {
        return Err(Error::invalid_predicate(
            columns.target(),
            "key/value predicate has no pairs",
        ));
    }

    let mut children = Vec::with_capacity(pairs.len());
    for (key, value) in pairs {
        let column = columns.resolve_key(key).ok_or_else(|| {
            Error::invalid_predicate(columns.target(), format!("unknown column '{key}'"))
        })?;
        children.push(FilterCondition::eq(column, value.clone()));
    }

    Ok(FilterGroup::all_of(children)?)
}

/// Host expression lowering. Negations are pushed down to the leaves.
struct Lowering<'a> {
    columns: &'a TargetColumns,
}

impl Lowering<'_> {
    fn lower(&self, expr: &Expr, negated: bool) -> Result<FilterGroup> {
        match expr {
            Expr::And(lhs, rhs) => self.combine(LogicalOp::And, lhs, rhs, negated),
            Expr::Or(lhs, rhs) => self.combine(LogicalOp::Or, lhs, rhs, negated),
            Expr::Not(inner) => self.lower(inner, !negated),
            Expr::Compare { op, lhs, rhs } => self.compare(*op, lhs, rhs, negated),
            Expr::IsNull(inner) => self.null_check(inner, ComparisonOp::IsNull, negated),
            Expr::IsNotNull(inner) => self.null_check(inner, ComparisonOp::IsNotNull, negated),
            Expr::Call {
                receiver,
                method,
                args,
            } => self.call(receiver, method, args, negated),
            // A bare boolean member.
            Expr::Column(member) => {
                let column = self.column(member)?;
                Ok(FilterCondition::eq(column, !negated).into())
            }
            Expr::Literal(value) => Err(unsupported(format!(
                "constant {} used as a predicate",
                value.type_name()
            ))),
            Expr::List(_) => Err(unsupported("list used as a predicate")),
        }
    }

    fn combine(&self, op: LogicalOp, lhs: &Expr, rhs: &Expr, negated: bool) -> Result<FilterGroup> {
        let op = if negated { op.flip() } else { op };
        let mut children = Vec::new();
        for side in [lhs, rhs] {
            match self.lower(side, negated)? {
                FilterGroup::Combinator(node) if node.op() == op => {
                    children.extend(node.into_parts().1);
                }
                other => children.push(other),
            }
        }
        Ok(match op {
            LogicalOp::And => FilterGroup::and(children)?,
            LogicalOp::Or => FilterGroup::or(children)?,
        })
    }

    fn compare(&self, op: CompareOp, lhs: &Expr, rhs: &Expr, negated: bool) -> Result<FilterGroup> {
        let op = ComparisonOp::from(op);
        let (member, op, value) = match (lhs, rhs) {
            (Expr::Column(member), Expr::Literal(value)) => (member, op, value),
            (Expr::Literal(value), Expr::Column(member)) => {
                (member, op.mirror().unwrap_or(op), value)
            }
            (Expr::Column(a), Expr::Column(b)) => {
                return Err(unsupported(format!(
                    "comparison between members '{a}' and '{b}'"
                )))
            }
            (Expr::Call { method, .. }, _) | (_, Expr::Call { method, .. }) => {
                return Err(unsupported(format!(
                    "comparison against the result of method call '{method}'"
                )))
            }
            _ => {
                return Err(unsupported(
                    "comparison operands must be a member and a constant",
                ))
            }
        };

        let column = self.column(member)?;
        let condition = if value.is_null() {
            match op {
                ComparisonOp::Eq => FilterCondition::is_null(column),
                ComparisonOp::Ne => FilterCondition::is_not_null(column),
                other => {
                    return Err(unsupported(format!(
                        "operator {other} on '{member}' against null"
                    )))
                }
            }
        } else {
            FilterCondition::new(column, op, vec![value.clone()])?
        };

        Ok(leaf(condition, negated))
    }

    fn null_check(&self, operand: &Expr, op: ComparisonOp, negated: bool) -> Result<FilterGroup> {
        let Expr::Column(member) = operand else {
            return Err(unsupported("null check on something other than a member"));
        };
        let column = self.column(member)?;
        Ok(leaf(FilterCondition::new(column, op, vec![])?, negated))
    }

    fn call(&self, receiver: &Expr, method: &str, args: &[Expr], negated: bool) -> Result<FilterGroup> {
        let condition = match (receiver, method, args) {
            (Expr::Column(member), "contains", [Expr::Literal(Value::String(needle))]) => {
                let pattern = format!("%{}%", escape_like(needle));
                FilterCondition::like(self.column(member)?, pattern)
            }
            (Expr::Column(member), "starts_with", [Expr::Literal(Value::String(prefix))]) => {
                let pattern = format!("{}%", escape_like(prefix));
                FilterCondition::like(self.column(member)?, pattern)
            }
            (Expr::Column(member), "ends_with", [Expr::Literal(Value::String(suffix))]) => {
                let pattern = format!("%{}", escape_like(suffix));
                FilterCondition::like(self.column(member)?, pattern)
            }
            (Expr::Column(member), "like", [Expr::Literal(Value::String(pattern))]) => {
                FilterCondition::like(self.column(member)?, pattern.clone())
            }
            (Expr::Column(member), "ilike", [Expr::Literal(Value::String(pattern))]) => {
                FilterCondition::ilike(self.column(member)?, pattern.clone())
            }
            (Expr::Column(member), "is_in", [Expr::List(items)])
            | (Expr::List(items), "contains", [Expr::Column(member)]) => {
                let values = list_values(items)?;
                FilterCondition::in_values(self.column(member)?, values)?
            }
            (
                Expr::Column(member),
                "between",
                [Expr::Literal(low), Expr::Literal(high)],
            ) if !low.is_null() && !high.is_null() => {
                FilterCondition::between(self.column(member)?, low.clone(), high.clone())
            }
            _ => {
                return Err(unsupported(format!(
                    "method call '{method}' has no filter equivalent"
                )))
            }
        };

        Ok(leaf(condition, negated))
    }

    fn column(&self, member: &str) -> Result<String> {
        self.columns
            .resolve_member(member)
            .map(str::to_string)
            .ok_or_else(|| {
                unsupported(format!(
                    "'{member}' is not a member of {}",
                    self.columns.target()
                ))
            })
    }
}

fn leaf(condition: FilterCondition, negated: bool) -> FilterGroup {
    if negated {
        condition.negated().into()
    } else {
        condition.into()
    }
}

fn list_values(items: &[Expr]) -> Result<Vec<Value>> {
    if items.is_empty() {
        return Err(unsupported("containment check against an empty list"));
    }
    items
        .iter()
        .map(|item| match item {
            Expr::Literal(value) => Ok(value.clone()),
            _ => Err(unsupported("list items must be constants")),
        })
        .collect()
}

/// Escape LIKE wildcards so that the text matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn unsupported(message: impl Into<String>) -> Error {
    Error::UnsupportedExpression(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbatch_proto::{col, lit};
    use pretty_assertions::assert_eq;

    fn users() -> TargetColumns {
        TargetColumns::new(
            "User",
            [
                ("id", "id"),
                ("name", "name"),
                ("age", "age"),
                ("status", "status"),
                ("active", "is_active"),
                ("email", "email_address"),
            ],
        )
    }

    fn expr(e: Expr) -> Result<FilterGroup> {
        normalize(&Predicate::Expression(e), &users())
    }

    #[test]
    fn test_key_values_become_anded_equals() {
        let predicate = Predicate::key_values([("Status", Value::from("active")), ("email", Value::from("a@b.c"))]);
        let group = normalize(&predicate, &users()).unwrap();

        assert_eq!(
            group,
            FilterGroup::all_of(vec![
                FilterCondition::eq("status", "active"),
                FilterCondition::eq("email_address", "a@b.c"),
            ])
            .unwrap()
        );
    }

    #[test]
    fn test_key_values_reject_unknown_and_empty() {
        let err = normalize(&Predicate::key_values([("nope", 1)]), &users()).unwrap_err();
        assert!(matches!(err, Error::InvalidPredicate { ref message, .. } if message == "unknown column 'nope'"));

        let err = normalize(&Predicate::KeyValue(vec![]), &users()).unwrap_err();
        assert!(matches!(err, Error::InvalidPredicate { .. }));
    }

    #[test]
    fn test_conditions_and_groups_pass_through() {
        let condition = FilterCondition::gt("anything", 3);
        assert_eq!(
            normalize(&condition.clone().into(), &users()).unwrap(),
            FilterGroup::Condition(condition)
        );

        let group = FilterGroup::or(vec![
            FilterCondition::is_null("a").into(),
            FilterGroup::all_of(vec![FilterCondition::eq("b", 1), FilterCondition::ne("c", 2)])
                .unwrap(),
        ])
        .unwrap();
        assert_eq!(normalize(&group.clone().into(), &users()).unwrap(), group);
    }

    #[test]
    fn test_range_conjunction() {
        let group = expr(col("age").gt(30).and(col("age").lt(50))).unwrap();
        assert_eq!(
            group,
            FilterGroup::all_of(vec![FilterCondition::gt("age", 30), FilterCondition::lt("age", 50)])
                .unwrap()
        );
    }

    #[test]
    fn test_same_combinator_chains_flatten() {
        let group = expr(
            col("age")
                .gt(1)
                .and(col("age").lt(9))
                .and(col("status").eq("x")),
        )
        .unwrap();
        match group {
            FilterGroup::Combinator(node) => {
                assert_eq!(node.op(), LogicalOp::And);
                assert_eq!(node.children().len(), 3);
            }
            other => panic!("expected combinator, got {other:?}"),
        }
    }

    #[test]
    fn test_negation_is_pushed_down() {
        let group = expr(!(col("age").lt(18).or(col("status").eq("banned")))).unwrap();
        assert_eq!(
            group,
            FilterGroup::all_of(vec![
                FilterCondition::ge("age", 18),
                FilterCondition::ne("status", "banned"),
            ])
            .unwrap()
        );
    }

    #[test]
    fn test_literal_on_left_is_mirrored() {
        assert_eq!(
            expr(lit(30).lt(col("age"))).unwrap(),
            FilterCondition::gt("age", 30).into()
        );
    }

    #[test]
    fn test_null_comparisons() {
        assert_eq!(
            expr(col("email").eq(Value::Null)).unwrap(),
            FilterCondition::is_null("email_address").into()
        );
        assert_eq!(
            expr(!col("email").is_null()).unwrap(),
            FilterCondition::is_not_null("email_address").into()
        );
        assert!(expr(col("age").gt(Value::Null)).is_err());
    }

    #[test]
    fn test_bare_boolean_member() {
        assert_eq!(
            expr(col("active")).unwrap(),
            FilterCondition::eq("is_active", true).into()
        );
        assert_eq!(
            expr(!col("active")).unwrap(),
            FilterCondition::eq("is_active", false).into()
        );
    }

    #[test]
    fn test_string_methods_escape_wildcards() {
        assert_eq!(
            expr(col("name").contains("50%_off")).unwrap(),
            FilterCondition::like("name", "%50\\%\\_off%").into()
        );
        assert_eq!(
            expr(col("name").starts_with("Al")).unwrap(),
            FilterCondition::like("name", "Al%").into()
        );
        assert_eq!(
            expr(col("name").ends_with("son")).unwrap(),
            FilterCondition::like("name", "%son").into()
        );
        assert_eq!(
            expr(col("name").like("A_%")).unwrap(),
            FilterCondition::like("name", "A_%").into()
        );
    }

    #[test]
    fn test_containment_becomes_in() {
        let expected: FilterGroup = FilterCondition::in_values("id", vec![Value::Int32(1), Value::Int32(2)])
            .unwrap()
            .into();
        assert_eq!(expr(col("id").is_in([1, 2])).unwrap(), expected);
        assert_eq!(
            expr(Expr::List(vec![lit(1), lit(2)]).contains(col("id"))).unwrap(),
            expected
        );
        assert!(expr(col("id").is_in(Vec::<i32>::new())).is_err());
    }

    #[test]
    fn test_between_and_its_negation() {
        assert_eq!(
            expr(!col("age").between(18, 65)).unwrap(),
            FilterCondition::between("age", 18, 65).negated().into()
        );
    }

    #[test]
    fn test_unsupported_expressions() {
        let cases = vec![
            col("age").eq(col("id")),
            col("name").call("to_lower", vec![]).eq("bob"),
            col("name").call("trim", vec![]),
            lit(true),
            col("nickname").eq("x"),
        ];
        for case in cases {
            let err = expr(case.clone()).unwrap_err();
            assert!(
                matches!(err, Error::UnsupportedExpression(_)),
                "{case:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("a\\b%c_"), "a\\\\b\\%c\\_");
    }
}
