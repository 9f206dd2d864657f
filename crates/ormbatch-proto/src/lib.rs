//! ormbatch filter model and query descriptors.
//!
//! This crate defines the plain data types shared by the rest of the
//! workspace. It performs no I/O and knows nothing about SQL dialects.
//!
//! # Modules
//!
//! - [`value`] - Runtime value types for operands and result rows
//! - [`query`] - Fields, ordering, filter conditions/groups and descriptors
//! - [`expr`] - Host expression AST and its builder
//! - [`predicate`] - The four accepted predicate shapes
//! - [`error`] - Construction errors
//!
//! All types derive serde's `Serialize`/`Deserialize`; deserializing a
//! condition or a group re-validates its invariants.
//!
//! ```
//! use ormbatch_proto::{col, FilterCondition, FilterGroup, QueryDescriptor, OrderField};
//!
//! let active = QueryDescriptor::new("users")
//!     .with_predicate(col("age").gt(30).and(col("age").lt(50)))
//!     .with_order(OrderField::asc("name"))
//!     .with_limit(10);
//!
//! let group = FilterGroup::all_of(vec![FilterCondition::eq("status", "active")]).unwrap();
//! assert_eq!(group.conditions().len(), 1);
//! # let _ = active;
//! ```

pub mod error;
pub mod expr;
pub mod predicate;
pub mod query;
pub mod value;

pub use error::Error;

// Re-export commonly used types at crate root
pub use expr::{col, lit, CompareOp, Expr};
pub use predicate::Predicate;
pub use query::{
    Arity, CacheKey, CachePolicy, Combinator, ComparisonOp, Field, FilterCondition, FilterGroup,
    LogicalOp, OrderDirection, OrderField, QueryDescriptor,
};
pub use value::{FromValue, Value};

/// Maximum number of targets accepted in one batched call.
pub const MAX_TARGETS: usize = 7;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_json_roundtrip() {
        let descriptor = QueryDescriptor::new("users")
            .with_predicate(Predicate::key_values([("status", "active")]))
            .select("id")
            .with_order(OrderField::asc("name"))
            .with_limit(5);

        let json = serde_json::to_string(&descriptor).unwrap();
        let back: QueryDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(descriptor, back);
    }
}
