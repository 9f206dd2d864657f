//! Derived result cache keys.
//!
//! Unlike a plan cache, a result cache must tell apart queries that differ
//! only in operand values, so the fingerprint covers the whole normalized
//! query including values and the target type.

use ormbatch_proto::{Field, FilterGroup, OrderField, QueryDescriptor};
use serde::Serialize;

use crate::error::{Error, Result};

/// Prefix of derived keys, keeping them apart from caller-declared ones.
pub const FINGERPRINT_PREFIX: &str = "fp:";

#[derive(Serialize)]
struct CanonicalQuery<'a> {
    target: &'a str,
    table: &'a str,
    filter: Option<&'a FilterGroup>,
    fields: &'a [Field],
    order_by: &'a [OrderField],
    limit: u64,
    hint: Option<&'a str>,
}

/// Compute the cache key of a normalized query for `target`.
pub fn fingerprint(
    target: &str,
    descriptor: &QueryDescriptor,
    filter: Option<&FilterGroup>,
) -> Result<String> {
    let canonical = CanonicalQuery {
        target,
        table: &descriptor.table,
        filter,
        fields: &descriptor.fields,
        order_by: &descriptor.order_by,
        limit: descriptor.limit,
        hint: descriptor.hint.as_deref(),
    };
    let bytes =
        serde_json::to_vec(&canonical).map_err(|e| Error::Serialization(e.to_string()))?;
    let hash = blake3::hash(&bytes);
    Ok(format!("{FINGERPRINT_PREFIX}{}", hex::encode(hash.as_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ormbatch_proto::FilterCondition;

    fn filter(age: i32) -> FilterGroup {
        FilterGroup::Condition(FilterCondition::gt("age", age))
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let d = QueryDescriptor::new("users").with_limit(10);
        let a = fingerprint("User", &d, Some(&filter(30))).unwrap();
        let b = fingerprint("User", &d, Some(&filter(30))).unwrap();

        assert_eq!(a, b);
        assert!(a.starts_with(FINGERPRINT_PREFIX));
        assert_eq!(a.len(), FINGERPRINT_PREFIX.len() + 64);
    }

    #[test]
    fn test_fingerprint_covers_values_and_target() {
        let d = QueryDescriptor::new("users");
        let base = fingerprint("User", &d, Some(&filter(30))).unwrap();

        assert_ne!(base, fingerprint("User", &d, Some(&filter(31))).unwrap());
        assert_ne!(base, fingerprint("Admin", &d, Some(&filter(30))).unwrap());
        assert_ne!(base, fingerprint("User", &d, None).unwrap());
        assert_ne!(
            base,
            fingerprint("User", &d.clone().with_limit(1), Some(&filter(30))).unwrap()
        );
    }
}
