//! Target type mapping.
//!
//! A target type declares its table and, for each member, the column it is
//! hydrated from. The [`impl_entity!`](crate::impl_entity) macro generates
//! the mapping for plain structs:
//!
//! ```
//! use ormbatch_core::{impl_entity, Entity};
//!
//! #[derive(Debug, Clone, Default)]
//! struct User {
//!     id: i64,
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl_entity!(User, table = "users", {
//!     id,
//!     name,
//!     email => "email_address",
//! });
//!
//! assert_eq!(User::table(), "users");
//! assert_eq!(User::members()[2].column_name(), "email_address");
//! ```

use ormbatch_proto::Value;

/// Assigns a value to one member, returning whether the value converted.
pub type Assign<E> = fn(&mut E, &Value) -> bool;

/// A settable member of a target type.
pub struct Member<E> {
    /// Member name as written in host expressions.
    pub name: &'static str,
    /// Mapped column name when it differs from the member name.
    pub column: Option<&'static str>,
    /// Setter.
    pub assign: Assign<E>,
}

impl<E> Member<E> {
    /// Column this member is stored in.
    pub fn column_name(&self) -> &'static str {
        self.column.unwrap_or(self.name)
    }

    /// Whether a result column hydrates this member.
    ///
    /// The member name is tried first, then the mapped column name, both
    /// case-insensitively.
    pub fn matches(&self, column: &str) -> bool {
        self.name.eq_ignore_ascii_case(column)
            || self.column.is_some_and(|c| c.eq_ignore_ascii_case(column))
    }
}

impl<E> Clone for Member<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for Member<E> {}

impl<E> std::fmt::Debug for Member<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("column", &self.column)
            .finish()
    }
}

/// A type that rows can be materialized into.
///
/// Instances start from `Default` and are filled member by member, so
/// members without a matching column keep their default value.
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Table the type is read from.
    fn table() -> &'static str;

    /// Settable members in declaration order.
    fn members() -> Vec<Member<Self>>;

    /// Short type name used in diagnostics.
    fn type_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Implement [`Entity`] for a struct whose members implement
/// [`FromValue`](ormbatch_proto::FromValue).
///
/// `member => "column"` maps a member to a differently named column.
#[macro_export]
macro_rules! impl_entity {
    (@column) => {
        None
    };
    (@column $column:literal) => {
        Some($column)
    };
    ($ty:ty, table = $table:literal, { $($member:ident $(=> $column:literal)?),* $(,)? }) => {
        impl $crate::Entity for $ty {
            fn table() -> &'static str {
                $table
            }

            fn members() -> Vec<$crate::Member<Self>> {
                vec![$(
                    $crate::Member {
                        name: stringify!($member),
                        column: $crate::impl_entity!(@column $($column)?),
                        assign: |entity: &mut Self, value: &$crate::proto::Value| -> bool {
                            match $crate::proto::FromValue::from_value(value) {
                                Some(converted) => {
                                    entity.$member = converted;
                                    true
                                }
                                None => false,
                            }
                        },
                    }
                ),*]
            }
        }
    };
}
