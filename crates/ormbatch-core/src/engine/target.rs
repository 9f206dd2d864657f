//! Typed targets and target sets.
//!
//! A [`Query<E>`] pairs a descriptor with the entity type its rows are
//! materialized into. A [`QuerySet`] is an ordered group of such queries
//! (a tuple of one to seven, or a `Vec` of one type) whose output keeps
//! the same positions.

use std::marker::PhantomData;
use std::sync::Arc;

use ormbatch_proto::{CachePolicy, Field, OrderField, Predicate, QueryDescriptor};

use super::connection::ResultSet;
use crate::cache::{CachePayload, MaterializerCache, ResultCache};
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::query::TargetColumns;

/// A descriptor bound to its target type.
pub struct Query<E> {
    descriptor: QueryDescriptor,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Query<E> {
    /// Select every row of the entity's table.
    pub fn new() -> Self {
        Self::from_descriptor(QueryDescriptor::new(E::table()))
    }

    /// Wrap an existing descriptor.
    pub fn from_descriptor(descriptor: QueryDescriptor) -> Self {
        Self {
            descriptor,
            _marker: PhantomData,
        }
    }

    /// Set the predicate.
    pub fn filter(mut self, predicate: impl Into<Predicate>) -> Self {
        self.descriptor.predicate = Some(predicate.into());
        self
    }

    /// Set the predicate from expression text such as `age > 30 && age < 50`.
    pub fn parse_filter(self, source: &str) -> Result<Self> {
        let expr = ormbatch_lang::parse(source)?;
        Ok(self.filter(expr))
    }

    /// Add a projected field.
    pub fn select(mut self, field: impl Into<Field>) -> Self {
        self.descriptor.fields.push(field.into());
        self
    }

    /// Add ordering.
    pub fn order_by(mut self, order: OrderField) -> Self {
        self.descriptor.order_by.push(order);
        self
    }

    /// Set the row limit; 0 means unbounded.
    pub fn limit(mut self, limit: u64) -> Self {
        self.descriptor.limit = limit;
        self
    }

    /// Set the provider-specific hint.
    ///
    /// The hint is spliced into the statement text. Building rejects hints
    /// containing `;`, `--`, `/*` or `*/`.
    pub fn hint(mut self, hint: impl Into<String>) -> Self {
        self.descriptor.hint = Some(hint.into());
        self
    }

    /// Enable result caching.
    pub fn cache(mut self, policy: CachePolicy) -> Self {
        self.descriptor.cache = Some(policy);
        self
    }

    /// The descriptor.
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Consume into the descriptor.
    pub fn into_descriptor(self) -> QueryDescriptor {
        self.descriptor
    }
}

impl<E: Entity> Default for Query<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Query<E> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            _marker: PhantomData,
        }
    }
}

impl<E> std::fmt::Debug for Query<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("target", &std::any::type_name::<E>())
            .field("descriptor", &self.descriptor)
            .finish()
    }
}

/// Type-erased view of a [`Query<E>`] used by the engine.
pub trait Target: Send + Sync {
    /// The descriptor.
    fn descriptor(&self) -> &QueryDescriptor;

    /// Target type name.
    fn type_name(&self) -> &'static str;

    /// Fully qualified target type path; distinct for same-named types in
    /// different modules.
    fn type_path(&self) -> &'static str;

    /// Member-to-column mapping of the target type.
    fn columns(&self) -> TargetColumns;

    /// A cached payload for `key`, if one of the right type is live.
    fn cached(&self, cache: &ResultCache, key: &str) -> Option<CachePayload>;

    /// Materialize a result set into a `Vec` of the target type.
    fn materialize(&self, materializers: &MaterializerCache, set: &ResultSet) -> CachePayload;
}

impl<E: Entity> Target for Query<E> {
    fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    fn type_name(&self) -> &'static str {
        E::type_name()
    }

    fn type_path(&self) -> &'static str {
        std::any::type_name::<E>()
    }

    fn columns(&self) -> TargetColumns {
        TargetColumns::of::<E>()
    }

    fn cached(&self, cache: &ResultCache, key: &str) -> Option<CachePayload> {
        cache
            .get_as::<Vec<E>>(key)
            .map(|rows| rows as CachePayload)
    }

    fn materialize(&self, materializers: &MaterializerCache, set: &ResultSet) -> CachePayload {
        if set.rows.is_empty() {
            return Arc::new(Vec::<E>::new());
        }
        let materializer = materializers.get_or_compile::<E>(&set.columns);
        Arc::new(materializer.materialize_all(&set.rows))
    }
}

/// An ordered group of typed queries executed in one call.
pub trait QuerySet: Sync {
    /// One `Vec` of entities per query, in query order.
    type Output;

    /// The queries in order.
    fn targets(&self) -> Vec<&dyn Target>;

    /// Rebuild typed output from payloads in query order.
    fn assemble(payloads: Vec<CachePayload>) -> Result<Self::Output>;
}

fn take<E: Entity>(payloads: &mut impl Iterator<Item = CachePayload>) -> Result<Vec<E>> {
    let payload = payloads.next().ok_or(Error::PayloadType(E::type_name()))?;
    let rows = payload
        .downcast::<Vec<E>>()
        .map_err(|_| Error::PayloadType(E::type_name()))?;
    // Cached payloads are shared with the result cache.
    Ok(Arc::try_unwrap(rows).unwrap_or_else(|shared| (*shared).clone()))
}

macro_rules! impl_query_set {
    ($($entity:ident => $index:tt),+) => {
        impl<$($entity: Entity),+> QuerySet for ($(Query<$entity>,)+) {
            type Output = ($(Vec<$entity>,)+);

            fn targets(&self) -> Vec<&dyn Target> {
                vec![$(&self.$index as &dyn Target),+]
            }

            fn assemble(payloads: Vec<CachePayload>) -> Result<Self::Output> {
                let mut payloads = payloads.into_iter();
                Ok(($(take::<$entity>(&mut payloads)?,)+))
            }
        }
    };
}

impl_query_set!(A => 0);
impl_query_set!(A => 0, B => 1);
impl_query_set!(A => 0, B => 1, C => 2);
impl_query_set!(A => 0, B => 1, C => 2, D => 3);
impl_query_set!(A => 0, B => 1, C => 2, D => 3, E => 4);
impl_query_set!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5);
impl_query_set!(A => 0, B => 1, C => 2, D => 3, E => 4, F => 5, G => 6);

impl<E: Entity> QuerySet for Vec<Query<E>> {
    type Output = Vec<Vec<E>>;

    fn targets(&self) -> Vec<&dyn Target> {
        self.iter().map(|q| q as &dyn Target).collect()
    }

    fn assemble(payloads: Vec<CachePayload>) -> Result<Self::Output> {
        let count = payloads.len();
        let mut payloads = payloads.into_iter();
        (0..count).map(|_| take::<E>(&mut payloads)).collect()
    }
}
