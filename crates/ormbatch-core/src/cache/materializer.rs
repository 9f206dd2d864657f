//! Compiled row materializers.
//!
//! A [`Materializer`] pairs each column position of a result set with the
//! member it hydrates. Pairing happens once per `(type, column signature)`
//! and the result is shared through [`MaterializerCache`].

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use ormbatch_proto::Value;
use tracing::{debug, warn};

use crate::entity::{Assign, Entity};

/// Row-to-instance conversion for one target type and column signature.
pub struct Materializer<E> {
    signature: Arc<[String]>,
    slots: Vec<Option<Assign<E>>>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Entity> Materializer<E> {
    /// Pair every column with the first member that matches it.
    ///
    /// Unmatched columns are skipped when rows are read; members without a
    /// column keep their default value.
    pub fn compile(columns: &[String]) -> Self {
        let members = E::members();
        let slots: Vec<Option<Assign<E>>> = columns
            .iter()
            .map(|column| {
                members
                    .iter()
                    .find(|m| m.name.eq_ignore_ascii_case(column))
                    .or_else(|| members.iter().find(|m| m.matches(column)))
                    .map(|m| m.assign)
            })
            .collect();

        for (column, slot) in columns.iter().zip(&slots) {
            if slot.is_none() {
                warn!(
                    target_type = E::type_name(),
                    column = column.as_str(),
                    "column matches no member and is ignored"
                );
            }
        }

        Self {
            signature: columns.into(),
            slots,
            _marker: PhantomData,
        }
    }

    /// Build one instance from one row.
    pub fn materialize(&self, row: &[Value]) -> E {
        let mut entity = E::default();
        for (slot, value) in self.slots.iter().zip(row) {
            if let Some(assign) = slot {
                assign(&mut entity, value);
            }
        }
        entity
    }

    /// Build one instance per row.
    pub fn materialize_all(&self, rows: &[Vec<Value>]) -> Vec<E> {
        rows.iter().map(|row| self.materialize(row)).collect()
    }

    /// Column signature this materializer was compiled for.
    pub fn signature(&self) -> &[String] {
        &self.signature
    }

    /// Number of columns paired with a member.
    pub fn matched_columns(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MaterializerKey {
    type_id: TypeId,
    signature: Arc<[String]>,
}

/// Shared cache of compiled materializers.
///
/// Each `(type, signature)` pair is compiled at most once; concurrent
/// callers racing on the same key receive the same instance.
#[derive(Default)]
pub struct MaterializerCache {
    entries: DashMap<MaterializerKey, Arc<dyn Any + Send + Sync>>,
    compilations: AtomicU64,
}

impl MaterializerCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the materializer for `E` and `columns`, compiling it on first use.
    pub fn get_or_compile<E: Entity>(&self, columns: &[String]) -> Arc<Materializer<E>> {
        let key = MaterializerKey {
            type_id: TypeId::of::<E>(),
            signature: columns.into(),
        };

        if let Some(entry) = self.entries.get(&key) {
            if let Ok(found) = Arc::clone(entry.value()).downcast::<Materializer<E>>() {
                return found;
            }
        }

        let compiled = Arc::clone(
            self.entries
                .entry(key)
                .or_insert_with(|| {
                    self.compilations.fetch_add(1, Ordering::Relaxed);
                    debug!(
                        target_type = E::type_name(),
                        columns = columns.len(),
                        "compiling materializer"
                    );
                    let materializer: Arc<dyn Any + Send + Sync> =
                        Arc::new(Materializer::<E>::compile(columns));
                    materializer
                })
                .value(),
        );

        match compiled.downcast::<Materializer<E>>() {
            Ok(found) => found,
            // Entries are keyed by TypeId, so this is unreachable in practice.
            Err(_) => Arc::new(Materializer::compile(columns)),
        }
    }

    /// Number of cached materializers.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of compilations performed.
    pub fn compilations(&self) -> u64 {
        self.compilations.load(Ordering::Relaxed)
    }

    /// Drop all cached materializers.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl std::fmt::Debug for MaterializerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializerCache")
            .field("entries", &self.entries.len())
            .field("compilations", &self.compilations())
            .finish()
    }
}
