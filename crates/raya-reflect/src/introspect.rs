//! Collaborator contracts: raw member snapshots and access filtering

use std::sync::Arc;

use crate::error::{ReflectError, ReflectResult};
use crate::member::{Constructor, Field, Method};
use crate::types::{TypeGraph, TypeId};

/// Raw members of one type, taken as a single consistent snapshot
#[derive(Debug, Clone, Default)]
pub struct RawMembers {
    /// Classes only: the resolved dispatch table (public virtual methods,
    /// inherited ones included, with class-to-class overriding already
    /// applied) followed by the public static methods of the class and its
    /// superclasses. Empty for interfaces.
    pub dispatch_table: Vec<Arc<Method>>,
    /// Methods declared by the type itself, any visibility
    pub declared_methods: Vec<Arc<Method>>,
    /// Fields declared by the type itself, any visibility
    pub declared_fields: Vec<Arc<Field>>,
    /// Constructors declared by the type itself, any visibility
    pub declared_constructors: Vec<Arc<Constructor>>,
}

/// The type was redefined while its members were being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRace;

/// Source of raw declared members.
///
/// A snapshot must be internally consistent: counts and contents describe
/// the same version of the type. When an implementation detects that the
/// type changed underneath it, it returns [`SnapshotRace`] and the caller
/// retries the whole fetch.
pub trait MemberIntrospector: Send + Sync {
    /// Read every raw member of `ty`
    fn snapshot(&self, ty: TypeId) -> Result<RawMembers, SnapshotRace>;
}

/// Fetch a snapshot, retrying on races up to `attempts` times.
pub fn consistent_snapshot(
    introspector: &dyn MemberIntrospector,
    graph: &dyn TypeGraph,
    ty: TypeId,
    attempts: usize,
) -> ReflectResult<RawMembers> {
    let attempts = attempts.max(1);
    for attempt in 1..=attempts {
        match introspector.snapshot(ty) {
            Ok(members) => return Ok(members),
            Err(SnapshotRace) => {
                tracing::trace!(
                    ty = %graph.name(ty),
                    attempt,
                    "member snapshot raced with redefinition"
                );
            }
        }
    }
    Err(ReflectError::InconsistentSnapshot {
        type_name: graph.name(ty),
        attempts,
    })
}

/// Drops members that must stay hidden from reflection (internal fields,
/// security-sensitive methods). Applied before results are published.
pub trait AccessFilter: Send + Sync {
    /// Filter methods reflected on `ty`
    fn filter_methods(&self, ty: TypeId, methods: Vec<Arc<Method>>) -> Vec<Arc<Method>>;

    /// Filter fields reflected on `ty`
    fn filter_fields(&self, ty: TypeId, fields: Vec<Arc<Field>>) -> Vec<Arc<Field>>;
}

/// Filter that hides nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessFilter for AllowAll {
    fn filter_methods(&self, _ty: TypeId, methods: Vec<Arc<Method>>) -> Vec<Arc<Method>> {
        methods
    }

    fn filter_fields(&self, _ty: TypeId, fields: Vec<Arc<Field>>) -> Vec<Arc<Field>> {
        fields
    }
}
