//! Member resolution over the type graph
//!
//! [`ResolutionEngine::compute_method_set`] produces the externally visible
//! method set of a type: one entry per [`MethodIdentity`], each holding the
//! winning declaration or, when unrelated interface defaults compete, every
//! sibling in resolution order.
//!
//! Classes start from their dispatch table, which already settles
//! class-to-class overriding. Entries still declared by an interface form the
//! *open set*; only those identities are re-examined against the interface
//! contributions of the superclass chain and the directly implemented
//! interfaces. Interfaces start from their own public declarations and merge
//! their superinterfaces. Interface sets are memoized per computation so a
//! shared ancestor in an interface DAG is visited once.
//!
//! The engine does no caching across calls and has no side effects.

use std::rc::Rc;
use std::sync::Arc;

use indexmap::map::Entry;
use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap, FxHashSet};

use crate::config::ReflectConfig;
use crate::error::{ReflectError, ReflectResult};
use crate::introspect::{consistent_snapshot, MemberIntrospector, RawMembers};
use crate::member::{Constructor, Field, Method, MethodIdentity, Origin};
use crate::override_rules::{OverrideResolver, Specificity};
use crate::types::{TypeGraph, TypeId, TypeKind};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Every visible declaration of one method identity
#[derive(Debug, Clone)]
pub enum MethodGroup {
    /// One canonical declaration
    Single(Arc<Method>),
    /// Mutually non-overriding declarations, in resolution order
    Siblings(Vec<Arc<Method>>),
}

impl MethodGroup {
    /// Declarations in this group
    pub fn members(&self) -> &[Arc<Method>] {
        match self {
            MethodGroup::Single(method) => std::slice::from_ref(method),
            MethodGroup::Siblings(methods) => methods,
        }
    }

    /// Whether more than one declaration survived
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, MethodGroup::Siblings(_))
    }

    /// Fold another declaration into the group.
    ///
    /// Non-public declarations are invisible. An incumbent declared by
    /// `target` itself is never displaced.
    fn update(&mut self, new: &Arc<Method>, target: TypeId, resolver: &OverrideResolver<'_>) {
        if !new.is_public() {
            return;
        }
        match self {
            MethodGroup::Single(incumbent) => {
                if **incumbent == **new || incumbent.declaring_type() == target {
                    return;
                }
                match resolver.more_specific(new, incumbent) {
                    Specificity::A => *incumbent = new.clone(),
                    Specificity::B => {}
                    Specificity::Neither => {
                        *self = MethodGroup::Siblings(vec![incumbent.clone(), new.clone()]);
                    }
                }
            }
            MethodGroup::Siblings(list) => {
                if list
                    .iter()
                    .any(|m| **m == **new || m.declaring_type() == target)
                {
                    return;
                }
                let mut placed = false;
                let mut index = 0;
                while index < list.len() {
                    match resolver.more_specific(new, &list[index]) {
                        Specificity::A if placed => {
                            list.remove(index);
                            continue;
                        }
                        Specificity::A => {
                            list[index] = new.clone();
                            placed = true;
                        }
                        Specificity::B if !placed => return,
                        _ => {}
                    }
                    index += 1;
                }
                if !placed {
                    list.push(new.clone());
                }
                if list.len() == 1 {
                    let only = list.remove(0);
                    *self = MethodGroup::Single(only);
                }
            }
        }
    }
}

/// Resolved visible methods of a type, keyed by identity
#[derive(Debug, Clone, Default)]
pub struct MethodSet {
    groups: FxIndexMap<MethodIdentity, MethodGroup>,
}

impl MethodSet {
    /// Group for an identity
    pub fn get(&self, identity: &MethodIdentity) -> Option<&MethodGroup> {
        self.groups.get(identity)
    }

    /// Group for a name and parameter list
    pub fn lookup(&self, name: &str, parameter_types: &[TypeId]) -> Option<&MethodGroup> {
        self.get(&MethodIdentity::new(name, parameter_types))
    }

    /// Number of distinct identities
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Iterate identities and their groups in resolution order
    pub fn iter(&self) -> impl Iterator<Item = (&MethodIdentity, &MethodGroup)> {
        self.groups.iter()
    }

    /// Every declaration, siblings expanded, in resolution order
    pub fn flatten(&self) -> Vec<Arc<Method>> {
        self.groups
            .values()
            .flat_map(|group| group.members().iter().cloned())
            .collect()
    }

    /// Seed with a raw declaration of the type being resolved. Duplicates
    /// of one identity are settled by the override rules.
    fn seed(&mut self, method: Arc<Method>, resolver: &OverrideResolver<'_>) {
        match self.groups.entry(method.identity()) {
            Entry::Vacant(slot) => {
                slot.insert(MethodGroup::Single(method));
            }
            Entry::Occupied(mut slot) => {
                if let MethodGroup::Single(incumbent) = slot.get_mut() {
                    if resolver.more_specific(&method, incumbent) == Specificity::A {
                        *incumbent = method;
                    }
                }
            }
        }
    }

    /// Merge another set's groups, optionally restricted to `filter`
    fn merge(
        &mut self,
        other: &MethodSet,
        filter: Option<&FxHashSet<MethodIdentity>>,
        target: TypeId,
        resolver: &OverrideResolver<'_>,
    ) {
        for (identity, group) in other.iter() {
            if filter.is_some_and(|open| !open.contains(identity)) {
                continue;
            }
            for method in group.members() {
                match self.groups.get_mut(identity) {
                    Some(existing) => existing.update(method, target, resolver),
                    None if method.is_public() => {
                        self.groups
                            .insert(identity.clone(), MethodGroup::Single(method.clone()));
                    }
                    None => {}
                }
            }
        }
    }
}

#[derive(Default)]
struct Memo {
    interfaces: FxHashMap<TypeId, Rc<MethodSet>>,
    contributions: FxHashMap<TypeId, Rc<MethodSet>>,
    in_progress: FxHashSet<TypeId>,
}

/// Walks the type graph and computes visible member sets
pub struct ResolutionEngine<'a> {
    graph: &'a dyn TypeGraph,
    introspector: &'a dyn MemberIntrospector,
    resolver: OverrideResolver<'a>,
    snapshot_retries: usize,
}

impl<'a> ResolutionEngine<'a> {
    /// Create an engine over the given collaborators
    pub fn new(
        graph: &'a dyn TypeGraph,
        introspector: &'a dyn MemberIntrospector,
        config: &ReflectConfig,
    ) -> Self {
        Self {
            graph,
            introspector,
            resolver: OverrideResolver::new(graph, config.override_semantics),
            snapshot_retries: config.snapshot_retries,
        }
    }

    /// Compute the visible method set of `ty`.
    ///
    /// With `virtual_only`, static methods of an interface are left out;
    /// the type being reflected on passes `false`.
    pub fn compute_method_set(&self, ty: TypeId, virtual_only: bool) -> ReflectResult<MethodSet> {
        let mut memo = Memo::default();
        match self.kind(ty)? {
            TypeKind::Class => self.class_method_set(ty, &mut memo),
            TypeKind::Interface => self.interface_method_set(ty, virtual_only, &mut memo),
            TypeKind::Primitive | TypeKind::Array => Ok(MethodSet::default()),
        }
    }

    /// Methods declared by `ty` itself, any visibility
    pub fn declared_methods(&self, ty: TypeId) -> ReflectResult<Vec<Arc<Method>>> {
        Ok(self.snapshot(ty)?.declared_methods)
    }

    /// Fields declared by `ty` itself, any visibility
    pub fn declared_fields(&self, ty: TypeId) -> ReflectResult<Vec<Arc<Field>>> {
        Ok(self.snapshot(ty)?.declared_fields)
    }

    /// Constructors declared by `ty` itself, any visibility
    pub fn declared_constructors(&self, ty: TypeId) -> ReflectResult<Vec<Arc<Constructor>>> {
        match self.kind(ty)? {
            TypeKind::Class => Ok(self.snapshot(ty)?.declared_constructors),
            _ => Ok(Vec::new()),
        }
    }

    /// Every public field visible from `ty`: its own, then those of its
    /// superinterfaces, then those of its superclass chain. Each declaring
    /// type contributes once.
    pub fn public_fields(&self, ty: TypeId) -> ReflectResult<Vec<Arc<Field>>> {
        self.kind(ty)?;
        let mut fields = Vec::new();
        let mut visited = FxHashSet::default();
        self.collect_public_fields(ty, &mut visited, &mut fields)?;
        Ok(fields)
    }

    /// Platform field lookup: own public declaration, then superinterfaces
    /// depth first, then the superclass. Shadowed fields of supertypes stay
    /// reachable by querying those supertypes directly.
    pub fn find_field(&self, ty: TypeId, name: &str) -> ReflectResult<Option<Arc<Field>>> {
        self.kind(ty)?;
        let mut visited = FxHashSet::default();
        self.find_field_in(ty, name, &mut visited)
    }

    // ------------------------------------------------------------------------

    fn kind(&self, ty: TypeId) -> ReflectResult<TypeKind> {
        self.graph
            .kind(ty)
            .ok_or_else(|| ReflectError::UnknownType(ty.to_string()))
    }

    fn snapshot(&self, ty: TypeId) -> ReflectResult<RawMembers> {
        consistent_snapshot(self.introspector, self.graph, ty, self.snapshot_retries)
    }

    fn class_method_set(&self, ty: TypeId, memo: &mut Memo) -> ReflectResult<MethodSet> {
        let raw = self.snapshot(ty)?;
        let mut set = MethodSet::default();
        for method in raw.dispatch_table {
            set.seed(method, &self.resolver);
        }

        let open: FxHashSet<MethodIdentity> = set
            .iter()
            .filter(|(_, group)| {
                group
                    .members()
                    .iter()
                    .any(|m| m.origin() == Origin::Interface)
            })
            .map(|(identity, _)| identity.clone())
            .collect();
        tracing::trace!(
            ty = %self.graph.name(ty),
            seeded = set.len(),
            open = open.len(),
            "seeded class method set"
        );
        if open.is_empty() {
            return Ok(set);
        }

        if let Some(parent) = self.graph.superclass(ty) {
            let inherited = self.class_contribution(parent, memo)?;
            set.merge(&inherited, Some(&open), ty, &self.resolver);
        }
        for intf in self.graph.interfaces(ty) {
            let contribution = self.interface_contribution(intf, memo)?;
            set.merge(&contribution, Some(&open), ty, &self.resolver);
        }
        Ok(set)
    }

    /// Interface methods visible through a class without its own dispatch
    /// table: its superclass's contribution plus its direct interfaces.
    fn class_contribution(&self, ty: TypeId, memo: &mut Memo) -> ReflectResult<Rc<MethodSet>> {
        if let Some(done) = memo.contributions.get(&ty) {
            return Ok(done.clone());
        }
        let mut set = MethodSet::default();
        if memo.in_progress.insert(ty) {
            if let Some(parent) = self.graph.superclass(ty) {
                let inherited = self.class_contribution(parent, memo)?;
                set.merge(&inherited, None, ty, &self.resolver);
            }
            for intf in self.graph.interfaces(ty) {
                let contribution = self.interface_contribution(intf, memo)?;
                set.merge(&contribution, None, ty, &self.resolver);
            }
            memo.in_progress.remove(&ty);
        }
        let set = Rc::new(set);
        memo.contributions.insert(ty, set.clone());
        Ok(set)
    }

    fn interface_contribution(&self, ty: TypeId, memo: &mut Memo) -> ReflectResult<Rc<MethodSet>> {
        if let Some(done) = memo.interfaces.get(&ty) {
            return Ok(done.clone());
        }
        if memo.in_progress.contains(&ty) {
            return Ok(Rc::new(MethodSet::default()));
        }
        let set = Rc::new(self.interface_method_set(ty, true, memo)?);
        memo.interfaces.insert(ty, set.clone());
        Ok(set)
    }

    fn interface_method_set(
        &self,
        ty: TypeId,
        virtual_only: bool,
        memo: &mut Memo,
    ) -> ReflectResult<MethodSet> {
        let raw = self.snapshot(ty)?;
        let mut set = MethodSet::default();
        for method in raw.declared_methods {
            if !method.is_public() || (virtual_only && method.is_static()) {
                continue;
            }
            set.seed(method, &self.resolver);
        }

        memo.in_progress.insert(ty);
        for parent in self.graph.interfaces(ty) {
            let inherited = self.interface_contribution(parent, memo)?;
            set.merge(&inherited, None, ty, &self.resolver);
        }
        memo.in_progress.remove(&ty);
        Ok(set)
    }

    fn collect_public_fields(
        &self,
        ty: TypeId,
        visited: &mut FxHashSet<TypeId>,
        out: &mut Vec<Arc<Field>>,
    ) -> ReflectResult<()> {
        if !visited.insert(ty) || self.graph.kind(ty).is_none_or(TypeKind::is_degenerate) {
            return Ok(());
        }
        out.extend(
            self.snapshot(ty)?
                .declared_fields
                .into_iter()
                .filter(|f| f.is_public()),
        );
        for intf in self.graph.interfaces(ty) {
            self.collect_public_fields(intf, visited, out)?;
        }
        if let Some(parent) = self.graph.superclass(ty) {
            self.collect_public_fields(parent, visited, out)?;
        }
        Ok(())
    }

    fn find_field_in(
        &self,
        ty: TypeId,
        name: &str,
        visited: &mut FxHashSet<TypeId>,
    ) -> ReflectResult<Option<Arc<Field>>> {
        if !visited.insert(ty) || self.graph.kind(ty).is_none_or(TypeKind::is_degenerate) {
            return Ok(None);
        }
        let own = self
            .snapshot(ty)?
            .declared_fields
            .into_iter()
            .find(|f| f.is_public() && f.name() == name);
        if own.is_some() {
            return Ok(own);
        }
        for intf in self.graph.interfaces(ty) {
            if let Some(found) = self.find_field_in(intf, name, visited)? {
                return Ok(Some(found));
            }
        }
        match self.graph.superclass(ty) {
            Some(parent) => self.find_field_in(parent, name, visited),
            None => Ok(None),
        }
    }
}
