//! Reflective queries
//!
//! [`Reflector`] is the public entry point. Every query follows the same
//! path: look in the reflection cache, resolve on a miss, drop members the
//! [`AccessFilter`] hides, publish the canonical members (each under its
//! declaring type, lists under the queried type) and hand back copies.

use std::sync::Arc;

use crate::cache::{AggregateKind, CacheDirectory, CacheGuard, CacheKey, Cacheable, SoftHeap};
use crate::config::{AmbiguityPolicy, ReflectConfig};
use crate::error::{ReflectError, ReflectResult};
use crate::introspect::{AccessFilter, AllowAll, MemberIntrospector};
use crate::member::{Constructor, Field, Method};
use crate::override_rules::{OverrideResolver, Specificity};
use crate::registry::TypeRegistry;
use crate::resolution::ResolutionEngine;
use crate::types::{TypeGraph, TypeId, TypeKind};

/// A reflective query against one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Every public method, inherited ones included
    AllPublicMethods,
    /// Every method the type declares, any visibility
    AllDeclaredMethods,
    /// The public method with this name and parameter list
    Method {
        name: String,
        parameter_types: Vec<TypeId>,
    },
    /// The public method with this exact signature
    MethodWithReturn {
        name: String,
        parameter_types: Vec<TypeId>,
        return_type: TypeId,
    },
    /// A method the type itself declares, any visibility
    DeclaredMethod {
        name: String,
        parameter_types: Vec<TypeId>,
    },
    /// Every public declaration of one identity on the type itself
    DeclaredPublicMethods {
        name: String,
        parameter_types: Vec<TypeId>,
    },
    AllPublicFields,
    AllDeclaredFields,
    Field {
        name: String,
    },
    DeclaredField {
        name: String,
    },
    AllPublicConstructors,
    AllDeclaredConstructors,
    Constructor {
        parameter_types: Vec<TypeId>,
    },
    DeclaredConstructor {
        parameter_types: Vec<TypeId>,
    },
}

/// Answer to a [`Query`]. Every member is a caller-owned copy.
#[derive(Debug, Clone)]
pub enum Resolved {
    Method(Method),
    Methods(Vec<Method>),
    Field(Field),
    Fields(Vec<Field>),
    Constructor(Constructor),
    Constructors(Vec<Constructor>),
}

/// Reflection front end: cached, filtered member lookups
pub struct Reflector {
    graph: Arc<dyn TypeGraph>,
    introspector: Arc<dyn MemberIntrospector>,
    access: Arc<dyn AccessFilter>,
    config: ReflectConfig,
    heap: Arc<SoftHeap>,
    directory: Arc<CacheDirectory>,
}

impl Reflector {
    /// Create a reflector over external collaborators
    pub fn new(
        graph: Arc<dyn TypeGraph>,
        introspector: Arc<dyn MemberIntrospector>,
        config: ReflectConfig,
    ) -> Self {
        let heap = Arc::new(SoftHeap::new());
        let directory = CacheDirectory::new(heap.clone());
        Self {
            graph,
            introspector,
            access: Arc::new(AllowAll),
            config,
            heap,
            directory,
        }
    }

    /// Create a reflector over a [`TypeRegistry`]
    pub fn for_registry(registry: Arc<TypeRegistry>, config: ReflectConfig) -> Self {
        Self::new(registry.clone(), registry, config)
    }

    /// Replace the access filter
    pub fn with_access_filter(mut self, access: Arc<dyn AccessFilter>) -> Self {
        self.access = access;
        self
    }

    pub fn config(&self) -> &ReflectConfig {
        &self.config
    }

    pub fn heap(&self) -> &Arc<SoftHeap> {
        &self.heap
    }

    pub fn directory(&self) -> &Arc<CacheDirectory> {
        &self.directory
    }

    /// Clear every cached referent nobody outside the cache holds, then run
    /// the reclamation callbacks. Returns the number of cleared referents.
    pub fn collect(&self) -> usize {
        let cleared = self.heap.collect();
        self.process_cleared();
        cleared
    }

    /// Run reclamation callbacks for referents cleared so far
    pub fn process_cleared(&self) -> usize {
        self.directory.process_cleared()
    }

    /// Answer any query
    pub fn resolve(&self, ty: TypeId, query: &Query) -> ReflectResult<Resolved> {
        Ok(match query {
            Query::AllPublicMethods => Resolved::Methods(self.get_methods(ty)?),
            Query::AllDeclaredMethods => Resolved::Methods(self.get_declared_methods(ty)?),
            Query::Method {
                name,
                parameter_types,
            } => Resolved::Method(self.get_method(ty, name, parameter_types)?),
            Query::MethodWithReturn {
                name,
                parameter_types,
                return_type,
            } => Resolved::Method(self.get_method_with_return(
                ty,
                name,
                parameter_types,
                *return_type,
            )?),
            Query::DeclaredMethod {
                name,
                parameter_types,
            } => Resolved::Method(self.get_declared_method(ty, name, parameter_types)?),
            Query::DeclaredPublicMethods {
                name,
                parameter_types,
            } => Resolved::Methods(self.get_declared_public_methods(ty, name, parameter_types)?),
            Query::AllPublicFields => Resolved::Fields(self.get_fields(ty)?),
            Query::AllDeclaredFields => Resolved::Fields(self.get_declared_fields(ty)?),
            Query::Field { name } => Resolved::Field(self.get_field(ty, name)?),
            Query::DeclaredField { name } => Resolved::Field(self.get_declared_field(ty, name)?),
            Query::AllPublicConstructors => Resolved::Constructors(self.get_constructors(ty)?),
            Query::AllDeclaredConstructors => {
                Resolved::Constructors(self.get_declared_constructors(ty)?)
            }
            Query::Constructor { parameter_types } => {
                Resolved::Constructor(self.get_constructor(ty, parameter_types)?)
            }
            Query::DeclaredConstructor { parameter_types } => {
                Resolved::Constructor(self.get_declared_constructor(ty, parameter_types)?)
            }
        })
    }

    // ========================================================================
    // Methods
    // ========================================================================

    /// Every public method of `ty`, inherited ones included. Arrays answer
    /// with their superclass's methods; primitives have none.
    pub fn get_methods(&self, ty: TypeId) -> ReflectResult<Vec<Method>> {
        let Some(owner) = self.method_owner(ty)? else {
            return Ok(Vec::new());
        };
        let list = self.aggregate(
            owner,
            CacheKey::Aggregate(AggregateKind::PublicMethods),
            || {
                let set = self.engine().compute_method_set(owner, false)?;
                Ok(self.access.filter_methods(owner, set.flatten()))
            },
            |method| self.publish_method(method),
        )?;
        Ok(list.iter().map(Method::copy).collect())
    }

    /// Every method `ty` declares, any visibility
    pub fn get_declared_methods(&self, ty: TypeId) -> ReflectResult<Vec<Method>> {
        if self.kind(ty)?.is_degenerate() {
            return Ok(Vec::new());
        }
        let list = self.aggregate(
            ty,
            CacheKey::Aggregate(AggregateKind::DeclaredMethods),
            || {
                let declared = self.engine().declared_methods(ty)?;
                Ok(self.access.filter_methods(ty, declared))
            },
            |method| self.publish_method(method),
        )?;
        Ok(list.iter().map(Method::copy).collect())
    }

    /// The public method of `ty` (inherited allowed) with this name and
    /// parameter list
    pub fn get_method(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
    ) -> ReflectResult<Method> {
        let owner = self
            .method_owner(ty)?
            .ok_or_else(|| self.no_such_method(ty, name, parameter_types))?;
        let guard = self.acquire(owner);
        let alias = CacheKey::method(name, parameter_types, None);
        if let Some(hit) = self.lookup::<Arc<Method>>(guard.as_ref(), owner, &alias) {
            if hit.is_public() {
                return Ok(Method::copy(&hit));
            }
        }

        let set = self.engine().compute_method_set(owner, false)?;
        let candidates = set
            .lookup(name, parameter_types)
            .map(|group| group.members().to_vec())
            .unwrap_or_default();
        let candidates = self.access.filter_methods(owner, candidates);
        let chosen = self.select_method(ty, name, parameter_types, candidates)?;
        let canonical = self.publish_method(chosen);
        if let Some(guard) = &guard {
            self.publish_alias(guard, alias, canonical.clone());
        }
        Ok(Method::copy(&canonical))
    }

    /// The public method of `ty` with this exact signature
    pub fn get_method_with_return(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
        return_type: TypeId,
    ) -> ReflectResult<Method> {
        let owner = self
            .method_owner(ty)?
            .ok_or_else(|| self.no_such_method(ty, name, parameter_types))?;
        let guard = self.acquire(owner);
        let exact = CacheKey::method(name, parameter_types, Some(return_type));
        if let Some(hit) = self.lookup::<Arc<Method>>(guard.as_ref(), owner, &exact) {
            if hit.is_public() {
                return Ok(Method::copy(&hit));
            }
        }

        let set = self.engine().compute_method_set(owner, false)?;
        let candidates: Vec<_> = set
            .lookup(name, parameter_types)
            .map(|group| {
                group
                    .members()
                    .iter()
                    .filter(|m| m.return_type() == return_type)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        let candidates = self.access.filter_methods(owner, candidates);
        let chosen = self.select_method(ty, name, parameter_types, candidates)?;
        let canonical = self.publish_method(chosen);
        if let Some(guard) = &guard {
            self.publish_alias(guard, exact, canonical.clone());
        }
        Ok(Method::copy(&canonical))
    }

    /// A method declared by `ty` itself, any visibility. Among covariant
    /// duplicates the one with the narrowest return type wins.
    pub fn get_declared_method(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
    ) -> ReflectResult<Method> {
        if self.kind(ty)?.is_degenerate() {
            return Err(self.no_such_method(ty, name, parameter_types));
        }
        let guard = self.acquire(ty);
        let alias = CacheKey::method(name, parameter_types, None);
        if let Some(hit) = self.lookup::<Arc<Method>>(guard.as_ref(), ty, &alias) {
            if hit.declaring_type() == ty {
                return Ok(Method::copy(&hit));
            }
        }

        let declared: Vec<_> = self
            .engine()
            .declared_methods(ty)?
            .into_iter()
            .filter(|m| m.matches(name, parameter_types))
            .collect();
        let resolver = self.resolver();
        let chosen = self
            .access
            .filter_methods(ty, declared)
            .into_iter()
            .reduce(|best, next| match resolver.more_specific(&next, &best) {
                Specificity::A => next,
                _ => best,
            })
            .ok_or_else(|| self.no_such_method(ty, name, parameter_types))?;

        let canonical = self.publish_method(chosen);
        if let Some(guard) = &guard {
            self.publish_alias(guard, alias, canonical.clone());
        }
        Ok(Method::copy(&canonical))
    }

    /// Every public method `ty` declares with this name and parameter list,
    /// one per return type
    pub fn get_declared_public_methods(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
    ) -> ReflectResult<Vec<Method>> {
        if self.kind(ty)?.is_degenerate() {
            return Ok(Vec::new());
        }
        let list = self.aggregate(
            ty,
            CacheKey::declared_public_methods(name, parameter_types),
            || {
                let declared = self
                    .engine()
                    .declared_methods(ty)?
                    .into_iter()
                    .filter(|m| m.is_public() && m.matches(name, parameter_types))
                    .collect();
                Ok(self.access.filter_methods(ty, declared))
            },
            |method| self.publish_method(method),
        )?;
        Ok(list.iter().map(Method::copy).collect())
    }

    // ========================================================================
    // Fields
    // ========================================================================

    /// Every public field visible from `ty`
    pub fn get_fields(&self, ty: TypeId) -> ReflectResult<Vec<Field>> {
        if self.kind(ty)?.is_degenerate() {
            return Ok(Vec::new());
        }
        let list = self.aggregate(
            ty,
            CacheKey::Aggregate(AggregateKind::PublicFields),
            || {
                let fields = self.engine().public_fields(ty)?;
                Ok(self.access.filter_fields(ty, fields))
            },
            |field| self.publish_field(field),
        )?;
        Ok(list.iter().map(Field::copy).collect())
    }

    /// Every field `ty` declares, any visibility
    pub fn get_declared_fields(&self, ty: TypeId) -> ReflectResult<Vec<Field>> {
        if self.kind(ty)?.is_degenerate() {
            return Ok(Vec::new());
        }
        let list = self.aggregate(
            ty,
            CacheKey::Aggregate(AggregateKind::DeclaredFields),
            || {
                let fields = self.engine().declared_fields(ty)?;
                Ok(self.access.filter_fields(ty, fields))
            },
            |field| self.publish_field(field),
        )?;
        Ok(list.iter().map(Field::copy).collect())
    }

    /// The public field `name` as seen from `ty`
    pub fn get_field(&self, ty: TypeId, name: &str) -> ReflectResult<Field> {
        if self.kind(ty)?.is_degenerate() {
            return Err(self.no_such_field(ty, name));
        }
        let guard = self.acquire(ty);
        let alias = CacheKey::field(name, None);
        if let Some(hit) = self.lookup::<Arc<Field>>(guard.as_ref(), ty, &alias) {
            if hit.is_public() {
                return Ok(Field::copy(&hit));
            }
        }

        let found = self
            .engine()
            .find_field(ty, name)?
            .into_iter()
            .collect::<Vec<_>>();
        let field = self
            .access
            .filter_fields(ty, found)
            .into_iter()
            .next()
            .ok_or_else(|| self.no_such_field(ty, name))?;
        Ok(Field::copy(&self.publish_field_with_alias(guard.as_ref(), ty, field)))
    }

    /// The field `name` declared by `ty` itself, any visibility
    pub fn get_declared_field(&self, ty: TypeId, name: &str) -> ReflectResult<Field> {
        if self.kind(ty)?.is_degenerate() {
            return Err(self.no_such_field(ty, name));
        }
        let guard = self.acquire(ty);
        let alias = CacheKey::field(name, None);
        if let Some(hit) = self.lookup::<Arc<Field>>(guard.as_ref(), ty, &alias) {
            if hit.declaring_type() == ty {
                return Ok(Field::copy(&hit));
            }
        }

        let declared: Vec<_> = self
            .engine()
            .declared_fields(ty)?
            .into_iter()
            .filter(|f| f.name() == name)
            .collect();
        let field = self
            .access
            .filter_fields(ty, declared)
            .into_iter()
            .next()
            .ok_or_else(|| self.no_such_field(ty, name))?;
        Ok(Field::copy(&self.publish_field_with_alias(guard.as_ref(), ty, field)))
    }

    // ========================================================================
    // Constructors
    // ========================================================================

    /// Public constructors of `ty`. Only classes have constructors.
    pub fn get_constructors(&self, ty: TypeId) -> ReflectResult<Vec<Constructor>> {
        self.constructor_list(ty, AggregateKind::PublicConstructors, true)
    }

    /// Every constructor `ty` declares, any visibility
    pub fn get_declared_constructors(&self, ty: TypeId) -> ReflectResult<Vec<Constructor>> {
        self.constructor_list(ty, AggregateKind::DeclaredConstructors, false)
    }

    /// The public constructor taking `parameter_types`
    pub fn get_constructor(
        &self,
        ty: TypeId,
        parameter_types: &[TypeId],
    ) -> ReflectResult<Constructor> {
        self.constructor(ty, parameter_types, true)
    }

    /// The constructor taking `parameter_types`, any visibility
    pub fn get_declared_constructor(
        &self,
        ty: TypeId,
        parameter_types: &[TypeId],
    ) -> ReflectResult<Constructor> {
        self.constructor(ty, parameter_types, false)
    }

    fn constructor_list(
        &self,
        ty: TypeId,
        kind: AggregateKind,
        public_only: bool,
    ) -> ReflectResult<Vec<Constructor>> {
        if self.kind(ty)? != TypeKind::Class {
            return Ok(Vec::new());
        }
        let list = self.aggregate(
            ty,
            CacheKey::Aggregate(kind),
            || {
                Ok(self
                    .engine()
                    .declared_constructors(ty)?
                    .into_iter()
                    .filter(|c| !public_only || c.is_public())
                    .collect())
            },
            |constructor| self.publish_constructor(constructor),
        )?;
        Ok(list.iter().map(Constructor::copy).collect())
    }

    fn constructor(
        &self,
        ty: TypeId,
        parameter_types: &[TypeId],
        public_only: bool,
    ) -> ReflectResult<Constructor> {
        if self.kind(ty)? != TypeKind::Class {
            return Err(self.no_such_constructor(ty, parameter_types));
        }
        let guard = self.acquire(ty);
        let key = CacheKey::constructor(parameter_types);
        if let Some(hit) = self.lookup::<Arc<Constructor>>(guard.as_ref(), ty, &key) {
            if !public_only || hit.is_public() {
                return Ok(Constructor::copy(&hit));
            }
        }

        let found = self
            .engine()
            .declared_constructors(ty)?
            .into_iter()
            .find(|c| c.parameter_types() == parameter_types && (!public_only || c.is_public()))
            .ok_or_else(|| self.no_such_constructor(ty, parameter_types))?;
        Ok(Constructor::copy(&self.publish_constructor(found)))
    }

    // ========================================================================
    // Resolution helpers
    // ========================================================================

    fn engine(&self) -> ResolutionEngine<'_> {
        ResolutionEngine::new(self.graph.as_ref(), self.introspector.as_ref(), &self.config)
    }

    fn resolver(&self) -> OverrideResolver<'_> {
        OverrideResolver::new(self.graph.as_ref(), self.config.override_semantics)
    }

    fn kind(&self, ty: TypeId) -> ReflectResult<TypeKind> {
        self.graph
            .kind(ty)
            .ok_or_else(|| ReflectError::UnknownType(ty.to_string()))
    }

    /// Type whose method set answers method queries on `ty`
    fn method_owner(&self, ty: TypeId) -> ReflectResult<Option<TypeId>> {
        Ok(match self.kind(ty)? {
            TypeKind::Primitive => None,
            TypeKind::Array => self.graph.superclass(ty),
            TypeKind::Class | TypeKind::Interface => Some(ty),
        })
    }

    /// Narrow same-identity candidates to one method. Concrete candidates
    /// take precedence; survivors that no other candidate beats are
    /// settled by the configured [`AmbiguityPolicy`].
    fn select_method(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
        candidates: Vec<Arc<Method>>,
    ) -> ReflectResult<Arc<Method>> {
        let concrete: Vec<_> = candidates.iter().filter(|m| !m.is_abstract()).cloned().collect();
        let pool = if concrete.is_empty() { candidates } else { concrete };

        let resolver = self.resolver();
        let mut best: Vec<Arc<Method>> = Vec::new();
        for candidate in pool {
            if best
                .iter()
                .any(|b| resolver.more_specific(b, &candidate) == Specificity::A)
            {
                continue;
            }
            best.retain(|b| resolver.more_specific(&candidate, b) != Specificity::A);
            best.push(candidate);
        }

        if best.len() > 1 && self.config.ambiguity == AmbiguityPolicy::Reject {
            return Err(ReflectError::AmbiguousMember {
                type_name: self.graph.name(ty),
                name: name.to_string(),
                signature: self.signature(parameter_types),
                candidates: best.len(),
            });
        }
        if best.len() > 1 {
            tracing::trace!(
                ty = %self.graph.name(ty),
                name,
                candidates = best.len(),
                "ambiguous method, taking first in declaration order"
            );
        }
        best.into_iter()
            .next()
            .ok_or_else(|| self.no_such_method(ty, name, parameter_types))
    }

    // ========================================================================
    // Cache helpers
    // ========================================================================

    fn acquire(&self, ty: TypeId) -> Option<CacheGuard> {
        self.config
            .cache_enabled
            .then(|| self.directory.acquire(ty))
    }

    fn lookup<T: Cacheable>(
        &self,
        guard: Option<&CacheGuard>,
        ty: TypeId,
        key: &CacheKey,
    ) -> Option<T> {
        let found = guard?.find::<T>(key);
        if self.config.debug {
            tracing::debug!(
                ty = %self.graph.name(ty),
                %key,
                hit = found.is_some(),
                "reflection cache lookup"
            );
        }
        found
    }

    fn publish<T: Cacheable + Clone>(&self, guard: &CacheGuard, key: CacheKey, value: T) -> T {
        if self.config.debug {
            tracing::debug!(ty = %self.graph.name(guard.owner()), %key, "reflection cache publish");
        }
        guard.insert_if_absent(key, value)
    }

    fn publish_alias<T: Cacheable + Clone>(
        &self,
        guard: &CacheGuard,
        key: CacheKey,
        value: T,
    ) -> T {
        if self.config.debug {
            tracing::debug!(ty = %self.graph.name(guard.owner()), %key, "reflection cache alias");
        }
        guard.insert(key, value)
    }

    /// Canonical instance of `method`, published under its declaring type.
    /// An inherited method aliased under the same exact key is replaced.
    fn publish_method(&self, method: Arc<Method>) -> Arc<Method> {
        let Some(guard) = self.acquire(method.declaring_type()) else {
            return method;
        };
        let key = CacheKey::of_method(&method);
        let published = self.publish(&guard, key.clone(), method.clone());
        if *published == *method {
            published
        } else {
            self.publish_alias(&guard, key, method)
        }
    }

    fn publish_field(&self, field: Arc<Field>) -> Arc<Field> {
        match self.acquire(field.declaring_type()) {
            Some(guard) => self.publish(&guard, CacheKey::of_field(&field), field),
            None => field,
        }
    }

    /// Publish a single-field answer. The type-less alias is only recorded
    /// on the declaring type, so a shadowing subtype field never answers for
    /// its supertype.
    fn publish_field_with_alias(
        &self,
        guard: Option<&CacheGuard>,
        ty: TypeId,
        field: Arc<Field>,
    ) -> Arc<Field> {
        let canonical = self.publish_field(field);
        if let Some(guard) = guard {
            if canonical.declaring_type() == ty {
                let alias = CacheKey::field(canonical.name(), None);
                self.publish_alias(guard, alias, canonical.clone());
            }
        }
        canonical
    }

    fn publish_constructor(&self, constructor: Arc<Constructor>) -> Arc<Constructor> {
        match self.acquire(constructor.declaring_type()) {
            Some(guard) => {
                self.publish(&guard, CacheKey::of_constructor(&constructor), constructor)
            }
            None => constructor,
        }
    }

    /// Cached list under `key` on `ty`, computing and publishing it on a
    /// miss. The cache of `ty` stays in use while members are published.
    fn aggregate<T>(
        &self,
        ty: TypeId,
        key: CacheKey,
        compute: impl FnOnce() -> ReflectResult<Vec<Arc<T>>>,
        publish_member: impl Fn(Arc<T>) -> Arc<T>,
    ) -> ReflectResult<Arc<[Arc<T>]>>
    where
        Arc<[Arc<T>]>: Cacheable,
    {
        let Some(guard) = self.acquire(ty) else {
            return Ok(Arc::from(compute()?));
        };
        if let Some(hit) = self.lookup::<Arc<[Arc<T>]>>(Some(&guard), ty, &key) {
            return Ok(hit);
        }
        let members: Vec<Arc<T>> = compute()?.into_iter().map(publish_member).collect();
        Ok(self.publish(&guard, key, Arc::from(members)))
    }

    // ========================================================================
    // Errors
    // ========================================================================

    fn signature(&self, parameter_types: &[TypeId]) -> String {
        let params: Vec<String> = parameter_types.iter().map(|p| self.graph.name(*p)).collect();
        format!("({})", params.join(", "))
    }

    fn no_such_method(&self, ty: TypeId, name: &str, parameter_types: &[TypeId]) -> ReflectError {
        ReflectError::NoSuchMethod {
            type_name: self.graph.name(ty),
            name: name.to_string(),
            signature: self.signature(parameter_types),
        }
    }

    fn no_such_field(&self, ty: TypeId, name: &str) -> ReflectError {
        ReflectError::NoSuchField {
            type_name: self.graph.name(ty),
            name: name.to_string(),
        }
    }

    fn no_such_constructor(&self, ty: TypeId, parameter_types: &[TypeId]) -> ReflectError {
        ReflectError::NoSuchConstructor {
            type_name: self.graph.name(ty),
            signature: self.signature(parameter_types),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Modifiers;

    fn reflector() -> (Arc<TypeRegistry>, Reflector) {
        let registry = Arc::new(TypeRegistry::new());
        let reflector = Reflector::for_registry(registry.clone(), ReflectConfig::default());
        (registry, reflector)
    }

    #[test]
    fn test_primitives_are_empty() {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        assert!(reflector.get_methods(int).unwrap().is_empty());
        assert!(reflector.get_fields(int).unwrap().is_empty());
        assert!(reflector.get_constructors(int).unwrap().is_empty());
        assert!(matches!(
            reflector.get_method(int, "m", &[]),
            Err(ReflectError::NoSuchMethod { .. })
        ));
        assert!(reflector.directory().is_empty());
    }

    #[test]
    fn test_arrays_answer_with_superclass_methods() {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        let root = registry.root_class();
        registry.add_method(root, "hash", &[], int, Modifiers::public());
        let ints = registry.array_of(int);

        let methods = reflector.get_methods(ints).unwrap();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].declaring_type(), root);
        assert!(reflector.get_fields(ints).unwrap().is_empty());
        assert!(reflector.get_declared_methods(ints).unwrap().is_empty());
    }

    #[test]
    fn test_interfaces_have_no_constructors() {
        let (registry, reflector) = reflector();
        let shape = registry.define_interface("Shape", &[]);
        assert!(reflector.get_declared_constructors(shape).unwrap().is_empty());
        assert!(matches!(
            reflector.get_constructor(shape, &[]),
            Err(ReflectError::NoSuchConstructor { .. })
        ));
    }

    #[test]
    fn test_unknown_type() {
        let (_registry, reflector) = reflector();
        let err = reflector.get_methods(TypeId::from_u32(4242)).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_declared_method_prefers_narrow_return() {
        let (registry, reflector) = reflector();
        let base = registry.define_class("Base", Some(registry.root_class()), &[]);
        let derived = registry.define_class("Derived", Some(base), &[]);
        registry.add_method(derived, "me", &[], base, Modifiers::public().synthetic());
        registry.add_method(derived, "me", &[], derived, Modifiers::public());

        let me = reflector.get_declared_method(derived, "me", &[]).unwrap();
        assert_eq!(me.return_type(), derived);

        let all = reflector.get_declared_public_methods(derived, "me", &[]).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_method_with_return() {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        let point = registry.define_class("Point", Some(registry.root_class()), &[]);
        registry.add_method(point, "x", &[], int, Modifiers::public());

        assert_eq!(
            reflector.get_method_with_return(point, "x", &[], int).unwrap().name(),
            "x"
        );
        assert!(reflector
            .get_method_with_return(point, "x", &[], point)
            .is_err());
    }

    #[test]
    fn test_resolve_dispatch() {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        let point = registry.define_class("Point", Some(registry.root_class()), &[]);
        registry.add_field(point, "x", int, Modifiers::public());
        registry.add_constructor(point, &[int], Modifiers::public());

        match reflector.resolve(point, &Query::Field { name: "x".to_string() }) {
            Ok(Resolved::Field(field)) => assert_eq!(field.field_type(), int),
            other => panic!("unexpected {:?}", other),
        }
        match reflector.resolve(point, &Query::AllPublicConstructors) {
            Ok(Resolved::Constructors(list)) => assert_eq!(list.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_declared_queries_see_private_members() {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        let point = registry.define_class("Point", Some(registry.root_class()), &[]);
        registry.add_field(point, "secret", int, Modifiers::private());
        registry.add_constructor(point, &[], Modifiers::private());

        assert!(reflector.get_field(point, "secret").is_err());
        assert_eq!(reflector.get_declared_field(point, "secret").unwrap().name(), "secret");
        assert!(reflector.get_constructor(point, &[]).is_err());
        assert!(reflector.get_declared_constructor(point, &[]).is_ok());
        // A cached private constructor must not answer the public query.
        assert!(reflector.get_constructor(point, &[]).is_err());
    }

    /// S declares a private `m()` and inherits T's public `m()`.
    fn private_over_inherited() -> (Arc<TypeRegistry>, Reflector, TypeId, TypeId, TypeId) {
        let (registry, reflector) = reflector();
        let int = registry.primitive("int");
        let t = registry.define_class("T", Some(registry.root_class()), &[]);
        registry.add_method(t, "m", &[], int, Modifiers::public());
        let s = registry.define_class("S", Some(t), &[]);
        registry.add_method(s, "m", &[], int, Modifiers::private());
        (registry, reflector, t, s, int)
    }

    #[test]
    fn test_exact_alias_does_not_mask_own_private_method() {
        let (_registry, reflector, t, s, int) = private_over_inherited();

        for _ in 0..2 {
            let inherited = reflector.get_method_with_return(s, "m", &[], int).unwrap();
            assert_eq!(inherited.declaring_type(), t);
            let own = reflector.get_declared_method(s, "m", &[]).unwrap();
            assert_eq!(own.declaring_type(), s);
            assert!(!own.is_public());
        }
    }

    #[test]
    fn test_alternating_aliases_do_not_accumulate_registrations() {
        let (_registry, reflector, t, s, _int) = private_over_inherited();

        let mut held = Vec::new();
        for _ in 0..2 {
            held.push(reflector.get_method(s, "m", &[]).unwrap());
            held.push(reflector.get_declared_method(s, "m", &[]).unwrap());
        }
        let settled = reflector.heap().registration_count();

        for _ in 0..10 {
            assert_eq!(reflector.get_method(s, "m", &[]).unwrap().declaring_type(), t);
            assert_eq!(reflector.get_declared_method(s, "m", &[]).unwrap().declaring_type(), s);
        }
        assert_eq!(reflector.heap().registration_count(), settled);
    }
}
