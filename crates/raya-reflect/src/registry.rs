//! Type registry for reflective lookups
//!
//! An in-memory table of types and their declared members. It answers the
//! [`TypeGraph`] questions and produces [`RawMembers`] snapshots, building
//! class dispatch tables the way the VM lays out vtables:
//!
//! 1. start from the superclass's dispatch table,
//! 2. let the class's own public instance methods override matching slots,
//! 3. append one declaration for every interface method still missing,
//!    letting a default body fill a slot that only had an abstract one.
//!
//! Registration takes `&self` so a shared registry can grow while other
//! threads reflect on it; every snapshot is taken under a single read lock
//! and is therefore always consistent.

use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::introspect::{MemberIntrospector, RawMembers, SnapshotRace};
use crate::member::{Constructor, Field, Method, Modifiers, Origin};
use crate::types::{TypeGraph, TypeId, TypeKind};

/// Name of the class every other class ultimately extends
pub const ROOT_CLASS_NAME: &str = "Object";

#[derive(Debug, Clone)]
struct TypeDef {
    name: String,
    kind: TypeKind,
    superclass: Option<TypeId>,
    interfaces: Vec<TypeId>,
    component: Option<TypeId>,
    methods: Vec<Method>,
    fields: Vec<Field>,
    constructors: Vec<Constructor>,
}

impl TypeDef {
    fn new(name: String, kind: TypeKind) -> Self {
        Self {
            name,
            kind,
            superclass: None,
            interfaces: Vec::new(),
            component: None,
            methods: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryInner {
    types: Vec<TypeDef>,
    name_to_id: FxHashMap<String, TypeId>,
}

impl RegistryInner {
    fn get(&self, ty: TypeId) -> Option<&TypeDef> {
        self.types.get(ty.index())
    }

    fn push(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId::from_u32(self.types.len() as u32);
        self.name_to_id.insert(def.name.clone(), id);
        self.types.push(def);
        id
    }

    /// Public virtual methods visible through a class's vtable
    fn virtual_table(&self, ty: TypeId) -> Vec<Method> {
        let Some(def) = self.get(ty) else {
            return Vec::new();
        };
        let mut table = match def.superclass {
            Some(parent) => self.virtual_table(parent),
            None => Vec::new(),
        };

        for method in def.methods.iter().filter(|m| m.is_public() && !m.is_static()) {
            let slot = table.iter().position(|entry| {
                entry.declaring_type() != ty
                    && entry.matches(method.name(), method.parameter_types())
            });
            match slot {
                Some(index) => table[index] = method.clone(),
                None => table.push(method.clone()),
            }
        }

        let mut seen = FxHashSet::default();
        for intf in def.interfaces.clone() {
            self.fill_interface_slots(intf, &mut table, &mut seen);
        }
        table
    }

    fn fill_interface_slots(
        &self,
        intf: TypeId,
        table: &mut Vec<Method>,
        seen: &mut FxHashSet<TypeId>,
    ) {
        if !seen.insert(intf) {
            return;
        }
        let Some(def) = self.get(intf) else {
            return;
        };
        for method in def.methods.iter().filter(|m| m.is_public() && !m.is_static()) {
            let slot = table
                .iter()
                .position(|entry| entry.matches(method.name(), method.parameter_types()));
            match slot {
                None => table.push(method.clone()),
                // A default body fills a slot only an abstract interface method claimed
                Some(index)
                    if table[index].origin() == Origin::Interface
                        && table[index].is_abstract()
                        && !method.is_abstract() =>
                {
                    table[index] = method.clone();
                }
                Some(_) => {}
            }
        }
        for parent in &def.interfaces {
            self.fill_interface_slots(*parent, table, seen);
        }
    }

    /// Public static methods of a class and its superclasses, nearest first
    fn static_methods(&self, ty: TypeId) -> Vec<Method> {
        let mut statics: Vec<Method> = Vec::new();
        let mut current = Some(ty);
        while let Some(id) = current {
            let Some(def) = self.get(id) else {
                break;
            };
            for method in def.methods.iter().filter(|m| m.is_public() && m.is_static()) {
                let hidden = statics
                    .iter()
                    .any(|m| m.matches(method.name(), method.parameter_types()));
                if !hidden {
                    statics.push(method.clone());
                }
            }
            current = def.superclass;
        }
        statics
    }
}

/// Registry of types known to reflection
#[derive(Debug)]
pub struct TypeRegistry {
    inner: RwLock<RegistryInner>,
    root: TypeId,
}

impl TypeRegistry {
    /// Create a registry holding only the root class
    pub fn new() -> Self {
        let mut inner = RegistryInner::default();
        let root = inner.push(TypeDef::new(ROOT_CLASS_NAME.to_string(), TypeKind::Class));
        Self {
            inner: RwLock::new(inner),
            root,
        }
    }

    /// The root class
    pub fn root_class(&self) -> TypeId {
        self.root
    }

    /// Get or create the primitive type with this name
    pub fn primitive(&self, name: &str) -> TypeId {
        let mut inner = self.inner.write();
        if let Some(id) = inner.name_to_id.get(name) {
            return *id;
        }
        inner.push(TypeDef::new(name.to_string(), TypeKind::Primitive))
    }

    /// Register a class
    pub fn define_class(
        &self,
        name: &str,
        superclass: Option<TypeId>,
        interfaces: &[TypeId],
    ) -> TypeId {
        let mut def = TypeDef::new(name.to_string(), TypeKind::Class);
        def.superclass = superclass;
        def.interfaces = interfaces.to_vec();
        self.inner.write().push(def)
    }

    /// Register an interface extending `extends`
    pub fn define_interface(&self, name: &str, extends: &[TypeId]) -> TypeId {
        let mut def = TypeDef::new(name.to_string(), TypeKind::Interface);
        def.interfaces = extends.to_vec();
        self.inner.write().push(def)
    }

    /// Get or create the array type whose elements are `component`
    pub fn array_of(&self, component: TypeId) -> TypeId {
        let mut inner = self.inner.write();
        let name = match inner.get(component) {
            Some(def) => format!("{}[]", def.name),
            None => format!("{}[]", component),
        };
        if let Some(id) = inner.name_to_id.get(&name) {
            return *id;
        }
        let mut def = TypeDef::new(name, TypeKind::Array);
        def.superclass = Some(self.root);
        def.component = Some(component);
        inner.push(def)
    }

    /// Declare a method on `ty`. The origin follows the declaring type's kind.
    pub fn add_method(
        &self,
        ty: TypeId,
        name: &str,
        parameter_types: &[TypeId],
        return_type: TypeId,
        modifiers: Modifiers,
    ) {
        let mut inner = self.inner.write();
        if let Some(def) = inner.types.get_mut(ty.index()) {
            let origin = match def.kind {
                TypeKind::Interface => Origin::Interface,
                _ => Origin::Class,
            };
            def.methods
                .push(Method::new(name, parameter_types, return_type, ty, origin, modifiers));
        }
    }

    /// Declare a field on `ty`
    pub fn add_field(&self, ty: TypeId, name: &str, field_type: TypeId, modifiers: Modifiers) {
        let mut inner = self.inner.write();
        if let Some(def) = inner.types.get_mut(ty.index()) {
            def.fields.push(Field::new(name, field_type, ty, modifiers));
        }
    }

    /// Declare a constructor on `ty`
    pub fn add_constructor(&self, ty: TypeId, parameter_types: &[TypeId], modifiers: Modifiers) {
        let mut inner = self.inner.write();
        if let Some(def) = inner.types.get_mut(ty.index()) {
            def.constructors
                .push(Constructor::new(parameter_types, ty, modifiers));
        }
    }

    /// Remove every declared method named `name` from `ty`
    pub fn remove_methods(&self, ty: TypeId, name: &str) {
        let mut inner = self.inner.write();
        if let Some(def) = inner.types.get_mut(ty.index()) {
            def.methods.retain(|m| m.name() != name);
        }
    }

    /// Lookup a type by name
    pub fn get_by_name(&self, name: &str) -> Option<TypeId> {
        self.inner.read().name_to_id.get(name).copied()
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.inner.read().types.len()
    }

    /// A registry always holds the root class
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeGraph for TypeRegistry {
    fn kind(&self, ty: TypeId) -> Option<TypeKind> {
        self.inner.read().get(ty).map(|def| def.kind)
    }

    fn name(&self, ty: TypeId) -> String {
        match self.inner.read().get(ty) {
            Some(def) => def.name.clone(),
            None => ty.to_string(),
        }
    }

    fn superclass(&self, ty: TypeId) -> Option<TypeId> {
        self.inner.read().get(ty).and_then(|def| def.superclass)
    }

    fn interfaces(&self, ty: TypeId) -> Vec<TypeId> {
        self.inner
            .read()
            .get(ty)
            .map(|def| def.interfaces.clone())
            .unwrap_or_default()
    }

    fn component_type(&self, ty: TypeId) -> Option<TypeId> {
        self.inner.read().get(ty).and_then(|def| def.component)
    }
}

impl MemberIntrospector for TypeRegistry {
    fn snapshot(&self, ty: TypeId) -> Result<RawMembers, SnapshotRace> {
        let inner = self.inner.read();
        let Some(def) = inner.get(ty) else {
            return Ok(RawMembers::default());
        };

        // Every snapshot mints fresh member objects, as a native member
        // enumeration would.
        let dispatch_table = match def.kind {
            TypeKind::Class => inner
                .virtual_table(ty)
                .into_iter()
                .chain(inner.static_methods(ty))
                .map(Arc::new)
                .collect(),
            _ => Vec::new(),
        };

        Ok(RawMembers {
            dispatch_table,
            declared_methods: def.methods.iter().cloned().map(Arc::new).collect(),
            declared_fields: def.fields.iter().cloned().map(Arc::new).collect(),
            declared_constructors: def.constructors.iter().cloned().map(Arc::new).collect(),
        })
    }
}
