//! Reflected members: methods, fields and constructors
//!
//! Members are immutable once produced. The cache keeps one canonical
//! `Arc` per member; everything handed to callers is a *copy* that points
//! back at its canonical root. Copies own their `accessible` flag, so
//! flipping it never reaches the cache, and two copies are the same member
//! exactly when they share a root (see [`Method::same_root`]).

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::types::TypeId;

/// Modifier flags for class members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Modifiers {
    /// Public visibility
    pub is_public: bool,
    /// Private visibility
    pub is_private: bool,
    /// Protected visibility
    pub is_protected: bool,
    /// Static member
    pub is_static: bool,
    /// Abstract member (no body)
    pub is_abstract: bool,
    /// Final member
    pub is_final: bool,
    /// Compiler-generated (bridges and the like)
    pub is_synthetic: bool,
}

impl Modifiers {
    /// Public, concrete, instance member
    pub fn public() -> Self {
        Self {
            is_public: true,
            ..Self::default()
        }
    }

    /// Private instance member
    pub fn private() -> Self {
        Self {
            is_private: true,
            ..Self::default()
        }
    }

    /// Public abstract member
    pub fn public_abstract() -> Self {
        Self {
            is_public: true,
            is_abstract: true,
            ..Self::default()
        }
    }

    /// Public static member
    pub fn public_static() -> Self {
        Self {
            is_public: true,
            is_static: true,
            ..Self::default()
        }
    }

    /// Mark as synthetic
    pub fn synthetic(mut self) -> Self {
        self.is_synthetic = true;
        self
    }

    /// Mark as final
    pub fn final_(mut self) -> Self {
        self.is_final = true;
        self
    }
}

/// Where a member was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// Declared by a class
    Class,
    /// Declared by an interface (abstract or default)
    Interface,
}

/// Overload identity of a method: name plus parameter types.
///
/// Return type and declaring type are deliberately not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodIdentity {
    name: Arc<str>,
    parameter_types: Arc<[TypeId]>,
}

impl MethodIdentity {
    /// Build an identity
    pub fn new(name: &str, parameter_types: &[TypeId]) -> Self {
        Self {
            name: Arc::from(name),
            parameter_types: Arc::from(parameter_types),
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types
    pub fn parameter_types(&self) -> &[TypeId] {
        &self.parameter_types
    }
}

/// Method information for reflection
#[derive(Debug, Clone)]
pub struct Method {
    name: Arc<str>,
    parameter_types: Arc<[TypeId]>,
    return_type: TypeId,
    declaring_type: TypeId,
    origin: Origin,
    modifiers: Modifiers,
    accessible: bool,
    root: Option<Arc<Method>>,
}

impl Method {
    /// Create a method as declared by `declaring_type`
    pub fn new(
        name: &str,
        parameter_types: &[TypeId],
        return_type: TypeId,
        declaring_type: TypeId,
        origin: Origin,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            name: Arc::from(name),
            parameter_types: Arc::from(parameter_types),
            return_type,
            declaring_type,
            origin,
            modifiers,
            accessible: false,
            root: None,
        }
    }

    /// Method name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> &[TypeId] {
        &self.parameter_types
    }

    /// Return type
    pub fn return_type(&self) -> TypeId {
        self.return_type
    }

    /// Type that declares this method
    pub fn declaring_type(&self) -> TypeId {
        self.declaring_type
    }

    /// Whether the declarer is a class or an interface
    pub fn origin(&self) -> Origin {
        self.origin
    }

    /// Modifier flags
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Shorthand for `modifiers().is_public`
    pub fn is_public(&self) -> bool {
        self.modifiers.is_public
    }

    /// Shorthand for `modifiers().is_static`
    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    /// Shorthand for `modifiers().is_abstract`
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract
    }

    /// Concrete method declared on an interface
    pub fn is_default(&self) -> bool {
        self.origin == Origin::Interface && !self.modifiers.is_abstract && !self.modifiers.is_static
    }

    /// Identity used for override resolution
    pub fn identity(&self) -> MethodIdentity {
        MethodIdentity {
            name: self.name.clone(),
            parameter_types: self.parameter_types.clone(),
        }
    }

    /// Whether name and parameter types match
    pub fn matches(&self, name: &str, parameter_types: &[TypeId]) -> bool {
        &*self.name == name && &*self.parameter_types == parameter_types
    }

    /// Per-copy accessibility override
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Set the per-copy accessibility override
    pub fn set_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }
}

/// Field information for reflection
#[derive(Debug, Clone)]
pub struct Field {
    name: Arc<str>,
    field_type: TypeId,
    declaring_type: TypeId,
    modifiers: Modifiers,
    accessible: bool,
    root: Option<Arc<Field>>,
}

impl Field {
    /// Create a field as declared by `declaring_type`
    pub fn new(
        name: &str,
        field_type: TypeId,
        declaring_type: TypeId,
        modifiers: Modifiers,
    ) -> Self {
        Self {
            name: Arc::from(name),
            field_type,
            declaring_type,
            modifiers,
            accessible: false,
            root: None,
        }
    }

    /// Field name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type of the field
    pub fn field_type(&self) -> TypeId {
        self.field_type
    }

    /// Type that declares this field
    pub fn declaring_type(&self) -> TypeId {
        self.declaring_type
    }

    /// Modifier flags
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Shorthand for `modifiers().is_public`
    pub fn is_public(&self) -> bool {
        self.modifiers.is_public
    }

    /// Per-copy accessibility override
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Set the per-copy accessibility override
    pub fn set_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }
}

/// Constructor information for reflection
#[derive(Debug, Clone)]
pub struct Constructor {
    parameter_types: Arc<[TypeId]>,
    declaring_type: TypeId,
    modifiers: Modifiers,
    accessible: bool,
    root: Option<Arc<Constructor>>,
}

impl Constructor {
    /// Create a constructor of `declaring_type`
    pub fn new(parameter_types: &[TypeId], declaring_type: TypeId, modifiers: Modifiers) -> Self {
        Self {
            parameter_types: Arc::from(parameter_types),
            declaring_type,
            modifiers,
            accessible: false,
            root: None,
        }
    }

    /// Parameter types in declaration order
    pub fn parameter_types(&self) -> &[TypeId] {
        &self.parameter_types
    }

    /// Type constructed
    pub fn declaring_type(&self) -> TypeId {
        self.declaring_type
    }

    /// Modifier flags
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Shorthand for `modifiers().is_public`
    pub fn is_public(&self) -> bool {
        self.modifiers.is_public
    }

    /// Per-copy accessibility override
    pub fn is_accessible(&self) -> bool {
        self.accessible
    }

    /// Set the per-copy accessibility override
    pub fn set_accessible(&mut self, accessible: bool) {
        self.accessible = accessible;
    }
}

// ============================================================================
// Copy semantics
// ============================================================================

macro_rules! impl_copy_semantics {
    ($ty:ident) => {
        impl $ty {
            /// Produce a caller-owned copy of a canonical member. The copy keeps
            /// its root alive and starts out inaccessible.
            pub fn copy(canonical: &Arc<$ty>) -> $ty {
                let root = canonical.root.clone().unwrap_or_else(|| canonical.clone());
                $ty {
                    accessible: false,
                    root: Some(root),
                    ..(**canonical).clone()
                }
            }

            /// Canonical instance this copy was made from
            pub fn root(&self) -> Option<&Arc<$ty>> {
                self.root.as_ref()
            }

            /// Whether both values are (copies of) the same canonical instance
            pub fn same_root(&self, other: &$ty) -> bool {
                std::ptr::eq(self.root_ptr(), other.root_ptr())
            }

            fn root_ptr(&self) -> *const $ty {
                match &self.root {
                    Some(root) => Arc::as_ptr(root),
                    None => self as *const $ty,
                }
            }
        }
    };
}

impl_copy_semantics!(Method);
impl_copy_semantics!(Field);
impl_copy_semantics!(Constructor);

// Equality follows the reflective notion of "same member": declarer, name
// and signature. Modifiers, accessibility and roots are ignored.

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type
            && self.name == other.name
            && self.return_type == other.return_type
            && self.parameter_types == other.parameter_types
    }
}

impl Eq for Method {}

impl Hash for Method {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaring_type.hash(state);
        self.name.hash(state);
        self.parameter_types.hash(state);
        self.return_type.hash(state);
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type
            && self.name == other.name
            && self.field_type == other.field_type
    }
}

impl Eq for Field {}

impl Hash for Field {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.declaring_type.hash(state);
        self.name.hash(state);
        self.field_type.hash(state);
    }
}

impl PartialEq for Constructor {
    fn eq(&self, other: &Self) -> bool {
        self.declaring_type == other.declaring_type && self.parameter_types == other.parameter_types
    }
}

impl Eq for Constructor {}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}(", self.declaring_type, self.name)?;
        for (i, param) in self.parameter_types.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", param)?;
        }
        write!(f, "): {}", self.return_type)
    }
}
