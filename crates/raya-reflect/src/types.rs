//! Type handles and the type graph contract
//!
//! Reflection never owns types. It addresses them through [`TypeId`] handles
//! and asks a [`TypeGraph`] for the shape of the hierarchy: the superclass,
//! the directly implemented interfaces, and what kind of type a handle names.

use std::fmt;

use rustc_hash::FxHashSet;

/// Opaque handle to a type known to the surrounding runtime
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(u32);

impl TypeId {
    /// Create a handle from its raw index
    pub const fn from_u32(id: u32) -> Self {
        TypeId(id)
    }

    /// Get the raw index
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Type kind enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Primitive types (int, boolean, void, ...)
    Primitive,
    /// Class types (single inheritance)
    Class,
    /// Interface types (multiple inheritance)
    Interface,
    /// Array types
    Array,
}

impl TypeKind {
    /// Leaf kinds never carry declared members of their own
    pub fn is_degenerate(self) -> bool {
        matches!(self, TypeKind::Primitive | TypeKind::Array)
    }
}

/// Read-only view of the runtime's type hierarchy.
///
/// Implementations must be safe to query from many threads at once.
pub trait TypeGraph: Send + Sync {
    /// Kind of the type, or `None` for an unknown handle
    fn kind(&self, ty: TypeId) -> Option<TypeKind>;

    /// Human-readable name, used in errors and logs
    fn name(&self, ty: TypeId) -> String;

    /// Direct superclass. Interfaces, primitives and the root class have none.
    fn superclass(&self, ty: TypeId) -> Option<TypeId>;

    /// Directly implemented (or, for interfaces, extended) interfaces in
    /// declaration order
    fn interfaces(&self, ty: TypeId) -> Vec<TypeId>;

    /// Element type of an array type
    fn component_type(&self, ty: TypeId) -> Option<TypeId>;

    /// Whether a value of type `sub` can be assigned to `sup`, i.e. `sub`
    /// is `sup` or one of its subtypes.
    fn is_assignable_from(&self, sup: TypeId, sub: TypeId) -> bool {
        if sup == sub {
            return true;
        }
        let mut visited = FxHashSet::default();
        let mut pending = vec![sub];
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(parent) = self.superclass(current) {
                if parent == sup {
                    return true;
                }
                pending.push(parent);
            }
            for intf in self.interfaces(current) {
                if intf == sup {
                    return true;
                }
                pending.push(intf);
            }
        }
        false
    }

    /// Whether the handle names an interface
    fn is_interface(&self, ty: TypeId) -> bool {
        self.kind(ty) == Some(TypeKind::Interface)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_id_roundtrip() {
        let id = TypeId::from_u32(7);
        assert_eq!(id.as_u32(), 7);
        assert_eq!(id.to_string(), "#7");
    }

    #[test]
    fn test_degenerate_kinds() {
        assert!(TypeKind::Primitive.is_degenerate());
        assert!(TypeKind::Array.is_degenerate());
        assert!(!TypeKind::Class.is_degenerate());
        assert!(!TypeKind::Interface.is_degenerate());
    }
}
