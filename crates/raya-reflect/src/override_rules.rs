//! Override and hiding rules between two members sharing an identity

use crate::config::OverrideSemantics;
use crate::member::{Method, Origin};
use crate::types::TypeGraph;

/// Outcome of comparing two same-identity methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specificity {
    /// The first method wins
    A,
    /// The second method wins
    B,
    /// Unrelated declarations; both stay visible
    Neither,
}

/// Pure comparison of method declarations under the platform's override rules
#[derive(Clone, Copy)]
pub struct OverrideResolver<'a> {
    graph: &'a dyn TypeGraph,
    semantics: OverrideSemantics,
}

impl<'a> OverrideResolver<'a> {
    /// Create a resolver over `graph`
    pub fn new(graph: &'a dyn TypeGraph, semantics: OverrideSemantics) -> Self {
        Self { graph, semantics }
    }

    /// Decide which of two same-identity methods is more specific.
    ///
    /// Declarations from the same type are covariant duplicates and are
    /// settled by return type: a strict subtype return wins, otherwise the
    /// incumbent `b` stays.
    pub fn more_specific(&self, a: &Method, b: &Method) -> Specificity {
        if a.declaring_type() == b.declaring_type() {
            return self.covariant_tie_break(a, b);
        }
        if self.overrides(a, b) {
            Specificity::A
        } else if self.overrides(b, a) {
            Specificity::B
        } else {
            Specificity::Neither
        }
    }

    /// Whether `a` overrides or hides `b`
    pub fn overrides(&self, a: &Method, b: &Method) -> bool {
        let a_interface = a.origin() == Origin::Interface;
        let b_interface = b.origin() == Origin::Interface;

        // A concrete class method always implements an abstract interface method
        if b.is_abstract() && b_interface && !a.is_abstract() && !a_interface {
            return true;
        }
        if !self.graph.is_assignable_from(b.declaring_type(), a.declaring_type()) {
            return false;
        }
        match self.semantics {
            OverrideSemantics::Modern => true,
            OverrideSemantics::Legacy => !a_interface || !a.is_abstract(),
        }
    }

    fn covariant_tie_break(&self, a: &Method, b: &Method) -> Specificity {
        let (a_ret, b_ret) = (a.return_type(), b.return_type());
        if a_ret != b_ret && self.graph.is_assignable_from(b_ret, a_ret) {
            Specificity::A
        } else {
            Specificity::B
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::member::Modifiers;
    use crate::registry::TypeRegistry;
    use crate::types::TypeId;

    struct Fixture {
        registry: TypeRegistry,
        void: TypeId,
        base: TypeId,
        derived: TypeId,
        outer: TypeId,
        inner: TypeId,
        other: TypeId,
    }

    fn fixture() -> Fixture {
        let registry = TypeRegistry::new();
        let void = registry.primitive("void");
        let outer = registry.define_interface("Outer", &[]);
        let inner = registry.define_interface("Inner", &[outer]);
        let other = registry.define_interface("Other", &[]);
        let base = registry.define_class("Base", Some(registry.root_class()), &[]);
        let derived = registry.define_class("Derived", Some(base), &[]);
        Fixture {
            registry,
            void,
            base,
            derived,
            outer,
            inner,
            other,
        }
    }

    fn method(declarer: TypeId, origin: Origin, modifiers: Modifiers, ret: TypeId) -> Method {
        Method::new("m", &[], ret, declarer, origin, modifiers)
    }

    #[test]
    fn test_concrete_beats_interface_abstract() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        let concrete = method(f.base, Origin::Class, Modifiers::public(), f.void);
        let abstract_ = method(f.other, Origin::Interface, Modifiers::public_abstract(), f.void);

        assert_eq!(resolver.more_specific(&concrete, &abstract_), Specificity::A);
        assert_eq!(resolver.more_specific(&abstract_, &concrete), Specificity::B);
    }

    #[test]
    fn test_subclass_beats_superclass() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        let sup = method(f.base, Origin::Class, Modifiers::public(), f.void);
        let sub = method(f.derived, Origin::Class, Modifiers::public(), f.void);

        assert_eq!(resolver.more_specific(&sub, &sup), Specificity::A);
        assert_eq!(resolver.more_specific(&sup, &sub), Specificity::B);
    }

    #[test]
    fn test_unrelated_defaults_are_siblings() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        let left = method(f.outer, Origin::Interface, Modifiers::public(), f.void);
        let right = method(f.other, Origin::Interface, Modifiers::public(), f.void);

        assert_eq!(resolver.more_specific(&left, &right), Specificity::Neither);
    }

    #[test]
    fn test_subinterface_default_beats_superinterface() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Legacy);
        let sup = method(f.outer, Origin::Interface, Modifiers::public(), f.void);
        let sub = method(f.inner, Origin::Interface, Modifiers::public(), f.void);

        assert_eq!(resolver.more_specific(&sub, &sup), Specificity::A);
    }

    #[test]
    fn test_abstract_hiding_depends_on_semantics() {
        let f = fixture();
        let sup = method(f.outer, Origin::Interface, Modifiers::public_abstract(), f.void);
        let sub = method(f.inner, Origin::Interface, Modifiers::public_abstract(), f.void);

        let modern = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        assert_eq!(modern.more_specific(&sub, &sup), Specificity::A);

        let legacy = OverrideResolver::new(&f.registry, OverrideSemantics::Legacy);
        assert_eq!(legacy.more_specific(&sub, &sup), Specificity::Neither);
    }

    #[test]
    fn test_covariant_return_prefers_subtype() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        let narrow = method(f.derived, Origin::Class, Modifiers::public(), f.derived);
        let wide = method(f.derived, Origin::Class, Modifiers::public().synthetic(), f.base);

        assert_eq!(resolver.more_specific(&narrow, &wide), Specificity::A);
        assert_eq!(resolver.more_specific(&wide, &narrow), Specificity::B);
    }

    #[test]
    fn test_covariant_unrelated_keeps_incumbent() {
        let f = fixture();
        let resolver = OverrideResolver::new(&f.registry, OverrideSemantics::Modern);
        let first = method(f.derived, Origin::Class, Modifiers::public(), f.outer);
        let second = method(f.derived, Origin::Class, Modifiers::public(), f.other);

        assert_eq!(resolver.more_specific(&second, &first), Specificity::B);
        assert_eq!(resolver.more_specific(&first, &second), Specificity::B);
    }
}
