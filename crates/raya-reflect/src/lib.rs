//! Raya Reflection
//!
//! Reflective member resolution for the Raya VM, with a concurrent,
//! softly-held member cache.
//!
//! This crate provides:
//! - Override and hiding rules between same-identity methods
//! - Method set resolution across single class inheritance and multiple
//!   interface inheritance (defaults, diamonds, covariant returns)
//! - Field lookup with shadowing by declared type
//! - Per-type reflection caches backed by a generation-checked soft heap
//! - A query front end that hands out caller-owned member copies
//!
//! # Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use raya_reflect::{Modifiers, ReflectConfig, Reflector, TypeRegistry};
//!
//! let registry = Arc::new(TypeRegistry::new());
//! let void = registry.primitive("void");
//! let shape = registry.define_class("Shape", Some(registry.root_class()), &[]);
//! registry.add_method(shape, "draw", &[], void, Modifiers::public());
//!
//! let reflector = Reflector::for_registry(registry, ReflectConfig::default());
//! let draw = reflector.get_method(shape, "draw", &[])?;
//! ```

#![warn(rust_2018_idioms)]

pub mod cache;
pub mod config;
pub mod error;
pub mod introspect;
pub mod member;
pub mod override_rules;
pub mod query;
pub mod registry;
pub mod resolution;
pub mod types;

pub use cache::{AggregateKind, CacheDirectory, CacheKey, ReflectCache, SoftHeap};
pub use config::{AmbiguityPolicy, OverrideSemantics, ReflectConfig};
pub use error::{ReflectError, ReflectResult};
pub use introspect::{AccessFilter, AllowAll, MemberIntrospector, RawMembers, SnapshotRace};
pub use member::{Constructor, Field, Method, MethodIdentity, Modifiers, Origin};
pub use override_rules::{OverrideResolver, Specificity};
pub use query::{Query, Resolved, Reflector};
pub use registry::TypeRegistry;
pub use resolution::{MethodGroup, MethodSet, ResolutionEngine};
pub use types::{TypeGraph, TypeId, TypeKind};
