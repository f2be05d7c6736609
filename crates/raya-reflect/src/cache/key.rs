//! Cache keys

use std::fmt;
use std::sync::Arc;

use crate::member::{Constructor, Field, Method};
use crate::types::TypeId;

/// Whole-type answers stored under a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateKind {
    PublicMethods,
    DeclaredMethods,
    PublicFields,
    DeclaredFields,
    PublicConstructors,
    DeclaredConstructors,
}

/// Key of one entry in a per-type [`ReflectCache`](super::ReflectCache).
///
/// A `None` type in a field or method key is an alias that matches any
/// declared type or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Field {
        name: Arc<str>,
        field_type: Option<TypeId>,
    },
    Method {
        name: Arc<str>,
        parameter_types: Arc<[TypeId]>,
        return_type: Option<TypeId>,
    },
    Constructor {
        parameter_types: Arc<[TypeId]>,
    },
    DeclaredPublicMethods {
        name: Arc<str>,
        parameter_types: Arc<[TypeId]>,
    },
    Aggregate(AggregateKind),
}

impl CacheKey {
    pub fn field(name: &str, field_type: Option<TypeId>) -> Self {
        CacheKey::Field {
            name: Arc::from(name),
            field_type,
        }
    }

    pub fn method(name: &str, parameter_types: &[TypeId], return_type: Option<TypeId>) -> Self {
        CacheKey::Method {
            name: Arc::from(name),
            parameter_types: Arc::from(parameter_types),
            return_type,
        }
    }

    pub fn constructor(parameter_types: &[TypeId]) -> Self {
        CacheKey::Constructor {
            parameter_types: Arc::from(parameter_types),
        }
    }

    pub fn declared_public_methods(name: &str, parameter_types: &[TypeId]) -> Self {
        CacheKey::DeclaredPublicMethods {
            name: Arc::from(name),
            parameter_types: Arc::from(parameter_types),
        }
    }

    /// Exact key of a canonical method
    pub fn of_method(method: &Method) -> Self {
        Self::method(method.name(), method.parameter_types(), Some(method.return_type()))
    }

    /// Exact key of a canonical field
    pub fn of_field(field: &Field) -> Self {
        Self::field(field.name(), Some(field.field_type()))
    }

    pub fn of_constructor(constructor: &Constructor) -> Self {
        Self::constructor(constructor.parameter_types())
    }

    /// Whether this key names a whole-type list
    pub fn is_aggregate(&self) -> bool {
        matches!(
            self,
            CacheKey::Aggregate(_) | CacheKey::DeclaredPublicMethods { .. }
        )
    }
}

fn write_params(f: &mut fmt::Formatter<'_>, params: &[TypeId]) -> fmt::Result {
    write!(f, "(")?;
    for (i, param) in params.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", param)?;
    }
    write!(f, ")")
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Field { name, field_type } => match field_type {
                Some(ty) => write!(f, "field {}: {}", name, ty),
                None => write!(f, "field {}", name),
            },
            CacheKey::Method {
                name,
                parameter_types,
                return_type,
            } => {
                write!(f, "method {}", name)?;
                write_params(f, parameter_types)?;
                match return_type {
                    Some(ret) => write!(f, " -> {}", ret),
                    None => Ok(()),
                }
            }
            CacheKey::Constructor { parameter_types } => {
                write!(f, "constructor")?;
                write_params(f, parameter_types)
            }
            CacheKey::DeclaredPublicMethods {
                name,
                parameter_types,
            } => {
                write!(f, "declared public methods {}", name)?;
                write_params(f, parameter_types)
            }
            CacheKey::Aggregate(kind) => write!(f, "{:?}", kind),
        }
    }
}
