//! Name and type resolution policy.
//!
//! Both halves are pluggable: the builder only talks to the
//! [`TypeNameProvider`] trait, and code emitters only to
//! [`ObjectNameProvider`].

mod naming;
mod type_mapping;

pub use naming::{
    DefaultObjectNameProvider, ObjectNameProvider, cleanup, is_reserved_keyword,
    upper_to_lower_camel_case,
};
pub use type_mapping::{
    ClrType, ClrTypeNameProvider, SqlType, TypeNameProvider, type_name_can_be_nullable,
};

/// Fallback target type when a provider has no mapping.
pub const FALLBACK_TYPE_NAME: &str = "object";
