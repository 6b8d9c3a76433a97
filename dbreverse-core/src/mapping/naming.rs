//! Canonical identifiers for generated code.
//!
//! Names are derived from catalog names by stripping every non-word character.
//! Schema prefixes are only added for objects outside `dbo`, and only when the
//! provider is configured to include them.

use crate::models::{Parameter, ResultColumn, StoredProcedure, Table};
use regex::Regex;
use std::sync::OnceLock;

const DEFAULT_SCHEMA: &str = "dbo";

/// C# keywords that must be escaped with `@` when used as identifiers.
const RESERVED_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

// The pattern is a literal; a compile failure is a programming error.
#[allow(clippy::expect_used)]
fn non_word() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w]").expect("Invalid non-word pattern"))
}

/// Removes every non-word character from a catalog name.
///
/// # Example
/// ```rust
/// use dbreverse_core::mapping::cleanup;
///
/// assert_eq!(cleanup("Order Details"), "OrderDetails");
/// assert_eq!(cleanup("usp-Get#Orders"), "uspGetOrders");
/// ```
pub fn cleanup(input: &str) -> String {
    non_word().replace_all(input, "").into_owned()
}

/// Lowercases the first character, leaving the rest untouched.
pub fn upper_to_lower_camel_case(input: &str) -> String {
    let mut chars = input.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Returns true if `name` is a reserved C# keyword.
pub fn is_reserved_keyword(name: &str) -> bool {
    RESERVED_KEYWORDS.contains(&name)
}

/// Produces identifiers for the classes, methods and members emitted from
/// the model.
pub trait ObjectNameProvider: Send + Sync + std::fmt::Debug {
    /// Class name for a table or table type.
    fn table_class_name(&self, table: &Table) -> String;

    /// Class name for the first result set of a stored procedure.
    fn result_set_class_name(&self, procedure: &StoredProcedure) -> String;

    /// Class name of the mapper that builds result set instances from records.
    fn result_set_mapper_class_name(&self, result_set_class_name: &str) -> String {
        format!("{result_set_class_name}Mapper")
    }

    /// Property name for a result set column.
    fn result_set_column_property_name(&self, column: &ResultColumn) -> String;

    /// Method name for calling a stored procedure.
    fn stored_procedure_method_name(&self, procedure: &StoredProcedure) -> String;

    /// Argument name for a stored procedure parameter.
    fn parameter_name(&self, parameter: &Parameter) -> String;
}

/// Default naming rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultObjectNameProvider {
    /// Prefix names of objects outside `dbo` with their schema (default false)
    pub include_schema: bool,
}

impl DefaultObjectNameProvider {
    /// Creates a provider, optionally prefixing non-`dbo` names with the schema.
    pub fn new(include_schema: bool) -> Self {
        Self { include_schema }
    }

    fn qualified(&self, schema: &str, name: &str) -> String {
        let name = cleanup(name);
        if self.include_schema && !schema.is_empty() && schema != DEFAULT_SCHEMA {
            format!("{}_{}", cleanup(schema), name)
        } else {
            name
        }
    }
}

impl ObjectNameProvider for DefaultObjectNameProvider {
    fn table_class_name(&self, table: &Table) -> String {
        self.qualified(&table.schema, &table.name)
    }

    fn result_set_class_name(&self, procedure: &StoredProcedure) -> String {
        format!("{}Result", self.qualified(&procedure.schema, &procedure.name))
    }

    fn result_set_column_property_name(&self, column: &ResultColumn) -> String {
        match column.name.as_deref() {
            Some(name) if !name.is_empty() => cleanup(name),
            _ => format!("Column{ordinal}", ordinal = column.ordinal),
        }
    }

    fn stored_procedure_method_name(&self, procedure: &StoredProcedure) -> String {
        self.qualified(&procedure.schema, &procedure.name)
    }

    fn parameter_name(&self, parameter: &Parameter) -> String {
        let name = parameter
            .name
            .strip_prefix('@')
            .unwrap_or(&parameter.name);
        let name = upper_to_lower_camel_case(&cleanup(name));
        if is_reserved_keyword(&name) {
            format!("@{name}")
        } else {
            name
        }
    }
}
