//! SQL identifier and literal rendering
//!
//! Every identifier and value the engine splices into SQL goes through these
//! helpers so that user data can never terminate a literal or identifier.

use crate::relation::Value;

/// Quote a SQL identifier, doubling embedded double quotes.
///
/// # Examples
/// ```
/// use sf_core::sql_utils::quote_ident;
/// assert_eq!(quote_ident("users"), r#""users""#);
/// assert_eq!(quote_ident(r#"my"table"#), r#""my""table""#);
/// ```
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a potentially schema-qualified name (e.g. `schema.table`).
///
/// # Examples
/// ```
/// use sf_core::sql_utils::quote_qualified;
/// assert_eq!(quote_qualified("users"), r#""users""#);
/// assert_eq!(quote_qualified("snapshots.orders"), r#""snapshots"."orders""#);
/// ```
pub fn quote_qualified(name: &str) -> String {
    name.split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a potentially schema-qualified name into (schema, table).
///
/// Uses the last `.` as the separator; unqualified names live in `main`.
///
/// # Examples
/// ```
/// use sf_core::sql_utils::split_qualified_name;
/// assert_eq!(split_qualified_name("users"), ("main", "users"));
/// assert_eq!(split_qualified_name("snapshots.orders"), ("snapshots", "orders"));
/// ```
pub fn split_qualified_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("main", name),
    }
}

/// Escape a value for use inside a single-quoted SQL string literal
pub fn escape_sql_string(value: &str) -> String {
    value.replace('\'', "''")
}

/// Render a string as a single-quoted SQL literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_sql_string(value))
}

/// Render a canonical text value as a literal of the given SQL type.
///
/// `NULL` stays untyped; text columns skip the cast.
///
/// # Examples
/// ```
/// use sf_core::sql_utils::typed_literal;
/// assert_eq!(typed_literal(&None, "INTEGER"), "NULL");
/// assert_eq!(typed_literal(&Some("7".into()), "INTEGER"), "CAST('7' AS INTEGER)");
/// assert_eq!(typed_literal(&Some("O'Hara".into()), "VARCHAR"), "'O''Hara'");
/// ```
pub fn typed_literal(value: &Value, data_type: &str) -> String {
    match value {
        None => "NULL".to_string(),
        Some(text) if is_text_type(data_type) => quote_literal(text),
        Some(text) => format!("CAST({} AS {})", quote_literal(text), data_type),
    }
}

/// Whether a declared type is a plain character type that needs no cast
fn is_text_type(data_type: &str) -> bool {
    let upper = data_type.trim().to_ascii_uppercase();
    matches!(upper.as_str(), "VARCHAR" | "TEXT" | "STRING" | "CHAR" | "BPCHAR")
        || upper.starts_with("VARCHAR(")
}
