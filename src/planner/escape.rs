//! Identifier and literal quoting
//!
//! Every user-supplied name or value that reaches plan text passes through
//! one of these functions. Nothing else in the crate concatenates user
//! input into a plan.

/// Quotes an identifier: `sales` -> `"sales"`, `a"b` -> `"a""b"`.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quotes a string literal: `east` -> `'east'`, `it's` -> `'it''s'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Escapes LIKE metacharacters so `value` matches literally.
///
/// Backslash is the escape character, so it is escaped first.
pub fn escape_like_pattern(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}
