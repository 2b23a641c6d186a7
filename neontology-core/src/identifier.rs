//! Identifier grammar for labels, relationship types and property keys.
//!
//! Identifiers must start with an ASCII letter and continue with ASCII
//! letters, digits or underscores. Declaring a non-conforming name is a
//! warning, not an error; such names are backtick-quoted whenever they are
//! interpolated into Cypher.

use std::borrow::Cow;

/// Check whether `s` follows the identifier grammar.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return false,
    };

    if !first.is_ascii_alphabetic() {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Warn (once per call) when a declared name does not follow the grammar.
///
/// `kind` names what is being declared, e.g. `"label"` or `"relationship type"`.
/// Returns whether the identifier was valid.
pub fn check_identifier(kind: &str, s: &str) -> bool {
    let valid = is_valid_identifier(s);
    if !valid {
        tracing::warn!(kind, identifier = s, "identifier does not match ^[a-zA-Z][a-zA-Z0-9_]*$");
    }
    valid
}

/// Render an identifier for interpolation into Cypher.
///
/// Valid identifiers are returned unchanged. Anything else is wrapped in
/// backticks with embedded backticks doubled and control characters removed.
pub fn escape_identifier(s: &str) -> Cow<'_, str> {
    if is_valid_identifier(s) {
        return Cow::Borrowed(s);
    }

    let mut escaped = String::with_capacity(s.len() + 2);
    escaped.push('`');
    for c in s.chars().filter(|c| !c.is_control()) {
        if c == '`' {
            escaped.push_str("``");
        } else {
            escaped.push(c);
        }
    }
    escaped.push('`');
    Cow::Owned(escaped)
}
