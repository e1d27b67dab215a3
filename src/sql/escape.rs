use crate::error::{PgTxError, Result};

/// Escapes `text` for interpolation inside a single-quoted SQL string literal.
///
/// Single quotes are doubled. Backslashes are doubled only when the server runs
/// with `standard_conforming_strings = off`. The surrounding quotes are not added.
/// A PostgreSQL string cannot hold NUL, so copying stops at the first one.
pub fn escape_string(text: &str, standard_conforming_strings: bool) -> Result<String> {
    // worst case every character is doubled
    let mut escaped = String::with_capacity(text.len() * 2 + 1);
    for c in text.chars().take_while(|&c| c != '\0') {
        match c {
            '\'' => escaped.push_str("''"),
            '\\' if !standard_conforming_strings => escaped.push_str("\\\\"),
            _ => escaped.push(c),
        }
    }
    Ok(escaped)
}

/// Quotes `name` as a SQL identifier, doubling embedded double quotes.
pub fn quote_identifier(name: &str) -> Result<String> {
    if name.contains('\0') {
        return Err(PgTxError::argument(
            "invalid identifier: string contains a NUL byte",
        ));
    }
    let mut quoted = String::with_capacity(name.len() + 2);
    quoted.push('"');
    quoted.push_str(&name.replace('"', "\"\""));
    quoted.push('"');
    Ok(quoted)
}
