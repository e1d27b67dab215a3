use std::borrow::Cow;

/// Rewrites `?` placeholders into PostgreSQL positional placeholders (`$1`, `$2`, ...).
///
/// Quoted literals, quoted identifiers, dollar-quoted bodies and comments are copied
/// untouched. SQL that already uses `$n` placeholders is returned as is, so `?`
/// operators (e.g. jsonb `?|`) survive when written alongside native placeholders.
pub fn normalize_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('?') {
        return Cow::Borrowed(sql);
    }

    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut out = String::with_capacity(len + 8);
    let mut copied = 0;
    let mut index = 0;
    let mut i = 0;

    while i < len {
        match bytes[i] {
            b'\'' => {
                let backslash_escapes = i > 0 && matches!(bytes[i - 1], b'E' | b'e');
                i = skip_quoted(bytes, i, b'\'', backslash_escapes);
            }
            b'"' => i = skip_quoted(bytes, i, b'"', false),
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                i = sql[i..].find('\n').map_or(len, |p| i + p + 1);
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i = sql[i + 2..].find("*/").map_or(len, |p| i + 2 + p + 2);
            }
            b'$' => {
                if bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
                    return Cow::Borrowed(sql);
                }
                match dollar_tag_end(bytes, i) {
                    Some(tag_end) => {
                        let tag = &sql[i..tag_end];
                        i = sql[tag_end..]
                            .find(tag)
                            .map_or(len, |p| tag_end + p + tag.len());
                    }
                    None => i += 1,
                }
            }
            b'?' => {
                index += 1;
                out.push_str(&sql[copied..i]);
                out.push('$');
                out.push_str(&index.to_string());
                i += 1;
                copied = i;
            }
            _ => i += 1,
        }
    }

    if index == 0 {
        return Cow::Borrowed(sql);
    }
    out.push_str(&sql[copied..]);
    Cow::Owned(out)
}

/// Returns the index just past the closing quote, or the end of input.
fn skip_quoted(bytes: &[u8], start: usize, quote: u8, backslash_escapes: bool) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        let b = bytes[i];
        if backslash_escapes && b == b'\\' {
            i += 2;
            continue;
        }
        if b == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

/// Recognizes an opening dollar-quote tag (`$$` or `$tag$`) at `start`.
fn dollar_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    if start > 0 && (bytes[start - 1].is_ascii_alphanumeric() || bytes[start - 1] == b'_') {
        return None;
    }
    let mut i = start + 1;
    match bytes.get(i) {
        Some(b'$') => return Some(i + 1),
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return None,
    }
    while let Some(b) = bytes.get(i) {
        match b {
            b'$' => return Some(i + 1),
            b if b.is_ascii_alphanumeric() || *b == b'_' => i += 1,
            _ => return None,
        }
    }
    None
}
