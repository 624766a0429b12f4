//! Quote/comment-aware scanning primitives.
//!
//! Placeholder syntax inside string literals, quoted identifiers and comments is never
//! interpreted. Unterminated spans run to the end of input instead of failing.

/// Return the index to resume scanning from when `pos` starts a quoted string, quoted
/// identifier, `--` line comment or `/* */` block comment; otherwise return `pos` unchanged.
///
/// - `'...'` with `''` as an escaped quote
/// - `"..."` with `""` as an escaped quote
/// - `-- ...` up to and including the next newline
/// - `/* ... */` up to and including the closing `*/`
pub fn skip_quoted_or_comment(sql: &[u8], pos: usize) -> usize {
    let len = sql.len();
    if pos >= len {
        return pos;
    }

    match sql[pos] {
        quote @ (b'\'' | b'"') => {
            let mut i = pos + 1;
            while i < len {
                if sql[i] == quote {
                    if i + 1 < len && sql[i + 1] == quote {
                        i += 2;
                        continue;
                    }
                    return i + 1;
                }
                i += 1;
            }
            len
        }
        b'-' if sql.get(pos + 1) == Some(&b'-') => {
            match sql[pos + 2..].iter().position(|&b| b == b'\n') {
                Some(offset) => pos + 2 + offset + 1,
                None => len,
            }
        }
        b'/' if sql.get(pos + 1) == Some(&b'*') => {
            let mut i = pos + 2;
            while i + 1 < len {
                if sql[i] == b'*' && sql[i + 1] == b'/' {
                    return i + 2;
                }
                i += 1;
            }
            len
        }
        _ => pos,
    }
}

/// Skip only quoted spans (`'...'` / `"..."`), leaving comments visible.
///
/// Used inside `{...}` placeholder bodies where `--` may legitimately appear.
pub(crate) fn skip_quoted(sql: &[u8], pos: usize) -> usize {
    match sql.get(pos) {
        Some(b'\'' | b'"') => skip_quoted_or_comment(sql, pos),
        _ => pos,
    }
}

fn is_word_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Case-insensitive check that `text` starts with `keyword` as a whole word.
pub fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    match text.get(0..keyword.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(keyword) => text
            .as_bytes()
            .get(keyword.len())
            .is_none_or(|&b| !is_word_byte(b)),
        _ => false,
    }
}

/// Case-insensitive check that `text` (ignoring trailing whitespace) ends with `keyword` as a
/// whole word.
pub fn ends_with_keyword(text: &str, keyword: &str) -> bool {
    let text = text.trim_end();
    if text.len() < keyword.len() {
        return false;
    }
    let start = text.len() - keyword.len();
    match text.get(start..) {
        Some(suffix) if suffix.eq_ignore_ascii_case(keyword) => start == 0
            || !is_word_byte(text.as_bytes()[start - 1]),
        _ => false,
    }
}

/// Whether `keyword` occurs as a whole word in the scope that is open at the end of `sql`: the
/// last statement (after the last top-level `;`), at the parenthesis depth where `sql` ends.
/// Quotes, comments and closed subqueries are skipped.
pub fn last_statement_contains_keyword(sql: &str, keyword: &str) -> bool {
    let bytes = sql.as_bytes();
    let mut outer: Vec<bool> = Vec::new();
    let mut found = false;
    let mut i = 0;
    while i < bytes.len() {
        let next = skip_quoted_or_comment(bytes, i);
        if next != i {
            i = next;
            continue;
        }

        match bytes[i] {
            b'(' => {
                outer.push(found);
                found = false;
            }
            b')' => found = outer.pop().unwrap_or(false),
            b';' if outer.is_empty() => found = false,
            _ => {
                if !found
                    && (i == 0 || !is_word_byte(bytes[i - 1]))
                    && sql.get(i..).is_some_and(|rest| starts_with_keyword(rest, keyword))
                {
                    found = true;
                }
            }
        }
        i += 1;
    }
    found
}

/// Rewrite `?` placeholders outside quotes and comments as PostgreSQL `$1, $2, ...`.
pub fn number_placeholders(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut pos = 0;
    let mut i = 0;
    let mut n = 0;
    while i < bytes.len() {
        let next = skip_quoted_or_comment(bytes, i);
        if next != i {
            i = next;
            continue;
        }
        if bytes[i] == b'?' {
            n += 1;
            out.push_str(&sql[pos..i]);
            out.push('$');
            out.push_str(&n.to_string());
            pos = i + 1;
        }
        i += 1;
    }
    out.push_str(&sql[pos..]);
    out
}
