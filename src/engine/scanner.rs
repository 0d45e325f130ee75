//! Source-level decoration of data-emitting template actions.
//!
//! The engine does not expose its parse tree, so the decoration pass works
//! on the template source: a quote-aware scan finds expression blocks
//! (`{{ … }}`), statements (`{% … %}`), comments (`{# … #}`) and raw
//! blocks, and splices the pass-specific guard filter into expressions that
//! emit data. Statements are declarative (control flow, bindings, includes)
//! and are never decorated, so conditions and loop headers always evaluate
//! against the honest data.
//!
//! Rewrite rules for an expression `{{ base | f1 | f2 … }}`:
//!
//! - a pipeline mentioning `StructuralData` is left untouched;
//! - if `base` is a pure data reference, the guard is spliced in directly
//!   after it, ahead of any user filters, so the filters observe the
//!   transformed input (`AllowFlags` selects the flag-probing guard);
//! - otherwise, a pipeline mentioning `ApplyInjectionDetection` gets the
//!   guard appended after the whole pipeline;
//! - anything else (literals, function calls, compound expressions) is left
//!   untouched: helper output is only checked on request.

/// Rewrites `source`, wrapping data-emitting expressions with the named
/// guard filters.
pub(crate) fn decorate(source: &str, guard: &str, flag_guard: &str) -> String {
    let mut out = String::with_capacity(source.len() + 64);
    let bytes = source.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if source[i..].starts_with("{{") {
            match block_end(source, i + 2, "}}") {
                Some(end) => {
                    let inner = &source[i + 2..end];
                    out.push_str("{{");
                    out.push_str(&rewrite_expression(inner, guard, flag_guard));
                    out.push_str("}}");
                    i = end + 2;
                }
                None => {
                    // Unterminated block; leave the tail for the engine to
                    // report as a syntax error.
                    out.push_str(&source[i..]);
                    break;
                }
            }
        } else if source[i..].starts_with("{%") {
            match block_end(source, i + 2, "%}") {
                Some(end) => {
                    let is_raw = tag_name(&source[i + 2..end]) == Some("raw");
                    out.push_str(&source[i..end + 2]);
                    i = end + 2;
                    if is_raw {
                        i = copy_raw_block(source, i, &mut out);
                    }
                }
                None => {
                    out.push_str(&source[i..]);
                    break;
                }
            }
        } else if source[i..].starts_with("{#") {
            match source[i + 2..].find("#}") {
                Some(off) => {
                    let end = i + 2 + off + 2;
                    out.push_str(&source[i..end]);
                    i = end;
                }
                None => {
                    out.push_str(&source[i..]);
                    break;
                }
            }
        } else {
            let Some(c) = source[i..].chars().next() else {
                break;
            };
            out.push(c);
            i += c.len_utf8();
        }
    }

    out
}

/// Copies everything through the matching `{% endraw %}` verbatim,
/// returning the index just past it.
fn copy_raw_block(source: &str, mut i: usize, out: &mut String) -> usize {
    while i < source.len() {
        if source[i..].starts_with("{%") {
            if let Some(end) = block_end(source, i + 2, "%}") {
                let is_end = tag_name(&source[i + 2..end]) == Some("endraw");
                out.push_str(&source[i..end + 2]);
                i = end + 2;
                if is_end {
                    return i;
                }
                continue;
            }
        }
        let Some(c) = source[i..].chars().next() else {
            break;
        };
        out.push(c);
        i += c.len_utf8();
    }
    i
}

/// Finds the start of `closer` from `from`, skipping over string literals.
fn block_end(source: &str, from: usize, closer: &str) -> Option<usize> {
    let mut i = from;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while i < source.len() {
        let c = source[i..].chars().next()?;
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => {
                if source[i..].starts_with(closer) {
                    return Some(i);
                }
                if c == '"' || c == '\'' || c == '`' {
                    quote = Some(c);
                }
            }
        }
        i += c.len_utf8();
    }
    None
}

/// First identifier of a statement body (e.g. `if`, `for`, `raw`),
/// ignoring a leading whitespace-control marker.
fn tag_name(body: &str) -> Option<&str> {
    let body = body.trim_start_matches('-').trim_start();
    let end = body
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric() && *c != '_')
        .map_or(body.len(), |(idx, _)| idx);
    if end == 0 { None } else { Some(&body[..end]) }
}

fn rewrite_expression(inner: &str, guard: &str, flag_guard: &str) -> String {
    let (ltrim, body) = match inner.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", inner),
    };
    let (rtrim, body) = match body.strip_suffix('-') {
        Some(rest) => ("-", rest),
        None => ("", body),
    };

    let segments = split_pipeline(body);
    let filter_heads: Vec<&str> = segments.iter().skip(1).filter_map(|s| tag_name(s)).collect();

    if filter_heads.contains(&"StructuralData") {
        return inner.to_string();
    }

    let chosen = if filter_heads.contains(&"AllowFlags") {
        flag_guard
    } else {
        guard
    };

    let rewritten = if segments.first().is_some_and(|base| is_data_reference(base)) {
        let mut parts: Vec<String> = segments.iter().map(|s| s.trim().to_string()).collect();
        // `default` must stay directly attached to its variable so the
        // engine's undefined-variable handling keeps working.
        let at = if filter_heads.first() == Some(&"default") { 2 } else { 1 };
        parts.insert(at, chosen.to_string());
        parts.join(" | ")
    } else if filter_heads.contains(&"ApplyInjectionDetection") {
        format!("{} | {}", body.trim(), chosen)
    } else {
        return inner.to_string();
    };

    format!("{ltrim} {rewritten} {rtrim}")
}

/// Splits an expression on top-level `|`, honoring quotes and bracket
/// nesting.
fn split_pipeline(expr: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in expr.char_indices() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == q {
                    quote = None;
                }
            }
            None => match c {
                '"' | '\'' | '`' => quote = Some(c),
                '(' | '[' => depth += 1,
                ')' | ']' => depth = depth.saturating_sub(1),
                '|' if depth == 0 => {
                    segments.push(&expr[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }
    segments.push(&expr[start..]);
    segments
}

/// A pure data reference: an identifier path with optional index brackets
/// (`user.name`, `items.0`, `env["PATH"]`). Literals, function calls and
/// compound expressions do not qualify.
fn is_data_reference(expr: &str) -> bool {
    let expr = expr.trim();
    if expr.is_empty() || matches!(expr, "true" | "false") {
        return false;
    }

    let mut chars = expr.char_indices().peekable();
    match chars.peek() {
        Some((_, c)) if c.is_ascii_alphabetic() || *c == '_' => {}
        _ => return false,
    }

    let mut in_brackets = false;
    for (_, c) in chars {
        match (in_brackets, c) {
            (false, '[') => in_brackets = true,
            (false, c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {}
            (true, ']') => in_brackets = false,
            (true, c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {}
            (true, '"') | (true, '\'') => {}
            _ => return false,
        }
    }
    !in_brackets
}
