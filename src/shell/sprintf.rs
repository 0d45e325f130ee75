//! Injection-safe `printf`-style formatting for shell scripts.
//!
//! [`sprintf`] substitutes arguments into a trusted format string, then
//! checks the result against a placeholder rendering of the same format:
//! both are parsed as shell and compared node-for-node, with every literal
//! compared against the placeholder pattern and every captured insertion
//! vetted for unescaped glob characters. The grammar keeps the exact
//! quoting structure, so cross-argument escapes, comment injection and
//! quote-breaking substitutions all surface as structural differences.
//!
//! # Examples
//!
//! ```
//! use guardtext::shell::{escape_default_context, sprintf};
//! use serde_json::json;
//!
//! let script = sprintf("git commit -m %s", &[json!("hello")])?;
//! assert_eq!(script, "git commit -m hello");
//!
//! let err = sprintf("git commit -m %s", &[json!("`whoami`")]).unwrap_err();
//! assert!(matches!(err, guardtext::Error::ShInjection));
//!
//! // Escaping makes arbitrary values inert in an unquoted context.
//! let script = sprintf("cmd --arg=%s", &[json!(escape_default_context("a b;c"))])?;
//! assert_eq!(script, "cmd --arg=a\\ b\\;c");
//! # Ok::<(), guardtext::Error>(())
//! ```

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::judge::{scripts_match, PatternRelation, PayloadRelation, WordContext, REPLACEABLE};
use super::parse_script;
use crate::data::transform_strings;
use crate::error::{Error, Result};

/// Shell dialect of a format string.
///
/// All dialects are currently parsed with the shared POSIX-compatible
/// grammar; the dialect is carried so call sites can state their target
/// shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum Lang {
    /// POSIX sh.
    Posix,
    /// GNU Bash.
    #[default]
    Bash,
    /// MirBSD Korn shell.
    Mksh,
    /// Bash automated testing system files.
    Bats,
}

/// Characters that are meaningful to the shell in an unquoted context,
/// plus whitespace and the home-directory prefix.
const SPECIAL_CHARS: &str = "\\'\"`${[|&;<>()*?!+@ \t\r\n~";

/// Backslash-escapes every shell-special character in `input`, for use in
/// contexts without existing quoting, such as `--arg=%s`.
pub fn escape_default_context(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if SPECIAL_CHARS.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Formats `format` with `args` for a Bash target, rejecting substitutions
/// that change the structure of the script.
///
/// # Errors
///
/// - [`Error::InvalidShTemplate`] if the format string itself is not a
///   valid script once placeholders are substituted.
/// - [`Error::ShInjection`] if an argument escapes its context, adds a
///   flag, or introduces an unescaped glob character.
/// - [`Error::Format`] if the format string and arguments disagree.
pub fn sprintf(format: &str, args: &[Value]) -> Result<String> {
    sprintf_lang(format, Lang::default(), args)
}

/// [`sprintf`] with an explicit target dialect.
pub fn sprintf_lang(format: &str, lang: Lang, args: &[Value]) -> Result<String> {
    tracing::trace!(?lang, "formatting shell script");

    let baseline_args: Vec<Value> = args
        .iter()
        .map(|v| transform_strings(v, &|_| REPLACEABLE.to_string()))
        .collect();

    // Disable string truncation so placeholders substitute in full.
    let baseline_format = strip_size_qualifiers(format);
    let baseline = render_format(&baseline_format, &baseline_args)?;

    let parsed_baseline = parse_script(&baseline).map_err(|err| {
        tracing::debug!(%err, "placeholder rendering is not a valid script");
        Error::InvalidShTemplate
    })?;

    let requested = render_format(format, args)?;
    let parsed_requested = parse_script(&requested).map_err(|err| {
        tracing::debug!(%err, "requested rendering is not a valid script");
        Error::ShInjection
    })?;

    let equivalent = catch_unwind(AssertUnwindSafe(|| {
        scripts_match(&parsed_baseline, &parsed_requested, &PatternRelation)
            && comments_match(&extract_comments(&baseline), &extract_comments(&requested))
    }))
    .unwrap_or(false);

    if !equivalent {
        return Err(Error::ShInjection);
    }
    Ok(requested)
}

/// [`sprintf`] variant that panics on error, for static format strings in
/// initialization code.
pub fn must_sprintf(format: &str, args: &[Value]) -> String {
    match sprintf(format, args) {
        Ok(script) => script,
        Err(err) => panic!("sprintf failed: {err}"),
    }
}

/// Strips precision qualifiers from `%s`/`%v` specifiers.
fn strip_size_qualifiers(format: &str) -> String {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = PATTERN
        .get_or_init(|| Regex::new(r"([^%]|^)%([+\-0 #]*)(\d*\.\d*)([sv])").expect("static pattern"));
    re.replace_all(format, "${1}%${2}${4}").into_owned()
}

// ---------------------------------------------------------------------
// Format expansion

#[derive(Debug, Default, Clone, Copy)]
struct FormatFlags {
    left: bool,
    zero: bool,
    plus: bool,
}

fn render_format(format: &str, args: &[Value]) -> Result<String> {
    let mut out = String::with_capacity(format.len() + 32);
    let mut chars = format.chars().peekable();
    let mut next_arg = 0usize;

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }

        let mut flags = FormatFlags::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => flags.left = true,
                '0' => flags.zero = true,
                '+' => flags.plus = true,
                ' ' | '#' => {}
                _ => break,
            }
            chars.next();
        }

        let width = take_number(&mut chars);
        let precision = if chars.peek() == Some(&'.') {
            chars.next();
            Some(take_number(&mut chars).unwrap_or(0))
        } else {
            None
        };

        let verb = chars
            .next()
            .ok_or_else(|| Error::Format("format string ends inside a specifier".to_string()))?;
        let arg = args.get(next_arg).ok_or_else(|| {
            Error::Format(format!("missing argument for %{verb} at index {next_arg}"))
        })?;
        next_arg += 1;

        let rendered = match verb {
            's' | 'v' => {
                let mut s = display_value(arg);
                if let Some(p) = precision {
                    s = s.chars().take(p).collect();
                }
                s
            }
            'q' => quote_string(&display_value(arg)),
            'd' => {
                let n = arg
                    .as_i64()
                    .ok_or_else(|| Error::Format(format!("argument for %d is not an integer: {arg}")))?;
                if flags.plus && n >= 0 {
                    format!("+{n}")
                } else {
                    n.to_string()
                }
            }
            'f' => {
                let f = arg
                    .as_f64()
                    .ok_or_else(|| Error::Format(format!("argument for %f is not a number: {arg}")))?;
                format!("{:.*}", precision.unwrap_or(6), f)
            }
            't' => arg
                .as_bool()
                .ok_or_else(|| Error::Format(format!("argument for %t is not a bool: {arg}")))?
                .to_string(),
            other => return Err(Error::Format(format!("unsupported verb %{other}"))),
        };

        push_padded(&mut out, &rendered, width, flags);
    }

    if next_arg < args.len() {
        return Err(Error::Format(format!(
            "{} argument(s) left over after formatting",
            args.len() - next_arg
        )));
    }
    Ok(out)
}

fn take_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() {
            digits.push(c);
            chars.next();
        } else {
            break;
        }
    }
    digits.parse().ok()
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn push_padded(out: &mut String, s: &str, width: Option<usize>, flags: FormatFlags) {
    let len = s.chars().count();
    match width {
        Some(w) if len < w => {
            let fill = w - len;
            if flags.left {
                out.push_str(s);
                out.extend(std::iter::repeat(' ').take(fill));
            } else {
                let pad = if flags.zero { '0' } else { ' ' };
                out.extend(std::iter::repeat(pad).take(fill));
                out.push_str(s);
            }
        }
        _ => out.push_str(s),
    }
}

// ---------------------------------------------------------------------
// Comments

/// The grammar discards comments, so they are collected lexically and
/// compared with the same placeholder relation as words. A `#` starts a
/// comment only at a word boundary and outside quotes.
fn extract_comments(source: &str) -> Vec<String> {
    let mut comments = Vec::new();
    let mut chars = source.chars();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut at_word_start = true;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' && q != '\'' {
                escaped = true;
            } else if c == q {
                quote = None;
                at_word_start = false;
            }
            continue;
        }
        if escaped {
            escaped = false;
            at_word_start = false;
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                at_word_start = false;
            }
            '\'' | '"' | '`' => {
                quote = Some(c);
                at_word_start = false;
            }
            '#' if at_word_start => {
                let mut text = String::new();
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                    text.push(next);
                }
                comments.push(text);
                at_word_start = true;
            }
            ';' | '|' | '&' | '(' | ')' | '<' | '>' => at_word_start = true,
            c if c.is_whitespace() => at_word_start = true,
            _ => at_word_start = false,
        }
    }
    comments
}

fn comments_match(base: &[String], other: &[String]) -> bool {
    let rel = PatternRelation;
    base.len() == other.len()
        && base
            .iter()
            .zip(other)
            .all(|(a, b)| rel.plain(WordContext::Free, a, b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_the_special_set() {
        assert_eq!(escape_default_context("a b"), "a\\ b");
        assert_eq!(escape_default_context("plain"), "plain");
        assert_eq!(escape_default_context("~me"), "\\~me");
        assert_eq!(escape_default_context("a`b"), "a\\`b");
        assert_eq!(escape_default_context("x;y|z"), "x\\;y\\|z");
    }

    #[test]
    fn format_expansion_basics() {
        let out = render_format(
            "s=%s d=%d f=%.2f t=%t q=%q pct=%%",
            &[
                serde_json::json!("str"),
                serde_json::json!(7),
                serde_json::json!(1.5),
                serde_json::json!(true),
                serde_json::json!("a\"b"),
            ],
        )
        .unwrap();
        assert_eq!(out, "s=str d=7 f=1.50 t=true q=\"a\\\"b\" pct=%");
    }

    #[test]
    fn format_width_and_precision() {
        let out = render_format("[%5s][%-5s][%.2s]", &[
            serde_json::json!("ab"),
            serde_json::json!("cd"),
            serde_json::json!("abcdef"),
        ])
        .unwrap();
        assert_eq!(out, "[   ab][cd   ][ab]");
    }

    #[test]
    fn format_argument_mismatches_error() {
        assert!(matches!(
            render_format("%s %s", &[serde_json::json!("one")]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            render_format("%s", &[serde_json::json!("a"), serde_json::json!("b")]),
            Err(Error::Format(_))
        ));
        assert!(matches!(
            render_format("%z", &[serde_json::json!("a")]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn truncation_qualifiers_are_stripped_for_the_baseline() {
        assert_eq!(strip_size_qualifiers("command \"%.4s\""), "command \"%s\"");
        assert_eq!(strip_size_qualifiers("a %10.2v b"), "a %v b");
        // Width alone only pads; it is kept.
        assert_eq!(strip_size_qualifiers("a %10s b"), "a %10s b");
        assert_eq!(strip_size_qualifiers("100%% %.1s"), "100%% %s");
    }

    #[test]
    fn comment_extraction_respects_quoting() {
        assert_eq!(extract_comments("echo hi # one"), vec![" one"]);
        assert_eq!(extract_comments("echo 'not # here'"), Vec::<String>::new());
        assert_eq!(extract_comments("echo \"not # here\""), Vec::<String>::new());
        assert_eq!(extract_comments("echo hi#not"), Vec::<String>::new());
        assert_eq!(
            extract_comments("#!/bin/bash\necho x ;# after"),
            vec!["!/bin/bash", " after"]
        );
    }
}
