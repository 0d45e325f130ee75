//! Structural equivalence over shell syntax trees.
//!
//! One pairwise walker compares a rendering against the baseline
//! rendering: every node must have the same kind, the same non-payload
//! attributes (operators, negation, file descriptors, and/or chain shape)
//! and recursively equivalent children. String payloads are compared
//! through a [`PayloadRelation`], parameterized by context:
//!
//! - the template variant ([`TemplateRelation`]) pins command names,
//!   redirection targets, heredoc bodies and declaration names to byte
//!   equality, forbids new leading `-` on arguments, tolerates everything
//!   inside conditions/iterators/arithmetic, and rejects any change in the
//!   per-literal count of the glob characters `? * + @ !`;
//! - the printf variant ([`PatternRelation`]) compares every payload
//!   against the baseline string with each placeholder occurrence turned
//!   into a wildcard, and rejects captures containing an unescaped glob
//!   character (a trailing `\` is itself bad escaping).
//!
//! Words are flattened before comparison: runs of adjacent literal-class
//! parts (plain literals, escaped characters, glob tokens, `[`/`]`, `~`,
//! `:`) coalesce into single literal strings, giving payload rules their
//! full lexical extent.

use std::rc::Rc;

use conch_parser::ast::{
    AndOr, AndOrList, Arithmetic, Command, ComplexWord, CompoundCommand, CompoundCommandKind,
    GuardBodyPair, ListableCommand, Parameter, ParameterSubstitution, PatternBodyPair,
    PipeableCommand, Redirect, RedirectOrCmdWord, RedirectOrEnvVar, SimpleCommand, SimpleWord,
    TopLevelCommand, TopLevelWord, Word,
};

/// Placeholder substituted for every string argument in the printf
/// baseline rendering.
pub(crate) const REPLACEABLE: &str = "REPLACEABLE";

const GLOB_CHARS: [char; 5] = ['?', '*', '+', '@', '!'];

pub(crate) type ShellCommand = TopLevelCommand<String>;

type TWord = TopLevelWord<String>;
type ParamSubst = ParameterSubstitution<
    Parameter<String>,
    TopLevelWord<String>,
    TopLevelCommand<String>,
    Arithmetic<String>,
>;
type WordPart = Word<String, SimpleWord<String, Parameter<String>, Box<ParamSubst>>>;
type SimplePart = SimpleWord<String, Parameter<String>, Box<ParamSubst>>;
type SCmd = SimpleCommand<String, TWord, Redirect<TWord>>;
type CCmd = CompoundCommand<CompoundCommandKind<String, TWord, ShellCommand>, Redirect<TWord>>;
type PCmd = PipeableCommand<String, Box<SCmd>, Box<CCmd>, Rc<CCmd>>;
type CmdList = AndOrList<ListableCommand<PCmd>>;

/// Comparison context for one payload string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WordContext {
    /// All renderings must carry byte-identical strings.
    Exact,
    /// Variation is tolerated, but an argument may not gain a leading `-`.
    NoNewFlags,
    /// Variation is tolerated freely.
    Free,
}

/// How payload strings are compared between baseline and rendering.
pub(crate) trait PayloadRelation {
    /// Context used at sites the template variant pins to byte equality
    /// (command names, redirection targets, heredoc bodies, names).
    fn pinned_context(&self) -> WordContext;

    /// Compares a quoted or otherwise structure-neutral payload.
    fn plain(&self, ctx: WordContext, base: &str, other: &str) -> bool;

    /// Compares an unquoted literal payload; glob rules apply here.
    fn literal(&self, ctx: WordContext, base: &str, other: &str) -> bool;
}

fn flag_injected(base: &str, other: &str) -> bool {
    !base.starts_with('-') && other.starts_with('-')
}

/// Relation for the 3-way template judge.
pub(crate) struct TemplateRelation;

impl PayloadRelation for TemplateRelation {
    fn pinned_context(&self) -> WordContext {
        WordContext::Exact
    }

    fn plain(&self, ctx: WordContext, base: &str, other: &str) -> bool {
        match ctx {
            WordContext::Exact => base == other,
            WordContext::NoNewFlags => !flag_injected(base, other),
            WordContext::Free => true,
        }
    }

    fn literal(&self, ctx: WordContext, base: &str, other: &str) -> bool {
        self.plain(ctx, base, other)
            && GLOB_CHARS
                .iter()
                .all(|&c| count_char(base, c) == count_char(other, c))
    }
}

fn count_char(s: &str, c: char) -> usize {
    s.chars().filter(|&x| x == c).count()
}

/// Relation for the 2-way printf judge.
pub(crate) struct PatternRelation;

impl PatternRelation {
    fn wildcard_regex(base: &str) -> Option<regex::Regex> {
        let pattern = format!(
            "(?s)^{}$",
            regex::escape(base).replace(REPLACEABLE, "(.*)")
        );
        regex::Regex::new(&pattern).ok()
    }
}

impl PayloadRelation for PatternRelation {
    fn pinned_context(&self) -> WordContext {
        WordContext::Free
    }

    fn plain(&self, ctx: WordContext, base: &str, other: &str) -> bool {
        let Some(re) = Self::wildcard_regex(base) else {
            return false;
        };
        if !re.is_match(other) {
            return false;
        }
        if ctx == WordContext::NoNewFlags && flag_injected(base, other) {
            return false;
        }
        true
    }

    fn literal(&self, ctx: WordContext, base: &str, other: &str) -> bool {
        if !self.plain(ctx, base, other) {
            return false;
        }
        // Re-match to capture the inserted content and vet it for
        // unescaped glob characters.
        let Some(re) = Self::wildcard_regex(base) else {
            return false;
        };
        let Some(caps) = re.captures(other) else {
            return false;
        };
        for cap in caps.iter().skip(1).flatten() {
            if unescaped_glob(cap.as_str()) {
                return false;
            }
        }
        true
    }
}

/// True if `inserted` contains an unescaped `? * + @ !`, or ends with a
/// dangling `\`.
fn unescaped_glob(inserted: &str) -> bool {
    let mut escaped = false;
    for c in inserted.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if GLOB_CHARS.contains(&c) {
            return true;
        }
    }
    escaped
}

/// Whole-script equivalence: entry point for both judges.
pub(crate) fn scripts_match<R: PayloadRelation>(
    base: &[ShellCommand],
    other: &[ShellCommand],
    rel: &R,
) -> bool {
    commands_match(base, other, rel)
}

fn commands_match<R: PayloadRelation>(
    base: &[ShellCommand],
    other: &[ShellCommand],
    rel: &R,
) -> bool {
    base.len() == other.len()
        && base
            .iter()
            .zip(other)
            .all(|(a, b)| command_match(a, b, rel))
}

fn command_match<R: PayloadRelation>(a: &ShellCommand, b: &ShellCommand, rel: &R) -> bool {
    match (&a.0, &b.0) {
        (Command::Job(x), Command::Job(y)) | (Command::List(x), Command::List(y)) => {
            and_or_list_match(x, y, rel)
        }
        _ => false,
    }
}

fn and_or_list_match<R: PayloadRelation>(a: &CmdList, b: &CmdList, rel: &R) -> bool {
    if !listable_match(&a.first, &b.first, rel) {
        return false;
    }
    a.rest.len() == b.rest.len()
        && a.rest.iter().zip(&b.rest).all(|(x, y)| match (x, y) {
            (AndOr::And(x), AndOr::And(y)) | (AndOr::Or(x), AndOr::Or(y)) => {
                listable_match(x, y, rel)
            }
            _ => false,
        })
}

fn listable_match<R: PayloadRelation>(
    a: &ListableCommand<PCmd>,
    b: &ListableCommand<PCmd>,
    rel: &R,
) -> bool {
    match (a, b) {
        (ListableCommand::Pipe(neg_a, xs), ListableCommand::Pipe(neg_b, ys)) => {
            neg_a == neg_b
                && xs.len() == ys.len()
                && xs.iter().zip(ys).all(|(x, y)| pipeable_match(x, y, rel))
        }
        (ListableCommand::Single(x), ListableCommand::Single(y)) => pipeable_match(x, y, rel),
        _ => false,
    }
}

fn pipeable_match<R: PayloadRelation>(a: &PCmd, b: &PCmd, rel: &R) -> bool {
    match (a, b) {
        (PipeableCommand::Simple(x), PipeableCommand::Simple(y)) => {
            simple_command_match(x, y, rel)
        }
        (PipeableCommand::Compound(x), PipeableCommand::Compound(y)) => {
            compound_command_match(x, y, rel)
        }
        (PipeableCommand::FunctionDef(name_a, x), PipeableCommand::FunctionDef(name_b, y)) => {
            rel.plain(rel.pinned_context(), name_a, name_b)
                && compound_command_match(x, y, rel)
        }
        _ => false,
    }
}

fn simple_command_match<R: PayloadRelation>(a: &SCmd, b: &SCmd, rel: &R) -> bool {
    if a.redirects_or_env_vars.len() != b.redirects_or_env_vars.len()
        || a.redirects_or_cmd_words.len() != b.redirects_or_cmd_words.len()
    {
        return false;
    }

    for (x, y) in a.redirects_or_env_vars.iter().zip(&b.redirects_or_env_vars) {
        let ok = match (x, y) {
            (RedirectOrEnvVar::Redirect(r1), RedirectOrEnvVar::Redirect(r2)) => {
                redirect_match(r1, r2, rel)
            }
            (RedirectOrEnvVar::EnvVar(n1, w1), RedirectOrEnvVar::EnvVar(n2, w2)) => {
                rel.plain(rel.pinned_context(), n1, n2)
                    && opt_words_match(w1.as_ref(), w2.as_ref(), WordContext::Free, rel)
            }
            _ => false,
        };
        if !ok {
            return false;
        }
    }

    // The first command word is the command name; later words are
    // arguments and may not gain a leading dash.
    let mut seen_cmd_word = false;
    for (x, y) in a.redirects_or_cmd_words.iter().zip(&b.redirects_or_cmd_words) {
        let ok = match (x, y) {
            (RedirectOrCmdWord::Redirect(r1), RedirectOrCmdWord::Redirect(r2)) => {
                redirect_match(r1, r2, rel)
            }
            (RedirectOrCmdWord::CmdWord(w1), RedirectOrCmdWord::CmdWord(w2)) => {
                let ctx = if seen_cmd_word {
                    WordContext::NoNewFlags
                } else {
                    rel.pinned_context()
                };
                seen_cmd_word = true;
                words_match(w1, w2, ctx, rel)
            }
            _ => false,
        };
        if !ok {
            return false;
        }
    }
    true
}

fn compound_command_match<R: PayloadRelation>(a: &CCmd, b: &CCmd, rel: &R) -> bool {
    compound_kind_match(&a.kind, &b.kind, rel)
        && a.io.len() == b.io.len()
        && a.io.iter().zip(&b.io).all(|(x, y)| redirect_match(x, y, rel))
}

fn compound_kind_match<R: PayloadRelation>(
    a: &CompoundCommandKind<String, TWord, ShellCommand>,
    b: &CompoundCommandKind<String, TWord, ShellCommand>,
    rel: &R,
) -> bool {
    use CompoundCommandKind::*;

    match (a, b) {
        (Brace(xs), Brace(ys)) | (Subshell(xs), Subshell(ys)) => commands_match(xs, ys, rel),
        (While(x), While(y)) | (Until(x), Until(y)) => guard_body_match(x, y, rel),
        (
            If { conditionals: ca, else_branch: ea },
            If { conditionals: cb, else_branch: eb },
        ) => {
            ca.len() == cb.len()
                && ca.iter().zip(cb).all(|(x, y)| guard_body_match(x, y, rel))
                && match (ea, eb) {
                    (Some(xs), Some(ys)) => commands_match(xs, ys, rel),
                    (None, None) => true,
                    _ => false,
                }
        }
        (
            For { var: va, words: wa, body: ba },
            For { var: vb, words: wb, body: bb },
        ) => {
            rel.plain(rel.pinned_context(), va, vb)
                && match (wa, wb) {
                    (Some(xs), Some(ys)) => {
                        xs.len() == ys.len()
                            && xs
                                .iter()
                                .zip(ys)
                                .all(|(x, y)| words_match(x, y, WordContext::Free, rel))
                    }
                    (None, None) => true,
                    _ => false,
                }
                && commands_match(ba, bb, rel)
        }
        (Case { word: wa, arms: aa }, Case { word: wb, arms: ab }) => {
            words_match(wa, wb, WordContext::Free, rel)
                && aa.len() == ab.len()
                && aa.iter().zip(ab).all(|(x, y)| case_arm_match(x, y, rel))
        }
        _ => false,
    }
}

fn guard_body_match<R: PayloadRelation>(
    a: &GuardBodyPair<ShellCommand>,
    b: &GuardBodyPair<ShellCommand>,
    rel: &R,
) -> bool {
    commands_match(&a.guard, &b.guard, rel) && commands_match(&a.body, &b.body, rel)
}

fn case_arm_match<R: PayloadRelation>(
    a: &PatternBodyPair<TWord, ShellCommand>,
    b: &PatternBodyPair<TWord, ShellCommand>,
    rel: &R,
) -> bool {
    a.patterns.len() == b.patterns.len()
        && a.patterns
            .iter()
            .zip(&b.patterns)
            .all(|(x, y)| words_match(x, y, WordContext::Free, rel))
        && commands_match(&a.body, &b.body, rel)
}

fn redirect_match<R: PayloadRelation>(
    a: &Redirect<TWord>,
    b: &Redirect<TWord>,
    rel: &R,
) -> bool {
    use Redirect::*;

    match (a, b) {
        (Read(fd_a, w1), Read(fd_b, w2))
        | (Write(fd_a, w1), Write(fd_b, w2))
        | (ReadWrite(fd_a, w1), ReadWrite(fd_b, w2))
        | (Append(fd_a, w1), Append(fd_b, w2))
        | (Clobber(fd_a, w1), Clobber(fd_b, w2))
        | (Heredoc(fd_a, w1), Heredoc(fd_b, w2))
        | (DupRead(fd_a, w1), DupRead(fd_b, w2))
        | (DupWrite(fd_a, w1), DupWrite(fd_b, w2)) => {
            fd_a == fd_b && words_match(w1, w2, rel.pinned_context(), rel)
        }
        _ => false,
    }
}

// ---------------------------------------------------------------------
// Words

/// A word part after flattening adjacent literal-class tokens.
enum FlatPart<'a> {
    Literal(String),
    SingleQuoted(&'a str),
    DoubleQuoted(Vec<FlatPart<'a>>),
    Param(&'a Parameter<String>),
    Subst(&'a ParamSubst),
}

fn words_match<R: PayloadRelation>(a: &TWord, b: &TWord, ctx: WordContext, rel: &R) -> bool {
    flat_parts_match(&flatten_top_word(a), &flatten_top_word(b), ctx, rel)
}

fn opt_words_match<R: PayloadRelation>(
    a: Option<&TWord>,
    b: Option<&TWord>,
    ctx: WordContext,
    rel: &R,
) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => words_match(x, y, ctx, rel),
        (None, None) => true,
        _ => false,
    }
}

fn flat_parts_match<R: PayloadRelation>(
    a: &[FlatPart<'_>],
    b: &[FlatPart<'_>],
    ctx: WordContext,
    rel: &R,
) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| match (x, y) {
            (FlatPart::Literal(l1), FlatPart::Literal(l2)) => rel.literal(ctx, l1, l2),
            (FlatPart::SingleQuoted(l1), FlatPart::SingleQuoted(l2)) => rel.plain(ctx, l1, l2),
            (FlatPart::DoubleQuoted(p1), FlatPart::DoubleQuoted(p2)) => {
                flat_parts_match(p1, p2, ctx, rel)
            }
            (FlatPart::Param(p1), FlatPart::Param(p2)) => p1 == p2,
            (FlatPart::Subst(s1), FlatPart::Subst(s2)) => subst_match(s1, s2, rel),
            _ => false,
        })
}

fn flatten_top_word(word: &TWord) -> Vec<FlatPart<'_>> {
    let parts = match &word.0 {
        ComplexWord::Single(w) => flatten_word(w),
        ComplexWord::Concat(ws) => ws.iter().flat_map(flatten_word).collect(),
    };
    merge_literals(parts)
}

fn flatten_word(word: &WordPart) -> Vec<FlatPart<'_>> {
    match word {
        Word::Simple(sw) => vec![flatten_simple(sw)],
        Word::SingleQuoted(lit) => vec![FlatPart::SingleQuoted(lit)],
        Word::DoubleQuoted(parts) => vec![FlatPart::DoubleQuoted(merge_literals(
            parts.iter().map(flatten_simple).collect(),
        ))],
    }
}

fn flatten_simple(part: &SimplePart) -> FlatPart<'_> {
    match part {
        SimpleWord::Literal(s) => FlatPart::Literal(s.clone()),
        SimpleWord::Escaped(s) => FlatPart::Literal(format!("\\{s}")),
        SimpleWord::Param(p) => FlatPart::Param(p),
        SimpleWord::Subst(s) => FlatPart::Subst(&**s),
        SimpleWord::Star => FlatPart::Literal("*".to_string()),
        SimpleWord::Question => FlatPart::Literal("?".to_string()),
        SimpleWord::SquareOpen => FlatPart::Literal("[".to_string()),
        SimpleWord::SquareClose => FlatPart::Literal("]".to_string()),
        SimpleWord::Tilde => FlatPart::Literal("~".to_string()),
        SimpleWord::Colon => FlatPart::Literal(":".to_string()),
    }
}

fn merge_literals(parts: Vec<FlatPart<'_>>) -> Vec<FlatPart<'_>> {
    let mut merged: Vec<FlatPart<'_>> = Vec::with_capacity(parts.len());
    for part in parts {
        if let FlatPart::Literal(next) = &part {
            if let Some(FlatPart::Literal(acc)) = merged.last_mut() {
                acc.push_str(next);
                continue;
            }
        }
        merged.push(part);
    }
    merged
}

// ---------------------------------------------------------------------
// Parameter substitutions and arithmetic

fn subst_match<R: PayloadRelation>(a: &ParamSubst, b: &ParamSubst, rel: &R) -> bool {
    use ParameterSubstitution::*;

    match (a, b) {
        (Command(xs), Command(ys)) => commands_match(xs, ys, rel),
        (Len(p1), Len(p2)) => p1 == p2,
        (Arith(x), Arith(y)) => match (x, y) {
            (Some(x), Some(y)) => arithmetic_match(x, y, rel),
            (None, None) => true,
            _ => false,
        },
        (Default(c1, p1, w1), Default(c2, p2, w2))
        | (Assign(c1, p1, w1), Assign(c2, p2, w2))
        | (Error(c1, p1, w1), Error(c2, p2, w2))
        | (Alternative(c1, p1, w1), Alternative(c2, p2, w2)) => {
            c1 == c2
                && p1 == p2
                && opt_words_match(w1.as_ref(), w2.as_ref(), rel.pinned_context(), rel)
        }
        (RemoveSmallestSuffix(p1, w1), RemoveSmallestSuffix(p2, w2))
        | (RemoveLargestSuffix(p1, w1), RemoveLargestSuffix(p2, w2))
        | (RemoveSmallestPrefix(p1, w1), RemoveSmallestPrefix(p2, w2))
        | (RemoveLargestPrefix(p1, w1), RemoveLargestPrefix(p2, w2)) => {
            p1 == p2 && opt_words_match(w1.as_ref(), w2.as_ref(), rel.pinned_context(), rel)
        }
        _ => false,
    }
}

fn arithmetic_match<R: PayloadRelation>(
    a: &Arithmetic<String>,
    b: &Arithmetic<String>,
    rel: &R,
) -> bool {
    use Arithmetic::*;

    match (a, b) {
        // Variables and integer literals form one atom class: a numeric
        // substitution where the placeholder parsed as a variable name is
        // value variation, not structure variation.
        (Var(x), Var(y)) => rel.plain(WordContext::Free, x, y),
        (Literal(x), Literal(y)) => rel.plain(WordContext::Free, &x.to_string(), &y.to_string()),
        (Var(x), Literal(y)) => rel.plain(WordContext::Free, x, &y.to_string()),
        (Literal(x), Var(y)) => rel.plain(WordContext::Free, &x.to_string(), y),

        (PostIncr(x), PostIncr(y))
        | (PostDecr(x), PostDecr(y))
        | (PreIncr(x), PreIncr(y))
        | (PreDecr(x), PreDecr(y)) => rel.plain(WordContext::Free, x, y),

        (UnaryPlus(x), UnaryPlus(y))
        | (UnaryMinus(x), UnaryMinus(y))
        | (LogicalNot(x), LogicalNot(y))
        | (BitwiseNot(x), BitwiseNot(y)) => arithmetic_match(x, y, rel),

        (Pow(x1, y1), Pow(x2, y2))
        | (Mult(x1, y1), Mult(x2, y2))
        | (Div(x1, y1), Div(x2, y2))
        | (Modulo(x1, y1), Modulo(x2, y2))
        | (Add(x1, y1), Add(x2, y2))
        | (Sub(x1, y1), Sub(x2, y2))
        | (ShiftLeft(x1, y1), ShiftLeft(x2, y2))
        | (ShiftRight(x1, y1), ShiftRight(x2, y2))
        | (Less(x1, y1), Less(x2, y2))
        | (LessEq(x1, y1), LessEq(x2, y2))
        | (Great(x1, y1), Great(x2, y2))
        | (GreatEq(x1, y1), GreatEq(x2, y2))
        | (Eq(x1, y1), Eq(x2, y2))
        | (NotEq(x1, y1), NotEq(x2, y2))
        | (BitwiseAnd(x1, y1), BitwiseAnd(x2, y2))
        | (BitwiseXor(x1, y1), BitwiseXor(x2, y2))
        | (BitwiseOr(x1, y1), BitwiseOr(x2, y2))
        | (LogicalAnd(x1, y1), LogicalAnd(x2, y2))
        | (LogicalOr(x1, y1), LogicalOr(x2, y2)) => {
            arithmetic_match(x1, x2, rel) && arithmetic_match(y1, y2, rel)
        }

        (Ternary(c1, t1, f1), Ternary(c2, t2, f2)) => {
            arithmetic_match(c1, c2, rel)
                && arithmetic_match(t1, t2, rel)
                && arithmetic_match(f1, f2, rel)
        }
        (Assign(v1, e1), Assign(v2, e2)) => {
            rel.plain(WordContext::Free, v1, v2) && arithmetic_match(e1, e2, rel)
        }
        (Sequence(xs), Sequence(ys)) => {
            xs.len() == ys.len()
                && xs.iter().zip(ys).all(|(x, y)| arithmetic_match(x, y, rel))
        }
        _ => false,
    }
}

#[cfg(test)]
mod judge_tests {
    use super::*;
    use crate::shell::parse_script;

    fn template_judge(base: &str, other: &str) -> bool {
        let base = parse_script(base).expect("baseline must parse");
        let other = parse_script(other).expect("rendering must parse");
        scripts_match(&base, &other, &TemplateRelation)
    }

    fn printf_judge(base: &str, other: &str) -> bool {
        let base = parse_script(base).expect("baseline must parse");
        let other = parse_script(other).expect("rendering must parse");
        scripts_match(&base, &other, &PatternRelation)
    }

    #[test]
    fn tolerates_argument_value_changes() {
        assert!(template_judge("echo baseline", "echo hello"));
        assert!(printf_judge("echo REPLACEABLE", "echo hello"));
    }

    #[test]
    fn pins_command_names() {
        assert!(!template_judge("baseline arg", "rm arg"));
        // The printf format string is trusted, so a placeholder command
        // name is fine there.
        assert!(printf_judge("REPLACEABLE arg", "ls arg"));
    }

    #[test]
    fn rejects_extra_words_and_commands() {
        assert!(!template_judge("echo baseline", "echo one two"));
        assert!(!template_judge("echo baseline", "echo x\nrm y"));
        assert!(!printf_judge("echo REPLACEABLE", "echo x; rm y"));
    }

    #[test]
    fn rejects_flag_injection_on_arguments() {
        assert!(!template_judge("cat baseline", "cat -flag"));
        assert!(template_judge("cat -baseline", "cat -flag"));
        assert!(!printf_judge("cat REPLACEABLE", "cat -flag"));
    }

    #[test]
    fn rejects_substitution_part_changes() {
        assert!(!template_judge("echo baseline", "echo `whoami`"));
        assert!(!template_judge("echo \"baseline\"", "echo \"$(whoami)\""));
        assert!(!printf_judge("echo \"REPLACEABLE\"", "echo \"$(whoami)\""));
    }

    #[test]
    fn glob_count_rule_for_template_literals() {
        assert!(!template_judge("echo baseline", "echo a@b"));
        assert!(template_judge("echo base*line", "echo other*value"));
    }

    #[test]
    fn unescaped_glob_rule_for_printf_captures() {
        assert!(!printf_judge("echo REPLACEABLE", "echo Just+A+String"));
        assert!(printf_judge("echo REPLACEABLE", "echo Just\\+A\\+String"));
    }

    #[test]
    fn dangling_backslash_is_bad_escaping() {
        assert!(unescaped_glob("bad\\"));
        assert!(!unescaped_glob("ok\\;"));
        assert!(!unescaped_glob("ok\\+"));
        assert!(unescaped_glob("gl*ob"));
    }

    #[test]
    fn arithmetic_atoms_interchange() {
        assert!(template_judge("echo $((SECONDS+baseline))", "echo $((SECONDS+3))"));
        assert!(printf_judge("echo $((REPLACEABLE+1))", "echo $((41+1))"));
        assert!(!template_judge("echo $((a+baseline))", "echo $((a*3))"));
    }

    #[test]
    fn redirect_targets_are_pinned_in_templates() {
        assert!(!template_judge("bla > baseline", "bla > filename"));
        assert!(template_judge("bla > out", "bla > out"));
        assert!(printf_judge("bla > REPLACEABLE", "bla > filename"));
    }

    #[test]
    fn heredoc_bodies_follow_the_relation() {
        let base = "cat << 'EOF'\nREPLACEABLE\nEOF\n";
        let other = "cat << 'EOF'\nline one\nline two\nEOF\n";
        assert!(printf_judge(base, other));
        assert!(!template_judge(
            "cat << 'EOF'\nbaseline\nEOF\n",
            "cat << 'EOF'\nchanged\nEOF\n"
        ));
    }

    #[test]
    fn escapes_stay_inside_literals() {
        // Escaped characters coalesce with surrounding literal text, so an
        // escaped payload differs in value, not in word structure.
        assert!(printf_judge("cmd --arg=REPLACEABLE", "cmd --arg=bla\\ bla\\;x"));
    }
}
