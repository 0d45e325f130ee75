//! Three-way structural equivalence over YAML document trees.
//!
//! The baseline tree fixes the shape the template produces with inert
//! data; the requested tree is the honest rendering; the mutated tree is
//! the honest data with every string code-point-doubled. The three must
//! agree on document count, node kinds, mapping entry counts and sequence
//! lengths; scalar values are free to differ, mapping key text is not.
//! The mutated tree is what
//! defeats a coincidental shape match: data that contributed structure
//! parses differently once doubled.

use std::collections::HashSet;

use super::node::YamlNode;

/// Judge failure, mapped to the public error kinds by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mismatch {
    /// The template itself is malformed (non-scalar or duplicate mapping
    /// keys, in any tree).
    InvalidTemplate,
    /// The data changed the structure.
    Injection,
}

/// Key well-formedness of a whole document stream. Checked on the
/// baseline tree before the other renderings are parsed, so a template
/// with malformed keys is reported as invalid rather than as an injection
/// finding against whatever the data rendered.
pub(crate) fn validate_documents(docs: &[YamlNode]) -> Result<(), Mismatch> {
    docs.iter().try_for_each(validate_node)
}

fn validate_node(node: &YamlNode) -> Result<(), Mismatch> {
    match node {
        YamlNode::Mapping { entries } => {
            check_keys(entries)?;
            entries.iter().try_for_each(|(key, value)| {
                validate_node(key)?;
                validate_node(value)
            })
        }
        YamlNode::Sequence { items } => items.iter().try_for_each(validate_node),
        YamlNode::Scalar { .. } | YamlNode::Alias => Ok(()),
    }
}

pub(crate) fn documents_match(
    baseline: &[YamlNode],
    requested: &[YamlNode],
    mutated: &[YamlNode],
) -> Result<(), Mismatch> {
    if requested.len() != baseline.len() || mutated.len() != baseline.len() {
        tracing::debug!(
            baseline = baseline.len(),
            requested = requested.len(),
            mutated = mutated.len(),
            "document count mismatch"
        );
        return Err(Mismatch::Injection);
    }

    for ((b, r), m) in baseline.iter().zip(requested).zip(mutated) {
        nodes_match(b, r, m)?;
    }
    Ok(())
}

fn nodes_match(baseline: &YamlNode, requested: &YamlNode, mutated: &YamlNode) -> Result<(), Mismatch> {
    match (baseline, requested, mutated) {
        // Scalar values are exactly what substitutions are allowed to vary.
        (YamlNode::Scalar { .. }, YamlNode::Scalar { .. }, YamlNode::Scalar { .. }) => Ok(()),

        (YamlNode::Alias, YamlNode::Alias, YamlNode::Alias) => Ok(()),

        (
            YamlNode::Sequence { items: b },
            YamlNode::Sequence { items: r },
            YamlNode::Sequence { items: m },
        ) => {
            if r.len() != b.len() || m.len() != b.len() {
                return Err(Mismatch::Injection);
            }
            for ((b, r), m) in b.iter().zip(r).zip(m) {
                nodes_match(b, r, m)?;
            }
            Ok(())
        }

        (
            YamlNode::Mapping { entries: b },
            YamlNode::Mapping { entries: r },
            YamlNode::Mapping { entries: m },
        ) => {
            if r.len() != b.len() || m.len() != b.len() {
                return Err(Mismatch::Injection);
            }
            for entries in [b, r, m] {
                check_keys(entries)?;
            }
            for ((b, r), m) in b.iter().zip(r).zip(m) {
                keys_match(&b.0, &r.0, &m.0)?;
                nodes_match(&b.1, &r.1, &m.1)?;
            }
            Ok(())
        }

        (b, r, m) => {
            tracing::debug!(
                baseline = b.kind_name(),
                requested = r.kind_name(),
                mutated = m.kind_name(),
                "node kind mismatch"
            );
            Err(Mismatch::Injection)
        }
    }
}

/// Mapping keys must carry byte-identical text in all three trees. A
/// template-literal key renders the same under every policy; a key fed
/// from unannotated data turns into the placeholder and the doubled form,
/// so any position-matching but renamed key is a structure change, not a
/// value change.
fn keys_match(
    baseline: &YamlNode,
    requested: &YamlNode,
    mutated: &YamlNode,
) -> Result<(), Mismatch> {
    match (baseline, requested, mutated) {
        (
            YamlNode::Scalar { value: b },
            YamlNode::Scalar { value: r },
            YamlNode::Scalar { value: m },
        ) => {
            if r != b || m != b {
                tracing::debug!(
                    baseline = %b,
                    requested = %r,
                    mutated = %m,
                    "mapping key text mismatch"
                );
                return Err(Mismatch::Injection);
            }
            Ok(())
        }
        // Non-scalar keys are caught by `check_keys` before we get here.
        _ => Err(Mismatch::InvalidTemplate),
    }
}

/// Mapping keys must be scalars and unique within their mapping, in every
/// tree. Either violation makes the template unusable rather than the data
/// suspicious.
fn check_keys(entries: &[(YamlNode, YamlNode)]) -> Result<(), Mismatch> {
    let mut seen = HashSet::with_capacity(entries.len());
    for (key, _) in entries {
        let YamlNode::Scalar { value } = key else {
            return Err(Mismatch::InvalidTemplate);
        };
        if !seen.insert(value.as_str()) {
            return Err(Mismatch::InvalidTemplate);
        }
    }
    Ok(())
}

#[cfg(test)]
mod judge_tests {
    use super::*;
    use crate::yaml::node::parse_documents;

    fn judge(baseline: &str, requested: &str, mutated: &str) -> Result<(), Mismatch> {
        documents_match(
            &parse_documents(baseline).unwrap(),
            &parse_documents(requested).unwrap(),
            &parse_documents(mutated).unwrap(),
        )
    }

    #[test]
    fn scalar_variation_is_fine() {
        assert_eq!(judge("{ a: baseline }", "{ a: world }", "{ a: wwoorrlldd }"), Ok(()));
    }

    #[test]
    fn data_driven_keys_are_rejected() {
        // Same kinds and counts everywhere, but the key text disagrees
        // across the passes: a renamed key, not a changed value.
        assert_eq!(
            judge("{ baseline: 1 }", "{ a: 1 }", "{ aa: 1 }"),
            Err(Mismatch::Injection)
        );
        assert_eq!(
            judge("{ outer: { baseline: x } }", "{ outer: { k: x } }", "{ outer: { kk: x } }"),
            Err(Mismatch::Injection)
        );
    }

    #[test]
    fn new_keys_are_injection() {
        assert_eq!(
            judge("{ a: baseline }", "{ a: w, oops: true }", "{ a: ww, oops: true }"),
            Err(Mismatch::Injection)
        );
    }

    #[test]
    fn kind_changes_are_injection() {
        assert_eq!(
            judge("{ a: baseline }", "{ a: [1, 2] }", "{ a: [1, 2] }"),
            Err(Mismatch::Injection)
        );
    }

    #[test]
    fn introduced_alias_is_injection() {
        assert_eq!(
            judge("{ s: &x t, a: baseline }", "{ s: &x t, a: *x }", "{ s: &x t, a: baseline }"),
            Err(Mismatch::Injection)
        );
    }

    #[test]
    fn duplicate_keys_invalidate_template() {
        assert_eq!(
            judge("{ a: baseline, a: two }", "{ a: x, a: two }", "{ a: xx, a: two }"),
            Err(Mismatch::InvalidTemplate)
        );
    }

    #[test]
    fn non_scalar_keys_invalidate_template() {
        assert_eq!(
            judge("{ {}: baseline }", "{ {}: x }", "{ {}: xx }"),
            Err(Mismatch::InvalidTemplate)
        );
    }

    #[test]
    fn baseline_validation_walks_nested_mappings() {
        let docs = parse_documents("a:\n  b: 1\n  b: 2\n").unwrap();
        assert_eq!(validate_documents(&docs), Err(Mismatch::InvalidTemplate));

        let docs = parse_documents("a: [1, {x: y}]\n").unwrap();
        assert_eq!(validate_documents(&docs), Ok(()));
    }

    #[test]
    fn document_count_must_agree() {
        assert_eq!(
            judge("---\na: baseline\n", "---\na: x\n---\nb: y\n", "---\na: xx\n"),
            Err(Mismatch::Injection)
        );
    }
}
