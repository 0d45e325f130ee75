//! Document trees built from parser events.
//!
//! The judge needs to see everything the value-level YAML APIs erase:
//! document boundaries, node kinds, mapping pair order, duplicate keys and
//! alias nodes. Loading at the event level keeps all of it: a small stack
//! machine folds the event stream into one tree per document.

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::Marker;

/// One node of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum YamlNode {
    Scalar { value: String },
    Sequence { items: Vec<YamlNode> },
    Mapping { entries: Vec<(YamlNode, YamlNode)> },
    /// A `*name` reference. Kept distinct from the scalar it resolves to:
    /// an alias appearing where the baseline had a plain scalar is a
    /// structural change.
    Alias,
}

impl YamlNode {
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            YamlNode::Scalar { .. } => "scalar",
            YamlNode::Sequence { .. } => "sequence",
            YamlNode::Mapping { .. } => "mapping",
            YamlNode::Alias => "alias",
        }
    }
}

enum Frame {
    Sequence(Vec<YamlNode>),
    Mapping {
        entries: Vec<(YamlNode, YamlNode)>,
        pending_key: Option<YamlNode>,
    },
}

#[derive(Default)]
struct DocumentBuilder {
    documents: Vec<YamlNode>,
    stack: Vec<Frame>,
}

impl DocumentBuilder {
    fn finish_node(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            Some(Frame::Sequence(items)) => items.push(node),
            Some(Frame::Mapping { entries, pending_key }) => match pending_key.take() {
                Some(key) => entries.push((key, node)),
                None => *pending_key = Some(node),
            },
            None => self.documents.push(node),
        }
    }
}

impl MarkedEventReceiver for DocumentBuilder {
    fn on_event(&mut self, ev: Event, _mark: Marker) {
        match ev {
            Event::Scalar(value, ..) => {
                self.finish_node(YamlNode::Scalar { value });
            }
            Event::Alias(..) => self.finish_node(YamlNode::Alias),
            Event::SequenceStart(..) => {
                self.stack.push(Frame::Sequence(Vec::new()));
            }
            Event::SequenceEnd => {
                if let Some(Frame::Sequence(items)) = self.stack.pop() {
                    self.finish_node(YamlNode::Sequence { items });
                }
            }
            Event::MappingStart(..) => {
                self.stack.push(Frame::Mapping {
                    entries: Vec::new(),
                    pending_key: None,
                });
            }
            Event::MappingEnd => {
                if let Some(Frame::Mapping { entries, .. }) = self.stack.pop() {
                    self.finish_node(YamlNode::Mapping { entries });
                }
            }
            // Stream and document delimiters carry no node content.
            _ => {}
        }
    }
}

/// Parses `source` as a stream of documents, one root node per document.
///
/// Any scan or parse error (including an alias naming an unknown anchor)
/// is reported as `Err`.
pub(crate) fn parse_documents(source: &str) -> Result<Vec<YamlNode>, String> {
    let mut parser = Parser::new_from_str(source);
    let mut builder = DocumentBuilder::default();
    parser
        .load(&mut builder, true)
        .map_err(|e| e.to_string())?;
    Ok(builder.documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_nested_documents() {
        let docs = parse_documents("a: [1, 2]\nb:\n  c: d\n").unwrap();
        assert_eq!(docs.len(), 1);
        let YamlNode::Mapping { entries } = &docs[0] else {
            panic!("expected a mapping root");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, YamlNode::Scalar { value: "a".into() });
        assert!(matches!(entries[0].1, YamlNode::Sequence { .. }));
        assert!(matches!(entries[1].1, YamlNode::Mapping { .. }));
    }

    #[test]
    fn splits_document_streams() {
        let docs = parse_documents("---\n- one\n---\n- two\n").unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn aliases_are_distinct_nodes() {
        let docs = parse_documents("a: &x t\nb: *x\n").unwrap();
        let YamlNode::Mapping { entries } = &docs[0] else {
            panic!("expected a mapping root");
        };
        assert_eq!(entries[1].1, YamlNode::Alias);
    }

    #[test]
    fn unknown_anchor_is_a_parse_error() {
        assert!(parse_documents("a: *nowhere\n").is_err());
    }

    #[test]
    fn keeps_duplicate_keys() {
        let docs = parse_documents("{ k: 1, k: 2 }").unwrap();
        let YamlNode::Mapping { entries } = &docs[0] else {
            panic!("expected a mapping root");
        };
        assert_eq!(entries.len(), 2);
    }
}
