use crate::error::{PipelineError, Result};
use crate::types::RawRow;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One element of the parsed tree.
///
/// Attributes and text-only child elements are merged into `fields`; elements
/// that carry attributes or children of their own, and every element directly
/// under the document root, are kept under `children`, always as a sequence
/// even when they occur once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Node {
    fields: RawRow,
    children: BTreeMap<String, Vec<Node>>,
}

impl Node {
    pub fn fields(&self) -> &RawRow {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name)
    }

    /// Every child element with this name, in document order. Empty if none.
    pub fn elements(&self, name: &str) -> &[Node] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_leaf(&self) -> bool {
        self.fields.is_empty() && self.children.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupDocument {
    pub root_name: String,
    pub root: Node,
}

struct OpenElement {
    name: String,
    node: Node,
    text: String,
}

/// Parses a whole markup document. Any structural problem fails the whole
/// parse; no partial tree is returned.
pub fn parse_document(input: &str) -> Result<MarkupDocument> {
    debug!("parse_document: start bytes_len={}", input.len());
    let mut reader = Reader::from_str(input);

    let mut stack: Vec<OpenElement> = Vec::new();
    let mut root: Option<MarkupDocument> = None;

    loop {
        let position = reader.buffer_position();
        let event = reader.read_event().map_err(|e| malformed(position, e))?;
        match event {
            Event::Start(start) => {
                ensure_single_root(&root, &stack, position)?;
                stack.push(open_element(&start, position)?);
            }
            Event::Empty(start) => {
                ensure_single_root(&root, &stack, position)?;
                let element = open_element(&start, position)?;
                close_element(element, &mut stack, &mut root);
            }
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                let element = stack.pop().ok_or_else(|| PipelineError::MalformedDocument {
                    position,
                    message: format!("unexpected closing tag </{}>", name),
                })?;
                if element.name != name {
                    return Err(PipelineError::MalformedDocument {
                        position,
                        message: format!("expected </{}>, found </{}>", element.name, name),
                    });
                }
                close_element(element, &mut stack, &mut root);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| malformed(position, e))?;
                append_text(&mut stack, &text, position)?;
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                append_text(&mut stack, &String::from_utf8_lossy(&bytes), position)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no fields
            _ => {}
        }
    }

    if let Some(open) = stack.last() {
        return Err(PipelineError::MalformedDocument {
            position: reader.buffer_position(),
            message: format!("unclosed element <{}>", open.name),
        });
    }

    let document = root.ok_or_else(|| PipelineError::MalformedDocument {
        position: reader.buffer_position(),
        message: "document has no root element".to_string(),
    })?;
    info!("Parsed markup document with root <{}>", document.root_name);
    Ok(document)
}

fn malformed(position: usize, err: impl std::fmt::Display) -> PipelineError {
    PipelineError::MalformedDocument {
        position,
        message: err.to_string(),
    }
}

fn ensure_single_root(
    root: &Option<MarkupDocument>,
    stack: &[OpenElement],
    position: usize,
) -> Result<()> {
    match root {
        Some(doc) if stack.is_empty() => Err(PipelineError::MalformedDocument {
            position,
            message: format!("content after root element <{}>", doc.root_name),
        }),
        _ => Ok(()),
    }
}

fn open_element(start: &BytesStart<'_>, position: usize) -> Result<OpenElement> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut node = Node::default();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(position, e))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| malformed(position, e))?;
        node.fields.insert(key, value.into_owned());
    }
    Ok(OpenElement {
        name,
        node,
        text: String::new(),
    })
}

fn append_text(stack: &mut [OpenElement], text: &str, position: usize) -> Result<()> {
    match stack.last_mut() {
        Some(open) => {
            open.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(PipelineError::MalformedDocument {
            position,
            message: "text outside of the root element".to_string(),
        }),
    }
}

/// Attaches a finished element to its parent, or makes it the root.
fn close_element(
    element: OpenElement,
    stack: &mut [OpenElement],
    root: &mut Option<MarkupDocument>,
) {
    let OpenElement { name, node, text } = element;
    let parent_is_root = stack.len() == 1;

    let Some(parent) = stack.last_mut() else {
        *root = Some(MarkupDocument {
            root_name: name,
            root: node,
        });
        return;
    };

    if node.is_leaf() && !parent_is_root {
        // <Title>x</Title> reads exactly like Title="x"
        let value = if text.trim().is_empty() { String::new() } else { text };
        parent.node.fields.insert(name, value);
    } else {
        parent.node.children.entry(name).or_default().push(node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attributes_and_children_merge_into_fields() {
        let doc = parse_document(
            r#"<?xml version="1.0" encoding="utf-8"?>
            <posts>
              <row Id="1" ViewCount="30000"><Title>Hello &amp; bye</Title></row>
              <row Id="2"><ViewCount>10</ViewCount></row>
            </posts>"#,
        )
        .unwrap();

        assert_eq!(doc.root_name, "posts");
        let rows = doc.root.elements("row");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].field("Id"), Some("1"));
        assert_eq!(rows[0].field("ViewCount"), Some("30000"));
        assert_eq!(rows[0].field("Title"), Some("Hello & bye"));
        assert_eq!(rows[1].field("ViewCount"), Some("10"));
    }

    #[test]
    fn test_single_row_is_still_a_sequence() {
        let doc = parse_document(r#"<posts><row Id="9" /></posts>"#).unwrap();
        let rows = doc.root.elements("row");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field("Id"), Some("9"));
    }

    #[test]
    fn test_bare_rows_under_root_are_still_elements() {
        let doc = parse_document(r#"<posts><row Id="1"/><row/><row>loose</row></posts>"#).unwrap();
        let rows = doc.root.elements("row");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].field("Id"), Some("1"));
        assert!(rows[1].fields().is_empty());
        assert_eq!(doc.root.field("row"), None);
    }

    #[test]
    fn test_child_text_keeps_inner_spacing() {
        let doc = parse_document(
            "<posts>\n  <row Id=\"1\">\n    <Title> padded title </Title>\n    <Body>   </Body>\n  </row>\n</posts>",
        )
        .unwrap();
        let row = &doc.root.elements("row")[0];
        assert_eq!(row.field("Title"), Some(" padded title "));
        assert_eq!(row.field("Body"), Some(""));
        assert_eq!(row.field("Id"), Some("1"));
    }

    #[test]
    fn test_missing_elements_are_an_empty_sequence() {
        let doc = parse_document("<posts></posts>").unwrap();
        assert!(doc.root.elements("row").is_empty());
    }

    #[test]
    fn test_attribute_entities_are_decoded() {
        let doc = parse_document(r#"<posts><row Body="&lt;p&gt;x&lt;/p&gt;&#xA;y" /></posts>"#).unwrap();
        assert_eq!(doc.root.elements("row")[0].field("Body"), Some("<p>x</p>\ny"));
    }

    #[test]
    fn test_mismatched_tags_fail() {
        let err = parse_document("<posts><row Id=\"1\"></posts>").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
    }

    #[test]
    fn test_unclosed_root_fails() {
        let err = parse_document("<posts><row Id=\"1\"/>").unwrap_err();
        assert!(matches!(err, PipelineError::MalformedDocument { .. }));
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(parse_document("").is_err());
        assert!(parse_document("   \n").is_err());
    }

    #[test]
    fn test_second_root_fails() {
        assert!(parse_document("<posts/><posts/>").is_err());
    }
}
