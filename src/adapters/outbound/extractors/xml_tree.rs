//! A small position-aware XML tree on top of `quick-xml`.

use crate::sbom_generation::domain::{FilePosition, Position};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

/// Byte offsets of line starts, for offset to line/column conversion.
#[derive(Debug)]
pub struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .char_indices()
                .filter(|(_, c)| *c == '\n')
                .map(|(i, _)| i + 1),
        );
        Self { source, starts }
    }

    /// 1-based line and column of the character at byte `offset`.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let line = self.starts.partition_point(|&start| start <= offset).max(1);
        let line_start = self.starts[line - 1];
        let column = self
            .source
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0)
            + 1;
        (line, column)
    }

    /// Position of the byte range `[start, end)`.
    pub fn span(&self, start: usize, end: usize) -> FilePosition {
        let (line_start, column_start) = self.locate(start);
        let (line_end, column_end) = self.locate(end);
        FilePosition::new(
            String::new(),
            Position::new(line_start, line_end),
            Position::new(column_start, column_end),
        )
    }
}

/// One element with its byte range in the source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
    /// Unescaped text content, trimmed.
    pub text: String,
    /// From `<` of the start tag to just past `>` of the end tag.
    pub start: usize,
    pub end: usize,
    /// Trimmed text content range, when the element has text.
    pub text_range: Option<(usize, usize)>,
}

impl XmlNode {
    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.name == name)
    }

    pub fn children_named<'n>(&'n self, name: &'n str) -> impl Iterator<Item = &'n XmlNode> + 'n {
        self.children.iter().filter(move |child| child.name == name)
    }

    /// Text of the direct child `name`, empty when absent.
    pub fn child_text(&self, name: &str) -> &str {
        self.child(name).map(|child| child.text.as_str()).unwrap_or("")
    }

    /// Follows a path of child names.
    pub fn descend(&self, path: &[&str]) -> Option<&XmlNode> {
        path.iter().try_fold(self, |node, name| node.child(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn local_name(bytes: &[u8]) -> String {
    let name = String::from_utf8_lossy(bytes);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.into_owned(),
    }
}

fn open_node(start: &BytesStart<'_>, offset: usize) -> Result<XmlNode, String> {
    let mut node = XmlNode {
        name: local_name(start.name().as_ref()),
        start: offset,
        ..XmlNode::default()
    };

    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        let value = attribute.unescape_value().map_err(|e| e.to_string())?;
        node.attributes
            .push((local_name(attribute.key.as_ref()), value.into_owned()));
    }

    Ok(node)
}

fn append_text(node: &mut XmlNode, raw: &str, text: &str, offset: usize) {
    let leading = raw.len() - raw.trim_start().len();
    let trimmed_len = raw.trim().len();
    if trimmed_len == 0 {
        return;
    }

    let range = (offset + leading, offset + leading + trimmed_len);
    node.text_range = Some(match node.text_range {
        Some((start, _)) => (start, range.1),
        None => range,
    });
    node.text.push_str(text.trim());
}

/// Parses `source` into its root element.
///
/// # Errors
/// Returns the parser's message for malformed documents and for documents
/// without a root element.
pub fn parse_xml(source: &str) -> Result<XmlNode, String> {
    let mut reader = Reader::from_str(source);
    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        let offset = reader.buffer_position() as usize;
        let event = reader
            .read_event()
            .map_err(|e| format!("{} (at byte {})", e, offset))?;
        let after = reader.buffer_position() as usize;

        match event {
            Event::Start(start) => stack.push(open_node(&start, offset)?),
            Event::Empty(start) => {
                let mut node = open_node(&start, offset)?;
                node.end = after;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Event::End(_) => {
                let Some(mut node) = stack.pop() else {
                    return Err("unexpected closing tag".to_string());
                };
                node.end = after;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => root = root.or(Some(node)),
                }
            }
            Event::Text(text) => {
                if let Some(node) = stack.last_mut() {
                    let raw = source.get(offset..after).unwrap_or_default();
                    let unescaped = text.unescape().map_err(|e| e.to_string())?;
                    append_text(node, raw, &unescaped, offset);
                }
            }
            Event::CData(data) => {
                if let Some(node) = stack.last_mut() {
                    let content = String::from_utf8_lossy(data.as_ref()).into_owned();
                    let content_offset = offset + "<![CDATA[".len();
                    append_text(node, &content, &content, content_offset);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".to_string());
    }
    root.ok_or_else(|| "document has no root element".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const POM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<project xmlns="http://maven.apache.org/POM/4.0.0">
  <groupId>org.acme</groupId>
  <dependencies>
    <dependency>
      <groupId>x</groupId>
      <artifactId>y</artifactId>
      <version>${foo.version}</version>
    </dependency>
  </dependencies>
  <empty attr="a &amp; b"/>
</project>
"#;

    #[test]
    fn test_parse_tree() {
        let root = parse_xml(POM).unwrap();
        assert_eq!(root.name, "project");
        assert_eq!(root.child_text("groupId"), "org.acme");

        let dependency = root.descend(&["dependencies", "dependency"]).unwrap();
        assert_eq!(dependency.child_text("artifactId"), "y");
        assert_eq!(dependency.child_text("version"), "${foo.version}");
        assert_eq!(root.child("empty").unwrap().attribute("attr"), Some("a & b"));
    }

    #[test]
    fn test_element_positions() {
        let root = parse_xml(POM).unwrap();
        let index = LineIndex::new(POM);
        let dependency = root.descend(&["dependencies", "dependency"]).unwrap();

        let block = index.span(dependency.start, dependency.end);
        assert_eq!(block.line, Position::new(5, 9));
        assert_eq!(block.column, Position::new(5, 18));

        let version = dependency.child("version").unwrap();
        let (start, end) = version.text_range.unwrap();
        let text = index.span(start, end);
        assert_eq!(text.line, Position::at(8));
        assert_eq!(text.column, Position::new(16, 30));
    }

    #[test]
    fn test_malformed_document() {
        assert!(parse_xml("<project><a></b></project>").is_err());
        assert!(parse_xml("").is_err());
    }

    #[test]
    fn test_line_index_locate() {
        let index = LineIndex::new("ab\ncd\n");
        assert_eq!(index.locate(0), (1, 1));
        assert_eq!(index.locate(3), (2, 1));
        assert_eq!(index.locate(4), (2, 2));
    }
}
