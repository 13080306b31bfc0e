use crate::index::errors::IndexError;
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Tree-sitter parser wrapper for Objective-C source code.
pub struct ObjcParser {
    parser: Parser,
}

impl ObjcParser {
    pub fn new() -> Result<Self, IndexError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_objc::LANGUAGE.into())
            .map_err(|_| IndexError::LanguageSet)?;
        Ok(Self { parser })
    }

    /// Parse source bytes into a tree-sitter Tree.
    ///
    /// `path` is only used for error reporting.
    pub fn parse(&mut self, path: &Path, source: Vec<u8>) -> Result<ParsedSource, IndexError> {
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| IndexError::ParseFailed {
                path: path.to_path_buf(),
            })?;
        Ok(ParsedSource { source, tree })
    }
}

/// A parsed source file with its tree-sitter tree.
pub struct ParsedSource {
    pub source: Vec<u8>,
    pub tree: Tree,
}

impl ParsedSource {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Check if the tree contains any ERROR or MISSING nodes.
    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Get all ERROR and MISSING nodes in the tree.
    pub fn error_nodes(&self) -> Vec<ErrorNode> {
        let mut errors = Vec::new();
        collect_error_nodes(self.tree.root_node(), &mut errors);
        errors
    }

    /// Source bytes covered by a node. Lossy for invalid UTF-8.
    pub fn node_text(&self, node: Node<'_>) -> String {
        String::from_utf8_lossy(&self.source[node.byte_range()]).into_owned()
    }
}

/// Information about an ERROR node in the parse tree.
#[derive(Debug, Clone)]
pub struct ErrorNode {
    pub byte_start: usize,
}

fn collect_error_nodes(node: Node<'_>, errors: &mut Vec<ErrorNode>) {
    if node.is_error() || node.is_missing() {
        errors.push(ErrorNode {
            byte_start: node.start_byte(),
        });
    }

    if !node.has_error() {
        return;
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_error_nodes(child, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedSource {
        let mut parser = ObjcParser::new().unwrap();
        parser
            .parse(Path::new("test.m"), source.as_bytes().to_vec())
            .unwrap()
    }

    #[test]
    fn parse_valid_objc() {
        let parsed = parse("@implementation A\n- (void)run { [self stop]; }\n@end\n");
        assert!(!parsed.has_errors());
        assert!(parsed.error_nodes().is_empty());
        assert_eq!(parsed.root_node().kind(), "translation_unit");
    }

    #[test]
    fn parse_invalid_objc() {
        let parsed = parse("@implementation A\n- (void)run { if ( }\n");
        assert!(parsed.has_errors());
        assert!(!parsed.error_nodes().is_empty());
    }

    #[test]
    fn node_text_slices_source() {
        let parsed = parse("int x = 1;");
        assert_eq!(parsed.node_text(parsed.root_node()), "int x = 1;");
    }
}
