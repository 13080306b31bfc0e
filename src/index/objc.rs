//! Tree-sitter backed Objective-C indexer.
//!
//! Declarations are recognized by the tokens they start with rather than by
//! exact grammar node names: a `method` node opening with `-` or `+` is a
//! method, a container opening with `@implementation`, `@interface` or
//! `@protocol` is a class-level declaration.

use crate::index::errors::IndexError;
use crate::index::parser::{ObjcParser, ParsedSource};
use crate::index::{
    line_column, Cursor, DeclKind, Declaration, DeclarationVisitor, Indexer, SourceExtent,
    SourceLocation, Token, TokenKind, TranslationUnit, VisitControl,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use tree_sitter::Node;
use xxhash_rust::xxh3::xxh3_64;

/// Nodes reported as a single token even though the grammar gives them children.
fn is_atomic(kind: &str) -> bool {
    kind == "comment" || kind.ends_with("_literal") || kind == "system_lib_string"
}

/// Builds [`ObjcUnit`]s from files on disk.
pub struct ObjcIndexer {
    parser: ObjcParser,
    strict: bool,
}

impl ObjcIndexer {
    pub fn new() -> Result<Self, IndexError> {
        Ok(Self {
            parser: ObjcParser::new()?,
            strict: false,
        })
    }

    /// Reject sources containing syntax errors instead of indexing around them.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }
}

impl Indexer for ObjcIndexer {
    type Unit = ObjcUnit;

    fn parse(&mut self, path: &Path, args: &[String]) -> Result<ObjcUnit, IndexError> {
        debug!(file = %path.display(), ?args, "building translation unit");

        let source = fs::read(path).map_err(|source| IndexError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let fingerprint = xxh3_64(&source);
        let parsed = self.parser.parse(path, source)?;

        if parsed.has_errors() {
            let errors = parsed.error_nodes();
            let first = errors.first().map(|e| e.byte_start).unwrap_or(0);
            if self.strict {
                return Err(IndexError::SyntaxErrors {
                    path: path.to_path_buf(),
                    count: errors.len(),
                    first,
                });
            }
            warn!(
                file = %path.display(),
                count = errors.len(),
                first,
                "source has syntax errors, indexing what parsed"
            );
        }

        Ok(ObjcUnit {
            path: path.to_path_buf(),
            parsed,
            fingerprint,
        })
    }
}

/// One parsed Objective-C file.
pub struct ObjcUnit {
    path: PathBuf,
    parsed: ParsedSource,
    fingerprint: u64,
}

impl ObjcUnit {
    fn walk(
        &self,
        node: Node<'_>,
        container: Option<&str>,
        visitor: &mut dyn DeclarationVisitor,
    ) -> VisitControl {
        let mut scope = None;

        if let Some(kind) = self.declaration_kind(node) {
            let extent = SourceExtent::new(node.start_byte(), node.end_byte());
            match kind {
                DeclKind::Interface | DeclKind::Implementation => {
                    let name = self.container_name(node).unwrap_or_default();
                    let decl = Declaration {
                        kind,
                        name: &name,
                        container: None,
                        extent,
                        is_definition: kind == DeclKind::Implementation,
                    };
                    if visitor.visit_declaration(self, &decl) == VisitControl::Break {
                        return VisitControl::Break;
                    }
                    scope = Some(name);
                }
                DeclKind::InstanceMethod | DeclKind::ClassMethod | DeclKind::Function => {
                    let name = match kind {
                        DeclKind::Function => self.function_name(node),
                        _ => self.selector(extent),
                    };
                    if let Some(name) = name {
                        let decl = Declaration {
                            kind,
                            name: &name,
                            container,
                            extent,
                            is_definition: has_body(node),
                        };
                        if visitor.visit_declaration(self, &decl) == VisitControl::Break {
                            return VisitControl::Break;
                        }
                    }
                    // Bodies hold no further declarations we report.
                    return VisitControl::Continue;
                }
            }
        }

        let container = scope.as_deref().or(container);
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if self.walk(child, container, visitor) == VisitControl::Break {
                return VisitControl::Break;
            }
        }
        VisitControl::Continue
    }

    fn declaration_kind(&self, node: Node<'_>) -> Option<DeclKind> {
        if !node.is_named() || node.is_error() || node.is_missing() {
            return None;
        }

        let kind = node.kind();
        if kind == "function_definition" {
            return Some(DeclKind::Function);
        }
        if kind == "translation_unit" {
            return None;
        }

        if kind.contains("method") {
            return match self.leading_text(node).as_deref() {
                Some("-") => Some(DeclKind::InstanceMethod),
                Some("+") => Some(DeclKind::ClassMethod),
                _ => None,
            };
        }

        if kind.contains("implementation") || kind.contains("interface") || kind.contains("protocol")
        {
            return match self.leading_text(node).as_deref() {
                Some("@implementation") => Some(DeclKind::Implementation),
                Some("@interface") | Some("@protocol") => Some(DeclKind::Interface),
                _ => None,
            };
        }

        None
    }

    /// Text of the node's first leaf, joining a lone `@` with the word after it.
    fn leading_text(&self, node: Node<'_>) -> Option<String> {
        let mut leaves = Vec::with_capacity(2);
        collect_leaves(node, 2, &mut leaves);
        let first = self.parsed.node_text(*leaves.first()?);
        if first == "@" {
            if let Some(second) = leaves.get(1) {
                return Some(format!("@{}", self.parsed.node_text(*second)));
            }
        }
        Some(first)
    }

    fn container_name(&self, node: Node<'_>) -> Option<String> {
        if let Some(name) = node.child_by_field_name("name") {
            return Some(self.parsed.node_text(name));
        }
        let mut leaves = Vec::new();
        collect_leaves(node, 8, &mut leaves);
        leaves
            .into_iter()
            .find(|leaf| matches!(leaf.kind(), "identifier" | "type_identifier"))
            .map(|leaf| self.parsed.node_text(leaf))
    }

    fn function_name(&self, node: Node<'_>) -> Option<String> {
        let mut current = node.child_by_field_name("declarator")?;
        while let Some(inner) = current.child_by_field_name("declarator") {
            current = inner;
        }
        matches!(current.kind(), "identifier" | "field_identifier")
            .then(|| self.parsed.node_text(current))
    }

    /// Derive a method's selector from its header tokens.
    ///
    /// `- (void)run` yields `run`; `- (BOOL)application:(id)a didFinish:(id)b`
    /// yields `application:didFinish:`. Parenthesised groups and parameter
    /// names are skipped; the header ends at the body or at `;`.
    fn selector(&self, extent: SourceExtent) -> Option<String> {
        selector_from_tokens(&self.tokenize(extent))
    }

    fn token_for(&self, node: Node<'_>) -> Token {
        let spelling = self.parsed.node_text(node);
        let kind = classify(node, &spelling);
        Token::new(
            kind,
            spelling,
            SourceExtent::new(node.start_byte(), node.end_byte()),
        )
    }

    fn collect_tokens(&self, node: Node<'_>, extent: SourceExtent, out: &mut Vec<Token>) {
        if node.end_byte() <= extent.start || node.start_byte() >= extent.end {
            return;
        }

        if node.child_count() == 0 || is_atomic(node.kind()) {
            let span = SourceExtent::new(node.start_byte(), node.end_byte());
            if !span.is_empty() && extent.contains(span) {
                out.push(self.token_for(node));
            }
            return;
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.collect_tokens(child, extent, out);
        }
    }
}

impl TranslationUnit for ObjcUnit {
    fn path(&self) -> &Path {
        &self.path
    }

    fn traverse(&self, visitor: &mut dyn DeclarationVisitor) {
        self.walk(self.parsed.root_node(), None, visitor);
    }

    fn tokenize(&self, extent: SourceExtent) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.collect_tokens(self.parsed.root_node(), extent, &mut tokens);
        tokens
    }

    fn annotate(&self, tokens: &[Token]) -> Vec<Cursor> {
        let root = self.parsed.root_node();
        tokens
            .iter()
            .map(|token| {
                let kind = root
                    .named_descendant_for_byte_range(token.extent.start, token.extent.end)
                    .map(|node| node.kind())
                    .unwrap_or("translation_unit");
                Cursor {
                    kind,
                    offset: token.extent.start,
                }
            })
            .collect()
    }

    fn resolve_location(&self, cursor: &Cursor) -> SourceLocation {
        let (line, column) = line_column(&self.parsed.source, cursor.offset);
        SourceLocation {
            file: self.path.clone(),
            line,
            column,
            offset: cursor.offset,
        }
    }

    fn fingerprint(&self) -> Option<u64> {
        Some(self.fingerprint)
    }
}

fn classify(node: Node<'_>, spelling: &str) -> TokenKind {
    let kind = node.kind();
    if node.is_named() && !node.is_error() {
        return match kind {
            "comment" => TokenKind::Comment,
            "true" | "false" | "null" | "nil" | "YES" | "NO" => TokenKind::Literal,
            "primitive_type" => TokenKind::Keyword,
            k if is_atomic(k) => TokenKind::Literal,
            _ => TokenKind::Identifier,
        };
    }
    if spelling
        .chars()
        .any(|c| c.is_alphanumeric() || c == '_')
    {
        TokenKind::Keyword
    } else {
        TokenKind::Punctuation
    }
}

fn has_body(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "compound_statement" {
            return true;
        }
    }
    false
}

/// Collect up to `limit` non-empty leaves of `node` in source order.
fn collect_leaves<'t>(node: Node<'t>, limit: usize, out: &mut Vec<Node<'t>>) {
    if out.len() >= limit {
        return;
    }
    if node.child_count() == 0 || is_atomic(node.kind()) {
        if node.end_byte() > node.start_byte() {
            out.push(node);
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        collect_leaves(child, limit, out);
        if out.len() >= limit {
            return;
        }
    }
}

pub(crate) fn selector_from_tokens(tokens: &[Token]) -> Option<String> {
    let mut depth = 0usize;
    let mut first_word: Option<&str> = None;
    let mut last_word: Option<&str> = None;
    let mut expecting_param = false;
    let mut parts = Vec::new();

    // Skip the leading `-` / `+`.
    for token in tokens.iter().skip(1) {
        if token.kind == TokenKind::Comment {
            continue;
        }
        if token.kind == TokenKind::Punctuation {
            match token.spelling.as_str() {
                "(" => depth += 1,
                ")" => depth = depth.saturating_sub(1),
                "{" | ";" if depth == 0 => break,
                ":" if depth == 0 => {
                    parts.push(format!("{}:", last_word.take().unwrap_or("")));
                    expecting_param = true;
                }
                _ => {}
            }
            continue;
        }
        if depth > 0 || !matches!(token.kind, TokenKind::Identifier | TokenKind::Keyword) {
            continue;
        }
        if expecting_param {
            expecting_param = false;
            continue;
        }
        first_word.get_or_insert(token.spelling.as_str());
        last_word = Some(token.spelling.as_str());
    }

    if parts.is_empty() {
        first_word.map(str::to_string)
    } else {
        Some(parts.concat())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn unit_for(source: &str) -> (tempfile::NamedTempFile, ObjcUnit) {
        let mut file = tempfile::Builder::new().suffix(".m").tempfile().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        let mut indexer = ObjcIndexer::new().unwrap();
        let unit = indexer.parse(file.path(), &[]).unwrap();
        (file, unit)
    }

    fn declarations(unit: &ObjcUnit) -> Vec<(DeclKind, String, Option<String>, bool)> {
        let mut seen = Vec::new();
        let mut visitor = |_: &dyn TranslationUnit, decl: &Declaration<'_>| {
            seen.push((
                decl.kind,
                decl.name.to_string(),
                decl.container.map(str::to_string),
                decl.is_definition,
            ));
            VisitControl::Continue
        };
        unit.traverse(&mut visitor);
        seen
    }

    fn tok(kind: TokenKind, spelling: &str) -> Token {
        Token::new(kind, spelling, SourceExtent::new(0, spelling.len()))
    }

    #[test]
    fn selector_unary() {
        let tokens = vec![
            tok(TokenKind::Punctuation, "-"),
            tok(TokenKind::Punctuation, "("),
            tok(TokenKind::Keyword, "void"),
            tok(TokenKind::Punctuation, ")"),
            tok(TokenKind::Identifier, "run"),
            tok(TokenKind::Punctuation, "{"),
            tok(TokenKind::Identifier, "ignored"),
        ];
        assert_eq!(selector_from_tokens(&tokens).as_deref(), Some("run"));
    }

    #[test]
    fn selector_keyword_parts() {
        let tokens = vec![
            tok(TokenKind::Punctuation, "-"),
            tok(TokenKind::Punctuation, "("),
            tok(TokenKind::Identifier, "BOOL"),
            tok(TokenKind::Punctuation, ")"),
            tok(TokenKind::Identifier, "application"),
            tok(TokenKind::Punctuation, ":"),
            tok(TokenKind::Punctuation, "("),
            tok(TokenKind::Identifier, "UIApplication"),
            tok(TokenKind::Punctuation, "*"),
            tok(TokenKind::Punctuation, ")"),
            tok(TokenKind::Identifier, "application"),
            tok(TokenKind::Identifier, "didFinishLaunchingWithOptions"),
            tok(TokenKind::Punctuation, ":"),
            tok(TokenKind::Punctuation, "("),
            tok(TokenKind::Identifier, "NSDictionary"),
            tok(TokenKind::Punctuation, "*"),
            tok(TokenKind::Punctuation, ")"),
            tok(TokenKind::Identifier, "launchOptions"),
            tok(TokenKind::Punctuation, ";"),
        ];
        assert_eq!(
            selector_from_tokens(&tokens).as_deref(),
            Some("application:didFinishLaunchingWithOptions:")
        );
    }

    #[test]
    fn selector_ignores_trailing_attribute_on_unary() {
        let tokens = vec![
            tok(TokenKind::Punctuation, "-"),
            tok(TokenKind::Identifier, "viewDidLoad"),
            tok(TokenKind::Identifier, "NS_REQUIRES_SUPER"),
            tok(TokenKind::Punctuation, ";"),
        ];
        assert_eq!(selector_from_tokens(&tokens).as_deref(), Some("viewDidLoad"));
    }

    #[test]
    fn selector_missing_name() {
        let tokens = vec![tok(TokenKind::Punctuation, "-"), tok(TokenKind::Punctuation, ";")];
        assert_eq!(selector_from_tokens(&tokens), None);
    }

    #[test]
    fn traverse_reports_methods_with_container() {
        let (_file, unit) = unit_for(
            "@implementation Greeter\n\
             - (void)run { }\n\
             - (void)greet:(NSString *)name times:(int)count { }\n\
             + (id)shared { return nil; }\n\
             @end\n",
        );
        let decls = declarations(&unit);
        let methods: Vec<_> = decls.iter().filter(|d| d.0.is_method()).collect();

        assert_eq!(methods.len(), 3);
        assert_eq!(methods[0].0, DeclKind::InstanceMethod);
        assert_eq!(methods[0].1, "run");
        assert_eq!(methods[0].2.as_deref(), Some("Greeter"));
        assert!(methods[0].3);
        assert_eq!(methods[1].1, "greet:times:");
        assert_eq!(methods[2].0, DeclKind::ClassMethod);
        assert_eq!(methods[2].1, "shared");
    }

    #[test]
    fn traverse_reports_interface_declarations_without_body() {
        let (_file, unit) = unit_for("@interface Greeter : NSObject\n- (void)run;\n@end\n");
        let decls = declarations(&unit);
        let run = decls
            .iter()
            .find(|d| d.1 == "run")
            .expect("run declaration");
        assert_eq!(run.0, DeclKind::InstanceMethod);
        assert!(!run.3);
    }

    #[test]
    fn traverse_stops_on_break() {
        let (_file, unit) = unit_for(
            "@implementation A\n- (void)one { }\n- (void)two { }\n@end\n",
        );
        let mut visited = Vec::new();
        let mut visitor = |_: &dyn TranslationUnit, decl: &Declaration<'_>| {
            if decl.kind.is_method() {
                visited.push(decl.name.to_string());
                return VisitControl::Break;
            }
            VisitControl::Continue
        };
        unit.traverse(&mut visitor);
        assert_eq!(visited, vec!["one".to_string()]);
    }

    #[test]
    fn tokenize_marks_braces_as_punctuation() {
        let source = "@implementation A\n- (void)run { NSLog(@\"x\"); }\n@end\n";
        let (_file, unit) = unit_for(source);
        let start = source.find('-').unwrap();
        let end = source.find("}").unwrap() + 1;
        let tokens = unit.tokenize(SourceExtent::new(start, end));

        let brace = tokens
            .iter()
            .position(|t| t.is_punctuation("{"))
            .expect("opening brace");
        assert_eq!(tokens[brace + 1].spelling, "NSLog");
        assert_eq!(tokens[brace + 1].extent.start, source.find("NSLog").unwrap());
        assert!(tokens.last().unwrap().is_punctuation("}"));
    }

    #[test]
    fn annotate_is_parallel_and_resolves_locations() {
        let source = "@implementation A\n- (void)run { go(); }\n@end\n";
        let (file, unit) = unit_for(source);
        let tokens = unit.tokenize(SourceExtent::new(0, source.len()));
        let cursors = unit.annotate(&tokens);
        assert_eq!(tokens.len(), cursors.len());

        let go = tokens.iter().position(|t| t.spelling == "go").unwrap();
        let go_offset = source.find("go").unwrap();
        let line_start = source[..go_offset].rfind('\n').map_or(0, |i| i + 1);
        let location = unit.resolve_location(&cursors[go]);
        assert_eq!(location.file, file.path());
        assert_eq!(location.line, 2);
        assert_eq!(location.column, go_offset - line_start + 1);
        assert_eq!(location.column, 15);
        assert_eq!(location.offset, go_offset);
    }

    #[test]
    fn strict_mode_rejects_syntax_errors() {
        let mut file = tempfile::Builder::new().suffix(".m").tempfile().unwrap();
        file.write_all(b"@implementation A\n- (void)run { if ( }\n").unwrap();
        let mut indexer = ObjcIndexer::new().unwrap().strict(true);
        let result = indexer.parse(file.path(), &[]);
        assert!(matches!(result, Err(IndexError::SyntaxErrors { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut indexer = ObjcIndexer::new().unwrap();
        let result = indexer.parse(Path::new("/nonexistent/dir/App.m"), &[]);
        assert!(matches!(result, Err(IndexError::Io { .. })));
    }

    #[test]
    fn fingerprint_matches_source_hash() {
        let source = "int main(void) { return 0; }\n";
        let (_file, unit) = unit_for(source);
        assert_eq!(unit.fingerprint(), Some(xxh3_64(source.as_bytes())));
    }

    #[test]
    fn traverse_reports_c_functions() {
        let (_file, unit) = unit_for("int main(void) { return 0; }\n");
        let decls = declarations(&unit);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].0, DeclKind::Function);
        assert_eq!(decls[0].1, "main");
    }
}
