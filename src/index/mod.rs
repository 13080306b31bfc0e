//! Parser/indexer capability consumed by the injection engine.
//!
//! The engine never touches a syntax tree directly. It asks a
//! [`TranslationUnit`] to walk its declarations, to tokenize a byte range,
//! to annotate tokens with cursors and to resolve a cursor to a location.
//! [`ObjcIndexer`] is the built-in tree-sitter backend.

pub mod errors;
pub mod objc;
pub mod parser;

use serde::Serialize;
use std::path::{Path, PathBuf};

pub use errors::IndexError;
pub use objc::{ObjcIndexer, ObjcUnit};
pub use parser::{ObjcParser, ParsedSource};

/// Half-open byte range `[start, end)` in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceExtent {
    pub start: usize,
    pub end: usize,
}

impl SourceExtent {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `other` lies entirely inside this extent.
    pub fn contains(&self, other: SourceExtent) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Punctuation,
    Keyword,
    Identifier,
    Literal,
    Comment,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub spelling: String,
    pub extent: SourceExtent,
}

impl Token {
    pub fn new(kind: TokenKind, spelling: impl Into<String>, extent: SourceExtent) -> Self {
        Self {
            kind,
            spelling: spelling.into(),
            extent,
        }
    }

    pub fn is_punctuation(&self, spelling: &str) -> bool {
        self.kind == TokenKind::Punctuation && self.spelling == spelling
    }
}

/// A token's syntactic annotation: the innermost node the token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub kind: &'static str,
    pub offset: usize,
}

/// Fully resolved position. Line and column are 1-based; column counts bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceLocation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
    Interface,
    Implementation,
    InstanceMethod,
    ClassMethod,
    Function,
}

impl DeclKind {
    pub fn is_method(self) -> bool {
        matches!(self, DeclKind::InstanceMethod | DeclKind::ClassMethod)
    }
}

/// One declaration, as handed to a [`DeclarationVisitor`].
///
/// Borrows from the translation unit and only lives for one callback.
#[derive(Debug, Clone, Copy)]
pub struct Declaration<'a> {
    pub kind: DeclKind,
    pub name: &'a str,
    /// Enclosing class, category or protocol name, if any.
    pub container: Option<&'a str>,
    pub extent: SourceExtent,
    pub is_definition: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitControl {
    Continue,
    Break,
}

pub trait DeclarationVisitor {
    fn visit_declaration(
        &mut self,
        unit: &dyn TranslationUnit,
        decl: &Declaration<'_>,
    ) -> VisitControl;
}

impl<F> DeclarationVisitor for F
where
    F: FnMut(&dyn TranslationUnit, &Declaration<'_>) -> VisitControl,
{
    fn visit_declaration(
        &mut self,
        unit: &dyn TranslationUnit,
        decl: &Declaration<'_>,
    ) -> VisitControl {
        self(unit, decl)
    }
}

/// A parsed source file.
pub trait TranslationUnit {
    fn path(&self) -> &Path;

    /// Visit every declaration in document order until the visitor breaks.
    fn traverse(&self, visitor: &mut dyn DeclarationVisitor);

    /// Tokens lying inside `extent`, in source order.
    fn tokenize(&self, extent: SourceExtent) -> Vec<Token>;

    /// One cursor per token, parallel to `tokens`.
    fn annotate(&self, tokens: &[Token]) -> Vec<Cursor>;

    fn resolve_location(&self, cursor: &Cursor) -> SourceLocation;

    /// Hash of the bytes the unit was built from, if the backend keeps one.
    fn fingerprint(&self) -> Option<u64> {
        None
    }
}

pub trait Indexer {
    type Unit: TranslationUnit;

    /// Build a translation unit. `args` are compiler flags, passed through opaquely.
    fn parse(&mut self, path: &Path, args: &[String]) -> Result<Self::Unit, IndexError>;
}

/// Compute a 1-based (line, column) pair for a byte offset.
pub fn line_column(source: &[u8], offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    (line, offset - line_start + 1)
}
