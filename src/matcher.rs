//! Declaration matching against a target selector.
//!
//! [`DeclarationMatcher`] is registered as the traversal callback. It acts on
//! the first instance method whose selector equals the target, resolves the
//! injection anchor inside it, and then stops the traversal.

use crate::index::{
    DeclKind, Declaration, DeclarationVisitor, SourceExtent, SourceLocation, TranslationUnit,
    VisitControl,
};
use crate::resolver::find_anchor;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

const SUGGESTION_THRESHOLD: f64 = 0.8;
const MAX_SUGGESTIONS: usize = 3;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetError {
    #[error("selector is empty")]
    Empty,

    #[error("class methods are not injectable: {0}")]
    ClassMethod(String),

    #[error("malformed selector: {0}")]
    Malformed(String),
}

/// The method to find: a selector, optionally scoped to one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    selector: String,
    class: Option<String>,
}

impl Target {
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            class: None,
        }
    }

    /// Restrict matches to methods declared inside `class`.
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Parse `selector` or `-[Class selector]`.
    ///
    /// A category suffix (`-[Class(Cat) sel]`) is dropped; matching is by
    /// class name only.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(TargetError::Empty);
        }
        if input.starts_with("+[") {
            return Err(TargetError::ClassMethod(input.to_string()));
        }

        let Some(rest) = input.strip_prefix("-[") else {
            if input.contains(char::is_whitespace) || input.contains(['[', ']']) {
                return Err(TargetError::Malformed(input.to_string()));
            }
            return Ok(Self::new(input));
        };

        let inner = rest
            .strip_suffix(']')
            .ok_or_else(|| TargetError::Malformed(input.to_string()))?
            .trim();
        let (class, selector) = inner
            .split_once(char::is_whitespace)
            .ok_or_else(|| TargetError::Malformed(input.to_string()))?;
        let class = class.split('(').next().unwrap_or(class).trim();
        let selector = selector.trim();

        if class.is_empty() || selector.is_empty() || selector.contains(char::is_whitespace) {
            return Err(TargetError::Malformed(input.to_string()));
        }

        Ok(Self::new(selector).with_class(class))
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn class(&self) -> Option<&str> {
        self.class.as_deref()
    }

    /// Kind and name must both match; the class too, when one is set.
    pub fn matches(&self, decl: &Declaration<'_>) -> bool {
        if decl.kind != DeclKind::InstanceMethod || decl.name != self.selector {
            return false;
        }
        match &self.class {
            Some(class) => decl.container == Some(class.as_str()),
            None => true,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.class {
            Some(class) => write!(f, "-[{} {}]", class, self.selector),
            None => f.write_str(&self.selector),
        }
    }
}

/// The declaration the matcher acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedDeclaration {
    pub selector: String,
    pub container: Option<String>,
    pub extent: SourceExtent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchState {
    /// Matched and the anchor resolved.
    Found {
        declaration: MatchedDeclaration,
        anchor: SourceLocation,
    },
    /// Matched, but the body never opened with `{`.
    AnchorNotFound { declaration: MatchedDeclaration },
    /// Nothing matched. `suggestions` holds similar selectors that were seen.
    NoMatch { suggestions: Vec<String> },
}

pub struct DeclarationMatcher<'r> {
    target: &'r Target,
    definitions_only: bool,
    state: Option<MatchState>,
    seen: Vec<String>,
}

impl<'r> DeclarationMatcher<'r> {
    pub fn new(target: &'r Target, definitions_only: bool) -> Self {
        Self {
            target,
            definitions_only,
            state: None,
            seen: Vec::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.state.is_some()
    }

    pub fn finish(self) -> MatchState {
        match self.state {
            Some(state) => state,
            None => MatchState::NoMatch {
                suggestions: suggest(self.target.selector(), &self.seen),
            },
        }
    }

    fn remember(&mut self, name: &str) {
        if !self.seen.iter().any(|s| s == name) {
            self.seen.push(name.to_string());
        }
    }
}

impl DeclarationVisitor for DeclarationMatcher<'_> {
    fn visit_declaration(
        &mut self,
        unit: &dyn TranslationUnit,
        decl: &Declaration<'_>,
    ) -> VisitControl {
        // First match wins, even if the traversal keeps calling.
        if self.is_done() {
            return VisitControl::Break;
        }
        if decl.kind != DeclKind::InstanceMethod {
            return VisitControl::Continue;
        }
        if !self.target.matches(decl) || (self.definitions_only && !decl.is_definition) {
            trace!(selector = decl.name, "skipping declaration");
            self.remember(decl.name);
            return VisitControl::Continue;
        }

        debug!(
            selector = decl.name,
            container = decl.container,
            start = decl.extent.start,
            end = decl.extent.end,
            "matched declaration"
        );

        let declaration = MatchedDeclaration {
            selector: decl.name.to_string(),
            container: decl.container.map(str::to_string),
            extent: decl.extent,
        };
        let tokens = unit.tokenize(decl.extent);
        let cursors = unit.annotate(&tokens);

        self.state = Some(match find_anchor(unit, &tokens, &cursors) {
            Some(anchor) => {
                debug!(
                    line = anchor.line,
                    column = anchor.column,
                    offset = anchor.offset,
                    "resolved injection anchor"
                );
                MatchState::Found {
                    declaration,
                    anchor,
                }
            }
            None => MatchState::AnchorNotFound { declaration },
        });

        VisitControl::Break
    }
}

fn suggest(selector: &str, seen: &[String]) -> Vec<String> {
    let mut scored: Vec<(f64, &String)> = seen
        .iter()
        .map(|candidate| (strsim::jaro_winkler(selector, candidate), candidate))
        .filter(|(score, _)| *score >= SUGGESTION_THRESHOLD)
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(MAX_SUGGESTIONS)
        .map(|(_, candidate)| candidate.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{Cursor, Token, TokenKind};
    use std::path::{Path, PathBuf};

    /// A unit over a literal source string, tokenized on whitespace and
    /// single-character punctuation.
    struct StubUnit {
        path: PathBuf,
        source: String,
        decls: Vec<(DeclKind, &'static str, Option<&'static str>, SourceExtent)>,
    }

    impl StubUnit {
        fn new(source: &str) -> Self {
            Self {
                path: PathBuf::from("Stub.m"),
                source: source.to_string(),
                decls: Vec::new(),
            }
        }

        /// Register the method whose text starts at the n-th `-`.
        fn method(
            mut self,
            nth: usize,
            name: &'static str,
            container: Option<&'static str>,
        ) -> Self {
            let start = self.source.match_indices('-').nth(nth).unwrap().0;
            let rest = &self.source[start..];
            let len = match (rest.find('{'), rest.find(';')) {
                (Some(brace), Some(semi)) if semi < brace => semi + 1,
                (Some(_), _) => rest.find('}').unwrap() + 1,
                (None, Some(semi)) => semi + 1,
                (None, None) => rest.len(),
            };
            let end = start + len;
            self.decls.push((
                DeclKind::InstanceMethod,
                name,
                container,
                SourceExtent::new(start, end),
            ));
            self
        }
    }

    impl TranslationUnit for StubUnit {
        fn path(&self) -> &Path {
            &self.path
        }

        fn traverse(&self, visitor: &mut dyn DeclarationVisitor) {
            for &(kind, name, container, extent) in &self.decls {
                let decl = Declaration {
                    kind,
                    name,
                    container,
                    extent,
                    is_definition: self.source[extent.start..extent.end].contains('{'),
                };
                if visitor.visit_declaration(self, &decl) == VisitControl::Break {
                    return;
                }
            }
        }

        fn tokenize(&self, extent: SourceExtent) -> Vec<Token> {
            let mut tokens = Vec::new();
            let bytes = self.source.as_bytes();
            let mut i = extent.start;
            while i < extent.end {
                let c = bytes[i];
                if c.is_ascii_whitespace() {
                    i += 1;
                } else if c.is_ascii_alphanumeric() {
                    let start = i;
                    while i < extent.end && bytes[i].is_ascii_alphanumeric() {
                        i += 1;
                    }
                    tokens.push(Token::new(
                        TokenKind::Identifier,
                        &self.source[start..i],
                        SourceExtent::new(start, i),
                    ));
                } else {
                    tokens.push(Token::new(
                        TokenKind::Punctuation,
                        &self.source[i..i + 1],
                        SourceExtent::new(i, i + 1),
                    ));
                    i += 1;
                }
            }
            tokens
        }

        fn annotate(&self, tokens: &[Token]) -> Vec<Cursor> {
            tokens
                .iter()
                .map(|t| Cursor {
                    kind: "stub",
                    offset: t.extent.start,
                })
                .collect()
        }

        fn resolve_location(&self, cursor: &Cursor) -> SourceLocation {
            SourceLocation {
                file: self.path.clone(),
                line: 1,
                column: cursor.offset + 1,
                offset: cursor.offset,
            }
        }
    }

    fn run(unit: &StubUnit, target: &Target, definitions_only: bool) -> MatchState {
        let mut matcher = DeclarationMatcher::new(target, definitions_only);
        unit.traverse(&mut matcher);
        matcher.finish()
    }

    #[test]
    fn parse_bare_selector() {
        let target = Target::parse("application:didFinishLaunchingWithOptions:").unwrap();
        assert_eq!(target.selector(), "application:didFinishLaunchingWithOptions:");
        assert_eq!(target.class(), None);
    }

    #[test]
    fn parse_bracketed_selector() {
        let target = Target::parse("-[AppDelegate application:didFinishLaunchingWithOptions:]")
            .unwrap();
        assert_eq!(target.selector(), "application:didFinishLaunchingWithOptions:");
        assert_eq!(target.class(), Some("AppDelegate"));
        assert_eq!(
            target.to_string(),
            "-[AppDelegate application:didFinishLaunchingWithOptions:]"
        );
    }

    #[test]
    fn parse_bracketed_category_drops_category() {
        let target = Target::parse("-[View(Layout) layout]").unwrap();
        assert_eq!(target.class(), Some("View"));
        assert_eq!(target.selector(), "layout");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(Target::parse("  "), Err(TargetError::Empty));
        assert!(matches!(
            Target::parse("+[A shared]"),
            Err(TargetError::ClassMethod(_))
        ));
        assert!(matches!(Target::parse("-[A]"), Err(TargetError::Malformed(_))));
        assert!(matches!(Target::parse("-[A run"), Err(TargetError::Malformed(_))));
        assert!(matches!(Target::parse("run now"), Err(TargetError::Malformed(_))));
    }

    #[test]
    fn match_is_case_sensitive() {
        let unit = StubUnit::new("- run { go; }").method(0, "run", None);
        let state = run(&unit, &Target::new("Run"), false);
        assert!(matches!(state, MatchState::NoMatch { .. }));
    }

    #[test]
    fn first_match_wins() {
        let source = "- run { first; } - run { second; }";
        let unit = StubUnit::new(source)
            .method(0, "run", None)
            .method(1, "run", None);
        match run(&unit, &Target::new("run"), false) {
            MatchState::Found { anchor, .. } => {
                assert_eq!(anchor.offset, source.find("first").unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn forward_declaration_is_anchor_not_found() {
        let source = "- run; - run { body; }";
        let unit = StubUnit::new(source)
            .method(0, "run", None)
            .method(1, "run", None);
        let state = run(&unit, &Target::new("run"), false);
        assert!(matches!(state, MatchState::AnchorNotFound { .. }));
    }

    #[test]
    fn definitions_only_skips_forward_declaration() {
        let source = "- run; - run { body; }";
        let unit = StubUnit::new(source)
            .method(0, "run", None)
            .method(1, "run", None);
        match run(&unit, &Target::new("run"), true) {
            MatchState::Found { anchor, .. } => {
                assert_eq!(anchor.offset, source.find("body").unwrap());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn class_scope_filters_container() {
        let source = "- run { a; } - run { b; }";
        let unit = StubUnit::new(source)
            .method(0, "run", Some("A"))
            .method(1, "run", Some("B"));
        match run(&unit, &Target::new("run").with_class("B"), false) {
            MatchState::Found {
                anchor,
                declaration,
            } => {
                assert_eq!(anchor.offset, source.find("b;").unwrap());
                assert_eq!(declaration.container.as_deref(), Some("B"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_match_suggests_similar_selectors() {
        let unit = StubUnit::new("- runLoop { x; } - stop { y; }")
            .method(0, "runLoop", None)
            .method(1, "stop", None);
        match run(&unit, &Target::new("runloop"), false) {
            MatchState::NoMatch { suggestions } => {
                assert_eq!(suggestions, vec!["runLoop".to_string()]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn matcher_ignores_visits_after_completion() {
        let unit = StubUnit::new("- run { a; }").method(0, "run", None);
        let target = Target::new("run");
        let mut matcher = DeclarationMatcher::new(&target, false);
        unit.traverse(&mut matcher);
        assert!(matcher.is_done());

        let decl = Declaration {
            kind: DeclKind::InstanceMethod,
            name: "run",
            container: None,
            extent: SourceExtent::new(0, 12),
            is_definition: true,
        };
        assert_eq!(matcher.visit_declaration(&unit, &decl), VisitControl::Break);
    }
}
