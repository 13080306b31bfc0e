//! Injection anchor resolution.
//!
//! The anchor is the token immediately after a body's opening `{`. Its
//! location is where injected text lands, so injected code runs before the
//! first statement of the body.

use crate::index::{Cursor, SourceLocation, Token, TranslationUnit};
use tracing::trace;

/// Find the location of the first token following the first `{` punctuation.
///
/// For an empty body the anchor is the closing `}` itself. Returns `None`
/// when no `{` appears or nothing follows it.
pub fn find_anchor(
    unit: &dyn TranslationUnit,
    tokens: &[Token],
    cursors: &[Cursor],
) -> Option<SourceLocation> {
    let mut armed = false;

    for (index, token) in tokens.iter().enumerate() {
        if !armed {
            if token.is_punctuation("{") {
                trace!(offset = token.extent.start, "opening brace");
                armed = true;
            }
            continue;
        }

        let cursor = cursors.get(index)?;
        trace!(spelling = %token.spelling, cursor = cursor.kind, "anchor token");
        return Some(unit.resolve_location(cursor));
    }

    None
}
