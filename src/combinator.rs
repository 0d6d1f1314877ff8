//! Multi-field expressions such as `[user.first] [user.last]`.
//!
//! Every bracketed path is resolved against the source document and the
//! values that exist are joined with the literal text written between the
//! brackets. Missing fields are dropped together with their separators.

use serde_json::Value;

use crate::parser::{Piece, Scanner};
use crate::path::resolve;

/// A parsed combinator expression. `separators[i]` is the text written
/// between `fields[i]` and `fields[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineExpr<'a> {
    pub fields: Vec<&'a str>,
    pub separators: Vec<&'a str>,
}

/// Outcome of evaluating an expression against one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combination<'a> {
    /// `None` when no field produced a value.
    pub value: Option<String>,
    pub missing: Vec<&'a str>,
}

impl<'a> CombineExpr<'a> {
    pub fn parse(expr: &'a str) -> Self {
        let mut fields = Vec::new();
        let mut separators = Vec::new();
        let mut pending = "";
        for piece in Scanner::new(expr).brackets() {
            match piece {
                Piece::Token(path) => {
                    if !fields.is_empty() {
                        separators.push(pending);
                    }
                    fields.push(path);
                    pending = "";
                }
                Piece::Literal(text) => pending = text,
            }
        }
        Self { fields, separators }
    }

    pub fn evaluate(&self, doc: &Value) -> Combination<'a> {
        let mut value: Option<String> = None;
        let mut missing = Vec::new();
        // separator owed by the last present field
        let mut owed = "";
        for (i, field) in self.fields.iter().enumerate() {
            match resolve(doc, field).and_then(text_of) {
                Some(text) => {
                    value = Some(match value {
                        Some(acc) => acc + owed + &text,
                        None => text,
                    });
                    owed = self.separators.get(i).copied().unwrap_or("");
                }
                None => missing.push(*field),
            }
        }
        Combination { value, missing }
    }
}

/// Join the fields of `expr` found in `doc`; `None` when all are missing.
pub fn combine(doc: &Value, expr: &str) -> Option<String> {
    CombineExpr::parse(expr).evaluate(doc).value
}

/// Whether a mapping source should be treated as a combinator expression:
/// it opens with `[` and some `]` is later followed by another `[`.
pub fn is_combined(source: &str) -> bool {
    source.starts_with('[')
        && source
            .find(']')
            .is_some_and(|close| source[close..].contains('['))
}

fn text_of(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}
