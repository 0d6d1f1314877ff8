//! Whole-document templates: a JSON text with `{{path}}` placeholders.

use serde_json::Value;

use crate::errors::TemplateError;
use crate::observer::{Observer, RelayEvent, TracingObserver};
use crate::parser::{Piece, Scanner};
use crate::path::resolve;

/// Substitute every `{{path}}` in `template` with data from `doc` and parse
/// the result as JSON.
pub fn render(doc: &Value, template: &str) -> Result<Value, TemplateError> {
    render_with(doc, template, &TracingObserver)
}

/// Like [`render`], reporting unresolved placeholders to `observer`.
pub fn render_with(
    doc: &Value,
    template: &str,
    observer: &dyn Observer,
) -> Result<Value, TemplateError> {
    let text = substitute(doc, template, observer);
    serde_json::from_str(&text).map_err(|e| TemplateError::InvalidJson {
        detail: e.to_string(),
    })
}

/// The substitution step alone; no quoting is added around values.
pub fn substitute(doc: &Value, template: &str, observer: &dyn Observer) -> String {
    let mut out = String::with_capacity(template.len());
    for piece in Scanner::new(template).braces() {
        match piece {
            Piece::Literal(text) => out.push_str(text),
            Piece::Token(inner) => {
                let path = inner.trim();
                match resolve(doc, path) {
                    None | Some(Value::Null) => {
                        observer.observe(RelayEvent::TemplateTokenMissing {
                            path: path.to_string(),
                        });
                    }
                    Some(Value::String(s)) => out.push_str(&s),
                    Some(other) => out.push_str(&other.to_string()),
                }
            }
        }
    }
    out
}
