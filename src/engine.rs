use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::combinator::{self, CombineExpr};
use crate::errors::PathError;
use crate::observer::{Observer, RelayEvent, TracingObserver};
use crate::path::{self, WriteOutcome};
use crate::template;

/// Target marker for a rule whose fixed value is a whole-document template.
pub const TEMPLATE_TARGET: &str = "_json_editor";

/// One line of mapping configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Dotted path, combinator expression, or empty.
    #[serde(default)]
    pub source_field: String,
    /// Dotted output path, or [`TEMPLATE_TARGET`].
    #[serde(default)]
    pub target_field: String,
    /// Literal value (JSON-parsed when possible) or template text.
    #[serde(default)]
    pub fixed_value: Option<String>,
}

impl MappingRule {
    pub fn field(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source_field: source.into(),
            target_field: target.into(),
            fixed_value: None,
        }
    }

    pub fn fixed(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source_field: String::new(),
            target_field: target.into(),
            fixed_value: Some(value.into()),
        }
    }

    pub fn template(template: impl Into<String>) -> Self {
        Self::fixed(TEMPLATE_TARGET, template)
    }

    pub fn is_template(&self) -> bool {
        self.target_field == TEMPLATE_TARGET
    }
}

/// Why a rule contributed nothing to the output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("mapping has no source field")]
    NoSource,
    #[error("field '{0}' not found in source")]
    Missing(String),
    #[error("all combined fields are missing: [{}]", .0.join(", "))]
    AllFieldsMissing(Vec<String>),
    #[error("mapping has no target field")]
    NoTarget,
    #[error(transparent)]
    InvalidTarget(#[from] PathError),
    #[error("cannot set '{path}': '{at}' is not an object")]
    PathConflict { path: String, at: String },
}

/// =========================
/// Public API
/// =========================

/// Transform `doc` with `rules`, logging skipped rules through `tracing`.
pub fn apply_mappings(doc: &Value, rules: &[MappingRule]) -> Value {
    apply_mappings_with(doc, rules, &TracingObserver)
}

/// Transform `doc` with `rules`.
///
/// A template rule with a non-empty template wins over every other rule;
/// if it does not render to valid JSON the remaining rules are applied one
/// by one. A failing rule is reported to `observer` and never stops the
/// rules after it.
pub fn apply_mappings_with(doc: &Value, rules: &[MappingRule], observer: &dyn Observer) -> Value {
    let template_text = rules
        .iter()
        .find(|r| r.is_template())
        .and_then(|r| r.fixed_value.as_deref())
        .filter(|t| !t.is_empty());
    if let Some(text) = template_text {
        match template::render_with(doc, text, observer) {
            Ok(rendered) => return rendered,
            Err(error) => observer.observe(RelayEvent::TemplateFallback { error }),
        }
    }

    let mut out = Map::new();
    for (index, rule) in rules.iter().enumerate() {
        if rule.is_template() {
            continue;
        }
        if let Err(reason) = apply_rule(doc, rule, &mut out, observer) {
            observer.observe(RelayEvent::RuleSkipped {
                index,
                source: rule.source_field.clone(),
                target: rule.target_field.clone(),
                reason,
            });
        }
    }
    Value::Object(out)
}

fn apply_rule(
    doc: &Value,
    rule: &MappingRule,
    out: &mut Map<String, Value>,
    observer: &dyn Observer,
) -> Result<(), SkipReason> {
    let value = source_value(doc, rule, observer)?;
    if rule.target_field.is_empty() {
        return Err(SkipReason::NoTarget);
    }
    match path::write(out, &rule.target_field, value)? {
        WriteOutcome::Written => Ok(()),
        WriteOutcome::Blocked { at } => Err(SkipReason::PathConflict {
            path: rule.target_field.clone(),
            at,
        }),
    }
}

fn source_value(doc: &Value, rule: &MappingRule, observer: &dyn Observer) -> Result<Value, SkipReason> {
    if let Some(fixed) = &rule.fixed_value {
        return Ok(serde_json::from_str(fixed).unwrap_or_else(|_| Value::String(fixed.clone())));
    }

    let source = rule.source_field.as_str();
    if source.is_empty() {
        return Err(SkipReason::NoSource);
    }

    if combinator::is_combined(source) {
        let combined = CombineExpr::parse(source).evaluate(doc);
        let missing: Vec<String> = combined.missing.iter().map(|m| m.to_string()).collect();
        return match combined.value {
            Some(text) => {
                if !missing.is_empty() {
                    observer.observe(RelayEvent::PartialCombination {
                        expr: source.to_string(),
                        missing,
                    });
                }
                Ok(Value::String(text))
            }
            None => Err(SkipReason::AllFieldsMissing(missing)),
        };
    }

    path::resolve(doc, source).ok_or_else(|| SkipReason::Missing(source.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::Recorder;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample_json() -> Value {
        json!({
            "event_type": "deployment",
            "user": { "username": "johndoe", "firstName": "John" },
            "labels": [{ "id": "label-123", "name": "Bug" }]
        })
    }

    #[test]
    fn applies_rules_in_order() {
        let rules = vec![
            MappingRule::field("event_type", "eventName"),
            MappingRule::field("user.username", "author.name"),
            MappingRule::fixed("source", "webhook-relay"),
            MappingRule::field("labels.0.id", "firstLabel"),
        ];
        let out = apply_mappings(&sample_json(), &rules);
        assert_eq!(
            out,
            json!({
                "eventName": "deployment",
                "author": { "name": "johndoe" },
                "source": "webhook-relay",
                "firstLabel": "label-123"
            })
        );
        // ordered keys follow rule order
        assert_eq!(
            serde_json::to_string(&out).unwrap(),
            r#"{"eventName":"deployment","author":{"name":"johndoe"},"source":"webhook-relay","firstLabel":"label-123"}"#
        );
    }

    #[test]
    fn fixed_values_are_parsed_as_json_when_possible() {
        let rules = vec![
            MappingRule::fixed("n", "42"),
            MappingRule::fixed("obj", r#"{"a":[1]}"#),
            MappingRule::fixed("raw", "not json"),
            MappingRule::fixed("nothing", "null"),
            MappingRule::fixed("empty", ""),
        ];
        assert_eq!(
            apply_mappings(&json!({}), &rules),
            json!({"n": 42, "obj": {"a": [1]}, "raw": "not json", "nothing": null, "empty": ""})
        );
    }

    #[test]
    fn skipped_rules_are_reported_with_their_reason() {
        let rec = Recorder::new();
        let rules = vec![
            MappingRule::field("", "email"),
            MappingRule::field("user.email", "email"),
            MappingRule::field("[user.a] [user.b]", "full"),
            MappingRule::field("user.username", ""),
            MappingRule::field("user.username", "a..b"),
            MappingRule::field("event_type", "kind"),
            MappingRule::field("user.username", "kind.name"),
        ];
        let out = apply_mappings_with(&sample_json(), &rules, &rec);
        assert_eq!(out, json!({"kind": "deployment"}));

        let reasons: Vec<SkipReason> = rec
            .events()
            .into_iter()
            .filter_map(|e| match e {
                RelayEvent::RuleSkipped { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                SkipReason::NoSource,
                SkipReason::Missing("user.email".into()),
                SkipReason::AllFieldsMissing(vec!["user.a".into(), "user.b".into()]),
                SkipReason::NoTarget,
                SkipReason::InvalidTarget(PathError::EmptySegment("a..b".into())),
                SkipReason::PathConflict { path: "kind.name".into(), at: "kind".into() },
            ]
        );
    }

    #[test]
    fn partial_combination_is_reported() {
        let rec = Recorder::new();
        let rules = vec![MappingRule::field("[user.firstName] [user.lastName]", "fullName")];
        let out = apply_mappings_with(&sample_json(), &rules, &rec);
        assert_eq!(out, json!({"fullName": "John"}));
        assert_eq!(
            rec.events(),
            vec![RelayEvent::PartialCombination {
                expr: "[user.firstName] [user.lastName]".into(),
                missing: vec!["user.lastName".into()],
            }]
        );
    }

    #[test]
    fn broken_template_falls_back_to_field_rules() {
        let rec = Recorder::new();
        let rules = vec![
            MappingRule::template(r#"{"msg": {{event_type}}}"#),
            MappingRule::field("event_type", "kind"),
        ];
        let out = apply_mappings_with(&sample_json(), &rules, &rec);
        assert_eq!(out, json!({"kind": "deployment"}));
        assert!(matches!(
            rec.events().first(),
            Some(RelayEvent::TemplateFallback { .. })
        ));
    }

    #[test]
    fn empty_template_is_ignored() {
        let rules = vec![MappingRule::template(""), MappingRule::field("event_type", "kind")];
        assert_eq!(apply_mappings(&sample_json(), &rules), json!({"kind": "deployment"}));
    }

    #[test]
    fn rules_deserialize_with_defaults() {
        let rules: Vec<MappingRule> = serde_json::from_str(
            r#"[{"source_field":"a","target_field":"b"},{"target_field":"c","fixed_value":"1"}]"#,
        )
        .unwrap();
        assert_eq!(rules, vec![MappingRule::field("a", "b"), MappingRule::fixed("c", "1")]);
    }
}
