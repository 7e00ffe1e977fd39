//! Argument validation against a declared input schema.
use serde::Serialize;
use serde_json::{Map, Value};

use crate::server::registry::{InputSchema, Primitive};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    MissingRequired,
    TypeMismatch,
    UnknownParameter,
}

/// One problem found in the supplied arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub parameter: String,
    pub issue: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Primitive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<&'static str>,
}

/// Check `arguments` against `schema`, collecting every violation.
///
/// `null` values count as absent. On success the returned map holds the
/// non-null arguments plus defaults for absent optional parameters.
pub fn validate_arguments(
    schema: &InputSchema,
    mut arguments: Map<String, Value>,
) -> Result<Map<String, Value>, Vec<ValidationIssue>> {
    arguments.retain(|_, value| !value.is_null());
    let mut issues = Vec::new();

    for (name, spec) in schema.iter() {
        match arguments.get(name) {
            None if spec.required => issues.push(ValidationIssue {
                parameter: name.to_string(),
                issue: IssueKind::MissingRequired,
                expected: Some(spec.primitive),
                found: None,
            }),
            None => {}
            Some(value) if !spec.primitive.matches(value) => issues.push(ValidationIssue {
                parameter: name.to_string(),
                issue: IssueKind::TypeMismatch,
                expected: Some(spec.primitive),
                found: Some(Primitive::describe(value)),
            }),
            Some(_) => {}
        }
    }

    for name in arguments.keys() {
        if !schema.contains(name) {
            issues.push(ValidationIssue {
                parameter: name.clone(),
                issue: IssueKind::UnknownParameter,
                expected: None,
                found: None,
            });
        }
    }

    if !issues.is_empty() {
        return Err(issues);
    }

    for (name, spec) in schema.iter() {
        if let Some(default) = &spec.default {
            arguments
                .entry(name.to_string())
                .or_insert_with(|| default.clone());
        }
    }
    Ok(arguments)
}
