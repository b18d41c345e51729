//! Structural spec-vs-doc diffing
//!
//! For an entity with a structured spec and a describes mapping, collects
//! the spec-side field set (signature parameters, endpoint params, schema
//! properties, enum values) and compares it against what the mapped doc's
//! code blocks and frontmatter actually mention. Each field present on one
//! side and absent from the other is one drift unit.

use crate::align::similarity::tokenize;
use crate::model::{CodeEntity, DocPage};
use similar::TextDiff;
use std::collections::BTreeSet;

/// Result of diffing one entity's spec against one doc's content
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDiff {
    /// Spec fields the doc never mentions
    pub missing_in_doc: Vec<String>,
    /// Fields the doc's machine-readable fragments carry that the spec
    /// no longer has
    pub missing_in_spec: Vec<String>,
}

impl SchemaDiff {
    pub fn drift_count(&self) -> usize {
        self.missing_in_doc.len() + self.missing_in_spec.len()
    }

    /// Unified-diff style evidence of the two field lists
    pub fn evidence(&self) -> String {
        let spec_side = self
            .missing_in_doc
            .iter()
            .map(|f| format!("{f}\n"))
            .collect::<String>();
        let doc_side = self
            .missing_in_spec
            .iter()
            .map(|f| format!("{f}\n"))
            .collect::<String>();

        TextDiff::from_lines(doc_side.as_str(), spec_side.as_str())
            .unified_diff()
            .context_radius(3)
            .header("documented", "spec")
            .to_string()
    }
}

/// A sample value in a doc code block diverging from the spec default
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDivergence {
    pub param: String,
    pub spec_default: String,
    pub sample_value: String,
    pub line: usize,
}

/// Collect the spec-side field set for an entity.
///
/// Errors on a malformed spec payload (a string that fails to parse as
/// JSON); the caller isolates the failure to this entity.
pub fn spec_fields(entity: &CodeEntity) -> Result<BTreeSet<String>, String> {
    let mut fields = BTreeSet::new();

    if let Some(sig) = &entity.signature {
        for param in &sig.params {
            fields.insert(param.name.clone());
        }
    }

    if let Some(spec) = &entity.spec {
        let value = match spec {
            serde_json::Value::String(raw) => serde_json::from_str::<serde_json::Value>(raw)
                .map_err(|e| format!("malformed spec payload: {e}"))?,
            other => other.clone(),
        };
        collect_json_fields(&value, &mut fields);
    }

    Ok(fields)
}

/// Walk a spec fragment collecting field-like names: `properties` keys,
/// `parameters[].name` entries and `enum` string values
fn collect_json_fields(value: &serde_json::Value, fields: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                match key.as_str() {
                    "properties" => {
                        if let serde_json::Value::Object(props) = child {
                            for name in props.keys() {
                                fields.insert(name.clone());
                            }
                        }
                    }
                    "parameters" => {
                        if let serde_json::Value::Array(params) = child {
                            for param in params {
                                if let Some(name) =
                                    param.get("name").and_then(|n| n.as_str())
                                {
                                    fields.insert(name.to_string());
                                }
                            }
                        }
                    }
                    "enum" => {
                        if let serde_json::Value::Array(values) = child {
                            for v in values {
                                if let Some(s) = v.as_str() {
                                    fields.insert(s.to_string());
                                }
                            }
                        }
                    }
                    _ => {}
                }
                collect_json_fields(child, fields);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_json_fields(item, fields);
            }
        }
        _ => {}
    }
}

/// Tokens mentioned by the doc's code blocks and frontmatter
fn doc_mentions(doc: &DocPage) -> BTreeSet<String> {
    let mut tokens = BTreeSet::new();
    for block in &doc.code_blocks {
        tokens.extend(tokenize(&block.code));
    }
    for (key, value) in &doc.frontmatter {
        tokens.extend(tokenize(key));
        tokens.extend(tokenize(value));
    }
    tokens
}

/// Field names carried by the doc's machine-readable fragments
/// (JSON-parseable code blocks)
fn doc_schema_fields(doc: &DocPage) -> BTreeSet<String> {
    let mut fields = BTreeSet::new();
    for block in &doc.code_blocks {
        let looks_json = matches!(
            block.language.as_deref(),
            Some("json") | Some("json5") | Some("jsonc")
        );
        if !looks_json {
            continue;
        }
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&block.code) {
            collect_object_keys(&value, &mut fields);
        }
    }
    fields
}

fn collect_object_keys(value: &serde_json::Value, fields: &mut BTreeSet<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                fields.insert(key.clone());
                collect_object_keys(child, fields);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_object_keys(item, fields);
            }
        }
        _ => {}
    }
}

/// Diff one entity's spec against its mapped doc's content
pub fn diff_entity_against_doc(
    entity: &CodeEntity,
    doc: &DocPage,
) -> Result<SchemaDiff, String> {
    let spec = spec_fields(entity)?;
    if spec.is_empty() {
        return Ok(SchemaDiff::default());
    }

    let mentions = doc_mentions(doc);
    let doc_fields = doc_schema_fields(doc);

    // A spec field counts as documented if any code block or frontmatter
    // entry mentions it (token match, so snake_case/camelCase agree)
    let missing_in_doc: Vec<String> = spec
        .iter()
        .filter(|field| {
            let field_tokens = tokenize(field);
            !field_tokens.is_empty() && !field_tokens.iter().all(|t| mentions.contains(t))
        })
        .cloned()
        .collect();

    let spec_tokens: BTreeSet<String> =
        spec.iter().flat_map(|f| tokenize(f)).collect();
    let missing_in_spec: Vec<String> = doc_fields
        .iter()
        .filter(|field| {
            let field_tokens = tokenize(field);
            !field_tokens.is_empty()
                && !field_tokens.iter().any(|t| spec_tokens.contains(t))
        })
        .cloned()
        .collect();

    Ok(SchemaDiff {
        missing_in_doc,
        missing_in_spec,
    })
}

/// Find doc code-block values diverging from spec parameter defaults.
///
/// Looks for `name = value`, `name: value` and `name=value` shapes in
/// every code block of the mapped doc.
pub fn sample_divergences(entity: &CodeEntity, doc: &DocPage) -> Vec<SampleDivergence> {
    let Some(sig) = &entity.signature else {
        return Vec::new();
    };

    let mut divergences = Vec::new();

    for param in &sig.params {
        let Some(default) = &param.default else {
            continue;
        };

        for block in &doc.code_blocks {
            for (offset, line) in block.code.lines().enumerate() {
                if let Some(value) = assigned_value(line, &param.name) {
                    if value != default.trim_matches('"') && value != *default {
                        divergences.push(SampleDivergence {
                            param: param.name.clone(),
                            spec_default: default.clone(),
                            sample_value: value,
                            line: block.line + offset,
                        });
                    }
                }
            }
        }
    }

    divergences
}

/// Extract the value assigned to `name` on a line, if the line has a
/// `name = value` / `name: value` shape
fn assigned_value(line: &str, name: &str) -> Option<String> {
    let idx = line.find(name)?;

    // Reject partial identifier matches like `limitTotal`
    let before_ok = line[..idx]
        .chars()
        .next_back()
        .map_or(true, |c| !c.is_alphanumeric() && c != '_');
    let after = &line[idx + name.len()..];
    let mut after_trimmed = after.trim_start();
    // Quoted keys: `"limit": 50`
    if let Some(stripped) = after_trimmed
        .strip_prefix('"')
        .or_else(|| after_trimmed.strip_prefix('\''))
    {
        after_trimmed = stripped.trim_start();
    }
    if !before_ok || !(after_trimmed.starts_with('=') || after_trimmed.starts_with(':')) {
        return None;
    }

    let value_part = after_trimmed[1..].trim_start();
    let value: String = value_part
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != ',' && *c != ';' && *c != '}' && *c != ')')
        .collect();

    let value = value.trim_matches('"').trim_matches('\'').to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CodeBlock, EntityKind, Param, Signature, Visibility};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn entity_with_params(params: &[(&str, Option<&str>)]) -> CodeEntity {
        CodeEntity {
            id: "e1".to_string(),
            project_id: "p1".to_string(),
            kind: EntityKind::Endpoint,
            name: "listUsers".to_string(),
            path: "api/users.ts".to_string(),
            language: "typescript".to_string(),
            signature: Some(Signature {
                params: params
                    .iter()
                    .map(|(name, default)| Param {
                        name: name.to_string(),
                        ty: None,
                        default: default.map(String::from),
                    })
                    .collect(),
                return_type: None,
                method: Some("GET".to_string()),
                route: Some("/users".to_string()),
            }),
            spec: None,
            visibility: Visibility::Public,
            version: 1,
            embedding: None,
        }
    }

    fn doc_with_block(language: Option<&str>, code: &str) -> DocPage {
        DocPage {
            id: "d1".to_string(),
            project_id: "p1".to_string(),
            path: "docs/api.md".to_string(),
            title: "API".to_string(),
            headings: Vec::new(),
            links: Vec::new(),
            code_blocks: vec![CodeBlock {
                language: language.map(String::from),
                code: code.to_string(),
                line: 12,
            }],
            commit: None,
            last_updated: Utc::now(),
            frontmatter: BTreeMap::new(),
            version: 1,
            embedding: None,
        }
    }

    #[test]
    fn test_spec_param_missing_from_doc() {
        let entity = entity_with_params(&[("limit", None), ("offset", None)]);
        let doc = doc_with_block(Some("bash"), "curl '/users?offset=0'");

        let diff = diff_entity_against_doc(&entity, &doc).unwrap();
        assert_eq!(diff.missing_in_doc, vec!["limit".to_string()]);
        assert_eq!(diff.drift_count(), 1);
    }

    #[test]
    fn test_doc_field_missing_from_spec() {
        let entity = entity_with_params(&[("limit", None)]);
        let doc = doc_with_block(Some("json"), r#"{"limit": 20, "page_size": 50}"#);

        let diff = diff_entity_against_doc(&entity, &doc).unwrap();
        assert!(diff.missing_in_doc.is_empty());
        assert_eq!(diff.missing_in_spec, vec!["page_size".to_string()]);
    }

    #[test]
    fn test_enum_values_from_spec_payload() {
        let mut entity = entity_with_params(&[]);
        entity.signature = None;
        entity.spec = Some(serde_json::json!({
            "enum": ["active", "suspended"]
        }));

        let doc = doc_with_block(Some("json"), r#"{"status": "active"}"#);
        let diff = diff_entity_against_doc(&entity, &doc).unwrap();
        assert!(diff.missing_in_doc.contains(&"suspended".to_string()));
    }

    #[test]
    fn test_malformed_string_spec_is_error() {
        let mut entity = entity_with_params(&[]);
        entity.spec = Some(serde_json::Value::String("{not json".to_string()));

        assert!(spec_fields(&entity).is_err());
    }

    #[test]
    fn test_no_spec_no_drift() {
        let mut entity = entity_with_params(&[]);
        entity.signature = None;
        let doc = doc_with_block(Some("json"), r#"{"anything": 1}"#);

        let diff = diff_entity_against_doc(&entity, &doc).unwrap();
        assert_eq!(diff.drift_count(), 0);
    }

    #[test]
    fn test_sample_divergence_on_default() {
        let entity = entity_with_params(&[("limit", Some("20"))]);
        let doc = doc_with_block(Some("bash"), "curl '/users' -d limit=50");

        let divergences = sample_divergences(&entity, &doc);
        assert_eq!(divergences.len(), 1);
        assert_eq!(divergences[0].param, "limit");
        assert_eq!(divergences[0].sample_value, "50");
    }

    #[test]
    fn test_sample_matching_default_is_clean() {
        let entity = entity_with_params(&[("limit", Some("20"))]);
        let doc = doc_with_block(Some("json"), r#"{"limit": 20}"#);

        assert!(sample_divergences(&entity, &doc).is_empty());
    }

    #[test]
    fn test_assigned_value_rejects_partial_match() {
        assert_eq!(assigned_value("limitTotal = 5", "limit"), None);
        assert_eq!(assigned_value("limit = 5", "limit"), Some("5".to_string()));
        assert_eq!(
            assigned_value(r#""limit": 50,"#, "limit"),
            Some("50".to_string())
        );
    }
}
