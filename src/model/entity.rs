//! Code entity records
//!
//! One `CodeEntity` is one unit of documentable code surface. Entities are
//! replaced wholesale on each code scan; identity across scans is the
//! natural key (project, path, name, kind), never the generated id.

use serde::{Deserialize, Serialize};

/// Kind of documentable code surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Function,
    Class,
    Endpoint,
    Cli,
    Flag,
    Env,
    Type,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Function => write!(f, "function"),
            EntityKind::Class => write!(f, "class"),
            EntityKind::Endpoint => write!(f, "endpoint"),
            EntityKind::Cli => write!(f, "cli"),
            EntityKind::Flag => write!(f, "flag"),
            EntityKind::Env => write!(f, "env"),
            EntityKind::Type => write!(f, "type"),
        }
    }
}

/// Visibility of an entity
///
/// Private entities may be scored and mapped, but must never become the
/// subject of an externally-exportable draft. The Mapper propagates
/// visibility unchanged so the export boundary can enforce that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Internal,
    Private,
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Internal => write!(f, "internal"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

/// One parameter in a structured signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    /// Declared type, if the scanner could resolve one
    #[serde(default)]
    pub ty: Option<String>,
    /// Default value literal, if any
    #[serde(default)]
    pub default: Option<String>,
}

impl Param {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ty: None,
            default: None,
        }
    }
}

/// Structured signature for an entity
///
/// For functions/methods: parameter list and return type. For endpoints:
/// HTTP method and route, with route/query parameters in `params`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub route: Option<String>,
}

/// One unit of documentable code surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    /// Storage handle; stable across scans only while the natural key is
    pub id: String,
    pub project_id: String,
    pub kind: EntityKind,
    pub name: String,
    /// Source path relative to the repository root
    pub path: String,
    pub language: String,
    #[serde(default)]
    pub signature: Option<Signature>,
    /// Free-form spec payload (OpenAPI/GraphQL fragment, enum schema, ...)
    #[serde(default)]
    pub spec: Option<serde_json::Value>,
    pub visibility: Visibility,
    /// Scan sequence number; delta runs select entities above a watermark
    #[serde(default)]
    pub version: u64,
    /// Embedding vector, populated by an upstream provider
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl CodeEntity {
    /// Natural identity across re-scans
    pub fn key(&self) -> EntityKey {
        EntityKey {
            project_id: self.project_id.clone(),
            path: self.path.clone(),
            name: self.name.clone(),
            kind: self.kind,
        }
    }

    /// Whether this entity is expected to have external documentation
    pub fn is_documentable(&self) -> bool {
        self.visibility != Visibility::Private
    }
}

/// Natural key for a code entity: (project, path, name, kind)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityKey {
    pub project_id: String,
    pub path: String,
    pub name: String,
    pub kind: EntityKind,
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.project_id, self.path, self.name, self.kind
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(name: &str) -> CodeEntity {
        CodeEntity {
            id: format!("e-{name}"),
            project_id: "p1".to_string(),
            kind: EntityKind::Function,
            name: name.to_string(),
            path: "src/lib.rs".to_string(),
            language: "rust".to_string(),
            signature: None,
            spec: None,
            visibility: Visibility::Public,
            version: 1,
            embedding: None,
        }
    }

    #[test]
    fn test_key_ignores_id() {
        let mut a = entity("getUser");
        let mut b = entity("getUser");
        a.id = "one".to_string();
        b.id = "two".to_string();
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_private_not_documentable() {
        let mut e = entity("helper");
        e.visibility = Visibility::Private;
        assert!(!e.is_documentable());
        e.visibility = Visibility::Internal;
        assert!(e.is_documentable());
    }
}
