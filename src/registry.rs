use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One protected resource type: the name sent to the decision service and
/// the URL segments that map to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceSpec {
    /// Type name forwarded to the decision service, e.g. "article".
    pub name: String,

    /// Path segment for collection routes, e.g. "articles".
    pub plural: String,

    /// Optional alternative path segment, e.g. "article".
    pub singular: Option<String>,
}

/// Maps URL path segments to resource types. Requests whose first segment
/// under the protected prefix does not resolve here are not checked at all.
pub struct ResourceRegistry {
    by_segment: HashMap<String, ResourceSpec>,
}

impl ResourceRegistry {
    pub fn new(specs: Vec<ResourceSpec>) -> Result<Self> {
        let mut by_segment = HashMap::new();
        for spec in specs {
            if spec.name.is_empty() {
                bail!("resource name is required");
            }
            if spec.plural.is_empty() {
                bail!("resource plural is required for '{}'", spec.name);
            }

            if let Some(old) = by_segment.insert(spec.plural.clone(), spec.clone()) {
                bail!(
                    "duplicate resource segment '{}' (used by '{}' and '{}')",
                    spec.plural,
                    old.name,
                    spec.name
                );
            }
            if let Some(ref singular) = spec.singular {
                if singular != &spec.plural {
                    if let Some(old) = by_segment.insert(singular.clone(), spec.clone()) {
                        bail!(
                            "duplicate resource segment '{}' (used by '{}' and '{}')",
                            singular,
                            old.name,
                            spec.name
                        );
                    }
                }
            }
        }
        Ok(Self { by_segment })
    }

    pub fn resolve(&self, segment: &str) -> Option<&ResourceSpec> {
        self.by_segment.get(segment)
    }

    /// Whether a resource type with this name is registered. Segments and
    /// names can differ, so this is not `resolve`.
    pub fn contains(&self, type_name: &str) -> bool {
        self.by_segment.values().any(|spec| spec.name == type_name)
    }

    pub fn is_empty(&self) -> bool {
        self.by_segment.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article() -> ResourceSpec {
        ResourceSpec {
            name: "article".to_string(),
            plural: "articles".to_string(),
            singular: Some("article".to_string()),
        }
    }

    #[test]
    fn test_resolve() {
        let registry = ResourceRegistry::new(vec![
            article(),
            ResourceSpec {
                name: "comment".to_string(),
                plural: "comments".to_string(),
                singular: None,
            },
        ])
        .unwrap();

        // Plural and singular segments both resolve
        assert_eq!(registry.resolve("articles").unwrap().name, "article");
        assert_eq!(registry.resolve("article").unwrap().name, "article");
        assert_eq!(registry.resolve("comments").unwrap().name, "comment");

        // Unknown segments do not
        assert!(registry.resolve("comment").is_none());
        assert!(registry.resolve("users").is_none());

        // Lookup by type name
        assert!(registry.contains("article"));
        assert!(registry.contains("comment"));
        assert!(!registry.contains("articles"));
    }

    #[test]
    fn test_duplicate_segment() {
        let result = ResourceRegistry::new(vec![
            article(),
            ResourceSpec {
                name: "post".to_string(),
                plural: "articles".to_string(),
                singular: None,
            },
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_fields() {
        assert!(ResourceRegistry::new(vec![ResourceSpec {
            name: String::new(),
            plural: "articles".to_string(),
            singular: None,
        }])
        .is_err());

        assert!(ResourceRegistry::new(vec![ResourceSpec {
            name: "article".to_string(),
            plural: String::new(),
            singular: None,
        }])
        .is_err());
    }
}
