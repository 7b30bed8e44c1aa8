use serde::Serialize;
use serde_json::{Map, Value};

/// The subject sent to the decision service. A bare key serializes as a
/// plain string; an enriched subject serializes as `{key, attributes}`.
/// The decision service's matching semantics depend on this distinction,
/// so the two shapes must not be collapsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Subject {
    Bare(String),
    Described {
        key: String,
        attributes: Map<String, Value>,
    },
}

impl Subject {
    pub fn key(&self) -> &str {
        match self {
            Subject::Bare(key) => key,
            Subject::Described { key, .. } => key,
        }
    }
}

/// Projects the mapped fields out of a record. Fields absent from the record
/// or set to null are silently omitted, never defaulted.
pub fn project_fields<'a, I>(record: &Map<String, Value>, fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut projected = Map::new();
    for field in fields {
        match record.get(field) {
            Some(Value::Null) | None => continue,
            Some(value) => {
                projected.insert(field.clone(), value.clone());
            }
        }
    }
    projected
}
