use serde::Serialize;
use serde_json::{Map, Value};

/// The resource sent to the decision service. Like [`super::Subject`], the
/// serialized shape is part of the contract: an unmapped collection request
/// is a plain type-name string, everything else is a structured object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceDescriptor {
    Bare(String),
    Described {
        #[serde(rename = "type")]
        type_name: String,

        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,

        #[serde(skip_serializing_if = "Option::is_none")]
        attributes: Option<Map<String, Value>>,
    },
}

impl ResourceDescriptor {
    pub fn type_name(&self) -> &str {
        match self {
            ResourceDescriptor::Bare(type_name) => type_name,
            ResourceDescriptor::Described { type_name, .. } => type_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialize_shapes() {
        let bare = ResourceDescriptor::Bare("article".to_string());
        assert_eq!(serde_json::to_value(&bare).unwrap(), json!("article"));

        let typed = ResourceDescriptor::Described {
            type_name: "article".to_string(),
            key: None,
            attributes: None,
        };
        assert_eq!(
            serde_json::to_value(&typed).unwrap(),
            json!({"type": "article"})
        );

        let keyed = ResourceDescriptor::Described {
            type_name: "article".to_string(),
            key: Some("42".to_string()),
            attributes: None,
        };
        assert_eq!(
            serde_json::to_value(&keyed).unwrap(),
            json!({"type": "article", "key": "42"})
        );

        let mut attributes = Map::new();
        attributes.insert("status".to_string(), json!("draft"));
        let enriched = ResourceDescriptor::Described {
            type_name: "article".to_string(),
            key: Some("42".to_string()),
            attributes: Some(attributes),
        };
        assert_eq!(
            serde_json::to_value(&enriched).unwrap(),
            json!({"type": "article", "key": "42", "attributes": {"status": "draft"}})
        );
    }
}
