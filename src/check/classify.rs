use serde::Serialize;

use crate::registry::{ResourceRegistry, ResourceSpec};

/// Path prefix under which requests are subject to policy checks.
pub const PROTECTED_PREFIX: &str = "/api";

/// The normalized operation derived from the HTTP method. Closed set; any
/// other method means the request is not classified at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionVerb {
    Read,
    Create,
    Update,
    Delete,
}

impl ActionVerb {
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "GET" => Some(Self::Read),
            "POST" => Some(Self::Create),
            "PUT" | "PATCH" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// A request the pipeline applies to: which resource type, which instance
/// (if any), and what is being done to it.
#[derive(Debug, Clone)]
pub struct RequestClass {
    pub spec: ResourceSpec,
    pub instance_key: Option<String>,
    pub verb: ActionVerb,
}

/// Outcome of classifying an inbound request. Everything except `Matched`
/// is a normal skip, not a failure.
#[derive(Debug)]
pub enum Classification {
    /// Path is outside the protected prefix.
    NotProtected,
    /// First path segment does not resolve to a known resource type.
    UnknownResource,
    /// HTTP method has no action mapping.
    UnsupportedMethod,
    Matched(RequestClass),
}

/// Decides whether the pipeline applies to a request and extracts
/// `(resource type, instance key, action verb)` if it does.
///
/// The path must already be stripped of its query string. The instance key,
/// when present, is an opaque string passed through unvalidated.
pub fn classify(method: &str, path: &str, registry: &ResourceRegistry) -> Classification {
    let rest = match path.strip_prefix(PROTECTED_PREFIX) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return Classification::NotProtected,
    };

    let mut segments = rest.split('/').filter(|s| !s.is_empty());

    let spec = match segments.next().and_then(|s| registry.resolve(s)) {
        Some(spec) => spec.clone(),
        None => return Classification::UnknownResource,
    };

    let verb = match ActionVerb::from_method(method) {
        Some(verb) => verb,
        None => return Classification::UnsupportedMethod,
    };

    let instance_key = segments.next().map(String::from);

    Classification::Matched(RequestClass {
        spec,
        instance_key,
        verb,
    })
}
