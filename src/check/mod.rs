mod classify;
mod resource;
mod subject;

pub use classify::{classify, ActionVerb, Classification, RequestClass, PROTECTED_PREFIX};
pub use resource::ResourceDescriptor;
pub use subject::{project_fields, Subject};

use std::sync::Arc;

use log::{debug, error, warn};

use crate::authn::TokenVerifier;
use crate::fetch::RecordFetcher;
use crate::pdp::DecisionHandle;
use crate::registry::ResourceRegistry;
use crate::store::{Settings, SettingsSnapshot};

/// Why a request bypassed enforcement entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Path is outside the protected prefix.
    NotProtected,
    /// No bearer credential on the request.
    NoCredential,
    /// Credential present but failed verification.
    InvalidCredential,
    /// First path segment does not resolve to a protected resource type.
    UnknownResource,
    /// HTTP method has no action mapping.
    UnsupportedMethod,
}

/// Why a request was allowed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowReason {
    /// Resource type is in the exclusion set; no decision call was made.
    Excluded,
    /// The decision service said yes.
    Granted,
    /// The decision service was unreachable, errored, or is not configured.
    FailOpen,
}

/// Terminal state of one pipeline evaluation. Both `Passthrough` and
/// `Allowed` let the request proceed; only `Denied` rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passthrough(SkipReason),
    Allowed(AllowReason),
    Denied,
}

impl Verdict {
    pub fn proceeds(&self) -> bool {
        !matches!(self, Verdict::Denied)
    }
}

/// The request-time authorization decision pipeline.
///
/// One evaluation per inbound request, linear, no retries: verify the
/// credential, derive resource and action from the URL, short-circuit
/// excluded types, enrich subject and resource with mapped attributes, and
/// ask the decision service.
///
/// Two deliberate fail-open contracts, both inherited from observed
/// behavior and load-bearing for availability:
/// - A missing or unverifiable credential skips enforcement rather than
///   denying. Whether that should become fail-closed is a product
///   decision, not a bug fix.
/// - Any decision service failure (unconfigured, network, timeout, bad
///   response) allows the request and logs an error. Errors never escape
///   this type.
pub struct Gate {
    registry: Arc<ResourceRegistry>,
    settings: Arc<Settings>,
    verifier: Arc<dyn TokenVerifier>,
    decision: Arc<DecisionHandle>,
    fetcher: Arc<dyn RecordFetcher>,
}

impl Gate {
    pub fn new(
        registry: Arc<ResourceRegistry>,
        settings: Arc<Settings>,
        verifier: Arc<dyn TokenVerifier>,
        decision: Arc<DecisionHandle>,
        fetcher: Arc<dyn RecordFetcher>,
    ) -> Self {
        Self {
            registry,
            settings,
            verifier,
            decision,
            fetcher,
        }
    }

    /// Evaluates one request. `path` must be stripped of its query string;
    /// `bearer` is the raw token without the "Bearer " prefix.
    pub async fn evaluate(&self, method: &str, path: &str, bearer: Option<&str>) -> Verdict {
        // Prefix must match as a whole segment, "/apiv2/..." is unprotected
        let protected = match path.strip_prefix(PROTECTED_PREFIX) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        };
        if !protected {
            return Verdict::Passthrough(SkipReason::NotProtected);
        }

        let token = match bearer {
            Some(token) => token,
            None => {
                debug!("No bearer credential on {method} {path}, skipping check");
                return Verdict::Passthrough(SkipReason::NoCredential);
            }
        };

        let subject_id = match self.verifier.verify(token) {
            Ok(subject) => subject,
            Err(e) => {
                debug!("Credential verification failed on {method} {path}: {e:#}");
                return Verdict::Passthrough(SkipReason::InvalidCredential);
            }
        };

        let class = match classify(method, path, &self.registry) {
            Classification::Matched(class) => class,
            Classification::NotProtected => {
                return Verdict::Passthrough(SkipReason::NotProtected)
            }
            Classification::UnknownResource => {
                return Verdict::Passthrough(SkipReason::UnknownResource)
            }
            Classification::UnsupportedMethod => {
                return Verdict::Passthrough(SkipReason::UnsupportedMethod)
            }
        };

        let snapshot = match self.settings.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // No settings means no exclusions and no mappings; the
                // decision call itself still happens.
                warn!("Failed to read enforcement settings: {e:#}");
                Arc::new(SettingsSnapshot::default())
            }
        };

        if snapshot.is_excluded(&class.spec.name) {
            debug!("Resource type '{}' is excluded, allowing", class.spec.name);
            return Verdict::Allowed(AllowReason::Excluded);
        }

        let subject = self.resolve_subject(&subject_id, &snapshot).await;
        let resource = self.enrich_resource(&class, &snapshot).await;

        let client = match self.decision.current() {
            Some(client) => client,
            None => {
                warn!(
                    "Decision service not configured, allowing {} {} for {}",
                    method,
                    path,
                    subject.key()
                );
                return Verdict::Allowed(AllowReason::FailOpen);
            }
        };

        match client.check(&subject, class.verb, &resource).await {
            Ok(true) => {
                debug!(
                    "Allowed: subject={}, action={}, resource={}",
                    subject.key(),
                    class.verb.as_str(),
                    class.spec.name
                );
                Verdict::Allowed(AllowReason::Granted)
            }
            Ok(false) => {
                warn!(
                    "Denied: subject={}, action={}, resource={}",
                    subject.key(),
                    class.verb.as_str(),
                    class.spec.name
                );
                Verdict::Denied
            }
            Err(e) => {
                error!(
                    "Decision check failed, allowing {} {} for {}: {:#}",
                    method,
                    path,
                    subject.key(),
                    e
                );
                Verdict::Allowed(AllowReason::FailOpen)
            }
        }
    }

    /// Builds the subject to send to the decision service. A bare key when
    /// no subject fields are mapped; enriched best-effort otherwise.
    async fn resolve_subject(
        &self,
        subject: &crate::authn::VerifiedSubject,
        snapshot: &SettingsSnapshot,
    ) -> Subject {
        if snapshot.subject_fields.is_empty() {
            return Subject::Bare(subject.key.clone());
        }

        match self.fetcher.fetch_subject(&subject.record_id).await {
            Ok(Some(record)) => Subject::Described {
                key: subject.key.clone(),
                attributes: project_fields(&record, &snapshot.subject_fields),
            },
            Ok(None) => Subject::Bare(subject.key.clone()),
            Err(e) => {
                warn!("Failed to fetch subject attributes: {e:#}");
                Subject::Bare(subject.key.clone())
            }
        }
    }

    /// Builds the resource descriptor. The string-vs-object shape depends
    /// on whether attribute mappings exist for the type, and must be
    /// preserved exactly; the decision service matches on it.
    async fn enrich_resource(
        &self,
        class: &RequestClass,
        snapshot: &SettingsSnapshot,
    ) -> ResourceDescriptor {
        let type_name = class.spec.name.clone();
        let mapped_fields = snapshot.fields_for_type(&type_name);

        let key = match class.instance_key {
            Some(ref key) => key.clone(),
            None => {
                // Collection request: no instance to read attributes from
                return match mapped_fields {
                    Some(_) => ResourceDescriptor::Described {
                        type_name,
                        key: None,
                        attributes: None,
                    },
                    None => ResourceDescriptor::Bare(type_name),
                };
            }
        };

        let fields = match mapped_fields {
            Some(fields) => fields,
            None => {
                return ResourceDescriptor::Described {
                    type_name,
                    key: Some(key),
                    attributes: None,
                }
            }
        };

        match self.fetcher.fetch_instance(&class.spec, &key).await {
            Ok(Some(record)) => ResourceDescriptor::Described {
                type_name,
                key: Some(key),
                attributes: Some(project_fields(&record, fields)),
            },
            Ok(None) => ResourceDescriptor::Described {
                type_name,
                key: Some(key),
                attributes: None,
            },
            Err(e) => {
                warn!("Failed to fetch resource attributes: {e:#}");
                ResourceDescriptor::Described {
                    type_name,
                    key: Some(key),
                    attributes: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Map, Value};

    use crate::api::{ExclusionsPayload, MappingsPayload};
    use crate::authn::VerifiedSubject;
    use crate::pdp::DecisionClient;
    use crate::registry::ResourceSpec;
    use crate::store::SettingsDb;

    use super::*;

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<VerifiedSubject> {
            if token == "good-token" {
                return Ok(VerifiedSubject {
                    key: "user-42".to_string(),
                    record_id: "42".to_string(),
                });
            }
            bail!("bad token");
        }
    }

    #[derive(Default)]
    struct MockFetcher {
        subjects: HashMap<String, Map<String, Value>>,
        instances: HashMap<(String, String), Map<String, Value>>,
        fail: bool,
    }

    #[async_trait]
    impl RecordFetcher for MockFetcher {
        async fn fetch_subject(&self, id: &str) -> Result<Option<Map<String, Value>>> {
            if self.fail {
                bail!("fetch failed");
            }
            Ok(self.subjects.get(id).cloned())
        }

        async fn fetch_instance(
            &self,
            spec: &ResourceSpec,
            key: &str,
        ) -> Result<Option<Map<String, Value>>> {
            if self.fail {
                bail!("fetch failed");
            }
            Ok(self
                .instances
                .get(&(spec.name.clone(), key.to_string()))
                .cloned())
        }
    }

    /// Decision client that records what it was asked and answers from a
    /// script: Some(true/false) for a decision, None for an error.
    struct MockDecision {
        answer: Option<bool>,
        calls: AtomicUsize,
        seen: Mutex<Vec<(Value, String, Value)>>,
    }

    impl MockDecision {
        fn new(answer: Option<bool>) -> Self {
            Self {
                answer,
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DecisionClient for MockDecision {
        async fn check(
            &self,
            subject: &Subject,
            action: ActionVerb,
            resource: &ResourceDescriptor,
        ) -> Result<bool> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push((
                serde_json::to_value(subject).unwrap(),
                action.as_str().to_string(),
                serde_json::to_value(resource).unwrap(),
            ));
            match self.answer {
                Some(allow) => Ok(allow),
                None => bail!("decision service unavailable"),
            }
        }
    }

    struct Fixture {
        gate: Gate,
        settings: Arc<Settings>,
        decision: Arc<DecisionHandle>,
        client: Arc<MockDecision>,
    }

    fn fixture(answer: Option<bool>, fetcher: MockFetcher) -> Fixture {
        let registry = Arc::new(
            ResourceRegistry::new(vec![
                ResourceSpec {
                    name: "article".to_string(),
                    plural: "articles".to_string(),
                    singular: Some("article".to_string()),
                },
                ResourceSpec {
                    name: "comment".to_string(),
                    plural: "comments".to_string(),
                    singular: None,
                },
            ])
            .unwrap(),
        );
        let settings = Arc::new(Settings::new(SettingsDb::memory().unwrap()));
        let client = Arc::new(MockDecision::new(answer));
        let decision = Arc::new(DecisionHandle::with_client(client.clone()));

        let gate = Gate::new(
            registry,
            settings.clone(),
            Arc::new(StaticVerifier),
            decision.clone(),
            Arc::new(fetcher),
        );
        Fixture {
            gate,
            settings,
            decision,
            client,
        }
    }

    #[tokio::test]
    async fn test_passthrough_outside_prefix() {
        let f = fixture(Some(false), MockFetcher::default());

        let verdict = f.gate.evaluate("GET", "/healthz", Some("good-token")).await;
        assert_eq!(verdict, Verdict::Passthrough(SkipReason::NotProtected));
        // The decision service was never consulted
        assert_eq!(f.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_passthrough_on_credential() {
        let f = fixture(Some(false), MockFetcher::default());

        // No credential
        let verdict = f.gate.evaluate("GET", "/api/articles", None).await;
        assert_eq!(verdict, Verdict::Passthrough(SkipReason::NoCredential));

        // Bad credential
        let verdict = f
            .gate
            .evaluate("GET", "/api/articles", Some("expired"))
            .await;
        assert_eq!(verdict, Verdict::Passthrough(SkipReason::InvalidCredential));

        assert_eq!(f.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_passthrough_on_classification_miss() {
        let f = fixture(Some(false), MockFetcher::default());

        let verdict = f
            .gate
            .evaluate("GET", "/api/unknowns", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Passthrough(SkipReason::UnknownResource));

        let verdict = f
            .gate
            .evaluate("HEAD", "/api/articles", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Passthrough(SkipReason::UnsupportedMethod));

        assert_eq!(f.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_excluded_type_never_calls_decision() {
        // Decision client errors on every call; exclusion must win anyway
        let f = fixture(None, MockFetcher::default());
        f.settings
            .save_exclusions(&ExclusionsPayload {
                types: vec!["comment".to_string()],
            })
            .unwrap();

        for method in ["GET", "POST", "PUT", "DELETE"] {
            let verdict = f
                .gate
                .evaluate(method, "/api/comments/7", Some("good-token"))
                .await;
            assert_eq!(verdict, Verdict::Allowed(AllowReason::Excluded));
        }
        assert_eq!(f.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_grant_and_deny() {
        let f = fixture(Some(true), MockFetcher::default());
        let verdict = f
            .gate
            .evaluate("GET", "/api/articles", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Allowed(AllowReason::Granted));
        assert!(verdict.proceeds());

        let f = fixture(Some(false), MockFetcher::default());
        let verdict = f
            .gate
            .evaluate("GET", "/api/articles", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Denied);
        assert!(!verdict.proceeds());
    }

    #[tokio::test]
    async fn test_fail_open_on_decision_error() {
        let f = fixture(None, MockFetcher::default());
        let verdict = f
            .gate
            .evaluate("DELETE", "/api/articles/42", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Allowed(AllowReason::FailOpen));
        assert_eq!(f.client.calls(), 1);
    }

    #[tokio::test]
    async fn test_fail_open_when_not_configured() {
        let f = fixture(Some(false), MockFetcher::default());
        f.decision.teardown();

        let verdict = f
            .gate
            .evaluate("GET", "/api/articles", Some("good-token"))
            .await;
        assert_eq!(verdict, Verdict::Allowed(AllowReason::FailOpen));
        assert_eq!(f.client.calls(), 0);
    }

    #[tokio::test]
    async fn test_bare_subject_and_resource() {
        // No mappings configured: subject is a plain string, collection
        // resource is a plain type name
        let f = fixture(Some(true), MockFetcher::default());
        f.gate
            .evaluate("GET", "/api/articles", Some("good-token"))
            .await;

        let seen = f.client.seen.lock().unwrap();
        let (subject, action, resource) = &seen[0];
        assert_eq!(subject, &json!("user-42"));
        assert_eq!(action, "read");
        assert_eq!(resource, &json!("article"));
    }

    #[tokio::test]
    async fn test_instance_without_mappings_keeps_key() {
        let f = fixture(Some(true), MockFetcher::default());
        f.gate
            .evaluate("GET", "/api/articles/42", Some("good-token"))
            .await;

        let seen = f.client.seen.lock().unwrap();
        let (_, _, resource) = &seen[0];
        assert_eq!(resource, &json!({"type": "article", "key": "42"}));
    }

    #[tokio::test]
    async fn test_enriched_subject_and_resource() {
        let mut fetcher = MockFetcher::default();
        fetcher.subjects.insert(
            "42".to_string(),
            serde_json::from_value(json!({"department": "editorial", "plan": null})).unwrap(),
        );
        fetcher.instances.insert(
            ("article".to_string(), "42".to_string()),
            serde_json::from_value(json!({"status": "draft", "title": "Hello"})).unwrap(),
        );

        let f = fixture(Some(true), fetcher);
        f.settings
            .save_mappings(&MappingsPayload {
                subject_fields: vec!["department".to_string(), "plan".to_string()],
                resource_fields: HashMap::from([(
                    "article".to_string(),
                    vec!["status".to_string()],
                )]),
            })
            .unwrap();

        f.gate
            .evaluate("GET", "/api/articles/42", Some("good-token"))
            .await;

        let seen = f.client.seen.lock().unwrap();
        let (subject, _, resource) = &seen[0];
        // Null fields are omitted from the projection
        assert_eq!(
            subject,
            &json!({"key": "user-42", "attributes": {"department": "editorial"}})
        );
        // Only mapped fields are projected
        assert_eq!(
            resource,
            &json!({"type": "article", "key": "42", "attributes": {"status": "draft"}})
        );
    }

    #[tokio::test]
    async fn test_collection_with_mappings_is_typed_object() {
        let f = fixture(Some(true), MockFetcher::default());
        f.settings
            .save_mappings(&MappingsPayload {
                subject_fields: vec![],
                resource_fields: HashMap::from([(
                    "article".to_string(),
                    vec!["status".to_string()],
                )]),
            })
            .unwrap();

        f.gate
            .evaluate("GET", "/api/articles", Some("good-token"))
            .await;

        let seen = f.client.seen.lock().unwrap();
        let (_, _, resource) = &seen[0];
        // Keyless but structured: mappings exist for the type
        assert_eq!(resource, &json!({"type": "article"}));
    }

    #[tokio::test]
    async fn test_enrichment_failure_degrades() {
        let fetcher = MockFetcher {
            fail: true,
            ..Default::default()
        };
        let f = fixture(Some(true), fetcher);
        f.settings
            .save_mappings(&MappingsPayload {
                subject_fields: vec!["department".to_string()],
                resource_fields: HashMap::from([(
                    "article".to_string(),
                    vec!["status".to_string()],
                )]),
            })
            .unwrap();

        let verdict = f
            .gate
            .evaluate("PUT", "/api/articles/42", Some("good-token"))
            .await;
        // Fetch failures never fail the request
        assert_eq!(verdict, Verdict::Allowed(AllowReason::Granted));

        let seen = f.client.seen.lock().unwrap();
        let (subject, action, resource) = &seen[0];
        assert_eq!(subject, &json!("user-42"));
        assert_eq!(action, "update");
        assert_eq!(resource, &json!({"type": "article", "key": "42"}));
    }

    #[tokio::test]
    async fn test_create_has_no_key() {
        let f = fixture(Some(true), MockFetcher::default());
        f.gate
            .evaluate("POST", "/api/articles", Some("good-token"))
            .await;

        let seen = f.client.seen.lock().unwrap();
        let (_, action, resource) = &seen[0];
        assert_eq!(action, "create");
        assert_eq!(resource, &json!("article"));
    }

    #[tokio::test]
    async fn test_idempotent_outcomes() {
        let f = fixture(Some(true), MockFetcher::default());
        for _ in 0..3 {
            let verdict = f
                .gate
                .evaluate("GET", "/api/articles", Some("good-token"))
                .await;
            assert_eq!(verdict, Verdict::Allowed(AllowReason::Granted));
        }
        assert_eq!(f.client.calls(), 3);
    }
}
